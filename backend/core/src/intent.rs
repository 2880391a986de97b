/// Intents: typed requests for an action, routed to exactly one plugin.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request for an action. Constructed per dispatch and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// When set, only this plugin's resolver is consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self { action: action.into(), ..Default::default() }
    }

    /// Target a specific plugin, skipping the registry scan.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<Intent> for Vec<Intent> {
    fn from(intent: Intent) -> Self {
        vec![intent]
    }
}

/// What a resolver hands back: data for the caller and follow-up intents.
///
/// `intents` is a batch of batches. Outer batches run one after another and
/// each inner batch is dispatched as a chained array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<Vec<Intent>>,
}

impl IntentResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn data(data: Value) -> Self {
        Self { data: Some(data), ..Default::default() }
    }

    /// Queue another batch of follow-up intents.
    pub fn then(mut self, batch: impl Into<Vec<Intent>>) -> Self {
        self.intents.push(batch.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_builder() {
        let intent = Intent::new("CREATE")
            .with_plugin("example.org/plugin/notes")
            .with_data(json!({"title": "x"}));
        assert_eq!(intent.plugin.as_deref(), Some("example.org/plugin/notes"));
        assert_eq!(intent.data.unwrap()["title"], "x");
    }

    #[test]
    fn test_result_then_keeps_batch_order() {
        let result = IntentResult::data(json!(1))
            .then(Intent::new("A"))
            .then(vec![Intent::new("B"), Intent::new("C")]);
        assert_eq!(result.intents.len(), 2);
        assert_eq!(result.intents[0][0].action, "A");
        assert_eq!(result.intents[1][1].action, "C");
    }

    #[test]
    fn test_intent_deserializes_without_optional_fields() {
        let intent: Intent = serde_json::from_value(json!({"action": "OPEN"})).unwrap();
        assert_eq!(intent, Intent::new("OPEN"));
    }
}
