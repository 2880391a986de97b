/// Intent dispatcher.
///
/// A single intent is offered to plugins in registration order; the first
/// resolver returning `Some` wins and the scan stops. An intent naming a
/// plugin is offered to that plugin only.
///
/// An array of intents runs sequentially. Each intent receives the previous
/// intent's result data (see [`chain_data`]), and the follow-up batches a
/// result carries are dispatched, batch by batch, before the next intent of
/// the array starts. Nothing here runs concurrently.
///
/// A resolver error aborts the whole dispatch. Side effects of intents that
/// already resolved are not rolled back.
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use trellis_core::{Intent, IntentResult, Result, TrellisError};
use trellis_plugins::{parse_intent_plugin, Plugin, PluginRegistry};

use crate::events::{IntentEvent, IntentEventBus};

/// Default bound on follow-up nesting.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;

#[derive(Clone)]
pub struct IntentDispatcher {
    registry: PluginRegistry,
    events: IntentEventBus,
    max_chain_depth: usize,
}

impl IntentDispatcher {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry, events: IntentEventBus::default(), max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn with_event_bus(mut self, events: IntentEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.events.subscribe()
    }

    /// Dispatch one intent or an array of intents.
    ///
    /// Returns the result of the last intent of the array (`None` if no
    /// plugin resolved it).
    pub async fn dispatch(&self, intents: impl Into<Vec<Intent>>) -> Result<Option<IntentResult>> {
        let _guard = self.registry.begin_dispatch();
        let plugins = self.registry.get_enabled();
        self.dispatch_chain(intents.into(), &plugins, 0).await
    }

    fn dispatch_chain<'a>(
        &'a self,
        intents: Vec<Intent>,
        plugins: &'a [Arc<Plugin>],
        depth: usize,
    ) -> BoxFuture<'a, Result<Option<IntentResult>>> {
        Box::pin(async move {
            if depth > self.max_chain_depth {
                return Err(TrellisError::ChainTooDeep(self.max_chain_depth));
            }

            let mut previous: Option<IntentResult> = None;
            for intent in intents {
                let intent = chain_data(intent, previous.as_ref().and_then(|r| r.data.as_ref()));
                let result = self.dispatch_one(&intent, plugins).await?;
                if let Some(result) = &result {
                    for batch in &result.intents {
                        self.dispatch_chain(batch.clone(), plugins, depth + 1).await?;
                    }
                }
                previous = result;
            }
            Ok(previous)
        })
    }

    async fn dispatch_one(&self, intent: &Intent, plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>> {
        debug!("[Intents] Dispatching {} target={:?}", intent.action, intent.plugin);
        self.events.publish(IntentEvent::Dispatched {
            action: intent.action.clone(),
            target: intent.plugin.clone(),
        });

        let candidates: Vec<&Arc<Plugin>> = match &intent.plugin {
            Some(target) => {
                let found: Vec<_> = plugins.iter().filter(|p| p.id() == target).collect();
                if found.is_empty() {
                    warn!("[Intents] Target plugin {} is not loaded", target);
                }
                found
            }
            None => plugins.iter().collect(),
        };

        for plugin in candidates {
            let Some(resolver) = parse_intent_plugin(plugin) else {
                continue;
            };
            match resolver.resolve(intent, plugins).await {
                Ok(Some(result)) => {
                    debug!("[Intents] {} resolved by {}", intent.action, plugin.id());
                    self.events.publish(IntentEvent::Resolved {
                        action: intent.action.clone(),
                        plugin: plugin.id().to_string(),
                    });
                    return Ok(Some(result));
                }
                Ok(None) => continue,
                Err(source) => {
                    warn!("[Intents] {} failed in {}: {}", intent.action, plugin.id(), source);
                    self.events.publish(IntentEvent::Failed {
                        action: intent.action.clone(),
                        plugin: plugin.id().to_string(),
                        error: source.to_string(),
                    });
                    return Err(TrellisError::IntentResolution {
                        plugin: plugin.id().to_string(),
                        action: intent.action.clone(),
                        source,
                    });
                }
            }
        }

        debug!("[Intents] {} unresolved", intent.action);
        self.events.publish(IntentEvent::Unresolved { action: intent.action.clone() });
        Ok(None)
    }
}

/// Feed the previous result's data into the next intent of an array.
///
/// No data: the previous data becomes the intent's data. Object data: the
/// previous data is added under `result` unless that key is taken. Any other
/// data is left alone.
fn chain_data(mut intent: Intent, previous: Option<&Value>) -> Intent {
    let Some(previous) = previous else {
        return intent;
    };
    match intent.data.as_mut() {
        None => intent.data = Some(previous.clone()),
        Some(Value::Object(map)) => {
            map.entry("result").or_insert_with(|| previous.clone());
        }
        Some(_) => {}
    }
    intent
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::error::Error as _;
    use trellis_plugins::testing::{CallLog, TestPlugin};

    async fn registry_with(plugins: Vec<TestPlugin>) -> PluginRegistry {
        let registry = PluginRegistry::new();
        for plugin in plugins {
            registry.register(plugin.build()).await.unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_first_match_wins_after_skipping_none() {
        let log = CallLog::default();
        let registry = registry_with(vec![
            TestPlugin::new("first", &log).with_resolver(|_| Ok(None)),
            TestPlugin::new("second", &log).with_resolver(|_| Ok(Some(IntentResult::data(json!("second"))))),
            TestPlugin::new("third", &log).with_resolver(|_| Ok(Some(IntentResult::data(json!("third"))))),
        ])
        .await;

        let result = IntentDispatcher::new(registry).dispatch(Intent::new("CREATE")).await.unwrap();
        assert_eq!(result.unwrap().data, Some(json!("second")));
        assert_eq!(log.matching(":resolve"), vec!["first:resolve:CREATE", "second:resolve:CREATE"]);
    }

    #[tokio::test]
    async fn test_targeted_dispatch_never_falls_through() {
        let log = CallLog::default();
        let registry = registry_with(vec![
            TestPlugin::new("x", &log).with_resolver(|_| Ok(None)),
            TestPlugin::new("y", &log).with_resolver(|_| Ok(Some(IntentResult::data(json!("y"))))),
        ])
        .await;
        let dispatcher = IntentDispatcher::new(registry);

        let result = dispatcher.dispatch(Intent::new("A").with_plugin("x")).await.unwrap();
        assert!(result.is_none());
        assert_eq!(log.matching(":resolve"), vec!["x:resolve:A"]);

        let missing = dispatcher.dispatch(Intent::new("A").with_plugin("nope")).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(log.matching(":resolve").len(), 1);
    }

    #[tokio::test]
    async fn test_resolver_error_propagates_unchanged() {
        let log = CallLog::default();
        let registry = registry_with(vec![
            TestPlugin::new("bad", &log).with_resolver(|intent| match intent.action.as_str() {
                "BOOM" => Err(anyhow!("exploded")),
                _ => Ok(None),
            }),
            TestPlugin::new("good", &log).with_resolver(|_| Ok(Some(IntentResult::empty()))),
        ])
        .await;
        let dispatcher = IntentDispatcher::new(registry.clone());

        let err = dispatcher
            .dispatch(vec![Intent::new("BOOM"), Intent::new("AFTER")])
            .await
            .unwrap_err();
        match &err {
            TrellisError::IntentResolution { plugin, action, .. } => {
                assert_eq!(plugin, "bad");
                assert_eq!(action, "BOOM");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.source().unwrap().to_string(), "exploded");
        // Neither the second plugin nor the next intent ran.
        assert_eq!(log.matching(":resolve"), vec!["bad:resolve:BOOM"]);
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_batches_run_in_order_and_complete_before_next() {
        let log = CallLog::default();
        let registry = registry_with(vec![TestPlugin::new("p", &log).with_resolver(|intent| {
            let result = match intent.action.as_str() {
                "A" => IntentResult::empty()
                    .then(vec![Intent::new("B1"), Intent::new("B2")])
                    .then(Intent::new("C")),
                "B1" => IntentResult::empty().then(Intent::new("D")),
                _ => IntentResult::empty(),
            };
            Ok(Some(result))
        })])
        .await;

        IntentDispatcher::new(registry)
            .dispatch(vec![Intent::new("A"), Intent::new("E")])
            .await
            .unwrap();
        assert_eq!(
            log.matching(":resolve"),
            vec!["p:resolve:A", "p:resolve:B1", "p:resolve:D", "p:resolve:B2", "p:resolve:C", "p:resolve:E"]
        );
    }

    #[tokio::test]
    async fn test_unresolved_follow_up_is_skipped() {
        let log = CallLog::default();
        let registry = registry_with(vec![TestPlugin::new("p", &log).with_resolver(|intent| {
            Ok(match intent.action.as_str() {
                "START" => Some(IntentResult::empty().then(Intent::new("NOBODY")).then(Intent::new("DONE"))),
                "DONE" => Some(IntentResult::data(json!("done"))),
                _ => None,
            })
        })])
        .await;

        let result = IntentDispatcher::new(registry).dispatch(Intent::new("START")).await.unwrap();
        assert!(result.is_some());
        assert_eq!(log.matching(":resolve"), vec!["p:resolve:START", "p:resolve:NOBODY", "p:resolve:DONE"]);
    }

    #[tokio::test]
    async fn test_array_chains_previous_result_data() {
        let log = CallLog::default();
        let registry = registry_with(vec![TestPlugin::new("p", &log).with_resolver(|intent| {
            Ok(Some(match intent.action.as_str() {
                "CREATE" => IntentResult::data(json!({"id": "obj-1"})),
                _ => IntentResult::data(intent.data.clone().unwrap_or(Value::Null)),
            }))
        })])
        .await;
        let dispatcher = IntentDispatcher::new(registry);

        let added = dispatcher
            .dispatch(vec![
                Intent::new("CREATE"),
                Intent::new("ADD").with_data(json!({"target": "folder"})),
            ])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(added.data, Some(json!({"target": "folder", "result": {"id": "obj-1"}})));

        let opened = dispatcher
            .dispatch(vec![Intent::new("CREATE"), Intent::new("OPEN")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(opened.data, Some(json!({"id": "obj-1"})));
    }

    #[tokio::test]
    async fn test_runaway_chain_is_bounded() {
        let log = CallLog::default();
        let registry = registry_with(vec![TestPlugin::new("p", &log)
            .with_resolver(|_| Ok(Some(IntentResult::empty().then(Intent::new("AGAIN")))))])
        .await;

        let err = IntentDispatcher::new(registry)
            .with_max_chain_depth(3)
            .dispatch(Intent::new("AGAIN"))
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::ChainTooDeep(3)));
        assert_eq!(log.matching(":resolve").len(), 4);
    }

    #[tokio::test]
    async fn test_disabled_plugin_is_skipped() {
        let log = CallLog::default();
        let registry = registry_with(vec![
            TestPlugin::new("a", &log).with_resolver(|_| Ok(Some(IntentResult::data(json!("a"))))),
            TestPlugin::new("b", &log).with_resolver(|_| Ok(Some(IntentResult::data(json!("b"))))),
        ])
        .await;
        registry.disable("a").unwrap();

        let result = IntentDispatcher::new(registry).dispatch(Intent::new("X")).await.unwrap();
        assert_eq!(result.unwrap().data, Some(json!("b")));
        assert_eq!(log.matching(":resolve"), vec!["b:resolve:X"]);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let log = CallLog::default();
        let registry = registry_with(vec![
            TestPlugin::new("p", &log).with_resolver(|intent| match intent.action.as_str() {
                "GO" => Ok(Some(IntentResult::empty())),
                "BOOM" => Err(anyhow!("exploded")),
                _ => Ok(None),
            }),
        ])
        .await;
        let dispatcher = IntentDispatcher::new(registry);
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch(Intent::new("GO")).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            IntentEvent::Dispatched { action: "GO".into(), target: None }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            IntentEvent::Resolved { action: "GO".into(), plugin: "p".into() }
        );

        assert!(dispatcher.dispatch(Intent::new("NOPE").with_plugin("p")).await.unwrap().is_none());
        assert_eq!(
            rx.recv().await.unwrap(),
            IntentEvent::Dispatched { action: "NOPE".into(), target: Some("p".into()) }
        );
        assert_eq!(rx.recv().await.unwrap(), IntentEvent::Unresolved { action: "NOPE".into() });

        assert!(dispatcher.dispatch(Intent::new("BOOM")).await.is_err());
        assert_eq!(
            rx.recv().await.unwrap(),
            IntentEvent::Dispatched { action: "BOOM".into(), target: None }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            IntentEvent::Failed { action: "BOOM".into(), plugin: "p".into(), error: "exploded".into() }
        );
    }

    #[test]
    fn test_chain_data_leaves_scalars_alone() {
        let intent = chain_data(Intent::new("X").with_data(json!(5)), Some(&json!("prev")));
        assert_eq!(intent.data, Some(json!(5)));
        let intent = chain_data(
            Intent::new("X").with_data(json!({"result": "mine"})),
            Some(&json!("prev")),
        );
        assert_eq!(intent.data, Some(json!({"result": "mine"})));
    }
}
