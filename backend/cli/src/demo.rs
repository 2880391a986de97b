//! Toy plugins wired into the `trellis` binary.
//!
//! `layout` owns the root surface and carves it into `sidebar` and `main`;
//! `notes` and `navigation` fill those slots and answer intents.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trellis_core::{
    Direction, Fallback, Intent, IntentResult, Node, PluginMeta, SurfaceData, SurfaceRequest, SurfaceResult, TrellisError,
};
use trellis_host::PluginCatalog;
use trellis_plugins::{GraphAction, IntentResolver, Plugin, PluginDefinition, Provides, Resource};

pub const LAYOUT: &str = "layout";
pub const NOTES: &str = "notes";
pub const NAVIGATION: &str = "navigation";

pub fn catalog() -> PluginCatalog {
    PluginCatalog::new()
        .add(PluginMeta::new(LAYOUT).with_name("Layout"), || async {
            anyhow::Ok(Arc::new(LayoutPlugin) as Arc<dyn PluginDefinition>)
        })
        .add(PluginMeta::new(NOTES).with_name("Notes"), || async {
            anyhow::Ok(Arc::new(NotesPlugin::default()) as Arc<dyn PluginDefinition>)
        })
        .add(PluginMeta::new(NAVIGATION).with_name("Navigation"), || async {
            anyhow::Ok(Arc::new(NavigationPlugin::default()) as Arc<dyn PluginDefinition>)
        })
}

// ---------------------------------------------------------------------------
// layout
// ---------------------------------------------------------------------------

struct LayoutPlugin;

fn main_fallback(error: &TrellisError, _data: &SurfaceData) -> Node {
    Node::element("p").attr("class", "error").child(error.to_string())
}

#[async_trait]
impl PluginDefinition for LayoutPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(LAYOUT).with_name("Layout")
    }

    async fn initialize(&self) -> Result<Provides> {
        Ok(Provides::new().with_surface_fn(|props| {
            if !props.role_is("root") {
                return Ok(None);
            }
            let shell = Node::element("div")
                .attr("class", "app")
                .child(SurfaceRequest::role("sidebar").with_direction(Direction::Block))
                .child(
                    SurfaceRequest::role("main")
                        .with_placeholder(Node::element("p").child("Nothing here yet"))
                        .with_fallback(Fallback::new(main_fallback)),
                );
            Ok(Some(SurfaceResult::new(shell)))
        }))
    }
}

// ---------------------------------------------------------------------------
// notes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
}

#[derive(Default)]
struct NotesPlugin {
    notes: Arc<Mutex<Vec<Note>>>,
}

struct NotesResolver {
    notes: Arc<Mutex<Vec<Note>>>,
}

#[async_trait]
impl IntentResolver for NotesResolver {
    async fn resolve(&self, intent: &Intent, _plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>> {
        match intent.action.as_str() {
            "CREATE" => {
                let title = match intent.data.as_ref().and_then(|d| d.get("title")) {
                    Some(Value::String(title)) if !title.trim().is_empty() => title.clone(),
                    Some(_) => bail!("note title must be a non-empty string"),
                    None => "Untitled".to_string(),
                };
                let note = {
                    let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
                    let note = Note { id: notes.len() as u64 + 1, title };
                    notes.push(note.clone());
                    note
                };
                let open = Intent::new("OPEN")
                    .with_plugin(NAVIGATION)
                    .with_data(json!({ "path": format!("/notes/{}", note.id) }));
                Ok(Some(IntentResult::data(serde_json::to_value(&note)?).then(vec![open])))
            }
            "LIST" => {
                let notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner).clone();
                Ok(Some(IntentResult::data(serde_json::to_value(notes)?)))
            }
            _ => Ok(None),
        }
    }
}

fn notes_translations() -> Vec<Resource> {
    let mut en = Resource::new();
    en.insert("en-US".into(), json!({ "notes": { "title": "Notes", "create": "New note" } }));
    vec![en]
}

#[async_trait]
impl PluginDefinition for NotesPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(NOTES).with_name("Notes")
    }

    fn provides(&self) -> Provides {
        Provides::new().with_translations(notes_translations())
    }

    async fn initialize(&self) -> Result<Provides> {
        let notes = self.notes.clone();
        Ok(Provides::new()
            .with_intent(NotesResolver { notes: self.notes.clone() })
            .with_surface_fn(move |props| {
                if !props.role_is("main") {
                    return Ok(None);
                }
                let notes = notes.lock().unwrap_or_else(PoisonError::into_inner);
                if notes.is_empty() {
                    return Ok(None);
                }
                let list = notes
                    .iter()
                    .fold(Node::element("ul"), |list, note| list.child(Node::element("li").child(note.title.clone())));
                Ok(Some(SurfaceResult::new(
                    Node::element("article").child(Node::element("h2").child("Notes")).child(list),
                )))
            })
            .with_graph(|_plugins: &[Arc<Plugin>]| {
                vec![GraphAction {
                    id: "notes.welcome".into(),
                    label: "Create a welcome note".into(),
                    intents: vec![
                        Intent::new("CREATE").with_plugin(NOTES).with_data(json!({ "title": "Welcome" })),
                        Intent::new("LIST").with_plugin(NOTES),
                    ],
                }]
            }))
    }
}

// ---------------------------------------------------------------------------
// navigation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct NavigationPlugin {
    location: Arc<Mutex<Option<String>>>,
}

struct NavigationResolver {
    location: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl IntentResolver for NavigationResolver {
    async fn resolve(&self, intent: &Intent, _plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>> {
        if intent.action != "OPEN" {
            return Ok(None);
        }
        let Some(path) = intent.data.as_ref().and_then(|d| d.get("path")).and_then(Value::as_str) else {
            bail!("OPEN needs a string `path`");
        };
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
        tracing::debug!(path, "Navigated");
        Ok(Some(IntentResult::data(json!({ "location": path }))))
    }
}

#[async_trait]
impl PluginDefinition for NavigationPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta::new(NAVIGATION).with_name("Navigation")
    }

    async fn initialize(&self) -> Result<Provides> {
        let location = self.location.clone();
        Ok(Provides::new()
            .with_intent(NavigationResolver { location: self.location.clone() })
            .with_surface_fn(move |props| {
                if !props.role_is("sidebar") {
                    return Ok(None);
                }
                let current = location.lock().unwrap_or_else(PoisonError::into_inner).clone();
                let mut nav = Node::element("nav").child(Node::element("a").attr("href", "/notes").child("Notes"));
                if let Some(path) = current {
                    nav = nav.child(Node::element("span").attr("class", "current").child(path));
                }
                Ok(Some(SurfaceResult::hoist(nav)))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_config::{HostConfig, TrellisConfig};
    use trellis_host::{Host, RunningApp};

    async fn boot(defaults: &[&str]) -> RunningApp {
        let config = TrellisConfig {
            host: HostConfig {
                core: vec![LAYOUT.into()],
                defaults: defaults.iter().map(|s| s.to_string()).collect(),
                settings_path: None,
            },
            ..Default::default()
        };
        Host::new(config, catalog()).bootstrap().await.unwrap()
    }

    fn markup(app: &RunningApp) -> String {
        app.render_root().unwrap().iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_layout_alone_renders_placeholder() {
        let app = boot(&[]).await;
        assert_eq!(markup(&app), "<div class=\"app\"><p>Nothing here yet</p></div>");
    }

    #[tokio::test]
    async fn test_create_opens_note_and_renders_it() {
        let app = boot(&[NOTES, NAVIGATION]).await;
        let result = app
            .dispatch(Intent::new("CREATE").with_data(json!({ "title": "Groceries" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.data, Some(json!({ "id": 1, "title": "Groceries" })));

        assert_eq!(
            markup(&app),
            "<div class=\"app\">\
             <nav><a href=\"/notes\">Notes</a><span class=\"current\">/notes/1</span></nav>\
             <article><h2>Notes</h2><ul><li>Groceries</li></ul></article>\
             </div>"
        );
    }

    #[tokio::test]
    async fn test_welcome_action_lists_created_note() {
        let app = boot(&[NOTES, NAVIGATION]).await;
        let result = app.invoke_action("notes.welcome").await.unwrap().unwrap();
        assert_eq!(result.data, Some(json!([{ "id": 1, "title": "Welcome" }])));
        assert_eq!(app.translations().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_title_is_an_intent_error() {
        let app = boot(&[NOTES]).await;
        let err = app
            .dispatch(Intent::new("CREATE").with_data(json!({ "title": 3 })))
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::IntentResolution { ref plugin, .. } if plugin == NOTES));
    }
}
