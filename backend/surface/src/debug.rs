//! Per-surface render bookkeeping for devtools.
//!
//! Every top-level render is a pass. Surfaces rendered under a root in an
//! earlier pass but absent from the latest one have unmounted and are
//! dropped, so per-object ids do not pile up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use trellis_core::SurfaceRequest;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceDebugEntry {
    pub id: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub created: DateTime<Utc>,
    pub render_count: u64,
}

#[derive(Debug)]
struct Tracked {
    entry: SurfaceDebugEntry,
    root: String,
    pass: u64,
}

#[derive(Debug, Default)]
struct Table {
    entries: HashMap<String, Tracked>,
    passes: u64,
}

/// Handle for one top-level render, see [`SurfaceDebugInfo::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPass {
    root: String,
    pass: u64,
}

/// Render counts keyed by surface id. Requests without an explicit id are
/// keyed by slot name.
#[derive(Debug, Clone, Default)]
pub struct SurfaceDebugInfo {
    table: Arc<Mutex<Table>>,
}

impl SurfaceDebugInfo {
    pub fn surface_id(request: &SurfaceRequest) -> String {
        match (&request.id, request.slot_name()) {
            (Some(id), _) => id.clone(),
            (None, Some(name)) => format!("surface-{name}"),
            (None, None) => "surface-anonymous".to_string(),
        }
    }

    /// Start a render pass rooted at `root`.
    pub fn begin(&self, root: &SurfaceRequest) -> RenderPass {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.passes += 1;
        RenderPass { root: Self::surface_id(root), pass: table.passes }
    }

    /// Count a render of `request` within `pass` and return its id.
    pub fn track(&self, request: &SurfaceRequest, pass: &RenderPass) -> String {
        let id = Self::surface_id(request);
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let tracked = table.entries.entry(id.clone()).or_insert_with(|| Tracked {
            entry: SurfaceDebugEntry {
                id: id.clone(),
                name: request.slot_name().map(str::to_string),
                role: request.role.clone(),
                created: Utc::now(),
                render_count: 0,
            },
            root: pass.root.clone(),
            pass: pass.pass,
        });
        tracked.entry.render_count += 1;
        tracked.root = pass.root.clone();
        tracked.pass = tracked.pass.max(pass.pass);
        id
    }

    /// End `pass`: drop surfaces under its root that an earlier pass
    /// rendered and this one did not. Returns how many were dropped.
    pub fn finish(&self, pass: RenderPass) -> usize {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let before = table.entries.len();
        table.entries.retain(|_, tracked| tracked.root != pass.root || tracked.pass >= pass.pass);
        before - table.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<SurfaceDebugEntry> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entries.get(id).map(|tracked| tracked.entry.clone())
    }

    /// All entries, sorted by id.
    pub fn snapshot(&self) -> Vec<SurfaceDebugEntry> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = table.entries.values().map(|tracked| tracked.entry.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, id: &str) -> Option<SurfaceDebugEntry> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entries.remove(id).map(|tracked| tracked.entry)
    }
}
