// ── Capability registry ──
//
// Per-entity control descriptors, fetched once per engine lifetime. A
// failed fetch is logged and leaves the registry empty: no controls are
// offered and nothing else degrades.

use std::future::Future;
use std::sync::Arc;

use homectrl_api::CapabilitiesResponse;
use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::ControlDescriptor;

/// Immutable capability mapping: entity name to its controls, in server order.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    by_entity: IndexMap<String, Vec<ControlDescriptor>>,
}

impl Capabilities {
    /// Translate the wire response. Controls of an unknown type or
    /// constraint kind are skipped; so are controls the wire layer could
    /// not decode at all.
    pub fn from_raw(raw: &CapabilitiesResponse) -> Self {
        let by_entity = raw
            .iter()
            .map(|(entity, caps)| {
                let controls = caps
                    .controls
                    .iter()
                    .filter_map(|raw_control| {
                        let descriptor = ControlDescriptor::from_raw(raw_control);
                        if descriptor.is_none() {
                            debug!(entity = %entity, control = %raw_control.name, "skipping unsupported control");
                        }
                        descriptor
                    })
                    .collect();
                (entity.clone(), controls)
            })
            .collect();
        Self { by_entity }
    }

    /// Controls of one entity. Empty for unknown entities.
    pub fn controls(&self, entity: &str) -> &[ControlDescriptor] {
        self.by_entity
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn descriptor(&self, entity: &str, control: &str) -> Option<&ControlDescriptor> {
        self.controls(entity).iter().find(|d| d.name == control)
    }

    /// Entities with their controls, in server order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ControlDescriptor])> {
        self.by_entity
            .iter()
            .map(|(name, controls)| (name.as_str(), controls.as_slice()))
    }

    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

/// Shared, fetch-once holder of [`Capabilities`].
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    cell: Arc<OnceCell<Arc<Capabilities>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry with `fetch` unless it is already loaded.
    ///
    /// Concurrent callers share one fetch. Later calls return the stored
    /// mapping without fetching again, including after a failure.
    pub async fn load_with<F, Fut>(&self, fetch: F) -> Arc<Capabilities>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CapabilitiesResponse, CoreError>>,
    {
        let caps = self
            .cell
            .get_or_init(|| async {
                match fetch().await {
                    Ok(raw) => {
                        let caps = Capabilities::from_raw(&raw);
                        debug!(entities = caps.entity_count(), "capabilities loaded");
                        Arc::new(caps)
                    }
                    Err(e) => {
                        warn!(error = %e, "capability fetch failed; no controls will be offered");
                        Arc::new(Capabilities::default())
                    }
                }
            })
            .await;
        Arc::clone(caps)
    }

    /// The loaded mapping, or an empty one before loading completes.
    pub fn get(&self) -> Arc<Capabilities> {
        self.cell
            .get()
            .map_or_else(|| Arc::new(Capabilities::default()), Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub fn descriptor(&self, entity: &str, control: &str) -> Option<ControlDescriptor> {
        self.cell
            .get()
            .and_then(|caps| caps.descriptor(entity, control).cloned())
    }
}
