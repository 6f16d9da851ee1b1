//! Gateway watcher.
//!
//! Turns the raw Gateway watch stream into key-only [`GatewayEvent`]s on the
//! work queue. Deletions are forwarded too: the export must shrink (or go away)
//! when a Gateway disappears.

use crate::error::ControllerError;
use crate::reconciler::{GatewayEvent, ObjectKey};
use crds::Gateway;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{WatchStreamExt, watcher};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Maps a watch event to a queue event; `Init` has no counterpart.
pub fn gateway_event(event: watcher::Event<Gateway>) -> Option<GatewayEvent> {
    match event {
        watcher::Event::Init => None,
        watcher::Event::InitApply(gateway) => Some(GatewayEvent::Created(object_key(&gateway))),
        watcher::Event::InitDone => Some(GatewayEvent::Resync),
        watcher::Event::Apply(gateway) => {
            let key = object_key(&gateway);
            if gateway.metadata.generation.unwrap_or(1) <= 1 {
                Some(GatewayEvent::Created(key))
            } else {
                Some(GatewayEvent::Updated(key))
            }
        }
        watcher::Event::Delete(gateway) => Some(GatewayEvent::Deleted(object_key(&gateway))),
    }
}

fn object_key(gateway: &Gateway) -> ObjectKey {
    ObjectKey::new(gateway.namespace().unwrap_or_default(), gateway.name_any())
}

/// Watches Gateways in the local namespace.
pub struct Watcher {
    gateway_api: Api<Gateway>,
    events: UnboundedSender<GatewayEvent>,
}

impl Watcher {
    /// Creates a new watcher feeding `events`.
    pub fn new(gateway_api: Api<Gateway>, events: UnboundedSender<GatewayEvent>) -> Self {
        Self { gateway_api, events }
    }

    /// Starts watching Gateway resources. Only returns on failure.
    pub async fn watch_gateways(&self) -> Result<(), ControllerError> {
        info!("Starting Gateway watcher");

        let mut stream = Box::pin(watcher(self.gateway_api.clone(), watcher::Config::default()).default_backoff());

        while let Some(result) = stream.next().await {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("Gateway watch error (will retry): {}", e);
                    continue;
                }
            };
            let Some(event) = gateway_event(event) else {
                debug!("Gateway watcher (re)listing");
                continue;
            };
            debug!("Gateway event: {}", event);
            self.events
                .send(event)
                .map_err(|e| ControllerError::Watch(format!("event queue closed: {e}")))?;
        }

        Err(ControllerError::Watch("Gateway watch stream ended".to_string()))
    }
}
