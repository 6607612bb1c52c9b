//! Access to the home-automation hub.
//!
//! Everything goes through the [`Hub`] trait so the dashboard can run against
//! the real REST API, the built-in demo house, or a mock in tests.

mod demo;
mod fallback;
#[cfg(test)]
mod mock;
#[cfg(feature = "hub_rest")]
mod rest;

use async_trait::async_trait;
pub use demo::DemoHub;
pub use fallback::FallbackHub;
#[cfg(test)]
pub use mock::MockHub;
#[cfg(feature = "hub_rest")]
pub use rest::RestHub;
use serde::Deserialize;
use serde::Serialize;

use crate::entity::domain_of;
use crate::entity::Domain;
use crate::entity::EntityState;

/// Group entity the hub exposes for "every light in the house"
pub const ALL_LIGHTS: &str = "light.all_lights";

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("hub returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid hub configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HubError>;

/// Body of `POST /api/services/<domain>/<service>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness_pct: Option<u8>,
}

impl ServiceCall {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            brightness_pct: None,
        }
    }

    pub fn with_brightness_pct(mut self, pct: u8) -> Self {
        self.brightness_pct = Some(pct.min(100));
        self
    }
}

/// Operations homeboard needs from a hub
#[async_trait]
pub trait Hub: Send + Sync {
    /// Every entity state the hub knows about
    async fn states(&self) -> Result<Vec<EntityState>>;

    /// A single entity's state, or `None` if the hub doesn't know it
    async fn state(&self, entity_id: &str) -> Result<Option<EntityState>>;

    /// Invoke a hub service
    async fn call_service(&self, domain: &str, service: &str, call: &ServiceCall) -> Result<()>;

    /// Turn an entity on, optionally at a brightness (percent).
    ///
    /// The service is called on the entity's own domain; brightness is only
    /// sent to domains that accept it.
    async fn turn_on(&self, entity_id: &str, brightness_pct: Option<u8>) -> Result<()> {
        let mut call = ServiceCall::new(entity_id);
        if let Some(pct) = brightness_pct {
            if Domain::of(entity_id).is_some_and(Domain::supports_brightness) {
                call = call.with_brightness_pct(pct);
            }
        }
        self.call_service(domain_of(entity_id), "turn_on", &call)
            .await
    }

    async fn turn_off(&self, entity_id: &str) -> Result<()> {
        self.call_service(domain_of(entity_id), "turn_off", &ServiceCall::new(entity_id))
            .await
    }

    async fn toggle(&self, entity_id: &str) -> Result<()> {
        self.call_service(domain_of(entity_id), "toggle", &ServiceCall::new(entity_id))
            .await
    }

    async fn set_brightness(&self, entity_id: &str, pct: u8) -> Result<()> {
        self.turn_on(entity_id, Some(pct)).await
    }

    async fn all_lights_on(&self) -> Result<()> {
        self.turn_on(ALL_LIGHTS, None).await
    }

    async fn all_lights_off(&self) -> Result<()> {
        self.turn_off(ALL_LIGHTS).await
    }
}
