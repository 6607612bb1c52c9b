use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tracing::warn;

use super::DemoHub;
use super::Hub;
use super::Result;
use super::ServiceCall;
use crate::entity::EntityState;

/// Wraps a hub and switches to the demo house the first time fetching
/// states fails. Once switched it stays on demo data.
pub struct FallbackHub {
    primary: Box<dyn Hub>,
    demo: DemoHub,
    using_demo: AtomicBool,
}

impl FallbackHub {
    pub fn new(primary: Box<dyn Hub>) -> Self {
        Self {
            primary,
            demo: DemoHub::new(),
            using_demo: AtomicBool::new(false),
        }
    }

    /// Whether the demo house has taken over
    pub fn is_demo(&self) -> bool {
        self.using_demo.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Hub for FallbackHub {
    async fn states(&self) -> Result<Vec<EntityState>> {
        if self.is_demo() {
            return self.demo.states().await;
        }

        match self.primary.states().await {
            Ok(states) => Ok(states),
            Err(e) => {
                warn!("Failed to load states from hub, using demo data: {}", e);
                self.using_demo.store(true, Ordering::Relaxed);
                self.demo.states().await
            }
        }
    }

    async fn state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        if self.is_demo() {
            self.demo.state(entity_id).await
        } else {
            self.primary.state(entity_id).await
        }
    }

    async fn call_service(&self, domain: &str, service: &str, call: &ServiceCall) -> Result<()> {
        if self.is_demo() {
            self.demo.call_service(domain, service, call).await
        } else {
            self.primary.call_service(domain, service, call).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MockHub;

    #[tokio::test]
    async fn test_healthy_primary_is_used() {
        let primary = MockHub::new(vec![EntityState::new("light.real", "on")]);
        let hub = FallbackHub::new(Box::new(primary));

        let states = hub.states().await.unwrap();
        assert_eq!(states.len(), 1);
        assert!(!hub.is_demo());
    }

    #[tokio::test]
    async fn test_failing_primary_switches_to_demo() {
        let primary = MockHub::new(vec![]);
        primary.fail_requests(true);
        let hub = FallbackHub::new(Box::new(primary));

        let states = hub.states().await.unwrap();
        assert_eq!(states.len(), 24);
        assert!(hub.is_demo());

        // Later calls go to the demo house
        hub.turn_on("light.kitchen_wall", None).await.unwrap();
        let wall = hub.state("light.kitchen_wall").await.unwrap().unwrap();
        assert!(wall.is_on());
    }
}
