use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Hub;
use super::HubError;
use super::Result;
use super::ServiceCall;
use crate::entity::EntityState;

/// Recorded `(domain, service, call)`
pub type RecordedCall = (String, String, ServiceCall);

/// Mock hub for testing: canned states, recorded service calls
#[derive(Debug, Default)]
pub struct MockHub {
    states: Mutex<Vec<EntityState>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail: AtomicBool,
}

impl MockHub {
    pub fn new(states: Vec<EntityState>) -> Self {
        Self {
            states: Mutex::new(states),
            ..Self::default()
        }
    }

    /// Make every request fail with an HTTP 503
    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn set_states(&self, states: Vec<EntityState>) {
        *self.states.lock().unwrap() = states;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::Relaxed) {
            Err(HubError::Status {
                status: 503,
                url: "mock://hub".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Hub for MockHub {
    async fn states(&self) -> Result<Vec<EntityState>> {
        self.check()?;
        Ok(self.states.lock().unwrap().clone())
    }

    async fn state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        self.check()?;
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.entity_id == entity_id)
            .cloned())
    }

    async fn call_service(&self, domain: &str, service: &str, call: &ServiceCall) -> Result<()> {
        self.check()?;
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), service.to_string(), call.clone()));
        Ok(())
    }
}
