use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::Hub;
use super::HubError;
use super::Result;
use super::ServiceCall;
use super::ALL_LIGHTS;
use crate::entity::pct_to_raw;
use crate::entity::EntityState;

/// Rooms and lights of the built-in demo house
const DEMO_ROOMS: &[(&str, &[&str])] = &[
    (
        "bedroom_john",
        &["bedroom_john_closet", "bedroom_john_desk", "bedroom_john_ceiling"],
    ),
    ("bedroom_guest", &["bedroom_guest_closet", "bedroom_guest_ceiling"]),
    ("bedroom_master", &["bedroom_master_closet", "bedroom_master_ceiling"]),
    (
        "bathroom_guest",
        &["bathroom_guest_toilet", "bathroom_guest_shower", "bathroom_guest_ceiling"],
    ),
    (
        "bathroom_master",
        &[
            "bathroom_master_toilet",
            "bathroom_master_shower",
            "bathroom_master_ceiling",
            "bathroom_master_cabinet",
            "bathroom_master_mirror",
        ],
    ),
    ("family_room", &["family_room_wall_tv", "family_room_couch", "family_room_ceiling"]),
    ("living_room", &["living_room_wall", "living_room_ceiling"]),
    (
        "kitchen",
        &["kitchen_wall", "kitchen_ceiling", "kitchen_cabinets", "kitchen_island"],
    ),
];

/// Brightness every demo light starts at (20%)
const DEMO_BRIGHTNESS: u8 = 51;

/// An in-memory hub pre-populated with a demo house.
///
/// Service calls change the local state, so the dashboard behaves as it
/// would against a real hub.
pub struct DemoHub {
    states: Mutex<BTreeMap<String, EntityState>>,
}

impl DemoHub {
    pub fn new() -> Self {
        let mut states = BTreeMap::new();
        for (_, lights) in DEMO_ROOMS {
            for light in *lights {
                let entity_id = format!("light.{}", light);
                let state = EntityState::new(entity_id.clone(), "off")
                    .with_attribute("brightness", DEMO_BRIGHTNESS)
                    .with_attribute("friendly_name", title_case(light));
                states.insert(entity_id, state);
            }
        }
        Self {
            states: Mutex::new(states),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, EntityState>>> {
        self.states
            .lock()
            .map_err(|e| HubError::Config(format!("demo state poisoned: {}", e)))
    }
}

impl Default for DemoHub {
    fn default() -> Self {
        Self::new()
    }
}

fn title_case(object_id: &str) -> String {
    object_id
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn apply(state: &mut EntityState, service: &str, call: &ServiceCall) {
    match service {
        "turn_on" => {
            state.state = "on".to_string();
            if let Some(pct) = call.brightness_pct {
                state
                    .attributes
                    .insert("brightness".to_string(), pct_to_raw(pct).into());
            }
        }
        "turn_off" => state.state = "off".to_string(),
        "toggle" => {
            state.state = if state.is_on() { "off" } else { "on" }.to_string();
        }
        _ => {}
    }
}

#[async_trait]
impl Hub for DemoHub {
    async fn states(&self) -> Result<Vec<EntityState>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn state(&self, entity_id: &str) -> Result<Option<EntityState>> {
        Ok(self.lock()?.get(entity_id).cloned())
    }

    async fn call_service(&self, domain: &str, service: &str, call: &ServiceCall) -> Result<()> {
        debug!("Demo hub: {}.{} for {}", domain, service, call.entity_id);
        let mut states = self.lock()?;

        if call.entity_id == ALL_LIGHTS {
            for state in states.values_mut() {
                if state.domain() == "light" {
                    apply(state, service, call);
                }
            }
        } else if let Some(state) = states.get_mut(&call.entity_id) {
            apply(state, service, call);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_house_contents() {
        let hub = DemoHub::new();
        let states = hub.states().await.unwrap();

        assert_eq!(states.len(), 24);
        assert!(states.iter().all(|s| s.domain() == "light" && !s.is_on()));

        let desk = hub.state("light.bedroom_john_desk").await.unwrap().unwrap();
        assert_eq!(desk.friendly_name(), "Bedroom John Desk");
        assert_eq!(desk.brightness(), Some(51));
    }

    #[tokio::test]
    async fn test_service_calls_update_state() {
        let hub = DemoHub::new();

        hub.turn_on("light.kitchen_island", Some(100)).await.unwrap();
        let island = hub.state("light.kitchen_island").await.unwrap().unwrap();
        assert!(island.is_on());
        assert_eq!(island.brightness(), Some(255));

        hub.toggle("light.kitchen_island").await.unwrap();
        let island = hub.state("light.kitchen_island").await.unwrap().unwrap();
        assert!(!island.is_on());
    }

    #[tokio::test]
    async fn test_all_lights_group() {
        let hub = DemoHub::new();
        hub.all_lights_on().await.unwrap();
        assert!(hub.states().await.unwrap().iter().all(EntityState::is_on));

        hub.all_lights_off().await.unwrap();
        assert!(!hub.states().await.unwrap().iter().any(EntityState::is_on));
    }

    #[tokio::test]
    async fn test_unknown_entity_is_ignored() {
        let hub = DemoHub::new();
        hub.turn_on("light.nowhere", None).await.unwrap();
        assert!(hub.state("light.nowhere").await.unwrap().is_none());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("family_room_wall_tv"), "Family Room Wall Tv");
    }
}
