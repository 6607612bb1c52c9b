//! Per-room light controls on top of the hub and the room mapping.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::discovery::detect_systems;
use crate::discovery::discover_entities;
use crate::discovery::System;
use crate::entity::brightness_pct;
use crate::entity::DiscoveredEntity;
use crate::entity::Domain;
use crate::entity::EntityState;
use crate::hub::Hub;
use crate::hub::HubError;
use crate::mapping::EntityMapper;
use crate::mapping::MappingError;

/// Household base load in kW
const BASE_LOAD_KW: f64 = 2.4;
/// Estimated draw per active light in kW
const LIGHT_LOAD_KW: f64 = 0.06;
/// Estimated watts per brightness percent of an active light
const WATTS_PER_BRIGHTNESS_PCT: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightView {
    pub id: String,
    pub name: String,
    pub is_on: bool,
    /// Percent, 0-100
    pub brightness: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomView {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub has_active_devices: bool,
    pub lights: Vec<LightView>,
}

impl RoomView {
    fn update_status(&mut self) {
        self.has_active_devices = self.lights.iter().any(|l| l.is_on);
    }

    /// Estimated draw of the room's lights, in watts
    pub fn energy_watts(&self) -> f64 {
        self.lights
            .iter()
            .filter(|l| l.is_on)
            .map(|l| f64::from(l.brightness) * WATTS_PER_BRIGHTNESS_PCT)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Scene {
    /// Every light on at 60%
    Evening,
    /// Accent and bedside lights at 15%, everything else off
    Night,
    AllOff,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("no light '{0}' in any room")]
    UnknownLight(String),

    #[error("no room '{0}'")]
    UnknownRoom(String),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Domains shown as switchable lights in a room
fn is_switchable(domain: Domain) -> bool {
    matches!(
        domain,
        Domain::Light | Domain::Switch | Domain::InputBoolean | Domain::Fan
    )
}

fn light_view(entity: &DiscoveredEntity) -> LightView {
    LightView {
        id: entity.entity_id.clone(),
        name: entity.friendly_name.clone(),
        is_on: entity.is_on(),
        brightness: entity.brightness_pct(),
    }
}

pub struct Dashboard {
    hub: Arc<dyn Hub>,
    mapper: EntityMapper,
    rooms: Vec<RoomView>,
}

impl Dashboard {
    pub fn new(hub: Arc<dyn Hub>, mapper: EntityMapper) -> Self {
        let mut dashboard = Self {
            hub,
            mapper,
            rooms: Vec::new(),
        };
        dashboard.rebuild();
        dashboard
    }

    pub fn hub(&self) -> &Arc<dyn Hub> {
        &self.hub
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    /// Mutable access to rooms and mappings; call [`Dashboard::rebuild`]
    /// afterwards to refresh the room views.
    pub fn mapper_mut(&mut self) -> &mut EntityMapper {
        &mut self.mapper
    }

    pub fn rooms(&self) -> &[RoomView] {
        &self.rooms
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomView> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// Rediscover entities from the hub and rebuild the rooms.
    ///
    /// When a setup selection was saved, only the selected entities are kept.
    pub async fn refresh(&mut self) -> Result<()> {
        let states = self.hub.states().await?;
        let mut entities = discover_entities(&states);

        let selected: HashSet<String> = self
            .mapper
            .selected_entities()?
            .into_iter()
            .map(|e| e.entity_id)
            .collect();
        if !selected.is_empty() {
            entities.retain(|e| selected.contains(&e.entity_id));
        }

        info!("Discovered {} controllable entities", entities.len());
        self.mapper.set_discovered(entities)?;
        self.rebuild();
        Ok(())
    }

    /// Rebuild room views from the room definitions and mapped entities
    pub fn rebuild(&mut self) {
        self.rooms = self
            .mapper
            .rooms()
            .iter()
            .map(|room| {
                let lights = self
                    .mapper
                    .entities_for_room(&room.id)
                    .into_iter()
                    .filter(|e| is_switchable(e.domain))
                    .map(light_view)
                    .collect();
                let mut view = RoomView {
                    id: room.id.clone(),
                    name: room.name.clone(),
                    icon: room.icon.clone(),
                    has_active_devices: false,
                    lights,
                };
                view.update_status();
                view
            })
            .collect();
    }

    /// Pull current states from the hub into the room views.
    ///
    /// Returns the ids of lights whose on/off state or brightness changed.
    pub async fn sync(&mut self) -> Result<Vec<String>> {
        let states = self.hub.states().await?;
        Ok(self.apply_states(&states))
    }

    /// Apply states fetched from the hub; see [`Dashboard::sync`]
    pub fn apply_states(&mut self, states: &[EntityState]) -> Vec<String> {
        for state in states {
            self.mapper.update_from_state(state);
        }

        let mut changed = Vec::new();
        for room in &mut self.rooms {
            for light in &mut room.lights {
                let Some(state) = states.iter().find(|s| s.entity_id == light.id) else {
                    continue;
                };
                let before = light.clone();

                light.is_on = state.is_on();
                // Only real lights report brightness; helpers keep the local value
                if Domain::of(&light.id) == Some(Domain::Light) {
                    if let Some(raw) = state.brightness() {
                        light.brightness = brightness_pct(raw);
                    }
                }

                debug!(
                    "Synced {}: {} ({}%)",
                    light.id,
                    if light.is_on { "ON" } else { "OFF" },
                    light.brightness
                );
                if *light != before {
                    changed.push(light.id.clone());
                }
            }
            room.update_status();
        }
        changed
    }

    fn find_light(&self, entity_id: &str) -> Result<(usize, usize)> {
        self.rooms
            .iter()
            .enumerate()
            .find_map(|(r, room)| {
                room.lights
                    .iter()
                    .position(|l| l.id == entity_id)
                    .map(|l| (r, l))
            })
            .ok_or_else(|| DashboardError::UnknownLight(entity_id.to_string()))
    }

    fn room_index(&self, room_id: &str) -> Result<usize> {
        self.rooms
            .iter()
            .position(|r| r.id == room_id)
            .ok_or_else(|| DashboardError::UnknownRoom(room_id.to_string()))
    }

    /// Flip a light and push the change to the hub.
    ///
    /// The local state is restored if the hub call fails. Returns the new
    /// on/off state.
    pub async fn toggle_light(&mut self, entity_id: &str) -> Result<bool> {
        let (r, l) = self.find_light(entity_id)?;
        let light = &mut self.rooms[r].lights[l];
        light.is_on = !light.is_on;
        let (is_on, brightness) = (light.is_on, light.brightness);
        self.rooms[r].update_status();

        let result = if is_on {
            self.hub.turn_on(entity_id, Some(brightness)).await
        } else {
            self.hub.turn_off(entity_id).await
        };

        if let Err(e) = result {
            warn!("Failed to toggle {}: {}", entity_id, e);
            self.rooms[r].lights[l].is_on = !is_on;
            self.rooms[r].update_status();
            return Err(e.into());
        }
        self.mapper.record_light_state(entity_id, is_on, brightness);
        Ok(is_on)
    }

    /// Store a brightness; the hub is only told while the light is on.
    ///
    /// The previous brightness is restored if the hub call fails.
    pub async fn set_brightness(&mut self, entity_id: &str, pct: u8) -> Result<()> {
        let (r, l) = self.find_light(entity_id)?;
        let light = &mut self.rooms[r].lights[l];
        let previous = light.brightness;
        light.brightness = pct.min(100);
        let (is_on, brightness) = (light.is_on, light.brightness);

        if is_on {
            if let Err(e) = self.hub.set_brightness(entity_id, brightness).await {
                warn!("Failed to set brightness of {}: {}", entity_id, e);
                self.rooms[r].lights[l].brightness = previous;
                return Err(e.into());
            }
        }
        self.mapper.record_light_state(entity_id, is_on, brightness);
        Ok(())
    }

    /// Everything off if every light is on, otherwise everything on.
    ///
    /// Returns the new state.
    pub async fn toggle_all_lights(&mut self, room_id: &str) -> Result<bool> {
        let r = self.room_index(room_id)?;
        let turn_on = !self.rooms[r].lights.iter().all(|l| l.is_on);
        for light in &mut self.rooms[r].lights {
            light.is_on = turn_on;
        }
        self.rooms[r].update_status();

        self.push_room(r).await;
        Ok(turn_on)
    }

    pub async fn apply_scene(&mut self, room_id: &str, scene: Scene) -> Result<()> {
        let r = self.room_index(room_id)?;
        for light in &mut self.rooms[r].lights {
            match scene {
                Scene::Evening => {
                    light.is_on = true;
                    light.brightness = 60;
                }
                Scene::Night => {
                    if light.name.contains("Accent") || light.name.contains("Bedside") {
                        light.is_on = true;
                        light.brightness = 15;
                    } else {
                        light.is_on = false;
                    }
                }
                Scene::AllOff => light.is_on = false,
            }
        }
        self.rooms[r].update_status();

        info!("Applied scene {} to {}", scene, room_id);
        self.push_room(r).await;
        Ok(())
    }

    /// Send every light's local state in a room to the hub. Failures are
    /// logged and don't stop the remaining calls.
    async fn push_room(&mut self, r: usize) {
        for light in &self.rooms[r].lights {
            self.mapper
                .record_light_state(&light.id, light.is_on, light.brightness);
            let result = if light.is_on {
                self.hub.turn_on(&light.id, Some(light.brightness)).await
            } else {
                self.hub.turn_off(&light.id).await
            };
            if let Err(e) = result {
                warn!("Failed to update {}: {}", light.id, e);
            }
        }
    }

    pub fn active_lights_count(&self) -> usize {
        self.rooms
            .iter()
            .flat_map(|r| &r.lights)
            .filter(|l| l.is_on)
            .count()
    }

    /// Estimated household draw in kW
    pub fn total_energy_kw(&self) -> f64 {
        self.active_lights_count() as f64 * LIGHT_LOAD_KW + BASE_LOAD_KW
    }

    pub fn room_energy_watts(&self, room_id: &str) -> Option<f64> {
        self.room(room_id).map(RoomView::energy_watts)
    }

    pub fn systems(&self) -> Vec<System> {
        detect_systems(self.mapper.entities())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MockHub;
    use crate::storage::MemoryStorage;
    use crate::storage::Storage;

    fn house() -> Vec<EntityState> {
        vec![
            EntityState::new("light.bedroom_master_ceiling", "on")
                .with_attribute("friendly_name", "Master Ceiling")
                .with_attribute("brightness", 255),
            EntityState::new("light.bedroom_master_bedside", "off")
                .with_attribute("friendly_name", "Master Bedside")
                .with_attribute("brightness", 51),
            EntityState::new("input_boolean.bedroom_master_fan", "off")
                .with_attribute("friendly_name", "Master Fan Helper"),
            EntityState::new("binary_sensor.bedroom_master_window", "off")
                .with_attribute("friendly_name", "Master Window"),
            EntityState::new("light.porch", "on"),
        ]
    }

    async fn dashboard(hub: Arc<MockHub>) -> Dashboard {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mapper = EntityMapper::load(storage).unwrap();
        let mut dashboard = Dashboard::new(hub, mapper);
        dashboard.refresh().await.unwrap();

        let mapper = dashboard.mapper_mut();
        mapper.add_room("Master Bedroom", "🛏️").unwrap();
        for id in [
            "light.bedroom_master_ceiling",
            "light.bedroom_master_bedside",
            "input_boolean.bedroom_master_fan",
            "binary_sensor.bedroom_master_window",
        ] {
            mapper.map_entity_to_room(id, "master-bedroom").unwrap();
        }
        dashboard.rebuild();
        dashboard
    }

    #[tokio::test]
    async fn test_rooms_built_from_mapping() {
        let hub = Arc::new(MockHub::new(house()));
        let dashboard = dashboard(hub).await;

        let room = dashboard.room("master-bedroom").unwrap();
        assert_eq!(room.icon, "🛏️");
        assert!(room.has_active_devices);
        // The window sensor is mapped but isn't a switchable light
        let ids: Vec<&str> = room.lights.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "light.bedroom_master_ceiling",
                "light.bedroom_master_bedside",
                "input_boolean.bedroom_master_fan"
            ]
        );
        assert_eq!(room.lights[0].brightness, 100);
        assert_eq!(room.lights[1].brightness, 20);
        assert_eq!(room.lights[2].brightness, 100);

        assert_eq!(dashboard.active_lights_count(), 1);
        assert!((dashboard.total_energy_kw() - 2.46).abs() < 1e-9);
        let watts = dashboard.room_energy_watts("master-bedroom").unwrap();
        assert!((watts - 80.0).abs() < 1e-9);
        assert_eq!(dashboard.room_energy_watts("attic"), None);
    }

    #[tokio::test]
    async fn test_sync_updates_lights() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.set_states(vec![
            EntityState::new("light.bedroom_master_ceiling", "off").with_attribute("brightness", 128),
            EntityState::new("light.bedroom_master_bedside", "off").with_attribute("brightness", 51),
            EntityState::new("input_boolean.bedroom_master_fan", "on")
                .with_attribute("brightness", 10),
        ]);
        let changed = dashboard.sync().await.unwrap();
        assert_eq!(
            changed,
            ["light.bedroom_master_ceiling", "input_boolean.bedroom_master_fan"]
        );

        let room = dashboard.room("master-bedroom").unwrap();
        assert!(!room.lights[0].is_on);
        assert_eq!(room.lights[0].brightness, 50);
        // Helpers keep their local brightness
        assert!(room.lights[2].is_on);
        assert_eq!(room.lights[2].brightness, 100);
        assert!(room.has_active_devices);
    }

    #[tokio::test]
    async fn test_sync_failure_is_an_error() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.fail_requests(true);
        assert!(matches!(
            dashboard.sync().await,
            Err(DashboardError::Hub(HubError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_toggle_light_calls_hub_with_brightness() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        let on = dashboard
            .toggle_light("light.bedroom_master_bedside")
            .await
            .unwrap();
        assert!(on);

        let calls = hub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "light");
        assert_eq!(calls[0].1, "turn_on");
        assert_eq!(calls[0].2.brightness_pct, Some(20));
        assert_eq!(dashboard.active_lights_count(), 2);
    }

    #[tokio::test]
    async fn test_toggle_light_reverts_on_hub_failure() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.fail_requests(true);
        let err = dashboard
            .toggle_light("light.bedroom_master_ceiling")
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Hub(_)));

        let room = dashboard.room("master-bedroom").unwrap();
        assert!(room.lights[0].is_on);
        assert!(room.has_active_devices);
    }

    #[tokio::test]
    async fn test_toggle_unknown_light() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub).await;

        // Discovered but not mapped to a room
        assert!(matches!(
            dashboard.toggle_light("light.porch").await,
            Err(DashboardError::UnknownLight(_))
        ));
    }

    #[tokio::test]
    async fn test_set_brightness_only_calls_hub_when_on() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        dashboard
            .set_brightness("light.bedroom_master_bedside", 70)
            .await
            .unwrap();
        assert!(hub.calls().is_empty());
        assert_eq!(dashboard.room("master-bedroom").unwrap().lights[1].brightness, 70);

        dashboard
            .set_brightness("light.bedroom_master_ceiling", 40)
            .await
            .unwrap();
        let calls = hub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2.entity_id, "light.bedroom_master_ceiling");
        assert_eq!(calls[0].2.brightness_pct, Some(40));
    }

    #[tokio::test]
    async fn test_set_brightness_reverts_on_hub_failure() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.fail_requests(true);
        assert!(matches!(
            dashboard
                .set_brightness("light.bedroom_master_ceiling", 40)
                .await,
            Err(DashboardError::Hub(_))
        ));
        assert_eq!(dashboard.room("master-bedroom").unwrap().lights[0].brightness, 100);
    }

    #[tokio::test]
    async fn test_local_changes_survive_rebuild() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub).await;

        dashboard
            .toggle_light("light.bedroom_master_bedside")
            .await
            .unwrap();
        dashboard
            .set_brightness("light.bedroom_master_ceiling", 40)
            .await
            .unwrap();

        dashboard.mapper_mut().add_room("Den", "").unwrap();
        dashboard.rebuild();

        let room = dashboard.room("master-bedroom").unwrap();
        assert!(room.lights[0].is_on);
        assert_eq!(room.lights[0].brightness, 40);
        assert!(room.lights[1].is_on);
        assert_eq!(room.lights[1].brightness, 20);

        dashboard
            .apply_scene("master-bedroom", Scene::Evening)
            .await
            .unwrap();
        dashboard.rebuild();
        let room = dashboard.room("master-bedroom").unwrap();
        assert!(room.lights.iter().all(|l| l.is_on && l.brightness == 60));
    }

    #[tokio::test]
    async fn test_sync_updates_discovered_entities() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.set_states(vec![
            EntityState::new("light.bedroom_master_ceiling", "off"),
            EntityState::new("binary_sensor.bedroom_master_window", "on"),
        ]);
        dashboard.sync().await.unwrap();

        let systems = dashboard.systems();
        assert_eq!(systems[0].sensors[0].status, "triggered");

        dashboard.rebuild();
        assert!(!dashboard.room("master-bedroom").unwrap().lights[0].is_on);
    }

    #[tokio::test]
    async fn test_apply_states_without_hub() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        // States fetched earlier are applied even while the hub is down
        hub.fail_requests(true);
        let changed = dashboard.apply_states(&[
            EntityState::new("light.bedroom_master_bedside", "on").with_attribute("brightness", 51),
            EntityState::new("light.bedroom_master_ceiling", "on").with_attribute("brightness", 255),
        ]);
        assert_eq!(changed, ["light.bedroom_master_bedside"]);
        assert_eq!(dashboard.active_lights_count(), 2);
    }

    #[tokio::test]
    async fn test_toggle_all_lights() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        // Not all on, so everything goes on
        assert!(dashboard.toggle_all_lights("master-bedroom").await.unwrap());
        assert_eq!(dashboard.active_lights_count(), 3);
        assert!(hub.calls().iter().all(|(_, service, _)| service == "turn_on"));

        assert!(!dashboard.toggle_all_lights("master-bedroom").await.unwrap());
        assert_eq!(dashboard.active_lights_count(), 0);
        assert!(!dashboard.room("master-bedroom").unwrap().has_active_devices);
    }

    #[tokio::test]
    async fn test_bulk_changes_survive_hub_failure() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        hub.fail_requests(true);
        dashboard
            .apply_scene("master-bedroom", Scene::AllOff)
            .await
            .unwrap();
        assert_eq!(dashboard.active_lights_count(), 0);
    }

    #[tokio::test]
    async fn test_scenes() {
        let hub = Arc::new(MockHub::new(house()));
        let mut dashboard = dashboard(hub.clone()).await;

        dashboard
            .apply_scene("master-bedroom", Scene::Evening)
            .await
            .unwrap();
        let room = dashboard.room("master-bedroom").unwrap();
        assert!(room.lights.iter().all(|l| l.is_on && l.brightness == 60));

        dashboard
            .apply_scene("master-bedroom", Scene::Night)
            .await
            .unwrap();
        let room = dashboard.room("master-bedroom").unwrap();
        let on: Vec<&str> = room
            .lights
            .iter()
            .filter(|l| l.is_on)
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(on, ["light.bedroom_master_bedside"]);
        assert_eq!(room.lights[1].brightness, 15);

        // Night pushed one turn_on at 15% and two turn_offs
        let night_calls = &hub.calls()[3..];
        assert_eq!(night_calls[1].1, "turn_on");
        assert_eq!(night_calls[1].2.brightness_pct, Some(15));
        assert_eq!(night_calls[0].1, "turn_off");

        assert!(matches!(
            dashboard.apply_scene("attic", Scene::Evening).await,
            Err(DashboardError::UnknownRoom(_))
        ));
    }

    #[test]
    fn test_scene_names() {
        assert_eq!("all-off".parse::<Scene>().unwrap(), Scene::AllOff);
        assert_eq!(Scene::Evening.to_string(), "evening");
    }

    #[tokio::test]
    async fn test_systems_from_discovered_entities() {
        let hub = Arc::new(MockHub::new(house()));
        let dashboard = dashboard(hub).await;

        let systems = dashboard.systems();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].id, "security");
        assert_eq!(systems[0].sensors[0].location, "master window");
    }

    #[tokio::test]
    async fn test_refresh_keeps_only_selected_entities() {
        let hub = Arc::new(MockHub::new(house()));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut mapper = EntityMapper::load(storage).unwrap();
        let porch =
            DiscoveredEntity::from_state(&EntityState::new("light.porch", "off")).unwrap();
        mapper.set_selected_entities(vec![porch]).unwrap();

        let mut dashboard = Dashboard::new(hub, mapper);
        dashboard.refresh().await.unwrap();

        assert_eq!(dashboard.mapper().entities().len(), 1);
        assert!(dashboard.mapper().entities()[0].is_on());
    }
}
