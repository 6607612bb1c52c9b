//! Entity model shared by discovery, mapping and the dashboard.
//!
//! [`EntityState`] is what the hub reports on the wire; [`DiscoveredEntity`]
//! is the device record the rest of homeboard works with.

mod domain;

pub use domain::category_for;
pub use domain::CategoryInfo;
pub use domain::Domain;
use serde::Deserialize;
use serde::Serialize;

/// Attribute bag as reported by the hub
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A state object from `GET /api/states`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Attributes::new(),
            last_changed: None,
            last_updated: None,
        }
    }

    /// Builder-style attribute setter, mostly for fixtures
    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    pub fn friendly_name(&self) -> String {
        friendly_name(&self.entity_id, &self.attributes)
    }

    pub fn is_on(&self) -> bool {
        self.state == "on"
    }

    pub fn is_available(&self) -> bool {
        is_available(&self.state)
    }

    /// Raw 0-255 brightness, if the entity reports one
    pub fn brightness(&self) -> Option<u8> {
        raw_brightness(&self.attributes)
    }

    /// State with its unit, e.g. `"21.5 °C"`
    pub fn format_state(&self) -> String {
        let unit = self
            .attributes
            .get("unit_of_measurement")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        format!("{} {}", self.state, unit)
    }
}

/// A device record: a tracked entity plus its room assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEntity {
    pub entity_id: String,
    pub friendly_name: String,
    pub domain: Domain,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub mapped: bool,
}

impl DiscoveredEntity {
    /// Build a record from a hub state, if its domain is tracked
    pub fn from_state(state: &EntityState) -> Option<Self> {
        let domain = Domain::of(&state.entity_id)?;
        Some(Self {
            entity_id: state.entity_id.clone(),
            friendly_name: state.friendly_name(),
            domain,
            state: state.state.clone(),
            attributes: state.attributes.clone(),
            room: None,
            mapped: false,
        })
    }

    pub fn is_on(&self) -> bool {
        self.state == "on"
    }

    pub fn assign(&mut self, room_id: &str) {
        self.room = Some(room_id.to_string());
        self.mapped = true;
    }

    pub fn unassign(&mut self) {
        self.room = None;
        self.mapped = false;
    }

    /// Brightness in percent; entities without a brightness count as full
    pub fn brightness_pct(&self) -> u8 {
        raw_brightness(&self.attributes)
            .map(brightness_pct)
            .unwrap_or(100)
    }
}

/// Everything before the first `.`
pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or(entity_id)
}

/// Everything after the first `.`, or the whole id if there is none
pub fn object_id(entity_id: &str) -> &str {
    entity_id
        .split_once('.')
        .map(|(_, rest)| rest)
        .unwrap_or(entity_id)
}

/// The `friendly_name` attribute, or the object id with underscores as spaces
pub fn friendly_name(entity_id: &str, attributes: &Attributes) -> String {
    attributes
        .get("friendly_name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| object_id(entity_id).replace('_', " "))
}

pub fn is_available(state: &str) -> bool {
    state != "unavailable" && state != "unknown"
}

fn raw_brightness(attributes: &Attributes) -> Option<u8> {
    attributes
        .get("brightness")
        .and_then(|v| v.as_f64())
        .map(|b| b.clamp(0.0, 255.0).round() as u8)
}

/// Convert a raw 0-255 brightness to percent
pub fn brightness_pct(raw: u8) -> u8 {
    ((f64::from(raw) / 255.0) * 100.0).round() as u8
}

/// Convert a percentage (clamped to 0-100) to a raw 0-255 brightness
pub fn pct_to_raw(pct: u8) -> u8 {
    ((f64::from(pct.min(100)) / 100.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_state_deserializes() {
        let json = r#"{
            "entity_id": "light.kitchen_ceiling",
            "state": "on",
            "attributes": {"brightness": 128, "friendly_name": "Kitchen Ceiling"},
            "last_changed": "2024-05-01T10:00:00+00:00"
        }"#;
        let state: EntityState = serde_json::from_str(json).unwrap();

        assert_eq!(state.domain(), "light");
        assert!(state.is_on());
        assert_eq!(state.brightness(), Some(128));
        assert_eq!(state.friendly_name(), "Kitchen Ceiling");
        assert_eq!(state.last_updated, None);
    }

    #[test]
    fn test_friendly_name_fallback() {
        let state = EntityState::new("switch.garage_door_opener", "off");
        assert_eq!(state.friendly_name(), "garage door opener");
    }

    #[test]
    fn test_object_id_keeps_later_dots() {
        assert_eq!(object_id("sensor.outdoor.temp"), "outdoor.temp");
        assert_eq!(object_id("nodot"), "nodot");
        assert_eq!(domain_of("nodot"), "nodot");
    }

    #[test]
    fn test_availability_and_formatting() {
        let temp = EntityState::new("sensor.outdoor_temperature", "21.5")
            .with_attribute("unit_of_measurement", "°C");
        assert!(temp.is_available());
        assert_eq!(temp.format_state(), "21.5 °C");

        assert!(!EntityState::new("sensor.x", "unavailable").is_available());
        assert!(!is_available("unknown"));
    }

    #[test]
    fn test_brightness_conversions() {
        assert_eq!(brightness_pct(255), 100);
        assert_eq!(brightness_pct(51), 20);
        assert_eq!(brightness_pct(0), 0);
        assert_eq!(pct_to_raw(100), 255);
        assert_eq!(pct_to_raw(20), 51);
        assert_eq!(pct_to_raw(250), 255);
    }

    #[test]
    fn test_discovered_entity_from_state() {
        let state = EntityState::new("light.desk", "on").with_attribute("brightness", 51);
        let entity = DiscoveredEntity::from_state(&state).unwrap();

        assert_eq!(entity.domain, Domain::Light);
        assert_eq!(entity.friendly_name, "desk");
        assert_eq!(entity.brightness_pct(), 20);
        assert!(!entity.mapped);

        let untracked = EntityState::new("update.core", "off");
        assert!(DiscoveredEntity::from_state(&untracked).is_none());
    }

    #[test]
    fn test_missing_brightness_counts_as_full() {
        let entity =
            DiscoveredEntity::from_state(&EntityState::new("input_boolean.kitchen", "on")).unwrap();
        assert_eq!(entity.brightness_pct(), 100);
    }
}
