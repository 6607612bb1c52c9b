//! Entity discovery: filter hub states down to devices and classify them.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::entity::DiscoveredEntity;
use crate::entity::Domain;
use crate::entity::EntityState;
use crate::icons::system_icon;

/// Room id for entities the naming convention can't place
pub const UNKNOWN_ROOM: &str = "unknown";

/// `input_boolean` entities whose id contains one of these act as lights
const LIGHT_LIKE_KEYWORDS: &[&str] = &["bedroom", "bathroom", "kitchen", "living", "family"];

/// Naming-convention room suggestions, first match wins
const ROOM_SUGGESTIONS: &[(&str, &str)] = &[
    ("bedroom_john", "bedroom-john"),
    ("bedroom_guest", "bedroom-guest"),
    ("bedroom_master", "bedroom-master"),
    ("bathroom_guest", "bathroom-guest"),
    ("bathroom_master", "bathroom-master"),
    ("living_room", "living-room"),
    ("family_room", "family-room"),
    ("kitchen", "kitchen"),
];

const SECURITY_KEYWORDS: &[&str] = &["door", "window", "motion", "sensor"];
const CLIMATE_KEYWORDS: &[&str] = &["climate", "thermostat", "temperature"];

/// Entities of one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCategory {
    pub domain: Domain,
    pub name: String,
    pub icon: String,
    pub count: usize,
    pub devices: Vec<DiscoveredEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySensor {
    pub id: String,
    pub name: String,
    pub location: String,
    pub status: String,
    pub icon: String,
}

/// A house-wide system derived from the discovered entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct System {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub active: bool,
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<SecuritySensor>,
}

/// Keep states from tracked domains, as unassigned device records
pub fn discover_entities(states: &[EntityState]) -> Vec<DiscoveredEntity> {
    states
        .iter()
        .filter_map(DiscoveredEntity::from_state)
        .collect()
}

/// Lights, plus the `input_boolean` helpers that stand in for lights
pub fn discover_lights(states: &[EntityState]) -> Vec<DiscoveredEntity> {
    states
        .iter()
        .filter(|s| is_light_like(&s.entity_id))
        .filter_map(DiscoveredEntity::from_state)
        .collect()
}

pub fn is_light_like(entity_id: &str) -> bool {
    match Domain::of(entity_id) {
        Some(Domain::Light) => true,
        Some(Domain::InputBoolean) => LIGHT_LIKE_KEYWORDS.iter().any(|k| entity_id.contains(k)),
        _ => false,
    }
}

pub fn suggest_room(entity_id: &str) -> &'static str {
    ROOM_SUGGESTIONS
        .iter()
        .find(|(pattern, _)| entity_id.contains(pattern))
        .map(|(_, room)| *room)
        .unwrap_or(UNKNOWN_ROOM)
}

pub fn suggest_room_groups(
    entities: &[DiscoveredEntity],
) -> BTreeMap<&'static str, Vec<&DiscoveredEntity>> {
    let mut groups: BTreeMap<&'static str, Vec<&DiscoveredEntity>> = BTreeMap::new();
    for entity in entities {
        groups
            .entry(suggest_room(&entity.entity_id))
            .or_default()
            .push(entity);
    }
    groups
}

/// Group by domain, largest categories first
pub fn device_categories(entities: &[DiscoveredEntity]) -> Vec<DeviceCategory> {
    let mut by_domain: BTreeMap<Domain, Vec<DiscoveredEntity>> = BTreeMap::new();
    for entity in entities {
        by_domain
            .entry(entity.domain)
            .or_default()
            .push(entity.clone());
    }

    let mut categories: Vec<DeviceCategory> = by_domain
        .into_iter()
        .map(|(domain, devices)| {
            let info = domain.category();
            DeviceCategory {
                domain,
                name: info.name,
                icon: info.icon,
                count: devices.len(),
                devices,
            }
        })
        .collect();

    categories.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.domain.as_ref().cmp(b.domain.as_ref()))
    });
    categories
}

/// Text listing of categories and their devices
pub fn render_categories(categories: &[DeviceCategory]) -> String {
    let mut out = String::new();
    for category in categories {
        writeln!(out, "{} {} ({})", category.icon, category.name, category.count).ok();
        for device in &category.devices {
            writeln!(
                out,
                "  {} | {} | {}",
                device.entity_id, device.friendly_name, device.state
            )
            .ok();
        }
    }
    out
}

pub fn persons(states: &[EntityState]) -> Vec<EntityState> {
    states
        .iter()
        .filter(|s| Domain::of(&s.entity_id) == Some(Domain::Person))
        .cloned()
        .collect()
}

pub fn detect_systems(entities: &[DiscoveredEntity]) -> Vec<System> {
    let mut systems = Vec::new();

    let sensors: Vec<SecuritySensor> = entities
        .iter()
        .filter(|e| contains_any(&e.entity_id, SECURITY_KEYWORDS))
        .map(|e| SecuritySensor {
            id: e.entity_id.clone(),
            name: e.friendly_name.clone(),
            location: location_of(&e.friendly_name),
            status: if e.is_on() { "triggered" } else { "normal" }.to_string(),
            icon: security_icon(&e.entity_id).to_string(),
        })
        .collect();
    if !sensors.is_empty() {
        systems.push(System {
            id: "security".to_string(),
            name: "Security System".to_string(),
            icon: system_icon("security").to_string(),
            active: true,
            status: "online".to_string(),
            description: "Home security monitoring with sensors".to_string(),
            sensors,
        });
    }

    if entities
        .iter()
        .any(|e| contains_any(&e.entity_id, CLIMATE_KEYWORDS))
    {
        systems.push(System {
            id: "climate".to_string(),
            name: "Climate Control".to_string(),
            icon: system_icon("climate").to_string(),
            active: true,
            status: "online".to_string(),
            description: "Temperature and climate control".to_string(),
            sensors: Vec::new(),
        });
    }

    systems
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// First two words of a friendly name, lowercased
fn location_of(friendly_name: &str) -> String {
    let lower = friendly_name.to_lowercase();
    let location = lower.split(' ').take(2).collect::<Vec<_>>().join(" ");
    if location.is_empty() {
        "Unknown".to_string()
    } else {
        location
    }
}

fn security_icon(entity_id: &str) -> &'static str {
    if entity_id.contains("door") {
        "🚪"
    } else if entity_id.contains("window") {
        "🪟"
    } else if entity_id.contains("motion") {
        "👁️"
    } else if entity_id.contains("sensor") {
        "📡"
    } else {
        "🔍"
    }
}
