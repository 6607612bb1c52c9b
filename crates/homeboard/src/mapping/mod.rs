//! User-defined rooms and the assignment of entities to them.
//!
//! [`EntityMapper`] owns the discovered entities and room definitions. Every
//! mutation writes both the room definitions and the `{room_id: [entity_id]}`
//! mapping to storage.

mod transfer;

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
pub use transfer::export_file_name;
pub use transfer::ExportDocument;
pub use transfer::RoomsExport;
pub use transfer::SUPPORTED_VERSION;

use crate::entity::pct_to_raw;
use crate::entity::DiscoveredEntity;
use crate::entity::Domain;
use crate::entity::EntityState;
use crate::icons::generate_room_icon;
use crate::storage::load_json;
use crate::storage::save_json;
use crate::storage::Storage;
use crate::storage::StorageError;
use crate::storage::MAPPINGS_KEY;
use crate::storage::ROOMS_KEY;
use crate::storage::SELECTED_ENTITIES_KEY;

/// `{room_id: [entity_id]}`
pub type Mappings = BTreeMap<String, Vec<String>>;

/// Rooms offered by [`EntityMapper::add_preset_rooms`]
const PRESET_ROOMS: &[(&str, &str)] = &[
    ("Living Room", "🛋️"),
    ("Master Bedroom", "🛏️"),
    ("Guest Bedroom", "🛌"),
    ("Kitchen", "🍳"),
    ("Bathroom", "🚿"),
    ("Office", "💼"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMapping {
    pub id: String,
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub entities: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("room name must not be empty")]
    EmptyRoomName,

    #[error("room '{0}' already exists")]
    DuplicateRoom(String),

    #[error("no room with id '{0}'")]
    RoomNotFound(String),

    #[error("no discovered entity '{0}'")]
    EntityNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidImport(String),

    #[error("configuration version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u64 },

    #[error("failed to encode export: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, MappingError>;

/// Room id for a display name: lowercased, whitespace runs become `-`
pub fn room_id_from_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub struct EntityMapper {
    storage: Arc<dyn Storage>,
    rooms: Vec<RoomMapping>,
    entities: Vec<DiscoveredEntity>,
}

impl EntityMapper {
    /// Restore room definitions and the saved entity selection
    pub fn load(storage: Arc<dyn Storage>) -> Result<Self> {
        let rooms: Vec<RoomMapping> = load_json(storage.as_ref(), ROOMS_KEY)?.unwrap_or_default();
        let entities: Vec<DiscoveredEntity> =
            load_json(storage.as_ref(), SELECTED_ENTITIES_KEY)?.unwrap_or_default();
        debug!(
            "Loaded {} rooms and {} selected entities",
            rooms.len(),
            entities.len()
        );

        let mut mapper = Self {
            storage,
            rooms,
            entities: Vec::new(),
        };
        mapper.set_discovered(entities)?;
        Ok(mapper)
    }

    pub fn rooms(&self) -> &[RoomMapping] {
        &self.rooms
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomMapping> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn entities(&self) -> &[DiscoveredEntity] {
        &self.entities
    }

    pub fn entity(&self, entity_id: &str) -> Option<&DiscoveredEntity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    /// Replace the discovered entities and apply the saved mappings
    pub fn set_discovered(&mut self, entities: Vec<DiscoveredEntity>) -> Result<()> {
        self.entities = entities;
        self.apply_mappings()
    }

    fn apply_mappings(&mut self) -> Result<()> {
        let saved: Mappings = match load_json(self.storage.as_ref(), MAPPINGS_KEY)? {
            Some(mappings) => mappings,
            None => self.mappings(),
        };
        self.assign_entities(&saved);
        Ok(())
    }

    /// Assign each entity to the first room (in room order) listing it
    fn assign_entities(&mut self, mappings: &Mappings) {
        for entity in &mut self.entities {
            let room = self.rooms.iter().find(|room| {
                mappings
                    .get(&room.id)
                    .is_some_and(|ids| ids.contains(&entity.entity_id))
            });
            match room {
                Some(room) => entity.assign(&room.id),
                None => entity.unassign(),
            }
        }
    }

    /// The current `{room_id: [entity_id]}` mapping
    pub fn mappings(&self) -> Mappings {
        mappings_of(&self.rooms)
    }

    /// Save `rooms`, then make them current. In-memory state is untouched if
    /// saving fails.
    fn commit(&mut self, rooms: Vec<RoomMapping>) -> Result<()> {
        let mappings = mappings_of(&rooms);
        save_json(self.storage.as_ref(), MAPPINGS_KEY, &mappings)?;
        save_json(self.storage.as_ref(), ROOMS_KEY, &rooms)?;
        self.rooms = rooms;
        self.assign_entities(&mappings);
        Ok(())
    }

    /// Record a state reported by the hub for a known entity.
    ///
    /// Only lights carry brightness from the hub; other domains keep the
    /// locally recorded value.
    pub fn update_from_state(&mut self, state: &EntityState) {
        let Some(entity) = self
            .entities
            .iter_mut()
            .find(|e| e.entity_id == state.entity_id)
        else {
            return;
        };
        entity.state = state.state.clone();
        if entity.domain == Domain::Light {
            if let Some(raw) = state.brightness() {
                entity.attributes.insert("brightness".to_string(), raw.into());
            }
        }
    }

    /// Record an on/off state and brightness changed locally
    pub fn record_light_state(&mut self, entity_id: &str, is_on: bool, brightness_pct: u8) {
        if let Some(entity) = self.entities.iter_mut().find(|e| e.entity_id == entity_id) {
            entity.state = if is_on { "on" } else { "off" }.to_string();
            entity
                .attributes
                .insert("brightness".to_string(), pct_to_raw(brightness_pct).into());
        }
    }

    /// Create a room and return its id.
    ///
    /// A blank icon is picked from keywords in the name.
    pub fn add_room(&mut self, name: &str, icon: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingError::EmptyRoomName);
        }

        let id = room_id_from_name(name);
        if self.room(&id).is_some() {
            return Err(MappingError::DuplicateRoom(id));
        }

        let icon = match icon.trim() {
            "" => generate_room_icon(name).to_string(),
            icon => icon.to_string(),
        };
        let mut rooms = self.rooms.clone();
        rooms.push(RoomMapping {
            id: id.clone(),
            name: name.to_string(),
            icon,
            entities: Vec::new(),
        });
        self.commit(rooms)?;

        info!("Added room {}", id);
        Ok(id)
    }

    /// Rename a room and change its icon; the id stays the same
    pub fn update_room(&mut self, room_id: &str, name: &str, icon: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingError::EmptyRoomName);
        }

        let mut rooms = self.rooms.clone();
        let room = rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| MappingError::RoomNotFound(room_id.to_string()))?;
        room.name = name.to_string();
        room.icon = match icon.trim() {
            "" => generate_room_icon(name).to_string(),
            icon => icon.to_string(),
        };
        self.commit(rooms)?;

        info!("Updated room {}", room_id);
        Ok(())
    }

    pub fn delete_room(&mut self, room_id: &str) -> Result<()> {
        let mut rooms = self.rooms.clone();
        rooms.retain(|r| r.id != room_id);
        if rooms.len() == self.rooms.len() {
            return Err(MappingError::RoomNotFound(room_id.to_string()));
        }
        self.commit(rooms)?;

        info!("Deleted room {}", room_id);
        Ok(())
    }

    /// Assign an entity to a room, moving it out of any other room
    pub fn map_entity_to_room(&mut self, entity_id: &str, room_id: &str) -> Result<()> {
        if self.room(room_id).is_none() {
            return Err(MappingError::RoomNotFound(room_id.to_string()));
        }
        if self.entity(entity_id).is_none() {
            return Err(MappingError::EntityNotFound(entity_id.to_string()));
        }

        let mut rooms = self.rooms.clone();
        for room in &mut rooms {
            if room.id == room_id {
                if !room.entities.iter().any(|id| id == entity_id) {
                    room.entities.push(entity_id.to_string());
                }
            } else {
                room.entities.retain(|id| id != entity_id);
            }
        }
        self.commit(rooms)?;

        debug!("Mapped {} to {}", entity_id, room_id);
        Ok(())
    }

    /// Clear an entity's room. Returns whether anything changed.
    pub fn unmap_entity(&mut self, entity_id: &str) -> Result<bool> {
        let mut changed = self.entity(entity_id).is_some_and(|e| e.mapped);
        let mut rooms = self.rooms.clone();
        for room in &mut rooms {
            let before = room.entities.len();
            room.entities.retain(|id| id != entity_id);
            changed |= room.entities.len() != before;
        }
        self.commit(rooms)?;

        if changed {
            debug!("Unmapped {}", entity_id);
        }
        Ok(changed)
    }

    /// Drop every room and mapping
    pub fn clear_all(&mut self) -> Result<()> {
        self.storage.remove(MAPPINGS_KEY)?;
        self.storage.remove(ROOMS_KEY)?;
        self.rooms.clear();
        for entity in &mut self.entities {
            entity.unassign();
        }
        info!("Cleared all room mappings and definitions");
        Ok(())
    }

    pub fn entities_for_room(&self, room_id: &str) -> Vec<&DiscoveredEntity> {
        self.entities
            .iter()
            .filter(|e| e.room.as_deref() == Some(room_id))
            .collect()
    }

    pub fn unmapped_entities(&self) -> Vec<&DiscoveredEntity> {
        self.entities.iter().filter(|e| !e.mapped).collect()
    }

    /// Replace the discovered entities with a user selection and persist it
    pub fn set_selected_entities(&mut self, selected: Vec<DiscoveredEntity>) -> Result<()> {
        save_json(self.storage.as_ref(), SELECTED_ENTITIES_KEY, &selected)?;
        info!("Applied selected entities: {} devices", selected.len());
        self.set_discovered(selected)
    }

    pub fn selected_entities(&self) -> Result<Vec<DiscoveredEntity>> {
        Ok(load_json(self.storage.as_ref(), SELECTED_ENTITIES_KEY)?.unwrap_or_default())
    }

    /// Add the preset rooms whose names aren't taken yet.
    ///
    /// Returns how many were added.
    pub fn add_preset_rooms(&mut self) -> Result<usize> {
        let mut added = 0;
        for (name, icon) in PRESET_ROOMS {
            let exists = self
                .rooms
                .iter()
                .any(|r| r.name.to_lowercase() == name.to_lowercase());
            if exists {
                continue;
            }
            match self.add_room(name, icon) {
                Ok(_) => added += 1,
                Err(MappingError::DuplicateRoom(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Replace rooms and mappings wholesale, keeping one room per entity
    fn replace_rooms(&mut self, mut rooms: Vec<RoomMapping>) -> Result<()> {
        let mut claimed = HashSet::new();
        for room in &mut rooms {
            room.entities.retain(|id| claimed.insert(id.clone()));
        }
        self.commit(rooms)
    }
}

fn mappings_of(rooms: &[RoomMapping]) -> Mappings {
    rooms
        .iter()
        .map(|r| (r.id.clone(), r.entities.clone()))
        .collect()
}
