use std::collections::HashSet;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use super::EntityMapper;
use super::MappingError;
use super::Mappings;
use super::Result;
use super::RoomMapping;

/// Newest export format this build reads and writes
pub const SUPPORTED_VERSION: u64 = 1;

/// Full mapping export: rooms plus the entity mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u64,
    pub rooms: Vec<RoomMapping>,
    pub mappings: Mappings,
    pub timestamp: String,
}

/// Room definitions only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomsExport {
    pub version: u64,
    pub rooms: Vec<RoomMapping>,
    pub timestamp: String,
}

/// Incoming document. Both sections are required; `version` is absent in
/// exports predating it.
#[derive(Deserialize)]
struct ImportDocument {
    #[serde(default)]
    version: Option<u64>,
    rooms: Option<Vec<RoomMapping>>,
    mappings: Option<Mappings>,
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Download name for a rooms export, e.g. `home-rooms-2024-05-01.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("home-rooms-{}.json", date.format("%Y-%m-%d"))
}

impl EntityMapper {
    pub fn export_document(&self, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument {
            version: SUPPORTED_VERSION,
            rooms: self.rooms.clone(),
            mappings: self.mappings(),
            timestamp: timestamp(now),
        }
    }

    /// Pretty JSON of rooms and mappings, stamped with the current time
    pub fn export_configuration(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.export_document(Utc::now())).map_err(MappingError::Encode)
    }

    pub fn export_rooms(&self) -> Result<String> {
        let export = RoomsExport {
            version: SUPPORTED_VERSION,
            rooms: self.rooms.clone(),
            timestamp: timestamp(Utc::now()),
        };
        serde_json::to_string_pretty(&export).map_err(MappingError::Encode)
    }

    /// Replace rooms and mappings from an exported document.
    ///
    /// A room's entity list is taken from `mappings[room.id]` when present.
    /// Nothing changes if the document is rejected.
    pub fn import_configuration(&mut self, json: &str) -> Result<usize> {
        let doc: ImportDocument =
            serde_json::from_str(json).map_err(|e| MappingError::InvalidImport(e.to_string()))?;

        if let Some(found) = doc.version {
            if found > SUPPORTED_VERSION {
                return Err(MappingError::UnsupportedVersion {
                    found,
                    supported: SUPPORTED_VERSION,
                });
            }
        }
        let (Some(mut rooms), Some(mut mappings)) = (doc.rooms, doc.mappings) else {
            return Err(MappingError::InvalidImport(
                "both 'rooms' and 'mappings' are required".to_string(),
            ));
        };

        let mut seen = HashSet::new();
        for room in &rooms {
            if room.id.trim().is_empty() {
                return Err(MappingError::InvalidImport(format!(
                    "room '{}' has an empty id",
                    room.name
                )));
            }
            if !seen.insert(room.id.as_str()) {
                return Err(MappingError::InvalidImport(format!(
                    "duplicate room id '{}'",
                    room.id
                )));
            }
        }

        for room in &mut rooms {
            if let Some(entities) = mappings.remove(&room.id) {
                room.entities = entities;
            }
        }

        let count = rooms.len();
        self.replace_rooms(rooms)?;
        info!("Imported {} rooms", count);
        Ok(count)
    }
}
