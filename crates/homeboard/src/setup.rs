//! First-run setup: who is using the dashboard, which theme, which devices and
//! which rooms.

use std::collections::BTreeSet;

use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumIter;
use tracing::info;

use crate::discovery::device_categories;
use crate::discovery::DeviceCategory;
use crate::entity::DiscoveredEntity;
use crate::entity::Domain;
use crate::entity::EntityState;
use crate::icons::generate_room_icon;
use crate::mapping::EntityMapper;
use crate::mapping::MappingError;
use crate::storage::load_json;
use crate::storage::save_json;
use crate::storage::Storage;
use crate::storage::StorageError;
use crate::storage::SETUP_KEY;
use crate::theme::theme_by_id;
use crate::theme::ThemeError;
use crate::theme::ThemeStore;

const SUGGESTED_ROOMS: &[(&str, &str)] = &[
    ("Living Room", "🛋️"),
    ("Kitchen", "🍳"),
    ("Bedroom", "🛏️"),
    ("Bathroom", "🚿"),
    ("Office", "💻"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SetupStep {
    Welcome,
    Theme,
    Discovery,
    Rooms,
    Complete,
}

impl SetupStep {
    pub fn title(self) -> &'static str {
        match self {
            SetupStep::Welcome => "Welcome to Your Smart Home",
            SetupStep::Theme => "Choose Your Style",
            SetupStep::Discovery => "Discovering Your Devices",
            SetupStep::Rooms => "Organize by Rooms",
            SetupStep::Complete => "Setup Complete!",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            SetupStep::Welcome | SetupStep::Rooms => "🏠",
            SetupStep::Theme => "🎨",
            SetupStep::Discovery => "🔍",
            SetupStep::Complete => "🎉",
        }
    }

    fn next(self) -> Self {
        match self {
            SetupStep::Welcome => SetupStep::Theme,
            SetupStep::Theme => SetupStep::Discovery,
            SetupStep::Discovery => SetupStep::Rooms,
            SetupStep::Rooms | SetupStep::Complete => SetupStep::Complete,
        }
    }

    fn previous(self) -> Self {
        match self {
            SetupStep::Welcome | SetupStep::Theme => SetupStep::Welcome,
            SetupStep::Discovery => SetupStep::Theme,
            SetupStep::Rooms => SetupStep::Discovery,
            SetupStep::Complete => SetupStep::Rooms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRoom {
    pub name: String,
    pub icon: String,
    pub suggested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRoomRecord {
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub devices: Vec<String>,
}

/// What the wizard saves under `smartHomeSetup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRecord {
    pub selected_person: Option<String>,
    pub selected_person_name: String,
    pub selected_theme: String,
    pub selected_device_count: usize,
    pub rooms: Vec<SetupRoomRecord>,
    /// RFC 3339
    pub setup_completed: String,
}

impl SetupRecord {
    pub fn load(storage: &dyn Storage) -> Result<Option<Self>> {
        Ok(load_json(storage, SETUP_KEY)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("select who you are before continuing")]
    PersonRequired,

    #[error("select at least one device before continuing")]
    DeviceRequired,

    #[error("unknown person '{0}'")]
    UnknownPerson(String),

    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("unknown theme '{0}'")]
    UnknownTheme(String),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, SetupError>;

/// `friendly_name`, else the object id with underscores as spaces
pub fn person_display_name(person: &EntityState) -> String {
    person.friendly_name()
}

pub struct SetupWizard {
    step: SetupStep,
    persons: Vec<EntityState>,
    entities: Vec<DiscoveredEntity>,
    selected_person: Option<String>,
    theme: String,
    selected_devices: BTreeSet<String>,
    custom_rooms: Vec<SetupRoom>,
}

impl SetupWizard {
    pub fn new(persons: Vec<EntityState>, entities: Vec<DiscoveredEntity>, theme: &str) -> Self {
        Self {
            step: SetupStep::Welcome,
            persons,
            entities,
            selected_person: None,
            theme: theme.to_string(),
            selected_devices: BTreeSet::new(),
            custom_rooms: Vec::new(),
        }
    }

    pub fn step(&self) -> SetupStep {
        self.step
    }

    pub fn persons(&self) -> &[EntityState] {
        &self.persons
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn select_person(&mut self, entity_id: &str) -> Result<()> {
        if !self.persons.iter().any(|p| p.entity_id == entity_id) {
            return Err(SetupError::UnknownPerson(entity_id.to_string()));
        }
        self.selected_person = Some(entity_id.to_string());
        Ok(())
    }

    pub fn selected_person_name(&self) -> String {
        self.selected_person
            .as_deref()
            .and_then(|id| self.persons.iter().find(|p| p.entity_id == id))
            .map(person_display_name)
            .unwrap_or_default()
    }

    pub fn select_theme(&mut self, theme_id: &str) -> Result<()> {
        if theme_by_id(theme_id).is_none() {
            return Err(SetupError::UnknownTheme(theme_id.to_string()));
        }
        self.theme = theme_id.to_string();
        Ok(())
    }

    fn check(&self, step: SetupStep) -> Result<()> {
        match step {
            SetupStep::Welcome if !self.persons.is_empty() && self.selected_person.is_none() => {
                Err(SetupError::PersonRequired)
            }
            SetupStep::Discovery if !self.entities.is_empty() && self.selected_devices.is_empty() => {
                Err(SetupError::DeviceRequired)
            }
            _ => Ok(()),
        }
    }

    pub fn can_proceed(&self) -> bool {
        self.check(self.step).is_ok()
    }

    /// Validate the current step and advance. Leaving the theme step applies
    /// the chosen theme.
    pub fn next_step(&mut self, themes: &mut ThemeStore) -> Result<SetupStep> {
        self.check(self.step)?;
        if self.step == SetupStep::Theme {
            themes.set_theme(&self.theme)?;
        }
        self.step = self.step.next();
        Ok(self.step)
    }

    pub fn previous_step(&mut self) -> SetupStep {
        self.step = self.step.previous();
        self.step
    }

    pub fn categories(&self) -> Vec<DeviceCategory> {
        device_categories(&self.entities)
    }

    /// Flip a device's selection; returns whether it is now selected
    pub fn toggle_device(&mut self, entity_id: &str) -> Result<bool> {
        if !self.entities.iter().any(|e| e.entity_id == entity_id) {
            return Err(SetupError::UnknownDevice(entity_id.to_string()));
        }
        if self.selected_devices.remove(entity_id) {
            Ok(false)
        } else {
            self.selected_devices.insert(entity_id.to_string());
            Ok(true)
        }
    }

    pub fn select_all_in_category(&mut self, domain: Domain) {
        for entity in self.entities.iter().filter(|e| e.domain == domain) {
            self.selected_devices.insert(entity.entity_id.clone());
        }
    }

    pub fn deselect_all_in_category(&mut self, domain: Domain) {
        for entity in self.entities.iter().filter(|e| e.domain == domain) {
            self.selected_devices.remove(&entity.entity_id);
        }
    }

    pub fn is_selected(&self, entity_id: &str) -> bool {
        self.selected_devices.contains(entity_id)
    }

    pub fn selected_device_count(&self) -> usize {
        self.selected_devices.len()
    }

    /// Suggested rooms followed by custom ones
    pub fn rooms(&self) -> Vec<SetupRoom> {
        SUGGESTED_ROOMS
            .iter()
            .map(|(name, icon)| SetupRoom {
                name: name.to_string(),
                icon: icon.to_string(),
                suggested: true,
            })
            .chain(self.custom_rooms.iter().cloned())
            .collect()
    }

    /// Add a custom room; empty or already-present names are ignored.
    ///
    /// Returns whether the room was added.
    pub fn add_custom_room(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let lower = name.to_lowercase();
        if self.rooms().iter().any(|r| r.name.to_lowercase() == lower) {
            return false;
        }
        self.custom_rooms.push(SetupRoom {
            name: name.to_string(),
            icon: generate_room_icon(name).to_string(),
            suggested: false,
        });
        true
    }

    /// Remove a custom room. Suggested rooms stay.
    pub fn remove_room(&mut self, name: &str) -> bool {
        let before = self.custom_rooms.len();
        self.custom_rooms.retain(|r| r.name != name);
        self.custom_rooms.len() != before
    }

    /// Apply the theme, hand the selected devices to the mapper and save the
    /// setup record.
    pub fn finish(
        &self,
        themes: &mut ThemeStore,
        mapper: &mut EntityMapper,
        storage: &dyn Storage,
    ) -> Result<SetupRecord> {
        self.check(SetupStep::Welcome)?;
        self.check(SetupStep::Discovery)?;

        themes.set_theme(&self.theme)?;

        let selected: Vec<DiscoveredEntity> = self
            .entities
            .iter()
            .filter(|e| self.selected_devices.contains(&e.entity_id))
            .cloned()
            .collect();
        mapper.set_selected_entities(selected)?;

        let record = SetupRecord {
            selected_person: self.selected_person.clone(),
            selected_person_name: self.selected_person_name(),
            selected_theme: self.theme.clone(),
            selected_device_count: self.selected_devices.len(),
            rooms: self
                .rooms()
                .into_iter()
                .map(|r| SetupRoomRecord {
                    name: r.name,
                    icon: r.icon,
                    devices: Vec::new(),
                })
                .collect(),
            setup_completed: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        save_json(storage, SETUP_KEY, &record)?;

        info!(
            "Setup completed with {} devices and {} rooms",
            record.selected_device_count,
            record.rooms.len()
        );
        Ok(record)
    }
}
