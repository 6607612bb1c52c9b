use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Entity domains the dashboard tracks.
///
/// Anything the hub reports outside this set is ignored during discovery.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Light,
    Switch,
    InputBoolean,
    Fan,
    Cover,
    Camera,
    Sensor,
    BinarySensor,
    Climate,
    Lock,
    MediaPlayer,
    AlarmControlPanel,
    DeviceTracker,
    Person,
    Automation,
    Script,
    Scene,
    InputSelect,
    InputNumber,
    InputText,
    InputDatetime,
    Timer,
    Counter,
    Vacuum,
    WaterHeater,
    Humidifier,
    AirQuality,
    Weather,
    Sun,
    Zone,
}

/// Human-facing grouping of a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub name: String,
    pub icon: String,
}

impl Domain {
    /// Parse the domain prefix of an entity id, if it is one we track
    pub fn of(entity_id: &str) -> Option<Domain> {
        super::domain_of(entity_id).parse().ok()
    }

    pub fn category(self) -> CategoryInfo {
        let (name, icon) = match self {
            Domain::Light => ("Lights", "💡"),
            Domain::Switch => ("Switches", "🔌"),
            Domain::InputBoolean => ("Input Booleans", "🎚️"),
            Domain::Sensor => ("Sensors", "📊"),
            Domain::BinarySensor => ("Binary Sensors", "🔘"),
            Domain::Climate => ("Climate Control", "🌡️"),
            Domain::Cover => ("Covers & Blinds", "🪟"),
            Domain::Fan => ("Fans", "🌀"),
            Domain::Lock => ("Locks", "🔒"),
            Domain::Camera => ("Cameras", "📹"),
            Domain::MediaPlayer => ("Media Players", "📺"),
            Domain::AlarmControlPanel => ("Alarm Systems", "🚨"),
            Domain::DeviceTracker => ("Device Trackers", "📍"),
            Domain::Person => ("Persons", "👤"),
            Domain::Automation => ("Automations", "⚙️"),
            Domain::Script => ("Scripts", "📜"),
            Domain::Scene => ("Scenes", "🎭"),
            Domain::InputSelect => ("Input Selects", "📋"),
            Domain::InputNumber => ("Input Numbers", "🔢"),
            Domain::InputText => ("Input Text", "📝"),
            Domain::InputDatetime => ("Input DateTime", "📅"),
            Domain::Timer => ("Timers", "⏲️"),
            Domain::Counter => ("Counters", "🔢"),
            Domain::Vacuum => ("Vacuum Cleaners", "🤖"),
            Domain::WaterHeater => ("Water Heaters", "🚿"),
            Domain::Humidifier => ("Humidifiers", "💧"),
            Domain::AirQuality => ("Air Quality", "🌬️"),
            Domain::Weather => ("Weather", "🌤️"),
            Domain::Sun => ("Sun", "☀️"),
            Domain::Zone => ("Zones", "🗺️"),
        };
        CategoryInfo {
            name: name.to_string(),
            icon: icon.to_string(),
        }
    }

    /// Whether the hub accepts a brightness with turn_on for this domain
    pub fn supports_brightness(self) -> bool {
        matches!(self, Domain::Light)
    }
}

/// Category info for an arbitrary domain string, tracked or not
pub fn category_for(domain: &str) -> CategoryInfo {
    match domain.parse::<Domain>() {
        Ok(d) => d.category(),
        Err(_) => {
            let mut chars = domain.chars();
            let name = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            CategoryInfo {
                name,
                icon: "📱".to_string(),
            }
        }
    }
}
