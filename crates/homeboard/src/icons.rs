//! Emoji icons for rooms, systems, entities and sensors.

const ROOM_ICONS: &[(&str, &str)] = &[
    ("bedroom-john", "🛏️"),
    ("bedroom-guest", "🛌"),
    ("bedroom-master", "🏠"),
    ("living-room", "🛋️"),
    ("family-room", "👨‍👩‍👧‍👦"),
    ("kitchen", "🍳"),
    ("bathroom-guest", "🚿"),
    ("bathroom-master", "🛁"),
    ("outdoor", "🌿"),
    ("office", "💼"),
    ("garage", "🚗"),
    ("basement", "🏠"),
    ("attic", "🏠"),
];

const SYSTEM_ICONS: &[(&str, &str)] = &[
    ("security", "🛡️"),
    ("climate", "🌡️"),
    ("energy", "⚡"),
    ("entertainment", "📺"),
    ("automation", "🎭"),
    ("network", "🌐"),
    ("lighting", "💡"),
    ("camera", "📹"),
    ("speaker", "🔊"),
];

const ENTITY_ICONS: &[(&str, &str)] = &[
    ("light", "💡"),
    ("switch", "🔌"),
    ("input_boolean", "🎛️"),
    ("fan", "🌀"),
    ("cover", "🚪"),
    ("sensor", "📊"),
    ("binary_sensor", "👁️"),
    ("climate", "🌡️"),
    ("media_player", "📺"),
    ("camera", "📹"),
    ("lock", "🔒"),
    ("alarm", "🚨"),
];

const SENSOR_ICONS: &[(&str, &str)] = &[
    ("door", "🚪"),
    ("window", "🪟"),
    ("motion", "👁️"),
    ("temperature", "🌡️"),
    ("humidity", "💧"),
    ("smoke", "🚨"),
    ("gas", "⚠️"),
    ("battery", "🔋"),
    ("power", "⚡"),
];

/// Keyword rules for naming a room icon, checked in order
const ROOM_KEYWORDS: &[(&[&str], &str)] = &[
    (&["bedroom", "bed"], "🛏️"),
    (&["bathroom", "bath", "toilet"], "🚿"),
    (&["kitchen", "cook"], "🍳"),
    (&["living", "lounge"], "🛋️"),
    (&["dining", "eat"], "🍽️"),
    (&["office", "study", "work"], "💼"),
    (&["garage", "car"], "🚗"),
    (&["basement", "cellar"], "🏠"),
    (&["attic", "loft"], "🏠"),
    (&["outdoor", "garden", "patio"], "🌿"),
    (&["entry", "foyer", "hall"], "🚪"),
    (&["laundry", "wash"], "🧺"),
    (&["storage", "closet"], "📦"),
];

const DEFAULT_ROOM_ICON: &str = "🏠";

fn lookup(table: &[(&str, &'static str)], key: &str, default: &'static str) -> &'static str {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, icon)| *icon)
        .unwrap_or(default)
}

pub fn room_icon(room_id: &str) -> &'static str {
    lookup(ROOM_ICONS, room_id, DEFAULT_ROOM_ICON)
}

pub fn system_icon(system_id: &str) -> &'static str {
    lookup(SYSTEM_ICONS, system_id, "⚙️")
}

pub fn entity_icon(domain: &str) -> &'static str {
    lookup(ENTITY_ICONS, domain, "⚡")
}

pub fn sensor_icon(sensor_type: &str) -> &'static str {
    lookup(SENSOR_ICONS, &sensor_type.to_lowercase(), "📊")
}

/// Pick an icon for a user-named room from keywords in its name
pub fn generate_room_icon(room_name: &str) -> &'static str {
    let name = room_name.to_lowercase();
    ROOM_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_ROOM_ICON)
}

pub fn status_icon(status: &str) -> &'static str {
    match status.to_lowercase().as_str() {
        "online" | "on" | "active" | "normal" => "🟢",
        "offline" | "off" | "inactive" | "error" | "critical" => "🔴",
        "warning" | "alert" => "🟡",
        _ => "⚪",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups_with_defaults() {
        assert_eq!(room_icon("kitchen"), "🍳");
        assert_eq!(room_icon("spaceship"), "🏠");
        assert_eq!(system_icon("security"), "🛡️");
        assert_eq!(system_icon("plumbing"), "⚙️");
        assert_eq!(entity_icon("lock"), "🔒");
        assert_eq!(entity_icon("vacuum"), "⚡");
        assert_eq!(sensor_icon("Window"), "🪟");
        assert_eq!(sensor_icon("lux"), "📊");
    }

    #[test]
    fn test_generate_room_icon() {
        assert_eq!(generate_room_icon("Master Bedroom"), "🛏️");
        assert_eq!(generate_room_icon("Guest Bath"), "🚿");
        assert_eq!(generate_room_icon("Home Office"), "💼");
        assert_eq!(generate_room_icon("Laundry"), "🧺");
        assert_eq!(generate_room_icon("Front Hall"), "🚪");
        assert_eq!(generate_room_icon("Conservatory"), "🏠");
    }

    #[test]
    fn test_earlier_keyword_rules_win() {
        // "bed" matches before "storage"
        assert_eq!(generate_room_icon("Bed Storage"), "🛏️");
    }

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon("ON"), "🟢");
        assert_eq!(status_icon("normal"), "🟢");
        assert_eq!(status_icon("off"), "🔴");
        assert_eq!(status_icon("critical"), "🔴");
        assert_eq!(status_icon("alert"), "🟡");
        assert_eq!(status_icon("triggered"), "⚪");
    }
}
