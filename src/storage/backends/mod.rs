pub mod memory;
pub mod redis;

/// prefix for id -> entry mappings
pub const ENTRY_KEY_PREFIX: &str = "entry:";
/// prefix for id -> [visitor] mappings (newest first)
pub const ENTRY_VISITS_KEY_PREFIX: &str = "entry:visits:";

pub fn entry_key(id: &str) -> String {
    format!("{}{}", ENTRY_KEY_PREFIX, id)
}

pub fn visits_key(id: &str) -> String {
    format!("{}{}", ENTRY_VISITS_KEY_PREFIX, id)
}

/// Map a scanned `entry:*` key back to its id, ignoring visitor lists.
pub fn id_from_entry_key(key: &str) -> Option<&str> {
    if key.starts_with(ENTRY_VISITS_KEY_PREFIX) {
        return None;
    }
    key.strip_prefix(ENTRY_KEY_PREFIX).filter(|id| !id.is_empty())
}
