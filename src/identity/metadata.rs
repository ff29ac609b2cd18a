// src/identity/metadata.rs - Helpers over the identity provider's free-form user_metadata map
use serde_json::{Map, Value};

pub const SELECTED_DIVISIONS: &str = "selected_divisions";

/// First non-empty string among `keys`.
pub fn first_str<'a>(meta: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| meta.get(*k).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
}

pub fn first_name(meta: &Map<String, Value>) -> &str {
    first_str(meta, &["first_name", "firstName"]).unwrap_or("")
}

pub fn last_name(meta: &Map<String, Value>) -> &str {
    first_str(meta, &["last_name", "lastName"]).unwrap_or("")
}

/// Combined `full_name` / `name` field.
pub fn full_name(meta: &Map<String, Value>) -> &str {
    first_str(meta, &["full_name", "name"]).unwrap_or("")
}

pub fn is_admin_flag(meta: &Map<String, Value>) -> bool {
    meta.get("is_admin").and_then(|v| v.as_bool()) == Some(true)
}

/// The `selected_divisions` list. Missing or non-array values yield an empty list.
pub fn selected_divisions(meta: &Map<String, Value>) -> Vec<String> {
    meta.get(SELECTED_DIVISIONS)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Union a requested division into `current`.
///
/// The request is lower-cased and appended only if no existing entry matches it
/// case-insensitively. Existing entries are never removed or reordered.
pub fn grant_division(current: &[String], division: &str) -> Vec<String> {
    let normalized = division.trim().to_lowercase();
    let mut updated = current.to_vec();
    if !current.iter().any(|d| d.to_lowercase() == normalized) {
        updated.push(normalized);
    }
    updated
}

/// Display name: `first last` → `full_name|name` → e-mail local part → `Unknown`.
pub fn display_name(meta: &Map<String, Value>, email: Option<&str>) -> String {
    let combined = format!("{} {}", first_name(meta), last_name(meta));
    let combined = combined.trim();
    if !combined.is_empty() {
        return combined.to_string();
    }

    let full = full_name(meta);
    if !full.is_empty() {
        return full.to_string();
    }

    match email.and_then(|e| e.split('@').next()).filter(|local| !local.is_empty()) {
        Some(local) => local.to_string(),
        None => "Unknown".to_string(),
    }
}

/// Split a combined name on whitespace into (first, rest).
pub fn split_full_name(full: &str) -> (String, String) {
    let mut parts = full.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn grant_appends_lowercased_division() {
        let current = vec!["trading".to_string()];
        let updated = grant_division(&current, "Business");
        assert_eq!(updated, vec!["trading", "business"]);
    }

    #[test]
    fn grant_is_idempotent_and_case_insensitive() {
        let current = vec!["trading".to_string(), "business".to_string()];
        assert_eq!(grant_division(&current, "TRADING"), current);
        assert_eq!(grant_division(&current, "business"), current);
    }

    #[test]
    fn grant_keeps_existing_entries_in_place() {
        let current = vec!["Formation".to_string(), "ip".to_string()];
        let updated = grant_division(&current, "digital");
        assert_eq!(updated, vec!["Formation", "ip", "digital"]);
        // differently-cased duplicate of an existing entry is not appended
        assert_eq!(grant_division(&current, "formation"), current);
    }

    #[test]
    fn selected_divisions_ignores_garbage() {
        assert!(selected_divisions(&meta(json!({}))).is_empty());
        assert!(selected_divisions(&meta(json!({"selected_divisions": "trading"}))).is_empty());
        assert_eq!(
            selected_divisions(&meta(json!({"selected_divisions": ["trading", 7, "ip"]}))),
            vec!["trading", "ip"]
        );
    }

    #[test]
    fn display_name_fallback_chain() {
        assert_eq!(
            display_name(&meta(json!({"first_name": "Ada", "lastName": "Lovelace"})), None),
            "Ada Lovelace"
        );
        assert_eq!(display_name(&meta(json!({"full_name": "Grace Hopper"})), None), "Grace Hopper");
        assert_eq!(display_name(&meta(json!({"name": "Linus"})), Some("l@x.com")), "Linus");
        assert_eq!(display_name(&meta(json!({})), Some("jane@x.com")), "jane");
        assert_eq!(display_name(&meta(json!({})), None), "Unknown");
    }

    #[test]
    fn split_full_name_keeps_rest_together() {
        assert_eq!(
            split_full_name(" Mary Ann Evans "),
            ("Mary".to_string(), "Ann Evans".to_string())
        );
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
    }
}
