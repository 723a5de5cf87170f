//! Scan settings delivered by the host.

use serde::{Deserialize, Serialize};

/// Analysis settings, as delivered under the `warden` configuration
/// section. Unknown fields are ignored so newer hosts can send more than
/// we read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Upper bound on findings reported per scan.
    pub max_number_of_problems: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_number_of_problems: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        assert_eq!(Settings::default().max_number_of_problems, 1000);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let settings: Settings =
            serde_json::from_value(serde_json::json!({ "maxNumberOfProblems": 25 })).unwrap();
        assert_eq!(settings.max_number_of_problems, 25);
    }

    #[test]
    fn test_missing_field_falls_back_to_default() {
        let settings: Settings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "maxNumberOfProblems": 3,
            "trace": { "server": "verbose" }
        }))
        .unwrap();
        assert_eq!(settings.max_number_of_problems, 3);
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let value = serde_json::to_value(Settings {
            max_number_of_problems: 9,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "maxNumberOfProblems": 9 }));
    }
}
