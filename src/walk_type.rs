use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Kind of walk picked before a session starts
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Default,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WalkType {
    #[default]
    Nature,
    City,
    Meditative,
    Friend,
    Hike,
    Everyday,
}

impl WalkType {
    /// Every walk type in the order the picker offers them
    pub const ALL: [WalkType; 6] = [
        WalkType::Nature,
        WalkType::City,
        WalkType::Meditative,
        WalkType::Friend,
        WalkType::Hike,
        WalkType::Everyday,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            WalkType::Nature => "out in the woods, parks or by the shore",
            WalkType::City => "streets and city blocks",
            WalkType::Meditative => "slow and mindful",
            WalkType::Friend => "walking together with a friend",
            WalkType::Hike => "longer trek on trails",
            WalkType::Everyday => "errands and commuting on foot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_nature() {
        assert_eq!(WalkType::default(), WalkType::Nature);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(WalkType::Meditative.to_string(), "meditative");
        assert_eq!(WalkType::Everyday.to_string(), "everyday");
    }

    #[test]
    fn test_all_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for wt in WalkType::ALL {
            assert!(seen.insert(wt));
            assert!(!wt.description().is_empty());
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_value_enum_parses_display_names() {
        for wt in WalkType::ALL {
            let parsed = WalkType::from_str(&wt.to_string(), false).unwrap();
            assert_eq!(parsed, wt);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&WalkType::Hike).unwrap();
        assert_eq!(json, "\"hike\"");
        let back: WalkType = serde_json::from_str("\"city\"").unwrap();
        assert_eq!(back, WalkType::City);
    }
}
