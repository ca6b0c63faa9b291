//! Memory category and creator enumerations.

use serde::{Deserialize, Serialize};

/// Memory category enumeration.
///
/// The category set is closed: every boundary that accepts a category
/// (direct create, update, extraction output) validates against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryCategory {
    Allergy,
    Preference,
    Diet,
    Exercise,
    Goal,
    Grocery,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allergy => "Allergy",
            Self::Preference => "Preference",
            Self::Diet => "Diet",
            Self::Exercise => "Exercise",
            Self::Goal => "Goal",
            Self::Grocery => "Grocery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Allergy" => Some(Self::Allergy),
            "Preference" => Some(Self::Preference),
            "Diet" => Some(Self::Diet),
            "Exercise" => Some(Self::Exercise),
            "Goal" => Some(Self::Goal),
            "Grocery" => Some(Self::Grocery),
            _ => None,
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Allergy,
            Self::Preference,
            Self::Diet,
            Self::Exercise,
            Self::Goal,
            Self::Grocery,
        ]
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who created a memory: the user directly, or the extraction engine
/// on the agent's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCreator {
    User,
    Agent,
}

impl MemoryCreator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in MemoryCategory::all() {
            assert_eq!(MemoryCategory::from_str(category.as_str()), Some(*category));
        }
    }

    #[test]
    fn test_category_set_is_closed() {
        assert_eq!(MemoryCategory::all().len(), 6);
        assert_eq!(MemoryCategory::from_str("Invalid"), None);
        // Matching is exact, not case-insensitive
        assert_eq!(MemoryCategory::from_str("allergy"), None);
    }

    #[test]
    fn test_category_serde_uses_wire_names() {
        let json = serde_json::to_string(&MemoryCategory::Allergy).unwrap();
        assert_eq!(json, "\"Allergy\"");
    }

    #[test]
    fn test_creator_parsing() {
        assert_eq!(MemoryCreator::from_str("agent"), Some(MemoryCreator::Agent));
        assert_eq!(MemoryCreator::from_str("system"), None);
    }
}
