use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TECH_ROLES: &[&str] = &[
    "Associate Software Developer",
    "Sr. Software Engineer",
    "IT Analyst",
    "UX Designer",
    "Associate Product Manager",
    "Sr. Product Manager",
];

pub const DEFAULT_NON_TECH_ROLES: &[&str] = &[
    "Finance Manager",
    "Financial Analyst",
    "Operations Coordinator",
    "Business Operations Manager",
    "Sr. Customer Service Operations Associate",
    "Operations Generalist",
    "Associate Relationship Manager",
    "Account Executive",
];

pub const DEFAULT_HYBRID_ROLES: &[&str] = &["Sr. Business Analyst"];

static DEFAULT_TABLE: Lazy<RoleTypeTable> = Lazy::new(|| {
    RoleTypeTable::from_lists(
        DEFAULT_TECH_ROLES,
        DEFAULT_NON_TECH_ROLES,
        DEFAULT_HYBRID_ROLES,
    )
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Tech,
    NonTech,
    Hybrid,
    Other,
}

impl Display for RoleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Tech => "Tech",
            Self::NonTech => "Non-Tech",
            Self::Hybrid => "Hybrid",
            Self::Other => "Other",
        };
        write!(f, "{display}")
    }
}

/// Position title to role type lookup. Titles match exactly after trimming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleTypeTable {
    titles: HashMap<String, RoleType>,
}

impl RoleTypeTable {
    pub fn from_lists<S: AsRef<str>>(tech: &[S], non_tech: &[S], hybrid: &[S]) -> Self {
        let mut titles = HashMap::new();
        // Later lists win when a title is listed twice.
        for (list, role) in [
            (tech, RoleType::Tech),
            (non_tech, RoleType::NonTech),
            (hybrid, RoleType::Hybrid),
        ] {
            for title in list {
                titles.insert(title.as_ref().trim().to_string(), role);
            }
        }
        Self { titles }
    }

    pub fn defaults() -> &'static RoleTypeTable {
        &DEFAULT_TABLE
    }

    pub fn role_type(&self, position_title: &str) -> RoleType {
        self.titles
            .get(position_title.trim())
            .copied()
            .unwrap_or(RoleType::Other)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{RoleType, RoleTypeTable};

    #[test]
    fn default_table_classifies_known_titles() {
        let table = RoleTypeTable::defaults();
        assert_eq!(table.role_type("Sr. Software Engineer"), RoleType::Tech);
        assert_eq!(table.role_type("Account Executive"), RoleType::NonTech);
        assert_eq!(table.role_type(" Sr. Business Analyst "), RoleType::Hybrid);
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn unknown_titles_map_to_other() {
        let table = RoleTypeTable::defaults();
        assert_eq!(table.role_type("Chief Vibes Officer"), RoleType::Other);
        assert_eq!(table.role_type(""), RoleType::Other);
    }

    #[test]
    fn later_list_wins_on_repeated_title() {
        let table = RoleTypeTable::from_lists(&["Analyst"], &[], &["Analyst"]);
        assert_eq!(table.role_type("Analyst"), RoleType::Hybrid);
    }
}
