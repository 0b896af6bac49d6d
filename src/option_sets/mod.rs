//! Option set naming conventions.
//!
//! Option sets are classified by the prefix of their name and validated with
//! the rules of their category. `Unknown` option sets are not validated and
//! only listed.

pub mod patterns;
pub mod rules;
pub mod strategies;
pub mod validator;

pub use rules::{normalize_code, Property, Rule, Scope, ValidationFinding};
pub use validator::{fixable_options, OptionSetValidation, OptionSetValidator};

use crate::metadata::{null_as_empty, CodedEntity};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NAME_SEPARATOR: &str = "- ";
pub const ED_PREFIX: &str = "ED";
pub const CROSS_PREFIX: &str = "CROSS";
pub const AGGR_PREFIX: &str = "Aggr";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionSetCategory {
    Service,
    Cross,
    ProjectEd,
    Aggregated,
    #[default]
    Unknown,
}

impl OptionSetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSetCategory::Service => "SERVICE",
            OptionSetCategory::Cross => "CROSS",
            OptionSetCategory::ProjectEd => "PROJECT_ED",
            OptionSetCategory::Aggregated => "AGGREGATED",
            OptionSetCategory::Unknown => "UNKNOWN",
        }
    }

    /// Category of an option set name. The first matching prefix wins.
    pub fn classify<S: AsRef<str>>(name: &str, services: &[S]) -> Self {
        let has_prefix = |prefix: &str| {
            name.strip_prefix(prefix)
                .map_or(false, |rest| rest.starts_with(NAME_SEPARATOR))
        };

        if has_prefix(ED_PREFIX) {
            OptionSetCategory::ProjectEd
        } else if has_prefix(CROSS_PREFIX) {
            OptionSetCategory::Cross
        } else if has_prefix(AGGR_PREFIX) {
            OptionSetCategory::Aggregated
        } else if services.iter().any(|service| has_prefix(service.as_ref())) {
            OptionSetCategory::Service
        } else {
            OptionSetCategory::Unknown
        }
    }
}

impl fmt::Display for OptionSetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code/name pair read from the settings files (services, projects, exceptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub code: String,
    pub name: String,
}

impl NamedRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSettings {
    pub services: Vec<NamedRef>,
    pub projects: Vec<NamedRef>,
    pub exceptions: Vec<NamedRef>,
}

impl ValidationSettings {
    pub fn is_service(&self, code: &str) -> bool {
        self.services.iter().any(|service| service.code == code)
    }

    pub fn is_project(&self, code: &str) -> bool {
        self.projects.iter().any(|project| project.code == code)
    }

    pub fn is_exception(&self, word: &str) -> bool {
        self.exceptions.iter().any(|exception| exception.code == word)
    }

    pub fn service_codes(&self) -> Vec<&str> {
        self.services.iter().map(|service| service.code.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSet {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub options: Vec<CodedEntity>,
    #[serde(skip)]
    pub category: OptionSetCategory,
}

impl OptionSet {
    pub fn code_or_empty(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    pub fn with_category<S: AsRef<str>>(&self, services: &[S]) -> Self {
        Self {
            category: OptionSetCategory::classify(&self.name, services),
            ..self.clone()
        }
    }
}

/// Classify every option set against the configured service codes.
pub fn categorize<S: AsRef<str>>(option_sets: &[OptionSet], services: &[S]) -> Vec<OptionSet> {
    option_sets
        .iter()
        .map(|option_set| option_set.with_category(services))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERVICES: [&str; 2] = ["Beirut Emergency", "Another service name"];

    #[test]
    fn test_classify_by_prefix() {
        let cases = [
            ("Beirut Emergency- Newborn presentation", OptionSetCategory::Service),
            ("CROSS- Example", OptionSetCategory::Cross),
            ("Aggr- Example", OptionSetCategory::Aggregated),
            ("ED- Triage", OptionSetCategory::ProjectEd),
            ("0test", OptionSetCategory::Unknown),
        ];

        for (name, expected) in cases {
            assert_eq!(OptionSetCategory::classify(name, &SERVICES), expected, "{}", name);
        }
    }

    #[test]
    fn test_classify_requires_separator() {
        assert_eq!(
            OptionSetCategory::classify("CROSS-Example", &SERVICES),
            OptionSetCategory::Unknown
        );
        assert_eq!(
            OptionSetCategory::classify("EDUCATION- x", &SERVICES),
            OptionSetCategory::Unknown
        );
    }

    #[test]
    fn test_classify_ed_before_services() {
        assert_eq!(
            OptionSetCategory::classify("ED- Triage", &["ED"]),
            OptionSetCategory::ProjectEd
        );
    }

    #[test]
    fn test_option_set_from_server_json() {
        let option_set: OptionSet = serde_json::from_value(json!({
            "id": "OS1",
            "name": "CROSS- Age unit",
            "options": [{"id": "O1", "name": "Years", "code": "YEARS", "sortOrder": 1}]
        }))
        .unwrap();

        assert_eq!(option_set.code, None);
        assert_eq!(option_set.category, OptionSetCategory::Unknown);
        let categorized = option_set.with_category(&SERVICES);
        assert_eq!(categorized.category, OptionSetCategory::Cross);
        assert_eq!(categorized.options[0].owner_fields["sortOrder"], json!(1));
    }
}
