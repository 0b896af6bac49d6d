//! Validation findings and the checks shared by every category.

use super::patterns::{CODE_INVALID_CHAR, CODE_LOWERCASE, NAME_FORBIDDEN, NON_ALPHANUMERIC_RUN};
use super::OptionSet;
use crate::metadata::CodedEntity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SpecialCharacters,
    LowercaseChars,
    NamingConventions,
    InvalidService,
    InvalidProject,
    NotPatternFound,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::SpecialCharacters => "special_characters",
            Rule::LowercaseChars => "lowercase_chars",
            Rule::NamingConventions => "naming_conventions",
            Rule::InvalidService => "invalid_service",
            Rule::InvalidProject => "invalid_project",
            Rule::NotPatternFound => "not_pattern_found",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a finding is about the option set itself or one of its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "option_set")]
    Container,
    #[serde(rename = "option")]
    Item,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Container => "option_set",
            Scope::Item => "option",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Name,
    Code,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Name => "name",
            Property::Code => "code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    pub entity_id: String,
    pub name: String,
    pub code: Option<String>,
    pub scope: Scope,
    pub rule: Rule,
    pub property: Property,
    pub observed_value: String,
    pub proposed_value: Option<String>,
}

/// The option set or option a check runs against.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub code: &'a str,
    pub scope: Scope,
}

impl<'a> Subject<'a> {
    pub fn container(option_set: &'a OptionSet) -> Self {
        Self {
            id: &option_set.id,
            name: &option_set.name,
            code: option_set.code_or_empty(),
            scope: Scope::Container,
        }
    }

    pub fn item(option: &'a CodedEntity) -> Self {
        Self {
            id: &option.id,
            name: &option.name,
            code: &option.code,
            scope: Scope::Item,
        }
    }

    pub fn finding(
        &self,
        rule: Rule,
        property: Property,
        observed_value: &str,
        proposed_value: Option<String>,
    ) -> ValidationFinding {
        ValidationFinding {
            entity_id: self.id.to_string(),
            name: self.name.to_string(),
            code: Some(self.code.to_string()).filter(|code| !code.is_empty()),
            scope: self.scope,
            rule,
            property,
            observed_value: observed_value.to_string(),
            proposed_value,
        }
    }

    pub fn not_pattern_found(&self) -> ValidationFinding {
        self.finding(Rule::NotPatternFound, Property::Name, self.name, None)
    }
}

pub fn check_name(subject: &Subject) -> Option<ValidationFinding> {
    NAME_FORBIDDEN
        .is_match(subject.name)
        .then(|| subject.finding(Rule::SpecialCharacters, Property::Name, subject.name, None))
}

/// A missing code is checked as the empty string and passes.
pub fn check_code(subject: &Subject) -> Option<ValidationFinding> {
    let invalid = CODE_LOWERCASE.is_match(subject.code)
        || CODE_INVALID_CHAR.is_match(&subject.code.to_uppercase());
    invalid.then(|| subject.finding(Rule::LowercaseChars, Property::Code, subject.code, None))
}

pub fn base_checks(subject: &Subject) -> Vec<ValidationFinding> {
    check_name(subject)
        .into_iter()
        .chain(check_code(subject))
        .collect()
}

pub fn check_expected_code(subject: &Subject, expected: &str) -> Option<ValidationFinding> {
    (subject.code != expected).then(|| {
        subject.finding(
            Rule::NamingConventions,
            Property::Code,
            subject.code,
            Some(expected.to_string()),
        )
    })
}

/// Uppercase, collapse every run of characters outside `[A-Z0-9]` into one `_`
/// and trim underscores at both ends.
pub fn normalize_code(value: &str) -> String {
    NON_ALPHANUMERIC_RUN
        .replace_all(&value.to_uppercase(), "_")
        .trim_matches('_')
        .to_string()
}
