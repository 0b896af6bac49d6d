use super::patterns::container_name;
use super::rules::{Property, Scope, Subject, ValidationFinding};
use super::{strategies, OptionSet, OptionSetCategory, ValidationSettings};
use crate::metadata::CodedEntity;
use itertools::Itertools;
use std::collections::HashMap;

/// Findings of one categorised option set.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSetValidation {
    pub option_set: OptionSet,
    pub findings: Vec<ValidationFinding>,
}

impl OptionSetValidation {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct OptionSetValidator<'a> {
    settings: &'a ValidationSettings,
}

impl<'a> OptionSetValidator<'a> {
    pub fn new(settings: &'a ValidationSettings) -> Self {
        Self { settings }
    }

    pub fn build(&self, option_set: &OptionSet) -> OptionSetValidation {
        OptionSetValidation {
            option_set: option_set.clone(),
            findings: self.validate(option_set),
        }
    }

    /// Findings for an option set whose category is already set.
    ///
    /// A name that does not fit the container pattern of its category yields
    /// a single `not_pattern_found` finding and nothing else.
    pub fn validate(&self, option_set: &OptionSet) -> Vec<ValidationFinding> {
        let category = option_set.category;
        if category == OptionSetCategory::Unknown {
            return Vec::new();
        }

        let Some(container) = container_name(category, &option_set.name) else {
            return vec![Subject::container(option_set).not_pattern_found()];
        };

        match category {
            OptionSetCategory::Service => strategies::service(option_set, &container, self.settings),
            OptionSetCategory::Cross => strategies::cross(option_set),
            OptionSetCategory::ProjectEd => strategies::project_ed(option_set),
            OptionSetCategory::Aggregated => {
                strategies::aggregated(option_set, &container, self.settings)
            }
            OptionSetCategory::Unknown => Vec::new(),
        }
    }
}

/// Options that can be fixed automatically, with the proposed code applied.
///
/// Only options whose findings all concern the code, with at least one
/// proposing a value, qualify.
pub fn fixable_options(validations: &[OptionSetValidation]) -> Vec<CodedEntity> {
    validations
        .iter()
        .flat_map(|validation| {
            let by_option: HashMap<&str, Vec<&ValidationFinding>> = validation
                .findings
                .iter()
                .filter(|finding| finding.scope == Scope::Item)
                .into_group_map_by(|finding| finding.entity_id.as_str());

            validation
                .option_set
                .options
                .iter()
                .unique_by(|option| option.id.as_str())
                .filter_map(|option| {
                    let findings = by_option.get(option.id.as_str())?;
                    if !findings.iter().all(|f| f.property == Property::Code) {
                        return None;
                    }
                    findings
                        .iter()
                        .find_map(|f| f.proposed_value.as_deref().filter(|v| !v.is_empty()))
                        .map(|code| option.with_code(code))
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
