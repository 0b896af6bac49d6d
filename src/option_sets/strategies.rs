//! One validation strategy per option set category.
//!
//! Each strategy gets an option set whose name already matched the container
//! pattern of its category, together with the captured parts of that name.

use super::patterns::{aggr_item, aggr_words, service_item, ContainerName, ServiceItem};
use super::rules::{
    base_checks, check_expected_code, normalize_code, Property, Rule, Subject, ValidationFinding,
};
use super::{OptionSet, ValidationSettings, AGGR_PREFIX};
use crate::metadata::CodedEntity;

/// `ACRONYM- Name` sets with `Name (ACRONYM)`, movement and origin options.
pub fn service(
    option_set: &OptionSet,
    container: &ContainerName,
    settings: &ValidationSettings,
) -> Vec<ValidationFinding> {
    let subject = Subject::container(option_set);
    let mut findings = base_checks(&subject);

    if settings.is_service(&container.prefix) {
        let expected = normalize_code(&format!("{}_{}", container.prefix, container.rest));
        findings.extend(check_expected_code(&subject, &expected));
    } else {
        findings.push(subject.finding(Rule::InvalidService, Property::Name, &container.prefix, None));
    }

    for option in &option_set.options {
        let item = Subject::item(option);
        findings.extend(base_checks(&item));
        findings.extend(service_item_checks(option, settings));
    }
    findings
}

fn service_item_checks(option: &CodedEntity, settings: &ValidationSettings) -> Vec<ValidationFinding> {
    let subject = Subject::item(option);
    let Some(pattern) = service_item(&option.name) else {
        return vec![subject.not_pattern_found()];
    };

    let expected = match &pattern {
        ServiceItem::Standard { name, service } => {
            if !settings.is_service(service) {
                return vec![subject.finding(Rule::InvalidService, Property::Name, service, None)];
            }
            format!("{}_{}", name, service)
        }
        ServiceItem::PatientMovement {
            project,
            name,
            direction,
            service,
        } => {
            let unknown = unknown_references(&subject, service, project, settings);
            if !unknown.is_empty() {
                return unknown;
            }
            format!("{}_{}_{}_{}", project, name, direction.as_str(), service)
        }
        ServiceItem::PatientOrigin {
            project,
            name,
            service,
        } => {
            let unknown = unknown_references(&subject, service, project, settings);
            if !unknown.is_empty() {
                return unknown;
            }
            format!("{}_{}_OOP_{}", project.replace('-', ""), name, service)
        }
    };

    check_expected_code(&subject, &normalize_code(&expected))
        .into_iter()
        .collect()
}

fn unknown_references(
    subject: &Subject,
    service: &str,
    project: &str,
    settings: &ValidationSettings,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    if !settings.is_service(service) {
        findings.push(subject.finding(Rule::InvalidService, Property::Name, service, None));
    }
    if !settings.is_project(project) {
        findings.push(subject.finding(Rule::InvalidProject, Property::Name, project, None));
    }
    findings
}

/// `CROSS- Name` sets: option codes are the normalised option names.
pub fn cross(option_set: &OptionSet) -> Vec<ValidationFinding> {
    let mut findings = base_checks(&Subject::container(option_set));

    for option in &option_set.options {
        let item = Subject::item(option);
        findings.extend(base_checks(&item));
        findings.extend(check_expected_code(&item, &normalize_code(&option.name)));
    }
    findings
}

/// `ED- Name` sets: only the options get the base checks.
pub fn project_ed(option_set: &OptionSet) -> Vec<ValidationFinding> {
    option_set
        .options
        .iter()
        .flat_map(|option| base_checks(&Subject::item(option)))
        .collect()
}

/// `Aggr- Name` sets with `Name (Aggr)` or `Name (Value - Aggr)` options.
pub fn aggregated(
    option_set: &OptionSet,
    container: &ContainerName,
    settings: &ValidationSettings,
) -> Vec<ValidationFinding> {
    let subject = Subject::container(option_set);
    let mut findings = base_checks(&subject);

    let words = aggr_words(&container.rest, |word| settings.is_exception(word));
    let expected = normalize_code(&format!("{}_{}", container.prefix, words));
    findings.extend(check_expected_code(&subject, &expected));

    let suffix = AGGR_PREFIX.to_uppercase();
    for option in &option_set.options {
        let item = Subject::item(option);
        findings.extend(base_checks(&item));

        match aggr_item(&option.name) {
            Some(parsed) => {
                let expected = match &parsed.value {
                    Some(value) => format!("{}_{}_{}", parsed.name, value, suffix),
                    None => format!("{}_{}", parsed.name, suffix),
                };
                findings.extend(check_expected_code(&item, &normalize_code(&expected)));
            }
            None => findings.push(item.not_pattern_found()),
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option_sets::patterns::container_name;
    use crate::option_sets::{NamedRef, OptionSetCategory};

    fn settings() -> ValidationSettings {
        ValidationSettings {
            services: vec![NamedRef::new("MAT", "MAT"), NamedRef::new("ATFC", "ATFC")],
            projects: vec![NamedRef::new("Demo", "Demo")],
            exceptions: vec![NamedRef::new("MSF", "MSF")],
        }
    }

    fn option_set(name: &str, code: &str, options: Vec<CodedEntity>) -> OptionSet {
        OptionSet {
            id: "OS1".to_string(),
            name: name.to_string(),
            code: Some(code.to_string()),
            options,
            category: OptionSetCategory::Unknown,
        }
    }

    #[test]
    fn test_service_unknown_project_suppresses_code_check() {
        let set = option_set(
            "MAT- Referral",
            "MAT_REFERRAL",
            vec![CodedEntity::new("O1", "Nowhere: Clinic (OUT - MAT)", "WRONG")],
        );
        let container = container_name(OptionSetCategory::Service, &set.name).unwrap();
        let findings = service(&set, &container, &settings());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::InvalidProject);
        assert_eq!(findings[0].observed_value, "Nowhere");
        assert_eq!(findings[0].entity_id, "O1");
    }

    #[test]
    fn test_service_unknown_acronym_on_container() {
        let set = option_set("XYZ- Referral", "XYZ_REFERRAL", vec![]);
        let container = container_name(OptionSetCategory::Service, &set.name).unwrap();
        let findings = service(&set, &container, &settings());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::InvalidService);
        assert_eq!(findings[0].observed_value, "XYZ");
    }

    #[test]
    fn test_service_standard_code_mismatch_proposes_fix() {
        let set = option_set(
            "MAT- Newborn presentation",
            "MAT_NEWBORN_PRESENTATION",
            vec![CodedEntity::new("O1", "MSF ambulance (MAT)", "AMBULANCE")],
        );
        let container = container_name(OptionSetCategory::Service, &set.name).unwrap();
        let findings = service(&set, &container, &settings());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::NamingConventions);
        assert_eq!(findings[0].proposed_value.as_deref(), Some("MSF_AMBULANCE_MAT"));
    }

    #[test]
    fn test_aggregated_container_code_with_exceptions() {
        let set = option_set("Aggr- Seen by M.S.F", "AGGR_SEEN_BY_M_S_F", vec![]);
        let mut settings = settings();
        settings.exceptions = vec![NamedRef::new("M.S.F", "M.S.F")];
        let container = container_name(OptionSetCategory::Aggregated, &set.name).unwrap();
        let findings = aggregated(&set, &container, &settings);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].proposed_value.as_deref(), Some("AGGR_SEEN_BY_MSF"));
    }

    #[test]
    fn test_aggregated_item_findings_use_item_id() {
        let set = option_set(
            "Aggr- Access",
            "AGGR_ACCESS",
            vec![CodedEntity::new("O7", "No (Aggr)", "NO")],
        );
        let container = container_name(OptionSetCategory::Aggregated, &set.name).unwrap();
        let findings = aggregated(&set, &container, &settings());

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_id, "O7");
        assert_eq!(findings[0].proposed_value.as_deref(), Some("NO_AGGR"));
    }

    #[test]
    fn test_project_ed_checks_options_only() {
        let set = option_set(
            "ED- Triage, level",
            "lower",
            vec![CodedEntity::new("O1", "Red", "red")],
        );
        let findings = project_ed(&set);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_id, "O1");
        assert_eq!(findings[0].rule, Rule::LowercaseChars);
    }
}
