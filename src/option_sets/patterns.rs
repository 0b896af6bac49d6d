//! Name patterns of option sets and options, with typed captures.

use super::OptionSetCategory;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref NAME_FORBIDDEN: Regex = Regex::new(r"[\\/,]").unwrap();
    pub static ref CODE_LOWERCASE: Regex = Regex::new(r"[a-z]").unwrap();
    pub static ref CODE_INVALID_CHAR: Regex = Regex::new(r"[^A-Z0-9_]").unwrap();
    pub static ref NON_ALPHANUMERIC_RUN: Regex = Regex::new(r"[^A-Z0-9]+").unwrap();
    static ref WORD_PUNCTUATION: Regex = Regex::new(r"[^a-zA-Z0-9]").unwrap();

    // [ACRONYM]- [Option Set Name]
    static ref SERVICE_CONTAINER: Regex = Regex::new(r"^(?P<prefix>.+?)-\s(?P<rest>.+)$").unwrap();
    static ref CROSS_CONTAINER: Regex = Regex::new(r"^(?P<prefix>CROSS)-\s(?P<rest>.+)$").unwrap();
    static ref ED_CONTAINER: Regex = Regex::new(r"^(?P<prefix>ED)-\s(?P<rest>.+)$").unwrap();
    static ref AGGR_CONTAINER: Regex = Regex::new(r"(?i)^(?P<prefix>Aggr)-\s+(?P<rest>.+)$").unwrap();

    // [Option Name] ([ACRONYM])
    static ref STANDARD_ITEM: Regex =
        Regex::new(r"^(?P<name>.+?)\s*\(\s*(?P<service>[A-Z0-9_]+)\s*\)$").unwrap();
    // [Project]: [Option Name] ([IN|OUT] - [ACRONYM])
    static ref MOVEMENT_ITEM: Regex = Regex::new(
        r"^(?P<project>[^:]+):\s*(?P<name>.+?)\s*\(\s*(?P<direction>IN|OUT)\s*-\s*(?P<service>.+?)\s*\)$"
    )
    .unwrap();
    // [Project]: [Option Name] (OoP - [ACRONYM])
    static ref ORIGIN_ITEM: Regex = Regex::new(
        r"^(?P<project>[^:]+):\s*(?P<name>.+?)\s*\(\s*OoP\s*-\s*(?P<service>.+?)\s*\)$"
    )
    .unwrap();
    // [Option Name] (Aggr) or [Option Name] ([Value] - Aggr)
    static ref AGGR_ITEM: Regex =
        Regex::new(r"(?i)^(?P<name>.+?)\s*\(\s*(?:(?P<value>.+?)\s*[-–]\s*)?aggr\s*\)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerName {
    pub prefix: String,
    pub rest: String,
}

/// Split an option set name according to the container pattern of its category.
pub fn container_name(category: OptionSetCategory, name: &str) -> Option<ContainerName> {
    let pattern: &Regex = match category {
        OptionSetCategory::Service => &*SERVICE_CONTAINER,
        OptionSetCategory::Cross => &*CROSS_CONTAINER,
        OptionSetCategory::ProjectEd => &*ED_CONTAINER,
        OptionSetCategory::Aggregated => &*AGGR_CONTAINER,
        OptionSetCategory::Unknown => return None,
    };
    let captures = pattern.captures(name)?;
    Some(ContainerName {
        prefix: captures["prefix"].trim().to_string(),
        rest: captures["rest"].trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

/// Option name shapes accepted in service option sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceItem {
    Standard {
        name: String,
        service: String,
    },
    PatientMovement {
        project: String,
        name: String,
        direction: Direction,
        service: String,
    },
    PatientOrigin {
        project: String,
        name: String,
        service: String,
    },
}

/// First matching shape: standard, then patient movement, then patient origin.
pub fn service_item(name: &str) -> Option<ServiceItem> {
    if let Some(captures) = STANDARD_ITEM.captures(name) {
        return Some(ServiceItem::Standard {
            name: captures["name"].trim().to_string(),
            service: captures["service"].to_string(),
        });
    }

    if let Some(captures) = MOVEMENT_ITEM.captures(name) {
        let direction = match &captures["direction"] {
            "IN" => Direction::In,
            _ => Direction::Out,
        };
        return Some(ServiceItem::PatientMovement {
            project: captures["project"].trim().to_string(),
            name: captures["name"].trim().to_string(),
            direction,
            service: captures["service"].trim().to_string(),
        });
    }

    ORIGIN_ITEM
        .captures(name)
        .map(|captures| ServiceItem::PatientOrigin {
            project: captures["project"].trim().to_string(),
            name: captures["name"].trim().to_string(),
            service: captures["service"].trim().to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggrItem {
    pub name: String,
    pub value: Option<String>,
}

pub fn aggr_item(name: &str) -> Option<AggrItem> {
    let captures = AGGR_ITEM.captures(name)?;
    Some(AggrItem {
        name: captures["name"].trim().to_string(),
        value: captures
            .name("value")
            .map(|value| value.as_str().trim().to_string())
            .filter(|value| !value.is_empty()),
    })
}

/// Exception words lose their punctuation, any other word gets it replaced by `_`.
pub fn aggr_words(rest: &str, is_exception: impl Fn(&str) -> bool) -> String {
    rest.split(' ')
        .map(|word| {
            if is_exception(word) {
                WORD_PUNCTUATION.replace_all(word, "").into_owned()
            } else {
                WORD_PUNCTUATION.replace_all(word, "_").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name_per_category() {
        let service = container_name(OptionSetCategory::Service, "MAT- Newborn presentation").unwrap();
        assert_eq!(service.prefix, "MAT");
        assert_eq!(service.rest, "Newborn presentation");

        let aggr = container_name(OptionSetCategory::Aggregated, "aggr-   Access").unwrap();
        assert_eq!(aggr.prefix, "aggr");
        assert_eq!(aggr.rest, "Access");

        assert!(container_name(OptionSetCategory::Service, "0test").is_none());
        assert!(container_name(OptionSetCategory::Cross, "CROSS-Age").is_none());
        assert!(container_name(OptionSetCategory::Unknown, "CROSS- Age").is_none());
    }

    #[test]
    fn test_service_item_shapes() {
        assert_eq!(
            service_item("MSF ambulance (MAT)"),
            Some(ServiceItem::Standard {
                name: "MSF ambulance".to_string(),
                service: "MAT".to_string()
            })
        );
        assert_eq!(
            service_item("Couffo: CHD de Lokossa (IN - MAT)"),
            Some(ServiceItem::PatientMovement {
                project: "Couffo".to_string(),
                name: "CHD de Lokossa".to_string(),
                direction: Direction::In,
                service: "MAT".to_string()
            })
        );
        assert_eq!(
            service_item("YE1-05: Adear (OoP- ATFC)"),
            Some(ServiceItem::PatientOrigin {
                project: "YE1-05".to_string(),
                name: "Adear".to_string(),
                service: "ATFC".to_string()
            })
        );
        assert_eq!(service_item("0Option Name"), None);
    }

    #[test]
    fn test_aggr_item_value_is_optional() {
        let with_value = aggr_item("No (Access1– Aggr)").unwrap();
        assert_eq!(with_value.name, "No");
        assert_eq!(with_value.value.as_deref(), Some("Access1"));

        let plain = aggr_item("Yes: but not in MSF projects (aggr)").unwrap();
        assert_eq!(plain.name, "Yes: but not in MSF projects");
        assert_eq!(plain.value, None);

        assert!(aggr_item("Yes: everywhere").is_none());
    }

    #[test]
    fn test_aggr_words_keep_exceptions_compact() {
        let words = aggr_words("Access_not in M.S.F", |word| word == "M.S.F");
        assert_eq!(words, "Access_not_in_MSF");
    }
}
