//! Data records that carry option codes as values: aggregate data values and tracker events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aggregate (tabular) data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub period: String,
    pub org_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_option_combo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataValue {
    pub fn with_value(&self, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..self.clone()
        }
    }

    pub fn has_value(&self, value: &str) -> bool {
        self.value.as_deref() == Some(value)
    }

    /// Identity of the cell this value occupies.
    pub fn key(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.data_element,
            &self.period,
            &self.org_unit,
            self.category_option_combo.as_deref().unwrap_or(""),
            self.attribute_option_combo.as_deref().unwrap_or(""),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDataValue {
    pub data_element: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventDataValue {
    pub fn with_value(&self, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..self.clone()
        }
    }
}

/// Tracker event; only `event` and `dataValues` are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event: String,
    #[serde(default)]
    pub data_values: Vec<EventDataValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Same event restricted to the data points of `data_element` holding `code`.
    /// Returns `None` when no data point matches.
    pub fn matching_points(&self, data_element: &str, code: &str) -> Option<Self> {
        let data_values: Vec<EventDataValue> = self
            .data_values
            .iter()
            .filter(|dv| dv.data_element == data_element && dv.value.as_deref() == Some(code))
            .cloned()
            .collect();

        if data_values.is_empty() {
            None
        } else {
            Some(Self {
                data_values,
                ..self.clone()
            })
        }
    }

    pub fn with_values(&self, value: &str) -> Self {
        Self {
            data_values: self.data_values.iter().map(|dv| dv.with_value(value)).collect(),
            ..self.clone()
        }
    }
}

/// Selection of aggregate data values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValueFilter {
    pub data_elements: Vec<String>,
    pub org_units: Vec<String>,
    pub children: bool,
    pub start_date: String,
    pub end_date: String,
}

/// Selection of tracker events by one data element value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub data_element: String,
    /// Raw (unescaped) value to filter on.
    pub value: String,
    pub page_size: u32,
}

/// Flags passed to the tracker importer when events are posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerImportOptions {
    pub skip_pattern_validation: bool,
    pub skip_rule_engine: bool,
    pub skip_side_effects: bool,
}

impl TrackerImportOptions {
    /// Options used when only the stored value of existing events changes.
    pub fn recode() -> Self {
        Self {
            skip_pattern_validation: true,
            skip_rule_engine: true,
            skip_side_effects: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCount {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerImportReport {
    pub status: String,
    #[serde(default)]
    pub stats: TrackerStats,
}

impl TrackerImportReport {
    pub fn is_error(&self) -> bool {
        self.status == "ERROR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> Event {
        serde_json::from_value(json!({
            "event": "EV1",
            "program": "P1",
            "dataValues": [
                {"dataElement": "DE1", "value": "OLD"},
                {"dataElement": "DE2", "value": "OLD"},
                {"dataElement": "DE1", "value": "OTHER"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_matching_points_keeps_only_the_element_and_code() {
        let matched = event().matching_points("DE1", "OLD").unwrap();
        assert_eq!(matched.data_values.len(), 1);
        assert_eq!(matched.data_values[0].data_element, "DE1");
        assert_eq!(matched.extra["program"], json!("P1"));

        assert!(event().matching_points("DE3", "OLD").is_none());
    }

    #[test]
    fn test_with_values_does_not_touch_original() {
        let original = event().matching_points("DE1", "OLD").unwrap();
        let recoded = original.with_values("NEW");

        assert_eq!(recoded.data_values[0].value.as_deref(), Some("NEW"));
        assert_eq!(original.data_values[0].value.as_deref(), Some("OLD"));
    }
}
