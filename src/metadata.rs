//! Metadata model shared by the gateway, the rename protocol and the sync checks.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Model whose identity across servers is the `openId` field rather than `id`.
pub const USERS_MODEL: &str = "users";

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// An option: the renameable unit whose code is used verbatim as a data value.
///
/// Owner fields the server returns besides `id`, `name` and `code` are kept in
/// `owner_fields` so the option can be posted back without losing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedEntity {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
    #[serde(flatten)]
    pub owner_fields: Map<String, Value>,
}

impl CodedEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: code.into(),
            owner_fields: Map::new(),
        }
    }

    /// New value with the code replaced; `self` is left untouched.
    pub fn with_code(&self, code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainType {
    Aggregate,
    Tracker,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElementRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub domain_type: DomainType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
}

/// Property filter in the `path:op:value` form understood by the metadata API.
///
/// `path` may traverse nested objects and collections (`options.id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub path: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Evaluate the filter against a JSON object the way the server does:
    /// any value reachable through the path satisfying the operator is a match.
    pub fn matches(&self, object: &Value) -> bool {
        let segments: Vec<&str> = self.path.split('.').collect();
        let mut leaves = Vec::new();
        collect_leaves(object, &segments, &mut leaves);

        leaves.into_iter().any(|leaf| match self.op {
            FilterOp::Eq => scalar_to_string(leaf).as_deref() == Some(self.value.as_str()),
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            FilterOp::Eq => "eq",
        };
        write!(f, "{}:{}:{}", self.path, op, self.value)
    }
}

fn collect_leaves<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_leaves(item, segments, out);
            }
        }
        Value::Object(map) => match segments.split_first() {
            Some((head, rest)) => {
                if let Some(child) = map.get(*head) {
                    collect_leaves(child, rest, out);
                }
            }
            None => {}
        },
        scalar => {
            if segments.is_empty() {
                out.push(scalar);
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One model section of a metadata request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuery {
    pub model: String,
    pub fields: String,
    pub filters: Vec<Filter>,
}

impl ModelQuery {
    pub fn new(model: impl Into<String>, fields: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: fields.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataQuery {
    pub models: Vec<ModelQuery>,
}

impl MetadataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: ModelQuery) -> Self {
        self.models.push(query);
        self
    }
}

/// Objects grouped by model, as exchanged with `/api/metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataPayload(BTreeMap<String, Vec<Value>>);

impl MetadataPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(mut self, model: impl Into<String>, objects: Vec<Value>) -> Self {
        self.0.insert(model.into(), objects);
        self
    }

    /// Keep only the collections of a metadata export, dropping `system` and similar keys.
    pub fn from_response(response: Map<String, Value>) -> Self {
        let models = response
            .into_iter()
            .filter_map(|(model, value)| match value {
                Value::Array(objects) => Some((model, objects)),
                _ => None,
            })
            .collect();
        Self(models)
    }

    pub fn objects(&self, model: &str) -> &[Value] {
        self.0.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn typed<T: serde::de::DeserializeOwned>(&self, model: &str) -> Result<Vec<T>> {
        self.objects(model)
            .iter()
            .map(|object| Ok(serde_json::from_value(object.clone())?))
            .collect()
    }

    pub fn models(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataImportReport {
    pub status: String,
    #[serde(default)]
    pub stats: Option<Value>,
}

impl MetadataImportReport {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

/// Object of any model as listed by the paginated model endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataObject {
    pub model: String,
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    pub open_id: Option<String>,
    /// Every attribute the server returned, used for field comparison.
    pub fields: Map<String, Value>,
}

impl MetadataObject {
    /// Build from a raw server object; objects without an `id` are skipped.
    pub fn from_json(model: &str, value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let id = fields.get("id")?.as_str()?.to_string();
        let name = string_field(&fields, "name").unwrap_or_default();
        let code = if model == USERS_MODEL {
            fields
                .get("userCredentials")
                .and_then(|credentials| credentials.get("username"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| string_field(&fields, "username"))
        } else {
            string_field(&fields, "code")
        };
        let open_id = string_field(&fields, "openId");

        Some(Self {
            model: model.to_string(),
            id,
            name,
            code,
            open_id,
            fields,
        })
    }

    /// Key used to match the same object across servers.
    pub fn identity_key(&self) -> &str {
        if self.model == USERS_MODEL {
            self.open_id
                .as_deref()
                .filter(|open_id| !open_id.is_empty())
                .unwrap_or(&self.id)
        } else {
            &self.id
        }
    }

    pub fn code_or_empty(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    pub page: u32,
    pub page_count: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Pager {
    pub fn is_last(&self) -> bool {
        self.page >= self.page_count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub objects: Vec<T>,
    pub pager: Pager,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_traverses_collections() {
        let option_set = json!({
            "id": "OS1",
            "options": [{"id": "O1"}, {"id": "O2"}]
        });

        assert!(Filter::eq("options.id", "O2").matches(&option_set));
        assert!(!Filter::eq("options.id", "O3").matches(&option_set));
        assert!(Filter::eq("id", "OS1").matches(&option_set));
    }

    #[test]
    fn test_filter_compares_numbers_as_text() {
        let org_unit = json!({"id": "OU1", "level": 1});
        assert!(Filter::eq("level", "1").matches(&org_unit));
        assert_eq!(Filter::eq("level", "1").to_string(), "level:eq:1");
    }

    #[test]
    fn test_users_are_identified_by_open_id() {
        let user = MetadataObject::from_json(
            USERS_MODEL,
            json!({
                "id": "U1",
                "name": "Jane",
                "openId": "jane@example.org",
                "userCredentials": {"username": "jane"}
            }),
        )
        .unwrap();

        assert_eq!(user.identity_key(), "jane@example.org");
        assert_eq!(user.code.as_deref(), Some("jane"));

        let without_open_id =
            MetadataObject::from_json(USERS_MODEL, json!({"id": "U2", "name": "Joe"})).unwrap();
        assert_eq!(without_open_id.identity_key(), "U2");
    }

    #[test]
    fn test_coded_entity_keeps_owner_fields() {
        let option: CodedEntity = serde_json::from_value(json!({
            "id": "O1",
            "name": "Yes",
            "code": null,
            "sortOrder": 3
        }))
        .unwrap();

        assert_eq!(option.code, "");
        let renamed = option.with_code("YES");
        assert_eq!(renamed.to_json().unwrap()["sortOrder"], json!(3));
        assert_eq!(option.code, "");
    }

    #[test]
    fn test_payload_drops_non_collection_keys() {
        let response = json!({"system": {"version": "2.40"}, "options": [{"id": "O1"}]});
        let Value::Object(map) = response else { unreachable!() };
        let payload = MetadataPayload::from_response(map);

        assert_eq!(payload.objects("options").len(), 1);
        assert!(payload.objects("system").is_empty());
    }
}
