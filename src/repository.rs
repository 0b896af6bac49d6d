//! Option set listing and option saving on top of a gateway.

use crate::backup::{RenameSnapshot, SnapshotSink};
use crate::error::{GovernanceError, Result};
use crate::gateway::{fetch_all_pages, MetadataGateway};
use crate::metadata::{CodedEntity, Filter, MetadataPayload, MetadataQuery, ModelQuery};
use crate::option_sets::OptionSet;
use crate::rename::{RenameOrchestrator, RenameOutcome, RenameRequest};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

const OPTION_SETS_MODEL: &str = "optionSets";

pub struct OptionSetRepository<'a> {
    gateway: &'a dyn MetadataGateway,
}

impl<'a> OptionSetRepository<'a> {
    pub fn new(gateway: &'a dyn MetadataGateway) -> Self {
        Self { gateway }
    }

    /// Every option set with its options. Categories are left as `Unknown`.
    pub async fn get_all(&self) -> Result<Vec<OptionSet>> {
        info!("Loading option sets...");
        let objects = fetch_all_pages(self.gateway, OPTION_SETS_MODEL).await?;

        let option_sets = objects
            .into_iter()
            .map(|object| Ok(serde_json::from_value(Value::Object(object.fields))?))
            .collect::<Result<Vec<OptionSet>>>()?;

        info!("Option sets loaded: {}", option_sets.len());
        Ok(option_sets)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Written directly: the code did not change.
    Updated { option_id: String, dry_run: bool },
    Renamed(RenameOutcome),
}

pub struct OptionRepository<'a> {
    gateway: &'a dyn MetadataGateway,
    sink: &'a dyn SnapshotSink,
}

impl<'a> OptionRepository<'a> {
    pub fn new(gateway: &'a dyn MetadataGateway, sink: &'a dyn SnapshotSink) -> Self {
        Self { gateway, sink }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<CodedEntity> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| GovernanceError::Discovery(format!("option {} not found", id)))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CodedEntity>> {
        let payload = self
            .gateway
            .get_metadata(
                &MetadataQuery::new()
                    .with(ModelQuery::new("options", ":owner").filter(Filter::eq("id", id))),
            )
            .await?;
        Ok(payload.typed::<CodedEntity>("options")?.into_iter().next())
    }

    /// Save an option. A changed code goes through the rename protocol so that
    /// dependent data follows; anything else is written directly.
    pub async fn save(&self, option: &CodedEntity, dry_run: bool) -> Result<SaveOutcome> {
        let existing = self.get_by_id(&option.id).await?;

        if existing.code != option.code {
            let outcome = RenameOrchestrator::new(self.gateway, self.sink, dry_run)
                .execute(&RenameRequest {
                    option: existing,
                    to_code: option.code.clone(),
                })
                .await?;
            return Ok(SaveOutcome::Renamed(outcome));
        }

        if !dry_run {
            self.sink.save(&RenameSnapshot {
                session_id: Uuid::new_v4(),
                entity_id: existing.id.clone(),
                option: existing.clone(),
                data_values: Vec::new(),
                events: Vec::new(),
                dry_run,
                created_at: Utc::now(),
            })?;

            let merged = merge_owner_fields(&existing, option);
            let payload = MetadataPayload::new().with_objects("options", vec![merged.to_json()?]);
            let report = self.gateway.post_metadata(&payload).await?;
            debug!("Saved option with id {}: {}", option.id, report.status);

            if !report.is_ok() {
                return Err(GovernanceError::RemoteWrite(format!(
                    "failed to save option {}: status {}",
                    option.id, report.status
                )));
            }
        }

        Ok(SaveOutcome::Updated {
            option_id: option.id.clone(),
            dry_run,
        })
    }
}

/// Stored owner fields overlaid with the fields of `option`.
fn merge_owner_fields(existing: &CodedEntity, option: &CodedEntity) -> CodedEntity {
    let mut owner_fields = existing.owner_fields.clone();
    owner_fields.extend(option.owner_fields.clone());
    CodedEntity {
        id: option.id.clone(),
        name: option.name.clone(),
        code: option.code.clone(),
        owner_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_stored_owner_fields() {
        let existing: CodedEntity = serde_json::from_value(json!({
            "id": "O1", "name": "Yes", "code": "YES", "sortOrder": 1, "optionSet": {"id": "OS1"}
        }))
        .unwrap();
        let mut edited = CodedEntity::new("O1", "Yes!", "YES");
        edited.owner_fields.insert("sortOrder".to_string(), json!(4));

        let merged = merge_owner_fields(&existing, &edited);

        assert_eq!(merged.name, "Yes!");
        assert_eq!(merged.owner_fields["sortOrder"], json!(4));
        assert_eq!(merged.owner_fields["optionSet"], json!({"id": "OS1"}));
    }
}
