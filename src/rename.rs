//! Rename Orchestrator
//!
//! Changes the code of an option everywhere it is stored as a value. The server
//! only accepts the new code as a data value once the option carries it, so the
//! order is fixed:
//!
//! 1. discover the owning option set and the metadata referencing it
//! 2. collect the data values and events holding the old code
//! 3. snapshot option + dependents to the backup sink (also in dry-run)
//! 4. save the option with the new code
//! 5. post recoded data values, then recoded events
//! 6. on failure in step 5, restore the option and re-post the original data
//!
//! Rollback is attempted once. When it fails the snapshot from step 3 must be
//! replayed by hand.

use crate::backup::{RenameSnapshot, SnapshotSink};
use crate::data::{DataValue, DataValueFilter, Event, EventFilter, TrackerImportOptions};
use crate::error::{GovernanceError, Result};
use crate::gateway::MetadataGateway;
use crate::metadata::{
    CodedEntity, DataElementRef, DomainType, Filter, MetadataPayload, MetadataQuery, ModelQuery,
    Ref,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const EVENTS_PAGE_SIZE: u32 = 100_000;
const DATA_VALUES_START_DATE: &str = "1900";

#[derive(Debug, Clone, PartialEq)]
pub struct RenameRequest {
    pub option: CodedEntity,
    pub to_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Metadata found around the option during discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedMetadata {
    pub option_set_id: String,
    /// Option as stored on the server, with all owner fields.
    pub option: CodedEntity,
    pub data_elements: Vec<DataElementRef>,
    pub tracked_entity_attributes: Vec<AttributeRef>,
    pub root_org_units: Vec<Ref>,
}

impl RelatedMetadata {
    fn data_elements_of(&self, domain: DomainType) -> Vec<&DataElementRef> {
        self.data_elements
            .iter()
            .filter(|de| de.domain_type == domain)
            .collect()
    }
}

/// State of one rename from discovery to completion or rollback.
#[derive(Debug, Clone)]
pub struct RenameSession {
    pub id: Uuid,
    pub option: CodedEntity,
    pub to_code: String,
    pub related: RelatedMetadata,
    pub initial_data_values: Vec<DataValue>,
    pub initial_events: Vec<Event>,
}

impl RenameSession {
    pub fn from_code(&self) -> &str {
        &self.option.code
    }

    pub fn recoded_data_values(&self) -> Vec<DataValue> {
        self.initial_data_values
            .iter()
            .map(|dv| dv.with_value(&self.to_code))
            .collect()
    }

    pub fn recoded_events(&self) -> Vec<Event> {
        self.initial_events
            .iter()
            .map(|event| event.with_values(&self.to_code))
            .collect()
    }

    pub fn snapshot(&self, dry_run: bool) -> RenameSnapshot {
        RenameSnapshot {
            session_id: self.id,
            entity_id: self.option.id.clone(),
            option: self.option.clone(),
            data_values: self.initial_data_values.clone(),
            events: self.initial_events.clone(),
            dry_run,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    pub session_id: Uuid,
    pub option_id: String,
    pub from_code: String,
    pub to_code: String,
    pub data_values: usize,
    pub events: usize,
    pub dry_run: bool,
    pub snapshot: String,
}

pub struct RenameOrchestrator<'a> {
    gateway: &'a dyn MetadataGateway,
    sink: &'a dyn SnapshotSink,
    dry_run: bool,
}

impl<'a> RenameOrchestrator<'a> {
    pub fn new(gateway: &'a dyn MetadataGateway, sink: &'a dyn SnapshotSink, dry_run: bool) -> Self {
        Self {
            gateway,
            sink,
            dry_run,
        }
    }

    pub async fn execute(&self, request: &RenameRequest) -> Result<RenameOutcome> {
        let session_id = Uuid::new_v4();
        let span = info_span!("rename", session = %session_id, option = %request.option.id);
        self.run(session_id, request).instrument(span).await
    }

    async fn run(&self, session_id: Uuid, request: &RenameRequest) -> Result<RenameOutcome> {
        if request.to_code.trim().is_empty() {
            return Err(GovernanceError::Config(format!(
                "new code for option {} must not be empty",
                request.option.id
            )));
        }

        let related = self.discover(&request.option).await?;
        let session = self.collect(session_id, related, &request.to_code).await?;
        let snapshot = self.sink.save(&session.snapshot(self.dry_run))?;

        info!(
            "Rename option [id={}]: {} -> {}",
            session.option.id,
            session.from_code(),
            session.to_code
        );

        // A rejected metadata write leaves nothing to undo.
        self.save_option(&session.option.with_code(&session.to_code))
            .await?;

        if let Err(cause) = self.recode_data(&session).await {
            error!("Error recoding option {}: {}", session.option.id, cause);
            return Err(self.rollback(&session, cause, snapshot).await);
        }

        Ok(RenameOutcome {
            session_id,
            option_id: session.option.id.clone(),
            from_code: session.from_code().to_string(),
            to_code: session.to_code.clone(),
            data_values: session.initial_data_values.len(),
            events: session.initial_events.len(),
            dry_run: self.dry_run,
            snapshot,
        })
    }

    async fn discover(&self, option: &CodedEntity) -> Result<RelatedMetadata> {
        let owners = self
            .gateway
            .get_metadata(&MetadataQuery::new().with(
                ModelQuery::new("optionSets", "id").filter(Filter::eq("options.id", &option.id)),
            ))
            .await?;
        let option_set = owners
            .typed::<Ref>("optionSets")?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GovernanceError::Discovery(format!("option set of option {} not found", option.id))
            })?;

        let payload = self
            .gateway
            .get_metadata(&related_metadata_query(&option.id, &option_set.id))
            .await?;

        let stored = payload
            .typed::<CodedEntity>("options")?
            .into_iter()
            .next()
            .ok_or_else(|| GovernanceError::Discovery(format!("option {} not found", option.id)))?;

        if stored.code != option.code {
            warn!(
                "Option {} has code {} on the server (expected {}); using the server value",
                option.id, stored.code, option.code
            );
        }

        let related = RelatedMetadata {
            option_set_id: option_set.id,
            option: stored,
            data_elements: payload.typed("dataElements")?,
            tracked_entity_attributes: payload.typed("trackedEntityAttributes")?,
            root_org_units: payload.typed("organisationUnits")?,
        };

        if !related.tracked_entity_attributes.is_empty() {
            warn!(
                "{} tracked entity attributes use option set {}; their values are not recoded",
                related.tracked_entity_attributes.len(),
                related.option_set_id
            );
        }

        Ok(related)
    }

    async fn collect(
        &self,
        session_id: Uuid,
        related: RelatedMetadata,
        to_code: &str,
    ) -> Result<RenameSession> {
        let initial_data_values = self.collect_data_values(&related).await?;
        let initial_events = self.collect_events(&related).await?;

        Ok(RenameSession {
            id: session_id,
            option: related.option.clone(),
            to_code: to_code.to_string(),
            related,
            initial_data_values,
            initial_events,
        })
    }

    async fn collect_data_values(&self, related: &RelatedMetadata) -> Result<Vec<DataValue>> {
        let aggregate = related.data_elements_of(DomainType::Aggregate);
        if aggregate.is_empty() {
            debug!("[dataValues] No data elements for aggregated domain found");
            return Ok(Vec::new());
        }

        let root = related
            .root_org_units
            .first()
            .ok_or_else(|| GovernanceError::Discovery("root org unit not found".to_string()))?;

        let names = aggregate.iter().map(|de| de.name.as_str()).collect::<Vec<_>>();
        debug!(
            "[dataValues] Get data values for {} data elements: {}",
            aggregate.len(),
            names.join(", ")
        );

        let filter = DataValueFilter {
            data_elements: aggregate.iter().map(|de| de.id.clone()).collect(),
            org_units: vec![root.id.clone()],
            children: true,
            start_date: DATA_VALUES_START_DATE.to_string(),
            end_date: (Utc::now().year() + 100).to_string(),
        };
        let values = self.gateway.get_data_values(&filter).await?;

        let ids: HashSet<&str> = aggregate.iter().map(|de| de.id.as_str()).collect();
        let code = &related.option.code;
        let matched: Vec<DataValue> = values
            .into_iter()
            .filter(|dv| ids.contains(dv.data_element.as_str()) && dv.has_value(code))
            .collect();

        info!("[dataValues] Data values holding {}: {}", code, matched.len());
        Ok(matched)
    }

    async fn collect_events(&self, related: &RelatedMetadata) -> Result<Vec<Event>> {
        let option = &related.option;
        let mut events: Vec<Event> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for data_element in related.data_elements_of(DomainType::Tracker) {
            // The tracker API filters on the option name even though events store the code.
            let filter = EventFilter {
                data_element: data_element.id.clone(),
                value: option.name.clone(),
                page_size: EVENTS_PAGE_SIZE,
            };
            debug!(
                "[events: dataElement={}] Get events (name={})",
                data_element.name, option.name
            );
            let found = self.gateway.get_events(&filter).await?;
            debug!("[events: dataElement={}] Events: {}", data_element.name, found.len());

            for event in found
                .iter()
                .filter_map(|event| event.matching_points(&data_element.id, &option.code))
            {
                match positions.get(&event.event) {
                    Some(&index) => events[index].data_values.extend(event.data_values),
                    None => {
                        positions.insert(event.event.clone(), events.len());
                        events.push(event);
                    }
                }
            }
        }

        info!("[events] Events holding {}: {}", option.code, events.len());
        Ok(events)
    }

    async fn recode_data(&self, session: &RenameSession) -> Result<()> {
        self.post_data_values(&session.recoded_data_values()).await?;
        self.post_events(&session.recoded_events()).await
    }

    async fn rollback(
        &self,
        session: &RenameSession,
        cause: GovernanceError,
        snapshot: String,
    ) -> GovernanceError {
        warn!("[rollback] Executing rollback...");

        let restored = async {
            self.save_option(&session.option).await?;
            self.post_data_values(&session.initial_data_values).await?;
            self.post_events(&session.initial_events).await
        }
        .await;

        match restored {
            Ok(()) => {
                info!("[rollback] Rollback completed");
                GovernanceError::RenameRolledBack {
                    option_id: session.option.id.clone(),
                    cause: cause.to_string(),
                }
            }
            Err(rollback_error) => {
                error!(
                    "[rollback] Rollback failed: {}; restore manually from {}",
                    rollback_error, snapshot
                );
                GovernanceError::RollbackFailed {
                    option_id: session.option.id.clone(),
                    cause: cause.to_string(),
                    rollback_error: rollback_error.to_string(),
                    snapshot,
                }
            }
        }
    }

    async fn save_option(&self, option: &CodedEntity) -> Result<()> {
        if self.dry_run {
            info!("[options] Dry run: option {} not saved (code {})", option.id, option.code);
            return Ok(());
        }

        let payload = MetadataPayload::new().with_objects("options", vec![option.to_json()?]);
        let report = self.gateway.post_metadata(&payload).await?;
        debug!("[options] Save {}: {}", option.name, report.status);

        if !report.is_ok() {
            return Err(GovernanceError::RemoteWrite(format!(
                "failed to save option {}: status {}",
                option.id, report.status
            )));
        }
        Ok(())
    }

    async fn post_data_values(&self, values: &[DataValue]) -> Result<()> {
        if self.dry_run {
            info!("[dataValues] Dry run: {} data values not posted", values.len());
            return Ok(());
        }
        if values.is_empty() {
            debug!("[dataValues] No data values to post");
            return Ok(());
        }

        let count = self.gateway.post_data_values(values).await?;
        info!(
            "[dataValues] Posted {}: imported={} updated={} ignored={}",
            values.len(),
            count.imported,
            count.updated,
            count.ignored
        );
        Ok(())
    }

    async fn post_events(&self, events: &[Event]) -> Result<()> {
        if self.dry_run {
            info!("[events] Dry run: {} events not posted", events.len());
            return Ok(());
        }
        if events.is_empty() {
            debug!("[events] No events to post");
            return Ok(());
        }

        let report = self
            .gateway
            .post_events(events, &TrackerImportOptions::recode())
            .await?;
        info!(
            "[events] Posted {}: status={} updated={} ignored={}",
            events.len(),
            report.status,
            report.stats.updated,
            report.stats.ignored
        );

        if report.is_error() {
            return Err(GovernanceError::RemoteWrite(format!(
                "tracker import of {} events failed",
                events.len()
            )));
        }
        Ok(())
    }
}

fn related_metadata_query(option_id: &str, option_set_id: &str) -> MetadataQuery {
    MetadataQuery::new()
        .with(ModelQuery::new("options", ":owner").filter(Filter::eq("id", option_id)))
        .with(
            ModelQuery::new("dataElements", "id,name,domainType")
                .filter(Filter::eq("optionSet.id", option_set_id)),
        )
        .with(
            ModelQuery::new("trackedEntityAttributes", "id,name")
                .filter(Filter::eq("optionSet.id", option_set_id)),
        )
        .with(ModelQuery::new("organisationUnits", "id").filter(Filter::eq("level", "1")))
}
