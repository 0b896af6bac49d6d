//! In-process gateway backed by plain collections.
//!
//! Behaves like a server for everything the tool reads and writes and records
//! every write call, so tests can assert on what would have reached the network.
//! Failures can be injected per write kind.

use super::MetadataGateway;
use crate::data::{
    DataValue, DataValueFilter, Event, EventFilter, ImportCount, TrackerImportOptions,
    TrackerImportReport, TrackerStats,
};
use crate::error::{GovernanceError, Result};
use crate::metadata::{
    MetadataImportReport, MetadataObject, MetadataPayload, MetadataQuery, Pager, Paginated,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A write that reached the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCall {
    Metadata(MetadataPayload),
    DataValues(Vec<DataValue>),
    Events(Vec<Event>),
}

#[derive(Default)]
struct State {
    metadata: BTreeMap<String, Vec<Value>>,
    data_values: Vec<DataValue>,
    events: Vec<Event>,
    writes: Vec<WriteCall>,
    event_filters: Vec<EventFilter>,
    reject_metadata: bool,
    failing_data_value_posts: usize,
    failing_event_posts: usize,
}

pub struct InMemoryGateway {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_page_size(50)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic in another test thread must not hide this gateway's state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_metadata(&self, model: &str, objects: Vec<Value>) {
        self.state()
            .metadata
            .entry(model.to_string())
            .or_default()
            .extend(objects);
    }

    pub fn insert_data_values(&self, values: Vec<DataValue>) {
        self.state().data_values.extend(values);
    }

    pub fn insert_events(&self, events: Vec<Event>) {
        self.state().events.extend(events);
    }

    /// Metadata posts answer with status `ERROR` from now on.
    pub fn reject_metadata_writes(&self) {
        self.state().reject_metadata = true;
    }

    /// The next `count` data value posts fail with a gateway error.
    pub fn fail_next_data_value_posts(&self, count: usize) {
        self.state().failing_data_value_posts = count;
    }

    /// The next `count` event posts fail with a gateway error.
    pub fn fail_next_event_posts(&self, count: usize) {
        self.state().failing_event_posts = count;
    }

    pub fn metadata(&self, model: &str) -> Vec<Value> {
        self.state().metadata.get(model).cloned().unwrap_or_default()
    }

    pub fn data_values(&self) -> Vec<DataValue> {
        self.state().data_values.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.state().writes.clone()
    }

    pub fn event_filters(&self) -> Vec<EventFilter> {
        self.state().event_filters.clone()
    }
}

fn upsert_by_id(objects: &mut Vec<Value>, object: &Value) {
    let id = object.get("id");
    match objects.iter_mut().find(|existing| existing.get("id") == id) {
        Some(existing) => *existing = object.clone(),
        None => objects.push(object.clone()),
    }
}

/// Option sets embed their options; keep those copies in line with posted options.
fn refresh_embedded_options(state: &mut State, option: &Value) {
    let Some(option_sets) = state.metadata.get_mut("optionSets") else {
        return;
    };
    for option_set in option_sets.iter_mut() {
        let Some(Value::Array(options)) = option_set.get_mut("options") else {
            continue;
        };
        for embedded in options.iter_mut() {
            if embedded.get("id") != option.get("id") {
                continue;
            }
            if let (Value::Object(target), Value::Object(source)) = (embedded, option) {
                for key in ["name", "code"] {
                    if let Some(value) = source.get(key) {
                        target.insert(key.to_string(), value.clone());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MetadataGateway for InMemoryGateway {
    async fn get_metadata(&self, query: &MetadataQuery) -> Result<MetadataPayload> {
        let state = self.state();
        let payload = query
            .models
            .iter()
            .fold(MetadataPayload::new(), |payload, model_query| {
                let objects = state
                    .metadata
                    .get(&model_query.model)
                    .map(|objects| {
                        objects
                            .iter()
                            .filter(|object| model_query.filters.iter().all(|f| f.matches(object)))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                payload.with_objects(model_query.model.clone(), objects)
            });
        Ok(payload)
    }

    async fn post_metadata(&self, payload: &MetadataPayload) -> Result<MetadataImportReport> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.writes.push(WriteCall::Metadata(payload.clone()));

        if state.reject_metadata {
            return Ok(MetadataImportReport {
                status: "ERROR".to_string(),
                stats: None,
            });
        }

        for (model, objects) in payload.models() {
            for object in objects {
                upsert_by_id(state.metadata.entry(model.clone()).or_default(), object);
                if model == "options" {
                    refresh_embedded_options(state, object);
                }
            }
        }

        Ok(MetadataImportReport {
            status: "OK".to_string(),
            stats: None,
        })
    }

    /// Org unit selection is not modelled: every stored value is a descendant of any root.
    async fn get_data_values(&self, filter: &DataValueFilter) -> Result<Vec<DataValue>> {
        let state = self.state();
        Ok(state
            .data_values
            .iter()
            .filter(|dv| filter.data_elements.contains(&dv.data_element))
            .cloned()
            .collect())
    }

    async fn post_data_values(&self, values: &[DataValue]) -> Result<ImportCount> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.writes.push(WriteCall::DataValues(values.to_vec()));

        if state.failing_data_value_posts > 0 {
            state.failing_data_value_posts -= 1;
            return Err(GovernanceError::Gateway(
                "API error (409 Conflict): data value import failed".to_string(),
            ));
        }

        let mut count = ImportCount::default();
        for value in values {
            match state.data_values.iter_mut().find(|dv| dv.key() == value.key()) {
                Some(existing) => {
                    *existing = value.clone();
                    count.updated += 1;
                }
                None => {
                    state.data_values.push(value.clone());
                    count.imported += 1;
                }
            }
        }
        Ok(count)
    }

    /// The server matches the filter against option names while storing codes;
    /// here only the data element part of the filter narrows the result.
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut state = self.state();
        state.event_filters.push(filter.clone());
        Ok(state
            .events
            .iter()
            .filter(|event| {
                event
                    .data_values
                    .iter()
                    .any(|dv| dv.data_element == filter.data_element)
            })
            .cloned()
            .collect())
    }

    async fn post_events(
        &self,
        events: &[Event],
        _options: &TrackerImportOptions,
    ) -> Result<TrackerImportReport> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.writes.push(WriteCall::Events(events.to_vec()));

        if state.failing_event_posts > 0 {
            state.failing_event_posts -= 1;
            return Err(GovernanceError::Gateway(
                "API error (409 Conflict): tracker import failed".to_string(),
            ));
        }

        let mut stats = TrackerStats::default();
        for event in events {
            match state.events.iter_mut().find(|e| e.event == event.event) {
                Some(existing) => {
                    for incoming in &event.data_values {
                        match existing
                            .data_values
                            .iter_mut()
                            .find(|dv| dv.data_element == incoming.data_element)
                        {
                            Some(dv) => *dv = incoming.clone(),
                            None => existing.data_values.push(incoming.clone()),
                        }
                    }
                    stats.updated += 1;
                }
                None => {
                    state.events.push(event.clone());
                    stats.created += 1;
                }
            }
            stats.total += 1;
        }

        Ok(TrackerImportReport {
            status: "OK".to_string(),
            stats,
        })
    }

    async fn get_paginated(&self, model: &str, page: u32) -> Result<Paginated<MetadataObject>> {
        let state = self.state();
        let all = state.metadata.get(model).cloned().unwrap_or_default();
        let total = all.len();
        let page_count = total.div_ceil(self.page_size).max(1);
        let start = (page.max(1) as usize - 1) * self.page_size;

        let objects = all
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .filter_map(|value| MetadataObject::from_json(model, value))
            .collect();

        Ok(Paginated {
            objects,
            pager: Pager {
                page,
                page_count: page_count as u32,
                total: total as u64,
                page_size: Some(self.page_size as u32),
            },
        })
    }
}
