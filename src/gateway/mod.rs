//! Remote Metadata/Data Gateway
//!
//! Contract for reading and writing metadata, aggregate data values and tracker
//! events on a server. `HttpGateway` talks to the Web API; `InMemoryGateway`
//! keeps everything in process for tests.

pub mod http;
pub mod memory;

pub use http::{ApiConnection, Credentials, HttpGateway};
pub use memory::{InMemoryGateway, WriteCall};

use crate::data::{
    DataValue, DataValueFilter, Event, EventFilter, ImportCount, TrackerImportOptions,
    TrackerImportReport,
};
use crate::error::Result;
use crate::metadata::{MetadataImportReport, MetadataObject, MetadataPayload, MetadataQuery, Paginated};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait MetadataGateway: Send + Sync {
    async fn get_metadata(&self, query: &MetadataQuery) -> Result<MetadataPayload>;

    async fn post_metadata(&self, payload: &MetadataPayload) -> Result<MetadataImportReport>;

    async fn get_data_values(&self, filter: &DataValueFilter) -> Result<Vec<DataValue>>;

    async fn post_data_values(&self, values: &[DataValue]) -> Result<ImportCount>;

    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    async fn post_events(
        &self,
        events: &[Event],
        options: &TrackerImportOptions,
    ) -> Result<TrackerImportReport>;

    /// One page (1-based) of the objects of `model`.
    async fn get_paginated(&self, model: &str, page: u32) -> Result<Paginated<MetadataObject>>;
}

/// Fetch every page of `model`, one page after another.
pub async fn fetch_all_pages<G>(gateway: &G, model: &str) -> Result<Vec<MetadataObject>>
where
    G: MetadataGateway + ?Sized,
{
    let mut objects = Vec::new();
    let mut page = 1;

    loop {
        let response = gateway.get_paginated(model, page).await?;
        debug!(
            "[{}] page {}/{} ({} objects)",
            model,
            response.pager.page,
            response.pager.page_count,
            response.objects.len()
        );
        objects.extend(response.objects);

        if response.pager.is_last() || page >= response.pager.page_count {
            break;
        }
        page += 1;
    }

    Ok(objects)
}
