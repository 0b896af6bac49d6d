//! Discrepancy Analyzer
//!
//! Compares the objects of one model on the primary server with the same model
//! on every replica. Pure functions over already fetched objects.

use crate::metadata::MetadataObject;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Fields left out of the field comparison.
pub const IGNORED_FIELDS: [&str; 13] = [
    "url",
    "href",
    "externalAccess",
    "publicAccess",
    "userGroupAccesses",
    "userAccesses",
    "access",
    "lastUpdatedBy",
    "createdBy",
    "code",
    "lastUpdated",
    "lastLogin",
    "users",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "index", rename_all = "lowercase")]
pub enum Source {
    Primary,
    Replica(usize),
}

impl Source {
    /// Label used in reports; replicas are numbered from 1.
    pub fn label(&self) -> String {
        match self {
            Source::Primary => "metadata".to_string(),
            Source::Replica(index) => format!("Replica {}", index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusiveItem {
    pub object: MetadataObject,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyRecord {
    pub model: String,
    pub id: String,
    pub primary_object: MetadataObject,
    pub replica_object: MetadataObject,
    pub replica_index: usize,
    pub differing_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnalysis {
    pub model: String,
    pub exclusive: Vec<ExclusiveItem>,
    pub code_discrepancies: Vec<DiscrepancyRecord>,
    pub field_discrepancies: Vec<DiscrepancyRecord>,
}

impl ModelAnalysis {
    pub fn is_consistent(&self) -> bool {
        self.exclusive.is_empty()
            && self.code_discrepancies.is_empty()
            && self.field_discrepancies.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub models: Vec<ModelAnalysis>,
}

impl SyncReport {
    pub fn exclusive(&self) -> impl Iterator<Item = &ExclusiveItem> {
        self.models.iter().flat_map(|analysis| analysis.exclusive.iter())
    }

    pub fn code_discrepancies(&self) -> impl Iterator<Item = &DiscrepancyRecord> {
        self.models
            .iter()
            .flat_map(|analysis| analysis.code_discrepancies.iter())
    }

    pub fn field_discrepancies(&self) -> impl Iterator<Item = &DiscrepancyRecord> {
        self.models
            .iter()
            .flat_map(|analysis| analysis.field_discrepancies.iter())
    }
}

pub struct DiscrepancyAnalyzer;

impl DiscrepancyAnalyzer {
    pub fn analyze(
        &self,
        model: &str,
        primary: &[MetadataObject],
        replicas: &[Vec<MetadataObject>],
    ) -> ModelAnalysis {
        ModelAnalysis {
            model: model.to_string(),
            exclusive: self.exclusive(primary, replicas),
            code_discrepancies: self.code_discrepancies(model, primary, replicas),
            field_discrepancies: self.field_discrepancies(model, primary, replicas),
        }
    }

    /// Objects whose identity key appears exactly once across all servers.
    pub fn exclusive(
        &self,
        primary: &[MetadataObject],
        replicas: &[Vec<MetadataObject>],
    ) -> Vec<ExclusiveItem> {
        let with_source: Vec<(&MetadataObject, Source)> = primary
            .iter()
            .map(|object| (object, Source::Primary))
            .chain(replicas.iter().enumerate().flat_map(|(index, objects)| {
                objects.iter().map(move |object| (object, Source::Replica(index)))
            }))
            .collect();

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for (object, _) in &with_source {
            *occurrences.entry(object.identity_key()).or_default() += 1;
        }

        with_source
            .into_iter()
            .filter(|(object, _)| occurrences.get(object.identity_key()) == Some(&1))
            .map(|(object, source)| ExclusiveItem {
                object: object.clone(),
                source,
            })
            .collect()
    }

    /// Matched pairs whose code differs; a missing code counts as empty.
    pub fn code_discrepancies(
        &self,
        model: &str,
        primary: &[MetadataObject],
        replicas: &[Vec<MetadataObject>],
    ) -> Vec<DiscrepancyRecord> {
        self.matched_pairs(model, primary, replicas)
            .filter(|(_, primary_object, replica_object)| {
                primary_object.code_or_empty() != replica_object.code_or_empty()
            })
            .map(|(index, primary_object, replica_object)| {
                record(model, index, primary_object, replica_object, vec!["code".to_string()])
            })
            .collect()
    }

    pub fn field_discrepancies(
        &self,
        model: &str,
        primary: &[MetadataObject],
        replicas: &[Vec<MetadataObject>],
    ) -> Vec<DiscrepancyRecord> {
        self.matched_pairs(model, primary, replicas)
            .filter_map(|(index, primary_object, replica_object)| {
                let differing = self.differing_fields(primary_object, replica_object);
                (!differing.is_empty())
                    .then(|| record(model, index, primary_object, replica_object, differing))
            })
            .collect()
    }

    /// Keys present in either object whose values are not deeply equal, sorted.
    pub fn differing_fields(&self, a: &MetadataObject, b: &MetadataObject) -> Vec<String> {
        let keys: BTreeSet<&String> = a.fields.keys().chain(b.fields.keys()).collect();

        keys.into_iter()
            .filter(|key| !IGNORED_FIELDS.contains(&key.as_str()))
            .filter(|key| a.fields.get(key.as_str()) != b.fields.get(key.as_str()))
            .cloned()
            .collect()
    }

    /// `(replica index, primary object, replica object)` for every replica object
    /// of `model` with a primary counterpart.
    fn matched_pairs<'a>(
        &self,
        model: &'a str,
        primary: &'a [MetadataObject],
        replicas: &'a [Vec<MetadataObject>],
    ) -> impl Iterator<Item = (usize, &'a MetadataObject, &'a MetadataObject)> + 'a {
        let primary_by_key: HashMap<&str, &MetadataObject> = primary
            .iter()
            .filter(|object| object.model == model)
            .map(|object| (object.identity_key(), object))
            .collect();

        replicas.iter().enumerate().flat_map(move |(index, objects)| {
            let primary_by_key = primary_by_key.clone();
            objects
                .iter()
                .filter(move |object| object.model == model)
                .filter_map(move |object| {
                    primary_by_key
                        .get(object.identity_key())
                        .map(|primary_object| (index, *primary_object, object))
                })
        })
    }
}

fn record(
    model: &str,
    replica_index: usize,
    primary_object: &MetadataObject,
    replica_object: &MetadataObject,
    differing_fields: Vec<String>,
) -> DiscrepancyRecord {
    DiscrepancyRecord {
        model: model.to_string(),
        id: replica_object.identity_key().to_string(),
        primary_object: primary_object.clone(),
        replica_object: replica_object.clone(),
        replica_index,
        differing_fields,
    }
}
