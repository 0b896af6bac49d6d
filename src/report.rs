//! Report Formatters
//!
//! CSV renderings of validation and sync results. The `*_csv` functions build
//! the content in memory; the `write_*` functions put it on disk.

use crate::discrepancy::{DiscrepancyRecord, SyncReport};
use crate::error::{GovernanceError, Result};
use crate::option_sets::{OptionSet, Scope};
use crate::usecases::ValidationResponse;
use itertools::Itertools;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const EXCLUSIVE_REPORT: &str = "exclusive_metadata.csv";
pub const DISCREPANCIES_REPORT: &str = "discrepancies_metadata.csv";
pub const PROPERTIES_DISCREPANCIES_REPORT: &str = "properties_discrepancies_metadata.csv";

const OPTION_REPORT_HEADER: [&str; 11] = [
    "Metadata",
    "Option Set ID",
    "Option Set Code",
    "Option Set Name",
    "Category",
    "Option Code",
    "Option Id",
    "Option Name",
    "Property Error",
    "Error Type",
    "Value to Update",
];

fn render<I, R>(header: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| GovernanceError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| GovernanceError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// One row per distinct finding; option columns are empty for option set findings.
pub fn option_findings_csv(response: &ValidationResponse) -> Result<String> {
    let rows = response
        .validations
        .iter()
        .flat_map(|validation| {
            let option_set = &validation.option_set;
            validation.findings.iter().map(move |finding| {
                let (option_code, option_id, option_name) = match finding.scope {
                    Scope::Item => (
                        finding.code.clone().unwrap_or_default(),
                        finding.entity_id.clone(),
                        finding.name.clone(),
                    ),
                    Scope::Container => (String::new(), String::new(), String::new()),
                };
                vec![
                    finding.scope.as_str().to_string(),
                    option_set.id.clone(),
                    option_set.code_or_empty().to_string(),
                    option_set.name.clone(),
                    option_set.category.to_string(),
                    option_code,
                    option_id,
                    option_name,
                    finding.property.as_str().to_string(),
                    finding.rule.to_string(),
                    finding.proposed_value.clone().unwrap_or_default(),
                ]
            })
        })
        .unique();

    render(&OPTION_REPORT_HEADER, rows)
}

pub fn unknown_option_sets_csv(option_sets: &[OptionSet]) -> Result<String> {
    render(
        &["Option Set ID", "Option Set Code", "Option Set Name"],
        option_sets
            .iter()
            .map(|option_set| [option_set.id.as_str(), option_set.code_or_empty(), option_set.name.as_str()]),
    )
}

pub fn exclusive_csv(report: &SyncReport) -> Result<String> {
    render(
        &["model", "id", "name", "code", "server"],
        report.exclusive().map(|item| {
            vec![
                item.object.model.clone(),
                item.object.id.clone(),
                item.object.name.clone(),
                item.object.code_or_empty().to_string(),
                item.source.label(),
            ]
        }),
    )
}

fn discrepancy_row(record: &DiscrepancyRecord) -> Vec<String> {
    vec![
        record.model.clone(),
        record.id.clone(),
        record.primary_object.code_or_empty().to_string(),
        record.replica_object.code_or_empty().to_string(),
        (record.replica_index + 1).to_string(),
    ]
}

pub fn code_discrepancies_csv(report: &SyncReport) -> Result<String> {
    render(
        &[
            "model",
            "id",
            "Code in Metadata Server",
            "Code in Replica Server",
            "Replica Server Number",
        ],
        report.code_discrepancies().map(discrepancy_row),
    )
}

pub fn field_discrepancies_csv(report: &SyncReport) -> Result<String> {
    render(
        &[
            "model",
            "id",
            "Code in Metadata Server",
            "Code in Replica Server",
            "Replica Server Number",
            "Diff Fields",
        ],
        report.field_discrepancies().map(|record| {
            let mut row = discrepancy_row(record);
            row.push(record.differing_fields.join("-"));
            row
        }),
    )
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn write_option_reports(
    response: &ValidationResponse,
    report_path: &Path,
    unknown_report_path: &Path,
) -> Result<()> {
    write_file(report_path, &option_findings_csv(response)?)?;
    write_file(unknown_report_path, &unknown_option_sets_csv(&response.unknown)?)?;
    info!(
        "Report generated: {} (unknown option sets: {})",
        report_path.display(),
        unknown_report_path.display()
    );
    Ok(())
}

/// Write the three sync reports into `output_dir` and return their paths.
pub fn write_sync_reports(report: &SyncReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let reports = [
        (EXCLUSIVE_REPORT, exclusive_csv(report)?, "Exclusive metadata"),
        (DISCREPANCIES_REPORT, code_discrepancies_csv(report)?, "Discrepancies metadata"),
        (
            PROPERTIES_DISCREPANCIES_REPORT,
            field_discrepancies_csv(report)?,
            "Properties discrepancies metadata",
        ),
    ];

    let mut paths = Vec::new();
    for (file_name, content, label) in reports {
        let path = output_dir.join(file_name);
        write_file(&path, &content)?;
        info!("{} CSV report generated: {}", label, path.display());
        paths.push(path);
    }
    Ok(paths)
}
