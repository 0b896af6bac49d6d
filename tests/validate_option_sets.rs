use metagov::backup::MemorySnapshotSink;
use metagov::gateway::InMemoryGateway;
use metagov::option_sets::{NamedRef, OptionSetCategory, Rule, ValidationSettings};
use metagov::report;
use metagov::repository::{OptionRepository, OptionSetRepository};
use metagov::usecases::{ValidateOptionSets, ValidateOptionsRequest};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn server() -> InMemoryGateway {
    // Small pages so the option set listing spans several requests.
    let gateway = InMemoryGateway::with_page_size(2);
    gateway.insert_metadata(
        "optionSets",
        vec![
            json!({
                "id": "OS1",
                "name": "CROSS- Age unit",
                "code": "CROSS_AGE_UNIT",
                "options": [{"id": "O1", "name": "Years", "code": "YEAR"}]
            }),
            json!({"id": "OS2", "name": "Legacy list", "code": "LEGACY", "options": []}),
            json!({"id": "OS3", "name": "MAT- Outcome", "code": "MAT_OUTCOME", "options": []}),
        ],
    );
    gateway.insert_metadata(
        "options",
        vec![json!({"id": "O1", "name": "Years", "code": "YEAR", "sortOrder": 1, "optionSet": {"id": "OS1"}})],
    );
    gateway
}

fn request(update: bool, dry_run: bool) -> ValidateOptionsRequest {
    ValidateOptionsRequest {
        settings: ValidationSettings {
            services: vec![NamedRef::new("MAT", "Maternity")],
            ..ValidationSettings::default()
        },
        update,
        dry_run,
    }
}

#[tokio::test]
async fn test_analyze_without_update_only_reports() {
    let gateway = server();
    let sink = MemorySnapshotSink::new();
    let usecase = ValidateOptionSets::new(
        OptionSetRepository::new(&gateway),
        OptionRepository::new(&gateway, &sink),
    );

    let response = usecase.execute(&request(false, false)).await.unwrap();

    assert_eq!(response.validations.len(), 2);
    assert_eq!(response.unknown.len(), 1);
    assert_eq!(response.unknown[0].id, "OS2");
    assert_eq!(response.finding_count(), 1);

    let cross = &response.validations[0];
    assert_eq!(cross.option_set.category, OptionSetCategory::Cross);
    assert_eq!(cross.findings[0].rule, Rule::NamingConventions);
    assert_eq!(cross.findings[0].proposed_value.as_deref(), Some("YEARS"));

    assert_eq!(response.fixes.attempted, 0);
    assert!(gateway.writes().is_empty());
}

#[tokio::test]
async fn test_analyze_with_update_applies_code_fixes() {
    let gateway = server();
    let sink = MemorySnapshotSink::new();
    let usecase = ValidateOptionSets::new(
        OptionSetRepository::new(&gateway),
        OptionRepository::new(&gateway, &sink),
    );

    let response = usecase.execute(&request(true, false)).await.unwrap();

    assert_eq!(response.fixes.attempted, 1);
    assert_eq!(response.fixes.applied, 1);
    assert_eq!(response.fixes.failed, 0);

    let option = &gateway.metadata("options")[0];
    assert_eq!(option["code"], json!("YEARS"));
    assert_eq!(option["sortOrder"], json!(1));
    assert_eq!(gateway.metadata("optionSets")[0]["options"][0]["code"], json!("YEARS"));
    assert_eq!(sink.snapshots().len(), 1);

    // A second run finds nothing left to fix.
    let again = usecase.execute(&request(true, false)).await.unwrap();
    assert_eq!(again.finding_count(), 0);
    assert_eq!(again.fixes.attempted, 0);
}

#[tokio::test]
async fn test_analyze_dry_run_fixes_write_nothing() {
    let gateway = server();
    let sink = MemorySnapshotSink::new();
    let usecase = ValidateOptionSets::new(
        OptionSetRepository::new(&gateway),
        OptionRepository::new(&gateway, &sink),
    );

    let response = usecase.execute(&request(true, true)).await.unwrap();

    assert_eq!(response.fixes.applied, 1);
    assert!(gateway.writes().is_empty());
    assert_eq!(gateway.metadata("options")[0]["code"], json!("YEAR"));
    assert!(sink.snapshots()[0].dry_run);
}

#[tokio::test]
async fn test_failed_fix_is_counted_and_batch_continues() {
    let gateway = server();
    gateway.reject_metadata_writes();
    let sink = MemorySnapshotSink::new();
    let usecase = ValidateOptionSets::new(
        OptionSetRepository::new(&gateway),
        OptionRepository::new(&gateway, &sink),
    );

    let response = usecase.execute(&request(true, false)).await.unwrap();

    assert_eq!(response.fixes.attempted, 1);
    assert_eq!(response.fixes.applied, 0);
    assert_eq!(response.fixes.failed, 1);
}

#[tokio::test]
async fn test_reports_are_written_for_analysis() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = server();
    let sink = MemorySnapshotSink::new();
    let usecase = ValidateOptionSets::new(
        OptionSetRepository::new(&gateway),
        OptionRepository::new(&gateway, &sink),
    );
    let response = usecase.execute(&request(false, false)).await.unwrap();

    let report_path = temp_dir.path().join("out").join("optionset-report.csv");
    let unknown_path = temp_dir.path().join("unknown-optionset-report.csv");
    report::write_option_reports(&response, &report_path, &unknown_path).unwrap();

    let findings = fs::read_to_string(&report_path).unwrap();
    assert_eq!(findings.lines().count(), 2);
    assert!(findings.starts_with("Metadata,Option Set ID,"));
    assert!(findings.contains("O1,Years,code,naming_conventions,YEARS"));

    let unknown = fs::read_to_string(&unknown_path).unwrap();
    assert_eq!(
        unknown,
        "Option Set ID,Option Set Code,Option Set Name\nOS2,LEGACY,Legacy list\n"
    );
}
