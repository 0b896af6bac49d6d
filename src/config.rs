//! Configuration files: server list for the sync check and the settings CSVs
//! (services, projects, exceptions, ignored models).

use crate::error::{GovernanceError, Result};
use crate::gateway::{ApiConnection, Credentials};
use crate::option_sets::{NamedRef, ValidationSettings};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Models checked by `--check-models all`.
pub const ALL_METADATA_MODELS: [&str; 53] = [
    "attributes",
    "categories",
    "categoryCombos",
    "categoryOptionCombos",
    "categoryOptionGroupSets",
    "categoryOptionGroups",
    "categoryOptions",
    "constants",
    "dashboardItems",
    "dashboards",
    "dataApprovalLevels",
    "dataApprovalWorkflows",
    "dataElementGroupSets",
    "dataElementGroups",
    "dataElements",
    "dataSets",
    "documents",
    "eventVisualizations",
    "indicatorGroupSets",
    "indicatorGroups",
    "indicatorTypes",
    "indicators",
    "legendSets",
    "mapViews",
    "maps",
    "optionGroupSets",
    "optionGroups",
    "optionSets",
    "options",
    "organisationUnitGroupSets",
    "organisationUnitGroups",
    "organisationUnitLevels",
    "organisationUnits",
    "programIndicatorGroups",
    "programIndicators",
    "programRuleActions",
    "programRuleVariables",
    "programRules",
    "programSections",
    "programStageSections",
    "programStages",
    "programs",
    "relationshipTypes",
    "sections",
    "sqlViews",
    "trackedEntityAttributes",
    "trackedEntityTypes",
    "userGroups",
    "userRoles",
    "users",
    "validationRuleGroups",
    "validationRules",
    "visualizations",
];

fn default_use_proxy() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub url: String,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub personal_token: Option<String>,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
}

impl ServerConfig {
    /// Basic auth wins over a personal token when both are set.
    pub fn connection(&self) -> Result<ApiConnection> {
        let credentials = match (non_empty(&self.auth), non_empty(&self.personal_token)) {
            (Some(auth), _) => Credentials::from_auth_string(auth)?,
            (None, Some(token)) => Credentials::PersonalToken(token.to_string()),
            (None, None) => {
                return Err(GovernanceError::Config(format!(
                    "server {} needs auth or personalToken",
                    self.url
                )))
            }
        };

        Ok(ApiConnection::from_url(&self.url)?
            .with_credentials(credentials)
            .with_proxy(self.use_proxy))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigFile {
    pub servers: Vec<ServerConfig>,
}

impl ServerConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GovernanceError::Config(format!("cannot read server config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| GovernanceError::Config(format!("Failed to parse server config: {}", e)))
    }

    /// Split into the main server and the replicas, in file order.
    pub fn split_main(self) -> Result<(ServerConfig, Vec<ServerConfig>)> {
        let (mut main, replicas): (Vec<ServerConfig>, Vec<ServerConfig>) =
            self.servers.into_iter().partition(|server| server.is_main);

        if main.len() != 1 {
            return Err(GovernanceError::Config(format!(
                "exactly one server must have isMain: true (found {})",
                main.len()
            )));
        }
        Ok((main.remove(0), replicas))
    }
}

/// Parse `--check-models`: a comma-separated list or `all`.
pub fn parse_models(value: &str) -> Result<Vec<String>> {
    if value.trim() == "all" {
        return Ok(ALL_METADATA_MODELS.iter().map(|model| model.to_string()).collect());
    }

    let models: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect();

    if models.is_empty() {
        return Err(GovernanceError::Config("model list cannot be empty".to_string()));
    }
    Ok(models)
}

/// `models` without the ignored ones, order kept.
pub fn without_ignored(models: Vec<String>, ignored: &[String]) -> Vec<String> {
    models
        .into_iter()
        .filter(|model| !ignored.contains(model))
        .collect()
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| GovernanceError::Config(format!("cannot read {}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.first().map_or(false, |first| !first.is_empty()) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Code in the first column; the name defaults to the code.
pub fn read_named_refs(path: &Path) -> Result<Vec<NamedRef>> {
    Ok(read_rows(path)?
        .into_iter()
        .map(|row| {
            let code = row[0].clone();
            let name = row.get(1).filter(|name| !name.is_empty()).cloned().unwrap_or_else(|| code.clone());
            NamedRef { code, name }
        })
        .collect())
}

pub fn read_ignored_models(path: &Path) -> Result<Vec<String>> {
    Ok(read_rows(path)?.into_iter().map(|row| row[0].clone()).collect())
}

pub fn load_validation_settings(
    services_path: &Path,
    projects_path: &Path,
    exceptions_path: Option<&Path>,
) -> Result<ValidationSettings> {
    Ok(ValidationSettings {
        services: read_named_refs(services_path)?,
        projects: read_named_refs(projects_path)?,
        exceptions: match exceptions_path {
            Some(path) => read_named_refs(path)?,
            None => Vec::new(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_main_server() {
        let file = ServerConfigFile::from_json(
            r#"{"servers": [
                {"url": "https://main.example.org", "auth": "admin:district", "isMain": true},
                {"url": "https://replica.example.org", "personalToken": "d2p_abc", "useProxy": false}
            ]}"#,
        )
        .unwrap();

        let (main, replicas) = file.split_main().unwrap();
        assert_eq!(main.url, "https://main.example.org");
        assert_eq!(replicas.len(), 1);
        assert!(!replicas[0].use_proxy);

        let connection = replicas[0].connection().unwrap();
        assert_eq!(connection.credentials, Some(Credentials::PersonalToken("d2p_abc".to_string())));
        assert!(!connection.use_proxy);
    }

    #[test]
    fn test_split_main_requires_exactly_one() {
        let file = ServerConfigFile::from_json(
            r#"{"servers": [
                {"url": "https://a.example.org", "auth": "a:b", "isMain": true},
                {"url": "https://b.example.org", "auth": "a:b", "isMain": true}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(file.split_main(), Err(GovernanceError::Config(_))));
    }

    #[test]
    fn test_server_without_credentials_is_rejected() {
        let server = ServerConfig {
            url: "https://a.example.org".to_string(),
            auth: None,
            personal_token: Some(String::new()),
            is_main: true,
            use_proxy: true,
        };
        assert!(matches!(server.connection(), Err(GovernanceError::Config(_))));
    }

    #[test]
    fn test_parse_models() {
        assert_eq!(parse_models("dataSets, users,").unwrap(), vec!["dataSets", "users"]);
        assert_eq!(parse_models("all").unwrap().len(), ALL_METADATA_MODELS.len());
        assert!(parse_models(" , ").is_err());
    }

    #[test]
    fn test_without_ignored_keeps_order() {
        let models = vec!["users".to_string(), "options".to_string(), "dataSets".to_string()];
        let ignored = vec!["options".to_string()];
        assert_eq!(without_ignored(models, &ignored), vec!["users", "dataSets"]);
    }

    #[test]
    fn test_read_named_refs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("projects.csv");
        fs::write(&path, "YE1-05, Afar\n DAP \n\nDemo,Demo project,extra\n").unwrap();

        let refs = read_named_refs(&path).unwrap();

        assert_eq!(
            refs,
            vec![
                NamedRef::new("YE1-05", "Afar"),
                NamedRef::new("DAP", "DAP"),
                NamedRef::new("Demo", "Demo project"),
            ]
        );
    }

    #[test]
    fn test_missing_settings_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_named_refs(&temp_dir.path().join("missing.csv"));
        assert!(matches!(result, Err(GovernanceError::Config(_))));
    }
}
