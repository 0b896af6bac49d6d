use crate::error::Result;
use crate::option_sets::{
    categorize, fixable_options, OptionSet, OptionSetCategory, OptionSetValidation,
    OptionSetValidator, ValidationSettings,
};
use crate::repository::{OptionRepository, OptionSetRepository, SaveOutcome};
use tracing::{error, info};

#[derive(Debug, Clone, Default)]
pub struct ValidateOptionsRequest {
    pub settings: ValidationSettings,
    /// Apply automatic fixes.
    pub update: bool,
    /// With `update`, run the fixes without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixSummary {
    pub attempted: usize,
    pub applied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResponse {
    /// One entry per categorised option set, valid ones included.
    pub validations: Vec<OptionSetValidation>,
    pub unknown: Vec<OptionSet>,
    pub fixes: FixSummary,
}

impl ValidationResponse {
    pub fn finding_count(&self) -> usize {
        self.validations
            .iter()
            .map(|validation| validation.findings.len())
            .sum()
    }

    pub fn has_findings(&self) -> bool {
        self.finding_count() > 0
    }
}

pub struct ValidateOptionSets<'a> {
    option_sets: OptionSetRepository<'a>,
    options: OptionRepository<'a>,
}

impl<'a> ValidateOptionSets<'a> {
    pub fn new(option_sets: OptionSetRepository<'a>, options: OptionRepository<'a>) -> Self {
        Self {
            option_sets,
            options,
        }
    }

    pub async fn execute(&self, request: &ValidateOptionsRequest) -> Result<ValidationResponse> {
        info!("Fetching all option sets...");
        let option_sets = self.option_sets.get_all().await?;
        let mut response = validate_all(&option_sets, &request.settings);

        info!(
            "Validated {} option sets: {} findings, {} unknown",
            response.validations.len(),
            response.finding_count(),
            response.unknown.len()
        );

        if request.update {
            response.fixes = self.apply_fixes(&response.validations, request.dry_run).await;
        }
        Ok(response)
    }

    /// Fixes run one after another; a failed fix is logged and the batch continues.
    async fn apply_fixes(&self, validations: &[OptionSetValidation], dry_run: bool) -> FixSummary {
        let fixes = fixable_options(validations);
        let mut summary = FixSummary {
            attempted: fixes.len(),
            ..FixSummary::default()
        };
        info!("Options to fix: {}", fixes.len());

        for option in &fixes {
            match self.options.save(option, dry_run).await {
                Ok(SaveOutcome::Renamed(outcome)) => {
                    info!(
                        "Option {} recoded {} -> {} ({} data values, {} events)",
                        outcome.option_id,
                        outcome.from_code,
                        outcome.to_code,
                        outcome.data_values,
                        outcome.events
                    );
                    summary.applied += 1;
                }
                Ok(SaveOutcome::Updated { option_id, .. }) => {
                    info!("Option {} saved", option_id);
                    summary.applied += 1;
                }
                Err(e) => {
                    error!("Failed to fix option {}: {}", option.id, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// Classify and validate option sets; `Unknown` ones are only listed.
pub fn validate_all(option_sets: &[OptionSet], settings: &ValidationSettings) -> ValidationResponse {
    let services = settings.service_codes();
    let (unknown, known): (Vec<OptionSet>, Vec<OptionSet>) = categorize(option_sets, services.as_slice())
        .into_iter()
        .partition(|option_set| option_set.category == OptionSetCategory::Unknown);

    let validator = OptionSetValidator::new(settings);
    ValidationResponse {
        validations: known.iter().map(|option_set| validator.build(option_set)).collect(),
        unknown,
        fixes: FixSummary::default(),
    }
}
