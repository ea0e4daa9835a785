//! `validate`: check a desired-state document without touching GitHub.

use std::path::Path;

use colored::Colorize;

use config_model::{DocumentValidator, ValidationSeverity};

use crate::errors::Error;

/// Validates the document and prints every collected issue.
///
/// Returns the number of error-severity issues.
pub fn execute(config_path: &Path) -> Result<usize, Error> {
    let raw = super::common::read_document(config_path)?;
    let validator = DocumentValidator::new().map_err(Error::Config)?;
    let report = validator.validate(&raw);

    for issue in report.issues() {
        let line = match issue.severity {
            ValidationSeverity::Error => format!("error: {}: {}", issue.field_path, issue.message)
                .red()
                .to_string(),
            ValidationSeverity::Warning => {
                format!("warning: {}: {}", issue.field_path, issue.message)
                    .yellow()
                    .to_string()
            }
        };
        eprintln!("{line}");
    }

    let errors = report.error_count();
    if errors == 0 {
        println!(
            "{} is valid ({} warning(s))",
            config_path.display(),
            report.issues().len()
        );
    } else {
        eprintln!(
            "{}: {} error(s), {} issue(s) total",
            config_path.display(),
            errors,
            report.issues().len()
        );
    }
    Ok(errors)
}
