//! `plan`: show what `apply` would change, without mutating anything.

use std::path::Path;

use colored::Colorize;
use tokio::task::JoinSet;
use tracing::error;

use org_steward_core::Plan;

use crate::errors::Error;

use super::common::{self, EngineFlags};

/// Computes and prints the plan for every organization in the document.
///
/// Organizations are independent and processed concurrently, each with its
/// own client so rate-limit accounting stays per credential.
pub async fn execute(config_path: &Path, flags: &EngineFlags) -> Result<PlanTotals, Error> {
    let document = common::load_document(config_path)?;

    let mut join_set: JoinSet<(String, Result<Plan, Error>)> = JoinSet::new();
    for org in document.organizations {
        let flags = *flags;
        join_set.spawn(async move {
            let client = match common::build_client(!flags.no_web_ui) {
                Ok(client) => client,
                Err(e) => return (org.github_id.clone(), Err(e)),
            };
            let result = common::plan_for_org(client, &org, &flags).await;
            (org.github_id.clone(), result)
        });
    }

    let mut totals = PlanTotals::default();
    let mut failures = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        let Ok((org, result)) = joined else {
            continue;
        };
        match result {
            Ok(plan) => {
                print!("{}", colorize_plan(&plan.render()));
                let summary = plan.summary();
                totals.pending += summary.actionable();
                totals.suppressed_deletes += summary.suppressed_deletes;
            }
            Err(e) => {
                error!(org = %org, error = %e, "Planning failed");
                if e.is_hard() {
                    return Err(e);
                }
                failures.push((org, e));
            }
        }
    }

    for (org, e) in &failures {
        eprintln!("{}", format!("{org}: {e}").red());
    }
    totals.failed_orgs = failures.len();
    Ok(totals)
}

/// Aggregate numbers used for the exit code.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanTotals {
    pub pending: usize,
    pub suppressed_deletes: usize,
    pub failed_orgs: usize,
}

/// Applies the `+ ~ ! -` color scheme line by line.
pub fn colorize_plan(rendered: &str) -> String {
    rendered
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let colored = if trimmed.starts_with('+') {
                line.green().to_string()
            } else if trimmed.starts_with('~') {
                line.yellow().to_string()
            } else if trimmed.starts_with('!') {
                line.magenta().to_string()
            } else if trimmed.starts_with('-') {
                line.red().to_string()
            } else {
                line.to_string()
            };
            format!("{colored}\n")
        })
        .collect()
}
