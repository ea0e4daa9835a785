//! `apply`: execute the computed plan against GitHub.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use tokio::task::JoinSet;
use tracing::error;

use config_model::CredentialResolver;
use org_steward_core::{Executor, ExecutorOptions};

use crate::errors::Error;

use super::common::{self, EngineFlags};
use super::plan_cmd::colorize_plan;

/// Aggregate outcome of one `apply` invocation across organizations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplyTotals {
    pub applied: usize,
    pub failed_entities: usize,
    pub suppressed_deletes: usize,
    pub failed_orgs: usize,
    pub aborted: bool,
}

/// Plans, asks for confirmation (unless forced), then executes.
pub async fn execute(
    config_path: &Path,
    flags: &EngineFlags,
    force: bool,
) -> Result<ApplyTotals, Error> {
    let document = common::load_document(config_path)?;
    let mut totals = ApplyTotals::default();

    // Phase 1: plan every organization so the operator sees the whole
    // change set before anything mutates.
    let mut planned = Vec::new();
    for org in document.organizations {
        let client = common::build_client(!flags.no_web_ui)?;
        match common::plan_for_org(client.clone(), &org, flags).await {
            Ok(plan) => {
                print!("{}", colorize_plan(&plan.render()));
                planned.push((client, plan));
            }
            Err(e) => {
                error!(org = %org.github_id, error = %e, "Planning failed");
                if e.is_hard() {
                    return Err(e);
                }
                eprintln!("{}", format!("{}: {e}", org.github_id).red());
                totals.failed_orgs += 1;
            }
        }
    }

    if planned.iter().all(|(_, plan)| plan.is_empty()) && totals.failed_orgs == 0 {
        println!("No changes; GitHub already matches the configuration.");
        return Ok(totals);
    }

    if !force && !confirm("Apply these changes? Only 'yes' proceeds: ")? {
        println!("Aborted; nothing was applied.");
        totals.aborted = true;
        return Ok(totals);
    }

    // Phase 2: execute. Organizations stay independent tasks.
    let mut join_set = JoinSet::new();
    for (client, plan) in planned {
        join_set.spawn(async move {
            let executor = Executor::new(
                client,
                Arc::new(CredentialResolver::with_plain()),
                ExecutorOptions::default(),
            );
            executor.apply(&plan).await
        });
    }
    while let Some(joined) = join_set.join_next().await {
        let Ok(report) = joined else {
            totals.failed_orgs += 1;
            continue;
        };
        print!("{}", report.render());
        totals.applied += report.applied_count();
        totals.failed_entities += report.failed_count();
        totals.suppressed_deletes += report
            .outcomes
            .iter()
            .filter(|outcome| {
                outcome.status == org_steward_core::OutcomeStatus::WouldDelete
            })
            .count();
    }

    Ok(totals)
}

fn confirm(prompt: &str) -> Result<bool, Error> {
    print!("{prompt}");
    io::stdout().flush().map_err(|_| Error::StdinReadFailed)?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|_| Error::StdinReadFailed)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
