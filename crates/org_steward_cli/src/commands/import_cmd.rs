//! `import`: snapshot live organizations into a desired-state document.

use std::path::Path;

use org_steward_core::LiveStateFetcher;

use crate::errors::Error;

use super::common::{self, EngineFlags};

/// Fetches the named organizations and writes them as a configuration
/// document. Secret values come back redacted; replace them with credential
/// references before applying.
pub async fn execute(
    config_path: &Path,
    organizations: &[String],
    flags: &EngineFlags,
) -> Result<(), Error> {
    let mut document = config_model::DesiredStateDocument::default();

    for org in organizations {
        let client = common::build_client(!flags.no_web_ui)?;
        let mut fetch_options = flags.fetch_options();
        if client.web().is_none() {
            fetch_options.include_web = false;
        }
        let fetcher = LiveStateFetcher::new(client, fetch_options);
        let live = fetcher.fetch_organization(org).await?;
        document.organizations.push(live);
    }

    let rendered = serde_json::to_string_pretty(&document).map_err(|e| Error::ConfigWrite {
        path: config_path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::write(config_path, rendered + "\n").map_err(|e| Error::ConfigWrite {
        path: config_path.display().to_string(),
        reason: e.to_string(),
    })?;

    println!(
        "Imported {} organization(s) into {}",
        document.organizations.len(),
        config_path.display()
    );
    Ok(())
}
