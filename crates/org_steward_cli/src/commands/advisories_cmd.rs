//! `list-advisories`: read-only listing of repository security advisories.

use crate::errors::Error;

use super::common;

/// Prints the organization's repository security advisories.
pub async fn execute(org: &str) -> Result<(), Error> {
    let client = common::build_client(false)?;
    let advisories = client.list_security_advisories(org).await?;

    if advisories.is_empty() {
        println!("No security advisories for {org}.");
        return Ok(());
    }

    for advisory in &advisories {
        println!(
            "{}  {:<8}  {:<10}  {}",
            advisory.ghsa_id,
            advisory.severity.as_deref().unwrap_or("-"),
            advisory.state.as_deref().unwrap_or("-"),
            advisory.summary
        );
    }
    println!("{} advisory(ies)", advisories.len());
    Ok(())
}
