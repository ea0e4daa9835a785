//! Unit tests for CLI argument parsing and exit-code mapping.

use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_parse_plan_with_flags() {
    let cli = Cli::parse_from([
        "org-steward",
        "plan",
        "-c",
        "acme.json",
        "--no-web-ui",
        "--delete-resources",
        "--update-secrets",
    ]);
    assert_eq!(cli.config.to_str(), Some("acme.json"));
    match cli.command {
        Commands::Plan { flags } => {
            assert!(flags.no_web_ui);
            assert!(flags.delete_resources);
            assert!(flags.update_secrets);
            assert!(!flags.update_webhooks);
        }
        _ => panic!("expected plan subcommand"),
    }
}

#[test]
fn test_parse_apply_force_short_flag() {
    let cli = Cli::parse_from(["org-steward", "apply", "-f", "-d"]);
    match cli.command {
        Commands::Apply { flags, force } => {
            assert!(force);
            assert!(flags.delete_resources);
        }
        _ => panic!("expected apply subcommand"),
    }
}

#[test]
fn test_parse_import_requires_organization() {
    assert!(Cli::try_parse_from(["org-steward", "import"]).is_err());
    let cli = Cli::parse_from(["org-steward", "import", "acme", "other-org"]);
    match cli.command {
        Commands::Import { organizations, .. } => {
            assert_eq!(organizations, vec!["acme", "other-org"]);
        }
        _ => panic!("expected import subcommand"),
    }
}

#[test]
fn test_default_config_path() {
    let cli = Cli::parse_from(["org-steward", "validate"]);
    assert_eq!(cli.config.to_str(), Some("org-steward.json"));
}

#[test]
fn test_apply_exit_codes() {
    let clean = commands::apply_cmd::ApplyTotals::default();
    assert_eq!(apply_exit_code(&clean), EXIT_OK);

    let failed = commands::apply_cmd::ApplyTotals {
        failed_entities: 1,
        ..Default::default()
    };
    assert_eq!(apply_exit_code(&failed), EXIT_PARTIAL);

    // Deletions computed but not enabled are informational, yet still
    // non-zero so automation notices the drift.
    let withheld = commands::apply_cmd::ApplyTotals {
        suppressed_deletes: 2,
        ..Default::default()
    };
    assert_eq!(apply_exit_code(&withheld), EXIT_PARTIAL);

    let aborted = commands::apply_cmd::ApplyTotals {
        aborted: true,
        ..Default::default()
    };
    assert_eq!(apply_exit_code(&aborted), EXIT_PARTIAL);
}
