//! Page descriptors for web-only organization settings.
//!
//! Each `web`-tagged field in the organization schema maps to one form
//! control on a GitHub settings page. The selectors are maintained here in
//! one table because GitHub's markup changes without notice; when a selector
//! goes stale the web channel degrades that single field to a warning.

use github_client::{ControlKind, WebSetting};

#[cfg(test)]
#[path = "web_settings_tests.rs"]
mod tests;

/// Form locations of every web-only organization setting.
pub static ORGANIZATION_WEB_SETTINGS: &[WebSetting] = &[
    WebSetting {
        field: "two_factor_requirement",
        page: "settings/security",
        selector: "#org_two_factor_requirement_enabled",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "members_can_change_repo_visibility",
        page: "settings/member_privileges",
        selector: "#members_can_change_repo_visibility",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "members_can_delete_repositories",
        page: "settings/member_privileges",
        selector: "#members_can_delete_repositories",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "members_can_delete_issues",
        page: "settings/member_privileges",
        selector: "#members_can_delete_issues",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "members_can_create_teams",
        page: "settings/member_privileges",
        selector: "#members_can_create_teams",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "members_can_change_project_visibility",
        page: "settings/member_privileges",
        selector: "#members_can_change_project_visibility",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "readers_can_create_discussions",
        page: "settings/member_privileges",
        selector: "#readers_can_create_discussions",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "default_branch_name",
        page: "settings/repository-defaults",
        selector: "#default_repository_branch",
        kind: ControlKind::Input,
    },
    WebSetting {
        field: "packages_containers_public",
        page: "settings/packages",
        selector: "#packages_containers_public",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "packages_containers_internal",
        page: "settings/packages",
        selector: "#packages_containers_internal",
        kind: ControlKind::Checkbox,
    },
    WebSetting {
        field: "discussion_source_repository",
        page: "settings/discussions",
        selector: "#discussion_source_repository",
        kind: ControlKind::Input,
    },
];

/// Finds the descriptor for a model field, if it is web-sourced.
pub fn web_setting_for(field: &str) -> Option<&'static WebSetting> {
    ORGANIZATION_WEB_SETTINGS
        .iter()
        .find(|setting| setting.field == field)
}
