//! Tests for the web-setting descriptor table.

use super::*;
use crate::schema::{schema_for, ProviderTag, ResourceKind};

#[test]
fn test_every_web_field_has_a_descriptor() {
    let schema = schema_for(ResourceKind::Organization);
    for field in schema.fields {
        if field.provider == ProviderTag::Web {
            assert!(
                web_setting_for(field.name).is_some(),
                "web field '{}' has no page descriptor",
                field.name
            );
        }
    }
}

#[test]
fn test_every_descriptor_maps_to_a_web_field() {
    let schema = schema_for(ResourceKind::Organization);
    for setting in ORGANIZATION_WEB_SETTINGS {
        let field = schema
            .field(setting.field)
            .unwrap_or_else(|| panic!("descriptor '{}' has no schema field", setting.field));
        assert_eq!(
            field.provider,
            ProviderTag::Web,
            "descriptor '{}' points at a REST field",
            setting.field
        );
    }
}

#[test]
fn test_rest_fields_have_no_descriptor() {
    assert!(web_setting_for("billing_email").is_none());
    assert!(web_setting_for("web_commit_signoff_required").is_none());
}
