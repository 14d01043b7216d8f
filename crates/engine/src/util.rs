//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing and normalization so every entity enforces the same rules.

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Same as [`parse_uuid`] for nullable columns.
pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|raw| parse_uuid(raw, label)).transpose()
}

/// Trim a required name, rejecting empty values.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim optional free text, mapping blank strings to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_name_is_trimmed() {
        assert_eq!(
            normalize_required_name("  Checking ", "account").unwrap(),
            "Checking"
        );
        assert_eq!(
            normalize_required_name("   ", "account"),
            Err(EngineError::Validation(
                "account name must not be empty".to_string()
            ))
        );
    }

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(normalize_optional_text(Some(" memo ")), Some("memo".to_string()));
        assert_eq!(normalize_optional_text(None), None);
    }

    #[test]
    fn parse_uuid_labels_errors() {
        assert_eq!(
            parse_uuid("nope", "account"),
            Err(EngineError::InvalidId("invalid account id".to_string()))
        );
        assert_eq!(parse_optional_uuid(None, "account").unwrap(), None);
    }
}
