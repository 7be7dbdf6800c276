//! Input validation and sanitization for submitted policies

use crate::errors::AppError;
use crate::models::PolicySubmission;

const MAX_NAME_LENGTH: usize = 256;
const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;
const MAX_DOCUMENT_DEPTH: usize = 16;

/// Validates a policy submission before the document reaches the parser.
pub fn validate_policy_submission(body: &PolicySubmission) -> Result<(), AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput(
            "policy name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(AppError::InvalidInput("policy name too long".to_string()));
    }
    if name.contains('\0') || name.chars().any(|c| c.is_control()) {
        return Err(AppError::InvalidInput(
            "policy name contains control characters".to_string(),
        ));
    }

    if body.policy_document.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "policy document must not be empty".to_string(),
        ));
    }
    if body.policy_document.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::InvalidInput(
            "policy document too large".to_string(),
        ));
    }

    // Depth guard against degenerate nesting; documents that are not JSON at
    // all are left for the parser to reject with a proper reason.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body.policy_document) {
        check_depth(&value, 0)?;
    }

    Ok(())
}

fn check_depth(value: &serde_json::Value, current_depth: usize) -> Result<(), AppError> {
    if current_depth > MAX_DOCUMENT_DEPTH {
        return Err(AppError::InvalidInput(
            "policy document too deeply nested".to_string(),
        ));
    }

    match value {
        serde_json::Value::Object(obj) => {
            for (_key, val) in obj {
                check_depth(val, current_depth + 1)?;
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr {
                check_depth(val, current_depth + 1)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(name: &str, document: &str) -> PolicySubmission {
        PolicySubmission {
            id: None,
            name: name.to_string(),
            policy_document: document.to_string(),
            active: true,
            policy_type: None,
            no_target_sp: false,
        }
    }

    #[test]
    fn accepts_a_plain_submission() {
        assert!(validate_policy_submission(&submission("My policy", "{\"policyId\": \"p\"}")).is_ok());
    }

    #[test]
    fn rejects_empty_name_and_document() {
        assert!(validate_policy_submission(&submission("  ", "{}")).is_err());
        assert!(validate_policy_submission(&submission("name", "  ")).is_err());
    }

    #[test]
    fn rejects_oversized_inputs() {
        assert!(validate_policy_submission(&submission(&"x".repeat(300), "{}")).is_err());
        assert!(
            validate_policy_submission(&submission("name", &"x".repeat(MAX_DOCUMENT_BYTES + 1)))
                .is_err()
        );
    }

    #[test]
    fn rejects_degenerate_nesting() {
        let nested = format!("{}{}{}", "[".repeat(40), "1", "]".repeat(40));
        assert!(validate_policy_submission(&submission("name", &nested)).is_err());
    }
}
