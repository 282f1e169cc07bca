//! Request validator (C12).
//!
//! Per-endpoint request DTOs derive `validator::Validate`. Handlers call
//! `validate_request` once at the top, before any business logic runs —
//! execution never begins on a schema failure. Errors come back as a flat
//! list of `{field, message}` pairs, matching the response envelope's
//! `details` shape, not `validator`'s nested per-field error tree.

use validator::{Validate, ValidationErrors};

use crate::error::{FieldError, ValidationError};

/// Maximum number of items accepted in any bulk/array field (e.g. the line
/// specs on loan creation), to keep a single request from becoming a DoS
/// vector.
pub const MAX_BULK_ITEMS: usize = 100;

/// Validate `value` against its `Validate` impl, flattening
/// `validator::ValidationErrors` into the flat `{field, message}` shape
/// used at the HTTP boundary.
///
/// # Errors
///
/// Returns [`ValidationError`] listing every failing field, never just the
/// first.
pub fn validate_request<T: Validate>(value: &T) -> Result<(), ValidationError> {
    value.validate().map_err(flatten)
}

fn flatten(errors: ValidationErrors) -> ValidationError {
    let mut fields = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for err in field_errors {
            let message = err
                .message
                .as_ref()
                .map(std::string::ToString::to_string)
                .unwrap_or_else(|| format!("{field} is invalid"));
            fields.push(FieldError {
                field: (*field).to_owned(),
                message,
            });
        }
    }
    ValidationError { fields }
}

/// Custom validator: reject a slice longer than [`MAX_BULK_ITEMS`].
///
/// # Errors
///
/// Returns a `validator::ValidationError` with code `"bulk_too_large"`.
pub fn validate_bulk_size<T>(items: &[T]) -> Result<(), validator::ValidationError> {
    if items.len() > MAX_BULK_ITEMS {
        let mut err = validator::ValidationError::new("bulk_too_large");
        err.message = Some(
            format!("at most {MAX_BULK_ITEMS} items are allowed per request").into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "name must not be empty"))]
        name: String,
        #[validate(range(min = 1, message = "quantity must be at least 1"))]
        quantity: i64,
    }

    #[test]
    fn reports_every_failing_field() {
        let sample = Sample {
            name: String::new(),
            quantity: 0,
        };
        let err = validate_request(&sample).unwrap_err();
        let fields: Vec<_> = err.fields.iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"quantity"));
    }

    #[test]
    fn valid_value_passes() {
        let sample = Sample {
            name: "ok".to_owned(),
            quantity: 2,
        };
        assert!(validate_request(&sample).is_ok());
    }

    #[test]
    fn bulk_size_over_limit_is_rejected() {
        let items: Vec<u8> = vec![0; MAX_BULK_ITEMS + 1];
        assert!(validate_bulk_size(&items).is_err());
    }

    #[test]
    fn bulk_size_at_limit_is_accepted() {
        let items: Vec<u8> = vec![0; MAX_BULK_ITEMS];
        assert!(validate_bulk_size(&items).is_ok());
    }
}
