//! Schema-level input checks.
//!
//! Each check appends to a [`FieldErrors`] map; [`finish`] turns a non-empty
//! map into [`WorkflowError::Validation`], so one response reports every bad
//! field at once.

use crate::error::{FieldErrors, WorkflowError};
use crate::types::ShippingAddress;
use regex::Regex;
use std::sync::LazyLock;

static ZIP_CODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").ok());

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// `value` must be greater than zero.
pub fn positive(errors: &mut FieldErrors, field: &str, value: i32) {
    if value <= 0 {
        push(errors, field, "Must be a positive number");
    }
}

/// `value` must lie in `min..=max`.
pub fn range(errors: &mut FieldErrors, field: &str, value: i32, min: i32, max: i32) {
    if !(min..=max).contains(&value) {
        push(errors, field, format!("Must be between {min} and {max}"));
    }
}

/// Character count of `value` must lie in `min..=max`.
pub fn length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min {
        push(errors, field, format!("Must contain at least {min} character(s)"));
    } else if len > max {
        push(errors, field, format!("Must contain at most {max} character(s)"));
    }
}

/// Check a shipping address, reporting fields as `shippingAddress.<field>`.
pub fn shipping_address(errors: &mut FieldErrors, address: &ShippingAddress) {
    length(errors, "shippingAddress.street1", &address.street1, 1, 200);
    if let Some(street2) = &address.street2 {
        length(errors, "shippingAddress.street2", street2, 0, 200);
    }
    length(errors, "shippingAddress.city", &address.city, 1, 100);
    if address.state.chars().count() != 2 {
        push(errors, "shippingAddress.state", "Must be exactly 2 characters");
    }
    let zip_ok = ZIP_CODE
        .as_ref()
        .is_some_and(|re| re.is_match(&address.zip_code));
    if !zip_ok {
        push(errors, "shippingAddress.zipCode", "Invalid ZIP code");
    }
}

/// Fail with every collected error, if any.
///
/// # Errors
///
/// Returns [`WorkflowError::Validation`] when `errors` is non-empty.
pub fn finish(errors: FieldErrors) -> Result<(), WorkflowError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(zip: &str, state: &str) -> ShippingAddress {
        ShippingAddress {
            street1: "500 Congress Ave".into(),
            street2: None,
            city: "Austin".into(),
            state: state.into(),
            zip_code: zip.into(),
            country: "US".into(),
        }
    }

    #[test]
    fn zip_codes() {
        for (zip, ok) in [("78701", true), ("78701-1234", true), ("7870", false), ("78701-12", false), ("ABCDE", false)] {
            let mut errors = FieldErrors::new();
            shipping_address(&mut errors, &address(zip, "TX"));
            assert_eq!(errors.is_empty(), ok, "zip {zip}");
        }
    }

    #[test]
    fn collects_every_field() {
        let mut errors = FieldErrors::new();
        let mut bad = address("1", "Texas");
        bad.street1.clear();
        shipping_address(&mut errors, &bad);
        assert_eq!(errors.len(), 3);
        assert!(matches!(finish(errors), Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn numeric_bounds() {
        let mut errors = FieldErrors::new();
        positive(&mut errors, "quantity", 1);
        range(&mut errors, "refills", 12, 0, 12);
        assert!(errors.is_empty());
        range(&mut errors, "refills", 13, 0, 12);
        assert_eq!(errors["refills"], vec!["Must be between 0 and 12".to_string()]);
    }
}
