//! Request validation on top of the `validator` derive.
//!
//! Constraints are declared on the request structs; custom rules are plain functions
//! referenced by name from the field attributes. Failures are flattened into one
//! `"field: constraint (param=value)"` entry per violation.

use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::errors::ApiError;
use crate::types::AccountType;

/// Custom rule: value must name an account type. Empty is accepted and later resolves
/// to Personal.
pub fn validate_account_type(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.parse::<AccountType>().is_ok() {
        return Ok(());
    }
    Err(ValidationError::new("account_type"))
}

pub fn validate_request<T: Validate>(request: &T) -> Result<(), ApiError> {
    request.validate().map_err(|errors| {
        ApiError::validation_with("Request failed validation.", violations(&errors))
    })
}

/// Every violated constraint, sorted by field path.
pub fn violations(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort();
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            camel_case(field)
        } else {
            format!("{}.{}", prefix, camel_case(field))
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|err| describe(&path, err)));
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

fn describe(path: &str, err: &ValidationError) -> String {
    let mut params: Vec<String> = err
        .params
        .iter()
        .filter(|(name, _)| name.as_ref() != "value")
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    params.sort();

    if params.is_empty() {
        format!("{}: {}", path, err.code)
    } else {
        format!("{}: {} ({})", path, err.code, params.join(", "))
    }
}

/// Field names are reported the way they appear on the wire.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
