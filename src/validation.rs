use crate::errors::AppError;
use crate::models::{ApplicantProfile, CoverageForm};
use serde_json::Value;

const MISSING_FIELDS: &str = "All fields are required";

/// Age and dependents are stored as 32-bit signed integers.
const MAX_COUNT: f64 = i32::MAX as f64;

/// Checks a submitted form and converts it into an [`ApplicantProfile`].
///
/// Name, age, city and annual income must be present and non-empty (a zero
/// counts as empty); dependents only has to be present, so `0` is accepted.
/// Numbers may arrive as JSON numbers or numeric strings. Strings are read
/// like `parseInt`: leading whitespace, an optional sign, then the leading
/// decimal digits, ignoring anything after them.
pub fn validate_form(form: &CoverageForm) -> Result<ApplicantProfile, AppError> {
    let name = required_text(form.name.as_ref(), "name")?;
    let city = required_text(form.city.as_ref(), "city")?;

    let age_raw = form.age.as_ref().filter(|v| !is_blank(v));
    let income_raw = form.annual_income.as_ref().filter(|v| !is_blank(v));
    let dependents_raw = form.dependents.as_ref().filter(|v| !v.is_null());

    let (Some(age_raw), Some(income_raw), Some(dependents_raw)) =
        (age_raw, income_raw, dependents_raw)
    else {
        return Err(AppError::BadRequest(MISSING_FIELDS.to_string()));
    };

    let age = whole_number(age_raw, "age")?;
    let annual_income = whole_number(income_raw, "annualIncome")?;
    let dependents = whole_number(dependents_raw, "dependents")?;

    if age <= 0.0 || age > MAX_COUNT {
        return Err(AppError::BadRequest(
            "age must be a positive whole number".to_string(),
        ));
    }
    if annual_income <= 0.0 {
        return Err(AppError::BadRequest(
            "annualIncome must be greater than zero".to_string(),
        ));
    }
    if dependents < 0.0 {
        return Err(AppError::BadRequest(
            "dependents cannot be negative".to_string(),
        ));
    }
    if dependents > MAX_COUNT {
        return Err(AppError::BadRequest("dependents is too large".to_string()));
    }

    Ok(ApplicantProfile {
        name,
        age: age as u32,
        city,
        annual_income,
        dependents: dependents as u32,
    })
}

fn required_text(value: Option<&Value>, field: &str) -> Result<String, AppError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(v) if !is_blank(v) => Err(AppError::BadRequest(format!("{} must be text", field))),
        _ => Err(AppError::BadRequest(MISSING_FIELDS.to_string())),
    }
}

/// Null, `0`, `""` and `false` count as not filled in.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn whole_number(value: &Value, field: &str) -> Result<f64, AppError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()).map(f64::trunc),
        Value::String(s) => leading_integer(s),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::BadRequest(format!("{} must be a number", field)))
}

/// `"  42abc"` reads as 42 and `"1e3"` as 1; no leading digits is `None`.
fn leading_integer(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let magnitude: f64 = rest[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
