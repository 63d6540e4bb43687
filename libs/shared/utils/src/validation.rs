use std::sync::OnceLock;

use regex::Regex;

use shared_models::error::AppError;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern compiles")
    })
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() <= 254 && email_regex().is_match(email) {
        Ok(())
    } else {
        Err(AppError::ValidationError("Invalid email address".to_string()))
    }
}

/// Character-count bounds, inclusive on both ends.
pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len < min {
        return Err(AppError::ValidationError(format!(
            "{} must be at least {} characters",
            field, min
        )));
    }
    if len > max {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn validate_optional_length(
    field: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) => validate_length(field, v, min, max),
        None => Ok(()),
    }
}

pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), AppError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        Err(AppError::ValidationError(format!(
            "{} must be between {} and {}",
            field, min, max
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(validate_email("jane.doe+clinic@example.org").is_ok());
        assert!(validate_email("no-at-sign.example.org").is_err());
        assert!(validate_email("jane@localhost").is_err());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(validate_length("symptoms_text", "головаболит", 10, 5000).is_ok());
        assert!(validate_length("symptoms_text", "short", 10, 5000).is_err());
    }

    #[test]
    fn range_is_inclusive() {
        assert!(validate_range("experience_years", 0, 0, 70).is_ok());
        assert!(validate_range("experience_years", 70, 0, 70).is_ok());
        assert!(validate_range("experience_years", 71, 0, 70).is_err());
    }
}
