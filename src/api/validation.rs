//! Input validation for API requests.
//!
//! For collecting multiple validation errors and returning them as an
//! ApiError, use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating coupon codes (uppercase alphanumeric with
    /// dashes/underscores, 3-32 chars)
    static ref COUPON_CODE_REGEX: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9_-]{2,31}$").unwrap();

    /// Regex for validating display names (cities, salons, plans)
    static ref DISPLAY_NAME_REGEX: Regex = Regex::new(r"^[\w&'. -]{1,150}$").unwrap();

    /// Regex for validating HH:MM times of day
    static ref TIME_OF_DAY_REGEX: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
}

/// Validate a coupon code
pub fn validate_coupon_code(code: &str) -> Result<(), String> {
    if code.is_empty() {
        return Err("Coupon code is required".to_string());
    }
    if !COUPON_CODE_REGEX.is_match(code) {
        return Err(
            "Coupon code must be 3-32 uppercase letters, digits, dashes or underscores".to_string(),
        );
    }
    Ok(())
}

/// Validate a display name (city, salon, membership plan)
pub fn validate_display_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }
    if !DISPLAY_NAME_REGEX.is_match(trimmed) {
        return Err("Name contains unsupported characters or is too long".to_string());
    }
    Ok(())
}

/// Validate an opening/closing time in HH:MM form
pub fn validate_time_of_day(value: &str) -> Result<(), String> {
    if TIME_OF_DAY_REGEX.is_match(value) {
        Ok(())
    } else {
        Err("Time must be in HH:MM 24-hour format".to_string())
    }
}

/// Validate a review star rating
pub fn validate_rating(rating: i64) -> Result<(), String> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err("Rating must be between 1 and 5".to_string())
    }
}

/// Minimal email shape check; real verification is the mail system's job
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.contains('@') && !email.starts_with('@') && !email.ends_with('@') {
        Ok(())
    } else {
        Err("Invalid email address".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_codes() {
        assert!(validate_coupon_code("WELCOME10").is_ok());
        assert!(validate_coupon_code("CUT-20_OFF").is_ok());
        assert!(validate_coupon_code("ab").is_err());
        assert!(validate_coupon_code("lowercase").is_err());
        assert!(validate_coupon_code("").is_err());
        assert!(validate_coupon_code("WAY TOO SPACEY").is_err());
    }

    #[test]
    fn test_display_names() {
        assert!(validate_display_name("Shear Genius").is_ok());
        assert!(validate_display_name("Curl & Dye").is_ok());
        assert!(validate_display_name("  ").is_err());
        assert!(validate_display_name("<script>").is_err());
    }

    #[test]
    fn test_times_of_day() {
        assert!(validate_time_of_day("09:30").is_ok());
        assert!(validate_time_of_day("23:59").is_ok());
        assert!(validate_time_of_day("24:00").is_err());
        assert!(validate_time_of_day("9:30").is_err());
    }

    #[test]
    fn test_ratings() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
