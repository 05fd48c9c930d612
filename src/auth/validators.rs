use regex::Regex;
use std::sync::OnceLock;

use super::models::{SignInRequest, SignUpRequest, UpdateProfileRequest};
use crate::common::{ValidationResult, Validator};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 255;
const MAX_EMAIL_LENGTH: usize = 254;

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex pattern")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() <= MAX_EMAIL_LENGTH && email_regex().is_match(email)
}

fn check_email(result: &mut ValidationResult, email: &str) {
    if email.trim().is_empty() {
        result.add_error("email", "Email is required");
    } else if !is_valid_email(email) {
        result.add_error("email", "Email must be a valid email address");
    }
}

fn check_name(result: &mut ValidationResult, name: &str) {
    if name.trim().is_empty() {
        result.add_error("name", "Name is required");
    } else if name.len() > MAX_NAME_LENGTH {
        result.add_error("name", "Name must not exceed 255 characters");
    }
}

pub struct SignUpValidator;

impl Validator<SignUpRequest> for SignUpValidator {
    fn validate(&self, data: &SignUpRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        check_email(&mut result, &data.email);

        if data.password.chars().count() < MIN_PASSWORD_LENGTH {
            result.add_error("password", "Password must be at least 8 characters");
        }

        check_name(&mut result, &data.name);

        result
    }
}

pub struct SignInValidator;

impl Validator<SignInRequest> for SignInValidator {
    fn validate(&self, data: &SignInRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        check_email(&mut result, &data.email);

        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }

        result
    }
}

pub struct UpdateProfileValidator;

impl Validator<UpdateProfileRequest> for UpdateProfileValidator {
    fn validate(&self, data: &UpdateProfileRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        check_name(&mut result, &data.name);

        if let Some(image) = &data.image {
            if !image.is_empty() && !image.starts_with("http://") && !image.starts_with("https://")
            {
                result.add_error(
                    "image",
                    "Image must be a valid URL starting with http:// or https://",
                );
            }
        }

        result
    }
}
