use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Request body for login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_name: String,
    pub token: String,
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: i64,
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_user_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("userName is required".into()));
    }
    Ok(name.to_string())
}

pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("invalid email".into()));
    }
    Ok(email)
}

pub fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Parses a path segment as a non-negative user id.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<u64>()
        .ok()
        .and_then(|id| i64::try_from(id).ok())
        .ok_or_else(|| ApiError::Validation(format!("invalid id given {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_non_negative_integers() {
        assert_eq!(parse_id("0").unwrap(), 0);
        assert_eq!(parse_id("42").unwrap(), 42);
    }

    #[test]
    fn parse_id_cites_raw_segment() {
        for raw in ["abc", "-1", "1.5", "", "99999999999999999999"] {
            let err = parse_id(raw).unwrap_err();
            assert_eq!(err.to_string(), format!("invalid id given {raw}"));
        }
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.com ").unwrap(), "a@x.com");
        assert!(normalize_email("not-an-email").is_err());
    }

    #[test]
    fn user_name_and_password_rules() {
        assert_eq!(normalize_user_name(" alice ").unwrap(), "alice");
        assert!(normalize_user_name("   ").is_err());
        assert!(check_password("secret1").is_ok());
        assert!(check_password("short").is_err());
    }

    #[test]
    fn request_bodies_use_camel_case() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"userName":"alice","email":"a@x.com","password":"secret1"}"#,
        )
        .unwrap();
        assert_eq!(req.user_name, "alice");

        let resp = serde_json::to_value(LoginResponse {
            user_name: "alice".into(),
            token: "t".into(),
        })
        .unwrap();
        assert_eq!(resp, serde_json::json!({ "userName": "alice", "token": "t" }));
    }
}
