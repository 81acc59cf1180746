//! Input shape rules for account requests.
//!
//! Each validator checks every field and returns all failures at once, in
//! field order, so a client can fix a form in one round trip.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::dto::{ChangePasswordRequest, LoginRequest, SignupRequest, UpdateUserRequest};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_EMAIL_LEN: usize = 254;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9+\-\s()]+$").unwrap();
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password: String,
    pub phone_num: String,
    pub course: String,
    pub city: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInput {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub phone_num: Option<String>,
    pub course: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

fn required<T>(field: &str, value: Option<T>, errors: &mut Vec<String>) -> Option<T> {
    if value.is_none() {
        errors.push(format!("\"{field}\" is required"));
    }
    value
}

fn string(field: &str, value: Value, errors: &mut Vec<String>) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => {
            errors.push(format!("\"{field}\" must be a string"));
            None
        }
    }
}

fn check_text(field: &str, value: Value, errors: &mut Vec<String>) -> Option<String> {
    let value = string(field, value, errors)?;
    let len = value.chars().count();
    if !(2..=100).contains(&len) {
        errors.push(format!("\"{field}\" length must be between 2 and 100 characters"));
    }
    Some(value)
}

/// Numbers and numeric strings are accepted as long as they hold a whole
/// number, so `30`, `30.0` and `"30"` all read as 30.
fn check_age(value: Value, errors: &mut Vec<String>) -> Option<i32> {
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(number) = number.filter(|n| n.is_finite()) else {
        errors.push("\"age\" must be a number".into());
        return None;
    };
    if number.fract() != 0.0 {
        errors.push("\"age\" must be an integer".into());
        return None;
    }
    if !(1.0..=120.0).contains(&number) {
        errors.push("\"age\" must be between 1 and 120".into());
        return None;
    }
    Some(number as i32)
}

fn check_email(value: Value, errors: &mut Vec<String>) -> Option<String> {
    let value = normalize_email(&string("email", value, errors)?);
    if value.chars().count() > MAX_EMAIL_LEN {
        errors.push(format!(
            "\"email\" length must be less than or equal to {MAX_EMAIL_LEN} characters long"
        ));
    } else if !is_valid_email(&value) {
        errors.push("\"email\" must be a valid email".into());
    }
    Some(value)
}

fn check_password(field: &str, value: Value, errors: &mut Vec<String>) -> Option<String> {
    let value = string(field, value, errors)?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "\"{field}\" length must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    Some(value)
}

fn check_phone(value: Value, errors: &mut Vec<String>) -> Option<String> {
    let value = string("phoneNum", value, errors)?;
    if !PHONE_RE.is_match(&value) {
        errors.push("\"phoneNum\" may only contain digits, spaces and + - ( )".into());
    }
    let len = value.chars().count();
    if !(10..=15).contains(&len) {
        errors.push("\"phoneNum\" length must be between 10 and 15 characters".into());
    }
    Some(value)
}

fn reject_unknown(unknown: &Map<String, Value>, errors: &mut Vec<String>) {
    errors.extend(unknown.keys().map(|key| format!("\"{key}\" is not allowed")));
}

pub fn validate_signup(req: SignupRequest) -> Result<SignupInput, Vec<String>> {
    let mut errors = Vec::new();

    let name = required("name", req.name, &mut errors).and_then(|v| check_text("name", v, &mut errors));
    let age = required("age", req.age, &mut errors).and_then(|v| check_age(v, &mut errors));
    let email = required("email", req.email, &mut errors).and_then(|v| check_email(v, &mut errors));
    let password = required("password", req.password, &mut errors)
        .and_then(|v| check_password("password", v, &mut errors));
    let phone_num = required("phoneNum", req.phone_num, &mut errors).and_then(|v| check_phone(v, &mut errors));
    let course = required("course", req.course, &mut errors).and_then(|v| check_text("course", v, &mut errors));
    let city = required("city", req.city, &mut errors).and_then(|v| check_text("city", v, &mut errors));
    reject_unknown(&req.unknown, &mut errors);

    match (name, age, email, password, phone_num, course, city) {
        (Some(name), Some(age), Some(email), Some(password), Some(phone_num), Some(course), Some(city))
            if errors.is_empty() =>
        {
            Ok(SignupInput {
                name,
                age,
                email,
                password,
                phone_num,
                course,
                city,
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_login(req: LoginRequest) -> Result<LoginInput, Vec<String>> {
    let mut errors = Vec::new();

    let email = required("email", req.email, &mut errors).and_then(|v| check_email(v, &mut errors));
    let password =
        required("password", req.password, &mut errors).and_then(|v| string("password", v, &mut errors));
    if password.as_deref() == Some("") {
        errors.push("\"password\" is not allowed to be empty".into());
    }
    reject_unknown(&req.unknown, &mut errors);

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(LoginInput { email, password }),
        _ => Err(errors),
    }
}

pub fn validate_update(req: UpdateUserRequest) -> Result<UpdateInput, Vec<String>> {
    let mut errors = Vec::new();

    if req.name.is_none()
        && req.age.is_none()
        && req.email.is_none()
        && req.phone_num.is_none()
        && req.course.is_none()
        && req.city.is_none()
        && req.unknown.is_empty()
    {
        return Err(vec!["body must contain at least one field".into()]);
    }

    let input = UpdateInput {
        name: req.name.and_then(|v| check_text("name", v, &mut errors)),
        age: req.age.and_then(|v| check_age(v, &mut errors)),
        email: req.email.and_then(|v| check_email(v, &mut errors)),
        phone_num: req.phone_num.and_then(|v| check_phone(v, &mut errors)),
        course: req.course.and_then(|v| check_text("course", v, &mut errors)),
        city: req.city.and_then(|v| check_text("city", v, &mut errors)),
    };
    reject_unknown(&req.unknown, &mut errors);

    if errors.is_empty() {
        Ok(input)
    } else {
        Err(errors)
    }
}

pub fn validate_change_password(req: ChangePasswordRequest) -> Result<ChangePasswordInput, Vec<String>> {
    let present = |v: Option<Value>| match v {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };
    let (Some(old_password), Some(new_password)) = (present(req.old_password), present(req.new_password))
    else {
        return Err(vec!["Both old and new passwords are required".into()]);
    };

    let mut errors = Vec::new();
    let new_password = check_password("newPassword", Value::String(new_password), &mut errors);
    match new_password {
        Some(new_password) if errors.is_empty() => Ok(ChangePasswordInput {
            old_password,
            new_password,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ann() -> SignupRequest {
        SignupRequest {
            name: Some("Ann".into()),
            age: Some(30.into()),
            email: Some("a@x.com".into()),
            password: Some("secret1".into()),
            phone_num: Some("1234567890".into()),
            course: Some("CS".into()),
            city: Some("NY".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_signup() {
        let input = validate_signup(ann()).expect("valid");
        assert_eq!(input.email, "a@x.com");
        assert_eq!(input.age, 30);
    }

    #[test]
    fn signup_normalizes_email() {
        let input = validate_signup(SignupRequest {
            email: Some("  Ann@X.COM ".into()),
            ..ann()
        })
        .expect("valid");
        assert_eq!(input.email, "ann@x.com");
    }

    #[test]
    fn signup_collects_every_error() {
        let errors = validate_signup(SignupRequest {
            name: Some("A".into()),
            age: Some(121.into()),
            email: Some("not-an-email".into()),
            password: Some("short".into()),
            phone_num: None,
            ..ann()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors[0].contains("\"name\""));
        assert!(errors[1].contains("\"age\""));
        assert!(errors[2].contains("\"email\""));
        assert!(errors[3].contains("\"password\""));
        assert_eq!(errors[4], "\"phoneNum\" is required");
    }

    #[test]
    fn empty_signup_reports_all_missing_fields() {
        let errors = validate_signup(SignupRequest::default()).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.iter().all(|e| e.ends_with("is required")));
    }

    #[test]
    fn wrong_types_are_reported_per_field() {
        let errors = validate_signup(SignupRequest {
            name: Some(json!(42)),
            city: Some(json!(["NY"])),
            ..ann()
        })
        .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "\"name\" must be a string".to_string(),
                "\"city\" must be a string".to_string(),
            ]
        );
    }

    #[test]
    fn signup_rejects_unknown_keys() {
        let mut req = ann();
        req.unknown.insert("role".into(), json!("admin"));
        let errors = validate_signup(req).unwrap_err();
        assert_eq!(errors, vec!["\"role\" is not allowed".to_string()]);
    }

    #[test]
    fn phone_rules() {
        let mut errors = Vec::new();
        check_phone("+1 555-123-4567".into(), &mut errors);
        assert!(errors.is_empty(), "{errors:?}");

        check_phone("12345".into(), &mut errors);
        assert_eq!(errors.len(), 1);

        errors.clear();
        check_phone("12345abcde".into(), &mut errors);
        assert_eq!(errors.len(), 1);

        errors.clear();
        check_phone("1234567890123456".into(), &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn age_bounds() {
        let mut errors = Vec::new();
        assert_eq!(check_age(json!(1), &mut errors), Some(1));
        assert_eq!(check_age(json!(120), &mut errors), Some(120));
        assert_eq!(check_age(json!(0), &mut errors), None);
        assert_eq!(check_age(json!(-4), &mut errors), None);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn age_converts_whole_numbers() {
        let mut errors = Vec::new();
        assert_eq!(check_age(json!("30"), &mut errors), Some(30));
        assert_eq!(check_age(json!(30.0), &mut errors), Some(30));
        assert_eq!(check_age(json!(" 45 "), &mut errors), Some(45));
        assert!(errors.is_empty(), "{errors:?}");

        assert_eq!(check_age(json!(30.5), &mut errors), None);
        assert_eq!(check_age(json!("thirty"), &mut errors), None);
        assert_eq!(check_age(json!(true), &mut errors), None);
        assert_eq!(
            errors,
            vec![
                "\"age\" must be an integer".to_string(),
                "\"age\" must be a number".to_string(),
                "\"age\" must be a number".to_string(),
            ]
        );
    }

    #[test]
    fn email_length_is_capped() {
        let mut errors = Vec::new();
        let longest = format!("{}@x.com", "a".repeat(MAX_EMAIL_LEN - 6));
        assert_eq!(longest.len(), MAX_EMAIL_LEN);
        assert!(check_email(longest.into(), &mut errors).is_some());
        assert!(errors.is_empty(), "{errors:?}");

        let too_long = format!("{}@x.com", "a".repeat(300));
        check_email(too_long.into(), &mut errors);
        assert_eq!(
            errors,
            vec!["\"email\" length must be less than or equal to 254 characters long".to_string()]
        );
    }

    #[test]
    fn login_requires_non_empty_password() {
        let errors = validate_login(LoginRequest {
            email: Some("a@x.com".into()),
            password: Some("".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(errors, vec!["\"password\" is not allowed to be empty".to_string()]);

        let errors = validate_login(LoginRequest::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn update_needs_at_least_one_field() {
        let errors = validate_update(UpdateUserRequest::default()).unwrap_err();
        assert_eq!(errors, vec!["body must contain at least one field".to_string()]);
    }

    #[test]
    fn update_validates_present_fields_only() {
        let input = validate_update(UpdateUserRequest {
            city: Some("LA".into()),
            ..Default::default()
        })
        .expect("valid");
        assert_eq!(input.city.as_deref(), Some("LA"));
        assert!(input.name.is_none());

        let errors = validate_update(UpdateUserRequest {
            city: Some("L".into()),
            age: Some(0.into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn update_rejects_password_field() {
        let mut req = UpdateUserRequest {
            city: Some("LA".into()),
            ..Default::default()
        };
        req.unknown.insert("password".into(), json!("hunter22"));
        let errors = validate_update(req).unwrap_err();
        assert_eq!(errors, vec!["\"password\" is not allowed".to_string()]);
    }

    #[test]
    fn change_password_requires_both() {
        let errors = validate_change_password(ChangePasswordRequest {
            old_password: Some("secret1".into()),
            new_password: None,
        })
        .unwrap_err();
        assert_eq!(errors, vec!["Both old and new passwords are required".to_string()]);

        let errors = validate_change_password(ChangePasswordRequest {
            old_password: Some("secret1".into()),
            new_password: Some("abc".into()),
        })
        .unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
