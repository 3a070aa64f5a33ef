//! Form validation and input sanitising

use postdesk_api::{Credentials, PostInput};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static JAVASCRIPT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").unwrap());
static INLINE_HANDLER_DOUBLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)on\w+\s*=\s*"[^"]*""#).unwrap());
static INLINE_HANDLER_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on\w+\s*=\s*'[^']*'").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const PASSWORD_SPECIALS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?"#;

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const BODY_MIN: usize = 10;
pub const BODY_MAX: usize = 1000;
pub const PASSWORD_MIN: usize = 8;

/// Strip script blocks, `javascript:` URLs and inline event handlers, then trim
pub fn sanitize_input(value: &str) -> String {
    let value = SCRIPT_BLOCK.replace_all(value, "");
    let value = JAVASCRIPT_URL.replace_all(&value, "");
    let value = INLINE_HANDLER_DOUBLE.replace_all(&value, "");
    let value = INLINE_HANDLER_SINGLE.replace_all(&value, "");
    value.trim().to_string()
}

/// Validation messages keyed by field name, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }
        Ok(())
    }
}

/// Raw post form contents as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostForm {
    pub user_id: String,
    pub title: String,
    pub body: String,
}

impl PostForm {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

fn check_length(value: &str, min: usize, max: usize) -> Option<String> {
    let len = value.chars().count();
    if len < min {
        Some(format!("Must be at least {} characters", min))
    } else if len > max {
        Some(format!("Must not exceed {} characters", max))
    } else {
        None
    }
}

/// Validate a post form, returning the sanitised input
pub fn validate_post_form(form: &PostForm) -> Result<PostInput, FieldErrors> {
    let mut errors = FieldErrors::new();

    let user_id = sanitize_input(&form.user_id);
    let title = sanitize_input(&form.title);
    let body = sanitize_input(&form.body);

    let parsed_user_id = if user_id.is_empty() {
        errors.insert("userId", "Please fill in this field");
        0
    } else {
        match user_id.parse::<i64>() {
            Ok(id) if id >= 1 => id,
            _ => {
                errors.insert("userId", "User ID must be a valid number");
                0
            }
        }
    };

    if title.is_empty() {
        errors.insert("title", "Please fill in this field");
    } else if let Some(message) = check_length(&title, TITLE_MIN, TITLE_MAX) {
        errors.insert("title", message);
    }

    if body.is_empty() {
        errors.insert("body", "Please fill in this field");
    } else if let Some(message) = check_length(&body, BODY_MIN, BODY_MAX) {
        errors.insert("body", message);
    }

    errors.into_result(PostInput::new(parsed_user_id, title, body))
}

/// What a password still lacks, in display order
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN {
        problems.push("at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("one uppercase letter (A-Z)");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("one lowercase letter (a-z)");
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        problems.push("one special character (!@#$%^&*)");
    }
    problems
}

/// Validate login credentials, returning them with the username sanitised
pub fn validate_login_form(credentials: &Credentials) -> Result<Credentials, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = sanitize_input(&credentials.username);
    let password = sanitize_input(&credentials.password);

    if username.is_empty() {
        errors.insert("username", "Please fill in this field");
    } else if !EMAIL.is_match(&username) {
        errors.insert("username", "Please enter a valid email address");
    }

    if password.is_empty() {
        errors.insert("password", "Please fill in this field");
    } else {
        let problems = password_problems(&password);
        match problems.as_slice() {
            [] => {}
            [only] => errors.insert("password", format!("Password needs {}", only)),
            many => errors.insert("password", format!("Password needs: {}", many.join(", "))),
        }
    }

    // The password is checked in sanitised form but passed on as typed
    errors.into_result(Credentials::new(username, credentials.password.clone()))
}
