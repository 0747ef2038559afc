//! Form checks shared by every surface. Errors are user-facing sentences.

use shared::{domain::Role, protocol::RegisterRequest};

/// Code non-student roles must present when signing up.
pub const DEFAULT_STAFF_CODE: &str = "DBBLMS";

const SIGNUP_MIN_PASSWORD: usize = 8;
const ADMIN_MIN_PASSWORD: usize = 6;

/// The strength checklist shown next to a password field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordChecks {
    pub min_length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digit: bool,
    pub special: bool,
}

impl PasswordChecks {
    pub fn passed(&self) -> usize {
        [
            self.min_length,
            self.uppercase,
            self.lowercase,
            self.digit,
            self.special,
        ]
        .into_iter()
        .filter(|ok| *ok)
        .count()
    }

    pub fn all_met(&self) -> bool {
        self.passed() == 5
    }
}

pub fn password_checks(password: &str) -> PasswordChecks {
    PasswordChecks {
        min_length: password.chars().count() >= SIGNUP_MIN_PASSWORD,
        uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        digit: password.chars().any(|c| c.is_ascii_digit()),
        special: password.chars().any(|c| !c.is_ascii_alphanumeric()),
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    if domain.contains('@') || domain.chars().any(char::is_whitespace) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// First letter of the first two words, upper-cased.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates a self-service signup and returns the role to create.
pub fn validate_signup(req: &RegisterRequest, staff_code: &str) -> Result<Role, String> {
    let name = req.name.trim();
    if name.chars().count() < 2 {
        return Err("Full name must be at least 2 characters.".into());
    }
    if !is_valid_email(req.email.trim()) {
        return Err("Enter a valid email address.".into());
    }
    if req.password.chars().count() < SIGNUP_MIN_PASSWORD {
        return Err("Password must be at least 8 characters.".into());
    }
    if !req.password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password needs at least one uppercase letter.".into());
    }
    if !req.password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password needs at least one number.".into());
    }
    if req.password != req.confirm_password {
        return Err("Passwords do not match.".into());
    }
    let role = req.role.unwrap_or(Role::Student);
    if role != Role::Student && req.staff_code.as_deref().map(str::trim) != Some(staff_code) {
        return Err("Invalid Staff Code.".into());
    }
    Ok(role)
}

/// Validates an account created from the user-management screen.
pub fn validate_new_user(name: &str, email: &str, password: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required.".into());
    }
    if !is_valid_email(email.trim()) {
        return Err("Enter a valid email address.".into());
    }
    validate_password_reset(password)
}

pub fn validate_password_reset(password: &str) -> Result<(), String> {
    if password.chars().count() < ADMIN_MIN_PASSWORD {
        return Err("Password must be at least 6 characters.".into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
