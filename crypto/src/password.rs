//! Password strength policy.

use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 8;

/// A single rule of the password policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PasswordRule {
    MinLength,
    Lowercase,
    Uppercase,
    Digit,
    Special,
}

impl PasswordRule {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MinLength => "at least 8 characters",
            Self::Lowercase => "a lowercase letter",
            Self::Uppercase => "an uppercase letter",
            Self::Digit => "a digit",
            Self::Special => "a special character",
        }
    }
}

/// Rules `password` fails. Empty means the password is strong.
pub fn password_strength(password: &str) -> Vec<PasswordRule> {
    let mut unmet = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        unmet.push(PasswordRule::MinLength);
    }
    if !password.chars().any(char::is_lowercase) {
        unmet.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(char::is_uppercase) {
        unmet.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        unmet.push(PasswordRule::Digit);
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        unmet.push(PasswordRule::Special);
    }
    unmet
}

pub fn is_password_strong(password: &str) -> bool {
    password_strength(password).is_empty()
}
