//! Users, the identity attached to each request, and permission sets.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::validator::Validator;

/// Passwords longer than this are truncated by bcrypt, so refuse them.
pub const MAX_PASSWORD_BYTES: usize = 72;
pub const MIN_PASSWORD_BYTES: usize = 8;

/// A registered user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    /// Creation time, seconds since the unix epoch.
    pub created_at: u64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub activated: bool,
}

/// Input for creating a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// The caller a request runs on behalf of.
///
/// Set once per request by the authentication stage and read-only after.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(Arc<User>),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn is_activated(&self) -> bool {
        match self {
            Identity::Anonymous => false,
            Identity::User(user) => user.activated,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

/// Permission codes granted to a user, e.g. `entries:read`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn include(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(looks_like_email(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= MIN_PASSWORD_BYTES, "password", "must be at least 8 bytes long");
    v.check(password.len() <= MAX_PASSWORD_BYTES, "password", "must not be more than 72 bytes long");
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.trim().is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
