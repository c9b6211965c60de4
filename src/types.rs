/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// User name recorded as owner of records created by anonymous callers
pub const GUEST_USER: &str = "Guest";

/// Who is making the current request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user", rename_all = "lowercase")]
pub enum Identity {
    Guest,
    User(String),
}

impl Identity {
    pub fn user(name: impl Into<String>) -> Self {
        Identity::User(name.into())
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest)
    }

    /// User name as stored in `owner` fields
    pub fn name(&self) -> &str {
        match self {
            Identity::Guest => GUEST_USER,
            Identity::User(name) => name,
        }
    }

    /// True when this caller is the authenticated owner `owner`.
    /// Guests never own anything, even records they created.
    pub fn owns(&self, owner: &str) -> bool {
        match self {
            Identity::Guest => false,
            Identity::User(name) => name == owner,
        }
    }
}

/// Mutating store operations, used for permission checks and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "insert"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}
