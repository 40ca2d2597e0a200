use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub type UserId = TypedId<User>;

/// A mock identity. The token is a fixed placeholder; nothing in the
/// crate treats the session as a security boundary, it only supplies
/// the owner id for new campaigns.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub token: String,
}

impl TypedIdMarker for User {
    fn tag() -> &'static str {
        "USR"
    }
}

const MOCK_SESSION_TOKEN: &str = "mock-session-token";

/// Explicit session context, created and torn down by the presentation
/// shell and passed to whatever needs the current user.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn new() -> Session {
        Session { user: None }
    }

    pub fn log_in(&mut self, email: impl Into<String>) -> &User {
        let user = User {
            id: UserId::new(),
            email: email.into(),
            token: MOCK_SESSION_TOKEN.to_string(),
        };
        self.user.insert(user)
    }

    pub fn log_out(&mut self) {
        self.user = None;
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}
