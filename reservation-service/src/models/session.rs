//! Browser session records held by the session store.

use serde::Serialize;
use std::fmt;

/// Opaque session identifier carried in the `session_id` cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs.
    pub fn redacted(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.redacted())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.redacted())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoggingIn,
    LoggedIn,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoggingIn => "logging-in",
            Stage::LoggedIn => "logged-in",
        }
    }
}

/// Handshake in flight: holds the temporary token secret needed to sign
/// the access-token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct LoggingIn {
    pub token_secret: String,
}

impl fmt::Debug for LoggingIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingIn")
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Identity confirmed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedIn {
    pub user_id: i64,
    pub name: String,
    pub is_approver: bool,
    pub has_accepted_terms: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    LoggingIn(LoggingIn),
    LoggedIn(LoggedIn),
}

impl Session {
    pub fn stage(&self) -> Stage {
        match self {
            Session::LoggingIn(_) => Stage::LoggingIn,
            Session::LoggedIn(_) => Stage::LoggedIn,
        }
    }

    pub fn as_logging_in(&self) -> Option<&LoggingIn> {
        match self {
            Session::LoggingIn(inner) => Some(inner),
            Session::LoggedIn(_) => None,
        }
    }

    pub fn as_logged_in(&self) -> Option<&LoggedIn> {
        match self {
            Session::LoggedIn(inner) => Some(inner),
            Session::LoggingIn(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let session = Session::LoggingIn(LoggingIn {
            token_secret: "very-secret".to_string(),
        });
        assert!(!format!("{:?}", session).contains("very-secret"));

        let id = SessionId::from("0123456789abcdef");
        assert_eq!(format!("{}", id), "01234567…");
        assert!(!format!("{:?}", id).contains("89abcdef"));
    }

    #[test]
    fn stage_follows_variant() {
        let logged_in = Session::LoggedIn(LoggedIn {
            user_id: 7,
            name: "Ada Lovelace".to_string(),
            is_approver: false,
            has_accepted_terms: false,
        });
        assert_eq!(logged_in.stage(), Stage::LoggedIn);
        assert!(logged_in.as_logging_in().is_none());
        assert_eq!(logged_in.as_logged_in().map(|s| s.user_id), Some(7));
    }
}
