//! Who is looking at which feed, and with what credential

use crate::types::UserId;

/// Credential presented on every backing store call.
///
/// Session tokens and JWT bearers are both accepted. The credential is an
/// explicit argument to each call, never a default header on the client.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credential {
    /// No credential; only public reads are possible
    #[default]
    Anonymous,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Token <token>`
    Session(String),
}

impl Credential {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credential::Anonymous)
    }

    /// Value for the `Authorization` header, if any
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Credential::Anonymous => None,
            Credential::Bearer(token) => Some(format!("Bearer {}", token)),
            Credential::Session(token) => Some(format!("Token {}", token)),
        }
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credential::Session(_) => f.write_str("Session(<redacted>)"),
        }
    }
}

/// Whose feed is being viewed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TargetIdentity {
    /// The global feed
    #[default]
    All,
    /// A single user's feed
    User(UserId),
}

impl TargetIdentity {
    pub fn user(id: impl Into<UserId>) -> Self {
        TargetIdentity::User(id.into())
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            TargetIdentity::All => None,
            TargetIdentity::User(id) => Some(id),
        }
    }
}

impl std::fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetIdentity::All => f.write_str("all"),
            TargetIdentity::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// The session viewing the feed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerIdentity {
    pub user_id: Option<UserId>,
    pub credential: Credential,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: impl Into<UserId>, credential: Credential) -> Self {
        Self {
            user_id: Some(user_id.into()),
            credential,
        }
    }

    /// A caller counts as authenticated when it has both an account and a
    /// non-anonymous credential
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && !self.credential.is_anonymous()
    }
}
