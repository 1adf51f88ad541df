//! Session values shared by the local and the remote sign-in paths.

use chrono::{DateTime, Utc};
use db::models::{Role, User};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const LOCAL_TOKEN_PREFIX: &str = "local-token-";
const LOCAL_REFRESH_TOKEN: &str = "local-refresh-token";
const SESSION_LIFETIME: i64 = 3600;

/// The acting identity, shaped like the users of the remote auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
}

impl Actor {
    /// Synthesizes the identity of a user matched in the local store
    pub fn from_local(user: &User, now: DateTime<Utc>) -> Self {
        let now = now.to_rfc3339();

        Self {
            id: user.id.to_string(),
            email: Some(user.email.clone()),
            phone: Some(user.phone.clone().unwrap_or_default()),
            app_metadata: json!({}),
            user_metadata: json!({ "full_name": user.name, "srn": user.srn() }),
            aud: Some("authenticated".to_string()),
            role: Some("authenticated".to_string()),
            created_at: Some(now.clone()),
            updated_at: Some(now.clone()),
            confirmed_at: Some(now.clone()),
            last_sign_in_at: Some(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub user: Actor,
}

impl AccessSession {
    /// Fabricated bearer session for a local sign-in
    pub fn local(user: Actor, now: DateTime<Utc>) -> Self {
        Self {
            access_token: format!("{}{}", LOCAL_TOKEN_PREFIX, now.timestamp_millis()),
            refresh_token: LOCAL_REFRESH_TOKEN.to_string(),
            expires_in: SESSION_LIFETIME,
            token_type: "bearer".to_string(),
            user,
        }
    }
}

/// Everything a local sign-in stores, serialized as one JSON blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub user: Actor,
    pub session: AccessSession,
    pub role: Option<Role>,
    #[serde(rename = "relatedStudent", default)]
    pub related_student: Option<User>,
}

impl PersistedSession {
    pub fn local(
        user: &User,
        role: Role,
        related_student: Option<User>,
        now: DateTime<Utc>,
    ) -> Self {
        let actor = Actor::from_local(user, now);

        Self {
            session: AccessSession::local(actor.clone(), now),
            user: actor,
            role: Some(role),
            related_student,
        }
    }
}

/// Where a local session is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    /// Survives restarts ("remember me")
    Durable,
    /// Lives as long as the current context
    Tab,
}

impl SessionScope {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            SessionScope::Durable
        } else {
            SessionScope::Tab
        }
    }
}

/// Who is acting, in which role, and which student they are looking at
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<Actor>,
    pub session: Option<AccessSession>,
    pub role: Option<Role>,
    pub related_student: Option<User>,
    pub is_loading: bool,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }
}

impl From<PersistedSession> for AuthState {
    fn from(persisted: PersistedSession) -> Self {
        Self {
            user: Some(persisted.user),
            session: Some(persisted.session),
            role: persisted.role,
            related_student: persisted.related_student,
            is_loading: false,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum InitialSession {
    Local(PersistedSession),
    Remote(AccessSession),
    Anonymous,
}

/// A session persisted locally always wins over the remote one.
pub fn resolve_initial(
    local: Option<PersistedSession>,
    remote: Option<AccessSession>,
) -> InitialSession {
    match (local, remote) {
        (Some(local), _) => InitialSession::Local(local),
        (None, Some(remote)) => InitialSession::Remote(remote),
        (None, None) => InitialSession::Anonymous,
    }
}
