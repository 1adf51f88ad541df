//! Remote backend speaking to a Supabase project over HTTP.

use async_trait::async_trait;
use db::models::Role;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};

use crate::{
    remote::{AuthChange, AuthChangeEvent, RemoteBackend, AUTH_CHANNEL_CAPACITY},
    session::{AccessSession, Actor},
    RemoteError,
};

pub struct SupabaseBackend {
    url: String,
    key: String,
    redirect_to: Option<String>,
    http_client: Client,
    current_session: RwLock<Option<AccessSession>>,
    changes: broadcast::Sender<AuthChange>,
}

#[derive(Deserialize)]
struct RoleRow {
    role: Role,
}

impl SupabaseBackend {
    /// `redirect_to` is the address confirmation emails send new accounts back to
    pub fn new(url: &str, key: &str, redirect_to: Option<String>) -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);

        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            redirect_to,
            http_client: Client::new(),
            current_session: RwLock::new(None),
            changes,
        }
    }

    async fn set_session(&self, session: Option<AccessSession>, event: AuthChangeEvent) {
        *self.current_session.write().await = session.clone();

        // No receiver simply means nobody listens yet
        let _ = self.changes.send(AuthChange { event, session });
    }

    /// Bearer used for table access: the signed-in user's token, or the anon key
    async fn bearer(&self) -> String {
        match &*self.current_session.read().await {
            Some(session) => format!("Bearer {}", session.access_token),
            None => format!("Bearer {}", self.key),
        }
    }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await?;
        Err(RemoteError::Api {
            status,
            message: error_message(&error_text),
        })
    }
}

/// Pulls the human readable part out of an auth or PostgREST error body
fn error_message(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.to_string(),
    };

    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl RemoteBackend for SupabaseBackend {
    async fn get_session(&self) -> Result<Option<AccessSession>, RemoteError> {
        Ok(self.current_session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccessSession, RemoteError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let session: AccessSession = Self::check(response).await?.json().await?;
        self.set_session(Some(session.clone()), AuthChangeEvent::SignedIn)
            .await;

        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<Actor>, RemoteError> {
        let url = format!("{}/auth/v1/signup", self.url);

        let mut request = self.http_client.post(&url).header("apikey", &self.key);
        if let Some(redirect_to) = &self.redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }

        let payload = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let response = request.json(&payload).send().await?;
        let body: Value = Self::check(response).await?.json().await?;

        // Auto-confirmed projects answer with a session, the others with the bare user
        if body.get("access_token").is_some() {
            let session: AccessSession = serde_json::from_value(body)?;
            let user = session.user.clone();
            self.set_session(Some(session), AuthChangeEvent::SignedIn)
                .await;
            Ok(Some(user))
        } else if body.get("id").is_some() {
            Ok(Some(serde_json::from_value(body)?))
        } else {
            Ok(None)
        }
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let session = match self.current_session.read().await.clone() {
            Some(session) => session,
            None => return Ok(()),
        };

        self.set_session(None, AuthChangeEvent::SignedOut).await;

        let url = format!("{}/auth/v1/logout", self.url);
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>, RemoteError> {
        let url = format!("{}/rest/v1/user_roles", self.url);
        let user_filter = format!("eq.{}", user_id);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", self.bearer().await)
            .query(&[("select", "role"), ("user_id", user_filter.as_str())])
            .send()
            .await?;

        let rows: Vec<RoleRow> = Self::check(response).await?.json().await?;
        match rows.as_slice() {
            [row] => Ok(Some(row.role)),
            _ => Ok(None),
        }
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), RemoteError> {
        let url = format!("{}/rest/v1/{}", self.url, table);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", self.bearer().await)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
