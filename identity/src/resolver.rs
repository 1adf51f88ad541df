use std::sync::Arc;

use chrono::Utc;
use db::{
    models::{NewUser, Profile, Role, User},
    Database, Storage, StorageError,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::{
    remote::{AuthChange, RemoteBackend},
    session::{
        resolve_initial, AccessSession, AuthState, InitialSession, PersistedSession, SessionScope,
    },
    AuthError, SESSION_KEY,
};

/// The two places a local session can be persisted
pub struct SessionTiers {
    pub durable: Box<dyn Storage>,
    pub tab: Box<dyn Storage>,
}

impl SessionTiers {
    fn get_mut(&mut self, scope: SessionScope) -> &mut dyn Storage {
        match scope {
            SessionScope::Durable => self.durable.as_mut(),
            SessionScope::Tab => self.tab.as_mut(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignIn {
    /// SRN or email for students, email for every other role
    pub identifier: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub child_srn: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    /// The student's own SRN, or the child's SRN for a parent
    #[serde(default)]
    pub student_srn: Option<String>,
}

/// Resolves who is acting, local store first and remote backend second.
pub struct IdentityResolver {
    tiers: SessionTiers,
    remote: Arc<dyn RemoteBackend>,
    auth_changes: Option<broadcast::Receiver<AuthChange>>,
    state: AuthState,
}

impl IdentityResolver {
    pub fn new(tiers: SessionTiers, remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            tiers,
            remote,
            auth_changes: None,
            state: AuthState::loading(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn remote(&self) -> &Arc<dyn RemoteBackend> {
        &self.remote
    }

    /// Adopts a locally persisted session if there is one. Otherwise listens to the remote
    /// backend and adopts its current session.
    pub async fn initialize(&mut self) {
        let local = self.read_persisted();

        let remote = if local.is_none() {
            self.auth_changes = Some(self.remote.subscribe());

            match self.remote.get_session().await {
                Ok(session) => session,
                Err(e) => {
                    log::warn!("could not get the remote session: {}", e);
                    None
                }
            }
        } else {
            None
        };

        match resolve_initial(local, remote) {
            InitialSession::Local(persisted) => {
                log::info!("resuming local session of user {}", persisted.user.id);
                self.state = persisted.into();
            }
            InitialSession::Remote(session) => self.apply_remote_session(session).await,
            InitialSession::Anonymous => self.state.is_loading = false,
        }
    }

    /// Applies the auth-state notifications received since the last call
    pub async fn pump_auth_changes(&mut self) {
        loop {
            let change = match self.auth_changes.as_mut().map(|rx| rx.try_recv()) {
                Some(Ok(change)) => change,
                Some(Err(TryRecvError::Lagged(skipped))) => {
                    log::warn!("missed {} auth-state notifications", skipped);
                    continue;
                }
                Some(Err(_)) | None => break,
            };

            match change.session {
                Some(session) => self.apply_remote_session(session).await,
                None => {
                    self.state.session = None;
                    self.state.user = None;
                    self.state.role = None;
                    self.state.related_student = None;
                }
            }
        }
    }

    /// Creates the local account, then the remote one. A failed remote registration does not
    /// fail the sign-up.
    pub async fn sign_up<D: Database>(
        &mut self,
        store: &mut D,
        request: SignUp,
    ) -> Result<(), AuthError> {
        let SignUp {
            email,
            password,
            full_name,
            role,
            student_srn,
        } = request;

        store.user_add(NewUser {
            name: full_name.clone(),
            email: email.clone(),
            profile: Profile::for_role(role, student_srn.clone()),
            phone: None,
            password: Some(password.clone()),
        })?;

        let actor = match self.remote.sign_up(&email, &password, &full_name).await {
            Ok(Some(actor)) => actor,
            Ok(None) => return Ok(()),
            Err(e) => {
                log::warn!("remote sign-up of {} failed, keeping the local account: {}", email, e);
                return Ok(());
            }
        };

        if let Err(e) = self.remote.insert_role(&actor.id, role).await {
            log::error!("could not store the role of {}: {}", actor.id, e);
        }
        self.state.role = Some(role);

        if let (Role::Parent, Some(srn)) = (role, student_srn) {
            let row = json!({
                "id": actor.id,
                "email": email,
                "full_name": full_name,
                "phone": "",
                "linked_student_sr": srn,
            });

            if let Err(e) = self.remote.insert("parents", row).await {
                log::error!("could not link parent {} to {}: {}", actor.id, srn, e);
            }
        }

        Ok(())
    }

    /// Signs in against the local store, falling back to the remote backend when no local
    /// account matches.
    pub async fn sign_in<D: Database>(
        &mut self,
        store: &mut D,
        request: SignIn,
    ) -> Result<(), AuthError> {
        let user = store.authenticate(&request.identifier, &request.password, request.role)?;

        if let Some(user) = user {
            let child_srn = request.child_srn.as_deref();
            let related = related_student(store, &user, request.role, child_srn)?;
            let persisted = PersistedSession::local(&user, request.role, related, Utc::now());
            let serialized = serde_json::to_string(&persisted).map_err(StorageError::from)?;

            let scope = SessionScope::from_remember_me(request.remember_me);
            self.tiers.get_mut(scope).set_item(SESSION_KEY, serialized)?;
            self.state = persisted.into();

            log::info!("user {} signed in locally as {}", user.id, request.role);
            return Ok(());
        }

        let session = self
            .remote
            .sign_in_with_password(&request.identifier, &request.password)
            .await?;

        if self.auth_changes.is_some() {
            self.pump_auth_changes().await;
        } else {
            self.apply_remote_session(session).await;
        }

        Ok(())
    }

    pub async fn sign_out(&mut self) {
        self.clear_persisted();

        if let Err(e) = self.remote.sign_out().await {
            log::warn!("remote sign-out failed: {}", e);
        }

        self.state = AuthState::signed_out();
    }

    fn read_persisted(&mut self) -> Option<PersistedSession> {
        let stored = self
            .tiers
            .durable
            .get_item(SESSION_KEY)
            .or_else(|| self.tiers.tab.get_item(SESSION_KEY))?;

        match serde_json::from_str(&stored) {
            Ok(persisted) => Some(persisted),
            Err(e) => {
                log::warn!("discarding corrupted local session: {}", e);
                self.clear_persisted();
                None
            }
        }
    }

    fn clear_persisted(&mut self) {
        for scope in &[SessionScope::Durable, SessionScope::Tab] {
            if let Err(e) = self.tiers.get_mut(*scope).remove_item(SESSION_KEY) {
                log::warn!("could not remove the {:?} session: {}", scope, e);
            }
        }
    }

    async fn apply_remote_session(&mut self, session: AccessSession) {
        let user_id = session.user.id.clone();
        self.state.user = Some(session.user.clone());
        self.state.session = Some(session);

        match self.remote.fetch_role(&user_id).await {
            Ok(Some(role)) => self.state.role = Some(role),
            Ok(None) => log::warn!("no role recorded for user {}", user_id),
            Err(e) => log::error!("Error fetching user role: {}", e),
        }

        self.state.is_loading = false;
    }
}

/// The student a signed-in user is looking at: themselves for a student, their child for a
/// parent. An unknown child SRN does not block the sign-in.
fn related_student<D: Database>(
    store: &mut D,
    user: &User,
    role: Role,
    child_srn: Option<&str>,
) -> Result<Option<User>, StorageError> {
    match role {
        Role::Student => Ok(Some(user.clone())),
        Role::Parent => match child_srn.filter(|srn| !srn.is_empty()) {
            Some(srn) => {
                let child = store.student_by_srn(srn)?;
                if child.is_none() {
                    log::warn!("Child SRN {} not found during login.", srn);
                }
                Ok(child)
            }
            None => match user.linked_srn() {
                Some(srn) => store.student_by_srn(srn),
                None => Ok(None),
            },
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{remote::AuthChangeEvent, session::Actor, RemoteError};
    use async_trait::async_trait;
    use db::{new_store, JSONStore, MemoryStorage};
    use serde_json::Value;
    use std::sync::Mutex;

    /// Records every call and answers from canned values
    #[derive(Default)]
    struct MockBackend {
        session: Option<AccessSession>,
        role: Option<Role>,
        sign_up_result: Option<Actor>,
        sign_up_fails: bool,
        inserts: Mutex<Vec<(String, Value)>>,
        sign_outs: Mutex<usize>,
        role_lookups: Mutex<usize>,
        changes: Option<broadcast::Sender<AuthChange>>,
    }

    impl MockBackend {
        fn with_changes() -> Self {
            let (sender, _) = broadcast::channel(8);
            Self {
                changes: Some(sender),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RemoteBackend for MockBackend {
        async fn get_session(&self) -> Result<Option<AccessSession>, RemoteError> {
            Ok(self.session.clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
            match &self.changes {
                Some(sender) => sender.subscribe(),
                None => broadcast::channel(1).1,
            }
        }

        async fn sign_in_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> Result<AccessSession, RemoteError> {
            match &self.session {
                Some(session) if password == "remote-secret" => {
                    let mut session = session.clone();
                    session.user.email = Some(email.to_string());
                    if let Some(sender) = &self.changes {
                        let _ = sender.send(AuthChange {
                            event: AuthChangeEvent::SignedIn,
                            session: Some(session.clone()),
                        });
                    }
                    Ok(session)
                }
                _ => Err(RemoteError::Api {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                }),
            }
        }

        async fn sign_up(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Option<Actor>, RemoteError> {
            if self.sign_up_fails {
                return Err(RemoteError::Api {
                    status: 429,
                    message: "email rate limit exceeded".to_string(),
                });
            }
            Ok(self.sign_up_result.clone())
        }

        async fn sign_out(&self) -> Result<(), RemoteError> {
            *self.sign_outs.lock().unwrap() += 1;
            Ok(())
        }

        async fn fetch_role(&self, _: &str) -> Result<Option<Role>, RemoteError> {
            *self.role_lookups.lock().unwrap() += 1;
            match self.role {
                Some(role) => Ok(Some(role)),
                None => Err(RemoteError::Api {
                    status: 406,
                    message: "no rows".to_string(),
                }),
            }
        }

        async fn insert(&self, table: &str, row: Value) -> Result<(), RemoteError> {
            self.inserts.lock().unwrap().push((table.to_string(), row));
            Ok(())
        }
    }

    fn remote_session() -> AccessSession {
        serde_json::from_value(json!({
            "access_token": "remote-jwt",
            "refresh_token": "remote-refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": "remote-user", "email": "remote@example.com" }
        }))
        .unwrap()
    }

    fn tiers() -> SessionTiers {
        SessionTiers {
            durable: Box::new(MemoryStorage::new()),
            tab: Box::new(MemoryStorage::new()),
        }
    }

    fn store() -> JSONStore<MemoryStorage> {
        new_store(MemoryStorage::new())
    }

    fn sign_in(identifier: &str, role: Role) -> SignIn {
        SignIn {
            identifier: identifier.to_string(),
            password: "password123".to_string(),
            role,
            child_srn: None,
            remember_me: false,
        }
    }

    #[tokio::test]
    async fn student_sign_in_relates_to_self_and_persists_in_tab() {
        let mut store = store();
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(MockBackend::default()));

        resolver
            .sign_in(&mut store, sign_in("24Suube001", Role::Student))
            .await
            .unwrap();

        let state = resolver.state();
        assert_eq!(state.role, Some(Role::Student));
        assert_eq!(state.related_student.as_ref().map(|u| u.id), Some(1));
        assert!(state.access_token().unwrap().starts_with("local-token-"));
        assert!(!state.is_loading);

        assert!(resolver.tiers.tab.get_item(SESSION_KEY).is_some());
        assert!(resolver.tiers.durable.get_item(SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn remember_me_persists_durably() {
        let mut store = store();
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(MockBackend::default()));
        let mut request = sign_in("williams@teacher.edu", Role::Teacher);
        request.remember_me = true;

        resolver.sign_in(&mut store, request).await.unwrap();

        assert_eq!(resolver.state().role, Some(Role::Teacher));
        assert_eq!(resolver.state().related_student, None);
        assert!(resolver.tiers.durable.get_item(SESSION_KEY).is_some());
        assert!(resolver.tiers.tab.get_item(SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn parent_with_unknown_child_still_signs_in() {
        let mut store = store();
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(MockBackend::default()));
        let mut request = sign_in("sarah@parent.com", Role::Parent);
        request.child_srn = Some("24Suube404".to_string());

        resolver.sign_in(&mut store, request).await.unwrap();

        assert_eq!(resolver.state().role, Some(Role::Parent));
        assert_eq!(resolver.state().related_student, None);
        assert!(resolver.state().session.is_some());
    }

    #[tokio::test]
    async fn parent_child_srn_then_linked_srn() {
        let mut store = store();
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(MockBackend::default()));

        let mut request = sign_in("sarah@parent.com", Role::Parent);
        request.child_srn = Some("24Suube003".to_string());
        resolver.sign_in(&mut store, request).await.unwrap();
        let related = resolver.state().related_student.clone().unwrap();
        assert_eq!(related.srn(), Some("24Suube003"));

        resolver
            .sign_in(&mut store, sign_in("sarah@parent.com", Role::Parent))
            .await
            .unwrap();
        let related = resolver.state().related_student.clone().unwrap();
        assert_eq!(related.srn(), Some("24Suube001"));
    }

    #[tokio::test]
    async fn unknown_credentials_surface_the_remote_error() {
        let mut store = store();
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(MockBackend::default()));
        let mut request = sign_in("24Suube001", Role::Student);
        request.password = "wrong".to_string();

        let error = resolver.sign_in(&mut store, request).await.unwrap_err();

        match error {
            AuthError::Remote(e) => assert!(e.is_invalid_credentials()),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(resolver.state().session, None);
    }

    #[tokio::test]
    async fn remote_sign_in_arrives_through_notifications() {
        let mut store = store();
        let backend = MockBackend {
            session: Some(remote_session()),
            role: Some(Role::Doctor),
            ..MockBackend::with_changes()
        };
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(backend));

        // The backend's session only exists once signed in
        resolver.state = AuthState::signed_out();
        resolver.auth_changes = Some(resolver.remote.subscribe());

        let mut request = sign_in("remote@example.com", Role::Doctor);
        request.password = "remote-secret".to_string();
        resolver.sign_in(&mut store, request).await.unwrap();

        assert_eq!(resolver.state().access_token(), Some("remote-jwt"));
        assert_eq!(resolver.state().role, Some(Role::Doctor));
    }

    #[tokio::test]
    async fn local_session_wins_at_initialization() {
        let mut store = store();
        let backend = Arc::new(MockBackend {
            session: Some(remote_session()),
            role: Some(Role::Doctor),
            ..MockBackend::default()
        });

        let mut first = IdentityResolver::new(tiers(), backend.clone());
        let mut request = sign_in("brown@doctor.edu", Role::Doctor);
        request.remember_me = true;
        first.sign_in(&mut store, request).await.unwrap();
        let expected = first.state().clone();

        let mut resumed = IdentityResolver::new(first.tiers, backend.clone());
        resumed.initialize().await;

        assert_eq!(resumed.state(), &expected);
        assert!(resumed.auth_changes.is_none());
        assert_eq!(*backend.role_lookups.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupted_local_session_is_cleared() {
        let mut tiers = tiers();
        tiers.durable.set_item(SESSION_KEY, "{ nope".to_string()).unwrap();
        tiers.tab.set_item(SESSION_KEY, "{ nope".to_string()).unwrap();

        let mut resolver = IdentityResolver::new(tiers, Arc::new(MockBackend::default()));
        resolver.initialize().await;

        assert_eq!(resolver.state(), &AuthState::signed_out());
        assert!(resolver.tiers.durable.get_item(SESSION_KEY).is_none());
        assert!(resolver.tiers.tab.get_item(SESSION_KEY).is_none());
    }

    #[tokio::test]
    async fn remote_session_is_adopted_with_its_role() {
        let backend = MockBackend {
            session: Some(remote_session()),
            role: Some(Role::Admin),
            ..MockBackend::default()
        };
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(backend));
        assert!(resolver.state().is_loading);

        resolver.initialize().await;

        assert_eq!(resolver.state().access_token(), Some("remote-jwt"));
        assert_eq!(resolver.state().role, Some(Role::Admin));
        assert!(!resolver.state().is_loading);
    }

    #[tokio::test]
    async fn failed_role_lookup_leaves_role_unset() {
        let backend = MockBackend {
            session: Some(remote_session()),
            ..MockBackend::default()
        };
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(backend));

        resolver.initialize().await;

        assert!(resolver.state().session.is_some());
        assert_eq!(resolver.state().role, None);
        assert!(!resolver.state().is_loading);
    }

    #[tokio::test]
    async fn signed_out_notification_clears_state() {
        let backend = Arc::new(MockBackend {
            session: Some(remote_session()),
            role: Some(Role::Teacher),
            ..MockBackend::with_changes()
        });
        let mut resolver = IdentityResolver::new(tiers(), backend.clone());
        resolver.initialize().await;
        assert_eq!(resolver.state().role, Some(Role::Teacher));

        let sender = backend.changes.as_ref().unwrap();
        sender
            .send(AuthChange {
                event: AuthChangeEvent::SignedOut,
                session: None,
            })
            .unwrap();
        resolver.pump_auth_changes().await;

        assert_eq!(resolver.state().session, None);
        assert_eq!(resolver.state().role, None);
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let mut store = store();
        let backend = Arc::new(MockBackend::default());
        let mut resolver = IdentityResolver::new(tiers(), backend.clone());
        let mut request = sign_in("admin@example.com", Role::Admin);
        request.remember_me = true;
        resolver.sign_in(&mut store, request).await.unwrap();

        resolver.sign_out().await;

        assert_eq!(resolver.state(), &AuthState::signed_out());
        assert!(resolver.tiers.durable.get_item(SESSION_KEY).is_none());
        assert_eq!(*backend.sign_outs.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn sign_up_succeeds_locally_when_remote_fails() {
        let mut store = store();
        let backend = MockBackend {
            sign_up_fails: true,
            ..MockBackend::default()
        };
        let mut resolver = IdentityResolver::new(tiers(), Arc::new(backend));

        resolver
            .sign_up(
                &mut store,
                SignUp {
                    email: "lena@student.edu".to_string(),
                    password: "secret1".to_string(),
                    full_name: "Lena Park".to_string(),
                    role: Role::Student,
                    student_srn: Some("24Suube010".to_string()),
                },
            )
            .await
            .unwrap();

        let user = store
            .authenticate("24Suube010", "secret1", Role::Student)
            .unwrap()
            .unwrap();
        assert_eq!(user.name, "Lena Park");
        assert_eq!(resolver.state().role, None);
    }

    #[tokio::test]
    async fn remote_sign_up_records_role_and_parent_link() {
        let mut store = store();
        let actor: Actor = serde_json::from_value(json!({ "id": "new-parent" })).unwrap();
        let backend = Arc::new(MockBackend {
            sign_up_result: Some(actor),
            ..MockBackend::default()
        });
        let mut resolver = IdentityResolver::new(tiers(), backend.clone());

        resolver
            .sign_up(
                &mut store,
                SignUp {
                    email: "omar@parent.com".to_string(),
                    password: "secret1".to_string(),
                    full_name: "Omar Haddad".to_string(),
                    role: Role::Parent,
                    student_srn: Some("24Suube003".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(resolver.state().role, Some(Role::Parent));

        let parent = store
            .user_by_email("omar@parent.com", Role::Parent)
            .unwrap()
            .unwrap();
        assert_eq!(parent.linked_srn(), Some("24Suube003"));

        let inserts = backend.inserts.lock().unwrap();
        assert_eq!(inserts.len(), 2);
        assert_eq!(inserts[0].0, "user_roles");
        assert_eq!(inserts[0].1, json!({ "user_id": "new-parent", "role": "parent" }));
        assert_eq!(inserts[1].0, "parents");
        assert_eq!(inserts[1].1["linked_student_sr"], "24Suube003");
    }
}
