use thiserror::Error;

mod json;
pub mod models;
mod seed;
mod storage;

pub use json::JSONStore;
pub use storage::{FileStorage, MemoryStorage, Storage};

use models::{
    Backup, Event, NewEvent, NewPasswordRequest, NewUser, Notification, PasswordRequest, Restore,
    Role, User,
};

pub const PAGE_SIZE: usize = 10;

pub const USERS_KEY: &str = "educare_users_v1";
pub const EVENTS_KEY: &str = "educare_events_v1";
pub const REQUESTS_KEY: &str = "educare_requests_v1";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stored JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Every operation reads the whole collection, modifies it and writes it back. Lookups of
/// missing records are no-ops, only storage failures are errors.
pub trait Database {
    fn reset(&mut self) -> Result<()>;
    fn export(&mut self) -> Result<Backup>;
    fn import(&mut self, restore: Restore) -> Result<()>;

    fn users(&mut self) -> Result<Vec<User>>;
    fn user_add(&mut self, user: NewUser) -> Result<User>;
    fn user_get_by_id(&mut self, id: u64) -> Result<Option<User>>;
    fn user_update(&mut self, user: User) -> Result<bool>;
    fn user_remove(&mut self, id: u64) -> Result<bool>;
    fn user_list(
        &mut self,
        page: usize,
        query: Option<&str>,
        filter: impl Fn(&User) -> bool,
    ) -> Result<(usize, Vec<User>)>;

    /// Matches credentials against the stored users for one role: students by SRN and then by
    /// email, every other role by email. Passwords are compared as-is.
    fn authenticate(&mut self, identifier: &str, password: &str, role: Role)
        -> Result<Option<User>>;
    fn student_by_srn(&mut self, srn: &str) -> Result<Option<User>>;
    fn user_by_email(&mut self, email: &str, role: Role) -> Result<Option<User>>;

    fn password_request_add(&mut self, request: NewPasswordRequest) -> Result<PasswordRequest>;
    fn password_requests(&mut self) -> Result<Vec<PasswordRequest>>;

    fn events(&mut self) -> Result<Vec<Event>>;
    fn event_add(&mut self, event: NewEvent) -> Result<Event>;
    fn event_get(&mut self, id: u64) -> Result<Option<Event>>;
    fn event_update(&mut self, event: Event) -> Result<bool>;
    fn event_remove(&mut self, id: u64) -> Result<bool>;
    fn event_register(&mut self, id: u64, srn: &str) -> Result<bool>;
    fn event_unregister(&mut self, id: u64, srn: &str) -> Result<bool>;

    fn parent_notifications(&mut self, linked_srn: &str) -> Result<Vec<Notification>>;
}

pub fn new_store<S: Storage>(storage: S) -> JSONStore<S> {
    JSONStore::new(storage)
}
