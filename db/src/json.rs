use chrono::{Local, Utc};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    models::{
        Backup, Event, NewEvent, NewPasswordRequest, NewUser, Notification, PasswordRequest,
        RequestStatus, Restore, Role, User, UserStatus,
    },
    seed::{default_password, initial_events, initial_users},
    Database, Result, Storage, EVENTS_KEY, PAGE_SIZE, REQUESTS_KEY, USERS_KEY,
};

/// Store keeping each collection as one JSON array in a storage slot
pub struct JSONStore<S> {
    storage: S,
}

impl<S: Storage> JSONStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Vec<T>>> {
        match self.storage.get_item(key) {
            Some(stored) => Ok(Some(serde_json::from_str(&stored)?)),
            None => Ok(None),
        }
    }

    /// Loads a collection, writing the fixtures to the slot first if it is empty
    fn load_seeded<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        fixtures: fn() -> Vec<T>,
    ) -> Result<Vec<T>> {
        if let Some(items) = self.load(key)? {
            return Ok(items);
        }

        log::info!("seeding {} with fixture data", key);
        let items = fixtures();
        self.save(key, &items)?;
        Ok(items)
    }

    fn save<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<()> {
        self.storage.set_item(key, serde_json::to_string(items)?)
    }
}

impl<S: Storage> Database for JSONStore<S> {
    fn reset(&mut self) -> Result<()> {
        self.storage.remove_item(USERS_KEY)?;
        self.storage.remove_item(EVENTS_KEY)?;
        self.storage.remove_item(REQUESTS_KEY)?;
        log::info!("store reset, fixtures will be reseeded");
        Ok(())
    }

    fn export(&mut self) -> Result<Backup> {
        Ok(Backup {
            users: self.users()?,
            events: self.events()?,
            requests: self.password_requests()?,
        })
    }

    fn import(&mut self, restore: Restore) -> Result<()> {
        if let Some(users) = restore.users {
            self.save(USERS_KEY, &users)?;
        }
        if let Some(events) = restore.events {
            self.save(EVENTS_KEY, &events)?;
        }
        if let Some(requests) = restore.requests {
            self.save(REQUESTS_KEY, &requests)?;
        }
        Ok(())
    }

    fn users(&mut self) -> Result<Vec<User>> {
        self.load_seeded(USERS_KEY, initial_users)
    }

    fn user_add(&mut self, user: NewUser) -> Result<User> {
        let mut users = self.users()?;

        let user = User {
            id: next_id(users.iter().map(|u| u.id)),
            name: user.name,
            email: user.email,
            profile: user.profile,
            status: UserStatus::Active,
            joined: Local::now().format("%b %Y").to_string(),
            phone: user.phone,
            password: Some(user.password.unwrap_or_else(default_password)),
        };

        users.push(user.clone());
        self.save(USERS_KEY, &users)?;
        log::debug!("added {} user {}", user.role(), user.id);
        Ok(user)
    }

    fn user_get_by_id(&mut self, id: u64) -> Result<Option<User>> {
        Ok(self.users()?.into_iter().find(|u| u.id == id))
    }

    fn user_update(&mut self, user: User) -> Result<bool> {
        let mut users = self.users()?;

        match users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => *slot = user,
            None => return Ok(false),
        }

        self.save(USERS_KEY, &users)?;
        Ok(true)
    }

    fn user_remove(&mut self, id: u64) -> Result<bool> {
        let mut users = self.users()?;
        let before = users.len();
        users.retain(|u| u.id != id);
        self.save(USERS_KEY, &users)?;
        Ok(users.len() != before)
    }

    fn user_list(
        &mut self,
        page: usize,
        query: Option<&str>,
        filter: impl Fn(&User) -> bool,
    ) -> Result<(usize, Vec<User>)> {
        let users = self.users()?;
        let (total, results) = _search(
            users.iter(),
            |u: &User| vec![u.name.as_str(), u.email.as_str(), u.role().as_str()],
            page,
            query,
            filter,
        );
        Ok((total, results.into_iter().cloned().collect()))
    }

    fn authenticate(
        &mut self,
        identifier: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<User>> {
        let users = self.users()?;
        let password_matches = |u: &User| u.password.as_deref() == Some(password);
        let by_email =
            |u: &&User| u.role() == role && u.email == identifier && password_matches(u);

        let user = match role {
            Role::Student => users
                .iter()
                .find(|u| u.srn() == Some(identifier) && password_matches(u))
                .or_else(|| users.iter().find(by_email)),
            _ => users.iter().find(by_email),
        };

        Ok(user.cloned())
    }

    fn student_by_srn(&mut self, srn: &str) -> Result<Option<User>> {
        Ok(self.users()?.into_iter().find(|u| u.srn() == Some(srn)))
    }

    fn user_by_email(&mut self, email: &str, role: Role) -> Result<Option<User>> {
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.role() == role && u.email.eq_ignore_ascii_case(email)))
    }

    fn password_request_add(&mut self, request: NewPasswordRequest) -> Result<PasswordRequest> {
        let mut requests = self.password_requests()?;

        let request = PasswordRequest {
            id: next_id(requests.iter().map(|r| r.id)),
            name: request.name,
            email: request.email,
            srn: request.srn,
            description: request.description,
            role: request.role,
            date: Local::now().format("%-m/%-d/%Y").to_string(),
            status: RequestStatus::Pending,
        };

        requests.push(request.clone());
        self.save(REQUESTS_KEY, &requests)?;
        Ok(request)
    }

    fn password_requests(&mut self) -> Result<Vec<PasswordRequest>> {
        Ok(self.load(REQUESTS_KEY)?.unwrap_or_default())
    }

    fn events(&mut self) -> Result<Vec<Event>> {
        self.load_seeded(EVENTS_KEY, initial_events)
    }

    fn event_add(&mut self, event: NewEvent) -> Result<Event> {
        let mut events = self.events()?;

        let event = Event {
            id: next_id(events.iter().map(|e| e.id)),
            title: event.title,
            date: event.date,
            category: event.category,
            description: event.description,
            link: event.link,
            registered_students: Vec::new(),
        };

        events.push(event.clone());
        self.save(EVENTS_KEY, &events)?;
        Ok(event)
    }

    fn event_get(&mut self, id: u64) -> Result<Option<Event>> {
        Ok(self.events()?.into_iter().find(|e| e.id == id))
    }

    fn event_update(&mut self, event: Event) -> Result<bool> {
        let mut events = self.events()?;

        match events.iter_mut().find(|e| e.id == event.id) {
            Some(slot) => *slot = event,
            None => return Ok(false),
        }

        self.save(EVENTS_KEY, &events)?;
        Ok(true)
    }

    fn event_remove(&mut self, id: u64) -> Result<bool> {
        let mut events = self.events()?;
        let before = events.len();
        events.retain(|e| e.id != id);
        self.save(EVENTS_KEY, &events)?;
        Ok(events.len() != before)
    }

    fn event_register(&mut self, id: u64, srn: &str) -> Result<bool> {
        let mut events = self.events()?;

        let event = match events.iter_mut().find(|e| e.id == id) {
            Some(event) => event,
            None => return Ok(false),
        };

        if event.registered_students.iter().any(|s| s == srn) {
            return Ok(false);
        }

        event.registered_students.push(srn.to_string());
        self.save(EVENTS_KEY, &events)?;
        Ok(true)
    }

    fn event_unregister(&mut self, id: u64, srn: &str) -> Result<bool> {
        let mut events = self.events()?;

        let event = match events.iter_mut().find(|e| e.id == id) {
            Some(event) => event,
            None => return Ok(false),
        };

        let before = event.registered_students.len();
        event.registered_students.retain(|s| s != srn);

        if event.registered_students.len() == before {
            return Ok(false);
        }

        self.save(EVENTS_KEY, &events)?;
        Ok(true)
    }

    fn parent_notifications(&mut self, linked_srn: &str) -> Result<Vec<Notification>> {
        Ok(self
            .events()?
            .iter()
            .filter(|e| e.registered_students.iter().any(|s| s == linked_srn))
            .map(Notification::event_registration)
            .collect())
    }
}

/// Millisecond timestamp, bumped past the largest id already taken
fn next_id(taken: impl Iterator<Item = u64>) -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;

    match taken.max() {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}

fn _search<'a, T, F>(
    collection: impl Iterator<Item = &'a T>,
    property: F,
    page: usize,
    query: Option<&str>,
    custom_filter: impl Fn(&T) -> bool,
) -> (usize, Vec<&'a T>)
where
    F: Fn(&T) -> Vec<&str>,
{
    let mut filter = contains_query(query, property);
    let mut total = 0;
    let mut skipped = 0;
    let mut results: Vec<&T> = Vec::new();
    let to_skip = (page.max(1) - 1) * PAGE_SIZE;

    for row in collection {
        if !filter(&row) || !custom_filter(row) {
            continue;
        }

        total += 1;

        if skipped < to_skip {
            skipped += 1;
        } else if results.len() < PAGE_SIZE {
            results.push(row);
        }
    }

    (total, results)
}

/// Returns a function to be used as a filter that checks if the provided query is contained in
/// any of the object strings.
fn contains_query<T, F>(query: Option<&str>, properties: F) -> impl FnMut(&&T) -> bool
where
    F: Fn(&T) -> Vec<&str>,
{
    let normalize = |s: &str| unidecode::unidecode(s.trim()).to_ascii_lowercase();
    let query = query.map(|d| truncate(d, 50)).map(normalize);

    move |object: &&T| {
        if let Some(query) = &query {
            properties(object)
                .into_iter()
                .any(|field| normalize(field).contains(query.as_str()))
        } else {
            true
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((idx, _)) => &s[..idx],
    }
}
