use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Platform role. Serialized lowercase (`"student"`), the capitalized form used by the user
/// records is accepted as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Student")]
    Student,
    #[serde(alias = "Parent")]
    Parent,
    #[serde(alias = "Teacher")]
    Teacher,
    #[serde(alias = "Doctor")]
    Doctor,
    #[serde(alias = "Admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "teacher" => Ok(Role::Teacher),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("{:?} is not a valid role", s)),
        }
    }
}

/// Role-specific part of a user record. Flattened into [`User`], the tag becomes its `role`
/// field, written capitalized and read in either case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Profile {
    #[serde(alias = "student")]
    Student {
        /// Student registration number, the student's login identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        srn: Option<String>,
        #[serde(
            rename = "vanDriverPhone",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        van_driver_phone: Option<String>,
        #[serde(rename = "routeNumber", default, skip_serializing_if = "Option::is_none")]
        route_number: Option<String>,
    },
    #[serde(alias = "parent")]
    Parent {
        /// SRN of the child this parent follows
        #[serde(rename = "linkedSrn", default, skip_serializing_if = "Option::is_none")]
        linked_srn: Option<String>,
    },
    #[serde(alias = "teacher")]
    Teacher,
    #[serde(alias = "doctor")]
    Doctor,
    #[serde(alias = "admin")]
    Admin,
}

impl Profile {
    /// Builds the profile for a role, attaching `srn` where the role uses one: as the student's
    /// own SRN, or as the parent's linked SRN.
    pub fn for_role(role: Role, srn: Option<String>) -> Self {
        match role {
            Role::Student => Profile::Student {
                srn,
                van_driver_phone: None,
                route_number: None,
            },
            Role::Parent => Profile::Parent { linked_srn: srn },
            Role::Teacher => Profile::Teacher,
            Role::Doctor => Profile::Doctor,
            Role::Admin => Profile::Admin,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Profile::Student { .. } => Role::Student,
            Profile::Parent { .. } => Role::Parent,
            Profile::Teacher => Role::Teacher,
            Profile::Doctor => Role::Doctor,
            Profile::Admin => Role::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: Profile,
    pub status: UserStatus,
    /// Month and year the account was created, e.g. `"Aug 2024"`
    pub joined: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    /// The SRN of a student, `None` for every other role
    pub fn srn(&self) -> Option<&str> {
        match &self.profile {
            Profile::Student { srn, .. } => srn.as_deref(),
            _ => None,
        }
    }

    /// The SRN a parent is linked to, `None` for every other role
    pub fn linked_srn(&self) -> Option<&str> {
        match &self.profile {
            Profile::Parent { linked_srn } => linked_srn.as_deref(),
            _ => None,
        }
    }
}

/// User record before the store assigns its id, status and join date
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCategory {
    Sports,
    Academic,
    Cultural,
    Meeting,
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub title: String,
    /// Display date (`"Jan 15, 2025"`) or ISO date
    pub date: String,
    #[serde(rename = "type")]
    pub category: EventCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "registeredStudents", default)]
    pub registered_students: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub date: String,
    #[serde(rename = "type")]
    pub category: EventCategory,
    pub description: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PasswordRequest {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srn: Option<String>,
    pub description: String,
    pub role: Role,
    pub date: String,
    pub status: RequestStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewPasswordRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub srn: Option<String>,
    pub description: String,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Event,
}

/// Parent-facing notice derived from the event registrations of their child
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub time: String,
    #[serde(rename = "isRead")]
    pub is_read: bool,
}

impl Notification {
    pub fn event_registration(event: &Event) -> Self {
        Self {
            id: format!("evt-{}", event.id),
            kind: NotificationKind::Event,
            title: "Event Registration".to_string(),
            message: format!(
                "Your child has registered for {} ({}).",
                event.title, event.date
            ),
            time: "Just now".to_string(),
            is_read: false,
        }
    }
}

/// Whole-store backup document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub users: Vec<User>,
    pub events: Vec<Event>,
    pub requests: Vec<PasswordRequest>,
}

/// Backup document being restored, absent collections are left untouched
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Restore {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    #[serde(default)]
    pub events: Option<Vec<Event>>,
    #[serde(default)]
    pub requests: Option<Vec<PasswordRequest>>,
}

impl From<Backup> for Restore {
    fn from(backup: Backup) -> Self {
        Self {
            users: Some(backup.users),
            events: Some(backup.events),
            requests: Some(backup.requests),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_records_keep_the_flat_shape() {
        let value = json!({
            "id": 2,
            "name": "Sarah Smith",
            "email": "sarah@parent.com",
            "role": "Parent",
            "status": "Active",
            "joined": "Aug 2024",
            "linkedSrn": "24Suube001",
            "password": "password123"
        });

        let user: User = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(user.role(), Role::Parent);
        assert_eq!(user.linked_srn(), Some("24Suube001"));
        assert_eq!(user.srn(), None);
        assert_eq!(serde_json::to_value(&user).unwrap(), value);
    }

    #[test]
    fn unrelated_role_fields_are_dropped() {
        let user: User = serde_json::from_value(json!({
            "id": 3,
            "name": "Mr. Williams",
            "email": "williams@teacher.edu",
            "role": "Teacher",
            "status": "Active",
            "joined": "Jun 2023",
            "srn": "stray"
        }))
        .unwrap();

        assert_eq!(user.profile, Profile::Teacher);
        assert_eq!(user.srn(), None);
    }

    #[test]
    fn roles_parse_in_any_case() {
        assert_eq!("Doctor".parse::<Role>(), Ok(Role::Doctor));
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("janitor".parse::<Role>().is_err());

        let role: Role = serde_json::from_str("\"Student\"").unwrap();
        assert_eq!(role, Role::Student);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"student\"");
    }

    #[test]
    fn notification_mentions_event() {
        let event = Event {
            id: 7,
            title: "Annual Sports Day".to_string(),
            date: "2025-01-15".to_string(),
            category: EventCategory::Sports,
            description: String::new(),
            link: None,
            registered_students: vec![],
        };

        let notification = Notification::event_registration(&event);
        assert_eq!(notification.id, "evt-7");
        assert_eq!(
            notification.message,
            "Your child has registered for Annual Sports Day (2025-01-15)."
        );
        assert!(!notification.is_read);
    }
}
