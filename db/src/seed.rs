use super::models::{Event, EventCategory, Profile, User, UserStatus};

const DEFAULT_PASSWORD: &str = "password123";

pub fn initial_users() -> Vec<User> {
    let mut users = vec![
        fixture(1, "Alex Johnson", "alex@student.edu", student("24Suube001"), "Aug 2024"),
        fixture(2, "Sarah Smith", "sarah@parent.com", parent("24Suube001"), "Aug 2024"),
        fixture(3, "Mr. Williams", "williams@teacher.edu", Profile::Teacher, "Jun 2023"),
        fixture(4, "Dr. Brown", "brown@doctor.edu", Profile::Doctor, "Jan 2024"),
        fixture(5, "Emma Wilson", "emma@student.edu", student("24Suube002"), "Sep 2024"),
        fixture(6, "John Davis", "john@student.edu", student("24Suube003"), "Aug 2024"),
        fixture(7, "Mrs. Taylor", "taylor@teacher.edu", Profile::Teacher, "Mar 2023"),
        fixture(8, "Admin User", "admin@example.com", Profile::Admin, "Jan 2023"),
    ];

    users[4].status = UserStatus::Inactive;
    users
}

pub fn initial_events() -> Vec<Event> {
    vec![
        Event {
            id: 1,
            title: "Annual Sports Day".to_string(),
            date: "2025-01-15".to_string(),
            category: EventCategory::Sports,
            description: "Track and field events for all classes.".to_string(),
            link: Some("https://forms.google.com/sports-day".to_string()),
            registered_students: Vec::new(),
        },
        Event {
            id: 2,
            title: "Science Exhibition".to_string(),
            date: "2025-01-22".to_string(),
            category: EventCategory::Academic,
            description: "Projects display by Class 9-12.".to_string(),
            link: Some("https://forms.google.com/science-fair".to_string()),
            registered_students: Vec::new(),
        },
    ]
}

/// Password given to users added without one
pub fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn student(srn: &str) -> Profile {
    Profile::Student {
        srn: Some(srn.to_string()),
        van_driver_phone: None,
        route_number: None,
    }
}

fn parent(linked_srn: &str) -> Profile {
    Profile::Parent {
        linked_srn: Some(linked_srn.to_string()),
    }
}

fn fixture(id: u64, name: &str, email: &str, profile: Profile, joined: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        profile,
        status: UserStatus::Active,
        joined: joined.to_string(),
        phone: None,
        password: Some(default_password()),
    }
}
