use warp::{Filter, Rejection, Reply};

use crate::app::SharedApp;

mod events;
mod globals;
mod recovery;
mod remote;
mod session;
mod system;
mod users;

pub use globals::{ErrorCode, FailureResponse};

pub fn routes(app: &SharedApp) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    session::routes(app)
        .or(recovery::routes(app))
        .or(users::routes(app))
        .or(events::routes(app))
        .or(system::routes(app))
        .or(remote::routes(app))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::{new_store, MemoryStorage, Storage};
    use identity::{IdentityResolver, OfflineBackend, SessionTiers};
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use crate::{app::App, handle_rejection};

    use super::*;

    fn app() -> SharedApp {
        let store = new_store(Box::new(MemoryStorage::new()) as Box<dyn Storage>);
        let tiers = SessionTiers {
            durable: Box::new(MemoryStorage::new()),
            tab: Box::new(MemoryStorage::new()),
        };
        let identity = IdentityResolver::new(tiers, Arc::new(OfflineBackend::new()));

        App::new(store, identity).shared()
    }

    async fn call(
        app: &SharedApp,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let filter = routes(app).recover(handle_rejection);

        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&filter).await;
        let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
        (response.status(), body)
    }

    async fn sign_in(app: &SharedApp, identifier: &str, role: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/session",
            None,
            Some(json!({ "identifier": identifier, "password": "password123", "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        body["auth"]["session"]["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn sign_in_then_read_and_end_the_session() {
        let app = app();
        let token = sign_in(&app, "24Suube001", "student").await;
        assert!(token.starts_with("local-token-"));

        let (status, body) = call(&app, "GET", "/api/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["auth"]["role"], "student");
        assert_eq!(body["auth"]["relatedStudent"]["srn"], "24Suube001");

        let (status, _) = call(&app, "DELETE", "/api/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/events", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "InvalidCredentials");
    }

    #[tokio::test]
    async fn session_is_not_readable_without_its_token() {
        let app = app();
        let token = sign_in(&app, "admin@example.com", "admin").await;

        let (status, body) = call(&app, "GET", "/api/session", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "status": "error", "code": "InvalidCredentials" }));
        assert!(!body.to_string().contains(&token));

        let (status, _) = call(&app, "GET", "/api/session", Some("local-token-0"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_offline() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/session",
            None,
            Some(json!({ "identifier": "24Suube001", "password": "nope", "role": "student" })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "status": "error", "code": "InvalidCredentials" }));
    }

    #[tokio::test]
    async fn role_guards() {
        let app = app();
        let token = sign_in(&app, "24Suube001", "student").await;

        let (status, body) = call(&app, "GET", "/api/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "InsufficientAuthorization");

        let token = sign_in(&app, "williams@teacher.edu", "teacher").await;
        let (status, body) = call(&app, "GET", "/api/users?role=student", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert!(body["users"][0].get("password").is_none());
    }

    #[tokio::test]
    async fn student_registers_for_an_event_and_parent_is_notified() {
        let app = app();
        let token = sign_in(&app, "24Suube001", "student").await;

        let (status, _) = call(
            &app,
            "POST",
            "/api/events/2/registrations",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = sign_in(&app, "sarah@parent.com", "parent").await;
        let (status, body) =
            call(&app, "GET", "/api/notifications/24Suube001", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notifications"][0]["id"], "evt-2");

        let token = sign_in(&app, "admin@example.com", "admin").await;
        let path = "/api/events/2/registrations/24Suube001";
        let (status, _) = call(&app, "DELETE", path, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "DELETE", path, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn students_only_manage_their_own_registrations() {
        let app = app();
        let token = sign_in(&app, "24Suube001", "student").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/events/2/registrations",
            Some(&token),
            Some(json!({ "srn": "24Suube003" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "InsufficientAuthorization");

        let (status, _) = call(
            &app,
            "POST",
            "/api/events/2/registrations",
            Some(&token),
            Some(json!({ "srn": "24Suube001" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let path = "/api/events/2/registrations/24Suube003";
        let (status, _) = call(&app, "DELETE", path, Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = sign_in(&app, "admin@example.com", "admin").await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/events/2/registrations",
            Some(&token),
            Some(json!({ "srn": "24Suube003" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "DELETE", path, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn password_reset_by_code() {
        let app = app();

        let (status, body) = call(
            &app,
            "POST",
            "/api/password-reset/code",
            None,
            Some(json!({ "email": "alex@student.edu", "role": "student" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "ResetByAdministrator");

        let (status, _) = call(
            &app,
            "POST",
            "/api/password-reset",
            None,
            Some(json!({
                "email": "taylor@teacher.edu",
                "role": "teacher",
                "code": "123456",
                "password": "brandnew"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            "POST",
            "/api/session",
            None,
            Some(json!({
                "identifier": "taylor@teacher.edu",
                "password": "brandnew",
                "role": "teacher"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_works_without_remote_backend() {
        let app = app();
        let (status, _) = call(
            &app,
            "POST",
            "/api/signup",
            None,
            Some(json!({
                "email": "nina@parent.com",
                "password": "secret1",
                "fullName": "Nina Ross",
                "role": "parent",
                "studentSrn": "24Suube003"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            "/api/session",
            None,
            Some(json!({
                "identifier": "nina@parent.com",
                "password": "secret1",
                "role": "parent"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["auth"]["relatedStudent"]["srn"], "24Suube003");
    }

    #[tokio::test]
    async fn leave_letters_succeed_even_offline() {
        let app = app();
        let token = sign_in(&app, "sarah@parent.com", "parent").await;
        let letter = json!({ "reason": "Flu", "from_date": "2025-01-10", "to_date": "2025-01-12" });

        let (status, _) =
            call(&app, "POST", "/api/leave-letters", Some(&token), Some(letter)).await;
        assert_eq!(status, StatusCode::OK);

        let feedback = json!({
            "name": "Sarah",
            "email": "sarah@parent.com",
            "subject": "Hi",
            "message": "Thanks"
        });
        let (status, body) = call(&app, "POST", "/api/feedback", None, Some(feedback)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "RemoteUnavailable");
    }

    #[tokio::test]
    async fn export_names_the_backup_and_reset_reseeds() {
        let app = app();
        let token = sign_in(&app, "admin@example.com", "admin").await;

        let filter = routes(&app).recover(handle_rejection);
        let response = warp::test::request()
            .method("GET")
            .path("/api/export")
            .header("Authorization", format!("Bearer {}", token))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let disposition = response.headers()["Content-Disposition"].to_str().unwrap();
        assert!(disposition.contains(&system::backup_file_name()));

        let backup: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(backup["users"].as_array().unwrap().len(), 8);

        let (status, _) = call(&app, "DELETE", "/api/users/3", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "POST", "/api/reset", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/api/users", Some(&token), None).await;
        assert_eq!(body["total"], 8);
    }

    #[tokio::test]
    async fn malformed_import_is_rejected() {
        let app = app();
        let token = sign_in(&app, "admin@example.com", "admin").await;

        let filter = routes(&app).recover(handle_rejection);
        let response = warp::test::request()
            .method("POST")
            .path("/api/import")
            .header("Authorization", format!("Bearer {}", token))
            .body("{ not json")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
