//! Forms stored only by the remote backend.

use db::models::Role;
use identity::{session::AuthState, RemoteError};
use serde::Deserialize;
use serde_json::json;
use warp::{Filter, Rejection, Reply};

use super::{
    globals::{ErrorCode, SimpleSuccessResponse},
    FailureResponse,
};
use crate::{
    app::SharedApp,
    filters::{authed, authed_with_role, with_app},
};

/// Used by leave letters until parents are linked to remote student rows
const PLACEHOLDER_STUDENT_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Deserialize)]
struct Feedback {
    name: String,
    email: String,
    subject: String,
    message: String,
}

#[derive(Deserialize)]
struct LeaveLetter {
    #[serde(default)]
    student_id: Option<String>,
    reason: String,
    from_date: String,
    to_date: String,
}

#[derive(Deserialize)]
struct SchoolEvent {
    title: String,
    date: String,
    description: String,
}

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let feedback_route = warp::path!("api" / "feedback")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(feedback)
        .boxed();

    let leave_route = warp::path!("api" / "leave-letters")
        .and(warp::post())
        .and(authed(app))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(leave_letter)
        .boxed();

    let school_event_route = warp::path!("api" / "school-events")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Teacher, Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(school_event)
        .boxed();

    feedback_route.or(leave_route).or(school_event_route)
}

/// Inserts a row without holding the application lock during the request
async fn insert(
    app: &SharedApp,
    table: &str,
    row: serde_json::Value,
) -> Result<(), RemoteError> {
    let remote = app.lock().await.identity.remote().clone();
    remote.insert(table, row).await
}

fn insert_failure(error: RemoteError) -> warp::reply::WithStatus<warp::reply::Json> {
    log::error!("remote insert failed: {}", error);

    let (code, status) = ErrorCode::for_remote_error(&error);
    FailureResponse::new_reply(code, status)
}

async fn feedback(app: SharedApp, request: Feedback) -> Result<impl Reply, Rejection> {
    let row = json!({
        "name": request.name,
        "email": request.email,
        "subject": request.subject,
        "message": request.message,
    });

    match insert(&app, "feedback", row).await {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(insert_failure(e)),
    }
}

/// Reported as sent even when the remote row is rejected
async fn leave_letter(
    _state: AuthState,
    app: SharedApp,
    request: LeaveLetter,
) -> Result<impl Reply, Rejection> {
    let row = json!({
        "student_id": request.student_id.as_deref().unwrap_or(PLACEHOLDER_STUDENT_ID),
        "reason": request.reason,
        "from_date": request.from_date,
        "to_date": request.to_date,
        "status": "pending",
    });

    if let Err(e) = insert(&app, "leave_letters", row).await {
        log::error!("Error submitting leave: {}", e);
    }

    Ok(SimpleSuccessResponse::new_reply())
}

async fn school_event(
    _state: AuthState,
    app: SharedApp,
    request: SchoolEvent,
) -> Result<impl Reply, Rejection> {
    let row = json!({
        "title": request.title,
        "event_date": request.date,
        "description": request.description,
    });

    match insert(&app, "events", row).await {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(insert_failure(e)),
    }
}
