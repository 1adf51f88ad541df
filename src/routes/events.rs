use db::{
    models::{Event, NewEvent, Notification, Role},
    Database,
};
use identity::session::AuthState;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::{globals::SimpleSuccessResponse, ErrorCode, FailureResponse};
use crate::{
    app::SharedApp,
    filters::{authed, authed_with_role, store_failure, with_app, Malformed, Unauthorized},
};

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_route = warp::path!("api" / "events")
        .and(warp::get())
        .and(authed(app))
        .and(with_app(app.clone()))
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "events")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(create)
        .boxed();

    let update_route = warp::path!("api" / "events" / u64)
        .and(warp::put())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(update)
        .boxed();

    let delete_route = warp::path!("api" / "events" / u64)
        .and(warp::delete())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(delete)
        .boxed();

    let register_route = warp::path!("api" / "events" / u64 / "registrations")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Student, Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(register)
        .boxed();

    let unregister_route = warp::path!("api" / "events" / u64 / "registrations" / String)
        .and(warp::delete())
        .and(authed_with_role(app, &[Role::Student, Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(unregister)
        .boxed();

    let notifications_route = warp::path!("api" / "notifications" / String)
        .and(warp::get())
        .and(authed_with_role(app, &[Role::Parent, Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(notifications)
        .boxed();

    list_route
        .or(create_route)
        .or(update_route)
        .or(delete_route)
        .or(register_route)
        .or(unregister_route)
        .or(notifications_route)
}

#[derive(Serialize)]
struct ListResponse {
    status: &'static str,
    events: Vec<Event>,
}

#[derive(Serialize)]
struct EventResponse<'a> {
    status: &'static str,
    event: &'a Event,
}

#[derive(Serialize)]
struct NotificationsResponse {
    status: &'static str,
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct RegistrationRequest {
    /// Defaults to the signed-in student's own SRN
    srn: Option<String>,
}

/// Students may only name their own SRN, admins any
fn check_srn_owner(state: &AuthState, srn: &str) -> Result<(), Rejection> {
    if state.role != Some(Role::Student) {
        return Ok(());
    }

    let own_srn = state.related_student.as_ref().and_then(|student| student.srn());
    if own_srn == Some(srn) {
        Ok(())
    } else {
        Err(warp::reject::custom(Unauthorized))
    }
}

fn invalid_id() -> warp::reply::WithStatus<warp::reply::Json> {
    FailureResponse::new_reply(ErrorCode::InvalidID, StatusCode::NOT_FOUND)
}

async fn list(_state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let events = app.store.events().map_err(store_failure)?;

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        events,
    }))
}

async fn create(
    _state: AuthState,
    app: SharedApp,
    request: NewEvent,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let event = app.store.event_add(request).map_err(store_failure)?;

    log::info!("event {} \"{}\" added", event.id, event.title);

    Ok(warp::reply::with_status(
        warp::reply::json(&EventResponse {
            status: "success",
            event: &event,
        }),
        StatusCode::CREATED,
    ))
}

async fn update(
    id: u64,
    _state: AuthState,
    app: SharedApp,
    mut request: Event,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    request.id = id;

    if app.store.event_update(request).map_err(store_failure)? {
        Ok(SimpleSuccessResponse::new_reply())
    } else {
        Ok(invalid_id())
    }
}

async fn delete(id: u64, _state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    if app.store.event_remove(id).map_err(store_failure)? {
        log::info!("event {} removed", id);
        Ok(SimpleSuccessResponse::new_reply())
    } else {
        Ok(invalid_id())
    }
}

async fn register(
    id: u64,
    state: AuthState,
    app: SharedApp,
    request: RegistrationRequest,
) -> Result<impl Reply, Rejection> {
    let own_srn = state
        .related_student
        .as_ref()
        .and_then(|student| student.srn())
        .map(str::to_string);

    let srn = match request.srn.or(own_srn) {
        Some(srn) if !srn.trim().is_empty() => srn,
        _ => return Err(warp::reject::custom(Malformed)),
    };
    check_srn_owner(&state, &srn)?;

    let mut app = app.lock().await;

    // Registering twice is not an error
    let registered = app.store.event_register(id, &srn).map_err(store_failure)?
        || app.store.event_get(id).map_err(store_failure)?.is_some();

    if registered {
        Ok(SimpleSuccessResponse::new_reply())
    } else {
        Ok(invalid_id())
    }
}

async fn unregister(
    id: u64,
    srn: String,
    state: AuthState,
    app: SharedApp,
) -> Result<impl Reply, Rejection> {
    check_srn_owner(&state, &srn)?;

    let mut app = app.lock().await;

    if app.store.event_unregister(id, &srn).map_err(store_failure)? {
        Ok(SimpleSuccessResponse::new_reply())
    } else {
        Ok(FailureResponse::new_reply(
            ErrorCode::NotFound,
            StatusCode::NOT_FOUND,
        ))
    }
}

async fn notifications(
    linked_srn: String,
    _state: AuthState,
    app: SharedApp,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let notifications = app
        .store
        .parent_notifications(&linked_srn)
        .map_err(store_failure)?;

    Ok(warp::reply::json(&NotificationsResponse {
        status: "success",
        notifications,
    }))
}
