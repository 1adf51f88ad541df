use db::{
    models::{NewUser, Role, User},
    Database,
};
use identity::session::AuthState;
use serde::Serialize;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::{
    globals::{PaginatedQueryableListRequest, SimpleSuccessResponse},
    ErrorCode, FailureResponse,
};
use crate::{
    app::SharedApp,
    filters::{authed, authed_with_role, store_failure, with_app, Malformed},
};

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_route = warp::path!("api" / "users")
        .and(warp::get())
        .and(authed_with_role(app, &[Role::Admin, Role::Teacher, Role::Doctor]))
        .and(with_app(app.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "users")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(create)
        .boxed();

    let update_route = warp::path!("api" / "users" / u64)
        .and(warp::put())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(update)
        .boxed();

    let delete_route = warp::path!("api" / "users" / u64)
        .and(warp::delete())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(delete)
        .boxed();

    let student_route = warp::path!("api" / "students" / String)
        .and(warp::get())
        .and(authed(app))
        .and(with_app(app.clone()))
        .and_then(student)
        .boxed();

    list_route
        .or(create_route)
        .or(update_route)
        .or(delete_route)
        .or(student_route)
}

#[derive(Serialize)]
struct ListResponse {
    status: &'static str,
    total: usize,
    users: Vec<User>,
}

#[derive(Serialize)]
struct UserResponse<'a> {
    status: &'static str,
    user: &'a User,
}

#[derive(Serialize)]
struct StudentResponse<'a> {
    status: &'static str,
    student: &'a User,
}

/// Stored passwords never leave the server through these routes
fn without_password(mut user: User) -> User {
    user.password = None;
    user
}

async fn list(
    _state: AuthState,
    app: SharedApp,
    request: PaginatedQueryableListRequest,
) -> Result<impl Reply, Rejection> {
    let role = match request.role.as_deref() {
        Some(role) => Some(role.parse::<Role>().map_err(|_| warp::reject::custom(Malformed))?),
        None => None,
    };

    let mut app = app.lock().await;

    let page = request.normalized_page_number();
    let (total, users) = app
        .store
        .user_list(page, request.query.as_deref(), |u| match role {
            Some(role) => u.role() == role,
            None => true,
        })
        .map_err(store_failure)?;

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        total,
        users: users.into_iter().map(without_password).collect(),
    }))
}

async fn create(
    _state: AuthState,
    app: SharedApp,
    request: NewUser,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let user = app.store.user_add(request).map_err(store_failure)?;

    log::info!("user {} added as {}", user.id, user.role());

    Ok(warp::reply::with_status(
        warp::reply::json(&UserResponse {
            status: "success",
            user: &without_password(user),
        }),
        StatusCode::CREATED,
    ))
}

async fn update(
    id: u64,
    _state: AuthState,
    app: SharedApp,
    mut request: User,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    let existing = match app.store.user_get_by_id(id).map_err(store_failure)? {
        Some(user) => user,
        None => {
            return Ok(FailureResponse::new_reply(
                ErrorCode::InvalidID,
                StatusCode::NOT_FOUND,
            ))
        }
    };

    request.id = id;
    if request.password.is_none() {
        request.password = existing.password;
    }

    app.store.user_update(request).map_err(store_failure)?;
    Ok(SimpleSuccessResponse::new_reply())
}

async fn delete(id: u64, _state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    if app.store.user_remove(id).map_err(store_failure)? {
        log::info!("user {} removed", id);
        Ok(SimpleSuccessResponse::new_reply())
    } else {
        Ok(FailureResponse::new_reply(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        ))
    }
}

async fn student(srn: String, _state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    match app.store.student_by_srn(&srn).map_err(store_failure)? {
        Some(student) => Ok(warp::reply::with_status(
            warp::reply::json(&StudentResponse {
                status: "success",
                student: &without_password(student),
            }),
            StatusCode::OK,
        )),
        None => Ok(FailureResponse::new_reply(
            ErrorCode::InvalidID,
            StatusCode::NOT_FOUND,
        )),
    }
}
