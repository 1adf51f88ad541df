use db::{
    models::{NewPasswordRequest, PasswordRequest, Role},
    Database,
};
use identity::{recovery, session::AuthState};
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{auth_failure, SimpleSuccessResponse};
use crate::{
    app::SharedApp,
    filters::{authed_with_role, store_failure, with_app},
};

#[derive(Deserialize)]
struct CodeRequest {
    email: String,
    role: Role,
}

#[derive(Deserialize)]
struct VerifyRequest {
    code: String,
}

#[derive(Deserialize)]
struct ResetRequest {
    email: String,
    role: Role,
    code: String,
    password: String,
}

#[derive(Serialize)]
struct FiledResponse<'a> {
    status: &'static str,
    request: &'a PasswordRequest,
}

#[derive(Serialize)]
struct ListResponse {
    status: &'static str,
    requests: Vec<PasswordRequest>,
}

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let file_route = warp::path!("api" / "password-requests")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_app(app.clone()))
        .and_then(file_request)
        .boxed();

    let list_route = warp::path!("api" / "password-requests")
        .and(warp::get())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(list)
        .boxed();

    let code_route = warp::path!("api" / "password-reset" / "code")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_app(app.clone()))
        .and_then(request_code)
        .boxed();

    let verify_route = warp::path!("api" / "password-reset" / "verify")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(verify_code)
        .boxed();

    let reset_route = warp::path!("api" / "password-reset")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_app(app.clone()))
        .and_then(reset_password)
        .boxed();

    file_route
        .or(list_route)
        .or(code_route)
        .or(verify_route)
        .or(reset_route)
}

async fn file_request(
    request: NewPasswordRequest,
    app: SharedApp,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    match recovery::file_request(&mut app.store, request) {
        Ok(request) => Ok(warp::reply::with_status(
            warp::reply::json(&FiledResponse {
                status: "success",
                request: &request,
            }),
            StatusCode::CREATED,
        )),
        Err(e) => Ok(auth_failure(e)),
    }
}

async fn list(_state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let requests = app.store.password_requests().map_err(store_failure)?;

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        requests,
    }))
}

async fn request_code(request: CodeRequest, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    match recovery::request_code(&mut app.store, &request.email, request.role) {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(auth_failure(e)),
    }
}

async fn verify_code(request: VerifyRequest) -> Result<impl Reply, Rejection> {
    match recovery::verify_code(&request.code) {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(auth_failure(e)),
    }
}

async fn reset_password(request: ResetRequest, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;

    let reset = recovery::reset_password(
        &mut app.store,
        &request.email,
        request.role,
        &request.code,
        &request.password,
    );

    match reset {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(auth_failure(e)),
    }
}
