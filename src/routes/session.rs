use identity::{session::AuthState, AuthError, RemoteError, SignIn, SignUp};
use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use super::globals::{auth_failure, SimpleSuccessResponse};
use crate::{
    app::SharedApp,
    filters::{authed, with_app, Forbidden},
};

#[derive(Serialize)]
struct SessionResponse {
    status: &'static str,
    auth: AuthState,
}

impl SessionResponse {
    /// The related student is shown without its stored password
    fn new(state: &AuthState) -> Self {
        let mut auth = state.clone();
        if let Some(student) = auth.related_student.as_mut() {
            student.password = None;
        }

        Self {
            status: "success",
            auth,
        }
    }
}

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let post_session_route = warp::path!("api" / "session")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_app(app.clone()))
        .and_then(post_session)
        .boxed();

    let get_session_route = warp::path!("api" / "session")
        .and(warp::get())
        .and(authed(app))
        .and_then(get_session)
        .boxed();

    let delete_session_route = warp::path!("api" / "session")
        .and(warp::delete())
        .and(authed(app))
        .and(with_app(app.clone()))
        .and_then(delete_session)
        .boxed();

    let signup_route = warp::path!("api" / "signup")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_app(app.clone()))
        .and_then(signup)
        .boxed();

    post_session_route
        .or(get_session_route)
        .or(delete_session_route)
        .or(signup_route)
}

async fn post_session(request: SignIn, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let app = &mut *app;

    match app.identity.sign_in(&mut app.store, request).await {
        Ok(()) => {
            let response = SessionResponse::new(app.identity.state());
            Ok(warp::reply::json(&response).into_response())
        }
        // Without a remote backend an unmatched local sign-in is just bad credentials
        Err(AuthError::Remote(RemoteError::Unavailable)) => Err(warp::reject::custom(Forbidden)),
        Err(AuthError::Remote(e)) if e.is_invalid_credentials() => {
            Err(warp::reject::custom(Forbidden))
        }
        Err(e) => Ok(auth_failure(e).into_response()),
    }
}

async fn get_session(state: AuthState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&SessionResponse::new(&state)))
}

async fn delete_session(_state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    app.identity.sign_out().await;

    Ok(warp::reply::json(&SimpleSuccessResponse::new()))
}

async fn signup(request: SignUp, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let app = &mut *app;

    match app.identity.sign_up(&mut app.store, request).await {
        Ok(()) => Ok(SimpleSuccessResponse::new_reply()),
        Err(e) => Ok(auth_failure(e)),
    }
}
