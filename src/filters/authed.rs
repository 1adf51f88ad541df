use db::models::Role;
use identity::session::AuthState;
use warp::{Filter, Rejection};

use crate::{app::SharedApp, filters::with_app};

/// Filter that checks the bearer token against the current session, and rejects the request if
/// it doesn't match
pub fn authed(app: &SharedApp) -> impl Filter<Extract = (AuthState,), Error = Rejection> + Clone {
    with_app(app.clone())
        .and(warp::header::optional::<String>("Authorization"))
        .and_then(guard)
}

/// Filter that checks if the signed-in user holds one of the roles, and rejects the request if
/// they don't ; also checks if the user is signed in.
pub fn authed_with_role(
    app: &SharedApp,
    roles: &'static [Role],
) -> impl Filter<Extract = (AuthState,), Error = Rejection> + Clone {
    authed(app)
        .map(move |state| (state, roles))
        .untuple_one()
        .and_then(guard_role)
}

#[derive(Debug)]
pub struct Forbidden;

impl warp::reject::Reject for Forbidden {}

#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Token of an `Authorization: Bearer <token>` header
fn bearer_token(authorization: &str) -> Option<&str> {
    let mut parts = authorization.splitn(2, ' ');
    let (auth_type, token) = (parts.next()?, parts.next()?);

    if auth_type.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

async fn guard(app: SharedApp, authorization: Option<String>) -> Result<AuthState, Rejection> {
    let token = match authorization.as_deref().and_then(bearer_token) {
        Some(token) => token,
        None => return Err(warp::reject::custom(Forbidden)),
    };

    let mut app = app.lock().await;
    app.identity.pump_auth_changes().await;

    let state = app.identity.state();
    if state.access_token() == Some(token) {
        Ok(state.clone())
    } else {
        Err(warp::reject::custom(Forbidden))
    }
}

async fn guard_role(state: AuthState, wanted: &[Role]) -> Result<AuthState, Rejection> {
    match state.role {
        Some(role) if wanted.contains(&role) => Ok(state),
        _ => Err(warp::reject::custom(Unauthorized)),
    }
}
