use std::convert::Infallible;

use warp::Filter;

use crate::app::SharedApp;

mod authed;

pub use authed::{authed, authed_with_role, Forbidden, Unauthorized};

/// Simple filter to add the application context to the request
pub fn with_app(app: SharedApp) -> impl Filter<Extract = (SharedApp,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

#[derive(Debug)]
pub struct Malformed;

impl warp::reject::Reject for Malformed {}

/// The local store could not be read or written
#[derive(Debug)]
pub struct StoreFailure;

impl warp::reject::Reject for StoreFailure {}

pub fn store_failure(error: db::StorageError) -> warp::Rejection {
    log::error!("store failure: {}", error);
    warp::reject::custom(StoreFailure)
}
