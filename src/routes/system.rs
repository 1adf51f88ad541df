use chrono::Local;
use db::{
    models::{Restore, Role},
    Database,
};
use identity::session::AuthState;
use warp::{Filter, Rejection, Reply};

use super::globals::SimpleSuccessResponse;
use crate::{
    app::SharedApp,
    filters::{authed_with_role, store_failure, with_app},
};

/// Largest backup accepted by the import route
const MAX_BACKUP_SIZE: u64 = 1024 * 1024 * 8;

pub fn routes(app: &SharedApp) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let export_route = warp::path!("api" / "export")
        .and(warp::get())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(export)
        .boxed();

    let import_route = warp::path!("api" / "import")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and(warp::body::content_length_limit(MAX_BACKUP_SIZE).and(warp::body::json()))
        .and_then(import)
        .boxed();

    let reset_route = warp::path!("api" / "reset")
        .and(warp::post())
        .and(authed_with_role(app, &[Role::Admin]))
        .and(with_app(app.clone()))
        .and_then(reset)
        .boxed();

    export_route.or(import_route).or(reset_route)
}

pub fn backup_file_name() -> String {
    format!("educare_backup_{}.json", Local::now().format("%Y-%m-%d"))
}

async fn export(_state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    let backup = app.store.export().map_err(store_failure)?;

    Ok(warp::reply::with_header(
        warp::reply::json(&backup),
        "Content-Disposition",
        format!("attachment; filename=\"{}\"", backup_file_name()),
    ))
}

async fn import(
    _state: AuthState,
    app: SharedApp,
    restore: Restore,
) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    app.store.import(restore).map_err(store_failure)?;

    log::info!("backup imported");
    Ok(warp::reply::json(&SimpleSuccessResponse::new()))
}

// Resets the store to its fixtures
async fn reset(_state: AuthState, app: SharedApp) -> Result<impl Reply, Rejection> {
    let mut app = app.lock().await;
    app.store.reset().map_err(store_failure)?;

    Ok(warp::reply::json(&SimpleSuccessResponse::new()))
}
