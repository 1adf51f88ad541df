use fern::colors::{Color, ColoredLevelConfig};
use warp::{http::StatusCode, Filter, Rejection, Reply};

mod app;
mod config;
mod filters;
mod routes;

use crate::filters::{Forbidden, Malformed, StoreFailure, Unauthorized};
use app::App;
use config::Cfg;
use routes::{routes, ErrorCode, FailureResponse};

#[tokio::main]
async fn main() {
    let cfg = match Cfg::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = setup_logging(cfg.log_level) {
        eprintln!("Could not apply logging configuration: {}", e);
    }
    log::debug!("configuration: {:#?}", &cfg);

    let app = match App::from_config(&cfg).await {
        Ok(app) => app.shared(),
        Err(e) => {
            log::error!("could not open the stored data: {}", e);
            std::process::exit(1);
        }
    };
    let filters = routes(&app);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allow_headers(vec!["content-type", "Authorization"])
        .expose_headers(vec!["Content-Disposition"]);

    let filters = filters
        .with(cors)
        // Before logging for correct status codes
        .recover(handle_rejection)
        .with(warp::log("educare"));

    log::info!("listening on {}", cfg.addr);
    warp::serve(filters).run(cfg.addr).await;
}

fn setup_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    let colors = ColoredLevelConfig::new().debug(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}{} {}",
                colors.color(record.level()),
                chrono::Local::now().format("[%H:%M:%S]"),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let error_code;
    let status_code;

    if err.is_not_found() {
        error_code = ErrorCode::NotFound;
        status_code = StatusCode::NOT_FOUND;
    } else if let Some(Forbidden) = err.find() {
        error_code = ErrorCode::InvalidCredentials;
        status_code = StatusCode::FORBIDDEN;
    } else if let Some(Unauthorized) = err.find() {
        error_code = ErrorCode::InsufficientAuthorization;
        status_code = StatusCode::UNAUTHORIZED;
    } else if let Some(Malformed) = err.find() {
        error_code = ErrorCode::MalformedData;
        status_code = StatusCode::BAD_REQUEST;
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        error_code = ErrorCode::MalformedData;
        status_code = StatusCode::BAD_REQUEST;
    } else if let Some(StoreFailure) = err.find() {
        error_code = ErrorCode::InternalServerError;
        status_code = StatusCode::INTERNAL_SERVER_ERROR;
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_code = ErrorCode::MethodNotAllowed;
        status_code = StatusCode::METHOD_NOT_ALLOWED;
    } else {
        error_code = ErrorCode::InternalServerError;
        status_code = StatusCode::INTERNAL_SERVER_ERROR;
    }

    Ok(FailureResponse::new_reply(error_code, status_code))
}
