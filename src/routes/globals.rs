use identity::{AuthError, RemoteError};
use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
};

#[derive(Serialize)]
pub struct FailureResponse {
    status: &'static str,
    code: ErrorCode,
}

impl FailureResponse {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: "error",
            code,
        }
    }

    pub fn new_reply(code: ErrorCode, status: StatusCode) -> WithStatus<Json> {
        warp::reply::with_status(warp::reply::json(&Self::new(code)), status)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub enum ErrorCode {
    InvalidCredentials,
    InsufficientAuthorization,
    MalformedData,
    PasswordTooSimple,
    InvalidID,
    InvalidCode,
    UnknownAccount,
    ResetByAdministrator,
    AlreadyRegistered,
    RemoteUnavailable,
    RemoteFailure,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl ErrorCode {
    /// The reply for an identity failure that isn't a rejection
    pub fn for_auth_error(error: &AuthError) -> (Self, StatusCode) {
        match error {
            AuthError::Remote(e) => Self::for_remote_error(e),
            AuthError::Storage(_) => (
                ErrorCode::InternalServerError,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            AuthError::UnknownAccount { .. } => (ErrorCode::UnknownAccount, StatusCode::NOT_FOUND),
            AuthError::ResetByAdmin(_) => {
                (ErrorCode::ResetByAdministrator, StatusCode::BAD_REQUEST)
            }
            AuthError::InvalidCode => (ErrorCode::InvalidCode, StatusCode::BAD_REQUEST),
            AuthError::PasswordTooShort(_) => {
                (ErrorCode::PasswordTooSimple, StatusCode::BAD_REQUEST)
            }
        }
    }

    pub fn for_remote_error(error: &RemoteError) -> (Self, StatusCode) {
        if error.is_invalid_credentials() {
            (ErrorCode::InvalidCredentials, StatusCode::FORBIDDEN)
        } else if error.is_already_registered() {
            (ErrorCode::AlreadyRegistered, StatusCode::CONFLICT)
        } else if let RemoteError::Unavailable = error {
            (ErrorCode::RemoteUnavailable, StatusCode::SERVICE_UNAVAILABLE)
        } else {
            (ErrorCode::RemoteFailure, StatusCode::BAD_GATEWAY)
        }
    }
}

pub fn auth_failure(error: AuthError) -> WithStatus<Json> {
    let (code, status) = ErrorCode::for_auth_error(&error);

    if status.is_server_error() {
        log::error!("{}", error);
    }
    FailureResponse::new_reply(code, status)
}

#[derive(Serialize)]
pub struct SimpleSuccessResponse {
    status: &'static str,
}

impl SimpleSuccessResponse {
    pub fn new() -> Self {
        Self { status: "success" }
    }

    pub fn new_reply() -> WithStatus<Json> {
        warp::reply::with_status(warp::reply::json(&Self::new()), StatusCode::OK)
    }
}

#[derive(Deserialize, Debug)]
pub struct PaginatedQueryableListRequest {
    pub query: Option<String>,
    pub page: Option<usize>,
    pub role: Option<String>,
}

impl PaginatedQueryableListRequest {
    /// Checks that the page number is valid, and if its not it returns 1
    pub fn normalized_page_number(&self) -> usize {
        self.page
            .map(|v| if v >= 1 { v } else { 1 })
            .unwrap_or(1usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_start_at_one() {
        let request = |page| PaginatedQueryableListRequest {
            query: None,
            page,
            role: None,
        };

        assert_eq!(request(None).normalized_page_number(), 1);
        assert_eq!(request(Some(0)).normalized_page_number(), 1);
        assert_eq!(request(Some(3)).normalized_page_number(), 3);
    }

    #[test]
    fn remote_errors_map_to_codes() {
        let rejected = RemoteError::Api {
            status: 400,
            message: "Invalid login credentials".to_string(),
        };
        assert_eq!(
            ErrorCode::for_remote_error(&rejected),
            (ErrorCode::InvalidCredentials, StatusCode::FORBIDDEN)
        );
        assert_eq!(
            ErrorCode::for_remote_error(&RemoteError::Unavailable),
            (ErrorCode::RemoteUnavailable, StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[test]
    fn failure_body_shape() {
        let body = serde_json::to_value(FailureResponse::new(ErrorCode::InvalidCode)).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "error", "code": "InvalidCode" }));
    }
}
