pub mod eventstream;
pub mod zones;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;

use crate::error::{ApiError, ZoneError};
use crate::server::appstate::AppState;

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ZoneError(ZoneError::NoSuchZone(_)) => StatusCode::NOT_FOUND,
            Self::ZoneError(ZoneError::UnknownEffect(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::debug!("Rejected request: {self}");
        }

        let res = json!({"error": self.to_string()});

        (status, Json(res)).into_response()
    }
}

pub fn router(appstate: AppState) -> Router {
    Router::new()
        .nest("/api", zones::router().merge(eventstream::router()))
        .with_state(appstate)
}
