pub mod appstate;
pub mod http;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::server::appstate::AppState;

pub fn build_service(appstate: AppState) -> Router {
    routes::router(appstate).layer(TraceLayer::new_for_http())
}
