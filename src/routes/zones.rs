use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use oelo_api::zone::{LightRequest, LightResponse, ZoneView};

use crate::error::ApiResult;
use crate::server::appstate::AppState;

async fn get_zones(State(state): State<AppState>) -> Json<Vec<ZoneView>> {
    Json(state.backend().views().await)
}

async fn get_zone(
    State(state): State<AppState>,
    Path(zone): Path<u8>,
) -> ApiResult<Json<ZoneView>> {
    Ok(Json(state.backend().light(zone)?.view().await))
}

#[axum::debug_handler]
async fn put_zone(
    State(state): State<AppState>,
    Path(zone): Path<u8>,
    Json(req): Json<LightRequest>,
) -> ApiResult<Json<LightResponse>> {
    log::info!("Request for zone {zone}: {req:?}");
    Ok(Json(state.backend().request(zone, req).await?))
}

async fn get_effects(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.backend().effects())
}

async fn post_refresh(State(state): State<AppState>) -> Json<Vec<ZoneView>> {
    state.backend().poll().await;
    Json(state.backend().views().await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/zones", get(get_zones))
        .route("/zones/{zone}", get(get_zone).put(put_zone))
        .route("/effects", get(get_effects))
        .route("/refresh", post(post_refresh))
}
