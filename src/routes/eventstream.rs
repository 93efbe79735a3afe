use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use futures::StreamExt;
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;

use oelo_api::zone::ZoneEvent;

use crate::error::ApiResult;
use crate::server::appstate::AppState;

/// Zone events as server-sent events, starting with the current state of
/// every zone.
pub async fn get_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = ApiResult<Event>>> {
    let channel = state.backend().subscribe();

    let snapshot = state
        .backend()
        .views()
        .await
        .into_iter()
        .map(ZoneEvent::Update)
        .map(Ok);

    let stream = tokio_stream::iter(snapshot)
        .chain(BroadcastStream::new(channel))
        .map(move |e| {
            let evt = e?;
            log::trace!(
                "## EVENT ##: {}",
                serde_json::to_string(&evt).unwrap_or_else(|_| "ERROR".to_string())
            );
            Ok(Event::default().json_data(evt)?)
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text(": ping"),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(get_events))
}
