use super::user::StreamerQuery;
use super::AppState;
use crate::utils::error::Result;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use tracing::debug;

/// 直播端訂閱自己的即時捐款事件
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamerQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let streamer_uuid = query.required()?;
    debug!("📡 SSE subscriber for {}", streamer_uuid);

    let events = state
        .donations
        .subscribe(&streamer_uuid)
        .map(|event| Event::default().event("donation").json_data(&event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
