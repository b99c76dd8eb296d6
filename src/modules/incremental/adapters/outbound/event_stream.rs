use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::modules::incremental::core::payload::ExecutionPayload;

pub const NEXT_EVENT: &str = "next";
pub const COMPLETE_EVENT: &str = "complete";

/// Sends each payload as a `next` event and closes with a `complete` event.
pub fn event_stream(
    payloads: BoxStream<'static, ExecutionPayload>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = payloads
        .map(|payload| Event::default().event(NEXT_EVENT).json_data(&payload))
        .chain(stream::once(async { Ok(Event::default().event(COMPLETE_EVENT)) }));
    Sse::new(events).keep_alive(KeepAlive::default())
}
