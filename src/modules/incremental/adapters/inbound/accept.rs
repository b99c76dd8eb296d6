use axum::http::HeaderMap;
use axum::http::header::ACCEPT;
use mediatype::{MediaType, MediaTypeList};

/// How a response body is framed for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// One JSON body; incremental directives are resolved eagerly.
    Json,
    /// `multipart/mixed`, one part per payload.
    Multipart,
    /// `text/event-stream`, one `next` event per payload.
    EventStream,
}

impl Transport {
    pub fn is_incremental(self) -> bool {
        !matches!(self, Transport::Json)
    }
}

#[derive(Debug, Default)]
struct ClientAccepts {
    multipart: bool,
    event_stream: bool,
}

fn is_multipart_mixed(mime: &MediaType) -> bool {
    use mediatype::names::MIXED;
    use mediatype::names::MULTIPART;
    mime.ty == MULTIPART && mime.subty == MIXED
}

fn is_event_stream(mime: &MediaType) -> bool {
    use mediatype::names::EVENT_STREAM;
    use mediatype::names::TEXT;
    mime.ty == TEXT && mime.subty == EVENT_STREAM
}

/// Picks the transport from every `Accept` header of the request.
///
/// Multipart wins over event streams; anything else, a missing header and
/// unparsable values included, falls back to JSON.
pub fn negotiate(headers: &HeaderMap) -> Transport {
    let mut accepts = ClientAccepts::default();

    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(MediaTypeList::new)
        .flatten()
        .for_each(|mime| {
            accepts.multipart = accepts.multipart || is_multipart_mixed(&mime);
            accepts.event_stream = accepts.event_stream || is_event_stream(&mime);
        });

    if accepts.multipart {
        Transport::Multipart
    } else if accepts.event_stream {
        Transport::EventStream
    } else {
        Transport::Json
    }
}
