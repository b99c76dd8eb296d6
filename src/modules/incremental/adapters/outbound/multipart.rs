use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::HeaderValue;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use futures::stream::BoxStream;

use crate::modules::incremental::core::payload::ExecutionPayload;

pub const MULTIPART_DEFER_CONTENT_TYPE: &str =
    "multipart/mixed;boundary=\"graphql\";deferSpec=20220824";

const FIRST_PART_HEADER: &[u8] = b"\r\n--graphql\r\ncontent-type: application/json\r\n\r\n";
const PART_HEADER: &[u8] = b"\r\ncontent-type: application/json\r\n\r\n";
const DELIMITER: &[u8] = b"\r\n--graphql";
const CLOSE_DELIMITER: &[u8] = b"\r\n--graphql--\r\n";

#[derive(thiserror::Error, Debug)]
pub enum MultipartError {
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
}

/// Frames payloads as `multipart/mixed` parts with the `graphql` boundary.
///
/// Each chunk ends with the delimiter that opens the next part, so a client can
/// act on a payload as soon as its chunk arrives. The payload with
/// `hasNext: false` is followed by the closing delimiter and ends the body.
pub struct Multipart {
    payloads: BoxStream<'static, ExecutionPayload>,
    is_first_chunk: bool,
    is_terminated: bool,
}

impl Multipart {
    pub fn new(payloads: BoxStream<'static, ExecutionPayload>) -> Self {
        Self {
            payloads,
            is_first_chunk: true,
            is_terminated: false,
        }
    }
}

impl Stream for Multipart {
    type Item = Result<Bytes, MultipartError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_terminated {
            return Poll::Ready(None);
        }
        match self.payloads.as_mut().poll_next(cx) {
            Poll::Ready(Some(payload)) => {
                let mut buf = if self.is_first_chunk {
                    self.is_first_chunk = false;
                    Vec::from(FIRST_PART_HEADER)
                } else {
                    Vec::from(PART_HEADER)
                };
                serde_json::to_writer(&mut buf, &payload)?;

                if payload.has_next() {
                    buf.extend_from_slice(DELIMITER);
                } else {
                    self.is_terminated = true;
                    buf.extend_from_slice(CLOSE_DELIMITER);
                }
                Poll::Ready(Some(Ok(buf.into())))
            }
            Poll::Ready(None) => {
                self.is_terminated = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl IntoResponse for Multipart {
    fn into_response(self) -> Response {
        let mut response = Body::from_stream(self).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(MULTIPART_DEFER_CONTENT_TYPE),
        );
        response
    }
}
