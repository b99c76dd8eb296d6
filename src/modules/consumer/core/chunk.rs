//! Splits a response body, delivered in arbitrary chunks, into the JSON
//! payloads it carries.

use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use mediatype::{MediaType, ReadParams};
use thiserror::Error;

const DEFAULT_BOUNDARY: &str = "-";

pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read the response body: {0}")]
    Body(BodyError),

    #[error(transparent)]
    Multipart(#[from] multer::Error),
}

/// One unit of a decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The JSON text of one payload.
    Payload(String),
    /// The server signalled the end of the sequence.
    Complete,
}

#[derive(Debug, PartialEq)]
enum Framing {
    EventStream,
    Multipart(String),
    Json,
}

impl Framing {
    fn for_content_type(content_type: &str) -> Self {
        let Ok(mime) = MediaType::parse(content_type) else {
            return Framing::Json;
        };
        let ty = mime.ty.as_str().to_ascii_lowercase();
        let subty = mime.subty.as_str().to_ascii_lowercase();
        match (ty.as_str(), subty.as_str()) {
            ("text", "event-stream") => Framing::EventStream,
            ("multipart", "mixed") => Framing::Multipart(
                mime.get_param(mediatype::names::BOUNDARY)
                    .map(|value| value.unquoted_str().into_owned())
                    .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string()),
            ),
            _ => Framing::Json,
        }
    }
}

/// Frames of `body`, decoded the way its `Content-Type` says it is framed.
///
/// A frame is yielded as soon as the chunks completing it have arrived.
pub fn decode<S, E>(content_type: &str, body: S) -> BoxStream<'static, Result<Frame, DecodeError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BodyError> + Send + 'static,
{
    match Framing::for_content_type(content_type) {
        Framing::EventStream => buffered(EventStreamDecoder::default(), body),
        Framing::Multipart(boundary) => multipart(body, boundary),
        Framing::Json => buffered(JsonDecoder::default(), body),
    }
}

fn multipart<S, E>(body: S, boundary: String) -> BoxStream<'static, Result<Frame, DecodeError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BodyError> + Send + 'static,
{
    let parts = multer::Multipart::new(body, boundary);
    stream::unfold(Some(parts), |parts| async move {
        let mut parts = parts?;
        let part = match parts.next_field().await {
            Ok(Some(part)) => part,
            Ok(None) => return Some((Some(Ok(Frame::Complete)), None)),
            Err(error) => return Some((Some(Err(DecodeError::from(error))), None)),
        };
        match part.bytes().await {
            Ok(bytes) => Some((payload(&bytes).map(Ok), Some(parts))),
            Err(error) => Some((Some(Err(DecodeError::from(error))), None)),
        }
    })
    .filter_map(future::ready)
    .boxed()
}

/// Decoders that buffer raw chunks until a frame is complete.
trait ChunkDecoder: Send + 'static {
    /// Frames completed by `chunk`. Partial frames stay buffered.
    fn push(&mut self, chunk: &[u8]) -> Vec<Frame>;

    /// Frames left in the buffer once the body has ended.
    fn finish(&mut self) -> Vec<Frame>;
}

fn buffered<D, S, E>(decoder: D, body: S) -> BoxStream<'static, Result<Frame, DecodeError>>
where
    D: ChunkDecoder,
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BodyError> + Send + 'static,
{
    stream::unfold(Some((decoder, body.boxed())), |state| async move {
        let (mut decoder, mut body) = state?;
        match body.next().await {
            Some(Ok(chunk)) => {
                let frames = decoder.push(&chunk).into_iter().map(Ok).collect();
                Some((frames, Some((decoder, body))))
            }
            Some(Err(error)) => Some((vec![Err(DecodeError::Body(error.into()))], None)),
            None => Some((decoder.finish().into_iter().map(Ok).collect(), None)),
        }
    })
    .flat_map(|frames: Vec<Result<Frame, DecodeError>>| stream::iter(frames))
    .boxed()
}

fn payload(bytes: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| Frame::Payload(text.to_string()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Debug, Default)]
struct EventStreamDecoder {
    buffer: Vec<u8>,
    completed: bool,
}

impl EventStreamDecoder {
    fn event(&mut self, block: &[u8]) -> Option<Frame> {
        let block = String::from_utf8_lossy(block);
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event = Some(value),
                "data" => data.push(value),
                _ => {}
            }
        }

        if event == Some("complete") {
            self.completed = true;
            return Some(Frame::Complete);
        }
        let data = data.join("\n");
        (!data.is_empty()).then_some(Frame::Payload(data))
    }
}

impl ChunkDecoder for EventStreamDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.completed {
            return Vec::new();
        }
        self.buffer.extend(chunk.iter().filter(|&&byte| byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find(&self.buffer, b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = self.event(&block[..end]) {
                frames.push(frame);
            }
            if self.completed {
                self.buffer.clear();
                break;
            }
        }
        frames
    }

    fn finish(&mut self) -> Vec<Frame> {
        let block = std::mem::take(&mut self.buffer);
        if self.completed || block.is_empty() {
            return Vec::new();
        }
        self.event(&block).into_iter().collect()
    }
}

#[derive(Debug, Default)]
struct JsonDecoder {
    buffer: Vec<u8>,
}

impl ChunkDecoder for JsonDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        Vec::new()
    }

    fn finish(&mut self) -> Vec<Frame> {
        let body = std::mem::take(&mut self.buffer);
        payload(&body).into_iter().collect()
    }
}
