//! SSE translation pipeline.
//!
//! Reads the upstream event stream and converts it into OpenAI-shaped
//! output, either as a live SSE stream or as one buffered response.
//! Both modes share the same line framing and event dispatch; they differ
//! only in what they emit.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::openai::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Delta, Role,
    StreamChoice, StreamChunk, Usage, CHUNK_OBJECT, COMPLETIONS_OBJECT,
};
use crate::tokens::estimate_usage;

const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";
const END_PAYLOAD: &str = "end";
const FINISH_STOP: &str = "stop";

/// Abort the stream once this many upstream bytes arrive without a terminator.
const MAX_STREAM_BYTES: usize = 1024 * 1024;
/// Idle interval after which a keepalive comment is sent to the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Bounded frame buffer between the translator task and the response body.
const FRAME_BUFFER: usize = 32;

const FINGERPRINT_LEN: usize = 10;

/// One upstream SSE event. Parsing is tolerant: unknown fields and event
/// types are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SseEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub updated: Option<QuotaUpdate>,
    #[serde(default)]
    pub spent: Option<SpentAmount>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuotaUpdate {
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub current: Amount,
    #[serde(default)]
    pub maximum: Amount,
    #[serde(default)]
    pub until: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpentAmount {
    #[serde(default)]
    pub amount: String,
}

/// Accumulates upstream bytes into complete lines.
///
/// Chunk boundaries do not align with line boundaries; incomplete trailing
/// data is kept until the next chunk arrives. Returned lines have the
/// trailing newline stripped; empty lines are dropped.
#[derive(Debug, Default)]
struct SseLineBuffer {
    incomplete: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self::default()
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.incomplete.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(pos) = self.incomplete.find('\n') {
            let line = self.incomplete[..pos].to_string();
            self.incomplete = self.incomplete[pos + 1..].to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

/// Identifiers held constant across all chunks of one request
struct StreamIdentity {
    id: String,
    created: i64,
    model: String,
    fingerprint: String,
}

impl StreamIdentity {
    fn new(model: &str) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0) as i64;

        Self {
            id: format!("chatcmpl-{created}"),
            created,
            model: model.to_string(),
            fingerprint: random_fingerprint(FINGERPRINT_LEN),
        }
    }
}

fn random_fingerprint(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

enum Payload<'a> {
    Skip,
    Terminator,
    Event(&'a str),
}

fn classify(payload: &str) -> Payload<'_> {
    match payload {
        "" | END_PAYLOAD => Payload::Skip,
        DONE_PAYLOAD => Payload::Terminator,
        event => Payload::Event(event),
    }
}

/// Extract and trim the payload of a `data: ` line
fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

fn spent_amount(event: &SseEvent) -> i64 {
    let Some(spent) = &event.spent else {
        return 0;
    };
    match spent.amount.parse::<f64>() {
        Ok(amount) => amount.round() as i64,
        Err(err) => {
            warn!(amount = %spent.amount, error = %err, "failed to parse spent amount");
            0
        }
    }
}

fn content_chunk(identity: &StreamIdentity, content: &str) -> StreamChunk {
    StreamChunk {
        id: identity.id.clone(),
        object: CHUNK_OBJECT.to_string(),
        created: identity.created,
        model: identity.model.clone(),
        choices: vec![StreamChoice {
            index: 0,
            delta: Delta {
                role: Role::Assistant,
                content: content.to_string(),
            },
            finish_reason: None,
        }],
        system_fingerprint: identity.fingerprint.clone(),
        usage: None,
    }
}

fn finish_chunk(identity: &StreamIdentity, usage: Usage) -> StreamChunk {
    StreamChunk {
        id: identity.id.clone(),
        object: CHUNK_OBJECT.to_string(),
        created: identity.created,
        model: identity.model.clone(),
        choices: vec![StreamChoice {
            index: 0,
            delta: Delta {
                role: Role::Assistant,
                content: String::new(),
            },
            finish_reason: Some(FINISH_STOP.to_string()),
        }],
        system_fingerprint: identity.fingerprint.clone(),
        usage: Some(usage),
    }
}

fn assembled_response(
    identity: &StreamIdentity,
    content: String,
    usage: Usage,
) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: identity.id.clone(),
        object: COMPLETIONS_OBJECT.to_string(),
        created: identity.created,
        model: identity.model.clone(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant,
                content,
            },
            finish_reason: Some(FINISH_STOP.to_string()),
        }],
        system_fingerprint: identity.fingerprint.clone(),
        usage,
    }
}

fn sse_frame(chunk: &StreamChunk) -> Bytes {
    let json = serde_json::to_string(chunk).expect("stream chunk always serializes");
    Bytes::from(format!("data: {json}\n\n"))
}

fn done_frame() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": keepalive\n\n")
}

fn stream_error(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message)
}

/// Consume the upstream stream and assemble one buffered response.
///
/// Returns as soon as a QuotaMetadata event arrives; EOF (or an upstream
/// `[DONE]`) without one yields the accumulated content with a zero spent
/// amount.
pub async fn collect_response<S>(
    mut upstream: S,
    request: &ChatCompletionRequest,
) -> AppResult<ChatCompletionResponse>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let identity = StreamIdentity::new(&request.model);
    let mut lines = SseLineBuffer::new();
    let mut content = String::new();
    let mut total_bytes = 0usize;

    'read: while let Some(chunk) = upstream.next().await {
        let chunk = chunk.map_err(|err| AppError::Upstream(format!("read error: {err}")))?;

        total_bytes += chunk.len();
        if total_bytes > MAX_STREAM_BYTES {
            return Err(AppError::Upstream(format!(
                "buffer overflow: exceeded maximum buffer size of {MAX_STREAM_BYTES} bytes"
            )));
        }

        for line in lines.feed(&chunk) {
            let Some(payload) = data_payload(&line) else {
                continue;
            };

            let event = match classify(payload) {
                Payload::Skip => continue,
                Payload::Terminator => break 'read,
                Payload::Event(json) => match serde_json::from_str::<SseEvent>(json) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "skipping malformed SSE event");
                        continue;
                    }
                },
            };

            match event.kind.as_str() {
                "Content" => content.push_str(&event.content),
                "QuotaMetadata" => {
                    let usage = estimate_usage(&content, spent_amount(&event));
                    return Ok(assembled_response(&identity, content, usage));
                }
                other => debug!(kind = other, "ignoring SSE event type"),
            }
        }
    }

    debug!("upstream stream ended without quota metadata");
    let usage = estimate_usage(&content, 0);
    Ok(assembled_response(&identity, content, usage))
}

/// Translate the upstream stream into an SSE response body.
///
/// The translator runs in a spawned task feeding a bounded channel; every
/// frame is pushed as soon as its event arrives, so the client sees
/// incremental delivery. If the client disconnects the channel closes and
/// the task stops without emitting a terminator.
pub fn stream_body<S>(upstream: S, request: &ChatCompletionRequest) -> Body
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let (frames, rx) = mpsc::channel::<Result<Bytes, io::Error>>(FRAME_BUFFER);
    let identity = StreamIdentity::new(&request.model);

    tokio::spawn(pump_stream(upstream, identity, frames));

    Body::from_stream(ReceiverStream::new(rx))
}

async fn pump_stream<S>(
    mut upstream: S,
    identity: StreamIdentity,
    frames: mpsc::Sender<Result<Bytes, io::Error>>,
) where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    let mut lines = SseLineBuffer::new();
    let mut content = String::new();
    let mut total_bytes = 0usize;

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );

    loop {
        let chunk = tokio::select! {
            _ = heartbeat.tick() => {
                if frames.send(Ok(keepalive_frame())).await.is_err() {
                    debug!("client disconnected during keepalive");
                    return;
                }
                continue;
            }
            chunk = upstream.next() => chunk,
        };

        let Some(chunk) = chunk else {
            debug!("upstream stream ended without quota metadata");
            return;
        };

        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = frames
                    .send(Err(stream_error(format!("read error: {err}"))))
                    .await;
                return;
            }
        };

        total_bytes += chunk.len();
        if total_bytes > MAX_STREAM_BYTES {
            warn!(bytes = total_bytes, "SSE buffer overflow, aborting stream");
            let _ = frames
                .send(Err(stream_error(format!(
                    "buffer overflow: exceeded maximum buffer size of {MAX_STREAM_BYTES} bytes"
                ))))
                .await;
            return;
        }

        for line in lines.feed(&chunk) {
            let Some(payload) = data_payload(&line) else {
                continue;
            };

            let event = match classify(payload) {
                Payload::Skip => continue,
                // Ends like EOF: no synthetic finish without quota metadata.
                Payload::Terminator => return,
                Payload::Event(json) => match serde_json::from_str::<SseEvent>(json) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "skipping malformed SSE event");
                        continue;
                    }
                },
            };

            match event.kind.as_str() {
                "Content" => {
                    content.push_str(&event.content);
                    let frame = sse_frame(&content_chunk(&identity, &event.content));
                    if frames.send(Ok(frame)).await.is_err() {
                        debug!("client disconnected, aborting stream");
                        return;
                    }
                }
                "QuotaMetadata" => {
                    let usage = estimate_usage(&content, spent_amount(&event));
                    let frame = sse_frame(&finish_chunk(&identity, usage));
                    if frames.send(Ok(frame)).await.is_err() {
                        return;
                    }
                    let _ = frames.send(Ok(done_frame())).await;
                    debug!("stream completed");
                    return;
                }
                other => debug!(kind = other, "ignoring SSE event type"),
            }
        }
    }
}
