//! Streaming reader: chunked log download with reopen-on-failure.
//!
//! A [`ChunkStream`] is an iterator of text chunks. When reading the body
//! fails (a broken chunked transfer, a reset connection) the HTTP request is
//! reopened after a backoff delay, and the chunks already yielded by this
//! stream are swallowed from the fresh body so the caller does not see them
//! twice. This dedup is positional: it assumes the server replays the same
//! bytes in the same chunking, which holds for a plain log replay but not in
//! general.

use crate::client::retry::{RetryPolicy, Sleeper};
use crate::client::transport::{Request, Transport};
use crate::error::{ApiError, Result};
use reqwest::StatusCode;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bytes requested from the body per read.
pub const CHUNK_SIZE: usize = 256;

/// Result of opening a stream.
pub enum Opened {
    /// 200 OK, body ready to be read.
    Body(Box<dyn Read + Send>),
    /// Any other status; rendered as a single sentinel chunk.
    Rejected { status: u16, body: String },
}

/// Opens (and reopens) the underlying response.
pub trait StreamOpener {
    fn open(&mut self) -> Result<Opened>;
}

/// Opens a streaming request through the shared transport.
pub struct HttpOpener<'a> {
    transport: &'a Transport,
    request: Request,
}

impl<'a> HttpOpener<'a> {
    pub fn new(transport: &'a Transport, request: Request) -> Self {
        Self { transport, request }
    }
}

impl StreamOpener for HttpOpener<'_> {
    fn open(&mut self) -> Result<Opened> {
        let response = self.transport.open_stream(&self.request)?;
        if response.status() == StatusCode::OK {
            Ok(Opened::Body(Box::new(response)))
        } else {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            Ok(Opened::Rejected { status, body })
        }
    }
}

/// Incremental UTF-8 decoding across read boundaries.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
        out
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Lazy, finite sequence of text chunks with internal retries.
pub struct ChunkStream<O> {
    opener: O,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    body: Option<Box<dyn Read + Send>>,
    decoder: Utf8Decoder,
    attempts: u32,
    emitted: usize,
    to_skip: usize,
    finished: bool,
}

impl<O: StreamOpener> ChunkStream<O> {
    pub fn new(opener: O, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            opener,
            policy,
            sleeper,
            body: None,
            decoder: Utf8Decoder::default(),
            attempts: 0,
            emitted: 0,
            to_skip: 0,
            finished: false,
        }
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_retries.max(1)
    }

    /// Drop the current body and either schedule a reopen or give up.
    fn fail(&mut self, error: String) -> Option<Result<String>> {
        self.body = None;
        self.decoder.reset();

        if self.attempts >= self.max_attempts() {
            self.finished = true;
            warn!("stream failed on attempt {}: {}", self.attempts, error);
            return Some(Err(ApiError::DataStreamingFailure {
                attempts: self.attempts,
                last_error: error,
            }));
        }

        let delay = self.policy.delay(self.attempts);
        debug!(
            "stream interrupted ({}), reopening in {:?} and skipping {} chunk(s)",
            error, delay, self.emitted
        );
        self.sleeper.sleep(delay);
        self.to_skip = self.emitted;
        None
    }

    fn emit(&mut self, text: String) -> Option<String> {
        if self.to_skip > 0 {
            self.to_skip -= 1;
            return None;
        }
        self.emitted += 1;
        Some(text)
    }
}

impl<O: StreamOpener> Iterator for ChunkStream<O> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if self.body.is_none() {
                self.attempts += 1;
                match self.opener.open() {
                    Ok(Opened::Body(body)) => self.body = Some(body),
                    Ok(Opened::Rejected { status, body }) => {
                        self.finished = true;
                        return Some(Ok(format!("{}, {}", status, body)));
                    }
                    Err(e) => {
                        if let Some(err) = self.fail(e.to_string()) {
                            return Some(err);
                        }
                        continue;
                    }
                }
            }

            let mut buf = [0u8; CHUNK_SIZE];
            let read = match self.body.as_mut() {
                Some(body) => body.read(&mut buf),
                None => continue,
            };

            match read {
                Ok(0) => {
                    self.body = None;
                    self.finished = true;
                    let rest = self.decoder.finish();
                    if rest.is_empty() {
                        return None;
                    }
                    return self.emit(rest).map(Ok);
                }
                Ok(n) => {
                    let text = self.decoder.push(&buf[..n]);
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(chunk) = self.emit(text) {
                        return Some(Ok(chunk));
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if let Some(err) = self.fail(e.to_string()) {
                        return Some(err);
                    }
                }
            }
        }
    }
}
