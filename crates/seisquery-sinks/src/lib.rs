//! seisquery-sinks — result writers.
//!
//! A [`ResultSink`] receives one document per request: `begin_document`,
//! any number of `emit` calls, then `end_document`, which reports the bytes
//! written. Two sinks are provided:
//!
//! | Sink | Accepts | Content type |
//! |------|---------|--------------|
//! | [`JsonSink`] | one complete graph | `application/json` |
//! | [`TextSink`] | rows, streamed | `text/plain; charset=utf-8` |

pub mod json;
pub mod text;

pub use json::{JsonSink, JSON_CONTENT_TYPE};
pub use text::{TextSink, TEXT_CONTENT_TYPE, TEXT_HEADER};

use seisquery_core::{EventParameters, EventRow, OutputFormat};
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The sink cannot represent this kind of emission.
    #[error("{sink} sink does not accept {kind}")]
    Unsupported { sink: &'static str, kind: &'static str },
}

/// One unit handed to a sink.
#[derive(Debug, Clone, Copy)]
pub enum Emission<'a> {
    Graph(&'a EventParameters),
    Row(&'a EventRow),
}

impl Emission<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Emission::Graph(_) => "graphs",
            Emission::Row(_) => "rows",
        }
    }
}

pub trait ResultSink {
    fn begin_document(&mut self) -> Result<(), SinkError>;
    fn emit(&mut self, item: Emission<'_>) -> Result<(), SinkError>;
    /// Finish the document and return the total number of bytes written.
    fn end_document(&mut self) -> Result<u64, SinkError>;
}

/// Content type of the document the sink for `format` writes.
pub fn content_type(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Json => JSON_CONTENT_TYPE,
        OutputFormat::Text => TEXT_CONTENT_TYPE,
    }
}

/// `Write` adapter that counts bytes passed through.
#[derive(Debug)]
pub(crate) struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
