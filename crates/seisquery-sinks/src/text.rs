//! Tabular sink: a header line, then one pipe-separated line per event.
//! Lines are flushed as they are emitted, so a document that is cut short
//! still contains every complete row.

use crate::{CountingWriter, Emission, ResultSink, SinkError};
use seisquery_core::EventRow;
use std::io::Write;

pub const TEXT_HEADER: &str = "#EventID|Time|Latitude|Longitude|Depth/km|Author|Catalog|\
Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName|EventType";

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub struct TextSink<W: Write> {
    out: CountingWriter<W>,
    rows: usize,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: CountingWriter::new(out),
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> ResultSink for TextSink<W> {
    fn begin_document(&mut self) -> Result<(), SinkError> {
        writeln!(self.out, "{TEXT_HEADER}")?;
        Ok(())
    }

    fn emit(&mut self, item: Emission<'_>) -> Result<(), SinkError> {
        let Emission::Row(row) = item else {
            return Err(SinkError::Unsupported {
                sink: "text",
                kind: item.kind(),
            });
        };
        writeln!(self.out, "{}", format_row(row))?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn end_document(&mut self) -> Result<u64, SinkError> {
        self.out.flush()?;
        tracing::debug!(rows = self.rows, bytes = self.out.written(), "text document done");
        Ok(self.out.written())
    }
}

/// Render one row; absent values become empty fields.
pub fn format_row(row: &EventRow) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let float = |v: Option<f64>| v.map(format_float).unwrap_or_default();
    [
        row.event_id.clone(),
        row.time.format(TIME_FORMAT).to_string(),
        format_float(row.latitude),
        format_float(row.longitude),
        float(row.depth),
        text(&row.author),
        text(&row.catalog),
        text(&row.contributor),
        row.contributor_id.clone(),
        text(&row.magnitude_type),
        float(row.magnitude),
        text(&row.magnitude_author),
        text(&row.location_name),
        text(&row.event_type),
    ]
    .join("|")
}

/// Shortest round-trip representation, always with a fractional part
/// (`10.0`, not `10`).
fn format_float(v: f64) -> String {
    format!("{v:?}")
}
