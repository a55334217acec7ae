//! Structured sink: the whole graph as one JSON document.

use crate::{CountingWriter, Emission, ResultSink, SinkError};
use std::io::Write;

pub const JSON_CONTENT_TYPE: &str = "application/json";

pub struct JsonSink<W: Write> {
    out: CountingWriter<W>,
    pretty: bool,
    emitted: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, pretty: bool) -> Self {
        Self {
            out: CountingWriter::new(out),
            pretty,
            emitted: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn begin_document(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn emit(&mut self, item: Emission<'_>) -> Result<(), SinkError> {
        let graph = match item {
            Emission::Graph(graph) if !self.emitted => graph,
            other => {
                return Err(SinkError::Unsupported {
                    sink: "json",
                    kind: if self.emitted { "a second graph" } else { other.kind() },
                })
            }
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, graph)?;
        } else {
            serde_json::to_writer(&mut self.out, graph)?;
        }
        self.emitted = true;
        Ok(())
    }

    fn end_document(&mut self) -> Result<u64, SinkError> {
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(self.out.written())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisquery_core::types::{Event, EventParameters};

    fn graph() -> EventParameters {
        let mut ep = EventParameters::new();
        ep.add_event(Event {
            public_id: "ev1".into(),
            preferred_origin_id: Some("or1".into()),
            ..Default::default()
        });
        ep
    }

    #[test]
    fn compact_document() {
        let mut sink = JsonSink::new(Vec::new(), false);
        sink.begin_document().unwrap();
        sink.emit(Emission::Graph(&graph())).unwrap();
        let n = sink.end_document().unwrap();
        let body = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(n as usize, body.len());
        insta::assert_snapshot!(
            body.trim_end(),
            @r#"{"events":[{"public_id":"ev1","preferred_origin_id":"or1"}],"origins":[],"focal_mechanisms":[],"picks":[]}"#
        );
    }

    #[test]
    fn pretty_document_is_indented() {
        let mut sink = JsonSink::new(Vec::new(), true);
        sink.emit(Emission::Graph(&graph())).unwrap();
        sink.end_document().unwrap();
        let body = String::from_utf8(sink.into_inner()).unwrap();
        assert!(body.starts_with("{\n  \"events\": ["));
    }

    #[test]
    fn rejects_second_graph() {
        let mut sink = JsonSink::new(Vec::new(), false);
        let g = graph();
        sink.emit(Emission::Graph(&g)).unwrap();
        assert!(matches!(
            sink.emit(Emission::Graph(&g)),
            Err(SinkError::Unsupported { .. })
        ));
    }
}
