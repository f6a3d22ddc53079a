use std::io;
use std::sync::{Arc, Mutex};

use karenina_core::export::ExportOptions;
use karenina_core::{build_csv, build_json_export, parse_results, ExportableResult};
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn export_built_events(run: impl FnOnce()) -> Vec<Value> {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::with_default(subscriber, run);

    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l).expect("json log line"))
        .filter(|v| v["fields"]["event"] == "export.built")
        .collect()
}

fn one_result() -> Vec<ExportableResult> {
    parse_results(json!([{ "metadata": { "question_id": "q1" } }])).expect("parse results")
}

#[test]
fn json_export_logs_selected_field_count() {
    let results = one_result();
    let events = export_built_events(|| {
        let opts = ExportOptions::default().with_fields(["question_id", "raw_llm_response"]);
        build_json_export(&results, None, &opts).expect("json export");
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["fields"]["format"], "json");
    assert_eq!(events[0]["fields"]["rows"], 1);
    assert_eq!(events[0]["fields"]["columns"], 2);
}

#[test]
fn csv_export_logs_header_width() {
    let results = one_result();
    let events = export_built_events(|| {
        let opts = ExportOptions::default().with_fields(["question_id"]);
        build_csv(&results, None, &opts).expect("csv export");
    });

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["fields"]["format"], "csv");
    assert_eq!(events[0]["fields"]["columns"], 1);
}
