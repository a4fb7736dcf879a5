use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::warn;

use crate::trace::trace::TraceEvent;

/// JSONL sink for crawl events, owned by the engine.
///
/// Each event is one line, flushed as soon as it is written so a crawl that
/// dies mid-run still leaves a readable trace. A logger whose file could not
/// be opened behaves like `disabled()`.
pub struct TraceLogger {
    sink: Option<BufWriter<File>>,
}

impl TraceLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(BufWriter::new(file)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file, tracing disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn log(&mut self, event: &TraceEvent) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(e) = write_line(sink, event) {
            warn!(step = event.step, error = %e, "failed to write trace event");
        }
    }
}

fn write_line(sink: &mut BufWriter<File>, event: &TraceEvent) -> io::Result<()> {
    serde_json::to_writer(&mut *sink, event)?;
    sink.write_all(b"\n")?;
    sink.flush()
}
