use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use serde::Serialize;

/// The nested timeline spans a job moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Job,
    Step,
    Group,
    CommOp,
    Transmission,
    Waiting,
}

impl Span {
    fn name(self) -> &'static str {
        match self {
            Span::Job => "job",
            Span::Step => "step",
            Span::Group => "group",
            Span::CommOp => "comm_op",
            Span::Transmission => "transmission",
            Span::Waiting => "waiting",
        }
    }
}

#[derive(Serialize)]
struct TraceEvent {
    name: &'static str,
    cat: &'static str,
    ph: &'static str,
    pid: u32,
    tid: u32,
    // microseconds, chrome-trace convention
    ts: f64,
}

/*====================================================================================================================*/

/// Records begin/end events for every job state transition; the output is a
/// chrome-trace JSON array loadable in about://tracing.
#[derive(Default)]
pub struct Tracer {
    events: Vec<TraceEvent>,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer::default()
    }

    pub fn record(&mut self, span: Span, is_begin: bool, now: f64, job_id: u32) {
        self.events.push(TraceEvent {
            name: span.name(),
            cat: "simulation",
            ph: if is_begin { "B" } else { "E" },
            pid: job_id,
            tid: 0,
            ts: now * 1e6,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn flush(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer(file, &self.events)?;
        Ok(())
    }
}
