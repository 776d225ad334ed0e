//! Pluggable Diagnostic Tracer
//!
//! The hub reports what it does (joins, leaves, deliveries, evictions)
//! through an injected [`Tracer`] rather than a global logger. Tracing is
//! fire-and-forget: implementations must never block or fail the caller.
//! The no-op tracer is the default when diagnostics are disabled.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// A sink for diagnostic events
pub trait Tracer: Send + Sync {
    /// Record one event. Must never block or fail the caller.
    fn trace(&self, values: fmt::Arguments<'_>);
}

/// Tracer that discards every event
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn trace(&self, _values: fmt::Arguments<'_>) {}
}

/// Tracer that writes one line per event to the wrapped writer.
/// Write errors are swallowed: diagnostics must not take down the hub.
pub struct WriterTracer<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterTracer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> Tracer for WriterTracer<W> {
    fn trace(&self, values: fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", values);
        }
    }
}

/// The default tracer: ignores everything.
pub fn off() -> Arc<dyn Tracer> {
    Arc::new(NoopTracer)
}

/// Trace one line per event into the given writer.
pub fn to_writer<W: Write + Send + 'static>(out: W) -> Arc<dyn Tracer> {
    Arc::new(WriterTracer::new(out))
}

/// Trace to standard output.
pub fn to_stdout() -> Arc<dyn Tracer> {
    to_writer(io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer handing every byte to a shared buffer, so tests can inspect
    /// what a tracer emitted.
    #[derive(Clone, Default)]
    struct BufSink(Arc<Mutex<Vec<u8>>>);

    impl BufSink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for BufSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_tracer_emits_one_line_per_event() {
        let sink = BufSink::default();
        let tracer = to_writer(sink.clone());

        tracer.trace(format_args!("first: {}", 1));
        tracer.trace(format_args!("second: {}", 2));

        assert_eq!(sink.contents(), "first: 1\nsecond: 2\n");
    }

    #[test]
    fn test_noop_tracer_ignores_events() {
        let tracer = off();
        tracer.trace(format_args!("nothing to see"));
    }

    #[test]
    fn test_tracer_is_object_safe() {
        let tracers: Vec<Arc<dyn Tracer>> = vec![off(), to_writer(BufSink::default())];
        for tracer in tracers {
            tracer.trace(format_args!("event"));
        }
    }
}
