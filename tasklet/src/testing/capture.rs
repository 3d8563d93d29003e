use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Lines captured for a single test.
#[derive(Default)]
struct Buffer {
    lines: Mutex<Vec<String>>,
}

struct Registry {
    /// Events are captured only when their target equals this exactly.
    namespace: String,

    /// Buffers of the tests currently running.
    active: Mutex<Vec<Arc<Buffer>>>,
}

/// Log capture for tests.
///
/// Install [`layer`](Captures::layer) into the process subscriber once,
/// then attach the same `Captures` to each test with
/// [`TestTask::capture_logs`](super::TestTask::capture_logs). While a test
/// is running, every event whose target is exactly the namespace is
/// formatted and appended to that test's buffer. Events from descendant
/// targets such as `namespace::child` are not captured.
#[derive(Clone)]
pub struct Captures {
    registry: Arc<Registry>,
}

impl Captures {
    /// Creates a capture for events targeted exactly at `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            registry: Arc::new(Registry {
                namespace: namespace.into(),
                active: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The target captured events must match.
    pub fn namespace(&self) -> &str {
        &self.registry.namespace
    }

    /// The subscriber layer feeding this capture.
    pub fn layer(&self) -> LogCapture {
        LogCapture {
            registry: self.registry.clone(),
        }
    }

    /// A fresh buffer for one test.
    pub(crate) fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            registry: self.registry.clone(),
            buffer: Arc::new(Buffer::default()),
        }
    }
}

impl fmt::Debug for Captures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captures")
            .field("namespace", &self.registry.namespace)
            .finish()
    }
}

/// One test's view of a [`Captures`] registry.
pub(crate) struct CaptureHandle {
    registry: Arc<Registry>,
    buffer: Arc<Buffer>,
}

impl CaptureHandle {
    /// Starts appending matching events to this buffer.
    pub(crate) fn activate(&self) {
        let mut active = self.registry.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.iter().any(|b| Arc::ptr_eq(b, &self.buffer)) {
            active.push(self.buffer.clone());
        }
    }

    /// Stops appending. Lines already captured are kept.
    pub(crate) fn deactivate(&self) {
        let mut active = self.registry.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.retain(|b| !Arc::ptr_eq(b, &self.buffer));
    }

    /// Lines captured so far.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.buffer
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// `tracing_subscriber` layer behind [`Captures`].
pub struct LogCapture {
    registry: Arc<Registry>,
}

impl<S> Layer<S> for LogCapture
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() != self.registry.namespace {
            return;
        }

        let active = self.registry.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_empty() {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = format!("{} {}: {}{}", meta.level(), meta.target(), visitor.message, visitor.fields);

        for buffer in active.iter() {
            buffer
                .lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.clone());
        }
    }
}

/// Renders an event as `message k=v k=v`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
