use chrono::Local;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Live delivery callback for transcript lines.
///
/// Invoked while the bus lock is held so every consumer observes the same
/// order as the transcript; a sink must not log back into the same bus.
pub type LineSink = Box<dyn Fn(&str) + Send + Sync>;

/// Thread-safe, timestamp-ordered log shared by every workload.
pub struct EventBus {
    lines: Mutex<Vec<String>>,
    sink: Option<LineSink>,
}

impl EventBus {
    /// Bus whose lines go to the default output (a `tracing` info event)
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            sink: None,
        }
    }

    /// Bus that forwards every line to `sink` instead of the default output
    pub fn with_sink<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            lines: Mutex::new(Vec::new()),
            sink: Some(Box::new(sink)),
        }
    }

    /// Append a `[HH:MM:SS]`-prefixed line to the transcript
    pub fn log(&self, message: impl AsRef<str>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push(line.clone());
        match &self.sink {
            Some(sink) => sink(&line),
            None => info!(target: "cestt::events", "{}", line),
        }
    }

    /// Point-in-time copy of the transcript
    pub fn dump(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("lines", &self.len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sink_sees_transcript_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let bus = EventBus::with_sink(move |line| sink_seen.lock().unwrap().push(line.to_string()));

        bus.log("first");
        bus.log(String::from("second"));

        let dump = bus.dump();
        assert_eq!(dump.len(), 2);
        assert!(dump[0].ends_with("] first"));
        assert!(dump[1].ends_with("] second"));
        assert_eq!(*seen.lock().unwrap(), dump);
    }

    #[test]
    fn test_concurrent_logging_keeps_every_line() {
        let bus = Arc::new(EventBus::with_sink(|_| {}));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let bus = Arc::clone(&bus);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        bus.log(format!("t{t} line {i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bus.len(), 400);
    }
}
