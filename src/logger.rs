//! Logger setup and the diagnostic side channel written to during a run.

use std::cell::RefCell;

use log::{debug, error, info};

pub fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
}

/// Receives one line for every decision taken while resolving and applying variables.
pub trait DiagnosticSink {
    fn log(&self, message: &str);

    fn error(&self, message: &str) {
        self.log(&format!("ERROR: {message}"));
    }
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn log(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// Keeps diagnostics in memory, e.g. for a progress listener of an embedding host.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: RefCell<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Returns true if any collected line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|line| line.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn log(&self, message: &str) {
        debug!("{message}");
        self.lines.borrow_mut().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        sink.log("first");
        sink.error("second");

        assert_eq!(sink.lines(), vec!["first".to_string(), "ERROR: second".to_string()]);
        assert!(sink.contains("ERROR"));
        assert!(!sink.contains("third"));
    }
}
