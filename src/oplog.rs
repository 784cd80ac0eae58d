//! Ordered diagnostic log of one reconciliation.
//!
//! Every branch of the engine appends here, so a failed result still
//! carries a trace of what was attempted. Verbosity only decides which
//! entries are surfaced to the user; all of them are recorded.

/// Whether an entry is shown outside verbose mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Always surfaced.
    Always,
    /// Surfaced only when verbose output is requested.
    Verbose,
}

/// One line of the operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Surfacing level.
    pub level: LogLevel,
    /// Message text.
    pub message: String,
}

/// Append-only log threaded through the engine and returned in the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an always-surfaced entry. Empty messages are dropped.
    pub fn add(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Always, message.into());
    }

    /// Record an entry surfaced only in verbose mode.
    pub fn verbose(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Verbose, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if message.is_empty() {
            return;
        }
        log::debug!("[PushSync] {}", message);
        self.entries.push(LogEntry { level, message });
    }

    /// All recorded entries, in order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries surfaced at the given verbosity.
    pub fn surfaced(&self, verbose: bool) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |e| verbose || e.level == LogLevel::Always)
    }

    /// Surfaced entries joined with newlines.
    pub fn render(&self, verbose: bool) -> String {
        self.surfaced(verbose)
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any entry contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_entries_are_recorded_but_hidden() {
        let mut log = OperationLog::new();
        log.add("first");
        log.verbose("detail");
        log.add("last");

        assert_eq!(log.len(), 3);
        assert_eq!(log.render(false), "first\nlast");
        assert_eq!(log.render(true), "first\ndetail\nlast");
    }

    #[test]
    fn test_empty_messages_are_dropped() {
        let mut log = OperationLog::new();
        log.add("");
        log.verbose(String::new());
        assert!(log.is_empty());
    }
}
