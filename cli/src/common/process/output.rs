//! # Output Aggregation (`common::process::output`)
//!
//! File: cli/src/common/process/output.rs
//!
//! ## Overview
//!
//! Defines the unit of streamed output (`OutputFragment`) and the
//! `OutputAggregator` that folds fragments into the cumulative text shown to the
//! user and returned by blocking runs.
//!
//! The aggregator is append-only: it keeps a single growable `String` and never
//! reorders or deduplicates. Fragments are separated by a single `\n`; no
//! separator is written before the first fragment, so the cumulative text of
//! `[A, B, C]` is exactly `"A\nB\nC"`.
//!
//! The aggregator knows nothing about process lifecycles. Refusing to clear the
//! output of a still-running invocation is the caller's job.
//!
use std::fmt;

/// The pipe a fragment was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputChannel::Stdout => write!(f, "stdout"),
            OutputChannel::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line of output from a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFragment {
    /// Position in delivery order, starting at 0 for each invocation.
    pub seq: u64,
    pub channel: OutputChannel,
    pub text: String,
}

/// Cumulative output of one invocation.
#[derive(Debug, Default, Clone)]
pub struct OutputAggregator {
    buffer: String,
    fragments: usize,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and returns the cumulative text.
    pub fn append(&mut self, fragment: &str) -> &str {
        if self.fragments > 0 {
            self.buffer.push('\n');
        }
        self.buffer.push_str(fragment);
        self.fragments += 1;
        &self.buffer
    }

    /// Appends several fragments in order.
    pub fn extend<I, S>(&mut self, fragments: I) -> &str
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for fragment in fragments {
            self.append(fragment.as_ref());
        }
        &self.buffer
    }

    /// Discards all history.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.fragments = 0;
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn into_text(self) -> String {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fragment_has_no_separator() {
        let mut agg = OutputAggregator::new();
        assert_eq!(
            agg.append("Connection to 10.0.0.5 80 port [tcp/*] succeeded!"),
            "Connection to 10.0.0.5 80 port [tcp/*] succeeded!"
        );
        assert_eq!(agg.fragment_count(), 1);
    }

    #[test]
    fn test_fragments_joined_by_newline_in_order() {
        let fragments = ["Starting Nmap", "", "PORT   STATE SERVICE", "22/tcp open  ssh"];
        let mut agg = OutputAggregator::new();
        for f in fragments {
            agg.append(f);
        }
        assert_eq!(agg.text(), fragments.join("\n"));
        assert_eq!(agg.fragment_count(), 4);
    }

    #[test]
    fn test_append_is_associative() {
        let mut split = OutputAggregator::new();
        split.extend(["A", "B"]);
        split.extend(["C"]);

        let mut whole = OutputAggregator::new();
        whole.extend(["A", "B", "C"]);

        assert_eq!(split.text(), whole.text());
        assert_eq!(whole.text(), "A\nB\nC");
    }

    #[test]
    fn test_empty_fragment_still_counts() {
        let mut agg = OutputAggregator::new();
        agg.append("");
        assert!(!agg.is_empty());
        assert_eq!(agg.append("x"), "\nx");
    }

    #[test]
    fn test_clear_resets_history() {
        let mut agg = OutputAggregator::new();
        agg.extend(["one", "two"]);
        agg.clear();
        assert!(agg.is_empty());
        assert_eq!(agg.len(), 0);
        assert_eq!(agg.append("three"), "three");
    }
}
