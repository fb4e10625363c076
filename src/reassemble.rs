//! C2 — the line reassembler. Accumulates chunks, splits on the line
//! terminator, and retains an incomplete trailing fragment across
//! deliveries (`spec.md` §4.2, invariant I1).

use bstr::ByteSlice;
use bytes::BytesMut;

const LINE_TERMINATOR: u8 = b'\n';

/// Stateful line splitter. One instance belongs to exactly one watcher; it
/// is never shared across concurrent chunk deliveries (the serial-pipeline
/// invariant of `spec.md` §5 make that safe).
#[derive(Debug, Default)]
pub struct LineReassembler {
    partial_fragment: BytesMut,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a newly read chunk; returns the complete, non-blank lines it
    /// produced, in order. A chunk that does not end in a terminator leaves
    /// its tail in `partial_fragment` to be completed by a later call —
    /// this function never emits a line that wasn't terminated in the
    /// source stream.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial_fragment.extend_from_slice(chunk);

        let mut lines = Vec::new();
        loop {
            let Some(newline_at) = self.partial_fragment.find_byte(LINE_TERMINATOR) else {
                break;
            };
            let line = self.partial_fragment.split_to(newline_at + 1);
            // Drop the terminator itself, and a preceding '\r' for CRLF sources.
            let mut line = &line[..line.len() - 1];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let text = String::from_utf8_lossy(line).into_owned();
            if !text.trim().is_empty() {
                lines.push(text);
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    #[test]
    fn carries_partial_fragment_across_chunks() {
        let mut r = LineReassembler::new();
        assert!(r.push(b"hello wor").is_empty());
        assert_eq!(r.push(b"ld\n").as_slice(), ["hello world"]);
    }

    #[test]
    fn one_chunk_many_lines() {
        let mut r = LineReassembler::new();
        assert_eq!(r.push(b"a\nb\nc\n").as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        let mut r = LineReassembler::new();
        assert_eq!(r.push(b"a\n   \n\t\nb\n").as_slice(), ["a", "b"]);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let mut r = LineReassembler::new();
        assert_eq!(r.push(b"a\r\nb\r\n").as_slice(), ["a", "b"]);
    }

    #[test]
    fn never_emits_an_unterminated_tail() {
        let mut r = LineReassembler::new();
        assert!(r.push(b"no newline here").is_empty());
    }

    // Property: for any split of a byte stream into arbitrary chunks, the
    // non-empty lines produced equal the non-empty lines of the whole text
    // (spec.md §8, "Line integrity").
    fn line_integrity_holds(text: Vec<(Vec<u8>, u8)>) -> TestResult {
        // Build a full text out of arbitrary non-newline byte runs, each
        // terminated by '\n', then split it at arbitrary chunk boundaries.
        let mut full = Vec::new();
        for (mut run, _) in text {
            run.retain(|b| *b != b'\n' && *b != b'\r');
            if run.is_empty() {
                continue;
            }
            full.extend_from_slice(&run);
            full.push(b'\n');
        }
        if full.is_empty() {
            return TestResult::discard();
        }

        let expected: Vec<String> = full
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect();

        // Split into chunks of varying size.
        let mut reassembler = LineReassembler::new();
        let mut got = Vec::new();
        for chunk in full.chunks(3) {
            got.extend(reassembler.push(chunk));
        }

        TestResult::from_bool(got == expected)
    }

    quickcheck! {
        fn qc_line_integrity(text: Vec<(Vec<u8>, u8)>) -> TestResult {
            line_integrity_holds(text)
        }
    }
}
