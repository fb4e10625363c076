//! C4 — retention and emission. Non-pattern modes emit every record
//! immediately; pattern mode holds the most recent record back for
//! `retained_log_timeout` so a continuation line (stack trace, multi-line
//! payload) can still be folded into it before it's considered final
//! (`spec.md` §4.4, invariant I3).

use std::time::Duration;

use crate::record::Record;

/// Why a retained record was released, for internal telemetry only.
pub const REASON_SUCCESSOR: &str = "successor-arrived";
pub const REASON_TIMER: &str = "timer-expired";
pub const REASON_STOPPED: &str = "stopped";

/// Holds at most one record — the simplest implementation of the "ordered
/// sequence of at most two meaningful states" described in `spec.md` §9.
pub struct RetentionBuffer {
    retained: Option<Record>,
    pattern_mode: bool,
    pub retained_log_timeout: Duration,
}

/// What the consumer pipeline should do after feeding a record or a timer
/// tick through the retention buffer.
pub struct RetentionOutcome {
    /// Records ready to emit immediately, in source order.
    pub to_emit: Vec<Record>,
    /// Whether a new retention timer should be (re)armed.
    pub arm_timer: bool,
}

impl RetentionBuffer {
    pub fn new(pattern_mode: bool, retained_log_timeout: Duration) -> Self {
        RetentionBuffer {
            retained: None,
            pattern_mode,
            retained_log_timeout,
        }
    }

    pub fn has_retained(&self) -> bool {
        self.retained.is_some()
    }

    /// Access to the retained record, used by the pattern-violation policy
    /// to append continuation lines onto it (`spec.md` §4.3).
    pub fn retained_mut(&mut self) -> Option<&mut Record> {
        self.retained.as_mut()
    }

    /// Feed a freshly parsed record through the retention policy.
    pub fn push(&mut self, record: Record) -> RetentionOutcome {
        if !self.pattern_mode {
            return RetentionOutcome {
                to_emit: vec![record],
                arm_timer: false,
            };
        }

        // Cancel any pending timer (step 2 of spec.md §4.4) is implicit:
        // the caller re-arms unconditionally whenever arm_timer is true,
        // which supersedes whatever timer was previously running.
        let mut to_emit = Vec::new();
        if let Some(previous) = self.retained.replace(record) {
            to_emit.push(previous);
        }
        RetentionOutcome {
            to_emit,
            arm_timer: true,
        }
    }

    /// The retention timer expired: release the retained record, if any.
    pub fn expire_timer(&mut self) -> Vec<Record> {
        self.retained.take().into_iter().collect()
    }

    /// `stop()` was called: flush whatever is retained so no record is
    /// ever lost (spec.md §8, "Retention completeness").
    pub fn drain_on_stop(&mut self) -> Vec<Record> {
        self.retained.take().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn rec(tag: &str) -> Record {
        let mut r = Record::new();
        r.insert("tag", tag.to_owned());
        r
    }

    #[test]
    fn non_pattern_mode_emits_immediately() {
        let mut buf = RetentionBuffer::new(false, Duration::from_millis(300));
        let outcome = buf.push(rec("a"));
        assert_eq!(outcome.to_emit.len(), 1);
        assert!(!outcome.arm_timer);
        assert!(!buf.has_retained());
    }

    #[test]
    fn pattern_mode_retains_latest_and_emits_predecessor() {
        let mut buf = RetentionBuffer::new(true, Duration::from_millis(300));

        let first = buf.push(rec("a"));
        assert!(first.to_emit.is_empty());
        assert!(first.arm_timer);
        assert!(buf.has_retained());

        let second = buf.push(rec("b"));
        assert_eq!(second.to_emit.len(), 1);
        assert!(buf.has_retained());
    }

    #[test]
    fn timer_expiry_releases_retained_record() {
        let mut buf = RetentionBuffer::new(true, Duration::from_millis(300));
        buf.push(rec("a"));
        let released = buf.expire_timer();
        assert_eq!(released.len(), 1);
        assert!(!buf.has_retained());
    }

    #[test]
    fn stop_flushes_retained_record() {
        let mut buf = RetentionBuffer::new(true, Duration::from_millis(300));
        buf.push(rec("a"));
        let flushed = buf.drain_on_stop();
        assert_eq!(flushed.len(), 1);
        assert!(!buf.has_retained());
    }
}
