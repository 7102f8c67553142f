// src/protocol.rs
//
// The process exit-status contract between pipeline and supervisor.
// Exit status is the ONLY signaling channel across the process boundary,
// so these values are a fixed, documented interface — change them and
// deployed supervisors will misclassify pipeline exits.
//
//   120  operator stop      operator requested a permanent stop (SIGTERM
//                           path); the supervisor halts its loop.
//   130  interrupted        graceful interrupt: Ctrl-C, end of input, or
//                           a watchdog freeze below the reboot threshold.
//                           Transient — the supervisor relaunches.
//   200  watchdog exhausted recovery exhausted (3rd freeze this boot);
//                           the supervisor reboots the host.
//
// Killed-by-signal (no exit code) and the well-known crash codes are the
// abnormal-crash class; anything else is transient.

/// Operator requested a permanent stop.
pub const EXIT_OPERATOR_STOP: i32 = 120;

/// Graceful interrupt; supervisor treats this as transient and restarts.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Reserved: the watchdog gave up on in-process recovery.
pub const EXIT_WATCHDOG_EXHAUSTED: i32 = 200;

/// Rust's default panic exit status.
const EXIT_PANIC: i32 = 101;
/// SIGABRT and SIGSEGV as reported through a shell-style status.
const EXIT_ABORT: i32 = 134;
const EXIT_SEGFAULT: i32 = 139;

/// The four meaningful classes of pipeline exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Halt the supervisor loop entirely.
    OperatorStop,
    /// Reboot the host immediately.
    WatchdogExhausted,
    /// Count against the crash ladder; reboot once it is exhausted.
    Crash,
    /// Reset the crash ladder and restart after a short delay.
    Transient,
}

impl ExitClass {
    /// Classify a pipeline exit. `code` is None when the process was
    /// killed by a signal it did not handle.
    pub fn classify(code: Option<i32>) -> Self {
        match code {
            None => Self::Crash,
            Some(EXIT_OPERATOR_STOP) => Self::OperatorStop,
            Some(EXIT_WATCHDOG_EXHAUSTED) => Self::WatchdogExhausted,
            Some(EXIT_PANIC) | Some(EXIT_ABORT) | Some(EXIT_SEGFAULT) => Self::Crash,
            Some(_) => Self::Transient,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperatorStop => "operator_stop",
            Self::WatchdogExhausted => "watchdog_exhausted",
            Self::Crash => "crash",
            Self::Transient => "transient",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes_classify_exactly() {
        assert_eq!(
            ExitClass::classify(Some(EXIT_OPERATOR_STOP)),
            ExitClass::OperatorStop
        );
        assert_eq!(
            ExitClass::classify(Some(EXIT_WATCHDOG_EXHAUSTED)),
            ExitClass::WatchdogExhausted
        );
    }

    #[test]
    fn interrupt_and_clean_exits_are_transient() {
        assert_eq!(ExitClass::classify(Some(0)), ExitClass::Transient);
        assert_eq!(
            ExitClass::classify(Some(EXIT_INTERRUPTED)),
            ExitClass::Transient
        );
        assert_eq!(ExitClass::classify(Some(2)), ExitClass::Transient);
    }

    #[test]
    fn crashes_are_crashes() {
        assert_eq!(ExitClass::classify(None), ExitClass::Crash);
        assert_eq!(ExitClass::classify(Some(101)), ExitClass::Crash);
        assert_eq!(ExitClass::classify(Some(134)), ExitClass::Crash);
        assert_eq!(ExitClass::classify(Some(139)), ExitClass::Crash);
    }
}
