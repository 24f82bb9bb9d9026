//! Mapping from remote job states to verdicts.

use sluice_model::Verdict;

/// Job states the control plane is known to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteState {
    Pending,
    Started,
    Success,
    Failure,
    Revoked,
    Lost,
    TimedOut,
    /// Remote-side retry. Terminal from this engine's point of view; it has
    /// nothing to do with the client-side polling loop.
    Retry,
    Received,
    Rejected,
    Ignored,
    /// Anything else, including states added to the control plane later.
    Unrecognized,
}

impl RemoteState {
    /// Parse a raw state, ignoring case, spaces, `_` and `-`.
    pub fn parse(raw: &str) -> Self {
        let norm: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match norm.as_str() {
            "PENDING" => RemoteState::Pending,
            "STARTED" => RemoteState::Started,
            "SUCCESS" => RemoteState::Success,
            "FAILURE" => RemoteState::Failure,
            "REVOKED" => RemoteState::Revoked,
            "LOST" => RemoteState::Lost,
            "TIMEDOUT" => RemoteState::TimedOut,
            "RETRY" => RemoteState::Retry,
            "RECEIVED" => RemoteState::Received,
            "REJECTED" => RemoteState::Rejected,
            "IGNORED" => RemoteState::Ignored,
            _ => RemoteState::Unrecognized,
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            RemoteState::Pending | RemoteState::Started | RemoteState::Unrecognized => {
                Verdict::Unresolved
            }
            RemoteState::Success => Verdict::Succeeded,
            RemoteState::Failure
            | RemoteState::Revoked
            | RemoteState::Lost
            | RemoteState::TimedOut
            | RemoteState::Retry
            | RemoteState::Received
            | RemoteState::Rejected
            | RemoteState::Ignored => Verdict::Failed,
        }
    }
}

/// Classify a raw remote state. Unknown values stay unresolved so polling continues.
#[inline]
pub fn classify(raw: &str) -> Verdict {
    RemoteState::parse(raw).verdict()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAILED: [&str; 8] = [
        "FAILURE", "REVOKED", "LOST", "TIMEDOUT", "RETRY", "RECEIVED", "REJECTED", "IGNORED",
    ];

    #[test]
    fn unresolved_states() {
        assert_eq!(classify("PENDING"), Verdict::Unresolved);
        assert_eq!(classify("STARTED"), Verdict::Unresolved);
    }

    #[test]
    fn success_state() {
        assert_eq!(classify("SUCCESS"), Verdict::Succeeded);
    }

    #[test]
    fn failed_states() {
        for raw in FAILED {
            assert_eq!(classify(raw), Verdict::Failed, "{raw}");
        }
    }

    #[test]
    fn remote_retry_is_terminal() {
        assert!(classify("RETRY").is_terminal());
    }

    #[test]
    fn unknown_states_stay_unresolved() {
        assert_eq!(classify("WEIRD_STATE"), Verdict::Unresolved);
        assert_eq!(classify(""), Verdict::Unresolved);
        assert_eq!(classify("SUCCESSFUL"), Verdict::Unresolved);
    }

    #[test]
    fn parsing_ignores_case_and_separators() {
        assert_eq!(RemoteState::parse("success"), RemoteState::Success);
        assert_eq!(RemoteState::parse("Timed_Out"), RemoteState::TimedOut);
        assert_eq!(RemoteState::parse("timed-out"), RemoteState::TimedOut);
        assert_eq!(RemoteState::parse(" started "), RemoteState::Started);
    }

    #[test]
    fn every_state_maps_to_exactly_one_verdict() {
        let all = [
            RemoteState::Pending,
            RemoteState::Started,
            RemoteState::Success,
            RemoteState::Failure,
            RemoteState::Revoked,
            RemoteState::Lost,
            RemoteState::TimedOut,
            RemoteState::Retry,
            RemoteState::Received,
            RemoteState::Rejected,
            RemoteState::Ignored,
            RemoteState::Unrecognized,
        ];
        let succeeded = all.iter().filter(|s| s.verdict() == Verdict::Succeeded).count();
        let failed = all.iter().filter(|s| s.verdict() == Verdict::Failed).count();
        let unresolved = all.iter().filter(|s| s.verdict() == Verdict::Unresolved).count();

        assert_eq!(succeeded, 1);
        assert_eq!(failed, 8);
        assert_eq!(unresolved, 3);
    }
}
