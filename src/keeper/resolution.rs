use alloy::primitives::TxHash;
use serde::Deserialize;
use std::fmt;

/// Oracle answer to a market question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Affirmative,
    Negative,
    /// The oracle answered, but not with yes or no.
    Indeterminate,
}

impl Verdict {
    /// Read a terse model reply. Case, surrounding whitespace and trailing
    /// punctuation are ignored; anything other than yes/no is indeterminate.
    pub fn parse(answer: &str) -> Verdict {
        let word = answer
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match word.as_str() {
            "yes" => Verdict::Affirmative,
            "no" => Verdict::Negative,
            _ => Verdict::Indeterminate,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Affirmative => write!(f, "yes"),
            Verdict::Negative => write!(f, "no"),
            Verdict::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Value passed to `resolve(uint8)` (the market's outcome enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeCode {
    Yes = 1,
    No = 2,
}

impl OutcomeCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// `None` for an indeterminate verdict; the caller applies its policy.
    pub fn from_verdict(verdict: Verdict) -> Option<OutcomeCode> {
        match verdict {
            Verdict::Affirmative => Some(OutcomeCode::Yes),
            Verdict::Negative => Some(OutcomeCode::No),
            Verdict::Indeterminate => None,
        }
    }
}

/// What to do when the oracle does not give a clean yes/no.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndeterminatePolicy {
    /// Resolve as yes. Matches the keeper's historical behaviour.
    #[default]
    Affirmative,
    /// Leave the market unresolved and mark the lifecycle failed.
    Fail,
}

impl IndeterminatePolicy {
    /// Final outcome for `verdict`, or `None` when the market must fail.
    pub fn outcome(self, verdict: Verdict) -> Option<OutcomeCode> {
        match (OutcomeCode::from_verdict(verdict), self) {
            (Some(code), _) => Some(code),
            (None, IndeterminatePolicy::Affirmative) => Some(OutcomeCode::Yes),
            (None, IndeterminatePolicy::Fail) => None,
        }
    }
}

/// Hashes of the transaction pair sent for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub resolve_tx: TxHash,
    pub distribute_tx: TxHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_maps_to_codes() {
        assert_eq!(OutcomeCode::from_verdict(Verdict::Affirmative), Some(OutcomeCode::Yes));
        assert_eq!(OutcomeCode::from_verdict(Verdict::Negative), Some(OutcomeCode::No));
        assert_eq!(OutcomeCode::from_verdict(Verdict::Indeterminate), None);
        assert_eq!(OutcomeCode::Yes.as_u8(), 1);
        assert_eq!(OutcomeCode::No.as_u8(), 2);
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(Verdict::parse("yes"), Verdict::Affirmative);
        assert_eq!(Verdict::parse(" Yes.\n"), Verdict::Affirmative);
        assert_eq!(Verdict::parse("NO"), Verdict::Negative);
        assert_eq!(Verdict::parse("\"no\""), Verdict::Negative);
        assert_eq!(Verdict::parse("maybe"), Verdict::Indeterminate);
        assert_eq!(Verdict::parse(""), Verdict::Indeterminate);
        assert_eq!(Verdict::parse("yes and no"), Verdict::Indeterminate);
    }

    // The permissive default turns an unclear oracle answer into a "yes"
    // resolution. This pins that risk so a change to it is deliberate.
    #[test]
    fn test_indeterminate_defaults_to_yes_under_permissive_policy() {
        let policy = IndeterminatePolicy::default();
        assert_eq!(policy, IndeterminatePolicy::Affirmative);
        assert_eq!(policy.outcome(Verdict::Indeterminate), Some(OutcomeCode::Yes));
    }

    #[test]
    fn test_fail_policy_only_affects_indeterminate() {
        let policy = IndeterminatePolicy::Fail;
        assert_eq!(policy.outcome(Verdict::Indeterminate), None);
        assert_eq!(policy.outcome(Verdict::Affirmative), Some(OutcomeCode::Yes));
        assert_eq!(policy.outcome(Verdict::Negative), Some(OutcomeCode::No));
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            on_indeterminate: IndeterminatePolicy,
        }
        let w: Wrapper = toml::from_str("on_indeterminate = \"fail\"").unwrap();
        assert_eq!(w.on_indeterminate, IndeterminatePolicy::Fail);
    }
}
