#![forbid(unsafe_code)]

//! Verification outcomes, reports and per-call configuration.
//!
//! A report captures:
//! - which property was checked and what it claims
//! - the outcome (verdict, counterexample, or why there is none)
//! - how far the call got and what it cost

use std::fmt;

use serde::Serialize;

use crate::counterexample::Counterexample;
use crate::error::VerifyError;

/// Solve budget used when the caller does not pick one.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Per-call configuration. Nothing here is process-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CheckConfig {
    pub timeout_ms: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CheckConfig {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        CheckConfig { timeout_ms }
    }
}

/// Named timeout presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtProfile {
    /// Quick feedback while iterating on an encoding.
    Fast,
    #[default]
    Ci,
    /// Long budget for large operation counts.
    Thorough,
}

impl SmtProfile {
    pub fn timeout_ms(self) -> u64 {
        match self {
            SmtProfile::Fast => 250,
            SmtProfile::Ci => DEFAULT_TIMEOUT_MS,
            SmtProfile::Thorough => 30_000,
        }
    }

    pub fn config(self) -> CheckConfig {
        CheckConfig::with_timeout_ms(self.timeout_ms())
    }
}

/// Terminal classification, without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Verified,
    Violated,
    Unknown,
    Timeout,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Verified => "VERIFIED",
            Status::Violated => "VIOLATED",
            Status::Unknown => "UNKNOWN",
            Status::Timeout => "TIMEOUT",
            Status::Error => "ERROR",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The negated invariant is unsatisfiable.
    Verified,
    /// The negated invariant is satisfiable; the model witnesses it.
    Violated(Counterexample),
    /// The backend gave up for a reason other than the deadline.
    Unknown { reason: String },
    Timeout { limit_ms: u64 },
    Error(VerifyError),
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Verified => Status::Verified,
            Outcome::Violated(_) => Status::Violated,
            Outcome::Unknown { .. } => Status::Unknown,
            Outcome::Timeout { .. } => Status::Timeout,
            Outcome::Error(_) => Status::Error,
        }
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match self {
            Outcome::Violated(cex) => Some(cex),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&VerifyError> {
        match self {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }

    /// `true` only for a completed proof. Undecided outcomes are never proofs.
    pub fn is_verified(&self) -> bool {
        matches!(self, Outcome::Verified)
    }
}

/// How far a verification call progressed before reaching its outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Parameters accepted or rejected; no session yet.
    Configured,
    /// A session is open and being populated.
    Encoding,
    /// The satisfiability check ran (or was attempted).
    Solving,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProofCost {
    /// Wall-clock time in milliseconds
    pub time_ms: u64,
    /// Constraints asserted into the session, negated invariant included
    pub assertions: usize,
    pub variables: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Property family identifier, e.g. `token_conservation`
    pub property: String,
    pub claim: String,
    pub outcome: Outcome,
    pub phase: Phase,
    pub cost: ProofCost,
}

impl VerificationReport {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    /// One line summary followed by the counterexample or error, if any.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[{}] {}: {} ({} ms, {} vars, {} assertions)\n",
            self.status(),
            self.property,
            self.claim,
            self.cost.time_ms,
            self.cost.variables,
            self.cost.assertions
        );
        match &self.outcome {
            Outcome::Violated(cex) => out.push_str(&cex.render()),
            Outcome::Unknown { reason } => out.push_str(&format!("  reason: {reason}\n")),
            Outcome::Timeout { limit_ms } => {
                out.push_str(&format!("  no decision within {limit_ms} ms; retry with a larger budget\n"))
            }
            Outcome::Error(e) => out.push_str(&format!("  error: {e}\n")),
            Outcome::Verified => {}
        }
        out
    }
}
