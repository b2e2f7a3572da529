#![forbid(unsafe_code)]

use serde::Serialize;
use tally_verify::{Status, VerificationReport};

/// Machine-readable output of one `tally` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub schema: &'static str,
    pub backend: &'static str,
    pub timeout_ms: u64,
    pub summary: StatusCounts,
    pub reports: Vec<VerificationReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub verified: usize,
    pub violated: usize,
    pub unknown: usize,
    pub timeout: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn tally(reports: &[VerificationReport]) -> Self {
        let mut counts = StatusCounts::default();
        for r in reports {
            match r.status() {
                Status::Verified => counts.verified += 1,
                Status::Violated => counts.violated += 1,
                Status::Unknown => counts.unknown += 1,
                Status::Timeout => counts.timeout += 1,
                Status::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Timeouts and unknowns together: nothing was decided for them.
    pub fn undecided(&self) -> usize {
        self.unknown + self.timeout
    }
}

impl BatchReport {
    pub fn new(backend: &'static str, timeout_ms: u64, reports: Vec<VerificationReport>) -> Self {
        BatchReport {
            schema: "tally.report.v1",
            backend,
            timeout_ms,
            summary: StatusCounts::tally(&reports),
            reports,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for r in &self.reports {
            out.push_str(&r.render());
        }
        let s = &self.summary;
        out.push_str(&format!(
            "\n{} verified, {} violated, {} undecided, {} error(s) [backend {}, {} ms budget]\n",
            s.verified,
            s.violated,
            s.undecided(),
            s.error,
            self.backend,
            self.timeout_ms
        ));
        out
    }
}
