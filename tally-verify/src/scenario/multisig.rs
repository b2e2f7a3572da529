#![forbid(unsafe_code)]

//! M-of-N validator approval, e.g. a bridge guarded by 5 of 9 signers.
//!
//! `enforced_quorum` is what the contract checks; `threshold` is what the protocol
//! promises. They differ when a deployment lowers the quorum.

use serde::Serialize;

use super::{Encoding, Scenario, MAX_OPERATIONS};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MultisigParams {
    pub validators: u32,
    pub threshold: u32,
    pub enforced_quorum: u32,
}

impl Default for MultisigParams {
    fn default() -> Self {
        MultisigParams {
            validators: 9,
            threshold: 5,
            enforced_quorum: 5,
        }
    }
}

fn require_within(name: &str, value: u32, max: u32) -> Result<(), VerifyError> {
    if value == 0 || value > max {
        return Err(VerifyError::invalid(name, format!("must be in 1..={max}, got {value}")));
    }
    Ok(())
}

impl Scenario for MultisigParams {
    fn name(&self) -> &'static str {
        "multisig_threshold"
    }

    fn claim(&self) -> String {
        format!(
            "approval needs {} of {} signatures (contract checks {})",
            self.threshold, self.validators, self.enforced_quorum
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_within("validators", self.validators, MAX_OPERATIONS)?;
        require_within("threshold", self.threshold, self.validators)?;
        require_within("enforced_quorum", self.enforced_quorum, self.validators)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let (zero, one) = (Term::int(0), Term::int(1));
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let signed = (0..self.validators)
            .map(|v| st.flag(format!("validator{v}_signed")))
            .collect::<Result<Vec<_>, _>>()?;
        let count = st.in_range("signature_count", 0, self.validators)?;
        tr.push(count.equals(&Term::sum(signed.iter().map(|s| s.ite(&one, &zero)))));

        let approved = st.flag("approved")?;
        tr.push(approved.equals(&count.ge(&Term::int(self.enforced_quorum))));

        let threshold = Term::int(self.threshold);
        Ok(Encoding::new(st, tr, approved.implies(&count.ge(&threshold)))
            .with_metric("missing_signatures", threshold.minus(&count)))
    }
}
