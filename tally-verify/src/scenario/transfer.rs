#![forbid(unsafe_code)]

//! Hoare triple for a single debit:
//! `{balance >= amount && amount > 0} balance' := balance - amount {balance' >= 0}`.

use serde::Serialize;

use super::{Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransferParams {
    /// Drop the `balance >= amount` conjunct from the precondition when false.
    pub require_sufficient_balance: bool,
}

impl Default for TransferParams {
    fn default() -> Self {
        TransferParams {
            require_sufficient_balance: true,
        }
    }
}

impl Scenario for TransferParams {
    fn name(&self) -> &'static str {
        "transfer_triple"
    }

    fn claim(&self) -> String {
        if self.require_sufficient_balance {
            "{balance >= amount && amount > 0} debit {balance' >= 0}".to_string()
        } else {
            "{balance >= 0 && amount > 0} debit {balance' >= 0}".to_string()
        }
    }

    fn validate(&self) -> Result<(), VerifyError> {
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let zero = Term::int(0);
        let mut st = SymbolicState::new();
        let balance = st.non_negative("balance_before")?;
        let amount = st.int("amount")?;
        let after = st.int("balance_after")?;

        let mut tr = vec![amount.gt(&zero)];
        if self.require_sufficient_balance {
            tr.push(balance.ge(&amount));
        }
        tr.push(after.equals(&balance.minus(&amount)));

        Ok(Encoding::new(st, tr, after.ge(&zero)).with_metric("deficit", zero.minus(&after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weakened_precondition_drops_one_constraint() {
        let strong = TransferParams::default().encode().unwrap();
        let weak = TransferParams {
            require_sufficient_balance: false,
        }
        .encode()
        .unwrap();
        assert_eq!(strong.transitions.len(), weak.transitions.len() + 1);
        assert_eq!(strong.state.len(), 3);
    }
}
