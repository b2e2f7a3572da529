#![forbid(unsafe_code)]

//! Challenge-period timelock of an optimistic bridge.
//!
//! A regression proof with no faulty variant: `withdrawable` is defined as
//! `current_time >= unlock_time`, so every valid period verifies.

use serde::Serialize;

use super::{require_non_negative, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelockParams {
    /// Blocks between the lock and the earliest withdrawal.
    pub lock_period: i128,
}

impl Default for TimelockParams {
    fn default() -> Self {
        // about seven days of 12s blocks
        TimelockParams { lock_period: 50_400 }
    }
}

impl Scenario for TimelockParams {
    fn name(&self) -> &'static str {
        "timelock"
    }

    fn claim(&self) -> String {
        format!("no withdrawal earlier than {} blocks after the lock", self.lock_period)
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_non_negative("lock_period", self.lock_period)
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let locked_amount = st.int("locked_amount")?;
        let lock_time = st.non_negative("lock_time")?;
        let unlock_time = st.int("unlock_time")?;
        let current_time = st.int("current_time")?;
        let withdrawable = st.flag("withdrawable")?;

        tr.push(locked_amount.gt(&Term::int(0)));
        tr.push(unlock_time.equals(&lock_time.plus(&Term::int(self.lock_period))));
        tr.push(current_time.ge(&lock_time));
        tr.push(withdrawable.equals(&current_time.ge(&unlock_time)));

        Ok(Encoding::new(st, tr, withdrawable.implies(&current_time.ge(&unlock_time)))
            .with_metric("early_by", unlock_time.minus(&current_time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_periods_are_rejected() {
        assert!(TimelockParams { lock_period: -1 }.validate().is_err());
        assert!(TimelockParams { lock_period: 0 }.validate().is_ok());
    }

    #[test]
    fn declares_the_time_line() {
        let enc = TimelockParams::default().encode().unwrap();
        let names: Vec<&str> = enc.state.vars().map(|v| v.name()).collect();
        assert_eq!(
            names,
            ["locked_amount", "lock_time", "unlock_time", "current_time", "withdrawable"]
        );
    }
}
