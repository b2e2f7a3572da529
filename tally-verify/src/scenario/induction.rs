#![forbid(unsafe_code)]

//! Inductive form of `locked == minted` for a lock/mint bridge.
//!
//! Each obligation is a separate query over one abstract step, so the proof holds
//! for any number of steps rather than a bounded unrolling.

use serde::Serialize;

use super::{Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InductionObligation {
    /// `locked = minted = 0` satisfies the invariant.
    #[default]
    Base,
    /// A lock with no matching mint preserves it. Fails.
    LockOnly,
    /// A lock paired with a mint of the same amount preserves it.
    PairedLockMint,
}

impl InductionObligation {
    pub const ALL: [InductionObligation; 3] = [
        InductionObligation::Base,
        InductionObligation::LockOnly,
        InductionObligation::PairedLockMint,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BridgeInductionParams {
    pub obligation: InductionObligation,
}

impl BridgeInductionParams {
    pub fn all() -> Vec<BridgeInductionParams> {
        InductionObligation::ALL
            .into_iter()
            .map(|obligation| BridgeInductionParams { obligation })
            .collect()
    }
}

impl Scenario for BridgeInductionParams {
    fn name(&self) -> &'static str {
        match self.obligation {
            InductionObligation::Base => "bridge_induction_base",
            InductionObligation::LockOnly => "bridge_induction_lock",
            InductionObligation::PairedLockMint => "bridge_induction_paired",
        }
    }

    fn claim(&self) -> String {
        match self.obligation {
            InductionObligation::Base => "locked = minted = 0 implies locked == minted",
            InductionObligation::LockOnly => "locked == minted is preserved by lock(amount)",
            InductionObligation::PairedLockMint => "locked == minted is preserved by lock(amount); mint(amount)",
        }
        .to_string()
    }

    fn validate(&self) -> Result<(), VerifyError> {
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let zero = Term::int(0);
        let mut st = SymbolicState::new();
        let locked = st.int("locked")?;
        let minted = st.int("minted")?;

        if self.obligation == InductionObligation::Base {
            let tr = vec![locked.equals(&zero), minted.equals(&zero)];
            return Ok(Encoding::new(st, tr, locked.equals(&minted))
                .with_metric("difference", locked.minus(&minted)));
        }

        let amount = st.int("amount")?;
        let locked_after = st.int("locked_after")?;
        let minted_after = st.int("minted_after")?;
        let minted_step = match self.obligation {
            InductionObligation::PairedLockMint => minted.plus(&amount),
            _ => minted.clone(),
        };
        let tr = vec![
            locked.equals(&minted),
            amount.gt(&zero),
            locked_after.equals(&locked.plus(&amount)),
            minted_after.equals(&minted_step),
        ];
        Ok(Encoding::new(st, tr, locked_after.equals(&minted_after))
            .with_metric("difference", locked_after.minus(&minted_after)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Model, Value};
    use num_bigint::BigInt;

    #[test]
    fn obligations_have_distinct_names() {
        let names: Vec<&str> = BridgeInductionParams::all().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            ["bridge_induction_base", "bridge_induction_lock", "bridge_induction_paired"]
        );
    }

    #[test]
    fn lock_without_mint_opens_a_gap() {
        let enc = BridgeInductionParams {
            obligation: InductionObligation::LockOnly,
        }
        .encode()
        .unwrap();
        let mut m = Model::new();
        for (name, v) in [("locked", 7), ("minted", 7), ("amount", 3), ("locked_after", 10), ("minted_after", 7)] {
            m.insert(name, Value::from(v as i64));
        }
        assert!(enc.transitions.iter().all(|t| t.eval_bool(&m).unwrap()));
        assert!(!enc.invariant.eval_bool(&m).unwrap());
        assert_eq!(enc.metrics[0].expr.eval_int(&m).unwrap(), BigInt::from(3));
    }

    #[test]
    fn base_case_declares_only_the_counters() {
        let enc = BridgeInductionParams::default().encode().unwrap();
        let names: Vec<&str> = enc.state.vars().map(|v| v.name()).collect();
        assert_eq!(names, ["locked", "minted"]);
    }
}
