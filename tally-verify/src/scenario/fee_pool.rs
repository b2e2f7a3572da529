#![forbid(unsafe_code)]

//! Liquidity pool that keeps a basis-point fee on every swap.
//!
//! The fee is the floor of `amount_in * fee_bps / 10000`, stated without division:
//! `10000 * fee <= amount_in * fee_bps < 10000 * (fee + 1)`.
//!
//! A regression proof: there is no faulty variant, so every valid parameter set is
//! expected to verify and no counterexample is ever produced.

use serde::Serialize;

use super::{require_positive, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

pub const BPS_DENOMINATOR: i64 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeePoolParams {
    pub pool_balance: i128,
    /// Fee in basis points, `100` is 1%.
    pub fee_bps: u32,
}

impl Default for FeePoolParams {
    fn default() -> Self {
        FeePoolParams {
            pool_balance: 100_000,
            fee_bps: 30,
        }
    }
}

impl Scenario for FeePoolParams {
    fn name(&self) -> &'static str {
        "fee_pool"
    }

    fn claim(&self) -> String {
        format!(
            "pool of {} grows by exactly the {} bps fee on every swap",
            self.pool_balance, self.fee_bps
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_positive("pool_balance", self.pool_balance)?;
        if i64::from(self.fee_bps) > BPS_DENOMINATOR {
            return Err(VerifyError::invalid(
                "fee_bps",
                format!("must be in 0..={BPS_DENOMINATOR}, got {}", self.fee_bps),
            ));
        }
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let denom = Term::int(BPS_DENOMINATOR);
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let pool_before = st.int("pool_before")?;
        let pool_after = st.int("pool_after")?;
        tr.push(pool_before.equals(&Term::int(self.pool_balance)));

        let amount_in = st.int("amount_in")?;
        tr.push(amount_in.gt(&Term::int(0)));
        tr.push(amount_in.le(&pool_before));

        let fee = st.non_negative("fee")?;
        let scaled = amount_in.times(&Term::int(self.fee_bps));
        tr.push(denom.times(&fee).le(&scaled));
        tr.push(scaled.lt(&denom.times(&fee.plus(&Term::int(1)))));

        let amount_out = st.int("amount_out")?;
        tr.push(amount_out.equals(&amount_in.minus(&fee)));
        tr.push(pool_after.equals(&pool_before.plus(&amount_in).minus(&amount_out)));

        let expected = pool_before.plus(&fee);
        Ok(Encoding::new(st, tr, pool_after.equals(&expected))
            .with_metric("fee_shortfall", expected.minus(&pool_after)))
    }
}
