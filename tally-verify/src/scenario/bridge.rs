#![forbid(unsafe_code)]

//! Lock-on-source / mint-on-destination bridge conservation.
//!
//! `locked` and `minted` are monotone counters with their own step indices. Every
//! lock is followed by the faithful mint that references it; replayed mints then
//! reference an arbitrary earlier lock. With `nonce_binding` a mint of an already
//! processed lock is rejected.

use serde::Serialize;

use super::{require_count, require_positive, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BridgeParams {
    /// Amount of every lock event.
    pub amount: i128,
    /// Number of lock + faithful mint pairs.
    pub transfers: u32,
    /// Extra mints that reuse an earlier lock's message.
    pub replayed_mints: u32,
    pub nonce_binding: bool,
}

impl Default for BridgeParams {
    fn default() -> Self {
        BridgeParams {
            amount: 1000,
            transfers: 1,
            replayed_mints: 0,
            nonce_binding: false,
        }
    }
}

impl Scenario for BridgeParams {
    fn name(&self) -> &'static str {
        "bridge_conservation"
    }

    fn claim(&self) -> String {
        format!(
            "locked == minted after every mint ({} transfer(s) of {}, {} replayed mint(s), nonce binding {})",
            self.transfers,
            self.amount,
            self.replayed_mints,
            if self.nonce_binding { "on" } else { "off" }
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_positive("amount", self.amount)?;
        require_count("transfers", self.transfers, 1)?;
        require_count("replayed_mints", self.replayed_mints, 0)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let zero = Term::int(0);
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let mut locked = st.int("locked_total_step0")?;
        let mut minted = st.int("minted_total_step0")?;
        tr.push(locked.equals(&zero));
        tr.push(minted.equals(&zero));
        let (mut lock_step, mut mint_step) = (0usize, 0usize);

        let mut lock_amounts = Vec::new();
        let mut processed = Vec::new();
        let mut observations = Vec::new();

        for k in 0..self.transfers as usize {
            let lock_amount = st.int(format!("lock{k}_amount"))?;
            tr.push(lock_amount.equals(&Term::int(self.amount)));
            lock_step += 1;
            let next_locked = st.int(format!("locked_total_step{lock_step}"))?;
            tr.push(next_locked.equals(&locked.plus(&lock_amount)));
            locked = next_locked;

            let mint_amount = st.int(format!("mint{k}_amount"))?;
            tr.push(mint_amount.equals(&lock_amount));
            if self.nonce_binding {
                let flag = st.flag(format!("processed_lock{k}"))?;
                tr.push(flag.equals(&Term::bool(true)));
                processed.push(flag);
            }
            mint_step += 1;
            let next_minted = st.int(format!("minted_total_step{mint_step}"))?;
            tr.push(next_minted.equals(&minted.plus(&mint_amount)));
            minted = next_minted;

            lock_amounts.push(lock_amount);
            observations.push(locked.equals(&minted));
        }

        let last_lock = self.transfers as i64 - 1;
        for r in 0..self.replayed_mints as usize {
            let lock_ref = st.in_range(format!("replay{r}_lock_ref"), 0, last_lock)?;
            let replay_amount = st.int(format!("replay{r}_amount"))?;
            let referenced = Term::sum(
                lock_amounts
                    .iter()
                    .enumerate()
                    .map(|(k, a)| lock_ref.equals(&Term::int(k as i64)).ite(a, &zero)),
            );
            tr.push(replay_amount.equals(&referenced));

            let credited = if self.nonce_binding {
                let applied = st.flag(format!("replay{r}_applied"))?;
                let already = Term::any(
                    processed
                        .iter()
                        .enumerate()
                        .map(|(k, p)| lock_ref.equals(&Term::int(k as i64)).and(p)),
                );
                tr.push(applied.equals(&already.not()));
                applied.ite(&replay_amount, &zero)
            } else {
                replay_amount
            };

            mint_step += 1;
            let next_minted = st.int(format!("minted_total_step{mint_step}"))?;
            tr.push(next_minted.equals(&minted.plus(&credited)));
            minted = next_minted;
            observations.push(locked.equals(&minted));
        }

        let locked_total = st.int("locked_total")?;
        let minted_total = st.int("minted_total")?;
        tr.push(locked_total.equals(&locked));
        tr.push(minted_total.equals(&minted));

        Ok(Encoding::new(st, tr, Term::all(observations))
            .with_metric("attacker_profit", minted_total.minus(&locked_total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Model, Value};

    #[test]
    fn validation() {
        assert!(BridgeParams::default().validate().is_ok());
        assert!(BridgeParams { amount: 0, ..BridgeParams::default() }.validate().is_err());
        assert!(BridgeParams { transfers: 0, ..BridgeParams::default() }.validate().is_err());
    }

    #[test]
    fn replay_adds_one_observation_point() {
        let enc = BridgeParams {
            replayed_mints: 1,
            ..BridgeParams::default()
        }
        .encode()
        .unwrap();
        match &enc.invariant {
            Term::And(obs) => assert_eq!(obs.len(), 2),
            other => panic!("unexpected invariant {other}"),
        }
        assert!(enc.state.lookup("replay0_lock_ref").is_ok());
        assert!(enc.state.lookup("replay0_applied").is_err());
    }

    #[test]
    fn profit_metric_is_minted_minus_locked() {
        let enc = BridgeParams::default().encode().unwrap();
        let mut m = Model::new();
        m.insert("locked_total", Value::from(1000i64));
        m.insert("minted_total", Value::from(2000i64));
        assert_eq!(enc.metrics[0].name, "attacker_profit");
        assert_eq!(enc.metrics[0].expr.eval_int(&m).unwrap(), 1000.into());
    }
}
