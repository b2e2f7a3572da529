#![forbid(unsafe_code)]

//! Hash time-locked swap between two parties, Alice and Bob.
//!
//! Revealing the secret lets the counterparty claim; once the timelock expires
//! without a reveal each payer is refunded. Fairness: nobody who paid while the
//! other side did not is left without their funds.

use serde::Serialize;

use super::{Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AtomicSwapParams {
    /// Fix the timelock as expired. Before expiry a lone payer is still locked in.
    pub timelock_expired: bool,
    /// The secret is only revealed by claiming a counterparty lock, so a reveal
    /// implies both sides paid.
    pub reveal_requires_both_locks: bool,
}

impl Scenario for AtomicSwapParams {
    fn name(&self) -> &'static str {
        "atomic_swap"
    }

    fn claim(&self) -> String {
        format!(
            "no party pays without receiving or being refunded ({}{})",
            if self.timelock_expired { "after expiry" } else { "before expiry" },
            if self.reveal_requires_both_locks { ", reveal needs both locks" } else { "" }
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let mut st = SymbolicState::new();
        let alice_paid = st.flag("alice_paid")?;
        let bob_paid = st.flag("bob_paid")?;
        let alice_received = st.flag("alice_received")?;
        let bob_received = st.flag("bob_received")?;
        let secret = st.flag("secret_revealed")?;
        let expired = st.flag("timelock_expired")?;

        let refundable = expired.and(&secret.not());
        let mut tr = vec![
            expired.equals(&Term::bool(self.timelock_expired)),
            alice_paid.and(&secret).implies(&bob_received),
            bob_paid.and(&secret).implies(&alice_received),
            alice_paid.and(&refundable).implies(&alice_received),
            bob_paid.and(&refundable).implies(&bob_received),
        ];
        if self.reveal_requires_both_locks {
            tr.push(secret.implies(&alice_paid.and(&bob_paid)));
        }

        let alice_stranded = Term::all([alice_paid.clone(), bob_paid.not(), alice_received.not()]);
        let bob_stranded = Term::all([bob_paid, alice_paid.not(), bob_received.not()]);
        let (one, zero) = (Term::int(1), Term::int(0));
        let stranded = Term::sum([alice_stranded.ite(&one, &zero), bob_stranded.ite(&one, &zero)]);

        let invariant = Term::all([alice_stranded.not(), bob_stranded.not()]);
        Ok(Encoding::new(st, tr, invariant).with_metric("stranded_parties", stranded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Model, Value};

    fn model(flags: [bool; 6]) -> Model {
        let names = [
            "alice_paid",
            "bob_paid",
            "alice_received",
            "bob_received",
            "secret_revealed",
            "timelock_expired",
        ];
        let mut m = Model::new();
        for (name, v) in names.into_iter().zip(flags) {
            m.insert(name, Value::from(v));
        }
        m
    }

    fn admits(enc: &Encoding, m: &Model) -> bool {
        enc.state
            .bounds()
            .iter()
            .chain(&enc.transitions)
            .all(|t| t.eval_bool(m).unwrap())
    }

    #[test]
    fn lone_payer_before_expiry_is_stranded() {
        let enc = AtomicSwapParams::default().encode().unwrap();
        let m = model([true, false, false, false, false, false]);
        assert!(admits(&enc, &m));
        assert!(!enc.invariant.eval_bool(&m).unwrap());
        assert_eq!(enc.metrics[0].expr.eval_int(&m).unwrap(), num_bigint::BigInt::from(1));
    }

    #[test]
    fn expiry_refunds_unless_the_secret_leaks() {
        let expired = AtomicSwapParams {
            timelock_expired: true,
            reveal_requires_both_locks: false,
        }
        .encode()
        .unwrap();
        // no reveal: the refund rule forces alice_received
        assert!(!admits(&expired, &model([true, false, false, false, false, true])));
        // a reveal without Bob's lock skips the refund
        assert!(admits(&expired, &model([true, false, false, true, true, true])));

        let gated = AtomicSwapParams {
            timelock_expired: true,
            reveal_requires_both_locks: true,
        }
        .encode()
        .unwrap();
        assert_eq!(gated.transitions.len(), expired.transitions.len() + 1);
        assert!(!admits(&gated, &model([true, false, false, true, true, true])));
    }
}
