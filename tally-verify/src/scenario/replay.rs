#![forbid(unsafe_code)]

//! Message replay on a mint-on-delivery receiver.
//!
//! Each delivery carries a symbolic message index. The receiver keeps one processed
//! flag per message per step; an unprotected receiver never consults it.

use serde::Serialize;

use super::{require_count, require_positive, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplayParams {
    pub messages: u32,
    pub deliveries: u32,
    /// Mint amount carried by every message.
    pub amount: i128,
    /// Receiver rejects a message whose processed flag is already set.
    pub protected: bool,
}

impl Default for ReplayParams {
    fn default() -> Self {
        ReplayParams {
            messages: 1,
            deliveries: 2,
            amount: 1000,
            protected: true,
        }
    }
}

impl Scenario for ReplayParams {
    fn name(&self) -> &'static str {
        "replay_protection"
    }

    fn claim(&self) -> String {
        format!(
            "no message is applied twice over {} deliveries of {} message(s) ({})",
            self.deliveries,
            self.messages,
            if self.protected { "processed flags checked" } else { "no processed-flag check" }
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_count("messages", self.messages, 1)?;
        require_count("deliveries", self.deliveries, 1)?;
        require_positive("amount", self.amount)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let messages = self.messages as usize;
        let zero = Term::int(0);
        let one = Term::int(1);

        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let mut amounts = Vec::with_capacity(messages);
        let mut processed = Vec::with_capacity(messages);
        for m in 0..messages {
            let amount = st.int(format!("msg{m}_amount"))?;
            tr.push(amount.equals(&Term::int(self.amount)));
            amounts.push(amount);
            let flag = st.flag(format!("processed_msg{m}_step0"))?;
            tr.push(flag.not());
            processed.push(flag);
        }
        let mut minted = st.int("minted_step0")?;
        tr.push(minted.equals(&zero));

        let mut applications: Vec<Vec<Term>> = vec![Vec::new(); messages];
        for d in 0..self.deliveries as usize {
            let msg = st.in_range(format!("delivery{d}_msg"), 0, messages as i64 - 1)?;
            let applied = st.flag(format!("delivery{d}_applied"))?;
            let selects: Vec<Term> = (0..messages).map(|m| msg.equals(&Term::int(m as i64))).collect();

            if self.protected {
                let already = Term::any(selects.iter().zip(&processed).map(|(s, p)| s.and(p)));
                tr.push(applied.equals(&already.not()));
            } else {
                tr.push(applied.clone());
            }

            let mut next = Vec::with_capacity(messages);
            for (m, select) in selects.iter().enumerate() {
                let hit = applied.and(select);
                let flag = st.flag(format!("processed_msg{m}_step{}", d + 1))?;
                tr.push(flag.equals(&processed[m].or(&hit)));
                next.push(flag);
                applications[m].push(hit.ite(&one, &zero));
            }
            processed = next;

            let credit = Term::sum(selects.iter().zip(&amounts).map(|(s, a)| s.ite(a, &zero)));
            let next_minted = st.int(format!("minted_step{}", d + 1))?;
            tr.push(next_minted.equals(&minted.plus(&applied.ite(&credit, &zero))));
            minted = next_minted;
        }

        let mut once = Vec::with_capacity(messages);
        for (m, hits) in applications.into_iter().enumerate() {
            let count = st.int(format!("applied_count_msg{m}"))?;
            tr.push(count.equals(&Term::sum(hits)));
            once.push(count.le(&one));
        }

        let minted_total = st.int("minted_total")?;
        tr.push(minted_total.equals(&minted));
        let legitimate = Term::sum(processed.iter().zip(&amounts).map(|(p, a)| p.ite(a, &zero)));

        Ok(Encoding::new(st, tr, Term::all(once))
            .with_metric("attacker_profit", minted_total.minus(&legitimate)))
    }
}
