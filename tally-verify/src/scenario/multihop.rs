#![forbid(unsafe_code)]

//! Value routed over a chain of bridges: lock on chain 0, mint-then-burn on every
//! intermediate chain, final mint on the destination. Each hop's relayer may keep up
//! to `relay_skim` of what it forwards.

use serde::Serialize;

use super::{require_count, require_non_negative, require_positive, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MultiHopParams {
    pub amount: i128,
    pub hops: u32,
    /// Most a single relayer can withhold per hop.
    pub relay_skim: i128,
}

impl Default for MultiHopParams {
    fn default() -> Self {
        MultiHopParams {
            amount: 1000,
            hops: 2,
            relay_skim: 0,
        }
    }
}

impl Scenario for MultiHopParams {
    fn name(&self) -> &'static str {
        "multi_hop_bridge"
    }

    fn claim(&self) -> String {
        format!(
            "{} locked on the source arrives intact after {} hop(s), intermediate chains fully burned",
            self.amount, self.hops
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_positive("amount", self.amount)?;
        require_count("hops", self.hops, 1)?;
        require_non_negative("relay_skim", self.relay_skim)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let hops = self.hops as usize;
        let zero = Term::int(0);
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let locked = st.non_negative("locked_chain0")?;
        tr.push(locked.equals(&Term::int(self.amount)));

        let mut forwarded = locked.clone();
        let mut residuals = Vec::new();
        let mut destination = zero.clone();
        for h in 1..=hops {
            let skim = st.in_range(format!("hop{h}_skim"), 0, self.relay_skim)?;
            tr.push(skim.le(&forwarded));
            let minted = st.non_negative(format!("minted_chain{h}"))?;
            tr.push(minted.equals(&forwarded.minus(&skim)));

            if h == hops {
                destination = minted;
            } else {
                let burned = st.non_negative(format!("burned_chain{h}"))?;
                tr.push(burned.equals(&minted));
                residuals.push(minted.minus(&burned).equals(&zero));
                forwarded = burned;
            }
        }

        let minted_destination = st.int("minted_destination")?;
        tr.push(minted_destination.equals(&destination));

        let mut invariant = vec![locked.equals(&minted_destination)];
        invariant.extend(residuals);
        Ok(Encoding::new(st, tr, Term::all(invariant))
            .with_metric("leaked", locked.minus(&minted_destination)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(MultiHopParams::default().validate().is_ok());
        assert!(MultiHopParams { hops: 0, ..MultiHopParams::default() }.validate().is_err());
        assert!(MultiHopParams { relay_skim: -1, ..MultiHopParams::default() }.validate().is_err());
    }

    #[test]
    fn intermediate_chains_burn_and_destination_mints() {
        let enc = MultiHopParams {
            hops: 3,
            ..MultiHopParams::default()
        }
        .encode()
        .unwrap();
        let burned = enc.state.vars().filter(|v| v.name().starts_with("burned_chain")).count();
        let minted = enc.state.vars().filter(|v| v.name().starts_with("minted_chain")).count();
        assert_eq!((burned, minted), (2, 3));
        assert!(enc.state.lookup("burned_chain3").is_err());
    }

    #[test]
    fn single_hop_has_no_intermediate_chain() {
        let enc = MultiHopParams {
            hops: 1,
            ..MultiHopParams::default()
        }
        .encode()
        .unwrap();
        assert!(matches!(&enc.invariant, Term::And(parts) if parts.len() == 1));
    }
}
