#![forbid(unsafe_code)]

//! ERC-20 style token conservation over a bounded transfer sequence.
//!
//! Sender, receiver and amount of every transfer are symbolic, so an UNSAT answer
//! covers every transfer pattern of the given length, not one concrete trace.

use serde::Serialize;

use super::{require_count, require_non_negative, Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::{account_name, role_step, SymbolicState};
use crate::term::Term;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenVariant {
    /// Every step debits the sender and credits the receiver.
    #[default]
    Faithful,
    /// A step may credit the receiver without debiting anyone (unguarded `mint`).
    UnauthorizedMint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenParams {
    pub initial_supply: i128,
    pub accounts: u32,
    pub transfers: u32,
    pub variant: TokenVariant,
}

impl Default for TokenParams {
    fn default() -> Self {
        TokenParams {
            initial_supply: 1000,
            accounts: 3,
            transfers: 3,
            variant: TokenVariant::Faithful,
        }
    }
}

impl Scenario for TokenParams {
    fn name(&self) -> &'static str {
        "token_conservation"
    }

    fn claim(&self) -> String {
        format!(
            "sum of {} balance(s) is unchanged by {} transfer(s) of a {}-token supply",
            self.accounts, self.transfers, self.initial_supply
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        require_non_negative("initial_supply", self.initial_supply)?;
        require_count("accounts", self.accounts, 1)?;
        require_count("transfers", self.transfers, 0)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let accounts = self.accounts as usize;
        let names: Vec<String> = (0..accounts).map(account_name).collect();
        let zero = Term::int(0);

        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let supply = st.int("total_supply")?;
        tr.push(supply.equals(&Term::int(self.initial_supply)));

        let before = names
            .iter()
            .map(|a| st.non_negative(role_step("balance", a, 0)))
            .collect::<Result<Vec<_>, _>>()?;
        tr.push(Term::sum(before.clone()).equals(&supply));

        let mut balances = before.clone();
        for k in 0..self.transfers as usize {
            let amount = st.int(format!("transfer{k}_amount"))?;
            let from = st.in_range(format!("transfer{k}_from"), 0, accounts as i64 - 1)?;
            let to = st.in_range(format!("transfer{k}_to"), 0, accounts as i64 - 1)?;
            let is_mint = match self.variant {
                TokenVariant::Faithful => None,
                TokenVariant::UnauthorizedMint => Some(st.flag(format!("transfer{k}_is_mint"))?),
            };
            tr.push(amount.gt(&zero));

            let mut next = Vec::with_capacity(accounts);
            for (i, name) in names.iter().enumerate() {
                let idx = Term::int(i as i64);
                let debited = match &is_mint {
                    None => from.equals(&idx),
                    Some(mint) => from.equals(&idx).and(&mint.not()),
                };
                let credited = to.equals(&idx);

                // sender covers the amount
                tr.push(debited.implies(&balances[i].ge(&amount)));

                let after = st.int(role_step("balance", name, k + 1))?;
                let outgoing = debited.ite(&amount, &zero);
                let incoming = credited.ite(&amount, &zero);
                tr.push(after.equals(&balances[i].minus(&outgoing).plus(&incoming)));
                next.push(after);
            }
            balances = next;
        }

        let total_before = Term::sum(before);
        let total_after = Term::sum(balances);
        let invariant = total_after.equals(&total_before);
        Ok(Encoding::new(st, tr, invariant)
            .with_metric("attacker_profit", total_after.minus(&total_before)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_supply_and_empty_ledgers() {
        let bad = TokenParams {
            initial_supply: -1,
            ..TokenParams::default()
        };
        assert!(matches!(bad.validate(), Err(VerifyError::InvalidParameter { ref name, .. }) if name == "initial_supply"));

        let bad = TokenParams {
            accounts: 0,
            ..TokenParams::default()
        };
        assert!(bad.validate().is_err());

        let ok = TokenParams {
            transfers: 0,
            ..TokenParams::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn declares_balances_per_step_in_order() {
        let enc = TokenParams {
            initial_supply: 10,
            accounts: 2,
            transfers: 1,
            variant: TokenVariant::Faithful,
        }
        .encode()
        .unwrap();
        let names: Vec<&str> = enc.state.vars().map(|v| v.name()).collect();
        assert_eq!(
            names,
            [
                "total_supply",
                "balance_alice_step0",
                "balance_bob_step0",
                "transfer0_amount",
                "transfer0_from",
                "transfer0_to",
                "balance_alice_step1",
                "balance_bob_step1",
            ]
        );
    }

    #[test]
    fn mint_variant_adds_a_flag_per_step() {
        let enc = TokenParams {
            variant: TokenVariant::UnauthorizedMint,
            ..TokenParams::default()
        }
        .encode()
        .unwrap();
        assert_eq!(enc.state.vars().filter(|v| v.name().ends_with("_is_mint")).count(), 3);
    }
}
