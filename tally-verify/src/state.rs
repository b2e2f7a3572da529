#![forbid(unsafe_code)]

//! Symbolic state model: the closed, ordered set of variables one scenario declares.

use std::collections::HashSet;

use num_bigint::BigInt;
use num_traits::One;

use crate::error::VerifyError;
use crate::term::{Term, Var};

const ROLES: [&str; 8] = ["alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi"];

/// Human-readable account role for index `i`.
pub fn account_name(i: usize) -> String {
    match ROLES.get(i) {
        Some(name) => (*name).to_string(),
        None => format!("account{i}"),
    }
}

/// Deterministic per-step name, e.g. `balance_alice_step1`.
pub fn role_step(role: &str, subject: &str, step: usize) -> String {
    format!("{role}_{subject}_step{step}")
}

/// `2^width_bits - 1`.
pub fn unsigned_max(width_bits: u32) -> BigInt {
    (BigInt::one() << width_bits as usize) - BigInt::one()
}

/// Declared domain of an integer variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub lo: Option<BigInt>,
    pub hi: Option<BigInt>,
    pub width_bits: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub var: Var,
    pub range: Range,
}

/// Handle to a variable declared with an explicit unsigned bit-width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounded {
    term: Term,
    width_bits: u32,
}

/// `a + b` both as a mathematical integer and as the value an N-bit register would hold.
#[derive(Clone, Debug)]
pub struct WrappingSum {
    pub exact: Term,
    pub wrapped: Term,
    pub overflows: Term,
}

impl Bounded {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn width_bits(&self) -> u32 {
        self.width_bits
    }

    pub fn max(&self) -> BigInt {
        unsigned_max(self.width_bits)
    }

    /// Modular addition at the declared width. Both operands must share it.
    pub fn wrapping_add(&self, rhs: &Bounded) -> Result<WrappingSum, VerifyError> {
        if self.width_bits != rhs.width_bits {
            return Err(VerifyError::encoding(format!(
                "bit-width mismatch: `{}` is u{} but `{}` is u{}",
                self.term, self.width_bits, rhs.term, rhs.width_bits
            )));
        }
        let exact = self.term.plus(&rhs.term);
        let overflows = exact.gt(&Term::Int(self.max()));
        let modulus = Term::Int(self.max() + BigInt::one());
        // Operands are at most 2^w - 1, so one subtraction of 2^w always lands in range.
        let wrapped = overflows.ite(&exact.minus(&modulus), &exact);
        Ok(WrappingSum {
            exact,
            wrapped,
            overflows,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct SymbolicState {
    decls: Vec<Declaration>,
    names: HashSet<String>,
    bounds: Vec<Term>,
}

impl SymbolicState {
    pub fn new() -> Self {
        SymbolicState::default()
    }

    fn declare(&mut self, var: Var, range: Range) -> Result<Term, VerifyError> {
        if !self.names.insert(var.name().to_string()) {
            return Err(VerifyError::encoding(format!(
                "variable `{}` declared twice",
                var.name()
            )));
        }
        let term = var.term();
        if let Some(lo) = &range.lo {
            self.bounds.push(term.ge(&Term::Int(lo.clone())));
        }
        if let Some(hi) = &range.hi {
            self.bounds.push(term.le(&Term::Int(hi.clone())));
        }
        self.decls.push(Declaration { var, range });
        Ok(term)
    }

    /// Unbounded integer.
    pub fn int(&mut self, name: impl Into<String>) -> Result<Term, VerifyError> {
        self.declare(Var::int(name), Range::default())
    }

    pub fn non_negative(&mut self, name: impl Into<String>) -> Result<Term, VerifyError> {
        self.declare(
            Var::int(name),
            Range {
                lo: Some(BigInt::from(0)),
                ..Range::default()
            },
        )
    }

    /// Integer in the closed interval `[lo, hi]`.
    pub fn in_range(
        &mut self,
        name: impl Into<String>,
        lo: impl Into<BigInt>,
        hi: impl Into<BigInt>,
    ) -> Result<Term, VerifyError> {
        let name = name.into();
        let (lo, hi) = (lo.into(), hi.into());
        if lo > hi {
            return Err(VerifyError::encoding(format!(
                "empty range [{lo}, {hi}] for `{name}`"
            )));
        }
        self.declare(
            Var::int(name),
            Range {
                lo: Some(lo),
                hi: Some(hi),
                width_bits: None,
            },
        )
    }

    /// Unsigned integer of `width_bits` bits: `0 ..= 2^width_bits - 1`.
    pub fn bounded(&mut self, name: impl Into<String>, width_bits: u32) -> Result<Bounded, VerifyError> {
        if width_bits == 0 {
            return Err(VerifyError::encoding("bit-width must be positive"));
        }
        let term = self.declare(
            Var::int(name),
            Range {
                lo: Some(BigInt::from(0)),
                hi: Some(unsigned_max(width_bits)),
                width_bits: Some(width_bits),
            },
        )?;
        Ok(Bounded { term, width_bits })
    }

    pub fn flag(&mut self, name: impl Into<String>) -> Result<Term, VerifyError> {
        self.declare(Var::flag(name), Range::default())
    }

    pub fn lookup(&self, name: &str) -> Result<Term, VerifyError> {
        self.decls
            .iter()
            .find(|d| d.var.name() == name)
            .map(|d| d.var.term())
            .ok_or_else(|| VerifyError::encoding(format!("variable `{name}` referenced before declaration")))
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.decls
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.decls.iter().map(|d| &d.var)
    }

    /// Range constraints, in declaration order.
    pub fn bounds(&self) -> &[Term] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Model, Value};

    #[test]
    fn names_are_deterministic() {
        assert_eq!(account_name(0), "alice");
        assert_eq!(account_name(7), "heidi");
        assert_eq!(account_name(8), "account8");
        assert_eq!(role_step("balance", "alice", 1), "balance_alice_step1");
    }

    #[test]
    fn declaration_order_is_preserved_and_duplicates_rejected() {
        let mut st = SymbolicState::new();
        st.int("b").unwrap();
        st.flag("a").unwrap();
        st.non_negative("c").unwrap();
        let names: Vec<&str> = st.vars().map(|v| v.name()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert!(matches!(st.int("a"), Err(VerifyError::Encoding { .. })));
        assert!(st.lookup("c").is_ok());
        assert!(st.lookup("missing").is_err());
    }

    #[test]
    fn bounded_declares_its_range_as_constraints() {
        let mut st = SymbolicState::new();
        let x = st.bounded("x", 8).unwrap();
        assert_eq!(x.max(), BigInt::from(255));
        assert_eq!(st.bounds().len(), 2);
        assert_eq!(st.declarations()[0].range.width_bits, Some(8));

        let mut m = Model::new();
        m.insert("x", Value::from(256i64));
        let all = Term::all(st.bounds().to_vec());
        assert!(!all.eval_bool(&m).unwrap());
        m.insert("x", Value::from(255i64));
        assert!(all.eval_bool(&m).unwrap());
    }

    #[test]
    fn in_range_rejects_empty_intervals() {
        let mut st = SymbolicState::new();
        assert!(st.in_range("i", 3, 2).is_err());
        assert!(st.in_range("i", 0, 0).is_ok());
    }

    #[test]
    fn wrapping_add_wraps_at_declared_width() {
        let mut st = SymbolicState::new();
        let a = st.bounded("a", 8).unwrap();
        let b = st.bounded("b", 8).unwrap();
        let sum = a.wrapping_add(&b).unwrap();

        let mut m = Model::new();
        m.insert("a", Value::from(255i64));
        m.insert("b", Value::from(1i64));
        assert_eq!(sum.exact.eval_int(&m).unwrap(), BigInt::from(256));
        assert_eq!(sum.wrapped.eval_int(&m).unwrap(), BigInt::from(0));
        assert!(sum.overflows.eval_bool(&m).unwrap());

        m.insert("a", Value::from(200i64));
        m.insert("b", Value::from(55i64));
        assert_eq!(sum.wrapped.eval_int(&m).unwrap(), BigInt::from(255));
        assert!(!sum.overflows.eval_bool(&m).unwrap());
    }

    #[test]
    fn wrapping_add_rejects_width_mismatch() {
        let mut st = SymbolicState::new();
        let a = st.bounded("a", 8).unwrap();
        let b = st.bounded("b", 16).unwrap();
        assert!(matches!(a.wrapping_add(&b), Err(VerifyError::Encoding { .. })));
    }

    #[test]
    fn u256_max_matches_known_value() {
        assert_eq!(
            unsigned_max(256).to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
    }
}
