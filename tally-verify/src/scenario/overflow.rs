#![forbid(unsafe_code)]

//! Unsigned addition overflow at a fixed register width.

use num_bigint::BigInt;
use serde::Serialize;

use super::{Encoding, Scenario};
use crate::error::VerifyError;
use crate::state::{unsigned_max, SymbolicState};
use crate::term::{decimal_opt, Term};

pub const MAX_WIDTH_BITS: u32 = 512;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverflowParams {
    pub width_bits: u32,
    /// Pin operand `a` to a literal; symbolic when `None`.
    #[serde(serialize_with = "decimal_opt")]
    pub operand_a: Option<BigInt>,
    #[serde(serialize_with = "decimal_opt")]
    pub operand_b: Option<BigInt>,
    /// SafeMath-style guard: the addition reverts unless the exact sum fits.
    pub checked: bool,
}

impl Default for OverflowParams {
    fn default() -> Self {
        OverflowParams {
            width_bits: 256,
            operand_a: None,
            operand_b: None,
            checked: false,
        }
    }
}

impl OverflowParams {
    fn require_operand(&self, name: &str, value: &Option<BigInt>) -> Result<(), VerifyError> {
        let Some(v) = value else {
            return Ok(());
        };
        let max = unsigned_max(self.width_bits);
        if v.sign() == num_bigint::Sign::Minus || *v > max {
            return Err(VerifyError::invalid(
                name,
                format!("{v} does not fit in u{} (0..={max})", self.width_bits),
            ));
        }
        Ok(())
    }
}

impl Scenario for OverflowParams {
    fn name(&self) -> &'static str {
        "overflow_safety"
    }

    fn claim(&self) -> String {
        let show = |o: &Option<BigInt>| o.as_ref().map_or("*".to_string(), BigInt::to_string);
        format!(
            "{} + {} stays within u{}{}",
            show(&self.operand_a),
            show(&self.operand_b),
            self.width_bits,
            if self.checked { " (checked add)" } else { "" }
        )
    }

    fn validate(&self) -> Result<(), VerifyError> {
        if self.width_bits == 0 || self.width_bits > MAX_WIDTH_BITS {
            return Err(VerifyError::invalid(
                "width_bits",
                format!("must be in 1..={MAX_WIDTH_BITS}, got {}", self.width_bits),
            ));
        }
        self.require_operand("operand_a", &self.operand_a)?;
        self.require_operand("operand_b", &self.operand_b)?;
        Ok(())
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        let mut st = SymbolicState::new();
        let mut tr = Vec::new();

        let a = st.bounded("operand_a", self.width_bits)?;
        let b = st.bounded("operand_b", self.width_bits)?;
        for (operand, pinned) in [(&a, &self.operand_a), (&b, &self.operand_b)] {
            if let Some(v) = pinned {
                tr.push(operand.term().equals(&Term::Int(v.clone())));
            }
        }

        let sum = a.wrapping_add(&b)?;
        let exact = st.int("sum_exact")?;
        let wrapped = st.int("sum_wrapped")?;
        tr.push(exact.equals(&sum.exact));
        tr.push(wrapped.equals(&sum.wrapped));

        let max = Term::Int(a.max());
        if self.checked {
            tr.push(exact.le(&max));
        }

        Ok(Encoding::new(st, tr, exact.le(&max))
            .with_metric("wrapped_sum", wrapped.clone())
            .with_metric("lost_value", exact.minus(&wrapped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Model, Value};

    #[test]
    fn width_and_operands_are_validated() {
        assert!(OverflowParams::default().validate().is_ok());
        for width_bits in [0, MAX_WIDTH_BITS + 1] {
            let p = OverflowParams {
                width_bits,
                ..OverflowParams::default()
            };
            assert!(p.validate().is_err(), "width {width_bits}");
        }
        let p = OverflowParams {
            width_bits: 8,
            operand_a: Some(BigInt::from(256)),
            ..OverflowParams::default()
        };
        assert!(matches!(p.validate(), Err(VerifyError::InvalidParameter { ref name, .. }) if name == "operand_a"));
        let p = OverflowParams {
            width_bits: 8,
            operand_b: Some(BigInt::from(-1)),
            ..OverflowParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn metrics_report_the_wrapped_value_and_the_loss() {
        let enc = OverflowParams {
            width_bits: 8,
            ..OverflowParams::default()
        }
        .encode()
        .unwrap();

        let mut m = Model::new();
        m.insert("operand_a", Value::from(200i64));
        m.insert("operand_b", Value::from(100i64));
        m.insert("sum_exact", Value::from(300i64));
        m.insert("sum_wrapped", Value::from(44i64));
        for t in enc.state.bounds().iter().chain(&enc.transitions) {
            assert!(t.eval_bool(&m).unwrap(), "{t}");
        }
        assert!(!enc.invariant.eval_bool(&m).unwrap());
        assert_eq!(enc.metrics[0].expr.eval_int(&m).unwrap(), BigInt::from(44));
        assert_eq!(enc.metrics[1].expr.eval_int(&m).unwrap(), BigInt::from(256));
    }

    #[test]
    fn checked_add_carries_the_guard_as_a_transition() {
        let unchecked = OverflowParams::default().encode().unwrap();
        let checked = OverflowParams {
            checked: true,
            ..OverflowParams::default()
        }
        .encode()
        .unwrap();
        assert_eq!(checked.transitions.len(), unchecked.transitions.len() + 1);
        assert_eq!(checked.transitions.last(), Some(&checked.invariant));
    }
}
