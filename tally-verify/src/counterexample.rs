#![forbid(unsafe_code)]

// Counterexample: solver model -> ordered (role, value) listing
//
// Values are copied out of the session in declaration order, so the same property
// always lists its roles in the same order. Metrics are computed locally from the
// copied values, never by the backend.

use std::fmt;

use num_bigint::BigInt;
use serde::Serialize;

use crate::term::{decimal, Value};

/// One symbolic variable and its concrete value in the witnessing model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub role: String,
    pub value: Value,
}

/// A quantity derived from the bindings, e.g. `attacker_profit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DerivedMetric {
    pub name: String,
    #[serde(serialize_with = "decimal")]
    pub value: BigInt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Counterexample {
    bindings: Vec<Binding>,
    metrics: Vec<DerivedMetric>,
}

impl Counterexample {
    pub fn new(bindings: Vec<Binding>, metrics: Vec<DerivedMetric>) -> Self {
        Counterexample { bindings, metrics }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn metrics(&self) -> &[DerivedMetric] {
        &self.metrics
    }

    pub fn get(&self, role: &str) -> Option<&Value> {
        self.bindings.iter().find(|b| b.role == role).map(|b| &b.value)
    }

    /// Integer value of `role`; `None` for flags and unknown roles.
    pub fn int(&self, role: &str) -> Option<&BigInt> {
        self.get(role).and_then(Value::as_int)
    }

    pub fn metric(&self, name: &str) -> Option<&BigInt> {
        self.metrics.iter().find(|m| m.name == name).map(|m| &m.value)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Stable text form: one `role = value` line per binding, then the metrics.
    pub fn render(&self) -> String {
        let width = self
            .bindings
            .iter()
            .map(|b| b.role.len())
            .chain(self.metrics.iter().map(|m| m.name.len()))
            .max()
            .unwrap_or(0);

        let mut out = String::from("  counterexample:\n");
        for b in &self.bindings {
            out.push_str(&format!("    {:<width$} = {}\n", b.role, b.value));
        }
        if !self.metrics.is_empty() {
            out.push_str("  derived:\n");
            for m in &self.metrics {
                out.push_str(&format!("    {:<width$} = {}\n", m.name, m.value));
            }
        }
        out
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
