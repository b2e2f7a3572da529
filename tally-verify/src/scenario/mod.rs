#![forbid(unsafe_code)]

//! Transition encoders, one per property family.
//!
//! Every family is a variant of the closed [`Property`] enum and implements the
//! same [`Scenario`] contract. An encoder states its invariant positively; negating
//! it is the checker's job.

use serde::Serialize;

use crate::error::VerifyError;
use crate::state::SymbolicState;
use crate::term::Term;

pub mod atomic_swap;
pub mod bridge;
pub mod fee_pool;
pub mod induction;
pub mod multihop;
pub mod multisig;
pub mod overflow;
pub mod replay;
pub mod timelock;
pub mod token;
pub mod transfer;

pub use atomic_swap::AtomicSwapParams;
pub use bridge::BridgeParams;
pub use fee_pool::FeePoolParams;
pub use induction::{BridgeInductionParams, InductionObligation};
pub use multihop::MultiHopParams;
pub use multisig::MultisigParams;
pub use overflow::OverflowParams;
pub use replay::ReplayParams;
pub use timelock::TimelockParams;
pub use token::{TokenParams, TokenVariant};
pub use transfer::TransferParams;

/// Upper bound on any operation count, account count or validator count.
pub const MAX_OPERATIONS: u32 = 64;

/// A named quantity derived from a counterexample after solving.
#[derive(Clone, Debug)]
pub struct Metric {
    pub name: String,
    pub expr: Term,
}

impl Metric {
    pub fn new(name: impl Into<String>, expr: Term) -> Self {
        Metric {
            name: name.into(),
            expr,
        }
    }
}

/// One property, fully encoded: declarations, transition constraints, the desired
/// invariant (not yet negated) and the metrics to report on a violation.
#[derive(Clone, Debug)]
pub struct Encoding {
    pub state: SymbolicState,
    pub transitions: Vec<Term>,
    pub invariant: Term,
    pub metrics: Vec<Metric>,
}

impl Encoding {
    pub fn new(state: SymbolicState, transitions: Vec<Term>, invariant: Term) -> Self {
        Encoding {
            state,
            transitions,
            invariant,
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, expr: Term) -> Self {
        self.metrics.push(Metric::new(name, expr));
        self
    }

    /// The query the solver actually sees: a model of this is a counterexample.
    pub fn negated_invariant(&self) -> Term {
        self.invariant.not()
    }
}

/// Uniform contract of a property family.
pub trait Scenario {
    /// Stable family identifier, e.g. `bridge_conservation`.
    fn name(&self) -> &'static str;

    /// Human-readable statement of the invariant being proved.
    fn claim(&self) -> String;

    /// Parameter preconditions. Runs before any solver interaction.
    fn validate(&self) -> Result<(), VerifyError>;

    fn encode(&self) -> Result<Encoding, VerifyError>;
}

/// The closed set of supported property families.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Property {
    TokenConservation(TokenParams),
    BridgeConservation(BridgeParams),
    OverflowSafety(OverflowParams),
    ReplayProtection(ReplayParams),
    MultiHopBridge(MultiHopParams),
    FeePool(FeePoolParams),
    Timelock(TimelockParams),
    MultisigThreshold(MultisigParams),
    TransferTriple(TransferParams),
    AtomicSwap(AtomicSwapParams),
    BridgeInduction(BridgeInductionParams),
}

impl Property {
    fn scenario(&self) -> &dyn Scenario {
        match self {
            Property::TokenConservation(p) => p,
            Property::BridgeConservation(p) => p,
            Property::OverflowSafety(p) => p,
            Property::ReplayProtection(p) => p,
            Property::MultiHopBridge(p) => p,
            Property::FeePool(p) => p,
            Property::Timelock(p) => p,
            Property::MultisigThreshold(p) => p,
            Property::TransferTriple(p) => p,
            Property::AtomicSwap(p) => p,
            Property::BridgeInduction(p) => p,
        }
    }

    /// Every family with its default parameters, plus each bridge induction obligation.
    pub fn catalog() -> Vec<Property> {
        let mut all = vec![
            Property::TokenConservation(TokenParams::default()),
            Property::BridgeConservation(BridgeParams::default()),
            Property::OverflowSafety(OverflowParams::default()),
            Property::ReplayProtection(ReplayParams::default()),
            Property::MultiHopBridge(MultiHopParams::default()),
            Property::FeePool(FeePoolParams::default()),
            Property::Timelock(TimelockParams::default()),
            Property::MultisigThreshold(MultisigParams::default()),
            Property::TransferTriple(TransferParams::default()),
            Property::AtomicSwap(AtomicSwapParams::default()),
        ];
        all.extend(BridgeInductionParams::all().into_iter().map(Property::BridgeInduction));
        all
    }
}

impl Scenario for Property {
    fn name(&self) -> &'static str {
        self.scenario().name()
    }

    fn claim(&self) -> String {
        self.scenario().claim()
    }

    fn validate(&self) -> Result<(), VerifyError> {
        self.scenario().validate()
    }

    fn encode(&self) -> Result<Encoding, VerifyError> {
        self.scenario().encode()
    }
}

pub(crate) fn require_non_negative(name: &str, value: i128) -> Result<(), VerifyError> {
    if value < 0 {
        return Err(VerifyError::invalid(name, format!("must be non-negative, got {value}")));
    }
    Ok(())
}

pub(crate) fn require_positive(name: &str, value: i128) -> Result<(), VerifyError> {
    if value <= 0 {
        return Err(VerifyError::invalid(name, format!("must be positive, got {value}")));
    }
    Ok(())
}

/// `min ..= MAX_OPERATIONS`.
pub(crate) fn require_count(name: &str, value: u32, min: u32) -> Result<(), VerifyError> {
    if value < min || value > MAX_OPERATIONS {
        return Err(VerifyError::invalid(
            name,
            format!("must be in {min}..={MAX_OPERATIONS}, got {value}"),
        ));
    }
    Ok(())
}
