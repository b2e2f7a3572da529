#![forbid(unsafe_code)]

//! Bounded verification of financial state-transition properties.
//!
//! Every property is encoded as constraints over a finite operation sequence; the
//! checker asserts the *negation* of the invariant and asks the solver for a model.
//! UNSAT proves the invariant for every assignment in the declared domains, SAT
//! yields a concrete [`Counterexample`].

pub mod checker;
pub mod counterexample;
pub mod error;
pub mod outcome;
pub mod scenario;
pub mod solver;
pub mod state;
pub mod term;

pub use checker::PropertyChecker;
pub use counterexample::{Binding, Counterexample, DerivedMetric};
pub use error::VerifyError;
pub use outcome::{CheckConfig, Outcome, Phase, ProofCost, SmtProfile, Status, VerificationReport, DEFAULT_TIMEOUT_MS};
pub use scenario::{
    AtomicSwapParams, BridgeInductionParams, BridgeParams, Encoding, FeePoolParams, InductionObligation,
    MultiHopParams, MultisigParams, OverflowParams, Property, ReplayParams, Scenario, TimelockParams, TokenParams,
    TokenVariant, TransferParams, MAX_OPERATIONS,
};
pub use solver::{Backend, NoZ3Backend, SolverAdapter, SolverSession};

#[cfg(feature = "z3")]
pub use solver::z3_backend::Z3Backend;
