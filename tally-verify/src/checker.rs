#![forbid(unsafe_code)]

//! Property checker: validate, encode, negate, solve, classify, extract.
//!
//! Each call opens exactly one [`SolverSession`] and drops it before returning,
//! whatever the outcome. Nothing is cached between calls.

use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::counterexample::{Binding, Counterexample, DerivedMetric};
use crate::error::VerifyError;
use crate::outcome::{CheckConfig, Outcome, Phase, ProofCost, VerificationReport};
use crate::scenario::{
    AtomicSwapParams, BridgeInductionParams, BridgeParams, Encoding, FeePoolParams, MultiHopParams, MultisigParams,
    OverflowParams, Property, ReplayParams, Scenario, TimelockParams, TokenParams, TransferParams,
};
use crate::solver::{Backend, CheckResult, SolverAdapter, SolverSession, UnknownReason};
use crate::term::Model;

#[derive(Debug, Default)]
struct Progress {
    phase: Option<Phase>,
    assertions: usize,
    variables: usize,
}

impl Progress {
    fn reach(&mut self, phase: Phase) {
        self.phase = Some(phase);
    }
}

pub struct PropertyChecker<B: Backend> {
    adapter: SolverAdapter<B>,
}

impl<B: Backend> PropertyChecker<B> {
    pub fn new(backend: B) -> Self {
        PropertyChecker {
            adapter: SolverAdapter::new(backend),
        }
    }

    pub fn adapter(&self) -> &SolverAdapter<B> {
        &self.adapter
    }

    /// Sessions currently open. Zero between calls.
    pub fn open_session_count(&self) -> usize {
        self.adapter.open_session_count()
    }

    /// Check one property. Parameter errors are reported before any solver work.
    pub fn verify(&self, property: &Property, config: &CheckConfig) -> VerificationReport {
        let span = info_span!("verify", property = property.name());
        let _enter = span.enter();
        let started = Instant::now();

        if let Err(e) = property.validate() {
            let report = finish(property.name(), property.claim(), Outcome::Error(e), Progress::default(), started);
            log_report(&report);
            return report;
        }
        self.run(property.name(), property.claim(), || property.encode(), config, started)
    }

    /// Generic primitive: assert `encoding`'s transitions and the negation of its
    /// invariant, then classify.
    pub fn assert_and_check(
        &self,
        name: &str,
        claim: impl Into<String>,
        encoding: Encoding,
        config: &CheckConfig,
    ) -> VerificationReport {
        let span = info_span!("verify", property = name);
        let _enter = span.enter();
        self.run(name, claim.into(), || Ok(encoding), config, Instant::now())
    }

    pub fn verify_token_conservation(&self, params: &TokenParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::TokenConservation(params.clone()), config)
    }

    pub fn verify_bridge_conservation(&self, params: &BridgeParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::BridgeConservation(params.clone()), config)
    }

    pub fn verify_overflow_safety(&self, params: &OverflowParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::OverflowSafety(params.clone()), config)
    }

    pub fn verify_replay_protection(&self, params: &ReplayParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::ReplayProtection(params.clone()), config)
    }

    pub fn verify_multi_hop_bridge(&self, params: &MultiHopParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::MultiHopBridge(params.clone()), config)
    }

    pub fn verify_fee_pool(&self, params: &FeePoolParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::FeePool(params.clone()), config)
    }

    pub fn verify_timelock(&self, params: &TimelockParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::Timelock(params.clone()), config)
    }

    pub fn verify_multisig_threshold(&self, params: &MultisigParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::MultisigThreshold(params.clone()), config)
    }

    pub fn verify_transfer_triple(&self, params: &TransferParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::TransferTriple(params.clone()), config)
    }

    pub fn verify_atomic_swap(&self, params: &AtomicSwapParams, config: &CheckConfig) -> VerificationReport {
        self.verify(&Property::AtomicSwap(params.clone()), config)
    }

    /// One report per proof obligation, in base, lock, paired order. The invariant
    /// is inductive only if the base and paired obligations are both verified.
    pub fn verify_bridge_induction(&self, config: &CheckConfig) -> Vec<VerificationReport> {
        BridgeInductionParams::all()
            .into_iter()
            .map(|p| self.verify(&Property::BridgeInduction(p), config))
            .collect()
    }

    fn run(
        &self,
        name: &str,
        claim: String,
        encode: impl FnOnce() -> Result<Encoding, VerifyError>,
        config: &CheckConfig,
        started: Instant,
    ) -> VerificationReport {
        let mut progress = Progress::default();
        progress.reach(Phase::Configured);
        let outcome = self
            .attempt(encode, config, &mut progress)
            .unwrap_or_else(Outcome::Error);
        let report = finish(name, claim, outcome, progress, started);
        log_report(&report);
        report
    }

    fn attempt(
        &self,
        encode: impl FnOnce() -> Result<Encoding, VerifyError>,
        config: &CheckConfig,
        progress: &mut Progress,
    ) -> Result<Outcome, VerifyError> {
        // Released on every return below, `?` included.
        let mut session = self.adapter.open_session(config.timeout_ms)?;
        progress.reach(Phase::Encoding);

        let encoding = encode()?;
        for var in encoding.state.vars() {
            session.declare(var)?;
        }
        progress.variables = encoding.state.len();
        for constraint in encoding.state.bounds().iter().chain(&encoding.transitions) {
            session.assert(constraint)?;
        }
        session.assert(&encoding.negated_invariant())?;
        progress.assertions = session.constraints().len();
        debug!(
            variables = progress.variables,
            assertions = progress.assertions,
            timeout_ms = config.timeout_ms,
            "encoded negated invariant"
        );

        progress.reach(Phase::Solving);
        let outcome = match session.check()? {
            CheckResult::Unsat => Outcome::Verified,
            CheckResult::Unknown(UnknownReason::Timeout) => Outcome::Timeout {
                limit_ms: config.timeout_ms,
            },
            CheckResult::Unknown(UnknownReason::Incomplete(reason)) => Outcome::Unknown { reason },
            CheckResult::Sat => Outcome::Violated(self.extract(&session, &encoding)?),
        };
        session.close();
        Ok(outcome)
    }

    /// Copy the model out, audit it against everything asserted, derive metrics.
    fn extract(&self, session: &SolverSession<'_, B>, encoding: &Encoding) -> Result<Counterexample, VerifyError> {
        let mut model = Model::new();
        let mut bindings = Vec::with_capacity(encoding.state.len());
        for var in encoding.state.vars() {
            let value = session.model_value(var)?;
            model.insert(var.name(), value.clone());
            bindings.push(Binding {
                role: var.name().to_string(),
                value,
            });
        }
        if bindings.is_empty() {
            return Err(VerifyError::encoding("violation witnessed without any declared variable"));
        }

        for constraint in session.constraints() {
            if !constraint.eval_bool(&model)? {
                return Err(VerifyError::Backend {
                    backend: self.adapter.backend().name().to_string(),
                    message: format!("model does not satisfy asserted constraint `{constraint}`"),
                });
            }
        }

        let metrics = encoding
            .metrics
            .iter()
            .map(|m| {
                Ok(DerivedMetric {
                    name: m.name.clone(),
                    value: m.expr.eval_int(&model)?,
                })
            })
            .collect::<Result<Vec<_>, VerifyError>>()?;

        Ok(Counterexample::new(bindings, metrics))
    }
}

fn finish(name: &str, claim: String, outcome: Outcome, progress: Progress, started: Instant) -> VerificationReport {
    VerificationReport {
        property: name.to_string(),
        claim,
        outcome,
        phase: progress.phase.unwrap_or(Phase::Configured),
        cost: ProofCost {
            time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            assertions: progress.assertions,
            variables: progress.variables,
        },
    }
}

fn log_report(report: &VerificationReport) {
    let status = report.status();
    match &report.outcome {
        Outcome::Verified | Outcome::Violated(_) => {
            info!(%status, time_ms = report.cost.time_ms, "property checked");
        }
        Outcome::Timeout { limit_ms } => {
            warn!(%status, limit_ms, "no decision within budget");
        }
        Outcome::Unknown { reason } => {
            warn!(%status, reason = reason.as_str(), "solver gave up");
        }
        Outcome::Error(e) => {
            warn!(%status, phase = ?report.phase, error = %e, "verification failed");
        }
    }
}
