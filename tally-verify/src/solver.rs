#![forbid(unsafe_code)]

//! Constraint backend adapter.
//!
//! A [`SolverSession`] accumulates declarations and constraints in backend-neutral
//! form; the engine itself is only touched inside [`Backend::solve`], which copies
//! the model out before returning. Sessions are counted by their [`SolverAdapter`]
//! and released on drop, so every exit path closes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use num_bigint::BigInt;
use serde::Serialize;
use tracing::debug;

use crate::error::VerifyError;
use crate::term::{Model, Sort, Term, Value, Var};

/// Solver-scoped parameters set on every query besides `timeout`. Keys must be
/// solver-level names: a module prefix such as `smt.` is rejected by the engine.
#[cfg_attr(not(feature = "z3"), allow(dead_code))]
pub(crate) const FIXED_SOLVER_PARAMS: &[(&str, u32)] = &[("random_seed", 0)];

/// Everything a backend needs for one satisfiability query.
#[derive(Clone, Copy, Debug)]
pub struct Query<'a> {
    pub vars: &'a [Var],
    pub constraints: &'a [Term],
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnknownReason {
    /// The deadline passed before the engine decided.
    Timeout,
    /// The engine gave up for any other reason (incompleteness, resource limits).
    Incomplete(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveResult {
    /// Satisfiable; carries a value for every declared variable.
    Sat(Model),
    Unsat,
    Unknown(UnknownReason),
}

impl SolveResult {
    pub fn label(&self) -> &'static str {
        match self {
            SolveResult::Sat(_) => "sat",
            SolveResult::Unsat => "unsat",
            SolveResult::Unknown(UnknownReason::Timeout) => "timeout",
            SolveResult::Unknown(UnknownReason::Incomplete(_)) => "unknown",
        }
    }
}

pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails with [`VerifyError::BackendUnavailable`] when the engine cannot start.
    fn probe(&self) -> Result<(), VerifyError>;

    fn solve(&self, query: &Query<'_>) -> Result<SolveResult, VerifyError>;
}

/// Fallback backend when compiled without `--features tally-verify/z3`.
///
/// This keeps the workspace buildable on machines without Z3.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoZ3Backend;

impl NoZ3Backend {
    fn unavailable() -> VerifyError {
        VerifyError::BackendUnavailable {
            backend: "none".to_string(),
            message: "Z3 backend is not enabled. Rebuild with `--features tally-verify/z3`.".to_string(),
        }
    }
}

impl Backend for NoZ3Backend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn probe(&self) -> Result<(), VerifyError> {
        Err(Self::unavailable())
    }

    fn solve(&self, _query: &Query<'_>) -> Result<SolveResult, VerifyError> {
        Err(Self::unavailable())
    }
}

/// Owns a backend and tracks how many sessions are currently open on it.
#[derive(Debug)]
pub struct SolverAdapter<B> {
    backend: B,
    open: AtomicUsize,
}

impl<B: Backend> SolverAdapter<B> {
    pub fn new(backend: B) -> Self {
        SolverAdapter {
            backend,
            open: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn open_session(&self, timeout_ms: u64) -> Result<SolverSession<'_, B>, VerifyError> {
        self.backend.probe()?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(SolverSession {
            adapter: self,
            timeout_ms,
            vars: Vec::new(),
            sorts: HashMap::new(),
            constraints: Vec::new(),
            model: None,
        })
    }

    /// Number of sessions opened on this adapter and not yet closed.
    pub fn open_session_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// Verdict of [`SolverSession::check`]; the model stays inside the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckResult {
    Sat,
    Unsat,
    Unknown(UnknownReason),
}

/// One scoped solver instance. Not reusable across properties.
pub struct SolverSession<'a, B: Backend> {
    adapter: &'a SolverAdapter<B>,
    timeout_ms: u64,
    vars: Vec<Var>,
    sorts: HashMap<String, Sort>,
    constraints: Vec<Term>,
    model: Option<Model>,
}

impl<B: Backend> SolverSession<'_, B> {
    pub fn constraints(&self) -> &[Term] {
        &self.constraints
    }

    pub fn declare(&mut self, var: &Var) -> Result<(), VerifyError> {
        if self.sorts.contains_key(var.name()) {
            return Err(VerifyError::encoding(format!(
                "variable `{}` declared twice",
                var.name()
            )));
        }
        self.sorts.insert(var.name().to_string(), var.sort());
        self.vars.push(var.clone());
        Ok(())
    }

    /// Add a constraint. Invalidates any model from a previous `check`.
    pub fn assert(&mut self, constraint: &Term) -> Result<(), VerifyError> {
        let sort = constraint.sort()?;
        if sort != Sort::Bool {
            return Err(VerifyError::encoding(format!(
                "constraint `{constraint}` has sort {sort}, expected Bool"
            )));
        }
        for v in constraint.vars() {
            match self.sorts.get(v.name()) {
                None => {
                    return Err(VerifyError::encoding(format!(
                        "variable `{}` referenced before declaration",
                        v.name()
                    )));
                }
                Some(s) if *s != v.sort() => {
                    return Err(VerifyError::encoding(format!(
                        "variable `{}` used as {} but declared {}",
                        v.name(),
                        v.sort(),
                        s
                    )));
                }
                Some(_) => {}
            }
        }
        self.model = None;
        self.constraints.push(constraint.clone());
        Ok(())
    }

    /// Bounded-time satisfiability check.
    ///
    /// A zero budget is already expired and never reaches the engine.
    pub fn check(&mut self) -> Result<CheckResult, VerifyError> {
        self.model = None;
        if self.timeout_ms == 0 {
            debug!(backend = self.adapter.backend.name(), "zero timeout budget, skipping solve");
            return Ok(CheckResult::Unknown(UnknownReason::Timeout));
        }

        let query = Query {
            vars: &self.vars,
            constraints: &self.constraints,
            timeout_ms: self.timeout_ms,
        };
        let result = self.adapter.backend.solve(&query)?;
        debug!(
            backend = self.adapter.backend.name(),
            vars = self.vars.len(),
            constraints = self.constraints.len(),
            result = result.label(),
            "solve finished"
        );

        Ok(match result {
            SolveResult::Sat(model) => {
                self.model = Some(model);
                CheckResult::Sat
            }
            SolveResult::Unsat => CheckResult::Unsat,
            SolveResult::Unknown(reason) => CheckResult::Unknown(reason),
        })
    }

    /// Value of `var` in the model of the last SAT `check`.
    pub fn model_value(&self, var: &Var) -> Result<Value, VerifyError> {
        match self.sorts.get(var.name()) {
            None => {
                return Err(VerifyError::encoding(format!(
                    "model_value on undeclared variable `{}`",
                    var.name()
                )));
            }
            Some(s) if *s != var.sort() => {
                return Err(VerifyError::encoding(format!(
                    "model_value on `{}` as {} but declared {}",
                    var.name(),
                    var.sort(),
                    s
                )));
            }
            Some(_) => {}
        }

        let model = self.model.as_ref().ok_or_else(|| {
            VerifyError::encoding("model_value is only valid right after a SAT check")
        })?;
        let value = model.get(var.name()).ok_or_else(|| VerifyError::Backend {
            backend: self.adapter.backend.name().to_string(),
            message: format!("model is missing declared variable `{}`", var.name()),
        })?;
        if value.sort() != var.sort() {
            return Err(VerifyError::Backend {
                backend: self.adapter.backend.name().to_string(),
                message: format!("model value for `{}` has the wrong sort", var.name()),
            });
        }
        Ok(value.clone())
    }

    /// Release the session. Dropping it has the same effect.
    pub fn close(self) {}
}

impl<B: Backend> Drop for SolverSession<'_, B> {
    fn drop(&mut self) {
        self.adapter.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Parse an integer numeral as printed by SMT solvers: `42` or `(- 42)`.
#[cfg_attr(not(feature = "z3"), allow(dead_code))]
pub(crate) fn parse_numeral(text: &str) -> Option<BigInt> {
    let t = text.trim();
    if let Some(inner) = t.strip_prefix("(-").and_then(|s| s.strip_suffix(')')) {
        return inner.trim().parse::<BigInt>().ok().map(|n| -n);
    }
    t.parse::<BigInt>().ok()
}

#[cfg_attr(not(feature = "z3"), allow(dead_code))]
pub(crate) fn classify_unknown(reason: &str) -> UnknownReason {
    let r = reason.to_ascii_lowercase();
    if r.contains("timeout") || r.contains("canceled") || r.contains("cancelled") {
        UnknownReason::Timeout
    } else {
        UnknownReason::Incomplete(reason.to_string())
    }
}

#[cfg(feature = "z3")]
pub mod z3_backend {
    use std::collections::HashMap;

    use num_bigint::BigInt;
    use z3::{
        ast::{Ast, Bool, Int},
        Config, Context, Params, SatResult, Solver,
    };

    use super::{classify_unknown, parse_numeral, Backend, Query, SolveResult, FIXED_SOLVER_PARAMS};
    use crate::error::VerifyError;
    use crate::term::{Model, Sort, Term, Value};

    /// Z3 through the `z3` crate. Every `solve` gets a fresh context, dropped before returning.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Z3Backend;

    impl Z3Backend {
        pub fn new() -> Self {
            Z3Backend
        }
    }

    fn failure(message: impl Into<String>) -> VerifyError {
        VerifyError::Backend {
            backend: "z3".to_string(),
            message: message.into(),
        }
    }

    enum Lowered<'ctx> {
        Int(Int<'ctx>),
        Bool(Bool<'ctx>),
    }

    struct Lowering<'ctx> {
        ctx: &'ctx Context,
        consts: HashMap<String, Lowered<'ctx>>,
    }

    impl<'ctx> Lowering<'ctx> {
        fn numeral(&self, n: &BigInt) -> Result<Int<'ctx>, VerifyError> {
            if let Ok(small) = i64::try_from(n) {
                return Ok(Int::from_i64(self.ctx, small));
            }
            if n.sign() == num_bigint::Sign::Minus {
                let magnitude = Int::from_str(self.ctx, &(-n).to_string())
                    .ok_or_else(|| failure(format!("cannot build numeral {n}")))?;
                Ok(magnitude.unary_minus())
            } else {
                Int::from_str(self.ctx, &n.to_string())
                    .ok_or_else(|| failure(format!("cannot build numeral {n}")))
            }
        }

        fn lower(&self, t: &Term) -> Result<Lowered<'ctx>, VerifyError> {
            Ok(match t.sort()? {
                Sort::Int => Lowered::Int(self.int(t)?),
                Sort::Bool => Lowered::Bool(self.boolean(t)?),
            })
        }

        fn int(&self, t: &Term) -> Result<Int<'ctx>, VerifyError> {
            match t {
                Term::Var(v) => match self.consts.get(v.name()) {
                    Some(Lowered::Int(i)) => Ok(i.clone()),
                    _ => Err(VerifyError::encoding(format!("`{}` is not a declared Int", v.name()))),
                },
                Term::Int(n) => self.numeral(n),
                Term::Add(args) => {
                    let lowered = args.iter().map(|a| self.int(a)).collect::<Result<Vec<_>, _>>()?;
                    let refs = lowered.iter().collect::<Vec<_>>();
                    Ok(Int::add(self.ctx, &refs))
                }
                Term::Sub(a, b) => Ok(Int::sub(self.ctx, &[&self.int(a)?, &self.int(b)?])),
                Term::Mul(a, b) => Ok(Int::mul(self.ctx, &[&self.int(a)?, &self.int(b)?])),
                Term::Ite(c, a, b) => Ok(self.boolean(c)?.ite(&self.int(a)?, &self.int(b)?)),
                other => Err(VerifyError::encoding(format!("`{other}` is not an Int term"))),
            }
        }

        fn boolean(&self, t: &Term) -> Result<Bool<'ctx>, VerifyError> {
            match t {
                Term::Var(v) => match self.consts.get(v.name()) {
                    Some(Lowered::Bool(b)) => Ok(b.clone()),
                    _ => Err(VerifyError::encoding(format!("`{}` is not a declared Bool", v.name()))),
                },
                Term::Bool(b) => Ok(Bool::from_bool(self.ctx, *b)),
                Term::Ite(c, a, b) => Ok(self.boolean(c)?.ite(&self.boolean(a)?, &self.boolean(b)?)),
                Term::Eq(a, b) => match (self.lower(a)?, self.lower(b)?) {
                    (Lowered::Int(x), Lowered::Int(y)) => Ok(x._eq(&y)),
                    (Lowered::Bool(x), Lowered::Bool(y)) => Ok(x._eq(&y)),
                    _ => Err(VerifyError::encoding(format!("sort mismatch in `{t}`"))),
                },
                Term::Lt(a, b) => Ok(self.int(a)?.lt(&self.int(b)?)),
                Term::Le(a, b) => Ok(self.int(a)?.le(&self.int(b)?)),
                Term::Not(a) => Ok(self.boolean(a)?.not()),
                Term::And(args) => {
                    let lowered = args.iter().map(|a| self.boolean(a)).collect::<Result<Vec<_>, _>>()?;
                    let refs = lowered.iter().collect::<Vec<_>>();
                    Ok(Bool::and(self.ctx, &refs))
                }
                Term::Or(args) => {
                    let lowered = args.iter().map(|a| self.boolean(a)).collect::<Result<Vec<_>, _>>()?;
                    let refs = lowered.iter().collect::<Vec<_>>();
                    Ok(Bool::or(self.ctx, &refs))
                }
                Term::Implies(a, b) => Ok(self.boolean(a)?.implies(&self.boolean(b)?)),
                other => Err(VerifyError::encoding(format!("`{other}` is not a Bool term"))),
            }
        }
    }

    impl Backend for Z3Backend {
        fn name(&self) -> &'static str {
            "z3"
        }

        fn probe(&self) -> Result<(), VerifyError> {
            Ok(())
        }

        fn solve(&self, query: &Query<'_>) -> Result<SolveResult, VerifyError> {
            let mut cfg = Config::new();
            cfg.set_model_generation(true);
            let ctx = Context::new(&cfg);

            let solver = Solver::new(&ctx);
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", u32::try_from(query.timeout_ms).unwrap_or(u32::MAX));
            for (key, value) in FIXED_SOLVER_PARAMS {
                params.set_u32(key, *value);
            }
            solver.set_params(&params);

            let mut lowering = Lowering {
                ctx: &ctx,
                consts: HashMap::new(),
            };
            for v in query.vars {
                let c = match v.sort() {
                    Sort::Int => Lowered::Int(Int::new_const(&ctx, v.name())),
                    Sort::Bool => Lowered::Bool(Bool::new_const(&ctx, v.name())),
                };
                lowering.consts.insert(v.name().to_string(), c);
            }
            for c in query.constraints {
                solver.assert(&lowering.boolean(c)?);
            }

            match solver.check() {
                SatResult::Unsat => Ok(SolveResult::Unsat),
                SatResult::Unknown => {
                    let reason = solver.get_reason_unknown().unwrap_or_else(|| "unknown".to_string());
                    Ok(SolveResult::Unknown(classify_unknown(&reason)))
                }
                SatResult::Sat => {
                    let z3_model = solver
                        .get_model()
                        .ok_or_else(|| failure("solver reported SAT but produced no model"))?;
                    let mut model = Model::new();
                    for v in query.vars {
                        let value = match lowering.consts.get(v.name()) {
                            Some(Lowered::Int(i)) => {
                                let val = z3_model
                                    .eval(i, true)
                                    .ok_or_else(|| failure(format!("no model value for `{}`", v.name())))?;
                                let n = match val.as_i64() {
                                    Some(small) => BigInt::from(small),
                                    None => parse_numeral(&val.to_string()).ok_or_else(|| {
                                        failure(format!("unparseable model value `{val}` for `{}`", v.name()))
                                    })?,
                                };
                                Value::Int(n)
                            }
                            Some(Lowered::Bool(b)) => {
                                let val = z3_model
                                    .eval(b, true)
                                    .and_then(|x| x.as_bool())
                                    .ok_or_else(|| failure(format!("no model value for `{}`", v.name())))?;
                                Value::Bool(val)
                            }
                            None => return Err(failure(format!("`{}` was not lowered", v.name()))),
                        };
                        model.insert(v.name(), value);
                    }
                    Ok(SolveResult::Sat(model))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers and records the queries it saw.
    struct Canned {
        answer: SolveResult,
        seen: Mutex<Vec<usize>>,
    }

    impl Canned {
        fn new(answer: SolveResult) -> Self {
            Canned {
                answer,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Backend for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn probe(&self) -> Result<(), VerifyError> {
            Ok(())
        }

        fn solve(&self, query: &Query<'_>) -> Result<SolveResult, VerifyError> {
            self.seen.lock().unwrap().push(query.constraints.len());
            Ok(self.answer.clone())
        }
    }

    fn sat_x(n: i64) -> SolveResult {
        let mut m = Model::new();
        m.insert("x", Value::from(n));
        SolveResult::Sat(m)
    }

    #[test]
    fn sessions_are_counted_and_released_on_drop() {
        let adapter = SolverAdapter::new(Canned::new(SolveResult::Unsat));
        assert_eq!(adapter.open_session_count(), 0);
        {
            let _a = adapter.open_session(100).unwrap();
            let b = adapter.open_session(100).unwrap();
            assert_eq!(adapter.open_session_count(), 2);
            b.close();
            assert_eq!(adapter.open_session_count(), 1);
        }
        assert_eq!(adapter.open_session_count(), 0);
    }

    #[test]
    fn unavailable_backend_opens_nothing() {
        let adapter = SolverAdapter::new(NoZ3Backend);
        let err = adapter.open_session(100).err().unwrap();
        assert!(matches!(err, VerifyError::BackendUnavailable { .. }));
        assert_eq!(adapter.open_session_count(), 0);
    }

    #[test]
    fn assert_rejects_undeclared_and_non_bool() {
        let adapter = SolverAdapter::new(Canned::new(SolveResult::Unsat));
        let mut s = adapter.open_session(100).unwrap();
        let x = Var::int("x");

        let err = s.assert(&x.term().gt(&Term::int(0))).unwrap_err();
        assert!(matches!(err, VerifyError::Encoding { .. }));

        s.declare(&x).unwrap();
        assert!(s.declare(&x).is_err());
        assert!(s.assert(&x.term().plus(&Term::int(1))).is_err());
        assert!(s.assert(&Var::flag("x").term()).is_err());
        s.assert(&x.term().gt(&Term::int(0))).unwrap();
        assert_eq!(s.constraints().len(), 1);
    }

    #[test]
    fn zero_budget_is_a_timeout_without_solving() {
        let adapter = SolverAdapter::new(Canned::new(SolveResult::Unsat));
        let mut s = adapter.open_session(0).unwrap();
        assert_eq!(s.check().unwrap(), CheckResult::Unknown(UnknownReason::Timeout));
        drop(s);
        assert!(adapter.backend().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn model_value_is_only_valid_after_sat() {
        let adapter = SolverAdapter::new(Canned::new(sat_x(5)));
        let mut s = adapter.open_session(100).unwrap();
        let x = Var::int("x");
        s.declare(&x).unwrap();

        assert!(s.model_value(&x).is_err());
        assert_eq!(s.check().unwrap(), CheckResult::Sat);
        assert_eq!(s.model_value(&x).unwrap(), Value::from(5i64));
        assert!(matches!(
            s.model_value(&Var::int("y")),
            Err(VerifyError::Encoding { .. })
        ));

        s.assert(&x.term().gt(&Term::int(0))).unwrap();
        assert!(s.model_value(&x).is_err());
    }

    #[test]
    fn numerals_parse_in_both_forms() {
        assert_eq!(parse_numeral("42"), Some(BigInt::from(42)));
        assert_eq!(parse_numeral("(- 42)"), Some(BigInt::from(-42)));
        let u256_max = crate::state::unsigned_max(256);
        assert_eq!(parse_numeral(&format!(" {u256_max} ")), Some(u256_max.clone()));
        assert_eq!(parse_numeral(&format!("(- {u256_max})")), Some(-u256_max));
        assert_eq!(parse_numeral("#x01"), None);
    }

    #[test]
    fn fixed_params_use_solver_level_keys() {
        assert!(FIXED_SOLVER_PARAMS.iter().any(|(k, v)| *k == "random_seed" && *v == 0));
        for (key, _) in FIXED_SOLVER_PARAMS {
            assert!(!key.contains('.'), "{key} is module-scoped");
        }
    }

    #[test]
    fn unknown_reasons_split_timeouts_from_incompleteness() {
        assert_eq!(classify_unknown("timeout"), UnknownReason::Timeout);
        assert_eq!(classify_unknown("canceled"), UnknownReason::Timeout);
        assert_eq!(
            classify_unknown("(incomplete quantifiers)"),
            UnknownReason::Incomplete("(incomplete quantifiers)".to_string())
        );
    }
}
