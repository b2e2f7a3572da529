#![forbid(unsafe_code)]

//! Backend-neutral constraint language.
//!
//! Property encodings are built from [`Term`]s and only lowered to a concrete
//! solver inside [`crate::solver::Backend::solve`]. The same terms are evaluated
//! locally against a copied-out [`Model`] to derive metrics and to audit models.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Serialize, Serializer};

use crate::error::VerifyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    Int,
    Bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Int => f.write_str("Int"),
            Sort::Bool => f.write_str("Bool"),
        }
    }
}

/// A named unknown. Identity is the name; scoped to one session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Var {
    name: String,
    sort: Sort,
}

impl Var {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Var {
            name: name.into(),
            sort,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Var::new(name, Sort::Int)
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Var::new(name, Sort::Bool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn term(&self) -> Term {
        Term::Var(self.clone())
    }
}

/// A concrete value copied out of a solver model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(#[serde(serialize_with = "decimal")] BigInt),
    Bool(bool),
}

impl Value {
    pub fn sort(&self) -> Sort {
        match self {
            Value::Int(_) => Sort::Int,
            Value::Bool(_) => Sort::Bool,
        }
    }

    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(n) => Some(n),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(BigInt::from(n))
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Integers leave the crate as decimal strings; JSON numbers cannot hold a u256.
pub(crate) fn decimal<S: Serializer>(n: &BigInt, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(n)
}

pub(crate) fn decimal_opt<S: Serializer>(n: &Option<BigInt>, s: S) -> Result<S::Ok, S::Error> {
    match n {
        Some(n) => s.collect_str(n),
        None => s.serialize_none(),
    }
}

/// Variable name -> concrete value. Owned copy; outlives the solver that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, Value>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Var(Var),
    Int(BigInt),
    Bool(bool),
    Add(Vec<Term>),
    Sub(Box<Term>, Box<Term>),
    Mul(Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),
    Eq(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Implies(Box<Term>, Box<Term>),
}

impl From<&Var> for Term {
    fn from(v: &Var) -> Self {
        v.term()
    }
}

impl Term {
    pub fn int(n: impl Into<BigInt>) -> Term {
        Term::Int(n.into())
    }

    pub fn bool(b: bool) -> Term {
        Term::Bool(b)
    }

    /// n-ary sum; the empty sum is `0`.
    pub fn sum(terms: impl IntoIterator<Item = Term>) -> Term {
        let terms: Vec<Term> = terms.into_iter().collect();
        match terms.len() {
            0 => Term::int(0),
            1 => terms.into_iter().next().unwrap_or_else(|| Term::int(0)),
            _ => Term::Add(terms),
        }
    }

    /// n-ary conjunction; the empty conjunction is `true`.
    pub fn all(terms: impl IntoIterator<Item = Term>) -> Term {
        let terms: Vec<Term> = terms.into_iter().collect();
        if terms.is_empty() {
            Term::Bool(true)
        } else {
            Term::And(terms)
        }
    }

    /// n-ary disjunction; the empty disjunction is `false`.
    pub fn any(terms: impl IntoIterator<Item = Term>) -> Term {
        let terms: Vec<Term> = terms.into_iter().collect();
        if terms.is_empty() {
            Term::Bool(false)
        } else {
            Term::Or(terms)
        }
    }

    pub fn plus(&self, rhs: &Term) -> Term {
        Term::Add(vec![self.clone(), rhs.clone()])
    }

    pub fn minus(&self, rhs: &Term) -> Term {
        Term::Sub(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    pub fn times(&self, rhs: &Term) -> Term {
        Term::Mul(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    pub fn equals(&self, rhs: &Term) -> Term {
        Term::Eq(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    pub fn differs(&self, rhs: &Term) -> Term {
        self.equals(rhs).not()
    }

    pub fn lt(&self, rhs: &Term) -> Term {
        Term::Lt(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    pub fn le(&self, rhs: &Term) -> Term {
        Term::Le(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    pub fn gt(&self, rhs: &Term) -> Term {
        rhs.lt(self)
    }

    pub fn ge(&self, rhs: &Term) -> Term {
        rhs.le(self)
    }

    pub fn not(&self) -> Term {
        Term::Not(Box::new(self.clone()))
    }

    pub fn and(&self, rhs: &Term) -> Term {
        Term::And(vec![self.clone(), rhs.clone()])
    }

    pub fn or(&self, rhs: &Term) -> Term {
        Term::Or(vec![self.clone(), rhs.clone()])
    }

    pub fn implies(&self, rhs: &Term) -> Term {
        Term::Implies(Box::new(self.clone()), Box::new(rhs.clone()))
    }

    /// `if self then a else b`.
    pub fn ite(&self, then: &Term, otherwise: &Term) -> Term {
        Term::Ite(
            Box::new(self.clone()),
            Box::new(then.clone()),
            Box::new(otherwise.clone()),
        )
    }

    /// Type-check the term and return its sort.
    pub fn sort(&self) -> Result<Sort, VerifyError> {
        match self {
            Term::Var(v) => Ok(v.sort()),
            Term::Int(_) => Ok(Sort::Int),
            Term::Bool(_) => Ok(Sort::Bool),
            Term::Add(args) => {
                for a in args {
                    self.expect(a, Sort::Int)?;
                }
                Ok(Sort::Int)
            }
            Term::Sub(a, b) | Term::Mul(a, b) => {
                self.expect(a, Sort::Int)?;
                self.expect(b, Sort::Int)?;
                Ok(Sort::Int)
            }
            Term::Lt(a, b) | Term::Le(a, b) => {
                self.expect(a, Sort::Int)?;
                self.expect(b, Sort::Int)?;
                Ok(Sort::Bool)
            }
            Term::Eq(a, b) => {
                let sa = a.sort()?;
                self.expect(b, sa)?;
                Ok(Sort::Bool)
            }
            Term::Ite(c, a, b) => {
                self.expect(c, Sort::Bool)?;
                let sa = a.sort()?;
                self.expect(b, sa)?;
                Ok(sa)
            }
            Term::Not(a) => {
                self.expect(a, Sort::Bool)?;
                Ok(Sort::Bool)
            }
            Term::And(args) | Term::Or(args) => {
                for a in args {
                    self.expect(a, Sort::Bool)?;
                }
                Ok(Sort::Bool)
            }
            Term::Implies(a, b) => {
                self.expect(a, Sort::Bool)?;
                self.expect(b, Sort::Bool)?;
                Ok(Sort::Bool)
            }
        }
    }

    fn expect(&self, operand: &Term, want: Sort) -> Result<(), VerifyError> {
        let got = operand.sort()?;
        if got == want {
            Ok(())
        } else {
            Err(VerifyError::encoding(format!(
                "sort mismatch: expected {want} operand, found {got} `{operand}` in `{self}`"
            )))
        }
    }

    /// Every variable occurrence, in left-to-right order (duplicates included).
    pub fn vars(&self) -> Vec<&Var> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a Var>) {
        match self {
            Term::Var(v) => out.push(v),
            Term::Int(_) | Term::Bool(_) => {}
            Term::Add(args) | Term::And(args) | Term::Or(args) => {
                for a in args {
                    a.collect_vars(out);
                }
            }
            Term::Sub(a, b)
            | Term::Mul(a, b)
            | Term::Eq(a, b)
            | Term::Lt(a, b)
            | Term::Le(a, b)
            | Term::Implies(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Term::Ite(c, a, b) => {
                c.collect_vars(out);
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Term::Not(a) => a.collect_vars(out),
        }
    }

    /// Evaluate against a concrete model.
    pub fn eval(&self, model: &Model) -> Result<Value, VerifyError> {
        match self {
            Term::Var(v) => {
                let value = model.get(v.name()).ok_or_else(|| {
                    VerifyError::encoding(format!("model has no value for `{}`", v.name()))
                })?;
                if value.sort() != v.sort() {
                    return Err(VerifyError::encoding(format!(
                        "model value for `{}` has sort {}, declared {}",
                        v.name(),
                        value.sort(),
                        v.sort()
                    )));
                }
                Ok(value.clone())
            }
            Term::Int(n) => Ok(Value::Int(n.clone())),
            Term::Bool(b) => Ok(Value::Bool(*b)),
            Term::Add(args) => {
                let mut acc = BigInt::zero();
                for a in args {
                    acc += a.eval_int(model)?;
                }
                Ok(Value::Int(acc))
            }
            Term::Sub(a, b) => Ok(Value::Int(a.eval_int(model)? - b.eval_int(model)?)),
            Term::Mul(a, b) => Ok(Value::Int(a.eval_int(model)? * b.eval_int(model)?)),
            Term::Ite(c, a, b) => {
                if c.eval_bool(model)? {
                    a.eval(model)
                } else {
                    b.eval(model)
                }
            }
            Term::Eq(a, b) => Ok(Value::Bool(a.eval(model)? == b.eval(model)?)),
            Term::Lt(a, b) => Ok(Value::Bool(a.eval_int(model)? < b.eval_int(model)?)),
            Term::Le(a, b) => Ok(Value::Bool(a.eval_int(model)? <= b.eval_int(model)?)),
            Term::Not(a) => Ok(Value::Bool(!a.eval_bool(model)?)),
            Term::And(args) => {
                for a in args {
                    if !a.eval_bool(model)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Term::Or(args) => {
                for a in args {
                    if a.eval_bool(model)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Term::Implies(a, b) => Ok(Value::Bool(!a.eval_bool(model)? || b.eval_bool(model)?)),
        }
    }

    pub fn eval_int(&self, model: &Model) -> Result<BigInt, VerifyError> {
        match self.eval(model)? {
            Value::Int(n) => Ok(n),
            Value::Bool(_) => Err(VerifyError::encoding(format!(
                "`{self}` evaluated to a Bool where an Int was expected"
            ))),
        }
    }

    pub fn eval_bool(&self, model: &Model) -> Result<bool, VerifyError> {
        match self.eval(model)? {
            Value::Bool(b) => Ok(b),
            Value::Int(_) => Err(VerifyError::encoding(format!(
                "`{self}` evaluated to an Int where a Bool was expected"
            ))),
        }
    }
}

fn write_app(f: &mut fmt::Formatter<'_>, op: &str, args: &[&Term]) -> fmt::Result {
    write!(f, "({op}")?;
    for a in args {
        write!(f, " {a}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => f.write_str(v.name()),
            Term::Int(n) if n.sign() == num_bigint::Sign::Minus => write!(f, "(- {})", -n),
            Term::Int(n) => write!(f, "{n}"),
            Term::Bool(b) => write!(f, "{b}"),
            Term::Add(args) => write_app(f, "+", &args.iter().collect::<Vec<_>>()),
            Term::Sub(a, b) => write_app(f, "-", &[&**a, &**b]),
            Term::Mul(a, b) => write_app(f, "*", &[&**a, &**b]),
            Term::Ite(c, a, b) => write_app(f, "ite", &[&**c, &**a, &**b]),
            Term::Eq(a, b) => write_app(f, "=", &[&**a, &**b]),
            Term::Lt(a, b) => write_app(f, "<", &[&**a, &**b]),
            Term::Le(a, b) => write_app(f, "<=", &[&**a, &**b]),
            Term::Not(a) => write_app(f, "not", &[&**a]),
            Term::And(args) => write_app(f, "and", &args.iter().collect::<Vec<_>>()),
            Term::Or(args) => write_app(f, "or", &args.iter().collect::<Vec<_>>()),
            Term::Implies(a, b) => write_app(f, "=>", &[&**a, &**b]),
        }
    }
}
