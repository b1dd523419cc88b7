//! Small symbolic algebra: rate expressions, derived ODE right-hand sides, substitutions.
//!
//! Expressions are plain trees. [`Expr::simplify`] brings them into a canonical form in which
//! polynomial expressions that are algebraically equal compare equal, which is all the ODE
//! deriver and the tests need. Rational functions are kept as products with negative powers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{MumotError, Result};

/// Fixpoint cap for [`Expr::simplify`].
const MAX_SIMPLIFY_PASSES: usize = 16;
/// Largest integer power of a sum that is multiplied out.
const MAX_EXPANDED_POWER: f64 = 8.0;

/// Named symbol: a reactant, a rate, or the system size.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Elementary functions understood by the expression parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Abs,
}

impl Func {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "exp" => Self::Exp,
            "log" | "ln" => Self::Log,
            "sqrt" => Self::Sqrt,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "abs" => Self::Abs,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Abs => "abs",
        }
    }

    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Exp => value.exp(),
            Self::Log => value.ln(),
            Self::Sqrt => value.sqrt(),
            Self::Sin => value.sin(),
            Self::Cos => value.cos(),
            Self::Tan => value.tan(),
            Self::Abs => value.abs(),
        }
    }
}

/// Symbolic expression tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Num(OrderedFloat<f64>),
    Sym(Symbol),
    Pi,
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

fn is_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

impl Expr {
    #[must_use]
    pub fn num(value: f64) -> Self {
        // Fold negative zero so that it compares equal to zero.
        Self::Num(OrderedFloat(if value == 0.0 { 0.0 } else { value }))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::num(0.0)
    }

    #[must_use]
    pub fn one() -> Self {
        Self::num(1.0)
    }

    #[must_use]
    pub fn sym(name: impl Into<String>) -> Self {
        Self::Sym(Symbol::new(name))
    }

    /// Simplified sum of `terms`.
    #[must_use]
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        Self::Add(terms.into_iter().collect()).simplify()
    }

    /// Simplified product of `factors`.
    #[must_use]
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        Self::Mul(factors.into_iter().collect()).simplify()
    }

    #[must_use]
    pub fn pow(base: Expr, exponent: Expr) -> Self {
        Self::Pow(Box::new(base), Box::new(exponent)).simplify()
    }

    /// Parse and simplify an infix or LaTeX-flavoured expression.
    pub fn parse(input: &str) -> Result<Self> {
        crate::grammar::parse_expression(input).map(|expr| expr.simplify())
    }

    #[must_use]
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Sym(symbol) => Some(symbol),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Num(value) => Some(value.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_number() == Some(0.0)
    }

    /// Free symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Self::Num(_) | Self::Pi => {}
            Self::Sym(symbol) => {
                out.insert(symbol.clone());
            }
            Self::Add(items) | Self::Mul(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Self::Pow(base, exponent) => {
                base.collect_symbols(out);
                exponent.collect_symbols(out);
            }
            Self::Call(_, arg) => arg.collect_symbols(out),
        }
    }

    /// Replace symbols by expressions, simultaneously, and simplify.
    #[must_use]
    pub fn substitute(&self, substitutions: &BTreeMap<Symbol, Expr>) -> Self {
        self.replace(substitutions).simplify()
    }

    fn replace(&self, substitutions: &BTreeMap<Symbol, Expr>) -> Self {
        match self {
            Self::Sym(symbol) => substitutions
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Self::Num(_) | Self::Pi => self.clone(),
            Self::Add(items) => Self::Add(items.iter().map(|i| i.replace(substitutions)).collect()),
            Self::Mul(items) => Self::Mul(items.iter().map(|i| i.replace(substitutions)).collect()),
            Self::Pow(base, exponent) => Self::Pow(
                Box::new(base.replace(substitutions)),
                Box::new(exponent.replace(substitutions)),
            ),
            Self::Call(func, arg) => Self::Call(*func, Box::new(arg.replace(substitutions))),
        }
    }

    /// Evaluate against `bindings`.
    ///
    /// Unbound symbols are configuration errors; division by zero and non-finite intermediate
    /// values are numerical errors.
    pub fn eval(&self, bindings: &BTreeMap<Symbol, f64>) -> Result<f64> {
        self.eval_with(&|symbol| bindings.get(symbol).copied())
    }

    pub fn eval_with<F>(&self, lookup: &F) -> Result<f64>
    where
        F: Fn(&Symbol) -> Option<f64>,
    {
        let value = match self {
            Self::Num(value) => value.0,
            Self::Pi => std::f64::consts::PI,
            Self::Sym(symbol) => lookup(symbol).ok_or_else(|| {
                MumotError::config(format!("no value bound to symbol '{symbol}'"))
            })?,
            Self::Add(terms) => {
                let mut acc = 0.0;
                for term in terms {
                    acc += term.eval_with(lookup)?;
                }
                acc
            }
            Self::Mul(factors) => {
                let mut acc = 1.0;
                for factor in factors {
                    acc *= factor.eval_with(lookup)?;
                }
                acc
            }
            Self::Pow(base, exponent) => {
                let b = base.eval_with(lookup)?;
                let e = exponent.eval_with(lookup)?;
                if b == 0.0 && e < 0.0 {
                    return Err(MumotError::numerical(format!("division by zero in '{self}'")));
                }
                if is_integer(e) && e.abs() <= f64::from(i32::MAX) {
                    b.powi(e as i32)
                } else {
                    b.powf(e)
                }
            }
            Self::Call(func, arg) => func.apply(arg.eval_with(lookup)?),
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MumotError::numerical(format!("'{self}' evaluated to {value}")))
        }
    }

    /// Canonical form: flattened, constants folded, like terms and equal bases collected,
    /// products over sums multiplied out, children sorted.
    #[must_use]
    pub fn simplify(&self) -> Self {
        let mut current = self.simplify_once();
        for _ in 0..MAX_SIMPLIFY_PASSES {
            let next = current.simplify_once();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn simplify_once(&self) -> Self {
        match self {
            Self::Num(value) => Self::num(value.0),
            Self::Sym(_) | Self::Pi => self.clone(),
            Self::Call(func, arg) => simplify_call(*func, arg.simplify_once()),
            Self::Pow(base, exponent) => {
                simplify_pow(base.simplify_once(), exponent.simplify_once())
            }
            Self::Mul(factors) => simplify_mul(factors.iter().map(Self::simplify_once).collect()),
            Self::Add(terms) => simplify_add(terms.iter().map(Self::simplify_once).collect()),
        }
    }

    /// Leading sign and magnitude, used for `a - b` rendering.
    fn split_sign(&self) -> (bool, Expr) {
        match self {
            Self::Num(value) if value.0 < 0.0 => (true, Self::num(-value.0)),
            Self::Mul(factors) => match factors.split_first() {
                Some((Self::Num(c), rest)) if c.0 < 0.0 && !rest.is_empty() => {
                    let mut magnitude = Vec::with_capacity(factors.len());
                    if c.0 != -1.0 {
                        magnitude.push(Self::num(-c.0));
                    }
                    magnitude.extend(rest.iter().cloned());
                    if magnitude.len() == 1 {
                        (true, magnitude.remove(0))
                    } else {
                        (true, Self::Mul(magnitude))
                    }
                }
                _ => (false, self.clone()),
            },
            _ => (false, self.clone()),
        }
    }
}

fn simplify_call(func: Func, arg: Expr) -> Expr {
    if let Some(value) = arg.as_number() {
        let folded = func.apply(value);
        if is_integer(folded) {
            return Expr::num(folded);
        }
    }
    Expr::Call(func, Box::new(arg))
}

fn simplify_pow(base: Expr, exponent: Expr) -> Expr {
    let Some(e) = exponent.as_number() else {
        if base.as_number() == Some(1.0) {
            return Expr::one();
        }
        return Expr::Pow(Box::new(base), Box::new(exponent));
    };
    if e == 0.0 {
        return Expr::one();
    }
    if e == 1.0 {
        return base;
    }
    match base {
        Expr::Num(b) if b.0 == 1.0 => Expr::one(),
        Expr::Num(b) => {
            let value = b.0.powf(e);
            if value.is_finite() && (is_integer(e) || is_integer(value)) {
                Expr::num(value)
            } else {
                Expr::Pow(Box::new(Expr::Num(b)), Box::new(exponent))
            }
        }
        Expr::Pow(inner, inner_exp) if is_integer(e) => {
            simplify_pow(*inner, simplify_mul(vec![*inner_exp, exponent]))
        }
        Expr::Mul(factors) if is_integer(e) => simplify_mul(
            factors
                .into_iter()
                .map(|factor| simplify_pow(factor, exponent.clone()))
                .collect(),
        ),
        Expr::Add(terms) if is_integer(e) && (2.0..=MAX_EXPANDED_POWER).contains(&e) => {
            simplify_mul(vec![Expr::Add(terms); e as usize])
        }
        other => Expr::Pow(Box::new(other), Box::new(exponent)),
    }
}

fn collect_factor(factor: Expr, coefficient: &mut f64, out: &mut Vec<Expr>) {
    match factor {
        Expr::Num(value) => *coefficient *= value.0,
        Expr::Mul(inner) => {
            for item in inner {
                collect_factor(item, coefficient, out);
            }
        }
        other => out.push(other),
    }
}

fn simplify_mul(factors: Vec<Expr>) -> Expr {
    let mut coefficient = 1.0;
    let mut flat = Vec::with_capacity(factors.len());
    for factor in factors {
        collect_factor(factor, &mut coefficient, &mut flat);
    }
    if coefficient == 0.0 {
        return Expr::zero();
    }

    // Distribute over the first sum; the recursion handles the rest.
    if let Some(pos) = flat.iter().position(|f| matches!(f, Expr::Add(_)))
        && let Expr::Add(terms) = flat.remove(pos)
    {
        let expanded = terms
            .into_iter()
            .map(|term| {
                let mut product = flat.clone();
                product.push(term);
                product.push(Expr::num(coefficient));
                simplify_mul(product)
            })
            .collect();
        return simplify_add(expanded);
    }

    let mut powers: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
    for factor in flat {
        let (base, exponent) = match factor {
            Expr::Pow(base, exponent) => (*base, *exponent),
            other => (other, Expr::one()),
        };
        powers.entry(base).or_default().push(exponent);
    }

    let mut out = Vec::with_capacity(powers.len());
    for (base, mut exponents) in powers {
        let exponent = if exponents.len() == 1 {
            exponents.remove(0)
        } else {
            simplify_add(exponents)
        };
        collect_factor(simplify_pow(base, exponent), &mut coefficient, &mut out);
    }
    if coefficient == 0.0 {
        return Expr::zero();
    }
    out.sort();
    if out.is_empty() {
        return Expr::num(coefficient);
    }
    if coefficient == 1.0 {
        if out.len() == 1 {
            return out.remove(0);
        }
        return Expr::Mul(out);
    }
    out.insert(0, Expr::num(coefficient));
    Expr::Mul(out)
}

fn collect_term(term: Expr, constant: &mut f64, out: &mut Vec<Expr>) {
    match term {
        Expr::Num(value) => *constant += value.0,
        Expr::Add(inner) => {
            for item in inner {
                collect_term(item, constant, out);
            }
        }
        other => out.push(other),
    }
}

/// Split `c * m` into `(c, m)`; terms without a numeric lead have coefficient 1.
fn split_coefficient(term: Expr) -> (f64, Expr) {
    match term {
        Expr::Mul(mut factors) if matches!(factors.first(), Some(Expr::Num(_))) => {
            let coefficient = factors.remove(0).as_number().unwrap_or(1.0);
            let monomial = if factors.len() == 1 {
                factors.remove(0)
            } else {
                Expr::Mul(factors)
            };
            (coefficient, monomial)
        }
        other => (1.0, other),
    }
}

fn with_coefficient(coefficient: f64, monomial: Expr) -> Expr {
    if coefficient == 1.0 {
        return monomial;
    }
    let mut factors = vec![Expr::num(coefficient)];
    match monomial {
        Expr::Mul(inner) => factors.extend(inner),
        other => factors.push(other),
    }
    Expr::Mul(factors)
}

fn simplify_add(terms: Vec<Expr>) -> Expr {
    let mut constant = 0.0;
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        collect_term(term, &mut constant, &mut flat);
    }
    let mut monomials: BTreeMap<Expr, f64> = BTreeMap::new();
    for term in flat {
        let (coefficient, monomial) = split_coefficient(term);
        *monomials.entry(monomial).or_insert(0.0) += coefficient;
    }
    let mut out: Vec<Expr> = monomials
        .into_iter()
        .filter(|(_, coefficient)| *coefficient != 0.0)
        .map(|(monomial, coefficient)| with_coefficient(coefficient, monomial))
        .collect();
    if constant != 0.0 {
        out.push(Expr::num(constant));
    }
    match out.len() {
        0 => Expr::zero(),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

fn format_number(value: f64) -> String {
    if is_integer(value) && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(value) => f.write_str(&format_number(value.0)),
            Self::Sym(symbol) => write!(f, "{symbol}"),
            Self::Pi => f.write_str("pi"),
            Self::Call(func, arg) => write!(f, "{}({arg})", func.name()),
            Self::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (negative, magnitude) = term.split_sign();
                    match (i, negative) {
                        (0, true) => f.write_str("-")?,
                        (0, false) => {}
                        (_, true) => f.write_str(" - ")?,
                        (_, false) => f.write_str(" + ")?,
                    }
                    if matches!(magnitude, Self::Add(_)) {
                        write!(f, "({magnitude})")?;
                    } else {
                        write!(f, "{magnitude}")?;
                    }
                }
                Ok(())
            }
            Self::Mul(factors) => {
                let mut rest = factors.as_slice();
                if let Some((Self::Num(c), tail)) = rest.split_first()
                    && c.0 == -1.0
                    && !tail.is_empty()
                {
                    f.write_str("-")?;
                    rest = tail;
                }
                for (i, factor) in rest.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    let wrap = match factor {
                        Self::Add(_) | Self::Mul(_) => true,
                        Self::Num(value) => i > 0 && value.0 < 0.0,
                        _ => false,
                    };
                    if wrap {
                        write!(f, "({factor})")?;
                    } else {
                        write!(f, "{factor}")?;
                    }
                }
                Ok(())
            }
            Self::Pow(base, exponent) => {
                let wrap_base = match base.as_ref() {
                    Self::Add(_) | Self::Mul(_) | Self::Pow(..) => true,
                    Self::Num(value) => value.0 < 0.0,
                    _ => false,
                };
                let wrap_exponent = match exponent.as_ref() {
                    Self::Sym(_) | Self::Pi | Self::Call(..) => false,
                    Self::Num(value) => value.0 < 0.0,
                    _ => true,
                };
                if wrap_base {
                    write!(f, "({base})")?;
                } else {
                    write!(f, "{base}")?;
                }
                if wrap_exponent {
                    write!(f, "^({exponent})")
                } else {
                    write!(f, "^{exponent}")
                }
            }
        }
    }
}

impl FromStr for Expr {
    type Err = MumotError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, negate(rhs)])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        negate(self).simplify()
    }
}

pub(crate) fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Num(value) => Expr::num(-value.0),
        other => Expr::Mul(vec![Expr::num(-1.0), other]),
    }
}
