//! Reaction rules, models, and the mean-field ODE derivation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use tracing::{debug, info};

use crate::{DEFAULT_RATE_VALUE, DEFAULT_SYSTEM_SIZE};
use crate::error::{MumotError, Result};
use crate::expr::{Expr, Symbol};
use crate::parser::parse_rules;

/// `lhs -> rhs : rate`, with the same number of reactants on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    lhs: Vec<Symbol>,
    rhs: Vec<Symbol>,
    rate: Expr,
}

impl Rule {
    pub fn new(lhs: Vec<Symbol>, rhs: Vec<Symbol>, rate: Expr) -> Result<Self> {
        let rule = Self { lhs, rhs, rate };
        if rule.lhs.is_empty() {
            return Err(MumotError::syntax(format!("Rule has no reactants: {rule}")));
        }
        if rule.lhs.len() != rule.rhs.len() {
            return Err(MumotError::syntax(format!(
                "Unequal number of reactants on lhs and rhs of rule {rule}"
            )));
        }
        Ok(rule)
    }

    #[must_use]
    pub fn lhs(&self) -> &[Symbol] {
        &self.lhs
    }

    #[must_use]
    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    #[must_use]
    pub fn rate(&self) -> &Expr {
        &self.rate
    }

    /// Number of reactants consumed by one firing.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.lhs.len()
    }

    /// Net change of `reactant` when the rule fires once.
    #[must_use]
    pub fn stoichiometry(&self, reactant: &Symbol) -> i64 {
        let count = |side: &[Symbol]| side.iter().filter(|s| *s == reactant).count() as i64;
        count(&self.rhs) - count(&self.lhs)
    }

    /// Mass-action term: product of the left-hand side reactants times the rate.
    #[must_use]
    pub fn mass_action_term(&self) -> Expr {
        Expr::product(
            self.lhs
                .iter()
                .cloned()
                .map(Expr::Sym)
                .chain(std::iter::once(self.rate.clone())),
        )
    }

    /// Copy of this rule with a different rate.
    #[must_use]
    pub fn with_rate(&self, rate: Expr) -> Self {
        Self {
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
            rate,
        }
    }

    pub fn reactants(&self) -> impl Iterator<Item = &Symbol> {
        self.lhs.iter().chain(self.rhs.iter())
    }

    /// Interaction-graph edge for this rule; `None` for rules with more than two reactants.
    #[must_use]
    pub fn motif_edge(&self) -> Option<MotifEdge> {
        match (self.lhs.as_slice(), self.rhs.as_slice()) {
            ([from], [to]) => Some(MotifEdge {
                motif: Motif::Conversion,
                source: from.clone(),
                target: to.clone(),
            }),
            ([a, b], [c, d]) => Some(binary_motif(a, b, c, d)),
            _ => None,
        }
    }
}

fn binary_motif(a: &Symbol, b: &Symbol, c: &Symbol, d: &Symbol) -> MotifEdge {
    let edge = |motif, source: &Symbol, target: &Symbol| MotifEdge {
        motif,
        source: source.clone(),
        target: target.clone(),
    };
    if c == d {
        // A + B -> A + A: the product recruits the other reactant.
        if c == a && b != c {
            return edge(Motif::RecruitedSwitching, b, c);
        }
        if c == b && a != c {
            return edge(Motif::RecruitedSwitching, a, c);
        }
    } else {
        let mut found = None;
        for (fresh, kept) in [(c, d), (d, c)] {
            if fresh != a && fresh != b {
                if kept == a {
                    found = Some(edge(Motif::TargetedInhibition, a, b));
                } else if kept == b {
                    found = Some(edge(Motif::TargetedInhibition, b, a));
                }
            }
        }
        if let Some(found) = found {
            return found;
        }
    }
    edge(Motif::ReciprocalInhibition, a, b)
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |side: &[Symbol]| {
            side.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" + ")
        };
        write!(f, "{} -> {} : {}", join(&self.lhs), join(&self.rhs), self.rate)
    }
}

/// Classification of a rule's effect, used to style interaction-graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motif {
    /// `A -> B`.
    Conversion,
    /// `A + B -> A + A`: B switches to A on meeting it.
    RecruitedSwitching,
    /// `A + B -> C + A`: A turns B into something else.
    TargetedInhibition,
    /// `A + B -> C + C` or `C + D`: both reactants are converted.
    ReciprocalInhibition,
}

impl Motif {
    /// Graphviz `(arrowhead, arrowtail)` for the motif.
    #[must_use]
    pub const fn arrows(self) -> (&'static str, &'static str) {
        match self {
            Self::Conversion => ("normal", "none"),
            Self::RecruitedSwitching => ("normal", "dot"),
            Self::TargetedInhibition => ("dot", "none"),
            Self::ReciprocalInhibition => ("dot", "dot"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MotifEdge {
    pub motif: Motif,
    pub source: Symbol,
    pub target: Symbol,
}

/// Mean-field right-hand side for every reactant.
///
/// Each rule contributes `(count on rhs - count on lhs) * lhs-product * rate` to each reactant;
/// zero factors are skipped. Reactants that no rule changes get a zero equation.
#[must_use]
pub fn derive_odes(reactants: &BTreeSet<Symbol>, rules: &[Rule]) -> BTreeMap<Symbol, Expr> {
    let terms: Vec<Expr> = rules.iter().map(Rule::mass_action_term).collect();
    reactants
        .iter()
        .map(|reactant| {
            let contributions = rules.iter().zip(&terms).filter_map(|(rule, term)| {
                let factor = rule.stoichiometry(reactant);
                (factor != 0).then(|| Expr::Mul(vec![Expr::num(factor as f64), term.clone()]))
            });
            (reactant.clone(), Expr::sum(contributions))
        })
        .collect()
}

/// Reactants, rates, rules, and their derived ODEs.
///
/// Models are values: [`Model::substitute`] returns a new model and leaves `self` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    reactants: BTreeSet<Symbol>,
    rates: BTreeSet<Symbol>,
    rules: Vec<Rule>,
    equations: BTreeMap<Symbol, Expr>,
    system_size: Option<Symbol>,
}

impl Model {
    /// Parse a rule description and derive its ODEs.
    pub fn parse(description: &str) -> Result<Self> {
        let parsed = parse_rules(description)?;
        if parsed.rules.is_empty() {
            return Err(MumotError::syntax("model description contains no rules"));
        }
        let equations = derive_odes(&parsed.reactants, &parsed.rules);
        info!(
            reactants = parsed.reactants.len(),
            rates = parsed.rates.len(),
            rules = parsed.rules.len(),
            "model parsed"
        );
        Ok(Self {
            reactants: parsed.reactants,
            rates: parsed.rates,
            rules: parsed.rules,
            equations,
            system_size: None,
        })
    }

    #[must_use]
    pub fn reactants(&self) -> &BTreeSet<Symbol> {
        &self.reactants
    }

    #[must_use]
    pub fn rates(&self) -> &BTreeSet<Symbol> {
        &self.rates
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn equations(&self) -> &BTreeMap<Symbol, Expr> {
        &self.equations
    }

    #[must_use]
    pub fn equation(&self, reactant: &Symbol) -> Option<&Expr> {
        self.equations.get(reactant)
    }

    #[must_use]
    pub fn system_size(&self) -> Option<&Symbol> {
        self.system_size.as_ref()
    }

    /// New model with the comma-separated assignments (`A = N - B, k2 = k1`) applied in order.
    ///
    /// A substituted reactant leaves the reactant set and the equation map. The system size is
    /// the first fresh symbol, in symbol order, on the right-hand side of the first assignment
    /// that replaces a reactant; later assignments never override it. Rules keep their
    /// reactants and have their rates rewritten.
    pub fn substitute(&self, assignments: &str) -> Result<Self> {
        let mut substitutions: Vec<(Symbol, Expr)> = Vec::new();
        for assignment in assignments.split(',') {
            let Some((lhs, rhs)) = assignment.split_once('=') else {
                return Err(MumotError::syntax(format!(
                    "No '=' in assignment {}",
                    assignment.trim()
                )));
            };
            let target = Expr::parse(lhs)?.as_symbol().cloned().ok_or_else(|| {
                MumotError::syntax(format!(
                    "Left-hand side of assignment must be a single symbol: {}",
                    assignment.trim()
                ))
            })?;
            substitutions.push((target, Expr::parse(rhs)?));
        }

        let apply = |expr: &Expr| {
            substitutions.iter().fold(expr.clone(), |acc, (symbol, value)| {
                acc.substitute(&BTreeMap::from([(symbol.clone(), value.clone())]))
            })
        };

        let mut reactants = self.reactants.clone();
        let mut equations: BTreeMap<Symbol, Expr> = self
            .equations
            .iter()
            .map(|(reactant, rhs)| (reactant.clone(), apply(rhs)))
            .collect();
        let rules: Vec<Rule> = self
            .rules
            .iter()
            .map(|rule| rule.with_rate(apply(rule.rate())))
            .collect();

        let mut system_size = None;
        for (target, value) in &substitutions {
            if !reactants.contains(target) {
                continue;
            }
            if system_size.is_none() {
                system_size = value
                    .symbols()
                    .into_iter()
                    .find(|s| !reactants.contains(s) && Some(s) != self.system_size.as_ref());
            }
            reactants.remove(target);
            equations.remove(target);
        }
        let system_size = system_size.or_else(|| self.system_size.clone());

        let rates = equations
            .values()
            .chain(rules.iter().map(Rule::rate))
            .flat_map(Expr::symbols)
            .filter(|s| Some(s) != system_size.as_ref())
            .filter(|s| self.rates.contains(s) || !self.reactants.contains(s))
            .collect();

        debug!(
            assignments,
            system_size = system_size.as_ref().map(Symbol::name),
            "model substituted"
        );
        Ok(Self {
            reactants,
            rates,
            rules,
            equations,
            system_size,
        })
    }

    /// Every rate (and the system size, when set) bound to `overrides` or its default.
    ///
    /// Overrides naming anything else are configuration errors.
    pub fn rate_values(&self, overrides: &BTreeMap<Symbol, f64>) -> Result<BTreeMap<Symbol, f64>> {
        for (name, value) in overrides {
            let known = self.rates.contains(name) || self.system_size.as_ref() == Some(name);
            if !known {
                return Err(MumotError::config(format!(
                    "'{name}' is not a rate of the model"
                )));
            }
            if !value.is_finite() {
                return Err(MumotError::config(format!(
                    "value of '{name}' must be finite; got {value}"
                )));
            }
        }
        Ok(self
            .rates
            .iter()
            .chain(self.system_size.iter())
            .map(|name| {
                let default = if self.system_size.as_ref() == Some(name) {
                    DEFAULT_SYSTEM_SIZE
                } else {
                    DEFAULT_RATE_VALUE
                };
                let value = overrides.get(name).copied().unwrap_or(default);
                (name.clone(), value)
            })
            .collect())
    }

    /// Validate state variables for field views: two or three distinct reactants.
    pub fn check_state_variables(&self, variables: &[Symbol]) -> Result<()> {
        if !(2..=3).contains(&variables.len()) {
            return Err(MumotError::config(format!(
                "field views need two or three state variables; got {}",
                variables.len()
            )));
        }
        for (i, variable) in variables.iter().enumerate() {
            if !self.reactants.contains(variable) {
                return Err(MumotError::config(format!(
                    "'{variable}' is not a reactant of the model"
                )));
            }
            if variables[..i].contains(variable) {
                return Err(MumotError::config(format!(
                    "state variable '{variable}' is listed twice"
                )));
            }
        }
        Ok(())
    }

    /// Text summary: reactants, rates, rules, and one ODE per reactant.
    #[must_use]
    pub fn describe(&self) -> String {
        let join = |set: &BTreeSet<Symbol>| {
            set.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut out = String::new();
        let _ = writeln!(out, "Reactants: {}", join(&self.reactants));
        let _ = writeln!(out, "Rates: {}", join(&self.rates));
        if let Some(size) = &self.system_size {
            let _ = writeln!(out, "System size: {size}");
        }
        let _ = writeln!(out, "Rules:");
        for rule in &self.rules {
            let _ = writeln!(out, "  {rule}");
        }
        let _ = writeln!(out, "ODEs:");
        for (reactant, rhs) in &self.equations {
            let _ = writeln!(out, "  d/dt {reactant} = {rhs}");
        }
        out
    }

    /// Graphviz DOT text of the interaction graph, edges labelled by rate.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph Model {\n  layout=circo;\n");
        for reactant in &self.reactants {
            let _ = writeln!(out, "  \"{}\";", dot_escape(reactant.name()));
        }
        for rule in &self.rules {
            let Some(edge) = rule.motif_edge() else {
                debug!(rule = %rule, "no interaction edge for rule");
                continue;
            };
            let (head, tail) = edge.motif.arrows();
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{}\", arrowhead={head}, arrowtail={tail}, dir=both];",
                dot_escape(edge.source.name()),
                dot_escape(edge.target.name()),
                dot_escape(&rule.rate().to_string()),
            );
        }
        out.push_str("}\n");
        out
    }
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        Symbol::from(name)
    }

    fn rule(text: &str) -> Rule {
        crate::parser::parse_rule(text).expect("rule")
    }

    #[test]
    fn rule_constructor_enforces_balance() {
        let err = Rule::new(vec![sym("A")], vec![sym("B"), sym("C")], Expr::sym("k")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Syntax);
        assert!(Rule::new(vec![], vec![], Expr::sym("k")).is_err());
    }

    #[test]
    fn stoichiometry_counts_both_sides() {
        let r = rule("A + B -> A + A : k");
        assert_eq!(r.stoichiometry(&sym("A")), 1);
        assert_eq!(r.stoichiometry(&sym("B")), -1);
        assert_eq!(r.stoichiometry(&sym("C")), 0);
    }

    #[test]
    fn motifs_follow_rule_shape() {
        let cases = [
            ("A -> B : k", Motif::Conversion, "A", "B"),
            ("A + B -> A + A : k", Motif::RecruitedSwitching, "B", "A"),
            ("A + B -> B + B : k", Motif::RecruitedSwitching, "A", "B"),
            ("A + B -> C + A : k", Motif::TargetedInhibition, "A", "B"),
            ("A + B -> B + C : k", Motif::TargetedInhibition, "B", "A"),
            ("A + B -> C + C : k", Motif::ReciprocalInhibition, "A", "B"),
            ("A + B -> C + D : k", Motif::ReciprocalInhibition, "A", "B"),
        ];
        for (text, motif, source, target) in cases {
            let edge = rule(text).motif_edge().expect("edge");
            assert_eq!(edge.motif, motif, "{text}");
            assert_eq!(edge.source, sym(source), "{text}");
            assert_eq!(edge.target, sym(target), "{text}");
        }
    }

    #[test]
    fn rate_values_default_and_reject_unknown_names() {
        let model = Model::parse("A -> B : k_1\nB -> A : k_2").expect("model");
        let values = model
            .rate_values(&BTreeMap::from([(sym("k_1"), 0.5)]))
            .expect("values");
        assert_eq!(values[&sym("k_1")], 0.5);
        assert_eq!(values[&sym("k_2")], DEFAULT_RATE_VALUE);
        assert!(
            model
                .rate_values(&BTreeMap::from([(sym("A"), 1.0)]))
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn system_size_comes_from_the_first_reactant_assignment() {
        let model = Model::parse("A -> B : k\nB -> C : k\nC -> A : k").expect("model");
        let reduced = model.substitute("A = N - B - C, C = M - B").expect("substitute");
        assert_eq!(reduced.system_size(), Some(&sym("N")));
        assert!(reduced.rates().contains(&sym("M")));

        let reduced = model.substitute("A = P + N - B - C").expect("substitute");
        assert_eq!(reduced.system_size(), Some(&sym("N")));
        assert!(reduced.rates().contains(&sym("P")));
    }

    #[test]
    fn state_variables_must_be_distinct_reactants() {
        let model = Model::parse("A -> B : k\nB -> C : k").expect("model");
        assert!(model.check_state_variables(&[sym("A"), sym("B")]).is_ok());
        assert!(model.check_state_variables(&[sym("A")]).is_err());
        assert!(model.check_state_variables(&[sym("A"), sym("A")]).is_err());
        assert!(model.check_state_variables(&[sym("A"), sym("k")]).is_err());
    }

    #[test]
    fn dot_output_styles_edges() {
        let model = Model::parse("A + B -> A + A : \\alpha").expect("model");
        let dot = model.to_dot();
        assert!(dot.starts_with("digraph Model {"));
        assert!(dot.contains(
            "\"B\" -> \"A\" [label=\"\\\\alpha\", arrowhead=normal, arrowtail=dot, dir=both];"
        ));
    }
}
