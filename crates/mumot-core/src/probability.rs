//! Rate-to-probability conversion for the agent simulator.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::{MumotError, Result};
use crate::expr::{Expr, Symbol};
use crate::model::Rule;

/// What an agent needs around it for a transition to be possible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    /// No interaction required.
    Spontaneous,
    /// Proportional to the share of neighbours in this state.
    Neighbor(Symbol),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOption {
    pub rate: Expr,
    /// Per-timestep probability once scaling has been applied.
    pub weight: f64,
    pub destination: Symbol,
}

/// Transition options of one reactant, grouped by trigger.
///
/// Iteration order is fixed: spontaneous options first, then neighbour triggers sorted by
/// reactant; within a trigger, rule order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilitySet {
    options: BTreeMap<Trigger, Vec<TransitionOption>>,
}

impl ProbabilitySet {
    fn new() -> Self {
        let mut options = BTreeMap::new();
        options.insert(Trigger::Spontaneous, Vec::new());
        Self { options }
    }

    fn push(&mut self, trigger: Trigger, option: TransitionOption) {
        self.options.entry(trigger).or_default().push(option);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Trigger, &[TransitionOption])> {
        self.options
            .iter()
            .map(|(trigger, options)| (trigger, options.as_slice()))
    }

    #[must_use]
    pub fn options(&self, trigger: &Trigger) -> &[TransitionOption] {
        self.options.get(trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn spontaneous_weight(&self) -> f64 {
        self.options(&Trigger::Spontaneous)
            .iter()
            .map(|o| o.weight)
            .sum()
    }

    /// Largest summed weight under any single neighbour trigger.
    #[must_use]
    pub fn max_neighbor_weight(&self) -> f64 {
        self.options
            .iter()
            .filter(|(trigger, _)| matches!(trigger, Trigger::Neighbor(_)))
            .map(|(_, options)| options.iter().map(|o| o.weight).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// Worst-case total transition probability: every neighbour in the heaviest trigger state.
    #[must_use]
    pub fn saturated_total(&self) -> f64 {
        self.spontaneous_weight() + self.max_neighbor_weight()
    }

    fn scale(&mut self, factor: f64) {
        for option in self.options.values_mut().flatten() {
            option.weight *= factor;
        }
    }
}

/// Probability sets for every reactant plus the scaling that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    sets: BTreeMap<Symbol, ProbabilitySet>,
    scaling: f64,
}

impl ProbabilityTable {
    #[must_use]
    pub fn get(&self, reactant: &Symbol) -> Option<&ProbabilitySet> {
        self.sets.get(reactant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &ProbabilitySet)> {
        self.sets.iter()
    }

    /// Effective scaling applied to every weight.
    #[must_use]
    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    #[must_use]
    pub fn max_saturated_total(&self) -> f64 {
        max_saturated_total(&self.sets)
    }

    /// Index-based view for the simulator; `reactants` fixes the index order.
    pub fn compile(&self, reactants: &[Symbol]) -> Result<TransitionTable> {
        let index_of = |symbol: &Symbol| {
            reactants.iter().position(|r| r == symbol).ok_or_else(|| {
                MumotError::config(format!("'{symbol}' is not a reactant of the simulation"))
            })
        };
        let mut options = Vec::with_capacity(reactants.len());
        for reactant in reactants {
            let mut compiled = Vec::new();
            if let Some(set) = self.sets.get(reactant) {
                for (trigger, group) in set.iter() {
                    let trigger = match trigger {
                        Trigger::Spontaneous => None,
                        Trigger::Neighbor(other) => Some(index_of(other)?),
                    };
                    for option in group {
                        compiled.push(IndexedOption {
                            trigger,
                            weight: option.weight,
                            destination: index_of(&option.destination)?,
                        });
                    }
                }
            }
            options.push(compiled);
        }
        Ok(TransitionTable { options })
    }
}

fn max_saturated_total(sets: &BTreeMap<Symbol, ProbabilitySet>) -> f64 {
    sets.values()
        .map(ProbabilitySet::saturated_total)
        .fold(0.0, f64::max)
}

/// Transition options keyed by raw weights, before any scaling.
///
/// Unary rules give spontaneous options. A binary rule gives the consumed reactant an option
/// triggered by the other lhs reactant; the destination is the first rhs slot that is neither
/// the other reactant nor already assigned within the same rule. A reactant that also appears
/// on the rhs of a binary rule (a catalyst) gets no option from that rule.
pub fn generate_probability_map(
    reactants: &BTreeSet<Symbol>,
    rules: &[Rule],
    rate_values: &BTreeMap<Symbol, f64>,
) -> Result<BTreeMap<Symbol, ProbabilitySet>> {
    let mut weights = Vec::with_capacity(rules.len());
    for rule in rules {
        if rule.arity() > 2 {
            return Err(MumotError::config(format!(
                "rule '{rule}' has more than two reactants; at most two per side are supported"
            )));
        }
        if let Some(missing) = rule.reactants().find(|r| !reactants.contains(*r)) {
            return Err(MumotError::config(format!(
                "rule '{rule}' uses '{missing}', which is no longer a reactant of the model"
            )));
        }
        let weight = rule.rate().eval(rate_values)?;
        if weight < 0.0 {
            return Err(MumotError::config(format!(
                "rate of rule '{rule}' evaluates to {weight}; rates must be non-negative"
            )));
        }
        weights.push(weight);
    }

    let mut sets = BTreeMap::new();
    for reactant in reactants {
        let mut set = ProbabilitySet::new();
        for (rule, &weight) in rules.iter().zip(&weights) {
            let mut assigned: Vec<&Symbol> = Vec::with_capacity(2);
            for lhs in rule.lhs().iter().filter(|lhs| *lhs == reactant) {
                match (rule.lhs(), rule.rhs()) {
                    ([_], [destination]) => set.push(
                        Trigger::Spontaneous,
                        TransitionOption {
                            rate: rule.rate().clone(),
                            weight,
                            destination: destination.clone(),
                        },
                    ),
                    ([a, b], [c, d]) => {
                        if rule.rhs().contains(lhs) {
                            debug!(reactant = %lhs, rule = %rule, "catalytic role not modelled; skipping");
                            continue;
                        }
                        let other = if a == lhs { b } else { a };
                        let destination = if assigned.contains(&c) || c == other { d } else { c };
                        assigned.push(destination);
                        set.push(
                            Trigger::Neighbor(other.clone()),
                            TransitionOption {
                                rate: rule.rate().clone(),
                                weight,
                                destination: destination.clone(),
                            },
                        );
                    }
                    _ => {}
                }
            }
        }
        sets.insert(reactant.clone(), set);
    }
    Ok(sets)
}

/// Largest scaling that keeps every reactant's saturated total at or below one.
#[must_use]
pub fn compute_scaling_factor(sets: &BTreeMap<Symbol, ProbabilitySet>) -> f64 {
    let worst = max_saturated_total(sets);
    if worst > 0.0 { 1.0 / worst } else { 1.0 }
}

/// Probability table with weights scaled by `min(user_scaling, 1 / worst-case total)`.
pub fn convert_rates_into_probabilities(
    reactants: &BTreeSet<Symbol>,
    rules: &[Rule],
    rate_values: &BTreeMap<Symbol, f64>,
    user_scaling: f64,
) -> Result<ProbabilityTable> {
    if !(user_scaling > 0.0) || !user_scaling.is_finite() {
        return Err(MumotError::config(format!(
            "scaling must be a positive number; got {user_scaling}"
        )));
    }
    let mut sets = generate_probability_map(reactants, rules, rate_values)?;
    let limit = compute_scaling_factor(&sets);
    let scaling = if user_scaling > limit {
        warn!(requested = user_scaling, limit, "scaling clamped so probabilities stay below one");
        limit
    } else {
        user_scaling
    };
    for set in sets.values_mut() {
        set.scale(scaling);
    }
    info!(scaling, "rates converted into probabilities");
    Ok(ProbabilityTable { sets, scaling })
}

/// One transition option in index form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedOption {
    /// `None` for spontaneous transitions.
    pub trigger: Option<usize>,
    pub weight: f64,
    pub destination: usize,
}

/// Index-based transition options per reactant, in the same order as the [`ProbabilitySet`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionTable {
    options: Vec<Vec<IndexedOption>>,
}

impl TransitionTable {
    #[must_use]
    pub fn options(&self, state: usize) -> &[IndexedOption] {
        self.options.get(state).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Inverse-CDF choice over `options` for the uniform draw `r`.
///
/// Spontaneous options contribute their weight; neighbour-triggered options contribute
/// `weight * neighbor_counts[trigger] / neighbor_total`, or nothing without neighbours.
/// Returns the first destination whose cumulative mass exceeds `r`.
#[must_use]
pub fn choose_transition(
    options: &[IndexedOption],
    neighbor_counts: &[usize],
    neighbor_total: usize,
    r: f64,
) -> Option<usize> {
    let mut cumulative = 0.0;
    for option in options {
        let share = match option.trigger {
            None => 1.0,
            Some(_) if neighbor_total == 0 => 0.0,
            Some(trigger) => {
                neighbor_counts.get(trigger).copied().unwrap_or(0) as f64 / neighbor_total as f64
            }
        };
        let mass = share * option.weight;
        if r < cumulative + mass {
            return Some(option.destination);
        }
        cumulative += mass;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn sym(name: &str) -> Symbol {
        Symbol::from(name)
    }

    fn table(description: &str, rates: &[(&str, f64)], scaling: f64) -> ProbabilityTable {
        let model = Model::parse(description).expect("model");
        let values = rates.iter().map(|&(k, v)| (sym(k), v)).collect();
        convert_rates_into_probabilities(model.reactants(), model.rules(), &values, scaling)
            .expect("table")
    }

    #[test]
    fn unary_rules_are_spontaneous() {
        let t = table("A -> B : k", &[("k", 0.25)], 1.0);
        let set = t.get(&sym("A")).expect("set");
        assert_eq!(set.options(&Trigger::Spontaneous).len(), 1);
        assert_eq!(set.options(&Trigger::Spontaneous)[0].destination, sym("B"));
        // 1 / 0.25 = 4 > 1, so the user scaling stands.
        assert_eq!(t.scaling(), 1.0);
        assert_eq!(set.spontaneous_weight(), 0.25);
    }

    #[test]
    fn scaling_is_clamped_to_keep_totals_below_one() {
        let t = table("A -> B : k_1\nA + B -> B + B : k_2", &[("k_1", 2.0), ("k_2", 6.0)], 1.0);
        assert!((t.scaling() - 1.0 / 8.0).abs() < 1e-12);
        assert!((t.max_saturated_total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn catalyst_gets_no_option() {
        let t = table("A + B -> A + A : k", &[("k", 0.5)], 1.0);
        let a = t.get(&sym("A")).expect("A");
        assert_eq!(a.iter().map(|(_, o)| o.len()).sum::<usize>(), 0);
        let b = t.get(&sym("B")).expect("B");
        let options = b.options(&Trigger::Neighbor(sym("A")));
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].destination, sym("A"));
    }

    #[test]
    fn destination_skips_the_other_reactant() {
        // B + A -> A + C: for B, the first rhs slot is the other reactant A, so B becomes C.
        let t = table("B + A -> A + C : k", &[("k", 0.5)], 1.0);
        let b = t.get(&sym("B")).expect("B");
        assert_eq!(b.options(&Trigger::Neighbor(sym("A")))[0].destination, sym("C"));
    }

    #[test]
    fn repeated_reactant_uses_distinct_slots() {
        let t = table("A + A -> B + C : k", &[("k", 0.1)], 1.0);
        let a = t.get(&sym("A")).expect("A");
        let destinations: Vec<_> = a
            .options(&Trigger::Neighbor(sym("A")))
            .iter()
            .map(|o| o.destination.clone())
            .collect();
        assert_eq!(destinations, vec![sym("B"), sym("C")]);
    }

    #[test]
    fn rejects_more_than_two_reactants_and_bad_rates() {
        let model = Model::parse("A + B + C -> C + C + C : k").expect("model");
        let values = BTreeMap::from([(sym("k"), 1.0)]);
        let err = generate_probability_map(model.reactants(), model.rules(), &values).unwrap_err();
        assert!(err.is_configuration());

        let model = Model::parse("A -> B : k").expect("model");
        let values = BTreeMap::from([(sym("k"), -1.0)]);
        assert!(
            generate_probability_map(model.reactants(), model.rules(), &values)
                .unwrap_err()
                .is_configuration()
        );
        assert!(
            generate_probability_map(model.reactants(), model.rules(), &BTreeMap::new())
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn inverse_cdf_walks_options_in_order() {
        let options = [
            IndexedOption { trigger: None, weight: 0.2, destination: 1 },
            IndexedOption { trigger: Some(2), weight: 0.6, destination: 2 },
        ];
        // Half the neighbours are in state 2: masses are 0.2 and 0.3.
        let counts = [1, 0, 1];
        assert_eq!(choose_transition(&options, &counts, 2, 0.1), Some(1));
        assert_eq!(choose_transition(&options, &counts, 2, 0.45), Some(2));
        assert_eq!(choose_transition(&options, &counts, 2, 0.5), None);
        assert_eq!(choose_transition(&options, &counts, 0, 0.3), None);
    }
}
