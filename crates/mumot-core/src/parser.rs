//! Rule text → validated rules, via a small table-driven pushdown automaton.
//!
//! One rule per line: `A + B -> C + D : rate`. Reactant tokens must be single symbols; the
//! tail after `:` is read as one rate expression.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{MumotError, Result};
use crate::expr::{Expr, Symbol};
use crate::model::Rule;

/// Automaton state while reading one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseState {
    LhsReactant,
    LhsConnector,
    RhsReactant,
    RhsConnector,
    RateTail,
}

/// Lexical class of a whitespace-separated token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Plus,
    Arrow,
    Colon,
    Other,
}

impl TokenClass {
    #[must_use]
    pub fn of(token: &str) -> Self {
        match token {
            "+" => Self::Plus,
            "->" => Self::Arrow,
            ":" => Self::Colon,
            _ => Self::Other,
        }
    }
}

/// Side effect of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PushLhs,
    PushRhs,
    Connect,
    BeginRate,
    AppendRate,
}

use Action::{AppendRate, BeginRate, Connect, PushLhs, PushRhs};
use ParseState::{LhsConnector, LhsReactant, RateTail, RhsConnector, RhsReactant};

const TRANSITIONS: &[(ParseState, TokenClass, Action, ParseState)] = &[
    (LhsReactant, TokenClass::Other, PushLhs, LhsConnector),
    (LhsConnector, TokenClass::Plus, Connect, LhsReactant),
    (LhsConnector, TokenClass::Arrow, Connect, RhsReactant),
    (RhsReactant, TokenClass::Other, PushRhs, RhsConnector),
    (RhsConnector, TokenClass::Plus, Connect, RhsReactant),
    (RhsConnector, TokenClass::Colon, BeginRate, RateTail),
    (RateTail, TokenClass::Plus, AppendRate, RateTail),
    (RateTail, TokenClass::Arrow, AppendRate, RateTail),
    (RateTail, TokenClass::Colon, AppendRate, RateTail),
    (RateTail, TokenClass::Other, AppendRate, RateTail),
];

impl ParseState {
    /// Action and successor for `class`, or `None` when the token is not accepted here.
    #[must_use]
    pub fn transition(self, class: TokenClass) -> Option<(Action, ParseState)> {
        TRANSITIONS
            .iter()
            .find(|(state, accepted, _, _)| *state == self && *accepted == class)
            .map(|&(_, _, action, next)| (action, next))
    }

    /// Human-readable description of the accepted token set.
    #[must_use]
    pub const fn expected(self) -> &'static str {
        match self {
            Self::LhsReactant | Self::RhsReactant => "reactant",
            Self::LhsConnector => "'->' or '+'",
            Self::RhsConnector => "':' or '+'",
            Self::RateTail => "rate",
        }
    }
}

/// Output of [`parse_rules`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRules {
    pub reactants: BTreeSet<Symbol>,
    pub rates: BTreeSet<Symbol>,
    pub rules: Vec<Rule>,
}

/// Strip LaTeX dressing and split a description into candidate rule lines.
///
/// Dollar signs and `\\\\` markers are removed; lines are separated by real newlines or by
/// the two-character sequence `\n`. A trailing LaTeX line break (`\\`) is dropped.
#[must_use]
pub fn split_rule_lines(description: &str) -> Vec<String> {
    let cleaned = description.replace('$', "").replace(r"\\\\", "");
    cleaned
        .split(r"\n")
        .flat_map(str::lines)
        .map(|line| {
            let line = line.trim();
            line.strip_suffix(r"\\").unwrap_or(line).trim_end().to_owned()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn expected_error(state: ParseState, read: &str, rule: &str) -> MumotError {
    MumotError::syntax(format!(
        "Expected {} but read '{read}' in rule: {rule}",
        state.expected()
    ))
}

fn reactant_symbol(token: &str, rule: &str) -> Result<Symbol> {
    if token.contains('^') {
        return Err(MumotError::syntax(format!(
            "Reactants cannot contain '^': {token} in {rule}"
        )));
    }
    let non_singleton = || {
        MumotError::syntax(format!(
            "Non-singleton symbol set in token {token} in rule {rule}"
        ))
    };
    let expr = Expr::parse(token).map_err(|_| non_singleton())?;
    expr.as_symbol().cloned().ok_or_else(non_singleton)
}

fn with_rule_context(err: MumotError, rule: &str) -> MumotError {
    match err {
        MumotError::Syntax { message } => {
            MumotError::syntax(format!("{message} in rule: {rule}"))
        }
        other => other,
    }
}

/// Parse one non-empty rule line.
pub fn parse_rule(line: &str) -> Result<Rule> {
    let mut state = ParseState::LhsReactant;
    let mut lhs = Vec::with_capacity(2);
    let mut rhs = Vec::with_capacity(2);
    let mut balance: i64 = 0;
    let mut rate = String::new();

    for raw in line.split_whitespace() {
        let token = raw.replace(r"\\", r"\");
        let Some((action, next)) = state.transition(TokenClass::of(&token)) else {
            return Err(expected_error(state, &token, line));
        };
        match action {
            Action::PushLhs => {
                lhs.push(reactant_symbol(&token, line)?);
                balance += 1;
            }
            Action::PushRhs => {
                rhs.push(reactant_symbol(&token, line)?);
                balance -= 1;
            }
            Action::Connect | Action::BeginRate => {}
            Action::AppendRate => rate.push_str(&token),
        }
        state = next;
    }

    match state {
        ParseState::RhsConnector | ParseState::RateTail if balance != 0 => {
            Err(MumotError::syntax(format!(
                "Unequal number of reactants on lhs and rhs of rule {line}"
            )))
        }
        ParseState::RateTail if !rate.is_empty() => {
            let rate = Expr::parse(&rate).map_err(|err| with_rule_context(err, line))?;
            Rule::new(lhs, rhs, rate)
        }
        _ => Err(MumotError::syntax(format!(
            "Expected {} but reached end of rule: {line}",
            state.expected()
        ))),
    }
}

/// Parse a whole model description. Fails fast on the first bad rule.
///
/// A rule's rate symbols become rates unless they name a reactant seen so far, counting the
/// rule's own reactants. A symbol used as a rate before it appears as a reactant stays a rate.
pub fn parse_rules(description: &str) -> Result<ParsedRules> {
    let mut reactants = BTreeSet::new();
    let mut rates = BTreeSet::new();
    let mut rules = Vec::new();
    for line in split_rule_lines(description) {
        let rule = parse_rule(&line)?;
        debug!(rule = %rule, "parsed rule");
        reactants.extend(rule.lhs().iter().cloned());
        reactants.extend(rule.rhs().iter().cloned());
        rates.extend(
            rule.rate()
                .symbols()
                .into_iter()
                .filter(|symbol| !reactants.contains(symbol)),
        );
        rules.push(rule);
    }
    Ok(ParsedRules {
        reactants,
        rates,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn syntax_message(text: &str) -> String {
        match parse_rules(text) {
            Err(MumotError::Syntax { message }) => message,
            other => panic!("expected syntax error for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn transition_table_is_deterministic() {
        for state in [LhsReactant, LhsConnector, RhsReactant, RhsConnector, RateTail] {
            for class in [
                TokenClass::Plus,
                TokenClass::Arrow,
                TokenClass::Colon,
                TokenClass::Other,
            ] {
                let rows = TRANSITIONS
                    .iter()
                    .filter(|(s, c, _, _)| *s == state && *c == class)
                    .count();
                assert!(rows <= 1, "{state:?} x {class:?}");
            }
        }
        assert_eq!(
            LhsConnector.transition(TokenClass::Arrow),
            Some((Action::Connect, RhsReactant))
        );
        assert_eq!(LhsReactant.transition(TokenClass::Plus), None);
        assert_eq!(RhsConnector.transition(TokenClass::Arrow), None);
    }

    #[test]
    fn rate_tail_accepts_everything() {
        for class in [TokenClass::Plus, TokenClass::Arrow, TokenClass::Colon, TokenClass::Other] {
            assert_eq!(RateTail.transition(class), Some((Action::AppendRate, RateTail)));
        }
    }

    #[test]
    fn splits_on_escaped_and_real_newlines() {
        let lines = split_rule_lines("$A -> B : k_1$\\n  \nB -> A : k_2 \\\\\n");
        assert_eq!(lines, vec!["A -> B : k_1", "B -> A : k_2"]);
    }

    #[test]
    fn binary_rule_round_trip() {
        let parsed = parse_rules("A + B -> C + D : k").expect("parse");
        let names = |set: &BTreeSet<Symbol>| set.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(names(&parsed.reactants), vec!["A", "B", "C", "D"]);
        assert_eq!(names(&parsed.rates), vec!["k"]);
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].to_string(), "A + B -> C + D : k");
    }

    #[test]
    fn rate_tail_is_concatenated() {
        let parsed = parse_rules("A -> B : k_1 + 2 k_2").expect("parse");
        assert_eq!(*parsed.rules[0].rate(), Expr::parse("k_1 + 2*k_2").expect("expr"));
        assert_eq!(parsed.rates.len(), 2);
    }

    #[test]
    fn reports_unexpected_tokens() {
        assert_eq!(
            syntax_message("A B -> C : k"),
            "Expected '->' or '+' but read 'B' in rule: A B -> C : k"
        );
        assert_eq!(
            syntax_message("+ A -> B : k"),
            "Expected reactant but read '+' in rule: + A -> B : k"
        );
        assert_eq!(
            syntax_message("A -> B -> C : k"),
            "Expected ':' or '+' but read '->' in rule: A -> B -> C : k"
        );
    }

    #[test]
    fn rejects_unbalanced_and_malformed_reactants() {
        assert_eq!(
            syntax_message("A -> B + C : k"),
            "Unequal number of reactants on lhs and rhs of rule A -> B + C : k"
        );
        assert_eq!(
            syntax_message("A^2 -> B : k"),
            "Reactants cannot contain '^': A^2 in A^2 -> B : k"
        );
        assert_eq!(
            syntax_message("A*B -> C : k"),
            "Non-singleton symbol set in token A*B in rule A*B -> C : k"
        );
        assert!(syntax_message("A -> B").contains("reached end of rule"));
        assert!(syntax_message("A -> B :").contains("reached end of rule"));
    }

    #[test]
    fn bad_rate_expression_is_a_syntax_error() {
        let err = parse_rules("A -> B : k +").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert!(err.to_string().ends_with("in rule: A -> B : k +"), "{err}");
    }

    #[test]
    fn reactants_are_not_rates() {
        let parsed = parse_rules("A + B -> B + B : k*A").expect("parse");
        assert_eq!(parsed.rates.len(), 1);
        assert!(parsed.rates.contains(&Symbol::from("k")));
    }
}
