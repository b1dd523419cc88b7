//! Expression parser over lexed tokens.
//!
//! Uses Chumsky. Precedence from loosest to tightest: sums, products (explicit `*` and `/`, or
//! juxtaposition as in `2k` and `k(A + B)`), unary signs, right-associative powers.

use chumsky::prelude::*;

use crate::error::{MumotError, Result};
use crate::expr::{Expr, Func, negate};
use crate::lexer::{Token, lex};

type Extra<'src> = extra::Err<Rich<'src, Token<'src>>>;

fn reciprocal(expr: Expr) -> Expr {
    Expr::Pow(Box::new(expr), Box::new(Expr::num(-1.0)))
}

fn raise((base, exponent): (Expr, Option<Expr>)) -> Expr {
    match exponent {
        Some(exponent) => Expr::Pow(Box::new(base), Box::new(exponent)),
        None => base,
    }
}

fn flatten((first, rest): (Expr, Vec<Expr>), join: fn(Vec<Expr>) -> Expr) -> Expr {
    if rest.is_empty() {
        return first;
    }
    join(std::iter::once(first).chain(rest).collect())
}

fn expression<'src>() -> impl Parser<'src, &'src [Token<'src>], Expr, Extra<'src>> + Clone {
    recursive(|expr| {
        let group = choice((
            expr.clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose)),
            expr.delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
        ));

        let call = any()
            .try_map(|token: Token<'src>, span| {
                token
                    .function()
                    .ok_or_else(|| Rich::custom(span, format!("{token} is not a function")))
            })
            .then(group.clone())
            .map(|(func, argument)| Expr::Call(func, Box::new(argument)));

        // Bare function names double as symbols; LaTeX function commands never do.
        let symbol = select! {
            Token::Ident(name) => Expr::sym(name),
            Token::Command(name) if Func::from_name(name.trim_start_matches('\\')).is_none() => {
                Expr::sym(name)
            }
        };

        let fraction = just(Token::Frac)
            .ignore_then(group.clone())
            .then(group.clone())
            .map(|(numerator, denominator)| Expr::Mul(vec![numerator, reciprocal(denominator)]));

        let primary = choice((
            select! { Token::Num(value) => Expr::num(value) },
            just(Token::Pi).to(Expr::Pi),
            fraction,
            call,
            symbol,
            group,
        ));

        let unary = recursive(|unary| {
            let power = primary
                .clone()
                .then(just(Token::Caret).ignore_then(unary.clone()).or_not())
                .map(raise);
            choice((
                just(Token::Minus).ignore_then(unary.clone()).map(negate),
                just(Token::Plus).ignore_then(unary),
                power,
            ))
        });
        let power = primary
            .then(just(Token::Caret).ignore_then(unary.clone()).or_not())
            .map(raise);

        let factor = choice((
            just(Token::Star).ignore_then(unary.clone()),
            just(Token::Slash).ignore_then(unary.clone()).map(reciprocal),
            power,
        ));
        let term = unary
            .then(factor.repeated().collect::<Vec<_>>())
            .map(|parts| flatten(parts, Expr::Mul));

        term.clone()
            .then(
                choice((
                    just(Token::Plus).ignore_then(term.clone()),
                    just(Token::Minus).ignore_then(term).map(negate),
                ))
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(|parts| flatten(parts, Expr::Add))
    })
}

/// Parse `source` into an unsimplified tree.
pub(crate) fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = lex(source)?;
    if tokens.is_empty() {
        return Err(MumotError::syntax(format!("empty expression '{source}'")));
    }
    expression()
        .then_ignore(end())
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| {
            let at = errors.first().map_or(tokens.len(), |err| err.span().start);
            match tokens.get(at) {
                Some(token) => {
                    MumotError::syntax(format!("unexpected {token} in expression '{source}'"))
                }
                None => MumotError::syntax(format!("unexpected end of expression '{source}'")),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(source: &str) -> Expr {
        parse_expression(source).unwrap_or_else(|err| panic!("{source}: {err}"))
    }

    #[test]
    fn products_bind_tighter_than_sums() {
        assert_eq!(
            raw("a + b*c"),
            Expr::Add(vec![
                Expr::sym("a"),
                Expr::Mul(vec![Expr::sym("b"), Expr::sym("c")]),
            ])
        );
    }

    #[test]
    fn powers_are_right_associative() {
        assert_eq!(
            raw("a^b^c"),
            Expr::Pow(
                Box::new(Expr::sym("a")),
                Box::new(Expr::Pow(Box::new(Expr::sym("b")), Box::new(Expr::sym("c")))),
            )
        );
    }

    #[test]
    fn function_names_call_only_before_a_group() {
        assert_eq!(
            raw("exp(x)"),
            Expr::Call(Func::Exp, Box::new(Expr::sym("x")))
        );
        assert_eq!(
            raw("\\sqrt{x}"),
            Expr::Call(Func::Sqrt, Box::new(Expr::sym("x")))
        );
        assert_eq!(raw("exp"), Expr::sym("exp"));
        assert!(parse_expression("\\sqrt").is_err());
    }

    #[test]
    fn errors_name_the_offending_token() {
        let message = parse_expression("a )").unwrap_err().to_string();
        assert!(message.contains("')'"), "{message}");
        for source in ["a +", "(a]", "\\frac{a}", "*a"] {
            let err = parse_expression(source).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Syntax, "{source}");
        }
    }
}
