use super::token::{Operator, Token};
use super::EvalError;

/// An element of a postfix (reverse Polish) sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostfixToken {
    Number(f64),
    Operator(Operator),
}

/// Entries of the shunting-yard operator stack.
#[derive(Debug, Clone, Copy)]
enum Stacked {
    Paren,
    Operator(Operator),
}

/// Reorders infix tokens into postfix with the shunting-yard algorithm.
///
/// Operators of equal precedence pop each other, which makes all of them
/// left-associative. Unbalanced parentheses in either direction are rejected.
pub fn to_postfix(tokens: &[Token]) -> Result<Vec<PostfixToken>, EvalError> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Stacked> = Vec::new();

    for token in tokens {
        match token {
            Token::Number { value, .. } => output.push(PostfixToken::Number(*value)),
            Token::LeftParen => stack.push(Stacked::Paren),
            Token::RightParen => loop {
                match stack.pop() {
                    Some(Stacked::Operator(op)) => output.push(PostfixToken::Operator(op)),
                    Some(Stacked::Paren) => break,
                    None => return Err(EvalError::InvalidExpression),
                }
            },
            Token::Operator(op) => {
                while let Some(Stacked::Operator(top)) = stack.last().copied() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(PostfixToken::Operator(top));
                    stack.pop();
                }
                stack.push(Stacked::Operator(*op));
            }
        }
    }

    while let Some(entry) = stack.pop() {
        match entry {
            Stacked::Operator(op) => output.push(PostfixToken::Operator(op)),
            Stacked::Paren => return Err(EvalError::InvalidExpression),
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::token::tokenize;

    fn postfix(expr: &str) -> Result<String, EvalError> {
        let tokens = tokenize(expr)?;
        let rendered = to_postfix(&tokens)?
            .into_iter()
            .map(|t| match t {
                PostfixToken::Number(v) => v.to_string(),
                PostfixToken::Operator(op) => op.symbol().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        Ok(rendered)
    }

    #[test]
    fn respects_precedence() {
        assert_eq!(postfix("2+3*4").unwrap(), "2 3 4 * +");
        assert_eq!(postfix("2*3+4").unwrap(), "2 3 * 4 +");
        assert_eq!(postfix("2*3^2").unwrap(), "2 3 2 ^ *");
    }

    #[test]
    fn equal_precedence_binds_left() {
        assert_eq!(postfix("8-3-2").unwrap(), "8 3 - 2 -");
        assert_eq!(postfix("2^3^2").unwrap(), "2 3 ^ 2 ^");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(postfix("(1+2)*(3+4)").unwrap(), "1 2 + 3 4 + *");
    }

    #[test]
    fn unmatched_parentheses_are_rejected() {
        assert_eq!(postfix("(1+2"), Err(EvalError::InvalidExpression));
        assert_eq!(postfix("1+2)"), Err(EvalError::InvalidExpression));
        assert_eq!(postfix(")("), Err(EvalError::InvalidExpression));
    }

    #[test]
    fn empty_parens_produce_nothing() {
        assert_eq!(postfix("()").unwrap(), "");
    }
}
