//! Arithmetic expression evaluation.
//!
//! Expressions go through three stages: [`tokenize`], [`to_postfix`]
//! (shunting-yard) and [`eval_postfix`] over a value stack. Evaluation is pure
//! and single-threaded; the only outside input is a cancellation token.

mod eval;
mod postfix;
mod token;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use eval::{check_arity, eval_postfix};
pub use postfix::{to_postfix, PostfixToken};
pub use token::{tokenize, Operator, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("invalid character in expression: '{0}'")]
    InvalidCharacter(char),
    #[error("invalid expression structure")]
    InvalidExpression,
    #[error("division by zero")]
    DivisionByZero,
    #[error("calculation timeout")]
    Timeout,
}

/// Evaluates an infix expression.
///
/// A token that is already cancelled yields [`EvalError::Timeout`] before any
/// parsing happens.
pub fn evaluate(expr: &str, cancel: &CancellationToken) -> Result<f64, EvalError> {
    if cancel.is_cancelled() {
        return Err(EvalError::Timeout);
    }
    let tokens = tokenize(expr)?;
    let postfix = to_postfix(&tokens)?;
    eval_postfix(&postfix, cancel)
}

/// Checks that an expression is well formed without computing it.
///
/// Accepts exactly what [`evaluate`] would not reject as a character or
/// structure error; arithmetic failures such as division by zero only show up
/// during evaluation.
pub fn validate(expr: &str) -> Result<(), EvalError> {
    let tokens = tokenize(expr)?;
    let postfix = to_postfix(&tokens)?;
    check_arity(&postfix)
}
