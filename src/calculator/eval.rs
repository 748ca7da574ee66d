use tokio_util::sync::CancellationToken;

use super::postfix::PostfixToken;
use super::token::Operator;
use super::EvalError;

/// Exponent loops check for cancellation once per this many multiplications.
const CANCEL_POLL_INTERVAL: u64 = 1 << 16;

/// Runs a postfix sequence over a value stack.
///
/// The cancellation token is polled before every step, so a deadline that
/// fires mid-evaluation surfaces as [`EvalError::Timeout`].
pub fn eval_postfix(
    postfix: &[PostfixToken],
    cancel: &CancellationToken,
) -> Result<f64, EvalError> {
    let mut stack: Vec<f64> = Vec::with_capacity(postfix.len());

    for token in postfix {
        if cancel.is_cancelled() {
            return Err(EvalError::Timeout);
        }
        match *token {
            PostfixToken::Number(value) => stack.push(value),
            PostfixToken::Operator(op) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    return Err(EvalError::InvalidExpression);
                };
                stack.push(apply(op, a, b, cancel)?);
            }
        }
    }

    match stack.as_slice() {
        [value] => Ok(*value),
        _ => Err(EvalError::InvalidExpression),
    }
}

/// Walks a postfix sequence counting operands only, without computing values.
pub fn check_arity(postfix: &[PostfixToken]) -> Result<(), EvalError> {
    let mut depth = 0usize;
    for token in postfix {
        match token {
            PostfixToken::Number(_) => depth += 1,
            PostfixToken::Operator(_) if depth < 2 => return Err(EvalError::InvalidExpression),
            PostfixToken::Operator(_) => depth -= 1,
        }
    }
    if depth == 1 {
        Ok(())
    } else {
        Err(EvalError::InvalidExpression)
    }
}

fn apply(op: Operator, a: f64, b: f64, cancel: &CancellationToken) -> Result<f64, EvalError> {
    match op {
        Operator::Add => Ok(a + b),
        Operator::Sub => Ok(a - b),
        Operator::Mul => Ok(a * b),
        Operator::Div if b == 0.0 => Err(EvalError::DivisionByZero),
        Operator::Div => Ok(a / b),
        Operator::Pow => power(a, b, cancel),
    }
}

/// `base` multiplied by itself `trunc(exponent)` times, starting from 1.
///
/// Negative, zero and NaN exponents give 1. The result is bit-identical to the
/// plain multiplication loop; once the accumulator is zero, infinite or the
/// base is ±1, the remaining iterations can only flip the sign, so they are
/// folded into a parity check.
fn power(base: f64, exponent: f64, cancel: &CancellationToken) -> Result<f64, EvalError> {
    // Saturating cast: negatives and NaN become 0, huge values u64::MAX.
    let count = exponent.trunc() as u64;
    let mut acc = 1.0_f64;

    for i in 0..count {
        if i % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(EvalError::Timeout);
        }
        acc *= base;

        if acc.is_nan() {
            return Ok(acc);
        }
        if acc == 0.0 || acc.is_infinite() || base.abs() == 1.0 {
            let remaining = count - i - 1;
            if base.is_sign_negative() && remaining % 2 == 1 {
                acc = -acc;
            }
            return Ok(acc);
        }
    }

    Ok(acc)
}
