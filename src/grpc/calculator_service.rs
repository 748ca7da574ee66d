use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::calculator::{self, EvalError};
use crate::proto::calculator_server::Calculator;
use crate::proto::{Empty, ExpressionRequest, ExpressionResponse, Pong};

/// Evaluates expressions on behalf of the front-end.
pub struct CalculatorService {
    eval_timeout: Duration,
}

impl CalculatorService {
    pub fn new(eval_timeout: Duration) -> Self {
        Self { eval_timeout }
    }

    /// The tighter of the server cap and the caller's own deadline.
    pub fn effective_deadline(&self, caller: Option<Duration>) -> Duration {
        caller.map_or(self.eval_timeout, |c| c.min(self.eval_timeout))
    }
}

/// Parses a `grpc-timeout` header value: up to eight digits followed by a unit.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let unit = value.chars().last()?;
    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        'H' => Duration::from_secs(amount * 3600),
        'M' => Duration::from_secs(amount * 60),
        'S' => Duration::from_secs(amount),
        'm' => Duration::from_millis(amount),
        'u' => Duration::from_micros(amount),
        'n' => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

fn caller_timeout<T>(request: &Request<T>) -> Option<Duration> {
    request
        .metadata()
        .get("grpc-timeout")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout)
}

fn eval_status(err: EvalError) -> Status {
    match err {
        EvalError::Timeout => Status::deadline_exceeded("calculation timeout"),
        other => Status::invalid_argument(format!("evaluation error: {other}")),
    }
}

/// Runs the evaluator on the blocking pool, cancelling it once `deadline`
/// elapses or the call itself is dropped.
async fn run_evaluation(expression: String, deadline: Duration) -> Result<f64, Status> {
    let cancel = CancellationToken::new();
    let _on_drop = cancel.clone().drop_guard();

    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel();
        })
    };

    let outcome =
        tokio::task::spawn_blocking(move || calculator::evaluate(&expression, &cancel)).await;
    timer.abort();

    match outcome {
        Ok(result) => result.map_err(eval_status),
        Err(e) => Err(Status::internal(format!("evaluation task failed: {e}"))),
    }
}

#[tonic::async_trait]
impl Calculator for CalculatorService {
    async fn evaluate(
        &self,
        request: Request<ExpressionRequest>,
    ) -> Result<Response<ExpressionResponse>, Status> {
        let deadline = self.effective_deadline(caller_timeout(&request));
        let req = request.into_inner();

        if req.expression.trim().is_empty() {
            warn!(user_id = req.user_id, "empty expression");
            return Err(Status::invalid_argument("expression cannot be empty"));
        }

        debug!(user_id = req.user_id, expression = %req.expression, ?deadline, "Evaluate");
        match run_evaluation(req.expression, deadline).await {
            Ok(result) => {
                info!(user_id = req.user_id, result, "Evaluate ok");
                Ok(Response::new(ExpressionResponse {
                    result,
                    error: String::new(),
                }))
            }
            Err(status) => {
                warn!(
                    user_id = req.user_id,
                    code = ?status.code(),
                    message = status.message(),
                    "Evaluate failed"
                );
                Err(status)
            }
        }
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<Pong>, Status> {
        Ok(Response::new(Pong {
            status: "OK".into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn grpc_timeout_units() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("30S"), Some(Duration::from_secs(30)));
        assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
        assert_eq!(parse_grpc_timeout("7u"), Some(Duration::from_micros(7)));
        assert_eq!(parse_grpc_timeout("9n"), Some(Duration::from_nanos(9)));
    }

    #[test]
    fn grpc_timeout_rejects_garbage() {
        for value in ["", "S", "10", "123456789S", "1x", "-1S", "1.5S"] {
            assert_eq!(parse_grpc_timeout(value), None, "{value:?}");
        }
    }

    #[test]
    fn deadline_is_the_minimum() {
        let service = CalculatorService::new(Duration::from_secs(15));
        assert_eq!(service.effective_deadline(None), Duration::from_secs(15));
        assert_eq!(
            service.effective_deadline(Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            service.effective_deadline(Some(Duration::from_secs(60))),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn caller_timeout_comes_from_metadata() {
        let mut request = Request::new(Empty {});
        assert_eq!(caller_timeout(&request), None);
        request
            .metadata_mut()
            .insert("grpc-timeout", "500m".parse().unwrap());
        assert_eq!(caller_timeout(&request), Some(Duration::from_millis(500)));
    }

    #[test]
    fn error_mapping() {
        assert_eq!(eval_status(EvalError::Timeout).code(), Code::DeadlineExceeded);
        assert_eq!(eval_status(EvalError::Timeout).message(), "calculation timeout");
        for err in [
            EvalError::InvalidCharacter('x'),
            EvalError::InvalidExpression,
            EvalError::DivisionByZero,
        ] {
            let status = eval_status(err);
            assert_eq!(status.code(), Code::InvalidArgument);
            assert!(status.message().contains(&err.to_string()));
        }
    }

    #[tokio::test]
    async fn zero_deadline_never_yields_a_wrong_result() {
        let status = run_evaluation("1+1".into(), Duration::ZERO).await;
        // The timer may or may not win against a trivial evaluation.
        match status {
            Ok(v) => assert_eq!(v, 2.0),
            Err(s) => assert_eq!(s.code(), Code::DeadlineExceeded),
        }
    }
}
