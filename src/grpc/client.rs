use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use crate::proto::calculator_client::CalculatorClient;
use crate::proto::{Empty, ExpressionRequest};

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ComputeError {
    /// The agent refused the expression (syntax or arithmetic failure).
    #[error("rejected by agent: {0}")]
    Rejected(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("agent unavailable: {0}")]
    Unavailable(String),
    #[error("agent error: {0}")]
    Internal(String),
}

impl From<Status> for ComputeError {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::InvalidArgument => ComputeError::Rejected(message),
            Code::DeadlineExceeded | Code::Cancelled => ComputeError::DeadlineExceeded,
            Code::Unavailable => ComputeError::Unavailable(message),
            _ => ComputeError::Internal(message),
        }
    }
}

/// What the job coordinator needs from the compute agent.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    async fn evaluate(
        &self,
        expression: &str,
        user_id: i64,
        timeout: Duration,
    ) -> Result<f64, ComputeError>;

    async fn ping(&self) -> Result<(), ComputeError>;
}

/// gRPC client over a single multiplexed channel; clones share it.
#[derive(Clone)]
pub struct GrpcComputeClient {
    inner: CalculatorClient<Channel>,
}

impl GrpcComputeClient {
    /// Builds the client without dialing; the first call connects.
    pub fn connect_lazy(addr: &str) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(addr.to_string())?
            .connect_timeout(Duration::from_secs(5))
            .connect_lazy();
        Ok(Self {
            inner: CalculatorClient::new(channel),
        })
    }
}

#[async_trait]
impl ComputeClient for GrpcComputeClient {
    async fn evaluate(
        &self,
        expression: &str,
        user_id: i64,
        timeout: Duration,
    ) -> Result<f64, ComputeError> {
        let mut request = Request::new(ExpressionRequest {
            expression: expression.to_string(),
            user_id,
        });
        request.set_timeout(timeout);

        let response = self.inner.clone().evaluate(request).await?.into_inner();
        if !response.error.is_empty() {
            return Err(ComputeError::Rejected(response.error));
        }
        Ok(response.result)
    }

    async fn ping(&self) -> Result<(), ComputeError> {
        let mut request = Request::new(Empty {});
        request.set_timeout(PING_TIMEOUT);
        let pong = self.inner.clone().ping(request).await?.into_inner();
        if pong.status == "OK" {
            Ok(())
        } else {
            Err(ComputeError::Internal(format!("unexpected ping status {:?}", pong.status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_compute_errors() {
        assert!(matches!(
            ComputeError::from(Status::invalid_argument("evaluation error: division by zero")),
            ComputeError::Rejected(msg) if msg.contains("division by zero")
        ));
        assert!(matches!(
            ComputeError::from(Status::deadline_exceeded("calculation timeout")),
            ComputeError::DeadlineExceeded
        ));
        assert!(matches!(
            ComputeError::from(Status::cancelled("Timeout expired")),
            ComputeError::DeadlineExceeded
        ));
        assert!(matches!(
            ComputeError::from(Status::unavailable("connection refused")),
            ComputeError::Unavailable(_)
        ));
        assert!(matches!(
            ComputeError::from(Status::internal("boom")),
            ComputeError::Internal(_)
        ));
    }

    #[test]
    fn invalid_address_is_rejected() {
        assert!(GrpcComputeClient::connect_lazy("not a uri").is_err());
    }

    #[tokio::test]
    async fn unreachable_agent_is_unavailable() {
        // Port 1 on loopback has nothing listening.
        let client = GrpcComputeClient::connect_lazy("http://127.0.0.1:1").unwrap();
        let err = client.ping().await.unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Unavailable(_) | ComputeError::DeadlineExceeded
        ));
    }
}
