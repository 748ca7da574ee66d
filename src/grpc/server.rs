use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;

use crate::config::AgentConfig;
use crate::grpc::calculator_service::CalculatorService;
use crate::proto::calculator_server::CalculatorServer;

pub struct AgentServer {
    eval_timeout: Duration,
}

impl AgentServer {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            eval_timeout: config.eval_timeout,
        }
    }

    /// Serves until `shutdown` is cancelled, then drains in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), tonic::transport::Error> {
        let service = CalculatorService::new(self.eval_timeout);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, eval_timeout = ?self.eval_timeout, "Starting gRPC agent");
        }

        Server::builder()
            .layer(TraceLayer::new_for_grpc())
            .add_service(CalculatorServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                shutdown.cancelled().await;
            })
            .await
    }
}
