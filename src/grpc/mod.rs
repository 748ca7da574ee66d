//! Compute-RPC: the agent-side service and server, and the client the
//! front-end uses to reach them.

pub mod calculator_service;
pub mod client;
pub mod server;

pub use calculator_service::CalculatorService;
pub use client::{ComputeClient, ComputeError, GrpcComputeClient};
pub use server::AgentServer;
