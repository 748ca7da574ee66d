pub mod app;
pub mod auth;
pub mod calculator;
pub mod config;
pub mod db;
pub mod error;
pub mod expressions;
pub mod grpc;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod telemetry;

// Generated protobuf types for the compute agent.
pub mod proto {
    tonic::include_proto!("calculator");
}
