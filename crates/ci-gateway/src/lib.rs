//! CI Gateway
//!
//! Thin client for the Drone CI server. Every call goes through
//! [`CiGateway::send`], which returns either the decoded response or a
//! [`GatewayError`] describing the transport failure.

pub mod client;
pub mod drone;
pub mod error;

pub use client::{CiGateway, CiRequest, HttpGateway, Method, RemoteResponse};
pub use drone::{DroneEndpoints, RemoteBuild};
pub use error::{GatewayError, GatewayErrorKind};
