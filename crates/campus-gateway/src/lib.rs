pub mod client;

pub use client::{GatewayConfig, GatewayMessage, spawn};
