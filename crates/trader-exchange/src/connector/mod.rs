//! 거래소 커넥터.

pub mod okx;

pub use okx::{OkxConfig, OkxConnector};
