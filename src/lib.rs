//! Client for the ScalarWeb JSON-RPC API: pairing with the device, finding
//! out which method versions it supports and calling them.

pub mod auth;
pub mod capability;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod scalarweb;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use client::ScalarClient;
pub use error::{Result, ScalarError};
