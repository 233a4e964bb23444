//! Library exports for flashgate, shared between the binary and tests.

pub mod api;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
