//! Boleto extraction service library
//!
//! Everything the binary wires together: the extraction routine, the bounded
//! worker pool, admission control, HTTP routes and the process supervisor.

pub mod admission;
pub mod config;
pub mod error;
pub mod extract;
pub mod pool;
pub mod routes;
pub mod state;
pub mod supervisor;
