//! codehound - Iterative Code Retrieval
//!
//! Gathers the minimal relevant set of code elements needed to answer a
//! question about a repository: BM25 and vector indexes fused into one
//! ranking, a set of repository tools, and a multi-round controller that
//! lets a completion oracle decide what to search next and when to stop.

pub mod cli;
pub mod config;
pub mod controller;
pub mod elements;
pub mod embedding;
pub mod error;
pub mod oracle;
pub mod retrieval;
pub mod session;
pub mod tools;

pub use error::{HoundError, Result};
