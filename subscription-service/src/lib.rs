//! Subscription billing engine: billing-period computation, invoice
//! generation policy, status derivation, and the processing tick that
//! ties them together.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod startup;
