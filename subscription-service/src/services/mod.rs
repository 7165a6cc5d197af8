pub mod collaborators;
pub mod database;
pub mod metrics;

pub use database::Database;
