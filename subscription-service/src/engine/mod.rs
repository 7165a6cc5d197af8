//! Pure billing engine. Every function takes `today` explicitly so
//! behavior is reproducible in tests and backfills; nothing in here
//! reads the wall clock or touches storage.

pub mod cycle;
pub mod period;
pub mod policy;
pub mod processor;
pub mod status;
pub mod validate;

pub use cycle::{resolve_billing_cycle, BillingCycle};
pub use period::{compute_period, BillingPeriod};
pub use policy::{is_current_invoice_generated, proration_factor, should_generate_invoice};
pub use processor::{SubscriptionProcessor, SweepSummary, TickOutcome};
pub use status::{derive_status, StatusFacts};
