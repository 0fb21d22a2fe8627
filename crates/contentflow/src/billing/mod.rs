//! Cost metering: operation prices, balance checks and the agency ledger.

pub mod meter;
pub mod pricing;

pub use meter::{CostMeter, LedgerEntry};
pub use pricing::{Operation, PricingTable};
