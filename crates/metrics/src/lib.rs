//! # SaaS Pulse Metrics Engine
//!
//! This crate turns a customer ledger into the monthly business metrics shown
//! on the dashboard: new customers, MRR, average ticket, churn and lifetime value.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** This crate has no knowledge of storage or presentation.
//!   It depends only on `core-types`.
//! - **Stateless Calculation:** The `MetricsEngine` takes an immutable snapshot
//!   of customer records and returns fresh values on every call. Nothing is cached.
//! - **Best Effort Input:** Loosely-typed rows go through `normalize_records`
//!   first, which repairs or drops bad fields and reports what it did.
//!
//! ## Public API
//!
//! - `MetricsEngine` / `ChurnPolicy`: the calculation logic and its one policy knob.
//! - `today`: the clock every "as of now" computation defaults to.
//! - `MonthlyMetric`, `LtvSummary`, `CustomerLtv`, `DashboardSummary`: the outputs.
//! - `YearMonth`: calendar-month arithmetic.
//! - `normalize_records`, `parse_date`, `parse_money`: input cleaning.
//! - `MetricsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod normalize;
pub mod period;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{ChurnPolicy, MetricsEngine, today};
pub use error::MetricsError;
pub use normalize::{
    NormalizationReport, NormalizedLedger, RawCustomerRecord, normalize_records, parse_date,
    parse_money,
};
pub use period::{YearMonth, months_between};
pub use report::{CustomerLtv, DashboardSummary, LtvSummary, MonthlyMetric};
