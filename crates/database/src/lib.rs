//! # SaaS Pulse Database Crate
//!
//! This crate owns everything about where the customer ledger lives. It is the
//! system's single durable store.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL and file formats are hidden behind the
//!   `CustomerRepository` trait. The metrics engine and the web layer only
//!   ever see validated `CustomerRecord`s.
//! - **Swappable Backends:** `PgCustomerRepository` is the production store;
//!   `InMemoryCustomerRepository` backs tests and dry runs.
//! - **Asynchronous & Pooled:** PostgreSQL access goes through a shared `PgPool`.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: Pool creation and embedded schema migrations.
//! - `CustomerRepository`: The storage contract.
//! - `read_raw_customers`, `write_customers`, `write_monthly_metrics`: CSV import/export.
//! - `DbError`: The specific error types that can be returned from this crate.

pub mod connection;
pub mod csv_io;
pub mod error;
pub mod memory;
pub mod repository;

pub use connection::{connect, run_migrations};
pub use csv_io::{read_raw_customers, write_customers, write_monthly_metrics};
pub use error::DbError;
pub use memory::InMemoryCustomerRepository;
pub use repository::{CustomerRepository, PgCustomerRepository};
