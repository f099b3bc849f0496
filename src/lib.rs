//! Memmer - membership and fee management for sports clubs
//!
//! This library holds the business rules (fees, family relations, SEPA
//! direct-debit tallies, invoices, statistics), the PostgreSQL storage layer
//! and the UI form build step used by the `memmer` command line tool.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use core::{compute_monthly_fee, compute_total_fee, PaymentInitiation, RelationGraph};
pub use models::{Amount, ClubSnapshot, Member, TrainingSession};
