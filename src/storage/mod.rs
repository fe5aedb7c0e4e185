mod repository;

pub use repository::*;

/// SQL migration for the chart of accounts and the journal
pub const MIGRATION_001_LEDGER: &str = include_str!("migrations/001_ledger.sql");

/// SQL migration for customer invoices
pub const MIGRATION_002_INVOICES: &str = include_str!("migrations/002_invoices.sql");
