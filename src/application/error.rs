use thiserror::Error;

use crate::domain::{
    AccountCategory, Cents, EntryError, InvoiceError, InvoiceStatus, LedgerError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Account is archived: {0}")]
    AccountArchived(String),

    #[error("Account {code} still carries a balance of {balance} cents")]
    AccountHasBalance { code: String, balance: Cents },

    #[error("Account {code} must be a {expected} account")]
    WrongAccountCategory {
        code: String,
        expected: AccountCategory,
    },

    #[error("Account {code} is used by {count} draft line(s)")]
    AccountHasDrafts { code: String, count: i64 },

    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid journal entry: {0}")]
    InvalidEntry(#[from] EntryError),

    #[error("Journal entry already exists: {0}")]
    EntryAlreadyExists(String),

    #[error("Journal entry {0} is already posted")]
    EntryAlreadyPosted(String),

    #[error("Journal entry {0} is not posted")]
    EntryNotPosted(String),

    #[error("Journal entry {original} was already reversed by {reversal}")]
    EntryAlreadyReversed { original: String, reversal: String },

    #[error("Journal entry {0} is itself a reversal and cannot be reversed")]
    CannotReverseReversal(String),

    #[error("Ledger arithmetic failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Invoice already exists: {0}")]
    InvoiceAlreadyExists(String),

    #[error("Invalid invoice: {0}")]
    InvalidInvoice(#[from] InvoiceError),

    #[error("Cannot {action} invoice {number} while it is {status}")]
    InvalidInvoiceState {
        number: String,
        status: InvoiceStatus,
        action: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
