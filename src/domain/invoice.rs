use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{AccountId, Cents, EntryId, JournalEntry};

pub type InvoiceId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Void)
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(InvoiceStatus::Draft),
            "issued" => Ok(InvoiceStatus::Issued),
            "paid" => Ok(InvoiceStatus::Paid),
            "void" => Ok(InvoiceStatus::Void),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: Cents,
}

impl InvoiceLine {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price_cents: Cents) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price_cents,
        }
    }

    pub fn total(&self) -> Cents {
        self.quantity * self.unit_price_cents
    }
}

/// A customer invoice. Issuing it books the receivable; paying it books the cash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub customer: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    pub status: InvoiceStatus,
    pub receivable_account: AccountId,
    pub revenue_account: AccountId,
    pub issue_entry: Option<EntryId>,
    pub payment_entry: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        number: impl Into<String>,
        customer: impl Into<String>,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        receivable_account: AccountId,
        revenue_account: AccountId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            customer: customer.into(),
            issue_date,
            due_date,
            lines: Vec::new(),
            status: InvoiceStatus::Draft,
            receivable_account,
            revenue_account,
            issue_entry: None,
            payment_entry: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_line(mut self, line: InvoiceLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn total(&self) -> Cents {
        self.lines.iter().map(InvoiceLine::total).sum()
    }

    /// Issued but unpaid past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Issued && today > self.due_date
    }

    pub fn validate(&self) -> Result<(), InvoiceError> {
        if self.number.trim().is_empty() {
            return Err(InvoiceError::MissingNumber);
        }
        if self.customer.trim().is_empty() {
            return Err(InvoiceError::MissingCustomer);
        }
        if self.lines.is_empty() {
            return Err(InvoiceError::NoLines);
        }
        let mut total: Cents = 0;
        for (index, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 || line.unit_price_cents < 0 {
                return Err(InvoiceError::InvalidLine(index + 1));
            }
            total = line
                .quantity
                .checked_mul(line.unit_price_cents)
                .and_then(|t| total.checked_add(t))
                .ok_or(InvoiceError::Overflow)?;
        }
        if total <= 0 {
            return Err(InvoiceError::ZeroTotal);
        }
        if self.due_date < self.issue_date {
            return Err(InvoiceError::DueBeforeIssue);
        }
        if self.receivable_account == self.revenue_account {
            return Err(InvoiceError::SameAccounts);
        }
        Ok(())
    }

    /// Entry booking the sale: Dr receivable, Cr revenue.
    pub fn issue_entry(&self, date: NaiveDate) -> JournalEntry {
        let total = self.total();
        JournalEntry::new(date, format!("Invoice {} to {}", self.number, self.customer))
            .with_reference(self.number.clone())
            .debit(self.receivable_account, total)
            .credit(self.revenue_account, total)
    }

    /// Entry booking the settlement: Dr cash, Cr receivable.
    pub fn payment_entry(&self, cash_account: AccountId, date: NaiveDate) -> JournalEntry {
        let total = self.total();
        JournalEntry::new(
            date,
            format!("Payment of invoice {} from {}", self.number, self.customer),
        )
        .with_reference(self.number.clone())
        .debit(cash_account, total)
        .credit(self.receivable_account, total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invoice number must not be empty")]
    MissingNumber,
    #[error("invoice customer must not be empty")]
    MissingCustomer,
    #[error("invoice has no lines")]
    NoLines,
    #[error("invoice line {0} needs a positive quantity and a non-negative price")]
    InvalidLine(usize),
    #[error("invoice total must be positive")]
    ZeroTotal,
    #[error("invoice total overflows")]
    Overflow,
    #[error("due date is before the issue date")]
    DueBeforeIssue,
    #[error("receivable and revenue accounts must differ")]
    SameAccounts,
}
