use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{AccountId, Cents, Side};

pub type EntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Recorded but not yet affecting any balance
    Draft,
    /// Part of the books; immutable from here on
    Posted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(EntryStatus::Draft),
            "posted" => Ok(EntryStatus::Posted),
            other => Err(format!("unknown entry status '{}'", other)),
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One debit or credit against a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub side: Side,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn new(account_id: AccountId, side: Side, amount_cents: Cents) -> Self {
        Self {
            account_id,
            side,
            amount_cents,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// A journal entry: a dated set of lines whose debits equal their credits.
/// Posted entries are immutable - corrections are made via reversing entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    /// Monotonically increasing posting sequence, assigned by the repository
    /// when the entry is posted. Drafts have none.
    pub sequence: Option<i64>,
    /// Accounting date the entry belongs to
    pub date: NaiveDate,
    pub description: String,
    /// External reference (invoice number, receipt, bank statement line)
    pub reference: Option<String>,
    pub status: EntryStatus,
    pub lines: Vec<JournalLine>,
    /// If this entry reverses another one, points to the original
    pub reverses: Option<EntryId>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Create an empty draft entry.
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: None,
            date,
            description: description.into(),
            reference: None,
            status: EntryStatus::Draft,
            lines: Vec::new(),
            reverses: None,
            created_at: Utc::now(),
            posted_at: None,
        }
    }

    pub fn with_line(mut self, line: JournalLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn debit(self, account_id: AccountId, amount_cents: Cents) -> Self {
        self.with_line(JournalLine::new(account_id, Side::Debit, amount_cents))
    }

    pub fn credit(self, account_id: AccountId, amount_cents: Cents) -> Self {
        self.with_line(JournalLine::new(account_id, Side::Credit, amount_cents))
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_reverses(mut self, original_id: EntryId) -> Self {
        self.reverses = Some(original_id);
        self
    }

    pub fn total_debits(&self) -> Cents {
        self.side_total(Side::Debit)
    }

    pub fn total_credits(&self) -> Cents {
        self.side_total(Side::Credit)
    }

    fn side_total(&self, side: Side) -> Cents {
        self.lines
            .iter()
            .filter(|l| l.side == side)
            .map(|l| l.amount_cents)
            .sum()
    }

    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }

    /// Accounts touched by this entry, in line order, without duplicates.
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids = Vec::new();
        for line in &self.lines {
            if !ids.contains(&line.account_id) {
                ids.push(line.account_id);
            }
        }
        ids
    }

    /// Check the double-entry rules: two or more lines, positive amounts,
    /// and debits equal to credits.
    pub fn validate(&self) -> Result<(), EntryError> {
        if self.description.trim().is_empty() {
            return Err(EntryError::MissingDescription);
        }
        if self.lines.len() < 2 {
            return Err(EntryError::TooFewLines(self.lines.len()));
        }

        let mut debits: Cents = 0;
        let mut credits: Cents = 0;
        for (index, line) in self.lines.iter().enumerate() {
            if line.amount_cents <= 0 {
                return Err(EntryError::NonPositiveAmount {
                    line: index + 1,
                    amount: line.amount_cents,
                });
            }
            let total = match line.side {
                Side::Debit => &mut debits,
                Side::Credit => &mut credits,
            };
            *total = total
                .checked_add(line.amount_cents)
                .ok_or(EntryError::Overflow)?;
        }

        if debits != credits {
            return Err(EntryError::Unbalanced { debits, credits });
        }
        Ok(())
    }

    /// Create a draft that undoes this entry: every line's side is flipped.
    pub fn create_reversal(&self, date: NaiveDate) -> Self {
        let mut reversal = JournalEntry::new(date, format!("Reversal of: {}", self.description))
            .with_reverses(self.id);
        reversal.reference = self.reference.clone();
        reversal.lines = self
            .lines
            .iter()
            .map(|line| JournalLine {
                side: line.side.opposite(),
                ..line.clone()
            })
            .collect();
        reversal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("entry description must not be empty")]
    MissingDescription,

    #[error("an entry needs at least two lines, got {0}")]
    TooFewLines(usize),

    #[error("line {line} has a non-positive amount ({amount} cents)")]
    NonPositiveAmount { line: usize, amount: Cents },

    #[error("entry is unbalanced: debits {debits} cents, credits {credits} cents")]
    Unbalanced { debits: Cents, credits: Cents },

    #[error("entry totals overflow")]
    Overflow,
}
