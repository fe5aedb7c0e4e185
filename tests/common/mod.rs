// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use tallybook::application::{LedgerService, NewEntry, NewLine};
use tallybook::domain::{AccountCategory, JournalEntry};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a YYYY-MM-DD string
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: a small business chart of accounts
pub struct StandardChart;

impl StandardChart {
    pub const CASH: &'static str = "1000";
    pub const BANK: &'static str = "1010";
    pub const RECEIVABLE: &'static str = "1200";
    pub const PAYABLE: &'static str = "2000";
    pub const CAPITAL: &'static str = "3000";
    pub const SALES: &'static str = "4000";
    pub const SERVICES: &'static str = "4100";
    pub const RENT: &'static str = "5000";
    pub const SUPPLIES: &'static str = "5100";

    /// Create the chart with zero opening balances
    pub async fn create(service: &LedgerService) -> Result<()> {
        let accounts = [
            (Self::CASH, "Cash", AccountCategory::Asset),
            (Self::BANK, "Bank", AccountCategory::Asset),
            (Self::RECEIVABLE, "Accounts Receivable", AccountCategory::Asset),
            (Self::PAYABLE, "Accounts Payable", AccountCategory::Liability),
            (Self::CAPITAL, "Owner's Capital", AccountCategory::Equity),
            (Self::SALES, "Sales", AccountCategory::Revenue),
            (Self::SERVICES, "Service Revenue", AccountCategory::Revenue),
            (Self::RENT, "Rent Expense", AccountCategory::Expense),
            (Self::SUPPLIES, "Office Supplies", AccountCategory::Expense),
        ];
        for (code, name, category) in accounts {
            service
                .create_account(code.into(), name.into(), category, 0, None)
                .await?;
        }
        Ok(())
    }

    /// Post a two-line entry debiting `debit` and crediting `credit`
    pub async fn post(
        service: &LedgerService,
        date: &str,
        description: &str,
        debit: &str,
        credit: &str,
        amount: i64,
    ) -> Result<JournalEntry> {
        let entry = service
            .record_entry(simple_entry(date, description, debit, credit, amount, true))
            .await?;
        Ok(entry)
    }

    /// Owner puts `amount` into the bank account
    pub async fn fund_bank(
        service: &LedgerService,
        amount: i64,
        date: &str,
    ) -> Result<JournalEntry> {
        Self::post(service, date, "Owner investment", Self::BANK, Self::CAPITAL, amount).await
    }
}

/// Build a two-line entry request
pub fn simple_entry(
    date: &str,
    description: &str,
    debit: &str,
    credit: &str,
    amount: i64,
    post: bool,
) -> NewEntry {
    NewEntry {
        date: parse_date(date),
        description: description.to_string(),
        reference: None,
        lines: vec![NewLine::debit(debit, amount), NewLine::credit(credit, amount)],
        post,
    }
}
