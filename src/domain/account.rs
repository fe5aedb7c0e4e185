use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

/// Which column of a journal line an amount sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Debit => "debit",
            Side::Credit => "credit",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" | "dr" => Ok(Side::Debit),
            "credit" | "cr" => Ok(Side::Credit),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    /// Cash, bank, receivables, equipment - resources the business controls
    Asset,
    /// Payables, loans, taxes owed - obligations to others
    Liability,
    /// Owner's capital and retained earnings
    Equity,
    /// Sales, fees, interest earned
    Revenue,
    /// Rent, wages, supplies, cost of goods sold
    Expense,
}

impl AccountCategory {
    pub const ALL: [AccountCategory; 5] = [
        AccountCategory::Asset,
        AccountCategory::Liability,
        AccountCategory::Equity,
        AccountCategory::Revenue,
        AccountCategory::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountCategory::Asset => "asset",
            AccountCategory::Liability => "liability",
            AccountCategory::Equity => "equity",
            AccountCategory::Revenue => "revenue",
            AccountCategory::Expense => "expense",
        }
    }

    /// The side that increases an account of this category.
    /// Debits increase assets and expenses; credits increase the rest.
    pub fn normal_side(&self) -> Side {
        match self {
            AccountCategory::Asset | AccountCategory::Expense => Side::Debit,
            AccountCategory::Liability | AccountCategory::Equity | AccountCategory::Revenue => {
                Side::Credit
            }
        }
    }

    /// Returns true for categories reported on the balance sheet
    /// (as opposed to the income statement).
    pub fn is_balance_sheet(&self) -> bool {
        matches!(
            self,
            AccountCategory::Asset | AccountCategory::Liability | AccountCategory::Equity
        )
    }
}

impl FromStr for AccountCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(AccountCategory::Asset),
            "liability" => Ok(AccountCategory::Liability),
            "equity" => Ok(AccountCategory::Equity),
            "revenue" | "income" => Ok(AccountCategory::Revenue),
            "expense" => Ok(AccountCategory::Expense),
            other => Err(format!("unknown account category '{}'", other)),
        }
    }
}

impl std::fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// An entry in the chart of accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Short unique code, e.g. "1000" for cash
    pub code: String,
    pub name: String,
    pub category: AccountCategory,
    /// Balance carried in from before the books started, in the account's
    /// normal direction (positive = normal balance)
    pub opening_balance: Cents,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            category,
            opening_balance: 0,
            description: None,
            created_at: Utc::now(),
            archived_at: None,
        }
    }

    pub fn with_opening_balance(mut self, opening_balance: Cents) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.is_archived()
    }

    pub fn normal_side(&self) -> Side {
        self.category.normal_side()
    }

    /// "1000 Cash" style label for listings.
    pub fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in AccountCategory::ALL {
            let parsed: AccountCategory = category.as_str().parse().unwrap();
            assert_eq!(category, parsed);
        }
    }

    #[test]
    fn test_income_is_alias_for_revenue() {
        assert_eq!(
            "Income".parse::<AccountCategory>(),
            Ok(AccountCategory::Revenue)
        );
        assert!("wallet".parse::<AccountCategory>().is_err());
    }

    #[test]
    fn test_normal_sides() {
        assert_eq!(AccountCategory::Asset.normal_side(), Side::Debit);
        assert_eq!(AccountCategory::Expense.normal_side(), Side::Debit);
        assert_eq!(AccountCategory::Liability.normal_side(), Side::Credit);
        assert_eq!(AccountCategory::Equity.normal_side(), Side::Credit);
        assert_eq!(AccountCategory::Revenue.normal_side(), Side::Credit);
    }

    #[test]
    fn test_balance_sheet_categories() {
        assert!(AccountCategory::Asset.is_balance_sheet());
        assert!(AccountCategory::Liability.is_balance_sheet());
        assert!(AccountCategory::Equity.is_balance_sheet());
        assert!(!AccountCategory::Revenue.is_balance_sheet());
        assert!(!AccountCategory::Expense.is_balance_sheet());
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("DR".parse::<Side>(), Ok(Side::Debit));
        assert_eq!("credit".parse::<Side>(), Ok(Side::Credit));
        assert_eq!(Side::Debit.opposite(), Side::Credit);
        assert!("both".parse::<Side>().is_err());
    }

    #[test]
    fn test_new_account_is_active_with_zero_opening() {
        let account = Account::new("1000", "Cash", AccountCategory::Asset);
        assert!(account.is_active());
        assert_eq!(account.opening_balance, 0);
        assert_eq!(account.label(), "1000 Cash");
    }
}
