use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    balance_from_activity, checked_total, AccountCategory, Cents, LedgerError, PeriodType,
};

use super::service::check_range;
use super::{AppError, LedgerService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account_code: String,
    pub account_name: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub revenue: Vec<AccountAmount>,
    pub expenses: Vec<AccountAmount>,
    pub total_revenue: Cents,
    pub total_expenses: Cents,
    pub net_income: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_revenue: Cents,
    pub total_expenses: Cents,
    pub net_income: Cents,
}

impl From<&IncomeStatement> for PeriodSummary {
    fn from(statement: &IncomeStatement) -> Self {
        Self {
            period_start: statement.from_date,
            period_end: statement.to_date,
            total_revenue: statement.total_revenue,
            total_expenses: statement.total_expenses,
            net_income: statement.net_income,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeComparison {
    pub period: PeriodType,
    pub current_period: PeriodSummary,
    pub previous_period: PeriodSummary,
    pub change: Cents,
    /// Change in net income relative to the previous period; 0 when the
    /// previous period had none
    pub change_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: Option<NaiveDate>,
    pub assets: Vec<AccountAmount>,
    pub liabilities: Vec<AccountAmount>,
    pub equity: Vec<AccountAmount>,
    pub total_assets: Cents,
    pub total_liabilities: Cents,
    pub total_equity: Cents,
    /// Revenue minus expenses not yet closed into equity
    pub current_earnings: Cents,
}

impl BalanceSheet {
    /// Assets = Liabilities + Equity + current earnings.
    pub fn is_balanced(&self) -> bool {
        let claims = self.total_liabilities as i128
            + self.total_equity as i128
            + self.current_earnings as i128;
        self.total_assets as i128 == claims
    }
}

impl LedgerService {
    /// Revenue and expenses posted within `[from, to]`. Opening balances are
    /// not activity and are left out.
    pub async fn income_statement(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<IncomeStatement, AppError> {
        check_range(Some(from), Some(to))?;
        let accounts = self.repo.list_accounts(true).await?;
        let activity = self.repo.account_activity(Some(from), Some(to)).await?;

        let mut revenue = Vec::new();
        let mut expenses = Vec::new();
        for account in &accounts {
            let Some(account_activity) = activity.get(&account.id) else {
                continue;
            };
            let amount = account_activity
                .net_for(account.category)
                .ok_or_else(|| LedgerError::BalanceOverflow(account.code.clone()))?;
            if amount == 0 {
                continue;
            }
            let row = AccountAmount {
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                amount,
            };
            match account.category {
                AccountCategory::Revenue => revenue.push(row),
                AccountCategory::Expense => expenses.push(row),
                _ => {}
            }
        }

        let total_revenue = checked_total(revenue.iter().map(|r| r.amount))
            .ok_or(LedgerError::TotalsOverflow("revenue"))?;
        let total_expenses = checked_total(expenses.iter().map(|r| r.amount))
            .ok_or(LedgerError::TotalsOverflow("expense"))?;
        let net_income = total_revenue
            .checked_sub(total_expenses)
            .ok_or(LedgerError::TotalsOverflow("income statement"))?;

        Ok(IncomeStatement {
            from_date: from,
            to_date: to,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_income,
        })
    }

    /// Net income of the period containing `date` against the period before it.
    pub async fn compare_income(
        &self,
        period: PeriodType,
        date: NaiveDate,
    ) -> Result<IncomeComparison, AppError> {
        let (current_start, current_end) = period.bounds(date);
        let (previous_start, previous_end) = period.previous(date);

        let current = self.income_statement(current_start, current_end).await?;
        let previous = self.income_statement(previous_start, previous_end).await?;

        let change = current
            .net_income
            .checked_sub(previous.net_income)
            .ok_or(LedgerError::TotalsOverflow("period comparison"))?;
        let change_percentage = if previous.net_income != 0 {
            (change as f64 / (previous.net_income as f64).abs()) * 100.0
        } else {
            0.0
        };

        Ok(IncomeComparison {
            period,
            current_period: PeriodSummary::from(&current),
            previous_period: PeriodSummary::from(&previous),
            change,
            change_percentage,
        })
    }

    /// Balances of balance-sheet accounts at the end of `as_of` (or now).
    pub async fn balance_sheet(&self, as_of: Option<NaiveDate>) -> Result<BalanceSheet, AppError> {
        let accounts = self.repo.list_accounts(true).await?;
        let activity = self.repo.account_activity(None, as_of).await?;

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        let mut current_earnings: Cents = 0;

        for account in &accounts {
            let account_activity = activity.get(&account.id).copied().unwrap_or_default();
            let balance = balance_from_activity(account, account_activity)?;
            if account.is_archived() && balance == 0 {
                continue;
            }
            let row = AccountAmount {
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                amount: balance,
            };
            match account.category {
                AccountCategory::Asset => assets.push(row),
                AccountCategory::Liability => liabilities.push(row),
                AccountCategory::Equity => equity.push(row),
                AccountCategory::Revenue => {
                    current_earnings = current_earnings
                        .checked_add(balance)
                        .ok_or(LedgerError::TotalsOverflow("earnings"))?;
                }
                AccountCategory::Expense => {
                    current_earnings = current_earnings
                        .checked_sub(balance)
                        .ok_or(LedgerError::TotalsOverflow("earnings"))?;
                }
            }
        }

        let total = |rows: &[AccountAmount]| {
            checked_total(rows.iter().map(|r| r.amount))
                .ok_or(LedgerError::TotalsOverflow("balance sheet"))
        };

        Ok(BalanceSheet {
            as_of,
            total_assets: total(&assets)?,
            total_liabilities: total(&liabilities)?,
            total_equity: total(&equity)?,
            assets,
            liabilities,
            equity,
            current_earnings,
        })
    }
}
