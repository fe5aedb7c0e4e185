use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Account, AccountCategory, AccountId, Cents, EntryId, Side};

/// Posted debit and credit totals for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub debits: Cents,
    pub credits: Cents,
}

impl Activity {
    /// Net movement in the direction that increases an account of `category`.
    /// `None` when the difference does not fit in `Cents`.
    pub fn net_for(&self, category: AccountCategory) -> Option<Cents> {
        match category.normal_side() {
            Side::Debit => self.debits.checked_sub(self.credits),
            Side::Credit => self.credits.checked_sub(self.debits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("balance of account {0} is out of range")]
    BalanceOverflow(String),

    #[error("{0} totals are out of range")]
    TotalsOverflow(&'static str),
}

/// A posted journal line flattened with its entry header, the unit a ledger
/// statement is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedLine {
    pub entry_id: EntryId,
    pub sequence: i64,
    pub line_no: i64,
    pub date: NaiveDate,
    pub account_id: AccountId,
    pub side: Side,
    pub amount_cents: Cents,
    pub description: String,
    pub memo: Option<String>,
}

/// Signed effect of a line on an account's balance: positive when the line
/// sits on the category's normal side.
pub fn signed_amount(category: AccountCategory, side: Side, amount_cents: Cents) -> Cents {
    if side == category.normal_side() {
        amount_cents
    } else {
        -amount_cents
    }
}

fn apply_line(
    account: &Account,
    balance: Cents,
    side: Side,
    amount: Cents,
) -> Result<Cents, LedgerError> {
    balance
        .checked_add(signed_amount(account.category, side, amount))
        .ok_or_else(|| LedgerError::BalanceOverflow(account.code.clone()))
}

/// Sum of `values`, or `None` on overflow.
pub fn checked_total(values: impl IntoIterator<Item = Cents>) -> Option<Cents> {
    values
        .into_iter()
        .try_fold(0 as Cents, |total, value| total.checked_add(value))
}

/// Balance of `account` at the start of `start`: its opening balance plus every
/// posted line dated strictly before `start`.
pub fn opening_balance(
    account: &Account,
    lines: &[PostedLine],
    start: NaiveDate,
) -> Result<Cents, LedgerError> {
    lines
        .iter()
        .filter(|l| l.account_id == account.id && l.date < start)
        .try_fold(account.opening_balance, |balance, line| {
            apply_line(account, balance, line.side, line.amount_cents)
        })
}

/// Opening balance plus signed net activity.
pub fn balance_from_activity(account: &Account, activity: Activity) -> Result<Cents, LedgerError> {
    activity
        .net_for(account.category)
        .and_then(|net| account.opening_balance.checked_add(net))
        .ok_or_else(|| LedgerError::BalanceOverflow(account.code.clone()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub entry_id: EntryId,
    pub sequence: i64,
    pub description: String,
    pub memo: Option<String>,
    pub debit: Cents,
    pub credit: Cents,
    /// Running balance after this line
    pub balance: Cents,
}

/// Ledger view of one account over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub category: AccountCategory,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub opening_balance: Cents,
    pub lines: Vec<StatementLine>,
    pub total_debits: Cents,
    pub total_credits: Cents,
    pub closing_balance: Cents,
}

/// Build the running-balance ledger for `account` over `[from, to]`.
/// Either bound may be open. Lines for other accounts are ignored.
pub fn account_statement(
    account: &Account,
    lines: &[PostedLine],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<AccountStatement, LedgerError> {
    let opening = match from {
        Some(start) => opening_balance(account, lines, start)?,
        None => account.opening_balance,
    };

    let mut in_range: Vec<&PostedLine> = lines
        .iter()
        .filter(|l| l.account_id == account.id)
        .filter(|l| from.is_none_or(|start| l.date >= start))
        .filter(|l| to.is_none_or(|end| l.date <= end))
        .collect();
    in_range.sort_by_key(|l| (l.date, l.sequence, l.line_no));

    let mut balance = opening;
    let mut total_debits: Cents = 0;
    let mut total_credits: Cents = 0;
    let mut statement_lines = Vec::with_capacity(in_range.len());

    for line in in_range {
        balance = apply_line(account, balance, line.side, line.amount_cents)?;
        let (debit, credit) = match line.side {
            Side::Debit => (line.amount_cents, 0),
            Side::Credit => (0, line.amount_cents),
        };
        total_debits = total_debits
            .checked_add(debit)
            .ok_or(LedgerError::TotalsOverflow("statement"))?;
        total_credits = total_credits
            .checked_add(credit)
            .ok_or(LedgerError::TotalsOverflow("statement"))?;

        statement_lines.push(StatementLine {
            date: line.date,
            entry_id: line.entry_id,
            sequence: line.sequence,
            description: line.description.clone(),
            memo: line.memo.clone(),
            debit,
            credit,
            balance,
        });
    }

    Ok(AccountStatement {
        account_id: account.id,
        account_code: account.code.clone(),
        account_name: account.name.clone(),
        category: account.category,
        from,
        to,
        opening_balance: opening,
        lines: statement_lines,
        total_debits,
        total_credits,
        closing_balance: balance,
    })
}

/// Place a balance in the debit or credit column. A normal balance goes to the
/// category's normal side; an abnormal (negative) one goes to the other side.
/// `None` for `Cents::MIN`, which has no positive counterpart.
pub fn split_balance(category: AccountCategory, balance: Cents) -> Option<(Cents, Cents)> {
    let side = if balance >= 0 {
        category.normal_side()
    } else {
        category.normal_side().opposite()
    };
    let amount = balance.checked_abs()?;
    Some(match side {
        Side::Debit => (amount, 0),
        Side::Credit => (0, amount),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub category: AccountCategory,
    pub balance: Cents,
    pub debit: Cents,
    pub credit: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: Option<NaiveDate>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: Cents,
    pub total_credits: Cents,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }

    pub fn difference(&self) -> Cents {
        self.total_debits - self.total_credits
    }
}

/// Compute the trial balance from per-account posted activity up to `as_of`.
///
/// Every active account gets a row, even at zero. Archived accounts only
/// appear while they still carry a balance, so the columns keep summing equal.
pub fn trial_balance(
    accounts: &[Account],
    activity: &HashMap<AccountId, Activity>,
    as_of: Option<NaiveDate>,
) -> Result<TrialBalance, LedgerError> {
    let mut rows = Vec::with_capacity(accounts.len());
    for account in accounts {
        let account_activity = activity.get(&account.id).copied().unwrap_or_default();
        let balance = balance_from_activity(account, account_activity)?;
        if account.is_archived() && balance == 0 {
            continue;
        }
        let (debit, credit) = split_balance(account.category, balance)
            .ok_or_else(|| LedgerError::BalanceOverflow(account.code.clone()))?;
        rows.push(TrialBalanceRow {
            account_id: account.id,
            account_code: account.code.clone(),
            account_name: account.name.clone(),
            category: account.category,
            balance,
            debit,
            credit,
        });
    }
    rows.sort_by(|a, b| a.account_code.cmp(&b.account_code));

    let total_debits = checked_total(rows.iter().map(|r| r.debit))
        .ok_or(LedgerError::TotalsOverflow("trial balance"))?;
    let total_credits = checked_total(rows.iter().map(|r| r.credit))
        .ok_or(LedgerError::TotalsOverflow("trial balance"))?;

    Ok(TrialBalance {
        as_of,
        rows,
        total_debits,
        total_credits,
    })
}

/// Debit-normal opening balances minus credit-normal ones. Anything other than
/// zero means the opening balances alone already unbalance the trial balance.
pub fn opening_balance_difference(accounts: &[Account]) -> Result<Cents, LedgerError> {
    accounts.iter().try_fold(0 as Cents, |diff, account| {
        let signed = match account.normal_side() {
            Side::Debit => Some(account.opening_balance),
            Side::Credit => account.opening_balance.checked_neg(),
        };
        signed
            .and_then(|amount| diff.checked_add(amount))
            .ok_or(LedgerError::TotalsOverflow("opening balance"))
    })
}
