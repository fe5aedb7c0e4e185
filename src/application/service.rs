use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::domain::{
    account_statement, balance_from_activity, build_integrity_report, opening_balance_difference,
    trial_balance, Account, AccountCategory, AccountId, AccountStatement, Cents, EntryId,
    EntryStatus, IntegrityReport, Invoice, InvoiceLine, InvoiceStatus, JournalEntry, JournalLine,
    Side, TrialBalance,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations for the books.
/// This is the primary interface for any client (CLI, importers, tests).
pub struct LedgerService {
    pub(super) repo: Repository,
}

/// One line of a journal entry as a client describes it.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub account_code: String,
    pub side: Side,
    pub amount_cents: Cents,
    pub memo: Option<String>,
}

impl NewLine {
    pub fn debit(account_code: impl Into<String>, amount_cents: Cents) -> Self {
        Self {
            account_code: account_code.into(),
            side: Side::Debit,
            amount_cents,
            memo: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount_cents: Cents) -> Self {
        Self {
            account_code: account_code.into(),
            side: Side::Credit,
            amount_cents,
            memo: None,
        }
    }
}

/// A journal entry as a client describes it, with account codes.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<NewLine>,
    /// Post immediately instead of leaving a draft
    pub post: bool,
}

/// Detailed entry information
pub struct EntryInfo {
    pub entry: JournalEntry,
    /// Account id -> "code name"
    pub account_labels: HashMap<AccountId, String>,
    pub reversed_by: Option<JournalEntry>,
}

/// Result of reversing an entry
pub struct ReversalResult {
    pub original: JournalEntry,
    pub reversal: JournalEntry,
}

/// Balance entry for an account
pub struct BalanceEntry {
    pub account: Account,
    pub balance: Cents,
}

/// Filter for querying journal entries
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub account: Option<String>,
    pub status: Option<EntryStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Invoice as a client describes it, with account codes.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub number: String,
    pub customer: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub receivable_account: String,
    pub revenue_account: String,
    pub lines: Vec<InvoiceLine>,
}

/// Result of an invoice transition that booked an entry
pub struct InvoiceResult {
    pub invoice: Invoice,
    pub entry: Option<JournalEntry>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        info!(database = database_path, "database initialized");
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Add an account to the chart of accounts.
    pub async fn create_account(
        &self,
        code: String,
        name: String,
        category: AccountCategory,
        opening_balance: Cents,
        description: Option<String>,
    ) -> Result<Account, AppError> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(AppError::InvalidAccount("code must not be empty".to_string()));
        }
        if name.trim().is_empty() {
            return Err(AppError::InvalidAccount("name must not be empty".to_string()));
        }
        if self.repo.get_account_by_code(&code).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(code));
        }

        let mut account = Account::new(code, name, category).with_opening_balance(opening_balance);
        if let Some(desc) = description {
            account = account.with_description(desc);
        }

        self.repo.save_account(&account).await?;
        info!(code = %account.code, category = %account.category, "account created");
        Ok(account)
    }

    /// Get an account by code.
    pub async fn get_account(&self, code: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_code(code)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(code.to_string()))
    }

    pub async fn get_account_by_id(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    async fn get_active_account(&self, code: &str) -> Result<Account, AppError> {
        let account = self.get_account(code).await?;
        if account.is_archived() {
            return Err(AppError::AccountArchived(code.to_string()));
        }
        Ok(account)
    }

    async fn get_account_of_category(
        &self,
        code: &str,
        expected: AccountCategory,
    ) -> Result<Account, AppError> {
        let account = self.get_active_account(code).await?;
        if account.category != expected {
            return Err(AppError::WrongAccountCategory {
                code: code.to_string(),
                expected,
            });
        }
        Ok(account)
    }

    /// List accounts ordered by code.
    pub async fn list_accounts(&self, include_archived: bool) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts(include_archived).await?)
    }

    /// Change the balance an account carries in from before the books started.
    pub async fn set_opening_balance(
        &self,
        code: &str,
        opening_balance: Cents,
    ) -> Result<Account, AppError> {
        let mut account = self.get_active_account(code).await?;
        account.opening_balance = opening_balance;
        self.repo.update_account(&account).await?;
        info!(code, opening_balance, "opening balance updated");
        Ok(account)
    }

    /// Archive an account. Only allowed once it is empty and unused by drafts,
    /// so archiving never changes a trial balance.
    pub async fn archive_account(&self, code: &str) -> Result<Account, AppError> {
        let mut account = self.get_active_account(code).await?;

        let balance = self.current_balance(&account).await?;
        if balance != 0 {
            return Err(AppError::AccountHasBalance {
                code: code.to_string(),
                balance,
            });
        }

        let drafts = self.repo.count_draft_lines_for_account(account.id).await?;
        if drafts > 0 {
            return Err(AppError::AccountHasDrafts {
                code: code.to_string(),
                count: drafts,
            });
        }

        account.archived_at = Some(self.repo.archive_account(account.id).await?);
        info!(code, "account archived");
        Ok(account)
    }

    async fn current_balance(&self, account: &Account) -> Result<Cents, AppError> {
        let lines = self.repo.posted_lines_for_account(account.id, None).await?;
        let statement = account_statement(account, &lines, None, None)?;
        Ok(statement.closing_balance)
    }

    /// Balance of one account at the end of `as_of` (or now).
    pub async fn get_balance(
        &self,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<BalanceEntry, AppError> {
        let account = self.get_account(code).await?;
        let lines = self.repo.posted_lines_for_account(account.id, as_of).await?;
        let balance = account_statement(&account, &lines, None, as_of)?.closing_balance;
        Ok(BalanceEntry { account, balance })
    }

    /// Balances of all active accounts at the end of `as_of` (or now).
    pub async fn get_all_balances(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<Vec<BalanceEntry>, AppError> {
        let accounts = self.repo.list_accounts(false).await?;
        let activity = self.repo.account_activity(None, as_of).await?;

        accounts
            .into_iter()
            .map(|account| -> Result<BalanceEntry, AppError> {
                let account_activity = activity.get(&account.id).copied().unwrap_or_default();
                let balance = balance_from_activity(&account, account_activity)?;
                Ok(BalanceEntry { account, balance })
            })
            .collect()
    }

    /// Map of account ids to "code name" labels (useful for display).
    pub async fn account_labels(&self) -> Result<HashMap<AccountId, String>, AppError> {
        let accounts = self.repo.list_accounts(true).await?;
        Ok(accounts.into_iter().map(|a| (a.id, a.label())).collect())
    }

    // ========================
    // Journal operations
    // ========================

    /// Record a journal entry, as a draft or posted straight away.
    pub async fn record_entry(&self, new_entry: NewEntry) -> Result<JournalEntry, AppError> {
        let mut entry = JournalEntry::new(new_entry.date, new_entry.description);
        if let Some(reference) = new_entry.reference {
            entry = entry.with_reference(reference);
        }

        for line in new_entry.lines {
            let account = self.get_active_account(&line.account_code).await?;
            let mut journal_line = JournalLine::new(account.id, line.side, line.amount_cents);
            journal_line.memo = line.memo;
            entry = entry.with_line(journal_line);
        }

        entry.validate()?;

        if new_entry.post {
            entry.status = EntryStatus::Posted;
        }
        self.repo.save_entry(&mut entry).await?;

        info!(
            entry_id = %entry.id,
            status = %entry.status,
            amount = entry.total_debits(),
            "journal entry recorded"
        );
        Ok(entry)
    }

    async fn load_entry(&self, id: EntryId) -> Result<JournalEntry, AppError> {
        self.repo
            .get_entry(id)
            .await?
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }

    async fn ensure_accounts_active(&self, entry: &JournalEntry) -> Result<(), AppError> {
        for account_id in entry.account_ids() {
            let account = self.get_account_by_id(account_id).await?;
            if account.is_archived() {
                return Err(AppError::AccountArchived(account.code));
            }
        }
        Ok(())
    }

    /// Post a draft, making it part of the books.
    pub async fn post_entry(&self, id: EntryId) -> Result<JournalEntry, AppError> {
        let mut entry = self.load_entry(id).await?;
        if entry.is_posted() {
            return Err(AppError::EntryAlreadyPosted(id.to_string()));
        }
        entry.validate()?;
        self.ensure_accounts_active(&entry).await?;

        self.repo.mark_posted(&mut entry).await?;
        info!(entry_id = %entry.id, sequence = ?entry.sequence, "journal entry posted");
        Ok(entry)
    }

    /// Delete a draft. Posted entries can only be reversed.
    pub async fn delete_draft(&self, id: EntryId) -> Result<JournalEntry, AppError> {
        let entry = self.load_entry(id).await?;
        if entry.is_posted() {
            return Err(AppError::EntryAlreadyPosted(id.to_string()));
        }
        if !self.repo.delete_draft(id).await? {
            return Err(AppError::EntryNotFound(id.to_string()));
        }
        info!(entry_id = %id, "draft deleted");
        Ok(entry)
    }

    /// Reverse a posted entry with a new posted entry that flips every line.
    /// Defaults to the original entry's date.
    pub async fn reverse_entry(
        &self,
        id: EntryId,
        date: Option<NaiveDate>,
    ) -> Result<ReversalResult, AppError> {
        let original = self.load_entry(id).await?;
        if !original.is_posted() {
            return Err(AppError::EntryNotPosted(id.to_string()));
        }
        if original.is_reversal() {
            return Err(AppError::CannotReverseReversal(id.to_string()));
        }
        if let Some(existing) = self.repo.find_reversal_of(id).await? {
            return Err(AppError::EntryAlreadyReversed {
                original: id.to_string(),
                reversal: existing.id.to_string(),
            });
        }

        self.ensure_accounts_active(&original).await?;

        let mut reversal = original.create_reversal(date.unwrap_or(original.date));
        reversal.status = EntryStatus::Posted;
        self.repo.save_entry(&mut reversal).await?;

        info!(original = %id, reversal = %reversal.id, "journal entry reversed");
        Ok(ReversalResult { original, reversal })
    }

    /// Get detailed entry information.
    pub async fn get_entry_info(&self, id: EntryId) -> Result<EntryInfo, AppError> {
        let entry = self.load_entry(id).await?;
        let account_labels = self.account_labels().await?;
        let reversed_by = self.repo.find_reversal_of(id).await?;

        Ok(EntryInfo {
            entry,
            account_labels,
            reversed_by,
        })
    }

    /// List entries with filters, newest first.
    pub async fn list_entries(&self, filter: EntryFilter) -> Result<Vec<JournalEntry>, AppError> {
        check_range(filter.from_date, filter.to_date)?;
        let account_id = match &filter.account {
            Some(code) => Some(self.get_account(code).await?.id),
            None => None,
        };

        Ok(self
            .repo
            .list_entries_filtered(
                account_id,
                filter.status,
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    /// Every entry, drafts included, in posting order.
    pub async fn list_all_entries(&self) -> Result<Vec<JournalEntry>, AppError> {
        Ok(self.repo.list_all_entries().await?)
    }

    // ========================
    // Ledger operations
    // ========================

    /// Running-balance ledger of one account over `[from, to]`.
    pub async fn account_statement(
        &self,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<AccountStatement, AppError> {
        check_range(from, to)?;
        let account = self.get_account(code).await?;
        let lines = self.repo.posted_lines_for_account(account.id, to).await?;
        Ok(account_statement(&account, &lines, from, to)?)
    }

    /// Trial balance at the end of `as_of` (or over everything posted).
    pub async fn trial_balance(&self, as_of: Option<NaiveDate>) -> Result<TrialBalance, AppError> {
        let accounts = self.repo.list_accounts(true).await?;
        let activity = self.repo.account_activity(None, as_of).await?;
        Ok(trial_balance(&accounts, &activity, as_of)?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let accounts = self.repo.list_accounts(true).await?;
        let tb = self.trial_balance(None).await?;

        let report = build_integrity_report(stats, opening_balance_difference(&accounts)?, tb);
        for issue in &report.issues {
            warn!(%issue, "integrity issue");
        }
        Ok(report)
    }

    // ========================
    // Invoice operations
    // ========================

    /// Create a draft invoice. Nothing is booked until it is issued.
    pub async fn create_invoice(&self, new_invoice: NewInvoice) -> Result<Invoice, AppError> {
        if self
            .repo
            .get_invoice_by_number(&new_invoice.number)
            .await?
            .is_some()
        {
            return Err(AppError::InvoiceAlreadyExists(new_invoice.number));
        }

        let receivable = self
            .get_account_of_category(&new_invoice.receivable_account, AccountCategory::Asset)
            .await?;
        let revenue = self
            .get_account_of_category(&new_invoice.revenue_account, AccountCategory::Revenue)
            .await?;

        let mut invoice = Invoice::new(
            new_invoice.number,
            new_invoice.customer,
            new_invoice.issue_date,
            new_invoice.due_date,
            receivable.id,
            revenue.id,
        );
        for line in new_invoice.lines {
            invoice = invoice.with_line(line);
        }
        invoice.validate()?;

        self.repo.save_invoice(&invoice).await?;
        info!(number = %invoice.number, total = invoice.total(), "invoice created");
        Ok(invoice)
    }

    pub async fn get_invoice(&self, number: &str) -> Result<Invoice, AppError> {
        self.repo
            .get_invoice_by_number(number)
            .await?
            .ok_or_else(|| AppError::InvoiceNotFound(number.to_string()))
    }

    pub async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, AppError> {
        Ok(self.repo.list_invoices(status).await?)
    }

    /// Issue a draft invoice, posting Dr receivable / Cr revenue.
    /// Defaults to the invoice's issue date.
    pub async fn issue_invoice(
        &self,
        number: &str,
        date: Option<NaiveDate>,
    ) -> Result<InvoiceResult, AppError> {
        let mut invoice = self.get_invoice(number).await?;
        require_status(&invoice, InvoiceStatus::Draft, "issue")?;

        let mut entry = invoice.issue_entry(date.unwrap_or(invoice.issue_date));
        entry.validate()?;
        self.ensure_accounts_active(&entry).await?;
        entry.status = EntryStatus::Posted;

        invoice.status = InvoiceStatus::Issued;
        invoice.issue_entry = Some(entry.id);
        self.repo
            .save_invoice_transition(&invoice, Some(&mut entry))
            .await?;

        info!(number, entry_id = %entry.id, "invoice issued");
        Ok(InvoiceResult {
            invoice,
            entry: Some(entry),
        })
    }

    /// Record full payment of an issued invoice into an asset account,
    /// posting Dr cash / Cr receivable. Defaults to today.
    pub async fn record_payment(
        &self,
        number: &str,
        cash_account: &str,
        date: Option<NaiveDate>,
    ) -> Result<InvoiceResult, AppError> {
        let mut invoice = self.get_invoice(number).await?;
        require_status(&invoice, InvoiceStatus::Issued, "pay")?;
        let cash = self
            .get_account_of_category(cash_account, AccountCategory::Asset)
            .await?;
        if cash.id == invoice.receivable_account {
            return Err(AppError::InvalidAccount(format!(
                "payment account {} is the invoice's receivable account",
                cash.code
            )));
        }

        let mut entry =
            invoice.payment_entry(cash.id, date.unwrap_or_else(|| Utc::now().date_naive()));
        entry.validate()?;
        self.ensure_accounts_active(&entry).await?;
        entry.status = EntryStatus::Posted;

        invoice.status = InvoiceStatus::Paid;
        invoice.payment_entry = Some(entry.id);
        self.repo
            .save_invoice_transition(&invoice, Some(&mut entry))
            .await?;

        info!(number, entry_id = %entry.id, "invoice paid");
        Ok(InvoiceResult {
            invoice,
            entry: Some(entry),
        })
    }

    /// Void an invoice. A draft is simply marked void; an issued invoice has
    /// its issue entry reversed. Paid invoices cannot be voided.
    pub async fn void_invoice(
        &self,
        number: &str,
        date: Option<NaiveDate>,
    ) -> Result<InvoiceResult, AppError> {
        let mut invoice = self.get_invoice(number).await?;
        if invoice.status.is_terminal() {
            return Err(AppError::InvalidInvoiceState {
                number: number.to_string(),
                status: invoice.status,
                action: "void",
            });
        }

        let mut reversal = match (invoice.status, invoice.issue_entry) {
            (InvoiceStatus::Draft, _) => None,
            (InvoiceStatus::Issued, Some(issue_entry_id)) => {
                let original = self.load_entry(issue_entry_id).await?;
                if let Some(existing) = self.repo.find_reversal_of(issue_entry_id).await? {
                    return Err(AppError::EntryAlreadyReversed {
                        original: issue_entry_id.to_string(),
                        reversal: existing.id.to_string(),
                    });
                }
                self.ensure_accounts_active(&original).await?;
                let mut reversal = original.create_reversal(date.unwrap_or(original.date));
                reversal.status = EntryStatus::Posted;
                Some(reversal)
            }
            _ => {
                return Err(AppError::Database(anyhow::anyhow!(
                    "issued invoice {} has no issue entry",
                    number
                )));
            }
        };

        invoice.status = InvoiceStatus::Void;
        self.repo
            .save_invoice_transition(&invoice, reversal.as_mut())
            .await?;

        info!(number, "invoice voided");
        Ok(InvoiceResult {
            invoice,
            entry: reversal,
        })
    }

    // ========================
    // Restore operations
    // ========================

    /// Store an account exactly as exported, keeping its id.
    pub async fn restore_account(&self, account: &Account) -> Result<(), AppError> {
        if self.repo.get_account_by_code(&account.code).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(account.code.clone()));
        }
        self.repo.save_account(account).await?;
        Ok(())
    }

    /// Store an entry exactly as exported, keeping its id. Posted entries
    /// get a fresh sequence number, so restore them in posting order.
    pub async fn restore_entry(&self, entry: &JournalEntry) -> Result<JournalEntry, AppError> {
        if self.repo.get_entry(entry.id).await?.is_some() {
            return Err(AppError::EntryAlreadyExists(entry.id.to_string()));
        }
        entry.validate()?;
        for account_id in entry.account_ids() {
            self.get_account_by_id(account_id).await?;
        }
        if let Some(original) = entry.reverses {
            self.load_entry(original).await?;
        }

        let mut restored = entry.clone();
        restored.sequence = None;
        self.repo.save_entry(&mut restored).await?;
        Ok(restored)
    }

    /// Store an invoice exactly as exported, keeping its id.
    pub async fn restore_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        if self.repo.get_invoice_by_number(&invoice.number).await?.is_some() {
            return Err(AppError::InvoiceAlreadyExists(invoice.number.clone()));
        }
        invoice.validate()?;
        self.get_account_by_id(invoice.receivable_account).await?;
        self.get_account_by_id(invoice.revenue_account).await?;
        for entry_id in invoice.issue_entry.iter().chain(invoice.payment_entry.iter()) {
            self.load_entry(*entry_id).await?;
        }
        self.repo.save_invoice(invoice).await?;
        Ok(())
    }
}

fn require_status(
    invoice: &Invoice,
    expected: InvoiceStatus,
    action: &'static str,
) -> Result<(), AppError> {
    if invoice.status != expected {
        return Err(AppError::InvalidInvoiceState {
            number: invoice.number.clone(),
            status: invoice.status,
            action,
        });
    }
    Ok(())
}

pub(super) fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), AppError> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(AppError::InvalidDateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }
    Ok(())
}
