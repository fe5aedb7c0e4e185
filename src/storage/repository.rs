use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Account, AccountCategory, AccountId, Activity, EntryId, EntryStatus, IntegrityStats, Invoice,
    InvoiceLine, InvoiceStatus, JournalEntry, JournalLine, PostedLine, Side,
};

use super::{MIGRATION_001_LEDGER, MIGRATION_002_INVOICES};

const ACCOUNT_COLUMNS: &str =
    "id, code, name, category, opening_balance, description, created_at, archived_at";

const ENTRY_COLUMNS: &str =
    "id, sequence, entry_date, description, reference, status, reverses, created_at, posted_at";

const INVOICE_COLUMNS: &str = "id, number, customer, issue_date, due_date, status, receivable_account_id, revenue_account_id, issue_entry_id, payment_entry_id, created_at";

/// Repository for persisting and querying accounts, journal entries and invoices.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every statement is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        debug!("running migrations");
        sqlx::query(MIGRATION_001_LEDGER)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_INVOICES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, code, name, category, opening_balance, description, created_at, archived_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.category.as_str())
        .bind(account.opening_balance)
        .bind(&account.description)
        .bind(account.created_at.to_rfc3339())
        .bind(account.archived_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Persist name, description and opening balance changes.
    pub async fn update_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET name = ?, description = ?, opening_balance = ? WHERE id = ?",
        )
        .bind(&account.name)
        .bind(&account.description)
        .bind(account.opening_balance)
        .bind(account.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update account")?;
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn get_account_by_code(&self, code: &str) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE code = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by code")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List accounts ordered by code (optionally including archived).
    pub async fn list_accounts(&self, include_archived: bool) -> Result<Vec<Account>> {
        let filter = if include_archived {
            ""
        } else {
            "WHERE archived_at IS NULL"
        };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts {} ORDER BY code",
            ACCOUNT_COLUMNS, filter
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Archive an account (soft delete).
    pub async fn archive_account(&self, id: AccountId) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        sqlx::query("UPDATE accounts SET archived_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to archive account")?;
        Ok(now)
    }

    /// Number of draft lines that still reference an account.
    pub async fn count_draft_lines_for_account(&self, id: AccountId) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE l.account_id = ? AND e.status = 'draft'
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count draft lines")?;

        Ok(row.get("count"))
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let category_str: String = row.get("category");
        let created_at_str: String = row.get("created_at");
        let archived_at_str: Option<String> = row.get("archived_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            code: row.get("code"),
            name: row.get("name"),
            category: category_str
                .parse::<AccountCategory>()
                .map_err(anyhow::Error::msg)?,
            opening_balance: row.get("opening_balance"),
            description: row.get("description"),
            created_at: parse_timestamp(&created_at_str)?,
            archived_at: archived_at_str.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    // ========================
    // Journal operations
    // ========================

    /// Save a new entry and its lines atomically. A posted entry gets the next
    /// sequence number.
    pub async fn save_entry(&self, entry: &mut JournalEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::insert_entry(&mut tx, entry).await?;
        tx.commit().await.context("Failed to commit entry")?;
        debug!(entry_id = %entry.id, status = %entry.status, "saved journal entry");
        Ok(())
    }

    async fn insert_entry(conn: &mut SqliteConnection, entry: &mut JournalEntry) -> Result<()> {
        if entry.is_posted() && entry.sequence.is_none() {
            entry.sequence = Some(Self::next_sequence(conn).await?);
            entry.posted_at.get_or_insert_with(Utc::now);
        }

        sqlx::query(
            r#"
            INSERT INTO journal_entries (id, sequence, entry_date, description, reference, status, reverses, created_at, posted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.sequence)
        .bind(entry.date.to_string())
        .bind(&entry.description)
        .bind(&entry.reference)
        .bind(entry.status.as_str())
        .bind(entry.reverses.map(|id| id.to_string()))
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.posted_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut *conn)
        .await
        .context("Failed to save journal entry")?;

        for (line_no, line) in entry.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO journal_lines (entry_id, line_no, account_id, side, amount_cents, memo)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.id.to_string())
            .bind(line_no as i64)
            .bind(line.account_id.to_string())
            .bind(line.side.as_str())
            .bind(line.amount_cents)
            .bind(&line.memo)
            .execute(&mut *conn)
            .await
            .context("Failed to save journal line")?;
        }

        Ok(())
    }

    /// Get the next posting sequence number and increment the counter.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'journal_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Move a draft to posted, assigning its sequence number.
    pub async fn mark_posted(&self, entry: &mut JournalEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let sequence = Self::next_sequence(&mut tx).await?;
        let posted_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE journal_entries
            SET status = 'posted', sequence = ?, posted_at = ?
            WHERE id = ? AND status = 'draft'
            "#,
        )
        .bind(sequence)
        .bind(posted_at.to_rfc3339())
        .bind(entry.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to post journal entry")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("Entry {} is not a draft", entry.id);
        }
        tx.commit().await.context("Failed to commit posting")?;

        entry.status = EntryStatus::Posted;
        entry.sequence = Some(sequence);
        entry.posted_at = Some(posted_at);
        Ok(())
    }

    /// Delete a draft entry and its lines. Posted entries are never deleted.
    pub async fn delete_draft(&self, id: EntryId) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = ? AND status = 'draft'")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete draft entry")?;
        sqlx::query(
            "DELETE FROM journal_lines WHERE entry_id = ? AND NOT EXISTS (SELECT 1 FROM journal_entries WHERE id = ?)",
        )
        .bind(id.to_string())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to delete draft lines")?;
        tx.commit().await.context("Failed to commit deletion")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<JournalEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM journal_entries WHERE id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch journal entry")?;

        match row {
            Some(row) => Ok(Some(self.load_entry(&row).await?)),
            None => Ok(None),
        }
    }

    /// The entry that reverses `id`, if any.
    pub async fn find_reversal_of(&self, id: EntryId) -> Result<Option<JournalEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM journal_entries WHERE reverses = ?",
            ENTRY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch reversal")?;

        match row {
            Some(row) => Ok(Some(self.load_entry(&row).await?)),
            None => Ok(None),
        }
    }

    /// List entries with optional filters, ordered by date then posting sequence.
    /// Drafts sort after posted entries of the same day.
    pub async fn list_entries_filtered(
        &self,
        account_id: Option<AccountId>,
        status: Option<EntryStatus>,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<JournalEntry>> {
        let mut query = format!("SELECT {} FROM journal_entries WHERE 1=1", ENTRY_COLUMNS);

        let account_id_str = account_id.map(|id| id.to_string());
        let from_date_str = from_date.map(|d| d.to_string());
        let to_date_str = to_date.map(|d| d.to_string());

        if account_id.is_some() {
            query.push_str(" AND id IN (SELECT entry_id FROM journal_lines WHERE account_id = ?)");
        }
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        if from_date.is_some() {
            query.push_str(" AND entry_date >= ?");
        }
        if to_date.is_some() {
            query.push_str(" AND entry_date <= ?");
        }

        // Newest first, so a limit keeps the most recent entries
        query.push_str(
            " ORDER BY entry_date DESC, sequence IS NULL DESC, sequence DESC, created_at DESC",
        );

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref aid) = account_id_str {
            sql_query = sql_query.bind(aid);
        }
        if let Some(st) = status {
            sql_query = sql_query.bind(st.as_str());
        }
        if let Some(ref fd) = from_date_str {
            sql_query = sql_query.bind(fd);
        }
        if let Some(ref td) = to_date_str {
            sql_query = sql_query.bind(td);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list journal entries")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(self.load_entry(row).await?);
        }
        Ok(entries)
    }

    /// Every entry in posting order (drafts last), for exports.
    pub async fn list_all_entries(&self) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM journal_entries ORDER BY sequence IS NULL, sequence, created_at",
            ENTRY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list journal entries")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(self.load_entry(row).await?);
        }
        Ok(entries)
    }

    async fn load_entry(&self, row: &SqliteRow) -> Result<JournalEntry> {
        let mut entry = Self::row_to_entry_header(row)?;
        let line_rows = sqlx::query(
            r#"
            SELECT account_id, side, amount_cents, memo
            FROM journal_lines
            WHERE entry_id = ?
            ORDER BY line_no
            "#,
        )
        .bind(entry.id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch journal lines")?;

        entry.lines = line_rows
            .iter()
            .map(Self::row_to_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(entry)
    }

    fn row_to_entry_header(row: &SqliteRow) -> Result<JournalEntry> {
        let id_str: String = row.get("id");
        let date_str: String = row.get("entry_date");
        let status_str: String = row.get("status");
        let reverses_str: Option<String> = row.get("reverses");
        let created_at_str: String = row.get("created_at");
        let posted_at_str: Option<String> = row.get("posted_at");

        Ok(JournalEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            sequence: row.get("sequence"),
            date: parse_date(&date_str)?,
            description: row.get("description"),
            reference: row.get("reference"),
            status: status_str
                .parse::<EntryStatus>()
                .map_err(anyhow::Error::msg)?,
            lines: Vec::new(),
            reverses: reverses_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid reverses ID")?,
            created_at: parse_timestamp(&created_at_str)?,
            posted_at: posted_at_str.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    fn row_to_line(row: &SqliteRow) -> Result<JournalLine> {
        let account_id_str: String = row.get("account_id");
        let side_str: String = row.get("side");

        Ok(JournalLine {
            account_id: Uuid::parse_str(&account_id_str).context("Invalid line account ID")?,
            side: side_str.parse::<Side>().map_err(anyhow::Error::msg)?,
            amount_cents: row.get("amount_cents"),
            memo: row.get("memo"),
        })
    }

    // ========================
    // Ledger queries
    // ========================

    /// Posted lines for one account, up to `to_date` inclusive, in ledger order.
    pub async fn posted_lines_for_account(
        &self,
        account_id: AccountId,
        to_date: Option<NaiveDate>,
    ) -> Result<Vec<PostedLine>> {
        let to_date_str = to_date.map(|d| d.to_string());

        let rows = sqlx::query(
            r#"
            SELECT e.id as entry_id, e.sequence, l.line_no, e.entry_date, l.account_id,
                   l.side, l.amount_cents, e.description, l.memo
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.status = 'posted'
              AND l.account_id = ?
              AND (? IS NULL OR e.entry_date <= ?)
            ORDER BY e.entry_date, e.sequence, l.line_no
            "#,
        )
        .bind(account_id.to_string())
        .bind(&to_date_str)
        .bind(&to_date_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch posted lines")?;

        rows.iter().map(Self::row_to_posted_line).collect()
    }

    /// Posted debit/credit totals per account within an optional date range
    /// (both bounds inclusive). Accounts without activity are absent.
    pub async fn account_activity(
        &self,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> Result<HashMap<AccountId, Activity>> {
        let from_date_str = from_date.map(|d| d.to_string());
        let to_date_str = to_date.map(|d| d.to_string());

        let rows = sqlx::query(
            r#"
            SELECT
                l.account_id,
                COALESCE(SUM(CASE WHEN l.side = 'debit' THEN l.amount_cents ELSE 0 END), 0) as debits,
                COALESCE(SUM(CASE WHEN l.side = 'credit' THEN l.amount_cents ELSE 0 END), 0) as credits
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.status = 'posted'
              AND (? IS NULL OR e.entry_date >= ?)
              AND (? IS NULL OR e.entry_date <= ?)
            GROUP BY l.account_id
            "#,
        )
        .bind(&from_date_str)
        .bind(&from_date_str)
        .bind(&to_date_str)
        .bind(&to_date_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute account activity")?;

        let mut activity = HashMap::new();
        for row in rows {
            let account_id_str: String = row.get("account_id");
            let account_id = Uuid::parse_str(&account_id_str).context("Invalid account ID")?;
            activity.insert(
                account_id,
                Activity {
                    debits: row.get("debits"),
                    credits: row.get("credits"),
                },
            );
        }
        Ok(activity)
    }

    fn row_to_posted_line(row: &SqliteRow) -> Result<PostedLine> {
        let entry_id_str: String = row.get("entry_id");
        let account_id_str: String = row.get("account_id");
        let date_str: String = row.get("entry_date");
        let side_str: String = row.get("side");

        Ok(PostedLine {
            entry_id: Uuid::parse_str(&entry_id_str).context("Invalid entry ID")?,
            sequence: row.get::<Option<i64>, _>("sequence").unwrap_or_default(),
            line_no: row.get("line_no"),
            date: parse_date(&date_str)?,
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            side: side_str.parse::<Side>().map_err(anyhow::Error::msg)?,
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            memo: row.get("memo"),
        })
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let counts = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'posted' THEN 1 ELSE 0 END), 0) as posted,
                COALESCE(SUM(CASE WHEN status = 'draft' THEN 1 ELSE 0 END), 0) as drafts
            FROM journal_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Posting sequence must be contiguous; drafts have no sequence
        let sequence_check = sqlx::query(
            r#"
            SELECT MIN(sequence) as min_seq, MAX(sequence) as max_seq, COUNT(sequence) as count
            FROM journal_entries
            WHERE status = 'posted'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_seq: Option<i64> = sequence_check.get("min_seq");
        let max_seq: Option<i64> = sequence_check.get("max_seq");
        let seq_count: i64 = sequence_check.get("count");
        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => (max - min + 1) != seq_count,
            _ => false,
        };

        let unbalanced_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM (
                SELECT e.id
                FROM journal_entries e
                LEFT JOIN journal_lines l ON l.entry_id = e.id
                WHERE e.status = 'posted'
                GROUP BY e.id
                HAVING COUNT(l.line_no) < 2
                    OR COALESCE(SUM(CASE WHEN l.side = 'debit' THEN l.amount_cents ELSE -l.amount_cents END), 0) != 0
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM journal_lines WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        let dangling_account_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM journal_lines l
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = l.account_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            account_count,
            entry_count: counts.get("posted"),
            draft_count: counts.get("drafts"),
            has_sequence_gaps,
            unbalanced_entries,
            invalid_amounts,
            dangling_account_refs,
        })
    }

    // ========================
    // Invoice operations
    // ========================

    pub async fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(&format!(
            "INSERT INTO invoices ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            INVOICE_COLUMNS
        ))
        .bind(invoice.id.to_string())
        .bind(&invoice.number)
        .bind(&invoice.customer)
        .bind(invoice.issue_date.to_string())
        .bind(invoice.due_date.to_string())
        .bind(invoice.status.as_str())
        .bind(invoice.receivable_account.to_string())
        .bind(invoice.revenue_account.to_string())
        .bind(invoice.issue_entry.map(|id| id.to_string()))
        .bind(invoice.payment_entry.map(|id| id.to_string()))
        .bind(invoice.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save invoice")?;

        for (line_no, line) in invoice.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_lines (invoice_id, line_no, description, quantity, unit_price_cents)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(invoice.id.to_string())
            .bind(line_no as i64)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await
            .context("Failed to save invoice line")?;
        }

        tx.commit().await.context("Failed to commit invoice")?;
        Ok(())
    }

    /// Store an invoice state change together with the entry that books it,
    /// in one transaction.
    pub async fn save_invoice_transition(
        &self,
        invoice: &Invoice,
        entry: Option<&mut JournalEntry>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        if let Some(entry) = entry {
            Self::insert_entry(&mut tx, entry).await?;
        }

        sqlx::query(
            r#"
            UPDATE invoices
            SET status = ?, issue_entry_id = ?, payment_entry_id = ?
            WHERE id = ?
            "#,
        )
        .bind(invoice.status.as_str())
        .bind(invoice.issue_entry.map(|id| id.to_string()))
        .bind(invoice.payment_entry.map(|id| id.to_string()))
        .bind(invoice.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update invoice")?;

        tx.commit().await.context("Failed to commit invoice change")?;
        debug!(invoice = %invoice.number, status = %invoice.status, "invoice updated");
        Ok(())
    }

    pub async fn get_invoice_by_number(&self, number: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invoices WHERE number = ?",
            INVOICE_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch invoice")?;

        match row {
            Some(row) => Ok(Some(self.load_invoice(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_invoices(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM invoices WHERE status = ? ORDER BY issue_date, number",
                    INVOICE_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM invoices ORDER BY issue_date, number",
                    INVOICE_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list invoices")?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in &rows {
            invoices.push(self.load_invoice(row).await?);
        }
        Ok(invoices)
    }

    async fn load_invoice(&self, row: &SqliteRow) -> Result<Invoice> {
        let id_str: String = row.get("id");
        let issue_date_str: String = row.get("issue_date");
        let due_date_str: String = row.get("due_date");
        let status_str: String = row.get("status");
        let receivable_str: String = row.get("receivable_account_id");
        let revenue_str: String = row.get("revenue_account_id");
        let issue_entry_str: Option<String> = row.get("issue_entry_id");
        let payment_entry_str: Option<String> = row.get("payment_entry_id");
        let created_at_str: String = row.get("created_at");

        let line_rows = sqlx::query(
            r#"
            SELECT description, quantity, unit_price_cents
            FROM invoice_lines
            WHERE invoice_id = ?
            ORDER BY line_no
            "#,
        )
        .bind(&id_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch invoice lines")?;

        let lines = line_rows
            .iter()
            .map(|r| InvoiceLine {
                description: r.get("description"),
                quantity: r.get("quantity"),
                unit_price_cents: r.get("unit_price_cents"),
            })
            .collect();

        Ok(Invoice {
            id: Uuid::parse_str(&id_str).context("Invalid invoice ID")?,
            number: row.get("number"),
            customer: row.get("customer"),
            issue_date: parse_date(&issue_date_str)?,
            due_date: parse_date(&due_date_str)?,
            lines,
            status: status_str
                .parse::<InvoiceStatus>()
                .map_err(anyhow::Error::msg)?,
            receivable_account: Uuid::parse_str(&receivable_str)
                .context("Invalid receivable account ID")?,
            revenue_account: Uuid::parse_str(&revenue_str).context("Invalid revenue account ID")?,
            issue_entry: issue_entry_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid issue entry ID")?,
            payment_entry: payment_entry_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid payment entry ID")?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}
