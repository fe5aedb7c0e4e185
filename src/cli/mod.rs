use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Once;
use uuid::Uuid;

use crate::application::{EntryFilter, LedgerService, NewEntry, NewInvoice, NewLine};
use crate::io::{
    write_accounts_csv, write_balance_sheet_csv, write_income_comparison_csv,
    write_income_statement_csv, Exporter,
};
use crate::domain::{
    format_cents, parse_cents, AccountCategory, EntryStatus, InvoiceLine, InvoiceStatus,
    JournalEntry, PeriodType, Side,
};

static TRACING_INIT: Once = Once::new();

/// Tallybook - Double-entry bookkeeping ledger
#[derive(Parser)]
#[command(name = "tallybook")]
#[command(about = "A local-first double-entry bookkeeping ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TALLYBOOK_DB", default_value = "tallybook.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Chart of accounts commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Journal entry commands
    #[command(subcommand)]
    Entry(EntryCommands),

    /// Show the running-balance ledger of one account
    Ledger {
        /// Account code
        account: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show balance for an account or all accounts
    Balance {
        /// Account code (omit for all accounts)
        account: Option<String>,

        /// Balance at the end of this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Show the trial balance
    TrialBalance {
        /// Trial balance at the end of this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Generate financial statements
    #[command(subcommand)]
    Report(ReportCommands),

    /// Invoice commands
    #[command(subcommand)]
    Invoice(InvoiceCommands),

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: accounts, journal, trial-balance, statement, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Account code (statement export)
        #[arg(long)]
        account: Option<String>,

        /// Start date (statement export)
        #[arg(long)]
        from: Option<String>,

        /// End date (statement and trial-balance exports)
        #[arg(long)]
        to: Option<String>,
    },

    /// Import data from CSV or JSON
    Import {
        /// What to import: accounts, full
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip duplicate records
        #[arg(long)]
        skip_duplicates: bool,

        /// Validate without importing
        #[arg(long)]
        validate: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Add an account to the chart of accounts
    Create {
        /// Account code (must be unique, e.g. "1000")
        code: String,

        /// Account name
        name: String,

        /// Category: asset, liability, equity, revenue, expense
        #[arg(short, long)]
        category: String,

        /// Opening balance (e.g., "1500.00")
        #[arg(long)]
        opening: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List the chart of accounts
    List {
        /// Include archived accounts
        #[arg(long)]
        all: bool,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show detailed account information
    Show {
        /// Account code
        code: String,
    },

    /// Archive an empty account
    Archive {
        /// Account code
        code: String,
    },

    /// Set an account's opening balance
    Opening {
        /// Account code
        code: String,

        /// Opening balance (e.g., "1500.00" or "-20")
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Record a journal entry
    Add {
        /// Description of the entry
        description: String,

        /// Debit line as CODE=AMOUNT (repeatable)
        #[arg(long = "debit", value_name = "CODE=AMOUNT")]
        debits: Vec<String>,

        /// Credit line as CODE=AMOUNT (repeatable)
        #[arg(long = "credit", value_name = "CODE=AMOUNT")]
        credits: Vec<String>,

        /// Entry date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// External reference (document number, receipt, ...)
        #[arg(short, long)]
        reference: Option<String>,

        /// Post the entry immediately instead of leaving a draft
        #[arg(long)]
        post: bool,
    },

    /// List journal entries
    List {
        /// Filter by account code
        #[arg(long)]
        account: Option<String>,

        /// Filter by status: draft, posted
        #[arg(long)]
        status: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show one journal entry
    Show {
        /// Entry ID
        id: String,
    },

    /// Post a draft entry
    Post {
        /// Entry ID
        id: String,
    },

    /// Delete a draft entry
    Delete {
        /// Entry ID
        id: String,
    },

    /// Reverse a posted entry
    Reverse {
        /// Entry ID
        id: String,

        /// Reversal date (YYYY-MM-DD, defaults to the original entry's date)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income statement (revenue and expenses) for a date range
    Income {
        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Compare net income of the current period to the previous one
    Compare {
        /// Period: monthly, quarterly, yearly
        #[arg(long, default_value = "monthly")]
        period: String,

        /// Any date inside the current period (defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Balance sheet at a date
    BalanceSheet {
        /// Balance sheet at the end of this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Create a draft invoice
    Create {
        /// Invoice number (must be unique)
        number: String,

        /// Customer name
        #[arg(long)]
        customer: String,

        /// Receivable (asset) account code
        #[arg(long)]
        receivable: String,

        /// Revenue account code
        #[arg(long)]
        revenue: String,

        /// Line as DESCRIPTION:QUANTITY:UNIT_PRICE (repeatable)
        #[arg(long = "line", value_name = "DESC:QTY:PRICE", required = true)]
        lines: Vec<String>,

        /// Issue date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        issue_date: Option<String>,

        /// Due date (YYYY-MM-DD, defaults to 30 days after issue)
        #[arg(long)]
        due_date: Option<String>,
    },

    /// List invoices
    List {
        /// Filter by status: draft, issued, paid, void
        #[arg(long)]
        status: Option<String>,
    },

    /// Show one invoice
    Show {
        /// Invoice number
        number: String,
    },

    /// Issue a draft invoice, booking the receivable
    Issue {
        /// Invoice number
        number: String,

        /// Posting date (defaults to the invoice's issue date)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record payment of an issued invoice
    Pay {
        /// Invoice number
        number: String,

        /// Asset account receiving the payment
        #[arg(long)]
        account: String,

        /// Payment date (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Void an invoice, reversing its receivable if issued
    Void {
        /// Invoice number
        number: String,

        /// Reversal date (defaults to the issue entry's date)
        #[arg(long)]
        date: Option<String>,
    },
}

/// Install the global tracing subscriber once. `RUST_LOG` wins over the
/// default level.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let default_level = if verbose { "tallybook=debug" } else { "tallybook=warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_account_command(&service, cmd).await?;
            }

            Commands::Entry(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_entry_command(&service, cmd).await?;
            }

            Commands::Ledger {
                account,
                from,
                to,
                format,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let from = parse_optional_date(from.as_deref())?;
                let to = parse_optional_date(to.as_deref())?;
                run_ledger_command(&service, &account, from, to, &format).await?;
            }

            Commands::Balance { account, as_of } => {
                let service = LedgerService::connect(&self.database).await?;
                let as_of = parse_optional_date(as_of.as_deref())?;
                run_balance_command(&service, account, as_of).await?;
            }

            Commands::TrialBalance { as_of, format } => {
                let service = LedgerService::connect(&self.database).await?;
                let as_of = parse_optional_date(as_of.as_deref())?;
                run_trial_balance_command(&service, as_of, &format).await?;
            }

            Commands::Report(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_report_command(&service, cmd).await?;
            }

            Commands::Invoice(cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_invoice_command(&service, cmd).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
                account,
                from,
                to,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let from = parse_optional_date(from.as_deref())?;
                let to = parse_optional_date(to.as_deref())?;
                run_export_command(
                    &service,
                    &export_type,
                    output.as_deref(),
                    account.as_deref(),
                    from,
                    to,
                )
                .await?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                skip_duplicates,
                validate,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_import_command(
                    &service,
                    &import_type,
                    input.as_deref(),
                    dry_run,
                    skip_duplicates,
                    validate,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            code,
            name,
            category,
            opening,
            description,
        } => {
            let category: AccountCategory = category.parse().map_err(|e| {
                anyhow::anyhow!(
                    "Invalid category '{}'. Valid: asset, liability, equity, revenue, expense. Error: {}",
                    category,
                    e
                )
            })?;
            let opening_balance = match opening {
                Some(amount) => parse_cents(&amount)
                    .context("Invalid opening balance. Use '1500.00' or '1500'")?,
                None => 0,
            };

            let account = service
                .create_account(code, name, category, opening_balance, description)
                .await?;
            println!(
                "Created account: {} ({})",
                account.label(),
                account.category
            );
        }

        AccountCommands::List { all, format } => {
            let accounts = service.list_accounts(all).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&accounts)?),
                "csv" => write_accounts_csv(std::io::stdout(), &accounts)?,
                _ => {
                    if accounts.is_empty() {
                        println!("No accounts found.");
                    } else {
                        println!(
                            "{:<10} {:<30} {:<10} {:>14}",
                            "CODE", "NAME", "CATEGORY", "OPENING"
                        );
                        println!("{}", "-".repeat(67));
                        for account in accounts {
                            println!(
                                "{:<10} {:<30} {:<10} {:>14}{}",
                                account.code,
                                truncate(&account.name, 30),
                                account.category,
                                format_cents(account.opening_balance),
                                if account.is_archived() { "  (archived)" } else { "" }
                            );
                        }
                    }
                }
            }
        }

        AccountCommands::Show { code } => {
            let account = service.get_account(&code).await?;
            let balance = service.get_balance(&code, None).await?.balance;
            let drafts = service
                .list_entries(EntryFilter {
                    account: Some(code.clone()),
                    status: Some(EntryStatus::Draft),
                    ..Default::default()
                })
                .await?;
            let posted = service
                .list_entries(EntryFilter {
                    account: Some(code.clone()),
                    status: Some(EntryStatus::Posted),
                    ..Default::default()
                })
                .await?;

            println!("Account: {}", account.label());
            println!("  ID:             {}", account.id);
            println!("  Category:       {}", account.category);
            println!("  Normal side:    {}", account.normal_side());
            if let Some(desc) = &account.description {
                println!("  Description:    {}", desc);
            }
            println!(
                "  Created:        {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(archived) = account.archived_at {
                println!("  Archived:       {}", archived.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            println!("  Opening:        {}", format_cents(account.opening_balance));
            println!("  Balance:        {}", format_cents(balance));
            println!("  Entries:        {} posted, {} draft", posted.len(), drafts.len());
            if let Some(last) = posted.first() {
                println!("  Last activity:  {}", last.date);
            }
        }

        AccountCommands::Archive { code } => {
            service.archive_account(&code).await?;
            println!("Archived account: {}", code);
        }

        AccountCommands::Opening { code, amount } => {
            let amount =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let account = service.set_opening_balance(&code, amount).await?;
            println!(
                "Opening balance of {} set to {}",
                account.label(),
                format_cents(account.opening_balance)
            );
        }
    }
    Ok(())
}

async fn run_entry_command(service: &LedgerService, cmd: EntryCommands) -> Result<()> {
    match cmd {
        EntryCommands::Add {
            description,
            debits,
            credits,
            date,
            reference,
            post,
        } => {
            let date = match date {
                Some(date_str) => parse_date(&date_str)?,
                None => Utc::now().date_naive(),
            };

            let mut lines = Vec::with_capacity(debits.len() + credits.len());
            for raw in &debits {
                lines.push(parse_line(raw, Side::Debit)?);
            }
            for raw in &credits {
                lines.push(parse_line(raw, Side::Credit)?);
            }

            let entry = service
                .record_entry(NewEntry {
                    date,
                    description,
                    reference,
                    lines,
                    post,
                })
                .await?;

            match entry.sequence {
                Some(sequence) => println!(
                    "Posted entry #{}: {} ({})",
                    sequence,
                    format_cents(entry.total_debits()),
                    entry.id
                ),
                None => println!(
                    "Recorded draft: {} ({})",
                    format_cents(entry.total_debits()),
                    entry.id
                ),
            }
        }

        EntryCommands::List {
            account,
            status,
            from,
            to,
            limit,
            format,
        } => {
            let status = status
                .map(|s| s.parse::<EntryStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let filter = EntryFilter {
                account,
                status,
                from_date: parse_optional_date(from.as_deref()).context("Invalid from date")?,
                to_date: parse_optional_date(to.as_deref()).context("Invalid to date")?,
                limit,
            };

            let entries = service.list_entries(filter).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No journal entries found.");
            } else {
                println!(
                    "{:<6} {:<12} {:<7} {:>14} {:<36} DESCRIPTION",
                    "SEQ", "DATE", "STATUS", "AMOUNT", "ID"
                );
                println!("{}", "-".repeat(100));
                for entry in entries.iter().rev() {
                    println!(
                        "{:<6} {:<12} {:<7} {:>14} {:<36} {}",
                        entry.sequence.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                        entry.date.to_string(),
                        entry.status,
                        format_cents(entry.total_debits()),
                        entry.id,
                        truncate(&entry.description, 30)
                    );
                }
            }
        }

        EntryCommands::Show { id } => {
            let info = service.get_entry_info(parse_id(&id)?).await?;
            let entry = &info.entry;

            println!("Journal entry: {}", entry.id);
            if let Some(sequence) = entry.sequence {
                println!("  Sequence:    {}", sequence);
            }
            println!("  Date:        {}", entry.date);
            println!("  Status:      {}", entry.status);
            println!("  Description: {}", entry.description);
            if let Some(reference) = &entry.reference {
                println!("  Reference:   {}", reference);
            }
            println!(
                "  Recorded at: {}",
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(posted_at) = entry.posted_at {
                println!("  Posted at:   {}", posted_at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            print_entry_lines(entry, &info.account_labels);

            if let Some(reverses_id) = entry.reverses {
                println!();
                println!("  This is a reversal of: {}", reverses_id);
            }
            if let Some(reversal) = &info.reversed_by {
                println!();
                println!("  Reversed on {} by {}", reversal.date, reversal.id);
            }
        }

        EntryCommands::Post { id } => {
            let entry = service.post_entry(parse_id(&id)?).await?;
            println!(
                "Posted entry #{}: {}",
                entry.sequence.unwrap_or_default(),
                entry.description
            );
        }

        EntryCommands::Delete { id } => {
            let entry = service.delete_draft(parse_id(&id)?).await?;
            println!("Deleted draft: {} ({})", entry.description, entry.id);
        }

        EntryCommands::Reverse { id, date } => {
            let date = parse_optional_date(date.as_deref())?;
            let result = service.reverse_entry(parse_id(&id)?, date).await?;
            println!(
                "Reversed entry {} with #{} on {} ({})",
                result.original.id,
                result.reversal.sequence.unwrap_or_default(),
                result.reversal.date,
                result.reversal.id
            );
        }
    }
    Ok(())
}

fn print_entry_lines(
    entry: &JournalEntry,
    labels: &std::collections::HashMap<crate::domain::AccountId, String>,
) {
    println!("  {:<32} {:>14} {:>14}  MEMO", "ACCOUNT", "DEBIT", "CREDIT");
    println!("  {}", "-".repeat(70));
    for line in &entry.lines {
        let label = labels
            .get(&line.account_id)
            .map(|s| s.as_str())
            .unwrap_or("?");
        let (debit, credit) = match line.side {
            Side::Debit => (format_cents(line.amount_cents), String::new()),
            Side::Credit => (String::new(), format_cents(line.amount_cents)),
        };
        println!(
            "  {:<32} {:>14} {:>14}  {}",
            truncate(label, 32),
            debit,
            credit,
            line.memo.as_deref().unwrap_or("")
        );
    }
    println!("  {}", "-".repeat(70));
    println!(
        "  {:<32} {:>14} {:>14}",
        "TOTAL",
        format_cents(entry.total_debits()),
        format_cents(entry.total_credits())
    );
}

async fn run_ledger_command(
    service: &LedgerService,
    account: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    format: &str,
) -> Result<()> {
    if format == "csv" {
        Exporter::new(service)
            .export_statement_csv(std::io::stdout(), account, from, to)
            .await?;
        return Ok(());
    }

    let statement = service.account_statement(account, from, to).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&statement)?),
        _ => {
            println!("Ledger: {} {}", statement.account_code, statement.account_name);
            println!(
                "Period: {} to {}",
                statement.from.map(|d| d.to_string()).unwrap_or_else(|| "beginning".to_string()),
                statement.to.map(|d| d.to_string()).unwrap_or_else(|| "now".to_string())
            );
            println!();
            println!(
                "{:<12} {:<30} {:>14} {:>14} {:>14}",
                "DATE", "DESCRIPTION", "DEBIT", "CREDIT", "BALANCE"
            );
            println!("{}", "-".repeat(88));
            println!(
                "{:<12} {:<30} {:>14} {:>14} {:>14}",
                "",
                "Opening balance",
                "",
                "",
                format_cents(statement.opening_balance)
            );
            for line in &statement.lines {
                println!(
                    "{:<12} {:<30} {:>14} {:>14} {:>14}",
                    line.date.to_string(),
                    truncate(&line.description, 30),
                    blank_if_zero(line.debit),
                    blank_if_zero(line.credit),
                    format_cents(line.balance)
                );
            }
            println!("{}", "-".repeat(88));
            println!(
                "{:<12} {:<30} {:>14} {:>14} {:>14}",
                "",
                "Closing balance",
                format_cents(statement.total_debits),
                format_cents(statement.total_credits),
                format_cents(statement.closing_balance)
            );
        }
    }
    Ok(())
}

async fn run_balance_command(
    service: &LedgerService,
    account: Option<String>,
    as_of: Option<NaiveDate>,
) -> Result<()> {
    match account {
        Some(code) => {
            let entry = service.get_balance(&code, as_of).await?;
            println!(
                "{}: {} {}",
                entry.account.label(),
                format_cents(entry.balance),
                entry.account.normal_side()
            );
        }
        None => {
            let entries = service.get_all_balances(as_of).await?;
            if entries.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<10} {:<30} {:<10} {:>14}", "CODE", "NAME", "CATEGORY", "BALANCE");
                println!("{}", "-".repeat(67));
                for entry in entries {
                    println!(
                        "{:<10} {:<30} {:<10} {:>14}",
                        entry.account.code,
                        truncate(&entry.account.name, 30),
                        entry.account.category,
                        format_cents(entry.balance)
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_trial_balance_command(
    service: &LedgerService,
    as_of: Option<NaiveDate>,
    format: &str,
) -> Result<()> {
    if format == "csv" {
        Exporter::new(service)
            .export_trial_balance_csv(std::io::stdout(), as_of)
            .await?;
        return Ok(());
    }

    let tb = service.trial_balance(as_of).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&tb)?),
        _ => {
            println!(
                "Trial Balance as of {}",
                as_of.map(|d| d.to_string()).unwrap_or_else(|| "now".to_string())
            );
            println!();
            println!("{:<10} {:<30} {:>14} {:>14}", "CODE", "NAME", "DEBIT", "CREDIT");
            println!("{}", "-".repeat(71));
            for row in &tb.rows {
                println!(
                    "{:<10} {:<30} {:>14} {:>14}",
                    row.account_code,
                    truncate(&row.account_name, 30),
                    blank_if_zero(row.debit),
                    blank_if_zero(row.credit)
                );
            }
            println!("{}", "-".repeat(71));
            println!(
                "{:<10} {:<30} {:>14} {:>14}  {}",
                "",
                "TOTAL",
                format_cents(tb.total_debits),
                format_cents(tb.total_credits),
                if tb.is_balanced() { "OK" } else { "UNBALANCED!" }
            );
        }
    }
    Ok(())
}

async fn run_report_command(service: &LedgerService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Income { from, to, format } => {
            let (from_date, to_date) = parse_date_range(from, to)?;
            let report = service.income_statement(from_date, to_date).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => write_income_statement_csv(std::io::stdout(), &report)?,
                _ => {
                    println!("Income Statement");
                    println!("Period: {} to {}", report.from_date, report.to_date);
                    println!();
                    println!("Revenue:");
                    for row in &report.revenue {
                        println!(
                            "  {:<10} {:<30} {:>14}",
                            row.account_code,
                            truncate(&row.account_name, 30),
                            format_cents(row.amount)
                        );
                    }
                    println!(
                        "  {:<41} {:>14}",
                        "Total revenue",
                        format_cents(report.total_revenue)
                    );
                    println!();
                    println!("Expenses:");
                    for row in &report.expenses {
                        println!(
                            "  {:<10} {:<30} {:>14}",
                            row.account_code,
                            truncate(&row.account_name, 30),
                            format_cents(row.amount)
                        );
                    }
                    println!(
                        "  {:<41} {:>14}",
                        "Total expenses",
                        format_cents(report.total_expenses)
                    );
                    println!("  {}", "-".repeat(56));
                    println!("  {:<41} {:>14}", "Net income", format_cents(report.net_income));
                }
            }
        }

        ReportCommands::Compare {
            period,
            date,
            format,
        } => {
            let period_type: PeriodType = period.parse().map_err(|e| {
                anyhow::anyhow!(
                    "Invalid period '{}'. Valid: monthly, quarterly, yearly. Error: {}",
                    period,
                    e
                )
            })?;
            let date = match date {
                Some(date_str) => parse_date(&date_str)?,
                None => Utc::now().date_naive(),
            };
            let report = service.compare_income(period_type, date).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => write_income_comparison_csv(std::io::stdout(), &report)?,
                _ => {
                    println!("Period Comparison ({})", report.period);
                    println!();
                    println!(
                        "{:<10} {:<25} {:>14} {:>14} {:>14}",
                        "PERIOD", "DATES", "REVENUE", "EXPENSES", "NET"
                    );
                    println!("{}", "-".repeat(81));
                    for (label, summary) in [
                        ("Current", &report.current_period),
                        ("Previous", &report.previous_period),
                    ] {
                        println!(
                            "{:<10} {:<25} {:>14} {:>14} {:>14}",
                            label,
                            format!("{} - {}", summary.period_start, summary.period_end),
                            format_cents(summary.total_revenue),
                            format_cents(summary.total_expenses),
                            format_cents(summary.net_income)
                        );
                    }
                    println!();
                    println!(
                        "Change: {} ({:+.1}%)",
                        format_cents(report.change),
                        report.change_percentage
                    );
                }
            }
        }

        ReportCommands::BalanceSheet { as_of, format } => {
            let as_of = parse_optional_date(as_of.as_deref())?;
            let report = service.balance_sheet(as_of).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => write_balance_sheet_csv(std::io::stdout(), &report)?,
                _ => {
                    println!(
                        "Balance Sheet as of {}",
                        as_of.map(|d| d.to_string()).unwrap_or_else(|| "now".to_string())
                    );
                    for (title, rows, total) in [
                        ("Assets", &report.assets, report.total_assets),
                        ("Liabilities", &report.liabilities, report.total_liabilities),
                        ("Equity", &report.equity, report.total_equity),
                    ] {
                        println!();
                        println!("{}:", title);
                        for row in rows {
                            println!(
                                "  {:<10} {:<30} {:>14}",
                                row.account_code,
                                truncate(&row.account_name, 30),
                                format_cents(row.amount)
                            );
                        }
                        println!(
                            "  {:<41} {:>14}",
                            format!("Total {}", title.to_lowercase()),
                            format_cents(total)
                        );
                    }
                    println!(
                        "  {:<41} {:>14}",
                        "Current earnings",
                        format_cents(report.current_earnings)
                    );
                    println!();
                    println!(
                        "Assets {} = Liabilities + Equity + Earnings {}  {}",
                        format_cents(report.total_assets),
                        format_cents(
                            report.total_liabilities + report.total_equity + report.current_earnings
                        ),
                        if report.is_balanced() { "OK" } else { "UNBALANCED!" }
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_invoice_command(service: &LedgerService, cmd: InvoiceCommands) -> Result<()> {
    match cmd {
        InvoiceCommands::Create {
            number,
            customer,
            receivable,
            revenue,
            lines,
            issue_date,
            due_date,
        } => {
            let issue_date = match issue_date {
                Some(date_str) => parse_date(&date_str)?,
                None => Utc::now().date_naive(),
            };
            let due_date = match due_date {
                Some(date_str) => parse_date(&date_str)?,
                None => issue_date + chrono::Duration::days(30),
            };
            let lines = lines
                .iter()
                .map(|raw| parse_invoice_line(raw))
                .collect::<Result<Vec<_>>>()?;

            let invoice = service
                .create_invoice(NewInvoice {
                    number,
                    customer,
                    issue_date,
                    due_date,
                    receivable_account: receivable,
                    revenue_account: revenue,
                    lines,
                })
                .await?;
            println!(
                "Created invoice {} for {}: {}",
                invoice.number,
                invoice.customer,
                format_cents(invoice.total())
            );
        }

        InvoiceCommands::List { status } => {
            let status = status
                .map(|s| s.parse::<InvoiceStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let invoices = service.list_invoices(status).await?;
            let today = Utc::now().date_naive();

            if invoices.is_empty() {
                println!("No invoices found.");
            } else {
                println!(
                    "{:<12} {:<24} {:<12} {:<12} {:>14} STATUS",
                    "NUMBER", "CUSTOMER", "ISSUED", "DUE", "TOTAL"
                );
                println!("{}", "-".repeat(85));
                for invoice in invoices {
                    println!(
                        "{:<12} {:<24} {:<12} {:<12} {:>14} {}{}",
                        invoice.number,
                        truncate(&invoice.customer, 24),
                        invoice.issue_date.to_string(),
                        invoice.due_date.to_string(),
                        format_cents(invoice.total()),
                        invoice.status,
                        if invoice.is_overdue(today) { " (overdue)" } else { "" }
                    );
                }
            }
        }

        InvoiceCommands::Show { number } => {
            let invoice = service.get_invoice(&number).await?;
            let receivable = service.get_account_by_id(invoice.receivable_account).await?;
            let revenue = service.get_account_by_id(invoice.revenue_account).await?;

            println!("Invoice: {}", invoice.number);
            println!("  Customer:   {}", invoice.customer);
            println!("  Status:     {}", invoice.status);
            println!("  Issued:     {}", invoice.issue_date);
            println!("  Due:        {}", invoice.due_date);
            println!("  Receivable: {}", receivable.label());
            println!("  Revenue:    {}", revenue.label());
            println!();
            println!("  {:<30} {:>6} {:>14} {:>14}", "DESCRIPTION", "QTY", "PRICE", "TOTAL");
            println!("  {}", "-".repeat(67));
            for line in &invoice.lines {
                println!(
                    "  {:<30} {:>6} {:>14} {:>14}",
                    truncate(&line.description, 30),
                    line.quantity,
                    format_cents(line.unit_price_cents),
                    format_cents(line.total())
                );
            }
            println!("  {}", "-".repeat(67));
            println!("  {:<52} {:>14}", "TOTAL", format_cents(invoice.total()));
            if let Some(id) = invoice.issue_entry {
                println!();
                println!("  Issue entry:   {}", id);
            }
            if let Some(id) = invoice.payment_entry {
                println!("  Payment entry: {}", id);
            }
        }

        InvoiceCommands::Issue { number, date } => {
            let date = parse_optional_date(date.as_deref())?;
            let result = service.issue_invoice(&number, date).await?;
            println!(
                "Issued invoice {}: {}",
                result.invoice.number,
                format_cents(result.invoice.total())
            );
        }

        InvoiceCommands::Pay {
            number,
            account,
            date,
        } => {
            let date = parse_optional_date(date.as_deref())?;
            let result = service.record_payment(&number, &account, date).await?;
            println!(
                "Recorded payment of {} for invoice {} into {}",
                format_cents(result.invoice.total()),
                result.invoice.number,
                account
            );
        }

        InvoiceCommands::Void { number, date } => {
            let date = parse_optional_date(date.as_deref())?;
            let result = service.void_invoice(&number, date).await?;
            match result.entry {
                Some(reversal) => println!(
                    "Voided invoice {} (receivable reversed by {})",
                    result.invoice.number, reversal.id
                ),
                None => println!("Voided invoice {}", result.invoice.number),
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts: {}", report.account_count);
    println!("Entries:  {} ({} draft)", report.entry_count, report.draft_count);
    println!();
    println!("Trial balance:");
    println!(
        "  {:<12} {:>14}",
        "Debits:",
        format_cents(report.trial_balance.total_debits)
    );
    println!(
        "  {:<12} {:>14}",
        "Credits:",
        format_cents(report.trial_balance.total_credits)
    );
    println!("  {}", "-".repeat(27));
    println!(
        "  {:<12} {:>14}  {}",
        "Difference:",
        format_cents(report.trial_balance.difference()),
        if report.trial_balance.is_balanced() {
            "OK"
        } else {
            "UNBALANCED!"
        }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
    account: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "accounts" => {
            let count = exporter.export_accounts_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} accounts", count);
            }
        }
        "journal" => {
            let count = exporter.export_journal_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} journal lines", count);
            }
        }
        "trial-balance" => {
            let count = exporter.export_trial_balance_csv(writer, to).await?;
            if output.is_some() {
                eprintln!("Exported {} trial balance rows", count);
            }
        }
        "statement" => {
            let code = account.context("--account is required for a statement export")?;
            let count = exporter.export_statement_csv(writer, code, from, to).await?;
            if output.is_some() {
                eprintln!("Exported {} ledger lines for {}", count, code);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} accounts, {} entries, {} invoices",
                    snapshot.accounts.len(),
                    snapshot.entries.len(),
                    snapshot.invoices.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: accounts, journal, trial-balance, statement, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
    validate: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    let importer = Importer::new(service);

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_duplicates,
        validate_only: validate,
    };

    let result = match import_type {
        "accounts" => importer.import_accounts_csv(reader, options).await?,
        "full" => importer.import_full_json(reader, options).await?,
        _ => {
            anyhow::bail!(
                "Invalid import type '{}'. Valid types: accounts, full",
                import_type
            );
        }
    };

    if validate || dry_run {
        println!("Validation finished");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Line {}: {}{}",
                error.line,
                error
                    .field
                    .as_ref()
                    .map(|f| format!("{}: ", f))
                    .unwrap_or_default(),
                error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

/// Parse a `CODE=AMOUNT` journal line argument.
fn parse_line(raw: &str, side: Side) -> Result<NewLine> {
    let (code, amount) = raw
        .split_once('=')
        .with_context(|| format!("Invalid line '{}'. Use CODE=AMOUNT", raw))?;
    let amount_cents = parse_cents(amount.trim())
        .with_context(|| format!("Invalid amount in line '{}'", raw))?;

    Ok(NewLine {
        account_code: code.trim().to_string(),
        side,
        amount_cents,
        memo: None,
    })
}

/// Parse a `DESCRIPTION:QUANTITY:UNIT_PRICE` invoice line argument.
/// The description may itself contain colons.
fn parse_invoice_line(raw: &str) -> Result<InvoiceLine> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(description)) =
        (parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("Invalid invoice line '{}'. Use DESCRIPTION:QUANTITY:UNIT_PRICE", raw);
    };

    let quantity: i64 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in line '{}'", raw))?;
    let unit_price = parse_cents(price.trim())
        .with_context(|| format!("Invalid unit price in line '{}'", raw))?;

    Ok(InvoiceLine::new(description.trim(), quantity, unit_price))
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid entry ID '{}'", id))
}

fn parse_date_range(from: Option<String>, to: Option<String>) -> Result<(NaiveDate, NaiveDate)> {
    use chrono::Datelike;

    let today = Utc::now().date_naive();

    let to_date = match to {
        Some(date_str) => parse_date(&date_str)?,
        None => today,
    };

    // Default from_date is start of current month
    let from_date = match from {
        Some(date_str) => parse_date(&date_str)?,
        None => today.with_day(1).unwrap_or(today),
    };

    Ok((from_date, to_date))
}

fn parse_optional_date(date_str: Option<&str>) -> Result<Option<NaiveDate>> {
    date_str.map(parse_date).transpose()
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn blank_if_zero(cents: i64) -> String {
    if cents == 0 {
        String::new()
    } else {
        format_cents(cents)
    }
}
