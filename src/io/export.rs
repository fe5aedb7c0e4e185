use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{
    AccountAmount, BalanceSheet, IncomeComparison, IncomeStatement, LedgerService,
};
use crate::domain::{format_cents_plain, Account, Invoice, JournalEntry, Side};

/// Database snapshot for full export/import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub entries: Vec<JournalEntry>,
    pub invoices: Vec<Invoice>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the whole chart of accounts, archived ones included, to CSV.
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(true).await?;
        write_accounts_csv(writer, &accounts)?;
        Ok(accounts.len())
    }

    /// Export the journal to CSV, one row per line.
    pub async fn export_journal_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.list_all_entries().await?;
        let labels = self.service.account_labels().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "entry_id",
            "sequence",
            "date",
            "status",
            "description",
            "reference",
            "account",
            "debit",
            "credit",
            "memo",
        ])?;

        let mut count = 0;
        for entry in &entries {
            for line in &entry.lines {
                let account = labels
                    .get(&line.account_id)
                    .cloned()
                    .unwrap_or_else(|| line.account_id.to_string());
                let (debit, credit) = match line.side {
                    Side::Debit => (format_cents_plain(line.amount_cents), String::new()),
                    Side::Credit => (String::new(), format_cents_plain(line.amount_cents)),
                };

                csv_writer.write_record([
                    entry.id.to_string(),
                    entry.sequence.map(|s| s.to_string()).unwrap_or_default(),
                    entry.date.to_string(),
                    entry.status.as_str().to_string(),
                    entry.description.clone(),
                    entry.reference.clone().unwrap_or_default(),
                    account,
                    debit,
                    credit,
                    line.memo.clone().unwrap_or_default(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the trial balance at `as_of` to CSV, with a closing totals row.
    pub async fn export_trial_balance_csv<W: Write>(
        &self,
        writer: W,
        as_of: Option<NaiveDate>,
    ) -> Result<usize> {
        let tb = self.service.trial_balance(as_of).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["code", "name", "category", "debit", "credit"])?;
        for row in &tb.rows {
            csv_writer.write_record([
                row.account_code.as_str(),
                row.account_name.as_str(),
                row.category.as_str(),
                &format_cents_plain(row.debit),
                &format_cents_plain(row.credit),
            ])?;
        }
        csv_writer.write_record([
            "",
            "TOTAL",
            "",
            &format_cents_plain(tb.total_debits),
            &format_cents_plain(tb.total_credits),
        ])?;

        csv_writer.flush()?;
        Ok(tb.rows.len())
    }

    /// Export one account's ledger over `[from, to]` to CSV.
    pub async fn export_statement_csv<W: Write>(
        &self,
        writer: W,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<usize> {
        let statement = self.service.account_statement(code, from, to).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["date", "description", "debit", "credit", "balance"])?;
        csv_writer.write_record([
            from.map(|d| d.to_string()).unwrap_or_default(),
            "Opening balance".to_string(),
            String::new(),
            String::new(),
            format_cents_plain(statement.opening_balance),
        ])?;
        for line in &statement.lines {
            csv_writer.write_record([
                line.date.to_string(),
                line.description.clone(),
                format_cents_plain(line.debit),
                format_cents_plain(line.credit),
                format_cents_plain(line.balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(statement.lines.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let accounts = self.service.list_accounts(true).await?;
        let entries = self.service.list_all_entries().await?;
        let invoices = self.service.list_invoices(None).await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            entries,
            invoices,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

/// Write accounts in the layout `Importer::import_accounts_csv` reads back,
/// archival state included.
pub fn write_accounts_csv<W: Write>(writer: W, accounts: &[Account]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "code",
        "name",
        "category",
        "opening_balance",
        "description",
        "archived",
    ])?;

    for account in accounts {
        csv_writer.write_record([
            account.code.as_str(),
            account.name.as_str(),
            account.category.as_str(),
            &format_cents_plain(account.opening_balance),
            account.description.as_deref().unwrap_or(""),
            if account.is_archived() { "yes" } else { "no" },
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn write_amount_rows<W: Write>(
    csv_writer: &mut csv::Writer<W>,
    section: &str,
    rows: &[AccountAmount],
) -> Result<()> {
    for row in rows {
        csv_writer.write_record([
            section,
            row.account_code.as_str(),
            row.account_name.as_str(),
            &format_cents_plain(row.amount),
        ])?;
    }
    Ok(())
}

pub fn write_income_statement_csv<W: Write>(writer: W, report: &IncomeStatement) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["section", "code", "name", "amount"])?;
    write_amount_rows(&mut csv_writer, "revenue", &report.revenue)?;
    write_amount_rows(&mut csv_writer, "expense", &report.expenses)?;
    csv_writer.write_record(["net", "", "", &format_cents_plain(report.net_income)])?;

    csv_writer.flush()?;
    Ok(())
}

pub fn write_income_comparison_csv<W: Write>(writer: W, report: &IncomeComparison) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["period", "start", "end", "revenue", "expenses", "net_income"])?;
    for (label, summary) in [
        ("current", &report.current_period),
        ("previous", &report.previous_period),
    ] {
        csv_writer.write_record([
            label.to_string(),
            summary.period_start.to_string(),
            summary.period_end.to_string(),
            format_cents_plain(summary.total_revenue),
            format_cents_plain(summary.total_expenses),
            format_cents_plain(summary.net_income),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn write_balance_sheet_csv<W: Write>(writer: W, report: &BalanceSheet) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["section", "code", "name", "amount"])?;
    write_amount_rows(&mut csv_writer, "asset", &report.assets)?;
    write_amount_rows(&mut csv_writer, "liability", &report.liabilities)?;
    write_amount_rows(&mut csv_writer, "equity", &report.equity)?;
    csv_writer.write_record([
        "current_earnings",
        "",
        "",
        &format_cents_plain(report.current_earnings),
    ])?;

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_income_statement_csv_quotes_names() {
        let report = IncomeStatement {
            from_date: date("2024-01-01"),
            to_date: date("2024-01-31"),
            revenue: vec![AccountAmount {
                account_code: "4000".into(),
                account_name: "Sales, \"retail\"".into(),
                amount: 150050,
            }],
            expenses: vec![AccountAmount {
                account_code: "5000".into(),
                account_name: "Rent\r\nOffice".into(),
                amount: 50000,
            }],
            total_revenue: 150050,
            total_expenses: 50000,
            net_income: 100050,
        };

        let mut buffer = Vec::new();
        write_income_statement_csv(&mut buffer, &report).unwrap();
        let csv = String::from_utf8(buffer).unwrap();

        assert!(csv.starts_with("section,code,name,amount\n"));
        assert!(csv.contains("revenue,4000,\"Sales, \"\"retail\"\"\",1500.50\n"));
        assert!(csv.contains("expense,5000,\"Rent\r\nOffice\",500.00\n"));
        assert!(csv.ends_with("net,,,1000.50\n"));
    }

    #[test]
    fn test_balance_sheet_csv_sections() {
        let report = BalanceSheet {
            as_of: None,
            assets: vec![AccountAmount {
                account_code: "1000".into(),
                account_name: "Cash".into(),
                amount: 1000,
            }],
            liabilities: Vec::new(),
            equity: vec![AccountAmount {
                account_code: "3000".into(),
                account_name: "Capital".into(),
                amount: 800,
            }],
            total_assets: 1000,
            total_liabilities: 0,
            total_equity: 800,
            current_earnings: 200,
        };

        let mut buffer = Vec::new();
        write_balance_sheet_csv(&mut buffer, &report).unwrap();
        let csv = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "section,code,name,amount",
                "asset,1000,Cash,10.00",
                "equity,3000,Capital,8.00",
                "current_earnings,,,2.00",
            ]
        );
    }
}
