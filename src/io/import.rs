use anyhow::{Context, Result};
use std::io::Read;
use tracing::{debug, info};

use crate::application::{AppError, LedgerService};
use crate::domain::{parse_cents, AccountCategory};
use crate::io::export::LedgerSnapshot;

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    fn absorb(&mut self, other: ImportResult) {
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    /// CSV line number, or position within its section for JSON
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
    pub validate_only: bool,
}

impl ImportOptions {
    fn writes(&self) -> bool {
        !(self.dry_run || self.validate_only)
    }
}

/// Importer for loading data into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import a chart of accounts from CSV with the columns
    /// `code,name,category,opening_balance,description`, plus the optional
    /// `archived` column (`yes`/`no`) that the accounts export writes.
    /// Archived rows are created and then archived, which only succeeds for
    /// accounts without a balance.
    pub async fn import_accounts_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut result = ImportResult::default();

        for (line_num, record) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let code = record.get(0).unwrap_or("").trim();
            let name = record.get(1).unwrap_or("").trim();
            let category_str = record.get(2).unwrap_or("");
            let opening_str = record.get(3).unwrap_or("").trim();
            let description = record
                .get(4)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let archived_str = record.get(5).unwrap_or("").trim();

            if code.is_empty() {
                result.errors.push(ImportError {
                    line,
                    field: Some("code".to_string()),
                    error: "Account code is required".to_string(),
                });
                continue;
            }

            let category: AccountCategory = match category_str.parse() {
                Ok(c) => c,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: Some("category".to_string()),
                        error: e,
                    });
                    continue;
                }
            };

            let opening_balance = if opening_str.is_empty() {
                0
            } else {
                match parse_cents(opening_str) {
                    Ok(a) => a,
                    Err(e) => {
                        result.errors.push(ImportError {
                            line,
                            field: Some("opening_balance".to_string()),
                            error: format!("Invalid amount: {}", e),
                        });
                        continue;
                    }
                }
            };

            let archived = match parse_flag(archived_str) {
                Some(flag) => flag,
                None => {
                    result.errors.push(ImportError {
                        line,
                        field: Some("archived".to_string()),
                        error: format!("Expected yes or no, got '{}'", archived_str),
                    });
                    continue;
                }
            };

            match self.service.get_account(code).await {
                Ok(_) if options.skip_duplicates => {
                    result.skipped += 1;
                    continue;
                }
                Ok(_) => {
                    result.errors.push(ImportError {
                        line,
                        field: Some("code".to_string()),
                        error: format!("Account already exists: {}", code),
                    });
                    continue;
                }
                Err(AppError::AccountNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }

            if !options.writes() {
                result.imported += 1;
                continue;
            }

            match self
                .service
                .create_account(
                    code.to_string(),
                    name.to_string(),
                    category,
                    opening_balance,
                    description,
                )
                .await
            {
                Ok(_) => result.imported += 1,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            if archived {
                if let Err(e) = self.service.archive_account(code).await {
                    result.errors.push(ImportError {
                        line,
                        field: Some("archived".to_string()),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            imported = result.imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            "accounts import finished"
        );
        Ok(result)
    }

    /// Import a full JSON snapshot: accounts first, then entries in posting
    /// order, then invoices. Ids are kept.
    pub async fn import_full_json<R: Read>(
        &self,
        mut reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut json = String::new();
        reader
            .read_to_string(&mut json)
            .context("Failed to read snapshot")?;
        let mut snapshot: LedgerSnapshot =
            serde_json::from_str(&json).context("Invalid snapshot JSON")?;
        debug!(version = %snapshot.version, "loaded snapshot");

        // Posted entries by sequence, drafts after them
        snapshot
            .entries
            .sort_by_key(|e| (e.sequence.is_none(), e.sequence, e.created_at));

        let mut result = ImportResult::default();

        let mut accounts = ImportResult::default();
        for (index, account) in snapshot.accounts.iter().enumerate() {
            let outcome = if options.writes() {
                self.service.restore_account(account).await
            } else {
                match self.service.get_account(&account.code).await {
                    Ok(_) => Err(AppError::AccountAlreadyExists(account.code.clone())),
                    Err(AppError::AccountNotFound(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            };
            record_outcome(&mut accounts, index + 1, "accounts", outcome, &options)?;
        }
        result.absorb(accounts);

        let mut entries = ImportResult::default();
        for (index, entry) in snapshot.entries.iter().enumerate() {
            let outcome = if options.writes() {
                self.service.restore_entry(entry).await.map(|_| ())
            } else {
                entry.validate().map_err(AppError::from)
            };
            record_outcome(&mut entries, index + 1, "entries", outcome, &options)?;
        }
        result.absorb(entries);

        let mut invoices = ImportResult::default();
        for (index, invoice) in snapshot.invoices.iter().enumerate() {
            let outcome = if options.writes() {
                self.service.restore_invoice(invoice).await
            } else {
                invoice.validate().map_err(AppError::from)
            };
            record_outcome(&mut invoices, index + 1, "invoices", outcome, &options)?;
        }
        result.absorb(invoices);

        info!(
            imported = result.imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            "snapshot import finished"
        );
        Ok(result)
    }
}

fn is_duplicate(error: &AppError) -> bool {
    matches!(
        error,
        AppError::AccountAlreadyExists(_)
            | AppError::EntryAlreadyExists(_)
            | AppError::InvoiceAlreadyExists(_)
    )
}

/// Fold one record's outcome into `result`. Database failures abort the
/// import; everything else is reported against the record.
fn record_outcome(
    result: &mut ImportResult,
    line: usize,
    section: &str,
    outcome: Result<(), AppError>,
    options: &ImportOptions,
) -> Result<()> {
    match outcome {
        Ok(()) => result.imported += 1,
        Err(e) if is_duplicate(&e) && options.skip_duplicates => result.skipped += 1,
        Err(AppError::Database(e)) => return Err(e),
        Err(e) => result.errors.push(ImportError {
            line,
            field: Some(section.to_string()),
            error: e.to_string(),
        }),
    }
    Ok(())
}

/// Blank means not archived.
fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "" | "no" | "false" | "0" => Some(false),
        "yes" | "true" | "1" => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_errors_are_recognised() {
        assert!(is_duplicate(&AppError::AccountAlreadyExists("1000".into())));
        assert!(is_duplicate(&AppError::InvoiceAlreadyExists("INV-1".into())));
        assert!(!is_duplicate(&AppError::AccountNotFound("1000".into())));
    }

    #[test]
    fn test_record_outcome_skips_duplicates_when_asked() {
        let options = ImportOptions {
            skip_duplicates: true,
            ..Default::default()
        };
        let mut result = ImportResult::default();

        record_outcome(&mut result, 1, "accounts", Ok(()), &options).unwrap();
        record_outcome(
            &mut result,
            2,
            "accounts",
            Err(AppError::AccountAlreadyExists("1000".into())),
            &options,
        )
        .unwrap();
        record_outcome(
            &mut result,
            3,
            "accounts",
            Err(AppError::AccountNotFound("9999".into())),
            &options,
        )
        .unwrap();

        assert_eq!(result.imported, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].line, 3);
    }

    #[test]
    fn test_record_outcome_aborts_on_database_error() {
        let mut result = ImportResult::default();
        let outcome = Err(AppError::Database(anyhow::anyhow!("disk full")));
        let options = ImportOptions::default();
        assert!(record_outcome(&mut result, 1, "entries", outcome, &options).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}
