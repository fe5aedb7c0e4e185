use serde::{Deserialize, Serialize};

use super::{format_cents, Cents, TrialBalance};

/// Raw counters gathered by storage for an integrity check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub draft_count: i64,
    pub has_sequence_gaps: bool,
    /// Posted entries whose stored lines no longer balance
    pub unbalanced_entries: i64,
    pub invalid_amounts: i64,
    pub dangling_account_refs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub entry_count: i64,
    pub draft_count: i64,
    pub has_sequence_gaps: bool,
    pub unbalanced_entries: i64,
    pub invalid_amounts: i64,
    pub dangling_account_refs: i64,
    pub opening_difference: Cents,
    pub trial_balance: TrialBalance,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(
    stats: IntegrityStats,
    opening_difference: Cents,
    trial_balance: TrialBalance,
) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.has_sequence_gaps {
        issues.push("Journal sequence numbers have gaps".to_string());
    }
    if stats.unbalanced_entries > 0 {
        issues.push(format!(
            "{} posted entries do not balance",
            stats.unbalanced_entries
        ));
    }
    if stats.invalid_amounts > 0 {
        issues.push(format!(
            "{} journal lines have non-positive amounts",
            stats.invalid_amounts
        ));
    }
    if stats.dangling_account_refs > 0 {
        issues.push(format!(
            "{} journal lines reference unknown accounts",
            stats.dangling_account_refs
        ));
    }
    if opening_difference != 0 {
        issues.push(format!(
            "Opening balances are off by {} (debit-normal minus credit-normal)",
            format_cents(opening_difference)
        ));
    }
    if !trial_balance.is_balanced() {
        issues.push(format!(
            "Trial balance does not balance: debits {} vs credits {}",
            format_cents(trial_balance.total_debits),
            format_cents(trial_balance.total_credits)
        ));
    }

    IntegrityReport {
        account_count: stats.account_count,
        entry_count: stats.entry_count,
        draft_count: stats.draft_count,
        has_sequence_gaps: stats.has_sequence_gaps,
        unbalanced_entries: stats.unbalanced_entries,
        invalid_amounts: stats.invalid_amounts,
        dangling_account_refs: stats.dangling_account_refs,
        opening_difference,
        trial_balance,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_tb() -> TrialBalance {
        TrialBalance {
            as_of: None,
            rows: Vec::new(),
            total_debits: 500,
            total_credits: 500,
        }
    }

    #[test]
    fn test_clean_report_is_healthy() {
        let report = build_integrity_report(IntegrityStats::default(), 0, balanced_tb());
        assert!(report.is_healthy());
    }

    #[test]
    fn test_issues_are_collected() {
        let stats = IntegrityStats {
            has_sequence_gaps: true,
            unbalanced_entries: 2,
            ..Default::default()
        };
        let mut tb = balanced_tb();
        tb.total_credits = 400;

        let report = build_integrity_report(stats, 100, tb);

        assert!(!report.is_healthy());
        assert_eq!(report.issues.len(), 4);
        assert!(report.issues[0].contains("gaps"));
        assert!(report.issues[3].contains("5.00 vs credits 4.00"));
    }
}
