mod common;

use anyhow::Result;
use common::{parse_date, simple_entry, test_service, StandardChart};
use tallybook::application::AppError;
use tallybook::domain::LedgerError;

/// Bank activity used by most tests here:
/// Jan 1 +5000.00, Jan 15 -1200.00, Feb 1 -1200.00, Feb 10 +300.00
async fn seed_bank_activity(service: &tallybook::application::LedgerService) -> Result<()> {
    StandardChart::fund_bank(service, 500000, "2024-01-01").await?;
    StandardChart::post(
        service,
        "2024-01-15",
        "January rent",
        StandardChart::RENT,
        StandardChart::BANK,
        120000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-02-01",
        "February rent",
        StandardChart::RENT,
        StandardChart::BANK,
        120000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-02-10",
        "Consulting paid by transfer",
        StandardChart::BANK,
        StandardChart::SERVICES,
        30000,
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn test_statement_running_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;

    let statement = service
        .account_statement(StandardChart::BANK, None, None)
        .await?;

    assert_eq!(statement.opening_balance, 0);
    let balances: Vec<i64> = statement.lines.iter().map(|l| l.balance).collect();
    assert_eq!(balances, vec![500000, 380000, 260000, 290000]);
    assert_eq!(statement.total_debits, 530000);
    assert_eq!(statement.total_credits, 240000);
    assert_eq!(statement.closing_balance, 290000);

    Ok(())
}

#[tokio::test]
async fn test_statement_over_range_carries_opening_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.set_opening_balance(StandardChart::BANK, 10000).await?;
    seed_bank_activity(&service).await?;

    let february = service
        .account_statement(
            StandardChart::BANK,
            Some(parse_date("2024-02-01")),
            Some(parse_date("2024-02-29")),
        )
        .await?;

    // Account opening 100.00 + January net 3800.00
    assert_eq!(february.opening_balance, 390000);
    assert_eq!(february.lines.len(), 2);
    assert_eq!(february.lines[0].credit, 120000);
    assert_eq!(february.lines[0].balance, 270000);
    assert_eq!(february.lines[1].debit, 30000);
    assert_eq!(february.closing_balance, 300000);

    Ok(())
}

#[tokio::test]
async fn test_statement_orders_same_day_lines_by_posting() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    // Posted out of date order: the later-dated entry first
    StandardChart::post(
        &service,
        "2024-03-02",
        "Second",
        StandardChart::CASH,
        StandardChart::SALES,
        200,
    )
    .await?;
    StandardChart::post(
        &service,
        "2024-03-01",
        "First",
        StandardChart::CASH,
        StandardChart::SALES,
        100,
    )
    .await?;
    StandardChart::post(
        &service,
        "2024-03-02",
        "Third",
        StandardChart::CASH,
        StandardChart::SALES,
        300,
    )
    .await?;

    let statement = service
        .account_statement(StandardChart::CASH, None, None)
        .await?;
    let descriptions: Vec<&str> = statement
        .lines
        .iter()
        .map(|l| l.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["First", "Second", "Third"]);
    assert_eq!(statement.lines[2].balance, 600);

    Ok(())
}

#[tokio::test]
async fn test_statement_ignores_drafts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;
    service
        .record_entry(simple_entry(
            "2024-01-20",
            "Unapproved",
            StandardChart::SUPPLIES,
            StandardChart::BANK,
            5000,
            false,
        ))
        .await?;

    let statement = service
        .account_statement(StandardChart::BANK, None, None)
        .await?;
    assert_eq!(statement.lines.len(), 4);
    assert_eq!(statement.closing_balance, 290000);

    Ok(())
}

#[tokio::test]
async fn test_statement_rejects_inverted_range() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    let result = service
        .account_statement(
            StandardChart::BANK,
            Some(parse_date("2024-02-01")),
            Some(parse_date("2024-01-01")),
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidDateRange { .. })));

    Ok(())
}

#[tokio::test]
async fn test_trial_balance_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;

    let tb = service.trial_balance(None).await?;
    assert!(tb.is_balanced());
    assert_eq!(tb.difference(), 0);
    // Bank 2900 + Rent 2400 on the debit side
    assert_eq!(tb.total_debits, 530000);
    assert_eq!(tb.total_credits, 530000);

    // Every active account has a row, even at zero
    assert_eq!(tb.rows.len(), 9);
    let capital = tb
        .rows
        .iter()
        .find(|r| r.account_code == StandardChart::CAPITAL)
        .unwrap();
    assert_eq!(capital.credit, 500000);
    assert_eq!(capital.debit, 0);

    Ok(())
}

#[tokio::test]
async fn test_trial_balance_as_of_date() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;

    let january = service.trial_balance(Some(parse_date("2024-01-31"))).await?;
    assert!(january.is_balanced());
    assert_eq!(january.total_debits, 500000);

    let bank = january
        .rows
        .iter()
        .find(|r| r.account_code == StandardChart::BANK)
        .unwrap();
    assert_eq!(bank.debit, 380000);

    Ok(())
}

#[tokio::test]
async fn test_overdrawn_account_moves_to_credit_column() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    StandardChart::post(
        &service,
        "2024-01-05",
        "Overdraft rent",
        StandardChart::RENT,
        StandardChart::BANK,
        50000,
    )
    .await?;

    let tb = service.trial_balance(None).await?;
    let bank = tb
        .rows
        .iter()
        .find(|r| r.account_code == StandardChart::BANK)
        .unwrap();
    assert_eq!(bank.balance, -50000);
    assert_eq!(bank.debit, 0);
    assert_eq!(bank.credit, 50000);
    assert!(tb.is_balanced());

    Ok(())
}

#[tokio::test]
async fn test_archived_empty_account_left_out_of_trial_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.archive_account(StandardChart::CASH).await?;

    let tb = service.trial_balance(None).await?;
    assert_eq!(tb.rows.len(), 8);
    assert!(tb.rows.iter().all(|r| r.account_code != StandardChart::CASH));

    Ok(())
}

#[tokio::test]
async fn test_balances_for_all_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;

    let balances = service.get_all_balances(None).await?;
    let rent = balances
        .iter()
        .find(|b| b.account.code == StandardChart::RENT)
        .unwrap();
    assert_eq!(rent.balance, 240000);
    let services = balances
        .iter()
        .find(|b| b.account.code == StandardChart::SERVICES)
        .unwrap();
    assert_eq!(services.balance, 30000);

    let as_of = service
        .get_all_balances(Some(parse_date("2024-01-20")))
        .await?;
    let rent = as_of
        .iter()
        .find(|b| b.account.code == StandardChart::RENT)
        .unwrap();
    assert_eq!(rent.balance, 120000);

    Ok(())
}

#[tokio::test]
async fn test_integrity_check_on_healthy_books() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_bank_activity(&service).await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.account_count, 9);
    assert_eq!(report.entry_count, 4);
    assert_eq!(report.draft_count, 0);
    assert!(!report.has_sequence_gaps);
    assert_eq!(report.opening_difference, 0);

    Ok(())
}

#[tokio::test]
async fn test_integrity_flags_one_sided_opening_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.set_opening_balance(StandardChart::BANK, 10000).await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert_eq!(report.opening_difference, 10000);
    assert!(!report.trial_balance.is_balanced());

    Ok(())
}

#[tokio::test]
async fn test_balance_out_of_range_is_reported_not_wrapped() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.set_opening_balance(StandardChart::CASH, i64::MAX).await?;
    StandardChart::post(
        &service,
        "2024-01-05",
        "Sale",
        StandardChart::CASH,
        StandardChart::SALES,
        1,
    )
    .await?;

    let result = service.trial_balance(None).await;
    assert!(matches!(
        result,
        Err(AppError::Ledger(LedgerError::BalanceOverflow(code))) if code == StandardChart::CASH
    ));
    assert!(matches!(
        service.get_balance(StandardChart::CASH, None).await,
        Err(AppError::Ledger(_))
    ));
    assert!(service.balance_sheet(None).await.is_err());
    assert!(service.check_integrity().await.is_err());

    // Other accounts still report normally
    assert_eq!(service.get_balance(StandardChart::SALES, None).await?.balance, 1);

    Ok(())
}
