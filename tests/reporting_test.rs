mod common;

use anyhow::Result;
use common::{parse_date, test_service, StandardChart};
use tallybook::application::{AppError, LedgerService};
use tallybook::domain::PeriodType;

async fn seed_two_months(service: &LedgerService) -> Result<()> {
    StandardChart::fund_bank(service, 1000000, "2024-01-01").await?;

    // January: sales 4000, services 1000, rent 1500, supplies 200
    StandardChart::post(
        service,
        "2024-01-05",
        "Sales",
        StandardChart::BANK,
        StandardChart::SALES,
        400000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-01-12",
        "Consulting",
        StandardChart::BANK,
        StandardChart::SERVICES,
        100000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-01-15",
        "Rent",
        StandardChart::RENT,
        StandardChart::BANK,
        150000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-01-20",
        "Paper",
        StandardChart::SUPPLIES,
        StandardChart::CASH,
        20000,
    )
    .await?;

    // February: sales 3000, rent 1500
    StandardChart::post(
        service,
        "2024-02-05",
        "Sales",
        StandardChart::BANK,
        StandardChart::SALES,
        300000,
    )
    .await?;
    StandardChart::post(
        service,
        "2024-02-15",
        "Rent",
        StandardChart::RENT,
        StandardChart::BANK,
        150000,
    )
    .await?;

    Ok(())
}

#[tokio::test]
async fn test_income_statement_for_month() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_two_months(&service).await?;

    let january = service
        .income_statement(parse_date("2024-01-01"), parse_date("2024-01-31"))
        .await?;

    assert_eq!(january.total_revenue, 500000);
    assert_eq!(january.total_expenses, 170000);
    assert_eq!(january.net_income, 330000);
    assert_eq!(january.revenue.len(), 2);
    assert_eq!(january.expenses.len(), 2);
    assert_eq!(january.revenue[0].account_code, StandardChart::SALES);

    // Owner investment is equity, not income
    assert!(january
        .revenue
        .iter()
        .all(|r| r.account_code != StandardChart::CAPITAL));

    Ok(())
}

#[tokio::test]
async fn test_income_statement_skips_quiet_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_two_months(&service).await?;

    let february = service
        .income_statement(parse_date("2024-02-01"), parse_date("2024-02-29"))
        .await?;

    assert_eq!(february.revenue.len(), 1);
    assert_eq!(february.expenses.len(), 1);
    assert_eq!(february.net_income, 150000);

    Ok(())
}

#[tokio::test]
async fn test_income_statement_nets_reversals() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    let sale = StandardChart::post(
        &service,
        "2024-03-03",
        "Sale",
        StandardChart::CASH,
        StandardChart::SALES,
        50000,
    )
    .await?;
    service.reverse_entry(sale.id, None).await?;

    let march = service
        .income_statement(parse_date("2024-03-01"), parse_date("2024-03-31"))
        .await?;
    assert_eq!(march.total_revenue, 0);
    assert!(march.revenue.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_income_statement_rejects_inverted_range() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .income_statement(parse_date("2024-02-01"), parse_date("2024-01-01"))
        .await;
    assert!(matches!(result, Err(AppError::InvalidDateRange { .. })));

    Ok(())
}

#[tokio::test]
async fn test_compare_months() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_two_months(&service).await?;

    let comparison = service
        .compare_income(PeriodType::Monthly, parse_date("2024-02-20"))
        .await?;

    assert_eq!(comparison.current_period.period_start, parse_date("2024-02-01"));
    assert_eq!(comparison.current_period.period_end, parse_date("2024-02-29"));
    assert_eq!(comparison.previous_period.period_start, parse_date("2024-01-01"));
    assert_eq!(comparison.current_period.net_income, 150000);
    assert_eq!(comparison.previous_period.net_income, 330000);
    assert_eq!(comparison.change, -180000);
    assert!((comparison.change_percentage - (-180000.0 / 330000.0 * 100.0)).abs() < 0.01);

    Ok(())
}

#[tokio::test]
async fn test_compare_against_empty_period() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_two_months(&service).await?;

    let comparison = service
        .compare_income(PeriodType::Quarterly, parse_date("2024-03-31"))
        .await?;

    assert_eq!(comparison.current_period.net_income, 480000);
    assert_eq!(comparison.previous_period.net_income, 0);
    assert_eq!(comparison.change_percentage, 0.0);

    Ok(())
}

#[tokio::test]
async fn test_balance_sheet_balances_with_current_earnings() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    seed_two_months(&service).await?;

    let sheet = service.balance_sheet(None).await?;

    // Bank 10000 + 4000 + 1000 - 1500 + 3000 - 1500, Cash -200
    assert_eq!(sheet.total_assets, 1480000);
    assert_eq!(sheet.total_liabilities, 0);
    assert_eq!(sheet.total_equity, 1000000);
    assert_eq!(sheet.current_earnings, 480000);
    assert!(sheet.is_balanced());

    let january = service
        .balance_sheet(Some(parse_date("2024-01-31")))
        .await?;
    assert_eq!(january.current_earnings, 330000);
    assert!(january.is_balanced());

    Ok(())
}

#[tokio::test]
async fn test_balance_sheet_includes_opening_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.set_opening_balance(StandardChart::BANK, 300000).await?;
    service.set_opening_balance(StandardChart::PAYABLE, 100000).await?;
    service.set_opening_balance(StandardChart::CAPITAL, 200000).await?;

    let sheet = service.balance_sheet(None).await?;
    assert_eq!(sheet.total_assets, 300000);
    assert_eq!(sheet.total_liabilities, 100000);
    assert_eq!(sheet.total_equity, 200000);
    assert!(sheet.is_balanced());

    Ok(())
}
