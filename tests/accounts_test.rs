mod common;

use anyhow::Result;
use common::{simple_entry, test_service, StandardChart};
use tallybook::application::AppError;
use tallybook::domain::AccountCategory;

#[tokio::test]
async fn test_create_and_list_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    let accounts = service.list_accounts(false).await?;
    assert_eq!(accounts.len(), 9);

    // Ordered by code
    let codes: Vec<&str> = accounts.iter().map(|a| a.code.as_str()).collect();
    let mut sorted = codes.clone();
    sorted.sort();
    assert_eq!(codes, sorted);

    let rent = service.get_account(StandardChart::RENT).await?;
    assert_eq!(rent.name, "Rent Expense");
    assert_eq!(rent.category, AccountCategory::Expense);
    assert!(rent.is_active());

    Ok(())
}

#[tokio::test]
async fn test_duplicate_code_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    let result = service
        .create_account(
            StandardChart::CASH.into(),
            "Petty Cash".into(),
            AccountCategory::Asset,
            0,
            None,
        )
        .await;
    assert!(matches!(result, Err(AppError::AccountAlreadyExists(_))));

    Ok(())
}

#[tokio::test]
async fn test_blank_code_or_name_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .create_account("  ".into(), "Cash".into(), AccountCategory::Asset, 0, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidAccount(_))));

    let result = service
        .create_account("1000".into(), "".into(), AccountCategory::Asset, 0, None)
        .await;
    assert!(matches!(result, Err(AppError::InvalidAccount(_))));

    Ok(())
}

#[tokio::test]
async fn test_unknown_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.get_account("9999").await;
    assert!(matches!(result, Err(AppError::AccountNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_opening_balance_counts_towards_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    service.set_opening_balance(StandardChart::BANK, 250000).await?;
    service.set_opening_balance(StandardChart::CAPITAL, 250000).await?;

    let bank = service.get_balance(StandardChart::BANK, None).await?;
    assert_eq!(bank.balance, 250000);

    // Opening balances on both sides keep the books balanced
    let tb = service.trial_balance(None).await?;
    assert!(tb.is_balanced());
    assert_eq!(tb.total_debits, 250000);

    Ok(())
}

#[tokio::test]
async fn test_archive_requires_zero_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    StandardChart::fund_bank(&service, 100000, "2024-01-01").await?;

    let result = service.archive_account(StandardChart::BANK).await;
    assert!(matches!(
        result,
        Err(AppError::AccountHasBalance { balance: 100000, .. })
    ));

    // Move everything out and archiving succeeds
    StandardChart::post(
        &service,
        "2024-01-02",
        "Move to cash",
        StandardChart::CASH,
        StandardChart::BANK,
        100000,
    )
    .await?;
    let archived = service.archive_account(StandardChart::BANK).await?;
    assert!(archived.is_archived());

    assert_eq!(service.list_accounts(false).await?.len(), 8);
    assert_eq!(service.list_accounts(true).await?.len(), 9);

    Ok(())
}

#[tokio::test]
async fn test_archive_blocked_by_drafts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;

    service
        .record_entry(simple_entry(
            "2024-01-05",
            "Supplies on account",
            StandardChart::SUPPLIES,
            StandardChart::PAYABLE,
            4500,
            false,
        ))
        .await?;

    let result = service.archive_account(StandardChart::SUPPLIES).await;
    assert!(matches!(result, Err(AppError::AccountHasDrafts { count: 1, .. })));

    Ok(())
}

#[tokio::test]
async fn test_archived_account_rejects_new_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardChart::create(&service).await?;
    service.archive_account(StandardChart::CASH).await?;

    let result = service
        .record_entry(simple_entry(
            "2024-01-05",
            "Cash sale",
            StandardChart::CASH,
            StandardChart::SALES,
            1000,
            true,
        ))
        .await;
    assert!(matches!(result, Err(AppError::AccountArchived(_))));

    // Archiving twice is an error too
    let result = service.archive_account(StandardChart::CASH).await;
    assert!(matches!(result, Err(AppError::AccountArchived(_))));

    Ok(())
}
