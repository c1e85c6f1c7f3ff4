//! Integration tests: caisse ledger, balances, reports and exchange rates.

mod common;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

use retail_ledger::caisse::CashLedger;
use retail_ledger::domain::{Amount, Currency, DateRange, Operation, OperationContext, Period};
use retail_ledger::rates::{ExchangeRateResolver, RateUpdate};
use retail_ledger::AppError;

fn default_rates() -> HashMap<(Currency, Currency), Decimal> {
    let mut map = HashMap::new();
    map.insert((Currency::Usd, Currency::Cdf), dec!(2200));
    map.insert((Currency::Eur, Currency::Cdf), dec!(2400));
    map.insert((Currency::Usd, Currency::Eur), dec!(0.92));
    map
}

#[tokio::test]
async fn test_entree_sortie_balance() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let ledger = CashLedger::new(pool.clone());
    let ctx = OperationContext::new(tenant.operator_id).with_store(tenant.store_id);

    ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(500)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Vente comptant",
            None,
        )
        .await
        .unwrap();
    ledger
        .record(
            Operation::Sortie,
            Amount::new(dec!(200)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Achat fournitures",
            None,
        )
        .await
        .unwrap();

    let caisse = ledger
        .balance(&[tenant.store_id], Some(Currency::Usd), None)
        .await
        .unwrap();

    assert_eq!(caisse.total_in, dec!(500));
    assert_eq!(caisse.total_out, dec!(200));
    assert_eq!(caisse.current_balance, dec!(300));
}

#[tokio::test]
async fn test_record_rejects_unaccepted_currency() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let ledger = CashLedger::new(pool.clone());
    let ctx = OperationContext::new(tenant.operator_id);

    // The seeded store accepts USD and CDF only
    let err = ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(10)).unwrap(),
            Currency::Eur,
            tenant.store_id,
            &ctx,
            "Devise refusée",
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));

    let caisse = ledger.balance(&[tenant.store_id], None, None).await.unwrap();
    assert_eq!(caisse.total_in, Decimal::ZERO);
}

#[tokio::test]
async fn test_period_filter_recomputes_balance() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let ledger = CashLedger::new(pool.clone());
    let ctx = OperationContext::new(tenant.operator_id);

    // One entry last month, one today
    ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(100)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Ancienne vente",
            Some(Utc::now() - Duration::days(40)),
        )
        .await
        .unwrap();
    ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(30)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Vente du jour",
            None,
        )
        .await
        .unwrap();

    let today = ledger
        .balance(&[tenant.store_id], Some(Currency::Usd), Some(Period::Jour))
        .await
        .unwrap();
    assert_eq!(today.total_in, dec!(30));

    let all = ledger
        .balance(&[tenant.store_id], Some(Currency::Usd), None)
        .await
        .unwrap();
    assert_eq!(all.total_in, dec!(130));
}

#[tokio::test]
async fn test_report_daily_buckets_accumulate() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let ledger = CashLedger::new(pool.clone());
    let ctx = OperationContext::new(tenant.operator_id);

    let now = Utc::now();
    // Opening balance: one entry well before the range
    ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(1000)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Solde initial",
            Some(now - Duration::days(10)),
        )
        .await
        .unwrap();
    // Two days of activity inside the range
    ledger
        .record(
            Operation::Entree,
            Amount::new(dec!(200)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Jour 1",
            Some(now - Duration::days(2)),
        )
        .await
        .unwrap();
    ledger
        .record(
            Operation::Sortie,
            Amount::new(dec!(50)).unwrap(),
            Currency::Usd,
            tenant.store_id,
            &ctx,
            "Jour 2",
            Some(now - Duration::days(1)),
        )
        .await
        .unwrap();

    let range = DateRange::new(now - Duration::days(3), now);
    let rapport = ledger
        .report(&[tenant.store_id], Some(Currency::Usd), range)
        .await
        .unwrap();

    assert_eq!(rapport.opening_balance, dec!(1000));
    assert_eq!(rapport.total_in, dec!(200));
    assert_eq!(rapport.total_out, dec!(50));
    assert_eq!(rapport.closing_balance, dec!(1150));

    // Buckets in date order, running balance accumulated from opening
    assert!(!rapport.daily.is_empty());
    let dates: Vec<_> = rapport.daily.iter().map(|b| b.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    assert_eq!(
        rapport.daily.last().unwrap().running_balance,
        rapport.closing_balance
    );
}

#[tokio::test]
async fn test_default_rate_fallback_is_stable_and_side_effect_free() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let resolver = ExchangeRateResolver::new(pool.clone(), default_rates());

    // Company has no configured rates: system default applies
    let first = resolver
        .resolve(tenant.company_id, Currency::Usd, Currency::Cdf)
        .await
        .unwrap();
    let second = resolver
        .resolve(tenant.company_id, Currency::Usd, Currency::Cdf)
        .await
        .unwrap();
    assert_eq!(first, dec!(2200));
    assert_eq!(first, second);

    // Resolution writes nothing
    let history = resolver
        .history(tenant.company_id, None, None, None)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_rate_update_resolve_and_history() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let resolver = ExchangeRateResolver::new(pool.clone(), default_rates());
    let user_id = Uuid::new_v4();

    resolver
        .update(
            tenant.company_id,
            user_id,
            vec![RateUpdate {
                from: Currency::Usd,
                to: Currency::Cdf,
                rate: dec!(2250),
                reason: Some("Taux du marché".to_string()),
            }],
        )
        .await
        .unwrap();

    let forward = resolver
        .resolve(tenant.company_id, Currency::Usd, Currency::Cdf)
        .await
        .unwrap();
    assert_eq!(forward, dec!(2250));

    // Inverse is derived: forward x backward == 1 within tolerance
    let backward = resolver
        .resolve(tenant.company_id, Currency::Cdf, Currency::Usd)
        .await
        .unwrap();
    assert!((forward * backward - Decimal::ONE).abs() < dec!(0.0000001));

    let history = resolver
        .history(tenant.company_id, Some(Currency::Usd), Some(Currency::Cdf), None)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rate, dec!(2250));
    assert_eq!(history[0].previous_rate, None);
    assert_eq!(history[0].updated_by, user_id);

    // Updating again records the previous rate
    resolver
        .update(
            tenant.company_id,
            user_id,
            vec![RateUpdate {
                from: Currency::Usd,
                to: Currency::Cdf,
                rate: dec!(2300),
                reason: None,
            }],
        )
        .await
        .unwrap();
    let history = resolver
        .history(tenant.company_id, Some(Currency::Usd), Some(Currency::Cdf), None)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].previous_rate, Some(dec!(2250)));
}

#[tokio::test]
async fn test_rate_update_validates_before_any_write() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let resolver = ExchangeRateResolver::new(pool.clone(), default_rates());

    let err = resolver
        .update(
            tenant.company_id,
            Uuid::new_v4(),
            vec![
                RateUpdate {
                    from: Currency::Usd,
                    to: Currency::Cdf,
                    rate: dec!(2250),
                    reason: None,
                },
                RateUpdate {
                    from: Currency::Eur,
                    to: Currency::Eur,
                    rate: dec!(1),
                    reason: None,
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // The valid first entry must not have been applied
    let rate = resolver
        .resolve(tenant.company_id, Currency::Usd, Currency::Cdf)
        .await
        .unwrap();
    assert_eq!(rate, dec!(2200));
}

#[tokio::test]
async fn test_convert_rounds_to_cents() {
    let pool = common::setup_test_db().await;
    let tenant = common::seed_tenant(&pool).await;
    let resolver = ExchangeRateResolver::new(pool.clone(), default_rates());

    let converted = resolver
        .convert(tenant.company_id, dec!(100), Currency::Usd, Currency::Cdf)
        .await
        .unwrap();
    assert_eq!(converted, dec!(220000.00));

    // Derived inverse needs rounding: 100 CDF -> USD at 1/2200
    let converted = resolver
        .convert(tenant.company_id, dec!(100), Currency::Cdf, Currency::Usd)
        .await
        .unwrap();
    assert_eq!(converted, dec!(0.05));
}
