//! Exchange rate resolution
//!
//! Rates are configured per company (embedded on the company row); the
//! inverse direction is derived algebraically and never stored. When a
//! company has no rate for a pair the system default table from the
//! configuration applies. Every change is audited to an append-only history
//! table, best-effort: a history failure never aborts the rate update.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::Currency;
use crate::error::{AppError, AppResult};
use crate::outbox::{Outbox, OutboxKind, RateHistoryPayload};

/// Decimal places of a converted amount.
const CONVERSION_SCALE: u32 = 2;

/// Default number of history records returned.
const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// One configured rate, embedded in the company's rate set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateEntry {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub is_default: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Uuid,
}

/// Requested change to one currency pair.
#[derive(Debug, Clone)]
pub struct RateUpdate {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub reason: Option<String>,
}

/// Append-only audit record of a rate change.
#[derive(Debug, Clone)]
pub struct RateHistoryRecord {
    pub id: Uuid,
    pub company_id: Uuid,
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub previous_rate: Option<Decimal>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Resolves conversion rates for a tenant.
#[derive(Debug, Clone)]
pub struct ExchangeRateResolver {
    pool: PgPool,
    outbox: Outbox,
    defaults: HashMap<(Currency, Currency), Decimal>,
}

impl ExchangeRateResolver {
    pub fn new(pool: PgPool, defaults: HashMap<(Currency, Currency), Decimal>) -> Self {
        Self {
            outbox: Outbox::new(pool.clone()),
            pool,
            defaults,
        }
    }

    /// Resolve the conversion rate from one currency to another.
    ///
    /// Same currency -> 1. Otherwise: exact company pair, inverse company
    /// pair (1/rate), system default table (exact then inverse), `NotFound`.
    pub async fn resolve(
        &self,
        company_id: Uuid,
        from: Currency,
        to: Currency,
    ) -> AppResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        let entries = self.load_company_rates(company_id).await?;

        resolve_rate(&entries, &self.defaults, from, to).ok_or(AppError::NotFound {
            entity: "ExchangeRate",
            id: format!("{}->{}", from, to),
        })
    }

    /// Convert an amount between currencies.
    ///
    /// Rounded to 2 decimal places with banker's rounding (round half to
    /// even) to minimize cumulative error.
    pub async fn convert(
        &self,
        company_id: Uuid,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> AppResult<Decimal> {
        let rate = self.resolve(company_id, from, to).await?;
        Ok(round_converted(amount * rate))
    }

    /// Merge new rates into the company's configured set.
    ///
    /// Validates every entry up front, writes one history row per changed
    /// pair (best-effort, before the set is committed), then persists the
    /// merged set on the company row.
    pub async fn update(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        updates: Vec<RateUpdate>,
    ) -> AppResult<Vec<ExchangeRateEntry>> {
        for update in &updates {
            if update.from == update.to {
                return Err(AppError::Validation(format!(
                    "Exchange rate cannot target its own currency ({})",
                    update.from
                )));
            }
            if update.rate <= Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "Exchange rate must be positive (got {} for {}->{})",
                    update.rate, update.from, update.to
                )));
            }
        }

        let mut entries = self.load_company_rates(company_id).await?;
        let now = Utc::now();

        for update in updates {
            let previous = entries
                .iter()
                .find(|e| e.from == update.from && e.to == update.to)
                .map(|e| e.rate);

            if previous == Some(update.rate) {
                continue;
            }

            // History first. A failed history write is logged inside the
            // outbox and must not abort the rate update.
            let payload = RateHistoryPayload {
                company_id,
                from: update.from,
                to: update.to,
                rate: update.rate,
                previous_rate: previous,
                updated_by: user_id,
                updated_at: now,
                reason: update.reason.clone(),
            };
            if let Err(e) = self
                .outbox
                .submit(OutboxKind::RateHistory, Uuid::new_v4(), &payload)
                .await
            {
                tracing::warn!(
                    company_id = %company_id,
                    pair = %format!("{}->{}", update.from, update.to),
                    error = %e,
                    "Exchange rate history write skipped"
                );
            }

            let entry = ExchangeRateEntry {
                from: update.from,
                to: update.to,
                rate: update.rate,
                is_default: false,
                updated_at: now,
                updated_by: user_id,
            };
            match entries
                .iter_mut()
                .find(|e| e.from == update.from && e.to == update.to)
            {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        let json = serde_json::to_value(&entries)?;
        let rows = sqlx::query(
            r#"
            UPDATE companies SET exchange_rates = $2, updated_at = NOW() WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(&json)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Company", company_id));
        }

        Ok(entries)
    }

    /// Rate change history, newest first.
    pub async fn history(
        &self,
        company_id: Uuid,
        from: Option<Currency>,
        to: Option<Currency>,
        limit: Option<i64>,
    ) -> AppResult<Vec<RateHistoryRecord>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

        let rows: Vec<(
            Uuid,
            Uuid,
            String,
            String,
            Decimal,
            Option<Decimal>,
            Uuid,
            DateTime<Utc>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT id, company_id, from_currency, to_currency, rate,
                   previous_rate, updated_by, updated_at, reason
            FROM exchange_rate_history
            WHERE company_id = $1
              AND ($2::text IS NULL OR from_currency = $2)
              AND ($3::text IS NULL OR to_currency = $3)
            ORDER BY updated_at DESC
            LIMIT $4
            "#,
        )
        .bind(company_id)
        .bind(from.map(|c| c.as_str()))
        .bind(to.map(|c| c.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, company_id, from, to, rate, previous_rate, updated_by, updated_at, reason)| {
                    Ok(RateHistoryRecord {
                        id,
                        company_id,
                        from: from.parse()?,
                        to: to.parse()?,
                        rate,
                        previous_rate,
                        updated_by,
                        updated_at,
                        reason,
                    })
                },
            )
            .collect()
    }

    /// Load the company's configured rate set.
    async fn load_company_rates(&self, company_id: Uuid) -> AppResult<Vec<ExchangeRateEntry>> {
        let json: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT exchange_rates FROM companies WHERE id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        match json {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(AppError::not_found("Company", company_id)),
        }
    }
}

/// Pure rate resolution over an in-memory rate set.
fn resolve_rate(
    entries: &[ExchangeRateEntry],
    defaults: &HashMap<(Currency, Currency), Decimal>,
    from: Currency,
    to: Currency,
) -> Option<Decimal> {
    if from == to {
        return Some(Decimal::ONE);
    }

    if let Some(entry) = entries.iter().find(|e| e.from == from && e.to == to) {
        return Some(entry.rate);
    }

    // Inverse direction is derived, never stored
    if let Some(entry) = entries.iter().find(|e| e.from == to && e.to == from) {
        return Some(Decimal::ONE / entry.rate);
    }

    if let Some(rate) = defaults.get(&(from, to)) {
        return Some(*rate);
    }

    defaults.get(&(to, from)).map(|rate| Decimal::ONE / *rate)
}

/// Round a converted amount (banker's rounding, 2 decimal places).
fn round_converted(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(from: Currency, to: Currency, rate: Decimal) -> ExchangeRateEntry {
        ExchangeRateEntry {
            from,
            to,
            rate,
            is_default: false,
            updated_at: Utc::now(),
            updated_by: Uuid::new_v4(),
        }
    }

    fn defaults() -> HashMap<(Currency, Currency), Decimal> {
        let mut map = HashMap::new();
        map.insert((Currency::Usd, Currency::Cdf), dec!(2200));
        map.insert((Currency::Eur, Currency::Cdf), dec!(2400));
        map
    }

    #[test]
    fn test_same_currency_is_one() {
        let rate = resolve_rate(&[], &defaults(), Currency::Usd, Currency::Usd);
        assert_eq!(rate, Some(Decimal::ONE));
    }

    #[test]
    fn test_exact_match_wins_over_default() {
        let entries = vec![entry(Currency::Usd, Currency::Cdf, dec!(2150))];
        let rate = resolve_rate(&entries, &defaults(), Currency::Usd, Currency::Cdf);
        assert_eq!(rate, Some(dec!(2150)));
    }

    #[test]
    fn test_inverse_match_is_derived() {
        let entries = vec![entry(Currency::Usd, Currency::Cdf, dec!(2000))];
        let rate = resolve_rate(&entries, &defaults(), Currency::Cdf, Currency::Usd).unwrap();
        assert_eq!(rate, dec!(0.0005));
    }

    #[test]
    fn test_default_fallback_when_unconfigured() {
        let rate = resolve_rate(&[], &defaults(), Currency::Usd, Currency::Cdf);
        assert_eq!(rate, Some(dec!(2200)));
    }

    #[test]
    fn test_default_inverse_fallback() {
        let rate = resolve_rate(&[], &defaults(), Currency::Cdf, Currency::Eur).unwrap();
        assert_eq!(rate, Decimal::ONE / dec!(2400));
    }

    #[test]
    fn test_no_path_is_none() {
        let rate = resolve_rate(&[], &HashMap::new(), Currency::Usd, Currency::Eur);
        assert_eq!(rate, None);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let entries = vec![
            entry(Currency::Usd, Currency::Cdf, dec!(2217.37)),
            entry(Currency::Eur, Currency::Cdf, dec!(2391.12)),
        ];
        for (a, b) in [
            (Currency::Usd, Currency::Cdf),
            (Currency::Cdf, Currency::Usd),
            (Currency::Eur, Currency::Cdf),
        ] {
            let ab = resolve_rate(&entries, &defaults(), a, b).unwrap();
            let ba = resolve_rate(&entries, &defaults(), b, a).unwrap();
            let product = ab * ba;
            assert!(
                (product - Decimal::ONE).abs() < dec!(0.0000001),
                "{a}->{b} round trip drifted: {product}"
            );
        }
    }

    #[test]
    fn test_conversion_uses_bankers_rounding() {
        // Half-to-even: 2.5 cents -> 2 cents, 3.5 cents -> 4 cents
        assert_eq!(round_converted(dec!(1.025)), dec!(1.02));
        assert_eq!(round_converted(dec!(1.035)), dec!(1.04));
        assert_eq!(round_converted(dec!(100.50) * dec!(2200)), dec!(221100.00));
    }
}
