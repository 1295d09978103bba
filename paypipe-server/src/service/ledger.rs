//! Spend Ledger
//!
//! Gates and records every payment against a per-task and a per-day ceiling.
//!
//! Only the primary asset (STX) counts towards totals and ceilings. Payments
//! in other assets are kept in the record list but never limit spending.
//!
//! A plain check followed by a later record is racy when runs execute
//! concurrently, so runs go through [`SpendLedger::reserve`], which checks
//! and holds the amount in one critical section.

use chrono::Utc;
use paypipe_core::domain::service::Asset;
use paypipe_core::domain::spend::{
    PeriodTotals, ServiceSpend, SpendCheck, SpendLimits, SpendRecord, SpendSummary,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;

const RECENT_RECORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("cost {amount} exceeds the per-task limit of {limit}")]
    TaskLimitExceeded { amount: u64, limit: u64 },

    #[error(
        "daily limit of {limit} would be exceeded ({spent} spent today, {reserved} reserved, {amount} requested)"
    )]
    DailyLimitExceeded {
        amount: u64,
        spent: u64,
        reserved: u64,
        limit: u64,
    },
}

#[derive(Debug)]
struct LedgerState {
    limits: SpendLimits,
    records: Vec<SpendRecord>,
    reserved: u64,
}

impl LedgerState {
    fn spent_on(&self, day: chrono::NaiveDate) -> u64 {
        self.records
            .iter()
            .filter(|r| r.asset.is_primary() && r.timestamp.date_naive() == day)
            .map(|r| r.amount)
            .sum()
    }

    fn check(&self, amount: u64) -> Result<(), LedgerError> {
        if amount > self.limits.max_per_task {
            return Err(LedgerError::TaskLimitExceeded {
                amount,
                limit: self.limits.max_per_task,
            });
        }

        let spent = self.spent_on(Utc::now().date_naive());
        if spent + self.reserved + amount > self.limits.max_per_day {
            return Err(LedgerError::DailyLimitExceeded {
                amount,
                spent,
                reserved: self.reserved,
                limit: self.limits.max_per_day,
            });
        }

        Ok(())
    }
}

/// In-memory spend ledger, cheap to clone and safe to share between runs
#[derive(Debug, Clone)]
pub struct SpendLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl SpendLedger {
    pub fn new(limits: SpendLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                limits,
                records: Vec::new(),
                reserved: 0,
            })),
        }
    }

    pub fn limits(&self) -> SpendLimits {
        self.state.lock().unwrap().limits
    }

    pub fn set_limits(&self, limits: SpendLimits) {
        self.state.lock().unwrap().limits = limits;
        tracing::info!(
            "Spend limits updated: {} per task, {} per day",
            limits.max_per_task,
            limits.max_per_day
        );
    }

    /// Whether `amount` more could be spent right now
    pub fn can_spend(&self, amount: u64) -> SpendCheck {
        match self.state.lock().unwrap().check(amount) {
            Ok(()) => SpendCheck::allowed(),
            Err(e) => SpendCheck::denied(e.to_string()),
        }
    }

    /// Checks `amount` and holds it until the returned reservation is
    /// settled or dropped
    pub fn reserve(&self, amount: u64) -> Result<Reservation, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.check(amount)?;
        state.reserved += amount;
        Ok(Reservation {
            state: Arc::clone(&self.state),
            outstanding: amount,
        })
    }

    /// Appends a payment; there is no rollback
    pub fn record_payment(
        &self,
        amount: u64,
        asset: Asset,
        service_id: &str,
        service_name: &str,
        tx_id: Option<String>,
    ) {
        self.push(SpendRecord {
            timestamp: Utc::now(),
            amount,
            asset,
            service_id: service_id.to_string(),
            service_name: service_name.to_string(),
            tx_id,
        });
    }

    fn push(&self, record: SpendRecord) {
        tracing::debug!(
            "Recorded payment of {} {} to {}",
            record.amount,
            record.asset,
            record.service_id
        );
        self.state.lock().unwrap().records.push(record);
    }

    pub fn today_spent(&self) -> u64 {
        self.state
            .lock()
            .unwrap()
            .spent_on(Utc::now().date_naive())
    }

    pub fn summary(&self) -> SpendSummary {
        let state = self.state.lock().unwrap();
        let today = Utc::now().date_naive();

        let primary: Vec<&SpendRecord> = state
            .records
            .iter()
            .filter(|r| r.asset.is_primary())
            .collect();
        let todays: Vec<&SpendRecord> = primary
            .iter()
            .copied()
            .filter(|r| r.timestamp.date_naive() == today)
            .collect();

        let mut by_service: Vec<ServiceSpend> = Vec::new();
        for record in &todays {
            match by_service
                .iter_mut()
                .find(|s| s.service_id == record.service_id)
            {
                Some(entry) => {
                    entry.total += record.amount;
                    entry.count += 1;
                }
                None => by_service.push(ServiceSpend {
                    service_id: record.service_id.clone(),
                    service_name: record.service_name.clone(),
                    total: record.amount,
                    count: 1,
                }),
            }
        }
        by_service.sort_by(|a, b| b.total.cmp(&a.total));

        let today_total: u64 = todays.iter().map(|r| r.amount).sum();

        SpendSummary {
            today: PeriodTotals {
                total: today_total,
                count: todays.len(),
            },
            by_service,
            all_time: PeriodTotals {
                total: primary.iter().map(|r| r.amount).sum(),
                count: primary.len(),
            },
            remaining_today: state.limits.max_per_day.saturating_sub(today_total),
            reserved: state.reserved,
            limits: state.limits,
            recent: state
                .records
                .iter()
                .rev()
                .take(RECENT_RECORDS)
                .cloned()
                .collect(),
        }
    }
}

/// Amount held for one run
///
/// Settle it as steps finish; whatever is left is released on drop.
#[derive(Debug)]
pub struct Reservation {
    state: Arc<Mutex<LedgerState>>,
    outstanding: u64,
}

impl Reservation {
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Releases up to `amount` of the hold, once the step it covered is done
    pub fn settle(&mut self, amount: u64) {
        let released = amount.min(self.outstanding);
        self.outstanding -= released;
        let mut state = self.state.lock().unwrap();
        state.reserved = state.reserved.saturating_sub(released);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.outstanding > 0 {
            if let Ok(mut state) = self.state.lock() {
                state.reserved = state.reserved.saturating_sub(self.outstanding);
            }
        }
    }
}

#[cfg(test)]
impl SpendLedger {
    fn record_at(&self, timestamp: chrono::DateTime<Utc>, amount: u64) {
        self.push(SpendRecord {
            timestamp,
            amount,
            asset: Asset::Stx,
            service_id: "old".to_string(),
            service_name: "Old".to_string(),
            tx_id: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(max_per_task: u64, max_per_day: u64) -> SpendLedger {
        SpendLedger::new(SpendLimits {
            max_per_task,
            max_per_day,
        })
    }

    #[test]
    fn test_can_spend_per_task_limit() {
        let ledger = ledger(1_000, 10_000);
        assert!(ledger.can_spend(1_000).allowed);

        let check = ledger.can_spend(1_001);
        assert!(!check.allowed);
        assert!(check.reason.unwrap().contains("per-task limit of 1000"));
    }

    #[test]
    fn test_daily_ceiling_enforced_for_any_history() {
        let ledger = ledger(5_000, 10_000);
        let payments = [3_000, 2_500, 4_000, 500];

        for amount in payments {
            let spent = ledger.today_spent();
            for candidate in [0, 1, 499, 500, 501, 4_999, 5_000] {
                let check = ledger.can_spend(candidate);
                if spent + candidate > 10_000 {
                    assert!(!check.allowed, "spent {} + {} allowed", spent, candidate);
                } else {
                    assert!(check.allowed, "spent {} + {} denied", spent, candidate);
                }
            }
            ledger.record_payment(amount, Asset::Stx, "svc", "Service", None);
        }

        assert_eq!(ledger.today_spent(), 10_000);
        assert!(ledger.can_spend(0).allowed);
        assert!(!ledger.can_spend(1).allowed);
    }

    #[test]
    fn test_all_time_total_is_monotonic_and_primary_only() {
        let ledger = ledger(u64::MAX, u64::MAX);
        let mut last = 0;
        let mut expected = 0;

        for (i, asset) in [Asset::Stx, Asset::SBtc, Asset::Stx, Asset::Usdcx, Asset::Stx]
            .into_iter()
            .enumerate()
        {
            let amount = (i as u64 + 1) * 100;
            ledger.record_payment(amount, asset, "svc", "Service", Some(format!("0x{}", i)));
            if asset.is_primary() {
                expected += amount;
            }

            let total = ledger.summary().all_time.total;
            assert!(total >= last);
            last = total;
        }

        let summary = ledger.summary();
        assert_eq!(summary.all_time.total, expected);
        assert_eq!(summary.all_time.count, 3);
        assert_eq!(summary.recent.len(), 5);
    }

    #[test]
    fn test_non_primary_assets_do_not_count_towards_ceiling() {
        let ledger = ledger(1_000, 1_000);
        ledger.record_payment(1_000, Asset::SBtc, "btc", "BTC data", None);
        assert_eq!(ledger.today_spent(), 0);
        assert!(ledger.can_spend(1_000).allowed);
    }

    #[test]
    fn test_summary_breakdown_and_floor() {
        let ledger = ledger(10_000, 5_000);
        ledger.record_payment(3_000, Asset::Stx, "news", "News", None);
        ledger.record_payment(1_000, Asset::Stx, "price", "Price", None);
        ledger.record_payment(2_000, Asset::Stx, "news", "News", None);
        ledger.record_at(Utc::now() - chrono::Duration::days(2), 700);

        let summary = ledger.summary();
        assert_eq!(summary.today.total, 6_000);
        assert_eq!(summary.today.count, 3);
        assert_eq!(summary.all_time.total, 6_700);
        assert_eq!(summary.remaining_today, 0);
        assert_eq!(summary.by_service[0].service_id, "news");
        assert_eq!(summary.by_service[0].total, 5_000);
        assert_eq!(summary.by_service[0].count, 2);
        assert_eq!(summary.by_service[1].service_id, "price");
    }

    #[test]
    fn test_older_days_do_not_count_today() {
        let ledger = ledger(10_000, 10_000);
        ledger.record_at(Utc::now() - chrono::Duration::days(1), 9_000);
        assert_eq!(ledger.today_spent(), 0);
        assert!(ledger.can_spend(10_000).allowed);
    }

    #[test]
    fn test_reservation_blocks_concurrent_spend() {
        let ledger = ledger(6_000, 10_000);

        let mut first = ledger.reserve(6_000).unwrap();
        let err = ledger.reserve(6_000).unwrap_err();
        assert!(matches!(err, LedgerError::DailyLimitExceeded { reserved: 6_000, .. }));
        assert!(!ledger.can_spend(4_001).allowed);

        first.settle(2_000);
        ledger.record_payment(2_000, Asset::Stx, "svc", "Service", None);
        assert_eq!(first.outstanding(), 4_000);
        assert_eq!(ledger.summary().reserved, 4_000);

        drop(first);
        assert_eq!(ledger.summary().reserved, 0);
        assert!(ledger.reserve(6_000).is_ok());
    }

    #[test]
    fn test_set_limits_applies_immediately() {
        let ledger = ledger(1_000, 1_000);
        assert!(!ledger.can_spend(2_000).allowed);

        ledger.set_limits(SpendLimits {
            max_per_task: 5_000,
            max_per_day: 5_000,
        });
        assert!(ledger.can_spend(2_000).allowed);
        assert_eq!(ledger.limits().max_per_task, 5_000);
    }
}
