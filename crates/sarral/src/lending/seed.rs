//! Deterministic sample payment histories for demos and local testing.

use chrono::{DateTime, Datelike, Months, NaiveTime, TimeZone, Utc};

use super::ingest::TransactionRecord;

/// Month totals for the reference borrower, oldest first.
pub const SAMPLE_MONTHLY_AMOUNTS: [f64; 6] = [8000.0, 9500.0, 8200.0, 10000.0, 8800.0, 9200.0];

pub const PAYMENTS_PER_MONTH: u32 = 4;

const PAYMENT_SPACING_DAYS: u32 = 3;

/// Spread each month total over [`PAYMENTS_PER_MONTH`] equal payments.
///
/// The last amount lands in the anchor's month and earlier amounts in the months before it.
/// Payment days trail the anchor's day of month so the whole history stays inside a
/// six-month lookback window.
pub fn sample_history(anchor: DateTime<Utc>, monthly_amounts: &[f64]) -> Vec<TransactionRecord> {
    let Some(anchor_month) = anchor.date_naive().with_day(1) else {
        return Vec::new();
    };
    let paid_at = NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN);
    let months = monthly_amounts.len();
    let mut records = Vec::with_capacity(months * PAYMENTS_PER_MONTH as usize);

    for (index, total) in monthly_amounts.iter().enumerate() {
        let months_back = u32::try_from(months - 1 - index).unwrap_or(u32::MAX);
        let Some(month_start) = anchor_month.checked_sub_months(Months::new(months_back)) else {
            continue;
        };
        let share = total / f64::from(PAYMENTS_PER_MONTH);

        for payment in 0..PAYMENTS_PER_MONTH {
            let day = anchor
                .day()
                .saturating_sub(payment * PAYMENT_SPACING_DAYS)
                .clamp(1, 28);
            let Some(date) = month_start.with_day(day) else {
                continue;
            };
            let timestamp = Utc.from_utc_datetime(&date.and_time(paid_at));
            records.push(TransactionRecord::new(share, timestamp));
        }
    }

    records
}
