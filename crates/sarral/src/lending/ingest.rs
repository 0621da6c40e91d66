//! Boundary between loosely-typed store documents and the validated domain model.
//!
//! Payment feeds are noisy, so transactions missing an amount or timestamp are dropped
//! without failing the scoring run. An amount that is present but negative, zero, or not a
//! number is rejected with a [`ValidationError`] before anything is computed. Offer documents
//! are stricter still: a missing amount or tenure would silently become zero and skew ranking.

use std::io::Read;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::domain::{LoanOffer, OfferId, OfferRate, OfferStatus, Transaction, UserId};

/// Input shape errors. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` must be positive (found {found})")]
    NonPositive { field: &'static str, found: i64 },
    #[error("`{field}` must be a finite, non-negative percentage (found {found})")]
    MalformedPercentage { field: &'static str, found: f64 },
    #[error("minimum score must be between 0 and 100 (found {0})")]
    ScoreOutOfRange(i64),
    #[error("principal exceeds the maximum offer amount (required <= {max}, found {found})")]
    PrincipalAboveCap { max: u64, found: u64 },
    #[error("unknown offer status `{0}`")]
    UnknownStatus(String),
    #[error("offer cannot carry both a total and a per-annum rate")]
    AmbiguousRate,
    #[error("transaction amount must be a positive number (found {0})")]
    InvalidAmount(f64),
}

/// Raw payment document as delivered by the inflow feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn new(amount: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            amount: Some(amount),
            timestamp: Some(timestamp),
        }
    }

    /// `Ok(None)` for an incomplete record; an error for an amount that cannot be a payment.
    fn usable(&self) -> Result<Option<Transaction>, ValidationError> {
        let (Some(amount), Some(timestamp)) = (self.amount, self.timestamp) else {
            return Ok(None);
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ValidationError::InvalidAmount(amount));
        }
        Ok(Some(Transaction { amount, timestamp }))
    }
}

/// Keep the records that carry both an amount and a timestamp.
///
/// Fails on the first record whose amount is negative, zero, or not finite.
pub fn usable_transactions(
    records: &[TransactionRecord],
) -> Result<Vec<Transaction>, ValidationError> {
    let mut transactions = Vec::with_capacity(records.len());
    for record in records {
        if let Some(transaction) = record.usable()? {
            transactions.push(transaction);
        }
    }

    let discarded = records.len() - transactions.len();
    if discarded > 0 {
        debug!(discarded, kept = transactions.len(), "discarded incomplete transactions");
    }

    Ok(transactions)
}

/// Offer document as stored by the lender-facing screens. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub lender_uid: Option<String>,
    #[serde(default)]
    pub lender_name: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub interest_rate_total: Option<f64>,
    #[serde(default)]
    pub per_annum_rate: Option<f64>,
    #[serde(default)]
    pub tenure_months: Option<i64>,
    #[serde(default)]
    pub min_score_required: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<OfferDocument> for LoanOffer {
    type Error = ValidationError;

    fn try_from(document: OfferDocument) -> Result<Self, Self::Error> {
        let id = non_blank(document.id, "id")?;
        let lender_id = non_blank(document.lender_uid, "lender_uid")?;
        let lender_name = non_blank(document.lender_name, "lender_name")?;

        let amount = document.amount.ok_or(ValidationError::MissingField("amount"))?;
        let principal = positive(amount, "amount")?;

        let tenure = document
            .tenure_months
            .ok_or(ValidationError::MissingField("tenure_months"))?;
        let tenure_months = u32::try_from(positive(tenure, "tenure_months")?)
            .map_err(|_| ValidationError::NonPositive {
                field: "tenure_months",
                found: tenure,
            })?;

        let rate = match (document.interest_rate_total, document.per_annum_rate) {
            (Some(_), Some(_)) => return Err(ValidationError::AmbiguousRate),
            (Some(total), None) => OfferRate::Total(percentage(total, "interest_rate_total")?),
            (None, Some(per_annum)) => {
                OfferRate::PerAnnum(percentage(per_annum, "per_annum_rate")?)
            }
            (None, None) => OfferRate::Unspecified,
        };

        // Offers published without a threshold are open to every score.
        let min_score_required = match document.min_score_required {
            Some(score) => minimum_score(score)?,
            None => 0,
        };

        // Legacy offers predate the status field and are treated as available.
        let status = match document.status.as_deref().map(str::trim) {
            None | Some("available") => OfferStatus::Available,
            Some("inactive") => OfferStatus::Inactive,
            Some(other) => return Err(ValidationError::UnknownStatus(other.to_string())),
        };

        let created_at = document
            .created_at
            .ok_or(ValidationError::MissingField("created_at"))?;

        Ok(LoanOffer {
            id: OfferId(id),
            lender_id: UserId(lender_id),
            lender_name,
            principal,
            rate,
            tenure_months,
            min_score_required,
            status,
            created_at,
        })
    }
}

fn non_blank(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingField(field))
}

pub(crate) fn positive(value: i64, field: &'static str) -> Result<u64, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NonPositive { field, found: value });
    }
    Ok(value as u64)
}

pub(crate) fn percentage(value: f64, field: &'static str) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::MalformedPercentage { field, found: value });
    }
    Ok(value)
}

pub(crate) fn minimum_score(value: i64) -> Result<u8, ValidationError> {
    u8::try_from(value)
        .ok()
        .filter(|score| *score <= 100)
        .ok_or(ValidationError::ScoreOutOfRange(value))
}

/// Failure while reading a transaction export.
#[derive(Debug, thiserror::Error)]
pub enum TransactionImportError {
    #[error("failed to read transaction export: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unrecognised amount `{value}`")]
    Amount { row: usize, value: String },
    #[error("row {row}: unrecognised timestamp `{value}`")]
    Timestamp { row: usize, value: String },
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    amount: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    timestamp: Option<String>,
}

/// Parse an `amount,timestamp` export into raw records.
///
/// Blank cells yield incomplete records that [`usable_transactions`] later drops; a
/// timestamp that is present but unparseable is an error, as is a non-numeric amount.
pub fn import_transactions_csv<R: Read>(
    reader: R,
) -> Result<Vec<TransactionRecord>, TransactionImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<TransactionRow>().enumerate() {
        let row = row?;
        let line = index + 2;

        let amount = match row.amount {
            Some(raw) => Some(raw.replace(',', "").parse::<f64>().map_err(|_| {
                TransactionImportError::Amount {
                    row: line,
                    value: raw.clone(),
                }
            })?),
            None => None,
        };
        let timestamp = match row.timestamp {
            Some(raw) => Some(parse_timestamp(&raw).ok_or(TransactionImportError::Timestamp {
                row: line,
                value: raw,
            })?),
            None => None,
        };

        records.push(TransactionRecord { amount, timestamp });
    }

    Ok(records)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document() -> OfferDocument {
        OfferDocument {
            id: Some("offer-1".to_string()),
            lender_uid: Some("lender-1".to_string()),
            lender_name: Some("Asha".to_string()),
            amount: Some(5000),
            interest_rate_total: Some(10.0),
            per_annum_rate: None,
            tenure_months: Some(6),
            min_score_required: Some(40),
            status: None,
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap()),
        }
    }

    #[test]
    fn legacy_offer_without_status_is_available() {
        let offer = LoanOffer::try_from(document()).expect("valid offer");
        assert_eq!(offer.status, OfferStatus::Available);
        assert_eq!(offer.rate, OfferRate::Total(10.0));
        assert_eq!(offer.principal, 5000);
    }

    #[test]
    fn missing_amount_is_rejected_instead_of_zeroed() {
        let mut document = document();
        document.amount = None;
        assert_eq!(
            LoanOffer::try_from(document),
            Err(ValidationError::MissingField("amount"))
        );
    }

    #[test]
    fn negative_rate_and_zero_tenure_are_rejected() {
        let mut negative = document();
        negative.interest_rate_total = Some(-1.0);
        assert!(matches!(
            LoanOffer::try_from(negative),
            Err(ValidationError::MalformedPercentage { .. })
        ));

        let mut zero_tenure = document();
        zero_tenure.tenure_months = Some(0);
        assert_eq!(
            LoanOffer::try_from(zero_tenure),
            Err(ValidationError::NonPositive {
                field: "tenure_months",
                found: 0
            })
        );
    }

    #[test]
    fn per_annum_and_unspecified_rates_are_distinguished() {
        let mut per_annum = document();
        per_annum.interest_rate_total = None;
        per_annum.per_annum_rate = Some(24.0);
        assert_eq!(
            LoanOffer::try_from(per_annum).expect("valid").rate,
            OfferRate::PerAnnum(24.0)
        );

        let mut unspecified = document();
        unspecified.interest_rate_total = None;
        assert_eq!(
            LoanOffer::try_from(unspecified).expect("valid").rate,
            OfferRate::Unspecified
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut document = document();
        document.status = Some("removed".to_string());
        assert_eq!(
            LoanOffer::try_from(document),
            Err(ValidationError::UnknownStatus("removed".to_string()))
        );
    }

    #[test]
    fn incomplete_transactions_are_dropped_silently() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let records = vec![
            TransactionRecord::new(120.0, at),
            TransactionRecord {
                amount: None,
                timestamp: Some(at),
            },
            TransactionRecord {
                amount: Some(50.0),
                timestamp: None,
            },
        ];

        let usable = usable_transactions(&records).expect("amounts are valid");
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].amount, 120.0);
    }

    #[test]
    fn negative_amount_rejects_the_whole_batch() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let records = vec![
            TransactionRecord::new(-5000.0, at),
            TransactionRecord::new(1000.0, at),
        ];

        assert_eq!(
            usable_transactions(&records),
            Err(ValidationError::InvalidAmount(-5000.0))
        );
    }

    #[test]
    fn zero_and_non_finite_amounts_are_rejected() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(
            usable_transactions(&[TransactionRecord::new(0.0, at)]),
            Err(ValidationError::InvalidAmount(0.0))
        );
        assert!(matches!(
            usable_transactions(&[TransactionRecord::new(f64::INFINITY, at)]),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            usable_transactions(&[TransactionRecord::new(f64::NAN, at)]),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn incomplete_record_is_dropped_before_amount_checks() {
        let records = vec![TransactionRecord {
            amount: Some(-1.0),
            timestamp: None,
        }];

        assert_eq!(usable_transactions(&records), Ok(Vec::new()));
    }

    #[test]
    fn csv_export_accepts_rfc3339_and_plain_dates() {
        let csv = "amount,timestamp\n250.50,2025-02-03T10:15:00Z\n1000,2025-02-10\n,2025-02-11\n";
        let records = import_transactions_csv(csv.as_bytes()).expect("csv parses");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].amount, Some(250.5));
        assert_eq!(
            records[1].timestamp,
            Some(Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(records[2].amount, None);
        assert_eq!(usable_transactions(&records).expect("valid amounts").len(), 2);
    }

    #[test]
    fn csv_export_reports_bad_timestamps() {
        let csv = "amount,timestamp\n100,yesterday\n";
        match import_transactions_csv(csv.as_bytes()) {
            Err(TransactionImportError::Timestamp { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }
}
