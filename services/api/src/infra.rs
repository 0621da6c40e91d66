use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use sarral::lending::{
    sample_history, BorrowerProfile, InMemoryLendingStore, LendingStore, LoanOffer, OfferId,
    OfferRate, OfferStatus, StoreError, UserId,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_BORROWER: &str = "borrower-priya";
pub(crate) const DEMO_LENDER: &str = "lender-arjun";
pub(crate) const DEMO_SECOND_LENDER: &str = "lender-divya";

/// Populate a store with one borrower holding monthly inflows and a few open offers.
pub(crate) fn seed_sample_marketplace(
    store: &InMemoryLendingStore,
    anchor: DateTime<Utc>,
    monthly_amounts: &[f64],
) -> Result<(), StoreError> {
    store.insert_profile(BorrowerProfile {
        borrower_id: UserId(DEMO_BORROWER.to_string()),
        display_name: "Priya".to_string(),
        payment_handle: "priya@upi".to_string(),
        trust_score: 0,
        borrow_limit: 0,
        last_score_update: None,
    })?;
    store.insert_user(UserId(DEMO_LENDER.to_string()), "Arjun")?;
    store.insert_user(UserId(DEMO_SECOND_LENDER.to_string()), "Divya")?;
    store.insert_transactions(DEMO_BORROWER, sample_history(anchor, monthly_amounts))?;

    let offers = [
        ("seed-offer-1", DEMO_LENDER, "Arjun", 2500, 10.0, 3, 50),
        ("seed-offer-2", DEMO_SECOND_LENDER, "Divya", 2000, 8.0, 2, 40),
        ("seed-offer-3", DEMO_SECOND_LENDER, "Divya", 2500, 7.5, 3, 55),
        ("seed-offer-4", DEMO_LENDER, "Arjun", 15000, 12.0, 6, 80),
    ];
    for (id, lender, name, principal, rate, months, min_score) in offers {
        store.create_offer(LoanOffer {
            id: OfferId(id.to_string()),
            lender_id: UserId(lender.to_string()),
            lender_name: name.to_string(),
            principal,
            rate: OfferRate::Total(rate),
            tenure_months: months,
            min_score_required: min_score,
            status: OfferStatus::Available,
            created_at: anchor,
        })?;
    }

    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
