use super::common::*;
use crate::lending::domain::{OfferRate, OfferStatus};
use crate::lending::ingest::ValidationError;
use crate::lending::offers::{rank_offers, recommend, total_interest_payable, Recommendation};

#[test]
fn closest_amount_wins_and_interest_breaks_ties() {
    let offers = vec![
        offer("a", LENDER, 2000, 10.0, 3),
        offer("b", OTHER_LENDER, 2000, 8.0, 3),
        offer("c", LENDER, 2500, 5.0, 3),
    ];

    let ranked = rank_offers(&standing(60, 2685), 2000, &offers).expect("valid amount");

    let order: Vec<&str> = ranked.iter().map(|entry| entry.offer.id.0.as_str()).collect();
    assert_eq!(order, ["b", "a", "c"]);
    assert_eq!(ranked[0].difference_from_desired, 0);
    assert_eq!(ranked[2].difference_from_desired, 500);
    assert!((ranked[0].total_interest_payable - 160.0).abs() < 1e-9);
}

#[test]
fn offers_above_limit_or_score_are_excluded() {
    let mut demanding = offer("demanding", LENDER, 1000, 4.0, 3);
    demanding.min_score_required = 70;
    let offers = vec![
        offer("too-big", LENDER, 3000, 2.0, 3),
        demanding,
        offer("fits", OTHER_LENDER, 1500, 12.0, 3),
    ];

    let ranked = rank_offers(&standing(60, 2685), 1000, &offers).expect("valid amount");

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].offer.id.0, "fits");
}

#[test]
fn borrowers_never_see_their_own_offers() {
    let offers = vec![offer("mine", BORROWER, 1000, 1.0, 1)];

    let outcome = recommend(&standing(90, 50_000), 1000, &offers).expect("valid amount");

    assert_eq!(outcome, Recommendation::NoEligibleOffer);
}

#[test]
fn inactive_offers_are_not_recommended() {
    let mut retired = offer("retired", LENDER, 1000, 1.0, 1);
    retired.status = OfferStatus::Inactive;

    let outcome = recommend(&standing(90, 50_000), 1000, &[retired]).expect("valid amount");

    assert!(outcome.offer().is_none());
}

#[test]
fn limit_is_inclusive() {
    let offers = vec![offer("exact", LENDER, 2685, 10.0, 3)];

    let outcome = recommend(&standing(60, 2685), 2685, &offers).expect("valid amount");

    assert_eq!(outcome.offer().map(|offer| offer.id.0.as_str()), Some("exact"));
}

#[test]
fn zero_desired_amount_is_rejected() {
    let error = rank_offers(&standing(60, 2685), 0, &[]).expect_err("zero amount");

    assert!(matches!(
        error,
        ValidationError::NonPositive {
            field: "desired_amount",
            ..
        }
    ));
}

#[test]
fn equal_offers_keep_their_listing_order() {
    let offers = vec![
        offer("first", LENDER, 1000, 5.0, 3),
        offer("second", OTHER_LENDER, 1000, 5.0, 3),
    ];

    let ranked = rank_offers(&standing(60, 2685), 1000, &offers).expect("valid amount");

    assert_eq!(ranked[0].offer.id.0, "first");
    assert_eq!(ranked[1].offer.id.0, "second");
}

#[test]
fn interest_payable_follows_the_rate_kind() {
    let mut annual = offer("annual", LENDER, 12000, 12.0, 6);
    annual.rate = OfferRate::PerAnnum(12.0);
    let mut unpriced = offer("unpriced", LENDER, 12000, 0.0, 6);
    unpriced.rate = OfferRate::Unspecified;

    let flat = total_interest_payable(&offer("flat", LENDER, 12000, 12.0, 6));
    assert!((flat - 1440.0).abs() < 1e-9);
    assert!((total_interest_payable(&annual) - 720.0).abs() < 1e-9);
    assert_eq!(total_interest_payable(&unpriced), 0.0);
}
