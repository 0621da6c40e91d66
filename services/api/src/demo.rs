use crate::infra::{parse_date, seed_sample_marketplace, DEMO_BORROWER};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use sarral::config::LendingConfig;
use sarral::error::AppError;
use sarral::lending::{
    import_transactions_csv, usable_transactions, InMemoryLendingStore, LendingService,
    LendingServiceError, Recommendation, ScoreCard, ScoreOutcome, ScoringConfig, ScoringEngine,
    TransitionOutcome, UserId, SAMPLE_MONTHLY_AMOUNTS,
};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Amount the sample borrower wants to borrow
    #[arg(long, default_value_t = 2500)]
    pub(crate) amount: u64,
    /// Comma-separated month totals for the sample borrower, oldest first
    #[arg(long, value_delimiter = ',')]
    pub(crate) months: Vec<f64>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Statement export with `amount,timestamp` columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Ignore payments before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) since: Option<NaiveDate>,
    /// Months the inflow total is spread over
    #[arg(long)]
    pub(crate) month_divisor: Option<u32>,
}

pub(crate) fn run_statement_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        csv,
        since,
        month_divisor,
    } = args;

    let records = import_transactions_csv(File::open(&csv)?)?;
    let mut transactions = usable_transactions(&records)?;
    if let Some(since) = since {
        let cutoff = Utc.from_utc_datetime(&since.and_time(NaiveTime::MIN));
        transactions.retain(|transaction| transaction.timestamp >= cutoff);
    }

    let mut config = ScoringConfig::default();
    if let Some(divisor) = month_divisor.filter(|divisor| *divisor > 0) {
        config.month_divisor = divisor;
    }
    let engine = ScoringEngine::new(config);

    println!("Statement {}", csv.display());
    println!(
        "- {} rows read | {} usable payments",
        records.len(),
        transactions.len()
    );
    match engine.score(&transactions) {
        ScoreOutcome::Scored(card) => render_score_card(&card, engine.config().month_divisor),
        ScoreOutcome::InsufficientHistory => {
            println!("- Not enough payment history to compute a score");
        }
    }

    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { amount, months } = args;
    let monthly_amounts = if months.is_empty() {
        SAMPLE_MONTHLY_AMOUNTS.to_vec()
    } else {
        months
    };

    let store = Arc::new(InMemoryLendingStore::default());
    seed_sample_marketplace(&store, Utc::now(), &monthly_amounts)
        .map_err(LendingServiceError::from)?;
    let service = LendingService::new(store, LendingConfig::default());
    let borrower = UserId(DEMO_BORROWER.to_string());

    println!("SARRAL lending demo");
    println!(
        "Sample borrower {} with month totals {:?}",
        DEMO_BORROWER, monthly_amounts
    );
    if let Some(expected) = service.engine().expected_score(&monthly_amounts).card() {
        println!(
            "- Expected from month totals: score {} | limit {}",
            expected.trust_score, expected.borrow_limit
        );
    }

    let refresh = service.refresh_score(&borrower)?;
    match &refresh.score {
        ScoreOutcome::Scored(card) => {
            render_score_card(card, service.config().scoring.month_divisor);
        }
        ScoreOutcome::InsufficientHistory => {
            println!("- Not enough payment history to compute a score");
            return Ok(());
        }
    }

    let dashboard = service.dashboard(&borrower, amount).await?;
    println!("\nOffers matching a request for {amount}");
    if dashboard.eligible_offers.is_empty() {
        println!("- none within the borrower's limit and score");
    }
    for ranked in &dashboard.eligible_offers {
        println!(
            "- {} from {}: {} over {} months | {} away | interest {:.0}",
            ranked.offer.id.0,
            ranked.offer.lender_name,
            ranked.offer.principal,
            ranked.offer.tenure_months,
            ranked.difference_from_desired,
            ranked.total_interest_payable
        );
    }

    let Recommendation::Recommended(best) = dashboard.recommendation else {
        println!("\nNo eligible offer; nothing to request.");
        return Ok(());
    };

    let terms = service.review_offer(&best.offer.id)?;
    println!("\nReviewing {} from {}", best.offer.id.0, best.offer.lender_name);
    println!(
        "- principal {} | interest {} | repay {} over {} days | {} per day",
        terms.principal,
        terms.total_interest,
        terms.total_repayable,
        terms.tenure_days,
        terms.periodic_installment
    );

    let request = service.submit_request(&borrower, &best.offer.id)?;
    println!("- Request {} submitted ({})", request.id.0, request.status.label());

    let lender = best.offer.lender_id.clone();
    let inbox = service.lender_inbox(&lender).await?;
    println!("\nInbox for {}", best.offer.lender_name);
    for view in &inbox {
        println!(
            "- {} from {} ({})",
            view.request.id.0,
            view.counterparty_name,
            view.request.status.label()
        );
    }

    let first = service.approve(&request.id, &lender)?;
    let second = service.approve(&request.id, &lender)?;
    render_transition("First approval", &first);
    render_transition("Repeated approval", &second);

    let loans = service.lender_active_loans(&lender).await?;
    println!("\nActive loans for {}", best.offer.lender_name);
    for view in loans {
        println!(
            "- {} to {}: {} for {} days",
            view.loan.id.0, view.borrower_name, view.loan.principal, view.loan.tenure_days
        );
    }

    Ok(())
}

fn render_score_card(card: &ScoreCard, month_divisor: u32) {
    println!(
        "- Monthly inflow {:.2} (spread over {} months) | best {:.0} | worst {:.0}",
        card.inflow.monthly_inflow, month_divisor, card.inflow.max_month, card.inflow.min_month
    );
    println!(
        "- Income {:.1} | consistency {:.1} | trust score {} | borrow limit {}",
        card.income_score, card.consistency_score, card.trust_score, card.borrow_limit
    );
}

fn render_transition(label: &str, outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::Applied {
            request,
            active_loan,
        } => {
            println!("- {label}: request is now {}", request.status.label());
            if let Some(loan) = active_loan {
                println!("  opened {} starting {}", loan.id.0, loan.start_date.date_naive());
            }
        }
        TransitionOutcome::AlreadyProcessed { current } => {
            println!("- {label}: already {current}, nothing to do");
        }
    }
}
