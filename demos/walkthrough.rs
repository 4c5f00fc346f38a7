//! End-to-end walkthrough: draft a quotation, accept it, stage a 50%
//! downpayment by check, verify it, then settle the balance.

use std::sync::Arc;

use quotation_payments::lifecycle::QuotationLifecycle;
use quotation_payments::money::{Currency, Money};
use quotation_payments::payment::PaymentMethod;
use quotation_payments::submission::{PaymentSubmission, StageInput};
use quotation_payments::types::{Actor, Capabilities, TimeStamp};
use quotation_payments::utils::new_uuid_to_bech32;
use quotation_payments::verification::VerificationEngine;
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    let db = Arc::new(sled::open("walkthrough-db")?);
    db.clear()?;

    let lifecycle = QuotationLifecycle::new(Arc::clone(&db));
    let submission = PaymentSubmission::new(Arc::clone(&db));
    let engine = VerificationEngine::new(Arc::clone(&db));

    let sales = Actor::new(new_uuid_to_bech32("user_")?, Capabilities::sales());
    let finance = Actor::new(new_uuid_to_bech32("user_")?, Capabilities::finance());

    let quotation = lifecycle.create(
        "company_main",
        "customer_acme",
        None,
        Money::new(Decimal::new(10_000_00, 2), Currency::PHP),
        &sales,
    )?;
    lifecycle.mark_sent(&quotation.quotation_id, &sales)?;
    lifecycle.accept(&quotation.quotation_id, &sales)?;

    let downpayment = submission.submit(
        &quotation.quotation_id,
        StageInput::Downpayment {
            deposit_percentage: 50,
        },
        PaymentMethod::Check {
            bank_name: "BDO".into(),
            check_number: "000123".into(),
            check_date: TimeStamp::new(),
            deposit_slip: Some("slip-2024-001".into()),
        },
        &sales,
    )?;
    let downpayment = engine.verify(&downpayment.payment_id, &finance, None)?;
    println!("downpayment: {} ({:?})", downpayment.amount, downpayment.verification_status);

    let balance = submission.submit(
        &quotation.quotation_id,
        StageInput::Balance,
        PaymentMethod::Gateway {
            transaction_id: "txn_789".into(),
        },
        &sales,
    )?;
    engine.verify(&balance.payment_id, &finance, Some("gateway capture matched".into()))?;

    for record in lifecycle.history(&quotation.quotation_id)? {
        println!("{:?} by {}", record.action, record.actor_id);
    }

    Ok(())
}
