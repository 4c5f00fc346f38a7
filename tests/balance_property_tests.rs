//! Property-based tests for the balance calculator and status derivation.
//!
//! The aggregate status is re-derived from the full verified set on every
//! decision, so these properties must hold for any mix of payments in any
//! order; bugs here corrupt the quotation's financial standing.

use proptest::prelude::*;
use quotation_payments::balance;
use quotation_payments::money::{Currency, Money};
use quotation_payments::payment::{Payment, PaymentMethod, PaymentStage, VerificationStatus};
use quotation_payments::quotation::{Quotation, QuotationPaymentStatus};
use rust_decimal::Decimal;

fn quotation(total_centavos: i64) -> Quotation {
    Quotation::new(
        "quote_1prop".into(),
        "company_1prop".into(),
        "customer_1prop".into(),
        None,
        Money::new(Decimal::new(total_centavos, 2), Currency::PHP),
    )
}

fn payment(n: u32, centavos: i64, status: VerificationStatus) -> Payment {
    let mut p = Payment::new(
        format!("pay_1prop{n}"),
        "quote_1prop".into(),
        Money::new(Decimal::new(centavos, 2), Currency::PHP),
        PaymentMethod::TestSimulation,
        PaymentStage::Partial,
        "user_1prop".into(),
    );
    p.verification_status = status;
    p.is_locked = status == VerificationStatus::Verified;
    p
}

fn status_strategy() -> impl Strategy<Value = VerificationStatus> {
    prop_oneof![
        Just(VerificationStatus::Pending),
        Just(VerificationStatus::Verified),
        Just(VerificationStatus::Rejected),
    ]
}

/// Positive centavo amounts paired with a verification status.
fn payments_strategy() -> impl Strategy<Value = Vec<Payment>> {
    prop::collection::vec((1i64..=2_000_000, status_strategy()), 0..12).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(n, (centavos, status))| payment(n as u32, centavos, status))
            .collect()
    })
}

proptest! {
    /// amount_verified is exactly the sum over verified payments, no matter
    /// what other statuses are present.
    #[test]
    fn verified_sum_counts_only_verified(payments in payments_strategy()) {
        let expected: Decimal = payments
            .iter()
            .filter(|p| p.verification_status == VerificationStatus::Verified)
            .map(|p| p.amount.amount)
            .sum();

        prop_assert_eq!(balance::amount_verified(&payments), expected);
    }

    /// Recomputation is order-independent: shuffling the payment set never
    /// changes the verified sum or the derived status.
    #[test]
    fn derivation_is_order_independent(payments in payments_strategy()) {
        let q = quotation(1_000_000);

        let mut reversed = payments.clone();
        reversed.reverse();

        prop_assert_eq!(
            balance::amount_verified(&payments),
            balance::amount_verified(&reversed)
        );
        prop_assert_eq!(
            balance::derived_payment_state(&q, &payments),
            balance::derived_payment_state(&q, &reversed)
        );
    }

    /// Verifying one more pending payment never increases the remaining
    /// balance, and reopening (verified back to pending) never decreases it.
    #[test]
    fn remaining_is_monotone_under_decisions(payments in payments_strategy()) {
        let q = quotation(1_000_000);
        let before = balance::balance_remaining(&q, &payments);

        if let Some(idx) = payments
            .iter()
            .position(|p| p.verification_status == VerificationStatus::Pending)
        {
            let mut verified = payments.clone();
            verified[idx].verification_status = VerificationStatus::Verified;
            prop_assert!(balance::balance_remaining(&q, &verified) <= before);
        }

        if let Some(idx) = payments
            .iter()
            .position(|p| p.verification_status == VerificationStatus::Verified)
        {
            let mut reopened = payments.clone();
            reopened[idx].verification_status = VerificationStatus::Pending;
            prop_assert!(balance::balance_remaining(&q, &reopened) >= before);
        }
    }

    /// The derived status is consistent with the tolerance rule in every case.
    #[test]
    fn derived_status_matches_the_tolerance_rule(payments in payments_strategy()) {
        let q = quotation(1_000_000);
        let remaining = balance::balance_remaining(&q, &payments);
        let verified = balance::amount_verified(&payments);

        let derived = balance::derived_payment_state(&q, &payments);
        if remaining <= balance::settlement_tolerance() {
            prop_assert_eq!(derived, QuotationPaymentStatus::FullyPaid);
        } else if verified > Decimal::ZERO {
            prop_assert_eq!(derived, QuotationPaymentStatus::DepositPaid);
        } else {
            prop_assert_eq!(derived, QuotationPaymentStatus::Pending);
        }
    }

    /// The spendable upper bound never goes negative, even when the raw
    /// remaining balance transiently does.
    #[test]
    fn spendable_bound_is_never_negative(payments in payments_strategy()) {
        let q = quotation(1_000_000);
        prop_assert!(balance::spendable_remaining(&q, &payments) >= Decimal::ZERO);
    }
}
