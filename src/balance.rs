//! Balance calculator: pure functions over a quotation and its payments.
//!
//! Total over its inputs, no I/O and no failure modes. Callers must tolerate
//! a transiently negative remaining balance after a verification race and
//! treat it as zero when used as an upper bound.

use rust_decimal::Decimal;

use super::payment::Payment;
use super::quotation::{Quotation, QuotationPaymentStatus};

/// One currency-rounding unit. Balances within this of zero count as settled.
pub fn settlement_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Sum of every currently-verified payment amount.
pub fn amount_verified(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.is_verified())
        .map(|p| p.amount.amount)
        .sum()
}

/// Total minus verified. May dip below zero briefly between two racing
/// verifications; never persisted as an over-paid aggregate.
pub fn balance_remaining(quotation: &Quotation, payments: &[Payment]) -> Decimal {
    quotation.total_amount.amount - amount_verified(payments)
}

/// Remaining balance clamped at zero, the upper bound for new submissions.
pub fn spendable_remaining(quotation: &Quotation, payments: &[Payment]) -> Decimal {
    balance_remaining(quotation, payments).max(Decimal::ZERO)
}

/// Aggregate payment status implied by the verified set alone.
pub fn derived_payment_state(
    quotation: &Quotation,
    payments: &[Payment],
) -> QuotationPaymentStatus {
    if balance_remaining(quotation, payments) <= settlement_tolerance() {
        QuotationPaymentStatus::FullyPaid
    } else if amount_verified(payments) > Decimal::ZERO {
        QuotationPaymentStatus::DepositPaid
    } else {
        QuotationPaymentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Currency, Money};
    use crate::payment::{PaymentMethod, PaymentStage, VerificationStatus};
    use rust_decimal_macros::dec;

    fn quotation(total: Decimal) -> Quotation {
        Quotation::new(
            "quote_1test".into(),
            "company_1test".into(),
            "customer_1test".into(),
            None,
            Money::new(total, Currency::PHP),
        )
    }

    fn payment(amount: Decimal, status: VerificationStatus) -> Payment {
        let mut p = Payment::new(
            "pay_1test".into(),
            "quote_1test".into(),
            Money::new(amount, Currency::PHP),
            PaymentMethod::TestSimulation,
            PaymentStage::Partial,
            "user_1test".into(),
        );
        p.verification_status = status;
        p.is_locked = status == VerificationStatus::Verified;
        p
    }

    #[test]
    fn only_verified_payments_count() {
        let q = quotation(dec!(10000));
        let payments = vec![
            payment(dec!(5000), VerificationStatus::Verified),
            payment(dec!(2000), VerificationStatus::Pending),
            payment(dec!(1000), VerificationStatus::Rejected),
        ];

        assert_eq!(amount_verified(&payments), dec!(5000));
        assert_eq!(balance_remaining(&q, &payments), dec!(5000));
    }

    #[test]
    fn derived_state_walks_up_with_verified_amounts() {
        let q = quotation(dec!(10000));

        let none: Vec<Payment> = vec![];
        assert_eq!(derived_payment_state(&q, &none), QuotationPaymentStatus::Pending);

        let half = vec![payment(dec!(5000), VerificationStatus::Verified)];
        assert_eq!(
            derived_payment_state(&q, &half),
            QuotationPaymentStatus::DepositPaid
        );

        let full = vec![
            payment(dec!(5000), VerificationStatus::Verified),
            payment(dec!(5000), VerificationStatus::Verified),
        ];
        assert_eq!(
            derived_payment_state(&q, &full),
            QuotationPaymentStatus::FullyPaid
        );
    }

    #[test]
    fn rounding_tolerance_counts_as_settled() {
        let q = quotation(dec!(10000));
        let nearly = vec![payment(dec!(9999.99), VerificationStatus::Verified)];

        assert_eq!(
            derived_payment_state(&q, &nearly),
            QuotationPaymentStatus::FullyPaid
        );
    }

    #[test]
    fn overpayment_clamps_to_fully_paid() {
        let q = quotation(dec!(10000));
        let over = vec![
            payment(dec!(6000), VerificationStatus::Verified),
            payment(dec!(6000), VerificationStatus::Verified),
        ];

        assert!(balance_remaining(&q, &over) < Decimal::ZERO);
        assert_eq!(spendable_remaining(&q, &over), Decimal::ZERO);
        assert_eq!(
            derived_payment_state(&q, &over),
            QuotationPaymentStatus::FullyPaid
        );
    }
}
