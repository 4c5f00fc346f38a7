//! Payment submission service.
//!
//! Validates evidence, computes the staged amount against the live balance
//! and creates the payment in a single transaction with its audit record.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::audit::{AuditAction, AuditRecord, EntityKind};
use super::balance;
use super::error::LifecycleError;
use super::money::Money;
use super::payment::{Payment, PaymentMethod, PaymentStage};
use super::quotation::{AcceptanceStatus, QuotationPaymentStatus};
use super::store;
use super::types::Actor;
use super::utils;

/// Which portion of the total the caller wants to stage. Carries the
/// caller-supplied amount only where the stage allows one.
#[derive(Debug, Clone)]
pub enum StageInput {
    Downpayment { deposit_percentage: u8 },
    Balance,
    Partial { amount: Money },
}

pub struct PaymentSubmission {
    instance: Arc<sled::Db>,
}

impl PaymentSubmission {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Submit a new payment against a quotation.
    ///
    /// The payment is created `pending` and unlocked; manual-verification
    /// methods also move the quotation to awaiting finance review unless it
    /// is already fully paid. Nothing is written when validation fails.
    pub fn submit(
        &self,
        quotation_id: &str,
        stage: StageInput,
        method: PaymentMethod,
        actor: &Actor,
    ) -> Result<Payment, LifecycleError> {
        method.validate()?;
        if let StageInput::Downpayment { deposit_percentage } = stage {
            if !(10..=100).contains(&deposit_percentage) {
                return Err(LifecycleError::Validation(format!(
                    "deposit percentage must be between 10 and 100, got {deposit_percentage}"
                )));
            }
        }

        // Generated once so transaction retries reuse the same identity.
        let payment_id = utils::new_uuid_to_bech32(store::PAYMENT_HRP)?;

        let payment = self.instance.transaction(|tx| {
            let mut quotation = store::tx_get_quotation(tx, quotation_id)?;

            // Payments are only taken against an agreed quotation.
            match quotation.acceptance_status {
                AcceptanceStatus::Accepted | AcceptanceStatus::Signed => {}
                other => {
                    return store::abort(LifecycleError::invalid_transition(
                        other,
                        "payment submission",
                    ));
                }
            }

            let existing = store::tx_get_payments(tx, &quotation)?;
            let spendable = balance::spendable_remaining(&quotation, &existing);
            let currency = quotation.total_amount.currency;

            let (amount, stored_stage) = match &stage {
                StageInput::Downpayment { deposit_percentage } => {
                    let fraction =
                        Decimal::from(*deposit_percentage) / Decimal::ONE_HUNDRED;
                    let amount =
                        Money::new(quotation.total_amount.amount * fraction, currency)
                            .rounded();
                    (
                        amount,
                        PaymentStage::Downpayment {
                            deposit_percentage: *deposit_percentage,
                        },
                    )
                }
                StageInput::Balance => {
                    (Money::new(spendable, currency), PaymentStage::Balance)
                }
                StageInput::Partial { amount } => {
                    quotation.total_amount.ensure_same_currency(amount).or_else(store::abort)?;
                    if amount.amount > spendable {
                        return store::abort(LifecycleError::AmountOutOfRange(format!(
                            "partial amount {amount} exceeds remaining balance {spendable}"
                        )));
                    }
                    (*amount, PaymentStage::Partial)
                }
            };

            if !amount.is_positive() {
                return store::abort(LifecycleError::AmountOutOfRange(format!(
                    "computed amount {amount} must be positive"
                )));
            }

            let payment = Payment::new(
                payment_id.clone(),
                quotation.quotation_id.clone(),
                amount,
                method.clone(),
                stored_stage,
                actor.actor_id.clone(),
            );

            quotation.payment_ids.push(payment.payment_id.clone());
            // Manual methods park the quotation with finance, but a settled
            // quotation is never demoted by a late submission.
            if method.requires_manual_verification()
                && quotation.payment_status != QuotationPaymentStatus::FullyPaid
            {
                quotation.payment_status = QuotationPaymentStatus::PendingFinanceVerification;
            }

            let record = AuditRecord::new(
                EntityKind::Payment,
                payment.payment_id.clone(),
                AuditAction::PaymentSubmitted,
                actor.actor_id.clone(),
                None,
                Some(store::tx_encode(&payment)?),
            )
            .or_else(store::abort)?;
            let (audit_key, audit_bytes) = record.staged().or_else(store::abort)?;

            tx.insert(payment.payment_id.as_bytes(), store::tx_encode(&payment)?)?;
            tx.insert(quotation.quotation_id.as_bytes(), store::tx_encode(&quotation)?)?;
            tx.insert(audit_key.as_bytes(), audit_bytes)?;

            Ok(payment)
        })?;

        info!(
            payment_id = %payment.payment_id,
            quotation_id,
            amount = %payment.amount,
            method = %payment.method,
            "payment submitted"
        );

        Ok(payment)
    }
}
