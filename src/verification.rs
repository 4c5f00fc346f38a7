//! Verification engine.
//!
//! Moves a payment between pending, verified and rejected, re-opens a
//! verified payment under an elevated override, and re-derives the owning
//! quotation's payment status inside the same transaction as every decision.
//!
//! The aggregate is always re-derived from the full current verified set,
//! never incremented, so racing decisions on different payments of one
//! quotation converge to the same result regardless of commit order.

use std::sync::Arc;

use sled::IVec;
use tracing::info;

use super::audit::{AuditAction, AuditRecord, EntityKind};
use super::balance;
use super::error::LifecycleError;
use super::payment::{DeliveryStatus, Payment, VerificationStatus};
use super::quotation::{Quotation, QuotationPaymentStatus};
use super::store;
use super::types::{Actor, TimeStamp};

pub struct VerificationEngine {
    instance: Arc<sled::Db>,
}

impl VerificationEngine {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Confirm that a pending payment's funds were received.
    ///
    /// Locks the payment and writes the re-derived aggregate status onto the
    /// owning quotation. A quotation already fully paid is never downgraded
    /// here; an over-paid balance from a racing verification clamps to fully
    /// paid rather than persisting an inconsistent state.
    pub fn verify(
        &self,
        payment_id: &str,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Payment, LifecycleError> {
        self.require_verifier(actor)?;

        let (payment, snapshot) = store::load_payment(&self.instance, payment_id)?;
        if !payment.awaiting_decision() {
            return Err(LifecycleError::invalid_transition(
                payment.verification_status,
                VerificationStatus::Verified,
            ));
        }
        payment.method.ensure_verification_evidence()?;

        let verified_at = TimeStamp::new();
        let payment = self.decide(
            payment_id,
            &snapshot,
            AuditAction::PaymentVerified,
            actor,
            |payment| {
                payment.verification_status = VerificationStatus::Verified;
                payment.is_locked = true;
                payment.verified_by = Some(actor.actor_id.clone());
                payment.verified_at = Some(verified_at.clone());
                payment.verification_notes = notes.clone();
            },
            |quotation, payments| {
                if quotation.payment_status == QuotationPaymentStatus::FullyPaid {
                    QuotationPaymentStatus::FullyPaid
                } else {
                    balance::derived_payment_state(quotation, payments)
                }
            },
        )?;

        info!(payment_id, actor = %actor.actor_id, "payment verified");
        Ok(payment)
    }

    /// Decline a pending payment. The payment stays unlocked and inert; a
    /// corrected attempt arrives as a new submission, never as an in-place
    /// edit of the rejected record.
    pub fn reject(
        &self,
        payment_id: &str,
        actor: &Actor,
        reason: &str,
        notes: Option<String>,
    ) -> Result<Payment, LifecycleError> {
        self.require_verifier(actor)?;
        if reason.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "a rejection requires a non-empty reason".into(),
            ));
        }

        let (payment, snapshot) = store::load_payment(&self.instance, payment_id)?;
        if !payment.awaiting_decision() {
            return Err(LifecycleError::invalid_transition(
                payment.verification_status,
                VerificationStatus::Rejected,
            ));
        }

        let payment = self.decide(
            payment_id,
            &snapshot,
            AuditAction::PaymentRejected,
            actor,
            |payment| {
                payment.verification_status = VerificationStatus::Rejected;
                payment.delivery_status = DeliveryStatus::Failed;
                payment.rejection_reason = Some(reason.to_string());
                payment.verification_notes = notes.clone();
            },
            balance::derived_payment_state,
        )?;

        info!(payment_id, actor = %actor.actor_id, reason, "payment rejected");
        Ok(payment)
    }

    /// Reverse a verification decision. Override-gated and never silent: the
    /// payment unlocks and the quotation's payment status is re-derived at
    /// once, even when that regresses it from fully paid.
    pub fn reopen(
        &self,
        payment_id: &str,
        actor: &Actor,
        reason: &str,
    ) -> Result<Payment, LifecycleError> {
        if !actor.capabilities.can_override_lock {
            return Err(LifecycleError::PermissionDenied(format!(
                "{} may not reopen verified payments",
                actor.actor_id
            )));
        }
        if reason.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "a reopen requires a non-empty reason".into(),
            ));
        }

        let (payment, snapshot) = store::load_payment(&self.instance, payment_id)?;
        if payment.verification_status != VerificationStatus::Verified {
            return Err(LifecycleError::invalid_transition(
                payment.verification_status,
                VerificationStatus::Pending,
            ));
        }

        let payment = self.decide(
            payment_id,
            &snapshot,
            AuditAction::PaymentReopened,
            actor,
            |payment| {
                payment.verification_status = VerificationStatus::Pending;
                payment.is_locked = false;
                payment.verified_by = None;
                payment.verified_at = None;
            },
            balance::derived_payment_state,
        )?;

        info!(payment_id, actor = %actor.actor_id, reason, "payment reopened");
        Ok(payment)
    }

    /// Current state of a payment.
    pub fn load(&self, payment_id: &str) -> Result<Payment, LifecycleError> {
        let (payment, _) = store::load_payment(&self.instance, payment_id)?;
        Ok(payment)
    }

    /// Live payment set for a quotation, in submission order.
    pub fn payments_for(&self, quotation_id: &str) -> Result<Vec<Payment>, LifecycleError> {
        let (quotation, _) = store::load_quotation(&self.instance, quotation_id)?;
        store::load_payments(&self.instance, &quotation)
    }

    fn require_verifier(&self, actor: &Actor) -> Result<(), LifecycleError> {
        if actor.capabilities.can_verify_payments {
            Ok(())
        } else {
            Err(LifecycleError::PermissionDenied(format!(
                "{} may not verify payments",
                actor.actor_id
            )))
        }
    }

    /// Shared transactional shape of a decision: re-read the payment against
    /// the snapshot the preconditions were validated on, apply the change,
    /// re-derive the aggregate over the full updated sibling set and commit
    /// together with the audit record, all-or-nothing.
    fn decide<M, A>(
        &self,
        payment_id: &str,
        snapshot: &IVec,
        action: AuditAction,
        actor: &Actor,
        mutate: M,
        aggregate: A,
    ) -> Result<Payment, LifecycleError>
    where
        M: Fn(&mut Payment),
        A: Fn(&Quotation, &[Payment]) -> QuotationPaymentStatus,
    {
        let payment = self.instance.transaction(|tx| {
            // Conditional-write guard: a decision that raced us voids this one.
            store::tx_expect_unchanged(tx, payment_id, snapshot)?;

            let mut payment = store::tx_get_payment(tx, payment_id)?;
            let before = store::tx_encode(&payment)?;
            mutate(&mut payment);

            let mut quotation = store::tx_get_quotation(tx, &payment.quotation_id)?;
            let mut siblings = store::tx_get_payments(tx, &quotation)?;
            let Some(own) = siblings
                .iter_mut()
                .find(|p| p.payment_id == payment.payment_id)
            else {
                return store::abort(LifecycleError::NotFound(format!(
                    "payment {payment_id} is not attached to quotation {}",
                    quotation.quotation_id
                )));
            };
            *own = payment.clone();

            let status = aggregate(&quotation, &siblings);
            quotation.payment_status = status;

            let record = AuditRecord::new(
                EntityKind::Payment,
                payment.payment_id.clone(),
                action,
                actor.actor_id.clone(),
                Some(before),
                Some(store::tx_encode(&payment)?),
            )
            .or_else(store::abort)?;
            let (audit_key, audit_bytes) = record.staged().or_else(store::abort)?;

            tx.insert(payment.payment_id.as_bytes(), store::tx_encode(&payment)?)?;
            tx.insert(quotation.quotation_id.as_bytes(), store::tx_encode(&quotation)?)?;
            tx.insert(audit_key.as_bytes(), audit_bytes)?;

            Ok(payment)
        })?;

        Ok(payment)
    }
}
