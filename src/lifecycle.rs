//! Quotation lifecycle controller.
//!
//! Owns the acceptance axis (draft through signed/declined), the signing
//! gate, and the lock predicate that vetoes destructive edits once money has
//! been verified against the quotation. Payment-derived statuses are written
//! by the verification engine, never here.

use std::sync::Arc;

use tracing::info;

use super::audit::{self, AuditAction, AuditRecord, EntityKind};
use super::error::LifecycleError;
use super::money::Money;
use super::quotation::{AcceptanceStatus, Quotation};
use super::store;
use super::types::{Actor, TimeStamp};
use super::utils;

pub struct QuotationLifecycle {
    instance: Arc<sled::Db>,
}

impl QuotationLifecycle {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Create a new quotation in draft for a customer of a company.
    pub fn create(
        &self,
        company_id: &str,
        customer_id: &str,
        lead_id: Option<String>,
        total_amount: Money,
        actor: &Actor,
    ) -> Result<Quotation, LifecycleError> {
        self.require_editor(actor)?;
        if !total_amount.is_positive() {
            return Err(LifecycleError::AmountOutOfRange(format!(
                "quotation total {total_amount} must be positive"
            )));
        }

        let quotation = Quotation::new(
            utils::new_uuid_to_bech32(store::QUOTATION_HRP)?,
            company_id.to_string(),
            customer_id.to_string(),
            lead_id,
            total_amount,
        );

        let record = AuditRecord::new(
            EntityKind::Quotation,
            quotation.quotation_id.clone(),
            AuditAction::QuotationCreated,
            actor.actor_id.clone(),
            None,
            Some(store::encode(&quotation)?),
        )?;
        let (audit_key, audit_bytes) = record.staged()?;

        let mut batch = sled::Batch::default();
        batch.insert(quotation.quotation_id.as_bytes(), store::encode(&quotation)?);
        batch.insert(audit_key.as_bytes(), audit_bytes);
        self.instance.apply_batch(batch)?;

        info!(quotation_id = %quotation.quotation_id, total = %quotation.total_amount, "quotation created");
        Ok(quotation)
    }

    /// Freeze line items: draft becomes finalized.
    pub fn finalize(&self, quotation_id: &str, actor: &Actor) -> Result<Quotation, LifecycleError> {
        self.require_editor(actor)?;
        self.transition(quotation_id, actor, AuditAction::QuotationFinalized, |q| {
            match q.acceptance_status {
                AcceptanceStatus::Draft => {
                    q.acceptance_status = AcceptanceStatus::Finalized;
                    Ok(())
                }
                other => Err(LifecycleError::invalid_transition(
                    other,
                    AcceptanceStatus::Finalized,
                )),
            }
        })
    }

    /// Record that the quotation went out to the customer. Transmission
    /// itself is the host's concern; this only moves status and audits.
    pub fn mark_sent(&self, quotation_id: &str, actor: &Actor) -> Result<Quotation, LifecycleError> {
        self.transition(quotation_id, actor, AuditAction::QuotationSent, |q| {
            match q.acceptance_status {
                AcceptanceStatus::Draft | AcceptanceStatus::Finalized => {
                    q.acceptance_status = AcceptanceStatus::Sent;
                    Ok(())
                }
                other => Err(LifecycleError::invalid_transition(other, AcceptanceStatus::Sent)),
            }
        })
    }

    /// Customer (or staff on their behalf) accepts the quotation.
    pub fn accept(&self, quotation_id: &str, actor: &Actor) -> Result<Quotation, LifecycleError> {
        self.transition(quotation_id, actor, AuditAction::QuotationAccepted, |q| {
            match q.acceptance_status {
                AcceptanceStatus::Sent => {
                    q.acceptance_status = AcceptanceStatus::Accepted;
                    Ok(())
                }
                other => Err(LifecycleError::invalid_transition(
                    other,
                    AcceptanceStatus::Accepted,
                )),
            }
        })
    }

    /// Acknowledgement gate required before signing.
    pub fn acknowledge(
        &self,
        quotation_id: &str,
        actor: &Actor,
    ) -> Result<Quotation, LifecycleError> {
        let acknowledged_at = TimeStamp::new();
        self.transition(quotation_id, actor, AuditAction::QuotationAcknowledged, |q| {
            match q.acceptance_status {
                AcceptanceStatus::Sent | AcceptanceStatus::Accepted => {
                    q.acknowledged = true;
                    q.acknowledged_by = Some(actor.actor_id.clone());
                    q.acknowledged_at = Some(acknowledged_at.clone());
                    Ok(())
                }
                other => Err(LifecycleError::invalid_transition(other, "acknowledged")),
            }
        })
    }

    /// Sign the quotation. Requires the acknowledgement gate, a signer name
    /// and a signature payload; the signature fields are set exactly once.
    pub fn sign(
        &self,
        quotation_id: &str,
        actor: &Actor,
        signer_name: &str,
        signature_image: Vec<u8>,
    ) -> Result<Quotation, LifecycleError> {
        if signer_name.trim().is_empty() {
            return Err(LifecycleError::Validation(
                "signing requires a signer name".into(),
            ));
        }
        if signature_image.is_empty() {
            return Err(LifecycleError::Validation(
                "signing requires a signature payload".into(),
            ));
        }

        let signed_at = TimeStamp::new();
        self.transition(quotation_id, actor, AuditAction::QuotationSigned, |q| {
            match q.acceptance_status {
                AcceptanceStatus::Accepted | AcceptanceStatus::Sent => {
                    if !q.acknowledged {
                        return Err(LifecycleError::Validation(
                            "quotation must be acknowledged before signing".into(),
                        ));
                    }
                    q.acceptance_status = AcceptanceStatus::Signed;
                    q.signed_by = Some(signer_name.to_string());
                    q.signed_at = Some(signed_at.clone());
                    q.signature_image = Some(signature_image.clone());
                    Ok(())
                }
                other => Err(LifecycleError::invalid_transition(
                    other,
                    AcceptanceStatus::Signed,
                )),
            }
        })
    }

    /// Decline, terminal for the acceptance sub-flow.
    pub fn decline(&self, quotation_id: &str, actor: &Actor) -> Result<Quotation, LifecycleError> {
        self.transition(quotation_id, actor, AuditAction::QuotationDeclined, |q| {
            if q.acceptance_status.is_terminal() {
                return Err(LifecycleError::invalid_transition(
                    q.acceptance_status,
                    AcceptanceStatus::Declined,
                ));
            }
            q.acceptance_status = AcceptanceStatus::Declined;
            Ok(())
        })
    }

    /// Replace the total while it is still mutable: draft only, and never
    /// once any payment exists against the quotation.
    pub fn update_total(
        &self,
        quotation_id: &str,
        actor: &Actor,
        total_amount: Money,
    ) -> Result<Quotation, LifecycleError> {
        self.require_editor(actor)?;
        if !total_amount.is_positive() {
            return Err(LifecycleError::AmountOutOfRange(format!(
                "quotation total {total_amount} must be positive"
            )));
        }

        self.transition(quotation_id, actor, AuditAction::QuotationTotalUpdated, |q| {
            if q.acceptance_status != AcceptanceStatus::Draft {
                return Err(LifecycleError::invalid_transition(
                    q.acceptance_status,
                    "total update",
                ));
            }
            if !q.payment_ids.is_empty() {
                return Err(LifecycleError::Validation(
                    "total is frozen once a payment exists".into(),
                ));
            }
            q.total_amount = total_amount;
            Ok(())
        })
    }

    /// Whether destructive edits are vetoed for this actor right now.
    ///
    /// Always answered from a live read of the payment set; verification is
    /// asynchronous relative to the edit attempt, so a cached answer could
    /// let a delete slip past a decision that just committed.
    pub fn is_locked(&self, quotation_id: &str, actor: &Actor) -> Result<bool, LifecycleError> {
        let (quotation, _) = store::load_quotation(&self.instance, quotation_id)?;
        let payments = store::load_payments(&self.instance, &quotation)?;
        let has_verified = payments.iter().any(|p| p.is_verified());
        Ok(has_verified && !actor.capabilities.can_override_lock)
    }

    /// Delete a quotation and its payments. Refused while verified money is
    /// attached unless the actor holds the override capability. The audit
    /// trail survives the deletion.
    pub fn delete(&self, quotation_id: &str, actor: &Actor) -> Result<(), LifecycleError> {
        let (_, snapshot) = store::load_quotation(&self.instance, quotation_id)?;

        let actor_id = actor.actor_id.clone();
        let can_override = actor.capabilities.can_override_lock;
        self.instance.transaction(move |tx| {
            store::tx_expect_unchanged(tx, quotation_id, &snapshot)?;

            let quotation = store::tx_get_quotation(tx, quotation_id)?;
            let payments = store::tx_get_payments(tx, &quotation)?;
            if payments.iter().any(|p| p.is_verified()) && !can_override {
                return store::abort(LifecycleError::PermissionDenied(format!(
                    "quotation {quotation_id} has verified payments and is locked"
                )));
            }

            let record = AuditRecord::new(
                EntityKind::Quotation,
                quotation.quotation_id.clone(),
                AuditAction::QuotationDeleted,
                actor_id.clone(),
                Some(store::tx_encode(&quotation)?),
                None,
            )
            .or_else(store::abort)?;
            let (audit_key, audit_bytes) = record.staged().or_else(store::abort)?;

            for payment in &payments {
                tx.remove(payment.payment_id.as_bytes())?;
            }
            tx.remove(quotation.quotation_id.as_bytes())?;
            tx.insert(audit_key.as_bytes(), audit_bytes)?;

            Ok(())
        })?;

        info!(quotation_id, actor = %actor.actor_id, "quotation deleted");
        Ok(())
    }

    /// Audit history for a quotation or payment, oldest first.
    pub fn history(&self, entity_id: &str) -> Result<Vec<audit::AuditRecord>, LifecycleError> {
        audit::history_for(&self.instance, entity_id)
    }

    /// Current state of a quotation.
    pub fn load(&self, quotation_id: &str) -> Result<Quotation, LifecycleError> {
        let (quotation, _) = store::load_quotation(&self.instance, quotation_id)?;
        Ok(quotation)
    }

    fn require_editor(&self, actor: &Actor) -> Result<(), LifecycleError> {
        if actor.capabilities.can_edit_quotation {
            Ok(())
        } else {
            Err(LifecycleError::PermissionDenied(format!(
                "{} may not edit quotations",
                actor.actor_id
            )))
        }
    }

    /// Shared transactional shape of an acceptance-axis transition: re-read
    /// against the snapshot, validate, mutate and commit with the audit
    /// record. A rejected transition writes nothing, audit included.
    fn transition<F>(
        &self,
        quotation_id: &str,
        actor: &Actor,
        action: AuditAction,
        apply: F,
    ) -> Result<Quotation, LifecycleError>
    where
        F: Fn(&mut Quotation) -> Result<(), LifecycleError>,
    {
        let (_, snapshot) = store::load_quotation(&self.instance, quotation_id)?;

        let quotation = self.instance.transaction(|tx| {
            store::tx_expect_unchanged(tx, quotation_id, &snapshot)?;

            let mut quotation = store::tx_get_quotation(tx, quotation_id)?;
            let before = store::tx_encode(&quotation)?;
            apply(&mut quotation).or_else(store::abort)?;

            let record = AuditRecord::new(
                EntityKind::Quotation,
                quotation.quotation_id.clone(),
                action,
                actor.actor_id.clone(),
                Some(before),
                Some(store::tx_encode(&quotation)?),
            )
            .or_else(store::abort)?;
            let (audit_key, audit_bytes) = record.staged().or_else(store::abort)?;

            tx.insert(quotation.quotation_id.as_bytes(), store::tx_encode(&quotation)?)?;
            tx.insert(audit_key.as_bytes(), audit_bytes)?;

            Ok(quotation)
        })?;

        info!(quotation_id, action = ?action, "quotation transition applied");
        Ok(quotation)
    }
}
