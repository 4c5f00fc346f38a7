//! Append-only audit trail.
//!
//! One record per successful state-changing operation, written inside the
//! same transaction as the change itself. Records are never updated or
//! deleted, so the trail is a history of what actually happened, not of
//! attempts.

use chrono::Utc;
use sled::Db;

use super::error::LifecycleError;
use super::types::TimeStamp;
use super::utils;

const AUDIT_HRP: &str = "audit_";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    #[n(0)]
    Quotation,
    #[n(1)]
    Payment,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    #[n(0)]
    QuotationCreated,
    #[n(1)]
    QuotationFinalized,
    #[n(2)]
    QuotationSent,
    #[n(3)]
    QuotationAccepted,
    #[n(4)]
    QuotationAcknowledged,
    #[n(5)]
    QuotationSigned,
    #[n(6)]
    QuotationDeclined,
    #[n(7)]
    QuotationTotalUpdated,
    #[n(8)]
    QuotationDeleted,
    #[n(9)]
    PaymentSubmitted,
    #[n(10)]
    PaymentVerified,
    #[n(11)]
    PaymentRejected,
    #[n(12)]
    PaymentReopened,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct AuditRecord {
    #[n(0)]
    pub audit_id: String,
    #[n(1)]
    pub entity_type: EntityKind,
    #[n(2)]
    pub entity_id: String,
    #[n(3)]
    pub action: AuditAction,
    #[n(4)]
    pub actor_id: String,
    #[n(5)]
    pub recorded_at: TimeStamp<Utc>,
    // Opaque CBOR snapshots of the entity around the change.
    #[n(6)]
    pub before: Option<Vec<u8>>,
    #[n(7)]
    pub after: Option<Vec<u8>>,
}

impl AuditRecord {
    pub fn new(
        entity_type: EntityKind,
        entity_id: String,
        action: AuditAction,
        actor_id: String,
        before: Option<Vec<u8>>,
        after: Option<Vec<u8>>,
    ) -> Result<Self, LifecycleError> {
        Ok(Self {
            audit_id: utils::new_uuid_to_bech32(AUDIT_HRP)?,
            entity_type,
            entity_id,
            action,
            actor_id,
            recorded_at: TimeStamp::new(),
            before,
            after,
        })
    }

    /// Key and encoded value, ready to be inserted inside the caller's
    /// transaction so the record commits with the change it describes.
    pub fn staged(&self) -> Result<(String, Vec<u8>), LifecycleError> {
        let bytes =
            minicbor::to_vec(self).map_err(|e| LifecycleError::Codec(e.to_string()))?;
        Ok((self.audit_id.clone(), bytes))
    }
}

/// Full recorded history for one entity, oldest first.
pub fn history_for(db: &Db, entity_id: &str) -> Result<Vec<AuditRecord>, LifecycleError> {
    let mut records = vec![];
    for entry in db.scan_prefix(AUDIT_HRP.as_bytes()) {
        let (_, value) = entry?;
        let record: AuditRecord = minicbor::decode(value.as_ref())
            .map_err(|e| LifecycleError::Codec(e.to_string()))?;
        if record.entity_id == entity_id {
            records.push(record);
        }
    }
    records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_record_encoding() {
        let original = AuditRecord::new(
            EntityKind::Payment,
            "pay_1test".into(),
            AuditAction::PaymentVerified,
            "user_1test".into(),
            Some(vec![1, 2, 3]),
            Some(vec![4, 5, 6]),
        )
        .unwrap();

        let (key, bytes) = original.staged().unwrap();
        assert!(key.starts_with(AUDIT_HRP));

        let decode: AuditRecord = minicbor::decode(&bytes).unwrap();
        assert_eq!(original, decode);
    }
}
