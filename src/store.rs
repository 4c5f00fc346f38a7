//! Shared sled plumbing for the services.
//!
//! Records live in one flat keyspace, keyed by their bech32 id (`quote_…`,
//! `pay_…`, `audit_…`) and CBOR-encoded. Mutations run inside sled
//! transactions; a record that changed between the pre-transaction read and
//! the transactional re-read aborts with `ConcurrentModification`, which is
//! the conditional-write guard against racing decisions on the same record.

use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, IVec};

use super::error::LifecycleError;
use super::payment::Payment;
use super::quotation::Quotation;

pub(crate) const QUOTATION_HRP: &str = "quote_";
pub(crate) const PAYMENT_HRP: &str = "pay_";

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, LifecycleError>;

pub(crate) fn abort<T>(err: LifecycleError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, LifecycleError> {
    minicbor::to_vec(value).map_err(|e| LifecycleError::Codec(e.to_string()))
}

pub(crate) fn decode<'b, T: minicbor::Decode<'b, ()>>(
    bytes: &'b [u8],
) -> Result<T, LifecycleError> {
    minicbor::decode(bytes).map_err(|e| LifecycleError::Codec(e.to_string()))
}

pub(crate) fn load_quotation(db: &Db, id: &str) -> Result<(Quotation, IVec), LifecycleError> {
    let bytes = db
        .get(id)?
        .ok_or_else(|| LifecycleError::NotFound(format!("quotation {id}")))?;
    let quotation = decode(&bytes)?;
    Ok((quotation, bytes))
}

pub(crate) fn load_payment(db: &Db, id: &str) -> Result<(Payment, IVec), LifecycleError> {
    let bytes = db
        .get(id)?
        .ok_or_else(|| LifecycleError::NotFound(format!("payment {id}")))?;
    let payment = decode(&bytes)?;
    Ok((payment, bytes))
}

/// Every payment ever submitted against the quotation, live from the store.
pub(crate) fn load_payments(db: &Db, quotation: &Quotation) -> Result<Vec<Payment>, LifecycleError> {
    let mut payments = Vec::with_capacity(quotation.payment_ids.len());
    for id in &quotation.payment_ids {
        let (payment, _) = load_payment(db, id)?;
        payments.push(payment);
    }
    Ok(payments)
}

/// Re-read a record inside the transaction and fail the operation if it no
/// longer matches the snapshot the caller validated against.
pub(crate) fn tx_expect_unchanged(
    tx: &TransactionalTree,
    key: &str,
    snapshot: &IVec,
) -> TxResult<()> {
    match tx.get(key)? {
        Some(current) if current == *snapshot => Ok(()),
        _ => abort(LifecycleError::ConcurrentModification(key.to_string())),
    }
}

pub(crate) fn tx_get_quotation(tx: &TransactionalTree, id: &str) -> TxResult<Quotation> {
    let Some(bytes) = tx.get(id)? else {
        return abort(LifecycleError::NotFound(format!("quotation {id}")));
    };
    decode(&bytes).or_else(abort)
}

pub(crate) fn tx_get_payment(tx: &TransactionalTree, id: &str) -> TxResult<Payment> {
    let Some(bytes) = tx.get(id)? else {
        return abort(LifecycleError::NotFound(format!("payment {id}")));
    };
    decode(&bytes).or_else(abort)
}

/// The quotation's full payment set, read transactionally so the aggregate
/// recomputation and the write it feeds commit or fail together.
pub(crate) fn tx_get_payments(tx: &TransactionalTree, quotation: &Quotation) -> TxResult<Vec<Payment>> {
    let mut payments = Vec::with_capacity(quotation.payment_ids.len());
    for id in &quotation.payment_ids {
        payments.push(tx_get_payment(tx, id)?);
    }
    Ok(payments)
}

pub(crate) fn tx_encode<T: minicbor::Encode<()>>(value: &T) -> TxResult<Vec<u8>> {
    encode(value).or_else(abort)
}
