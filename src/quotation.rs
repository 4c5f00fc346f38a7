//! Quotation record and its two status axes.
//!
//! The acceptance axis (draft through signed/declined) and the payment axis
//! (pending through fully paid) are deliberately separate fields. The
//! lifecycle controller owns the first, the verification engine owns the
//! second, and neither overwrites the other.

use std::fmt;

use chrono::Utc;

use super::money::Money;
use super::types::TimeStamp;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Finalized,
    #[n(2)]
    Sent,
    #[n(3)]
    Accepted,
    #[n(4)]
    Declined,
    #[n(5)]
    Signed,
}

impl AcceptanceStatus {
    /// Declined and Signed end the acceptance sub-flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcceptanceStatus::Declined | AcceptanceStatus::Signed)
    }
}

impl fmt::Display for AcceptanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcceptanceStatus::Draft => "draft",
            AcceptanceStatus::Finalized => "finalized",
            AcceptanceStatus::Sent => "sent",
            AcceptanceStatus::Accepted => "accepted",
            AcceptanceStatus::Declined => "declined",
            AcceptanceStatus::Signed => "signed",
        };
        write!(f, "{name}")
    }
}

/// Payment-derived status, written only by the verification engine and (for
/// the finance-verification marker) the submission service.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotationPaymentStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    PendingFinanceVerification,
    #[n(2)]
    DepositPaid,
    #[n(3)]
    FullyPaid,
}

impl fmt::Display for QuotationPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotationPaymentStatus::Pending => "pending",
            QuotationPaymentStatus::PendingFinanceVerification => "pending_finance_verification",
            QuotationPaymentStatus::DepositPaid => "deposit_paid",
            QuotationPaymentStatus::FullyPaid => "fully_paid",
        };
        write!(f, "{name}")
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Quotation {
    #[n(0)]
    pub quotation_id: String,
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub customer_id: String,
    #[n(3)]
    pub lead_id: Option<String>,
    #[n(4)]
    pub acceptance_status: AcceptanceStatus,
    #[n(5)]
    pub payment_status: QuotationPaymentStatus,
    // Single source of truth for payment sufficiency. Frozen once the
    // quotation leaves Draft and once any payment exists.
    #[n(6)]
    pub total_amount: Money,
    #[n(7)]
    pub acknowledged: bool,
    #[n(8)]
    pub acknowledged_by: Option<String>,
    #[n(9)]
    pub acknowledged_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub signed_by: Option<String>,
    #[n(11)]
    pub signed_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub signature_image: Option<Vec<u8>>,
    // Ids of every payment ever submitted against this quotation, so the
    // aggregate recomputation can read the full set inside one transaction.
    #[n(13)]
    pub payment_ids: Vec<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
}

impl Quotation {
    pub fn new(
        quotation_id: String,
        company_id: String,
        customer_id: String,
        lead_id: Option<String>,
        total_amount: Money,
    ) -> Self {
        Self {
            quotation_id,
            company_id,
            customer_id,
            lead_id,
            acceptance_status: AcceptanceStatus::Draft,
            payment_status: QuotationPaymentStatus::Pending,
            total_amount,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            signed_by: None,
            signed_at: None,
            signature_image: None,
            payment_ids: vec![],
            created_at: TimeStamp::new(),
        }
    }
}
