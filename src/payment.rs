//! Payment record, method evidence and verification state.

use std::fmt;

use chrono::Utc;

use super::error::LifecycleError;
use super::money::Money;
use super::types::TimeStamp;

/// How the funds were tendered, with the evidence each method requires.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    #[n(0)]
    Check {
        #[n(0)]
        bank_name: String,
        #[n(1)]
        check_number: String,
        #[n(2)]
        check_date: TimeStamp<Utc>,
        // Attached after the check is deposited; required before verification.
        #[n(3)]
        deposit_slip: Option<String>,
    },
    #[n(1)]
    Gateway {
        #[n(0)]
        transaction_id: String,
    },
    #[n(2)]
    TestSimulation,
}

impl PaymentMethod {
    /// Required evidence fields for the method, checked before any record is
    /// created.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        match self {
            PaymentMethod::Check {
                bank_name,
                check_number,
                ..
            } => {
                if bank_name.trim().is_empty() {
                    return Err(LifecycleError::Validation(
                        "check payment requires a bank name".into(),
                    ));
                }
                if check_number.trim().is_empty() {
                    return Err(LifecycleError::Validation(
                        "check payment requires a check number".into(),
                    ));
                }
                Ok(())
            }
            PaymentMethod::Gateway { transaction_id } => {
                if transaction_id.trim().is_empty() {
                    return Err(LifecycleError::Validation(
                        "gateway payment requires a transaction id".into(),
                    ));
                }
                Ok(())
            }
            PaymentMethod::TestSimulation => Ok(()),
        }
    }

    /// Whether a back-office decision is needed before funds count.
    pub fn requires_manual_verification(&self) -> bool {
        match self {
            PaymentMethod::Check { .. } | PaymentMethod::TestSimulation => true,
            PaymentMethod::Gateway { .. } => false,
        }
    }

    /// Check payments may not be verified until a deposit slip is on file.
    pub fn ensure_verification_evidence(&self) -> Result<(), LifecycleError> {
        match self {
            PaymentMethod::Check { deposit_slip, .. } => match deposit_slip {
                Some(slip) if !slip.trim().is_empty() => Ok(()),
                _ => Err(LifecycleError::MissingEvidence(
                    "check payment has no deposit slip reference".into(),
                )),
            },
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Check { .. } => "check",
            PaymentMethod::Gateway { .. } => "gateway",
            PaymentMethod::TestSimulation => "test_simulation",
        };
        write!(f, "{name}")
    }
}

/// Which portion of the quotation total this payment represents.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStage {
    #[n(0)]
    Downpayment {
        #[n(0)]
        deposit_percentage: u8,
    },
    #[n(1)]
    Balance,
    #[n(2)]
    Partial,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Verified,
    #[n(2)]
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

/// Method-level delivery outcome, distinct from the verification decision.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    #[n(0)]
    Submitted,
    #[n(1)]
    Failed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Payment {
    #[n(0)]
    pub payment_id: String,
    #[n(1)]
    pub quotation_id: String,
    #[n(2)]
    pub amount: Money,
    #[n(3)]
    pub method: PaymentMethod,
    #[n(4)]
    pub stage: PaymentStage,
    #[n(5)]
    pub verification_status: VerificationStatus,
    #[n(6)]
    pub delivery_status: DeliveryStatus,
    // Set on verification; only reopen may clear it.
    #[n(7)]
    pub is_locked: bool,
    #[n(8)]
    pub rejection_reason: Option<String>,
    #[n(9)]
    pub verification_notes: Option<String>,
    #[n(10)]
    pub verified_by: Option<String>,
    #[n(11)]
    pub verified_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub submitted_by: String,
    #[n(13)]
    pub submitted_at: TimeStamp<Utc>,
}

impl Payment {
    pub fn new(
        payment_id: String,
        quotation_id: String,
        amount: Money,
        method: PaymentMethod,
        stage: PaymentStage,
        submitted_by: String,
    ) -> Self {
        Self {
            payment_id,
            quotation_id,
            amount,
            method,
            stage,
            verification_status: VerificationStatus::Pending,
            delivery_status: DeliveryStatus::Submitted,
            is_locked: false,
            rejection_reason: None,
            verification_notes: None,
            verified_by: None,
            verified_at: None,
            submitted_by,
            submitted_at: TimeStamp::new(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    pub fn awaiting_decision(&self) -> bool {
        self.verification_status == VerificationStatus::Pending && !self.is_locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use rust_decimal_macros::dec;

    fn check_method(deposit_slip: Option<&str>) -> PaymentMethod {
        PaymentMethod::Check {
            bank_name: "BDO".into(),
            check_number: "000123".into(),
            check_date: TimeStamp::new(),
            deposit_slip: deposit_slip.map(Into::into),
        }
    }

    #[test]
    fn check_requires_bank_and_number() {
        let missing_bank = PaymentMethod::Check {
            bank_name: "".into(),
            check_number: "000123".into(),
            check_date: TimeStamp::new(),
            deposit_slip: None,
        };
        assert!(missing_bank.validate().is_err());
        assert!(check_method(None).validate().is_ok());
    }

    #[test]
    fn gateway_requires_transaction_id() {
        let missing = PaymentMethod::Gateway {
            transaction_id: "  ".into(),
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn deposit_slip_gates_verification() {
        assert!(check_method(None).ensure_verification_evidence().is_err());
        assert!(check_method(Some("")).ensure_verification_evidence().is_err());
        assert!(
            check_method(Some("slip-77"))
                .ensure_verification_evidence()
                .is_ok()
        );
        assert!(
            PaymentMethod::Gateway {
                transaction_id: "txn_1".into()
            }
            .ensure_verification_evidence()
            .is_ok()
        );
    }

    #[test]
    fn manual_verification_by_method() {
        assert!(check_method(None).requires_manual_verification());
        assert!(PaymentMethod::TestSimulation.requires_manual_verification());
        assert!(
            !PaymentMethod::Gateway {
                transaction_id: "txn_1".into()
            }
            .requires_manual_verification()
        );
    }

    #[test]
    fn payment_encoding() {
        let original = Payment::new(
            "pay_1test".into(),
            "quote_1test".into(),
            Money::new(dec!(5000), Currency::PHP),
            check_method(Some("slip-1")),
            PaymentStage::Downpayment {
                deposit_percentage: 50,
            },
            "user_1test".into(),
        );

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Payment = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}
