//! Quotation payment lifecycle and verification engine.
//!
//! A library-level state machine consumed by a host application: quotations
//! move through acceptance and signature, staged payments are recorded
//! against them, a back-office role verifies or rejects each payment, and
//! verified funds roll up into the quotation's paid status while destructive
//! edits to financially-committed records are vetoed.
//!
//! The host supplies the actor identity and capabilities on every call; the
//! core checks flags, never authenticates. Records persist in an embedded
//! sled keyspace and every mutation commits atomically with its audit record.

pub mod audit;
pub mod balance;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod payment;
pub mod quotation;
pub(crate) mod store;
pub mod submission;
pub mod types;
pub mod utils;
pub mod verification;
