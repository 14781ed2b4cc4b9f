//! # Ledger Records
//!
//! The immutable facts a transaction consumes and produces. Each record
//! names the parties entitled to see it (its participants); a record lives
//! in every participant's vault until a later transaction consumes it.

pub mod records;

pub use records::{
    Coupon, FungiblePayment, PurchaseOrder, Record, RecordAndRef, RecordError, RecordKind,
    RecordRef,
};
