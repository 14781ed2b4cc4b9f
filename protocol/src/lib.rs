// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bazaar Protocol — Core Library
//!
//! A buyer and a seller agree on a purchase, settle it with fungible
//! payments, optionally redeem a seller-issued coupon, and have a notary
//! make the result final. Nobody trusts anybody: each side verifies the
//! transaction independently, computes the price itself, and signs only
//! what it checked.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and per-party exchange settings.
//! - **crypto** — Ed25519 keys and signatures, SHA-256 and BLAKE3 digests.
//! - **identity** — Party ids derived from public keys; the key registry.
//! - **ledger** — Records: purchase orders, payments, coupons.
//! - **transaction** — Building, signing and contract-verifying transactions.
//! - **coupon** — Which coupon applies, and what it knocks off.
//! - **signatures** — Collecting a complete, verified signature set.
//! - **vault** — Each party's store of unconsumed records.
//! - **tokens** — Issuing cash and coupons; selecting payments.
//! - **finality** — The notary: double-spend checks and commit.
//! - **exchange** — The seller/buyer session protocol itself.
//!
//! ## Design Philosophy
//!
//! 1. Verification is pure. Same bytes in, same verdict out, on both sides.
//! 2. Every collaborator is a trait with an in-memory implementation; no
//!    global state.
//! 3. Nothing is signed that failed local verification, and nothing is
//!    submitted twice.

pub mod config;
pub mod coupon;
pub mod crypto;
pub mod exchange;
pub mod finality;
pub mod identity;
pub mod ledger;
pub mod signatures;
pub mod tokens;
pub mod transaction;
pub mod vault;
