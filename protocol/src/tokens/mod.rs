//! # Token Layer
//!
//! Issues and moves the fungible payments and coupons the exchange trades
//! with. The exchange protocol only asks it for one thing,
//! [`TokenService::generate_move`]: pick inputs covering an amount and lay
//! out the resulting payment and change outputs.
//!
//! ```text
//! selection.rs — TokenService trait, LocalTokenService, MoveProposal
//! issuance.rs  — minting cash and coupons straight into a holder's vault
//! ```

pub mod issuance;
pub mod selection;

pub use issuance::{issue_cash, issue_coupon};
pub use selection::{LocalTokenService, MoveProposal, TokenError, TokenService};
