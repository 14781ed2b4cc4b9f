//! # CLI Interface
//!
//! Command-line arguments for `bazaar-node`, via `clap` derive. Every
//! exchange setting has a `BAZAAR_*` environment fallback.

use clap::{Parser, Subcommand, ValueEnum};

use bazaar_protocol::config::{
    CouponStrategy, DEFAULT_COUPON_ITEM, DEFAULT_CURRENCY, DEFAULT_DISCOUNT_PERCENT,
};

use crate::logging::LogFormat;

/// Runs a Bazaar purchase exchange between an in-process seller and buyer.
#[derive(Parser, Debug)]
#[command(
    name = "bazaar-node",
    about = "Bazaar purchase-order exchange driver",
    version,
    propagate_version = true
)]
pub struct BazaarNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Issue cash (and optionally a coupon) to a buyer, run one exchange,
    /// and print both vaults as JSON.
    Exchange(ExchangeArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `exchange` subcommand.
#[derive(Parser, Debug)]
pub struct ExchangeArgs {
    /// Item the seller offers.
    #[arg(long, env = "BAZAAR_ITEM", default_value = "item123")]
    pub item: String,

    /// Base price, in the currency's smallest unit.
    #[arg(long, env = "BAZAAR_PRICE", default_value_t = 700)]
    pub price: u64,

    /// Cash the bank issues to the buyer before the exchange.
    #[arg(long, env = "BAZAAR_BUYER_CASH", default_value_t = 2000)]
    pub buyer_cash: u64,

    /// Issue the buyer a seller coupon for this item. Pass without a value
    /// for the default coupon item.
    #[arg(
        long,
        env = "BAZAAR_COUPON_ITEM",
        num_args = 0..=1,
        default_missing_value = DEFAULT_COUPON_ITEM
    )]
    pub coupon_item: Option<String>,

    /// Discount of the issued coupon, in percent (below 100).
    #[arg(long, env = "BAZAAR_COUPON_DISCOUNT", default_value_t = DEFAULT_DISCOUNT_PERCENT)]
    pub coupon_discount: u8,

    #[arg(long, env = "BAZAAR_CURRENCY", default_value = DEFAULT_CURRENCY)]
    pub currency: String,

    /// Seconds either party waits for the next message.
    #[arg(long, env = "BAZAAR_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// How the buyer chooses the coupon it redeems.
    #[arg(long, env = "BAZAAR_COUPON_STRATEGY", value_enum, default_value_t = StrategyArg::Resolve)]
    pub coupon_strategy: StrategyArg,

    #[arg(long, env = "BAZAAR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Command-line spelling of [`CouponStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Redeem the one coupon bound to the offered item.
    Resolve,
    /// Redeem any coupon from the seller, whatever its item.
    RedeemAny,
}

impl From<StrategyArg> for CouponStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Resolve => CouponStrategy::Resolve,
            StrategyArg::RedeemAny => CouponStrategy::RedeemAnyFromSeller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        BazaarNodeCli::command().debug_assert();
    }

    #[test]
    fn exchange_defaults() {
        let cli = BazaarNodeCli::parse_from(["bazaar-node", "exchange"]);
        let Commands::Exchange(args) = cli.command else {
            panic!("expected exchange subcommand");
        };
        assert_eq!(args.price, 700);
        assert_eq!(args.buyer_cash, 2000);
        assert!(args.coupon_item.is_none());
        assert_eq!(args.coupon_strategy, StrategyArg::Resolve);
    }

    #[test]
    fn bare_coupon_flag_uses_default_item() {
        let cli = BazaarNodeCli::parse_from([
            "bazaar-node",
            "exchange",
            "--coupon-item",
            "--coupon-strategy",
            "redeem-any",
        ]);
        let Commands::Exchange(args) = cli.command else {
            panic!("expected exchange subcommand");
        };
        assert_eq!(args.coupon_item.as_deref(), Some(DEFAULT_COUPON_ITEM));
        assert_eq!(
            CouponStrategy::from(args.coupon_strategy),
            CouponStrategy::RedeemAnyFromSeller
        );
    }
}
