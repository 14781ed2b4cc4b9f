// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bazaar Node
//!
//! Entry point for the `bazaar-node` binary. Wires a seller, a buyer, a
//! bank and a notary together in one process, runs a single exchange over
//! the in-memory transport, and prints the outcome with both vaults as JSON
//! on stdout.
//!
//! - `exchange` — run one purchase
//! - `version`  — print build version information

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use bazaar_protocol::config::{ExchangeConfig, PROTOCOL_VERSION};
use bazaar_protocol::crypto::PartyKeypair;
use bazaar_protocol::exchange::{
    buy, sell, ExchangeError, ExchangeOutcome, LocalTransport, PartyServices, SessionId,
};
use bazaar_protocol::finality::InMemoryNotary;
use bazaar_protocol::identity::{InMemoryKeyRegistry, PartyId};
use bazaar_protocol::tokens::{issue_cash, issue_coupon, LocalTokenService};
use bazaar_protocol::vault::{InMemoryVault, Vault, VaultSnapshot};

use cli::{BazaarNodeCli, Commands, ExchangeArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BazaarNodeCli::parse();

    match cli.command {
        Commands::Exchange(args) => run_exchange(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// What one party saw of the exchange.
#[derive(Debug, Serialize)]
struct PartyReport {
    party: PartyId,
    committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    vault: VaultSnapshot,
}

impl PartyReport {
    fn new(party: PartyId, result: &Result<ExchangeOutcome, ExchangeError>, vault: &dyn Vault) -> Self {
        Self {
            party,
            committed: result.is_ok(),
            tx_id: result.as_ref().ok().map(|o| o.transaction.id().to_string()),
            error: result.as_ref().err().map(ToString::to_string),
            vault: vault.snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExchangeReport {
    session_id: String,
    item_id: String,
    price: u64,
    seller: PartyReport,
    buyer: PartyReport,
}

/// Runs one exchange between fresh parties and prints the report.
async fn run_exchange(args: ExchangeArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    let config = ExchangeConfig::default()
        .with_currency(args.currency.clone())
        .with_receive_timeout(Duration::from_secs(args.timeout_secs))
        .with_coupon_strategy(args.coupon_strategy.into());

    // --- Identities ---
    let registry = Arc::new(InMemoryKeyRegistry::new());
    let seller_kp = Arc::new(PartyKeypair::generate());
    let buyer_kp = Arc::new(PartyKeypair::generate());
    let bank_kp = PartyKeypair::generate();
    let seller = registry.register("ShopA", seller_kp.public_key());
    let buyer = registry.register("Buyer", buyer_kp.public_key());
    let bank = registry.register("Bank", bank_kp.public_key());

    // --- Vaults and issuance ---
    let notary = Arc::new(InMemoryNotary::new());
    let seller_vault = Arc::new(InMemoryVault::new(seller));
    let buyer_vault = Arc::new(InMemoryVault::new(buyer));
    if args.buyer_cash > 0 {
        issue_cash(
            buyer_vault.as_ref(),
            notary.as_ref(),
            bank,
            &args.currency,
            args.buyer_cash,
        );
    }
    if let Some(coupon_item) = &args.coupon_item {
        issue_coupon(
            buyer_vault.as_ref(),
            notary.as_ref(),
            seller,
            coupon_item,
            args.coupon_discount,
        )
        .context("failed to issue coupon")?;
    }

    // --- Session ---
    let seller_transport = Arc::new(LocalTransport::new());
    let buyer_transport = Arc::new(LocalTransport::new());
    let session_id = SessionId::new();
    LocalTransport::connect(&seller_transport, seller, &buyer_transport, buyer, session_id);

    let seller_services = PartyServices {
        keypair: seller_kp,
        vault: seller_vault.clone(),
        tokens: Arc::new(LocalTokenService::new(seller_vault.clone())),
        registry: registry.clone(),
        notary: notary.clone(),
        transport: seller_transport,
        config: config.clone(),
    };
    let buyer_services = PartyServices {
        keypair: buyer_kp,
        vault: buyer_vault.clone(),
        tokens: Arc::new(LocalTokenService::new(buyer_vault.clone())),
        registry,
        notary,
        transport: buyer_transport,
        config,
    };

    tracing::info!(
        session_id = %session_id,
        seller = %seller,
        buyer = %buyer,
        item_id = %args.item,
        price = args.price,
        "running exchange"
    );
    let (sold, bought) = tokio::join!(
        sell(&seller_services, session_id, buyer, &args.item, args.price),
        buy(&buyer_services, session_id),
    );

    let report = ExchangeReport {
        session_id: session_id.to_string(),
        item_id: args.item.clone(),
        price: args.price,
        seller: PartyReport::new(seller, &sold, seller_vault.as_ref()),
        buyer: PartyReport::new(buyer, &bought, buyer_vault.as_ref()),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{}", json);

    sold.context("seller did not commit")?;
    bought.context("buyer did not commit")?;
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("bazaar-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", PROTOCOL_VERSION);
}
