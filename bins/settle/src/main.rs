//! Quill wallet settlement CLI.
//!
//! Seeds an in-memory store from a JSON scenario (customer wallets and one
//! invoice), pays the invoice down from the wallets and prints the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use quill_core::invoice::{
    BillingReason, CreateInvoiceInput, InvoiceType, LineItemInput, Metadata, PaymentStatus, PriceType,
};
use quill_core::payment::PaymentSource;
use quill_core::wallet::{Wallet, WalletPaymentStrategy, WalletType};
use quill_engine::{Collaborators, InMemoryStore, InvoiceService, WalletPaymentOptions, WalletPaymentService};
use quill_shared::{AppConfig, Currency, CustomerId, EnvironmentId, InvoiceId, TenantId, TenantScope, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quill-settle")]
#[command(about = "Pay an invoice from customer wallets", long_about = None)]
struct Cli {
    /// Path to the JSON scenario file.
    scenario: PathBuf,

    /// Wallet ordering (promotional_first, prepaid_first, balance_optimized).
    #[arg(long)]
    strategy: Option<String>,

    /// Maximum number of wallets to debit (0 = unbounded).
    #[arg(long)]
    max_wallets: Option<usize>,
}

#[derive(Deserialize)]
struct Scenario {
    invoice: ScenarioInvoice,
    wallets: Vec<ScenarioWallet>,
}

#[derive(Deserialize)]
struct ScenarioInvoice {
    currency: String,
    line_items: Vec<ScenarioLine>,
}

#[derive(Deserialize)]
struct ScenarioLine {
    amount: Decimal,
    price_type: PriceType,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ScenarioWallet {
    name: Option<String>,
    wallet_type: WalletType,
    currency: String,
    balance: Decimal,
    #[serde(default = "default_conversion_rate")]
    conversion_rate: Decimal,
}

fn default_conversion_rate() -> Decimal {
    Decimal::ONE
}

#[derive(Serialize)]
struct Report {
    invoice_id: InvoiceId,
    invoice_number: Option<String>,
    strategy: WalletPaymentStrategy,
    amount_due: Decimal,
    amount_paid: Decimal,
    amount_remaining: Decimal,
    payment_status: PaymentStatus,
    debits: Vec<DebitLine>,
}

#[derive(Serialize)]
struct DebitLine {
    wallet_id: WalletId,
    wallet_name: Option<String>,
    amount: Decimal,
    balance_after: Option<Decimal>,
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.clone().into());
    let json = config.logging.json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    let raw = tokio::fs::read_to_string(&cli.scenario)
        .await
        .with_context(|| format!("Failed to read scenario {}", cli.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("Invalid scenario file")?;

    let mut options = WalletPaymentOptions::from_config(&config.billing);
    if let Some(raw_strategy) = cli.strategy.as_deref() {
        let strategy = WalletPaymentStrategy::parse(raw_strategy)
            .with_context(|| format!("Unknown wallet strategy '{raw_strategy}'"))?;
        options = options.with_strategy(strategy);
    }
    if let Some(max_wallets) = cli.max_wallets {
        options = options.with_max_wallets(max_wallets);
    }
    options = options.with_metadata("source", "quill-settle");

    let store = InMemoryStore::new();
    let collaborators = Collaborators::default();
    let invoices = InvoiceService::new(store.clone(), collaborators.clone(), config.billing.clone());
    let wallets = WalletPaymentService::new(store.clone(), collaborators, config.billing.clone());

    let scope = TenantScope::new(TenantId::new(), EnvironmentId::new());
    let customer_id = CustomerId::new();
    let now = Utc::now();

    let mut names = Vec::with_capacity(scenario.wallets.len());
    for entry in scenario.wallets {
        let mut wallet = Wallet::open(
            scope.tenant_id,
            scope.environment_id,
            customer_id,
            Currency::new(&entry.currency),
            entry.wallet_type,
            entry.conversion_rate,
            now,
        );
        wallet.name.clone_from(&entry.name);
        let wallet = store.seed_wallet(wallet, entry.balance, now).await?;
        names.push((wallet.id, entry.name));
    }
    info!(customer_id = %customer_id, wallets = names.len(), "Scenario wallets seeded");

    let currency = Currency::new(&scenario.invoice.currency);
    let line_items = scenario
        .invoice
        .line_items
        .into_iter()
        .map(|line| LineItemInput {
            entity_type: None,
            entity_id: None,
            price_id: None,
            price_type: line.price_type,
            display_name: line.display_name,
            amount: line.amount,
            quantity: Decimal::ONE,
            currency: currency.clone(),
            period_start: None,
            period_end: None,
        })
        .collect();

    let invoice = invoices
        .create_invoice(
            scope,
            CreateInvoiceInput {
                customer_id,
                subscription_id: None,
                invoice_type: InvoiceType::OneOff,
                currency,
                invoice_status: None,
                payment_status: None,
                subtotal: None,
                amount_paid: None,
                billing_reason: BillingReason::Manual,
                idempotency_key: None,
                period_start: None,
                period_end: None,
                due_date: None,
                line_items,
                coupons: vec![],
                metadata: Metadata::new(),
            },
        )
        .await?;

    let amount_paid = wallets
        .process_invoice_payment_with_wallets(scope, Some(&invoice), &options)
        .await?;

    let settled = invoices.get_invoice(scope, invoice.id).await?;
    let mut debits = Vec::new();
    for payment in store.payments_for_invoice(invoice.id).await {
        let PaymentSource::Wallet { wallet_id } = payment.source else {
            continue;
        };
        let wallet_name = names
            .iter()
            .find(|(id, _)| *id == wallet_id)
            .and_then(|(_, name)| name.clone());
        let balance_after = store.wallet(wallet_id).await.map(|w| w.balance);
        debits.push(DebitLine {
            wallet_id,
            wallet_name,
            amount: payment.amount,
            balance_after,
        });
    }

    let report = Report {
        invoice_id: settled.id,
        invoice_number: settled.invoice_number,
        strategy: options.strategy,
        amount_due: settled.amount_due,
        amount_paid,
        amount_remaining: settled.amount_remaining,
        payment_status: settled.payment_status,
        debits,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
