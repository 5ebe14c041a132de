use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::{
    OfflineFulfillment, PurchaseOrchestrator, PurchaseReceipt, WalletConfig, WalletReceipt,
    WalletService,
};
use crate::config::Config;
use crate::domain::{
    AccountId, Disco, MeterType, Network, PurchaseOrder, TvProvider, format_naira, parse_naira,
};
use crate::io::Exporter;
use crate::storage::SqliteLedgerStore;

type Service = WalletService<SqliteLedgerStore>;

/// NeoCharge wallet ledger
#[derive(Parser)]
#[command(name = "neocharge-wallet")]
#[command(about = "Wallet ledger for airtime, data, TV and electricity purchases")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides NEOCHARGE_DATABASE)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Show the balance of an account
    Balance {
        /// Account ID
        account: String,
    },

    /// Add money to a wallet
    Credit {
        /// Account ID
        account: String,

        /// Amount in Naira (e.g., "500" or "1,250.50")
        amount: String,

        /// Reason recorded in the ledger
        #[arg(short, long, default_value = "topup")]
        reason: String,

        /// Idempotency key (generated if omitted)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Take money from a wallet
    Debit {
        /// Account ID
        account: String,

        /// Amount in Naira (e.g., "500" or "1,250.50")
        amount: String,

        /// Reason recorded in the ledger
        #[arg(short, long)]
        reason: String,

        /// Idempotency key (generated if omitted)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List transactions, newest first
    History {
        /// Only transactions of this account
        #[arg(long)]
        account: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show a transaction by its idempotency key
    Show {
        /// Idempotency key
        key: String,
    },

    /// Buy a product, paying from the wallet
    #[command(subcommand)]
    Buy(BuyCommands),

    /// Export account balances or a full JSON snapshot
    Export {
        /// What to export
        #[arg(value_enum)]
        export_type: ExportType,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a wallet with zero balance
    Open {
        /// Account ID (the user's ID; generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Show account details and recent transactions
    Show {
        /// Account ID
        id: String,

        /// Number of recent transactions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List all accounts
    List,
}

/// Options shared by every purchase.
#[derive(clap::Args)]
pub struct PurchaseArgs {
    /// Account ID paying for the purchase
    #[arg(long)]
    pub account: String,

    /// Idempotency key (generated if omitted)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Make the offline provider reject the order, to exercise the refund path
    #[arg(long)]
    pub simulate_failure: Option<String>,
}

#[derive(Subcommand)]
pub enum BuyCommands {
    /// Airtime top-up
    Airtime {
        #[command(flatten)]
        common: PurchaseArgs,

        /// Network: mtn, glo, airtel, 9mobile
        #[arg(long)]
        network: String,

        /// Phone number (e.g., 08031234567 or +2348031234567)
        #[arg(long)]
        phone: String,

        /// Amount in Naira
        #[arg(long)]
        amount: String,
    },

    /// Data bundle
    Data {
        #[command(flatten)]
        common: PurchaseArgs,

        /// Network: mtn, glo, airtel, 9mobile
        #[arg(long)]
        network: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// Plan code from the provider's catalogue
        #[arg(long)]
        plan: String,

        /// Plan price in Naira
        #[arg(long)]
        price: String,
    },

    /// TV subscription
    Tv {
        #[command(flatten)]
        common: PurchaseArgs,

        /// Provider: dstv, gotv, startimes, showmax
        #[arg(long)]
        provider: String,

        /// Smartcard / IUC number
        #[arg(long)]
        smartcard: String,

        /// Bouquet code
        #[arg(long)]
        bouquet: String,

        /// Bouquet price in Naira
        #[arg(long)]
        price: String,
    },

    /// Electricity token or postpaid bill
    Electricity {
        #[command(flatten)]
        common: PurchaseArgs,

        /// Distribution company, e.g. ikeja-electric
        #[arg(long)]
        disco: String,

        /// Meter type: prepaid, postpaid
        #[arg(long, default_value = "prepaid")]
        meter_type: String,

        /// Meter number
        #[arg(long)]
        meter: String,

        /// Amount in Naira
        #[arg(long)]
        amount: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportType {
    Accounts,
    Snapshot,
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let database = self.database.unwrap_or(config.database);

        match self.command {
            Commands::Init => {
                Service::init(&database, config.wallet).await?;
                println!("Database initialized: {}", database);
            }

            Commands::Account(account_cmd) => {
                let service = connect(&database, config.wallet).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Balance { account } => {
                let service = connect(&database, config.wallet).await?;
                let account_id = parse_account_id(&account)?;
                let balance = service.get_balance(account_id).await?;
                println!("{}: NGN {}", account_id, format_naira(balance));
            }

            Commands::Credit {
                account,
                amount,
                reason,
                key,
            } => {
                let service = connect(&database, config.wallet).await?;
                let account_id = parse_account_id(&account)?;
                let amount = parse_amount(&amount)?;
                let key = key.unwrap_or_else(new_key);
                let receipt = service.credit(account_id, amount, &reason, &key).await?;
                print_receipt("Credited", &receipt);
            }

            Commands::Debit {
                account,
                amount,
                reason,
                key,
            } => {
                let service = connect(&database, config.wallet).await?;
                let account_id = parse_account_id(&account)?;
                let amount = parse_amount(&amount)?;
                let key = key.unwrap_or_else(new_key);
                let receipt = service.debit(account_id, amount, &reason, &key).await?;
                print_receipt("Debited", &receipt);
            }

            Commands::History {
                account,
                limit,
                format,
                output,
            } => {
                let service = connect(&database, config.wallet).await?;
                let account_id = account.as_deref().map(parse_account_id).transpose()?;
                run_history_command(&service, account_id, limit, format, output).await?;
            }

            Commands::Show { key } => {
                let service = connect(&database, config.wallet).await?;
                run_show_command(&service, &key).await?;
            }

            Commands::Buy(buy_cmd) => {
                let service = connect(&database, config.wallet).await?;
                run_buy_command(service, buy_cmd).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = connect(&database, config.wallet).await?;
                let writer = open_output(output.as_deref())?;
                let exporter = Exporter::new(&service);
                match export_type {
                    ExportType::Accounts => {
                        let count = exporter.export_accounts_csv(writer).await?;
                        eprintln!("Exported {} accounts", count);
                    }
                    ExportType::Snapshot => {
                        let snapshot = exporter.export_snapshot_json(writer).await?;
                        eprintln!(
                            "Exported {} accounts and {} transactions",
                            snapshot.accounts.len(),
                            snapshot.transactions.len()
                        );
                    }
                }
            }

            Commands::Check => {
                let service = connect(&database, config.wallet).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn connect(database: &str, wallet: WalletConfig) -> Result<Service> {
    Service::connect(database, wallet)
        .await
        .with_context(|| format!("Cannot open '{}'. Run 'init' first?", database))
}

async fn run_account_command(service: &Service, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { id } => {
            let account_id = match id {
                Some(id) => parse_account_id(&id)?,
                None => Uuid::new_v4(),
            };
            let account = service.open_account(account_id).await?;
            println!("Opened account: {}", account.account_id);
        }

        AccountCommands::Show { id, limit } => {
            let account_id = parse_account_id(&id)?;
            let account = service.get_account(account_id).await?;
            let recent = service.history(account_id, Some(limit)).await?;

            println!("Account:  {}", account.account_id);
            println!("Balance:  NGN {}", format_naira(account.balance));
            println!("Version:  {}", account.version);
            println!("Opened:   {}", account.created_at.format("%Y-%m-%d %H:%M"));
            println!("Updated:  {}", account.updated_at.format("%Y-%m-%d %H:%M"));
            println!();
            if recent.is_empty() {
                println!("No transactions yet.");
            } else {
                print_history_table(&recent);
            }
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<38} {:>16} {:>8}", "ACCOUNT", "BALANCE", "VERSION");
                println!("{}", "-".repeat(64));
                for account in accounts {
                    println!(
                        "{:<38} {:>16} {:>8}",
                        account.account_id,
                        format_naira(account.balance),
                        account.version
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_history_command(
    service: &Service,
    account_id: Option<AccountId>,
    limit: Option<usize>,
    format: OutputFormat,
    output: Option<String>,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let records = match account_id {
                Some(id) => service.history(id, limit).await?,
                None => service.list_transactions(limit).await?,
            };
            if records.is_empty() {
                println!("No transactions found.");
            } else {
                print_history_table(&records);
            }
        }
        OutputFormat::Csv => {
            let writer = open_output(output.as_deref())?;
            Exporter::new(service)
                .export_transactions_csv(account_id, limit, writer)
                .await?;
        }
        OutputFormat::Json => {
            let writer = open_output(output.as_deref())?;
            Exporter::new(service)
                .export_transactions_json(account_id, limit, writer)
                .await?;
        }
    }
    Ok(())
}

async fn run_show_command(service: &Service, key: &str) -> Result<()> {
    let record = service
        .find_transaction(key)
        .await?
        .with_context(|| format!("Transaction not found: {}", key))?;

    println!("Transaction: {}", record.transaction_id);
    println!("Sequence:    {}", record.sequence);
    println!("Account:     {}", record.account_id);
    println!("Direction:   {}", record.direction);
    println!("Amount:      NGN {}", format_naira(record.amount));
    println!("Balance:     NGN {}", format_naira(record.balance_after));
    println!("Status:      {}", record.status);
    println!("Reason:      {}", record.reason);
    println!("Recorded:    {}", record.created_at.to_rfc3339());
    Ok(())
}

async fn run_buy_command(service: Service, cmd: BuyCommands) -> Result<()> {
    let (common, order) = match cmd {
        BuyCommands::Airtime {
            common,
            network,
            phone,
            amount,
        } => (
            common,
            PurchaseOrder::Airtime {
                network: parse_network(&network)?,
                phone,
                amount: parse_amount(&amount)?,
            },
        ),
        BuyCommands::Data {
            common,
            network,
            phone,
            plan,
            price,
        } => (
            common,
            PurchaseOrder::Data {
                network: parse_network(&network)?,
                phone,
                plan_code: plan,
                amount: parse_amount(&price)?,
            },
        ),
        BuyCommands::Tv {
            common,
            provider,
            smartcard,
            bouquet,
            price,
        } => (
            common,
            PurchaseOrder::Tv {
                provider: TvProvider::from_str(&provider).with_context(|| {
                    format!(
                        "Invalid TV provider '{}'. Use: dstv, gotv, startimes, showmax",
                        provider
                    )
                })?,
                smartcard,
                bouquet,
                amount: parse_amount(&price)?,
            },
        ),
        BuyCommands::Electricity {
            common,
            disco,
            meter_type,
            meter,
            amount,
        } => (
            common,
            PurchaseOrder::Electricity {
                disco: Disco::from_str(&disco).with_context(|| {
                    format!("Invalid distribution company '{}'", disco)
                })?,
                meter_type: MeterType::from_str(&meter_type).with_context(|| {
                    format!("Invalid meter type '{}'. Use: prepaid, postpaid", meter_type)
                })?,
                meter_number: meter,
                amount: parse_amount(&amount)?,
            },
        ),
    };

    let account_id = parse_account_id(&common.account)?;
    let key = common.key.unwrap_or_else(new_key);
    let fulfillment = match common.simulate_failure {
        Some(message) => OfflineFulfillment::failing(message),
        None => OfflineFulfillment::new(),
    };

    let orchestrator = PurchaseOrchestrator::new(service, fulfillment);
    let receipt = orchestrator
        .purchase(account_id, order, &key)
        .await
        .with_context(|| format!("Purchase {} did not complete", key))?;
    print_purchase(&receipt);
    Ok(())
}

async fn run_check_command(service: &Service) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:     {}", report.account_count);
    println!("Transactions: {}", report.transaction_count);
    println!("  completed:  {}", report.completed_count);
    println!("  failed:     {}", report.failed_count);
    println!("  pending:    {}", report.pending_count);
    println!("Total held:   NGN {}", format_naira(report.total_balance));
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn print_receipt(verb: &str, receipt: &WalletReceipt) {
    let record = &receipt.transaction;
    println!(
        "{} NGN {} ({}), balance now NGN {}{}",
        verb,
        format_naira(record.amount),
        record.transaction_id,
        format_naira(receipt.new_balance),
        if receipt.replayed {
            " [already processed]"
        } else {
            ""
        }
    );
}

fn print_purchase(receipt: &PurchaseReceipt) {
    println!(
        "Bought {} {} for {}: NGN {}",
        receipt.order.provider(),
        receipt.order.product(),
        receipt.order.recipient(),
        format_naira(receipt.order.amount())
    );
    println!("Reference: {}", receipt.fulfillment.provider_reference);
    if let Some(token) = &receipt.fulfillment.token {
        println!("Token:     {}", token);
    }
    print_receipt("Debited", &receipt.debit);
}

fn print_history_table(records: &[crate::domain::TransactionRecord]) {
    println!(
        "{:<17} {:<7} {:>14} {:>14} {:<10} REASON",
        "DATE", "TYPE", "AMOUNT", "BALANCE", "STATUS"
    );
    println!("{}", "-".repeat(90));
    for record in records {
        println!(
            "{:<17} {:<7} {:>14} {:>14} {:<10} {}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.direction,
            format_naira(record.amount),
            format_naira(record.balance_after),
            record.status,
            truncate(&record.reason, 30)
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Cannot create output file '{}'", path))?,
        ),
        None => Box::new(std::io::stdout()),
    })
}

fn new_key() -> String {
    Uuid::new_v4().to_string()
}

fn parse_account_id(input: &str) -> Result<AccountId> {
    Uuid::parse_str(input.trim()).with_context(|| format!("Invalid account ID '{}'", input))
}

fn parse_amount(input: &str) -> Result<i64> {
    parse_naira(input).with_context(|| {
        format!("Invalid amount '{}'. Use Naira, e.g. '500' or '1,250.50'", input)
    })
}

fn parse_network(input: &str) -> Result<Network> {
    Network::from_str(input).with_context(|| {
        format!("Invalid network '{}'. Use: mtn, glo, airtel, 9mobile", input)
    })
}
