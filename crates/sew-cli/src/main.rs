use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use sew_schemas::{MaterialKind, OrderStatus, PartyRole, ProposalStatus};

mod commands;

use commands::Ctx;

#[derive(Parser)]
#[command(name = "sewctl")]
#[command(about = "Sewing marketplace operator CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> env -> local)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Clients, workshops and fabric stores
    Party {
        #[command(subcommand)]
        cmd: PartyCmd,
    },

    /// Client orders and workshop assignment
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },

    /// Workshop requests for orders
    Request {
        #[command(subcommand)]
        cmd: RequestCmd,
    },

    /// Fabric sub-orders raised by workshops
    SubOrder {
        #[command(subcommand)]
        cmd: SubOrderCmd,
    },

    /// Fabric store bids on sub-orders
    Bid {
        #[command(subcommand)]
        cmd: BidCmd,
    },

    /// Transition journal utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
pub(crate) enum PartyCmd {
    Register {
        #[arg(long)]
        role: PartyRole,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Fabric stores only
        #[arg(long)]
        store_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Workshops only
        #[arg(long)]
        capacity: Option<i32>,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        role: Option<PartyRole>,
    },
    /// `--clear-*` empties an optional field.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, conflicts_with = "clear_phone")]
        phone: Option<String>,
        #[arg(long, conflicts_with = "clear_address")]
        address: Option<String>,
        #[arg(long, conflicts_with = "clear_store_name")]
        store_name: Option<String>,
        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,
        #[arg(long, conflicts_with = "clear_capacity")]
        capacity: Option<i32>,
        #[arg(long, default_value_t = false)]
        clear_phone: bool,
        #[arg(long, default_value_t = false)]
        clear_address: bool,
        #[arg(long, default_value_t = false)]
        clear_store_name: bool,
        #[arg(long, default_value_t = false)]
        clear_notes: bool,
        #[arg(long, default_value_t = false)]
        clear_capacity: bool,
    },
    Remove {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum OrderCmd {
    Create {
        #[arg(long)]
        client: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        quantity: i32,
        /// RFC 3339, e.g. 2026-12-01T00:00:00Z
        #[arg(long)]
        deadline: DateTime<Utc>,
        #[arg(long)]
        address: String,
        #[arg(long)]
        product: Option<i64>,
        #[arg(long)]
        price_cents: Option<i64>,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        client: Option<i64>,
        #[arg(long)]
        workshop: Option<i64>,
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Direct edit. The workshop/status pairing is still enforced.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        quantity: Option<i32>,
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, conflicts_with = "clear_price")]
        price_cents: Option<i64>,
        #[arg(long, default_value_t = false)]
        clear_price: bool,
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long, conflicts_with = "clear_workshop")]
        workshop: Option<i64>,
        #[arg(long, default_value_t = false)]
        clear_workshop: bool,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Give the order to the earliest pending workshop request.
    Assign {
        #[arg(long)]
        id: i64,
    },
    /// The assigned workshop declined: drop all requests, reopen the order.
    Reset {
        #[arg(long)]
        id: i64,
    },
    Complete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum RequestCmd {
    Create {
        #[arg(long)]
        workshop: i64,
        #[arg(long)]
        order: i64,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        order: Option<i64>,
        #[arg(long)]
        workshop: Option<i64>,
        #[arg(long)]
        status: Option<ProposalStatus>,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum SubOrderCmd {
    Create {
        #[arg(long)]
        workshop: i64,
        #[arg(long)]
        quantity: i32,
        #[arg(long, default_value = "custom")]
        material: MaterialKind,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        workshop: Option<i64>,
        #[arg(long)]
        fabric_store: Option<i64>,
        #[arg(long)]
        status: Option<ProposalStatus>,
    },
    /// Edit while still pending.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        quantity: Option<i32>,
        #[arg(long)]
        material: Option<MaterialKind>,
    },
    AssignStore {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        fabric_store: i64,
    },
    Reject {
        #[arg(long)]
        id: i64,
    },
    /// Deletes the sub-order and its bids.
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub(crate) enum BidCmd {
    Create {
        #[arg(long)]
        sub_order: i64,
        #[arg(long)]
        fabric_store: i64,
        #[arg(long)]
        price_cents: i64,
    },
    Show {
        #[arg(long)]
        id: i64,
    },
    List {
        #[arg(long)]
        sub_order: Option<i64>,
        #[arg(long)]
        fabric_store: Option<i64>,
        #[arg(long)]
        status: Option<ProposalStatus>,
    },
    /// Change the price of a pending bid.
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        price_cents: i64,
    },
    Accept {
        #[arg(long)]
        id: i64,
    },
    Reject {
        #[arg(long)]
        id: i64,
    },
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of a journal file.
    Verify {
        /// Defaults to journal.path from config
        #[arg(long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev-time bootstrap; a missing file is fine
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = sew_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => {
            let ctx = Ctx::load(&cli.config_paths)?;
            match cmd {
                AuditCmd::Verify { path } => {
                    let path = path.unwrap_or_else(|| ctx.cfg.journal.path.clone());
                    commands::audit_verify(&path)?;
                }
            }
        }

        Commands::Db { cmd } => {
            let ctx = Ctx::load(&cli.config_paths)?;
            let pool = ctx.pool().await?;
            match cmd {
                DbCmd::Status => {
                    let s = sew_db::status(&pool).await?;
                    println!("db_ok={} has_orders_table={}", s.ok, s.has_orders_table);
                }
                DbCmd::Migrate => {
                    sew_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Party { cmd } => {
            let mut ctx = Ctx::load(&cli.config_paths)?;
            let m = ctx.market().await?;
            commands::market::party(&m, &mut ctx, cmd).await?;
        }

        Commands::Order { cmd } => {
            let mut ctx = Ctx::load(&cli.config_paths)?;
            let m = ctx.market().await?;
            commands::market::order(&m, &mut ctx, cmd).await?;
        }

        Commands::Request { cmd } => {
            let mut ctx = Ctx::load(&cli.config_paths)?;
            let m = ctx.market().await?;
            commands::market::request(&m, &mut ctx, cmd).await?;
        }

        Commands::SubOrder { cmd } => {
            let mut ctx = Ctx::load(&cli.config_paths)?;
            let m = ctx.market().await?;
            commands::market::sub_order(&m, &mut ctx, cmd).await?;
        }

        Commands::Bid { cmd } => {
            let mut ctx = Ctx::load(&cli.config_paths)?;
            let m = ctx.market().await?;
            commands::market::bid(&m, &mut ctx, cmd).await?;
        }
    }

    Ok(())
}
