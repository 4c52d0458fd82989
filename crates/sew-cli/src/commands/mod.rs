//! Command handler modules for sewctl.
//!
//! Shared setup (config, tracing, DB, journal) and row printers live here.
//! Marketplace subcommands live in [`market`].

pub mod market;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;

use sew_audit::{Journal, Topic, VerifyResult};
use sew_config::{report_unused_keys, MarketConfig, UnusedKeyPolicy};
use sew_db::{PgLedger, PgPool};
use sew_schemas::{FabricBid, FabricSubOrder, Order, Party, WorkshopRequest};
use sew_workflow::{Orchestrator, Outcome};

pub type Market = Orchestrator<PgLedger>;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-invocation state: merged config plus the journal, opened on first use.
pub struct Ctx {
    pub cfg: MarketConfig,
    journal: Option<Journal>,
}

impl Ctx {
    /// Load layered config (defaults when no paths are given) and start tracing.
    pub fn load(config_paths: &[String]) -> Result<Self> {
        let cfg = if config_paths.is_empty() {
            MarketConfig::default()
        } else {
            let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
            let loaded = sew_config::load_layered_yaml(&path_refs)?;

            let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
            if !report.is_clean() {
                eprintln!(
                    "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
                    report.unused_leaf_pointers.len()
                );
                for p in report.unused_leaf_pointers.iter().take(50) {
                    eprintln!("  unused={}", p);
                }
            }
            MarketConfig::from_loaded(&loaded)?
        };

        init_tracing(&cfg.log.filter);
        Ok(Self { cfg, journal: None })
    }

    pub async fn pool(&self) -> Result<PgPool> {
        let url = sew_config::resolve_database_url(&self.cfg.database.url_env)?;
        sew_db::connect(url.expose(), self.cfg.database.max_connections).await
    }

    pub async fn market(&self) -> Result<Market> {
        let pool = self.pool().await?;
        Ok(Orchestrator::new(PgLedger::new(pool)))
    }

    /// Append to the transition journal when it is enabled; no-op otherwise.
    pub fn record<T: Serialize>(
        &mut self,
        topic: Topic,
        event_type: &str,
        subject: impl fmt::Display,
        value: &T,
    ) -> Result<()> {
        if !self.cfg.journal.enabled {
            return Ok(());
        }
        if self.journal.is_none() {
            let j = Journal::open(&self.cfg.journal.path, self.cfg.journal.hash_chain)
                .with_context(|| format!("open journal {}", self.cfg.journal.path))?;
            self.journal = Some(j);
        }
        if let Some(j) = self.journal.as_mut() {
            j.record(topic, event_type, subject, value)?;
        }
        Ok(())
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so stdout
/// stays machine-readable.
fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// audit verify
// ---------------------------------------------------------------------------

pub fn audit_verify(path: &str) -> Result<()> {
    match sew_audit::verify_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("chain_valid=true lines={} path={}", lines, path);
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("chain_valid=false line={} path={}", line, path);
            anyhow::bail!("journal chain broken at line {}: {}", line, reason)
        }
    }
}

// ---------------------------------------------------------------------------
// Printers (key=value, one row per line for lists)
// ---------------------------------------------------------------------------

fn opt<T: fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(|x| x.to_string()).unwrap_or_default()
}

pub fn print_party(p: &Party) {
    println!("party_id={}", p.id.get());
    println!("role={}", p.role);
    println!("name={}", p.name);
    println!("email={}", p.email);
    println!("phone={}", opt(&p.phone));
    println!("address={}", opt(&p.address));
    println!("store_name={}", opt(&p.store_name));
    println!("notes={}", opt(&p.notes));
    println!("capacity={}", opt(&p.capacity));
    println!("created_at_utc={}", p.created_at_utc.to_rfc3339());
}

pub fn print_order(o: &Order) {
    println!("order_id={}", o.id.get());
    println!("client_id={}", o.client.get());
    println!("workshop_id={}", opt(&o.workshop.map(|w| w.get())));
    println!("status={}", o.status);
    println!("description={}", o.description);
    println!("product_id={}", opt(&o.product.map(|p| p.get())));
    println!("quantity={}", o.quantity);
    println!("price_cents={}", opt(&o.price_cents));
    println!("deadline_utc={}", o.deadline_utc.to_rfc3339());
    println!("address={}", o.address);
    println!("created_at_utc={}", o.created_at_utc.to_rfc3339());
}

pub fn print_request(r: &WorkshopRequest) {
    println!(
        "request_id={} order_id={} workshop_id={} status={} created_at_utc={}",
        r.id.get(),
        r.order.get(),
        r.workshop.get(),
        r.status,
        r.created_at_utc.to_rfc3339()
    );
}

pub fn print_sub_order(s: &FabricSubOrder) {
    println!(
        "sub_order_id={} workshop_id={} fabric_store_id={} quantity={} material={} status={} created_at_utc={}",
        s.id.get(),
        s.workshop.get(),
        opt(&s.fabric_store.map(|f| f.get())),
        s.quantity,
        s.material,
        s.status,
        s.created_at_utc.to_rfc3339()
    );
}

pub fn print_bid(b: &FabricBid) {
    println!(
        "bid_id={} sub_order_id={} fabric_store_id={} price_cents={} status={} created_at_utc={}",
        b.id.get(),
        b.sub_order.get(),
        b.fabric_store.get(),
        b.price_cents,
        b.status,
        b.created_at_utc.to_rfc3339()
    );
}

/// `applied=true` or `applied=false refusal=...`. Refusals are not failures.
pub fn print_outcome<T>(out: &Outcome<T>) {
    match out {
        Outcome::Applied(_) => println!("applied=true"),
        Outcome::Refused(r) => println!("applied=false refusal={}", r),
    }
}
