//! # SmsDash: Scheduled SMS Dispatch
//!
//! Schedules SMS messages, sends them when due, and drafts message text
//! with a generative model.
//!
//! Usage:
//!   smsdash serve                              # API + dispatch loop (default port 3000)
//!   smsdash dispatch --once                    # Send everything due now and exit
//!   smsdash add -m "Hi" --to 0701234567 --in-minutes 10
//!   smsdash list
//!   smsdash draft "reminder about Friday's meeting"

mod remote;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use remote::RemoteBook;
use smsdash_core::config::SmsDashConfig;
use smsdash_core::error::SmsDashError;
use smsdash_core::phone::PhoneNormalizer;
use smsdash_core::types::{MessageStatus, ScheduledMessage};
use smsdash_scheduler::{
    Dispatcher, NewSchedule, NotifyRouter, ScheduleBook, ScheduleStore, draft_message,
    spawn_dispatch_loop,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "smsdash",
    version,
    about = "📨 SmsDash: Scheduled SMS dispatch with AI-drafted messages"
)]
struct Cli {
    /// Config file (defaults to $SMSDASH_CONFIG or ~/.smsdash/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API and the dispatch loop
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
    },
    /// Run only the dispatch loop
    Dispatch {
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },
    /// Schedule a message
    Add {
        #[arg(short, long)]
        message: String,
        /// Recipient phone number (repeatable)
        #[arg(long = "to", required = true)]
        to: Vec<String>,
        /// Send time, RFC 3339 (e.g. 2026-01-31T09:00:00+03:00)
        #[arg(long, conflicts_with = "in_minutes")]
        at: Option<String>,
        /// Send this many minutes from now
        #[arg(long)]
        in_minutes: Option<i64>,
    },
    /// List scheduled messages
    List {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Cancel a pending message
    Cancel { id: String },
    /// Normalize phone numbers to international form
    Normalize { numbers: Vec<String> },
    /// Draft message text with the generative model
    Draft {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn open_book(config: &SmsDashConfig) -> smsdash_core::Result<ScheduleBook> {
    let store = ScheduleStore::open(&config.data_dir())?;
    ScheduleBook::open(store, PhoneNormalizer::from_config(&config.phone))
}

/// Where one-shot commands read and write schedules.
enum Schedules {
    Local(ScheduleBook),
    /// A running server owns the data directory.
    Remote(RemoteBook),
}

fn open_schedules(config: &SmsDashConfig) -> Result<Schedules> {
    match open_book(config) {
        Ok(book) => Ok(Schedules::Local(book)),
        Err(SmsDashError::Locked(dir)) => {
            let remote = RemoteBook::new(&config.gateway)?;
            tracing::info!("🔒 {dir} is held by a running server, using {}", remote.base());
            Ok(Schedules::Remote(remote))
        }
        Err(e) => Err(anyhow::Error::from(e)
            .context(format!("opening data dir {}", config.data_dir().display()))),
    }
}

fn print_schedules(messages: &[ScheduledMessage]) {
    if messages.is_empty() {
        println!("📭 No scheduled messages.");
        return;
    }
    for m in messages {
        println!(
            "{:<8} {}  {}  → {}",
            m.status.as_str(),
            m.scheduled_time.format("%Y-%m-%d %H:%M"),
            m.id,
            m.recipient_strings().join(", ")
        );
        println!("         {}", m.message);
        if let Some(err) = &m.last_error {
            println!("         ❌ {err}");
        }
    }
    let count = |status: MessageStatus| messages.iter().filter(|m| m.status == status).count();
    println!(
        "\n{} pending, {} sent, {} failed",
        count(MessageStatus::Pending),
        count(MessageStatus::Sent),
        count(MessageStatus::Failed)
    );
}

fn build_dispatcher(config: &SmsDashConfig) -> Result<Arc<Dispatcher>> {
    let book = open_book(config)?;
    Ok(Arc::new(Dispatcher::new(
        Arc::new(Mutex::new(book)),
        smsdash_providers::create_delivery_client(config),
        Arc::new(Mutex::new(NotifyRouter::new())),
    )))
}

fn parse_send_time(at: Option<&str>, in_minutes: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    if let Some(at) = at {
        let parsed = DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("invalid --at time '{at}'"))?;
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(in_minutes.map(|m| Utc::now() + chrono::Duration::minutes(m)))
}

async fn shutdown_signal(notify: Arc<Notify>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ Failed to listen for Ctrl+C: {e}");
        return;
    }
    tracing::info!("🛑 Shutdown requested");
    notify.notify_one();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "smsdash=debug,smsdash_core=debug,smsdash_providers=debug,smsdash_scheduler=debug,smsdash_gateway=debug,tower_http=debug"
    } else {
        "smsdash=info,smsdash_providers=info,smsdash_scheduler=info,smsdash_gateway=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = SmsDashConfig::resolve_path(cli.config.as_deref());
    let config = SmsDashConfig::load(cli.config.as_deref())?;
    let every = Duration::from_secs(config.scheduler.check_interval_secs.max(1));

    match cli.command {
        Command::Serve { port, host } => {
            let mut gateway = config.gateway.clone();
            if let Some(port) = port {
                gateway.port = port;
            }
            if let Some(host) = host {
                gateway.host = host;
            }

            let dispatcher = build_dispatcher(&config)?;
            let generator = smsdash_providers::create_generator(&config);

            println!("📨 SmsDash v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 API:        http://{}:{}/api/v1/schedules", gateway.host, gateway.port);
            println!("   📂 Data Dir:   {}", config.data_dir().display());
            println!("   ⏰ Interval:   {}s", every.as_secs());
            println!(
                "   🤖 AI Drafts:  {}",
                if generator.is_some() { "enabled" } else { "disabled" }
            );
            println!();

            let loop_stop = Arc::new(Notify::new());
            let loop_handle = spawn_dispatch_loop(dispatcher.clone(), every, loop_stop.clone());

            let state = Arc::new(smsdash_gateway::AppState::new(
                config.clone(),
                dispatcher,
                generator,
            ));
            let server_stop = Arc::new(Notify::new());
            let server_wait = server_stop.clone();
            tokio::spawn(shutdown_signal(server_stop));
            smsdash_gateway::start(state, &gateway, async move { server_wait.notified().await })
                .await?;

            loop_stop.notify_one();
            loop_handle.await.ok();
        }

        Command::Dispatch { once } => {
            let dispatcher = build_dispatcher(&config)?;
            if once {
                let report = dispatcher.tick(Utc::now()).await;
                println!("✅ {} sent, {} failed", report.sent(), report.failed());
                for p in &report.processed {
                    println!("   {} → {}", p.id, p.status);
                }
            } else {
                let stop = Arc::new(Notify::new());
                let handle = spawn_dispatch_loop(dispatcher, every, stop.clone());
                shutdown_signal(stop).await;
                handle.await.ok();
            }
        }

        Command::Add {
            message,
            to,
            at,
            in_minutes,
        } => {
            let scheduled_time = parse_send_time(at.as_deref(), in_minutes)?;
            let record = match open_schedules(&config)? {
                Schedules::Local(mut book) => book.create(NewSchedule {
                    message,
                    recipients: to,
                    scheduled_time,
                    ai_generated: false,
                })?,
                Schedules::Remote(remote) => remote.create(&message, &to, scheduled_time).await?,
            };
            println!("✅ Scheduled {}", record.id);
            println!("   To:   {}", record.recipient_strings().join(", "));
            println!("   At:   {}", record.scheduled_time.to_rfc3339());
        }

        Command::List { json } => {
            let messages = match open_schedules(&config)? {
                Schedules::Local(book) => book.list().to_vec(),
                Schedules::Remote(remote) => remote.list().await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_schedules(&messages);
            }
        }

        Command::Cancel { id } => {
            match open_schedules(&config)? {
                Schedules::Local(mut book) => {
                    book.cancel(&id)?;
                }
                Schedules::Remote(remote) => remote.cancel(&id).await?,
            }
            println!("🗑️  Cancelled {id}");
        }

        Command::Normalize { numbers } => {
            let normalizer = PhoneNormalizer::from_config(&config.phone);
            for n in &numbers {
                match normalizer.normalize(n) {
                    Ok(c) => println!("✅ {n} → {c}"),
                    Err(e) => println!("❌ {e}"),
                }
            }
        }

        Command::Draft { prompt } => {
            let generator = smsdash_providers::create_generator(&config);
            let draft = draft_message(
                generator.as_deref(),
                &prompt.join(" "),
                config.generation.fallback(),
            )
            .await?;
            if let Some(err) = &draft.error {
                println!("⚠️  Generation failed ({err}), using fallback text");
            }
            println!("{}", draft.text);
        }

        Command::Init { force } => {
            if config_path.exists() && !force {
                println!("⚠️  Config already exists: {}", config_path.display());
                println!("   Use --force to overwrite.");
                return Ok(());
            }
            SmsDashConfig::default().save_to(&config_path)?;
            println!("✅ Config written to {}", config_path.display());
        }
    }

    Ok(())
}
