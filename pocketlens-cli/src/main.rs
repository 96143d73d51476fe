use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pocketlens_store::{
    Dashboard, DEFAULT_CLIENT_TTL, RestBackend, SharedHandle, import_budgets, import_transactions,
    load_chat_context, load_dashboard,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod llm;
mod state;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "pocketlens",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("POCKETLENS_BUILD_SHA"), ")"),
    about = "Import bank statements and budgets, then ask questions about your money"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in, register or log out
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Upload a CSV export into your account
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },

    /// Recent transactions, income/expense totals and budgets
    Dashboard,

    /// Ask the finance coach a question about your data
    Ask {
        question: String,

        /// How many days of transactions to include
        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Manage ~/.pocketlens/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    Register {
        #[arg(long)]
        email: Option<String>,
    },
    Logout,
}

#[derive(Subcommand, Debug)]
enum ImportCommand {
    /// Bank statement: date, amount, type, description, category columns
    Transactions {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Budgets: category, amount, month columns
    Budgets {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
}

static BACKEND: OnceLock<SharedHandle<RestBackend>> = OnceLock::new();

fn backend(cfg: &Config) -> Result<RestBackend> {
    let rest = cfg.rest_config()?;
    let handle = BACKEND.get_or_init(move || SharedHandle::new(DEFAULT_CLIENT_TTL, move || RestBackend::new(rest.clone())));
    Ok(handle.get())
}

fn read_upload(path: &Path, max_bytes: u64) -> Result<String> {
    let meta = fs::metadata(path).with_context(|| format!("CSV not found: {}", path.display()))?;
    if meta.len() > max_bytes {
        bail!(
            "{} is {} bytes; uploads are limited to {} bytes",
            path.display(),
            meta.len(),
            max_bytes
        );
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    // bank exports are not always UTF-8; undecodable bytes become U+FFFD
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_dashboard(dash: &Dashboard) {
    println!("# Recent transactions\n");
    if dash.recent.is_empty() {
        println!("(none yet; run: pocketlens import transactions --csv <file>)");
    }
    for t in &dash.recent {
        println!(
            "{} | {:<7} | ₹{:>12.2} | {:<16} | {}",
            t.date,
            t.kind,
            t.amount,
            t.category_name().unwrap_or("-"),
            t.description.as_deref().unwrap_or("")
        );
    }

    println!("\nIncome:  ₹{:.2}", dash.income);
    println!("Expense: ₹{:.2}", dash.expense);
    println!("Net:     ₹{:.2}", dash.income - dash.expense);

    println!("\n# Budgets\n");
    if dash.budgets.is_empty() {
        println!("(none yet; run: pocketlens import budgets --csv <file>)");
    }
    for b in &dash.budgets {
        println!(
            "{} | {:<16} | ₹{:>12.2}",
            b.month,
            b.category_name().unwrap_or("-"),
            b.amount
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    if let Command::Config {
        command: ConfigCommand::Init,
    } = cli.command
    {
        return config::init_config();
    }

    let cfg = config::load_config()?;
    debug!(model = %cfg.llm.model, backend = %cfg.backend.url, "loaded config");

    match cli.command {
        Command::Config { .. } => {}

        Command::Auth { command } => match command {
            AuthCommand::Login { email } => auth::login(&backend(&cfg)?, email).await?,
            AuthCommand::Register { email } => auth::register(&backend(&cfg)?, email).await?,
            AuthCommand::Logout => auth::logout()?,
        },

        Command::Import { command } => {
            let backend = backend(&cfg)?;
            let (csv_path, is_budget) = match command {
                ImportCommand::Transactions { csv } => (csv, false),
                ImportCommand::Budgets { csv } => (csv, true),
            };
            let text = read_upload(&csv_path, cfg.upload.max_bytes)?;
            let (session, client) = auth::session_client(&backend).await?;

            let report = if is_budget {
                import_budgets(&client, &session.user.id, &text).await
            } else {
                import_transactions(&client, &session.user.id, &text).await
            }
            .with_context(|| format!("import {}", csv_path.display()))?;

            let what = if is_budget { "budgets" } else { "transactions" };
            println!(
                "Imported {} {what} from {} ({} new categories)",
                report.inserted,
                csv_path.display(),
                report.categories_created
            );
        }

        Command::Dashboard => {
            let backend = backend(&cfg)?;
            let (_, client) = auth::session_client(&backend).await?;
            let dash = load_dashboard(&client).await.context("load dashboard")?;
            print_dashboard(&dash);
        }

        Command::Ask { question, days } => {
            if question.trim().is_empty() {
                bail!("question is empty");
            }
            let backend = backend(&cfg)?;
            let (_, client) = auth::session_client(&backend).await?;
            let today = chrono::Local::now().date_naive();
            let ctx = load_chat_context(&client, days, today)
                .await
                .context("load chat context")?;
            debug!(
                total = ctx.total_transactions,
                in_timeframe = ctx.transactions.len(),
                budgets = ctx.budgets.len(),
                "chat context"
            );

            match llm::ask(&cfg.llm, &ctx.prompt(&question)).await {
                Ok(reply) => println!("{reply}"),
                Err(e) => {
                    warn!(error = %e, "language model call failed");
                    println!("Sorry, no answer this time: {e:#}");
                }
            }
        }
    }

    Ok(())
}
