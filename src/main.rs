use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};
use tui::{Terminal, backend::CrosstermBackend};

use invoice_tracker::config::Config;
use invoice_tracker::db::{Database, InvoiceStore, MemoryStore};
use invoice_tracker::export::{self, ExportFormat};
use invoice_tracker::filter::InvoiceFilter;
use invoice_tracker::migrate;
use invoice_tracker::scan::{self, CompletionApi, HttpGateway, ProxyState, ScanClient};
use invoice_tracker::ui::{AppState, run_app};

#[derive(Parser)]
#[command(name = "invoice-tracker", version, about = "Track, scan and export invoices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive invoice list (default)
    Tui {
        /// Keep invoices in memory instead of Postgres
        #[arg(long)]
        memory: bool,
    },
    /// Run the invoice extraction proxy
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import a JSON dump of invoices
    Migrate {
        file: PathBuf,
    },
    /// Delete every invoice
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Export invoices without opening the UI
    Export {
        #[arg(value_enum)]
        format: ExportFormat,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        sales_person: Option<String>,
        #[arg(long)]
        client: Option<String>,
        /// Inclusive start date, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// Inclusive end date, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// Output directory, defaults to EXPORT_DIR
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Tui { memory: false }) {
        Command::Tui { memory } => {
            init_file_logging(&config)?;
            run_tui(&config, memory).await
        }
        Command::Serve { host, port } => {
            init_stderr_logging();
            serve(&config, host, port).await
        }
        Command::Migrate { file } => {
            init_stderr_logging();
            let records = migrate::read_dump(&file)?;
            let db = Database::connect(config.database_url()?).await?;
            let report = migrate::migrate(&db, records, Utc::now()).await?;
            println!(
                "Migrated {} of {} invoices ({} skipped, {} dates defaulted)",
                report.inserted, report.total, report.skipped, report.defaulted_dates
            );
            Ok(())
        }
        Command::Reset { yes } => {
            init_stderr_logging();
            if !yes {
                bail!("refusing to delete every invoice without --yes");
            }
            let db = Database::connect(config.database_url()?).await?;
            let deleted = migrate::reset(&db).await?;
            println!("Deleted {} invoices", deleted);
            Ok(())
        }
        Command::Export {
            format,
            search,
            year,
            sales_person,
            client,
            from,
            to,
            out,
        } => {
            init_stderr_logging();
            let filter = InvoiceFilter {
                search: search.unwrap_or_default(),
                year,
                sales_person,
                client,
                date_from: from,
                date_to: to,
            };
            let db = Database::connect(config.database_url()?).await?;
            let invoices = db.fetch_all().await?;
            let selected = filter.apply(&invoices);
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            let path = export::export(format, &selected, &dir, Local::now().date_naive())?;
            println!("Exported {} invoices to {}", selected.len(), path.display());
            Ok(())
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_writer(io::stderr)
        .init();
}

// The alternate screen owns stdout while the UI runs
fn init_file_logging(config: &Config) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("could not open log file {}", config.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

async fn run_tui(config: &Config, memory: bool) -> Result<()> {
    let store: Arc<dyn InvoiceStore> = if memory {
        println!("Using in-memory invoice store");
        Arc::new(MemoryStore::new())
    } else {
        println!("Connecting to database...");
        Arc::new(Database::connect(config.database_url()?).await?)
    };

    let scanner = ScanClient::new(config.scan_service_url.clone());
    let mut app_state = AppState::load(store, scanner, config.export_dir.clone()).await?;

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the main app loop
    let result = run_app(&mut terminal, &mut app_state).await;

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Show any error message
    if let Err(err) = result {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn serve(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let gateway = config
        .ai_api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .map(|key| Arc::new(HttpGateway::new(config.ai_gateway_url.clone(), key)) as Arc<dyn CompletionApi>);
    if gateway.is_none() {
        warn!("AI_API_KEY is not set; scan requests will be rejected");
    }

    let state = ProxyState::new(gateway, config.ai_model.clone());
    let app = scan::router(state);

    let mut config = config.clone();
    if let Some(host) = host {
        config.server_host = host;
    }
    if let Some(port) = port {
        config.server_port = port;
    }
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    info!("scan service listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
