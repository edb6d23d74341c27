//! zeny-crawler command-line entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::broadcast::error::RecvError;

use zeny_crawler::cooldown::format_remaining;
use zeny_crawler::{
    BrowserAutomation, ChromiumTransport, CrawlConfig, CrawlError, CrawlOutcome, CrawlSession,
    DisplayPreference, HttpTransport, JsonFileStore, PageScraper, ResultStore, ScraperAutomation,
};
use zeny_crawler_cli::config::{load_config, resolve_data_dir, store_path};
use zeny_crawler_cli::output;

#[derive(Parser)]
#[command(
    name = "zeny-crawler",
    about = "Collect and total per-character Zeny across every world of a rowebtool account",
    version
)]
struct Cli {
    /// Data directory (default: $ZENY_CRAWLER_HOME or ~/.zeny-crawler).
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Config file (default: <data-dir>/config.json if present).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every world starting from an open character page.
    Crawl {
        /// Character page URL to start from, fetched over plain HTTP.
        #[arg(long, conflicts_with = "devtools", required_unless_present = "devtools")]
        page_url: Option<String>,

        /// DevTools websocket URL of a running browser with a character page open.
        #[arg(long)]
        devtools: Option<String>,

        /// Cookie header sent with every request in HTTP mode.
        #[arg(long)]
        cookie: Option<String>,
    },

    /// Show the last stored result.
    Show {
        /// Display mode for this invocation only (full, short).
        #[arg(long)]
        mode: Option<DisplayPreference>,
    },

    /// Show whether a crawl is currently allowed.
    Status,

    /// Follow the cooldown countdown until the next crawl is allowed.
    Watch,

    /// Set the stored display mode (full, short).
    Mode { mode: DisplayPreference },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   zeny-crawler completions bash > ~/.local/share/bash-completion/completions/zeny-crawler
    ///   zeny-crawler completions zsh > ~/.zfunc/_zeny-crawler
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn open_session(config: CrawlConfig, data_dir: &std::path::Path) -> anyhow::Result<CrawlSession> {
    let path = store_path(data_dir);
    let store = JsonFileStore::open(&path)
        .with_context(|| format!("failed to open store {}", path.display()))?;
    let session = CrawlSession::new(config, ResultStore::new(Arc::new(store)))?;
    session.start()?;
    Ok(session)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref());

    match cli.command {
        Commands::Crawl {
            page_url,
            devtools,
            cookie,
        } => {
            let mut config = load_config(cli.config.as_deref(), &data_dir)?;
            if cookie.is_some() {
                config.session_cookie = cookie;
            }
            let session = open_session(config.clone(), &data_dir)?;
            let scraper = PageScraper::new(config.clone())?;

            let automation: Box<dyn BrowserAutomation> = match (page_url, devtools) {
                (_, Some(ws_url)) => {
                    let transport = ChromiumTransport::connect(&ws_url, &config.page_pattern()?)
                        .await
                        .with_context(|| format!("failed to attach to {ws_url}"))?;
                    Box::new(ScraperAutomation::new(scraper, transport))
                }
                (Some(url), None) => {
                    let transport = HttpTransport::new(&config, url)?;
                    Box::new(ScraperAutomation::new(scraper, transport))
                }
                (None, None) => anyhow::bail!("either --page-url or --devtools is required"),
            };

            let mut progress = session.subscribe_progress();
            let crawl = session.crawl(automation.as_ref());
            tokio::pin!(crawl);

            let outcome = loop {
                tokio::select! {
                    res = &mut crawl => break res,
                    event = progress.recv() => match event {
                        Ok(event) => eprintln!("{}", output::progress_line(&event, cli.json)),
                        Err(RecvError::Lagged(n)) => tracing::warn!("dropped {n} progress events"),
                        Err(RecvError::Closed) => {}
                    },
                }
            };
            while let Ok(event) = progress.try_recv() {
                eprintln!("{}", output::progress_line(&event, cli.json));
            }

            match outcome {
                Ok(CrawlOutcome::Completed(_)) => {
                    let rendering = session.render();
                    if cli.json {
                        print_json(&output::rendering_json(&rendering, session.last_run_ms()))?;
                    } else {
                        print!("{}", output::rendering_text(&rendering, session.last_run_ms()));
                    }
                }
                Ok(CrawlOutcome::NoWorlds) => {
                    anyhow::bail!("no worlds found on the open page");
                }
                Err(CrawlError::CoolingDown { remaining_ms }) => {
                    anyhow::bail!("next run allowed in {}", format_remaining(remaining_ms));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Show { mode } => {
            let config = load_config(cli.config.as_deref(), &data_dir)?;
            let session = open_session(config, &data_dir)?;
            let rendering = match mode {
                Some(mode) => zeny_crawler::render(&session.last_result(), mode),
                None => session.render(),
            };
            if cli.json {
                print_json(&output::rendering_json(&rendering, session.last_run_ms()))?;
            } else {
                print!("{}", output::rendering_text(&rendering, session.last_run_ms()));
            }
        }

        Commands::Status => {
            let config = load_config(cli.config.as_deref(), &data_dir)?;
            let session = open_session(config, &data_dir)?;
            let status = session.cooldown_status();
            if cli.json {
                print_json(&output::status_json(status, session.last_run_ms()))?;
            } else {
                print!("{}", output::status_text(status, session.last_run_ms()));
            }
        }

        Commands::Watch => {
            let config = load_config(cli.config.as_deref(), &data_dir)?;
            let session = open_session(config, &data_dir)?;
            let mut rx = session.subscribe_cooldown();

            loop {
                let status = *rx.borrow_and_update();
                if cli.json {
                    println!(
                        "{}",
                        output::status_json(status, session.last_run_ms())
                    );
                } else {
                    println!("{}", status.status_message());
                }
                if status.is_ready() {
                    break;
                }
                tokio::select! {
                    changed = rx.changed() => if changed.is_err() { break },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.stop();
        }

        Commands::Mode { mode } => {
            let config = load_config(cli.config.as_deref(), &data_dir)?;
            let session = open_session(config, &data_dir)?;
            session.set_display_preference(mode)?;
            if cli.json {
                print_json(&serde_json::json!({ "display_preference": mode }))?;
            } else {
                println!("Display mode set to {mode}");
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "zeny-crawler", &mut std::io::stdout());
        }
    }

    Ok(())
}
