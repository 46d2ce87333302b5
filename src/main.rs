use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use finn_price_monitor::archiver::PriceHistory;
use finn_price_monitor::config::{self, MailConfig, Settings};
use finn_price_monitor::fetcher::HttpFetcher;
use finn_price_monitor::monitor;
use finn_price_monitor::notifier::{EmailNotifier, SmtpMailer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const BANNER: &str = concat!("Finn.no Price Monitor v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScheduleMode {
    Once,
    Loop,
}

#[derive(Parser)]
#[command(version, about = "Finn.no Price Monitor")]
struct Cli {
    /// Execute a check (without this flag nothing is fetched)
    #[arg(long)]
    run: bool,

    /// Single pass or repeat forever
    #[arg(long, value_enum, env = "SCHEDULE_MODE", default_value = "once")]
    schedule_mode: ScheduleMode,

    /// Hours between cycles in loop mode
    #[arg(long, env = "CHECK_INTERVAL_HOURS", default_value_t = 4.0)]
    check_interval_hours: f64,

    /// Directory holding urls.txt, price_history.json and config.env
    #[arg(long, env = "DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Debug logging and HTML dumps of every fetched page
    #[arg(
        short,
        long,
        env = "DEBUG",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.run {
        println!("{BANNER}");
        return Ok(());
    }

    let interval = match cli.schedule_mode {
        ScheduleMode::Loop => Some(config::check_interval(cli.check_interval_hours)?),
        ScheduleMode::Once => None,
    };

    let settings = Settings::new(cli.data_dir, cli.verbose);
    std::fs::create_dir_all(&settings.data_dir)?;

    let mail_config = MailConfig::load(settings.config_file().as_deref())?;
    let fetcher = HttpFetcher::new(settings.http_timeout, settings.dump_dir())?;
    let notifier = EmailNotifier::new(mail_config, SmtpMailer);
    let mut history = PriceHistory::load(settings.history_file());
    let urls_file = settings.urls_file();

    let Some(interval) = interval else {
        run_cycle(&urls_file, &fetcher, &mut history, &notifier);
        return Ok(());
    };

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    loop {
        info!("--- Starting check ---");
        run_cycle(&urls_file, &fetcher, &mut history, &notifier);

        info!("Next check in {:.1} hours", cli.check_interval_hours);
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("Shutting down...");
                return Ok(());
            }
        }
    }
}

fn run_cycle(
    urls_file: &Path,
    fetcher: &HttpFetcher,
    history: &mut PriceHistory,
    notifier: &EmailNotifier<SmtpMailer>,
) {
    if let Err(e) = monitor::run_check(urls_file, fetcher, history, notifier) {
        error!(error = %e, "check cycle failed");
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "info,finn_price_monitor=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
