use clap::{Args, Parser, Subcommand, builder::styling};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use sheet_scraper::{
    cli::{self, ScrapeRequest, Settings},
    mapping::FieldMapping,
    sink::HeaderPolicy,
};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Sheet Scraper: pull records off a rendered web page and append them to a Google Sheet
#[derive(Parser)]
#[command(name = "sheetscrape", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings and credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScrapeArgs {
    /// Page to scrape
    url: String,

    /// YAML or JSON5 field mapping. Without one, headlines are scraped.
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Print the rows as TSV instead of sending them to the sheet
    #[arg(long)]
    dry_run: bool,

    /// Fail when the sheet's header differs from the record fields
    #[arg(long)]
    strict_header: bool,

    /// Treat an aborted scan as an error instead of sending what was gathered
    #[arg(long)]
    no_partial: bool,
}

impl ScrapeArgs {
    fn into_request(self) -> Result<ScrapeRequest> {
        let url = Url::parse(&self.url).with_context(|| format!("Invalid URL: {}", self.url))?;
        let mapping = self
            .mapping
            .as_deref()
            .map(FieldMapping::read)
            .transpose()?;

        Ok(ScrapeRequest {
            url,
            mapping,
            header_policy: match self.strict_header {
                true => HeaderPolicy::Strict,
                false => HeaderPolicy::Align,
            },
            send_partial: !self.no_partial,
            dry_run: self.dry_run,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a page once and append the records to the sheet
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
    },

    /// Scrape a page on a fixed interval until stopped
    Schedule {
        #[command(flatten)]
        scrape: ScrapeArgs,

        /// Seconds between runs
        #[arg(long, default_value_t = 3600)]
        every: u64,

        /// Wait one full interval before the first run
        #[arg(long)]
        delay_first: bool,
    },

    /// Test authorization to the configured spreadsheet
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing dotenv file is fine; settings can come from the environment
    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenv {
        Ok(path) => log::debug!("Loaded settings from {}", path.display()),
        Err(e) if e.not_found() => log::debug!("No dotenv file at {}", cli.env),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", cli.env)),
    }

    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Run { scrape } => {
            let request = scrape.into_request()?;
            log::info!(
                "Scraping {} in {} mode",
                request.url.as_str().bright_black(),
                match request.mapping {
                    Some(_) => "structured",
                    None => "simple",
                }
                .cyan()
            );
            match cli::run_scraping(&settings, &request).await {
                Ok(count) => log::info!("✓ Done, {} row(s) written", count.green()),
                Err(e) => {
                    log::error!("{:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Schedule {
            scrape,
            every,
            delay_first,
        } => {
            if every == 0 {
                eyre::bail!("--every must be at least 1 second");
            }
            let request = scrape.into_request()?;
            log::info!(
                "Scraping {} every {}s",
                request.url.as_str().bright_black(),
                every.cyan()
            );
            cli::scheduled_scraping(settings, request, Duration::from_secs(every), !delay_first)
                .await;
        }
        Commands::Auth => {
            log::info!("Testing authorization");
            match cli::test_sheet_access(&settings).await {
                Ok(title) => log::info!(
                    "✓ Spreadsheet {} reachable, worksheet {}",
                    title.green(),
                    settings.worksheet.cyan()
                ),
                Err(e) => {
                    log::error!("{:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
