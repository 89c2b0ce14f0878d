//! CLI binary for fda-label-harvest.
//!
//! With a subcommand it runs one crawl and exits. Without one it enters an
//! interactive prompt loop that asks for mode, category, range and delay,
//! runs the batch, then asks whether to continue.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fda_label_harvest::{
    run_crawl, ApiCredential, AttemptError, CrawlPlan, CrawlProgressCallback, CrawlSummary,
    HarvestConfig, Harvester, LabelKind, LicenseCategory, LicenseCode, RotationMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over codes with one log line per attempt outcome.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>6}/{len} codes  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Harvesting");
        Self { bar }
    }
}

impl CrawlProgressCallback for CliProgressCallback {
    fn on_crawl_start(&self, total_codes: usize) {
        self.bar.reset();
        self.bar.set_length(total_codes as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Harvesting {total_codes} code(s)…"))
        ));
    }

    fn on_attempt_start(&self, code: &str, category: &str) {
        self.bar.set_message(format!("{category}第{code}號"));
    }

    fn on_artifact_saved(&self, code: &str, category: &str, filename: &str) {
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            code,
            dim(category),
            filename
        ));
    }

    fn on_attempt_failed(&self, code: &str, category: &str, error: &AttemptError) {
        if error.is_not_found() {
            return;
        }
        let msg = error.to_string();
        let msg = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar
            .println(format!("  {} {}  {}  {}", red("✗"), code, dim(category), red(&msg)));
    }

    fn on_code_complete(&self, _code: &str, _saved: bool) {
        self.bar.inc(1);
    }

    fn on_crawl_complete(&self, summary: &CrawlSummary) {
        self.bar.finish_and_clear();
        print_summary(summary);
    }
}

fn print_summary(summary: &CrawlSummary) {
    eprintln!(
        "{} {} saved  {}  {}  {}",
        if summary.failed == 0 { green("✔") } else { cyan("⚠") },
        bold(&summary.saved.to_string()),
        dim(&format!("{} cancelled", summary.cancelled)),
        dim(&format!("{} not found", summary.not_found)),
        if summary.failed == 0 {
            dim("0 failed")
        } else {
            red(&format!("{} failed", summary.failed))
        },
    );
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive prompt loop
  label-harvest

  # Codes 000001..000100, trying the default category chain, 1.5 s apart
  label-harvest range 1 100 --delay 1.5

  # Same range, one category only (number from the list below or its label)
  label-harvest range 1 100 --category 2

  # One licence
  label-harvest single 012345 --category 衛部藥製

  # Electronic labels instead of PDF inserts
  label-harvest --kind electronic range 1 100

CATEGORIES:
   1 衛署藥製    2 衛部藥製    3 衛署藥輸    4 衛部藥輸    5 衛署成製
   6 衛部成製    7 衛署菌疫製  8 衛部菌疫製  9 衛署菌疫輸 10 衛部菌疫輸
  11 衛署成輸   12 衛部成輸   13 衛署罕藥輸 14 衛部罕藥輸 15 衛署罕藥製
  16 衛部罕藥製 17 衛署罕菌疫製 18 衛部罕菌疫製 19 衛部罕菌疫輸
  20 衛署罕菌疫輸 21 衛署藥陸輸 22 衛部藥陸輸 23 內衛藥製 24 內衛藥輸
  25 內衛成製   26 內衛菌疫製 27 內衛菌疫輸

ENVIRONMENT VARIABLES:
  LLAMA_CLOUD_API_KEYS      Comma-separated parsing-service keys (PDF labels)
  LABEL_HARVEST_PIN_KEY     Use only the key at this index
  LABEL_HARVEST_OUTPUT_DIR  Archive root
  LABEL_HARVEST_KIND        pdf | electronic
  PDFIUM_LIB_PATH           Path to an existing libpdfium
  RUST_LOG                  Override the log filter
"#;

/// Collect Taiwan FDA drug labels into a Markdown archive.
#[derive(Parser, Debug)]
#[command(
    name = "label-harvest",
    version,
    about = "Collect Taiwan FDA drug labels by licence code into a Markdown archive",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Archive root directory.
    #[arg(short, long, env = "LABEL_HARVEST_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Registry origin.
    #[arg(long, env = "LABEL_HARVEST_BASE_URL", default_value = "https://mcp.fda.gov.tw")]
    base_url: String,

    /// Parsing-service API keys, comma-separated.
    #[arg(long, env = "LLAMA_CLOUD_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    api_keys: Vec<String>,

    /// Pin one key from the pool instead of rotating.
    #[arg(long, env = "LABEL_HARVEST_PIN_KEY")]
    pin_key: Option<usize>,

    /// Which label rendition to collect.
    #[arg(long, env = "LABEL_HARVEST_KIND", value_enum, default_value = "pdf")]
    kind: KindArg,

    /// Parse attempts per rendition.
    #[arg(long, env = "LABEL_HARVEST_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Prepend the licence metadata block to PDF-label archives.
    #[arg(long, env = "LABEL_HARVEST_METADATA")]
    metadata: bool,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "LABEL_HARVEST_NO_PROGRESS")]
    no_progress: bool,

    /// Print the crawl summary as JSON on stdout.
    #[arg(long, env = "LABEL_HARVEST_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LABEL_HARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LABEL_HARVEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl an inclusive range of codes.
    Range {
        start: u32,
        end: u32,
        /// Single category (1–27 or label); omit to try the default chain.
        #[arg(long, value_parser = parse_category)]
        category: Option<LicenseCategory>,
        /// Seconds to wait after every attempt.
        #[arg(long, default_value_t = 0.0)]
        delay: f64,
    },
    /// Harvest one licence.
    Single {
        /// Six-digit licence code, e.g. 012345.
        code: String,
        #[arg(long, value_parser = parse_category)]
        category: LicenseCategory,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Pdf,
    Electronic,
}

impl From<KindArg> for LabelKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Pdf => LabelKind::Pdf,
            KindArg::Electronic => LabelKind::Electronic,
        }
    }
}

fn parse_category(s: &str) -> Result<LicenseCategory, String> {
    s.parse::<LicenseCategory>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries per-attempt feedback, so library INFO logs
    // are held back while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let mut harvester = Harvester::from_config(config).context("Failed to start harvester")?;
    let bar = show_progress.then(CliProgressCallback::new);
    let progress = bar.as_ref().map(|p| p as &dyn CrawlProgressCallback);

    match &cli.command {
        Some(Command::Range {
            start,
            end,
            category,
            delay,
        }) => {
            let plan = range_plan(harvester.config(), *start, *end, *category, *delay)?;
            let summary = run_crawl(&mut harvester, &plan, progress).await?;
            report(&summary, progress.is_some(), &cli)?;
        }
        Some(Command::Single { code, category }) => {
            let code: LicenseCode = code.trim().parse()?;
            let plan = CrawlPlan::single(code, *category, harvester.config().request_delay());
            let summary = run_crawl(&mut harvester, &plan, progress).await?;
            report(&summary, progress.is_some(), &cli)?;
        }
        None => repl(&mut harvester, progress).await?,
    }

    Ok(())
}

/// Summary output for one-shot subcommands.
fn report(summary: &CrawlSummary, bar_printed: bool, cli: &Cli) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !bar_printed && !cli.quiet {
        print_summary(summary);
    }
    Ok(())
}

/// Map CLI args to `HarvestConfig`.
fn build_config(cli: &Cli) -> Result<HarvestConfig> {
    let keys: Vec<ApiCredential> = cli
        .api_keys
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(ApiCredential::new)
        .collect();

    let mut builder = HarvestConfig::builder()
        .base_url(cli.base_url.clone())
        .output_dir(cli.output_dir.clone())
        .label_kind(cli.kind.into())
        .max_retries(cli.max_retries)
        .include_metadata(cli.metadata)
        .credentials(keys);

    if let Some(index) = cli.pin_key {
        builder = builder.rotation(RotationMode::Pinned(index));
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}

fn range_plan(
    config: &HarvestConfig,
    start: u32,
    end: u32,
    category: Option<LicenseCategory>,
    delay_secs: f64,
) -> Result<CrawlPlan> {
    if !delay_secs.is_finite() || delay_secs < 0.0 {
        bail!("Delay must be a non-negative number of seconds (got {delay_secs})");
    }
    let categories = match category {
        Some(c) => vec![c],
        None => config.fallback_categories.clone(),
    };
    Ok(CrawlPlan::new(
        start,
        end,
        categories,
        Duration::from_secs_f64(delay_secs),
    )?)
}

// ── Interactive prompt loop ──────────────────────────────────────────────────

/// Outcome of reading one line from the operator.
enum Input {
    Line(String),
    Quit,
}

fn read(editor: &mut DefaultEditor, prompt: &str) -> Result<Input> {
    match tokio::task::block_in_place(|| editor.readline(prompt)) {
        Ok(line) => {
            let line = line.trim().to_string();
            if !line.is_empty() {
                editor.add_history_entry(line.as_str()).ok();
            }
            Ok(Input::Line(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(Input::Quit),
        Err(e) => Err(e).context("Failed to read input"),
    }
}

/// Read a line or bail out of the loop on Ctrl-C / Ctrl-D.
macro_rules! ask {
    ($editor:expr, $prompt:expr) => {
        match read($editor, $prompt)? {
            Input::Line(line) => line,
            Input::Quit => return Ok(()),
        }
    };
}

async fn repl(harvester: &mut Harvester, progress: Option<&dyn CrawlProgressCallback>) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to initialise line editor")?;
    eprintln!("{}", bold("fda-label-harvest"));
    eprintln!("{}", dim("Ctrl-C or Ctrl-D to exit"));

    loop {
        let mode = ask!(&mut editor, "Mode (1 = range, 2 = single): ");
        let plan = match mode.as_str() {
            "1" => {
                let category = ask!(&mut editor, "Category (1-27, blank = default chain): ");
                let start = ask!(&mut editor, "Start code: ");
                let end = ask!(&mut editor, "End code: ");
                let delay = ask!(&mut editor, "Delay between requests (seconds): ");
                prompt_range_plan(harvester.config(), &category, &start, &end, &delay)
            }
            "2" => {
                let category = ask!(&mut editor, "Category (1-27): ");
                let code = ask!(&mut editor, "Licence code (6 digits): ");
                prompt_single_plan(harvester.config(), &category, &code)
            }
            other => {
                eprintln!("{} unknown mode '{}'", red("✗"), other);
                continue;
            }
        };

        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!("{} {:#}", red("✗"), e);
                continue;
            }
        };

        let summary = run_crawl(harvester, &plan, progress).await?;
        if progress.is_none() {
            print_summary(&summary);
        }

        let again = ask!(&mut editor, "Continue? (y/n): ");
        if !again.eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }
}

fn prompt_range_plan(
    config: &HarvestConfig,
    category: &str,
    start: &str,
    end: &str,
    delay: &str,
) -> Result<CrawlPlan> {
    let category = if category.is_empty() {
        None
    } else {
        Some(parse_category(category).map_err(anyhow::Error::msg)?)
    };
    let start: u32 = start
        .parse()
        .with_context(|| format!("Invalid start code '{start}'"))?;
    let end: u32 = end
        .parse()
        .with_context(|| format!("Invalid end code '{end}'"))?;
    let delay: f64 = if delay.is_empty() {
        0.0
    } else {
        delay
            .parse()
            .with_context(|| format!("Invalid delay '{delay}'"))?
    };
    range_plan(config, start, end, category, delay)
}

fn prompt_single_plan(config: &HarvestConfig, category: &str, code: &str) -> Result<CrawlPlan> {
    let category = parse_category(category).map_err(anyhow::Error::msg)?;
    let code: LicenseCode = code.parse()?;
    Ok(CrawlPlan::single(code, category, config.request_delay()))
}
