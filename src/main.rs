//! a11y-scan CLI - Accessibility Conformance Scanner
//!
//! Loads a snapshot of a UI element hierarchy, walks it around a selected
//! element and reports rule results.

use a11y_scan::config::{ColorMode, Config, OutputFormat};
use a11y_scan::output::{JsonFormatter, OutputFormatter, SarifFormatter, ScanReport, TextFormatter};
use a11y_scan::platform::SnapshotTree;
use a11y_scan::rules::builtin_registrations;
use a11y_scan::walker::WalkMode;
use a11y_scan::ScanContext;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "a11y-scan",
    version,
    about = "Accessibility conformance scanner",
    long_about = "Walks a UI element hierarchy and evaluates accessibility rules against every element."
)]
struct Cli {
    /// Snapshot of the element tree (YAML or JSON)
    snapshot: PathBuf,

    /// Element to scan: `#AutomationId` or a child-index path such as `0/2`
    #[arg(short, long, default_value = "")]
    select: String,

    /// Walk mode
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Maximum number of elements visited
    #[arg(long)]
    max_elements: Option<i32>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// List passing results too (text format)
    #[arg(long)]
    show_passes: bool,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Live,
    Test,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Sarif,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(3);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().context("Failed to load default config")?,
    };

    let format = cli.format.map(|f| match f {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
        Format::Sarif => OutputFormat::Sarif,
    });
    let mode = cli.mode.map(|m| match m {
        Mode::Live => WalkMode::Live,
        Mode::Test => WalkMode::Test,
    });
    config.merge_cli(format, mode, cli.max_elements, cli.jobs, cli.disable.clone());
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli)?;
    match config.output.color {
        ColorMode::Always if !cli.no_color => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        _ => {}
    }
    let context = ScanContext::new(config, builtin_registrations())?;

    if cli.list_rules {
        list_rules(&context);
        return Ok(0);
    }

    let platform = SnapshotTree::load(&cli.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", cli.snapshot.display()))?;
    let selected = platform
        .select(&cli.select)
        .ok_or_else(|| anyhow!("No element matches selector '{}'", cli.select))?;

    let mut walker = context.walker(&platform)?;
    let scan = walker.walk(&selected)?;

    let config = context.config();
    let report = ScanReport::from_scan(&cli.snapshot.display().to_string(), &scan, config);

    let formatter: Box<dyn OutputFormatter> = match config.output.format {
        OutputFormat::Text => {
            let mut f = TextFormatter::new();
            if cli.no_color || config.output.color == ColorMode::Never {
                f = f.without_color();
            }
            if cli.show_passes {
                f = f.with_passes();
            }
            Box::new(f)
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Sarif => Box::new(SarifFormatter::new("a11y-scan", env!("CARGO_PKG_VERSION"))),
    };
    print!("{}", formatter.format(&report));

    Ok(report.exit_code())
}

fn list_rules(context: &ScanContext) {
    let config = context.config();
    for rule in context.provider().all_rules() {
        let info = rule.info();
        let id = if config.is_rule_enabled(info.id.as_str()) {
            info.id.as_str().cyan().to_string()
        } else {
            format!("{} (disabled)", info.id).dimmed().to_string()
        };
        println!("{}  [{}]", id, info.standard);
        println!("    {}", info.description);
        if !info.condition.is_empty() {
            println!("    applies to: {}", info.condition);
        }
    }
}
