use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::debug;

use divorce_stats::data::aggregate::{scatter, Dimension, Measure};
use divorce_stats::data::export::export_csv;
use divorce_stats::data::loader::Encoding;
use divorce_stats::report::{
    build_report, render_domains, render_factors, render_group, render_ratio, render_report,
    render_scatter, render_trend, OutputFormat, ReportSettings,
};
use divorce_stats::shell::Shell;
use divorce_stats::{
    Config, DashboardState, DatasetCache, DivorceDataset, QueryError, Selection,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEncoding {
    /// UTF-8 with Latin-1 fallback
    Auto,
    Utf8,
    Latin1,
}

impl From<CliEncoding> for Encoding {
    fn from(cli: CliEncoding) -> Self {
        match cli {
            CliEncoding::Auto => Encoding::Auto,
            CliEncoding::Utf8 => Encoding::Utf8,
            CliEncoding::Latin1 => Encoding::Latin1,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Text,
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(cli: CliFormat) -> Self {
        match cli {
            CliFormat::Text => OutputFormat::Text,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliDimension {
    Year,
    Region,
}

impl From<CliDimension> for Dimension {
    fn from(cli: CliDimension) -> Self {
        match cli {
            CliDimension::Year => Dimension::Year,
            CliDimension::Region => Dimension::Region,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "divorce-stats",
    version,
    about = "Marriage and divorce statistics per regency/city",
    long_about = "Loads a regency-level marriage/divorce table, filters it by year, region \
                  and cause-of-divorce factor, and prints summary tables.\n\n\
                  EXAMPLES:\n  \
                  divorce-stats -i data.csv summary\n  \
                  divorce-stats -i data.csv -y 2023 -r \"Kota Surabaya\" factors --top-k 3\n  \
                  divorce-stats -i data.xlsx --format json trend\n  \
                  divorce-stats -c stats.toml shell"
)]
struct Cli {
    /// Data file (.csv, .xlsx, .xls, .ods, .parquet, .json)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Text encoding of CSV input
    #[arg(long, value_enum, global = true)]
    encoding: Option<CliEncoding>,

    /// Year to include (repeatable; default: all years)
    #[arg(short = 'y', long = "year", global = true)]
    years: Vec<i32>,

    /// Region to include (repeatable; default: all regions)
    #[arg(short = 'r', long = "region", global = true)]
    regions: Vec<String>,

    /// Factor taking part in aggregation (repeatable; default: all factors)
    #[arg(short = 'f', long = "factor", global = true)]
    factors: Vec<String>,

    #[arg(long, value_enum, default_value = "text", global = true)]
    format: CliFormat,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Headline figures, top regions, factor breakdown, trend and ratios
    Summary {
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        top_regions: Option<usize>,
    },
    /// Sum (or mean) of one measure per year or region
    Group {
        #[arg(long, value_enum, default_value = "region")]
        by: CliDimension,
        /// marriages, total, or a factor name
        #[arg(long, default_value = "total")]
        measure: String,
        #[arg(long)]
        mean: bool,
    },
    /// Factor ranking, optionally collapsed to top K + Other
    Factors {
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Per-year top K + Other with membership fixed over the whole selection
    Trend {
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Divorces per 100 marriages
    Ratio {
        #[arg(long, value_enum)]
        by: Option<CliDimension>,
    },
    /// One factor against another, per row
    Scatter {
        #[arg(long, default_value = "Ekonomi")]
        x: String,
        #[arg(long, default_value = "Pertengkaran Terus Menerus")]
        y: String,
    },
    /// Write the selected rows, unchanged, as CSV
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Years, regions and factors in the file
    Domains,
    /// Interactive session
    Shell,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Build a selection from the command line; omitted sets mean "everything".
fn selection_from_args(cli: &Cli, dataset: &DivorceDataset) -> Selection {
    let mut selection = Selection::all(dataset);
    if !cli.years.is_empty() {
        selection.years = cli.years.iter().copied().collect();
    }
    if !cli.regions.is_empty() {
        selection.regions = cli.regions.iter().cloned().collect();
    }
    if !cli.factors.is_empty() {
        selection.factors = Some(cli.factors.iter().cloned().collect::<BTreeSet<_>>());
    }
    selection
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(enc) = cli.encoding {
        config.source.encoding = enc.into();
    }
    let input = cli
        .input
        .clone()
        .or_else(|| config.source.path.clone())
        .context("no input file: pass --input or set [source].path in the config")?;
    debug!("config: {config:?}");

    let mut state = DashboardState::new(DatasetCache::new(input.clone(), config.load_options()));
    state
        .load()
        .with_context(|| format!("loading {}", input.display()))?;
    let dataset = state.dataset.clone().context("dataset missing after load")?;
    state.set_selection(selection_from_args(&cli, &dataset));

    let format = OutputFormat::from(cli.format);
    if let Command::Shell = cli.command {
        let mut shell = Shell::new(state, config.report, format);
        return shell.run(io::stdin().lock(), io::stdout().lock());
    }

    let text = run_query(&cli.command, &state, config.report, format)?;
    println!("{}", text.trim_end());
    Ok(())
}

/// Answer one non-interactive subcommand against the current selection.
fn run_query(
    command: &Command,
    state: &DashboardState,
    mut settings: ReportSettings,
    format: OutputFormat,
) -> Result<String> {
    let dataset = state.dataset.as_deref().ok_or(QueryError::NoDataLoaded)?;
    // the domains are what a user checks when a selection matches nothing
    if let Command::Domains = command {
        return Ok(render_domains(dataset, format)?);
    }

    let view = state.view()?;
    let text = match command {
        Command::Summary { top_k, top_regions } => {
            settings.top_k = top_k.unwrap_or(settings.top_k);
            settings.top_regions = top_regions.unwrap_or(settings.top_regions);
            render_report(&build_report(&view, &settings), dataset, format)?
        }
        Command::Group { by, measure, mean } => {
            let measure = Measure::parse(dataset, measure)?;
            render_group(&view, (*by).into(), measure, *mean, format)?
        }
        Command::Factors { top_k } => render_factors(&view, *top_k, format)?,
        Command::Trend { top_k } => {
            render_trend(&view, top_k.unwrap_or(settings.top_k), format)?
        }
        Command::Ratio { by } => render_ratio(&view, by.map(Dimension::from), format)?,
        Command::Scatter { x, y } => {
            render_scatter(dataset, &scatter(&view, x, y)?, x, y, format)?
        }
        Command::Export { output } => {
            export_csv(&view, output)?;
            format!("wrote {} rows to {}", view.len(), output.display())
        }
        Command::Domains | Command::Shell => bail!("'{command:?}' has no query output"),
    };
    Ok(text)
}
