use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "divfolio")]
#[command(about = "Dividend portfolio tracker and net-worth projection", long_about = None)]
pub struct Cli {
    /// Override divfolio home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "DIVFOLIO_HOME")]
    pub home: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Holding(HoldingArgs),
    Dividend(DividendArgs),

    /// Total value, annual dividend, yield and monthly distribution for a year.
    Summary(YearArgs),
    Stats(StatsArgs),
    /// Holdings ranked by annual dividend or position value.
    Top(TopArgs),

    Sim(SimArgs),
    Actual(ActualArgs),

    Export(ExportArgs),
    Import(ImportArgs),
    /// Starts over with the sample portfolio (or an empty one).
    Reset(ResetArgs),

    Login(LoginArgs),
    Remote(RemoteArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct HoldingFields {
    #[arg(long)]
    pub ticker: Option<String>,

    #[arg(long)]
    pub quantity: Option<f64>,

    #[arg(long)]
    pub price: Option<f64>,

    /// Nominal dividend yield in percent.
    #[arg(long = "yield")]
    pub dividend_yield: Option<f64>,

    /// Usual payment day of month (1-31).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=31))]
    pub day: Option<u8>,

    #[arg(long)]
    pub sector: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum HoldingCmd {
    #[command(allow_negative_numbers = true)]
    Add {
        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: HoldingFields,

        /// Year whose dividend row is created (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,
    },
    #[command(allow_negative_numbers = true)]
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        fields: HoldingFields,

        #[arg(long, conflicts_with = "day")]
        clear_day: bool,

        #[arg(long, conflicts_with = "sector")]
        clear_sector: bool,
    },
    Remove {
        id: String,
    },
    List(YearArgs),
}

#[derive(Debug, Args)]
pub struct HoldingArgs {
    #[command(subcommand)]
    pub cmd: HoldingCmd,
}

#[derive(Debug, Subcommand)]
pub enum DividendCmd {
    /// Sets one month's dividend, e.g. `dividend set <id> 2025-03 1200`.
    #[command(allow_negative_numbers = true)]
    Set {
        id: String,
        month: String,
        amount: f64,
    },
    /// Replaces a whole year with twelve January..December amounts.
    #[command(allow_negative_numbers = true)]
    Year {
        id: String,
        year: i32,
        #[arg(num_args = 12, required = true)]
        amounts: Vec<f64>,
    },
}

#[derive(Debug, Args)]
pub struct DividendArgs {
    #[command(subcommand)]
    pub cmd: DividendCmd,
}

#[derive(Debug, Args, Clone, Default)]
pub struct YearArgs {
    /// Calendar year (defaults to the current year).
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Debug, Subcommand)]
pub enum StatsCmd {
    /// Year-over-year dividend table with averages.
    Yearly,
    /// The twelve months ending at `--as-of` (defaults to the current month).
    Trailing {
        #[arg(long)]
        as_of: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(subcommand)]
    pub cmd: StatsCmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankMetric {
    Dividend,
    Value,
}

#[derive(Debug, Args)]
pub struct TopArgs {
    #[arg(long, value_enum, default_value_t = RankMetric::Dividend)]
    pub by: RankMetric,

    #[arg(long, default_value_t = crate::stats::DEFAULT_TOP_N)]
    pub limit: usize,

    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Debug, Subcommand)]
pub enum SimCmd {
    Show,
    #[command(allow_negative_numbers = true)]
    Set(SimSetArgs),
    /// Prints the monthly projection merged with recorded actuals.
    Run {
        /// Only December of each year (and the final month).
        #[arg(long)]
        yearly: bool,
    },
    Account(AccountArgs),
}

#[derive(Debug, Args)]
pub struct SimArgs {
    #[command(subcommand)]
    pub cmd: SimCmd,
}

#[derive(Debug, Args, Default)]
pub struct SimSetArgs {
    /// Conservative annual return, percent.
    #[arg(long)]
    pub conservative: Option<f64>,
    #[arg(long)]
    pub moderate: Option<f64>,
    #[arg(long)]
    pub aggressive: Option<f64>,

    #[arg(long)]
    pub contribution: Option<f64>,

    /// Projection start as YYYY-MM.
    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end_year: Option<i32>,

    #[arg(long)]
    pub birth_year: Option<i32>,

    #[arg(long, conflicts_with = "birth_year")]
    pub clear_birth_year: bool,
}

#[derive(Debug, Subcommand)]
pub enum AccountCmd {
    #[command(allow_negative_numbers = true)]
    Add {
        name: String,
        #[arg(long, default_value_t = 0.0)]
        balance: f64,
    },
    Rename {
        account: String,
        new_name: String,
    },
    #[command(allow_negative_numbers = true)]
    Balance {
        account: String,
        amount: f64,
    },
    Remove {
        account: String,
    },
}

#[derive(Debug, Args)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub cmd: AccountCmd,
}

#[derive(Debug, Subcommand)]
pub enum ActualCmd {
    /// Records an observed net worth for a month, either total or per account.
    #[command(allow_negative_numbers = true)]
    Set {
        month: String,
        value: f64,
        /// Account id or name; the month's total becomes the sum of account values.
        #[arg(long)]
        account: Option<String>,
    },
    List,
    Remove {
        month: String,
    },
}

#[derive(Debug, Args)]
pub struct ActualArgs {
    #[command(subcommand)]
    pub cmd: ActualCmd,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Write to a file instead of stdout.
    #[arg(long)]
    pub out: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    pub file: std::path::PathBuf,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[arg(long)]
    pub empty: bool,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Base URL of the hosted store, e.g. https://xyz.example.co
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub api_key: String,

    #[arg(long)]
    pub user_id: String,

    /// Access token from the identity provider (defaults to the api key).
    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum RemoteCmd {
    Status,
    /// Replaces local data with the remote copy (no-op when the remote has no holdings).
    Load,
    /// Writes local data to the remote store, row by row.
    Save,
}

#[derive(Debug, Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub cmd: RemoteCmd,
}
