mod cli;
mod config;
mod db;
mod domain;
mod error;
mod history;
mod ledger;
mod logging;
mod projection;
mod remote;
mod state;
mod stats;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Local};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::cli::{
    AccountCmd, ActualCmd, Cli, Command, DividendCmd, HoldingCmd, HoldingFields, LoginArgs,
    RankMetric, RemoteCmd, SimCmd, SimSetArgs, StatsCmd, TopArgs,
};
use crate::config::{
    AppConfig, DEFAULT_TIMEOUT_SECS, RemoteConfig, SNAPSHOT_KEY, app_paths, load_or_init_config,
    now_utc, write_config,
};
use crate::db::{Db, load_state, save_state};
use crate::domain::{Account, Holding, MonthlyAmounts, month_key, parse_month_key};
use crate::error::RemoteError;
use crate::ledger::HoldingPatch;
use crate::remote::{HttpRemoteStore, LoadOutcome};
use crate::state::{AppState, Outcome, SettingsPatch, apply};
use crate::stats::RankBy;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;

    if let Err(err) = logging::init_logging(&paths.data_dir, &cfg.log_level) {
        eprintln!("Warning: logging disabled: {err:#}");
    }

    let (db, db_path) = Db::open(&paths, &cfg.profile)?;
    let (year, month) = today();
    let mut app = load_state(&db, SNAPSHOT_KEY)?;
    let adopted = app.portfolio.adopt_legacy_months(year);
    if adopted > 0 {
        info!(adopted, year, "legacy monthly dividends filed under current year");
    }

    let next = match cli.command {
        Command::Login(args) => {
            handle_login(args, &mut cfg, &cfg_path)?;
            None
        }
        Command::Holding(args) => handle_holding(&app, args.cmd, year)?,
        Command::Dividend(args) => handle_dividend(&app, args.cmd)?,
        Command::Summary(args) => {
            print_summary(&app, args.year.unwrap_or(year));
            None
        }
        Command::Stats(args) => {
            match args.cmd {
                StatsCmd::Yearly => print_yearly_stats(&app),
                StatsCmd::Trailing { as_of } => {
                    let (y, m) = match as_of {
                        Some(raw) => parse_month_arg(&raw)?,
                        None => (year, month),
                    };
                    print_trailing(&app, y, m);
                }
            }
            None
        }
        Command::Top(args) => {
            print_top(&app, args, year);
            None
        }
        Command::Sim(args) => handle_sim(&app, args.cmd)?,
        Command::Actual(args) => handle_actual(&app, args.cmd)?,
        Command::Export(args) => {
            let json = app.export_json().context("Failed to serialize export")?;
            match args.out {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("exported\t{}", path.display());
                }
                None => println!("{json}"),
            }
            None
        }
        Command::Import(args) => {
            let raw = fs::read_to_string(&args.file)
                .with_context(|| format!("Failed to read {}", args.file.display()))?;
            let mut next = app.clone();
            next.import_json(&raw, year)
                .with_context(|| format!("Import of {} failed", args.file.display()))?;
            println!(
                "imported\t{} holdings, {} accounts",
                next.portfolio.len(),
                next.sim_settings.accounts.len()
            );
            Some(next)
        }
        Command::Reset(args) => {
            let (next, label) = if args.empty {
                (AppState::empty(), "empty")
            } else {
                (AppState::sample(), "sample")
            };
            println!("reset\t{label}");
            Some(next)
        }
        Command::Remote(args) => handle_remote(&db, &app, args.cmd, &mut cfg, &cfg_path)?,
    };

    if let Some(next) = next {
        save_state(&db, SNAPSHOT_KEY, &next, now_utc())?;
        info!(db = %db_path.display(), "snapshot saved");
    }
    Ok(())
}

fn today() -> (i32, u32) {
    let now = Local::now();
    (now.year(), now.month())
}

/// Applies one state command and keeps the result only when something changed.
fn commit(app: &AppState, command: state::Command, what: &str) -> Result<AppState> {
    let (next, outcome) = apply(app, command);
    match outcome {
        Outcome::Changed => Ok(next),
        Outcome::NotFound => Err(anyhow!("No {what} found")),
        Outcome::Rejected(reason) => Err(anyhow!(reason)),
    }
}

fn parse_month_arg(raw: &str) -> Result<(i32, u32)> {
    parse_month_key(raw).ok_or_else(|| anyhow!("Invalid month '{raw}', expected YYYY-MM"))
}

fn resolve_holding(app: &AppState, id: &str) -> Result<String> {
    app.portfolio
        .resolve(id)
        .map(|h| h.id.clone())
        .ok_or_else(|| anyhow!("No holding matches '{id}'"))
}

fn resolve_account(app: &AppState, id_or_name: &str) -> Result<String> {
    app.sim_settings
        .resolve_account(id_or_name)
        .map(|a| a.id.clone())
        .ok_or_else(|| anyhow!("No account named '{id_or_name}'"))
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

fn percent(v: f64) -> String {
    format!("{v:.2}%")
}

fn or_dash(v: Option<String>) -> String {
    v.unwrap_or_else(|| "-".to_string())
}

fn patch_from_fields(name: Option<String>, fields: HoldingFields) -> HoldingPatch {
    HoldingPatch {
        name,
        ticker: fields.ticker,
        quantity: fields.quantity,
        current_price: fields.price,
        dividend_yield: fields.dividend_yield,
        dividend_day: fields.day.map(Some),
        sector: fields.sector.map(Some),
    }
}

fn handle_holding(app: &AppState, cmd: HoldingCmd, current_year: i32) -> Result<Option<AppState>> {
    match cmd {
        HoldingCmd::Add { name, fields, year } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Holding name must not be empty");
            }
            let mut holding = Holding::new(name, year.unwrap_or(current_year));
            let id = holding.id.clone();
            holding.ticker = fields.ticker.unwrap_or_default();
            holding.quantity = fields.quantity.unwrap_or(0.0);
            holding.current_price = fields.price.unwrap_or(0.0);
            holding.dividend_yield = fields.dividend_yield.unwrap_or(0.0);
            if fields.day.is_some() {
                holding.dividend_day = fields.day;
            }
            holding.sector = fields.sector;

            let next = commit(app, state::Command::AddHolding(holding), "holding")?;
            println!("added\t{id}");
            Ok(Some(next))
        }
        HoldingCmd::Update {
            id,
            name,
            fields,
            clear_day,
            clear_sector,
        } => {
            let id = resolve_holding(app, &id)?;
            let mut patch = patch_from_fields(name, fields);
            if clear_day {
                patch.dividend_day = Some(None);
            }
            if clear_sector {
                patch.sector = Some(None);
            }
            if patch.is_empty() {
                bail!("Nothing to update (pass at least one field flag)");
            }
            let next = commit(
                app,
                state::Command::UpdateHolding {
                    id: id.clone(),
                    patch,
                },
                "holding",
            )?;
            println!("updated\t{id}");
            Ok(Some(next))
        }
        HoldingCmd::Remove { id } => {
            let id = resolve_holding(app, &id)?;
            let next = commit(
                app,
                state::Command::RemoveHolding { id: id.clone() },
                "holding",
            )?;
            println!("removed\t{id}");
            Ok(Some(next))
        }
        HoldingCmd::List(args) => {
            let year = args.year.unwrap_or(current_year);
            println!("id\tname\tticker\tquantity\tprice\tvalue\tdividend_{year}\tyield\tday\tsector");
            for h in app.portfolio.holdings() {
                let annual = stats::annual_dividend(h, year);
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    h.id,
                    h.name,
                    if h.ticker.is_empty() { "-" } else { h.ticker.as_str() },
                    h.quantity,
                    money(h.current_price),
                    money(h.position_value()),
                    money(annual),
                    percent(stats::realized_yield(std::slice::from_ref(h), year)),
                    or_dash(h.dividend_day.map(|d| d.to_string())),
                    or_dash(h.sector.clone()),
                );
            }
            Ok(None)
        }
    }
}

fn handle_dividend(app: &AppState, cmd: DividendCmd) -> Result<Option<AppState>> {
    match cmd {
        DividendCmd::Set { id, month, amount } => {
            let id = resolve_holding(app, &id)?;
            let (year, month) = parse_month_arg(&month)?;
            let next = commit(
                app,
                state::Command::SetDividend {
                    id: id.clone(),
                    year,
                    month,
                    amount,
                },
                "holding",
            )?;
            println!("{}\t{id}\t{}", month_key(year, month), money(amount));
            Ok(Some(next))
        }
        DividendCmd::Year { id, year, amounts } => {
            let id = resolve_holding(app, &id)?;
            let months: MonthlyAmounts = amounts
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("Expected 12 monthly amounts, got {}", amounts.len()))?;
            let next = commit(
                app,
                state::Command::SetYearDividends {
                    id: id.clone(),
                    year,
                    months,
                },
                "holding",
            )?;
            println!("{year}\t{id}\t{}", money(months.iter().sum()));
            Ok(Some(next))
        }
    }
}

fn print_summary(app: &AppState, year: i32) {
    let summary = stats::summarize(app.portfolio.holdings(), year);
    println!("year\t{}", summary.year);
    println!("holdings\t{}", app.portfolio.len());
    println!("total_value\t{}", money(summary.total_value));
    println!("annual_dividend\t{}", money(summary.annual_dividend));
    println!("monthly_average\t{}", money(summary.annual_dividend / 12.0));
    println!("yield\t{}", percent(summary.yield_rate));
    for (i, amount) in summary.monthly.iter().enumerate() {
        println!("{}\t{}", month_key(year, i as u32 + 1), money(*amount));
    }
}

fn print_yearly_stats(app: &AppState) {
    let years = app.portfolio.years();
    let report = stats::yearly_report(app.portfolio.holdings(), &years);
    println!("year\tdividend\tasset\tyield\tcumulative\tgrowth");
    for row in &report.rows {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.year,
            money(row.total_dividend),
            money(row.total_asset),
            percent(row.yield_rate),
            money(row.cumulative),
            or_dash(row.growth.map(percent)),
        );
    }
    println!(
        "average\t{}\t-\t{}\t-\t-",
        money(report.average_dividend),
        percent(report.average_yield)
    );
}

fn print_trailing(app: &AppState, year: i32, month: u32) {
    let series = stats::trailing_twelve_months(app.portfolio.holdings(), year, month);
    println!("month\tdividend");
    for m in &series {
        println!("{}\t{}", month_key(m.year, m.month), money(m.total));
    }
    let total: f64 = series.iter().map(|m| m.total).sum();
    println!("total\t{}", money(total));
}

fn print_top(app: &AppState, args: TopArgs, current_year: i32) {
    let year = args.year.unwrap_or(current_year);
    let by = match args.by {
        RankMetric::Dividend => RankBy::Dividend(year),
        RankMetric::Value => RankBy::Value,
    };
    println!("rank\tid\tname\tmetric\tshare");
    for r in stats::top_n(app.portfolio.holdings(), by, args.limit) {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            r.rank,
            r.holding.id,
            r.holding.name,
            money(r.metric),
            percent(r.share)
        );
    }
}

fn settings_patch(args: SimSetArgs) -> Result<SettingsPatch> {
    let (start_year, start_month) = match args.start.as_deref() {
        Some(raw) => {
            let (y, m) = parse_month_arg(raw)?;
            (Some(y), Some(m))
        }
        None => (None, None),
    };
    let birth_year = if args.clear_birth_year {
        Some(None)
    } else {
        args.birth_year.map(Some)
    };
    Ok(SettingsPatch {
        conservative: args.conservative,
        moderate: args.moderate,
        aggressive: args.aggressive,
        monthly_contribution: args.contribution,
        start_year,
        start_month,
        end_year: args.end_year,
        birth_year,
    })
}

fn handle_sim(app: &AppState, cmd: SimCmd) -> Result<Option<AppState>> {
    let s = &app.sim_settings;
    match cmd {
        SimCmd::Show => {
            println!("conservative\t{}", percent(s.scenarios.conservative));
            println!("moderate\t{}", percent(s.scenarios.moderate));
            println!("aggressive\t{}", percent(s.scenarios.aggressive));
            println!("monthly_contribution\t{}", money(s.monthly_contribution));
            println!("start\t{}", month_key(s.start_year, s.start_month));
            println!("end_year\t{}", s.end_year);
            println!("birth_year\t{}", or_dash(s.birth_year.map(|y| y.to_string())));
            println!("starting_balance\t{}", money(s.starting_balance()));
            println!(
                "latest_actual\t{}",
                or_dash(
                    app.history
                        .latest()
                        .map(|p| format!("{} {}", p.date, money(p.value)))
                )
            );
            for a in &s.accounts {
                println!("account\t{}\t{}\t{}", a.id, a.name, money(a.balance));
            }
            Ok(None)
        }
        SimCmd::Set(args) => {
            let patch = settings_patch(args)?;
            if patch == SettingsPatch::default() {
                bail!("Nothing to update (pass at least one setting flag)");
            }
            let next = commit(app, state::Command::UpdateSettings(patch), "settings")?;
            println!("updated\tsettings");
            Ok(Some(next))
        }
        SimCmd::Run { yearly } => {
            let series = projection::generate(
                s.starting_balance(),
                s.monthly_contribution,
                s.scenarios,
                app.history.points(),
                s.start_year,
                s.end_year,
                s.start_month,
            );
            let rows: Vec<_> = if yearly {
                projection::year_end_points(&series)
            } else {
                series.iter().collect()
            };
            println!("month\tage\tinvested\tconservative\tmoderate\taggressive\tactual");
            for p in rows {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    p.month_label,
                    or_dash(s.age_in(p.year).map(|a| a.to_string())),
                    money(p.invested_capital),
                    money(p.conservative),
                    money(p.moderate),
                    money(p.aggressive),
                    or_dash(p.actual.map(money)),
                );
            }
            Ok(None)
        }
        SimCmd::Account(args) => handle_account(app, args.cmd),
    }
}

fn handle_account(app: &AppState, cmd: AccountCmd) -> Result<Option<AppState>> {
    match cmd {
        AccountCmd::Add { name, balance } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Account name must not be empty");
            }
            let account = Account::new(name, balance);
            let id = account.id.clone();
            let next = commit(app, state::Command::AddAccount(account), "account")?;
            println!("added\t{id}");
            Ok(Some(next))
        }
        AccountCmd::Rename { account, new_name } => {
            let id = resolve_account(app, &account)?;
            if new_name.trim().is_empty() {
                bail!("Account name must not be empty");
            }
            let next = commit(
                app,
                state::Command::RenameAccount {
                    id: id.clone(),
                    name: new_name.trim().to_string(),
                },
                "account",
            )?;
            println!("renamed\t{id}");
            Ok(Some(next))
        }
        AccountCmd::Balance { account, amount } => {
            let id = resolve_account(app, &account)?;
            let next = commit(
                app,
                state::Command::SetAccountBalance {
                    id: id.clone(),
                    balance: amount,
                },
                "account",
            )?;
            println!("balance\t{id}\t{}", money(amount));
            Ok(Some(next))
        }
        AccountCmd::Remove { account } => {
            let id = resolve_account(app, &account)?;
            let next = commit(
                app,
                state::Command::RemoveAccount { id: id.clone() },
                "account",
            )?;
            println!("removed\t{id}");
            Ok(Some(next))
        }
    }
}

fn handle_actual(app: &AppState, cmd: ActualCmd) -> Result<Option<AppState>> {
    match cmd {
        ActualCmd::Set {
            month,
            value,
            account,
        } => {
            let (y, m) = parse_month_arg(&month)?;
            let date = month_key(y, m);
            let command = match account {
                Some(account) => state::Command::UpsertAccountValue {
                    date: date.clone(),
                    account_id: resolve_account(app, &account)?,
                    value,
                },
                None => state::Command::UpsertHistory {
                    date: date.clone(),
                    value,
                },
            };
            let next = commit(app, command, "history point")?;
            let total = next.history.get(&date).map(|p| p.value).unwrap_or(value);
            println!("{date}\t{}", money(total));
            Ok(Some(next))
        }
        ActualCmd::List => {
            println!("month\tvalue\taccounts");
            for p in app.history.chronological() {
                let accounts = p
                    .account_values
                    .iter()
                    .map(|(id, v)| {
                        let name = app
                            .sim_settings
                            .account(id)
                            .map(|a| a.name.as_str())
                            .unwrap_or("(removed account)");
                        format!("{name}={}", money(*v))
                    })
                    .collect::<Vec<_>>();
                let accounts = if accounts.is_empty() {
                    "-".to_string()
                } else {
                    accounts.join(", ")
                };
                println!("{}\t{}\t{accounts}", p.date, money(p.value));
            }
            Ok(None)
        }
        ActualCmd::Remove { month } => {
            let (y, m) = parse_month_arg(&month)?;
            let date = month_key(y, m);
            let next = commit(
                app,
                state::Command::RemoveHistory { date: date.clone() },
                "history point",
            )?;
            println!("removed\t{date}");
            Ok(Some(next))
        }
    }
}

fn handle_login(args: LoginArgs, cfg: &mut AppConfig, cfg_path: &Path) -> Result<()> {
    let url = args.url.trim().trim_end_matches('/').to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("Remote URL must start with http:// or https://");
    }

    cfg.remote = Some(RemoteConfig {
        url,
        api_key: args.api_key,
        access_token: args.token,
        user_id: args.user_id,
        timeout_secs: args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    });
    write_config(cfg_path, cfg)?;
    print_remote_status(cfg);
    Ok(())
}

fn print_remote_status(cfg: &AppConfig) {
    println!("device_id\t{}", cfg.device_id);
    println!("profile\t{}", cfg.profile);
    match &cfg.remote {
        Some(remote) => {
            println!("remote_url\t{}", remote.url);
            println!("user_id\t{}", remote.user_id);
            println!(
                "auth\t{}",
                if remote.access_token.is_some() {
                    "token"
                } else {
                    "api key"
                }
            );
            println!("timeout_secs\t{}", remote.timeout_secs);
        }
        None => println!("remote_url\t<not set>"),
    }
    println!(
        "last_sync\t{}",
        or_dash(cfg.last_remote_sync_at.map(|t| t.to_rfc3339()))
    );
}

fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message(msg);
    pb
}

fn connect(cfg: &AppConfig) -> Result<(RemoteConfig, HttpRemoteStore)> {
    let remote = cfg.remote.clone().ok_or(RemoteError::NotConfigured)?;
    let store = HttpRemoteStore::new(&remote)?;
    Ok((remote, store))
}

fn handle_remote(
    db: &Db,
    app: &AppState,
    cmd: RemoteCmd,
    cfg: &mut AppConfig,
    cfg_path: &Path,
) -> Result<Option<AppState>> {
    match cmd {
        RemoteCmd::Status => {
            print_remote_status(cfg);
            for snap in db.list_snapshots()? {
                println!(
                    "snapshot\t{}\t{} bytes\t{}",
                    snap.key,
                    snap.bytes,
                    snap.updated_at.to_rfc3339()
                );
            }
            Ok(None)
        }
        RemoteCmd::Load => {
            let (remote_cfg, store) = connect(cfg)?;
            let pb = spinner("Loading from remote store...");
            let (year, _) = today();
            let outcome = remote::load(&store, &remote_cfg.user_id, app, year);
            pb.finish_and_clear();

            match outcome? {
                LoadOutcome::NoRemoteData => {
                    println!("remote\tno holdings stored; local data kept");
                    Ok(None)
                }
                LoadOutcome::Loaded(next) => {
                    cfg.last_remote_sync_at = Some(now_utc());
                    write_config(cfg_path, cfg)?;
                    println!("loaded\t{} holdings", next.portfolio.len());
                    println!("history\t{} points", next.history.len());
                    Ok(Some(next))
                }
            }
        }
        RemoteCmd::Save => {
            let (remote_cfg, store) = connect(cfg)?;
            if app.portfolio.is_empty() {
                println!("remote\tno local holdings; a later load will keep local data");
            }
            let pb = ProgressBar::new(remote::planned_writes(app) as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}") {
                pb.set_style(style);
            }
            pb.set_message("rows");
            let report = remote::save(&store, &remote_cfg.user_id, app, || pb.inc(1));
            pb.finish_and_clear();

            println!("written\t{}", report.written);
            println!("skipped\t{}", report.skipped);
            println!("failed\t{}", report.failures.len());
            for f in &report.failures {
                println!("error\t{}\t{}", f.target, f.error);
            }

            if !report.is_complete() {
                bail!(
                    "Remote save incomplete: {} failed, {} skipped",
                    report.failures.len(),
                    report.skipped
                );
            }
            cfg.last_remote_sync_at = Some(now_utc());
            write_config(cfg_path, cfg)?;
            Ok(None)
        }
    }
}
