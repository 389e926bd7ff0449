use crate::config::RemoteConfig;
use crate::domain::{Account, Holding, MonthlyAmounts, Scenarios, SimulatorSettings, ZERO_MONTHS};
use crate::error::RemoteError;
use crate::history::History;
use crate::ledger::Ledger;
use crate::state::AppState;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    PortfolioItems,
    YearlyDividends,
    SimSettings,
    History,
    AccountHistory,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::PortfolioItems => "portfolio_items",
            Table::YearlyDividends => "yearly_dividends",
            Table::SimSettings => "user_sim_settings",
            Table::History => "user_history",
            Table::AccountHistory => "user_account_history",
        }
    }

    /// Comma-separated columns that identify a row for upserts.
    pub fn conflict_key(self) -> &'static str {
        match self {
            Table::PortfolioItems => "id",
            Table::YearlyDividends => "portfolio_item_id,year",
            Table::SimSettings => "user_id",
            Table::History => "user_id,date",
            Table::AccountHistory => "user_id,date,account_id",
        }
    }
}

/// Request/response access to the hosted store. Every call is a single row
/// write or a per-user select; there are no multi-row transactions.
pub trait RemoteStore {
    fn select(&self, table: Table, user_id: &str) -> Result<Vec<Value>, RemoteError>;
    fn upsert(&self, table: Table, row: Value) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItemRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub dividend_yield: f64,
    #[serde(default)]
    pub dividend_day: Option<u8>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyDividendRow {
    pub user_id: String,
    pub portfolio_item_id: String,
    pub year: i32,
    #[serde(default)]
    pub month_1: f64,
    #[serde(default)]
    pub month_2: f64,
    #[serde(default)]
    pub month_3: f64,
    #[serde(default)]
    pub month_4: f64,
    #[serde(default)]
    pub month_5: f64,
    #[serde(default)]
    pub month_6: f64,
    #[serde(default)]
    pub month_7: f64,
    #[serde(default)]
    pub month_8: f64,
    #[serde(default)]
    pub month_9: f64,
    #[serde(default)]
    pub month_10: f64,
    #[serde(default)]
    pub month_11: f64,
    #[serde(default)]
    pub month_12: f64,
}

impl YearlyDividendRow {
    pub fn new(user_id: &str, portfolio_item_id: &str, year: i32, m: MonthlyAmounts) -> Self {
        Self {
            user_id: user_id.to_string(),
            portfolio_item_id: portfolio_item_id.to_string(),
            year,
            month_1: m[0],
            month_2: m[1],
            month_3: m[2],
            month_4: m[3],
            month_5: m[4],
            month_6: m[5],
            month_7: m[6],
            month_8: m[7],
            month_9: m[8],
            month_10: m[9],
            month_11: m[10],
            month_12: m[11],
        }
    }

    pub fn months(&self) -> MonthlyAmounts {
        [
            self.month_1,
            self.month_2,
            self.month_3,
            self.month_4,
            self.month_5,
            self.month_6,
            self.month_7,
            self.month_8,
            self.month_9,
            self.month_10,
            self.month_11,
            self.month_12,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub user_id: String,
    pub scenarios: Scenarios,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub monthly_contribution: f64,
    pub start_year: i32,
    #[serde(default = "first_month")]
    pub start_month: u32,
    pub end_year: i32,
    #[serde(default)]
    pub birth_year: Option<i32>,
}

fn first_month() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub user_id: String,
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountHistoryRow {
    pub user_id: String,
    pub date: String,
    pub account_id: String,
    pub value: f64,
}

fn holding_row(user_id: &str, h: &Holding) -> PortfolioItemRow {
    PortfolioItemRow {
        id: h.id.clone(),
        user_id: user_id.to_string(),
        name: h.name.clone(),
        ticker: h.ticker.clone(),
        quantity: h.quantity,
        current_price: h.current_price,
        dividend_yield: h.dividend_yield,
        dividend_day: h.dividend_day,
        sector: h.sector.clone(),
    }
}

fn settings_row(user_id: &str, s: &SimulatorSettings) -> SettingsRow {
    SettingsRow {
        user_id: user_id.to_string(),
        scenarios: s.scenarios,
        accounts: s.accounts.clone(),
        monthly_contribution: s.monthly_contribution,
        start_year: s.start_year,
        start_month: s.start_month,
        end_year: s.end_year,
        birth_year: s.birth_year,
    }
}

impl From<SettingsRow> for SimulatorSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            scenarios: row.scenarios,
            accounts: row.accounts,
            monthly_contribution: row.monthly_contribution,
            start_year: row.start_year,
            start_month: row.start_month,
            end_year: row.end_year,
            birth_year: row.birth_year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Holding { id: String },
    DividendYear { holding_id: String, year: i32 },
    Settings,
    History { date: String },
    AccountValue { date: String, account_id: String },
}

impl std::fmt::Display for SaveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveTarget::Holding { id } => write!(f, "holding {id}"),
            SaveTarget::DividendYear { holding_id, year } => {
                write!(f, "dividends {holding_id} {year}")
            }
            SaveTarget::Settings => write!(f, "simulator settings"),
            SaveTarget::History { date } => write!(f, "history {date}"),
            SaveTarget::AccountValue { date, account_id } => {
                write!(f, "account value {date} {account_id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveFailure {
    pub target: SaveTarget,
    pub error: String,
}

/// Result of a best-effort save: rows already written stay written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub written: usize,
    pub skipped: usize,
    pub failures: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }

    fn record(&mut self, target: SaveTarget, result: Result<(), RemoteError>) -> bool {
        match result {
            Ok(()) => {
                self.written += 1;
                true
            }
            Err(err) => {
                warn!(row = %target, error = %err, "remote write failed");
                self.failures.push(SaveFailure {
                    target,
                    error: err.to_string(),
                });
                false
            }
        }
    }
}

/// Number of row writes `save` will attempt for `state`.
pub fn planned_writes(state: &AppState) -> usize {
    let holdings: usize = state
        .portfolio
        .holdings()
        .iter()
        .map(|h| 1 + h.yearly_dividends.len())
        .sum();
    let history: usize = state
        .history
        .points()
        .iter()
        .map(|p| 1 + p.account_values.len())
        .sum();
    holdings + 1 + history
}

fn to_row<T: Serialize>(table: Table, row: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(row).map_err(|e| RemoteError::Decode {
        collection: table.name(),
        message: e.to_string(),
    })
}

fn write<T: Serialize>(store: &dyn RemoteStore, table: Table, row: &T) -> Result<(), RemoteError> {
    store.upsert(table, to_row(table, row)?)
}

/// Writes every holding (scalar row, then one row per dividend year), the
/// simulator settings and the history to `store`.
///
/// A failed holding row skips that holding's dividend rows. No failure stops
/// the rest of the save. `tick` is called once per attempted or skipped row.
pub fn save(
    store: &dyn RemoteStore,
    user_id: &str,
    state: &AppState,
    mut tick: impl FnMut(),
) -> SaveReport {
    let mut report = SaveReport::default();

    for h in state.portfolio.holdings() {
        let ok = report.record(
            SaveTarget::Holding { id: h.id.clone() },
            write(store, Table::PortfolioItems, &holding_row(user_id, h)),
        );
        tick();

        for (&year, &months) in &h.yearly_dividends {
            if !ok {
                report.skipped += 1;
                tick();
                continue;
            }
            let row = YearlyDividendRow::new(user_id, &h.id, year, months);
            report.record(
                SaveTarget::DividendYear {
                    holding_id: h.id.clone(),
                    year,
                },
                write(store, Table::YearlyDividends, &row),
            );
            tick();
        }
    }

    report.record(
        SaveTarget::Settings,
        write(
            store,
            Table::SimSettings,
            &settings_row(user_id, &state.sim_settings),
        ),
    );
    tick();

    for p in state.history.points() {
        let row = HistoryRow {
            user_id: user_id.to_string(),
            date: p.date.clone(),
            value: p.value,
        };
        report.record(
            SaveTarget::History {
                date: p.date.clone(),
            },
            write(store, Table::History, &row),
        );
        tick();

        for (account_id, &value) in &p.account_values {
            let row = AccountHistoryRow {
                user_id: user_id.to_string(),
                date: p.date.clone(),
                account_id: account_id.clone(),
                value,
            };
            report.record(
                SaveTarget::AccountValue {
                    date: p.date.clone(),
                    account_id: account_id.clone(),
                },
                write(store, Table::AccountHistory, &row),
            );
            tick();
        }
    }

    info!(
        written = report.written,
        failed = report.failures.len(),
        skipped = report.skipped,
        "remote save finished"
    );
    report
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The store has no holdings for this user; local state should be kept.
    NoRemoteData,
    Loaded(AppState),
}

fn fetch<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    table: Table,
    user_id: &str,
) -> Result<Vec<T>, RemoteError> {
    store
        .select(table, user_id)?
        .into_iter()
        .map(|v| {
            serde_json::from_value(v).map_err(|e| RemoteError::Decode {
                collection: table.name(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Builds a complete replacement state from the store.
///
/// Returns [`LoadOutcome::NoRemoteData`] when the user has no holdings
/// remotely. Any failed query fails the whole load. A missing settings row
/// keeps `current`'s settings. `current_year` picks the legacy monthly array.
pub fn load(
    store: &dyn RemoteStore,
    user_id: &str,
    current: &AppState,
    current_year: i32,
) -> Result<LoadOutcome, RemoteError> {
    let items: Vec<PortfolioItemRow> = fetch(store, Table::PortfolioItems, user_id)?;
    if items.is_empty() {
        info!(user_id, "remote store has no holdings; keeping local data");
        return Ok(LoadOutcome::NoRemoteData);
    }

    let dividend_rows: Vec<YearlyDividendRow> = fetch(store, Table::YearlyDividends, user_id)?;
    let settings_rows: Vec<SettingsRow> = fetch(store, Table::SimSettings, user_id)?;
    let history_rows: Vec<HistoryRow> = fetch(store, Table::History, user_id)?;
    let account_rows: Vec<AccountHistoryRow> = fetch(store, Table::AccountHistory, user_id)?;

    let mut dividends: BTreeMap<String, BTreeMap<i32, MonthlyAmounts>> = BTreeMap::new();
    for row in &dividend_rows {
        dividends
            .entry(row.portfolio_item_id.clone())
            .or_default()
            .insert(row.year, row.months());
    }

    let holdings: Vec<Holding> = items
        .into_iter()
        .map(|item| {
            let yearly_dividends = dividends.remove(&item.id).unwrap_or_default();
            let monthly_dividends = yearly_dividends
                .get(&current_year)
                .copied()
                .unwrap_or(ZERO_MONTHS);
            Holding {
                id: item.id,
                name: item.name,
                ticker: item.ticker,
                quantity: item.quantity,
                current_price: item.current_price,
                dividend_yield: item.dividend_yield,
                dividend_day: item.dividend_day,
                sector: item.sector,
                monthly_dividends,
                yearly_dividends,
            }
        })
        .collect();

    if !dividends.is_empty() {
        debug!(
            orphaned = dividends.len(),
            "dividend rows without a matching holding were dropped"
        );
    }

    let sim_settings = match settings_rows.into_iter().next() {
        Some(row) => row.into(),
        None => current.sim_settings.clone(),
    };

    let mut history = History::default();
    for row in &history_rows {
        history.upsert(&row.date, row.value);
    }
    for row in &account_rows {
        history.upsert_account_value(&row.date, &row.account_id, row.value);
    }

    info!(
        holdings = holdings.len(),
        history = history.len(),
        "remote load finished"
    );
    Ok(LoadOutcome::Loaded(AppState {
        portfolio: Ledger::new(holdings),
        sim_settings,
        history,
    }))
}

/// PostgREST-style HTTP access to the hosted store.
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

impl HttpRemoteStore {
    pub fn new(cfg: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .user_agent(concat!("divfolio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RemoteError::Transport {
                collection: "client",
                source,
            })?;
        Ok(Self {
            client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            bearer: cfg
                .access_token
                .clone()
                .unwrap_or_else(|| cfg.api_key.clone()),
        })
    }

    fn endpoint(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn check(
        table: Table,
        resp: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(RemoteError::Status {
            collection: table.name(),
            status: status.as_u16(),
            body,
        })
    }
}

impl RemoteStore for HttpRemoteStore {
    fn select(&self, table: Table, user_id: &str) -> Result<Vec<Value>, RemoteError> {
        let transport = |source| RemoteError::Transport {
            collection: table.name(),
            source,
        };
        let resp = self
            .client
            .get(self.endpoint(table))
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
            .send()
            .map_err(transport)?;
        let resp = Self::check(table, resp)?;
        resp.json::<Vec<Value>>().map_err(|e| RemoteError::Decode {
            collection: table.name(),
            message: e.to_string(),
        })
    }

    fn upsert(&self, table: Table, row: Value) -> Result<(), RemoteError> {
        let resp = self
            .client
            .post(self.endpoint(table))
            .query(&[("on_conflict", table.conflict_key())])
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(&self.bearer)
            .json(&row)
            .send()
            .map_err(|source| RemoteError::Transport {
                collection: table.name(),
                source,
            })?;
        Self::check(table, resp)?;
        Ok(())
    }
}
