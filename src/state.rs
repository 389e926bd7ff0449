use crate::domain::{Account, Holding, MonthlyAmounts, SimulatorSettings};
use crate::error::ImportError;
use crate::history::{History, UpsertOutcome};
use crate::ledger::{HoldingPatch, Ledger};
use crate::projection::MAX_PROJECTION_YEARS;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Everything the app keeps in memory. This is also the local snapshot shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub portfolio: Ledger,
    pub sim_settings: SimulatorSettings,
    #[serde(default)]
    pub history: History,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportPayload<'a> {
    portfolio: &'a Ledger,
    sim_settings: &'a SimulatorSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub conservative: Option<f64>,
    pub moderate: Option<f64>,
    pub aggressive: Option<f64>,
    pub monthly_contribution: Option<f64>,
    pub start_year: Option<i32>,
    pub start_month: Option<u32>,
    pub end_year: Option<i32>,
    pub birth_year: Option<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddHolding(Holding),
    UpdateHolding { id: String, patch: HoldingPatch },
    RemoveHolding { id: String },
    SetDividend { id: String, year: i32, month: u32, amount: f64 },
    SetYearDividends { id: String, year: i32, months: MonthlyAmounts },
    UpdateSettings(SettingsPatch),
    AddAccount(Account),
    RenameAccount { id: String, name: String },
    SetAccountBalance { id: String, balance: f64 },
    RemoveAccount { id: String },
    UpsertHistory { date: String, value: f64 },
    UpsertAccountValue { date: String, account_id: String, value: f64 },
    RemoveHistory { date: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Changed,
    NotFound,
    Rejected(String),
}

impl Outcome {
    fn from_found(found: bool) -> Self {
        if found {
            Outcome::Changed
        } else {
            Outcome::NotFound
        }
    }
}

/// Produces the next state for `command`. The input state is never modified;
/// callers swap in the returned state as a whole.
pub fn apply(state: &AppState, command: Command) -> (AppState, Outcome) {
    let mut next = state.clone();
    debug!(?command, "applying command");
    let outcome = match command {
        Command::AddHolding(holding) => {
            next.portfolio.add(holding);
            Outcome::Changed
        }
        Command::UpdateHolding { id, patch } => {
            Outcome::from_found(next.portfolio.update(&id, &patch))
        }
        Command::RemoveHolding { id } => Outcome::from_found(next.portfolio.remove(&id)),
        Command::SetDividend {
            id,
            year,
            month,
            amount,
        } => {
            if !(1..=12).contains(&month) {
                Outcome::Rejected(format!("month {month} is outside 1..=12"))
            } else {
                Outcome::from_found(next.portfolio.set_dividend(&id, year, month, amount))
            }
        }
        Command::SetYearDividends { id, year, months } => {
            Outcome::from_found(next.portfolio.set_year_dividends(&id, year, months))
        }
        Command::UpdateSettings(patch) => apply_settings_patch(&mut next.sim_settings, patch),
        Command::AddAccount(account) => {
            if next.sim_settings.account_by_name(&account.name).is_some() {
                Outcome::Rejected(format!("account '{}' already exists", account.name))
            } else {
                next.sim_settings.accounts.push(account);
                Outcome::Changed
            }
        }
        Command::RenameAccount { id, name } => {
            let taken = next
                .sim_settings
                .account_by_name(&name)
                .is_some_and(|a| a.id != id);
            if taken {
                Outcome::Rejected(format!("account '{name}' already exists"))
            } else {
                match next.sim_settings.accounts.iter_mut().find(|a| a.id == id) {
                    Some(account) => {
                        account.name = name;
                        Outcome::Changed
                    }
                    None => Outcome::NotFound,
                }
            }
        }
        Command::SetAccountBalance { id, balance } => {
            match next.sim_settings.accounts.iter_mut().find(|a| a.id == id) {
                Some(account) => {
                    account.balance = balance;
                    Outcome::Changed
                }
                None => Outcome::NotFound,
            }
        }
        Command::RemoveAccount { id } => {
            let before = next.sim_settings.accounts.len();
            next.sim_settings.accounts.retain(|a| a.id != id);
            Outcome::from_found(next.sim_settings.accounts.len() != before)
        }
        Command::UpsertHistory { date, value } => match next.history.upsert(&date, value) {
            UpsertOutcome::DerivedFromAccounts => {
                warn!(%date, "ignoring direct value for account-derived history point");
                Outcome::Rejected(format!(
                    "{date} is the sum of its account values; set those instead"
                ))
            }
            UpsertOutcome::Inserted | UpsertOutcome::Updated => Outcome::Changed,
        },
        Command::UpsertAccountValue {
            date,
            account_id,
            value,
        } => {
            next.history.upsert_account_value(&date, &account_id, value);
            Outcome::Changed
        }
        Command::RemoveHistory { date } => Outcome::from_found(next.history.remove(&date)),
    };

    if outcome == Outcome::Changed {
        (next, outcome)
    } else {
        (state.clone(), outcome)
    }
}

fn apply_settings_patch(settings: &mut SimulatorSettings, patch: SettingsPatch) -> Outcome {
    let start_month = patch.start_month.unwrap_or(settings.start_month);
    if !(1..=12).contains(&start_month) {
        return Outcome::Rejected(format!("start month {start_month} is outside 1..=12"));
    }

    // Whole-record replacement: build the new settings, then swap.
    let mut updated = settings.clone();
    if let Some(v) = patch.conservative {
        updated.scenarios.conservative = v;
    }
    if let Some(v) = patch.moderate {
        updated.scenarios.moderate = v;
    }
    if let Some(v) = patch.aggressive {
        updated.scenarios.aggressive = v;
    }
    if let Some(v) = patch.monthly_contribution {
        updated.monthly_contribution = v;
    }
    if let Some(v) = patch.start_year {
        updated.start_year = v;
    }
    updated.start_month = start_month;
    if let Some(v) = patch.end_year {
        updated.end_year = v;
    }
    if let Some(v) = patch.birth_year {
        updated.birth_year = v;
    }
    let span = i64::from(updated.end_year) - i64::from(updated.start_year);
    if span >= i64::from(MAX_PROJECTION_YEARS) {
        return Outcome::Rejected(format!(
            "projection from {} to {} exceeds {MAX_PROJECTION_YEARS} years",
            updated.start_year, updated.end_year
        ));
    }
    *settings = updated;
    Outcome::Changed
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            portfolio: Ledger::default(),
            sim_settings: SimulatorSettings::default(),
            history: History::default(),
        }
    }

    /// Sample-mode state shown before the user has data of their own.
    pub fn sample() -> Self {
        Self {
            portfolio: Ledger::new(sample_portfolio()),
            ..Self::empty()
        }
    }

    /// Pretty JSON of portfolio and simulator settings. History is not exported.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ExportPayload {
            portfolio: &self.portfolio,
            sim_settings: &self.sim_settings,
        })
    }

    /// Replaces portfolio and settings from an export payload. A malformed
    /// payload leaves the state untouched. Holdings that only carry the legacy
    /// monthly array get it filed under `current_year`.
    pub fn import_json(&mut self, raw: &str, current_year: i32) -> Result<(), ImportError> {
        let (mut portfolio, sim_settings) = parse_import(raw).inspect_err(|err| {
            warn!(error = %err, "import ignored");
        })?;
        let adopted = portfolio.adopt_legacy_months(current_year);
        if adopted > 0 {
            debug!(adopted, current_year, "legacy monthly dividends filed under current year");
        }
        self.portfolio = portfolio;
        self.sim_settings = sim_settings;
        Ok(())
    }
}

fn parse_import(raw: &str) -> Result<(Ledger, SimulatorSettings), ImportError> {
    let mut value: serde_json::Value = serde_json::from_str(raw)?;
    let portfolio = take_key(&mut value, "portfolio")?;
    let settings = take_key(&mut value, "simSettings")?;
    Ok((
        serde_json::from_value(portfolio)?,
        serde_json::from_value(settings)?,
    ))
}

fn take_key(value: &mut serde_json::Value, key: &'static str) -> Result<serde_json::Value, ImportError> {
    match value.get_mut(key).map(serde_json::Value::take) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(ImportError::MissingKey(key)),
    }
}

fn sample_holding(
    n: u32,
    name: &str,
    quantity: f64,
    price: f64,
    dividend_yield: f64,
    day: u8,
    sector: &str,
    years: [MonthlyAmounts; 3],
) -> Holding {
    let mut yearly_dividends = std::collections::BTreeMap::new();
    for (year, months) in (2023..).zip(years) {
        yearly_dividends.insert(year, months);
    }
    Holding {
        id: format!("sample-{n}"),
        name: name.to_string(),
        ticker: "SAMPLE".to_string(),
        quantity,
        current_price: price,
        dividend_yield,
        dividend_day: Some(day),
        sector: Some(sector.to_string()),
        monthly_dividends: years[2],
        yearly_dividends,
    }
}

fn sample_portfolio() -> Vec<Holding> {
    vec![
        sample_holding(1, "SAMPLE Global Dividend ETF", 100.0, 12_500.0, 8.5, 15, "ETF", [
            [350e3, 320e3, 380e3, 360e3, 340e3, 370e3, 330e3, 380e3, 390e3, 360e3, 350e3, 380e3],
            [380e3, 350e3, 410e3, 390e3, 370e3, 400e3, 360e3, 410e3, 420e3, 390e3, 380e3, 410e3],
            [420e3, 380e3, 450e3, 390e3, 410e3, 430e3, 400e3, 440e3, 460e3, 420e3, 410e3, 450e3],
        ]),
        sample_holding(2, "SAMPLE US Dividend Aristocrats", 80.0, 15_000.0, 7.2, 10, "Dividend Aristocrats", [
            [240e3, 280e3, 270e3, 250e3, 290e3, 260e3, 300e3, 270e3, 250e3, 280e3, 290e3, 260e3],
            [260e3, 300e3, 290e3, 270e3, 310e3, 280e3, 320e3, 290e3, 270e3, 300e3, 310e3, 280e3],
            [280e3, 320e3, 310e3, 290e3, 330e3, 300e3, 340e3, 310e3, 290e3, 320e3, 330e3, 300e3],
        ]),
        sample_holding(3, "SAMPLE High Dividend Equity", 120.0, 10_000.0, 9.8, 5, "High Dividend", [
            [400e3, 370e3, 410e3, 390e3, 420e3, 380e3, 400e3, 410e3, 390e3, 370e3, 400e3, 420e3],
            [440e3, 410e3, 450e3, 430e3, 460e3, 420e3, 440e3, 450e3, 430e3, 410e3, 440e3, 460e3],
            [480e3, 450e3, 490e3, 470e3, 500e3, 460e3, 480e3, 490e3, 470e3, 450e3, 480e3, 500e3],
        ]),
        sample_holding(4, "SAMPLE Monthly Income Fund", 150.0, 8_000.0, 10.5, 20, "Fund", [
            [280e3, 300e3, 290e3, 310e3, 280e3, 320e3, 300e3, 290e3, 310e3, 280e3, 300e3, 320e3],
            [315e3, 335e3, 325e3, 345e3, 315e3, 355e3, 335e3, 325e3, 345e3, 315e3, 335e3, 355e3],
            [350e3, 370e3, 360e3, 380e3, 350e3, 390e3, 370e3, 360e3, 380e3, 350e3, 370e3, 390e3],
        ]),
        sample_holding(5, "SAMPLE REITs ETF", 90.0, 13_000.0, 8.0, 25, "REITs", [
            [340e3, 360e3, 330e3, 370e3, 350e3, 340e3, 380e3, 360e3, 350e3, 330e3, 360e3, 370e3],
            [375e3, 395e3, 365e3, 405e3, 385e3, 375e3, 415e3, 395e3, 385e3, 365e3, 395e3, 405e3],
            [410e3, 430e3, 400e3, 440e3, 420e3, 410e3, 450e3, 430e3, 420e3, 400e3, 430e3, 440e3],
        ]),
        sample_holding(6, "SAMPLE Balanced Bond Mix", 110.0, 11_000.0, 7.5, 12, "Mixed", [
            [250e3, 280e3, 260e3, 290e3, 270e3, 280e3, 260e3, 250e3, 290e3, 270e3, 260e3, 280e3],
            [275e3, 305e3, 285e3, 315e3, 295e3, 305e3, 285e3, 275e3, 315e3, 295e3, 285e3, 305e3],
            [300e3, 330e3, 310e3, 340e3, 320e3, 330e3, 310e3, 300e3, 340e3, 320e3, 310e3, 330e3],
        ]),
        sample_holding(7, "SAMPLE Covered Call", 70.0, 16_000.0, 12.0, 8, "Covered Call", [
            [380e3, 410e3, 390e3, 400e3, 420e3, 380e3, 410e3, 390e3, 400e3, 420e3, 390e3, 410e3],
            [420e3, 450e3, 430e3, 440e3, 460e3, 420e3, 450e3, 430e3, 440e3, 460e3, 430e3, 450e3],
            [460e3, 490e3, 470e3, 480e3, 500e3, 460e3, 490e3, 470e3, 480e3, 500e3, 470e3, 490e3],
        ]),
    ]
}
