use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const MONTHS_PER_YEAR: usize = 12;

/// January..December cash amounts for one calendar year.
pub type MonthlyAmounts = [f64; MONTHS_PER_YEAR];

pub const ZERO_MONTHS: MonthlyAmounts = [0.0; MONTHS_PER_YEAR];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub current_price: f64,
    /// Nominal yield in percent. Informational only; realized yield is derived.
    #[serde(default)]
    pub dividend_yield: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_day: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    /// Legacy single-year array. `yearly_dividends` is authoritative once it
    /// has any year; see [`Holding::adopt_legacy_months`].
    #[serde(default = "zero_months", deserialize_with = "de_months")]
    pub monthly_dividends: MonthlyAmounts,

    #[serde(default, deserialize_with = "de_yearly")]
    pub yearly_dividends: BTreeMap<i32, MonthlyAmounts>,
}

impl Holding {
    pub fn new(name: impl Into<String>, year: i32) -> Self {
        let mut yearly_dividends = BTreeMap::new();
        yearly_dividends.insert(year, ZERO_MONTHS);
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            ticker: String::new(),
            quantity: 0.0,
            current_price: 0.0,
            dividend_yield: 0.0,
            dividend_day: Some(1),
            sector: None,
            monthly_dividends: ZERO_MONTHS,
            yearly_dividends,
        }
    }

    /// Dividends for `year`; a year without data is all zeros.
    pub fn dividends_for(&self, year: i32) -> MonthlyAmounts {
        self.yearly_dividends
            .get(&year)
            .copied()
            .unwrap_or(ZERO_MONTHS)
    }

    /// Dividend for a single month (`month` is 1-based).
    pub fn dividend_at(&self, year: i32, month: u32) -> f64 {
        match month_index(month) {
            Some(idx) => self.dividends_for(year)[idx],
            None => 0.0,
        }
    }

    pub fn position_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Files `monthly_dividends` under `year` when the holding has no yearly
    /// data at all. Returns whether anything was adopted.
    pub fn adopt_legacy_months(&mut self, year: i32) -> bool {
        if !self.yearly_dividends.is_empty() || self.monthly_dividends == ZERO_MONTHS {
            return false;
        }
        self.yearly_dividends.insert(year, self.monthly_dividends);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default = "new_account_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub balance: f64,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: f64) -> Self {
        Self {
            id: new_account_id(),
            name: name.into(),
            balance,
        }
    }
}

fn new_account_id() -> String {
    Uuid::new_v4().to_string()
}

/// Annual return assumptions, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scenarios {
    pub conservative: f64,
    pub moderate: f64,
    pub aggressive: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorSettings {
    pub scenarios: Scenarios,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub monthly_contribution: f64,
    pub start_year: i32,
    #[serde(default = "default_start_month")]
    pub start_month: u32,
    pub end_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
}

fn default_start_month() -> u32 {
    1
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            scenarios: Scenarios {
                conservative: 5.0,
                moderate: 8.0,
                aggressive: 12.0,
            },
            accounts: [
                "Hantu IRP",
                "NAMU IRP",
                "ISA",
                "Personal Pension",
                "General Account",
            ]
            .iter()
            .enumerate()
            .map(|(i, name)| Account {
                id: format!("account-{}", i + 1),
                name: name.to_string(),
                balance: 0.0,
            })
            .collect(),
            monthly_contribution: 1_000_000.0,
            start_year: 2025,
            start_month: 1,
            end_year: 2050,
            birth_year: None,
        }
    }
}

impl SimulatorSettings {
    /// Projection starting capital: the sum of all account balances.
    pub fn starting_balance(&self) -> f64 {
        self.accounts.iter().map(|a| a.balance).sum()
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Resolves either an account id or an exact account name.
    pub fn resolve_account(&self, id_or_name: &str) -> Option<&Account> {
        self.account(id_or_name)
            .or_else(|| self.account_by_name(id_or_name))
    }

    pub fn age_in(&self, year: i32) -> Option<i32> {
        self.birth_year.map(|b| year - b)
    }
}

/// One calendar-month observation of actual net worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    /// `YYYY-MM`, zero-padded.
    pub date: String,
    pub value: f64,
    /// Per-account values keyed by account id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub account_values: BTreeMap<String, f64>,
}

impl HistoryPoint {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
            account_values: BTreeMap::new(),
        }
    }

    pub fn is_account_derived(&self) -> bool {
        !self.account_values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDataPoint {
    pub date: String,
    pub month_label: String,
    pub year: i32,
    pub month: u32,
    pub conservative: f64,
    pub moderate: f64,
    pub aggressive: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    pub invested_capital: f64,
}

pub fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

pub fn month_label(year: i32, month: u32) -> String {
    format!("{year:04}.{month:02}")
}

/// Parses `YYYY-MM` (month may be one or two digits) into `(year, month)`.
pub fn parse_month_key(raw: &str) -> Option<(i32, u32)> {
    let (y, m) = raw.trim().split_once('-')?;
    if y.len() != 4 || m.is_empty() || m.len() > 2 {
        return None;
    }
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

/// Zero-based array index for a 1-based month.
pub fn month_index(month: u32) -> Option<usize> {
    if (1..=12).contains(&month) {
        Some(month as usize - 1)
    } else {
        None
    }
}

fn zero_months() -> MonthlyAmounts {
    ZERO_MONTHS
}

/// Pads or truncates to exactly twelve entries; `null` reads as zero.
fn normalize_months(raw: Vec<Option<f64>>) -> MonthlyAmounts {
    let mut out = ZERO_MONTHS;
    for (slot, v) in out.iter_mut().zip(raw) {
        *slot = v.unwrap_or(0.0);
    }
    out
}

fn de_months<'de, D>(deserializer: D) -> Result<MonthlyAmounts, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<f64>>>::deserialize(deserializer)?;
    Ok(raw.map(normalize_months).unwrap_or(ZERO_MONTHS))
}

fn de_yearly<'de, D>(deserializer: D) -> Result<BTreeMap<i32, MonthlyAmounts>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<i32, Vec<Option<f64>>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(year, months)| (year, normalize_months(months)))
        .collect())
}
