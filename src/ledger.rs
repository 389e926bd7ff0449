use crate::domain::{Holding, MonthlyAmounts, ZERO_MONTHS, month_index};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Scalar field changes for one holding. Nested dividend data is changed
/// through [`Ledger::set_dividend`] and [`Ledger::set_year_dividends`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingPatch {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub quantity: Option<f64>,
    pub current_price: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub dividend_day: Option<Option<u8>>,
    pub sector: Option<Option<String>>,
}

impl HoldingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply_to(&self, h: &mut Holding) {
        if let Some(v) = &self.name {
            h.name = v.clone();
        }
        if let Some(v) = &self.ticker {
            h.ticker = v.clone();
        }
        if let Some(v) = self.quantity {
            h.quantity = v;
        }
        if let Some(v) = self.current_price {
            h.current_price = v;
        }
        if let Some(v) = self.dividend_yield {
            h.dividend_yield = v;
        }
        if let Some(v) = self.dividend_day {
            h.dividend_day = v;
        }
        if let Some(v) = &self.sector {
            h.sector = v.clone();
        }
    }
}

/// Ordered collection of holdings. Collection order is the tie-break order for rankings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    holdings: Vec<Holding>,
}

impl Ledger {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.id == id)
    }

    /// Exact id match, else the single holding whose id starts with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<&Holding> {
        if let Some(h) = self.get(prefix) {
            return Some(h);
        }
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self.holdings.iter().filter(|h| h.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(h), None) => Some(h),
            _ => None,
        }
    }

    pub fn add(&mut self, holding: Holding) {
        self.holdings.push(holding);
    }

    pub fn update(&mut self, id: &str, patch: &HoldingPatch) -> bool {
        match self.holdings.iter_mut().find(|h| h.id == id) {
            Some(h) => {
                patch.apply_to(h);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.holdings.len();
        self.holdings.retain(|h| h.id != id);
        self.holdings.len() != before
    }

    /// Writes one (year, month) cell, creating the year as zeros when absent.
    pub fn set_dividend(&mut self, id: &str, year: i32, month: u32, amount: f64) -> bool {
        let Some(idx) = month_index(month) else {
            return false;
        };
        let Some(h) = self.holdings.iter_mut().find(|h| h.id == id) else {
            return false;
        };
        let mut yearly = h.yearly_dividends.clone();
        let mut months = yearly.get(&year).copied().unwrap_or(ZERO_MONTHS);
        months[idx] = amount;
        yearly.insert(year, months);
        h.yearly_dividends = yearly;
        true
    }

    pub fn set_year_dividends(&mut self, id: &str, year: i32, months: MonthlyAmounts) -> bool {
        match self.holdings.iter_mut().find(|h| h.id == id) {
            Some(h) => {
                h.yearly_dividends.insert(year, months);
                true
            }
            None => false,
        }
    }

    /// Moves legacy single-year arrays into `year` for holdings without
    /// yearly data. Returns how many holdings were changed.
    pub fn adopt_legacy_months(&mut self, year: i32) -> usize {
        self.holdings
            .iter_mut()
            .map(|h| h.adopt_legacy_months(year))
            .filter(|&adopted| adopted)
            .count()
    }

    /// Every year with data on any holding, ascending.
    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self
            .holdings
            .iter()
            .flat_map(|h| h.yearly_dividends.keys().copied())
            .collect();
        years.into_iter().collect()
    }
}
