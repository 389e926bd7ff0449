use crate::domain::{Holding, MonthlyAmounts, ZERO_MONTHS, month_index};
use std::cmp::Ordering;

pub const DEFAULT_TOP_N: usize = 10;

pub fn annual_dividend(holding: &Holding, year: i32) -> f64 {
    holding.dividends_for(year).iter().sum()
}

pub fn total_annual_dividend(holdings: &[Holding], year: i32) -> f64 {
    holdings.iter().map(|h| annual_dividend(h, year)).sum()
}

pub fn total_portfolio_value(holdings: &[Holding]) -> f64 {
    holdings.iter().map(Holding::position_value).sum()
}

/// `part / whole * 100`, or 0 when the whole is zero.
fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

pub fn realized_yield(holdings: &[Holding], year: i32) -> f64 {
    percent_of(
        total_annual_dividend(holdings, year),
        total_portfolio_value(holdings),
    )
}

pub fn monthly_distribution(holdings: &[Holding], year: i32) -> MonthlyAmounts {
    let mut out = ZERO_MONTHS;
    for h in holdings {
        for (slot, amount) in out.iter_mut().zip(h.dividends_for(year)) {
            *slot += amount;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub year: i32,
    pub total_value: f64,
    pub annual_dividend: f64,
    pub yield_rate: f64,
    pub monthly: MonthlyAmounts,
}

pub fn summarize(holdings: &[Holding], year: i32) -> PortfolioSummary {
    let total_value = total_portfolio_value(holdings);
    let annual_dividend = total_annual_dividend(holdings, year);
    PortfolioSummary {
        year,
        total_value,
        annual_dividend,
        yield_rate: percent_of(annual_dividend, total_value),
        monthly: monthly_distribution(holdings, year),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthTotal {
    pub year: i32,
    pub month: u32,
    pub total: f64,
}

/// The twelve calendar months ending with `(year, month)`, oldest first.
/// Each month reads its own calendar year's data.
pub fn trailing_twelve_months(holdings: &[Holding], year: i32, month: u32) -> Vec<MonthTotal> {
    let Some(end_idx) = month_index(month) else {
        return Vec::new();
    };
    let end = year * 12 + end_idx as i32;
    ((end - 11)..=end)
        .map(|ordinal| {
            let y = ordinal.div_euclid(12);
            let m = ordinal.rem_euclid(12) as u32 + 1;
            let total = holdings.iter().map(|h| h.dividend_at(y, m)).sum();
            MonthTotal {
                year: y,
                month: m,
                total,
            }
        })
        .collect()
}

/// Growth of each value over its predecessor, in percent. The first entry, and
/// any entry whose predecessor is zero, has no growth value.
pub fn year_over_year_growth(totals: &[f64]) -> Vec<Option<f64>> {
    totals
        .iter()
        .enumerate()
        .map(|(i, &cur)| {
            if i == 0 {
                return None;
            }
            let prev = totals[i - 1];
            if prev == 0.0 {
                None
            } else {
                Some((cur - prev) / prev * 100.0)
            }
        })
        .collect()
}

pub fn cumulative(totals: &[f64]) -> Vec<f64> {
    totals
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearStat {
    pub year: i32,
    pub total_dividend: f64,
    pub total_asset: f64,
    pub yield_rate: f64,
    pub cumulative: f64,
    pub growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyReport {
    pub rows: Vec<YearStat>,
    pub average_dividend: f64,
    pub average_yield: f64,
}

/// Per-year totals over every year any holding has data for.
///
/// Asset value uses current positions for every year.
pub fn yearly_report(holdings: &[Holding], years: &[i32]) -> YearlyReport {
    let total_asset = total_portfolio_value(holdings);
    let totals: Vec<f64> = years
        .iter()
        .map(|&y| total_annual_dividend(holdings, y))
        .collect();
    let growth = year_over_year_growth(&totals);
    let running = cumulative(&totals);

    let rows: Vec<YearStat> = years
        .iter()
        .enumerate()
        .map(|(i, &year)| YearStat {
            year,
            total_dividend: totals[i],
            total_asset,
            yield_rate: percent_of(totals[i], total_asset),
            cumulative: running[i],
            growth: growth[i],
        })
        .collect();

    let (average_dividend, average_yield) = if rows.is_empty() {
        (0.0, 0.0)
    } else {
        let n = rows.len() as f64;
        (
            rows.iter().map(|r| r.total_dividend).sum::<f64>() / n,
            rows.iter().map(|r| r.yield_rate).sum::<f64>() / n,
        )
    };

    YearlyReport {
        rows,
        average_dividend,
        average_yield,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Dividend(i32),
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a> {
    pub rank: usize,
    pub holding: &'a Holding,
    pub metric: f64,
    /// Share of the metric's total across all holdings, in percent.
    pub share: f64,
}

/// Highest metric first; equal metrics keep collection order.
pub fn top_n(holdings: &[Holding], by: RankBy, n: usize) -> Vec<Ranked<'_>> {
    let metric = |h: &Holding| match by {
        RankBy::Dividend(year) => annual_dividend(h, year),
        RankBy::Value => h.position_value(),
    };

    let mut scored: Vec<(&Holding, f64)> = holdings.iter().map(|h| (h, metric(h))).collect();
    let total: f64 = scored.iter().map(|(_, m)| m).sum();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (holding, metric))| Ranked {
            rank: i + 1,
            holding,
            metric,
            share: percent_of(metric, total),
        })
        .collect()
}
