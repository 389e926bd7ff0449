use crate::domain::{HistoryPoint, Scenarios, SimulationDataPoint, month_key, month_label};
use std::collections::HashMap;

/// Longest projection in years, counting the start year.
pub const MAX_PROJECTION_YEARS: i32 = 150;

/// Converts an annual percentage rate into the equivalent monthly compounding rate.
pub fn monthly_rate(annual_percent: f64) -> f64 {
    (1.0 + annual_percent / 100.0).powf(1.0 / 12.0) - 1.0
}

/// Projects balances month by month from `(start_year, start_month)` through
/// December of `end_year`, merging actual observations from `history`. The
/// range stops after [`MAX_PROJECTION_YEARS`] calendar years.
///
/// Each point carries the balances before that month's contribution and growth
/// are applied, so the first point always shows `start_balance`.
pub fn generate(
    start_balance: f64,
    monthly_contribution: f64,
    scenarios: Scenarios,
    history: &[HistoryPoint],
    start_year: i32,
    end_year: i32,
    start_month: u32,
) -> Vec<SimulationDataPoint> {
    let mut out = Vec::new();
    if !(1..=12).contains(&start_month) || start_year > end_year {
        return out;
    }

    let c_rate = monthly_rate(scenarios.conservative);
    let m_rate = monthly_rate(scenarios.moderate);
    let a_rate = monthly_rate(scenarios.aggressive);

    let actuals: HashMap<&str, f64> = history
        .iter()
        .map(|h| (h.date.as_str(), h.value))
        .collect();

    let mut c_bal = start_balance;
    let mut m_bal = start_balance;
    let mut a_bal = start_balance;
    let mut invested = start_balance;

    let last_year = end_year.min(start_year.saturating_add(MAX_PROJECTION_YEARS - 1));
    let first = i64::from(start_year) * 12 + i64::from(start_month - 1);
    let last = i64::from(last_year) * 12 + 11;
    for ordinal in first..=last {
        // Both bounds come from i32 years, so the quotient fits.
        let year = ordinal.div_euclid(12) as i32;
        let month = ordinal.rem_euclid(12) as u32 + 1;
        let date = month_key(year, month);
        let actual = actuals.get(date.as_str()).copied();

        out.push(SimulationDataPoint {
            month_label: month_label(year, month),
            date,
            year,
            month,
            conservative: c_bal,
            moderate: m_bal,
            aggressive: a_bal,
            actual,
            invested_capital: invested,
        });

        c_bal = (c_bal + monthly_contribution) * (1.0 + c_rate);
        m_bal = (m_bal + monthly_contribution) * (1.0 + m_rate);
        a_bal = (a_bal + monthly_contribution) * (1.0 + a_rate);
        invested += monthly_contribution;
    }

    out
}

/// Keeps each December plus the final point of a series.
pub fn year_end_points(points: &[SimulationDataPoint]) -> Vec<&SimulationDataPoint> {
    let last = points.len().saturating_sub(1);
    points
        .iter()
        .enumerate()
        .filter(|(i, p)| p.month == 12 || *i == last)
        .map(|(_, p)| p)
        .collect()
}
