use crate::models::PortfolioSummary;

use super::ProjectScheduleResult;

/// Totals over scheduled projects. `failed` counts projects excluded from the
/// schedule; it is reported on its own and not part of `total_projects`.
pub fn summarize(results: &[ProjectScheduleResult], failed: usize) -> PortfolioSummary {
    let delays: Vec<i64> = results
        .iter()
        .filter(|r| !r.on_time)
        .map(|r| r.delay_days)
        .collect();
    let average_delay = if delays.is_empty() {
        0.0
    } else {
        delays.iter().sum::<i64>() as f64 / delays.len() as f64
    };

    PortfolioSummary {
        total_projects: results.len(),
        on_time_projects: results.len() - delays.len(),
        delayed_projects: delays.len(),
        average_delay,
        failed_projects: failed,
    }
}
