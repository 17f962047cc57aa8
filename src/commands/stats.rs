use chrono::NaiveDate;

use crate::analytics::{aggregate, month_summary, DerivedView, MonthSummary};
use crate::db::JournalStore;
use crate::error::Result;

/// Analytics page data for one user, computed from their complete trade set.
pub fn get_analytics(store: &impl JournalStore, user_id: &str) -> Result<DerivedView> {
    let trades = store.list_trades(user_id)?;

    let invalid = trades.iter().filter(|t| !t.pnl.is_finite()).count();
    if invalid > 0 {
        log::warn!("{} trades of {} have a non-finite P/L and are left out of P/L stats", invalid, user_id);
    }

    let view = aggregate(&trades);
    log::debug!(
        "Aggregated {} trades for {}: total P/L {:.2}, win rate {:.2}%",
        view.total_trades,
        user_id,
        view.total_pnl,
        view.win_rate
    );

    Ok(view)
}

/// Calendar dashboard for `year`-`month`; `today` picks the "this week" figure.
pub fn get_month_summary(
    store: &impl JournalStore,
    user_id: &str,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<MonthSummary> {
    let trades = store.list_trades(user_id)?;
    month_summary(&trades, year, month, today)
}
