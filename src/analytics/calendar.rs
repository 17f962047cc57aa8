use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{JournalError, Result};
use crate::models::Trade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub pnl: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week: u32, // row of the Sunday-first month grid, starting at 1
    pub pnl: f64,
    pub trade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub daily: Vec<DailySummary>,
    pub weekly: Vec<WeeklySummary>,
    pub monthly_pnl: f64,
    pub current_week_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayJournal {
    pub date: NaiveDate,
    pub trades: Vec<Trade>,
    pub total_pnl: f64,
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| JournalError::Validation(format!("Invalid month: {}-{:02}", year, month)))
}

/// Every calendar day of the month, in order.
pub fn month_grid(year: i32, month: u32) -> Result<Vec<NaiveDate>> {
    let first = first_of_month(year, month)?;
    Ok(first.iter_days().take_while(|d| d.month() == month).collect())
}

fn week_of_month(date: NaiveDate, first_weekday_offset: u32) -> u32 {
    (date.day() - 1 + first_weekday_offset) / 7 + 1
}

/// Calendar dashboard numbers for one month.
///
/// `today` decides `current_week_pnl`: it is only filled in when today falls
/// inside the viewed month.
pub fn month_summary(trades: &[Trade], year: i32, month: u32, today: NaiveDate) -> Result<MonthSummary> {
    let first = first_of_month(year, month)?;
    let offset = first.weekday().num_days_from_sunday();

    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for trade in trades
        .iter()
        .filter(|t| t.date.year() == year && t.date.month() == month && t.pnl.is_finite())
    {
        let entry = by_day.entry(trade.date).or_insert((0.0, 0));
        entry.0 += trade.pnl;
        entry.1 += 1;
    }

    let daily: Vec<DailySummary> = by_day
        .into_iter()
        .map(|(date, (pnl, trade_count))| DailySummary { date, pnl, trade_count })
        .collect();

    let mut by_week: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for day in &daily {
        let entry = by_week.entry(week_of_month(day.date, offset)).or_insert((0.0, 0));
        entry.0 += day.pnl;
        entry.1 += day.trade_count;
    }

    let weekly: Vec<WeeklySummary> = by_week
        .into_iter()
        .map(|(week, (pnl, trade_count))| WeeklySummary { week, pnl, trade_count })
        .collect();

    let monthly_pnl = daily.iter().map(|d| d.pnl).sum();

    let current_week_pnl = if today.year() == year && today.month() == month {
        let current_week = week_of_month(today, offset);
        weekly
            .iter()
            .find(|w| w.week == current_week)
            .map(|w| w.pnl)
            .unwrap_or(0.0)
    } else {
        0.0
    };

    Ok(MonthSummary {
        year,
        month,
        daily,
        weekly,
        monthly_pnl,
        current_week_pnl,
    })
}

/// Trades logged on `date`, biggest winner first.
pub fn day_journal(trades: &[Trade], date: NaiveDate) -> DayJournal {
    let mut day_trades: Vec<Trade> = trades.iter().filter(|t| t.date == date).cloned().collect();
    day_trades.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));

    let total_pnl = day_trades.iter().map(|t| t.pnl).filter(|p| p.is_finite()).sum();

    DayJournal {
        date,
        trades: day_trades,
        total_pnl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn trade(id: &str, day: &str, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            user_id: "USER-1".to_string(),
            date: date(day),
            time: None,
            symbol: "NQ".to_string(),
            pnl,
            direction: None,
            position_size: None,
            position_unit: None,
            notes: String::new(),
            screenshot: None,
            entry_model_id: None,
            entry_model_data: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn march_trades() -> Vec<Trade> {
        // March 2024 starts on a Friday
        vec![
            trade("t1", "2024-03-01", 100.0),
            trade("t2", "2024-03-02", -40.0),
            trade("t3", "2024-03-03", 250.0),
            trade("t4", "2024-03-03", -50.0),
            trade("t5", "2024-03-11", 30.0),
            trade("t6", "2024-02-29", 999.0),
            trade("t7", "2025-03-03", 999.0),
        ]
    }

    #[test]
    fn test_month_summary_daily_and_monthly() {
        let summary = month_summary(&march_trades(), 2024, 3, date("2024-05-01")).unwrap();

        assert_eq!(
            summary.daily,
            vec![
                DailySummary { date: date("2024-03-01"), pnl: 100.0, trade_count: 1 },
                DailySummary { date: date("2024-03-02"), pnl: -40.0, trade_count: 1 },
                DailySummary { date: date("2024-03-03"), pnl: 200.0, trade_count: 2 },
                DailySummary { date: date("2024-03-11"), pnl: 30.0, trade_count: 1 },
            ]
        );
        assert_eq!(summary.monthly_pnl, 290.0);
        assert_eq!(summary.current_week_pnl, 0.0, "today is outside the viewed month");
    }

    #[test]
    fn test_weeks_follow_sunday_first_grid() {
        let summary = month_summary(&march_trades(), 2024, 3, date("2024-05-01")).unwrap();

        assert_eq!(
            summary.weekly,
            vec![
                WeeklySummary { week: 1, pnl: 60.0, trade_count: 2 },
                WeeklySummary { week: 2, pnl: 200.0, trade_count: 2 },
                WeeklySummary { week: 3, pnl: 30.0, trade_count: 1 },
            ]
        );
    }

    #[test]
    fn test_current_week_pnl_when_viewing_this_month() {
        let summary = month_summary(&march_trades(), 2024, 3, date("2024-03-06")).unwrap();
        assert_eq!(summary.current_week_pnl, 200.0);

        let quiet_week = month_summary(&march_trades(), 2024, 3, date("2024-03-20")).unwrap();
        assert_eq!(quiet_week.current_week_pnl, 0.0);
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        let result = month_summary(&[], 2024, 13, date("2024-03-06"));
        assert!(matches!(result, Err(JournalError::Validation(_))));
        assert!(month_grid(2024, 0).is_err());
    }

    #[test]
    fn test_month_grid_lengths() {
        assert_eq!(month_grid(2024, 2).unwrap().len(), 29);
        assert_eq!(month_grid(2023, 2).unwrap().len(), 28);
        let december = month_grid(2024, 12).unwrap();
        assert_eq!(december.first(), Some(&date("2024-12-01")));
        assert_eq!(december.last(), Some(&date("2024-12-31")));
    }

    #[test]
    fn test_day_journal_sorts_by_pnl() {
        let journal = day_journal(&march_trades(), date("2024-03-03"));

        let ids: Vec<&str> = journal.trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t3", "t4"]);
        assert_eq!(journal.total_pnl, 200.0);

        let empty = day_journal(&march_trades(), date("2024-03-04"));
        assert!(empty.trades.is_empty());
        assert_eq!(empty.total_pnl, 0.0);
    }
}
