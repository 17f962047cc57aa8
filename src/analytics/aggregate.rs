use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::models::{Direction, Trade};

const TOP_TRADES: usize = 5;
const BUCKET_MINUTES: u32 = 30;

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("time-of-day pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WinLossCounts {
    pub wins: usize,
    pub losses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub profit: f64,
    pub loss: f64, // absolute value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDayBucket {
    pub bucket_start: String,
    pub win_rate: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCount {
    pub symbol: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionCounts {
    pub long: usize,
    pub short: usize,
}

/// Everything the analytics page shows, derived from one user's trades.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedView {
    pub total_pnl: f64,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub win_loss: WinLossCounts,
    pub daily_pnl: Vec<DailyPnl>,
    pub equity_curve: Vec<EquityPoint>,
    pub time_of_day: Vec<TimeOfDayBucket>,
    pub symbol_distribution: Vec<SymbolCount>,
    pub direction_distribution: DirectionCounts,
    pub top_best: Vec<Trade>,
    pub top_worst: Vec<Trade>,
}

/// Parse a strict `HH:MM` (24h) time into minutes since midnight.
pub fn parse_time_of_day(raw: &str) -> Option<u32> {
    let caps = TIME_OF_DAY.captures(raw.trim())?;
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    Some(hours * 60 + minutes)
}

fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn trade_minutes(trade: &Trade) -> Option<u32> {
    trade.time.as_deref().and_then(parse_time_of_day)
}

/// Compute every analytics view for `trades`.
///
/// Works on private copies of the references; the caller's slice is never
/// reordered. Records with a non-finite P/L are left out of every P/L based
/// view but still show up in the symbol and direction breakdowns.
pub fn aggregate(trades: &[Trade]) -> DerivedView {
    let chronological = chronological_order(trades);

    let wins: Vec<f64> = chronological.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = chronological.iter().map(|t| t.pnl).filter(|p| *p < 0.0).collect();

    let total_trades = chronological.len();
    let total_pnl: f64 = chronological.iter().map(|t| t.pnl).sum();
    let total_profit: f64 = wins.iter().sum();
    let total_loss: f64 = losses.iter().map(|p| p.abs()).sum();

    let win_rate = if total_trades > 0 {
        (wins.len() as f64 / total_trades as f64) * 100.0
    } else {
        0.0
    };
    let average_win = if !wins.is_empty() { total_profit / wins.len() as f64 } else { 0.0 };
    let average_loss = if !losses.is_empty() { total_loss / losses.len() as f64 } else { 0.0 };
    // No losses means there is nothing to divide by; report 0 rather than infinity
    let profit_factor = if total_loss > 0.0 { total_profit / total_loss } else { 0.0 };

    let (top_best, top_worst) = rank_extremes(trades);

    DerivedView {
        total_pnl,
        win_rate,
        average_win,
        average_loss,
        profit_factor,
        total_trades,
        win_loss: WinLossCounts {
            wins: wins.len(),
            losses: losses.len(),
        },
        daily_pnl: daily_pnl(&chronological),
        equity_curve: equity_curve(&chronological),
        time_of_day: time_of_day_win_rate(&chronological),
        symbol_distribution: symbol_distribution(trades),
        direction_distribution: direction_distribution(trades),
        top_best,
        top_worst,
    }
}

/// Finite-P/L trades ordered by date, then time of day (untimed first), then id.
fn chronological_order(trades: &[Trade]) -> Vec<&Trade> {
    let mut sorted: Vec<&Trade> = trades.iter().filter(|t| t.pnl.is_finite()).collect();
    sorted.sort_by_cached_key(|t| (t.date, trade_minutes(t), t.id.clone()));
    sorted
}

fn daily_pnl(chronological: &[&Trade]) -> Vec<DailyPnl> {
    let mut by_date: BTreeMap<NaiveDate, DailyPnl> = BTreeMap::new();

    for trade in chronological {
        let entry = by_date.entry(trade.date).or_insert(DailyPnl {
            date: trade.date,
            profit: 0.0,
            loss: 0.0,
        });
        if trade.pnl > 0.0 {
            entry.profit += trade.pnl;
        } else if trade.pnl < 0.0 {
            entry.loss += trade.pnl.abs();
        }
    }

    by_date.into_values().collect()
}

fn equity_curve(chronological: &[&Trade]) -> Vec<EquityPoint> {
    let mut balance = 0.0;
    chronological
        .iter()
        .enumerate()
        .map(|(i, trade)| {
            balance += trade.pnl;
            EquityPoint { index: i + 1, balance }
        })
        .collect()
}

fn time_of_day_win_rate(chronological: &[&Trade]) -> Vec<TimeOfDayBucket> {
    // bucket start (minutes) -> (wins, samples)
    let mut buckets: BTreeMap<u32, (usize, usize)> = BTreeMap::new();

    for trade in chronological {
        let Some(minutes) = trade_minutes(trade) else {
            continue;
        };
        let bucket = (minutes / BUCKET_MINUTES) * BUCKET_MINUTES;
        let entry = buckets.entry(bucket).or_insert((0, 0));
        if trade.pnl > 0.0 {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(start, (wins, samples))| TimeOfDayBucket {
            bucket_start: format_minutes(start),
            win_rate: (wins as f64 / samples as f64) * 100.0,
            sample_count: samples,
        })
        .collect()
}

fn symbol_distribution(trades: &[Trade]) -> Vec<SymbolCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for trade in trades {
        *counts.entry(trade.symbol.to_uppercase()).or_insert(0) += 1;
    }

    let mut distribution: Vec<SymbolCount> = counts
        .into_iter()
        .map(|(symbol, count)| SymbolCount { symbol, count })
        .collect();
    distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.symbol.cmp(&b.symbol)));
    distribution
}

fn direction_distribution(trades: &[Trade]) -> DirectionCounts {
    trades.iter().fold(DirectionCounts::default(), |mut counts, trade| {
        match trade.direction {
            Some(Direction::Long) => counts.long += 1,
            Some(Direction::Short) => counts.short += 1,
            None => {}
        }
        counts
    })
}

/// Best five and worst five trades. Equal P/L keeps input order, and with
/// fewer than five trades both lists hold the same records.
fn rank_extremes(trades: &[Trade]) -> (Vec<Trade>, Vec<Trade>) {
    let mut by_pnl: Vec<&Trade> = trades.iter().filter(|t| t.pnl.is_finite()).collect();
    by_pnl.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));

    let best = by_pnl.iter().take(TOP_TRADES).map(|t| (*t).clone()).collect();
    let worst = by_pnl.iter().rev().take(TOP_TRADES).map(|t| (*t).clone()).collect();
    (best, worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trade(id: &str, date: &str, time: Option<&str>, symbol: &str, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            user_id: "USER-1".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: time.map(str::to_string),
            symbol: symbol.to_string(),
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

    fn with_direction(mut t: Trade, direction: Direction) -> Trade {
        t.direction = Some(direction);
        t
    }

    fn ids(trades: &[Trade]) -> Vec<&str> {
        trades.iter().map(|t| t.id.as_str()).collect()
    }

    fn sample_trades() -> Vec<Trade> {
        vec![
            trade("a", "2024-03-05", Some("09:47"), "nq", 250.0),
            trade("b", "2024-03-04", Some("10:00"), "ES", -100.0),
            trade("c", "2024-03-05", None, "NQ", -50.0),
            trade("d", "2024-03-06", Some("15:15"), "cl", 0.0),
            trade("e", "2024-03-04", Some("09:31"), "es", 400.0),
            trade("f", "2024-03-07", Some("bad"), "NQ", 75.0),
            trade("g", "2024-03-05", Some("09:47"), "GC", -300.0),
        ]
    }

    #[test]
    fn test_empty_input_yields_zeroed_view() {
        let view = aggregate(&[]);
        assert_eq!(view, DerivedView::default());
        assert_eq!(view.total_trades, 0);
        assert!(view.equity_curve.is_empty());
        assert!(view.top_best.is_empty());
    }

    #[test]
    fn test_single_winning_trade() {
        let only = trade("t1", "2024-01-02", Some("14:05"), "AAPL", 100.0);
        let view = aggregate(std::slice::from_ref(&only));

        assert_eq!(view.total_pnl, 100.0);
        assert_eq!(view.win_rate, 100.0);
        assert_eq!(view.average_win, 100.0);
        assert_eq!(view.average_loss, 0.0);
        assert_eq!(view.profit_factor, 0.0);
        assert_eq!(view.total_trades, 1);
        assert_eq!(view.equity_curve, vec![EquityPoint { index: 1, balance: 100.0 }]);
        assert_eq!(view.top_best, vec![only.clone()]);
        assert_eq!(view.top_worst, vec![only]);
    }

    #[test]
    fn test_profit_factor_is_zero_without_losses() {
        let trades = vec![
            trade("t1", "2024-01-02", None, "AAPL", 200.0),
            trade("t2", "2024-01-03", None, "AAPL", 300.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(view.total_pnl, 500.0);
        assert_eq!(view.profit_factor, 0.0);
        assert!(view.profit_factor.is_finite());
    }

    #[test]
    fn test_scalars_with_wins_losses_and_breakeven() {
        let trades = vec![
            trade("t1", "2024-01-02", None, "NQ", 300.0),
            trade("t2", "2024-01-02", None, "NQ", 100.0),
            trade("t3", "2024-01-03", None, "NQ", -200.0),
            trade("t4", "2024-01-03", None, "NQ", 0.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(view.total_trades, 4);
        assert_eq!(view.total_pnl, 200.0);
        assert_eq!(view.win_loss, WinLossCounts { wins: 2, losses: 1 });
        assert_eq!(view.win_rate, 50.0);
        assert_eq!(view.average_win, 200.0);
        assert_eq!(view.average_loss, 200.0);
        assert_eq!(view.profit_factor, 2.0);
    }

    #[test]
    fn test_daily_pnl_groups_by_date_ascending() {
        let view = aggregate(&sample_trades());
        let dates: Vec<String> = view.daily_pnl.iter().map(|d| d.date.to_string()).collect();

        assert_eq!(dates, vec!["2024-03-04", "2024-03-05", "2024-03-06", "2024-03-07"]);
        assert_eq!(view.daily_pnl[0].profit, 400.0);
        assert_eq!(view.daily_pnl[0].loss, 100.0);
        assert_eq!(view.daily_pnl[1].profit, 250.0);
        assert_eq!(view.daily_pnl[1].loss, 350.0);
        // breakeven day contributes to neither side
        assert_eq!(view.daily_pnl[2].profit, 0.0);
        assert_eq!(view.daily_pnl[2].loss, 0.0);
    }

    #[test]
    fn test_equity_curve_follows_chronological_order() {
        let view = aggregate(&sample_trades());
        let balances: Vec<f64> = view.equity_curve.iter().map(|p| p.balance).collect();

        // e(09:31) b(10:00) | c(untimed) a(09:47) g(09:47) | d | f
        assert_eq!(balances, vec![400.0, 300.0, 250.0, 500.0, 200.0, 200.0, 275.0]);
        assert_eq!(view.equity_curve.last().map(|p| p.index), Some(7));
        assert_eq!(view.equity_curve.last().map(|p| p.balance), Some(view.total_pnl));
    }

    #[test]
    fn test_reversed_input_gives_same_view() {
        let trades = sample_trades();
        let mut reversed = trades.clone();
        reversed.reverse();

        assert_eq!(aggregate(&trades), aggregate(&reversed));
    }

    #[test]
    fn test_symbols_are_case_folded() {
        let view = aggregate(&sample_trades());

        assert_eq!(
            view.symbol_distribution,
            vec![
                SymbolCount { symbol: "NQ".to_string(), count: 3 },
                SymbolCount { symbol: "ES".to_string(), count: 2 },
                SymbolCount { symbol: "CL".to_string(), count: 1 },
                SymbolCount { symbol: "GC".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_time_of_day_buckets() {
        let view = aggregate(&sample_trades());

        assert_eq!(
            view.time_of_day,
            vec![
                TimeOfDayBucket { bucket_start: "09:30".to_string(), win_rate: 2.0 / 3.0 * 100.0, sample_count: 3 },
                TimeOfDayBucket { bucket_start: "10:00".to_string(), win_rate: 0.0, sample_count: 1 },
                TimeOfDayBucket { bucket_start: "15:00".to_string(), win_rate: 0.0, sample_count: 1 },
            ]
        );
        // untimed and malformed records still count overall
        assert_eq!(view.total_trades, 7);
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("00:00"), Some(0));
        assert_eq!(parse_time_of_day("09:47"), Some(587));
        assert_eq!(parse_time_of_day(" 23:59 "), Some(1439));
        assert_eq!(parse_time_of_day("9:47"), None);
        assert_eq!(parse_time_of_day("24:00"), None);
        assert_eq!(parse_time_of_day("12:60"), None);
        assert_eq!(parse_time_of_day("12:30:00"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn test_direction_distribution_skips_missing() {
        let trades = vec![
            with_direction(trade("t1", "2024-01-02", None, "NQ", 10.0), Direction::Long),
            with_direction(trade("t2", "2024-01-02", None, "NQ", -10.0), Direction::Short),
            with_direction(trade("t3", "2024-01-02", None, "NQ", 5.0), Direction::Long),
            trade("t4", "2024-01-02", None, "NQ", 5.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(view.direction_distribution, DirectionCounts { long: 2, short: 1 });
    }

    #[test]
    fn test_top_lists_overlap_with_three_trades() {
        let trades = vec![
            trade("t1", "2024-01-02", None, "NQ", 50.0),
            trade("t2", "2024-01-03", None, "NQ", -20.0),
            trade("t3", "2024-01-04", None, "NQ", 10.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(ids(&view.top_best), vec!["t1", "t3", "t2"]);
        assert_eq!(ids(&view.top_worst), vec!["t2", "t3", "t1"]);
    }

    #[test]
    fn test_top_lists_cap_at_five() {
        let trades: Vec<Trade> = (1..=8)
            .map(|i| trade(&format!("t{}", i), "2024-01-02", None, "NQ", (i as f64 - 4.0) * 10.0))
            .collect();
        let view = aggregate(&trades);

        assert_eq!(ids(&view.top_best), vec!["t8", "t7", "t6", "t5", "t4"]);
        assert_eq!(ids(&view.top_worst), vec!["t1", "t2", "t3", "t4", "t5"]);
    }

    #[test]
    fn test_equal_pnl_keeps_input_order_in_rankings() {
        let trades = vec![
            trade("A", "2024-03-05", None, "NQ", 100.0),
            trade("B", "2024-03-04", None, "NQ", 100.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(ids(&view.top_best), vec!["A", "B"]);
        assert_eq!(ids(&view.top_worst), vec!["B", "A"]);
        // the equity curve still runs in date order
        assert_eq!(view.equity_curve[0].balance, 100.0);
        assert_eq!(aggregate(&[trades[1].clone(), trades[0].clone()]).top_best[0].id, "B");
    }

    #[test]
    fn test_symbols_are_uppercased_not_trimmed() {
        let trades = vec![
            trade("t1", "2024-01-02", None, "nq", 10.0),
            trade("t2", "2024-01-02", None, "NQ ", 10.0),
        ];
        let view = aggregate(&trades);

        assert_eq!(
            view.symbol_distribution,
            vec![
                SymbolCount { symbol: "NQ".to_string(), count: 1 },
                SymbolCount { symbol: "NQ ".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_input_is_not_reordered() {
        let trades = sample_trades();
        let before = trades.clone();
        let _ = aggregate(&trades);
        assert_eq!(trades, before);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let trades = sample_trades();
        assert_eq!(aggregate(&trades), aggregate(&trades));
    }

    #[test]
    fn test_non_finite_pnl_is_excluded_from_pnl_views() {
        let mut trades = sample_trades();
        trades.push(trade("nan", "2024-03-05", Some("09:35"), "NQ", f64::NAN));
        trades.push(trade("inf", "2024-03-08", None, "ZB", f64::INFINITY));

        let view = aggregate(&trades);
        let clean = aggregate(&sample_trades());

        assert_eq!(view.total_trades, clean.total_trades);
        assert_eq!(view.total_pnl, clean.total_pnl);
        assert_eq!(view.equity_curve, clean.equity_curve);
        assert_eq!(view.daily_pnl, clean.daily_pnl);
        assert_eq!(view.time_of_day, clean.time_of_day);
        assert!(view.top_best.iter().all(|t| t.pnl.is_finite()));
        // symbol counts do not depend on P/L
        assert_eq!(view.symbol_distribution[0], SymbolCount { symbol: "NQ".to_string(), count: 4 });
    }

    // Every P/L in the sample is distinct, so the rankings are order independent too
    proptest! {
        #[test]
        fn test_any_input_order_gives_identical_view(shuffled in Just(sample_trades()).prop_shuffle()) {
            prop_assert_eq!(aggregate(&shuffled), aggregate(&sample_trades()));
        }
    }
}
