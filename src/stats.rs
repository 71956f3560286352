use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

use crate::{
    models::{Account, Transaction},
    storage::{StorageBackend, StorageError},
};

/// Half-open `[start, end)` datetime window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: PrimitiveDateTime,
    pub end: PrimitiveDateTime,
}

impl Window {
    fn days(start: Date, end: Date) -> Self {
        Window {
            start: midnight(start),
            end: midnight(end),
        }
    }
}

fn midnight(d: Date) -> PrimitiveDateTime {
    PrimitiveDateTime::new(d, Time::MIDNIGHT)
}

/// Comparison windows for the statistics report, derived from a
/// midnight-aligned `today`.
///
/// The current week and month windows deliberately run only through the
/// end of today, while the previous windows cover the full prior
/// calendar week and month.
#[derive(Debug)]
pub struct StatWindows {
    pub today: Window,
    pub yesterday: Window,
    pub this_week: Window,
    pub last_week: Window,
    pub this_month: Window,
    pub last_month: Window,
}

impl StatWindows {
    pub fn for_today(today: Date) -> Self {
        let tomorrow = today + Duration::days(1);
        let yesterday = today - Duration::days(1);

        // Week starts Monday.
        let week_start = today - Duration::days(today.weekday().number_days_from_monday() as i64);
        let last_week_start = week_start - Duration::days(7);

        let month_start = first_of_month(today.year(), today.month());
        let last_month_start = match today.month() {
            Month::January => first_of_month(today.year() - 1, Month::December),
            m => first_of_month(today.year(), m.previous()),
        };

        StatWindows {
            today: Window::days(today, tomorrow),
            yesterday: Window::days(yesterday, today),
            this_week: Window::days(week_start, tomorrow),
            last_week: Window::days(last_week_start, week_start),
            this_month: Window::days(month_start, tomorrow),
            last_month: Window::days(last_month_start, month_start),
        }
    }
}

fn first_of_month(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).unwrap()
}

#[derive(Debug, Serialize)]
pub struct PeriodSpend {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    pub daily: PeriodSpend,
    pub weekly: PeriodSpend,
    pub monthly: PeriodSpend,
}

/// Daily/weekly/monthly spend, each compared against the previous
/// period.
pub fn statistics(
    storage: &dyn StorageBackend,
    today: Date,
) -> Result<StatisticsReport, StorageError> {
    let windows = StatWindows::for_today(today);
    Ok(StatisticsReport {
        daily: period_spend(storage, &windows.today, &windows.yesterday)?,
        weekly: period_spend(storage, &windows.this_week, &windows.last_week)?,
        monthly: period_spend(storage, &windows.this_month, &windows.last_month)?,
    })
}

fn period_spend(
    storage: &dyn StorageBackend,
    current: &Window,
    previous: &Window,
) -> Result<PeriodSpend, StorageError> {
    let current = storage.spend_in_range(current.start, current.end)?;
    let previous = storage.spend_in_range(previous.start, previous.end)?;
    Ok(PeriodSpend {
        current,
        previous,
        change: current - previous,
    })
}

#[derive(Debug, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub spending: f64,
}

/// One spend point per trailing day, oldest first, today last.
pub fn chart_series(
    storage: &dyn StorageBackend,
    today: Date,
    days: u32,
) -> Result<Vec<ChartPoint>, StorageError> {
    let mut points = Vec::with_capacity(days as usize);
    for i in (0..days).rev() {
        let day = today - Duration::days(i as i64);
        let spending = storage.spend_in_range(midnight(day), midnight(day + Duration::days(1)))?;
        points.push(ChartPoint {
            date: format!("{:02}-{:02}", day.month() as u8, day.day()),
            spending,
        });
    }
    Ok(points)
}

#[derive(Debug, Serialize)]
pub struct TransactionGroup {
    pub date: String,
    pub transactions: Vec<Transaction>,
}

/// Partitions transactions by calendar day of creation. Group order
/// follows the order dates are first seen in the input, so a
/// newest-first input yields newest-first groups.
pub fn group_by_day(transactions: &[Transaction]) -> Vec<TransactionGroup> {
    let mut groups: Vec<TransactionGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for txn in transactions {
        let key = date_key(txn.created_at.date());
        match index.get(&key) {
            Some(&i) => groups[i].transactions.push(txn.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(TransactionGroup {
                    date: key,
                    transactions: vec![txn.clone()],
                });
            }
        }
    }

    groups
}

fn date_key(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_assets: f64,
    pub total_debt: f64,
    pub net_worth: f64,
    pub accounts: Vec<Account>,
}

/// Net-worth summary: assets sum non-debt balances, debt sums debt
/// balances, net worth is their difference.
pub fn summarize(accounts: Vec<Account>) -> Summary {
    let total_assets: f64 = accounts
        .iter()
        .filter(|a| !a.is_debt)
        .map(|a| a.balance)
        .sum();
    let total_debt: f64 = accounts
        .iter()
        .filter(|a| a.is_debt)
        .map(|a| a.balance)
        .sum();

    Summary {
        total_assets,
        total_debt,
        net_worth: total_assets - total_debt,
        accounts,
    }
}
