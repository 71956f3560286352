use moneyd::api::page_count;
use moneyd::models::{
    format_timestamp, now_utc, parse_timestamp, CreateTransactionCommand, Transaction,
    TransactionType,
};
use moneyd::sqlite_storage::SqliteStorage;
use moneyd::stats::{self, StatWindows};
use moneyd::storage::{seed_default_accounts, StorageBackend, StorageError};
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

fn setup() -> SqliteStorage {
    let storage = SqliteStorage::new(":memory:").expect("Failed to open in-memory database");
    seed_default_accounts(&storage).expect("Failed to seed default accounts");
    storage
}

fn account_id(storage: &dyn StorageBackend, name: &str) -> i64 {
    storage
        .list_accounts()
        .expect("Failed to list accounts")
        .into_iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("account {} not seeded", name))
        .id
}

fn record(
    storage: &dyn StorageBackend,
    account_id: i64,
    amount: f64,
    transaction_type: TransactionType,
) -> Transaction {
    storage
        .create_transaction(&CreateTransactionCommand {
            account_id,
            amount,
            transaction_type,
            note: String::new(),
        })
        .expect("Failed to create transaction")
}

fn date(year: i32, month: Month, day: u8) -> Date {
    Date::from_calendar_date(year, month, day).unwrap()
}

fn midnight(d: Date) -> PrimitiveDateTime {
    PrimitiveDateTime::new(d, Time::MIDNIGHT)
}

#[test]
fn test_default_accounts_seeded() {
    let storage = setup();
    let accounts = storage.list_accounts().unwrap();
    assert_eq!(accounts.len(), 6);

    let alipay = accounts.iter().find(|a| a.name == "alipay").unwrap();
    assert!(!alipay.is_debt);
    assert_eq!(alipay.balance, 0.0);
    assert_eq!(alipay.name_cn, "支付宝");

    let huabei = accounts.iter().find(|a| a.name == "huabei").unwrap();
    assert!(huabei.is_debt);
}

#[test]
fn test_seeding_is_idempotent() {
    let storage = setup();
    seed_default_accounts(&storage).unwrap();
    seed_default_accounts(&storage).unwrap();
    assert_eq!(storage.list_accounts().unwrap().len(), 6);
}

#[test]
fn test_get_account_not_found() {
    let storage = setup();
    match storage.get_account(9999) {
        Err(StorageError::AccountNotFound(9999)) => {}
        other => panic!("Expected AccountNotFound, got {:?}", other.map(|a| a.id)),
    }
}

#[test]
fn test_increase_adds_to_balance() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    storage.set_balance(id, 100.0).unwrap();

    let txn = record(&storage, id, 50.0, TransactionType::Increase);

    assert_eq!(txn.amount, 50.0);
    assert_eq!(txn.transaction_type, TransactionType::Increase);
    assert_eq!(storage.get_account(id).unwrap().balance, 150.0);
}

#[test]
fn test_decrease_on_debt_account_pays_down() {
    let storage = setup();
    let id = account_id(&storage, "huabei");
    storage.set_balance(id, 200.0).unwrap();

    let txn = record(&storage, id, 30.0, TransactionType::Decrease);

    assert_eq!(txn.amount, -30.0);
    assert_eq!(storage.get_account(id).unwrap().balance, 170.0);
}

#[test]
fn test_balance_tracks_signed_sum() {
    let storage = setup();
    let id = account_id(&storage, "wechat");
    storage.set_balance(id, 500.0).unwrap();

    record(&storage, id, 120.0, TransactionType::Increase);
    record(&storage, id, 45.5, TransactionType::Decrease);
    record(&storage, id, 10.0, TransactionType::Decrease);

    assert_eq!(storage.get_account(id).unwrap().balance, 500.0 + 120.0 - 45.5 - 10.0);
}

#[test]
fn test_transaction_for_missing_account() {
    let storage = setup();
    let result = storage.create_transaction(&CreateTransactionCommand {
        account_id: 9999,
        amount: 10.0,
        transaction_type: TransactionType::Decrease,
        note: String::new(),
    });
    assert!(matches!(result, Err(StorageError::AccountNotFound(9999))));
    // Nothing persisted.
    let (_, total) = storage.list_transactions(1, 50).unwrap();
    assert_eq!(total, 0);
}

#[test]
fn test_set_balance_overwrites_directly() {
    let storage = setup();
    let id = account_id(&storage, "icbc");
    record(&storage, id, 40.0, TransactionType::Increase);

    let account = storage.set_balance(id, 777.5).unwrap();

    assert_eq!(account.balance, 777.5);
    // The overwrite leaves no trace in the ledger.
    let (_, total) = storage.list_transactions(1, 50).unwrap();
    assert_eq!(total, 1);
}

#[test]
fn test_transaction_carries_account_display_fields() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    let txn = record(&storage, id, 5.0, TransactionType::Decrease);
    assert_eq!(txn.account_name, "支付宝");
    assert_eq!(txn.account_color, "#1677FF");
}

#[test]
fn test_pagination() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    for i in 1..=5 {
        record(&storage, id, i as f64, TransactionType::Decrease);
    }

    let (page1, total) = storage.list_transactions(1, 2).unwrap();
    assert_eq!(total, 5);
    assert_eq!(page1.len(), 2);

    let (page3, _) = storage.list_transactions(3, 2).unwrap();
    assert_eq!(page3.len(), 1);

    let (page4, total) = storage.list_transactions(4, 2).unwrap();
    assert!(page4.is_empty());
    assert_eq!(total, 5);
}

#[test]
fn test_transactions_listed_newest_first() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    let first = record(&storage, id, 1.0, TransactionType::Decrease);
    let second = record(&storage, id, 2.0, TransactionType::Decrease);

    let all = storage.list_all_transactions().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, second.id);
    assert_eq!(all[1].id, first.id);
}

#[test]
fn test_page_count() {
    assert_eq!(page_count(5, 2), 3);
    assert_eq!(page_count(100, 50), 2);
    assert_eq!(page_count(0, 50), 0);
    assert_eq!(page_count(10, 0), 0);
}

#[test]
fn test_spend_in_range_sums_expenditures_only() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    record(&storage, id, 20.0, TransactionType::Decrease);
    record(&storage, id, 15.0, TransactionType::Decrease);
    record(&storage, id, 100.0, TransactionType::Increase);

    let now = now_utc();
    let spend = storage
        .spend_in_range(now - Duration::hours(1), now + Duration::hours(1))
        .unwrap();
    assert_eq!(spend, 35.0);
}

#[test]
fn test_spend_in_range_empty_window_is_zero() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    record(&storage, id, 50.0, TransactionType::Increase);

    let now = now_utc();
    // Window before any transaction.
    let spend = storage
        .spend_in_range(now - Duration::hours(2), now - Duration::hours(1))
        .unwrap();
    assert_eq!(spend, 0.0);
}

#[test]
fn test_stat_windows_midweek() {
    // Wednesday 2024-06-12
    let windows = StatWindows::for_today(date(2024, Month::June, 12));

    assert_eq!(windows.today.start, midnight(date(2024, Month::June, 12)));
    assert_eq!(windows.today.end, midnight(date(2024, Month::June, 13)));
    assert_eq!(windows.yesterday.start, midnight(date(2024, Month::June, 11)));
    assert_eq!(windows.yesterday.end, midnight(date(2024, Month::June, 12)));

    // Week starts Monday; current window runs only through end of today.
    assert_eq!(windows.this_week.start, midnight(date(2024, Month::June, 10)));
    assert_eq!(windows.this_week.end, midnight(date(2024, Month::June, 13)));
    assert_eq!(windows.last_week.start, midnight(date(2024, Month::June, 3)));
    assert_eq!(windows.last_week.end, midnight(date(2024, Month::June, 10)));

    assert_eq!(windows.this_month.start, midnight(date(2024, Month::June, 1)));
    assert_eq!(windows.this_month.end, midnight(date(2024, Month::June, 13)));
    assert_eq!(windows.last_month.start, midnight(date(2024, Month::May, 1)));
    assert_eq!(windows.last_month.end, midnight(date(2024, Month::June, 1)));
}

#[test]
fn test_stat_windows_on_monday() {
    let windows = StatWindows::for_today(date(2024, Month::June, 10));
    assert_eq!(windows.this_week.start, midnight(date(2024, Month::June, 10)));
    assert_eq!(windows.this_week.end, midnight(date(2024, Month::June, 11)));
}

#[test]
fn test_stat_windows_january_rolls_back_to_december() {
    let windows = StatWindows::for_today(date(2024, Month::January, 15));
    assert_eq!(windows.last_month.start, midnight(date(2023, Month::December, 1)));
    assert_eq!(windows.last_month.end, midnight(date(2024, Month::January, 1)));
}

#[test]
fn test_statistics_reports_today_spend() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    record(&storage, id, 25.0, TransactionType::Decrease);

    let today = now_utc().date();
    let report = stats::statistics(&storage, today).unwrap();

    assert_eq!(report.daily.current, 25.0);
    assert_eq!(report.daily.previous, 0.0);
    assert_eq!(report.daily.change, 25.0);
    assert_eq!(report.weekly.current, 25.0);
    assert_eq!(report.monthly.current, 25.0);
}

#[test]
fn test_chart_series_shape() {
    let storage = setup();
    let id = account_id(&storage, "alipay");
    record(&storage, id, 40.0, TransactionType::Decrease);

    let today = now_utc().date();
    let series = stats::chart_series(&storage, today, 3).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series[0].spending, 0.0);
    assert_eq!(series[1].spending, 0.0);
    assert_eq!(series[2].spending, 40.0);
    assert_eq!(
        series[2].date,
        format!("{:02}-{:02}", today.month() as u8, today.day())
    );
}

fn txn_on(id: i64, day: Date) -> Transaction {
    Transaction {
        id,
        account_id: 1,
        account_name: "支付宝".to_string(),
        account_color: "#1677FF".to_string(),
        amount: -10.0,
        transaction_type: TransactionType::Decrease,
        note: String::new(),
        created_at: PrimitiveDateTime::new(day, Time::from_hms(12, 0, 0).unwrap()),
    }
}

#[test]
fn test_group_by_day() {
    // Newest first, two transactions on the same day.
    let transactions = vec![
        txn_on(3, date(2024, Month::January, 2)),
        txn_on(2, date(2024, Month::January, 2)),
        txn_on(1, date(2024, Month::January, 1)),
    ];

    let groups = stats::group_by_day(&transactions);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].date, "2024-01-02");
    assert_eq!(groups[0].transactions.len(), 2);
    assert_eq!(groups[1].date, "2024-01-01");
    assert_eq!(groups[1].transactions.len(), 1);
}

#[test]
fn test_summary_math() {
    let storage = setup();
    storage
        .set_balance(account_id(&storage, "alipay"), 100.0)
        .unwrap();
    storage
        .set_balance(account_id(&storage, "icbc"), 50.0)
        .unwrap();
    storage
        .set_balance(account_id(&storage, "huabei"), 30.0)
        .unwrap();

    let summary = stats::summarize(storage.list_accounts().unwrap());

    assert_eq!(summary.total_assets, 150.0);
    assert_eq!(summary.total_debt, 30.0);
    assert_eq!(summary.net_worth, 120.0);
    assert_eq!(summary.accounts.len(), 6);
}

#[test]
fn test_timestamp_round_trip() {
    let dt = PrimitiveDateTime::new(
        date(2024, Month::March, 7),
        Time::from_hms(9, 30, 5).unwrap(),
    );
    let s = format_timestamp(dt);
    assert_eq!(s, "2024-03-07T09:30:05");
    assert_eq!(parse_timestamp(&s), Some(dt));
}
