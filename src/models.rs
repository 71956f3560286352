use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// A named financial bucket with a denormalized running balance.
///
/// When `is_debt` is true the balance is an amount owed, so a larger
/// balance means more debt.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub name_cn: String,
    pub balance: f64,
    pub is_debt: bool,
    pub icon: String,
    pub color: String,
    #[serde(with = "timestamp")]
    pub created_at: PrimitiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: PrimitiveDateTime,
}

/// One immutable ledger entry. `amount` is signed and its sign always
/// matches `transaction_type`. The owning account's display name and
/// color are resolved by a join at read time.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub account_name: String,
    pub account_color: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub note: String,
    #[serde(with = "timestamp")]
    pub created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Increase,
    Decrease,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Increase => "increase",
            TransactionType::Decrease => "decrease",
        }
    }

    /// Applies the recorded intent to an unsigned magnitude.
    pub fn signed(&self, magnitude: f64) -> f64 {
        match self {
            TransactionType::Increase => magnitude,
            TransactionType::Decrease => -magnitude,
        }
    }
}

/// Request to record a transaction. `amount` is an unsigned magnitude;
/// the stored sign is derived from `transaction_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionCommand {
    pub account_id: i64,
    pub amount: f64,
    #[serde(default = "default_transaction_type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub note: String,
}

fn default_transaction_type() -> TransactionType {
    TransactionType::Decrease
}

#[derive(Debug, Clone, Copy)]
pub struct AccountSeed {
    pub name: &'static str,
    pub name_cn: &'static str,
    pub balance: f64,
    pub is_debt: bool,
    pub icon: &'static str,
    pub color: &'static str,
}

/// Accounts created at startup when absent, keyed by unique `name`.
pub const DEFAULT_ACCOUNTS: &[AccountSeed] = &[
    AccountSeed { name: "alipay", name_cn: "支付宝", balance: 0.0, is_debt: false, icon: "alipay", color: "#1677FF" },
    AccountSeed { name: "huabei", name_cn: "花呗欠额", balance: 0.0, is_debt: true, icon: "huabei", color: "#FF6B35" },
    AccountSeed { name: "icbc", name_cn: "工行卡", balance: 0.0, is_debt: false, icon: "bank", color: "#C41230" },
    AccountSeed { name: "boc", name_cn: "中国银行卡", balance: 0.0, is_debt: false, icon: "bank", color: "#E60012" },
    AccountSeed { name: "wechat", name_cn: "微信", balance: 0.0, is_debt: false, icon: "wechat", color: "#07C160" },
    AccountSeed { name: "jd_baitiao", name_cn: "京东白条", balance: 0.0, is_debt: true, icon: "jd", color: "#E4393C" },
];

/// Current UTC wall-clock time, second resolution.
pub fn now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Timestamps are carried as `YYYY-MM-DDTHH:MM:SS` text, both in the
/// store and on the wire. The format is lexicographically ordered, so
/// SQL range filters work on plain text comparison.
pub fn format_timestamp(dt: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

pub fn parse_timestamp(s: &str) -> Option<PrimitiveDateTime> {
    let (date_part, time_part) = s.split_once('T')?;

    let mut d = date_part.splitn(3, '-');
    let year: i32 = d.next()?.parse().ok()?;
    let month: u8 = d.next()?.parse().ok()?;
    let day: u8 = d.next()?.parse().ok()?;

    let mut t = time_part.splitn(3, ':');
    let hour: u8 = t.next()?.parse().ok()?;
    let minute: u8 = t.next()?.parse().ok()?;
    // Tolerate a fractional-second tail.
    let second: u8 = t.next()?.split('.').next()?.parse().ok()?;

    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    Some(PrimitiveDateTime::new(date, time))
}

pub mod timestamp {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(dt: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PrimitiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}
