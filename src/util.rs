use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::Money;

pub fn fmt_money(m: &Money) -> String {
    format!("{:.2}", m.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

pub fn fmt_percent(d: &Decimal) -> String {
    format!("{:.1}%", d.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

/// Largest amount the forms accept: one trillion.
pub const MAX_AMOUNT: Money = Money(Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0));

pub fn parse_money(s: &str) -> Option<Money> {
    s.trim().parse::<Decimal>().ok().map(Money)
}

pub fn within_limit(m: &Money) -> bool {
    m.0.abs() <= MAX_AMOUNT.0
}

pub fn parse_date_any(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
        .or_else(|| parse_datetime_any(s).map(|dt| dt.date()))
}

/// Accepts naive ISO timestamps (with or without fraction), RFC 3339, or a bare date.
pub fn parse_datetime_any(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn iso(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Serde adapter for timestamps the backend may send in several shapes.
pub mod flex_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn serialize_opt<S: Serializer>(dt: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serialize(dt, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_datetime_any(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
    }
}

/// Serde adapter for calendar dates, tolerating a trailing time component.
pub mod flex_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::iso(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date_any(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date {raw:?}")))
    }
}
