use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The canonical SQL type vocabulary used uniformly by coercion and casts
/// (Glossary: "Canonical SQL type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Varchar,
    Char,
    Integer,
    Bigint,
    Decimal,
    Boolean,
    LocalDate,
    LocalTime,
    LocalDateTime,
    Uuid,
    Json,
    Jsonb,
}

/// A value after coercion, ready to be bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Varchar(String),
    Char(String),
    Integer(i32),
    Bigint(i64),
    Decimal(Decimal),
    Boolean(bool),
    LocalDate(NaiveDate),
    LocalTime(NaiveTime),
    LocalDateTime(NaiveDateTime),
    Uuid(Uuid),
    /// JSON/JSONB values are carried as their raw textual form; the spec
    /// is explicit that these are not reparsed at bind time.
    Json(String),
    Jsonb(String),
    Null,
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Truncates a LOCALDATETIME value to whole seconds, per §4.2's
    /// datetime comparison policy. No-op for every other variant.
    pub fn truncate_to_seconds(&self) -> TypedValue {
        match self {
            TypedValue::LocalDateTime(dt) => {
                let truncated = dt
                    .date()
                    .and_hms_opt(dt.time().hour(), dt.time().minute(), dt.time().second())
                    .unwrap_or(*dt);
                TypedValue::LocalDateTime(truncated)
            }
            other => other.clone(),
        }
    }
}

/// `cast_type` request field, matched case-sensitively against the
/// SCREAMING_SNAKE_CASE wire vocabulary in §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CastType {
    String,
    Varchar,
    Text,
    Char,
    Integer,
    Int,
    Bigint,
    Long,
    Decimal,
    Numeric,
    Double,
    Boolean,
    Date,
    Time,
    Datetime,
    Timestamp,
    Uuid,
    Json,
    Jsonb,
}

impl CastType {
    /// Maps a `cast_type` to its canonical SQL type per the §4.1 table.
    pub fn canonical(self) -> CanonicalType {
        match self {
            CastType::String | CastType::Varchar | CastType::Text => CanonicalType::Varchar,
            CastType::Char => CanonicalType::Char,
            CastType::Integer | CastType::Int => CanonicalType::Integer,
            CastType::Bigint | CastType::Long => CanonicalType::Bigint,
            CastType::Decimal | CastType::Numeric | CastType::Double => CanonicalType::Decimal,
            CastType::Boolean => CanonicalType::Boolean,
            CastType::Date => CanonicalType::LocalDate,
            CastType::Time => CanonicalType::LocalTime,
            CastType::Datetime | CastType::Timestamp => CanonicalType::LocalDateTime,
            CastType::Uuid => CanonicalType::Uuid,
            CastType::Json => CanonicalType::Json,
            CastType::Jsonb => CanonicalType::Jsonb,
        }
    }
}

impl CanonicalType {
    /// The SQL keyword used in an explicit `CAST(expr AS <kw>)`.
    pub fn cast_keyword(self) -> &'static str {
        match self {
            CanonicalType::Varchar => "VARCHAR",
            CanonicalType::Char => "CHAR",
            CanonicalType::Integer => "INTEGER",
            CanonicalType::Bigint => "BIGINT",
            CanonicalType::Decimal => "DECIMAL",
            CanonicalType::Boolean => "BOOLEAN",
            CanonicalType::LocalDate => "DATE",
            CanonicalType::LocalTime => "TIME",
            CanonicalType::LocalDateTime => "TIMESTAMP",
            CanonicalType::Uuid => "UUID",
            CanonicalType::Json => "JSON",
            CanonicalType::Jsonb => "JSONB",
        }
    }
}
