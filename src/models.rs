use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed-in user's profile as returned by `/api/users/username/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// A shortened link as rendered client-side. Only `hits` ever changes, and
/// only the server changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub id: i64,
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    #[serde(default)]
    pub hits: u64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub expire_at: Option<DateTime<Utc>>,
}

impl LinkRecord {
    pub fn created_date(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }

    /// Expiry is display-only; the backend enforces it.
    pub fn expire_date(&self) -> Option<String> {
        self.expire_at.map(|at| at.format("%Y-%m-%d").to_string())
    }
}

// ── Request bodies ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Body for both `POST /api/urls` and `POST /api/urls/custom`; the custom
/// endpoint is chosen when `custom_short_code` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_short_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "timestamp::serialize_option"
    )]
    pub expire_at: Option<DateTime<Utc>>,
}

// ── Creation form ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationUnit {
    #[default]
    Hours,
    Days,
}

impl DurationUnit {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => Some(DurationUnit::Hours),
            "d" | "day" | "days" => Some(DurationUnit::Days),
            _ => None,
        }
    }
}

/// A positive "expire after" duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpireAfter {
    pub value: u32,
    pub unit: DurationUnit,
}

impl ExpireAfter {
    /// Parse the raw form value. Anything that is not a positive integer
    /// means "no expiry" rather than an error.
    pub fn from_form(value: &str, unit: DurationUnit) -> Option<Self> {
        match value.trim().parse::<u32>() {
            Ok(value) if value > 0 => Some(Self { value, unit }),
            _ => None,
        }
    }

    /// `now` plus the duration, or `None` when that lands outside the
    /// representable date range.
    pub fn expire_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let span = match self.unit {
            DurationUnit::Hours => Duration::try_hours(i64::from(self.value)),
            DurationUnit::Days => Duration::try_days(i64::from(self.value)),
        }?;
        now.checked_add_signed(span)
    }
}

/// The raw "shorten" form as the user typed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkForm {
    pub original_url: String,
    pub custom_short_code: String,
    pub duration_value: String,
    pub duration_unit: DurationUnit,
}

impl LinkForm {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            ..Self::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.custom_short_code = alias.into();
        self
    }

    pub fn with_expiry(mut self, value: impl Into<String>, unit: DurationUnit) -> Self {
        self.duration_value = value.into();
        self.duration_unit = unit;
        self
    }

    /// `None` for an empty or whitespace-only alias.
    pub fn alias(&self) -> Option<&str> {
        Some(self.custom_short_code.trim()).filter(|s| !s.is_empty())
    }

    pub fn expire_after(&self) -> Option<ExpireAfter> {
        ExpireAfter::from_form(&self.duration_value, self.duration_unit)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ── View selectors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveTab {
    My,
    #[default]
    Popular,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Health {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthStatus {
    pub health: Health,
    pub probing: bool,
}

impl HealthStatus {
    /// `None` until the first probe resolves.
    pub fn is_healthy(&self) -> Option<bool> {
        match self.health {
            Health::Unknown => None,
            Health::Healthy => Some(true),
            Health::Unhealthy => Some(false),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match (self.probing, self.health) {
            (true, _) => "Checking...",
            (false, Health::Unknown) => "Unknown",
            (false, Health::Healthy) => "Server Online",
            (false, Health::Unhealthy) => "Server Offline",
        };
        f.write_str(label)
    }
}

// ── Timestamp wire format ──────────────────────────────────────────────────

/// Timestamps arrive either as RFC 3339 or as zone-less local date-times
/// (treated as UTC). Outgoing timestamps use millisecond precision with a
/// `Z` suffix.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::iso_timestamp(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
    }

    pub fn serialize_option<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serialize(value, s),
            None => s.serialize_none(),
        }
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            super::serialize_option(value, s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}"))),
                None => Ok(None),
            }
        }
    }
}

/// Render a timestamp the way browsers' `toISOString` does.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
