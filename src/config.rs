//! Configuration types for reprocess-wps
//!
//! The configuration is built once at startup (usually deserialized from a
//! document the host already loaded), validated with [`Config::validate`], then
//! shared read-only through an `Arc`.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};
use url::Url;

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint of the processing service
    pub endpoint: Url,

    /// Account identifier sent with every reprocessing order
    pub user_id: String,

    /// Processor version tag
    pub processor_version: String,

    /// Output resolution in metres (e.g. "10", "20", "60")
    pub resolution: String,

    /// Scratch directory receiving the unpacked results (default: system temp dir)
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Sensing-date window of the products accepted for reprocessing
    #[serde(default)]
    pub admission: AdmissionWindow,

    /// Per-attempt HTTP settings for service requests
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry policy for transient service failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Result download settings
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    /// Configuration with the required settings and defaults for everything else
    pub fn new(
        endpoint: Url,
        user_id: impl Into<String>,
        processor_version: impl Into<String>,
        resolution: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            user_id: user_id.into(),
            processor_version: processor_version.into(),
            resolution: resolution.into(),
            scratch_dir: default_scratch_dir(),
            admission: AdmissionWindow::default(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            download: DownloadConfig::default(),
        }
    }

    /// Deserialize and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings that serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(Error::config(
                "endpoint",
                format!("unsupported scheme '{}'", self.endpoint.scheme()),
            ));
        }
        for (key, value) in [
            ("user_id", &self.user_id),
            ("processor_version", &self.processor_version),
            ("resolution", &self.resolution),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(key, "must not be empty"));
            }
        }
        if self.resolution.parse::<u32>().is_err() {
            return Err(Error::config(
                "resolution",
                format!("'{}' is not a number of metres", self.resolution),
            ));
        }
        if self.scratch_dir.as_os_str().is_empty() {
            return Err(Error::config("scratch_dir", "must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "download.max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Sensing-date window `[start, end]`; both bounds are inclusive and optional
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionWindow {
    /// Products sensed before this bound are too old
    #[serde(default)]
    pub start: Option<DateBound>,

    /// Products sensed after this bound are left to the systematic flow
    #[serde(default)]
    pub end: Option<DateBound>,
}

/// One bound of the admission window
///
/// Written either as an RFC 3339 timestamp (`2018-03-26T00:00:00Z`) or relative
/// to the current time as `now-<ISO-8601 duration>` (`now-P30D`, `now-PT12H`).
/// Relative bounds are resolved each time they are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBound {
    /// Fixed instant
    Absolute(DateTime<Utc>),
    /// Current time minus an offset
    SinceNow(chrono::Duration),
}

impl DateBound {
    /// Instant this bound denotes at `now`
    ///
    /// Offsets reaching past the earliest representable instant resolve to it.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateBound::Absolute(instant) => *instant,
            DateBound::SinceNow(offset) => now
                .checked_sub_signed(*offset)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl FromStr for DateBound {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("now").or_else(|| s.strip_prefix("NOW")) {
            if rest.is_empty() {
                return Ok(DateBound::SinceNow(chrono::Duration::zero()));
            }
            let offset = rest
                .strip_prefix('-')
                .ok_or_else(|| format!("expected 'now-<duration>', got '{s}'"))?;
            return parse_iso_duration(offset).map(DateBound::SinceNow);
        }
        DateTime::parse_from_rfc3339(s)
            .map(|date| DateBound::Absolute(date.with_timezone(&Utc)))
            .map_err(|e| format!("invalid date '{s}': {e}"))
    }
}

impl TryFrom<String> for DateBound {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateBound> for String {
    fn from(bound: DateBound) -> Self {
        bound.to_string()
    }
}

impl std::fmt::Display for DateBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateBound::Absolute(instant) => {
                write!(f, "{}", instant.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
            }
            DateBound::SinceNow(offset) => {
                let secs = offset.num_seconds();
                let millis = offset.num_milliseconds() - secs * 1000;
                if millis == 0 {
                    write!(f, "now-PT{secs}S")
                } else {
                    write!(f, "now-PT{secs}.{millis:03}S")
                }
            }
        }
    }
}

/// Parse an ISO-8601 duration of the form `PnDTnHnMn.nS` (days count 24 hours)
fn parse_iso_duration(text: &str) -> std::result::Result<chrono::Duration, String> {
    let invalid = || format!("invalid ISO-8601 duration '{text}'");
    let too_long = || format!("ISO-8601 duration '{text}' is out of range");
    let add = |total: i64, value: i64, unit: i64| {
        value
            .checked_mul(unit)
            .and_then(|amount| total.checked_add(amount))
            .ok_or_else(too_long)
    };
    let body = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let (date_part, time_part) = match body.find(|c: char| c.eq_ignore_ascii_case(&'T')) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let mut millis: i64 = 0;
    let mut number = String::new();
    let mut seen_any = false;

    for c in date_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'D' | 'd' => {
                let days: i64 = number.parse().map_err(|_| invalid())?;
                millis = add(millis, days, 86_400_000)?;
                number.clear();
                seen_any = true;
            }
            _ => return Err(invalid()),
        }
    }
    if !number.is_empty() {
        return Err(invalid());
    }

    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return Err(invalid());
        }
        for c in time_part.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' | 'h' | 'M' | 'm' if !number.contains('.') => {
                    let value: i64 = number.parse().map_err(|_| invalid())?;
                    let unit = if c.eq_ignore_ascii_case(&'H') {
                        3_600_000
                    } else {
                        60_000
                    };
                    millis = add(millis, value, unit)?;
                    number.clear();
                    seen_any = true;
                }
                'S' | 's' => {
                    let seconds: f64 = number.parse().map_err(|_| invalid())?;
                    let seconds_millis = (seconds * 1000.0).round();
                    if seconds_millis >= i64::MAX as f64 {
                        return Err(too_long());
                    }
                    millis = add(millis, seconds_millis as i64, 1)?;
                    number.clear();
                    seen_any = true;
                }
                _ => return Err(invalid()),
            }
        }
        if !number.is_empty() {
            return Err(invalid());
        }
    }

    if !seen_any {
        return Err(invalid());
    }
    Ok(chrono::Duration::milliseconds(millis))
}

/// Per-attempt HTTP settings for service requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Read timeout (default: 3 seconds)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, first one included (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: none)
    #[serde(default, with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: Duration::ZERO,
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Result download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum downloads running at the same time (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Connection timeout for result downloads (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Number of structural archive entries preceding the payload (default: 1)
    #[serde(default = "default_skip_entries")]
    pub skip_entries: usize,

    /// Packaging marker removed from the payload file name (default: ".SAFE.")
    #[serde(default = "default_packaging_marker")]
    pub packaging_marker: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            connect_timeout: default_connect_timeout(),
            skip_entries: default_skip_entries(),
            packaging_marker: default_packaging_marker(),
        }
    }
}

// Default value functions
fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_concurrent() -> usize {
    4
}

fn default_skip_entries() -> usize {
    1
}

fn default_packaging_marker() -> String {
    ".SAFE.".to_string()
}

// Duration serialization helper (seconds, fractions allowed)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
