use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr, time::Duration};

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub api_url: String,
    pub shop_offset: FixedOffset,
    pub booking_horizon_days: u32,
    pub api_timeout: Duration,
    pub static_dir: String,
}

const HORIZON_DAYS: RangeInclusive<u32> = 1..=365;

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    reason: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let offset: String = load("SHOP_UTC_OFFSET", "-03:00")?;
        let timeout_secs: u64 = load("API_TIMEOUT_SECS", "15")?;
        let api_url: String = load("API_URL", "http://localhost:3333")?;

        Ok(Self {
            port: load("PORT", "8080")?,
            api_url: api_url.trim_end_matches('/').to_string(),
            shop_offset: parse_offset(&offset).ok_or_else(|| ConfigError {
                key: "SHOP_UTC_OFFSET",
                reason: format!("expected +HH:MM or -HH:MM, got {offset:?}"),
            })?,
            booking_horizon_days: horizon_days(load("BOOKING_HORIZON_DAYS", "60")?)?,
            api_timeout: Duration::from_secs(timeout_secs),
            static_dir: load("STATIC_DIR", "./static")?,
        })
    }
}

fn load<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|err: T::Err| ConfigError {
        key,
        reason: err.to_string(),
    })
}

fn horizon_days(days: u32) -> Result<u32, ConfigError> {
    if HORIZON_DAYS.contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError {
            key: "BOOKING_HORIZON_DAYS",
            reason: format!(
                "expected {} to {} days, got {days}",
                HORIZON_DAYS.start(),
                HORIZON_DAYS.end()
            ),
        })
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value == "UTC" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
