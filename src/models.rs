use std::{fmt, str::FromStr};

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_BARBER: &str = "barber";

pub const STATUS_PENDING: &str = "Pendente";
pub const STATUS_DONE: &str = "Concluído";
pub const STATUS_CANCELLED: &str = "Cancelado";

pub const SLOT_AVAILABLE: &str = "Disponível";
pub const SLOT_BLOCKED: &str = "Bloqueado";
pub const SLOT_BOOKED: &str = "Agendado";
pub const SLOT_PROCESSING: &str = "processando";

pub const DEFAULT_ICON: &str = "scissors";
pub const ICONS: [(&str, &str); 10] = [
    ("scissors", "Tesoura"),
    ("sparkle", "Brilho"),
    ("combine", "Combo"),
    ("mustache", "Bigode"),
    ("utensils", "Navalha"),
    ("brush", "Pincel"),
    ("gem", "Premium"),
    ("award", "Destaque"),
    ("palette", "Cor"),
    ("wind", "Secagem"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Barber,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Barber => ROLE_BARBER,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::Barber => "Barbeiro",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_BARBER => Ok(Role::Barber),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: BigDecimal,
    #[serde(deserialize_with = "de_count")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub icon_name: Option<String>,
}

impl Service {
    pub fn icon(&self) -> &str {
        icon_or_default(self.icon_name.as_deref())
    }

    pub fn description_or_default(&self) -> &str {
        match self.description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => "Descrição detalhada do serviço em breve.",
        }
    }
}

pub fn icon_or_default(name: Option<&str>) -> &str {
    match name {
        Some(name) if ICONS.iter().any(|(known, _)| *known == name) => name,
        _ => DEFAULT_ICON,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub client_name: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default, alias = "service")]
    pub service_name: Option<String>,
    #[serde(default, alias = "barber")]
    pub barber_name: Option<String>,
    pub appointment_time: DateTime<Utc>,
    pub status: String,
}

impl Appointment {
    pub fn local_time(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.appointment_time.with_timezone(&offset)
    }

    pub fn service_label(&self) -> &str {
        self.service_name.as_deref().unwrap_or("-")
    }

    pub fn barber_label(&self) -> &str {
        self.barber_name.as_deref().unwrap_or("-")
    }

    pub fn phone_label(&self) -> &str {
        self.client_phone.as_deref().unwrap_or("")
    }

    pub fn status_class(&self) -> &'static str {
        status_class(&self.status)
    }
}

pub fn status_class(status: &str) -> &'static str {
    match status {
        STATUS_DONE => "status-done",
        STATUS_CANCELLED => "status-cancelled",
        _ => "status-pending",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    #[serde(rename = "Disponível")]
    Available,
    #[serde(rename = "Bloqueado")]
    Blocked,
    #[serde(rename = "Agendado")]
    Booked,
    #[serde(rename = "processando")]
    Processing,
}

impl SlotStatus {
    pub fn label(self) -> &'static str {
        match self {
            SlotStatus::Available => SLOT_AVAILABLE,
            SlotStatus::Blocked => SLOT_BLOCKED,
            SlotStatus::Booked => SLOT_BOOKED,
            SlotStatus::Processing => SLOT_PROCESSING,
        }
    }

    pub fn css(self) -> &'static str {
        match self {
            SlotStatus::Available => "slot-available",
            SlotStatus::Blocked => "slot-blocked",
            SlotStatus::Booked => "slot-booked",
            SlotStatus::Processing => "slot-processing",
        }
    }

    pub fn is_clickable(self) -> bool {
        matches!(self, SlotStatus::Available | SlotStatus::Blocked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Slot {
    /// Echoed back verbatim to block/unblock calls.
    pub time: String,
    pub status: SlotStatus,
}

impl Slot {
    /// `HH:mm` in the shop's timezone, whether the backend sent a clock time
    /// or a full timestamp.
    pub fn label(&self, offset: FixedOffset) -> String {
        if let Ok(instant) = DateTime::parse_from_rfc3339(&self.time) {
            return instant.with_timezone(&offset).format("%H:%M").to_string();
        }
        match SlotTime::from_str(&self.time) {
            Ok(time) => time.to_string(),
            Err(_) => self.time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Absence {
    pub id: i64,
    #[serde(deserialize_with = "de_date")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "de_date")]
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(default)]
    pub revenue_this_month: Option<BigDecimal>,
    #[serde(default, deserialize_with = "de_count")]
    pub appointments_done_this_month: i64,
    #[serde(default, deserialize_with = "de_count")]
    pub pending_appointments_this_month: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevenuePoint {
    pub date: String,
    pub revenue: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BarberPerformance {
    #[serde(alias = "name")]
    pub barber_name: String,
    #[serde(default, alias = "appointments", deserialize_with = "de_count")]
    pub total_appointments: i64,
    #[serde(default, alias = "completed", deserialize_with = "de_count")]
    pub completed_appointments: i64,
    #[serde(default)]
    pub revenue: Option<BigDecimal>,
}

/// A wall-clock `HH:mm` time as offered by the availability endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotTime {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for SlotTime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.trim().split(':');
        let hour = parts.next().and_then(|part| part.parse::<u32>().ok());
        let minute = parts.next().and_then(|part| part.parse::<u32>().ok());
        let seconds_ok = parts.next().map_or(true, |part| part.parse::<u32>().is_ok());
        match (hour, minute) {
            (Some(hour), Some(minute))
                if hour < 24 && minute < 60 && seconds_ok && parts.next().is_none() =>
            {
                Ok(SlotTime { hour, minute })
            }
            _ => Err(format!("invalid time {value:?}")),
        }
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Accepts `yyyy-MM-dd` or a full ISO timestamp and keeps the date part.
fn de_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let head = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(de::Error::custom)
}

/// Counts come back as JSON numbers or as strings (Postgres `COUNT`).
fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Float(value) => Ok(value as i64),
        Raw::Text(value) => value.trim().parse().map_err(de::Error::custom),
    }
}
