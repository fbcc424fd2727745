//! Template filters for pt-BR money and dates.
//!
//! Every filter takes anything `Display` so templates can pass fields,
//! references and literals alike.

use std::{fmt::Display, str::FromStr};

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::SlotTime;

pub const MISSING_DATE: &str = "Data não informada";

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// `R$ 1.250,50`
pub fn brl<T: Display>(value: T) -> askama::Result<String> {
    Ok(format_brl(&value.to_string()))
}

/// `HH:mm` out of `HH:mm` or `HH:mm:ss`; anything else is shown as is.
pub fn hhmm<T: Display>(value: T) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(match raw.parse::<SlotTime>() {
        Ok(time) => time.to_string(),
        Err(_) => raw,
    })
}

/// `dd/MM/yyyy` out of an ISO date or timestamp.
pub fn ddmmyyyy<T: Display>(value: T) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(match parse_iso_date(&raw) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => raw,
    })
}

pub fn long_date<T: Display>(value: T) -> askama::Result<String> {
    Ok(match parse_iso_date(&value.to_string()) {
        Some(date) => long_date_pt(date),
        None => MISSING_DATE.to_string(),
    })
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// `sexta-feira, 10 de janeiro de 2025`
pub fn long_date_pt(date: NaiveDate) -> String {
    format!(
        "{}, {} de {} de {}",
        weekday_pt(date.weekday()),
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn format_brl(raw: &str) -> String {
    let Ok(value) = BigDecimal::from_str(raw.trim()) else {
        return format!("R$ {raw}");
    };
    let fixed = value.round(2).with_scale(2).to_string();
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, cents) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("R$ {sign}{grouped},{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_uses_brazilian_separators() {
        assert_eq!(format_brl("45"), "R$ 45,00");
        assert_eq!(format_brl("1250.5"), "R$ 1.250,50");
        assert_eq!(format_brl("1234567.891"), "R$ 1.234.567,89");
        assert_eq!(format_brl("-12.3"), "R$ -12,30");
        assert_eq!(brl(BigDecimal::from(0i64)).unwrap(), "R$ 0,00");
    }

    #[test]
    fn long_dates_are_portuguese() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert_eq!(long_date_pt(date), "sexta-feira, 10 de janeiro de 2025");
        assert_eq!(long_date("2025-03-01").unwrap(), "sábado, 1 de março de 2025");
        assert_eq!(long_date("").unwrap(), MISSING_DATE);
        assert_eq!(long_date("amanhã").unwrap(), MISSING_DATE);
        assert_eq!(capitalize("sexta-feira"), "Sexta-feira");
    }

    #[test]
    fn short_formats() {
        assert_eq!(ddmmyyyy("2025-07-01T03:00:00.000Z").unwrap(), "01/07/2025");
        assert_eq!(ddmmyyyy(NaiveDate::from_ymd_opt(2025, 7, 9).unwrap()).unwrap(), "09/07/2025");
        assert_eq!(hhmm("14:00:00").unwrap(), "14:00");
        assert_eq!(hhmm("depois").unwrap(), "depois");
    }
}
