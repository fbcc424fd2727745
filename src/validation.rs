use std::str::FromStr;

use bigdecimal::BigDecimal;

pub const NAME_ERROR: &str = "Por favor, insira o seu nome completo (nome e apelido).";
pub const PHONE_ERROR: &str = "Por favor, insira um telefone válido com DDD (10 ou 11 dígitos).";

/// A full name has at least two whitespace-separated tokens.
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace().take(2).count() == 2
}

pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// 10 or 11 digits once punctuation is stripped (Brazilian DDD + number).
pub fn is_valid_phone(phone: &str) -> bool {
    (10..=11).contains(&phone_digits(phone).len())
}

/// Checks both contact fields and returns every message that applies.
pub fn contact_errors(name: &str, phone: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if !is_full_name(name) {
        errors.push(NAME_ERROR.to_string());
    }
    if !is_valid_phone(phone) {
        errors.push(PHONE_ERROR.to_string());
    }
    errors
}

pub fn parse_price(raw: &str) -> Option<BigDecimal> {
    let normalized = raw.trim().replace(',', ".");
    let price = BigDecimal::from_str(&normalized).ok()?;
    if price < BigDecimal::from(0i64) {
        return None;
    }
    Some(price)
}

pub fn parse_duration(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|minutes| *minutes > 0)
}
