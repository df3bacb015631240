use chrono::{Datelike, Local, Months, NaiveDate};

use crate::error::AppError;

/// Largest magnitude accepted for any amount or measured value.
pub const MAX_MAGNITUDE: f64 = 1e12;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;

    if !scaled.is_finite() {
        return value;
    }

    scaled.round() / factor
}

pub fn money(value: f64) -> f64 {
    round_to(value, 2)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

pub fn require_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }

    Ok(trimmed.to_string())
}

/// Rejects non-finite values and anything past [`MAX_MAGNITUDE`], which could overflow once summed.
pub fn require_number(field: &str, value: f64) -> Result<f64, AppError> {
    if !value.is_finite() || value.abs() > MAX_MAGNITUDE {
        return Err(AppError::validation(format!(
            "{field} must be a number no larger than {MAX_MAGNITUDE:e}"
        )));
    }

    Ok(value)
}

pub fn require_non_negative(field: &str, value: f64) -> Result<f64, AppError> {
    if require_number(field, value)? < 0.0 {
        return Err(AppError::validation(format!("{field} must be zero or more")));
    }

    Ok(value)
}

/// Trims optional text, turning blank strings into `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Month {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl Month {
    pub fn containing(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first);

        Self { first, last }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
            .map(Self::containing)
            .map_err(|_| AppError::validation("month must be formatted as YYYY-MM"))
    }

    pub fn previous(&self, count: u32) -> Self {
        Self::containing(
            self.first
                .checked_sub_months(Months::new(count))
                .unwrap_or(self.first),
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    pub fn label(&self) -> String {
        self.first.format("%Y-%m").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_round() {
        assert_eq!(money(10.005_1), 10.01);
        assert_eq!(money(-3.333), -3.33);
        assert_eq!(round_to(66.666, 1), 66.7);
        assert_eq!(money(1e307), 1e307);
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", "  Padaria Pão Quente ").unwrap(), "Padaria Pão Quente");
        assert!(require_text("name", "   ").is_err());
    }

    #[test]
    fn test_require_non_negative() {
        assert!(require_non_negative("salary", 0.0).is_ok());
        assert!(require_non_negative("salary", -1.0).is_err());
        assert!(require_non_negative("salary", f64::NAN).is_err());
        assert!(require_non_negative("salary", 1e307).is_err());
    }

    #[test]
    fn test_require_number_bounds() {
        assert_eq!(require_number("value", -MAX_MAGNITUDE).unwrap(), -MAX_MAGNITUDE);
        assert!(require_number("value", MAX_MAGNITUDE * 10.0).is_err());
        assert!(require_number("value", f64::INFINITY).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" a ".into())), Some("a".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn test_month_bounds() {
        let feb = Month::parse("2024-02").unwrap();
        assert_eq!(feb.first, date(2024, 2, 1));
        assert_eq!(feb.last, date(2024, 2, 29));
        assert!(feb.contains(date(2024, 2, 29)));
        assert!(!feb.contains(date(2024, 3, 1)));

        let dec = Month::containing(date(2023, 12, 15));
        assert_eq!(dec.last, date(2023, 12, 31));
        assert_eq!(dec.label(), "2023-12");
    }

    #[test]
    fn test_month_previous() {
        let jan = Month::parse("2024-01").unwrap();
        assert_eq!(jan.previous(1).label(), "2023-12");
        assert_eq!(jan.previous(12).label(), "2023-01");
    }

    #[test]
    fn test_month_parse_invalid() {
        assert!(Month::parse("2024-13").is_err());
        assert!(Month::parse("janeiro").is_err());
    }
}
