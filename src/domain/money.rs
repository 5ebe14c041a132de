use std::fmt;

/// Money is represented as integer kobo to avoid floating-point precision issues.
/// 1 Naira = 100 kobo, so ₦50.00 = 5000 kobo.
pub type Kobo = i64;

pub const KOBO_PER_NAIRA: Kobo = 100;

/// Convert whole Naira into kobo.
pub const fn naira(units: i64) -> Kobo {
    units * KOBO_PER_NAIRA
}

/// Format kobo as a human-readable Naira amount with thousands separators.
/// Example: 123450 -> "1,234.50", -1 -> "-0.01"
pub fn format_naira(kobo: Kobo) -> String {
    let sign = if kobo < 0 { "-" } else { "" };
    let abs = kobo.unsigned_abs();
    let units = (abs / KOBO_PER_NAIRA as u64).to_string();
    let remainder = abs % KOBO_PER_NAIRA as u64;

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{:02}", sign, grouped, remainder)
}

/// Parse a decimal Naira string into kobo.
/// Accepts an optional leading "₦" or "NGN" and thousands separators.
/// Example: "50.00" -> 5000, "1,250.5" -> 125050, "100" -> 10000
pub fn parse_naira(input: &str) -> Result<Kobo, ParseNairaError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');
    let input = input
        .trim_start_matches('₦')
        .trim_start_matches("NGN")
        .trim()
        .replace(',', "");

    let parts: Vec<&str> = input.split('.').collect();
    let kobo = match parts.len() {
        1 => parse_units(parts[0])?
            .checked_mul(KOBO_PER_NAIRA)
            .ok_or(ParseNairaError::Overflow)?,
        2 => {
            let units = if parts[0].is_empty() {
                0
            } else {
                parse_units(parts[0])?
            };

            let decimal_str = parts[1];
            if !decimal_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseNairaError::InvalidFormat);
            }
            let decimal_kobo: i64 = match decimal_str.len() {
                0 => 0,
                // "12.5" means 50 kobo
                1 => parse_units(decimal_str)? * 10,
                2 => parse_units(decimal_str)?,
                // Anything past the second decimal place is truncated
                _ => parse_units(&decimal_str[..2])?,
            };

            units
                .checked_mul(KOBO_PER_NAIRA)
                .and_then(|k| k.checked_add(decimal_kobo))
                .ok_or(ParseNairaError::Overflow)?
        }
        _ => return Err(ParseNairaError::InvalidFormat),
    };

    Ok(if negative { -kobo } else { kobo })
}

fn parse_units(s: &str) -> Result<i64, ParseNairaError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseNairaError::InvalidFormat);
    }
    s.parse().map_err(|_| ParseNairaError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNairaError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseNairaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseNairaError::InvalidFormat => write!(f, "invalid money format"),
            ParseNairaError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseNairaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_naira() {
        assert_eq!(format_naira(5000), "50.00");
        assert_eq!(format_naira(1234), "12.34");
        assert_eq!(format_naira(1), "0.01");
        assert_eq!(format_naira(0), "0.00");
        assert_eq!(format_naira(123450), "1,234.50");
        assert_eq!(format_naira(100_000_000), "1,000,000.00");
        assert_eq!(format_naira(-5000), "-50.00");
        assert_eq!(format_naira(-1), "-0.01");
    }

    #[test]
    fn test_parse_naira() {
        assert_eq!(parse_naira("50.00"), Ok(5000));
        assert_eq!(parse_naira("50"), Ok(5000));
        assert_eq!(parse_naira("12.5"), Ok(1250));
        assert_eq!(parse_naira(".50"), Ok(50));
        assert_eq!(parse_naira("1,250.50"), Ok(125050));
        assert_eq!(parse_naira("₦500"), Ok(50000));
        assert_eq!(parse_naira("NGN 2000"), Ok(200000));
        assert_eq!(parse_naira("-10"), Ok(-1000));
        assert_eq!(parse_naira("100.999"), Ok(10099)); // Truncates
    }

    #[test]
    fn test_parse_naira_invalid() {
        assert_eq!(parse_naira("abc"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira("12.34.56"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira(""), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira("1e5"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira("1.₦"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira("1.5₦"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(parse_naira("1.999x"), Err(ParseNairaError::InvalidFormat));
        assert_eq!(
            parse_naira("999999999999999999999"),
            Err(ParseNairaError::Overflow)
        );
    }

    #[test]
    fn test_naira_helper() {
        assert_eq!(naira(50), 5000);
    }
}
