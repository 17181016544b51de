//! Quantity parsing and display helpers.
//!
//! Form fields hold quantities as text, often blank or half typed, and
//! display them with a comma thousands separator. Computation never fails on
//! such text: anything that does not parse counts as zero.

use rust_decimal::Decimal;

/// Normalizes input for decimal parsing: trims whitespace and removes commas (thousands separator).
fn normalize_quantity_input(s: &str) -> String {
    s.trim().replace(',', "")
}

/// Parses a quantity, returning `None` for blank or unparseable input.
///
/// Handles comma as thousands separator (e.g. `"1,234.5"`).
pub fn parse_optional_quantity(s: &str) -> Option<Decimal> {
    let normalized = normalize_quantity_input(s);
    if normalized.is_empty() {
        return None;
    }
    normalized.parse().map_or_else(
        |e| {
            tracing::debug!(input = %s, "quantity does not parse, treating as zero: {}", e);
            None
        },
        Some,
    )
}

/// Parses a quantity for computation. Blank or unparseable input is zero.
pub fn parse_quantity(s: &str) -> Decimal {
    parse_optional_quantity(s).unwrap_or(Decimal::ZERO)
}

/// Formats a quantity for display with `,` every three integer digits.
///
/// Trailing fractional zeros are dropped, so `dec!(1200.50)` renders as
/// `"1,200.5"`. [`parse_quantity`] reverses this exactly.
pub fn format_quantity(value: Decimal) -> String {
    let plain = value.normalize().to_string();
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match frac_part {
        Some(frac_part) => format!("{sign}{grouped}.{frac_part}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Formats a default value, rendering exactly zero as an empty field.
pub fn blank_if_zero(value: Decimal) -> String {
    if value.is_zero() {
        String::new()
    } else {
        format_quantity(value)
    }
}

/// Formats an optional quantity for display, using "—" when `None`.
pub fn opt_quantity_display(value: &Option<Decimal>) -> String {
    value
        .map(format_quantity)
        .unwrap_or_else(|| "—".to_string())
}

/// Returns the larger of two quantities.
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}
