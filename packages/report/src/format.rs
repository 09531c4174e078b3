//! Number formatting for display.

/// Formats with two decimals, `.` thousands separators and a `,` decimal
/// mark (`1234.5` becomes `1.234,50`).
#[must_use]
pub fn format_br(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{},{fraction}", group_digits(integer, '.'))
}

/// Groups a count with `,` thousands separators (`1234` becomes `1,234`).
#[must_use]
pub fn group_thousands(value: usize) -> String {
    group_digits(&value.to_string(), ',')
}

fn group_digits(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped
}
