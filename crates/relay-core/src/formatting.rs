/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use relay_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    // Sign is handled separately so grouping works on the absolute value.
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Half-ULP nudge so exact midpoints do not round down because of their
    // binary representation.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && result.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format with thousands separators and at most three decimals, dropping
/// trailing zeros.
///
/// ```
/// use relay_core::formatting::format_grouped;
///
/// assert_eq!(format_grouped(1234.0), "1,234");
/// assert_eq!(format_grouped(1234.5), "1,234.5");
/// assert_eq!(format_grouped(0.1234), "0.123");
/// ```
pub fn format_grouped(value: f64) -> String {
    trim_fraction(format_number(value, 3))
}

/// Compact rendering used by every summary: `k`/`M` scaling, one decimal below
/// 100, integers above, thousands separators, suffix without a space.
///
/// * `x > 1,000,000` → divided by 1,000,000, suffix `"M"`
/// * `1,000 < x ≤ 1,000,000` → divided by 1,000, suffix `"k"`
/// * otherwise unscaled
///
/// ```
/// use relay_core::formatting::format_compact;
///
/// assert_eq!(format_compact(999.0), "999");
/// assert_eq!(format_compact(1500.0), "1.5k");
/// assert_eq!(format_compact(2_500_000.0), "2.5M");
/// assert_eq!(format_compact(50.26), "50.3");
/// ```
pub fn format_compact(value: f64) -> String {
    let (scaled, suffix) = if value > 1_000_000.0 {
        (value / 1_000_000.0, "M")
    } else if value > 1_000.0 {
        (value / 1_000.0, "k")
    } else {
        (value, "")
    };

    let body = if scaled < 100.0 {
        trim_fraction(format_number(scaled, 1))
    } else {
        format_number(scaled, 0)
    };

    format!("{}{}", body, suffix)
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
///
/// ```
/// use relay_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Drop trailing fractional zeros and a dangling decimal point.
fn trim_fraction(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
