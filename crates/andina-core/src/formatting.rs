//! Number rendering for KPI cards, tables and insight messages.

/// Fixed decimals with `,` between thousands. Non-finite input renders `0`
/// and a value that rounds to zero never carries a sign.
///
/// ```
/// use andina_core::formatting::format_number;
///
/// assert_eq!(format_number(48_250.76, 1), "48,250.8");
/// assert_eq!(format_number(-3_200_000.0, 0), "-3,200,000");
/// assert_eq!(format_number(7.0, 2), "7.00");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let fixed = format!("{:.*}", decimals as usize, value.abs());
    let (digits, fraction) = match fixed.split_once('.') {
        Some((d, f)) => (d, Some(f)),
        None => (fixed.as_str(), None),
    };

    let is_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    let mut out = String::with_capacity(fixed.len() + digits.len() / 3 + 1);
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&with_separators(digits));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Short money amount: `B` from 1e9, `M` from 1e6, `K` from 1e3 with one
/// decimal, otherwise whole units. Always `$`-prefixed.
///
/// ```
/// use andina_core::formatting::format_value;
///
/// assert_eq!(format_value(999.0), "$999");
/// assert_eq!(format_value(1500.0), "$1.5K");
/// assert_eq!(format_value(2_300_000.0), "$2.3M");
/// assert_eq!(format_value(4_000_000_000.0), "$4.0B");
/// ```
pub fn format_value(value: f64) -> String {
    const SCALES: [(f64, &str); 3] = [(1e9, "B"), (1e6, "M"), (1e3, "K")];

    match SCALES.iter().find(|(threshold, _)| value >= *threshold) {
        Some((threshold, suffix)) => format!("${}{}", format_number(value / threshold, 1), suffix),
        None => format!("${}", format_number(value, 0)),
    }
}

/// Whole-currency amount, as shown on KPI cards.
///
/// ```
/// use andina_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1_234_567.4), "$1,234,567");
/// assert_eq!(format_currency(-9.6), "$-10");
/// ```
pub fn format_currency(amount: f64) -> String {
    format!("${}", format_number(amount, 0))
}

/// One-decimal percentage with an explicit `+` on gains: `+50.0%`, `-12.5%`.
pub fn format_signed_pct(pct: f64) -> String {
    let sign = if pct > 0.0 { "+" } else { "" };
    format!("{}{:.1}%", sign, pct)
}

fn with_separators(digits: &str) -> String {
    let len = digits.len();
    digits
        .char_indices()
        .fold(String::with_capacity(len + len / 3), |mut acc, (i, c)| {
            if i > 0 && (len - i) % 3 == 0 {
                acc.push(',');
            }
            acc.push(c);
            acc
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
