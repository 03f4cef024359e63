// src/sheet/locale.rs
use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Regional formatting of numbers and dates in the source exports.
/// Defaults match Brazilian exports: `1.234,56` and `dd/mm/yyyy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub group_separator: char,
    pub day_first: bool,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: ',',
            group_separator: '.',
            day_first: true,
        }
    }
}

impl NumberFormat {
    /// `1,234.56` and `mm/dd/yyyy`.
    pub fn us() -> Self {
        Self {
            decimal_separator: '.',
            group_separator: ',',
            day_first: false,
        }
    }
}

/// Parse locale formatted text into a float.
///
/// Group separators are only stripped when they split the integer part into
/// valid groups of three digits; anything else is left for the decimal step,
/// so with the default format `1.5` still reads 1.5 while `1.234` reads 1234.
pub fn parse_number(raw: &str, fmt: &NumberFormat) -> Option<f64> {
    let s: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '\u{a0}')
        .collect();
    if s.is_empty() {
        return None;
    }

    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.strip_prefix('+').unwrap_or(&s)),
    };

    let mut parts = body.split(fmt.decimal_separator);
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let int_digits = match strip_groups(int_part, fmt.group_separator) {
        Some(d) => d,
        // not a grouped integer; allow a single `.` to act as decimal point
        None if frac_part.is_none() && fmt.group_separator == '.' => {
            return parse_plain(sign, int_part);
        }
        None => return None,
    };

    match frac_part {
        Some(frac) if frac.chars().all(|c| c.is_ascii_digit()) => {
            if int_digits.is_empty() && frac.is_empty() {
                return None;
            }
            let int_digits = if int_digits.is_empty() { "0" } else { &int_digits };
            let frac = if frac.is_empty() { "0" } else { frac };
            format!("{}{}.{}", sign, int_digits, frac).parse().ok()
        }
        Some(_) => None,
        None if int_digits.is_empty() => None,
        None => format!("{}{}", sign, int_digits).parse().ok(),
    }
}

/// Digits of an integer part, with valid thousands groups removed.
fn strip_groups(int_part: &str, group: char) -> Option<String> {
    if !int_part.contains(group) {
        return int_part
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| int_part.to_string());
    }
    let chunks: Vec<&str> = int_part.split(group).collect();
    let first_ok = matches!(chunks[0].len(), 1..=3);
    let rest_ok = chunks[1..].iter().all(|c| c.len() == 3);
    let digits_ok = chunks
        .iter()
        .all(|c| c.chars().all(|ch| ch.is_ascii_digit()));
    (first_ok && rest_ok && digits_ok).then(|| chunks.concat())
}

fn parse_plain(sign: &str, body: &str) -> Option<f64> {
    let mut dots = 0;
    for c in body.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => {}
            _ => return None,
        }
    }
    if dots > 1 || body == "." {
        return None;
    }
    format!("{}{}", sign, body).parse().ok()
}

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{1,4})[/.\-](\d{1,2})[/.\-](\d{1,4})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2})(?:\.\d+)?)?)?$",
    )
    .expect("date pattern is valid")
});

/// Parse a calendar date. Four-digit leading fields are read year first;
/// otherwise `day_first` decides between `dd/mm/yyyy` and `mm/dd/yyyy`, with
/// the other order tried when the first one is not a real date.
pub fn parse_date(raw: &str, day_first: bool) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(raw.trim())?;
    let a = &caps[1];
    let b: u32 = caps[2].parse().ok()?;
    let c = &caps[3];

    if let Some(hour) = caps.get(4) {
        let hour: u32 = hour.as_str().parse().ok()?;
        let minute: u32 = caps[5].parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
    }

    if a.len() == 4 {
        if c.len() > 2 {
            return None;
        }
        return NaiveDate::from_ymd_opt(a.parse().ok()?, b, c.parse().ok()?);
    }
    if a.len() > 2 || c.len() == 1 || c.len() == 3 {
        return None;
    }

    let year = expand_year(c)?;
    let a: u32 = a.parse().ok()?;
    let (day, month) = if day_first { (a, b) } else { (b, a) };
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

/// Two-digit years follow the strptime `%y` window: 69..=99 → 19xx.
fn expand_year(y: &str) -> Option<i32> {
    let v: i32 = y.parse().ok()?;
    Some(match y.len() {
        2 if v >= 69 => 1900 + v,
        2 => 2000 + v,
        _ => v,
    })
}

/// Largest serial Excel accepts (9999-12-31).
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Excel serial day number to date (1900 system, epoch 1899-12-30).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
