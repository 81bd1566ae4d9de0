//! Date and datetime formatting with CLDR-style patterns.
//!
//! Supports the named widths `short`, `medium`, `long` and `full`, or an
//! explicit pattern using `y M d E H h m s a` and `'quoted literals'`.

use time::{Date, PrimitiveDateTime, Time};

use super::i18n::{Catalogue, catalogue};

const WIDTHS: [&str; 4] = ["short", "medium", "long", "full"];

/// Format `date` for `language` (`dateformat` in templates).
pub fn dateformat(date: Date, format: &str, language: &str) -> String {
    let catalogue = catalogue(language);
    let pattern = named(format, &catalogue.date_patterns.date).unwrap_or(format);
    render(pattern, Some(date), None, catalogue)
}

/// Format `datetime` for `language` (`datetimeformat` in templates).
pub fn datetimeformat(datetime: PrimitiveDateTime, format: &str, language: &str) -> String {
    let catalogue = catalogue(language);
    let (date, time) = (datetime.date(), datetime.time());

    match WIDTHS.iter().position(|width| *width == format) {
        Some(idx) => {
            let patterns = &catalogue.date_patterns;
            patterns
                .datetime
                .replace("{date}", &render(patterns.date[idx], Some(date), None, catalogue))
                .replace("{time}", &render(patterns.time[idx], None, Some(time), catalogue))
        }
        None => render(format, Some(date), Some(time), catalogue),
    }
}

fn named<'a>(format: &str, patterns: &'a [&'static str; 4]) -> Option<&'a str> {
    WIDTHS
        .iter()
        .position(|width| *width == format)
        .map(|idx| patterns[idx])
}

fn render(pattern: &str, date: Option<Date>, time: Option<Time>, catalogue: &Catalogue) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let chars: Vec<char> = pattern.chars().collect();
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];

        if ch == '\'' {
            // `''` is a literal quote, inside or outside a quoted run.
            if chars.get(idx + 1) == Some(&'\'') {
                out.push('\'');
                idx += 2;
                continue;
            }
            idx += 1;
            while idx < chars.len() {
                if chars[idx] == '\'' {
                    if chars.get(idx + 1) == Some(&'\'') {
                        out.push('\'');
                        idx += 2;
                        continue;
                    }
                    idx += 1;
                    break;
                }
                out.push(chars[idx]);
                idx += 1;
            }
            continue;
        }

        if !ch.is_ascii_alphabetic() {
            out.push(ch);
            idx += 1;
            continue;
        }

        let mut count = 1;
        while chars.get(idx + count) == Some(&ch) {
            count += 1;
        }
        idx += count;

        match field(ch, count, date, time, catalogue) {
            Some(text) => out.push_str(&text),
            None => out.extend(std::iter::repeat_n(ch, count)),
        }
    }

    out
}

fn field(
    symbol: char,
    count: usize,
    date: Option<Date>,
    time: Option<Time>,
    catalogue: &Catalogue,
) -> Option<String> {
    let padded = |value: u8| {
        if count >= 2 {
            format!("{value:02}")
        } else {
            value.to_string()
        }
    };

    match symbol {
        'y' => {
            let year = date?.year();
            Some(if count == 2 {
                format!("{:02}", year.rem_euclid(100))
            } else {
                year.to_string()
            })
        }
        'M' | 'L' => {
            let month = u8::from(date?.month());
            let idx = usize::from(month - 1);
            Some(match count {
                1 | 2 => padded(month),
                3 => catalogue.months_abbr[idx].to_string(),
                _ => catalogue.months[idx].to_string(),
            })
        }
        'd' => Some(padded(date?.day())),
        'E' => {
            let idx = usize::from(date?.weekday().number_days_from_monday());
            Some(if count >= 4 {
                catalogue.weekdays[idx].to_string()
            } else {
                catalogue.weekdays_abbr[idx].to_string()
            })
        }
        'H' => Some(padded(time?.hour())),
        'h' => {
            let hour = time?.hour() % 12;
            Some(padded(if hour == 0 { 12 } else { hour }))
        }
        'm' => Some(padded(time?.minute())),
        's' => Some(padded(time?.second())),
        'a' => Some(catalogue.am_pm[usize::from(time?.hour() >= 12)].to_string()),
        _ => None,
    }
}
