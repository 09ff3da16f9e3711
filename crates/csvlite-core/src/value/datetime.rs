//! Datetime parsing and localization.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone};

/// Layouts carrying an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
    "%Y/%m/%d %H:%M:%S%.f %:z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Time zone used for datetimes that carry no offset of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// Coordinated Universal Time
    #[default]
    Utc,
    /// The host's local time zone
    Local,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
}

impl Location {
    /// Parses `UTC`, `Local` or an offset such as `+09:00`.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_uppercase().as_str() {
            "UTC" | "Z" | "" => return Ok(Location::Utc),
            "LOCAL" => return Ok(Location::Local),
            _ => {}
        }

        let (sign, rest) = match trimmed.as_bytes()[0] {
            b'+' => (1, &trimmed[1..]),
            b'-' => (-1, &trimmed[1..]),
            _ => return Err(Error::InvalidValue(format!("timezone {}", s))),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidValue(format!("timezone {}", s)));
        }
        let hours: i32 = digits[..2]
            .parse()
            .map_err(|_| Error::InvalidValue(format!("timezone {}", s)))?;
        let minutes: i32 = digits[2..]
            .parse()
            .map_err(|_| Error::InvalidValue(format!("timezone {}", s)))?;
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Location::Fixed)
            .ok_or_else(|| Error::InvalidValue(format!("timezone {}", s)))
    }

    fn offset_for(&self, naive: &NaiveDateTime) -> Option<FixedOffset> {
        match self {
            Location::Utc => FixedOffset::east_opt(0),
            Location::Fixed(offset) => Some(*offset),
            Location::Local => chrono::Local
                .offset_from_local_datetime(naive)
                .single()
                .map(|o| o.fix()),
        }
    }

    /// Attaches this location's offset to a wall-clock time.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset_for(&naive)?;
        offset.from_local_datetime(&naive).single()
    }

    /// Builds a datetime from a Unix timestamp, expressed in this location.
    pub fn from_timestamp(&self, secs: i64, nanos: u32) -> Option<DateTime<FixedOffset>> {
        let utc = DateTime::from_timestamp(secs, nanos)?;
        match self {
            Location::Utc => Some(utc.with_timezone(&FixedOffset::east_opt(0)?)),
            Location::Fixed(offset) => Some(utc.with_timezone(offset)),
            Location::Local => {
                let local = utc.with_timezone(&chrono::Local);
                Some(local.with_timezone(&local.offset().fix()))
            }
        }
    }
}

/// Settings consulted whenever a value is coerced to a datetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatetimeOptions {
    /// Extra layouts in chrono syntax, tried before the built-in ones
    pub formats: Vec<String>,
    /// Zone for strings without an offset and for Unix timestamps
    pub location: Location,
}

impl DatetimeOptions {
    /// Creates options from user layouts written with `%i`-style specifiers.
    pub fn new<S: AsRef<str>>(formats: &[S], location: Location) -> Self {
        Self {
            formats: formats
                .iter()
                .map(|f| convert_datetime_format(f.as_ref()))
                .collect(),
            location,
        }
    }
}

/// Translates a user datetime layout into chrono's strftime syntax.
///
/// `%i` is minutes and `%s` is seconds, as in MySQL's DATE_FORMAT.
pub fn convert_datetime_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push_str("%a"),
            Some('b') => out.push_str("%b"),
            Some('c') => out.push_str("%-m"),
            Some('d') => out.push_str("%d"),
            Some('E') => out.push_str("%e"),
            Some('e') => out.push_str("%-d"),
            Some('F') | Some('f') => out.push_str("%.6f"),
            Some('H') => out.push_str("%H"),
            Some('h') => out.push_str("%I"),
            Some('i') => out.push_str("%M"),
            Some('l') => out.push_str("%-I"),
            Some('M') => out.push_str("%B"),
            Some('m') => out.push_str("%m"),
            Some('N') => out.push_str("%.f"),
            Some('n') => out.push_str("%.9f"),
            Some('p') => out.push_str("%p"),
            Some('r') => out.push_str("%I:%M:%S %p"),
            Some('s') => out.push_str("%S"),
            Some('T') => out.push_str("%H:%M:%S"),
            Some('W') => out.push_str("%A"),
            Some('Y') => out.push_str("%Y"),
            Some('y') => out.push_str("%y"),
            Some('Z') => out.push_str("%:z"),
            Some('z') => out.push_str("%Z"),
            Some('%') => out.push_str("%%"),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

fn parse_with(s: &str, format: &str, location: &Location) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(s, format) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
        return location.localize(naive);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, format) {
        return location.localize(date.and_hms_opt(0, 0, 0)?);
    }
    None
}

/// Parses a datetime string with the user layouts first, then the built-in ones.
pub fn str_to_time(s: &str, options: &DatetimeOptions) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    for format in &options.formats {
        if let Some(dt) = parse_with(s, format, &options.location) {
            return Some(dt);
        }
    }

    if s.len() < 8 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return options.location.localize(naive);
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return options.location.localize(date.and_hms_opt(0, 0, 0)?);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_builtin_formats() {
        let opts = DatetimeOptions::default();
        let dt = str_to_time("2012-02-03 09:18:15", &opts).unwrap();
        assert_eq!(dt.timestamp(), 1328260695);

        let dt = str_to_time("2012-02-03T09:18:15.123+09:00", &opts).unwrap();
        assert_eq!(dt.nanosecond(), 123_000_000);
        assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);

        let dt = str_to_time("2012/02/03", &opts).unwrap();
        assert_eq!(dt.hour(), 0);

        assert!(str_to_time("abcdefghij", &opts).is_none());
        assert!(str_to_time("12", &opts).is_none());
    }

    #[test]
    fn test_user_formats() {
        let opts = DatetimeOptions::new(&["%d.%m.%Y %H:%i"], Location::Utc);
        assert_eq!(opts.formats[0], "%d.%m.%Y %H:%M");
        let dt = str_to_time("03.02.2012 09:18", &opts).unwrap();
        assert_eq!(dt.minute(), 18);
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(Location::parse("utc").unwrap(), Location::Utc);
        assert_eq!(Location::parse("Local").unwrap(), Location::Local);
        assert_eq!(
            Location::parse("+09:00").unwrap(),
            Location::Fixed(FixedOffset::east_opt(9 * 3600).unwrap())
        );
        assert!(Location::parse("Mars/Olympus").is_err());
    }
}
