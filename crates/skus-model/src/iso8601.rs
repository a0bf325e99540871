//! Minimal ISO-8601 duration parsing: just enough of `PnYnMnDTnHnMnS` to
//! cover the durations this service actually stores (`valid_for_iso`,
//! `each_credential_valid_for_iso`, `issuance_interval_iso`). Calendar-aware
//! fields (years, months) are kept separate from the fixed-length remainder
//! because "1 month" is not a fixed number of seconds.

use chrono::{DateTime, Datelike, Months, Utc};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Iso8601Duration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("duration must start with 'P'")]
    MissingPrefix,
    #[error("invalid duration component: {0}")]
    InvalidComponent(String),
}

impl Iso8601Duration {
    /// True if this duration is made up only of calendar months/years
    /// (no day/time component), e.g. "P1M" or "P1Y".
    pub fn is_calendar_months_only(&self) -> bool {
        (self.years > 0 || self.months > 0)
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
    }

    pub fn total_calendar_months(&self) -> u32 {
        self.years * 12 + self.months
    }

    /// The fixed-length part of the duration, ignoring years/months (which
    /// cannot be expressed as a fixed number of seconds).
    pub fn fixed_part(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days))
            + chrono::Duration::hours(i64::from(self.hours))
            + chrono::Duration::minutes(i64::from(self.minutes))
            + chrono::Duration::seconds(i64::from(self.seconds))
    }

    /// Adds this duration to `from`, applying the calendar-months component
    /// with proper month-length semantics and the rest as a fixed offset.
    pub fn add_to(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = self.total_calendar_months();
        let with_months = if months > 0 {
            from.checked_add_months(Months::new(months)).unwrap_or(from)
        } else {
            from
        };
        with_months + self.fixed_part()
    }
}

impl fmt::Display for Iso8601Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

/// Parses a subset of ISO-8601 durations sufficient for this service's
/// configured intervals: `P[n Y][n M][n D][T[n H][n M][n S]]`.
pub fn parse(input: &str) -> Result<Iso8601Duration, ParseError> {
    let rest = input.strip_prefix('P').ok_or(ParseError::MissingPrefix)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut out = Iso8601Duration::default();
    consume_components(date_part, &[('Y', &mut out.years), ('M', &mut out.months), ('D', &mut out.days)])?;
    if let Some(time_part) = time_part {
        consume_components(
            time_part,
            &[('H', &mut out.hours), ('M', &mut out.minutes), ('S', &mut out.seconds)],
        )?;
    }
    Ok(out)
}

fn consume_components(mut input: &str, slots: &[(char, &mut u32)]) -> Result<(), ParseError> {
    // slots is ordered; each component in `input` must match the next
    // expected unit in sequence (Y before M before D, etc).
    let mut slots = slots.iter();
    let mut current = slots.next();
    while !input.is_empty() {
        let digit_end = input
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ParseError::InvalidComponent(input.to_string()))?;
        let (number, rest) = input.split_at(digit_end);
        let mut chars = rest.chars();
        let unit = chars.next().ok_or_else(|| ParseError::InvalidComponent(input.to_string()))?;
        let value: u32 = number
            .parse()
            .map_err(|_| ParseError::InvalidComponent(number.to_string()))?;

        loop {
            match current {
                Some((expected, _)) if *expected == unit => break,
                Some(_) => current = slots.next(),
                None => return Err(ParseError::InvalidComponent(unit.to_string())),
            }
        }
        if let Some((_, slot)) = current.as_mut() {
            **slot = value;
        }
        input = chars.as_str();
    }
    Ok(())
}

/// The `[start, end)` interval of length `interval` that contains `t`.
///
/// "P1M" aligns to calendar month boundaries in UTC. Any other interval is
/// truncated to an integer multiple of its fixed-length duration since the
/// Unix epoch.
pub fn chunk(t: DateTime<Utc>, interval: Iso8601Duration) -> (DateTime<Utc>, DateTime<Utc>) {
    if interval.total_calendar_months() == 1 && interval.days == 0 && interval.hours == 0 {
        let start = t
            .with_day(1)
            .unwrap()
            .with_hour(0)
            .unwrap()
            .with_minute(0)
            .unwrap()
            .with_second(0)
            .unwrap()
            .with_nanosecond(0)
            .unwrap();
        let end = start.checked_add_months(Months::new(1)).unwrap();
        return (start, end);
    }

    let step = interval.fixed_part();
    let step_secs = step.num_seconds().max(1);
    let epoch_secs = t.timestamp();
    let chunk_index = epoch_secs.div_euclid(step_secs);
    let start_secs = chunk_index * step_secs;
    let start = DateTime::from_timestamp(start_secs, 0).unwrap();
    let end = DateTime::from_timestamp(start_secs + step_secs, 0).unwrap();
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_plain_days() {
        assert_eq!(parse("P1D").unwrap(), Iso8601Duration { days: 1, ..Default::default() });
    }

    #[test]
    fn parses_month_and_days() {
        let d = parse("P1M5D").unwrap();
        assert_eq!(d.months, 1);
        assert_eq!(d.days, 5);
    }

    #[test]
    fn parses_time_component() {
        let d = parse("PT1H30M").unwrap();
        assert_eq!(d.hours, 1);
        assert_eq!(d.minutes, 30);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(parse("1D"), Err(ParseError::MissingPrefix)));
    }

    #[test]
    fn chunk_p1d_is_day_aligned() {
        let t = Utc.with_ymd_and_hms(2021, 1, 20, 13, 0, 0).unwrap();
        let (start, end) = chunk(t, parse("P1D").unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2021, 1, 20, 0, 0, 0).unwrap());
        assert!(start <= t && t < end);
        assert_eq!(end - start, chrono::Duration::days(1));
    }

    #[test]
    fn chunk_p1m_starts_on_first_of_month() {
        let t = Utc.with_ymd_and_hms(2021, 1, 20, 13, 0, 0).unwrap();
        let (start, end) = chunk(t, parse("P1M").unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap());
    }
}
