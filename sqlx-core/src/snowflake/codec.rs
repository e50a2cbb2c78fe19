//! Text forms of Snowflake values.
//!
//! The JSON result format carries every cell as a string. Temporal values use
//! an epoch form (`seconds.fraction`, days for `DATE`, and an appended
//! `offset + 1440` in minutes for `TIMESTAMP_TZ`). Values bound by the client
//! and some server settings use a textual literal form instead. Both forms are
//! accepted when decoding; binds are always written as literals.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::BoxDynError;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.9f";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";
pub(crate) const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f %:z";

const ZERO_DATE_LITERAL: &str = "0000-00-00";
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
const TZ_OFFSET_BIAS_MINUTES: i32 = 1440;

fn is_textual(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-'
}

/// `0000-00-00` is not a calendar date; it decodes to 0002-11-30.
fn zero_date() -> Result<NaiveDate, BoxDynError> {
    NaiveDate::from_ymd_opt(2, 11, 30).ok_or_else(|| "zero date out of range".into())
}

/// The zero timestamp, `0001-01-01 00:00:00`.
fn zero_instant() -> Result<NaiveDateTime, BoxDynError> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| "zero timestamp out of range".into())
}

/// Converts fractional second digits to nanoseconds, keeping at most `digits`
/// of them. Extra digits are truncated, never rounded.
fn parse_fraction(frac: &str, digits: u32) -> Result<u32, BoxDynError> {
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid fractional seconds: {:?}", frac).into());
    }

    let kept = &frac[..frac.len().min(digits.min(9) as usize)];
    let mut nanos = kept
        .bytes()
        .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'));

    for _ in kept.len()..9 {
        nanos *= 10;
    }

    Ok(nanos)
}

/// Parses `[-]seconds[.fraction]` into whole seconds and a non-negative
/// nanosecond part.
fn parse_epoch(raw: &str, digits: u32) -> Result<(i64, u32), BoxDynError> {
    let (negative, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let (whole, frac) = body.split_once('.').unwrap_or((body, ""));
    let secs: i64 = whole
        .parse()
        .map_err(|_| format!("invalid epoch seconds: {:?}", raw))?;
    let nanos = parse_fraction(frac, digits)?;

    if !negative {
        Ok((secs, nanos))
    } else if nanos == 0 {
        Ok((-secs, 0))
    } else {
        Ok((-secs - 1, 1_000_000_000 - nanos))
    }
}

fn from_epoch(secs: i64, nanos: u32) -> Result<DateTime<Utc>, BoxDynError> {
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| format!("timestamp out of range: {}.{:09}", secs, nanos).into())
}

fn parse_textual_time(raw: &str, digits: u32) -> Result<NaiveTime, BoxDynError> {
    let (hms, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let time = NaiveTime::parse_from_str(hms, "%H:%M:%S")?;
    let nanos = parse_fraction(frac, digits)?;

    time.with_nanosecond(nanos)
        .ok_or_else(|| format!("invalid time: {:?}", raw).into())
}

fn parse_offset(raw: &str) -> Result<Option<FixedOffset>, BoxDynError> {
    if raw.is_empty() {
        return Ok(None);
    }

    if raw == "Z" {
        return Ok(FixedOffset::east_opt(0));
    }

    let (sign, body) = if let Some(body) = raw.strip_prefix('+') {
        (1, body)
    } else if let Some(body) = raw.strip_prefix('-') {
        (-1, body)
    } else {
        return Err(format!("invalid UTC offset: {:?}", raw).into());
    };

    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ':') {
        return Err(format!("invalid UTC offset: {:?}", raw).into());
    }

    let digits: String = body.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(format!("invalid UTC offset: {:?}", raw).into()),
    };

    let seconds = hours.parse::<i32>()? * 3600 + minutes.parse::<i32>()? * 60;

    FixedOffset::east_opt(sign * seconds)
        .map(Some)
        .ok_or_else(|| format!("UTC offset out of range: {:?}", raw).into())
}

/// Parses `YYYY-MM-DD[( |T)HH:MM:SS[.f]][ offset]`.
fn parse_textual_timestamp(
    raw: &str,
    digits: u32,
) -> Result<(NaiveDateTime, Option<FixedOffset>), BoxDynError> {
    if raw.starts_with(ZERO_DATE_LITERAL) {
        return Ok((zero_instant()?, None));
    }

    let date = raw
        .get(..10)
        .ok_or_else(|| format!("invalid timestamp: {:?}", raw))?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;

    let rest = raw[10..].trim_start_matches(|c: char| c == ' ' || c == 'T');
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))
        .unwrap_or(rest.len());

    let time = if end == 0 {
        NaiveTime::from_hms_opt(0, 0, 0).ok_or("invalid midnight")?
    } else {
        parse_textual_time(&rest[..end], digits)?
    };

    let offset = parse_offset(rest[end..].trim())?;

    Ok((date.and_time(time), offset))
}

pub(crate) fn decode_date(raw: &str) -> Result<NaiveDate, BoxDynError> {
    if is_textual(raw) {
        if raw.starts_with(ZERO_DATE_LITERAL) {
            return zero_date();
        }

        let date = raw
            .get(..10)
            .ok_or_else(|| format!("invalid date: {:?}", raw))?;

        return Ok(NaiveDate::parse_from_str(date, DATE_FORMAT)?);
    }

    let days: i32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid date: {:?}", raw))?;

    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| format!("date out of range: {:?}", raw).into())
}

pub(crate) fn decode_time(raw: &str, digits: u32) -> Result<NaiveTime, BoxDynError> {
    if raw.contains(':') {
        return parse_textual_time(raw.trim(), digits);
    }

    let (secs, nanos) = parse_epoch(raw.trim(), digits)?;

    u32::try_from(secs)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos))
        .ok_or_else(|| format!("time out of range: {:?}", raw).into())
}

/// Decodes a wall-clock timestamp. An offset on a textual value is ignored.
pub(crate) fn decode_timestamp_ntz(raw: &str, digits: u32) -> Result<NaiveDateTime, BoxDynError> {
    if is_textual(raw) {
        return parse_textual_timestamp(raw, digits).map(|(naive, _)| naive);
    }

    let (secs, nanos) = parse_epoch(raw.trim(), digits)?;

    Ok(from_epoch(secs, nanos)?.naive_utc())
}

/// Decodes an instant. Textual values without an offset are taken as UTC.
pub(crate) fn decode_timestamp_ltz(raw: &str, digits: u32) -> Result<DateTime<Utc>, BoxDynError> {
    decode_timestamp_tz(raw, digits).map(|value| value.with_timezone(&Utc))
}

pub(crate) fn decode_timestamp_tz(
    raw: &str,
    digits: u32,
) -> Result<DateTime<FixedOffset>, BoxDynError> {
    let utc = FixedOffset::east_opt(0).ok_or("invalid UTC offset")?;

    if is_textual(raw) {
        let (naive, offset) = parse_textual_timestamp(raw, digits)?;
        let offset = offset.unwrap_or(utc);

        return offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| format!("ambiguous timestamp: {:?}", raw).into());
    }

    let (epoch, offset) = match raw.trim().split_once(' ') {
        Some((epoch, biased)) => {
            let minutes = biased
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("invalid timezone offset: {:?}", raw))?;
            let offset = minutes
                .checked_sub(TZ_OFFSET_BIAS_MINUTES)
                .and_then(|minutes| minutes.checked_mul(60))
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| format!("timezone offset out of range: {:?}", raw))?;

            (epoch, offset)
        }

        None => (raw.trim(), utc),
    };

    let (secs, nanos) = parse_epoch(epoch, digits)?;

    Ok(from_epoch(secs, nanos)?.with_timezone(&offset))
}

pub(crate) fn decode_bool(raw: &str) -> Result<bool, BoxDynError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        _ => Err(format!("invalid boolean value: {:?}", raw).into()),
    }
}

pub(crate) fn decode_binary(raw: &str) -> Result<Vec<u8>, BoxDynError> {
    Ok(hex::decode(raw.trim())?)
}
