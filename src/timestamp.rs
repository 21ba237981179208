//! Conversion of source-native timestamps.
//!
//! The source stores dates as fractional seconds relative to a custom epoch
//! that sits [`EPOCH_OFFSET_SECS`] after the Unix epoch. Whole seconds and the
//! millisecond fraction are converted separately so that a stored value of
//! `86400.5` lands exactly one day and 500 ms after the epoch.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::TimestampError;

/// Seconds between the Unix epoch and the source epoch.
pub const EPOCH_OFFSET_SECS: i64 = 978_310_800;

/// Converts a source-native timestamp into a UTC date.
pub fn from_source(timestamp: f64) -> Result<DateTime<Utc>, TimestampError> {
   if !timestamp.is_finite() {
      return Err(TimestampError::NotFinite(timestamp));
   }

   let millis = (timestamp * 1000.0).round();
   if millis.abs() > i64::MAX as f64 / 2.0 {
      return Err(TimestampError::OutOfRange(timestamp));
   }
   let millis = millis as i64;
   let secs = millis
      .div_euclid(1000)
      .checked_add(EPOCH_OFFSET_SECS)
      .ok_or(TimestampError::OutOfRange(timestamp))?;
   let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;

   Utc.timestamp_opt(secs, nanos)
      .single()
      .ok_or(TimestampError::OutOfRange(timestamp))
}

/// The source epoch as a UTC date.
pub fn epoch() -> DateTime<Utc> {
   DateTime::from_timestamp(EPOCH_OFFSET_SECS, 0).unwrap_or_default()
}
