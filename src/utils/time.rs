// src/utils/time.rs

//! Release time conversion.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{AppError, Result};

/// Zone release times are displayed in, regardless of host.
pub const DISPLAY_TZ: Tz = chrono_tz::Europe::Berlin;

/// RFC1123 layout with the zone abbreviation.
pub const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Parse an RFC3339 time and render it in `tz` using `format`.
pub fn convert(wire: &str, tz: Tz, format: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(wire).map_err(|e| AppError::timestamp(wire, e))?;
    Ok(parsed.with_timezone(&tz).format(format).to_string())
}

/// Render a wire-format time for notification footers.
pub fn display(wire: &str) -> Result<String> {
    convert(wire, DISPLAY_TZ, DISPLAY_FORMAT)
}
