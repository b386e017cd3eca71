//! Time parsing and formatting utilities

use crate::error::{SplicerError, SplicerResult};

fn invalid(time_str: &str) -> SplicerError {
    SplicerError::InvalidTimeFormat {
        time: time_str.to_string(),
    }
}

fn parse_component(part: &str, time_str: &str) -> SplicerResult<f64> {
    let value: f64 = part.trim().parse().map_err(|_| invalid(time_str))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(time_str));
    }
    Ok(value)
}

/// Parse seconds (`12.5`), `MM:SS(.ms)` or `HH:MM:SS(.ms)` into milliseconds
pub fn parse_time(time_str: &str) -> SplicerResult<i64> {
    let trimmed = time_str.trim();
    if trimmed.is_empty() {
        return Err(invalid(time_str));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let seconds = match parts.as_slice() {
        [seconds] => parse_component(seconds, time_str)?,
        [minutes, seconds] => {
            let seconds = parse_component(seconds, time_str)?;
            if seconds >= 60.0 {
                return Err(invalid(time_str));
            }
            parse_component(minutes, time_str)? * 60.0 + seconds
        }
        [hours, minutes, seconds] => {
            let minutes = parse_component(minutes, time_str)?;
            let seconds = parse_component(seconds, time_str)?;
            if minutes >= 60.0 || seconds >= 60.0 {
                return Err(invalid(time_str));
            }
            parse_component(hours, time_str)? * 3600.0 + minutes * 60.0 + seconds
        }
        _ => return Err(invalid(time_str)),
    };

    Ok((seconds * 1000.0).round() as i64)
}

/// `mm:ss.mmm`, or `HH:mm:ss.mmm` from one hour on
pub fn format_duration_ms(milliseconds: i64) -> String {
    let milliseconds = milliseconds.max(0);
    let total_seconds = milliseconds / 1000;
    let millis = milliseconds % 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
    }
}

/// File-name friendly duration such as `01h02m03s004ms`; zero leading units and zero ms are left out
pub fn format_filename_duration(milliseconds: i64) -> String {
    let milliseconds = milliseconds.max(0);
    let total_seconds = milliseconds / 1000;
    let millis = milliseconds % 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{:02}h", hours));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{:02}m", minutes));
    }
    out.push_str(&format!("{:02}s", seconds));
    if millis > 0 {
        out.push_str(&format!("{:03}ms", millis));
    }
    out
}
