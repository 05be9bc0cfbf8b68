//! Text formatting shared by capture and email dispatch.

use chrono::{DateTime, Local, TimeZone};
use vault_core::constants::placeholders;

/// Medium date with short time, in local time: `19 Oct 2026, 14:05`.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => format_datetime(&dt),
        None => timestamp_ms.to_string(),
    }
}

pub fn format_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%d %b %Y, %H:%M").to_string()
}

/// `From: {sender}\nDate: {date}\n\n{body}`, with placeholders for a blank
/// sender or body.
pub fn format_message(sender: &str, timestamp_ms: i64, body: &str) -> String {
    let sender = if sender.trim().is_empty() {
        placeholders::UNKNOWN_SENDER
    } else {
        sender
    };
    let body = if body.trim().is_empty() {
        placeholders::EMPTY_BODY
    } else {
        body
    };
    format!(
        "From: {sender}\nDate: {}\n\n{body}",
        format_timestamp(timestamp_ms)
    )
}
