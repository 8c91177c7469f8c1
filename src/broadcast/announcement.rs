//! Announcement text posted to the congregation chat when going live

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::path::Path;
use tracing::info;

/// Romanian service label for the day. Sunday has a morning and an evening
/// service split at noon.
pub fn weekday_label(now: NaiveDateTime) -> &'static str {
    match now.weekday() {
        Weekday::Mon => "Luni",
        Weekday::Tue => "Marti",
        Weekday::Wed => "Miercuri",
        Weekday::Thu => "Joi",
        Weekday::Fri => "Vineri",
        Weekday::Sat => "Sambata",
        Weekday::Sun if now.hour() < 12 => "Duminica dimineata",
        Weekday::Sun => "Duminica seara",
    }
}

/// `"{label} {dd.mm.yyyy} \n{link}"`
pub fn announcement_text(now: NaiveDateTime, link: &str) -> String {
    format!(
        "{} {} \n{}",
        weekday_label(now),
        now.format("%d.%m.%Y"),
        link
    )
}

/// Overwrite the announcement file, creating parent directories as needed
pub fn write_announcement(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    info!("Announcement written to {:?}", path);
    Ok(())
}
