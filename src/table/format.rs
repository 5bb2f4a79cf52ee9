//! Cell formatters: turn a raw JSON field into the text shown in a table.

use crate::utils::parse_duration_secs;
use serde_json::Value;

/// A cell formatter. `None` means the field is absent from the row.
pub type Formatter = fn(Option<&Value>) -> String;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Strings as-is, scalars via their JSON text, lists joined with commas.
pub fn plain(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| plain(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

/// Seconds as `H:MM:SS`, prefixed by `N day(s), ` past one day.
pub fn duration(value: Option<&Value>) -> String {
    format_duration(value.and_then(parse_duration_secs).unwrap_or(0))
}

pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let rest = total_secs % 86_400;
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// GPU counts are integers even when the API sends `2.0`.
pub fn gpu_count(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(count) => count.to_string(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| (f as u64).to_string())
                .unwrap_or_else(|| n.to_string()),
        },
        other => plain(other),
    }
}

pub fn boolean(value: Option<&Value>) -> String {
    match value {
        Some(Value::Bool(true)) => "yes".to_string(),
        Some(Value::Bool(false)) => "no".to_string(),
        other => plain(other),
    }
}

/// Human-readable transfer schedule from a `crontab` object.
pub fn schedule(value: Option<&Value>) -> String {
    let Some(Value::Object(cron)) = value else {
        return "Unknown".to_string();
    };

    let start_at = cron.get("start_at").and_then(Value::as_str).unwrap_or("");
    if start_at.trim().is_empty() {
        return "Unknown".to_string();
    }

    if let Some(period) = cron.get("period").filter(|p| !p.is_null()) {
        return format!("Every {}h", plain(Some(period)));
    }

    let time = cron.get("time").and_then(Value::as_str).unwrap_or("");
    if time.is_empty() {
        return "Once".to_string();
    }

    let weekdays = day_numbers(cron.get("weekdays"));
    if !weekdays.is_empty() {
        let names: Vec<&str> = weekdays
            .iter()
            .filter_map(|d| WEEKDAYS.get((*d as usize).wrapping_sub(1)).copied())
            .collect();
        return format!("Every {} at {}", names.join(","), time);
    }

    let monthdays = day_numbers(cron.get("monthdays"));
    if !monthdays.is_empty() {
        let days: Vec<String> = monthdays.iter().map(u64::to_string).collect();
        return format!("Every month on day {} at {}", days.join(","), time);
    }

    format!("Every day at {}", time)
}

fn day_numbers(value: Option<&Value>) -> Vec<u64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_u64).collect(),
        _ => Vec::new(),
    }
}
