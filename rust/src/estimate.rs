//! Duration parsing, plan time estimation and plan rendering.

use chrono::Duration;

use crate::models::Phase;

/// Parse a duration label: `"<N>h"` (fractional hours allowed) or `"<N>min"`.
///
/// Case and whitespace are ignored. Returns `None` for anything else,
/// including negative or non-finite values.
pub fn parse_duration(label: &str) -> Option<Duration> {
    let normalized: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    if let Some(minutes) = normalized.strip_suffix("min") {
        let minutes: i64 = minutes.parse().ok()?;
        if minutes < 0 {
            return None;
        }
        return Duration::try_minutes(minutes);
    }

    if let Some(hours) = normalized.strip_suffix('h') {
        let hours: f64 = hours.parse().ok()?;
        if !hours.is_finite() || hours < 0.0 {
            return None;
        }
        let minutes = (hours * 60.0).round();
        if minutes > i64::MAX as f64 {
            return None;
        }
        return Duration::try_minutes(minutes as i64);
    }

    None
}

/// Parse an optional label, falling back to `default` when it is missing or malformed.
pub fn duration_or_default(label: Option<&str>, default: Duration) -> Duration {
    label.and_then(parse_duration).unwrap_or(default)
}

/// Time a phase contributes: the longest task when it runs concurrently,
/// otherwise the sum of its tasks.
pub fn phase_duration(durations: &[Duration], concurrent: bool) -> Duration {
    if concurrent {
        durations.iter().copied().max().unwrap_or_else(Duration::zero)
    } else {
        durations
            .iter()
            .fold(Duration::zero(), |total, d| total + *d)
    }
}

/// Format as `"2h 30min"`, `"2h"` or `"45min"`.
pub fn format_duration(duration: Duration) -> String {
    format_minutes(duration.num_minutes())
}

/// `format_duration` for a raw minute count. Negative counts format as zero.
pub fn format_minutes(total: i64) -> String {
    let total = total.max(0);
    let (hours, minutes) = (total / 60, total % 60);
    match (hours, minutes) {
        (0, m) => format!("{}min", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}min", h, m),
    }
}

/// Render phases left to right: `a → [b, c] → d`.
pub fn visualize(phases: &[Phase]) -> String {
    phases
        .iter()
        .map(|phase| match phase.tasks.as_slice() {
            [single] => single.clone(),
            many => format!("[{}]", many.join(", ")),
        })
        .collect::<Vec<_>>()
        .join(" → ")
}
