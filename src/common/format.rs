//! Human-readable formatting for durations, sizes and uptimes in replies.

/// Formats a track length in milliseconds as `m:ss` or `h:mm:ss`.
/// Missing or non-positive lengths are live streams.
pub fn format_duration(duration_ms: Option<u64>) -> String {
    let Some(duration_ms) = duration_ms.filter(|d| *d > 0) else {
        return "LIVE".to_string();
    };

    let total = duration_ms / 1000;
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Formats a byte count with binary units, one decimal above bytes.
pub fn format_bytes(num_bytes: Option<u64>) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = num_bytes.unwrap_or(0) as f64;
    for (i, unit) in UNITS.iter().enumerate() {
        if value < 1024.0 || i == UNITS.len() - 1 {
            return if i == 0 {
                format!("{} {unit}", value as u64)
            } else {
                format!("{value:.1} {unit}")
            };
        }
        value /= 1024.0;
    }
    "0 B".to_string()
}

/// Formats an uptime as `1d 2h 3m 4s`, omitting leading zero units.
pub fn format_uptime(uptime_ms: Option<u64>) -> String {
    let total = uptime_ms.unwrap_or(0) / 1000;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || days > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));
    parts.join(" ")
}

/// Formats an integer with `,` thousands separators.
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_live() {
        assert_eq!(format_duration(None), "LIVE");
        assert_eq!(format_duration(Some(0)), "LIVE");
    }

    #[test]
    fn test_duration_minutes_and_hours() {
        assert_eq!(format_duration(Some(212_000)), "3:32");
        assert_eq!(format_duration(Some(59_999)), "0:59");
        assert_eq!(format_duration(Some(3_723_000)), "1:02:03");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(format_bytes(None), "0 B");
        assert_eq!(format_bytes(Some(512)), "512 B");
        assert_eq!(format_bytes(Some(1536)), "1.5 KiB");
        assert_eq!(format_bytes(Some(3 * 1024 * 1024)), "3.0 MiB");
        assert_eq!(format_bytes(Some(u64::MAX)), "16777216.0 TiB");
    }

    #[test]
    fn test_uptime() {
        assert_eq!(format_uptime(Some(4_000)), "4s");
        assert_eq!(format_uptime(Some(63_000)), "1m 3s");
        assert_eq!(format_uptime(Some(3_600_000)), "1h 0m 0s");
        assert_eq!(format_uptime(Some(93_784_000)), "1d 2h 3m 4s");
    }

    #[test]
    fn test_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_count(-1), "-1");
        assert_eq!(format_count(-12_345), "-12,345");
    }
}
