use std::net::IpAddr;

/// Human-readable byte count (B, KB, MB, GB, TB).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Compact duration such as `42s`, `3m 5s`, `2h 10m`, `1d 4h`.
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        0..=59 => format!("{}s", seconds),
        60..=3599 => format!("{}m {}s", seconds / 60, seconds % 60),
        3600..=86399 => format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60),
        _ => format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600),
    }
}

/// Wall-clock `HH:MM:SS` (UTC) for a Unix timestamp in seconds.
pub fn format_clock_time(timestamp: f64) -> String {
    let secs = if timestamp.is_finite() && timestamp > 0.0 {
        timestamp as u64 % 86400
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Address for display: brackets stripped, IPv6 in canonical short form,
/// anything longer than 39 characters truncated.
pub fn format_ip_address(addr: &str) -> String {
    let cleaned = addr.trim_start_matches('[').trim_end_matches(']');
    match cleaned.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) if cleaned.chars().count() > 39 => {
            format!("{}...", cleaned.chars().take(36).collect::<String>())
        }
        Err(_) => cleaned.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
        assert_eq!(format_duration(90061), "1d 1h");
    }

    #[test]
    fn test_format_clock_time() {
        assert_eq!(format_clock_time(0.0), "00:00:00");
        assert_eq!(format_clock_time(86400.0 + 3723.9), "01:02:03");
        assert_eq!(format_clock_time(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_format_ip_address() {
        assert_eq!(format_ip_address("10.0.0.1"), "10.0.0.1");
        assert_eq!(format_ip_address("[2001:0db8:0000:0000:0000:0000:0000:0001]"), "2001:db8::1");
        assert_eq!(format_ip_address("not-an-ip"), "not-an-ip");
    }
}
