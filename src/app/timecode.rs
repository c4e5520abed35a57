/// Formats a seconds count the way the player displays it: unpadded minutes,
/// two-digit seconds, fractions truncated.
pub(crate) fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Parses an "M:SS" display string back into whole seconds. `None` when
/// either part is not numeric; callers treat that as zero.
pub(crate) fn parse_time(text: &str) -> Option<u64> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    let minutes = minutes.trim().parse::<u64>().ok()?;
    let seconds = seconds.trim().parse::<u64>().ok()?;
    Some(minutes * 60 + seconds)
}
