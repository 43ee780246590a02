use std::time::Duration;

use chunkvault_types::error::{ChunkVaultError, Result};

pub(super) fn default_flush_threshold() -> usize {
    500
}

pub(super) fn default_poll_interval() -> String {
    "10s".to_string()
}

pub(super) fn default_idle_timeout() -> String {
    "60s".to_string()
}

pub(super) fn default_workers() -> usize {
    5
}

pub(super) fn default_task_queue_capacity() -> usize {
    100
}

pub(super) fn default_session_flush_size() -> usize {
    64
}

pub(super) fn default_fetch_threads() -> usize {
    6
}

pub(super) fn default_min_size() -> u32 {
    2 * 1024 // 2 KiB
}

pub(super) fn default_avg_size() -> u32 {
    8 * 1024 // 8 KiB
}

pub(super) fn default_max_size() -> u32 {
    16 * 1024 // 16 KiB
}

/// Parse a simple duration string like "250ms", "10s", "30m", "4h", or "2d".
/// A bare number is seconds.
pub fn parse_human_duration(raw: &str) -> Result<Duration> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ChunkVaultError::Config("duration must not be empty".into()));
    }

    let split = input
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(input.len());
    let (num_part, unit) = input.split_at(split);

    let value: u64 = num_part
        .trim()
        .parse()
        .map_err(|_| ChunkVaultError::Config(format!("invalid duration value: '{raw}'")))?;

    let duration = match unit.to_ascii_lowercase().as_str() {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(60 * 60)),
        "d" => Duration::from_secs(value.saturating_mul(60 * 60 * 24)),
        other => {
            return Err(ChunkVaultError::Config(format!(
                "unsupported duration suffix '{other}' in '{raw}' (use ms/s/m/h/d)"
            )));
        }
    };

    if duration.is_zero() {
        return Err(ChunkVaultError::Config(
            "duration must be greater than zero".into(),
        ));
    }

    Ok(duration)
}
