//! Amount formatting, unlock rules and clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;

/// Unlock times at or above this are UNIX timestamps, below it block heights.
pub const MAX_BLOCK_NUMBER: u64 = 500_000_000;

/// Formats atomic units as `12,345.67899874 NaCa`.
pub fn pretty_print_amount(amount: i64, config: &Config) -> String {
    let divisor = config.atomic_units_per_coin();
    let magnitude = amount.unsigned_abs();
    let whole = magnitude / divisor;
    let fraction = magnitude % divisor;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0 { "-" } else { "" };
    if config.decimal_places == 0 {
        return format!("{}{} {}", sign, grouped, config.ticker);
    }

    format!(
        "{}{}.{:0width$} {}",
        sign,
        grouped,
        fraction,
        config.ticker,
        width = usize::from(config.decimal_places)
    )
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Scan start timestamp for a freshly created wallet: a little before now, so
/// blocks mined while the wallet was being created are still scanned.
pub fn adjusted_creation_timestamp(config: &Config) -> u64 {
    current_timestamp().saturating_sub(100 * config.block_target_time.as_secs())
}

/// Whether an output with `unlock_time` can be spent once the chain is at `current_height`.
pub fn is_input_unlocked(unlock_time: u64, current_height: u64) -> bool {
    if unlock_time >= MAX_BLOCK_NUMBER {
        current_timestamp() >= unlock_time
    } else {
        current_height.saturating_add(1) >= unlock_time
    }
}
