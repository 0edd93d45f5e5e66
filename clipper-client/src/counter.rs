/// Adds `delta` to `count`, saturating at both ends so a counter never goes below zero
pub fn adjust(count: u64, delta: i64) -> u64 {
    if delta >= 0 {
        count.saturating_add(delta.unsigned_abs())
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}

pub fn increment(count: u64) -> u64 {
    adjust(count, 1)
}

pub fn decrement(count: u64) -> u64 {
    adjust(count, -1)
}
