// Pure level math. No I/O, no Discord types - just the XP curve.
//
// The curve is `level = floor(sqrt(xp / 100))` with integer floor division
// BEFORE the square root. That double-floor makes the mapping slightly
// asymmetric: `level_for(xp_threshold(level))` is not guaranteed to round-trip
// for every level. Every deployed variant of this bot behaves that way, so the
// asymmetry is intended behavior and must not be "fixed".

/// Calculate the level for a total XP amount.
///
/// Uses an exact integer square root so large totals can't drift through
/// f64 rounding.
pub fn level_for(xp: u64) -> u32 {
    let bucket = xp / 100;
    let mut root = (bucket as f64).sqrt() as u64;
    while root.saturating_mul(root) > bucket {
        root -= 1;
    }
    while (root + 1).saturating_mul(root + 1) <= bucket {
        root += 1;
    }
    root as u32
}

/// Cumulative XP required to reach a level.
pub fn xp_threshold(level: u32) -> u64 {
    (level as u64).pow(2) * 100
}

/// Progress through the current level, ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub filled: usize,
    pub empty: usize,
    /// Whole percent, truncated, always within 0..=100.
    pub percent: u32,
    pub xp_remaining: u64,
    pub next_threshold: u64,
}

/// Compute progress-bar data for a user sitting at `xp` total XP on `level`.
///
/// The ratio is clamped to [0, 1] before deriving cells and percent, so the
/// output stays sane even for inputs that don't satisfy the usual
/// `level == level_for(xp)` invariant.
pub fn progress(xp: u64, level: u32, bar_length: usize) -> LevelProgress {
    let current_threshold = xp_threshold(level);
    let next_threshold = xp_threshold(level + 1);

    // Thresholds are strictly increasing, so xp_needed > 0 for any level.
    let xp_into_level = xp.saturating_sub(current_threshold);
    let xp_needed = next_threshold - current_threshold;

    let ratio = (xp_into_level as f64 / xp_needed as f64).clamp(0.0, 1.0);
    let filled = (bar_length as f64 * ratio) as usize;

    LevelProgress {
        filled,
        empty: bar_length - filled,
        percent: (ratio * 100.0) as u32,
        xp_remaining: xp_needed.saturating_sub(xp_into_level),
        next_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for(0), 0);
        assert_eq!(level_for(10), 0);
        assert_eq!(level_for(99), 0);
        assert_eq!(level_for(100), 1);
        assert_eq!(level_for(399), 1);
        assert_eq!(level_for(400), 2);
        assert_eq!(level_for(900), 3);
    }

    #[test]
    fn level_for_is_monotone() {
        let mut previous = 0;
        for xp in (0..50_000).step_by(7) {
            let level = level_for(xp);
            assert!(level >= previous, "level dropped at xp={}", xp);
            previous = level;
        }
    }

    #[test]
    fn thresholds_strictly_increase() {
        for level in 0..200 {
            assert!(xp_threshold(level + 1) > xp_threshold(level));
        }
    }

    #[test]
    fn double_floor_buckets_before_sqrt() {
        // 150 floors to bucket 1 before the sqrt, so it already counts as
        // level 1 - not the sqrt(1.5) a single-floor curve would give. Pin the
        // shipped behavior so a future "cleanup" of the double floor gets
        // caught.
        assert_eq!(level_for(150), 1);
        assert_eq!(level_for(199), 1);
        assert_eq!(level_for(xp_threshold(1)), 1);
        assert_eq!(level_for(xp_threshold(1) - 1), 0);
    }

    #[test]
    fn progress_cells_always_sum_to_bar_length() {
        for xp in (0..5_000).step_by(37) {
            let level = level_for(xp);
            let p = progress(xp, level, 10);
            assert_eq!(p.filled + p.empty, 10);
            assert!(p.percent <= 100);
        }
    }

    #[test]
    fn progress_at_level_start_and_near_end() {
        let start = progress(100, 1, 10);
        assert_eq!(start.filled, 0);
        assert_eq!(start.percent, 0);
        assert_eq!(start.xp_remaining, 300);
        assert_eq!(start.next_threshold, 400);

        let near_end = progress(399, 1, 10);
        assert_eq!(near_end.filled + near_end.empty, 10);
        assert_eq!(near_end.xp_remaining, 1);
        assert_eq!(near_end.percent, 99);
    }

    #[test]
    fn progress_clamps_out_of_range_input() {
        // xp below the level's own threshold (stale level column)
        let below = progress(50, 2, 10);
        assert_eq!(below.filled, 0);
        assert_eq!(below.percent, 0);

        // xp past the next threshold (level column lagging behind)
        let past = progress(10_000, 1, 10);
        assert_eq!(past.filled, 10);
        assert_eq!(past.percent, 100);
        assert_eq!(past.xp_remaining, 0);
    }
}
