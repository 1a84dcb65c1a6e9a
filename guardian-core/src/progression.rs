//! Experience to level mapping.

/// Experience needed to climb one level.
pub const XP_PER_LEVEL: u64 = 500;

/// Level a Guardian needs to adopt a spot.
pub const ADOPTION_MIN_LEVEL: u32 = 10;

/// Level for an experience total: `floor(xp / 500) + 1`.
pub fn level_for_xp(xp: u64) -> u32 {
    let level = xp / XP_PER_LEVEL + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// Progress through the current level, in percent (0..100).
pub fn level_progress_percent(xp: u64) -> f64 {
    (xp % XP_PER_LEVEL) as f64 * 100.0 / XP_PER_LEVEL as f64
}

/// Experience still needed to reach the next level.
pub fn xp_to_next_level(xp: u64) -> u64 {
    XP_PER_LEVEL - xp % XP_PER_LEVEL
}

/// Whether a Guardian at `level` may adopt a spot.
pub fn can_adopt(level: u32) -> bool {
    level >= ADOPTION_MIN_LEVEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adoption_gate() {
        assert!(!can_adopt(9));
        assert!(can_adopt(10));
        // 4500 XP is the first total at level 10
        assert!(!can_adopt(level_for_xp(4_499)));
        assert!(can_adopt(level_for_xp(4_500)));
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(499), 1);
        assert_eq!(level_for_xp(500), 2);
        assert_eq!(level_for_xp(999), 2);
        assert_eq!(level_for_xp(1000), 3);
    }

    #[test]
    fn test_level_never_decreases_with_more_xp() {
        let mut previous = level_for_xp(0);
        for xp in (0..20_000).step_by(37) {
            let level = level_for_xp(xp);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_level_saturates() {
        assert_eq!(level_for_xp(u64::MAX), u32::MAX);
    }

    #[test]
    fn test_progress() {
        assert_eq!(level_progress_percent(0), 0.0);
        assert_eq!(level_progress_percent(250), 50.0);
        assert_eq!(level_progress_percent(750), 50.0);
        assert_eq!(xp_to_next_level(450), 50);
        assert_eq!(xp_to_next_level(500), 500);
    }
}
