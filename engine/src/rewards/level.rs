//! # Level Curve
//!
//! Pure functions mapping lifetime XP to level and levels to currency
//! rewards. Integer arithmetic only: the threshold for each level is the
//! previous threshold times 3/2 with floor division, starting at 150 XP
//! for level 2. The same XP total yields the same level on every platform,
//! every time.

use crate::config;
use crate::ledger::types::Grains;

/// The level a player with `xp` lifetime experience holds.
///
/// Level 1 below 150 XP, then one level per threshold crossed, capped at
/// [`config::MAX_LEVEL`]. XP keeps accumulating past the cap but grants
/// no further levels.
pub fn level_for_xp(xp: u64) -> u32 {
    let mut level = 1u32;
    let mut threshold = config::LEVEL_TWO_THRESHOLD_XP;
    while level < config::MAX_LEVEL && xp >= threshold {
        level += 1;
        threshold = threshold * config::LEVEL_GROWTH_NUM / config::LEVEL_GROWTH_DEN;
    }
    level
}

/// Total XP required to hold `level`. Level 1 requires nothing.
pub fn xp_threshold(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    let mut threshold = config::LEVEL_TWO_THRESHOLD_XP;
    for _ in 2..level.min(config::MAX_LEVEL) {
        threshold = threshold * config::LEVEL_GROWTH_NUM / config::LEVEL_GROWTH_DEN;
    }
    threshold
}

/// Currency paid for crossing into `level`: a base amount plus a step per
/// level above 1. Crossing several levels at once pays each one.
pub fn level_reward(level: u32) -> Grains {
    config::LEVEL_REWARD_BASE_GRAINS
        + config::LEVEL_REWARD_STEP_GRAINS * (level.saturating_sub(1)) as u64
}

/// The levels gained moving from `old_level` to `new_level`, with each
/// level's reward. Empty when no level was gained.
pub fn rewards_for_range(old_level: u32, new_level: u32) -> Vec<(u32, Grains)> {
    (old_level + 1..=new_level)
        .map(|level| (level, level_reward(level)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_one_below_first_threshold() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(149), 1);
    }

    #[test]
    fn first_thresholds() {
        // 150, 225, 337, 506, ...
        assert_eq!(level_for_xp(150), 2);
        assert_eq!(level_for_xp(224), 2);
        assert_eq!(level_for_xp(225), 3);
        assert_eq!(level_for_xp(336), 3);
        assert_eq!(level_for_xp(337), 4);
        assert_eq!(level_for_xp(506), 5);
    }

    #[test]
    fn curve_is_monotonic() {
        let mut last = 0;
        for xp in (0..100_000).step_by(37) {
            let level = level_for_xp(xp);
            assert!(level >= last, "level dropped at {xp} XP");
            last = level;
        }
    }

    #[test]
    fn level_caps() {
        assert_eq!(level_for_xp(u64::MAX), config::MAX_LEVEL);
    }

    #[test]
    fn thresholds_agree_with_curve() {
        for level in 2..=20 {
            let t = xp_threshold(level);
            assert_eq!(level_for_xp(t), level);
            assert_eq!(level_for_xp(t - 1), level - 1);
        }
    }

    #[test]
    fn reward_grows_with_level() {
        assert_eq!(level_reward(2), 110_000);
        assert_eq!(level_reward(3), 120_000);
        assert!(level_reward(10) > level_reward(9));
    }

    #[test]
    fn rewards_for_range_lists_each_crossed_level() {
        assert!(rewards_for_range(3, 3).is_empty());
        let gained = rewards_for_range(1, 3);
        assert_eq!(gained, vec![(2, 110_000), (3, 120_000)]);
    }
}
