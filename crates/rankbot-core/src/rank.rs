//! Rank tiers and the quadratic leveling curve.
//!
//! Levels and tiers are independent views over the same XP total:
//!
//! - A **level** grows along `threshold(level) = 5 * level^2 + 50`. A user is at
//!   level `L` when they have reached `threshold(0..L)` but not `threshold(L)`.
//! - A **tier** is a named bracket from a fixed, strictly ascending table.

use thiserror::Error;

/// A named rank bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTier {
    pub name: &'static str,
    pub threshold: u64,
    pub emoji: &'static str,
}

impl RankTier {
    pub const fn new(name: &'static str, threshold: u64, emoji: &'static str) -> Self {
        Self {
            name,
            threshold,
            emoji,
        }
    }
}

/// The built-in tier ladder, ascending by threshold.
pub const STANDARD_TIERS: &[RankTier] = &[
    RankTier::new("Recruit", 0, "🔨"),
    RankTier::new("Apprentice", 1_000, "🛠️"),
    RankTier::new("Disciple", 5_000, "⚒️"),
    RankTier::new("Adept", 10_000, "🍀"),
    RankTier::new("Master", 20_000, "〽️"),
    RankTier::new("Grandmaster", 50_000, "🔮"),
    RankTier::new("Legendary", 100_000, "👑"),
    RankTier::new("Legendary II", 135_000, "👑"),
    RankTier::new("Legendary III", 175_000, "👑"),
    RankTier::new("Mythical", 200_000, "🌟"),
    RankTier::new("Mythical II", 350_000, "🌟"),
    RankTier::new("Mythical III", 425_000, "🌟"),
    RankTier::new("Immortal", 500_000, "💀"),
    RankTier::new("Immortal II", 650_000, "💀"),
    RankTier::new("Immortal III", 850_000, "💀"),
    RankTier::new("Radiant", 1_000_000, "💫"),
    RankTier::new("Divine", 2_000_000, "🔥"),
];

/// XP required to advance past `level`.
#[inline]
pub const fn level_threshold(level: u64) -> u64 {
    level.saturating_mul(level).saturating_mul(5).saturating_add(50)
}

/// Level reached with `xp` total experience.
///
/// Equivalent to counting up from zero while `xp >= level_threshold(level)`,
/// computed in closed form so very large totals stay O(1).
pub fn level_for(xp: u64) -> u64 {
    if xp < level_threshold(0) {
        return 0;
    }
    ((xp - 50) / 5).isqrt() + 1
}

/// Tier table construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankTableError {
    #[error("rank table is empty")]
    Empty,
    #[error("first tier '{0}' must have threshold 0")]
    NonZeroFloor(&'static str),
    #[error("tier '{name}' threshold {threshold} does not exceed the previous tier's")]
    NotAscending { name: &'static str, threshold: u64 },
}

/// The next tier a user is working towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextTier {
    pub tier: RankTier,
    /// XP still missing before the tier is reached.
    pub xp_needed: u64,
}

/// Everything known about a user's standing for a given XP total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankInfo {
    pub xp: u64,
    pub level: u64,
    pub tier: RankTier,
    /// `None` when `tier` is the terminal tier.
    pub next: Option<NextTier>,
    /// XP at which the next level is reached.
    pub level_xp_target: u64,
    /// XP at which the current level was reached (0 for level 0).
    pub previous_level_xp_target: u64,
}

impl RankInfo {
    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// Ordered tier ladder with a strictly ascending threshold invariant.
#[derive(Debug, Clone)]
pub struct RankTable {
    tiers: Vec<RankTier>,
}

impl RankTable {
    /// Build a table, checking that it starts at zero and strictly ascends.
    pub fn new(tiers: Vec<RankTier>) -> Result<Self, RankTableError> {
        let first = tiers.first().ok_or(RankTableError::Empty)?;
        if first.threshold != 0 {
            return Err(RankTableError::NonZeroFloor(first.name));
        }
        for pair in tiers.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(RankTableError::NotAscending {
                    name: pair[1].name,
                    threshold: pair[1].threshold,
                });
            }
        }
        Ok(Self { tiers })
    }

    /// The built-in seventeen-tier ladder.
    pub fn standard() -> Self {
        Self {
            tiers: STANDARD_TIERS.to_vec(),
        }
    }

    pub fn tiers(&self) -> &[RankTier] {
        &self.tiers
    }

    /// Resolve the rank for `xp`.
    ///
    /// The current tier is the last one whose threshold is `<= xp`. The next
    /// tier is only reported while `xp` is still below its threshold, so the
    /// scan stops at the first higher tier not yet reached.
    pub fn rank_for(&self, xp: u64) -> RankInfo {
        let mut tier = self.tiers[0];
        let mut next = None;

        for (i, candidate) in self.tiers.iter().enumerate() {
            if xp < candidate.threshold {
                break;
            }
            tier = *candidate;
            if let Some(after) = self.tiers.get(i + 1)
                && xp < after.threshold
            {
                next = Some(NextTier {
                    tier: *after,
                    xp_needed: after.threshold - xp,
                });
            }
        }

        let level = level_for(xp);
        RankInfo {
            xp,
            level,
            tier,
            next,
            level_xp_target: level_threshold(level),
            previous_level_xp_target: if level == 0 {
                0
            } else {
                level_threshold(level - 1)
            },
        }
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::standard()
    }
}
