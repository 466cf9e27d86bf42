//! Ordered recovery ladder for stalled kernel attempts.
//!
//! Three counters gate the ladder:
//! - `retries` covers the local tiers A to C and is cleared by every restart;
//!   B's bound reaches past C's, so C is never selected
//! - `restarts` covers tiers D to F and is cleared by every rescale
//! - `rescales` covers tiers G to L and is never cleared within a solve
//!
//! The first tier whose guard admits the current counters is applied. With a
//! kernel that stalls on every call this yields [`MAX_TIER_ACTIONS`] actions
//! and [`MAX_KERNEL_CALLS`] kernel invocations per solve.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of tier actions in one solve.
pub const MAX_TIER_ACTIONS: usize = 191;

/// Maximum number of kernel invocations in one solve.
pub const MAX_KERNEL_CALLS: usize = MAX_TIER_ACTIONS + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTier {
    /// A: divide the trust-region factor by 10, keep the point.
    ShrinkTrustRegion,
    /// B: move the point by a tenth of its scaling factors.
    PerturbPoint,
    /// C: stop conditioning the point.
    DisableScaling,
    /// D: restart 1% above the extrapolated guess.
    RestartAbove,
    /// E: restart 1% below the extrapolated guess.
    RestartBelow,
    /// F: restart from the previous-step point with the initial factor.
    RestartFromOld,
    /// G: hand the kernel `|res_scaling|` as its diagonal.
    ResidualDiagonal,
    /// H: restart from the scaling factors themselves.
    PointFromScaling,
    /// I: restart from all ones.
    PointOnes,
    /// J: restart from all zeros.
    PointZeros,
    /// K: restart from the extrapolated guess with a unit diagonal.
    UnitDiagonal,
    /// L: relax the convergence tolerance by 10.
    RelaxTolerance,
}

/// Evaluation order of the ladder.
pub const LADDER: [RecoveryTier; 12] = [
    RecoveryTier::ShrinkTrustRegion,
    RecoveryTier::PerturbPoint,
    RecoveryTier::DisableScaling,
    RecoveryTier::RestartAbove,
    RecoveryTier::RestartBelow,
    RecoveryTier::RestartFromOld,
    RecoveryTier::ResidualDiagonal,
    RecoveryTier::PointFromScaling,
    RecoveryTier::PointOnes,
    RecoveryTier::PointZeros,
    RecoveryTier::UnitDiagonal,
    RecoveryTier::RelaxTolerance,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Retry,
    Restart,
    Rescale,
}

/// Attempt counters of one solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryCounters {
    pub retries: u32,
    pub restarts: u32,
    pub rescales: u32,
}

impl RetryCounters {
    /// Count `tier` and clear the buckets it restarts.
    pub fn record(&mut self, tier: RecoveryTier) {
        match tier.bucket() {
            Bucket::Retry => self.retries += 1,
            Bucket::Restart => {
                self.retries = 0;
                self.restarts += 1;
            }
            Bucket::Rescale => {
                self.retries = 0;
                self.restarts = 0;
                self.rescales += 1;
            }
        }
    }
}

impl RecoveryTier {
    fn bucket(self) -> Bucket {
        use RecoveryTier::*;
        match self {
            ShrinkTrustRegion | PerturbPoint | DisableScaling => Bucket::Retry,
            RestartAbove | RestartBelow | RestartFromOld => Bucket::Restart,
            _ => Bucket::Rescale,
        }
    }

    /// Exclusive upper bound on the tier's bucket counter.
    fn limit(self) -> u32 {
        use RecoveryTier::*;
        match self {
            ShrinkTrustRegion => 3,
            PerturbPoint => 5,
            DisableScaling => 4,
            RestartAbove => 1,
            RestartBelow => 2,
            RestartFromOld => 3,
            ResidualDiagonal => 1,
            PointFromScaling => 2,
            PointOnes => 3,
            PointZeros => 4,
            UnitDiagonal => 5,
            RelaxTolerance => 7,
        }
    }

    pub fn admits(self, counters: &RetryCounters) -> bool {
        let count = match self.bucket() {
            Bucket::Retry => counters.retries,
            Bucket::Restart => counters.restarts,
            Bucket::Rescale => counters.rescales,
        };
        count < self.limit()
    }

    /// First tier of the ladder admitted by `counters`.
    pub fn select(counters: &RetryCounters) -> Option<Self> {
        LADDER.iter().copied().find(|tier| tier.admits(counters))
    }

    pub fn letter(self) -> char {
        let position = LADDER.iter().position(|t| *t == self).unwrap_or(0);
        (b'A' + position as u8) as char
    }

    pub fn description(self) -> &'static str {
        use RecoveryTier::*;
        match self {
            ShrinkTrustRegion => "decrease trust-region factor",
            PerturbPoint => "vary solution point by scaling",
            DisableScaling => "deactivate x scaling",
            RestartAbove => "restart from extrapolated point +1%",
            RestartBelow => "restart from extrapolated point -1%",
            RestartFromOld => "restart from old values instead of extrapolated",
            ResidualDiagonal => "use residual scaling as diagonal",
            PointFromScaling => "restart from scaling factors",
            PointOnes => "restart from ones",
            PointZeros => "restart from zeros",
            UnitDiagonal => "remove diagonal scaling",
            RelaxTolerance => "relax tolerance",
        }
    }
}

impl fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.letter(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhaust() -> Vec<RecoveryTier> {
        let mut counters = RetryCounters::default();
        let mut sequence = Vec::new();
        while let Some(tier) = RecoveryTier::select(&counters) {
            counters.record(tier);
            sequence.push(tier);
            assert!(sequence.len() <= MAX_TIER_ACTIONS, "ladder must terminate");
        }
        sequence
    }

    #[test]
    fn local_bucket_order() {
        let sequence = exhaust();
        let letters: String = sequence[..6].iter().map(|t| t.letter()).collect();
        assert_eq!(letters, "AAABBD");
    }

    #[test]
    fn perturbation_shadows_scaling_switch_off() {
        let mut counters = RetryCounters::default();
        let mut letters = String::new();
        for _ in 0..6 {
            let tier = RecoveryTier::select(&counters).unwrap();
            letters.push(tier.letter());
            counters.record(tier);
        }
        assert_eq!(letters, "AAABBD");

        for retries in 0..5 {
            let counters = RetryCounters {
                retries,
                ..RetryCounters::default()
            };
            assert_ne!(
                RecoveryTier::select(&counters),
                Some(RecoveryTier::DisableScaling)
            );
        }
        assert!(!RecoveryTier::DisableScaling.admits(&RetryCounters {
            retries: 4,
            ..RetryCounters::default()
        }));
    }

    #[test]
    fn exhausts_after_documented_action_count() {
        let sequence = exhaust();
        assert_eq!(sequence.len(), MAX_TIER_ACTIONS);

        let count = |tier| sequence.iter().filter(|t| **t == tier).count();
        assert_eq!(count(RecoveryTier::ShrinkTrustRegion), 96);
        assert_eq!(count(RecoveryTier::PerturbPoint), 64);
        assert_eq!(count(RecoveryTier::DisableScaling), 0);
        assert_eq!(count(RecoveryTier::RestartAbove), 8);
        assert_eq!(count(RecoveryTier::RestartBelow), 8);
        assert_eq!(count(RecoveryTier::RestartFromOld), 8);
        for tier in &LADDER[6..11] {
            assert_eq!(count(*tier), 1, "{tier}");
        }
        assert_eq!(count(RecoveryTier::RelaxTolerance), 2);
    }

    #[test]
    fn rescale_tiers_appear_in_order() {
        let rescales: Vec<char> = exhaust()
            .into_iter()
            .filter(|t| t.bucket() == Bucket::Rescale)
            .map(RecoveryTier::letter)
            .collect();
        assert_eq!(rescales, vec!['G', 'H', 'I', 'J', 'K', 'L', 'L']);
    }

    #[test]
    fn exhausted_counters_admit_nothing() {
        let counters = RetryCounters {
            retries: 5,
            restarts: 3,
            rescales: 7,
        };
        assert_eq!(RecoveryTier::select(&counters), None);
    }

    #[test]
    fn letters_follow_ladder() {
        let letters: String = LADDER.iter().map(|t| t.letter()).collect();
        assert_eq!(letters, "ABCDEFGHIJKL");
    }
}
