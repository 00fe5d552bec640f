//! Run scoring.
//!
//! Pure function of run duration and commit count; nothing else affects the
//! score.

use chrono::{DateTime, Utc};

use crate::types::Score;

/// Base score every run starts from.
const BASE_SCORE: u32 = 100;
/// Bonus awarded when the run finishes under this many seconds.
const SPEED_BONUS_THRESHOLD_SECS: i64 = 300;
const SPEED_BONUS: u32 = 10;
/// Commits beyond this count cost `COMMIT_PENALTY_PER_EXTRA` each.
const COMMIT_PENALTY_THRESHOLD: u32 = 20;
const COMMIT_PENALTY_PER_EXTRA: u32 = 2;

/// Score a run: `final = max(0, 100 + speed_bonus - efficiency_penalty)`.
#[must_use]
pub fn calculate(
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_commits: u32,
) -> Score {
    let elapsed = (completed_at - started_at).num_seconds().max(0);

    let speed_bonus = if elapsed < SPEED_BONUS_THRESHOLD_SECS {
        SPEED_BONUS
    } else {
        0
    };
    let efficiency_penalty =
        total_commits.saturating_sub(COMMIT_PENALTY_THRESHOLD) * COMMIT_PENALTY_PER_EXTRA;
    let final_score = (BASE_SCORE + speed_bonus).saturating_sub(efficiency_penalty);

    Score {
        base: BASE_SCORE,
        speed_bonus,
        efficiency_penalty,
        final_score,
        execution_secs: elapsed.unsigned_abs(),
        commit_count: total_commits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn score_for(elapsed_secs: i64, commits: u32) -> Score {
        let started = Utc::now();
        calculate(started, started + Duration::seconds(elapsed_secs), commits)
    }

    #[test]
    fn test_fast_run_gets_speed_bonus() {
        let score = score_for(299, 0);
        assert_eq!(score.speed_bonus, 10);
        assert_eq!(score.final_score, 110);
    }

    #[test]
    fn test_slow_run_gets_no_bonus() {
        let score = score_for(300, 0);
        assert_eq!(score.speed_bonus, 0);
        assert_eq!(score.final_score, 100);
    }

    #[test]
    fn test_commit_penalty_starts_above_threshold() {
        assert_eq!(score_for(10, 20).efficiency_penalty, 0);
        assert_eq!(score_for(10, 21).efficiency_penalty, 2);
        assert_eq!(score_for(10, 30).efficiency_penalty, 20);
    }

    #[test]
    fn test_final_score_never_negative() {
        let score = score_for(400, 100);
        assert_eq!(score.efficiency_penalty, 160);
        assert_eq!(score.final_score, 0);
    }

    #[test]
    fn test_formula_holds() {
        for (elapsed, commits) in [(0, 0), (299, 19), (301, 25), (1000, 60)] {
            let score = score_for(elapsed, commits);
            let expected = (score.base + score.speed_bonus).saturating_sub(score.efficiency_penalty);
            assert_eq!(score.final_score, expected);
        }
    }
}
