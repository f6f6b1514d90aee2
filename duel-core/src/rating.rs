use duel_types::MatchOutcome;

/// Rating change applied per match between humans.
pub const BASE_K: f64 = 32.0;
/// Human-vs-synthetic matches move at half weight.
pub const BOT_MATCH_K: f64 = 16.0;
/// Logistic scale of the expected-score curve.
pub const SCALE: f64 = 400.0;
/// Ratings never drop below this.
pub const RATING_FLOOR: i32 = 100;
/// Rating assigned to accounts with no history.
pub const DEFAULT_RATING: i32 = 1200;

/// Probability of `rating` beating `opponent` under the logistic model.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / SCALE))
}

pub fn score_for(outcome: MatchOutcome) -> f64 {
    match outcome {
        MatchOutcome::Win => 1.0,
        MatchOutcome::Loss => 0.0,
        MatchOutcome::Draw => 0.5,
    }
}

/// New rating after a result, rounded and clamped to the floor.
pub fn updated_rating(rating: i32, opponent: i32, score: f64, k: f64) -> i32 {
    let next = rating as f64 + k * (score - expected_score(rating, opponent));
    (next.round() as i32).max(RATING_FLOOR)
}

/// Before/after pair for one player in a committed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingDelta {
    pub before: i32,
    pub after: i32,
}

impl RatingDelta {
    pub fn unchanged(rating: i32) -> Self {
        Self {
            before: rating,
            after: rating,
        }
    }

    pub fn change(&self) -> i32 {
        self.after - self.before
    }
}

/// Compute both sides' deltas from the ratings captured at match creation.
/// `draw` uses S = 0.5 for both; otherwise the first pair is the winner's.
pub fn rate_match(winner_rating: i32, loser_rating: i32, draw: bool, k: f64) -> (RatingDelta, RatingDelta) {
    let (winner_score, loser_score) = if draw { (0.5, 0.5) } else { (1.0, 0.0) };
    (
        RatingDelta {
            before: winner_rating,
            after: updated_rating(winner_rating, loser_rating, winner_score, k),
        },
        RatingDelta {
            before: loser_rating,
            after: updated_rating(loser_rating, winner_rating, loser_score, k),
        },
    )
}
