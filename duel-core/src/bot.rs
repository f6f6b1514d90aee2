use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;

use duel_types::{BotDifficulty, CellColor};

use crate::dictionary::{Dictionary, evaluate};

/// Openers pre-computed offline to maximize first-guess entropy. Non-easy
/// difficulties draw uniformly from this set.
pub const OPENERS: [&str; 5] = ["SALET", "CRANE", "SLATE", "TRACE", "CRATE"];

/// Cap on extra valid guesses mixed into the entropy pool for diversity.
const CANDIDATE_SAMPLE: usize = 500;

/// Waste words are sampled from the this many highest-distinct-letter options.
const WASTE_POOL: usize = 50;

/// Behavioral knobs per difficulty. `top_n` of None means no entropy ranking
/// at all: pick uniformly from the candidate set (the easy bot).
#[derive(Debug, Clone, Copy)]
pub struct DifficultyProfile {
    pub top_n: Option<usize>,
    pub common_filter: bool,
    pub earliest_solve: u8,
    pub pacing_ms: (u64, u64),
    pub noise: f64,
    pub waste_chance: f64,
}

pub fn profile(difficulty: BotDifficulty) -> DifficultyProfile {
    match difficulty {
        BotDifficulty::Easy => DifficultyProfile {
            top_n: None,
            common_filter: true,
            earliest_solve: 4,
            pacing_ms: (30_000, 35_000),
            noise: 0.20,
            waste_chance: 0.20,
        },
        BotDifficulty::Medium => DifficultyProfile {
            top_n: Some(20),
            common_filter: true,
            earliest_solve: 3,
            pacing_ms: (22_000, 30_000),
            noise: 0.10,
            waste_chance: 0.10,
        },
        BotDifficulty::Hard => DifficultyProfile {
            top_n: Some(5),
            common_filter: false,
            earliest_solve: 2,
            pacing_ms: (18_000, 22_000),
            noise: 0.05,
            waste_chance: 0.0,
        },
        BotDifficulty::Impossible => DifficultyProfile {
            top_n: Some(1),
            common_filter: false,
            earliest_solve: 1,
            pacing_ms: (10_000, 20_000),
            noise: 0.0,
            waste_chance: 0.0,
        },
    }
}

/// Difficulty tier assigned when matchmaking falls back to a bot.
pub fn difficulty_for_rating(rating: i32) -> BotDifficulty {
    match rating {
        r if r < 900 => BotDifficulty::Easy,
        r if r < 1200 => BotDifficulty::Medium,
        r if r < 1500 => BotDifficulty::Hard,
        _ => BotDifficulty::Impossible,
    }
}

/// Fixed rating each bot tier plays (and is rated) at.
pub fn bot_rating(difficulty: BotDifficulty) -> i32 {
    match difficulty {
        BotDifficulty::Easy => 800,
        BotDifficulty::Medium => 1100,
        BotDifficulty::Hard => 1400,
        BotDifficulty::Impossible => 1800,
    }
}

pub fn bot_display_name(difficulty: BotDifficulty) -> &'static str {
    match difficulty {
        BotDifficulty::Easy => "Scout",
        BotDifficulty::Medium => "Savvy",
        BotDifficulty::Hard => "Sharp",
        BotDifficulty::Impossible => "Sage",
    }
}

/// Knowledge a bot has accumulated over one match. Updated by pure
/// transitions; the match actor owns the current value.
#[derive(Debug, Clone)]
pub struct SyntheticState {
    pub difficulty: BotDifficulty,
    pub target: String,
    pub remaining: Vec<String>,
    pub constraints: Vec<(String, String)>,
    pub guess_count: u8,
}

impl SyntheticState {
    pub fn new(difficulty: BotDifficulty, target: String, dictionary: &Dictionary) -> Self {
        Self {
            difficulty,
            target,
            remaining: dictionary.answers().to_vec(),
            constraints: Vec::new(),
            guess_count: 0,
        }
    }

    /// Fold one observed (guess, pattern) pair into the knowledge: the
    /// constraint list grows and the remaining answers are filtered through
    /// it. Consistency means producing the same pattern the guess did.
    pub fn observe(&self, guess: &str, pattern: &str) -> Self {
        let mut constraints = self.constraints.clone();
        constraints.push((guess.to_string(), pattern.to_string()));

        let remaining = self
            .remaining
            .iter()
            .filter(|answer| pattern_string(guess, answer) == pattern)
            .cloned()
            .collect();

        Self {
            difficulty: self.difficulty,
            target: self.target.clone(),
            remaining,
            constraints,
            guess_count: self.guess_count + 1,
        }
    }
}

/// Five-character constraint encoding over {G, Y, X}.
pub fn pattern_string(guess: &str, answer: &str) -> String {
    evaluate(guess, answer)
        .iter()
        .map(CellColor::pattern_char)
        .collect()
}

pub fn satisfies_constraints(word: &str, constraints: &[(String, String)]) -> bool {
    constraints
        .iter()
        .all(|(guess, pattern)| pattern_string(guess, word) == *pattern)
}

/// Shannon entropy of the partition a candidate induces over the remaining
/// answers. Higher means better expected information gain.
pub fn entropy(candidate: &str, remaining: &[String]) -> f64 {
    if remaining.is_empty() {
        return 0.0;
    }
    let mut buckets: HashMap<String, usize> = HashMap::new();
    for answer in remaining {
        *buckets.entry(pattern_string(candidate, answer)).or_insert(0) += 1;
    }
    let total = remaining.len() as f64;
    buckets
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Pick the bot's next guess. Pure over the given state; all randomness
/// flows through `rng`.
pub fn choose_guess<R: Rng + ?Sized>(
    state: &SyntheticState,
    dictionary: &Dictionary,
    rng: &mut R,
) -> String {
    let ordinal = state.guess_count + 1;
    let prof = profile(state.difficulty);

    // Opening book: easy bots fake a casual first word, the rest use the
    // pre-computed high-entropy openers.
    if ordinal == 1 && state.constraints.is_empty() {
        if state.difficulty == BotDifficulty::Easy {
            if let Some(word) = dictionary.common_words().choose(rng) {
                return word.clone();
            }
        }
        return OPENERS.choose(rng).expect("opener set is non-empty").to_string();
    }

    let candidates = filtered_candidates(state, dictionary, prof.common_filter);

    // Endgame: with one or two candidates left and the solve gate open,
    // just go for it.
    if ordinal >= prof.earliest_solve && candidates.len() <= 2 {
        if let Some(word) = candidates.choose(rng) {
            return word.clone();
        }
    }

    let chosen = match prof.top_n {
        // Easy plays greedy-random: any plausible answer will do.
        None => candidates
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| OPENERS[0].to_string()),
        Some(top_n) => ranked_pick(state, dictionary, &candidates, top_n, &prof, rng),
    };

    maybe_waste(state, dictionary, chosen, ordinal, &prof, rng)
}

fn filtered_candidates(
    state: &SyntheticState,
    dictionary: &Dictionary,
    common_filter: bool,
) -> Vec<String> {
    if common_filter {
        let subset: Vec<String> = state
            .remaining
            .iter()
            .filter(|w| dictionary.is_common(w))
            .cloned()
            .collect();
        if !subset.is_empty() {
            return subset;
        }
    }
    state.remaining.clone()
}

/// Score a diversified pool by noisy entropy and pick from the top band.
fn ranked_pick<R: Rng + ?Sized>(
    state: &SyntheticState,
    dictionary: &Dictionary,
    candidates: &[String],
    top_n: usize,
    prof: &DifficultyProfile,
    rng: &mut R,
) -> String {
    let mut pool: Vec<String> = candidates.to_vec();

    let mut extras: Vec<&String> = dictionary.valid_guesses().collect();
    extras.shuffle(rng);
    for word in extras.into_iter().take(CANDIDATE_SAMPLE) {
        if !pool.contains(word) {
            pool.push(word.clone());
        }
    }

    let mut scored: Vec<(String, f64)> = pool
        .into_iter()
        .map(|word| {
            let jitter = prof.noise * (rng.r#gen::<f64>() - 0.5);
            let score = entropy(&word, &state.remaining) + jitter;
            (word, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_n.max(1));

    if top_n <= 1 {
        return scored[0].0.clone();
    }

    // When the common-word filter is on, lean toward common words within
    // the top band.
    if prof.common_filter {
        let common: Vec<&(String, f64)> = scored
            .iter()
            .filter(|(word, _)| dictionary.is_common(word))
            .collect();
        if let Some((word, _)) = common.choose(rng) {
            return word.clone();
        }
    }

    scored
        .choose(rng)
        .map(|(word, _)| word.clone())
        .expect("scored pool is non-empty")
}

/// Humanizing substitution: never solve before the difficulty's gate, and
/// occasionally burn a turn on an information-dense word regardless.
fn maybe_waste<R: Rng + ?Sized>(
    state: &SyntheticState,
    dictionary: &Dictionary,
    chosen: String,
    ordinal: u8,
    prof: &DifficultyProfile,
    rng: &mut R,
) -> String {
    let premature_solve = ordinal < prof.earliest_solve && state.remaining.contains(&chosen);
    let random_waste = prof.waste_chance > 0.0 && rng.r#gen::<f64>() < prof.waste_chance;
    if !premature_solve && !random_waste {
        return chosen;
    }
    waste_word(state, dictionary, rng).unwrap_or(chosen)
}

fn waste_word<R: Rng + ?Sized>(
    state: &SyntheticState,
    dictionary: &Dictionary,
    rng: &mut R,
) -> Option<String> {
    // A waste word must stay consistent with what the bot has shown it
    // knows, but should not be the solution itself while alternatives exist.
    let mut candidates: Vec<(&String, usize)> = dictionary
        .valid_guesses()
        .filter(|word| satisfies_constraints(word, &state.constraints))
        .filter(|word| !state.remaining.contains(*word))
        .map(|word| (word, distinct_letters(word)))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    candidates.truncate(WASTE_POOL);
    candidates.choose(rng).map(|(word, _)| (*word).clone())
}

fn distinct_letters(word: &str) -> usize {
    let mut seen = [false; 26];
    for b in word.bytes() {
        let idx = (b.to_ascii_uppercase() - b'A') as usize;
        seen[idx] = true;
    }
    seen.iter().filter(|&&s| s).count()
}

/// Uniform draw from the difficulty's pacing window. The server schedules
/// the actual submission after this delay.
pub fn sample_delay<R: Rng + ?Sized>(difficulty: BotDifficulty, rng: &mut R) -> Duration {
    let (lo, hi) = profile(difficulty).pacing_ms;
    Duration::from_millis(rng.gen_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn pattern_string_flattens_colors() {
        assert_eq!(pattern_string("LLAMA", "ALLOY"), "YGYXX");
        assert_eq!(pattern_string("CRANE", "CRANE"), "GGGGG");
    }

    #[test]
    fn observe_keeps_the_target_in_remaining() {
        let dict = Dictionary::with_test_words();
        let target = "CRANE".to_string();
        let mut state = SyntheticState::new(BotDifficulty::Hard, target.clone(), &dict);
        let mut rng = rng();

        for _ in 0..4 {
            let guess = choose_guess(&state, &dict, &mut rng);
            assert!(dict.is_valid_guess(&guess), "bot produced {}", guess);
            let pattern = pattern_string(&guess, &target);
            state = state.observe(&guess, &pattern);
            assert!(
                state.remaining.contains(&target),
                "target filtered out after guessing {}",
                guess
            );
            if guess == target {
                break;
            }
        }
    }

    #[test]
    fn first_guess_uses_the_opening_book() {
        let dict = Dictionary::with_test_words();
        let mut rng = rng();
        for difficulty in [
            BotDifficulty::Medium,
            BotDifficulty::Hard,
            BotDifficulty::Impossible,
        ] {
            let state = SyntheticState::new(difficulty, "HOUSE".to_string(), &dict);
            let opener = choose_guess(&state, &dict, &mut rng);
            assert!(OPENERS.contains(&opener.as_str()), "got {}", opener);
        }
    }

    #[test]
    fn easy_first_guess_is_a_common_word() {
        let dict = Dictionary::with_test_words();
        let mut rng = rng();
        let state = SyntheticState::new(BotDifficulty::Easy, "HOUSE".to_string(), &dict);
        for _ in 0..10 {
            let opener = choose_guess(&state, &dict, &mut rng);
            assert!(dict.is_common(&opener), "got {}", opener);
        }
    }

    #[test]
    fn impossible_solves_with_one_candidate_left() {
        let dict = Dictionary::with_test_words();
        let target = "CRANE".to_string();
        let state = SyntheticState::new(BotDifficulty::Impossible, target.clone(), &dict);
        // Feed the true pattern for an opener until knowledge pins the word.
        let state = state.observe("SLATE", &pattern_string("SLATE", &target));
        let state = state.observe("CRATE", &pattern_string("CRATE", &target));
        assert_eq!(state.remaining, vec![target.clone()]);

        let mut rng = rng();
        assert_eq!(choose_guess(&state, &dict, &mut rng), target);
    }

    #[test]
    fn easy_never_solves_before_its_gate() {
        let dict = Dictionary::with_test_words();
        let target = "CRANE".to_string();
        let mut rng = rng();

        // Knowledge that pins the answer exactly, but only one guess made.
        let state = SyntheticState::new(BotDifficulty::Easy, target.clone(), &dict)
            .observe("CRATE", &pattern_string("CRATE", &target));
        assert!(state.remaining.contains(&target));

        // earliest_solve for easy is 4; the second guess must never be the
        // answer as long as a legal waste word exists.
        for _ in 0..20 {
            let guess = choose_guess(&state, &dict, &mut rng);
            assert!(dict.is_valid_guess(&guess));
            if state.remaining.len() == 1 {
                assert_ne!(guess, target, "easy solved on guess 2");
            }
        }
    }

    #[test]
    fn entropy_prefers_discriminating_words() {
        let remaining = vec![
            "CRANE".to_string(),
            "CRATE".to_string(),
            "TRACE".to_string(),
            "SLATE".to_string(),
        ];
        // A word sharing letters with all candidates splits the set; a word
        // sharing none leaves one bucket.
        let informative = entropy("CRATE", &remaining);
        let useless = entropy("JUMPY", &remaining);
        assert!(informative > useless);
        assert!(useless.abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_of_uniform_split_is_log2() {
        // CRANE yields a different pattern against each of these four
        // (GGGGG, GGGXG, YGGXG, XXGXG), so every answer lands in its own
        // bucket and the entropy is exactly log2(4).
        let remaining = vec![
            "CRANE".to_string(),
            "CRATE".to_string(),
            "TRACE".to_string(),
            "SLATE".to_string(),
        ];
        let h = entropy("CRANE", &remaining);
        assert!((h - 2.0).abs() < 1e-9, "expected log2(4)=2, got {}", h);
    }

    #[test]
    fn waste_words_satisfy_constraints_and_spread_letters() {
        let dict = Dictionary::with_test_words();
        let target = "CRANE".to_string();
        let state = SyntheticState::new(BotDifficulty::Easy, target.clone(), &dict)
            .observe("HOUSE", &pattern_string("HOUSE", &target));

        let mut rng = rng();
        for _ in 0..10 {
            if let Some(word) = waste_word(&state, &dict, &mut rng) {
                assert!(satisfies_constraints(&word, &state.constraints));
            }
        }
    }

    #[test]
    fn difficulty_assignment_follows_rating_bands() {
        assert_eq!(difficulty_for_rating(450), BotDifficulty::Easy);
        assert_eq!(difficulty_for_rating(899), BotDifficulty::Easy);
        assert_eq!(difficulty_for_rating(900), BotDifficulty::Medium);
        assert_eq!(difficulty_for_rating(1199), BotDifficulty::Medium);
        assert_eq!(difficulty_for_rating(1200), BotDifficulty::Hard);
        assert_eq!(difficulty_for_rating(1350), BotDifficulty::Hard);
        assert_eq!(difficulty_for_rating(1499), BotDifficulty::Hard);
        assert_eq!(difficulty_for_rating(1500), BotDifficulty::Impossible);
        assert_eq!(difficulty_for_rating(2100), BotDifficulty::Impossible);
    }

    #[test]
    fn bot_ratings_match_difficulty_tiers() {
        assert_eq!(bot_rating(BotDifficulty::Easy), 800);
        assert_eq!(bot_rating(BotDifficulty::Medium), 1100);
        assert_eq!(bot_rating(BotDifficulty::Hard), 1400);
        assert_eq!(bot_rating(BotDifficulty::Impossible), 1800);
    }

    #[test]
    fn pacing_samples_stay_in_window() {
        let mut rng = rng();
        for difficulty in [
            BotDifficulty::Easy,
            BotDifficulty::Medium,
            BotDifficulty::Hard,
            BotDifficulty::Impossible,
        ] {
            let (lo, hi) = profile(difficulty).pacing_ms;
            for _ in 0..50 {
                let delay = sample_delay(difficulty, &mut rng);
                assert!(delay.as_millis() as u64 >= lo);
                assert!(delay.as_millis() as u64 <= hi);
            }
        }
    }

    #[test]
    fn guesses_stay_valid_and_consistent_at_every_difficulty() {
        let dict = Dictionary::with_test_words();
        let mut rng = rng();
        for difficulty in [
            BotDifficulty::Easy,
            BotDifficulty::Medium,
            BotDifficulty::Hard,
            BotDifficulty::Impossible,
        ] {
            let target = "STONE".to_string();
            let mut state = SyntheticState::new(difficulty, target.clone(), &dict);
            for _ in 0..10 {
                let guess = choose_guess(&state, &dict, &mut rng);
                assert!(dict.is_valid_guess(&guess), "{:?} produced {}", difficulty, guess);
                let pattern = pattern_string(&guess, &target);
                state = state.observe(&guess, &pattern);
                if guess == target {
                    break;
                }
                assert!(
                    state.remaining.contains(&target),
                    "{:?} filtered out the target after {}",
                    difficulty,
                    guess
                );
            }
        }
    }

    #[test]
    fn entropy_driven_tiers_solve_the_puzzle() {
        let dict = Dictionary::with_test_words();
        let mut rng = rng();
        for difficulty in [BotDifficulty::Hard, BotDifficulty::Impossible] {
            let target = "STONE".to_string();
            let mut state = SyntheticState::new(difficulty, target.clone(), &dict);
            let mut solved = false;
            for _ in 0..8 {
                let guess = choose_guess(&state, &dict, &mut rng);
                let pattern = pattern_string(&guess, &target);
                state = state.observe(&guess, &pattern);
                if guess == target {
                    solved = true;
                    break;
                }
            }
            assert!(solved, "{:?} never solved", difficulty);
        }
    }

    #[test]
    fn solve_gate_opens_at_the_profile_ordinal() {
        let dict = Dictionary::with_test_words();
        let target = "CRANE".to_string();
        let mut rng = rng();

        // Pin the knowledge to exactly one candidate.
        let pinned = SyntheticState::new(BotDifficulty::Medium, target.clone(), &dict)
            .observe("SLATE", &pattern_string("SLATE", &target))
            .observe("CRATE", &pattern_string("CRATE", &target));
        assert_eq!(pinned.remaining, vec![target.clone()]);

        // guess_count is 2, so the next ordinal is 3: medium's gate.
        assert_eq!(choose_guess(&pinned, &dict, &mut rng), target);
    }
}
