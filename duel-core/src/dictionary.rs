use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rand::seq::SliceRandom;

use duel_types::{CellColor, WORD_LENGTH};

/// Immutable word lists loaded once at startup: the answer pool, the
/// superset of legal guesses, and the curated common-word subset the
/// easier bot difficulties draw from.
#[derive(Debug)]
pub struct Dictionary {
    answers: Vec<String>,
    valid: HashSet<String>,
    common: Vec<String>,
    common_set: HashSet<String>,
}

impl Dictionary {
    /// Load `answers.json`, `valid_guesses.json` and `common_words.json`
    /// from a directory. Every file is a JSON array of lowercase 5-letter
    /// words; everything is uppercased in memory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(anyhow!("word directory does not exist: {}", dir.display()));
        }

        let answers = read_word_file(&dir.join("answers.json"))?;
        let guesses = read_word_file(&dir.join("valid_guesses.json"))?;
        let common = read_word_file(&dir.join("common_words.json"))?;

        Self::from_lists(answers, guesses, common)
    }

    /// Build a dictionary from in-memory lists. The valid-guess set is the
    /// union of answers and the extra guess list; common words outside the
    /// valid set are dropped.
    pub fn from_lists(
        answers: Vec<String>,
        extra_guesses: Vec<String>,
        common: Vec<String>,
    ) -> Result<Self> {
        let answers: Vec<String> = answers
            .into_iter()
            .filter_map(|w| normalize_guess(&w))
            .collect();
        if answers.is_empty() {
            return Err(anyhow!("answer list is empty"));
        }

        let mut valid: HashSet<String> = answers.iter().cloned().collect();
        valid.extend(extra_guesses.into_iter().filter_map(|w| normalize_guess(&w)));

        let common: Vec<String> = common
            .into_iter()
            .filter_map(|w| normalize_guess(&w))
            .filter(|w| valid.contains(w))
            .collect();
        let common_set = common.iter().cloned().collect();

        Ok(Self {
            answers,
            valid,
            common,
            common_set,
        })
    }

    /// Compact fixture dictionary for tests.
    pub fn with_test_words() -> Self {
        let answers = [
            "CRANE", "SLATE", "TRACE", "CRATE", "ALLOY", "APPLE", "HOUSE", "STONE", "PLANT",
            "SHARP", "BRAVE", "GHOST", "QUILT", "WOUND", "FLAME",
        ];
        let extras = ["SALET", "LLAMA", "AUDIO", "STARE", "ROATE", "NYMPH", "CRAVE"];
        let common = ["CRANE", "SLATE", "APPLE", "HOUSE", "STONE", "PLANT"];

        Self::from_lists(
            answers.iter().map(|w| w.to_string()).collect(),
            extras.iter().map(|w| w.to_string()).collect(),
            common.iter().map(|w| w.to_string()).collect(),
        )
        .expect("test fixture dictionary")
    }

    /// Uniform pick from the answer list.
    pub fn random_answer(&self) -> String {
        self.answers
            .choose(&mut rand::thread_rng())
            .cloned()
            .expect("answer list is never empty")
    }

    /// Case-insensitive membership test against the full guess superset.
    pub fn is_valid_guess(&self, word: &str) -> bool {
        normalize_guess(word)
            .map(|w| self.valid.contains(&w))
            .unwrap_or(false)
    }

    pub fn is_common(&self, word: &str) -> bool {
        self.common_set.contains(word)
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn common_words(&self) -> &[String] {
        &self.common
    }

    pub fn valid_guesses(&self) -> impl Iterator<Item = &String> {
        self.valid.iter()
    }

    pub fn valid_guess_count(&self) -> usize {
        self.valid.len()
    }
}

fn read_word_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read word file {}", path.display()))?;
    let words: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of words", path.display()))?;
    Ok(words)
}

/// Uppercase a candidate guess, rejecting anything that is not exactly five
/// ASCII letters.
pub fn normalize_guess(word: &str) -> Option<String> {
    let word = word.trim();
    if word.len() != WORD_LENGTH || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(word.to_ascii_uppercase())
}

/// Color a guess against a target.
///
/// First pass marks exact positional matches green and consumes those target
/// positions. Second pass marks a remaining guess letter yellow iff an
/// unconsumed target position holds the same letter, consuming the leftmost
/// such position; everything else is grey. This is what makes duplicate
/// letters come out right (ALLOY vs LLAMA = yellow, green, yellow, grey, grey).
pub fn evaluate(guess: &str, target: &str) -> [CellColor; WORD_LENGTH] {
    debug_assert_eq!(guess.len(), WORD_LENGTH);
    debug_assert_eq!(target.len(), WORD_LENGTH);

    let guess = guess.as_bytes();
    let target = target.as_bytes();

    let mut colors = [CellColor::Grey; WORD_LENGTH];
    let mut consumed = [false; WORD_LENGTH];

    for i in 0..WORD_LENGTH {
        if guess[i].eq_ignore_ascii_case(&target[i]) {
            colors[i] = CellColor::Green;
            consumed[i] = true;
        }
    }

    for i in 0..WORD_LENGTH {
        if colors[i] == CellColor::Green {
            continue;
        }
        let hit = (0..WORD_LENGTH)
            .find(|&j| !consumed[j] && target[j].eq_ignore_ascii_case(&guess[i]));
        if let Some(j) = hit {
            consumed[j] = true;
            colors[i] = CellColor::Yellow;
        }
    }

    colors
}
