// Similarity scoring between local plugins and remote candidates
//
// Every score is in [0, 1], 1 meaning identical.

use crate::constants::{CASE_MISMATCH_WEIGHT, SHIFT_LENGTH_RATIO};
use crate::plugin::Plugin;

/// Scoring parameters. `Similarity::default()` uses the stock weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Cost of an edit that only changes letter case, relative to a full edit
    pub case_weight: f64,
}

impl Default for Similarity {
    fn default() -> Self {
        Self {
            case_weight: CASE_MISMATCH_WEIGHT,
        }
    }
}

impl Similarity {
    pub fn new(case_weight: f64) -> Self {
        Self { case_weight }
    }

    /// Length-normalized edit distance similarity where case-only edits
    /// are discounted by `case_weight`.
    pub fn levenshtein_index(&self, a: &str, b: &str) -> f64 {
        let (lower_a, lower_b) = (a.to_lowercase(), b.to_lowercase());

        // lowercasing may add characters (`İ` becomes `i̇`)
        let longest = [a, b, &lower_a, &lower_b]
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0);
        if longest == 0 {
            return 1.0;
        }

        let total = strsim::levenshtein(a, b) as f64;
        let uncased = strsim::levenshtein(&lower_a, &lower_b) as f64;
        let cased = (total - uncased).max(0.0);

        (1.0 - (uncased + self.case_weight * cased) / longest as f64).clamp(0.0, 1.0)
    }

    /// Similarity between two names, switching to the sliding comparison
    /// when one is much longer than the other.
    pub fn string_similarity(&self, a: &str, b: &str) -> f64 {
        let (len_a, len_b) = (a.chars().count() as f64, b.chars().count() as f64);
        let longest = len_a.max(len_b);

        if longest > 0.0 && (len_a - len_b).abs() / longest > SHIFT_LENGTH_RATIO {
            return self.shift_similarity(a, b);
        }

        self.levenshtein_index(a, b)
    }

    /// Slides the shorter string over the longer one and blends the best
    /// window 2:1 with the whole-string score.
    pub fn shift_similarity(&self, a: &str, b: &str) -> f64 {
        let (long, short) = if a.chars().count() < b.chars().count() {
            (b, a)
        } else {
            (a, b)
        };

        let long_chars: Vec<char> = long.chars().collect();
        let width = short.chars().count();
        if width == 0 {
            return if long_chars.is_empty() { 1.0 } else { 0.0 };
        }

        let windowed = long_chars
            .windows(width)
            .map(|w| self.levenshtein_index(&w.iter().collect::<String>(), short))
            .fold(0.0_f64, f64::max);

        (2.0 * windowed + self.levenshtein_index(long, short)) / 3.0
    }

    /// Greedy pairwise comparison of two lists (author lists in practice).
    ///
    /// Each entry of the shorter list is paired with the most similar
    /// entry of the longer list that is still free; the running index is
    /// pulled towards each new pair score. Surplus entries are ignored.
    pub fn matching_comparison<S: AsRef<str>>(&self, a: &[S], b: &[S]) -> f64 {
        let (a, b) = if a.len() > b.len() { (b, a) } else { (a, b) };

        let mut index = 1.0;
        let mut paired: Vec<usize> = Vec::with_capacity(a.len());

        for left in a {
            let mut best_index = None;
            let mut best = -1.0_f64;

            for (i, right) in b.iter().enumerate() {
                if paired.contains(&i) {
                    continue;
                }

                let score = self.levenshtein_index(left.as_ref(), right.as_ref());
                if score > best {
                    best = score;
                    best_index = Some(i);
                }

                if best >= 1.0 {
                    break;
                }
            }

            if let Some(i) = best_index {
                index = (2.0 * best + index) / 3.0;
                paired.push(i);
            }
        }

        index
    }

    /// Overall confidence that `local` and `remote` are the same plugin.
    pub fn comparison_index<A, B>(&self, local: &A, remote: &B) -> f64
    where
        A: Plugin + ?Sized,
        B: Plugin + ?Sized,
    {
        if local.name() == remote.name() {
            return 1.0;
        }

        let mut index = self.string_similarity(local.name(), remote.name());

        if let (Some(a), Some(b)) = (local.metadata(), remote.metadata()) {
            index *= self.matching_comparison(&split_authors(a.authors()), &split_authors(b.authors()));
        }

        index
    }
}

pub fn string_similarity(a: &str, b: &str) -> f64 {
    Similarity::default().string_similarity(a, b)
}

pub fn shift_similarity(a: &str, b: &str) -> f64 {
    Similarity::default().shift_similarity(a, b)
}

pub fn matching_comparison<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    Similarity::default().matching_comparison(a, b)
}

pub fn comparison_index<A, B>(local: &A, remote: &B) -> f64
where
    A: Plugin + ?Sized,
    B: Plugin + ?Sized,
{
    Similarity::default().comparison_index(local, remote)
}

/// Some descriptors put several authors in one comma separated field
pub fn split_authors(authors: &[String]) -> Vec<String> {
    authors
        .iter()
        .flat_map(|a| a.split(','))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
