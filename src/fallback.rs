use chrono::{DateTime, Utc};
use rand::Rng;

use crate::models::Headline;

pub const FALLBACK_SOURCE: &str = "studio";

pub const FALLBACK_HEADLINES: &[&str] = &[
    "Small habits beat big plans.",
    "One clear task is a day saved.",
    "Less feed. More focus.",
    "If it matters, write it down once.",
    "Shipping is a form of meditation.",
    "Scroll less, choose more.",
    "Attention is your currency.",
    "Simplicity is a competitive advantage.",
    "Today’s headline: you control your time.",
];

/// Picks an index in `0..len`. `len` is never zero.
pub trait RandomSource {
    fn pick_index(&mut self, len: usize) -> usize;
}

pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

pub fn fallback_headline(rng: &mut dyn RandomSource, now: DateTime<Utc>) -> Headline {
    let index = rng.pick_index(FALLBACK_HEADLINES.len()).min(FALLBACK_HEADLINES.len() - 1);
    Headline {
        text: FALLBACK_HEADLINES[index].to_string(),
        source: FALLBACK_SOURCE.to_string(),
        url: None,
        fetched_at: now,
    }
}
