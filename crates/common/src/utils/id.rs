use rand::seq::SliceRandom;
use rand::{Rng, thread_rng};
use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "agile", "bold", "calm", "deft", "easy", "fair", "glad", "hale", "idle", "just", "keen",
    "lush", "mild", "neat", "open", "pale", "rare", "safe", "tall", "vast", "warm", "zany",
    "able", "blue", "cool", "dark", "even", "fast", "good", "high", "kind", "lean", "long",
    "next", "pink", "real", "slim", "true", "wide", "zero",
];

const NOUNS: &[&str] = &[
    "ant", "bee", "cat", "dog", "elk", "fox", "gnu", "hen", "ibis", "jay", "koi", "lynx", "moth",
    "newt", "owl", "puma", "quail", "ram", "seal", "toad", "urchin", "vole", "wolf", "yak", "ape",
    "bass", "crow", "dove", "eel", "frog", "goat", "hawk", "ibex", "lark", "mole", "oryx", "pike",
    "rook", "swan", "wren",
];

/// Generate a human-readable subdomain, e.g. "bold-calm-fox"
pub fn generate_subdomain() -> String {
    let mut rng = thread_rng();
    let first = pick(ADJECTIVES, &mut rng);
    let second = pick(ADJECTIVES, &mut rng);
    let noun = pick(NOUNS, &mut rng);
    format!("{}-{}-{}", first, second, noun)
}

fn pick(words: &[&'static str], rng: &mut impl Rng) -> &'static str {
    words.choose(rng).copied().unwrap_or("tunnel")
}

/// Generate a unique request identifier using UUID v4
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
