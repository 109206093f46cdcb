use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

/// Short, plain sentences with minimal punctuation.
pub const EASY: &[&str] = &[
    "The quick brown fox jumps over the lazy dog near the river bank.",
    "A warm cup of coffee sits on the table beside an open book.",
    "The sun set behind the mountains painting the sky in shades of gold.",
    "The cat slept on the warm windowsill all afternoon long.",
    "They packed their bags and drove to the beach for the weekend.",
    "The rain stopped and a rainbow appeared across the sky.",
    "He finished his homework and went outside to ride his bike.",
    "The snow covered everything in white and the world felt peaceful and still.",
];

/// Longer passages with a wider vocabulary.
pub const MEDIUM: &[&str] = &[
    "Programming is not about typing fast; it is about thinking clearly and solving problems with elegant solutions that stand the test of time.",
    "In the world of software development, clean code is not a luxury but a necessity. It reduces bugs, improves readability, and makes collaboration seamless.",
    "Open source software powers most of the internet today. From Linux servers to web browsers, collaborative development has become the backbone of modern technology.",
    "Version control systems like Git allow developers to track changes, collaborate on projects, and revert to previous versions of their code when something goes wrong.",
    "Sleep plays a critical role in memory consolidation, immune function, and emotional regulation. Most adults need between seven and nine hours of quality sleep each night.",
    "Writing tests for your code may seem like extra effort at first, but it saves significant time in the long run by catching bugs early and making refactoring safer.",
    "The invention of the compass transformed navigation by allowing sailors to determine direction regardless of weather conditions, enabling longer and more ambitious voyages.",
    "Forests act as carbon sinks, absorbing billions of tons of carbon dioxide each year and playing a vital role in regulating the global climate and water cycle.",
];

/// Long passages with quotes, digits and symbol-heavy punctuation.
pub const HARD: &[&str] = &[
    "The \"observer pattern\" is a software design pattern in which an object, named the subject, maintains a list of its dependents and notifies them automatically of any state changes (usually by calling one of their methods).",
    "In distributed systems, the CAP theorem (Brewer's theorem) states that it is impossible for a distributed data store to simultaneously guarantee all three of the following: consistency (C), availability (A), and partition tolerance (P); at most, two can be achieved.",
    "The Big-O notation describes the upper bound of an algorithm's time complexity: O(1) is constant, O(log n) is logarithmic, O(n) is linear, O(n log n) is linearithmic, and O(2^n) is exponential.",
    "Regular expressions (regex) use special characters to define search patterns: \"^\" matches the start of a string, \"$\" matches the end, \".\" matches any character, \"*\" means zero or more, and \"[a-z]\" defines a character class.",
    "The TCP/IP model consists of four layers: (1) the link layer, which handles physical network connections; (2) the internet layer, responsible for routing; (3) the transport layer, ensuring reliable data transfer; and (4) the application layer, where protocols like HTTP & DNS operate.",
    "OAuth 2.0 defines four grant types: (1) Authorization Code, used by server-side apps; (2) Implicit, for SPAs (now deprecated); (3) Client Credentials, for machine-to-machine communication; and (4) Resource Owner Password, which is discouraged for security reasons.",
];

pub fn passages(difficulty: Difficulty) -> &'static [&'static str] {
    match difficulty {
        Difficulty::Easy => EASY,
        Difficulty::Medium => MEDIUM,
        Difficulty::Hard => HARD,
    }
}

/// Picks race passages, never repeating the immediately preceding pick for
/// a given difficulty. Explicit state owned by whoever hosts races; there
/// is no module-level global.
#[derive(Debug, Default)]
pub struct PassagePicker {
    last: [Option<usize>; 3],
}

impl PassagePicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pick(&mut self, difficulty: Difficulty) -> &'static str {
        let pool = passages(difficulty);
        let slot = difficulty as usize;
        let mut rng = rand::thread_rng();
        let mut index = rng.gen_range(0..pool.len());
        if pool.len() > 1 {
            while Some(index) == self.last[slot] {
                index = rng.gen_range(0..pool.len());
            }
        }
        self.last[slot] = Some(index);
        pool[index]
    }
}
