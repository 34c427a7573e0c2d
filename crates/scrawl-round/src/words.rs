//! Word selection for the drawer.

use rand::Rng;

/// Supplies the secret word at round start.
///
/// Seam for tests and for future themed/localized word packs.
pub trait WordSource: Send + Sync + 'static {
    fn pick(&self) -> String;
}

/// The built-in word list: common, drawable nouns.
pub struct WordList {
    words: Vec<String>,
}

const BUILTIN_WORDS: &[&str] = &[
    "apple", "banana", "castle", "dragon", "elephant",
    "flower", "guitar", "hammer", "island", "jungle",
    "kite", "ladder", "monkey", "notebook", "octopus",
    "penguin", "queen", "rainbow", "sandwich", "tornado",
    "umbrella", "volcano", "waterfall", "airplane", "bicycle",
    "candle", "diamond", "firework", "giraffe", "helicopter",
    "icecream", "jellyfish", "kangaroo", "lighthouse", "mushroom",
    "necklace", "parachute", "robot", "snowflake", "telescope",
    "unicorn", "violin", "windmill", "butterfly", "cactus",
    "dolphin", "eagle", "fountain", "globe", "harp",
];

impl WordList {
    /// A custom word list. Falls back to the built-in list when `words`
    /// is empty so `pick` can never fail.
    pub fn new(words: Vec<String>) -> Self {
        if words.is_empty() {
            Self::default()
        } else {
            Self { words }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordList {
    fn default() -> Self {
        Self {
            words: BUILTIN_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl WordSource for WordList {
    fn pick(&self) -> String {
        let idx = rand::rng().random_range(0..self.words.len());
        self.words[idx].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_list_has_fifty_words() {
        assert_eq!(WordList::default().len(), 50);
    }

    #[test]
    fn test_pick_returns_a_listed_word() {
        let list = WordList::default();
        for _ in 0..20 {
            let word = list.pick();
            assert!(BUILTIN_WORDS.contains(&word.as_str()));
        }
    }

    #[test]
    fn test_empty_custom_list_falls_back_to_builtin() {
        let list = WordList::new(vec![]);
        assert_eq!(list.len(), 50);
    }

    #[test]
    fn test_custom_list_is_used() {
        let list = WordList::new(vec!["teapot".into()]);
        assert_eq!(list.pick(), "teapot");
    }
}
