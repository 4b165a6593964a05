//! Bundled English word list, loaded once and shared immutably (spec
//! section 9: "module-level globals ... lazy singletons initialised once
//! ... shareable across goroutines without locks").

use std::collections::HashSet;

use once_cell::sync::Lazy;

const WORDLIST_TXT: &str = include_str!("../assets/wordlist.txt");

static DICTIONARY: Lazy<HashSet<&'static str>> =
    Lazy::new(|| WORDLIST_TXT.lines().filter(|l| !l.is_empty()).collect());

/// Whether `word` (already lowercased) appears in the bundled dictionary.
pub fn contains(word: &str) -> bool {
    DICTIONARY.contains(word)
}

pub fn len() -> usize {
    DICTIONARY.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_loads_once_and_is_nonempty() {
        assert!(len() > 1000);
        assert!(contains("the"));
        assert!(contains("government"));
        assert!(!contains("zzqxnotaword"));
    }
}
