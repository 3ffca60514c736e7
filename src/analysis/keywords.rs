use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::models::Technique;

/// Riding-term families: a trigger stem and the related phrases worth
/// searching for when the stem shows up in a technique.
const TERM_FAMILIES: &[(&str, &[&str])] = &[
    ("brake", &["braking", "brake", "front brake", "rear brake"]),
    ("corner", &["cornering", "corner", "turn", "apex"]),
    ("jump", &["jump", "jumping", "takeoff", "landing"]),
    ("body", &["body position", "weight", "balance", "posture"]),
    ("throttle", &["throttle", "acceleration", "gas", "power"]),
];

/// Derives subtitle-search keywords for a technique from its name and
/// description using word frequency plus the static term table.
pub struct KeywordGenerator {
    max_keywords: usize,
}

impl KeywordGenerator {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }

    /// Fill in `technique.keywords` when the parser left them empty.
    pub fn ensure_keywords(&self, technique: &mut Technique) {
        if technique.keywords.is_empty() {
            technique.keywords = self.generate(&technique.name, &technique.description);
            debug!(
                "Keywords for \"{}\": {:?}",
                technique.name, technique.keywords
            );
        }
    }

    /// Keyword derivation, in priority order: core words of the name,
    /// repeated words of the description, then term-family phrases
    /// that literally occur in the technique's text.
    pub fn generate(&self, name: &str, description: &str) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();

        if let Ok(word_re) = Regex::new(r"[A-Za-z]{3,}") {
            for word in word_re.find_iter(name) {
                push_unique(&mut keywords, word.as_str().to_lowercase());
            }

            // Repeated description words, most frequent first
            let mut counts: HashMap<String, usize> = HashMap::new();
            let mut order: Vec<String> = Vec::new();
            for word in word_re.find_iter(description) {
                let word = word.as_str().to_lowercase();
                if word.len() < 4 {
                    continue;
                }
                let count = counts.entry(word.clone()).or_insert(0);
                if *count == 0 {
                    order.push(word);
                }
                *count += 1;
            }
            order.sort_by(|a, b| counts[b].cmp(&counts[a]));
            for word in order.into_iter().take(5) {
                if counts[&word] >= 2 {
                    push_unique(&mut keywords, word);
                }
            }
        }

        let haystack = format!("{} {}", name, description).to_lowercase();
        for (stem, related) in TERM_FAMILIES {
            if haystack.contains(stem) {
                for phrase in *related {
                    if haystack.contains(phrase) {
                        push_unique(&mut keywords, phrase.to_string());
                    }
                }
            }
        }

        keywords.truncate(self.max_keywords);
        keywords
    }
}

impl Default for KeywordGenerator {
    fn default() -> Self {
        Self::new(10)
    }
}

fn push_unique(keywords: &mut Vec<String>, keyword: String) {
    if !keywords.contains(&keyword) {
        keywords.push(keyword);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_words_extracted() {
        let gen = KeywordGenerator::default();
        let keywords = gen.generate("Front Brake Modulation", "");
        assert!(keywords.contains(&"front".to_string()));
        assert!(keywords.contains(&"brake".to_string()));
        assert!(keywords.contains(&"modulation".to_string()));
    }

    #[test]
    fn test_repeated_description_words_included() {
        let gen = KeywordGenerator::default();
        let keywords = gen.generate(
            "Suspension Setup",
            "Set the sag first. Proper sag makes the fork work; check the sag again after a lap.",
        );
        // "sag" is 3 letters, below the description threshold, but
        // "fork" appears once and should not make the cut either
        assert!(!keywords.contains(&"fork".to_string()));
        assert!(keywords.contains(&"suspension".to_string()));
    }

    #[test]
    fn test_term_family_expansion() {
        let gen = KeywordGenerator::default();
        let keywords = gen.generate(
            "Front Brake Control",
            "Progressive braking keeps the wheel from locking.",
        );
        // "brake" stem triggers, and both phrases occur literally
        assert!(keywords.contains(&"braking".to_string()));
        assert!(keywords.contains(&"front brake".to_string()));
    }

    #[test]
    fn test_family_phrase_must_occur_in_text() {
        let gen = KeywordGenerator::default();
        let keywords = gen.generate("Brake Late", "Brake late into the corner.");
        // "rear brake" never occurs in the text
        assert!(!keywords.contains(&"rear brake".to_string()));
    }

    #[test]
    fn test_keyword_cap() {
        let gen = KeywordGenerator::new(3);
        let keywords = gen.generate(
            "One Two Three Four Five Six",
            "seven seven eight eight nine nine",
        );
        assert_eq!(keywords.len(), 3);
    }

    #[test]
    fn test_ensure_keywords_preserves_existing() {
        let gen = KeywordGenerator::default();
        let mut tech = Technique::new("Braking", "Use the brakes.");
        tech.keywords = vec!["custom".to_string()];
        gen.ensure_keywords(&mut tech);
        assert_eq!(tech.keywords, vec!["custom".to_string()]);
    }
}
