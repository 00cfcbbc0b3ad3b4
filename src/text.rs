//! Text transform stages
//!
//! Finalized text passes through a fixed sequence of pure `&str -> String`
//! stages before formatting and injection: hot-word substitution, then
//! punctuation normalization. Stages are always invoked; an empty hot-word
//! table or disabled punctuation makes a stage an identity function, so
//! adding behavior is a config change, not a pipeline change.

use crate::config::TextConfig;
use regex::Regex;
use std::collections::HashMap;

/// A pure transform stage
pub type TransformStage = Box<dyn Fn(&str) -> String + Send + Sync>;

/// The configured stage sequence
pub struct TextTransforms {
    stages: Vec<TransformStage>,
}

impl TextTransforms {
    pub fn from_config(config: &TextConfig) -> Self {
        let mut stages: Vec<TransformStage> = Vec::new();

        // Stage 1: hot-word substitution (case-insensitive, whole words)
        let hot_words: HashMap<String, String> = config
            .hot_words
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        stages.push(Box::new(move |text| apply_hot_words(text, &hot_words)));

        // Stage 2: punctuation normalization
        let spoken = config.spoken_punctuation;
        stages.push(Box::new(move |text| {
            if spoken {
                clean_punctuation_spacing(&apply_spoken_punctuation(text))
            } else {
                text.to_string()
            }
        }));

        Self { stages }
    }

    /// Run the text through every stage, in order
    pub fn apply(&self, text: &str) -> String {
        self.stages
            .iter()
            .fold(text.to_string(), |acc, stage| stage(&acc))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Apply hot-word substitutions
fn apply_hot_words(text: &str, hot_words: &HashMap<String, String>) -> String {
    let mut result = text.to_string();
    for (word, replacement) in hot_words {
        result = replace_phrase_case_insensitive(&result, word, replacement);
    }
    result
}

/// Convert spoken punctuation words to symbols
fn apply_spoken_punctuation(text: &str) -> String {
    let mut result = text.to_string();

    // Order matters: longer phrases first to avoid partial matches
    let punctuation_map: &[(&str, &str)] = &[
        ("question mark", "?"),
        ("exclamation mark", "!"),
        ("exclamation point", "!"),
        ("open paren", "("),
        ("close paren", ")"),
        ("new paragraph", "\n\n"),
        ("new line", "\n"),
        ("period", "."),
        ("comma", ","),
        ("colon", ":"),
        ("semicolon", ";"),
        ("dash", "-"),
        ("hyphen", "-"),
    ];

    for (phrase, symbol) in punctuation_map {
        result = replace_phrase_case_insensitive(&result, phrase, symbol);
    }

    result
}

/// Replace a word/phrase case-insensitively with proper word boundaries
fn replace_phrase_case_insensitive(text: &str, from: &str, to: &str) -> String {
    let escaped = regex::escape(from);
    let pattern = format!(r"(?i)\b{}\b", escaped);

    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, to).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Clean up spacing around punctuation marks
fn clean_punctuation_spacing(text: &str) -> String {
    let mut result = text.to_string();

    // No space before closing punctuation
    for punct in ['.', ',', '?', '!', ':', ';', ')'] {
        result = result.replace(&format!(" {}", punct), &punct.to_string());
    }

    // No space after opening parens
    result = result.replace("( ", "(");
    result = result.replace(" (", "(");

    // No spaces around newlines
    result = result.replace(" \n", "\n");
    result = result.replace("\n ", "\n");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(spoken_punctuation: bool, hot_words: &[(&str, &str)]) -> TextConfig {
        TextConfig {
            spoken_punctuation,
            hot_words: hot_words
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn stages_are_always_present() {
        let transforms = TextTransforms::from_config(&TextConfig::default());
        assert_eq!(transforms.stage_count(), 2);
    }

    #[test]
    fn default_config_is_identity() {
        let transforms = TextTransforms::from_config(&TextConfig::default());
        assert_eq!(transforms.apply("hello period world"), "hello period world");
    }

    #[test]
    fn hot_words_replace_whole_words() {
        let transforms = TextTransforms::from_config(&make_config(false, &[("vox flow", "voxflow")]));
        assert_eq!(
            transforms.apply("I use vox flow for dictation"),
            "I use voxflow for dictation"
        );
    }

    #[test]
    fn hot_words_case_insensitive() {
        let transforms = TextTransforms::from_config(&make_config(false, &[("rust", "Rust")]));
        assert_eq!(transforms.apply("I love RUST"), "I love Rust");
        assert_eq!(transforms.apply("rust is great"), "Rust is great");
    }

    #[test]
    fn spoken_punctuation_basic() {
        let transforms = TextTransforms::from_config(&make_config(true, &[]));
        assert_eq!(transforms.apply("hello period"), "hello.");
        assert_eq!(transforms.apply("hello comma world"), "hello, world");
        assert_eq!(transforms.apply("what question mark"), "what?");
    }

    #[test]
    fn spoken_punctuation_multi_word() {
        let transforms = TextTransforms::from_config(&make_config(true, &[]));
        assert_eq!(transforms.apply("open paren test close paren"), "(test)");
    }

    #[test]
    fn combined_stages_run_in_order() {
        let transforms = TextTransforms::from_config(&make_config(true, &[("voxflow", "Voxflow")]));
        assert_eq!(transforms.apply("I use voxflow period"), "I use Voxflow.");
    }

    #[test]
    fn newline_spacing() {
        let transforms = TextTransforms::from_config(&make_config(true, &[]));
        assert_eq!(
            transforms.apply("line one new line line two"),
            "line one\nline two"
        );
    }
}
