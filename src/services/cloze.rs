//! Fill-in-the-blank prompts for quiz questions.
//!
//! The target word is blanked out of its reading passage (or example sentence)
//! and, when the sentence uses an inflected form, every answer option is shown
//! with the same inflection so the grammar gives nothing away.

use regex::Regex;
use serde::Serialize;

use crate::types::{non_blank, WordRecord};

pub const BLANK: &str = "_______";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClozeSource {
    Passage,
    Example,
    Definition,
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suffix {
    S,
    Ed,
    Ing,
    Ly,
    Er,
    Est,
}

impl Suffix {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "s" => Some(Self::S),
            "ed" => Some(Self::Ed),
            "ing" => Some(Self::Ing),
            "ly" => Some(Self::Ly),
            "er" => Some(Self::Er),
            "est" => Some(Self::Est),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::S => "s",
            Self::Ed => "ed",
            Self::Ing => "ing",
            Self::Ly => "ly",
            Self::Er => "er",
            Self::Est => "est",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClozePrompt {
    pub text: String,
    pub source: ClozeSource,
    pub suffix: Option<Suffix>,
    pub blanked: bool,
}

impl ClozePrompt {
    /// Option text as displayed, inflected to match the sentence.
    pub fn display_word(&self, word: &str) -> String {
        match self.suffix {
            Some(suffix) => inflect(word, suffix),
            None => word.to_string(),
        }
    }

    /// `A. word`, `B. word`, ... in option order.
    pub fn option_labels(&self, options: &[WordRecord]) -> Vec<String> {
        options
            .iter()
            .zip('A'..='Z')
            .map(|(opt, letter)| format!("{letter}. {}", self.display_word(&opt.word)))
            .collect()
    }
}

fn source_sentence(word: &WordRecord) -> (String, ClozeSource) {
    if let Some(passage) = non_blank(word.passage.as_deref()) {
        return (passage.to_string(), ClozeSource::Passage);
    }
    if let Some(example) = non_blank(word.example.as_deref()) {
        return (example.to_string(), ClozeSource::Example);
    }
    if let Some(definition) = word.definition.as_deref().filter(|d| !d.is_empty()) {
        return (
            format!("A word meaning \"{definition}\" is {BLANK}."),
            ClozeSource::Definition,
        );
    }
    (
        format!("The word \"{}\" fits in this blank: {BLANK}", word.word),
        ClozeSource::Placeholder,
    )
}

fn word_pattern(word: &str, base: &str) -> Result<Regex, regex::Error> {
    let alternatives = if base.is_empty() || base == word {
        regex::escape(word)
    } else {
        format!("{}|{}", regex::escape(word), regex::escape(base))
    };
    Regex::new(&format!(r"(?i)\b({alternatives})(s|ed|ing|ly|er|est|'s)?\b"))
}

fn detect_suffix(matched: &str, word: &str, base: &str) -> Option<Suffix> {
    let matched = matched.to_lowercase();
    let word = word.to_lowercase();
    let base = base.to_lowercase();
    if matched == word || matched == base {
        return None;
    }
    if let Some(rest) = matched.strip_prefix(word.as_str()) {
        return Suffix::parse(rest);
    }
    matched
        .strip_prefix(base.as_str())
        .and_then(Suffix::parse)
}

/// Builds the prompt for `word`, blanking only the first occurrence.
pub fn build_cloze(word: &WordRecord) -> ClozePrompt {
    let (sentence, source) = source_sentence(word);
    let base = word.word.strip_suffix('e').unwrap_or(&word.word);

    let pattern = match word_pattern(&word.word, base) {
        Ok(pattern) => pattern,
        Err(err) => {
            tracing::warn!(word = %word.word, error = %err, "cloze pattern rejected");
            return ClozePrompt {
                text: sentence,
                source,
                suffix: None,
                blanked: false,
            };
        }
    };

    match pattern.find(&sentence) {
        Some(found) => {
            let suffix = detect_suffix(found.as_str(), &word.word, base);
            let text = format!("{}{BLANK}{}", &sentence[..found.start()], &sentence[found.end()..]);
            ClozePrompt {
                text,
                source,
                suffix,
                blanked: true,
            }
        }
        None => ClozePrompt {
            text: sentence,
            source,
            suffix: None,
            blanked: false,
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Consonants that double before a vowel suffix. `w`, `x` and `y` never do.
fn is_doubling_consonant(c: char) -> bool {
    c.is_ascii_lowercase() && !is_vowel(c) && !matches!(c, 'w' | 'x' | 'y')
}

fn drop_last(word: &str, n: usize) -> &str {
    match word.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &word[..idx],
        _ if n == 0 => word,
        _ => "",
    }
}

fn last_chars(lower: &str) -> (Option<char>, Option<char>) {
    let mut rev = lower.chars().rev();
    let last = rev.next();
    let prev = rev.next();
    (prev, last)
}

/// Short words ending vowel + consonant double the consonant (run -> running).
fn doubles_final_consonant(lower: &str) -> bool {
    match last_chars(lower) {
        (Some(prev), Some(last)) => {
            is_vowel(prev) && is_doubling_consonant(last) && lower.chars().count() <= 6
        }
        _ => false,
    }
}

/// Ends in `y` not preceded by a vowel.
fn consonant_y(lower: &str) -> bool {
    match last_chars(lower) {
        (prev, Some('y')) => !prev.map(is_vowel).unwrap_or(false),
        _ => false,
    }
}

/// Applies `suffix` to `word` with common English spelling rules.
pub fn inflect(word: &str, suffix: Suffix) -> String {
    let lower = word.to_lowercase();
    let last = word.chars().last().map(String::from).unwrap_or_default();

    match suffix {
        Suffix::Ing => {
            if lower.ends_with("ie") {
                format!("{}ying", drop_last(word, 2))
            } else if lower.ends_with('e') && !lower.ends_with("ee") {
                format!("{}ing", drop_last(word, 1))
            } else if doubles_final_consonant(&lower) {
                format!("{word}{last}ing")
            } else {
                format!("{word}ing")
            }
        }
        Suffix::Ed => {
            if lower.ends_with('e') {
                format!("{word}d")
            } else if consonant_y(&lower) {
                format!("{}ied", drop_last(word, 1))
            } else if doubles_final_consonant(&lower) {
                format!("{word}{last}ed")
            } else {
                format!("{word}ed")
            }
        }
        Suffix::S => {
            if lower.ends_with(['s', 'x', 'z']) || lower.ends_with("ch") || lower.ends_with("sh") {
                format!("{word}es")
            } else if consonant_y(&lower) {
                format!("{}ies", drop_last(word, 1))
            } else {
                format!("{word}s")
            }
        }
        Suffix::Er | Suffix::Est => {
            let tail = suffix.as_str();
            if lower.ends_with('e') {
                format!("{word}{}", &tail[1..])
            } else if consonant_y(&lower) {
                format!("{}i{tail}", drop_last(word, 1))
            } else {
                format!("{word}{tail}")
            }
        }
        Suffix::Ly => {
            if lower.ends_with("le") {
                format!("{}ly", drop_last(word, 2))
            } else if lower.ends_with('y') {
                format!("{}ily", drop_last(word, 1))
            } else {
                format!("{word}ly")
            }
        }
    }
}
