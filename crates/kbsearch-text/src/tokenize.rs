//! Language-aware tokenizer.
//!
//! Mixed text is split into maximal runs of CJK vs. non-CJK characters.
//! CJK runs emit single characters plus adjacent bigrams (better recall on
//! short queries); non-CJK runs are lowercased, split on whitespace and
//! punctuation, and filtered by length and stop-word membership.
//! Deterministic, order-preserving, duplicates retained.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Language hint for callers that already know the corpus language.
/// Runs are always detected per Unicode range; an explicit `En` hint
/// additionally suppresses CJK bigram expansion (single characters only),
/// which keeps stray ideographs in an English corpus from fanning out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Auto,
    Zh,
    En,
}

#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    pub min_token_len: usize,
    pub lang: Lang,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { min_token_len: 2, lang: Lang::Auto }
    }
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has",
            "have", "he", "in", "is", "it", "its", "of", "on", "or", "that", "the", "their",
            "there", "they", "this", "to", "was", "were", "will", "with", "you", "your",
        ]
        .into_iter()
        .collect()
    })
}

/// CJK Unified Ideographs plus the common extension blocks.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // unified ideographs
        | 0x3400..=0x4DBF    // extension A
        | 0x20000..=0x2A6DF  // extension B
        | 0xF900..=0xFAFF    // compatibility ideographs
        | 0x3040..=0x30FF    // hiragana + katakana
        | 0xAC00..=0xD7AF    // hangul syllables
    )
}

/// Rough corpus-language detection used when no hint is available.
pub fn detect_lang(text: &str) -> Lang {
    if text.chars().any(is_cjk) {
        Lang::Zh
    } else {
        Lang::En
    }
}

/// Tokenize with default settings (min length 2, auto language).
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with(text, &TokenizerConfig::default())
}

pub fn tokenize_with(text: &str, cfg: &TokenizerConfig) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cjk_run: Vec<char> = Vec::new();
    let mut word = String::new();

    let bigrams = cfg.lang != Lang::En;
    let flush_cjk = move |run: &mut Vec<char>, out: &mut Vec<String>| {
        if run.is_empty() {
            return;
        }
        for c in run.iter() {
            out.push(c.to_string());
        }
        if bigrams {
            for pair in run.windows(2) {
                out.push(pair.iter().collect());
            }
        }
        run.clear();
    };
    let flush_word = |w: &mut String, out: &mut Vec<String>| {
        if w.is_empty() {
            return;
        }
        let token = std::mem::take(w);
        if token.chars().count() >= cfg.min_token_len && !stopwords().contains(token.as_str()) {
            out.push(token);
        }
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if c.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.extend(c.to_lowercase());
        } else {
            // Whitespace, punctuation and symbols all end the current run.
            flush_cjk(&mut cjk_run, &mut tokens);
            flush_word(&mut word, &mut tokens);
        }
    }
    flush_cjk(&mut cjk_run, &mut tokens);
    flush_word(&mut word, &mut tokens);

    tokens
}
