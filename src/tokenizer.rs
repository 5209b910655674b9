//! Tokenizer (§4.C): turns chunk/query text into an ordered bag of lexical terms.

use regex::Regex;
use std::sync::OnceLock;

// "are" is deliberately absent from the active set; short auxiliary verbs
// like this survive filtering in practice.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

#[derive(Debug, Clone, Copy)]
pub struct TokenizerOpts {
    pub lowercase: bool,
    pub code_split: bool,
    pub stopword_remove: bool,
    pub stem: bool,
}

impl Default for TokenizerOpts {
    fn default() -> Self {
        Self { lowercase: true, code_split: true, stopword_remove: true, stem: true }
    }
}

fn is_stopword(tok: &str) -> bool {
    STOPWORDS.contains(&tok)
}

/// Minimal suffix stripper. Exactly one rule fires, checked in this order.
fn stem(tok: &str) -> String {
    if tok.len() <= 3 {
        return tok.to_string();
    }
    if let Some(stripped) = tok.strip_suffix("ing") {
        return stripped.to_string();
    }
    if let Some(stripped) = tok.strip_suffix("ed") {
        return stripped.to_string();
    }
    if let Some(stripped) = tok.strip_suffix("ly") {
        return stripped.to_string();
    }
    if let Some(stripped) = tok.strip_suffix("ment") {
        return stripped.to_string();
    }
    if tok.ends_with('s') && !tok.ends_with("ss") {
        return tok[..tok.len() - 1].to_string();
    }
    tok.to_string()
}

fn code_split_chars(c: char) -> bool {
    matches!(
        c,
        '{' | '}' | '(' | ')' | '[' | ']' | ';' | ':' | ',' | '.' | '-' | '+' | '*' | '/' | '%'
            | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~'
    )
}

/// `tokenize(text, opts)` — produces an ordered sequence of terms.
pub fn tokenize(text: &str, opts: TokenizerOpts) -> Vec<String> {
    let mut working = if opts.lowercase { text.to_lowercase() } else { text.to_string() };

    if opts.code_split {
        working = working.chars().map(|c| if code_split_chars(c) { ' ' } else { c }).collect();
    }

    let mut tokens: Vec<String> = working
        .split_whitespace()
        .map(|t| t.to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if opts.stopword_remove {
        tokens.retain(|t| !is_stopword(t));
    }

    if opts.stem {
        tokens = tokens.into_iter().map(|t| stem(&t)).collect();
    }

    tokens
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").unwrap())
}

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(//|#).*$").unwrap())
}

fn whitespace_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip block/line comments and collapse whitespace runs, ahead of tokenization.
pub fn strip_comments_and_collapse(text: &str) -> String {
    let no_block = block_comment_re().replace_all(text, " ");
    let no_line = line_comment_re().replace_all(&no_block, "");
    whitespace_run_re().replace_all(&no_line, " ").trim().to_string()
}

/// Tokenize source/query text with the index-time preprocessor applied first.
pub fn tokenize_code(text: &str, opts: TokenizerOpts) -> Vec<String> {
    tokenize(&strip_comments_and_collapse(text), opts)
}
