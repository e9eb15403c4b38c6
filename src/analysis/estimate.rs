// Size estimation for budgeting reads
//
// Not a tokenizer. The estimate only promises to be deterministic and to never
// shrink when text is appended.

/// Average characters per token for source code
pub const CHARS_PER_TOKEN: usize = 4;

/// Punctuation characters per extra token; symbol-dense code tokenizes worse
pub const PUNCT_PER_TOKEN: usize = 8;

/// Estimate the consumption cost of a text
pub fn estimate(text: &str) -> usize {
    let mut chars = 0usize;
    let mut punct = 0usize;
    for c in text.chars() {
        chars += 1;
        if c.is_ascii_punctuation() {
            punct += 1;
        }
    }
    chars.div_ceil(CHARS_PER_TOKEN) + punct / PUNCT_PER_TOKEN
}

/// Estimate a file's cost from its raw bytes
pub fn estimate_bytes(bytes: &[u8]) -> usize {
    estimate(&String::from_utf8_lossy(bytes))
}
