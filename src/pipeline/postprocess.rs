//! Post-processing: deterministic cleanup of extracted and generated text.
//!
//! Text pulled from PDF content streams and slide XML carries the usual
//! debris: Windows line endings, trailing spaces, runs of empty lines where
//! layout boxes were, zero-width characters. Vision-model descriptions add
//! one more quirk, an outer code fence the prompt never asked for.
//!
//! Every rule here is a pure `&str → String` pass, and [`clean_text`] is
//! idempotent: cleaning already-clean text changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Normalise text extracted from a unit or returned by OCR.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to one
/// 5. Trim leading and trailing blank space
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Normalise a vision-model description: strip a wrapping fence, then
/// [`clean_text`].
pub fn clean_description(input: &str) -> String {
    clean_text(&strip_outer_fences(input))
}

// ── Rule: Strip outer fences ─────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|text)?\n(.*)\n```\s*$").expect("static regex")
});

fn strip_outer_fences(input: &str) -> String {
    let normalised = normalise_line_endings(input);
    match RE_OUTER_FENCES.captures(normalised.trim()) {
        Some(caps) => caps[1].to_string(),
        None => normalised,
    }
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
