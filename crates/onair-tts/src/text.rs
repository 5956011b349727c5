//! Text preprocessing for speech synthesis.
//!
//! Script chunks come from a language model and may carry markdown, links
//! or full-width punctuation that a synthesizer would read literally.

/// Normalize a chunk into plain text suitable for synthesis.
///
/// Handles:
/// - Fenced code blocks → removed
/// - Headers, blockquotes, list markers → text only
/// - Bold / italic / strikethrough markers → removed
/// - Links \[text\](url) → text only; images → removed
/// - Inline code → unwrapped
/// - HTML tags and bare URLs → removed
/// - Full-width ASCII variants → ASCII
/// - Ellipsis and dash runs → a single mark
/// - Whitespace runs → one space
///
/// The result is also the cache key material, so it must be deterministic.
#[must_use]
pub fn normalize_for_speech(text: &str) -> String {
    let folded: String = text.chars().map(fold_full_width).collect();

    let mut result = String::with_capacity(folded.len());
    let mut in_code_block = false;

    for line in folded.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block || is_horizontal_rule(trimmed) {
            continue;
        }

        let processed = strip_line_markup(trimmed);
        if !processed.is_empty() {
            result.push(' ');
            result.push_str(&processed);
        }
    }

    let without_urls = strip_urls(&result);
    collapse_whitespace(&collapse_runs(&without_urls))
}

// ── Internal helpers ───────────────────────────────────────────────

/// Map full-width forms (U+FF01..U+FF5E) and the ideographic space to ASCII.
fn fold_full_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(u32::from(c) - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

fn is_horizontal_rule(line: &str) -> bool {
    let chars: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    chars.len() >= 3
        && chars.iter().all(|&c| c == '-' || c == '*' || c == '_')
        && chars.windows(2).all(|w| w[0] == w[1])
}

fn strip_line_markup(line: &str) -> String {
    let mut s = line;

    while let Some(rest) = s.strip_prefix('>') {
        s = rest.trim_start();
    }
    if s.starts_with('#') {
        s = s.trim_start_matches('#').trim_start();
    }
    let s = strip_list_marker(s);
    let s = strip_links(&s);
    let s = strip_inline_code(&s);
    let s = strip_emphasis(&s);
    strip_html_tags(&s)
}

fn strip_list_marker(line: &str) -> String {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return rest.to_string();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let after = &line[digits..];
        if let Some(rest) = after.strip_prefix(". ").or_else(|| after.strip_prefix(") ")) {
            return rest.to_string();
        }
    }

    line.to_string()
}

/// `[text](url)` → `text`, `![alt](url)` → nothing.
fn strip_links(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let is_image = c == '!' && chars.peek() == Some(&'[');
        if c != '[' && !is_image {
            result.push(c);
            continue;
        }
        if is_image {
            chars.next();
        }

        let mut label = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == ']' {
                closed = true;
                break;
            }
            label.push(c);
        }
        if closed && chars.peek() == Some(&'(') {
            chars.next();
            chars.by_ref().take_while(|&c| c != ')').for_each(drop);
            if !is_image {
                result.push_str(&label);
            }
        } else {
            if is_image {
                result.push('!');
            }
            result.push('[');
            result.push_str(&label);
            if closed {
                result.push(']');
            }
        }
    }

    result
}

fn strip_inline_code(text: &str) -> String {
    text.replace('`', "")
}

fn strip_emphasis(text: &str) -> String {
    // A lone `_` is left alone; it shows up inside identifiers.
    text.replace("**", "")
        .replace("__", "")
        .replace("~~", "")
        .replace('*', "")
}

fn strip_html_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

fn strip_urls(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| {
            let lower = word.to_ascii_lowercase();
            !(lower.starts_with("http://")
                || lower.starts_with("https://")
                || lower.starts_with("www."))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '\u{2013}' | '\u{2014}' | '\u{2015}')
}

/// Collapse `...`/`…` runs into `…` and runs of two or more dashes into one.
fn collapse_runs(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '.' || c == '\u{2026}' {
            let run = chars[i..]
                .iter()
                .take_while(|&&c| c == '.' || c == '\u{2026}')
                .count();
            let is_ellipsis = run >= 3 || chars[i..i + run].contains(&'\u{2026}');
            if is_ellipsis {
                result.push('\u{2026}');
            } else {
                result.extend(&chars[i..i + run]);
            }
            i += run;
            continue;
        }

        if is_dash(c) {
            let run = chars[i..].iter().take_while(|&&c| is_dash(c)).count();
            if run >= 2 {
                result.push('\u{2014}');
            } else {
                result.push(c);
            }
            i += run;
            continue;
        }

        result.push(c);
        i += 1;
    }

    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
