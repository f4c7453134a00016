//! Text measurement and fitting.
//!
//! Width is counted in code points, never in bytes, and escape sequences
//! embedded in the text (colors, hyperlinks) are skipped while measuring.
//! Every fit function returns text that occupies exactly the requested
//! width: longer text is cut (optionally ending in `…`), shorter text is
//! padded with spaces.
//!
//! ```rust,ignore
//! assert_eq!(fit("download", 5, Wrap::Ellipsis), "down…");
//! assert_eq!(fit("ok", 4, Wrap::Truncate), "ok  ");
//! // Styling that is cut open gets closed again:
//! assert_eq!(fit("\x1b[31mfailure", 4, Wrap::Truncate), "\x1b[31mfail\x1b[0m");
//! ```

use std::borrow::Cow;

use crate::color::Role;

const ESC: char = '\x1b';
pub(crate) const RESET: &str = "\x1b[0m";
pub(crate) const ELLIPSIS: char = '…';

/// What happens to content wider than its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrap {
    /// Cut at the cell edge.
    #[default]
    Truncate,
    /// Cut one column early and mark the cut with `…`.
    Ellipsis,
}

/// A piece of a tokenized string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A complete escape sequence, zero columns wide.
    Escape(&'a str),
    /// One visible code point.
    Visible(char),
}

/// Splits `s` into escape sequences and visible characters.
pub fn tokenize(s: &str) -> Tokens<'_> {
    Tokens { s, pos: 0 }
}

pub struct Tokens<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.s[self.pos..];
        let c = rest.chars().next()?;
        if c == ESC {
            let len = escape_len(rest.as_bytes());
            self.pos += len;
            return Some(Token::Escape(&rest[..len]));
        }
        self.pos += c.len_utf8();
        Some(Token::Visible(c))
    }
}

/// Length in bytes of the escape sequence at the start of `bytes`.
///
/// Handles CSI (`ESC [` .. final byte), string-terminated OSC/DCS/PM/APC
/// (`BEL` or `ESC \`) and two-character sequences. Unterminated sequences
/// swallow the rest of the input.
fn escape_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    if len < 2 {
        return len;
    }
    match bytes[1] {
        b'[' => {
            let mut i = 2;
            while i < len {
                let b = bytes[i];
                if (0x40..=0x7E).contains(&b) {
                    return i + 1;
                }
                if !(0x20..=0x7E).contains(&b) {
                    return i;
                }
                i += 1;
            }
            len
        }
        b']' | b'P' | b'^' | b'_' => {
            let mut i = 2;
            while i < len {
                match bytes[i] {
                    0x07 => return i + 1,
                    0x1B if i + 1 < len && bytes[i + 1] == b'\\' => return i + 2,
                    _ => i += 1,
                }
            }
            len
        }
        // Keep multi-byte UTF-8 intact if ESC is followed by one.
        _ => 1 + utf8_len(bytes[1]),
    }
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// `Some(true)` for an SGR reset, `Some(false)` for any other SGR, `None`
/// for escapes that do not touch styling.
fn sgr_kind(seq: &str) -> Option<bool> {
    let params = seq.strip_prefix("\x1b[")?.strip_suffix('m')?;
    Some(params.split(';').all(|p| p.trim_start_matches('0').is_empty()))
}

/// Number of visible code points in `s`.
pub fn visible_width(s: &str) -> usize {
    if !s.contains(ESC) {
        return s.chars().count();
    }
    tokenize(s)
        .filter(|t| matches!(t, Token::Visible(_)))
        .count()
}

/// Removes all escape sequences.
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains(ESC) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        tokenize(s)
            .filter_map(|t| match t {
                Token::Visible(c) => Some(c),
                Token::Escape(_) => None,
            })
            .collect(),
    )
}

/// Replaces control characters (newlines, tabs, carriage returns) with
/// spaces, so the text occupies exactly one terminal row. Escape sequences
/// are kept.
pub fn single_line(s: &str) -> Cow<'_, str> {
    let blank = |c: char| c.is_control() && c != ESC;
    if !s.contains(blank) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().map(|c| if blank(c) { ' ' } else { c }).collect())
}

/// Fits text that carries no escape sequences.
pub fn fit_plain(s: &str, width: usize, wrap: Wrap) -> String {
    let len = s.chars().count();
    if len <= width {
        return pad(s.to_string(), width - len);
    }
    let mut out: String = s.chars().take(keep_for(width, wrap)).collect();
    if wrap == Wrap::Ellipsis && width > 0 {
        out.push(ELLIPSIS);
    }
    out
}

/// Fits text that may carry escape sequences.
pub fn fit_ansi(s: &str, width: usize, wrap: Wrap) -> String {
    let len = visible_width(s);
    if len <= width {
        return pad(s.to_string(), width - len);
    }
    let mark = (wrap == Wrap::Ellipsis && width > 0).then_some(ELLIPSIS);
    truncate_visible(s, keep_for(width, wrap), mark)
}

/// Fits `s` to exactly `width` columns, picking the escape-aware path only
/// when `s` contains an escape character.
pub fn fit(s: &str, width: usize, wrap: Wrap) -> String {
    match s.contains(ESC) {
        true => fit_ansi(s, width, wrap),
        false => fit_plain(s, width, wrap),
    }
}

fn keep_for(width: usize, wrap: Wrap) -> usize {
    match wrap {
        Wrap::Ellipsis => width.saturating_sub(1),
        Wrap::Truncate => width,
    }
}

fn pad(mut s: String, n: usize) -> String {
    s.extend(std::iter::repeat_n(' ', n));
    s
}

/// Keeps the first `keep` visible characters of `s`, then `mark`, then a
/// reset if a style was left open at the cut.
fn truncate_visible(s: &str, keep: usize, mark: Option<char>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut taken = 0;
    let mut open = false;
    for token in tokenize(s) {
        match token {
            Token::Visible(_) if taken == keep => break,
            Token::Visible(c) => {
                out.push(c);
                taken += 1;
            }
            Token::Escape(seq) => {
                if let Some(reset) = sgr_kind(seq) {
                    open = !reset;
                }
                out.push_str(seq);
            }
        }
    }
    if let Some(mark) = mark {
        out.push(mark);
    }
    if open {
        out.push_str(RESET);
    }
    out
}

/// A run of text tagged with the role it plays in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub role: Role,
}

impl Span {
    pub fn new(text: impl Into<String>, role: Role) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }

    pub fn width(&self) -> usize {
        visible_width(&self.text)
    }
}

/// Fits a sequence of spans to exactly `width` columns.
///
/// Roles survive the cut: a span that straddles the edge keeps its role for
/// the part that remains, the ellipsis takes the role of the span it cuts,
/// and padding takes the role of the last span.
pub fn fit_spans(spans: &[Span], width: usize, wrap: Wrap) -> Vec<Span> {
    let total: usize = spans.iter().map(Span::width).sum();
    let tail_role = spans.last().map_or(Role::Gap, |s| s.role);

    if total <= width {
        let mut out = spans.to_vec();
        if total < width {
            out.push(Span::new(" ".repeat(width - total), tail_role));
        }
        return out;
    }

    let keep = keep_for(width, wrap);
    let mark = (wrap == Wrap::Ellipsis && width > 0).then_some(ELLIPSIS);
    let mut out = Vec::with_capacity(spans.len());
    let mut used = 0;
    for span in spans {
        let w = span.width();
        if used + w <= keep {
            out.push(span.clone());
            used += w;
            if used == keep && mark.is_none() {
                break;
            }
            continue;
        }
        let text = truncate_visible(&span.text, keep - used, mark);
        out.push(Span::new(text, span.role));
        break;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn width_counts_code_points_not_bytes() {
        assert_eq!(visible_width("héllo"), 5);
        assert_eq!(visible_width("⠋ spin"), 6);
        assert_eq!(visible_width("🦀"), 1);
    }

    #[test]
    fn width_skips_escapes() {
        assert_eq!(visible_width("\x1b[1;31mred\x1b[0m"), 3);
        assert_eq!(visible_width("\x1b]8;;https://x.dev\x07link\x1b]8;;\x07"), 4);
    }

    #[test]
    fn single_line_blanks_control_characters() {
        assert_eq!(single_line("line one\nline\ttwo\r"), "line one line two ");
        assert_eq!(single_line("\x1b[31mred\x1b[0m"), "\x1b[31mred\x1b[0m");
        assert!(matches!(single_line("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn strip_ansi_borrows_plain_text() {
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed(_)));
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m done"), "ok done");
    }

    #[test]
    fn tokenizer_separates_escapes() {
        let tokens: Vec<_> = tokenize("a\x1b[31mb").collect();
        assert_eq!(
            tokens,
            vec![
                Token::Visible('a'),
                Token::Escape("\x1b[31m"),
                Token::Visible('b')
            ]
        );
    }

    #[test]
    fn plain_pads_and_truncates() {
        assert_eq!(fit_plain("ab", 4, Wrap::Truncate), "ab  ");
        assert_eq!(fit_plain("abcdef", 4, Wrap::Truncate), "abcd");
        assert_eq!(fit_plain("abcdef", 4, Wrap::Ellipsis), "abc…");
        assert_eq!(fit_plain("abcdef", 0, Wrap::Ellipsis), "");
    }

    #[test]
    fn ansi_cut_closes_open_style() {
        let out = fit_ansi("\x1b[31mfailure", 4, Wrap::Truncate);
        assert_eq!(out, "\x1b[31mfail\x1b[0m");
        assert_eq!(visible_width(&out), 4);
    }

    #[test]
    fn ansi_cut_after_reset_adds_nothing() {
        let out = fit_ansi("\x1b[31mab\x1b[0mcdef", 2, Wrap::Truncate);
        assert_eq!(out, "\x1b[31mab\x1b[0m");
    }

    #[test]
    fn ansi_ellipsis_stays_inside_style() {
        let out = fit_ansi("\x1b[33mwarning\x1b[0m", 5, Wrap::Ellipsis);
        assert_eq!(out, "\x1b[33mwarn…\x1b[0m");
    }

    #[test]
    fn ansi_short_text_is_padded() {
        assert_eq!(fit("\x1b[2mx\x1b[0m", 3, Wrap::Truncate), "\x1b[2mx\x1b[0m  ");
    }

    #[test]
    fn spans_keep_roles_across_cut() {
        let spans = vec![
            Span::new("abc", Role::Description),
            Span::new("defg", Role::Units),
        ];
        let out = fit_spans(&spans, 5, Wrap::Truncate);
        assert_eq!(
            out,
            vec![
                Span::new("abc", Role::Description),
                Span::new("de", Role::Units)
            ]
        );
    }

    #[test]
    fn spans_pad_with_last_role() {
        let spans = vec![Span::new("ab", Role::Eta)];
        let out = fit_spans(&spans, 4, Wrap::Ellipsis);
        assert_eq!(out, vec![Span::new("ab", Role::Eta), Span::new("  ", Role::Eta)]);
    }

    #[test]
    fn spans_ellipsis_on_boundary() {
        let spans = vec![
            Span::new("abc", Role::Description),
            Span::new("def", Role::Units),
        ];
        let out = fit_spans(&spans, 4, Wrap::Ellipsis);
        let text: String = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(text, "abc…");
        assert_eq!(out.last().map(|s| s.role), Some(Role::Units));
    }

    proptest::proptest! {
        #[test]
        fn styled_truncation_is_exact_and_closed(
            word in "[a-z]{1,24}",
            color in 30u8..38,
            k in 0usize..24,
        ) {
            let styled = format!("\x1b[{color}m{word}");
            let out = fit_ansi(&styled, k, Wrap::Truncate);
            proptest::prop_assert_eq!(visible_width(&out), k);
            if word.len() > k {
                proptest::prop_assert!(out.ends_with(RESET));
            }
        }
    }
}
