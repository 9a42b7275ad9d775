//! Tokenization and cursor management over a raw input string.
//!
//! A [`CommandInput`] owns the source text and a byte cursor. Reads consume
//! whitespace-delimited tokens, honoring `"…"` quoting with `\"` and `\\`
//! escapes. The cursor only moves forward, except through an explicit
//! [`branch`](CommandInput::branch)/[`restore`](CommandInput::restore) pair,
//! which is how speculative parses rewind.

use std::sync::Arc;

use crate::error::ParseFailure;

/// A lightweight snapshot of the cursor, returned by [`CommandInput::branch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot(usize);

/// The raw command line plus a consuming cursor.
#[derive(Debug, Clone)]
pub struct CommandInput {
    source: Arc<str>,
    cursor: usize,
}

/// One scanned token: its raw byte span and its unquoted text.
struct TokenBounds {
    start: usize,
    end: usize,
    text: String,
}

impl CommandInput {
    /// Wraps the given source string with the cursor at the start.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            cursor: 0,
        }
    }

    /// The full source string, independent of the cursor.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.source
    }

    /// The unconsumed tail of the input.
    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.source[self.cursor..]
    }

    /// `true` when no token remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining().trim().is_empty()
    }

    /// Returns the next token without consuming it.
    pub fn peek(&self) -> Result<String, ParseFailure> {
        self.next_bounds()?
            .map(|bounds| bounds.text)
            .ok_or(ParseFailure::NoInputProvided)
    }

    /// Consumes and returns the next token, unquoting it.
    pub fn read(&mut self) -> Result<String, ParseFailure> {
        let bounds = self.next_bounds()?.ok_or(ParseFailure::NoInputProvided)?;
        self.cursor = bounds.end;
        Ok(bounds.text)
    }

    /// Consumes and returns the next whitespace-delimited token without
    /// interpreting quotes.
    pub fn read_plain(&mut self) -> Result<String, ParseFailure> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return Err(ParseFailure::NoInputProvided);
        }
        let start = self.cursor + (rest.len() - trimmed.len());
        let len = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        let token = trimmed[..len].to_string();
        self.cursor = start + len;
        Ok(token)
    }

    /// Consumes the next token and returns it verbatim, quotes included.
    pub fn read_raw(&mut self) -> Result<String, ParseFailure> {
        let bounds = self.next_bounds()?.ok_or(ParseFailure::NoInputProvided)?;
        let raw = self.source[bounds.start..bounds.end].to_string();
        self.cursor = bounds.end;
        Ok(raw)
    }

    /// Consumes everything up to the end of the input.
    pub fn read_greedy(&mut self) -> Result<String, ParseFailure> {
        let rest = self.remaining().trim();
        if rest.is_empty() {
            return Err(ParseFailure::NoInputProvided);
        }
        let rest = rest.to_string();
        self.cursor = self.source.len();
        Ok(rest)
    }

    /// Consumes tokens until a bare token starting with `-` is encountered,
    /// leaving the flag region unconsumed.
    pub fn read_greedy_flag_yielding(&mut self) -> Result<String, ParseFailure> {
        let mut end = None;
        let mut probe = self.clone();
        loop {
            let Some(bounds) = probe.next_bounds()? else {
                break;
            };
            if bounds.text.starts_with('-') {
                break;
            }
            probe.cursor = bounds.end;
            end = Some(bounds.end);
        }
        let Some(end) = end else {
            return Err(ParseFailure::NoInputProvided);
        };
        let text = self.source[self.cursor..end].trim_start().to_string();
        self.cursor = end;
        Ok(text)
    }

    /// Consumes up to `n` whitespace characters.
    pub fn skip_whitespace(&mut self, n: usize) {
        let mut skipped = 0;
        while skipped < n {
            match self.remaining().chars().next() {
                Some(c) if c.is_whitespace() => {
                    self.cursor += c.len_utf8();
                    skipped += 1;
                }
                _ => break,
            }
        }
    }

    /// Takes a snapshot of the cursor for a speculative parse.
    #[must_use]
    pub fn branch(&self) -> InputSnapshot {
        InputSnapshot(self.cursor)
    }

    /// Rewinds the cursor to a previously taken snapshot.
    pub fn restore(&mut self, snapshot: InputSnapshot) {
        debug_assert!(snapshot.0 <= self.source.len());
        self.cursor = snapshot.0;
    }

    /// `true` when the next token runs to the very end of the source,
    /// i.e. the caller's cursor is still inside that token.
    #[must_use]
    pub fn token_ends_input(&self) -> bool {
        matches!(self.next_bounds(), Ok(Some(bounds)) if bounds.end == self.source.len())
    }

    /// Number of tokens left in the input.
    #[must_use]
    pub fn remaining_token_count(&self) -> usize {
        let mut probe = self.clone();
        let mut count = 0;
        while let Ok(Some(bounds)) = probe.next_bounds() {
            probe.cursor = bounds.end;
            count += 1;
        }
        // An unterminated quote still occupies the rest of the input.
        if probe.next_bounds().is_err() {
            count += 1;
        }
        count
    }

    /// Scans the next token without moving the cursor.
    fn next_bounds(&self) -> Result<Option<TokenBounds>, ParseFailure> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        let start = self.cursor + (rest.len() - trimmed.len());
        if trimmed.is_empty() {
            return Ok(None);
        }

        if trimmed.starts_with('"') {
            return scan_quoted(start, trimmed).map(Some);
        }

        let len = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        Ok(Some(TokenBounds {
            start,
            end: start + len,
            text: trimmed[..len].to_string(),
        }))
    }
}

fn scan_quoted(start: usize, token: &str) -> Result<TokenBounds, ParseFailure> {
    let mut text = String::new();
    let mut escaped = false;
    for (offset, c) in token.char_indices().skip(1) {
        if escaped {
            match c {
                '"' | '\\' => text.push(c),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok(TokenBounds {
                start,
                end: start + offset + c.len_utf8(),
                text,
            });
        } else {
            text.push(c);
        }
    }
    Err(ParseFailure::UnterminatedQuote)
}
