//! Textual form of a deduplicated tree.
//!
//! ```text
//! ['Ann',30,N,T,X,O,^0,{'k':'v'}]
//! ```
//!
//! Strings are delimited by `'`. Inside them a content `'` is written as
//! `"`, a content `"` as `^'` and a content `^` as `^^`; backslash and
//! control characters use JSON escapes. Below the root, `null`, `true`,
//! `false` and `[]` shrink to `N`, `T`, `X` and `O`, and `^N` is a bare
//! back-reference. The parser also accepts the long literal forms.

use super::compact_value::CompactNumber;
use super::dedup::Packed;
use super::error::{CompactError, Result};
use super::types::{MARK_EMPTY, MARK_FALSE, MARK_NULL, MARK_REF, MARK_TRUE, STR_DELIM};
use smol_str::SmolStr;
use std::fmt::Write;

// ─── Printer ────────────────────────────────────────────────────────────────

/// Print the root positional array.
pub fn serialize(root: &[Packed]) -> Result<String> {
    let mut out = String::with_capacity(root.len() * 8 + 2);
    out.push('[');
    write_items(&mut out, root)?;
    out.push(']');
    Ok(out)
}

fn write_items(out: &mut String, items: &[Packed]) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_value(out, item)?;
    }
    Ok(())
}

fn write_value(out: &mut String, value: &Packed) -> Result<()> {
    match value {
        Packed::Null => out.push(MARK_NULL),
        Packed::Bool(true) => out.push(MARK_TRUE),
        Packed::Bool(false) => out.push(MARK_FALSE),
        Packed::Number(n) => out.push_str(&n.render().ok_or(CompactError::NonFiniteNumber)?),
        Packed::Str(s) => write_str(out, s),
        Packed::Ref(index) => {
            out.push(MARK_REF);
            let _ = write!(out, "{index}");
        }
        Packed::List(items) if items.is_empty() => out.push(MARK_EMPTY),
        Packed::List(items) => {
            out.push('[');
            write_items(out, items)?;
            out.push(']');
        }
        Packed::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(out, key);
                out.push(':');
                write_value(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_str(out: &mut String, s: &str) {
    out.push(STR_DELIM);
    for ch in s.chars() {
        match ch {
            '"' => {
                out.push(MARK_REF);
                out.push(STR_DELIM);
            }
            '\'' => out.push('"'),
            '^' => out.push_str("^^"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(STR_DELIM);
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Parse a blob produced by [`serialize`] back into the root array.
pub fn deserialize(src: &str, max_depth: usize) -> Result<Vec<Packed>> {
    let mut parser = Parser {
        src,
        pos: 0,
        depth: 0,
        max_depth,
    };
    parser.expect('[')?;
    let root = parser.parse_items(']')?;
    if parser.pos != src.len() {
        return Err(CompactError::format(parser.pos, "trailing characters after root"));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(ch) if ch == want => Ok(()),
            Some(ch) => Err(CompactError::format(
                self.pos - ch.len_utf8(),
                format!("expected `{want}`, found `{ch}`"),
            )),
            None => Err(self.eof()),
        }
    }

    fn eof(&self) -> CompactError {
        CompactError::format(self.pos, "unexpected end of input")
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(CompactError::format(
                self.pos,
                format!("nesting exceeds {} levels", self.max_depth),
            ));
        }
        Ok(())
    }

    /// Items up to and including `close`; the opening bracket is consumed.
    fn parse_items(&mut self, close: char) -> Result<Vec<Packed>> {
        self.enter()?;
        let mut items = Vec::new();
        if self.peek() == Some(close) {
            self.bump();
            self.depth -= 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_value()?);
            match self.bump() {
                Some(',') => continue,
                Some(ch) if ch == close => break,
                Some(ch) => {
                    return Err(CompactError::format(
                        self.pos - ch.len_utf8(),
                        format!("expected `,` or `{close}`, found `{ch}`"),
                    ));
                }
                None => return Err(self.eof()),
            }
        }
        self.depth -= 1;
        Ok(items)
    }

    fn parse_map(&mut self) -> Result<Vec<(SmolStr, Packed)>> {
        self.enter()?;
        let mut entries = Vec::new();
        if self.peek() == Some('}') {
            self.bump();
            self.depth -= 1;
            return Ok(entries);
        }
        loop {
            self.expect(STR_DELIM)?;
            let key = self.parse_str()?;
            self.expect(':')?;
            entries.push((key, self.parse_value()?));
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(ch) => {
                    return Err(CompactError::format(
                        self.pos - ch.len_utf8(),
                        format!("expected `,` or `}}`, found `{ch}`"),
                    ));
                }
                None => return Err(self.eof()),
            }
        }
        self.depth -= 1;
        Ok(entries)
    }

    fn parse_value(&mut self) -> Result<Packed> {
        let start = self.pos;
        let Some(ch) = self.bump() else {
            return Err(self.eof());
        };
        match ch {
            MARK_NULL => Ok(Packed::Null),
            MARK_TRUE => Ok(Packed::Bool(true)),
            MARK_FALSE => Ok(Packed::Bool(false)),
            MARK_EMPTY => Ok(Packed::List(Vec::new())),
            'n' => self.keyword(start, "null", Packed::Null),
            't' => self.keyword(start, "true", Packed::Bool(true)),
            'f' => self.keyword(start, "false", Packed::Bool(false)),
            '[' => self.parse_items(']').map(Packed::List),
            '{' => self.parse_map().map(Packed::Map),
            STR_DELIM => self.parse_str().map(Packed::Str),
            MARK_REF => self.parse_ref(start),
            '-' | '0'..='9' => self.parse_number(start),
            other => Err(CompactError::format(start, format!("unexpected `{other}`"))),
        }
    }

    fn keyword(&mut self, start: usize, word: &str, value: Packed) -> Result<Packed> {
        if self.src[start..].starts_with(word) {
            self.pos = start + word.len();
            Ok(value)
        } else {
            Err(CompactError::format(start, "unknown literal"))
        }
    }

    fn scan_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !accept(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &src[start..self.pos]
    }

    fn parse_ref(&mut self, start: usize) -> Result<Packed> {
        let digits = self.scan_while(|c| c.is_ascii_digit());
        digits
            .parse::<usize>()
            .map(Packed::Ref)
            .map_err(|_| CompactError::format(start, "invalid back-reference"))
    }

    fn parse_number(&mut self, start: usize) -> Result<Packed> {
        self.scan_while(|c| matches!(c, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'));
        let src = self.src;
        let text = &src[start..self.pos];
        let bad = || CompactError::format(start, format!("invalid number `{text}`"));

        let number = if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(CompactNumber::F64)
        } else if let Ok(i) = text.parse::<i64>() {
            Some(CompactNumber::I64(i))
        } else {
            text.parse::<u64>().ok().map(CompactNumber::U64)
        };
        number.map(Packed::Number).ok_or_else(bad)
    }

    /// String body after the opening delimiter, through the closing one.
    fn parse_str(&mut self) -> Result<SmolStr> {
        let start = self.pos;
        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(CompactError::format(start, "unterminated string"));
            };
            match ch {
                STR_DELIM => return Ok(SmolStr::from(out)),
                '"' => out.push('\''),
                MARK_REF => match self.bump() {
                    Some(STR_DELIM) => out.push('"'),
                    Some(MARK_REF) => out.push('^'),
                    _ => return Err(CompactError::format(self.pos, "invalid caret escape")),
                },
                '\\' => out.push(self.parse_escape()?),
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<char> {
        let at = self.pos;
        let bad = || CompactError::format(at, "invalid escape");
        Ok(match self.bump().ok_or_else(bad)? {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '\\' => '\\',
            '/' => '/',
            'u' => {
                let hex = self.src.get(self.pos..self.pos + 4).ok_or_else(bad)?;
                let code = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
                self.pos += 4;
                char::from_u32(code).ok_or_else(bad)?
            }
            _ => return Err(bad()),
        })
    }
}
