//! Content stream tokenizer.
//!
//! Turns raw (already decompressed) content stream bytes into a sequence of
//! [`Operation`]s. Operands accumulate on a stack until an operator keyword
//! consumes them. A `BI ... ID ... EI` sequence becomes a single `BI`
//! operation whose only operand is an [`Operand::InlineImage`].

use pdfcompose_core::{InlineImage, Operand, Operation};

use crate::error::BackendError;

/// Parse content stream bytes into operations.
///
/// Comments are stripped. Stray delimiters at the top level are skipped.
///
/// # Errors
///
/// Returns [`BackendError::Tokenize`] for unterminated strings, arrays,
/// dictionaries or inline images, and for numbers that do not parse.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operation>, BackendError> {
    let mut lexer = Lexer::new(input);
    let mut operations = Vec::new();
    let mut stack: Vec<Operand> = Vec::new();

    while let Some(token) = lexer.next_token()? {
        match token {
            Token::Operand(operand) => stack.push(operand),
            Token::Keyword(keyword) if keyword == "BI" => {
                let image = lexer.inline_image()?;
                stack.clear();
                operations.push(Operation::new("BI", vec![Operand::InlineImage(image)]));
            }
            Token::Keyword(keyword) => {
                operations.push(Operation::new(keyword, std::mem::take(&mut stack)));
            }
            Token::ArrayEnd => return Err(tokenize_error("unexpected ']' outside array")),
            Token::DictEnd => return Err(tokenize_error("unexpected '>>' outside dictionary")),
        }
    }

    Ok(operations)
}

fn tokenize_error(msg: impl Into<String>) -> BackendError {
    BackendError::Tokenize(msg.into())
}

enum Token {
    Operand(Operand),
    Keyword(String),
    ArrayEnd,
    DictEnd,
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl<'a> Lexer<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, BackendError> {
        loop {
            self.skip_whitespace();
            let Some(b) = self.peek() else {
                return Ok(None);
            };

            let token = match b {
                b'(' => Token::Operand(Operand::String(self.literal_string()?)),
                b'<' if self.peek_at(1) == Some(b'<') => {
                    self.pos += 2;
                    Token::Operand(Operand::Dictionary(self.dictionary()?))
                }
                b'<' => Token::Operand(Operand::String(self.hex_string()?)),
                b'>' if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    Token::DictEnd
                }
                b'[' => {
                    self.pos += 1;
                    Token::Operand(Operand::Array(self.array()?))
                }
                b']' => {
                    self.pos += 1;
                    Token::ArrayEnd
                }
                b'/' => Token::Operand(Operand::Name(self.name())),
                b'0'..=b'9' | b'+' | b'-' | b'.' => Token::Operand(self.number()?),
                _ if is_regular(b) => match self.keyword().as_str() {
                    "true" => Token::Operand(Operand::Boolean(true)),
                    "false" => Token::Operand(Operand::Boolean(false)),
                    "null" => Token::Operand(Operand::Null),
                    other => Token::Keyword(other.to_string()),
                },
                _ => {
                    // Stray ')', '{', '}' or a lone '>'.
                    self.pos += 1;
                    continue;
                }
            };
            return Ok(Some(token));
        }
    }

    /// Read one value inside an array or dictionary. Bare keywords are kept as names.
    fn value(&mut self, context: &str) -> Result<Operand, BackendError> {
        match self.next_token()? {
            Some(Token::Operand(operand)) => Ok(operand),
            Some(Token::Keyword(keyword)) => Ok(Operand::Name(keyword)),
            Some(Token::ArrayEnd) | Some(Token::DictEnd) => {
                Err(tokenize_error(format!("missing value in {context}")))
            }
            None => Err(tokenize_error(format!("unterminated {context}"))),
        }
    }

    fn array(&mut self) -> Result<Vec<Operand>, BackendError> {
        let mut items = Vec::new();
        loop {
            match self.next_token()? {
                Some(Token::ArrayEnd) => return Ok(items),
                Some(Token::Operand(operand)) => items.push(operand),
                Some(Token::Keyword(keyword)) => items.push(Operand::Name(keyword)),
                Some(Token::DictEnd) => return Err(tokenize_error("unexpected '>>' in array")),
                None => return Err(tokenize_error("unterminated array")),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        let mut entries = Vec::new();
        loop {
            match self.next_token()? {
                Some(Token::DictEnd) => return Ok(entries),
                Some(Token::Operand(Operand::Name(key))) => {
                    let value = self.value("dictionary")?;
                    entries.push((key, value));
                }
                Some(_) => return Err(tokenize_error("expected name key in dictionary")),
                None => return Err(tokenize_error("unterminated dictionary")),
            }
        }
    }

    fn name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }

        let raw = &self.input[start..self.pos];
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    bytes.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            bytes.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn keyword(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut real = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !real => {
                    real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let text = String::from_utf8_lossy(&self.input[start..self.pos]);
        if real {
            text.parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| tokenize_error(format!("invalid real number: {text}")))
        } else {
            text.parse::<i64>()
                .map(Operand::Integer)
                .map_err(|_| tokenize_error(format!("invalid integer: {text}")))
        }
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1usize;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => self.escape(&mut out)?,
                _ => out.push(b),
            }
        }

        Err(tokenize_error("unterminated literal string"))
    }

    /// Handle the byte(s) after a backslash in a literal string.
    fn escape(&mut self, out: &mut Vec<u8>) -> Result<(), BackendError> {
        let Some(b) = self.peek() else {
            return Err(tokenize_error("unterminated escape in literal string"));
        };
        self.pos += 1;
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            // line continuation
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            // \( \) \\ and unknown escapes keep the character
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(tokenize_error("unterminated hex string"));
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let value = hex_value(b)
                .ok_or_else(|| tokenize_error(format!("invalid hex digit: {:?}", b as char)))?;
            digits.push(value);
        }

        // An odd trailing digit is padded with 0.
        Ok(digits
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect())
    }

    /// Parse the rest of an inline image after `BI` has been consumed.
    fn inline_image(&mut self) -> Result<InlineImage, BackendError> {
        let mut dict = Vec::new();
        loop {
            match self.next_token()? {
                Some(Token::Keyword(keyword)) if keyword == "ID" => break,
                Some(Token::Operand(Operand::Name(key))) => {
                    let value = self.value("inline image dictionary")?;
                    dict.push((key, value));
                }
                Some(_) => {
                    return Err(tokenize_error(
                        "expected name key in inline image dictionary",
                    ));
                }
                None => return Err(tokenize_error("unterminated inline image (missing ID)")),
            }
        }

        // A single whitespace byte separates ID from the data.
        if self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }

        let start = self.pos;
        let mut i = start;
        while i + 2 <= self.input.len() {
            let preceded = i == start || is_whitespace(self.input[i - 1]);
            let followed = self
                .input
                .get(i + 2)
                .is_none_or(|&b| is_whitespace(b) || is_delimiter(b));
            if preceded && followed && &self.input[i..i + 2] == b"EI" {
                let mut end = i;
                if end > start && is_whitespace(self.input[end - 1]) {
                    end -= 1;
                }
                let data = self.input[start..end].to_vec();
                self.pos = i + 2;
                return Ok(InlineImage { dict, data });
            }
            i += 1;
        }

        Err(tokenize_error("unterminated inline image (missing EI)"))
    }
}
