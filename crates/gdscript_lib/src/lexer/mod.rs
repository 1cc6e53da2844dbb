//! # Lexer Module
//!
//! Streaming, character-driven tokenization of GDScript source text.
//!
//! ## Architecture Overview
//!
//! ```text
//! Source Code  →  Character Classifier  →  Token Stream  →  Parser
//!    (String)        (chars.rs)            (Lossless)       (CST)
//! ```
//!
//! The tokenizer is a single forward pass over the input codepoints. It
//! never fails and never drops a byte: whitespace, indentation runs,
//! comments, newlines and even character sequences no token form accepts
//! all become tokens. Concatenating the `text` of the produced tokens
//! reproduces the input exactly, which is the foundation of the lossless
//! round-trip guarantee of the whole toolkit.
//!
//! ### Key Components
//! - **Lexer**: the scanning state machine with line/column tracking
//! - **Token**: tagged atoms carrying their literal text and start position
//! - **IndentRun**: the indentation model (tab or space-group units)
//!
//! ### Position Tracking
//! Lines are 1-based, columns 0-based, counted in codepoints. Triple-quoted
//! string parts may span lines; the tracker advances across their embedded
//! newlines.
//!
//! ### Error Handling
//! There are no lexer errors. A lone carriage return in the middle of a
//! file and any unrecognized character sequence become [`TokenKind::Invalid`]
//! tokens plus a `GD0001` diagnostic; an unterminated string produces the
//! tokens seen so far plus a `GD0002` diagnostic.

pub mod chars;
mod indent;
mod token;

pub use indent::*;
pub use token::*;

use crate::diagnostics::{Diagnostic, DiagnosticKind};

/// Result of tokenizing one file. Tokenization itself cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    col: usize,
    at_line_start: bool,
    detected_space_width: Option<usize>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(input: &str) -> Lexer {
        Lexer {
            chars: input.chars().collect(),
            position: 0,
            line: 1,
            col: 0,
            at_line_start: true,
            detected_space_width: None,
            tokens: vec![],
            diagnostics: vec![],
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> char {
        let c = self.chars[self.position];
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, col: usize) {
        self.tokens.push(Token::new(kind, text, line, col));
    }

    pub fn lex(mut self) -> LexOutput {
        while self.position < self.chars.len() {
            if self.at_line_start {
                self.at_line_start = false;
                if matches!(self.peek(), Some(c) if chars::is_space(c)) {
                    self.lex_indent();
                    continue;
                }
            }

            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };

            match c {
                '\n' => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.push(TokenKind::Newline, "\n".into(), line, col);
                    self.at_line_start = true;
                }
                '\r' => self.lex_carriage_return(),
                _ if chars::is_space(c) => self.lex_space_run(),
                '#' => self.lex_comment(),
                _ if chars::is_quote(c) => self.lex_string(),
                _ if chars::is_identifier_start(c) => self.lex_identifier(),
                _ if chars::is_digit(c) => self.lex_number(),
                _ => self.lex_punct_or_invalid(),
            }
        }

        LexOutput {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn lex_indent(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut pattern = String::new();
        while matches!(self.peek(), Some(c) if chars::is_space(c)) {
            pattern.push(self.bump());
        }

        // The first purely space-based indentation of the file fixes the
        // width of one space group for the rest of the scan.
        if self.detected_space_width.is_none() && !pattern.contains('\t') {
            self.detected_space_width = Some(pattern.chars().count());
        }

        let width = self.detected_space_width.unwrap_or(4).max(1);
        let run = IndentRun::from_pattern(&pattern, width);
        self.push(TokenKind::Indent(run), pattern, line, col);
    }

    fn lex_carriage_return(&mut self) {
        let (line, col) = (self.line, self.col);
        match self.peek_at(1) {
            Some('\n') => {
                self.bump();
                self.bump();
                // the bump of '\r' moved the column; position the token at '\r'
                self.push(TokenKind::Newline, "\r\n".into(), line, col);
                self.at_line_start = true;
            }
            None => {
                // CR at end of file is tolerated as a line terminator.
                self.bump();
                self.push(TokenKind::Newline, "\r".into(), line, col);
                self.at_line_start = true;
            }
            Some(_) => {
                self.bump();
                self.push(TokenKind::Invalid, "\r".into(), line, col);
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::InvalidToken,
                    "stray carriage return without a following line feed",
                    (line, col),
                    (line, col + 1),
                ));
            }
        }
    }

    fn lex_space_run(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if chars::is_space(c)) {
            text.push(self.bump());
        }
        self.push(TokenKind::Space, text, line, col);
    }

    fn lex_comment(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if !chars::is_newline(c)) {
            text.push(self.bump());
        }
        self.push(TokenKind::Comment, text, line, col);
    }

    fn lex_identifier(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if chars::is_identifier_part(c)) {
            text.push(self.bump());
        }

        let kind = match Keyword::from_str(&text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        };
        self.push(kind, text, line, col);
    }

    fn lex_number(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        text.push(self.bump());

        let radix_tail: fn(char) -> bool = match (text.as_str(), self.peek()) {
            ("0", Some('x' | 'X')) => {
                text.push(self.bump());
                |c| chars::is_hex_digit(c) || c == '_'
            }
            ("0", Some('b' | 'B')) => {
                text.push(self.bump());
                |c| chars::is_bin_digit(c) || c == '_'
            }
            _ => |c| chars::is_digit(c) || c == '_',
        };

        while matches!(self.peek(), Some(c) if radix_tail(c)) {
            text.push(self.bump());
        }

        if !text.starts_with("0x") && !text.starts_with("0b") {
            // fractional part, only when a digit follows the dot
            if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if chars::is_digit(c))
            {
                text.push(self.bump());
                while matches!(self.peek(), Some(c) if chars::is_digit(c) || c == '_') {
                    text.push(self.bump());
                }
            }

            if matches!(self.peek(), Some('e' | 'E')) {
                let exponent_digit = match self.peek_at(1) {
                    Some(c) if chars::is_digit(c) => true,
                    Some('+' | '-') => {
                        matches!(self.peek_at(2), Some(c) if chars::is_digit(c))
                    }
                    _ => false,
                };
                if exponent_digit {
                    text.push(self.bump());
                    if matches!(self.peek(), Some('+' | '-')) {
                        text.push(self.bump());
                    }
                    while matches!(self.peek(), Some(c) if chars::is_digit(c)) {
                        text.push(self.bump());
                    }
                }
            }
        }

        self.push(TokenKind::Number, text, line, col);
    }

    fn lex_string(&mut self) {
        let (line, col) = (self.line, self.col);
        let quote = self.peek().unwrap_or('"');
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);

        let style = match (quote, triple) {
            ('\'', false) => QuoteStyle::Single,
            ('\'', true) => QuoteStyle::TripleSingle,
            (_, false) => QuoteStyle::Double,
            (_, true) => QuoteStyle::TripleDouble,
        };

        for _ in 0..if triple { 3 } else { 1 } {
            self.bump();
        }
        self.push(
            TokenKind::QuoteOpen(style),
            style.text().to_string(),
            line,
            col,
        );

        let (part_line, part_col) = (self.line, self.col);
        let mut part = String::new();

        loop {
            let Some(c) = self.peek() else {
                self.finish_unterminated(style, part, part_line, part_col, line, col);
                return;
            };

            if !triple && chars::is_newline(c) {
                self.finish_unterminated(style, part, part_line, part_col, line, col);
                return;
            }

            if c == '\\' && self.peek_at(1).is_some() {
                part.push(self.bump());
                part.push(self.bump());
                continue;
            }

            let closes = if triple {
                c == quote && self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote)
            } else {
                c == quote
            };

            if closes {
                if !part.is_empty() {
                    self.push(TokenKind::StringPart, part, part_line, part_col);
                }
                let (close_line, close_col) = (self.line, self.col);
                for _ in 0..if triple { 3 } else { 1 } {
                    self.bump();
                }
                self.push(
                    TokenKind::QuoteClose(style),
                    style.text().to_string(),
                    close_line,
                    close_col,
                );
                return;
            }

            part.push(self.bump());
        }
    }

    fn finish_unterminated(
        &mut self,
        style: QuoteStyle,
        part: String,
        part_line: usize,
        part_col: usize,
        open_line: usize,
        open_col: usize,
    ) {
        if !part.is_empty() {
            self.push(TokenKind::StringPart, part, part_line, part_col);
        }
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnterminatedString,
            format!("string starting with {} is never closed", style.text()),
            (open_line, open_col),
            (self.line, self.col),
        ));
    }

    fn lex_punct_or_invalid(&mut self) {
        let (line, col) = (self.line, self.col);
        let c = self.peek().unwrap_or('\0');
        let next = self.peek_at(1);
        let third = self.peek_at(2);

        let (punct, length) = match c {
            '(' => (Some(Punct::LParen), 1),
            ')' => (Some(Punct::RParen), 1),
            '[' => (Some(Punct::LBracket), 1),
            ']' => (Some(Punct::RBracket), 1),
            '{' => (Some(Punct::LBrace), 1),
            '}' => (Some(Punct::RBrace), 1),
            ',' => (Some(Punct::Comma), 1),
            ';' => (Some(Punct::Semicolon), 1),
            '~' => (Some(Punct::Tilde), 1),
            '@' => (Some(Punct::At), 1),
            '$' => (Some(Punct::Dollar), 1),
            '\\' => (Some(Punct::Backslash), 1),
            ':' => match next {
                Some('=') => (Some(Punct::ColonAssign), 2),
                _ => (Some(Punct::Colon), 1),
            },
            '.' => match next {
                Some('.') => (Some(Punct::DotDot), 2),
                _ => (Some(Punct::Dot), 1),
            },
            '-' => match next {
                Some('>') => (Some(Punct::Arrow), 2),
                Some('=') => (Some(Punct::MinusAssign), 2),
                _ => (Some(Punct::Minus), 1),
            },
            '+' => match next {
                Some('=') => (Some(Punct::PlusAssign), 2),
                _ => (Some(Punct::Plus), 1),
            },
            '*' => match (next, third) {
                (Some('*'), Some('=')) => (Some(Punct::PowerAssign), 3),
                (Some('*'), _) => (Some(Punct::Power), 2),
                (Some('='), _) => (Some(Punct::TimesAssign), 2),
                _ => (Some(Punct::Times), 1),
            },
            '/' => match next {
                Some('=') => (Some(Punct::DivideAssign), 2),
                _ => (Some(Punct::Divide), 1),
            },
            '%' => match next {
                Some('=') => (Some(Punct::ModAssign), 2),
                _ => (Some(Punct::Mod), 1),
            },
            '=' => match next {
                Some('=') => (Some(Punct::Equal), 2),
                _ => (Some(Punct::Assign), 1),
            },
            '!' => match next {
                Some('=') => (Some(Punct::NotEqual), 2),
                _ => (Some(Punct::Bang), 1),
            },
            '<' => match (next, third) {
                (Some('<'), Some('=')) => (Some(Punct::ShiftLeftAssign), 3),
                (Some('<'), _) => (Some(Punct::ShiftLeft), 2),
                (Some('='), _) => (Some(Punct::LessOrEqual), 2),
                _ => (Some(Punct::Less), 1),
            },
            '>' => match (next, third) {
                (Some('>'), Some('=')) => (Some(Punct::ShiftRightAssign), 3),
                (Some('>'), _) => (Some(Punct::ShiftRight), 2),
                (Some('='), _) => (Some(Punct::GreaterOrEqual), 2),
                _ => (Some(Punct::Greater), 1),
            },
            '&' => match next {
                Some('&') => (Some(Punct::AmpAmp), 2),
                Some('=') => (Some(Punct::AndAssign), 2),
                _ => (Some(Punct::Ampersand), 1),
            },
            '|' => match next {
                Some('|') => (Some(Punct::PipePipe), 2),
                Some('=') => (Some(Punct::OrAssign), 2),
                _ => (Some(Punct::Pipe), 1),
            },
            '^' => match next {
                Some('=') => (Some(Punct::XorAssign), 2),
                _ => (Some(Punct::Caret), 1),
            },
            _ => (None, 0),
        };

        if let Some(punct) = punct {
            let mut text = String::new();
            for _ in 0..length {
                text.push(self.bump());
            }
            self.push(TokenKind::Punct(punct), text, line, col);
            return;
        }

        // No token form accepts this character: collect the minimal run of
        // such characters into one invalid token and keep going.
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if chars::is_space(c)
                || chars::is_newline(c)
                || chars::is_quote(c)
                || chars::is_identifier_start(c)
                || chars::is_digit(c)
                || c == '#'
                || "()[]{},;~@$\\:.-+*/%=!<>&|^".contains(c)
            {
                break;
            }
            text.push(self.bump());
        }

        let end = (self.line, self.col);
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::InvalidToken,
            format!("unrecognized character sequence '{text}'"),
            (line, col),
            end,
        ));
        self.push(TokenKind::Invalid, text, line, col);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> LexOutput {
        Lexer::new(input).lex()
    }

    fn joined(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_lossless_simple_declaration() {
        let input = "var x = 10\n";
        let output = lex(input);
        assert_eq!(joined(&output.tokens), input);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_keyword_vs_identifier() {
        let output = lex("var variable");
        assert_eq!(output.tokens[0].kind, TokenKind::Keyword(Keyword::Var));
        assert_eq!(output.tokens[2].kind, TokenKind::Identifier);
        assert_eq!(output.tokens[2].text, "variable");
    }

    #[test]
    fn test_indent_token_on_indented_line() {
        let output = lex("if true:\n\tpass\n");
        let indent = output
            .tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Indent(_)))
            .expect("no indent token");
        let TokenKind::Indent(run) = &indent.kind else {
            unreachable!()
        };
        assert_eq!(run.units, 1);
        assert_eq!(run.style, IndentStyle::Tabs);
    }

    #[test]
    fn test_space_width_detection() {
        let output = lex("if true:\n  pass\n    pass\n");
        let runs: Vec<_> = output
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Indent(run) => Some(run.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(runs[0].units, 1);
        assert_eq!(runs[1].units, 2);
    }

    #[test]
    fn test_string_tokens() {
        let output = lex("var s = \"hello\\n\"");
        let kinds: Vec<_> = output.tokens.iter().map(|t| t.kind.clone()).collect();
        assert!(kinds.contains(&TokenKind::QuoteOpen(QuoteStyle::Double)));
        assert!(kinds.contains(&TokenKind::QuoteClose(QuoteStyle::Double)));
        let part = output
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::StringPart)
            .unwrap();
        assert_eq!(part.text, "hello\\n");
    }

    #[test]
    fn test_triple_string_keeps_newlines() {
        let input = "var s = \"\"\"a\nb\"\"\"\n";
        let output = lex(input);
        assert_eq!(joined(&output.tokens), input);
        let part = output
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::StringPart)
            .unwrap();
        assert_eq!(part.text, "a\nb");
    }

    #[test]
    fn test_unterminated_string() {
        let output = lex("var s = \"oops\nvar y = 1\n");
        assert_eq!(joined(&output.tokens), "var s = \"oops\nvar y = 1\n");
        assert!(output.diagnostics.iter().any(|d| d.code == "GD0002"));
    }

    #[test]
    fn test_number_forms() {
        for (input, expected) in [
            ("42", "42"),
            ("3.14", "3.14"),
            ("1e5", "1e5"),
            ("1.5e-3", "1.5e-3"),
            ("0xFF", "0xFF"),
            ("0b1010", "0b1010"),
            ("1_000_000", "1_000_000"),
        ] {
            let output = lex(input);
            assert_eq!(output.tokens[0].kind, TokenKind::Number, "for {input}");
            assert_eq!(output.tokens[0].text, expected, "for {input}");
        }
    }

    #[test]
    fn test_member_call_on_integer_literal() {
        let output = lex("10.clamp(0, 5)");
        assert_eq!(output.tokens[0].text, "10");
        assert_eq!(output.tokens[1].kind, TokenKind::Punct(Punct::Dot));
    }

    #[test]
    fn test_invalid_run_preserved() {
        let output = lex("var x = ?? + 1\n");
        assert_eq!(joined(&output.tokens), "var x = ?? + 1\n");
        let invalid = output
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::Invalid)
            .unwrap();
        assert_eq!(invalid.text, "??");
        assert!(output.diagnostics.iter().any(|d| d.code == "GD0001"));
    }

    #[test]
    fn test_crlf_newline() {
        let output = lex("var x = 1\r\nvar y = 2\r\n");
        assert_eq!(joined(&output.tokens), "var x = 1\r\nvar y = 2\r\n");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_lone_cr_is_invalid_except_at_eof() {
        let mid = lex("a\rb");
        assert!(mid.diagnostics.iter().any(|d| d.code == "GD0001"));
        assert_eq!(joined(&mid.tokens), "a\rb");

        let eof = lex("a\r");
        assert!(eof.diagnostics.is_empty());
        assert_eq!(joined(&eof.tokens), "a\r");
    }

    #[test]
    fn test_random_bytes_do_not_panic() {
        let noise = "\u{1}\u{2}?¿§\\\u{7f}\t \"unclosed\n\r\r\n0x 1e+ .. @@";
        let output = lex(noise);
        assert_eq!(joined(&output.tokens), noise);
    }
}
