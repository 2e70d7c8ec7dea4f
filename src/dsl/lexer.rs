use super::ast::Span;
use super::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals. Integer tokens carry the unsigned magnitude; range checks
    // happen in the parser once a leading `-` has been folded in.
    Int(i64),
    Byte(i64),
    Short(i64),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),

    // Identifiers & keywords
    Ident(String),
    Keyword(Keyword),
    /// `@a`, `@e[type=zombie]`
    Selector(String),
    /// `@tick`
    Annotation(String),
    /// `minecraft:stone`, `pack:util/reset`
    Resource(String),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    DotDot,
    Colon,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
    Bang,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,

    // Special
    Invalid(String),
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    If,
    Else,
    While,
    Function,
    Enum,
    As,
    At,
    Say,
    Tellraw,
    Give,
    Tag,
    Kill,
    Summon,
    Cmd,
    Return,
    True,
    False,
    In,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("var", Keyword::Var),
    ("let", Keyword::Let),
    ("if", Keyword::If),
    ("else", Keyword::Else),
    ("while", Keyword::While),
    ("function", Keyword::Function),
    ("enum", Keyword::Enum),
    ("as", Keyword::As),
    ("at", Keyword::At),
    ("say", Keyword::Say),
    ("tellraw", Keyword::Tellraw),
    ("give", Keyword::Give),
    ("tag", Keyword::Tag),
    ("kill", Keyword::Kill),
    ("summon", Keyword::Summon),
    ("cmd", Keyword::Cmd),
    ("return", Keyword::Return),
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("in", Keyword::In),
];

/// Longest entries first; the first prefix match wins.
const OPERATORS: &[(&str, Token)] = &[
    ("..", Token::DotDot),
    ("&&", Token::And),
    ("||", Token::Or),
    ("==", Token::EqEq),
    ("!=", Token::Ne),
    ("<=", Token::Le),
    (">=", Token::Ge),
    ("+=", Token::PlusEq),
    ("-=", Token::MinusEq),
    ("*=", Token::StarEq),
    ("/=", Token::SlashEq),
    ("%=", Token::PercentEq),
    ("(", Token::LParen),
    (")", Token::RParen),
    ("{", Token::LBrace),
    ("}", Token::RBrace),
    ("[", Token::LBracket),
    ("]", Token::RBracket),
    (",", Token::Comma),
    (".", Token::Dot),
    (":", Token::Colon),
    (";", Token::Semicolon),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Star),
    ("/", Token::Slash),
    ("%", Token::Percent),
    ("<", Token::Lt),
    (">", Token::Gt),
    ("!", Token::Bang),
    ("=", Token::Eq),
];

impl Keyword {
    pub fn text(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, k)| *k == self)
            .map_or("", |(text, _)| text)
    }
}

pub fn keyword(word: &str) -> Option<Keyword> {
    KEYWORDS.iter().find(|(text, _)| *text == word).map(|(_, k)| *k)
}

pub fn is_keyword(word: &str) -> bool {
    keyword(word).is_some()
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize `source`. Lexing never aborts: problems are returned alongside
/// the best-effort token stream, which always ends with `Eof`.
pub fn lex(source: &str) -> (Vec<SpannedToken>, Vec<CompileError>) {
    let mut lexer = Lexer::new(source);
    lexer.tokenize();
    (lexer.tokens, lexer.errors)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<SpannedToken>,
    errors: Vec<CompileError>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_resource_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'/' | b'-' | b'.')
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn tokenize(&mut self) {
        while self.pos < self.bytes.len() {
            self.skip_whitespace_and_comments();
            if self.pos >= self.bytes.len() {
                break;
            }

            let start = self.pos;
            let ch = self.bytes[self.pos];

            match ch {
                b'\n' | b'\r' => {
                    // Collapse multiple newlines
                    while self.pos < self.bytes.len()
                        && (self.bytes[self.pos] == b'\n' || self.bytes[self.pos] == b'\r')
                    {
                        self.pos += 1;
                    }
                    if let Some(last) = self.tokens.last() {
                        if !Self::continues_expression(&last.token) {
                            self.push(Token::Newline, start, self.pos);
                        }
                    }
                }
                b'"' => {
                    self.pos += 1;
                    self.lex_string(start);
                }
                b'@' => {
                    self.pos += 1;
                    self.lex_at(start);
                }
                b'0'..=b'9' => self.lex_number(start),
                b if is_ident_start(b) => self.lex_ident(start),
                _ => {
                    if !self.lex_operator(start) {
                        let bad = self.source[start..].chars().next().unwrap_or('?');
                        self.pos += bad.len_utf8();
                        self.errors.push(CompileError::lexer(
                            format!("Unexpected character: '{bad}'"),
                            Span::new(start, self.pos),
                        ));
                        self.push(Token::Invalid(bad.to_string()), start, self.pos);
                    }
                }
            }
        }

        // Remove trailing newline
        if let Some(last) = self.tokens.last() {
            if matches!(last.token, Token::Newline) {
                self.tokens.pop();
            }
        }

        self.tokens.push(SpannedToken {
            token: Token::Eof,
            span: Span::new(self.pos, self.pos),
        });
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn push(&mut self, token: Token, start: usize, end: usize) {
        // A leading operator (or `else`) on a new line continues the previous
        // line, so the separating Newline is dropped.
        if Self::continues_from_previous(&token) {
            if let Some(last) = self.tokens.last() {
                if matches!(last.token, Token::Newline) {
                    self.tokens.pop();
                }
            }
        }
        self.tokens.push(SpannedToken {
            token,
            span: Span::new(start, end),
        });
    }

    /// Returns true if a newline after this token should be suppressed,
    /// because the token indicates an expression continues on the next line.
    fn continues_expression(token: &Token) -> bool {
        matches!(
            token,
            Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Slash
                | Token::Percent
                | Token::Lt
                | Token::Gt
                | Token::Le
                | Token::Ge
                | Token::EqEq
                | Token::Ne
                | Token::And
                | Token::Or
                | Token::Eq
                | Token::PlusEq
                | Token::MinusEq
                | Token::StarEq
                | Token::SlashEq
                | Token::PercentEq
                | Token::Comma
                | Token::LParen
                | Token::LBrace
                | Token::LBracket
                | Token::Annotation(_)
                | Token::Newline
        )
    }

    /// Returns true if this token at the START of a new line means the
    /// previous line continues. Excludes `-` and `!`, which also start
    /// statements as unary operators.
    fn continues_from_previous(token: &Token) -> bool {
        matches!(
            token,
            Token::Plus
                | Token::Star
                | Token::Percent
                | Token::Lt
                | Token::Gt
                | Token::Le
                | Token::Ge
                | Token::EqEq
                | Token::Ne
                | Token::And
                | Token::Or
                | Token::Dot
                | Token::Keyword(Keyword::Else)
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' => self.pos += 1,
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_operator(&mut self, start: usize) -> bool {
        let rest = &self.source[start..];
        let Some((text, token)) = OPERATORS.iter().find(|(text, _)| rest.starts_with(text)) else {
            return false;
        };
        self.pos += text.len();
        self.push(token.clone(), start, self.pos);
        true
    }

    /// Strings take one level of backslash escaping. An unescaped line break
    /// ends the literal with a diagnostic; the partial value is kept.
    fn lex_string(&mut self, start: usize) {
        let mut value = String::new();
        let mut chars = self.source[self.pos..].char_indices();
        let mut terminated = false;
        let mut consumed = 0;
        while let Some((i, ch)) = chars.next() {
            consumed = i + ch.len_utf8();
            match ch {
                '"' => {
                    terminated = true;
                    break;
                }
                '\n' | '\r' => {
                    // Leave the line break for the main loop.
                    consumed = i;
                    break;
                }
                '\\' => match chars.next() {
                    Some((j, esc)) => {
                        consumed = j + esc.len_utf8();
                        value.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                    None => break,
                },
                c => value.push(c),
            }
        }
        self.pos += consumed;
        if !terminated {
            self.errors.push(CompileError::lexer(
                "Unterminated string literal",
                Span::new(start, self.pos),
            ));
        }
        self.push(Token::String(value), start, self.pos);
    }

    fn lex_number(&mut self, start: usize) {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        // The point belongs to the number only when a digit follows, so
        // `3..5` stays a range.
        let mut decimal = false;
        if self.peek() == Some(b'.') && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
            decimal = true;
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let digits_end = self.pos;
        let suffix = match self.peek() {
            Some(b) if b"bBsSlLfFdD".contains(&b)
                && !self.bytes.get(self.pos + 1).copied().is_some_and(is_ident_continue) =>
            {
                self.pos += 1;
                Some(b.to_ascii_lowercase())
            }
            _ => None,
        };
        let text = &self.source[start..digits_end];
        let span = Span::new(start, self.pos);

        let token = if decimal || matches!(suffix, Some(b'f' | b'd')) {
            if matches!(suffix, Some(b'b' | b's' | b'l')) {
                self.errors.push(CompileError::lexer(
                    format!("Integer suffix on decimal literal: {}", &self.source[start..self.pos]),
                    span,
                ));
            }
            match suffix {
                Some(b'f') => text.parse::<f32>().map(Token::Float).ok(),
                _ => text.parse::<f64>().map(Token::Double).ok(),
            }
        } else {
            text.parse::<i64>().ok().map(|v| match suffix {
                Some(b'b') => Token::Byte(v),
                Some(b's') => Token::Short(v),
                Some(b'l') => Token::Long(v),
                _ => Token::Int(v),
            })
        };
        match token {
            Some(token) => self.push(token, start, self.pos),
            None => {
                self.errors.push(CompileError::lexer(
                    format!("Number out of range: {}", &self.source[start..self.pos]),
                    span,
                ));
                self.push(Token::Int(0), start, self.pos);
            }
        }
    }

    /// `@s`, `@e[...]` or `@annotation`.
    fn lex_at(&mut self, start: usize) {
        let name_start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        let name = &self.source[name_start..self.pos];
        let is_selector = name.len() == 1 && name.chars().all(|c| "aesprn".contains(c));
        if is_selector {
            if self.peek() == Some(b'[') {
                self.lex_selector_arguments(start);
            }
            let text = self.source[start..self.pos].to_string();
            self.push(Token::Selector(text), start, self.pos);
        } else if name.is_empty() {
            self.errors.push(CompileError::lexer(
                "Expected selector or annotation after '@'",
                Span::new(start, self.pos),
            ));
            self.push(Token::Invalid("@".into()), start, self.pos);
        } else {
            self.push(Token::Annotation(name.to_string()), start, self.pos);
        }
    }

    /// Consume a balanced `[...]` block, honoring nested brackets, braces and
    /// quoted strings.
    fn lex_selector_arguments(&mut self, start: usize) {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
            match (quote, b) {
                (Some(_), b'\\') if self.peek().is_some() => self.pos += 1,
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[' | b'{') => depth += 1,
                (None, b']' | b'}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
        self.errors.push(CompileError::lexer(
            "Unterminated selector arguments",
            Span::new(start, self.pos),
        ));
    }

    fn lex_ident(&mut self, start: usize) {
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        // `ns:path` when the colon is directly followed by a path character.
        if self.peek() == Some(b':')
            && self.bytes.get(self.pos + 1).copied().is_some_and(is_ident_start)
        {
            self.pos += 1;
            while self.peek().is_some_and(is_resource_char) {
                self.pos += 1;
            }
            let text = self.source[start..self.pos].to_string();
            self.push(Token::Resource(text), start, self.pos);
            return;
        }
        let word = &self.source[start..self.pos];
        let token = match keyword(word) {
            Some(k) => Token::Keyword(k),
            None => Token::Ident(word.to_string()),
        };
        self.push(token, start, self.pos);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Vec<Token> {
        let (tokens, errors) = lex(s);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.token).collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(s.into())
    }

    #[test]
    fn range_is_not_a_decimal() {
        assert_eq!(tok("3..5"), vec![Token::Int(3), Token::DotDot, Token::Int(5), Token::Eof]);
        assert_eq!(tok("3.5"), vec![Token::Double(3.5), Token::Eof]);
    }

    #[test]
    fn numeric_suffixes() {
        assert_eq!(
            tok("1b 2S 3l 1.5f 2d 7"),
            vec![
                Token::Byte(1),
                Token::Short(2),
                Token::Long(3),
                Token::Float(1.5),
                Token::Double(2.0),
                Token::Int(7),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn suffix_needs_word_boundary() {
        assert_eq!(tok("5bx"), vec![Token::Int(5), ident("bx"), Token::Eof]);
    }

    #[test]
    fn keywords_only_on_exact_match() {
        assert_eq!(
            tok("var variable if iff"),
            vec![
                Token::Keyword(Keyword::Var),
                ident("variable"),
                Token::Keyword(Keyword::If),
                ident("iff"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn greedy_operators() {
        assert_eq!(
            tok("+= + == = .. . && || <= <"),
            vec![
                Token::PlusEq,
                Token::Plus,
                Token::EqEq,
                Token::Eq,
                Token::DotDot,
                Token::Dot,
                Token::And,
                Token::Or,
                Token::Le,
                Token::Lt,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn selectors_and_annotations() {
        assert_eq!(
            tok("@s @e[type=zombie,nbt={Tags:[\"a]\"]}] @tick"),
            vec![
                Token::Selector("@s".into()),
                Token::Selector("@e[type=zombie,nbt={Tags:[\"a]\"]}]".into()),
                Token::Annotation("tick".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn selector_member_access() {
        assert_eq!(
            tok("@s.kills"),
            vec![Token::Selector("@s".into()), Token::Dot, ident("kills"), Token::Eof]
        );
    }

    #[test]
    fn resource_locations() {
        assert_eq!(
            tok("minecraft:stone pack:util/reset() a: 1"),
            vec![
                Token::Resource("minecraft:stone".into()),
                Token::Resource("pack:util/reset".into()),
                Token::LParen,
                Token::RParen,
                ident("a"),
                Token::Colon,
                Token::Int(1),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            tok(r#""a\"b\\c\nd\q""#),
            vec![Token::String("a\"b\\c\ndq".into()), Token::Eof]
        );
    }

    #[test]
    fn unterminated_string_recovers() {
        let (tokens, errors) = lex("say \"abc\nsay \"ok\"");
        let tokens: Vec<Token> = tokens.into_iter().map(|t| t.token).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Say),
                Token::String("abc".into()),
                Token::Newline,
                Token::Keyword(Keyword::Say),
                Token::String("ok".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn invalid_character_does_not_abort() {
        let (tokens, errors) = lex("a $ b");
        assert_eq!(errors.len(), 1);
        let tokens: Vec<Token> = tokens.into_iter().map(|t| t.token).collect();
        assert_eq!(tokens, vec![ident("a"), Token::Invalid("$".into()), ident("b"), Token::Eof]);
    }

    #[test]
    fn newlines_as_terminators() {
        assert_eq!(
            tok("let x = 1\n\n\nlet y = 2\n"),
            vec![
                Token::Keyword(Keyword::Let),
                ident("x"),
                Token::Eq,
                Token::Int(1),
                Token::Newline,
                Token::Keyword(Keyword::Let),
                ident("y"),
                Token::Eq,
                Token::Int(2),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn continuation_lines() {
        assert_eq!(
            tok("x = a\n  + b\ny = (\n1)"),
            vec![
                ident("x"),
                Token::Eq,
                ident("a"),
                Token::Plus,
                ident("b"),
                Token::Newline,
                ident("y"),
                Token::Eq,
                Token::LParen,
                Token::Int(1),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn else_on_next_line_joins_if() {
        assert_eq!(
            tok("}\nelse {"),
            vec![Token::RBrace, Token::Keyword(Keyword::Else), Token::LBrace, Token::Eof]
        );
    }

    #[test]
    fn comments_stripped() {
        assert_eq!(tok("a // note\nb"), vec![ident("a"), Token::Newline, ident("b"), Token::Eof]);
    }

    #[test]
    fn int_overflow_is_reported() {
        let (_, errors) = lex("99999999999999999999");
        assert_eq!(errors.len(), 1);
    }
}
