use super::LuaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Number(f64),
    Str(String),
    // keywords
    Local,
    Return,
    True,
    False,
    Nil,
    And,
    Or,
    Not,
    Function,
    // punctuation
    LCurly,
    RCurly,
    LBrack,
    RBrack,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Concat,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Hash,
    Eof,
}

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Name(n) => format!("name '{n}'"),
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Local => "local",
            Token::Return => "return",
            Token::True => "true",
            Token::False => "false",
            Token::Nil => "nil",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Function => "function",
            Token::LCurly => "{",
            Token::RCurly => "}",
            Token::LBrack => "[",
            Token::RBrack => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::Concat => "..",
            Token::Assign => "=",
            Token::Eq => "==",
            Token::NotEq => "~=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Hash => "#",
            Token::Name(_) | Token::Number(_) | Token::Str(_) | Token::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
        }
    }

    /// Whole input as tokens, terminated by `Token::Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LuaError> {
        // shebang lines are legal at the top of a chunk
        if self.src.starts_with("#!") {
            while let Some(&(_, c)) = self.chars.peek() {
                if c == '\n' {
                    break;
                }
                self.chars.next();
            }
        }

        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(&(start, c)) = self.chars.peek() else {
                out.push(Spanned {
                    token: Token::Eof,
                    line,
                });
                return Ok(out);
            };

            let token = if c.is_ascii_alphabetic() || c == '_' {
                self.name()
            } else if c.is_ascii_digit() {
                self.number(start)?
            } else if c == '"' || c == '\'' {
                self.chars.next();
                Token::Str(self.short_string(c)?)
            } else {
                self.chars.next();
                match c {
                    '{' => Token::LCurly,
                    '}' => Token::RCurly,
                    ']' => Token::RBrack,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    ';' => Token::Semicolon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Caret,
                    '#' => Token::Hash,
                    '[' => match self.long_bracket_level() {
                        Some(level) => Token::Str(self.long_body(level)?),
                        None => Token::LBrack,
                    },
                    '.' => {
                        if self.eat('.') {
                            Token::Concat
                        } else if matches!(self.chars.peek(), Some((_, d)) if d.is_ascii_digit()) {
                            self.number(start)?
                        } else {
                            Token::Dot
                        }
                    }
                    '=' => {
                        if self.eat('=') {
                            Token::Eq
                        } else {
                            Token::Assign
                        }
                    }
                    '~' if self.eat('=') => Token::NotEq,
                    '<' => {
                        if self.eat('=') {
                            Token::LtEq
                        } else {
                            Token::Lt
                        }
                    }
                    '>' => {
                        if self.eat('=') {
                            Token::GtEq
                        } else {
                            Token::Gt
                        }
                    }
                    ch => return Err(LuaError::UnexpectedChar { line, ch }),
                }
            };
            out.push(Spanned { token, line });
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), LuaError> {
        loop {
            match self.chars.peek() {
                Some(&(_, c)) if c.is_whitespace() => {
                    self.bump();
                }
                Some(&(i, '-')) if self.src[i..].starts_with("--") => {
                    self.chars.next();
                    self.chars.next();
                    if self.eat('[') {
                        if let Some(level) = self.long_bracket_level() {
                            self.long_body(level)?;
                            continue;
                        }
                    }
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Called after an opening `[`. Consumes `=*[` and returns the level, or
    /// consumes nothing when this is not a long bracket.
    fn long_bracket_level(&mut self) -> Option<usize> {
        let &(i, _) = self.chars.peek()?;
        let rest = &self.src[i..];
        let level = rest.chars().take_while(|&c| c == '=').count();
        if rest[level..].starts_with('[') {
            for _ in 0..=level {
                self.chars.next();
            }
            Some(level)
        } else {
            None
        }
    }

    fn long_body(&mut self, level: usize) -> Result<String, LuaError> {
        let start_line = self.line;
        let close = format!("]{}]", "=".repeat(level));
        // a newline right after the opening bracket is skipped
        if self.eat('\n') {
            self.line += 1;
        }
        let mut body = String::new();
        loop {
            let Some(&(i, _)) = self.chars.peek() else {
                return Err(LuaError::UnterminatedLong { line: start_line });
            };
            if self.src[i..].starts_with(&close) {
                for _ in 0..close.len() {
                    self.chars.next();
                }
                return Ok(body);
            }
            if let Some(c) = self.bump() {
                body.push(c);
            }
        }
    }

    fn name(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "local" => Token::Local,
            "return" => Token::Return,
            "true" => Token::True,
            "false" => Token::False,
            "nil" => Token::Nil,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "function" => Token::Function,
            _ => Token::Name(ident),
        }
    }

    /// `start` is the byte offset of the first character of the literal,
    /// which may already have been consumed (a leading `.`).
    fn number(&mut self, start: usize) -> Result<Token, LuaError> {
        let mut end = start;
        let mut prev = '\0';
        let hex = self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X");
        if self.src[start..].starts_with('.') {
            end += 1;
        }
        while let Some(&(i, c)) = self.chars.peek() {
            if i < end {
                self.chars.next();
                continue;
            }
            let exponent = if hex { 'p' } else { 'e' };
            let accepted = c.is_ascii_alphanumeric()
                || c == '.'
                || ((c == '+' || c == '-') && prev.eq_ignore_ascii_case(&exponent));
            if !accepted {
                break;
            }
            prev = c;
            end = i + c.len_utf8();
            self.chars.next();
        }
        let text = &self.src[start..end];
        let value = if hex {
            i64::from_str_radix(&text[2..], 16).ok().map(|v| v as f64)
        } else {
            text.parse::<f64>().ok()
        };
        value
            .map(Token::Number)
            .ok_or_else(|| LuaError::MalformedNumber {
                line: self.line,
                text: text.to_string(),
            })
    }

    fn short_string(&mut self, quote: char) -> Result<String, LuaError> {
        let line = self.line;
        let mut s = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(LuaError::UnterminatedString { line });
            };
            match c {
                '\n' => return Err(LuaError::UnterminatedString { line }),
                c if c == quote => return Ok(s),
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(LuaError::UnterminatedString { line });
                    };
                    match esc {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        'a' => s.push('\u{7}'),
                        'b' => s.push('\u{8}'),
                        'f' => s.push('\u{c}'),
                        'v' => s.push('\u{b}'),
                        '\\' => s.push('\\'),
                        '"' => s.push('"'),
                        '\'' => s.push('\''),
                        '\n' => s.push('\n'),
                        d if d.is_ascii_digit() => {
                            let mut code = d.to_digit(10).unwrap_or(0);
                            for _ in 0..2 {
                                match self.chars.peek() {
                                    Some(&(_, n)) if n.is_ascii_digit() => {
                                        code = code * 10 + n.to_digit(10).unwrap_or(0);
                                        self.chars.next();
                                    }
                                    _ => break,
                                }
                            }
                            match char::from_u32(code) {
                                Some(ch) if code < 256 => s.push(ch),
                                _ => return Err(LuaError::InvalidEscape { line, ch: d }),
                            }
                        }
                        other => return Err(LuaError::InvalidEscape { line, ch: other }),
                    }
                }
                c => s.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn numbers_in_all_forms() {
        assert_eq!(
            tokens("1 2.5 .5 1e3 1.5E-2 0x1F 3."),
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(0.015),
                Token::Number(31.0),
                Token::Number(3.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn minus_is_an_operator_not_part_of_the_literal() {
        assert_eq!(
            tokens("{-1, 2-3}"),
            vec![
                Token::LCurly,
                Token::Minus,
                Token::Number(1.0),
                Token::Comma,
                Token::Number(2.0),
                Token::Minus,
                Token::Number(3.0),
                Token::RCurly,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let src = "-- header\n--[[ block\n comment ]]\nx --[==[ another ]==] = 1";
        let spanned = Lexer::new(src).tokenize().unwrap();
        assert_eq!(spanned[0].token, Token::Name("x".into()));
        assert_eq!(spanned[0].line, 4);
        assert_eq!(spanned[1].token, Token::Assign);
        assert_eq!(spanned[2].token, Token::Number(1.0));
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            tokens(r#"'a\'b' "c\nd" [[long
text]] "\65""#),
            vec![
                Token::Str("a'b".into()),
                Token::Str("c\nd".into()),
                Token::Str("long\ntext".into()),
                Token::Str("A".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn index_bracket_is_not_a_long_string() {
        assert_eq!(
            tokens("t[1]"),
            vec![
                Token::Name("t".into()),
                Token::LBrack,
                Token::Number(1.0),
                Token::RBrack,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = Lexer::new("x = 1\ny = 'abc\n").tokenize().unwrap_err();
        assert_eq!(err, LuaError::UnterminatedString { line: 2 });
    }
}
