/// Lexer for tokenizing SQL-like queries
///
/// Converts raw SQL text into a stream of tokens for parsing. Every token
/// carries the character offset it starts at so that syntax errors can point
/// at the offending input.
use crate::error::{Error, Result};
use std::fmt;

/// Reserved words. Quoted identifiers never become keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Limit,
    Offset,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    Natural,
    On,
    Using,
    As,
    And,
    Or,
    Not,
    Like,
    In,
    Between,
    Is,
    Null,
    True,
    False,
    Unknown,
    Asc,
    Desc,
    Distinct,
    All,
    Any,
    Some,
    Exists,
    Union,
    Except,
    Intersect,
    With,
    Recursive,
    Case,
    When,
    Then,
    Else,
    End,
    Dual,
    Stdin,
    Values,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "GROUP" => Keyword::Group,
            "BY" => Keyword::By,
            "HAVING" => Keyword::Having,
            "ORDER" => Keyword::Order,
            "LIMIT" => Keyword::Limit,
            "OFFSET" => Keyword::Offset,
            "JOIN" => Keyword::Join,
            "INNER" => Keyword::Inner,
            "LEFT" => Keyword::Left,
            "RIGHT" => Keyword::Right,
            "FULL" => Keyword::Full,
            "OUTER" => Keyword::Outer,
            "CROSS" => Keyword::Cross,
            "NATURAL" => Keyword::Natural,
            "ON" => Keyword::On,
            "USING" => Keyword::Using,
            "AS" => Keyword::As,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "LIKE" => Keyword::Like,
            "IN" => Keyword::In,
            "BETWEEN" => Keyword::Between,
            "IS" => Keyword::Is,
            "NULL" => Keyword::Null,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            "UNKNOWN" => Keyword::Unknown,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "DISTINCT" => Keyword::Distinct,
            "ALL" => Keyword::All,
            "ANY" => Keyword::Any,
            "SOME" => Keyword::Some,
            "EXISTS" => Keyword::Exists,
            "UNION" => Keyword::Union,
            "EXCEPT" => Keyword::Except,
            "INTERSECT" => Keyword::Intersect,
            "WITH" => Keyword::With,
            "RECURSIVE" => Keyword::Recursive,
            "CASE" => Keyword::Case,
            "WHEN" => Keyword::When,
            "THEN" => Keyword::Then,
            "ELSE" => Keyword::Else,
            "END" => Keyword::End,
            "DUAL" => Keyword::Dual,
            "STDIN" => Keyword::Stdin,
            "VALUES" => Keyword::Values,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::Group => "GROUP",
            Keyword::By => "BY",
            Keyword::Having => "HAVING",
            Keyword::Order => "ORDER",
            Keyword::Limit => "LIMIT",
            Keyword::Offset => "OFFSET",
            Keyword::Join => "JOIN",
            Keyword::Inner => "INNER",
            Keyword::Left => "LEFT",
            Keyword::Right => "RIGHT",
            Keyword::Full => "FULL",
            Keyword::Outer => "OUTER",
            Keyword::Cross => "CROSS",
            Keyword::Natural => "NATURAL",
            Keyword::On => "ON",
            Keyword::Using => "USING",
            Keyword::As => "AS",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::Like => "LIKE",
            Keyword::In => "IN",
            Keyword::Between => "BETWEEN",
            Keyword::Is => "IS",
            Keyword::Null => "NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Unknown => "UNKNOWN",
            Keyword::Asc => "ASC",
            Keyword::Desc => "DESC",
            Keyword::Distinct => "DISTINCT",
            Keyword::All => "ALL",
            Keyword::Any => "ANY",
            Keyword::Some => "SOME",
            Keyword::Exists => "EXISTS",
            Keyword::Union => "UNION",
            Keyword::Except => "EXCEPT",
            Keyword::Intersect => "INTERSECT",
            Keyword::With => "WITH",
            Keyword::Recursive => "RECURSIVE",
            Keyword::Case => "CASE",
            Keyword::When => "WHEN",
            Keyword::Then => "THEN",
            Keyword::Else => "ELSE",
            Keyword::End => "END",
            Keyword::Dual => "DUAL",
            Keyword::Stdin => "STDIN",
            Keyword::Values => "VALUES",
        }
    }
}

/// Token types produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),

    // Identifiers
    Identifier(String),
    QuotedIdentifier(String),
    Variable(String),

    // Literals
    Integer(i64),
    Float(f64),
    String(String),

    // Operators
    Eq,     // =
    Ne,     // <> or !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    Plus,   // +
    Minus,  // -
    Slash,  // /
    Percent, // %
    Concat, // ||
    Assign, // :=

    // Punctuation
    Asterisk,   // *
    Comma,      // ,
    Dot,        // .
    LeftParen,  // (
    RightParen, // )
    Semicolon,  // ;

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "{}", k.as_str()),
            Token::Identifier(id) => write!(f, "{}", id),
            Token::QuotedIdentifier(id) => write!(f, "`{}`", id),
            Token::Variable(name) => write!(f, "@{}", name),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(fl) => write!(f, "{}", fl),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Concat => write!(f, "||"),
            Token::Assign => write!(f, ":="),
            Token::Asterisk => write!(f, "*"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Semicolon => write!(f, ";"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer state
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer from input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token and the offset it starts at
    pub fn next_token(&mut self) -> Result<(Token, usize)> {
        self.skip_whitespace_and_comments()?;

        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '*' => self.single(Token::Asterisk),
            ',' => self.single(Token::Comma),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            ';' => self.single(Token::Semicolon),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '/' => self.single(Token::Slash),
            '%' => self.single(Token::Percent),
            '=' => self.single(Token::Eq),
            '<' => {
                self.advance();
                match self.current_char() {
                    Some('=') => self.single(Token::Le),
                    Some('>') => self.single(Token::Ne),
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.single(Token::Ge)
                } else {
                    Token::Gt
                }
            }
            '!' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.single(Token::Ne)
                } else {
                    return Err(Error::syntax(format!("unexpected character '{}'", ch), start));
                }
            }
            '|' => {
                self.advance();
                if self.current_char() == Some('|') {
                    self.single(Token::Concat)
                } else {
                    return Err(Error::syntax(format!("unexpected character '{}'", ch), start));
                }
            }
            ':' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.single(Token::Assign)
                } else {
                    return Err(Error::syntax(format!("unexpected character '{}'", ch), start));
                }
            }
            '\'' => self.read_string()?,
            '"' | '`' => Token::QuotedIdentifier(self.read_quoted(ch)?),
            '@' => self.read_variable()?,
            '.' => {
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) && !self.follows_word() {
                    self.read_number()?
                } else {
                    self.single(Token::Dot)
                }
            }
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier_or_keyword(),
            _ => return Err(Error::syntax(format!("unexpected character '{}'", ch), start)),
        };

        Ok((token, start))
    }

    /// Tokenize entire input into vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            let (token, position) = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, position));
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn follows_word(&self) -> bool {
        self.position > 0 && {
            let prev = self.input[self.position - 1];
            prev.is_alphanumeric() || prev == '_' || prev == '`' || prev == '"'
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            while self.current_char().is_some_and(char::is_whitespace) {
                self.advance();
            }
            match (self.current_char(), self.peek_char()) {
                (Some('-'), Some('-')) => {
                    while self.current_char().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.position;
                    self.position += 2;
                    loop {
                        match (self.current_char(), self.peek_char()) {
                            (Some('*'), Some('/')) => {
                                self.position += 2;
                                break;
                            }
                            (Some(_), _) => self.advance(),
                            (None, _) => {
                                return Err(Error::syntax("unterminated comment", start))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.advance();
            } else if (ch == 'e' || ch == 'E')
                && (self.peek_char().is_some_and(|c| c.is_ascii_digit())
                    || (matches!(self.peek_char(), Some('+') | Some('-'))
                        && self
                            .input
                            .get(self.position + 2)
                            .is_some_and(|c| c.is_ascii_digit())))
            {
                is_float = true;
                self.position += 2;
            } else {
                break;
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();

        if !is_float {
            if let Ok(i) = num_str.parse::<i64>() {
                return Ok(Token::Integer(i));
            }
        }
        num_str
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| Error::syntax(format!("invalid number '{}'", num_str), start))
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.position;
        self.advance(); // skip opening quote
        let mut string = String::new();

        loop {
            match self.current_char() {
                Some('\'') => {
                    self.advance();
                    if self.current_char() == Some('\'') {
                        string.push('\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    string.push(c);
                    self.advance();
                }
                None => return Err(Error::syntax("unterminated string literal", start)),
            }
        }

        Ok(Token::String(string))
    }

    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let start = self.position;
        self.advance();
        let mut text = String::new();

        loop {
            match self.current_char() {
                Some(c) if c == quote => {
                    self.advance();
                    if self.current_char() == Some(quote) {
                        text.push(quote);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
                None => return Err(Error::syntax("unterminated quoted identifier", start)),
            }
        }

        Ok(text)
    }

    fn read_word(&mut self) -> String {
        let start = self.position;
        while self
            .current_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        self.input[start..self.position].iter().collect()
    }

    fn read_variable(&mut self) -> Result<Token> {
        let start = self.position;
        self.advance(); // skip '@'
        let name = self.read_word();
        if name.is_empty() {
            return Err(Error::syntax("variable name expected after '@'", start));
        }
        Ok(Token::Variable(name))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let text = self.read_word();
        match Keyword::lookup(&text.to_uppercase()) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(sql: &str) -> Vec<Token> {
        Lexer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            tokens("SELECT * FROM users"),
            vec![
                Token::Keyword(Keyword::Select),
                Token::Asterisk,
                Token::Keyword(Keyword::From),
                Token::Identifier("users".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("= <> != < <= > >= || :="),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Concat,
                Token::Assign,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 3.5 1e3 .5"),
            vec![
                Token::Integer(42),
                Token::Float(3.5),
                Token::Float(1000.0),
                Token::Float(0.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_qualified_column_is_not_a_number() {
        assert_eq!(
            tokens("t.col1"),
            vec![
                Token::Identifier("t".to_string()),
                Token::Dot,
                Token::Identifier("col1".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escape_and_quoted_identifier() {
        assert_eq!(
            tokens("'it''s' `select`"),
            vec![
                Token::String("it's".to_string()),
                Token::QuotedIdentifier("select".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_variables_and_comments() {
        assert_eq!(
            tokens("@var -- trailing\n/* block */ 1"),
            vec![Token::Variable("var".to_string()), Token::Integer(1), Token::Eof]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = Lexer::new("SELECT 'abc").tokenize().unwrap_err();
        assert_eq!(
            err,
            Error::Syntax {
                message: "unterminated string literal".to_string(),
                position: 7
            }
        );
        assert!(Lexer::new("SELECT #").tokenize().is_err());
    }
}
