//! FILENAME: core/expr-parser/src/token.rs
//! PURPOSE: Token definitions for the expression lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parser.

/// Tokens recognized by the expression lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    /// Field path or function name. Dotted segments are kept together: `customer.name`.
    Identifier(String),
    /// `$name` - a report variable.
    Variable(String),
    /// `@name` - a report parameter.
    Parameter(String),

    // Operators
    Plus,
    Minus,
    Asterisk,
    Slash,
    Caret,
    Ampersand,
    Equals,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LParen,
    RParen,
    Comma,

    // Special
    EOF,
    Illegal(char),
}

impl Token {
    /// Fixed spelling of operator and delimiter tokens.
    pub fn symbol(&self) -> Option<&'static str> {
        let symbol = match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Asterisk => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::Ampersand => "&",
            Token::Equals => "=",
            Token::NotEqual => "<>",
            Token::LessThan => "<",
            Token::GreaterThan => ">",
            Token::LessEqual => "<=",
            Token::GreaterEqual => ">=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            _ => return None,
        };
        Some(symbol)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(symbol) = self.symbol() {
            return f.write_str(symbol);
        }
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Token::Boolean(true) => f.write_str("TRUE"),
            Token::Boolean(false) => f.write_str("FALSE"),
            Token::Null => f.write_str("NULL"),
            Token::Identifier(name) => f.write_str(name),
            Token::Variable(name) => write!(f, "${}", name),
            Token::Parameter(name) => write!(f, "@{}", name),
            Token::EOF => f.write_str("end of input"),
            Token::Illegal(c) => write!(f, "illegal character '{}'", c),
            _ => Ok(()),
        }
    }
}
