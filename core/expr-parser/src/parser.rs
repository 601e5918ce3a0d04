//! FILENAME: core/expr-parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. Binary
//! operators are handled by one precedence-climbing routine driven by the
//! `binary_operator` table; unary minus, power and primaries sit below it.
//! Function names and argument counts are checked here so that a report
//! definition with a bad expression fails when it is loaded, not mid-run.
//!
//! GRAMMAR:
//!   expression     --> binary(0)
//!   binary(n)      --> binary(n+1) ( OP(n) binary(n+1) )*      n = 0..3
//!                      OP(0): = <> != < > <= >=
//!                      OP(1): &
//!                      OP(2): + -
//!                      OP(3): * /
//!   binary(4)      --> unary
//!   unary          --> "-" unary | power
//!   power          --> primary ( "^" unary )?
//!   primary        --> NUMBER | STRING | BOOLEAN | NULL | VARIABLE | PARAMETER
//!                    | IDENTIFIER ( "(" arguments? ")" )? | "(" expression ")"
//!   arguments      --> expression ("," expression)*

use crate::ast::{BinaryOperator, Expression, Function, UnaryOperator, Value};
use crate::lexer::Lexer;
use crate::token::Token;

/// A parse failure, with the byte offset of the offending token when known.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(position) => write!(f, "parse error at offset {}: {}", position, self.message),
            None => write!(f, "parse error: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Number of binary precedence levels handled by `parse_binary`.
const BINARY_LEVELS: u8 = 4;

/// The binary operator `token` denotes at precedence `level`, if any.
/// Level 0 binds loosest.
fn binary_operator(token: &Token, level: u8) -> Option<BinaryOperator> {
    let op = match (level, token) {
        (0, Token::Equals) => BinaryOperator::Equal,
        (0, Token::NotEqual) => BinaryOperator::NotEqual,
        (0, Token::LessThan) => BinaryOperator::LessThan,
        (0, Token::GreaterThan) => BinaryOperator::GreaterThan,
        (0, Token::LessEqual) => BinaryOperator::LessEqual,
        (0, Token::GreaterEqual) => BinaryOperator::GreaterEqual,
        (1, Token::Ampersand) => BinaryOperator::Concat,
        (2, Token::Plus) => BinaryOperator::Add,
        (2, Token::Minus) => BinaryOperator::Subtract,
        (3, Token::Asterisk) => BinaryOperator::Multiply,
        (3, Token::Slash) => BinaryOperator::Divide,
        _ => return None,
    };
    Some(op)
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// Byte offset of `current`.
    current_start: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        let current_start = lexer.token_start();
        Parser {
            lexer,
            current,
            current_start,
        }
    }

    /// Parses the entire input and returns the AST.
    /// A leading '=' is accepted and ignored, so "=amount * 2" and "amount * 2" are the same.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current == Token::Equals {
            self.advance();
        }
        if self.current == Token::EOF {
            return Err(self.error("empty expression"));
        }

        let expr = self.parse_binary(0)?;

        if self.current != Token::EOF {
            return Err(self.error(format!("unexpected {} after expression", self.current)));
        }
        Ok(expr)
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
        self.current_start = self.lexer.token_start();
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message).at(self.current_start)
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current != expected {
            return Err(self.error(format!("expected {}, found {}", expected, self.current)));
        }
        self.advance();
        Ok(())
    }

    // ========================================================================
    // OPERATORS
    // ========================================================================

    fn parse_binary(&mut self, level: u8) -> ParseResult<Expression> {
        if level == BINARY_LEVELS {
            return self.parse_unary();
        }

        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = binary_operator(&self.current, level) {
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.current != Token::Minus {
            return self.parse_power();
        }
        self.advance();
        Ok(Expression::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(self.parse_unary()?),
        })
    }

    /// `^` is right-associative and binds tighter than unary minus on its left.
    fn parse_power(&mut self) -> ParseResult<Expression> {
        let base = self.parse_primary()?;
        if self.current != Token::Caret {
            return Ok(base);
        }
        self.advance();
        Ok(Expression::BinaryOp {
            left: Box::new(base),
            op: BinaryOperator::Power,
            right: Box::new(self.parse_unary()?),
        })
    }

    // ========================================================================
    // PRIMARIES
    // ========================================================================

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let expr = match std::mem::replace(&mut self.current, Token::EOF) {
            Token::Number(n) => Expression::Literal(Value::Number(n)),
            Token::String(s) => Expression::Literal(Value::String(s)),
            Token::Boolean(b) => Expression::Literal(Value::Boolean(b)),
            Token::Null => Expression::Literal(Value::Null),
            Token::Variable(name) => Expression::Variable(name),
            Token::Parameter(name) => Expression::Parameter(name),
            Token::Identifier(name) => {
                let start = self.current_start;
                self.advance();
                return if self.current == Token::LParen {
                    self.parse_call(name, start)
                } else {
                    field_path(name, start)
                };
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_binary(0)?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::EOF => return Err(self.error("unexpected end of expression")),
            Token::Illegal(ch) => return Err(self.error(format!("illegal character '{}'", ch))),
            other => return Err(self.error(format!("unexpected {}", other))),
        };
        self.advance();
        Ok(expr)
    }

    /// `NAME(args)`. The current token is the opening parenthesis.
    fn parse_call(&mut self, name: String, start: usize) -> ParseResult<Expression> {
        let func = Function::from_name(&name)
            .ok_or_else(|| ParseError::new(format!("unknown function {}", name)).at(start))?;
        self.advance();

        let mut args = Vec::new();
        if self.current != Token::RParen {
            loop {
                args.push(self.parse_binary(0)?);
                if self.current != Token::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen)?;

        let (min, max) = func.arity();
        if args.len() < min || max.map_or(false, |max| args.len() > max) {
            return Err(ParseError::new(format!(
                "{} takes {} argument(s), found {}",
                func.name(),
                describe_arity(min, max),
                args.len()
            ))
            .at(start));
        }
        Ok(Expression::FunctionCall { func, args })
    }
}

/// Rejects empty segments such as `customer..city` or a trailing dot.
fn field_path(path: String, start: usize) -> ParseResult<Expression> {
    if path.split('.').any(str::is_empty) {
        return Err(ParseError::new(format!("invalid field path {}", path)).at(start));
    }
    Ok(Expression::Field(path))
}

fn describe_arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    }
}

/// Convenience function to parse an expression string directly.
pub fn parse(input: &str) -> ParseResult<Expression> {
    Parser::new(input).parse()
}
