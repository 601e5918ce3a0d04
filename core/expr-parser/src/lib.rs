//! FILENAME: core/expr-parser/src/lib.rs
//! PURPOSE: Library root for the report expression parser.
//! CONTEXT: This module exposes the lexer, parser, and AST components
//! needed to convert expression strings from a report definition into
//! evaluatable expression trees.
//!
//! PIPELINE: Expression String --> Lexer --> Tokens --> Parser --> AST --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, ^ (power)
//! - Comparison: =, <>, !=, <, >, <=, >=
//! - String concatenation: &
//! - Field paths: amount, customer.address.city
//! - Variables and parameters: $total, @region
//! - Function calls: IF(qty > 0, "in stock", "sold out"), COALESCE(discount, 0)
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;


pub use ast::{BinaryOperator, Expression, Function, UnaryOperator, Value};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser};
pub use token::Token;
