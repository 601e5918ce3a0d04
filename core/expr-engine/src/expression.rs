//! FILENAME: core/expr-engine/src/expression.rs
//! PURPOSE: A parsed expression together with its source text.
//! CONTEXT: Report definitions carry expressions as strings. They are parsed
//! once at definition-load time; a parse failure is a load failure. The
//! source text is kept for error messages and for serializing the
//! definition back out.

use expr_parser::{parse, Expression as Ast, ParseError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    /// Parses `source` into an expression.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let ast = parse(source)?;
        Ok(Expression {
            source: source.to_string(),
            ast,
        })
    }

    /// Wraps an already-built AST. The source text is regenerated from it.
    pub fn from_ast(ast: Ast) -> Self {
        Expression {
            source: ast.to_string(),
            ast,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Field paths this expression reads from the row.
    pub fn field_paths(&self) -> Vec<&str> {
        self.ast.field_paths()
    }

    /// Variables this expression reads.
    pub fn variable_names(&self) -> Vec<&str> {
        self.ast.variable_names()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ast == other.ast
    }
}

impl TryFrom<String> for Expression {
    type Error = ParseError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        let ast = parse(&source)?;
        Ok(Expression { source, ast })
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.source
    }
}

impl std::str::FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
