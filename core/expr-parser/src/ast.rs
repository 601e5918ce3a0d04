//! FILENAME: core/expr-parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for report expressions.
//! CONTEXT: After the Lexer tokenizes an expression string, the Parser converts
//! those tokens into this tree structure. The evaluator in `expr-engine`
//! traverses this tree against the current row, variables and parameters.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: Numbers, Strings, Booleans, NULL
//! - Field paths: amount, customer.address.city
//! - Variables: $total
//! - Parameters: @region
//! - Binary operations: +, -, *, /, ^, &, =, <>, <, >, <=, >=
//! - Unary operations: - (negation)
//! - Function calls: IF(amount > 0, "credit", "debit"), COALESCE(a, b)

/// Represents a parsed report expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value: number, string, boolean or null.
    Literal(Value),

    /// A (possibly dotted) path into the current row.
    Field(String),

    /// A reference to a report variable by name.
    Variable(String),

    /// A reference to a report parameter by name.
    Parameter(String),

    /// A binary operation: left op right (e.g., amount * 2, qty > 10).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -amount).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// A call to a built-in function. Names are resolved at parse time.
    FunctionCall { func: Function, args: Vec<Expression> },
}

/// Literal values that can appear in expressions.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Binary operators for expressions.
/// Listed in order of precedence groups (comparison is lowest).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    // Comparison operators (lowest precedence)
    Equal,        // =
    NotEqual,     // <> or !=
    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    // String concatenation
    Concat, // &

    // Arithmetic operators
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Power,    // ^ (highest precedence among binary ops)
}

/// Unary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
}

/// Built-in functions of the expression language.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Function {
    If,
    And,
    Or,
    Not,
    IsBlank,
    Coalesce,
    Abs,
    Round,
    Floor,
    Ceiling,
    Min,
    Max,
    Len,
    Upper,
    Lower,
    Trim,
    Concat,
    Left,
    Right,
}

impl Function {
    /// Resolves a function name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Function> {
        let func = match name.to_ascii_uppercase().as_str() {
            "IF" => Function::If,
            "AND" => Function::And,
            "OR" => Function::Or,
            "NOT" => Function::Not,
            "ISBLANK" => Function::IsBlank,
            "COALESCE" => Function::Coalesce,
            "ABS" => Function::Abs,
            "ROUND" => Function::Round,
            "FLOOR" => Function::Floor,
            "CEILING" => Function::Ceiling,
            "MIN" => Function::Min,
            "MAX" => Function::Max,
            "LEN" => Function::Len,
            "UPPER" => Function::Upper,
            "LOWER" => Function::Lower,
            "TRIM" => Function::Trim,
            "CONCAT" | "CONCATENATE" => Function::Concat,
            "LEFT" => Function::Left,
            "RIGHT" => Function::Right,
            _ => return None,
        };
        Some(func)
    }

    /// Canonical (upper-case) name.
    pub fn name(&self) -> &'static str {
        match self {
            Function::If => "IF",
            Function::And => "AND",
            Function::Or => "OR",
            Function::Not => "NOT",
            Function::IsBlank => "ISBLANK",
            Function::Coalesce => "COALESCE",
            Function::Abs => "ABS",
            Function::Round => "ROUND",
            Function::Floor => "FLOOR",
            Function::Ceiling => "CEILING",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Len => "LEN",
            Function::Upper => "UPPER",
            Function::Lower => "LOWER",
            Function::Trim => "TRIM",
            Function::Concat => "CONCAT",
            Function::Left => "LEFT",
            Function::Right => "RIGHT",
        }
    }

    /// Accepted argument count as (min, max). `None` max means variadic.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::If => (2, Some(3)),
            Function::And | Function::Or | Function::Coalesce | Function::Concat => (1, None),
            Function::Min | Function::Max => (1, None),
            Function::Not
            | Function::IsBlank
            | Function::Abs
            | Function::Floor
            | Function::Ceiling
            | Function::Len
            | Function::Upper
            | Function::Lower
            | Function::Trim => (1, Some(1)),
            Function::Round => (1, Some(2)),
            Function::Left | Function::Right => (2, Some(2)),
        }
    }
}

impl Expression {
    /// Visits this node and every descendant in pre-order.
    pub fn walk<'e>(&'e self, visit: &mut dyn FnMut(&'e Expression)) {
        visit(self);
        match self {
            Expression::BinaryOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expression::UnaryOp { operand, .. } => operand.walk(visit),
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expression::Literal(_)
            | Expression::Field(_)
            | Expression::Variable(_)
            | Expression::Parameter(_) => {}
        }
    }

    /// Field paths referenced anywhere in the expression, in first-seen order.
    pub fn field_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        self.walk(&mut |node| {
            if let Expression::Field(path) = node {
                if !paths.contains(&path.as_str()) {
                    paths.push(path);
                }
            }
        });
        paths
    }

    /// Variable names referenced anywhere in the expression, in first-seen order.
    pub fn variable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        self.walk(&mut |node| {
            if let Expression::Variable(name) = node {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        });
        names
    }
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Concat => "&",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => f.write_str("-"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Field(path) => write!(f, "{}", path),
            Expression::Variable(name) => write!(f, "${}", name),
            Expression::Parameter(name) => write!(f, "@{}", name),
            Expression::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expression::UnaryOp { op, operand } => write!(f, "{}{}", op, operand),
            Expression::FunctionCall { func, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", func.name(), args.join(", "))
            }
        }
    }
}
