//! Condition expressions for decision nodes.
//!
//! Small by intent:
//! - Field access with dot notation against the evaluation context
//!   (`amount`, `vendor.country`, `qty_0` for detail rows)
//! - Literals: single or double quoted strings, numbers, `true`, `false`, `null`
//! - Comparisons: `==`, `!=`, `>`, `<`, `>=`, `<=`
//! - Logical: `&&`, `||`, `!`, and parentheses
//!
//! Numbers compare as f64, so `1` and `1.0` are equal. Numeric strings
//! compare numerically against numbers, since form fields often arrive as
//! text. A path that does not resolve reads as `null`; comparing it with
//! anything but `null` is false rather than an error.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ExpressionError {
    #[error("parse error at token {position}: {message}")]
    Parse { position: usize, message: String },
}

/// Deepest `(` / `!` nesting the parser accepts.
const MAX_DEPTH: usize = 64;
/// Longest expression, in tokens. Bounds the operator chains, which the
/// evaluator walks recursively.
const MAX_TOKENS: usize = 512;

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Parse {
                position: 0,
                message: "empty expression".into(),
            });
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ExpressionError::Parse {
                position: MAX_TOKENS,
                message: format!("expression is longer than {MAX_TOKENS} tokens"),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error(format!(
                "unexpected token {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(Self { root })
    }

    pub fn evaluate(&self, context: &Value) -> bool {
        self.root.eval(context).truthy()
    }
}

/// Parse and evaluate in one go.
pub fn evaluate(source: &str, context: &Value) -> Result<bool, ExpressionError> {
    Ok(Expression::parse(source)?.evaluate(context))
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Expr {
    fn eval(&self, context: &Value) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Path(segments) => segments
                .iter()
                .try_fold(context, |current, segment| current.get(segment))
                .cloned()
                .unwrap_or(Value::Null),
            Expr::Not(inner) => Value::Bool(!inner.eval(context).truthy()),
            Expr::And(l, r) => Value::Bool(l.eval(context).truthy() && r.eval(context).truthy()),
            Expr::Or(l, r) => Value::Bool(l.eval(context).truthy() || r.eval(context).truthy()),
            Expr::Compare(l, op, r) => Value::Bool(compare(&l.eval(context), *op, &r.eval(context))),
        }
    }
}

trait Truthy {
    fn truthy(&self) -> bool;
}

impl Truthy for Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return match op {
            CompareOp::Eq => both,
            CompareOp::Ne => !both,
            _ => false,
        };
    }

    let numeric = matches!(left, Value::Number(_)) || matches!(right, Value::Number(_));
    if numeric {
        if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
            let eq = (l - r).abs() < f64::EPSILON;
            return match op {
                CompareOp::Eq => eq,
                CompareOp::Ne => !eq,
                CompareOp::Gt => l > r && !eq,
                CompareOp::Lt => l < r && !eq,
                CompareOp::Ge => l > r || eq,
                CompareOp::Le => l < r || eq,
            };
        }
    }

    match (left, right) {
        (Value::String(l), Value::String(r)) => match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Gt => l > r,
            CompareOp::Lt => l < r,
            CompareOp::Ge => l >= r,
            CompareOp::Le => l <= r,
        },
        (Value::Bool(l), Value::Bool(r)) => match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            _ => false,
        },
        _ => matches!(op, CompareOp::Ne),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |tokens: &Vec<Token>, message: String| ExpressionError::Parse {
        position: tokens.len(),
        message,
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match (c, next) {
            (c, _) if c.is_whitespace() => i += 1,
            ('(', _) => {
                tokens.push(Token::LParen);
                i += 1;
            }
            (')', _) => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ('=', Some('=')) => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            ('!', Some('=')) => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            ('>', Some('=')) => {
                tokens.push(Token::Op(CompareOp::Ge));
                i += 2;
            }
            ('<', Some('=')) => {
                tokens.push(Token::Op(CompareOp::Le));
                i += 2;
            }
            ('&', Some('&')) => {
                tokens.push(Token::And);
                i += 2;
            }
            ('|', Some('|')) => {
                tokens.push(Token::Or);
                i += 2;
            }
            ('!', _) => {
                tokens.push(Token::Not);
                i += 1;
            }
            ('>', _) => {
                tokens.push(Token::Op(CompareOp::Gt));
                i += 1;
            }
            ('<', _) => {
                tokens.push(Token::Op(CompareOp::Lt));
                i += 1;
            }
            ('"' | '\'', _) => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| err(&tokens, "unterminated string literal".into()))?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            (c, next)
                if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse()
                    .map_err(|_| err(&tokens, format!("invalid number {text}")))?;
                tokens.push(Token::Num(num));
            }
            (c, _) if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            (other, _) => return Err(err(&tokens, format!("unexpected character {other:?}"))),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser. Precedence: ! > comparison > && > ||
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn error(&self, message: String) -> ExpressionError {
        ExpressionError::Parse {
            position: self.pos,
            message,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse one nested level with `f`, failing past [`MAX_DEPTH`].
    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        if self.depth == MAX_DEPTH {
            return Err(self.error(format!("expression nests deeper than {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        let expr = f(self)?;
        self.depth -= 1;
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::And) {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::not_expr)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.primary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.primary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression".into()))?;
        self.pos += 1;
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Num(n) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            )),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(path) => Ok(Expr::Path(path.split('.').map(str::to_string).collect())),
            Token::LParen => {
                let inner = self.nested(Self::or_expr)?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("expected ')'".into()));
                }
                Ok(inner)
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected a value, found {other:?}")))
            }
        }
    }
}
