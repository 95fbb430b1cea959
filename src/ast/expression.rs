use super::Value;
use crate::error::{ExpressionError, RunError};
use itertools::Itertools;
use logos::Logos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Supplies variable values to expression evaluation and string interpolation.
pub trait VariableSource {
    fn lookup(&self, path: &str) -> Result<Value, RunError>;
}

/// A source with no variables at all, used when folding constant expressions.
pub struct NoVariables;

impl VariableSource for NoVariables {
    fn lookup(&self, path: &str) -> Result<Value, RunError> {
        Err(RunError::UnresolvedVariable {
            path: path.to_string(),
        })
    }
}

/// The parsed form of a condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    // Logical
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    Contains(Box<Expression>, Box<Expression>),

    // Functions
    SizeOf(Box<Expression>),

    // Leaf nodes
    Literal(Value),
    Variable(String),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("contains")]
    Contains,
    #[token("sizeof")]
    SizeOf,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[regex(r"\$\{[^}]*\}", |lex| {
        let s = lex.slice();
        s[2..s.len() - 1].trim().to_string()
    })]
    Variable(String),
    #[regex(r"'([^'\\]|\\.)*'", |lex| unquote(lex.slice()))]
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    Str(String),
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Contains => write!(f, "'contains'"),
            Token::SizeOf => write!(f, "'sizeof'"),
            Token::Bang => write!(f, "'!'"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Comma => write!(f, "','"),
            Token::Variable(path) => write!(f, "variable '${{{}}}'", path),
            Token::Str(s) => write!(f, "string '{}'", s),
            Token::Int(i) => write!(f, "integer {}", i),
        }
    }
}

/// Strips the surrounding quotes and resolves backslash escapes.
fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self, ExpressionError> {
        let mut lexer = Token::lexer(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next() {
            let offset = lexer.span().start;
            match token {
                Ok(token) => tokens.push((token, offset)),
                Err(()) => {
                    return Err(ExpressionError::InvalidToken {
                        expression: source.to_string(),
                        offset,
                    });
                }
            }
        }
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ExpressionError::UnexpectedEnd(self.source.to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token, offset: usize, expected: &str) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            expression: self.source.to_string(),
            offset,
            found: token.to_string(),
            expected: expected.to_string(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        let (token, offset) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.unexpected(&token, offset, &expected.to_string()))
        }
    }

    fn parse(mut self) -> Result<Expression, ExpressionError> {
        let expr = self.parse_or()?;
        if let Some((token, offset)) = self.tokens.get(self.pos) {
            return Err(self.unexpected(token, *offset, "end of expression"));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let make: fn(Box<Expression>, Box<Expression>) -> Expression = match self.peek() {
                Some(Token::EqEq) => Expression::Equal,
                Some(Token::NotEq) => Expression::NotEqual,
                Some(Token::Contains) => Expression::Contains,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = make(Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ExpressionError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(Expression::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::SizeOf) => {
                self.pos += 1;
                Ok(Expression::SizeOf(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ExpressionError> {
        let (token, offset) = self.next()?;
        match token {
            Token::True => Ok(Expression::Literal(Value::Bool(true))),
            Token::False => Ok(Expression::Literal(Value::Bool(false))),
            Token::Int(i) => Ok(Expression::Literal(Value::Int(i))),
            Token::Str(s) => Ok(Expression::Literal(Value::String(s))),
            Token::Variable(path) => Ok(Expression::Variable(path)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.parse_list(),
            other => Err(self.unexpected(&other, offset, "a value")),
        }
    }

    fn parse_list(&mut self) -> Result<Expression, ExpressionError> {
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.pos += 1;
            return Ok(Expression::Literal(Value::List(items)));
        }
        loop {
            let (token, offset) = self.next()?;
            match token {
                Token::Str(s) => items.push(s),
                other => return Err(self.unexpected(&other, offset, "a string list item")),
            }
            let (token, offset) = self.next()?;
            match token {
                Token::Comma => continue,
                Token::RBracket => return Ok(Expression::Literal(Value::List(items))),
                other => return Err(self.unexpected(&other, offset, "',' or ']'")),
            }
        }
    }
}

impl Expression {
    /// Parses the textual form of a condition expression.
    pub fn parse(source: &str) -> Result<Expression, ExpressionError> {
        Parser::new(source)?.parse()
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Collects the paths of every variable the expression reads.
    pub fn variables(&self, paths: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(path) => {
                paths.insert(path.clone());
            }
            Expression::And(l, r)
            | Expression::Or(l, r)
            | Expression::Equal(l, r)
            | Expression::NotEqual(l, r)
            | Expression::Contains(l, r) => {
                l.variables(paths);
                r.variables(paths);
            }
            Expression::Not(v) | Expression::SizeOf(v) => v.variables(paths),
            Expression::Literal(_) => {}
        }
    }

    pub fn evaluate(&self, vars: &dyn VariableSource) -> Result<Value, RunError> {
        match self {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Variable(path) => vars.lookup(path),
            Expression::Not(v) => Ok(Value::Bool(!v.evaluate(vars)?.as_bool()?)),
            Expression::And(l, r) => {
                if !l.evaluate(vars)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(r.evaluate(vars)?.as_bool()?))
            }
            Expression::Or(l, r) => {
                if l.evaluate(vars)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(r.evaluate(vars)?.as_bool()?))
            }
            Expression::Equal(l, r) => Ok(Value::Bool(values_equal(
                &l.evaluate(vars)?,
                &r.evaluate(vars)?,
            ))),
            Expression::NotEqual(l, r) => Ok(Value::Bool(!values_equal(
                &l.evaluate(vars)?,
                &r.evaluate(vars)?,
            ))),
            Expression::Contains(l, r) => {
                let haystack = l.evaluate(vars)?;
                let needle = r.evaluate(vars)?;
                let found = match &haystack {
                    Value::List(items) => match &needle {
                        Value::List(wanted) => wanted.iter().all(|w| items.contains(w)),
                        other => {
                            let wanted = other.as_str()?;
                            items.iter().any(|i| i == wanted)
                        }
                    },
                    other => other.as_str()?.contains(needle.as_str()?),
                };
                Ok(Value::Bool(found))
            }
            Expression::SizeOf(v) => {
                let len = match v.evaluate(vars)? {
                    Value::List(items) => items.len(),
                    other => other.as_str()?.chars().count(),
                };
                Ok(Value::Int(len as i64))
            }
        }
    }

    /// Evaluates the expression as a condition.
    pub fn evaluate_bool(&self, vars: &dyn VariableSource) -> Result<bool, RunError> {
        self.evaluate(vars)?.as_bool()
    }

    /// Folds literal-only sub-expressions until nothing more can be folded.
    ///
    /// Only left-hand short circuits are folded away so that a variable that
    /// would have been read at runtime is still read.
    pub fn fold(self) -> Expression {
        let folded = match self {
            Expression::Not(v) => Expression::Not(Box::new((*v).fold())),
            Expression::SizeOf(v) => Expression::SizeOf(Box::new((*v).fold())),
            Expression::And(l, r) => Expression::And(Box::new((*l).fold()), Box::new((*r).fold())),
            Expression::Or(l, r) => Expression::Or(Box::new((*l).fold()), Box::new((*r).fold())),
            Expression::Equal(l, r) => Expression::Equal(Box::new((*l).fold()), Box::new((*r).fold())),
            Expression::NotEqual(l, r) => {
                Expression::NotEqual(Box::new((*l).fold()), Box::new((*r).fold()))
            }
            Expression::Contains(l, r) => {
                Expression::Contains(Box::new((*l).fold()), Box::new((*r).fold()))
            }
            other => other,
        };
        apply_folding_rules(folded)
    }
}

fn apply_folding_rules(expr: Expression) -> Expression {
    match expr {
        Expression::Not(v) => match *v {
            Expression::Literal(Value::Bool(b)) => Expression::Literal(Value::Bool(!b)),
            Expression::Not(inner) => *inner,
            opt_v => Expression::Not(Box::new(opt_v)),
        },
        Expression::And(l, r) => match (*l, *r) {
            (Expression::Literal(Value::Bool(false)), _) => {
                Expression::Literal(Value::Bool(false))
            }
            (Expression::Literal(Value::Bool(true)), expr)
            | (expr, Expression::Literal(Value::Bool(true))) => expr,
            (opt_l, opt_r) => Expression::And(Box::new(opt_l), Box::new(opt_r)),
        },
        Expression::Or(l, r) => match (*l, *r) {
            (Expression::Literal(Value::Bool(true)), _) => Expression::Literal(Value::Bool(true)),
            (Expression::Literal(Value::Bool(false)), expr)
            | (expr, Expression::Literal(Value::Bool(false))) => expr,
            (opt_l, opt_r) => Expression::Or(Box::new(opt_l), Box::new(opt_r)),
        },
        expr @ (Expression::Equal(..)
        | Expression::NotEqual(..)
        | Expression::Contains(..)
        | Expression::SizeOf(..)) => {
            let constant = match &expr {
                Expression::Equal(l, r)
                | Expression::NotEqual(l, r)
                | Expression::Contains(l, r) => l.is_literal() && r.is_literal(),
                Expression::SizeOf(v) => v.is_literal(),
                _ => false,
            };
            if constant {
                if let Ok(value) = expr.evaluate(&NoVariables) {
                    return Expression::Literal(value);
                }
            }
            expr
        }
        other => other,
    }
}

/// Equality where `Null` compares equal to the empty string.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        (l, r) => l == r,
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "{}", quote(s)),
            Expression::Literal(Value::Null) => write!(f, "''"),
            Expression::Literal(Value::List(items)) => {
                write!(f, "[{}]", items.iter().map(|i| quote(i)).join(", "))
            }
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Variable(path) => write!(f, "${{{}}}", path),
            Expression::Not(v) => write!(f, "!{}", v),
            Expression::SizeOf(v) => write!(f, "sizeof {}", v),
            Expression::And(l, r) => write!(f, "({} && {})", l, r),
            Expression::Or(l, r) => write!(f, "({} || {})", l, r),
            Expression::Equal(l, r) => write!(f, "({} == {})", l, r),
            Expression::NotEqual(l, r) => write!(f, "({} != {})", l, r),
            Expression::Contains(l, r) => write!(f, "({} contains {})", l, r),
        }
    }
}

/// Replaces every `${path}` in `template` with the value of `path`.
///
/// Lists are joined with `,`; an unterminated `${` is kept verbatim.
pub fn interpolate(template: &str, vars: &dyn VariableSource) -> Result<String, RunError> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let path = rest[start + 2..start + len].trim();
        match vars.lookup(path)? {
            Value::List(items) => result.push_str(&items.join(",")),
            Value::Null => {}
            Value::String(s) => result.push_str(&s),
            other => result.push_str(&other.to_string()),
        }
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
