//! Small expression language for response assertions.
//!
//! Expressions evaluate against a JSON context object. Supported: literals,
//! `== != < <= > >=`, `&& || !`, `+ - * / %`, the word operators `in`,
//! `contains`, `startsWith`, `endsWith` and `matches`, member and index
//! access, builtin calls (`len lower upper trim string number exists`) and
//! path helpers on any value (`json.path(p)`, `json.has(p)`,
//! `json.string(p)`, `json.number(p)`).

use regex::Regex;
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Eval(String),
}

type ExprResult<T> = Result<T, ExprError>;

fn eval_err<T>(msg: impl Into<String>) -> ExprResult<T> {
    Err(ExprError::Eval(msg.into()))
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

fn lex(src: &str) -> ExprResult<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();

        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            ',' => tokens.push(Token::Comma),
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            '/' => tokens.push(Token::Slash),
            '%' => tokens.push(Token::Percent),
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => tokens.push(Token::Dot),
            '=' if next == Some('=') => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                i += 1;
            }
            '!' => tokens.push(Token::Not),
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                i += 1;
            }
            '<' => tokens.push(Token::Lt),
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                i += 1;
            }
            '>' => tokens.push(Token::Gt),
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 1;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ExprError::Parse("unterminated string".to_string()));
                    };
                    if ch == quote {
                        break;
                    }
                    if ch == '\\' {
                        i += 1;
                        match chars.get(i) {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('r') => text.push('\r'),
                            Some(&other) => text.push(other),
                            None => return Err(ExprError::Parse("unterminated string".to_string())),
                        }
                    } else {
                        text.push(ch);
                    }
                    i += 1;
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::Parse(format!("invalid number: {}", text)))?;
                tokens.push(Token::Num(num));
                continue;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            other => return Err(ExprError::Parse(format!("unexpected character '{}'", other))),
        }
        i += 1;
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn binding_power(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt
            | BinOp::Le
            | BinOp::Gt
            | BinOp::Ge
            | BinOp::In
            | BinOp::Contains
            | BinOp::StartsWith
            | BinOp::EndsWith
            | BinOp::Matches => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }
}

const PREFIX_POWER: u8 = 7;

/// Deepest tree the parser will build. Evaluation and drop both recurse
/// over the tree, so this also bounds their stack use.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Parse("expression nested too deeply".to_string()));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> ExprResult<()> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(ExprError::Parse(format!("expected {:?}, found {:?}", expected, t))),
            None => Err(ExprError::Parse(format!("expected {:?}, found end of input", expected))),
        }
    }

    fn infix(&self) -> Option<BinOp> {
        let op = match self.peek()? {
            Token::Or => BinOp::Or,
            Token::And => BinOp::And,
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Rem,
            Token::Ident(word) => match word.as_str() {
                "in" => BinOp::In,
                "contains" => BinOp::Contains,
                "startsWith" => BinOp::StartsWith,
                "endsWith" => BinOp::EndsWith,
                "matches" => BinOp::Matches,
                _ => return None,
            },
            _ => return None,
        };
        Some(op)
    }

    fn expr(&mut self, min_power: u8) -> ExprResult<Expr> {
        self.descend()?;
        let mut lhs = self.prefix()?;

        // Each chained operator wraps lhs one level deeper
        let mut wraps = 0;
        while let Some(op) = self.infix() {
            let power = op.binding_power();
            if power <= min_power {
                break;
            }
            self.pos += 1;
            self.descend()?;
            wraps += 1;
            let rhs = self.expr(power)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        self.depth -= 1 + wraps;
        Ok(lhs)
    }

    fn prefix(&mut self) -> ExprResult<Expr> {
        let atom = match self.next() {
            Some(Token::Not) => return Ok(Expr::Not(Box::new(self.expr(PREFIX_POWER)?))),
            Some(Token::Minus) => return Ok(Expr::Neg(Box::new(self.expr(PREFIX_POWER)?))),
            Some(Token::Num(n)) => Expr::Literal(number(n)),
            Some(Token::Str(s)) => Expr::Literal(Value::String(s)),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Ident(word),
            },
            Some(Token::LParen) => {
                let inner = self.expr(0)?;
                self.expect(Token::RParen)?;
                inner
            }
            Some(Token::LBracket) => Expr::Array(self.list(Token::RBracket)?),
            Some(t) => return Err(ExprError::Parse(format!("unexpected token {:?}", t))),
            None => return Err(ExprError::Parse("unexpected end of input".to_string())),
        };

        self.postfix(atom)
    }

    fn postfix(&mut self, mut expr: Expr) -> ExprResult<Expr> {
        let mut wraps = 0;
        loop {
            if matches!(
                self.peek(),
                Some(Token::Dot) | Some(Token::LBracket) | Some(Token::LParen)
            ) {
                self.descend()?;
                wraps += 1;
            }
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                        _ => return Err(ExprError::Parse("expected member name after '.'".to_string())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.expr(0)?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.list(Token::RParen)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => {
                    self.depth -= wraps;
                    return Ok(expr);
                }
            }
        }
    }

    fn list(&mut self, close: Token) -> ExprResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.expr(0)?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(t) if t == close => return Ok(items),
                _ => return Err(ExprError::Parse(format!("expected ',' or {:?}", close))),
            }
        }
    }
}

pub fn parse(src: &str) -> ExprResult<Expr> {
    let mut parser = Parser {
        tokens: lex(src)?,
        pos: 0,
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(ExprError::Parse("empty expression".to_string()));
    }
    let expr = parser.expr(0)?;
    if let Some(t) = parser.peek() {
        return Err(ExprError::Parse(format!("unexpected trailing token {:?}", t)));
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> ExprResult<bool> {
    let ordering = match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (as_f64(a).unwrap_or(f64::NAN), as_f64(b).unwrap_or(f64::NAN));
            match x.partial_cmp(&y) {
                Some(o) => o,
                None => return Ok(false),
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => return eval_err(format!("cannot compare {} with {}", type_name(a), type_name(b))),
    };

    Ok(match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `haystack` contains `needle`: substring, array element or object key
fn contains(haystack: &Value, needle: &Value) -> ExprResult<bool> {
    match haystack {
        Value::String(s) => Ok(s.contains(&to_text(needle))),
        Value::Array(items) => Ok(items.iter().any(|item| equals(item, needle))),
        Value::Object(map) => Ok(map.contains_key(&to_text(needle))),
        Value::Null => Ok(false),
        other => eval_err(format!("{} cannot contain values", type_name(other))),
    }
}

fn arithmetic(op: BinOp, a: &Value, b: &Value) -> ExprResult<Value> {
    if op == BinOp::Add && (a.is_string() || b.is_string()) {
        return Ok(Value::String(format!("{}{}", to_text(a), to_text(b))));
    }

    let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) else {
        return eval_err(format!(
            "arithmetic on {} and {}",
            type_name(a),
            type_name(b)
        ));
    };

    let result = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::Rem if y == 0.0 => return eval_err("division by zero"),
        BinOp::Div => x / y,
        _ => x % y,
    };
    Ok(number(result))
}

/// Split a path such as `data.items[0].id` or `$.a["b.c"]` into segments
pub fn path_segments(path: &str) -> ExprResult<Vec<Value>> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let chars: Vec<char> = path.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    let flush = |current: &mut String, segments: &mut Vec<Value>| {
        if !current.is_empty() {
            segments.push(Value::String(std::mem::take(current)));
        }
    };

    while i < chars.len() {
        match chars[i] {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| ExprError::Eval(format!("unclosed '[' in path {}", path)))?;
                let inner: String = chars[i + 1..end].iter().collect();
                let inner = inner.trim();
                let quoted = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
                match quoted {
                    Some(key) => segments.push(Value::String(key.to_string())),
                    None => {
                        let index = inner
                            .parse::<u64>()
                            .map_err(|_| ExprError::Eval(format!("invalid index [{}]", inner)))?;
                        segments.push(Value::Number(Number::from(index)));
                    }
                }
                i = end;
            }
            c => current.push(c),
        }
        i += 1;
    }
    flush(&mut current, &mut segments);

    Ok(segments)
}

/// Walk `root` along `path`; a missing step yields `None`
pub fn lookup<'a>(root: &'a Value, path: &str) -> ExprResult<Option<&'a Value>> {
    let mut current = root;
    for segment in path_segments(path)? {
        let next = match (&segment, current) {
            (Value::String(key), Value::Object(map)) => map.get(key),
            (Value::Number(n), Value::Array(items)) => {
                n.as_u64().and_then(|i| items.get(i as usize))
            }
            (Value::String(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn index(target: &Value, key: &Value) -> Value {
    match (target, key) {
        (Value::Object(map), key) => map.get(&to_text(key)).cloned().unwrap_or(Value::Null),
        (Value::Array(items), key) => as_f64(key)
            .filter(|i| *i >= 0.0)
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::String(s), key) => as_f64(key)
            .filter(|i| *i >= 0.0)
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn arity(name: &str, args: &[Value], n: usize) -> ExprResult<()> {
    if args.len() != n {
        return eval_err(format!("{}() takes {} argument(s), got {}", name, n, args.len()));
    }
    Ok(())
}

fn builtin(name: &str, args: &[Value]) -> ExprResult<Value> {
    match name {
        "len" => {
            arity(name, args, 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => return eval_err(format!("len() of {}", type_name(other))),
            };
            Ok(Value::Number(Number::from(len as u64)))
        }
        "lower" => {
            arity(name, args, 1)?;
            Ok(Value::String(to_text(&args[0]).to_lowercase()))
        }
        "upper" => {
            arity(name, args, 1)?;
            Ok(Value::String(to_text(&args[0]).to_uppercase()))
        }
        "trim" => {
            arity(name, args, 1)?;
            Ok(Value::String(to_text(&args[0]).trim().to_string()))
        }
        "string" => {
            arity(name, args, 1)?;
            Ok(Value::String(to_text(&args[0])))
        }
        "number" => {
            arity(name, args, 1)?;
            to_number(&args[0])
        }
        "exists" => {
            arity(name, args, 1)?;
            Ok(Value::Bool(!args[0].is_null()))
        }
        other => eval_err(format!("unknown function {}()", other)),
    }
}

fn to_number(value: &Value) -> ExprResult<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(number(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(number)
            .map_err(|_| ExprError::Eval(format!("cannot convert \"{}\" to a number", s))),
        other => eval_err(format!("cannot convert {} to a number", type_name(other))),
    }
}

/// Path helpers callable on any value, e.g. `json.path("a.b")`
fn method(target: &Value, name: &str, args: &[Value]) -> ExprResult<Value> {
    arity(name, args, 1)?;
    let path = to_text(&args[0]);
    let found = lookup(target, &path)?;

    match name {
        "path" => Ok(found.cloned().unwrap_or(Value::Null)),
        "has" => Ok(Value::Bool(found.is_some())),
        "string" => Ok(Value::String(found.map(to_text).unwrap_or_default())),
        "number" => match found {
            Some(value) => to_number(value),
            None => eval_err(format!("path {} not found", path)),
        },
        other => eval_err(format!("unknown method .{}()", other)),
    }
}

pub struct Evaluator<'a> {
    context: &'a Map<String, Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a Map<String, Value>) -> Self {
        Self { context }
    }

    pub fn eval(&self, expr: &Expr) -> ExprResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => Ok(self.context.get(name).cloned().unwrap_or(Value::Null)),
            Expr::Array(items) => Ok(Value::Array(
                items.iter().map(|e| self.eval(e)).collect::<ExprResult<_>>()?,
            )),
            Expr::Member(target, name) => {
                let target = self.eval(target)?;
                Ok(index(&target, &Value::String(name.clone())))
            }
            Expr::Index(target, key) => {
                let target = self.eval(target)?;
                let key = self.eval(key)?;
                Ok(index(&target, &key))
            }
            Expr::Call(callee, args) => {
                let args: Vec<Value> = args.iter().map(|a| self.eval(a)).collect::<ExprResult<_>>()?;
                match callee.as_ref() {
                    Expr::Ident(name) => builtin(name, &args),
                    Expr::Member(target, name) => {
                        let target = self.eval(target)?;
                        method(&target, name, &args)
                    }
                    _ => eval_err("expression is not callable"),
                }
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::Neg(inner) => {
                let value = self.eval(inner)?;
                match as_f64(&value) {
                    Some(n) => Ok(number(-n)),
                    None => eval_err(format!("cannot negate {}", type_name(&value))),
                }
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
        }
    }

    fn binary(&self, op: BinOp, lhs: &Expr, rhs: &Expr) -> ExprResult<Value> {
        let left = self.eval(lhs)?;

        // Logical operators short-circuit
        match op {
            BinOp::And if !truthy(&left) => return Ok(Value::Bool(false)),
            BinOp::Or if truthy(&left) => return Ok(Value::Bool(true)),
            BinOp::And | BinOp::Or => return Ok(Value::Bool(truthy(&self.eval(rhs)?))),
            _ => {}
        }

        let right = self.eval(rhs)?;

        let value = match op {
            BinOp::Eq => Value::Bool(equals(&left, &right)),
            BinOp::Ne => Value::Bool(!equals(&left, &right)),
            BinOp::In => Value::Bool(contains(&right, &left)?),
            BinOp::Contains => Value::Bool(contains(&left, &right)?),
            BinOp::StartsWith => Value::Bool(to_text(&left).starts_with(&to_text(&right))),
            BinOp::EndsWith => Value::Bool(to_text(&left).ends_with(&to_text(&right))),
            BinOp::Matches => {
                let pattern = to_text(&right);
                let re = Regex::new(&pattern)
                    .map_err(|e| ExprError::Eval(format!("invalid regex {}: {}", pattern, e)))?;
                Value::Bool(re.is_match(&to_text(&left)))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                arithmetic(op, &left, &right)?
            }
            _ => Value::Bool(compare(op, &left, &right)?),
        };
        Ok(value)
    }
}

/// Parse and evaluate `src` against `context`
pub fn evaluate(src: &str, context: &Map<String, Value>) -> ExprResult<Value> {
    let expr = parse(src)?;
    Evaluator::new(context).eval(&expr)
}
