use std::collections::HashMap;
use std::path::Path;

use super::LuaError;
use super::lexer::{Lexer, Spanned, Token, is_keyword};
use super::value::{LuaKey, LuaTable, LuaValue};

const UNARY_PRIORITY: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinOp {
    fn from_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Or => BinOp::Or,
            Token::And => BinOp::And,
            Token::Eq => BinOp::Eq,
            Token::NotEq => BinOp::NotEq,
            Token::Lt => BinOp::Lt,
            Token::LtEq => BinOp::LtEq,
            Token::Gt => BinOp::Gt,
            Token::GtEq => BinOp::GtEq,
            Token::Concat => BinOp::Concat,
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Mod,
            Token::Caret => BinOp::Pow,
            _ => return None,
        })
    }

    /// (left, right) binding power; right < left means right associative.
    fn priority(self) -> (u8, u8) {
        match self {
            BinOp::Or => (1, 1),
            BinOp::And => (2, 2),
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => (3, 3),
            BinOp::Concat => (9, 8),
            BinOp::Add | BinOp::Sub => (10, 10),
            BinOp::Mul | BinOp::Div | BinOp::Mod => (11, 11),
            BinOp::Pow => (14, 13),
        }
    }
}

/// Assignment target: a variable followed by zero or more keys.
struct Place {
    root: String,
    keys: Vec<LuaKey>,
}

/// Deepest expression nesting accepted, counting parentheses, unary
/// operators and table constructors.
pub const MAX_NESTING: usize = 64;

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    globals: LuaTable,
    locals: HashMap<String, LuaValue>,
}

/// Evaluates a model chunk. Returns the value of the final `return`, or the
/// table of globals when the chunk has none.
pub fn parse_str(src: &str) -> Result<LuaValue, LuaError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).chunk()
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<LuaValue, crate::error::VisError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|e| {
        crate::error::VisError::new("model-read")
            .with_arg("path", path.display())
            .push_std(e)
    })?;
    parse_str(&src).map_err(|e| {
        crate::error::VisError::new("model-parse")
            .with_arg("path", path.display())
            .push_std(e)
    })
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            globals: LuaTable::new(),
            locals: HashMap::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), LuaError> {
        if self.check(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> LuaError {
        LuaError::Expected {
            line: self.line(),
            expected: expected.to_string(),
            found: self.peek().describe(),
        }
    }

    fn unsupported(&self, what: &str) -> LuaError {
        LuaError::Unsupported {
            line: self.line(),
            what: what.to_string(),
        }
    }

    fn name(&mut self) -> Result<String, LuaError> {
        match self.peek().clone() {
            Token::Name(n) if is_keyword(&n) => Err(self.unsupported(&format!("keyword '{n}'"))),
            Token::Name(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    pub fn chunk(mut self) -> Result<LuaValue, LuaError> {
        loop {
            match self.peek() {
                Token::Eof => return Ok(LuaValue::Table(self.globals)),
                Token::Semicolon => {
                    self.advance();
                }
                Token::Return => {
                    self.advance();
                    let value = match self.peek() {
                        Token::Eof | Token::Semicolon => LuaValue::Nil,
                        _ => self.expr_list()?.into_iter().next().unwrap_or_default(),
                    };
                    self.check(&Token::Semicolon);
                    if *self.peek() != Token::Eof {
                        return Err(self.unexpected("end of file after 'return'"));
                    }
                    return Ok(value);
                }
                Token::Function => return Err(self.unsupported("function definition")),
                Token::Local => {
                    self.advance();
                    if *self.peek() == Token::Function {
                        return Err(self.unsupported("function definition"));
                    }
                    let mut names = vec![self.name()?];
                    while self.check(&Token::Comma) {
                        names.push(self.name()?);
                    }
                    let values = if self.check(&Token::Assign) {
                        self.expr_list()?
                    } else {
                        Vec::new()
                    };
                    let mut values = values.into_iter();
                    for name in names {
                        self.locals.insert(name, values.next().unwrap_or_default());
                    }
                }
                _ => self.assignment()?,
            }
        }
    }

    fn assignment(&mut self) -> Result<(), LuaError> {
        let mut places = vec![self.place()?];
        while self.check(&Token::Comma) {
            places.push(self.place()?);
        }
        if *self.peek() == Token::LParen || matches!(self.peek(), Token::Str(_) | Token::LCurly) {
            return Err(self.unsupported("function call"));
        }
        self.expect(Token::Assign, "'='")?;
        let line = self.line();
        let mut values = self.expr_list()?.into_iter();
        for place in places {
            self.store(place, values.next().unwrap_or_default(), line)?;
        }
        Ok(())
    }

    fn place(&mut self) -> Result<Place, LuaError> {
        let root = self.name()?;
        let mut keys = Vec::new();
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    keys.push(LuaKey::Str(self.name()?));
                }
                Token::LBrack => {
                    self.advance();
                    let line = self.line();
                    let key = self.expr()?;
                    self.expect(Token::RBrack, "']'")?;
                    keys.push(LuaKey::from_value(&key).ok_or(LuaError::Type {
                        line,
                        op: "use as table key",
                        operand: key.type_name().to_string(),
                    })?);
                }
                _ => return Ok(Place { root, keys }),
            }
        }
    }

    fn store(&mut self, place: Place, value: LuaValue, line: usize) -> Result<(), LuaError> {
        let Some((last, path)) = place.keys.split_last() else {
            if let Some(slot) = self.locals.get_mut(&place.root) {
                *slot = value;
            } else {
                self.globals.set(LuaKey::Str(place.root), value);
            }
            return Ok(());
        };

        let root_key = LuaKey::Str(place.root.clone());
        let mut target = match self.locals.get_mut(&place.root) {
            Some(v) => Some(v),
            None => self.globals.get_mut(&root_key),
        };
        for key in path {
            target = match target {
                Some(LuaValue::Table(t)) => t.get_mut(key),
                _ => None,
            };
        }
        match target {
            Some(LuaValue::Table(t)) => {
                t.set(last.clone(), value);
                Ok(())
            }
            other => Err(LuaError::Index {
                line,
                operand: other.map_or("nil", |v| v.type_name()).to_string(),
            }),
        }
    }

    fn expr_list(&mut self) -> Result<Vec<LuaValue>, LuaError> {
        let mut values = vec![self.expr()?];
        while self.check(&Token::Comma) {
            values.push(self.expr()?);
        }
        Ok(values)
    }

    fn expr(&mut self) -> Result<LuaValue, LuaError> {
        self.sub_expr(0)
    }

    fn sub_expr(&mut self, limit: u8) -> Result<LuaValue, LuaError> {
        if self.depth >= MAX_NESTING {
            return Err(self.unsupported(&format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let value = self.nested_expr(limit);
        self.depth -= 1;
        value
    }

    fn nested_expr(&mut self, limit: u8) -> Result<LuaValue, LuaError> {
        let line = self.line();
        let mut left = match self.peek() {
            Token::Minus => {
                self.advance();
                let v = self.sub_expr(UNARY_PRIORITY)?;
                match v {
                    LuaValue::Number(n) => LuaValue::Number(-n),
                    other => return Err(type_error(line, "negate", &other)),
                }
            }
            Token::Not => {
                self.advance();
                let v = self.sub_expr(UNARY_PRIORITY)?;
                LuaValue::Boolean(!v.truthy())
            }
            Token::Hash => {
                self.advance();
                let v = self.sub_expr(UNARY_PRIORITY)?;
                match v {
                    LuaValue::String(s) => LuaValue::Number(s.len() as f64),
                    LuaValue::Table(t) => LuaValue::Number(t.len() as f64),
                    other => return Err(type_error(line, "take the length of", &other)),
                }
            }
            _ => self.simple_expr()?,
        };

        while let Some(op) = BinOp::from_token(self.peek()) {
            let (left_pri, right_pri) = op.priority();
            if left_pri <= limit {
                break;
            }
            let line = self.line();
            self.advance();
            let right = self.sub_expr(right_pri)?;
            left = binary(op, left, right, line)?;
        }
        Ok(left)
    }

    fn simple_expr(&mut self) -> Result<LuaValue, LuaError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(LuaValue::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(LuaValue::String(s))
            }
            Token::Nil => {
                self.advance();
                Ok(LuaValue::Nil)
            }
            Token::True => {
                self.advance();
                Ok(LuaValue::Boolean(true))
            }
            Token::False => {
                self.advance();
                Ok(LuaValue::Boolean(false))
            }
            Token::LCurly => self.table(),
            Token::Function => Err(self.unsupported("function definition")),
            _ => self.suffixed_expr(),
        }
    }

    fn suffixed_expr(&mut self) -> Result<LuaValue, LuaError> {
        let mut value = match self.peek() {
            Token::LParen => {
                self.advance();
                let v = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                v
            }
            Token::Name(_) => {
                let name = self.name()?;
                self.lookup(&name)
            }
            _ => return Err(self.unexpected("an expression")),
        };

        loop {
            let line = self.line();
            let key = match self.peek() {
                Token::Dot => {
                    self.advance();
                    LuaKey::Str(self.name()?)
                }
                Token::LBrack => {
                    self.advance();
                    let k = self.expr()?;
                    self.expect(Token::RBrack, "']'")?;
                    match LuaKey::from_value(&k) {
                        Some(key) => key,
                        // non-integral numbers and nil never match a stored key
                        None => {
                            value = index(value, None, line)?;
                            continue;
                        }
                    }
                }
                Token::LParen | Token::Str(_) | Token::LCurly => {
                    return Err(self.unsupported("function call"));
                }
                _ => return Ok(value),
            };
            value = index(value, Some(&key), line)?;
        }
    }

    fn lookup(&self, name: &str) -> LuaValue {
        match self.locals.get(name) {
            Some(v) => v.clone(),
            None => self.globals.get(&LuaKey::from(name)).clone(),
        }
    }

    fn table(&mut self) -> Result<LuaValue, LuaError> {
        self.expect(Token::LCurly, "'{'")?;
        let mut table = LuaTable::new();
        let mut next_index = 1i64;
        loop {
            if self.check(&Token::RCurly) {
                return Ok(LuaValue::Table(table));
            }
            let line = self.line();
            match (self.peek().clone(), self.peek_at(1).clone()) {
                (Token::LBrack, _) => {
                    self.advance();
                    let k = self.expr()?;
                    self.expect(Token::RBrack, "']'")?;
                    self.expect(Token::Assign, "'='")?;
                    let v = self.expr()?;
                    let key = LuaKey::from_value(&k).ok_or(LuaError::Type {
                        line,
                        op: "use as table key",
                        operand: k.type_name().to_string(),
                    })?;
                    table.set(key, v);
                }
                (Token::Name(n), Token::Assign) if !is_keyword(&n) => {
                    self.advance();
                    self.advance();
                    let v = self.expr()?;
                    table.set(LuaKey::Str(n), v);
                }
                _ => {
                    let v = self.expr()?;
                    table.set(LuaKey::Int(next_index), v);
                    next_index += 1;
                }
            }
            if !self.check(&Token::Comma) && !self.check(&Token::Semicolon) {
                self.expect(Token::RCurly, "'}' or a field separator")?;
                return Ok(LuaValue::Table(table));
            }
        }
    }
}

fn index(value: LuaValue, key: Option<&LuaKey>, line: usize) -> Result<LuaValue, LuaError> {
    match value {
        LuaValue::Table(t) => Ok(key.map_or(LuaValue::Nil, |k| t.get(k).clone())),
        other => Err(LuaError::Index {
            line,
            operand: other.type_name().to_string(),
        }),
    }
}

fn type_error(line: usize, op: &'static str, operand: &LuaValue) -> LuaError {
    LuaError::Type {
        line,
        op,
        operand: format!("a {} value", operand.type_name()),
    }
}

fn concat_piece(value: &LuaValue) -> Option<String> {
    match value {
        LuaValue::String(s) => Some(s.clone()),
        LuaValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        LuaValue::Number(n) => Some(format!("{n}")),
        _ => None,
    }
}

fn binary(op: BinOp, left: LuaValue, right: LuaValue, line: usize) -> Result<LuaValue, LuaError> {
    use LuaValue::{Boolean, Number, String as Str};

    Ok(match op {
        BinOp::Or => {
            if left.truthy() {
                left
            } else {
                right
            }
        }
        BinOp::And => {
            if left.truthy() {
                right
            } else {
                left
            }
        }
        BinOp::Eq => Boolean(left == right),
        BinOp::NotEq => Boolean(left != right),
        BinOp::Concat => match (concat_piece(&left), concat_piece(&right)) {
            (Some(a), Some(b)) => Str(a + &b),
            (None, _) => return Err(type_error(line, "concatenate", &left)),
            (_, None) => return Err(type_error(line, "concatenate", &right)),
        },
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = match (&left, &right) {
                (Number(a), Number(b)) => a.partial_cmp(b),
                (Str(a), Str(b)) => Some(a.cmp(b)),
                _ => return Err(type_error(line, "compare", &left)),
            };
            let Some(ordering) = ordering else {
                return Ok(Boolean(false));
            };
            Boolean(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::LtEq => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
            let (a, b) = match (&left, &right) {
                (Number(a), Number(b)) => (*a, *b),
                (Number(_), _) => return Err(type_error(line, "do arithmetic on", &right)),
                _ => return Err(type_error(line, "do arithmetic on", &left)),
            };
            Number(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a - (a / b).floor() * b,
                _ => a.powf(b),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_nested_table() {
        let v = parse_str(
            r#"
            return {
              gravity = { 0, 0, -9.81 },
              frames = {
                { name = "pelvis", parent = "ROOT" },
                { name = "thigh"; parent = "pelvis", },
              },
            }
            "#,
        )
        .unwrap();
        assert_eq!(v["gravity"][3].as_f64(), Some(-9.81));
        assert_eq!(v["frames"].len(), 2);
        assert_eq!(v["frames"][2]["parent"].as_str(), Some("pelvis"));
    }

    #[test]
    fn locals_globals_and_field_access() {
        let v = parse_str(
            r#"
            local inertia = { {1, 0, 0}, {0, 1, 0}, {0, 0, 1} }
            bodies = { thigh = { mass = 2, inertia = inertia } }
            bodies.thigh.com = { 0, 0, -0.2 }
            bodies["shank"] = { mass = bodies.thigh.mass / 2 }
            return { a = bodies.thigh, b = bodies.shank, c = inertia[2][2] }
            "#,
        )
        .unwrap();
        assert_eq!(v["a"]["com"][3].as_f64(), Some(-0.2));
        assert_eq!(v["b"]["mass"].as_f64(), Some(1.0));
        assert_eq!(v["c"].as_f64(), Some(1.0));
    }

    #[test]
    fn arithmetic_precedence() {
        let v = parse_str("return { 1 + 2 * 3, -2 ^ 2, 2 ^ 3 ^ 2, (1 + 2) * 3, 7 % 3, 'a' .. 1 .. 'b', #{1, 2, 3} }")
            .unwrap();
        let nums: Vec<_> = (1..=5).map(|i| v[i].as_f64().unwrap()).collect();
        assert_eq!(nums, vec![7.0, -4.0, 512.0, 9.0, 1.0]);
        assert_eq!(v[6].as_str(), Some("a1b"));
        assert_eq!(v[7].as_f64(), Some(3.0));
    }

    #[test]
    fn boolean_logic_and_comparisons() {
        let v = parse_str("return { 1 < 2 and 'yes' or 'no', nil or 5, not nil, 2 == 2.0, 'a' ~= 'b' }")
            .unwrap();
        assert_eq!(v[1].as_str(), Some("yes"));
        assert_eq!(v[2].as_f64(), Some(5.0));
        assert_eq!(v[3].as_bool(), Some(true));
        assert_eq!(v[4].as_bool(), Some(true));
        assert_eq!(v[5].as_bool(), Some(true));
    }

    #[test]
    fn explicit_and_positional_keys_mix() {
        let v = parse_str("return { [3] = 'c', 'a', 'b', [\"key with space\"] = true }").unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(v[1].as_str(), Some("a"));
        assert_eq!(v[3].as_str(), Some("c"));
        assert_eq!(v["key with space"].as_bool(), Some(true));
    }

    #[test]
    fn chunk_without_return_yields_globals() {
        let v = parse_str("model = { name = 'x' }\ncount = 2").unwrap();
        assert_eq!(v["model"]["name"].as_str(), Some("x"));
        assert_eq!(v["count"].as_f64(), Some(2.0));
    }

    #[test]
    fn functions_are_rejected() {
        let err = parse_str("local function f() end").unwrap_err();
        assert!(matches!(err, LuaError::Unsupported { line: 1, .. }));
        let err = parse_str("x = require('foo')").unwrap_err();
        assert!(matches!(err, LuaError::Unsupported { .. }));
        let err = parse_str("if x then end").unwrap_err();
        assert!(matches!(err, LuaError::Unsupported { .. }));
    }

    #[test]
    fn deep_nesting_is_rejected_without_overflow() {
        let parens = format!("return {}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = parse_str(&parens).unwrap_err();
        assert!(matches!(err, LuaError::Unsupported { line: 1, ref what } if what.contains("nesting")));

        let tables = format!("x = {}", "{".repeat(MAX_NESTING + 1));
        assert!(matches!(parse_str(&tables).unwrap_err(), LuaError::Unsupported { .. }));

        let negations = format!("return {}1", "- ".repeat(MAX_NESTING + 1));
        assert!(matches!(parse_str(&negations).unwrap_err(), LuaError::Unsupported { .. }));
    }

    #[test]
    fn nesting_below_the_limit_evaluates() {
        let depth = MAX_NESTING / 2;
        let v = parse_str(&format!("return {}7{}", "(".repeat(depth), ")".repeat(depth))).unwrap();
        assert_eq!(v.as_f64(), Some(7.0));

        let v = parse_str(&format!("return {}{}", "{".repeat(depth), "}".repeat(depth))).unwrap();
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn indexing_nil_is_an_error() {
        let err = parse_str("return missing.field").unwrap_err();
        assert_eq!(
            err,
            LuaError::Index {
                line: 1,
                operand: "nil".into()
            }
        );
    }

    #[test]
    fn trailing_tokens_after_return_are_an_error() {
        assert!(matches!(
            parse_str("return 1 x = 2").unwrap_err(),
            LuaError::Expected { .. }
        ));
    }
}
