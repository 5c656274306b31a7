use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::Index;

use nalgebra_glm as glm;

use super::LuaError;

static NIL: LuaValue = LuaValue::Nil;

/// Table keys. Floats with an integral value are normalized to `Int`, like Lua does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LuaKey {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LuaKey {
    pub fn from_value(value: &LuaValue) -> Option<Self> {
        match value {
            LuaValue::Boolean(b) => Some(LuaKey::Bool(*b)),
            LuaValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(LuaKey::Int(*n as i64)),
            LuaValue::String(s) => Some(LuaKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for LuaKey {
    fn from(s: &str) -> Self {
        LuaKey::Str(s.to_string())
    }
}

impl From<i64> for LuaKey {
    fn from(i: i64) -> Self {
        LuaKey::Int(i)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LuaTable {
    entries: BTreeMap<LuaKey, LuaValue>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LuaKey) -> &LuaValue {
        self.entries.get(key).unwrap_or(&NIL)
    }

    pub fn get_mut(&mut self, key: &LuaKey) -> Option<&mut LuaValue> {
        self.entries.get_mut(key)
    }

    /// Assigning nil removes the entry.
    pub fn set(&mut self, key: LuaKey, value: LuaValue) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn push(&mut self, value: LuaValue) {
        let next = self.len() as i64 + 1;
        self.set(LuaKey::Int(next), value);
    }

    /// Border of the sequence part: the count of consecutive integer keys starting at 1.
    pub fn len(&self) -> usize {
        let mut n = 0;
        while self.entries.contains_key(&LuaKey::Int(n as i64 + 1)) {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LuaKey, &LuaValue)> {
        self.entries.iter()
    }

    /// Values of the sequence part, in order.
    pub fn sequence(&self) -> impl Iterator<Item = &LuaValue> {
        (1..=self.len()).map(move |i| self.get(&LuaKey::Int(i as i64)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Table(LuaTable),
}

impl LuaValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Number(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    pub fn exists(&self) -> bool {
        !self.is_nil()
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    pub fn as_table(&self) -> Option<&LuaTable> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LuaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LuaValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LuaValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Sequence length of a table, 0 for anything else.
    pub fn len(&self) -> usize {
        self.as_table().map_or(0, LuaTable::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &LuaKey) -> &LuaValue {
        match self {
            LuaValue::Table(t) => t.get(key),
            _ => &NIL,
        }
    }

    pub fn sequence(&self) -> Box<dyn Iterator<Item = &LuaValue> + '_> {
        match self {
            LuaValue::Table(t) => Box::new(t.sequence()),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn expect_str(&self, path: &str) -> Result<&str, LuaError> {
        self.as_str().ok_or_else(|| self.shape_error(path, "string"))
    }

    pub fn expect_f64(&self, path: &str) -> Result<f64, LuaError> {
        self.as_f64().ok_or_else(|| self.shape_error(path, "number"))
    }

    pub fn f64_or(&self, path: &str, default: f64) -> Result<f64, LuaError> {
        if self.is_nil() {
            return Ok(default);
        }
        self.expect_f64(path)
    }

    /// Reads `{x, y, z}`. Tables keyed `x`/`y`/`z` are accepted too.
    pub fn vec3(&self, path: &str) -> Result<glm::DVec3, LuaError> {
        let table = self
            .as_table()
            .ok_or_else(|| self.shape_error(path, "3-vector"))?;
        let named = ["x", "y", "z"];
        let mut out = [0.0; 3];
        for (i, slot) in out.iter_mut().enumerate() {
            let by_index = table.get(&LuaKey::Int(i as i64 + 1));
            let component = if by_index.exists() {
                by_index
            } else {
                table.get(&LuaKey::from(named[i]))
            };
            *slot = component
                .as_f64()
                .ok_or_else(|| self.shape_error(path, "3-vector"))?;
        }
        Ok(glm::vec3(out[0], out[1], out[2]))
    }

    pub fn vec3_or(&self, path: &str, default: glm::DVec3) -> Result<glm::DVec3, LuaError> {
        if self.is_nil() {
            return Ok(default);
        }
        self.vec3(path)
    }

    /// Reads a 3x3 matrix given as three rows.
    pub fn mat3(&self, path: &str) -> Result<glm::DMat3, LuaError> {
        if self.len() != 3 {
            return Err(self.shape_error(path, "3x3 matrix"));
        }
        let mut rows = [glm::DVec3::zeros(); 3];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = self[i + 1].vec3(&format!("{path}[{}]", i + 1))?;
        }
        Ok(glm::DMat3::new(
            rows[0].x, rows[0].y, rows[0].z, rows[1].x, rows[1].y, rows[1].z, rows[2].x,
            rows[2].y, rows[2].z,
        ))
    }

    pub fn mat3_or(&self, path: &str, default: glm::DMat3) -> Result<glm::DMat3, LuaError> {
        if self.is_nil() {
            return Ok(default);
        }
        self.mat3(path)
    }

    /// Plain numeric sequence, e.g. a spatial axis `{0, 0, 1, 0, 0, 0}`.
    pub fn numbers(&self, path: &str) -> Result<Vec<f64>, LuaError> {
        let table = self
            .as_table()
            .ok_or_else(|| self.shape_error(path, "list of numbers"))?;
        table
            .sequence()
            .map(|v| v.as_f64().ok_or_else(|| self.shape_error(path, "list of numbers")))
            .collect()
    }

    fn shape_error(&self, path: &str, expected: &'static str) -> LuaError {
        LuaError::Shape {
            path: path.to_string(),
            expected,
            found: self.type_name().to_string(),
        }
    }

    /// Lua source text for this value, indented two spaces per level.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_lua(&mut out, 0);
        out
    }

    fn write_lua(&self, out: &mut String, depth: usize) {
        match self {
            LuaValue::Nil => out.push_str("nil"),
            LuaValue::Boolean(b) => {
                let _ = write!(out, "{b}");
            }
            LuaValue::Number(n) => write_number(out, *n),
            LuaValue::String(s) => write_string(out, s),
            LuaValue::Table(t) => {
                if t.is_empty() {
                    out.push_str("{}");
                    return;
                }
                let seq_len = t.len() as i64;
                let inline = t.iter().all(|(_, v)| !matches!(v, LuaValue::Table(_)));
                if inline {
                    out.push_str("{ ");
                } else {
                    out.push_str("{\n");
                }
                let pad = "  ".repeat(depth + 1);
                let mut first = true;
                for (key, value) in t.iter() {
                    if inline {
                        if !first {
                            out.push_str(", ");
                        }
                    } else {
                        out.push_str(&pad);
                    }
                    first = false;
                    match key {
                        LuaKey::Int(i) if *i >= 1 && *i <= seq_len => {}
                        LuaKey::Str(s) if is_identifier(s) => {
                            let _ = write!(out, "{s} = ");
                        }
                        LuaKey::Str(s) => {
                            out.push('[');
                            write_string(out, s);
                            out.push_str("] = ");
                        }
                        LuaKey::Int(i) => {
                            let _ = write!(out, "[{i}] = ");
                        }
                        LuaKey::Bool(b) => {
                            let _ = write!(out, "[{b}] = ");
                        }
                    }
                    value.write_lua(out, depth + 1);
                    if !inline {
                        out.push_str(",\n");
                    }
                }
                if inline {
                    out.push_str(" }");
                } else {
                    out.push_str(&"  ".repeat(depth));
                    out.push('}');
                }
            }
        }
    }
}

fn write_number(out: &mut String, n: f64) {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let _ = write!(out, "{}", n as i64);
    } else {
        let _ = write!(out, "{n}");
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !super::lexer::is_keyword(s)
}

impl Index<&str> for LuaValue {
    type Output = LuaValue;

    fn index(&self, key: &str) -> &LuaValue {
        self.get(&LuaKey::from(key))
    }
}

/// 1-based like Lua.
impl Index<usize> for LuaValue {
    type Output = LuaValue;

    fn index(&self, i: usize) -> &LuaValue {
        self.get(&LuaKey::Int(i as i64))
    }
}

impl From<LuaTable> for LuaValue {
    fn from(t: LuaTable) -> Self {
        LuaValue::Table(t)
    }
}

impl From<f64> for LuaValue {
    fn from(n: f64) -> Self {
        LuaValue::Number(n)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_table(xs: &[f64]) -> LuaValue {
        let mut t = LuaTable::new();
        for x in xs {
            t.push(LuaValue::Number(*x));
        }
        LuaValue::Table(t)
    }

    #[test]
    fn missing_paths_index_to_nil() {
        let mut inner = LuaTable::new();
        inner.set("name".into(), "pelvis".into());
        let mut frames = LuaTable::new();
        frames.push(inner.into());
        let mut root = LuaTable::new();
        root.set("frames".into(), frames.into());
        let root = LuaValue::Table(root);

        assert_eq!(root["frames"][1]["name"].as_str(), Some("pelvis"));
        assert!(root["frames"][2]["name"].is_nil());
        assert!(!root["configuration"]["axis_up"].exists());
        assert_eq!(root["frames"].len(), 1);
    }

    #[test]
    fn len_stops_at_first_hole() {
        let mut t = LuaTable::new();
        t.set(LuaKey::Int(1), 1.0.into());
        t.set(LuaKey::Int(2), 2.0.into());
        t.set(LuaKey::Int(4), 4.0.into());
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn vec3_or_defaults_only_for_nil() {
        let default = glm::vec3(1.0, 1.0, 1.0);
        assert_eq!(LuaValue::Nil.vec3_or("scale", default).unwrap(), default);
        assert_eq!(
            vec_table(&[0.5, 2.0, -1.0]).vec3_or("scale", default).unwrap(),
            glm::vec3(0.5, 2.0, -1.0)
        );
        let err = LuaValue::from("big").vec3_or("scale", default).unwrap_err();
        assert!(matches!(err, LuaError::Shape { expected: "3-vector", .. }));
        assert!(vec_table(&[1.0, 2.0]).vec3("scale").is_err());
    }

    #[test]
    fn mat3_reads_rows() {
        let mut rows = LuaTable::new();
        rows.push(vec_table(&[0.0, 1.0, 0.0]));
        rows.push(vec_table(&[-1.0, 0.0, 0.0]));
        rows.push(vec_table(&[0.0, 0.0, 1.0]));
        let m = LuaValue::Table(rows).mat3("E").unwrap();
        assert_eq!(m[(0, 1)], 1.0);
        assert_eq!(m[(1, 0)], -1.0);
        assert_eq!(m[(2, 2)], 1.0);
    }

    #[test]
    fn serialize_writes_sequence_then_named_fields() {
        let mut t = LuaTable::new();
        t.push(1.0.into());
        t.push(2.5.into());
        t.set("src".into(), "meshes/unit cube.obj".into());
        let text = LuaValue::Table(t).serialize();
        assert_eq!(text, "{ 1, 2.5, src = \"meshes/unit cube.obj\" }");
    }
}
