//! The value model and type resolution.
//!
//! Types form a closed set of [`TypeKey`]s, each with one static descriptor in
//! [`super::builtins`]. A [`Type`] is a key plus optional configuration; all
//! matching (operators, casts, equality) looks at the key alone.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::ast::{BinOp, UnaryOp};
use super::builtins::{self, Cast, Member, MemberName, Operation, UnaryOperation};
use super::condition::Condition;
use super::lexer;

// ── Type keys ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKey {
    Int,
    Byte,
    Short,
    Long,
    Float,
    Double,
    String,
    Bool,
    Selector,
    Compound,
    List,
    Range,
    Score,
    Condition,
    Enum,
    Item,
    Resource,
    Data,
    Void,
    Error,
}

impl TypeKey {
    /// Every key in cast-search order. Wider numerics come after narrower ones
    /// so the first successful left cast is the least lossy.
    pub const ALL: [TypeKey; 20] = [
        TypeKey::Int,
        TypeKey::Byte,
        TypeKey::Short,
        TypeKey::Long,
        TypeKey::Float,
        TypeKey::Double,
        TypeKey::String,
        TypeKey::Bool,
        TypeKey::Condition,
        TypeKey::Score,
        TypeKey::Selector,
        TypeKey::Compound,
        TypeKey::List,
        TypeKey::Range,
        TypeKey::Enum,
        TypeKey::Item,
        TypeKey::Resource,
        TypeKey::Data,
        TypeKey::Void,
        TypeKey::Error,
    ];

    pub fn name(self) -> &'static str {
        builtins::descriptor(self).name
    }

    /// Look up a key by its source-level name (`int`, `score`, ...).
    pub fn from_name(name: &str) -> Option<TypeKey> {
        TypeKey::ALL
            .into_iter()
            .filter(|k| !matches!(k, TypeKey::Enum | TypeKey::Void | TypeKey::Error))
            .find(|k| k.name() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeKey::Int
                | TypeKey::Byte
                | TypeKey::Short
                | TypeKey::Long
                | TypeKey::Float
                | TypeKey::Double
        )
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Configured types ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeConfig {
    #[default]
    None,
    List {
        element: Option<TypeKey>,
        len: Option<usize>,
    },
    Enum(String),
}

/// A base type key with optional parse/render context.
#[derive(Debug, Clone)]
pub struct Type {
    pub key: TypeKey,
    pub config: TypeConfig,
}

impl Type {
    pub fn plain(key: TypeKey) -> Self {
        Self {
            key,
            config: TypeConfig::None,
        }
    }

    pub fn error() -> Self {
        Self::plain(TypeKey::Error)
    }

    pub fn list(element: Option<TypeKey>, len: Option<usize>) -> Self {
        Self {
            key: TypeKey::List,
            config: TypeConfig::List { element, len },
        }
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            key: TypeKey::Enum,
            config: TypeConfig::Enum(name.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.key == TypeKey::Error
    }

    pub fn enum_name(&self) -> Option<&str> {
        match &self.config {
            TypeConfig::Enum(name) => Some(name),
            _ => None,
        }
    }

    /// Check that a value of type `actual` satisfies this declared
    /// configuration. Returns a description of the mismatch.
    pub fn config_mismatch(&self, actual: &Type) -> Option<String> {
        match (&self.config, &actual.config) {
            (
                TypeConfig::List {
                    element: Some(want),
                    len: want_len,
                },
                TypeConfig::List {
                    element: got,
                    len: got_len,
                },
            ) => {
                if let Some(got) = got {
                    if got != want {
                        return Some(format!("expected elements of type `{want}`, found `{got}`"));
                    }
                }
                match (want_len, got_len) {
                    (Some(w), Some(g)) if w != g => {
                        Some(format!("expected {w} elements, found {g}"))
                    }
                    _ => None,
                }
            }
            (TypeConfig::List { element: None, len: Some(w) }, TypeConfig::List { len: Some(g), .. })
                if w != g =>
            {
                Some(format!("expected {w} elements, found {g}"))
            }
            (TypeConfig::Enum(want), TypeConfig::Enum(got)) if want != got => {
                Some(format!("expected enum `{want}`, found `{got}`"))
            }
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Type {}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.config {
            TypeConfig::None => write!(f, "{}", self.key),
            TypeConfig::List { element, len } => {
                write!(f, "list")?;
                match (element, len) {
                    (Some(e), Some(n)) => write!(f, "<{e}, {n}>"),
                    (Some(e), None) => write!(f, "<{e}>"),
                    _ => Ok(()),
                }
            }
            TypeConfig::Enum(name) => write!(f, "{name}"),
        }
    }
}

// ── Values ──────────────────────────────────────────────────────

/// A scoreboard slot: `<entry> <objective>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Score {
    pub entry: String,
    pub objective: String,
}

impl Score {
    pub fn new(entry: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            objective: objective.into(),
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entry, self.objective)
    }
}

/// `@e[type=zombie]`; the argument block is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub kind: char,
    pub arguments: Option<String>,
}

impl Selector {
    pub const KINDS: [char; 6] = ['a', 'e', 's', 'p', 'r', 'n'];

    pub fn parse(text: &str) -> Option<Selector> {
        let rest = text.strip_prefix('@')?;
        let mut chars = rest.chars();
        let kind = chars.next()?;
        if !Self::KINDS.contains(&kind) {
            return None;
        }
        let tail = chars.as_str();
        if tail.is_empty() {
            return Some(Selector {
                kind,
                arguments: None,
            });
        }
        let inner = tail.strip_prefix('[')?.strip_suffix(']')?;
        Some(Selector {
            kind,
            arguments: Some(inner.to_string()),
        })
    }

    pub fn self_() -> Selector {
        Selector {
            kind: 's',
            arguments: None,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arguments {
            Some(args) => write!(f, "@{}[{}]", self.kind, args),
            None => write!(f, "@{}", self.kind),
        }
    }
}

/// An integer range with optional bounds, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl IntRange {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Self {
        Self { min, max }
    }

    pub fn exactly(value: i32) -> Self {
        Self::new(Some(value), Some(value))
    }

    pub fn contains(&self, value: i32) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

impl std::fmt::Display for IntRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(min) = self.min {
            write!(f, "{min}")?;
        }
        f.write_str("..")?;
        if let Some(max) = self.max {
            write!(f, "{max}")?;
        }
        Ok(())
    }
}

/// `namespace:path`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceLocation {
    pub namespace: String,
    pub path: String,
}

impl ResourceLocation {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Parse `ns:path`, defaulting the namespace to `minecraft`.
    pub fn parse(text: &str) -> ResourceLocation {
        match text.split_once(':') {
            Some((ns, path)) => ResourceLocation::new(ns, path),
            None => ResourceLocation::new("minecraft", text),
        }
    }
}

impl std::fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// An NBT path on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    pub target: Selector,
    pub path: String,
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity {} {}", self.target, self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ResourceLocation,
    pub nbt: Option<IndexMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Byte(i8),
    Short(i16),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bool(bool),
    Selector(Selector),
    Compound(IndexMap<String, Value>),
    List(Vec<Value>),
    Range(IntRange),
    Score(Score),
    Condition(Condition),
    Enum { name: String, variant: String },
    Item(Item),
    Resource(ResourceLocation),
    Data(DataPath),
}

impl Value {
    pub fn key(&self) -> TypeKey {
        match self {
            Value::Int(_) => TypeKey::Int,
            Value::Byte(_) => TypeKey::Byte,
            Value::Short(_) => TypeKey::Short,
            Value::Long(_) => TypeKey::Long,
            Value::Float(_) => TypeKey::Float,
            Value::Double(_) => TypeKey::Double,
            Value::Str(_) => TypeKey::String,
            Value::Bool(_) => TypeKey::Bool,
            Value::Selector(_) => TypeKey::Selector,
            Value::Compound(_) => TypeKey::Compound,
            Value::List(_) => TypeKey::List,
            Value::Range(_) => TypeKey::Range,
            Value::Score(_) => TypeKey::Score,
            Value::Condition(_) => TypeKey::Condition,
            Value::Enum { .. } => TypeKey::Enum,
            Value::Item(_) => TypeKey::Item,
            Value::Resource(_) => TypeKey::Resource,
            Value::Data(_) => TypeKey::Data,
        }
    }

    /// Render in target command syntax. Literal types render to text that
    /// parses back to an equal value.
    pub fn to_command_string(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Byte(v) => format!("{v}b"),
            Value::Short(v) => format!("{v}s"),
            Value::Long(v) => format!("{v}L"),
            Value::Float(v) => format!("{v}f"),
            Value::Double(v) => format!("{v}d"),
            Value::Str(s) => quote(s),
            Value::Bool(b) => b.to_string(),
            Value::Selector(s) => s.to_string(),
            Value::Compound(entries) => render_compound(entries),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_command_string).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Range(r) => r.to_string(),
            Value::Score(s) => s.to_string(),
            Value::Condition(c) => c.to_string(),
            Value::Enum { variant, .. } => variant.to_lowercase(),
            Value::Item(item) => match &item.nbt {
                Some(nbt) => format!("{}{}", item.id, render_compound(nbt)),
                None => item.id.to_string(),
            },
            Value::Resource(r) => r.to_string(),
            Value::Data(d) => d.to_string(),
        }
    }

    /// Plain text for chat output; strings are not quoted.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_command_string(),
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_compound(entries: &IndexMap<String, Value>) -> String {
    let parts: Vec<String> = entries
        .iter()
        .map(|(key, value)| {
            let bare = !key.is_empty()
                && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !key.starts_with(|c: char| c.is_ascii_digit())
                && !lexer::is_keyword(key);
            if bare {
                format!("{key}: {}", value.to_command_string())
            } else {
                format!("{}: {}", quote(key), value.to_command_string())
            }
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// Parse the literal grammar of `key` from `text`. Types without a standalone
/// literal grammar (score, condition, enum, data) return `None`.
pub fn parse_literal(key: TypeKey, text: &str) -> Option<Value> {
    let (tokens, errors) = lexer::lex(text);
    if !errors.is_empty() {
        return None;
    }
    let value = super::parser::literal_value(tokens)?;
    (value.key() == key).then_some(value)
}

// ── Code generation seam ────────────────────────────────────────

/// What operator, cast and member implementations may do while producing a
/// value: emit commands, allocate temporary scores, synthesize command lists.
pub trait GenContext {
    fn objective(&self) -> &str;

    fn emit(&mut self, command: String);

    /// A fresh `#<purpose><n>` score, unique within the compilation.
    fn temp(&mut self, purpose: &str) -> Score;

    /// Register `commands` as a new command list and return its id.
    fn synthesize(&mut self, purpose: &str, commands: Vec<String>) -> ResourceLocation;
}

// ── Resolution ──────────────────────────────────────────────────

/// An operator resolved for two operand types, with the casts the caller must
/// apply to each operand first.
#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    pub operation: &'static Operation,
    pub left_cast: Option<&'static Cast>,
    pub right_cast: Option<&'static Cast>,
}

/// Exact lookup: the right operand's key must match an entry of the left
/// type's table. No widening.
pub fn get_operation(left: TypeKey, op: BinOp, right: TypeKey) -> Option<&'static Operation> {
    builtins::descriptor(left)
        .operators
        .iter()
        .find(|o| o.op == op && o.rhs == right)
}

pub fn get_casts(target: TypeKey) -> &'static [Cast] {
    builtins::descriptor(target).casts
}

/// The cast turning `from` into `to`, if one exists. `None` also when the
/// keys are equal; check that first.
pub fn find_cast(from: TypeKey, to: TypeKey) -> Option<&'static Cast> {
    get_casts(to).iter().find(|c| c.from == from)
}

/// Whether a value of `from` is accepted where `to` is required.
pub fn accepts(to: TypeKey, from: TypeKey) -> bool {
    to == from || find_cast(from, to).is_some()
}

pub fn resolve_binary(left: &Type, op: BinOp, right: &Type) -> Option<Resolved> {
    if let Some(operation) = get_operation(left.key, op, right.key) {
        return Some(Resolved {
            operation,
            left_cast: None,
            right_cast: None,
        });
    }

    // Cast the right operand to something the left type accepts.
    for operation in builtins::descriptor(left.key)
        .operators
        .iter()
        .filter(|o| o.op == op)
    {
        if let Some(cast) = find_cast(right.key, operation.rhs) {
            return Some(Resolved {
                operation,
                left_cast: None,
                right_cast: Some(cast),
            });
        }
    }

    // Cast the left operand, optionally the right one too.
    for target in TypeKey::ALL {
        let Some(left_cast) = find_cast(left.key, target) else {
            continue;
        };
        for operation in builtins::descriptor(target)
            .operators
            .iter()
            .filter(|o| o.op == op)
        {
            if operation.rhs == right.key {
                return Some(Resolved {
                    operation,
                    left_cast: Some(left_cast),
                    right_cast: None,
                });
            }
            if let Some(right_cast) = find_cast(right.key, operation.rhs) {
                return Some(Resolved {
                    operation,
                    left_cast: Some(left_cast),
                    right_cast: Some(right_cast),
                });
            }
        }
    }
    None
}

/// Resolve a unary operator, casting the operand when its own type has none.
pub fn resolve_unary(
    operand: TypeKey,
    op: UnaryOp,
) -> Option<(Option<&'static Cast>, &'static UnaryOperation)> {
    if let Some(unary) = builtins::descriptor(operand)
        .unary
        .iter()
        .find(|u| u.op == op)
    {
        return Some((None, unary));
    }
    TypeKey::ALL.into_iter().find_map(|target| {
        let cast = find_cast(operand, target)?;
        let unary = builtins::descriptor(target)
            .unary
            .iter()
            .find(|u| u.op == op)?;
        Some((Some(cast), unary))
    })
}

pub fn find_member(ty: TypeKey, name: &str) -> Option<&'static Member> {
    let members = builtins::descriptor(ty).members;
    members
        .iter()
        .find(|m| matches!(m.name, MemberName::Named(n) if n == name))
        .or_else(|| members.iter().find(|m| m.name == MemberName::Any))
}

/// Named members of a type, for completion.
pub fn member_names(ty: TypeKey) -> Vec<String> {
    builtins::descriptor(ty)
        .members
        .iter()
        .filter_map(|m| match m.name {
            MemberName::Named(n) => Some(n.to_string()),
            MemberName::Any => None,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t(key: TypeKey) -> Type {
        Type::plain(key)
    }

    #[test]
    fn exact_match_needs_no_casts() {
        let r = resolve_binary(&t(TypeKey::Int), BinOp::Add, &t(TypeKey::Int)).unwrap();
        assert_eq!(r.operation.result, TypeKey::Int);
        assert!(r.left_cast.is_none() && r.right_cast.is_none());
    }

    #[test]
    fn get_operation_does_not_widen() {
        assert!(get_operation(TypeKey::Int, BinOp::Add, TypeKey::Double).is_none());
        assert!(get_operation(TypeKey::Int, BinOp::Add, TypeKey::String).is_some());
    }

    #[test]
    fn int_plus_double_casts_left() {
        let r = resolve_binary(&t(TypeKey::Int), BinOp::Add, &t(TypeKey::Double)).unwrap();
        assert_eq!(r.operation.result, TypeKey::Double);
        assert_eq!(r.left_cast.unwrap().from, TypeKey::Int);
        assert!(r.right_cast.is_none());
    }

    #[test]
    fn score_plus_byte_casts_right() {
        let r = resolve_binary(&t(TypeKey::Score), BinOp::Add, &t(TypeKey::Byte));
        // Score takes int; byte widens to int.
        let r = r.unwrap();
        assert_eq!(r.operation.result, TypeKey::Score);
        assert_eq!(r.right_cast.unwrap().from, TypeKey::Byte);
    }

    #[test]
    fn score_comparison_yields_condition() {
        let r = resolve_binary(&t(TypeKey::Score), BinOp::Gt, &t(TypeKey::Int)).unwrap();
        assert_eq!(r.operation.result, TypeKey::Condition);
        let r = resolve_binary(&t(TypeKey::Int), BinOp::Lt, &t(TypeKey::Score)).unwrap();
        assert_eq!(r.operation.result, TypeKey::Condition);
    }

    #[test]
    fn selector_and_selector_become_condition() {
        let r = resolve_binary(&t(TypeKey::Selector), BinOp::And, &t(TypeKey::Selector)).unwrap();
        assert_eq!(r.operation.result, TypeKey::Condition);
        assert!(r.left_cast.is_some() && r.right_cast.is_some());
    }

    #[test]
    fn unresolvable_operator() {
        assert!(resolve_binary(&t(TypeKey::String), BinOp::Mul, &t(TypeKey::Selector)).is_none());
    }

    #[test]
    fn configured_types_compare_by_base_key() {
        assert_eq!(Type::list(Some(TypeKey::Int), Some(3)), t(TypeKey::List));
        assert_eq!(Type::enumeration("Mode"), Type::enumeration("Other"));
        let declared = Type::list(Some(TypeKey::Int), Some(3));
        assert!(declared
            .config_mismatch(&Type::list(Some(TypeKey::Int), Some(2)))
            .is_some());
        assert!(declared
            .config_mismatch(&Type::list(Some(TypeKey::Int), Some(3)))
            .is_none());
    }

    #[test]
    fn type_names_round_trip() {
        for key in TypeKey::ALL {
            if matches!(key, TypeKey::Enum | TypeKey::Void | TypeKey::Error) {
                continue;
            }
            assert_eq!(TypeKey::from_name(key.name()), Some(key));
        }
        assert_eq!(TypeKey::from_name("nope"), None);
    }

    #[test]
    fn selector_parse_and_render() {
        let s = Selector::parse("@e[type=zombie,tag=a]").unwrap();
        assert_eq!(s.kind, 'e');
        assert_eq!(s.to_string(), "@e[type=zombie,tag=a]");
        assert!(Selector::parse("@x").is_none());
    }

    #[test]
    fn range_render_and_contains() {
        assert_eq!(IntRange::new(Some(6), None).to_string(), "6..");
        assert_eq!(IntRange::new(None, Some(9)).to_string(), "..9");
        assert!(IntRange::new(Some(1), Some(3)).contains(3));
        assert!(!IntRange::new(Some(1), Some(3)).contains(4));
    }

    #[test]
    fn literal_round_trip() {
        let cases = [
            (TypeKey::Int, "-42"),
            (TypeKey::Byte, "-128b"),
            (TypeKey::Short, "300s"),
            (TypeKey::Long, "9000000000L"),
            (TypeKey::Float, "1.5f"),
            (TypeKey::Double, "2.25"),
            (TypeKey::String, r#""say \"hi\"\n""#),
            (TypeKey::Bool, "true"),
            (TypeKey::Selector, "@e[type=zombie]"),
            (TypeKey::Compound, r#"{NoAI: 1b, "if": "x", Tags: ["a", "b"]}"#),
            (TypeKey::List, "[1, 2, 3]"),
            (TypeKey::Range, "3..5"),
            (TypeKey::Range, "..7"),
            (TypeKey::Resource, "minecraft:stone"),
            (TypeKey::Item, "minecraft:diamond_sword{Damage: 5}"),
        ];
        for (key, text) in cases {
            let first = parse_literal(key, text);
            assert!(first.is_some(), "parse {text}");
            let first = first.unwrap();
            let rendered = first.to_command_string();
            assert_eq!(parse_literal(key, &rendered), Some(first), "{text} -> {rendered}");
        }
    }

    #[test]
    fn literal_of_wrong_type_is_rejected() {
        assert!(parse_literal(TypeKey::Int, "1.5").is_none());
        assert!(parse_literal(TypeKey::String, "@s").is_none());
    }
}
