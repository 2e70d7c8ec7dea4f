use std::cmp::Ordering;

use super::ast::{BinOp, UnaryOp};
use super::condition::{self, CompareOp, Condition, Predicate};
use super::types::{GenContext, IntRange, Item, Score, TypeKey, Value};

pub type BinaryFn = fn(&mut dyn GenContext, Value, Value) -> Option<Value>;
pub type UnaryFn = fn(&mut dyn GenContext, Value) -> Option<Value>;
pub type MemberFn = fn(&mut dyn GenContext, Value, &str, Vec<Value>) -> Option<Value>;

/// A binary operator entry: single source of truth for the right operand
/// type, the result type AND the code it lowers to. The parser resolves
/// against these tables and the code generator calls `apply`.
pub struct Operation {
    pub op: BinOp,
    pub rhs: TypeKey,
    pub result: TypeKey,
    pub apply: BinaryFn,
}

pub struct UnaryOperation {
    pub op: UnaryOp,
    pub result: TypeKey,
    pub apply: UnaryFn,
}

/// Implicit conversion `from` → `to`, listed on the target type.
pub struct Cast {
    pub from: TypeKey,
    pub to: TypeKey,
    pub apply: UnaryFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberName {
    Named(&'static str),
    /// Matches any identifier; the name is passed to `apply`.
    Any,
}

pub struct Member {
    pub name: MemberName,
    /// `None` for fields, parameter types for methods.
    pub params: Option<&'static [TypeKey]>,
    pub result: TypeKey,
    pub apply: MemberFn,
}

/// Static descriptor of one value type.
pub struct ValueType {
    pub key: TypeKey,
    pub name: &'static str,
    pub operators: &'static [Operation],
    pub unary: &'static [UnaryOperation],
    pub casts: &'static [Cast],
    pub members: &'static [Member],
    /// Whether `value/Path` data access applies.
    pub data_path: bool,
    /// Registry whose entries carry an NBT schema for values of this type.
    pub schema: Option<&'static str>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation({} {} -> {})", self.op, self.rhs, self.result)
    }
}

impl std::fmt::Debug for UnaryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnaryOperation({} -> {})", self.op.symbol(), self.result)
    }
}

impl std::fmt::Debug for Cast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cast({} -> {})", self.from, self.to)
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Member({:?} -> {})", self.name, self.result)
    }
}

// ── Descriptors ─────────────────────────────────────────────────

pub fn descriptor(key: TypeKey) -> &'static ValueType {
    match key {
        TypeKey::Int => &INT,
        TypeKey::Byte => &BYTE,
        TypeKey::Short => &SHORT,
        TypeKey::Long => &LONG,
        TypeKey::Float => &FLOAT,
        TypeKey::Double => &DOUBLE,
        TypeKey::String => &STRING,
        TypeKey::Bool => &BOOL,
        TypeKey::Selector => &SELECTOR,
        TypeKey::Compound => &COMPOUND,
        TypeKey::List => &LIST,
        TypeKey::Range => &RANGE,
        TypeKey::Score => &SCORE,
        TypeKey::Condition => &CONDITION,
        TypeKey::Enum => &ENUM,
        TypeKey::Item => &ITEM,
        TypeKey::Resource => &RESOURCE,
        TypeKey::Data => &DATA,
        TypeKey::Void => &VOID,
        TypeKey::Error => &ERROR,
    }
}

const fn plain(key: TypeKey, name: &'static str) -> ValueType {
    ValueType {
        key,
        name,
        operators: &[],
        unary: &[],
        casts: &[],
        members: &[],
        data_path: false,
        schema: None,
    }
}

static INT: ValueType = ValueType {
    operators: &INT_OPS,
    unary: &INT_UNARY,
    casts: &[
        Cast { from: TypeKey::Byte, to: TypeKey::Int, apply: to_int },
        Cast { from: TypeKey::Short, to: TypeKey::Int, apply: to_int },
        Cast { from: TypeKey::Bool, to: TypeKey::Int, apply: to_int },
    ],
    ..plain(TypeKey::Int, "int")
};

static BYTE: ValueType = ValueType {
    operators: &BYTE_OPS,
    unary: &BYTE_UNARY,
    ..plain(TypeKey::Byte, "byte")
};

static SHORT: ValueType = ValueType {
    operators: &SHORT_OPS,
    unary: &SHORT_UNARY,
    ..plain(TypeKey::Short, "short")
};

static LONG: ValueType = ValueType {
    operators: &LONG_OPS,
    unary: &LONG_UNARY,
    casts: &[
        Cast { from: TypeKey::Int, to: TypeKey::Long, apply: to_long },
        Cast { from: TypeKey::Byte, to: TypeKey::Long, apply: to_long },
        Cast { from: TypeKey::Short, to: TypeKey::Long, apply: to_long },
    ],
    ..plain(TypeKey::Long, "long")
};

static FLOAT: ValueType = ValueType {
    operators: &FLOAT_OPS,
    unary: &FLOAT_UNARY,
    casts: &[
        Cast { from: TypeKey::Int, to: TypeKey::Float, apply: to_float },
        Cast { from: TypeKey::Byte, to: TypeKey::Float, apply: to_float },
        Cast { from: TypeKey::Short, to: TypeKey::Float, apply: to_float },
    ],
    ..plain(TypeKey::Float, "float")
};

static DOUBLE: ValueType = ValueType {
    operators: &DOUBLE_OPS,
    unary: &DOUBLE_UNARY,
    casts: &[
        Cast { from: TypeKey::Int, to: TypeKey::Double, apply: to_double },
        Cast { from: TypeKey::Float, to: TypeKey::Double, apply: to_double },
        Cast { from: TypeKey::Byte, to: TypeKey::Double, apply: to_double },
        Cast { from: TypeKey::Short, to: TypeKey::Double, apply: to_double },
        Cast { from: TypeKey::Long, to: TypeKey::Double, apply: to_double },
    ],
    ..plain(TypeKey::Double, "double")
};

static STRING: ValueType = ValueType {
    operators: &[
        Operation { op: BinOp::Add, rhs: TypeKey::String, result: TypeKey::String, apply: concat },
        Operation { op: BinOp::Add, rhs: TypeKey::Int, result: TypeKey::String, apply: concat },
        Operation { op: BinOp::Add, rhs: TypeKey::Bool, result: TypeKey::String, apply: concat },
        Operation { op: BinOp::Eq, rhs: TypeKey::String, result: TypeKey::Bool, apply: fold_eq },
        Operation { op: BinOp::Ne, rhs: TypeKey::String, result: TypeKey::Bool, apply: fold_ne },
    ],
    casts: &[Cast { from: TypeKey::Resource, to: TypeKey::String, apply: to_string }],
    members: &[Member { name: MemberName::Named("length"), params: None, result: TypeKey::Int, apply: length }],
    ..plain(TypeKey::String, "string")
};

static BOOL: ValueType = ValueType {
    operators: &[
        Operation { op: BinOp::And, rhs: TypeKey::Bool, result: TypeKey::Bool, apply: bool_and },
        Operation { op: BinOp::Or, rhs: TypeKey::Bool, result: TypeKey::Bool, apply: bool_or },
        Operation { op: BinOp::Eq, rhs: TypeKey::Bool, result: TypeKey::Bool, apply: fold_eq },
        Operation { op: BinOp::Ne, rhs: TypeKey::Bool, result: TypeKey::Bool, apply: fold_ne },
        Operation { op: BinOp::And, rhs: TypeKey::Condition, result: TypeKey::Condition, apply: condition_and },
        Operation { op: BinOp::Or, rhs: TypeKey::Condition, result: TypeKey::Condition, apply: condition_or },
    ],
    unary: &[UnaryOperation { op: UnaryOp::Not, result: TypeKey::Bool, apply: not }],
    ..plain(TypeKey::Bool, "bool")
};

static SELECTOR: ValueType = ValueType {
    members: &[Member { name: MemberName::Any, params: None, result: TypeKey::Score, apply: objective }],
    data_path: true,
    ..plain(TypeKey::Selector, "selector")
};

static COMPOUND: ValueType = plain(TypeKey::Compound, "compound");

static LIST: ValueType = ValueType {
    members: &[Member { name: MemberName::Named("length"), params: None, result: TypeKey::Int, apply: length }],
    ..plain(TypeKey::List, "list")
};

static RANGE: ValueType = ValueType {
    casts: &[Cast { from: TypeKey::Int, to: TypeKey::Range, apply: to_range }],
    members: &[
        Member { name: MemberName::Named("min"), params: None, result: TypeKey::Int, apply: range_bound },
        Member { name: MemberName::Named("max"), params: None, result: TypeKey::Int, apply: range_bound },
    ],
    ..plain(TypeKey::Range, "range")
};

static SCORE: ValueType = ValueType {
    operators: &SCORE_OPS,
    unary: &[UnaryOperation { op: UnaryOp::Neg, result: TypeKey::Score, apply: score_neg }],
    casts: &[
        Cast { from: TypeKey::Int, to: TypeKey::Score, apply: to_score },
        Cast { from: TypeKey::Bool, to: TypeKey::Score, apply: to_score },
        Cast { from: TypeKey::Condition, to: TypeKey::Score, apply: to_score },
        Cast { from: TypeKey::Data, to: TypeKey::Score, apply: to_score },
    ],
    members: &[Member { name: MemberName::Named("reset"), params: Some(&[]), result: TypeKey::Void, apply: reset }],
    ..plain(TypeKey::Score, "score")
};

static CONDITION: ValueType = ValueType {
    operators: &[
        Operation { op: BinOp::And, rhs: TypeKey::Condition, result: TypeKey::Condition, apply: condition_and },
        Operation { op: BinOp::Or, rhs: TypeKey::Condition, result: TypeKey::Condition, apply: condition_or },
    ],
    unary: &[UnaryOperation { op: UnaryOp::Not, result: TypeKey::Condition, apply: not }],
    casts: &[
        Cast { from: TypeKey::Bool, to: TypeKey::Condition, apply: to_condition },
        Cast { from: TypeKey::Score, to: TypeKey::Condition, apply: to_condition },
        Cast { from: TypeKey::Selector, to: TypeKey::Condition, apply: to_condition },
        Cast { from: TypeKey::Data, to: TypeKey::Condition, apply: to_condition },
    ],
    ..plain(TypeKey::Condition, "condition")
};

static ENUM: ValueType = ValueType {
    operators: &[
        Operation { op: BinOp::Eq, rhs: TypeKey::Enum, result: TypeKey::Bool, apply: fold_eq },
        Operation { op: BinOp::Ne, rhs: TypeKey::Enum, result: TypeKey::Bool, apply: fold_ne },
    ],
    ..plain(TypeKey::Enum, "enum")
};

static ITEM: ValueType = ValueType {
    casts: &[Cast { from: TypeKey::Resource, to: TypeKey::Item, apply: to_item }],
    schema: Some("item"),
    ..plain(TypeKey::Item, "item")
};

static RESOURCE: ValueType = ValueType {
    members: &[
        Member { name: MemberName::Named("namespace"), params: None, result: TypeKey::String, apply: resource_part },
        Member { name: MemberName::Named("path"), params: None, result: TypeKey::String, apply: resource_part },
    ],
    ..plain(TypeKey::Resource, "resource")
};

static DATA: ValueType = plain(TypeKey::Data, "data");
static VOID: ValueType = plain(TypeKey::Void, "void");
static ERROR: ValueType = plain(TypeKey::Error, "error");

// ── Operator tables ─────────────────────────────────────────────

/// Same-type arithmetic and comparisons shared by every numeric type.
const fn numeric_ops(key: TypeKey) -> [Operation; 11] {
    [
        Operation { op: BinOp::Add, rhs: key, result: key, apply: fold_add },
        Operation { op: BinOp::Sub, rhs: key, result: key, apply: fold_sub },
        Operation { op: BinOp::Mul, rhs: key, result: key, apply: fold_mul },
        Operation { op: BinOp::Div, rhs: key, result: key, apply: fold_div },
        Operation { op: BinOp::Mod, rhs: key, result: key, apply: fold_mod },
        Operation { op: BinOp::Lt, rhs: key, result: TypeKey::Bool, apply: fold_lt },
        Operation { op: BinOp::Le, rhs: key, result: TypeKey::Bool, apply: fold_le },
        Operation { op: BinOp::Gt, rhs: key, result: TypeKey::Bool, apply: fold_gt },
        Operation { op: BinOp::Ge, rhs: key, result: TypeKey::Bool, apply: fold_ge },
        Operation { op: BinOp::Eq, rhs: key, result: TypeKey::Bool, apply: fold_eq },
        Operation { op: BinOp::Ne, rhs: key, result: TypeKey::Bool, apply: fold_ne },
    ]
}

const fn numeric_unary(key: TypeKey) -> [UnaryOperation; 1] {
    [UnaryOperation { op: UnaryOp::Neg, result: key, apply: fold_neg }]
}

static BYTE_OPS: [Operation; 11] = numeric_ops(TypeKey::Byte);
static SHORT_OPS: [Operation; 11] = numeric_ops(TypeKey::Short);
static LONG_OPS: [Operation; 11] = numeric_ops(TypeKey::Long);
static FLOAT_OPS: [Operation; 11] = numeric_ops(TypeKey::Float);
static DOUBLE_OPS: [Operation; 11] = numeric_ops(TypeKey::Double);

static INT_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Int);
static BYTE_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Byte);
static SHORT_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Short);
static LONG_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Long);
static FLOAT_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Float);
static DOUBLE_UNARY: [UnaryOperation; 1] = numeric_unary(TypeKey::Double);

static INT_OPS: [Operation; 21] = {
    let [add, sub, mul, div, rem, lt, le, gt, ge, eq, ne] = numeric_ops(TypeKey::Int);
    [
        add, sub, mul, div, rem, lt, le, gt, ge, eq, ne,
        // ── int with string / score / range ─────────────────────
        Operation { op: BinOp::Add, rhs: TypeKey::String, result: TypeKey::String, apply: concat },
        Operation { op: BinOp::Add, rhs: TypeKey::Score, result: TypeKey::Score, apply: int_add_score },
        Operation { op: BinOp::Mul, rhs: TypeKey::Score, result: TypeKey::Score, apply: int_mul_score },
        Operation { op: BinOp::Lt, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_lt_score },
        Operation { op: BinOp::Le, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_le_score },
        Operation { op: BinOp::Gt, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_gt_score },
        Operation { op: BinOp::Ge, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_ge_score },
        Operation { op: BinOp::Eq, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_eq_score },
        Operation { op: BinOp::Ne, rhs: TypeKey::Score, result: TypeKey::Condition, apply: int_ne_score },
        Operation { op: BinOp::In, rhs: TypeKey::Range, result: TypeKey::Bool, apply: int_in_range },
    ]
};

static SCORE_OPS: [Operation; 38] = [
    // ── arithmetic into a fresh temp ────────────────────────────
    Operation { op: BinOp::Add, rhs: TypeKey::Int, result: TypeKey::Score, apply: score_add },
    Operation { op: BinOp::Add, rhs: TypeKey::Score, result: TypeKey::Score, apply: score_add },
    Operation { op: BinOp::Sub, rhs: TypeKey::Int, result: TypeKey::Score, apply: score_sub },
    Operation { op: BinOp::Sub, rhs: TypeKey::Score, result: TypeKey::Score, apply: score_sub },
    Operation { op: BinOp::Mul, rhs: TypeKey::Int, result: TypeKey::Score, apply: score_mul },
    Operation { op: BinOp::Mul, rhs: TypeKey::Score, result: TypeKey::Score, apply: score_mul },
    Operation { op: BinOp::Div, rhs: TypeKey::Int, result: TypeKey::Score, apply: score_div },
    Operation { op: BinOp::Div, rhs: TypeKey::Score, result: TypeKey::Score, apply: score_div },
    Operation { op: BinOp::Mod, rhs: TypeKey::Int, result: TypeKey::Score, apply: score_mod },
    Operation { op: BinOp::Mod, rhs: TypeKey::Score, result: TypeKey::Score, apply: score_mod },
    // ── comparisons ─────────────────────────────────────────────
    Operation { op: BinOp::Lt, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_lt },
    Operation { op: BinOp::Lt, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_lt },
    Operation { op: BinOp::Le, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_le },
    Operation { op: BinOp::Le, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_le },
    Operation { op: BinOp::Gt, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_gt },
    Operation { op: BinOp::Gt, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_gt },
    Operation { op: BinOp::Ge, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_ge },
    Operation { op: BinOp::Ge, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_ge },
    Operation { op: BinOp::Eq, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_eq },
    Operation { op: BinOp::Eq, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_eq },
    Operation { op: BinOp::Ne, rhs: TypeKey::Int, result: TypeKey::Condition, apply: score_ne },
    Operation { op: BinOp::Ne, rhs: TypeKey::Score, result: TypeKey::Condition, apply: score_ne },
    Operation { op: BinOp::In, rhs: TypeKey::Range, result: TypeKey::Condition, apply: score_in_range },
    // ── assignment (in place) ───────────────────────────────────
    Operation { op: BinOp::Assign, rhs: TypeKey::Int, result: TypeKey::Void, apply: assign },
    Operation { op: BinOp::Assign, rhs: TypeKey::Score, result: TypeKey::Void, apply: assign },
    Operation { op: BinOp::Assign, rhs: TypeKey::Bool, result: TypeKey::Void, apply: assign },
    Operation { op: BinOp::Assign, rhs: TypeKey::Condition, result: TypeKey::Void, apply: assign },
    Operation { op: BinOp::Assign, rhs: TypeKey::Data, result: TypeKey::Void, apply: assign },
    Operation { op: BinOp::AddAssign, rhs: TypeKey::Int, result: TypeKey::Void, apply: add_assign },
    Operation { op: BinOp::AddAssign, rhs: TypeKey::Score, result: TypeKey::Void, apply: add_assign },
    Operation { op: BinOp::SubAssign, rhs: TypeKey::Int, result: TypeKey::Void, apply: sub_assign },
    Operation { op: BinOp::SubAssign, rhs: TypeKey::Score, result: TypeKey::Void, apply: sub_assign },
    Operation { op: BinOp::MulAssign, rhs: TypeKey::Int, result: TypeKey::Void, apply: mul_assign },
    Operation { op: BinOp::MulAssign, rhs: TypeKey::Score, result: TypeKey::Void, apply: mul_assign },
    Operation { op: BinOp::DivAssign, rhs: TypeKey::Int, result: TypeKey::Void, apply: div_assign },
    Operation { op: BinOp::DivAssign, rhs: TypeKey::Score, result: TypeKey::Void, apply: div_assign },
    Operation { op: BinOp::ModAssign, rhs: TypeKey::Int, result: TypeKey::Void, apply: mod_assign },
    Operation { op: BinOp::ModAssign, rhs: TypeKey::Score, result: TypeKey::Void, apply: mod_assign },
];

// ── Literal folding ─────────────────────────────────────────────

/// Floor division, matching the target's integer semantics.
fn floor_div(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let q = a / b;
    Some(if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q })
}

fn floor_mod(a: i128, b: i128) -> Option<i128> {
    Some(a - b * floor_div(a, b)?)
}

fn integral(op: BinOp, a: i128, b: i128) -> Option<i128> {
    match op {
        BinOp::Add => Some(a + b),
        BinOp::Sub => Some(a - b),
        BinOp::Mul => Some(a * b),
        BinOp::Div => floor_div(a, b),
        BinOp::Mod => floor_mod(a, b),
        _ => None,
    }
}

fn floating<T>(op: BinOp, a: T, b: T) -> Option<T>
where
    T: std::ops::Add<Output = T>
        + std::ops::Sub<Output = T>
        + std::ops::Mul<Output = T>
        + std::ops::Div<Output = T>
        + std::ops::Rem<Output = T>,
{
    match op {
        BinOp::Add => Some(a + b),
        BinOp::Sub => Some(a - b),
        BinOp::Mul => Some(a * b),
        BinOp::Div => Some(a / b),
        BinOp::Mod => Some(a % b),
        _ => None,
    }
}

/// Integer results wrap to the operand width like the target's arithmetic.
pub fn fold_arithmetic(op: BinOp, left: Value, right: Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => integral(op, a.into(), b.into()).map(|v| Value::Int(v as i32)),
        (Value::Byte(a), Value::Byte(b)) => integral(op, a.into(), b.into()).map(|v| Value::Byte(v as i8)),
        (Value::Short(a), Value::Short(b)) => integral(op, a.into(), b.into()).map(|v| Value::Short(v as i16)),
        (Value::Long(a), Value::Long(b)) => integral(op, a.into(), b.into()).map(|v| Value::Long(v as i64)),
        (Value::Float(a), Value::Float(b)) => floating(op, a, b).map(Value::Float),
        (Value::Double(a), Value::Double(b)) => floating(op, a, b).map(Value::Double),
        _ => None,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Byte(a), Value::Byte(b)) => Some(a.cmp(b)),
        (Value::Short(a), Value::Short(b)) => Some(a.cmp(b)),
        (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        _ => None,
    }
}

pub fn fold_comparison(op: BinOp, left: &Value, right: &Value) -> Option<bool> {
    match op {
        BinOp::Eq => Some(left == right),
        BinOp::Ne => Some(left != right),
        BinOp::Lt => ordering(left, right).map(Ordering::is_lt),
        BinOp::Le => ordering(left, right).map(Ordering::is_le),
        BinOp::Gt => ordering(left, right).map(Ordering::is_gt),
        BinOp::Ge => ordering(left, right).map(Ordering::is_ge),
        _ => None,
    }
}

fn fold_add(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_arithmetic(BinOp::Add, l, r)
}

fn fold_sub(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_arithmetic(BinOp::Sub, l, r)
}

fn fold_mul(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_arithmetic(BinOp::Mul, l, r)
}

fn fold_div(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_arithmetic(BinOp::Div, l, r)
}

fn fold_mod(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_arithmetic(BinOp::Mod, l, r)
}

fn fold_lt(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Lt, &l, &r).map(Value::Bool)
}

fn fold_le(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Le, &l, &r).map(Value::Bool)
}

fn fold_gt(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Gt, &l, &r).map(Value::Bool)
}

fn fold_ge(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Ge, &l, &r).map(Value::Bool)
}

fn fold_eq(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Eq, &l, &r).map(Value::Bool)
}

fn fold_ne(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    fold_comparison(BinOp::Ne, &l, &r).map(Value::Bool)
}

fn fold_neg(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    Some(match v {
        Value::Int(n) => Value::Int(n.wrapping_neg()),
        Value::Byte(n) => Value::Byte(n.wrapping_neg()),
        Value::Short(n) => Value::Short(n.wrapping_neg()),
        Value::Long(n) => Value::Long(n.wrapping_neg()),
        Value::Float(n) => Value::Float(-n),
        Value::Double(n) => Value::Double(-n),
        _ => return None,
    })
}

fn not(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Bool(b) => Some(Value::Bool(!b)),
        Value::Condition(c) => Some(Value::Condition(c.negate())),
        _ => None,
    }
}

fn concat(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    Some(Value::Str(format!("{}{}", l.to_text(), r.to_text())))
}

fn bool_and(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(a && b)),
        _ => None,
    }
}

fn bool_or(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(a || b)),
        _ => None,
    }
}

fn int_in_range(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    match (l, r) {
        (Value::Int(n), Value::Range(range)) => Some(Value::Bool(range.contains(n))),
        _ => None,
    }
}

// ── Conditions ──────────────────────────────────────────────────

fn as_condition(v: Value) -> Option<Condition> {
    match v {
        Value::Condition(c) => Some(c),
        Value::Bool(b) => Some(Condition::constant(b)),
        _ => None,
    }
}

fn condition_and(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    Some(Value::Condition(as_condition(l)?.and(as_condition(r)?)))
}

fn condition_or(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    Some(Value::Condition(as_condition(l)?.or(as_condition(r)?)))
}

/// `score <op> n` as a `matches` range. Bounds that overflow make the
/// comparison unsatisfiable.
fn compare_with_int(score: Score, op: BinOp, n: i32) -> Option<Condition> {
    let range = match op {
        BinOp::Gt => n.checked_add(1).map(|m| IntRange::new(Some(m), None)),
        BinOp::Ge => Some(IntRange::new(Some(n), None)),
        BinOp::Lt => n.checked_sub(1).map(|m| IntRange::new(None, Some(m))),
        BinOp::Le => Some(IntRange::new(None, Some(n))),
        BinOp::Eq | BinOp::Ne => Some(IntRange::exactly(n)),
        _ => return None,
    };
    Some(match range {
        Some(range) => Condition::leaf(op == BinOp::Ne, Predicate::ScoreMatches { score, range }),
        None => Condition::constant(false),
    })
}

fn compare_scores(op: BinOp, left: Value, right: Value) -> Option<Value> {
    let Value::Score(score) = left else {
        return None;
    };
    let condition = match right {
        Value::Int(n) => compare_with_int(score, op, n)?,
        Value::Score(other) => {
            let compare = match op {
                BinOp::Lt => CompareOp::Lt,
                BinOp::Le => CompareOp::Le,
                BinOp::Gt => CompareOp::Gt,
                BinOp::Ge => CompareOp::Ge,
                BinOp::Eq | BinOp::Ne => CompareOp::Eq,
                _ => return None,
            };
            Condition::leaf(
                op == BinOp::Ne,
                Predicate::ScoreCompare { left: score, op: compare, right: other },
            )
        }
        _ => return None,
    };
    Some(Value::Condition(condition))
}

fn score_lt(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Lt, l, r)
}

fn score_le(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Le, l, r)
}

fn score_gt(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Gt, l, r)
}

fn score_ge(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Ge, l, r)
}

fn score_eq(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Eq, l, r)
}

fn score_ne(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Ne, l, r)
}

// `n <op> score` is `score <flipped op> n`.

fn int_lt_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Lt.flipped(), r, l)
}

fn int_le_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Le.flipped(), r, l)
}

fn int_gt_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Gt.flipped(), r, l)
}

fn int_ge_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Ge.flipped(), r, l)
}

fn int_eq_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Eq, r, l)
}

fn int_ne_score(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    compare_scores(BinOp::Ne, r, l)
}

fn score_in_range(_: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    match (l, r) {
        (Value::Score(score), Value::Range(range)) => Some(Value::Condition(Condition::leaf(
            false,
            Predicate::ScoreMatches { score, range },
        ))),
        _ => None,
    }
}

// ── Score arithmetic ────────────────────────────────────────────

fn operation_symbol(op: BinOp) -> Option<&'static str> {
    match op {
        BinOp::Add => Some("+="),
        BinOp::Sub => Some("-="),
        BinOp::Mul => Some("*="),
        BinOp::Div => Some("/="),
        BinOp::Mod => Some("%="),
        _ => None,
    }
}

/// Apply `target <op>= value` in place.
pub fn modify(ctx: &mut dyn GenContext, target: &Score, op: BinOp, value: Value) -> Option<()> {
    let symbol = operation_symbol(op)?;
    match value {
        Value::Int(n) => match op {
            BinOp::Add | BinOp::Sub if n != i32::MIN => {
                let amount = if op == BinOp::Add { n } else { -n };
                if amount >= 0 {
                    ctx.emit(format!("scoreboard players add {target} {amount}"));
                } else {
                    ctx.emit(format!("scoreboard players remove {target} {}", -amount));
                }
            }
            _ => {
                let constant = ctx.temp("const");
                ctx.emit(format!("scoreboard players set {constant} {n}"));
                ctx.emit(format!("scoreboard players operation {target} {symbol} {constant}"));
            }
        },
        Value::Score(source) => {
            ctx.emit(format!("scoreboard players operation {target} {symbol} {source}"));
        }
        _ => return None,
    }
    Some(())
}

fn arithmetic_into_temp(ctx: &mut dyn GenContext, op: BinOp, l: Value, r: Value) -> Option<Value> {
    let Value::Score(source) = l else {
        return None;
    };
    let temp = ctx.temp("expr");
    ctx.emit(format!("scoreboard players operation {temp} = {source}"));
    modify(ctx, &temp, op, r)?;
    Some(Value::Score(temp))
}

fn score_add(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Add, l, r)
}

fn score_sub(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Sub, l, r)
}

fn score_mul(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Mul, l, r)
}

fn score_div(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Div, l, r)
}

fn score_mod(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Mod, l, r)
}

fn int_add_score(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Add, r, l)
}

fn int_mul_score(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    arithmetic_into_temp(ctx, BinOp::Mul, r, l)
}

fn score_neg(ctx: &mut dyn GenContext, v: Value) -> Option<Value> {
    let Value::Score(source) = v else {
        return None;
    };
    let temp = ctx.temp("expr");
    ctx.emit(format!("scoreboard players set {temp} 0"));
    ctx.emit(format!("scoreboard players operation {temp} -= {source}"));
    Some(Value::Score(temp))
}

/// Store `value` into `target`.
pub fn store(ctx: &mut dyn GenContext, target: &Score, value: Value) -> Option<()> {
    match value {
        Value::Int(n) => ctx.emit(format!("scoreboard players set {target} {n}")),
        Value::Bool(b) => ctx.emit(format!("scoreboard players set {target} {}", i32::from(b))),
        Value::Score(source) => {
            if source != *target {
                ctx.emit(format!("scoreboard players operation {target} = {source}"));
            }
        }
        Value::Condition(c) => {
            // Through a temp: the condition may read `target`.
            let Value::Score(flag) = to_score(ctx, Value::Condition(c))? else {
                return None;
            };
            ctx.emit(format!("scoreboard players operation {target} = {flag}"));
        }
        Value::Data(path) => ctx.emit(format!(
            "execute store result score {target} run data get {path}"
        )),
        _ => return None,
    }
    Some(())
}

fn with_target(l: Value) -> Option<Score> {
    match l {
        Value::Score(s) => Some(s),
        _ => None,
    }
}

fn assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    store(ctx, &with_target(l)?, r)?;
    None
}

fn add_assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    modify(ctx, &with_target(l)?, BinOp::Add, r)?;
    None
}

fn sub_assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    modify(ctx, &with_target(l)?, BinOp::Sub, r)?;
    None
}

fn mul_assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    modify(ctx, &with_target(l)?, BinOp::Mul, r)?;
    None
}

fn div_assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    modify(ctx, &with_target(l)?, BinOp::Div, r)?;
    None
}

fn mod_assign(ctx: &mut dyn GenContext, l: Value, r: Value) -> Option<Value> {
    modify(ctx, &with_target(l)?, BinOp::Mod, r)?;
    None
}

// ── Casts ───────────────────────────────────────────────────────

fn to_int(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Byte(n) => Some(Value::Int(n.into())),
        Value::Short(n) => Some(Value::Int(n.into())),
        Value::Bool(b) => Some(Value::Int(b.into())),
        _ => None,
    }
}

fn to_long(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Int(n) => Some(Value::Long(n.into())),
        Value::Byte(n) => Some(Value::Long(n.into())),
        Value::Short(n) => Some(Value::Long(n.into())),
        _ => None,
    }
}

fn to_float(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Int(n) => Some(Value::Float(n as f32)),
        Value::Byte(n) => Some(Value::Float(n.into())),
        Value::Short(n) => Some(Value::Float(n.into())),
        _ => None,
    }
}

fn to_double(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Int(n) => Some(Value::Double(n.into())),
        Value::Float(n) => Some(Value::Double(n.into())),
        Value::Byte(n) => Some(Value::Double(n.into())),
        Value::Short(n) => Some(Value::Double(n.into())),
        Value::Long(n) => Some(Value::Double(n as f64)),
        _ => None,
    }
}

fn to_string(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Resource(r) => Some(Value::Str(r.to_string())),
        _ => None,
    }
}

fn to_range(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Int(n) => Some(Value::Range(IntRange::exactly(n))),
        _ => None,
    }
}

fn to_item(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    match v {
        Value::Resource(id) => Some(Value::Item(Item { id, nbt: None })),
        _ => None,
    }
}

fn to_condition(_: &mut dyn GenContext, v: Value) -> Option<Value> {
    let condition = match v {
        Value::Bool(b) => Condition::constant(b),
        Value::Score(score) => Condition::leaf(
            true,
            Predicate::ScoreMatches { score, range: IntRange::exactly(0) },
        ),
        Value::Selector(selector) => Condition::leaf(false, Predicate::Entity(selector)),
        Value::Data(path) => Condition::leaf(false, Predicate::Data(path)),
        _ => return None,
    };
    Some(Value::Condition(condition))
}

fn to_score(ctx: &mut dyn GenContext, v: Value) -> Option<Value> {
    let temp = match v {
        Value::Condition(c) => {
            let temp = ctx.temp("cond");
            ctx.emit(format!("scoreboard players set {temp} 0"));
            let set = format!("scoreboard players set {temp} 1");
            for line in condition::lower(&c, &set, ctx) {
                ctx.emit(line);
            }
            temp
        }
        Value::Int(_) | Value::Bool(_) | Value::Data(_) => {
            let temp = ctx.temp("const");
            store(ctx, &temp, v)?;
            temp
        }
        _ => return None,
    };
    Some(Value::Score(temp))
}

// ── Members ─────────────────────────────────────────────────────

fn objective(_: &mut dyn GenContext, v: Value, name: &str, _: Vec<Value>) -> Option<Value> {
    match v {
        Value::Selector(selector) => Some(Value::Score(Score::new(selector.to_string(), name))),
        _ => None,
    }
}

fn reset(ctx: &mut dyn GenContext, v: Value, _: &str, _: Vec<Value>) -> Option<Value> {
    if let Value::Score(score) = v {
        ctx.emit(format!("scoreboard players reset {score}"));
    }
    None
}

fn length(_: &mut dyn GenContext, v: Value, _: &str, _: Vec<Value>) -> Option<Value> {
    let len = match v {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        _ => return None,
    };
    i32::try_from(len).ok().map(Value::Int)
}

fn range_bound(_: &mut dyn GenContext, v: Value, name: &str, _: Vec<Value>) -> Option<Value> {
    let Value::Range(range) = v else {
        return None;
    };
    let bound = if name == "min" { range.min } else { range.max };
    bound.map(Value::Int)
}

fn resource_part(_: &mut dyn GenContext, v: Value, name: &str, _: Vec<Value>) -> Option<Value> {
    let Value::Resource(id) = v else {
        return None;
    };
    Some(Value::Str(if name == "namespace" { id.namespace } else { id.path }))
}
