//! Boolean conditions over runtime state and their lowering to guarded
//! commands.
//!
//! The target has no boolean expressions: a command runs under
//! `execute if|unless <predicate> run ...` or not at all. Conjunctions chain
//! through synthesized command lists, disjunctions through a flag score.

use super::types::{DataPath, GenContext, IntRange, Score, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        }
    }

    pub fn holds(self, left: i32, right: i32) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ge => left >= right,
            CompareOp::Gt => left > right,
        }
    }
}

/// One `execute if` test.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    ScoreMatches { score: Score, range: IntRange },
    ScoreCompare { left: Score, op: CompareOp, right: Score },
    Entity(Selector),
    Data(DataPath),
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Const(b) => write!(f, "{b}"),
            Predicate::ScoreMatches { score, range } => write!(f, "score {score} matches {range}"),
            Predicate::ScoreCompare { left, op, right } => {
                write!(f, "score {left} {} {right}", op.symbol())
            }
            Predicate::Entity(selector) => write!(f, "entity {selector}"),
            Predicate::Data(path) => write!(f, "data {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Node { negated: bool, predicate: Predicate },
    And { negated: bool, children: Vec<Condition> },
    Or { negated: bool, children: Vec<Condition> },
}

impl Condition {
    pub fn leaf(negated: bool, predicate: Predicate) -> Self {
        Condition::Node { negated, predicate }
    }

    pub fn constant(value: bool) -> Self {
        Condition::leaf(false, Predicate::Const(value))
    }

    /// Flip the negation flag. No De Morgan expansion.
    pub fn negate(self) -> Self {
        match self {
            Condition::Node { negated, predicate } => Condition::Node { negated: !negated, predicate },
            Condition::And { negated, children } => Condition::And { negated: !negated, children },
            Condition::Or { negated, children } => Condition::Or { negated: !negated, children },
        }
    }

    /// Conjunction; non-negated `And` operands are flattened.
    pub fn and(self, other: Condition) -> Self {
        let mut children = match self {
            Condition::And { negated: false, children } => children,
            c => vec![c],
        };
        match other {
            Condition::And { negated: false, children: rest } => children.extend(rest),
            c => children.push(c),
        }
        Condition::And { negated: false, children }
    }

    /// Disjunction; non-negated `Or` operands are flattened.
    pub fn or(self, other: Condition) -> Self {
        let mut children = match self {
            Condition::Or { negated: false, children } => children,
            c => vec![c],
        };
        match other {
            Condition::Or { negated: false, children: rest } => children.extend(rest),
            c => children.push(c),
        }
        Condition::Or { negated: false, children }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (negated, children, joiner) = match self {
            Condition::Node { negated, predicate } => {
                return write!(f, "{}{predicate}", if *negated { "!" } else { "" });
            }
            Condition::And { negated, children } => (negated, children, " && "),
            Condition::Or { negated, children } => (negated, children, " || "),
        };
        let parts: Vec<String> = children.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", if *negated { "!" } else { "" }, parts.join(joiner))
    }
}

fn set(score: &Score, value: i32) -> String {
    format!("scoreboard players set {score} {value}")
}

fn guarded(score: &Score, value: i32, run: &str) -> String {
    format!("execute if score {score} matches {value} run {run}")
}

/// Lower `condition` so that `run` executes exactly once when it holds and
/// never otherwise.
pub fn lower(condition: &Condition, run: &str, ctx: &mut dyn GenContext) -> Vec<String> {
    let mut out = Vec::new();
    lower_into(condition, run, ctx, &mut out);
    out
}

fn lower_into(condition: &Condition, run: &str, ctx: &mut dyn GenContext, out: &mut Vec<String>) {
    match condition {
        Condition::Node { negated, predicate: Predicate::Const(value) } => {
            if value != negated {
                out.push(run.to_string());
            }
        }
        Condition::Node { negated, predicate } => {
            let keyword = if *negated { "unless" } else { "if" };
            out.push(format!("execute {keyword} {predicate} run {run}"));
        }
        Condition::And { negated, children } => lower_and(*negated, children, run, ctx, out),
        Condition::Or { negated, children } => {
            if children.is_empty() {
                // Empty disjunction is false.
                if *negated {
                    out.push(run.to_string());
                }
                return;
            }
            let flag = ctx.temp("or");
            out.push(set(&flag, 0));
            let raise = set(&flag, 1);
            for child in children {
                lower_into(child, &raise, ctx, out);
            }
            out.push(guarded(&flag, if *negated { 0 } else { 1 }, run));
        }
    }
}

/// The first child is tested into a flag; the rest are lowered into a
/// synthesized list that runs only when the flag is set, so later children
/// are never evaluated once one fails.
fn lower_and(
    negated: bool,
    children: &[Condition],
    run: &str,
    ctx: &mut dyn GenContext,
    out: &mut Vec<String>,
) {
    let Some((first, rest)) = children.split_first() else {
        // Empty conjunction is true.
        if !negated {
            out.push(run.to_string());
        }
        return;
    };
    let flag = ctx.temp("and");
    out.push(set(&flag, 0));
    lower_into(first, &set(&flag, 1), ctx, out);

    if rest.is_empty() {
        out.push(guarded(&flag, if negated { 0 } else { 1 }, run));
        return;
    }

    let mut nested = Vec::new();
    lower_and(negated, rest, run, ctx, &mut nested);
    if negated {
        // First child failed, so the negated conjunction holds.
        out.push(guarded(&flag, 0, run));
    }
    if !nested.is_empty() {
        let id = ctx.synthesize("and", nested);
        out.push(guarded(&flag, 1, &format!("function {id}")));
    }
}
