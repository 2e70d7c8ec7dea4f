//! Command simulator.
//!
//! Executes generated command lists against an in-memory scoreboard so tests
//! can assert on behavior instead of command text. Predicates other than
//! score tests are answered by an oracle keyed by their text; every
//! evaluation is counted.

use std::collections::HashMap;

use super::condition::CompareOp;
use super::types::{IntRange, ResourceLocation, Score};
use crate::project::Project;

/// Maximum nested `function` depth.
const MAX_DEPTH: usize = 512;
/// Commands executed per run before giving up on a runaway loop.
const MAX_COMMANDS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("malformed command `{0}`")]
    Malformed(String),
    #[error("maximum call depth exceeded")]
    DepthExceeded,
    #[error("command budget exhausted")]
    Budget,
}

enum Flow {
    Continue,
    Return,
}

pub struct Vm {
    project: Project,
    scores: HashMap<(String, String), i32>,
    predicates: HashMap<String, bool>,
    data: HashMap<String, i32>,
    evaluations: HashMap<String, usize>,
    output: Vec<String>,
    executed: usize,
}

/// Split on whitespace, keeping bracketed, braced and quoted runs together.
fn words(command: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start: Option<usize> = None;
    let mut escaped = false;
    for (i, ch) in command.char_indices() {
        if quoted {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => quoted = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => {
                quoted = true;
                start.get_or_insert(i);
            }
            '[' | '{' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ']' | '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&command[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        out.push(&command[s..]);
    }
    out
}

fn parse_range(text: &str) -> Option<IntRange> {
    match text.split_once("..") {
        Some((min, max)) => {
            let bound = |s: &str| if s.is_empty() { Ok(None) } else { s.parse().map(Some) };
            Some(IntRange::new(bound(min).ok()?, bound(max).ok()?))
        }
        None => text.parse().ok().map(IntRange::exactly),
    }
}

fn floor_div(a: i32, b: i32) -> i32 {
    let q = a.wrapping_div(b);
    if (a.wrapping_rem(b) != 0) && ((a < 0) != (b < 0)) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

impl Vm {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            scores: HashMap::new(),
            predicates: HashMap::new(),
            data: HashMap::new(),
            evaluations: HashMap::new(),
            output: Vec::new(),
            executed: 0,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn score(&self, score: &Score) -> Option<i32> {
        self.get(&score.entry, &score.objective)
    }

    pub fn set_score(&mut self, score: &Score, value: i32) {
        self.set(&score.entry, &score.objective, value);
    }

    /// Answer for `entity ...` / `data ...` predicates, by exact text.
    pub fn set_predicate(&mut self, text: &str, truth: bool) {
        self.predicates.insert(text.to_string(), truth);
    }

    /// Value returned by `data get <path>`, e.g. `entity @s Health`.
    pub fn set_data(&mut self, path: &str, value: i32) {
        self.data.insert(path.to_string(), value);
    }

    /// How often the predicate with this text was tested.
    pub fn evaluations(&self, text: &str) -> usize {
        self.evaluations.get(text).copied().unwrap_or(0)
    }

    /// Commands the simulator does not model (`say`, `give`, ...), in order.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn run_function(&mut self, id: &ResourceLocation) -> Result<(), VmError> {
        self.call(id, 0)
    }

    fn get(&self, entry: &str, objective: &str) -> Option<i32> {
        self.scores.get(&(entry.to_string(), objective.to_string())).copied()
    }

    fn set(&mut self, entry: &str, objective: &str, value: i32) {
        self.scores.insert((entry.to_string(), objective.to_string()), value);
    }

    fn call(&mut self, id: &ResourceLocation, depth: usize) -> Result<(), VmError> {
        if depth > MAX_DEPTH {
            return Err(VmError::DepthExceeded);
        }
        let lines = self
            .project
            .function(id)
            .ok_or_else(|| VmError::UnknownFunction(id.to_string()))?
            .to_vec();
        for line in &lines {
            if let Flow::Return = self.execute(line, depth)? {
                break;
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: &str, depth: usize) -> Result<Flow, VmError> {
        self.executed += 1;
        if self.executed > MAX_COMMANDS {
            return Err(VmError::Budget);
        }
        let malformed = || VmError::Malformed(command.to_string());
        let parts = words(command);
        match parts.as_slice() {
            ["scoreboard", "objectives", ..] => {}
            ["scoreboard", "players", action @ ("set" | "add" | "remove"), entry, objective, value] => {
                let value: i32 = value.parse().map_err(|_| malformed())?;
                let current = self.get(entry, objective).unwrap_or(0);
                let next = match *action {
                    "set" => value,
                    "add" => current.wrapping_add(value),
                    _ => current.wrapping_sub(value),
                };
                self.set(entry, objective, next);
            }
            ["scoreboard", "players", "reset", entry, objective] => {
                self.scores.remove(&((*entry).to_string(), (*objective).to_string()));
            }
            ["scoreboard", "players", "operation", entry, objective, op, source, source_objective] => {
                self.operation(entry, objective, op, source, source_objective)
                    .ok_or_else(malformed)?;
            }
            ["function", id] => self.call(&ResourceLocation::parse(id), depth + 1)?,
            ["return", ..] => return Ok(Flow::Return),
            ["execute", rest @ ..] => return self.execute_chain(rest, command, depth),
            _ => self.output.push(command.to_string()),
        }
        Ok(Flow::Continue)
    }

    fn operation(&mut self, entry: &str, objective: &str, op: &str, source: &str, source_objective: &str) -> Option<()> {
        let a = self.get(entry, objective).unwrap_or(0);
        let b = self.get(source, source_objective).unwrap_or(0);
        let result = match op {
            "=" => b,
            "+=" => a.wrapping_add(b),
            "-=" => a.wrapping_sub(b),
            "*=" => a.wrapping_mul(b),
            // Division by zero leaves the target unchanged.
            "/=" if b == 0 => a,
            "/=" => floor_div(a, b),
            "%=" if b == 0 => a,
            "%=" => a.wrapping_sub(b.wrapping_mul(floor_div(a, b))),
            "<" => a.min(b),
            ">" => a.max(b),
            "><" => {
                self.set(source, source_objective, a);
                b
            }
            _ => return None,
        };
        self.set(entry, objective, result);
        Some(())
    }

    fn execute_chain(&mut self, parts: &[&str], command: &str, depth: usize) -> Result<Flow, VmError> {
        let malformed = || VmError::Malformed(command.to_string());
        let mut store: Option<(String, String)> = None;
        let mut i = 0;
        while let Some(&word) = parts.get(i) {
            match word {
                "if" | "unless" => {
                    let (truth, used) = self.test(parts.get(i + 1..).unwrap_or_default()).ok_or_else(malformed)?;
                    if truth != (word == "if") {
                        return Ok(Flow::Continue);
                    }
                    i += 1 + used;
                }
                "as" | "at" => i += 2,
                "store" => {
                    let target = parts.get(i + 1..i + 5).ok_or_else(malformed)?;
                    let ["result", "score", entry, objective] = target else {
                        return Err(malformed());
                    };
                    store = Some(((*entry).to_string(), (*objective).to_string()));
                    i += 5;
                }
                "run" => {
                    let rest = parts.get(i + 1..).unwrap_or_default().join(" ");
                    if let Some((entry, objective)) = store {
                        let value = self.query(&rest).ok_or_else(malformed)?;
                        self.set(&entry, &objective, value);
                        return Ok(Flow::Continue);
                    }
                    return self.execute(&rest, depth);
                }
                _ => return Err(malformed()),
            }
        }
        Err(malformed())
    }

    /// Evaluate one predicate at the start of `parts`; returns its truth and
    /// the number of words it used.
    fn test(&mut self, parts: &[&str]) -> Option<(bool, usize)> {
        let (truth, used) = match parts {
            ["score", entry, objective, "matches", range, ..] => {
                let range = parse_range(range)?;
                let truth = self.get(entry, objective).is_some_and(|v| range.contains(v));
                (truth, 5)
            }
            ["score", entry, objective, op, source, source_objective, ..] => {
                let op = match *op {
                    "<" => CompareOp::Lt,
                    "<=" => CompareOp::Le,
                    "=" => CompareOp::Eq,
                    ">=" => CompareOp::Ge,
                    ">" => CompareOp::Gt,
                    _ => return None,
                };
                let truth = match (self.get(entry, objective), self.get(source, source_objective)) {
                    (Some(a), Some(b)) => op.holds(a, b),
                    _ => false,
                };
                (truth, 6)
            }
            ["entity", _, ..] => (self.oracle(parts.get(..2)?), 2),
            ["data", "entity", _, _, ..] => (self.oracle(parts.get(..4)?), 4),
            _ => return None,
        };
        let text = parts.get(..used)?.join(" ");
        *self.evaluations.entry(text).or_insert(0) += 1;
        Some((truth, used))
    }

    fn oracle(&self, parts: &[&str]) -> bool {
        self.predicates.get(&parts.join(" ")).copied().unwrap_or(false)
    }

    /// Result of a command run under `execute store result`.
    fn query(&self, command: &str) -> Option<i32> {
        let path = command.strip_prefix("data get ")?;
        Some(self.data.get(path).copied().unwrap_or(0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(path: &str) -> ResourceLocation {
        ResourceLocation::new("t", path)
    }

    fn vm(functions: &[(&str, &[&str])]) -> Vm {
        let mut project = Project::new("t");
        for (path, lines) in functions {
            project.add_function(id(path), lines.iter().map(ToString::to_string).collect());
        }
        Vm::new(project)
    }

    fn score(entry: &str) -> Score {
        Score::new(entry, "o")
    }

    #[test]
    fn words_keep_brackets_together() {
        assert_eq!(
            words("execute as @e[type=zombie, tag=a] run say {\"a b\": 1}"),
            vec!["execute", "as", "@e[type=zombie, tag=a]", "run", "say", "{\"a b\": 1}"]
        );
    }

    #[test]
    fn scoreboard_arithmetic() {
        let mut vm = vm(&[(
            "main",
            &[
                "scoreboard players set $a o 7",
                "scoreboard players set $b o -2",
                "scoreboard players operation $a o /= $b o",
                "scoreboard players add $c o 5",
                "scoreboard players remove $c o 8",
            ],
        )]);
        vm.run_function(&id("main")).unwrap();
        assert_eq!(vm.score(&score("$a")), Some(-4));
        assert_eq!(vm.score(&score("$c")), Some(-3));
    }

    #[test]
    fn execute_guards_and_calls() {
        let mut vm = vm(&[
            (
                "main",
                &[
                    "scoreboard players set $x o 3",
                    "execute if score $x o matches 3.. run function t:inner",
                    "execute unless score $x o matches 3 run say skipped",
                    "execute if entity @s[tag=a] run say tagged",
                ],
            ),
            ("inner", &["say inner", "return 0", "say unreachable"]),
        ]);
        vm.set_predicate("entity @s[tag=a]", true);
        vm.run_function(&id("main")).unwrap();
        assert_eq!(vm.output(), ["say inner", "say tagged"]);
        assert_eq!(vm.evaluations("entity @s[tag=a]"), 1);
    }

    #[test]
    fn unset_scores_never_match() {
        let mut vm = vm(&[("main", &["execute if score $u o matches ..0 run say no"])]);
        vm.run_function(&id("main")).unwrap();
        assert!(vm.output().is_empty());
    }

    #[test]
    fn store_result_reads_data() {
        let mut vm = vm(&[("main", &["execute store result score $h o run data get entity @s Health"])]);
        vm.set_data("entity @s Health", 17);
        vm.run_function(&id("main")).unwrap();
        assert_eq!(vm.score(&score("$h")), Some(17));
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let mut vm = vm(&[("loop", &["function t:loop"])]);
        assert_eq!(vm.run_function(&id("loop")), Err(VmError::DepthExceeded));
    }

    #[test]
    fn unknown_function_is_an_error() {
        let mut vm = vm(&[("main", &["function t:missing"])]);
        assert_eq!(
            vm.run_function(&id("main")),
            Err(VmError::UnknownFunction("t:missing".into()))
        );
    }
}
