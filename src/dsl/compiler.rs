use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use super::ast::*;
use super::condition::{self, Condition};
use super::error::CompileError;
use super::optimize;
use super::types::{find_cast, DataPath, GenContext, IntRange, ResourceLocation, Score, TypeKey, Value};
use crate::project::{FunctionTag, Project};

/// Naming and output options for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub namespace: String,
    pub objective: String,
    /// Command list receiving top-level statements.
    pub main_function: String,
    /// Directory (inside the namespace) for synthesized command lists.
    pub generated_dir: String,
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            namespace: "datascript".to_string(),
            objective: "datascript".to_string(),
            main_function: "main".to_string(),
            generated_dir: "__generated__".to_string(),
            optimize: true,
        }
    }
}

/// Lowers checked scripts into command lists. Several scripts may be added to
/// one compiler; they share the namespace, counters and the main list.
pub struct Compiler {
    options: CompileOptions,
    project: Project,
    /// Command lists under construction, innermost last. The first frame is
    /// the main list.
    frames: Vec<Vec<String>>,
    /// Compile-time values of bindings, innermost scope last.
    scopes: Vec<HashMap<String, Value>>,
    counters: HashMap<String, u32>,
    /// Score holders already taken by `var` declarations.
    variables: HashSet<String>,
    errors: Vec<CompileError>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            project: Project::new(options.namespace.clone()),
            options,
            frames: vec![Vec::new()],
            scopes: vec![HashMap::new()],
            counters: HashMap::new(),
            variables: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Generate commands for one script; returns the errors it produced.
    pub fn add_script(&mut self, script: &Script) -> Vec<CompileError> {
        self.scopes.push(HashMap::new());
        self.compile_body(&script.body);
        self.scopes.pop();
        std::mem::take(&mut self.errors)
    }

    /// Assemble the project: main list, objective setup and tags, then the
    /// optional cleanup pass.
    pub fn finish(mut self) -> Project {
        let namespace = self.options.namespace.clone();
        let main_lines = self.frames.drain(..).next().unwrap_or_default();
        if !main_lines.is_empty() {
            let main = ResourceLocation::new(namespace.clone(), self.options.main_function.clone());
            self.project.add_function(main.clone(), main_lines);
            self.project.tag(FunctionTag::Load, main);
        }

        let init = ResourceLocation::new(namespace, format!("{}/init", self.options.generated_dir));
        self.project
            .add_function(init.clone(), vec![format!("scoreboard objectives add {} dummy", self.options.objective)]);
        self.project.tag_first(FunctionTag::Load, init);

        if self.options.optimize {
            optimize::optimize(&mut self.project, &self.options.generated_dir);
        }
        self.project.retain_tagged();
        self.project
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn next(&mut self, key: String) -> u32 {
        let counter = self.counters.entry(key).or_insert(0);
        *counter += 1;
        *counter - 1
    }

    /// Allocate the id of a synthesized list without registering it yet.
    fn reserve(&mut self, purpose: &str) -> ResourceLocation {
        let n = self.next(format!("fn:{purpose}"));
        ResourceLocation::new(
            self.options.namespace.clone(),
            format!("{}/{purpose}_{n}", self.options.generated_dir),
        )
    }

    /// Run `f` with a fresh command list and return what it emitted.
    fn capture_with<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> (Vec<String>, T) {
        self.frames.push(Vec::new());
        let out = f(self);
        (self.frames.pop().unwrap_or_default(), out)
    }

    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> Vec<String> {
        self.capture_with(f).0
    }

    /// One command stays inline; more are wrapped into a synthesized list.
    fn single_or_function(&mut self, purpose: &str, mut commands: Vec<String>) -> String {
        if commands.len() == 1 {
            if let Some(only) = commands.pop() {
                return only;
            }
        }
        let id = self.synthesize(purpose, commands);
        format!("function {id}")
    }

    fn emit_all(&mut self, commands: Vec<String>) {
        for command in commands {
            self.emit(command);
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// `$name`, or `$name_<n>` once `$name` is taken.
    fn variable_score(&mut self, name: &str) -> Score {
        let mut entry = format!("${name}");
        while self.variables.contains(&entry) {
            let n = self.next(format!("var:{name}"));
            entry = format!("${name}_{}", n + 1);
        }
        self.variables.insert(entry.clone());
        Score::new(entry, self.options.objective.clone())
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(CompileError::compiler(message, span));
    }

    // ── Statements ─────────────────────────────────────────────────

    fn compile_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.compile_stmt(stmt);
        }
    }

    fn compile_scoped(&mut self, stmt: &Stmt) {
        self.scopes.push(HashMap::new());
        self.compile_stmt(stmt);
        self.scopes.pop();
    }

    fn compile_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                if let Some(value) = self.compile_expr(value) {
                    self.bind(name, value);
                }
            }
            StmtKind::Var { name, value, operation, .. } => {
                let initial = value.as_ref().and_then(|v| self.compile_expr(v));
                let score = self.variable_score(name);
                // Without an initializer the score keeps its stored value.
                if let (Some(initial), Some(operation)) = (initial, operation) {
                    (operation.apply)(self, Value::Score(score.clone()), initial);
                }
                self.bind(name, Value::Score(score));
            }
            StmtKind::Assign { target, value, operation, .. } => {
                let Some(operation) = operation else {
                    return;
                };
                let (Some(target), Some(value)) = (self.compile_expr(target), self.compile_expr(value)) else {
                    return;
                };
                (operation.apply)(self, target, value);
            }
            StmtKind::Expr(expr) => {
                self.compile_expr(expr);
            }
            StmtKind::Block(body) => {
                self.scopes.push(HashMap::new());
                self.compile_body(body);
                self.scopes.pop();
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.compile_if(condition, then_branch, else_branch.as_deref());
            }
            StmtKind::While { condition, body } => self.compile_while(condition, body),
            StmtKind::Function { name, name_span, annotations, body } => {
                self.compile_function(name, *name_span, annotations, body);
            }
            StmtKind::Enum { .. } | StmtKind::Error => {}
            StmtKind::Context { kind, selector, body } => {
                let Some(Value::Selector(selector)) = self.compile_expr(selector) else {
                    return;
                };
                let commands = self.capture(|this| this.compile_scoped(body));
                if commands.is_empty() {
                    return;
                }
                let run = self.single_or_function(kind.keyword(), commands);
                self.emit(format!("execute {} {selector} run {run}", kind.keyword()));
            }
            StmtKind::Command(command) => self.compile_command(command),
            StmtKind::Return => self.emit("return 0".to_string()),
        }
    }

    fn compile_condition(&mut self, expr: &Expr) -> Option<Condition> {
        match self.compile_expr(expr)? {
            Value::Condition(condition) => Some(condition),
            Value::Bool(value) => Some(Condition::constant(value)),
            other => {
                let cast = find_cast(other.key(), TypeKey::Condition)?;
                match (cast.apply)(self, other)? {
                    Value::Condition(condition) => Some(condition),
                    _ => None,
                }
            }
        }
    }

    /// Lower `if`/`else` into a guarded call plus an `unless` check on a
    /// `#ranIf<n>` flag.
    ///
    /// The flag (and any `#and<n>` flags of the condition) is one global score
    /// per lowering site, not per call. A recursive call from the then branch
    /// that reaches the same site resets it, so on unwind the outer else branch
    /// runs as well. Recursion through if/else is not re-entrant.
    fn compile_if(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let Some(condition) = self.compile_condition(condition) else {
            return;
        };
        let then_commands = self.capture(|this| this.compile_scoped(then_branch));
        let Some(else_branch) = else_branch else {
            if then_commands.is_empty() {
                return;
            }
            let run = self.single_or_function("if", then_commands);
            let guarded = condition::lower(&condition, &run, self);
            self.emit_all(guarded);
            return;
        };

        // The then path raises a flag so the else path can test it afterwards.
        let ran = self.temp("ranIf");
        let else_commands = self.capture(|this| this.compile_scoped(else_branch));
        self.emit(format!("scoreboard players set {ran} 0"));
        let mut then_list = vec![format!("scoreboard players set {ran} 1")];
        then_list.extend(then_commands);
        let then_id = self.synthesize("if", then_list);
        let guarded = condition::lower(&condition, &format!("function {then_id}"), self);
        self.emit_all(guarded);
        if !else_commands.is_empty() {
            let run = self.single_or_function("else", else_commands);
            self.emit(format!("execute unless score {ran} matches 1 run {run}"));
        }
    }

    /// The loop list runs the body, then re-tests the condition and calls
    /// itself; the enclosing list runs the first test.
    fn compile_while(&mut self, condition: &Expr, body: &Stmt) {
        let id = self.reserve("while");
        let (setup, condition) = self.capture_with(|this| this.compile_condition(condition));
        let Some(condition) = condition else {
            return;
        };
        let guard = condition::lower(&condition, &format!("function {id}"), self);
        let mut lines = self.capture(|this| this.compile_scoped(body));
        lines.extend(setup.iter().cloned());
        lines.extend(guard.iter().cloned());
        debug!(id = %id, commands = lines.len(), "Synthesized loop");
        self.project.add_function(id, lines);
        self.emit_all(setup);
        self.emit_all(guard);
    }

    fn compile_function(&mut self, name: &str, name_span: Span, annotations: &[Annotation], body: &[Stmt]) {
        if name == self.options.main_function {
            self.error(format!("`{name}` is reserved for top-level statements"), name_span);
            return;
        }
        let id = ResourceLocation::new(self.options.namespace.clone(), name);
        let lines = self.capture(|this| {
            this.scopes.push(HashMap::new());
            this.compile_body(body);
            this.scopes.pop();
        });
        debug!(function = %id, commands = lines.len(), "Compiled function");
        self.project.add_function(id.clone(), lines);
        for annotation in annotations {
            if let Some(tag) = FunctionTag::from_annotation(&annotation.name) {
                self.project.tag(tag, id.clone());
            }
        }
    }

    // ── Commands ───────────────────────────────────────────────────

    fn selector(&mut self, expr: &Expr) -> Option<String> {
        match self.compile_expr(expr)? {
            Value::Selector(selector) => Some(selector.to_string()),
            _ => None,
        }
    }

    /// A value known at compile time, or an error at `span`.
    fn constant(&mut self, expr: &Expr, what: &str) -> Option<Value> {
        let value = self.compile_expr(expr)?;
        if is_runtime(&value) {
            self.error(format!("{what} must be known at compile time"), expr.span);
            return None;
        }
        Some(value)
    }

    fn compile_command(&mut self, command: &Command) {
        match command {
            Command::Say(message) => {
                if let Some(value) = self.constant(message, "`say` text") {
                    self.emit(format!("say {}", value.to_text()));
                }
            }
            Command::Tellraw { target, parts } => {
                let Some(target) = self.selector(target) else {
                    return;
                };
                let mut components = vec![json!("")];
                for part in parts {
                    if let Some(value) = self.compile_expr(part) {
                        if let Some(component) = self.text_component(value) {
                            components.push(component);
                        }
                    }
                }
                self.emit(format!("tellraw {target} {}", serde_json::Value::Array(components)));
            }
            Command::Give { target, item, count } => {
                let Some(target) = self.selector(target) else {
                    return;
                };
                let Some(item) = self.constant(item, "Item") else {
                    return;
                };
                let count = match count {
                    Some(count) => match self.constant(count, "Item count") {
                        Some(count) => format!(" {}", count.to_command_string()),
                        None => return,
                    },
                    None => String::new(),
                };
                self.emit(format!("give {target} {}{count}", item.to_command_string()));
            }
            Command::Tag { target, add, name } => {
                if let Some(target) = self.selector(target) {
                    let action = if *add { "add" } else { "remove" };
                    self.emit(format!("tag {target} {action} {name}"));
                }
            }
            Command::Kill(target) => match target {
                Some(target) => {
                    if let Some(target) = self.selector(target) {
                        self.emit(format!("kill {target}"));
                    }
                }
                None => self.emit("kill".to_string()),
            },
            Command::Summon { entity, data } => {
                let Some(entity) = self.constant(entity, "Entity") else {
                    return;
                };
                match data {
                    Some(data) => {
                        if let Some(data) = self.constant(data, "Entity data") {
                            self.emit(format!(
                                "summon {} ~ ~ ~ {}",
                                entity.to_command_string(),
                                data.to_command_string()
                            ));
                        }
                    }
                    None => self.emit(format!("summon {}", entity.to_command_string())),
                }
            }
            Command::Raw(text) => {
                if let Some(Value::Str(text)) = self.constant(text, "`cmd` text") {
                    self.emit(text);
                }
            }
        }
    }

    /// One element of a `tellraw` component array.
    fn text_component(&mut self, value: Value) -> Option<serde_json::Value> {
        Some(match value {
            Value::Score(score) => json!({"score": {"name": score.entry, "objective": score.objective}}),
            Value::Selector(selector) => json!({"selector": selector.to_string()}),
            Value::Data(path) => json!({"nbt": path.path, "entity": path.target.to_string()}),
            Value::Condition(_) => {
                let cast = find_cast(TypeKey::Condition, TypeKey::Score)?;
                let score = (cast.apply)(self, value)?;
                return self.text_component(score);
            }
            other => json!({"text": other.to_text()}),
        })
    }

    // ── Expressions ────────────────────────────────────────────────

    /// Lower an expression. `None` when it has no value: a call, a node that
    /// failed to resolve, or an operation with no result.
    fn compile_expr(&mut self, expr: &Expr) -> Option<Value> {
        match &expr.kind {
            ExprKind::Literal(value) => Some(value.clone()),
            ExprKind::Ident(name) => self.lookup(name).cloned(),
            ExprKind::Binary { left, right, operation, .. } => {
                let operation = (*operation)?;
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                (operation.apply)(self, left, right)
            }
            ExprKind::Unary { operand, operation, .. } => {
                let operation = (*operation)?;
                let operand = self.compile_expr(operand)?;
                (operation.apply)(self, operand)
            }
            ExprKind::Cast { expr, cast } => {
                let value = self.compile_expr(expr)?;
                (cast.apply)(self, value)
            }
            ExprKind::Range { min, max } => {
                let mut bound = |e: &Option<Box<Expr>>| match e {
                    None => Some(None),
                    Some(e) => match self.compile_expr(e)? {
                        Value::Int(n) => Some(Some(n)),
                        _ => None,
                    },
                };
                let min = bound(min)?;
                let max = bound(max)?;
                Some(Value::Range(IntRange::new(min, max)))
            }
            ExprKind::List(items) => items
                .iter()
                .map(|item| self.compile_expr(item))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            ExprKind::Compound(entries) => entries
                .iter()
                .map(|(key, value)| Some((key.clone(), self.compile_expr(value)?)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Value::Compound),
            ExprKind::Member { object, name, member, args } => {
                let object = self.compile_expr(object)?;
                let args = args
                    .iter()
                    .map(|arg| self.compile_expr(arg))
                    .collect::<Option<Vec<_>>>()?;
                (member.apply)(self, object, name, args)
            }
            ExprKind::DataPath { object, path } => match self.compile_expr(object)? {
                Value::Selector(target) => Some(Value::Data(DataPath {
                    target,
                    path: path.clone(),
                })),
                _ => None,
            },
            ExprKind::EnumVariant { enum_name, variant } => Some(Value::Enum {
                name: enum_name.clone(),
                variant: variant.clone(),
            }),
            ExprKind::Call(target) => {
                let id = match target {
                    CallTarget::Local(name) => ResourceLocation::new(self.options.namespace.clone(), name.clone()),
                    CallTarget::External(id) => id.clone(),
                };
                self.emit(format!("function {id}"));
                None
            }
            ExprKind::Error => None,
        }
    }
}

/// Values that only exist while the commands run.
fn is_runtime(value: &Value) -> bool {
    match value {
        Value::Score(_) | Value::Condition(_) | Value::Data(_) => true,
        Value::List(items) => items.iter().any(is_runtime),
        Value::Compound(entries) => entries.values().any(is_runtime),
        _ => false,
    }
}

impl GenContext for Compiler {
    fn objective(&self) -> &str {
        &self.options.objective
    }

    fn emit(&mut self, command: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(command);
        }
    }

    fn temp(&mut self, purpose: &str) -> Score {
        let n = self.next(format!("temp:{purpose}"));
        Score::new(format!("#{purpose}{n}"), self.options.objective.clone())
    }

    fn synthesize(&mut self, purpose: &str, commands: Vec<String>) -> ResourceLocation {
        let id = self.reserve(purpose);
        debug!(id = %id, commands = commands.len(), "Synthesized command list");
        self.project.add_function(id.clone(), commands);
        id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::builtins::fold_arithmetic;
    use crate::dsl::error::Diagnostics;
    use crate::dsl::lexer::lex;
    use crate::dsl::lookup::NoLookup;
    use crate::dsl::parser::parse;
    use crate::dsl::semantic;
    use crate::dsl::vm::Vm;

    fn options(optimize: bool) -> CompileOptions {
        CompileOptions {
            namespace: "ds".into(),
            objective: "obj".into(),
            optimize,
            ..CompileOptions::default()
        }
    }

    fn compile_with(src: &str, options: CompileOptions) -> (Project, Vec<CompileError>) {
        let (tokens, lex_errors) = lex(src);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        let mut diagnostics = Diagnostics::default();
        let script = parse(tokens, &mut diagnostics);
        diagnostics.extend(semantic::check(&script, &NoLookup));
        assert!(!diagnostics.has_errors(), "front-end errors: {:?}", diagnostics.errors);
        let mut compiler = Compiler::new(options);
        let errors = compiler.add_script(&script);
        (compiler.finish(), errors)
    }

    fn build(src: &str) -> Project {
        let (project, errors) = compile_with(src, options(true));
        assert!(errors.is_empty(), "compile errors: {errors:?}");
        project
    }

    fn id(path: &str) -> ResourceLocation {
        ResourceLocation::new("ds", path)
    }

    fn lines(project: &Project, path: &str) -> Vec<String> {
        project.function(&id(path)).unwrap().to_vec()
    }

    /// Run the load tag in order, like the target does on startup.
    fn boot(project: Project) -> Vm {
        let load: Vec<ResourceLocation> = project.tagged(FunctionTag::Load).to_vec();
        let mut vm = Vm::new(project);
        for function in &load {
            vm.run_function(function).unwrap();
        }
        vm
    }

    fn var(vm: &Vm, name: &str) -> Option<i32> {
        vm.score(&Score::new(format!("${name}"), "obj"))
    }

    #[test]
    fn if_else_scenario() {
        let src = "var score = 7\nif (score > 5 && score < 10) { say \"mid\" } else { say \"other\" }";
        let project = build(src);
        let main = lines(&project, "main");
        assert_eq!(
            main,
            vec![
                "scoreboard players set $score obj 7",
                "scoreboard players set #ranIf0 obj 0",
                "scoreboard players set #and0 obj 0",
                "execute if score $score obj matches 6.. run scoreboard players set #and0 obj 1",
                "execute if score #and0 obj matches 1 run function ds:__generated__/and_0",
                "execute unless score #ranIf0 obj matches 1 run say other",
            ]
        );
        assert_eq!(
            lines(&project, "__generated__/and_0"),
            vec![
                "scoreboard players set #and1 obj 0",
                "execute if score $score obj matches ..9 run scoreboard players set #and1 obj 1",
                "execute if score #and1 obj matches 1 run function ds:__generated__/if_0",
            ]
        );
        assert_eq!(
            lines(&project, "__generated__/if_0"),
            vec!["scoreboard players set #ranIf0 obj 1", "say mid"]
        );

        let vm = boot(project);
        assert_eq!(vm.output(), ["say mid"]);
        let vm = boot(build(&src.replace("= 7", "= 12")));
        assert_eq!(vm.output(), ["say other"]);
    }

    #[test]
    fn score_arithmetic_matches_folding() {
        let pairs = [(7, 3), (-7, 2), (7, -2), (0, 5), (-9, -4), (123, 10)];
        for (op, symbol) in [
            (BinOp::Add, "+"),
            (BinOp::Sub, "-"),
            (BinOp::Mul, "*"),
            (BinOp::Div, "/"),
            (BinOp::Mod, "%"),
        ] {
            for (a, b) in pairs {
                let src = format!(
                    "var x = {a}\nvar y = {b}\nvar by_score = x {symbol} y\nvar by_const = x {symbol} {b}\nvar z = {a}\nz {symbol}= {b}"
                );
                let vm = boot(build(&src));
                let expected = match fold_arithmetic(op, Value::Int(a), Value::Int(b)).unwrap() {
                    Value::Int(n) => n,
                    other => unreachable!("{other:?}"),
                };
                assert_eq!(var(&vm, "by_score"), Some(expected), "{a} {symbol} {b}");
                assert_eq!(var(&vm, "by_const"), Some(expected), "{a} {symbol} {b} (constant)");
                assert_eq!(var(&vm, "z"), Some(expected), "{a} {symbol}= {b}");
            }
        }
    }

    #[test]
    fn while_loop_runs_to_completion() {
        let vm = boot(build("var i = 0\nvar total = 0\nwhile i < 5 {\n  total += i\n  i += 1\n}"));
        assert_eq!(var(&vm, "i"), Some(5));
        assert_eq!(var(&vm, "total"), Some(10));
    }

    #[test]
    fn while_with_false_condition_never_runs() {
        let project = build("var i = 9\nwhile i < 5 { say \"never\" }");
        let vm = boot(project);
        assert!(vm.output().is_empty());
    }

    #[test]
    fn functions_calls_and_tags() {
        let src = "@tick\nfunction beat { say \"b\" }\n@load\nfunction setup { helper() }\nfunction helper { say \"h\" }\nhelper()\nhelper()";
        let project = build(src);
        assert_eq!(project.tagged(FunctionTag::Tick), [id("beat")]);
        assert_eq!(
            project.tagged(FunctionTag::Load),
            [id("__generated__/init"), id("setup"), id("main")]
        );
        assert_eq!(lines(&project, "__generated__/init"), ["scoreboard objectives add obj dummy"]);
        let vm = boot(project);
        assert_eq!(vm.output(), ["say h", "say h", "say h"]);
    }

    #[test]
    fn return_stops_the_function() {
        let vm = boot(build("function f {\n  say \"a\"\n  return\n  say \"b\"\n}\nf()"));
        assert_eq!(vm.output(), ["say a"]);
    }

    #[test]
    fn context_blocks() {
        let project = build("as @a { say \"x\" }\nat @s {\n  say \"y\"\n  say \"z\"\n}");
        assert_eq!(
            lines(&project, "main"),
            ["execute as @a run say x", "execute at @s run function ds:__generated__/at_0"]
        );
        assert_eq!(lines(&project, "__generated__/at_0"), ["say y", "say z"]);
    }

    #[test]
    fn commands_render() {
        let src = "give @s minecraft:diamond 2\nsummon minecraft:zombie {NoAI: 1b}\nkill @e[type=zombie]\ntag @s add seen\ncmd \"time set day\"\nkill";
        assert_eq!(
            lines(&build(src), "main"),
            [
                "give @s minecraft:diamond 2",
                "summon minecraft:zombie ~ ~ ~ {NoAI: 1b}",
                "kill @e[type=zombie]",
                "tag @s add seen",
                "time set day",
                "kill",
            ]
        );
    }

    #[test]
    fn tellraw_mixes_text_and_scores() {
        let project = build("var k = 3\ntellraw @a \"k = \", k");
        assert_eq!(
            lines(&project, "main").last().unwrap(),
            r#"tellraw @a ["",{"text":"k = "},{"score":{"name":"$k","objective":"obj"}}]"#
        );
    }

    #[test]
    fn say_needs_a_constant() {
        let (_, errors) = compile_with("var k = 1\nsay k", options(true));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().message, "`say` text must be known at compile time");
    }

    #[test]
    fn data_paths_store_into_scores() {
        let project = build("var hp = @s/Health");
        assert_eq!(
            lines(&project, "main"),
            ["execute store result score $hp obj run data get entity @s Health"]
        );
        let load: Vec<ResourceLocation> = project.tagged(FunctionTag::Load).to_vec();
        let mut vm = Vm::new(project);
        vm.set_data("entity @s Health", 20);
        for function in &load {
            vm.run_function(function).unwrap();
        }
        assert_eq!(var(&vm, "hp"), Some(20));
    }

    #[test]
    fn shadowed_variables_get_their_own_score() {
        let vm = boot(build("var k = 1\nif true { var k = 2 }"));
        assert_eq!(var(&vm, "k"), Some(1));
        assert_eq!(vm.score(&Score::new("$k_1", "obj")), Some(2));
    }

    #[test]
    fn nested_conditions_use_unique_names() {
        let project = build(
            "var k = 3\nif k > 1 && k < 5 {\n  if k > 2 && k < 4 { say \"a\" }\n  say \"b\"\n}",
        );
        let ids: Vec<String> = project.functions().map(|(id, _)| id.to_string()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        let all: Vec<String> = project.functions().flat_map(|(_, l)| l.clone()).collect();
        assert!(all.iter().any(|l| l.contains("#and0")));
        assert!(all.iter().any(|l| l.contains("#and2")));
        assert_eq!(boot(project).output(), ["say a", "say b"]);
    }

    #[test]
    fn main_name_is_reserved() {
        let (_, errors) = compile_with("function main { }", options(true));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unreachable_loops_are_removed() {
        let src = "var k = 0\nwhile false { say \"never\" }";
        let (unoptimized, _) = compile_with(src, options(false));
        assert_eq!(lines(&unoptimized, "__generated__/while_0"), ["say never"]);
        let optimized = build(src);
        assert!(optimized.function(&id("__generated__/while_0")).is_none());
        assert_eq!(lines(&optimized, "main"), ["scoreboard players set $k obj 0"]);
    }

    #[test]
    fn unresolved_nodes_are_skipped_and_the_rest_compiles() {
        let src = "say \"a\"\nmissing += 1\nvar n = nope + 1\nif ghost > 2 { say \"never\" }\nsay \"z\"";
        let mut diagnostics = Diagnostics::default();
        let script = parse(lex(src).0, &mut diagnostics);
        diagnostics.extend(semantic::check(&script, &NoLookup));
        assert!(diagnostics.has_errors());

        let mut compiler = Compiler::new(options(true));
        compiler.add_script(&script);
        let project = compiler.finish();
        let main = lines(&project, "main");
        assert_eq!(main.first().map(String::as_str), Some("say a"));
        assert_eq!(main.last().map(String::as_str), Some("say z"));
        assert!(project.functions().all(|(_, l)| l.iter().all(|c| !c.contains("never"))));
    }
}
