use std::collections::HashMap;

use indexmap::IndexMap;

use super::ast::*;
use super::builtins;
use super::error::{CompileError, DiagnosticSink, Diagnostics};
use super::lookup::{DataLookup, ENTITY_REGISTRY};
use super::types::{accepts, ResourceLocation, TypeKey, Value};
use crate::project::FunctionTag;

/// Validate references, uniqueness and type compatibility. Pure: the tree is
/// not modified and the same tree always yields the same diagnostics.
pub fn check(script: &Script, lookup: &dyn DataLookup) -> Diagnostics {
    let mut ctx = SemanticContext::new(lookup);
    ctx.check(script);
    ctx.diagnostics
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalKind {
    Function,
    Enum,
}

impl GlobalKind {
    fn label(self) -> &'static str {
        match self {
            GlobalKind::Function => "a function",
            GlobalKind::Enum => "an enum",
        }
    }
}

struct SemanticContext<'a> {
    lookup: &'a dyn DataLookup,
    /// Variables declared per scope, innermost last.
    scopes: Vec<Vec<String>>,
    /// Functions and enums share one namespace.
    globals: HashMap<String, GlobalKind>,
    enums: IndexMap<String, Vec<String>>,
    in_function: bool,
    diagnostics: Diagnostics,
}

impl<'a> SemanticContext<'a> {
    fn new(lookup: &'a dyn DataLookup) -> Self {
        Self {
            lookup,
            scopes: vec![Vec::new()],
            globals: HashMap::new(),
            enums: IndexMap::new(),
            in_function: false,
            diagnostics: Diagnostics::default(),
        }
    }

    fn report(&mut self, error: CompileError) {
        self.diagnostics.report(error);
    }

    fn check(&mut self, script: &Script) {
        // Functions and enums are visible before their declaration.
        for stmt in &script.body {
            let (name, name_span, kind) = match &stmt.kind {
                StmtKind::Function { name, name_span, .. } => (name, *name_span, GlobalKind::Function),
                StmtKind::Enum { name, name_span, variants } => {
                    self.enums.entry(name.clone()).or_insert_with(|| variants.clone());
                    (name, *name_span, GlobalKind::Enum)
                }
                _ => continue,
            };
            if let Some(existing) = self.globals.get(name) {
                let message = format!("`{name}` is already declared as {}", existing.label());
                self.report(CompileError::semantic(message, name_span));
            } else {
                self.globals.insert(name.clone(), kind);
            }
        }

        for stmt in &script.body {
            self.check_stmt(stmt);
        }
    }

    // ── Scopes ─────────────────────────────────────────────────────

    fn declare(&mut self, name: &str, span: Span) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.iter().any(|n| n == name) {
            self.report(CompileError::semantic(
                format!("Variable `{name}` is already declared in this scope"),
                span,
            ));
        } else {
            scope.push(name.to_string());
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.iter().any(|n| n == name))
    }

    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.scopes.iter().rev().flat_map(|scope| scope.iter().rev()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(Vec::new());
        f(self);
        self.scopes.pop();
    }

    // ── Statements ─────────────────────────────────────────────────

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, name_span, value } => {
                self.check_expr(value);
                self.declare(name, *name_span);
            }
            StmtKind::Var { name, name_span, value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
                self.declare(name, *name_span);
            }
            StmtKind::Assign { target, value, .. } => {
                self.check_expr(target);
                self.check_expr(value);
                if !target.is_error() && target.ty.key != TypeKey::Score {
                    self.report(CompileError::semantic(
                        format!("Cannot assign to `{}`; only scores are assignable", target.ty),
                        target.span,
                    ));
                }
            }
            StmtKind::Expr(expr) => self.check_expr(expr),
            StmtKind::Block(body) => self.scoped(|this| this.check_body(body)),
            StmtKind::If { condition, then_branch, else_branch } => {
                self.check_condition(condition);
                self.scoped(|this| this.check_stmt(then_branch));
                if let Some(else_branch) = else_branch {
                    self.scoped(|this| this.check_stmt(else_branch));
                }
            }
            StmtKind::While { condition, body } => {
                self.check_condition(condition);
                self.scoped(|this| this.check_stmt(body));
            }
            StmtKind::Function { annotations, body, .. } => {
                for annotation in annotations {
                    if FunctionTag::from_annotation(&annotation.name).is_none() {
                        self.report(CompileError::semantic(
                            format!("Unknown annotation `@{}`", annotation.name),
                            annotation.span,
                        ));
                        let tags = [FunctionTag::Load, FunctionTag::Tick];
                        self.diagnostics
                            .suggest(annotation.span, tags.iter().map(|t| t.name().to_string()).collect());
                    }
                }
                self.in_function = true;
                self.scoped(|this| this.check_body(body));
                self.in_function = false;
            }
            StmtKind::Enum { .. } | StmtKind::Error => {}
            StmtKind::Context { selector, body, .. } => {
                self.check_expr(selector);
                self.scoped(|this| this.check_stmt(body));
            }
            StmtKind::Command(command) => self.check_command(command),
            StmtKind::Return => {
                if !self.in_function {
                    self.report(CompileError::semantic("`return` outside a function", stmt.span));
                }
            }
        }
    }

    fn check_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.check_stmt(stmt);
        }
    }

    fn check_condition(&mut self, condition: &Expr) {
        self.check_expr(condition);
        if !condition.is_error() && condition.ty.key != TypeKey::Condition {
            self.report(CompileError::semantic(
                format!("Expected a condition, found `{}`", condition.ty),
                condition.span,
            ));
        }
    }

    fn check_command(&mut self, command: &Command) {
        match command {
            Command::Say(message) | Command::Raw(message) => self.check_expr(message),
            Command::Tellraw { target, parts } => {
                self.check_expr(target);
                for part in parts {
                    self.check_expr(part);
                }
            }
            Command::Give { target, item, count } => {
                self.check_expr(target);
                self.check_expr(item);
                if let Some(count) = count {
                    self.check_expr(count);
                }
            }
            Command::Tag { target, .. } => self.check_expr(target),
            Command::Kill(target) => {
                if let Some(target) = target {
                    self.check_expr(target);
                }
            }
            Command::Summon { entity, data } => {
                let data = data.as_ref();
                self.check_expr(entity);
                if let Some(data) = data {
                    self.check_expr(data);
                }
                if let Some(id) = resource_of(entity) {
                    self.check_id(ENTITY_REGISTRY, "entity", &id, entity.span);
                    if let Some(ExprKind::Compound(entries)) = data.map(|d| &strip_casts(d).kind) {
                        let keys = entries.iter().map(|(k, v)| (k.as_str(), v.ty.key)).collect();
                        self.check_compound(ENTITY_REGISTRY, &id, keys, data.map_or(entity.span, |d| d.span));
                    }
                }
            }
        }
    }

    // ── Expressions ────────────────────────────────────────────────

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if !self.is_declared(name) {
                    self.report(CompileError::semantic(format!("Unknown variable `{name}`"), expr.span));
                    let names = self.visible_names();
                    self.diagnostics.suggest(expr.span, names);
                }
            }
            ExprKind::Call(CallTarget::Local(name)) => {
                if self.globals.get(name) != Some(&GlobalKind::Function) {
                    self.report(CompileError::semantic(format!("Unknown function `{name}`"), expr.span));
                    let mut functions: Vec<String> = self
                        .globals
                        .iter()
                        .filter(|(_, kind)| **kind == GlobalKind::Function)
                        .map(|(name, _)| name.clone())
                        .collect();
                    functions.sort();
                    self.diagnostics.suggest(expr.span, functions);
                }
            }
            ExprKind::Call(CallTarget::External(_)) | ExprKind::Error => {}
            ExprKind::EnumVariant { enum_name, variant } => match self.enums.get(enum_name) {
                None => {
                    self.report(CompileError::semantic(format!("Unknown enum `{enum_name}`"), expr.span));
                    let names = self.enums.keys().cloned().collect();
                    self.diagnostics.suggest(expr.span, names);
                }
                Some(variants) if !variants.contains(variant) => {
                    let candidates = variants.clone();
                    self.report(CompileError::semantic(
                        format!("Enum `{enum_name}` has no variant `{variant}`"),
                        expr.span,
                    ));
                    self.diagnostics.suggest(expr.span, candidates);
                }
                Some(_) => {}
            },
            ExprKind::Literal(Value::Item(item)) => self.check_item(&item.id, item.nbt.as_ref(), expr.span),
            ExprKind::Literal(_) => {}
            ExprKind::Binary { left, right, .. } => {
                self.check_expr(left);
                self.check_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand),
            ExprKind::Cast { expr: inner, cast } => {
                self.check_expr(inner);
                if cast.to == TypeKey::Item {
                    if let ExprKind::Literal(Value::Resource(id)) = &inner.kind {
                        self.check_item(id, None, inner.span);
                    }
                }
            }
            ExprKind::Range { min, max } => {
                for bound in [min, max].into_iter().flatten() {
                    self.check_expr(bound);
                }
            }
            ExprKind::List(items) => {
                for item in items {
                    self.check_expr(item);
                }
            }
            ExprKind::Compound(entries) => {
                for (_, value) in entries {
                    self.check_expr(value);
                }
            }
            ExprKind::Member { object, args, .. } => {
                self.check_expr(object);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::DataPath { object, .. } => self.check_expr(object),
        }
    }

    // ── Registry checks (warnings) ─────────────────────────────────

    fn check_item(&mut self, id: &ResourceLocation, nbt: Option<&IndexMap<String, Value>>, span: Span) {
        let Some(registry) = builtins::descriptor(TypeKey::Item).schema else {
            return;
        };
        self.check_id(registry, "item", id, span);
        if let Some(nbt) = nbt {
            let keys = nbt.iter().map(|(k, v)| (k.as_str(), v.key())).collect();
            self.check_compound(registry, id, keys, span);
        }
    }

    fn check_id(&mut self, registry: &str, what: &str, id: &ResourceLocation, span: Span) {
        if self.lookup.has_entry(registry, id) == Some(false) {
            self.report(CompileError::semantic(format!("Unknown {what} `{id}`"), span).warning());
            let candidates = self.lookup.keys_of(registry);
            self.diagnostics.suggest(span, candidates);
        }
    }

    fn check_compound(&mut self, registry: &str, id: &ResourceLocation, entries: Vec<(&str, TypeKey)>, span: Span) {
        let Some(schema) = self.lookup.schema_of(registry, id) else {
            return;
        };
        for (key, actual) in entries {
            match schema.get(key) {
                None => {
                    self.report(CompileError::semantic(format!("Unknown key `{key}` for `{id}`"), span).warning());
                    self.diagnostics.suggest(span, schema.keys().cloned().collect());
                }
                Some(expected) if actual != TypeKey::Error && !accepts(*expected, actual) => {
                    self.report(
                        CompileError::semantic(
                            format!("Key `{key}` of `{id}` expects `{expected}`, found `{actual}`"),
                            span,
                        )
                        .warning(),
                    );
                }
                Some(_) => {}
            }
        }
    }
}

fn strip_casts(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Cast { expr, .. } => strip_casts(expr),
        _ => expr,
    }
}

/// The id of a constant resource or item expression.
fn resource_of(expr: &Expr) -> Option<ResourceLocation> {
    match &strip_casts(expr).kind {
        ExprKind::Literal(Value::Resource(id)) => Some(id.clone()),
        ExprKind::Literal(Value::Item(item)) => Some(item.id.clone()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::error::Severity;
    use crate::dsl::lexer::lex;
    use crate::dsl::lookup::{NoLookup, StaticRegistry};
    use crate::dsl::parser::parse;

    fn registry() -> StaticRegistry {
        serde_json::from_str(
            r#"{
                "entries": {"item": ["diamond", "stick"], "entity_type": ["zombie"]},
                "schemas": {"entity_type": {"zombie": {"NoAI": "byte"}}}
            }"#,
        )
        .unwrap()
    }

    fn script(src: &str) -> Script {
        let (tokens, lex_errors) = lex(src);
        assert!(lex_errors.is_empty());
        let mut parse_errors = Diagnostics::default();
        let script = parse(tokens, &mut parse_errors);
        assert!(parse_errors.errors.is_empty(), "parse errors: {:?}", parse_errors.errors);
        script
    }

    fn messages(src: &str) -> Vec<String> {
        check(&script(src), &NoLookup)
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn valid_program_is_clean() {
        let src = "enum Mode { On, Off }\nvar k = 0\nfunction tick_fn {\n  if k > 3 { k = 0 } else { k += 1 }\n  helper()\n  return\n}\nfunction helper { say \"hi\" }\nlet m = Mode.On";
        assert!(messages(src).is_empty());
    }

    #[test]
    fn unknown_variable_suggests_visible_names() {
        let diagnostics = check(&script("var kills = 0\nsay kils"), &NoLookup);
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].message, "Unknown variable `kils`");
        let span = diagnostics.errors[0].span;
        let suggestion = diagnostics.suggestions.iter().find(|s| s.span == span).unwrap();
        assert_eq!(suggestion.candidates, vec!["kills"]);
    }

    #[test]
    fn block_variables_do_not_escape() {
        assert_eq!(messages("if true { var a = 1 }\nsay a"), vec!["Unknown variable `a`"]);
    }

    #[test]
    fn duplicates_in_one_scope_only() {
        assert_eq!(
            messages("var a = 1\nvar a = 2"),
            vec!["Variable `a` is already declared in this scope"]
        );
        assert!(messages("var a = 1\nif true { var a = 2 }").is_empty());
    }

    #[test]
    fn global_names_are_unique() {
        assert_eq!(
            messages("function f { }\nfunction f { }"),
            vec!["`f` is already declared as a function"]
        );
        assert_eq!(messages("enum f { A }\nfunction f { }"), vec!["`f` is already declared as an enum"]);
    }

    #[test]
    fn calls_resolve_against_declared_functions() {
        assert!(messages("helper()\nfunction helper { }").is_empty());
        assert_eq!(messages("missing()"), vec!["Unknown function `missing`"]);
    }

    #[test]
    fn enums_and_variants() {
        assert_eq!(
            messages("enum Mode { A }\nlet m = Mode.B"),
            vec!["Enum `Mode` has no variant `B`"]
        );
        assert_eq!(messages("let c = Color.Red"), vec!["Unknown enum `Color`"]);
    }

    #[test]
    fn only_scores_are_assignable() {
        assert_eq!(
            messages("let x = 1\nx = 2"),
            vec!["Cannot assign to `int`; only scores are assignable"]
        );
    }

    #[test]
    fn conditions_must_be_castable() {
        assert_eq!(messages("if \"yes\" { }"), vec!["Expected a condition, found `string`"]);
        assert_eq!(messages("while 3 { }"), vec!["Expected a condition, found `int`"]);
    }

    #[test]
    fn return_needs_a_function() {
        assert_eq!(messages("return"), vec!["`return` outside a function"]);
    }

    #[test]
    fn unknown_annotation() {
        assert_eq!(messages("@every\nfunction f { }"), vec!["Unknown annotation `@every`"]);
    }

    #[test]
    fn registry_problems_are_warnings() {
        let src = "give @s minecraft:gem\nsummon minecraft:zombie {NoAI: 1, Speed: 1b}\ngive @s minecraft:diamond";
        let diagnostics = check(&script(src), &registry());
        assert!(!diagnostics.has_errors());
        let messages: Vec<&str> = diagnostics.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "Unknown item `minecraft:gem`",
                "Key `NoAI` of `minecraft:zombie` expects `byte`, found `int`",
                "Unknown key `Speed` for `minecraft:zombie`",
            ]
        );
        assert!(diagnostics.errors.iter().all(|e| e.severity == Severity::Warning));
        let gem = diagnostics.errors[0].span;
        let suggestion = diagnostics.suggestions.iter().find(|s| s.span == gem).unwrap();
        assert_eq!(suggestion.candidates, vec!["diamond", "stick"]);
    }

    #[test]
    fn checking_is_idempotent() {
        let tree = script("say nope\nfunction f { }\nfunction f { }\nreturn");
        let first = check(&tree, &registry());
        let second = check(&tree, &registry());
        assert_eq!(first, second);
        assert_eq!(first.errors.len(), 3);
    }
}
