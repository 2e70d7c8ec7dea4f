use indexmap::IndexMap;

use super::ast::*;
use super::builtins;
use super::error::{CompileError, DiagnosticSink, Diagnostics};
use super::lexer::{Keyword, SpannedToken, Token};
use super::types::{
    find_cast, find_member, member_names, resolve_binary, resolve_unary, Item, ResourceLocation,
    Selector, Type, TypeKey, Value,
};

/// Parse a token stream. Never fails: problems go to `sink` and the returned
/// tree contains `Error` nodes where statements could not be parsed.
pub fn parse(tokens: Vec<SpannedToken>, sink: &mut dyn DiagnosticSink) -> Script {
    let mut parser = Parser::new(tokens);
    let script = parser.parse_script();
    let Diagnostics { errors, suggestions } = parser.diagnostics;
    for error in errors {
        sink.report(error);
    }
    for suggestion in suggestions {
        sink.suggest(suggestion.span, suggestion.candidates);
    }
    script
}

/// Parse a single constant literal (number, string, list, compound, range,
/// selector, resource, item). `None` for anything else.
pub(crate) fn literal_value(tokens: Vec<SpannedToken>) -> Option<Value> {
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr().ok()?;
    if !parser.at(&Token::Eof) || parser.diagnostics.has_errors() {
        return None;
    }
    const_value(&expr)
}

/// The compile-time value of a literal expression tree.
pub fn const_value(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::Literal(value) => Some(value.clone()),
        ExprKind::List(items) => items.iter().map(const_value).collect::<Option<Vec<_>>>().map(Value::List),
        ExprKind::Compound(entries) => entries
            .iter()
            .map(|(key, value)| Some((key.clone(), const_value(value)?)))
            .collect::<Option<IndexMap<_, _>>>()
            .map(Value::Compound),
        ExprKind::Range { min, max } => {
            let bound = |e: &Option<Box<Expr>>| match e.as_deref().map(const_value) {
                None => Some(None),
                Some(Some(Value::Int(n))) => Some(Some(n)),
                Some(_) => None,
            };
            Some(Value::Range(super::types::IntRange::new(bound(min)?, bound(max)?)))
        }
        _ => None,
    }
}

// ── Statement table ──────────────────────────────────────────────

type StatementFn = fn(&mut Parser, &ParseContext) -> Result<Stmt, CompileError>;

struct StatementDef {
    keyword: Keyword,
    parse: StatementFn,
}

/// Keyword-led statements, tried in order.
static STATEMENTS: &[StatementDef] = &[
    StatementDef { keyword: Keyword::Var, parse: Parser::parse_var },
    StatementDef { keyword: Keyword::Let, parse: Parser::parse_let },
    StatementDef { keyword: Keyword::If, parse: Parser::parse_if },
    StatementDef { keyword: Keyword::While, parse: Parser::parse_while },
    StatementDef { keyword: Keyword::Function, parse: Parser::parse_function },
    StatementDef { keyword: Keyword::Enum, parse: Parser::parse_enum },
    StatementDef { keyword: Keyword::As, parse: Parser::parse_as },
    StatementDef { keyword: Keyword::At, parse: Parser::parse_at },
    StatementDef { keyword: Keyword::Say, parse: Parser::parse_say },
    StatementDef { keyword: Keyword::Tellraw, parse: Parser::parse_tellraw },
    StatementDef { keyword: Keyword::Give, parse: Parser::parse_give },
    StatementDef { keyword: Keyword::Tag, parse: Parser::parse_tag },
    StatementDef { keyword: Keyword::Kill, parse: Parser::parse_kill },
    StatementDef { keyword: Keyword::Summon, parse: Parser::parse_summon },
    StatementDef { keyword: Keyword::Cmd, parse: Parser::parse_cmd },
    StatementDef { keyword: Keyword::Return, parse: Parser::parse_return },
];

/// What a statement handler needs to know about where it sits.
#[derive(Debug, Clone, Default)]
struct ParseContext {
    /// Annotations written directly before this statement.
    annotations: Vec<Annotation>,
    /// Inside a block or function body.
    nested: bool,
}

impl ParseContext {
    fn nested(&self) -> ParseContext {
        ParseContext {
            annotations: Vec::new(),
            nested: true,
        }
    }
}

// ── Operator levels ──────────────────────────────────────────────

const OR: &[(Token, BinOp)] = &[(Token::Or, BinOp::Or)];
const AND: &[(Token, BinOp)] = &[(Token::And, BinOp::And)];
const COMPARISON: &[(Token, BinOp)] = &[
    (Token::EqEq, BinOp::Eq),
    (Token::Ne, BinOp::Ne),
    (Token::Lt, BinOp::Lt),
    (Token::Le, BinOp::Le),
    (Token::Gt, BinOp::Gt),
    (Token::Ge, BinOp::Ge),
    (Token::Keyword(Keyword::In), BinOp::In),
];
const ADDITIVE: &[(Token, BinOp)] = &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)];
const MULTIPLICATIVE: &[(Token, BinOp)] = &[
    (Token::Star, BinOp::Mul),
    (Token::Slash, BinOp::Div),
    (Token::Percent, BinOp::Mod),
];

fn assignment_op(token: &Token) -> Option<BinOp> {
    match token {
        Token::Eq => Some(BinOp::Assign),
        Token::PlusEq => Some(BinOp::AddAssign),
        Token::MinusEq => Some(BinOp::SubAssign),
        Token::StarEq => Some(BinOp::MulAssign),
        Token::SlashEq => Some(BinOp::DivAssign),
        Token::PercentEq => Some(BinOp::ModAssign),
        _ => None,
    }
}

fn literal(value: Value, span: Span) -> Expr {
    let ty = Type::plain(value.key());
    Expr::new(ExprKind::Literal(value), ty, span)
}

/// Wrap `expr` in an implicit conversion.
fn cast(expr: Expr, cast: Option<&'static builtins::Cast>) -> Expr {
    match cast {
        Some(cast) => {
            let span = expr.span;
            Expr::new(
                ExprKind::Cast {
                    expr: Box::new(expr),
                    cast,
                },
                Type::plain(cast.to),
                span,
            )
        }
        None => expr,
    }
}

/// A numeric token as a value; a leading `-` has already been consumed when
/// `negative` is set.
fn number(token: &Token, negative: bool) -> Result<Value, String> {
    let signed = |v: i64| if negative { -v } else { v };
    let out_of_range = |ty: &str| format!("Literal out of range for `{ty}`");
    match token {
        Token::Int(v) => i32::try_from(signed(*v)).map(Value::Int).map_err(|_| out_of_range("int")),
        Token::Byte(v) => i8::try_from(signed(*v)).map(Value::Byte).map_err(|_| out_of_range("byte")),
        Token::Short(v) => i16::try_from(signed(*v)).map(Value::Short).map_err(|_| out_of_range("short")),
        Token::Long(v) => Ok(Value::Long(signed(*v))),
        Token::Float(v) => Ok(Value::Float(if negative { -v } else { *v })),
        Token::Double(v) => Ok(Value::Double(if negative { -v } else { *v })),
        other => Err(format!("Expected number, got {other:?}")),
    }
}

fn is_number(token: &Token) -> bool {
    matches!(
        token,
        Token::Int(_) | Token::Byte(_) | Token::Short(_) | Token::Long(_) | Token::Float(_) | Token::Double(_)
    )
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Span of the most recently consumed token.
    last: Span,
    diagnostics: Diagnostics,
    scopes: Vec<Vec<Binding>>,
    enums: IndexMap<String, Vec<String>>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            last: Span::default(),
            diagnostics: Diagnostics::default(),
            scopes: vec![Vec::new()],
            enums: IndexMap::new(),
        }
    }

    fn parse_script(&mut self) -> Script {
        let ctx = ParseContext::default();
        let mut body = Vec::new();
        loop {
            body.extend(self.parse_statements(&ctx));
            if !self.at(&Token::RBrace) {
                break;
            }
            let span = self.advance();
            self.report(CompileError::parser("Unexpected `}`", span));
        }
        Script { body }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(self.last, |t| t.span)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    /// The current token starts exactly where the previous one ended.
    fn adjacent(&self) -> bool {
        self.span().start == self.last.end
    }

    /// Consume the current token and return its span. `Eof` is never consumed.
    fn advance(&mut self) -> Span {
        let span = self.span();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.last = span;
        span
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Span, CompileError> {
        if self.at(expected) {
            Ok(self.advance())
        } else {
            Err(CompileError::parser(
                format!("Expected {what}, got {:?}", self.peek()),
                self.span(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        if let Token::Ident(name) = self.peek().clone() {
            Ok((name, self.advance()))
        } else {
            Err(CompileError::parser(
                format!("Expected identifier, got {:?}", self.peek()),
                self.span(),
            ))
        }
    }

    fn report(&mut self, error: CompileError) {
        self.diagnostics.report(error);
    }

    fn skip_newlines(&mut self) {
        while self.at(&Token::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.advance();
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Newline | Token::Semicolon | Token::RBrace | Token::Eof | Token::Keyword(Keyword::Else)
        )
    }

    /// Skip to the end of the current line, without leaving the enclosing
    /// block.
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Newline | Token::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                Token::RBrace if depth == 0 => return,
                Token::LBrace => depth += 1,
                Token::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    // ── Scopes ─────────────────────────────────────────────────────

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|b| b.name == name))
    }

    fn declare(&mut self, name: String, ty: Type, span: Span) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Binding { name, ty, span });
        }
    }

    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for binding in self.scopes.iter().rev().flatten() {
            if !names.contains(&binding.name) {
                names.push(binding.name.clone());
            }
        }
        names
    }

    // ── Statements ─────────────────────────────────────────────────

    fn parse_statements(&mut self, ctx: &ParseContext) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.peek(), Token::RBrace | Token::Eof) {
                return stmts;
            }
            stmts.push(self.parse_statement(ctx));
        }
    }

    fn parse_statement(&mut self, ctx: &ParseContext) -> Stmt {
        let start = self.span();
        let mut candidates: Vec<String> = STATEMENTS.iter().map(|d| d.keyword.text().to_string()).collect();
        candidates.extend(self.visible_names());
        self.diagnostics.suggest(start, candidates);

        match self.parse_statement_inner(ctx) {
            Ok(stmt) => {
                self.finish_statement();
                stmt
            }
            Err(error) => {
                self.report(error);
                self.recover();
                Stmt {
                    kind: StmtKind::Error,
                    span: start.merge(self.last),
                }
            }
        }
    }

    /// A statement ends at a newline, `;`, `}` or the end of input.
    fn finish_statement(&mut self) {
        match self.peek() {
            Token::Newline | Token::Semicolon => self.skip_separators(),
            Token::RBrace | Token::Eof => {}
            other => {
                let error = CompileError::parser(format!("Unexpected token {other:?}"), self.span());
                self.report(error);
                self.recover();
            }
        }
    }

    fn parse_statement_inner(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let mut annotations = Vec::new();
        while let Token::Annotation(name) = self.peek().clone() {
            let span = self.advance();
            annotations.push(Annotation { name, span });
            self.skip_newlines();
        }
        if let Some(first) = annotations.first() {
            if !self.at(&Token::Keyword(Keyword::Function)) {
                return Err(CompileError::parser("Annotations must precede a function", first.span));
            }
        }
        let ctx = ParseContext {
            annotations,
            nested: ctx.nested,
        };

        let keyword = match self.peek() {
            Token::Keyword(k) => Some(*k),
            _ => None,
        };
        if let Some(def) = keyword.and_then(|k| STATEMENTS.iter().find(|d| d.keyword == k)) {
            return (def.parse)(self, &ctx);
        }
        if self.at(&Token::LBrace) {
            return self.parse_block(&ctx);
        }
        self.parse_expression_statement()
    }

    /// `{ ... }` with its own scope.
    fn parse_block(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let (body, span) = self.parse_block_body(ctx)?;
        Ok(Stmt {
            kind: StmtKind::Block(body),
            span,
        })
    }

    fn parse_block_body(&mut self, ctx: &ParseContext) -> Result<(Vec<Stmt>, Span), CompileError> {
        let start = self.expect(&Token::LBrace, "`{`")?;
        self.scopes.push(Vec::new());
        let body = self.parse_statements(&ctx.nested());
        self.scopes.pop();
        let end = self.expect(&Token::RBrace, "`}`")?;
        Ok((body, start.merge(end)))
    }

    /// The body of `if`, `while`, `as` and `at`: a block or one statement.
    fn parse_branch(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        self.skip_newlines();
        if self.at(&Token::LBrace) {
            return self.parse_block(ctx);
        }
        // A lone statement still gets its own scope.
        self.scopes.push(Vec::new());
        let stmt = self.parse_statement_inner(&ctx.nested());
        self.scopes.pop();
        stmt
    }

    fn parse_var(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let (name, name_span) = self.expect_ident()?;
        if self.eat(&Token::Colon) {
            let declared_span = self.span();
            let declared = self.parse_type()?;
            if !matches!(declared.key, TypeKey::Int | TypeKey::Bool | TypeKey::Score) {
                self.report(CompileError::type_error(
                    format!("`var` holds `int`, `bool` or `score`, not `{declared}`"),
                    declared_span.merge(self.last),
                ));
            }
        }
        let score = Type::plain(TypeKey::Score);
        let (value, operation) = if self.at(&Token::Eq) {
            let op_span = self.advance();
            let value = self.parse_expr()?;
            let (value, operation) = self.resolve_assignment(&score, BinOp::Assign, value, op_span);
            (Some(value), operation)
        } else {
            (None, None)
        };
        self.declare(name.clone(), score, name_span);
        Ok(Stmt {
            kind: StmtKind::Var {
                name,
                name_span,
                value,
                operation,
            },
            span: start.merge(self.last),
        })
    }

    fn parse_let(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let (name, name_span) = self.expect_ident()?;
        let declared = if self.eat(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(&Token::Eq, "`=`")?;
        let value = self.parse_expr()?;
        let (value, ty) = match declared {
            Some(ty) => (self.coerce(value, &ty), ty),
            None => {
                let ty = value.ty.clone();
                (value, ty)
            }
        };
        self.declare(name.clone(), ty, name_span);
        Ok(Stmt {
            span: start.merge(value.span),
            kind: StmtKind::Let {
                name,
                name_span,
                value,
            },
        })
    }

    fn parse_if(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let condition = self.parse_expr()?;
        let condition = Self::as_condition(condition);
        let then_branch = self.parse_branch(ctx)?;
        let else_branch = if self.eat(&Token::Keyword(Keyword::Else)) {
            Some(Box::new(self.parse_branch(ctx)?))
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span: start.merge(self.last),
        })
    }

    fn parse_while(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let condition = self.parse_expr()?;
        let condition = Self::as_condition(condition);
        let body = self.parse_branch(ctx)?;
        Ok(Stmt {
            kind: StmtKind::While {
                condition,
                body: Box::new(body),
            },
            span: start.merge(self.last),
        })
    }

    fn parse_function(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        if ctx.nested {
            return Err(CompileError::parser("Functions must be declared at the top level", start));
        }
        let (name, name_span) = self.expect_ident()?;
        self.skip_newlines();
        let (body, body_span) = self.parse_block_body(ctx)?;
        Ok(Stmt {
            kind: StmtKind::Function {
                name,
                name_span,
                annotations: ctx.annotations.clone(),
                body,
            },
            span: start.merge(body_span),
        })
    }

    fn parse_enum(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let (name, name_span) = self.expect_ident()?;
        self.skip_newlines();
        self.expect(&Token::LBrace, "`{`")?;
        let mut variants = Vec::new();
        loop {
            while matches!(self.peek(), Token::Newline | Token::Comma) {
                self.advance();
            }
            if self.at(&Token::RBrace) {
                break;
            }
            let (variant, _) = self.expect_ident()?;
            variants.push(variant);
        }
        let end = self.advance();
        self.enums.insert(name.clone(), variants.clone());
        Ok(Stmt {
            kind: StmtKind::Enum {
                name,
                name_span,
                variants,
            },
            span: start.merge(end),
        })
    }

    fn parse_as(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        self.parse_context(ContextKind::As, ctx)
    }

    fn parse_at(&mut self, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        self.parse_context(ContextKind::At, ctx)
    }

    fn parse_context(&mut self, kind: ContextKind, ctx: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let selector = self.parse_selector_operand()?;
        let body = self.parse_branch(ctx)?;
        Ok(Stmt {
            kind: StmtKind::Context {
                kind,
                selector,
                body: Box::new(body),
            },
            span: start.merge(self.last),
        })
    }

    fn parse_selector_operand(&mut self) -> Result<Expr, CompileError> {
        let expr = self.parse_expr()?;
        Ok(self.coerce(expr, &Type::plain(TypeKey::Selector)))
    }

    fn command(&self, command: Command, start: Span) -> Stmt {
        Stmt {
            kind: StmtKind::Command(command),
            span: start.merge(self.last),
        }
    }

    fn parse_say(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let message = self.parse_expr()?;
        Ok(self.command(Command::Say(message), start))
    }

    fn parse_tellraw(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let target = self.parse_selector_operand()?;
        let mut parts = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            parts.push(self.parse_expr()?);
        }
        Ok(self.command(Command::Tellraw { target, parts }, start))
    }

    fn parse_give(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let target = self.parse_selector_operand()?;
        let item = self.parse_expr()?;
        let item = self.coerce(item, &Type::plain(TypeKey::Item));
        let count = if self.at_statement_end() {
            None
        } else {
            let count = self.parse_expr()?;
            Some(self.coerce(count, &Type::plain(TypeKey::Int)))
        };
        Ok(self.command(Command::Give { target, item, count }, start))
    }

    fn parse_tag(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let target = self.parse_selector_operand()?;
        let (action, action_span) = self.expect_ident()?;
        let add = match action.as_str() {
            "add" => true,
            "remove" => false,
            other => {
                return Err(CompileError::parser(
                    format!("Expected `add` or `remove`, got `{other}`"),
                    action_span,
                ))
            }
        };
        let name = match self.peek().clone() {
            Token::Ident(name) | Token::String(name) => {
                self.advance();
                name
            }
            other => {
                return Err(CompileError::parser(format!("Expected tag name, got {other:?}"), self.span()))
            }
        };
        Ok(self.command(Command::Tag { target, add, name }, start))
    }

    fn parse_kill(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let target = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_selector_operand()?)
        };
        Ok(self.command(Command::Kill(target), start))
    }

    fn parse_summon(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let entity = self.parse_expr()?;
        let entity = self.coerce(entity, &Type::plain(TypeKey::Resource));
        let data = if self.at_statement_end() {
            None
        } else {
            let data = self.parse_expr()?;
            Some(self.coerce(data, &Type::plain(TypeKey::Compound)))
        };
        Ok(self.command(Command::Summon { entity, data }, start))
    }

    fn parse_cmd(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let start = self.advance();
        let text = self.parse_expr()?;
        let text = self.coerce(text, &Type::plain(TypeKey::String));
        Ok(self.command(Command::Raw(text), start))
    }

    fn parse_return(&mut self, _: &ParseContext) -> Result<Stmt, CompileError> {
        let span = self.advance();
        Ok(Stmt {
            kind: StmtKind::Return,
            span,
        })
    }

    /// An expression, or an assignment when an assignment operator follows.
    fn parse_expression_statement(&mut self) -> Result<Stmt, CompileError> {
        let target = self.parse_expr()?;
        let Some(op) = assignment_op(self.peek()) else {
            return Ok(Stmt {
                span: target.span,
                kind: StmtKind::Expr(target),
            });
        };
        let op_span = self.advance();
        let value = self.parse_expr()?;
        // Non-score targets are reported by the semantic pass.
        let (value, operation) = if target.ty.key == TypeKey::Score {
            self.resolve_assignment(&target.ty, op, value, op_span)
        } else {
            (value, None)
        };
        Ok(Stmt {
            span: target.span.merge(value.span),
            kind: StmtKind::Assign {
                target,
                op,
                value,
                operation,
            },
        })
    }

    // ── Types ──────────────────────────────────────────────────────

    /// `int`, `list<int, 3>`, `Mode`
    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let (name, span) = self.expect_ident()?;
        if self.enums.contains_key(&name) {
            return Ok(Type::enumeration(name));
        }
        let key = TypeKey::from_name(&name)
            .ok_or_else(|| CompileError::type_error(format!("Unknown type `{name}`"), span))?;
        if key != TypeKey::List || !self.eat(&Token::Lt) {
            return Ok(Type::plain(key));
        }
        let (element, element_span) = self.expect_ident()?;
        let element = TypeKey::from_name(&element)
            .ok_or_else(|| CompileError::type_error(format!("Unknown type `{element}`"), element_span))?;
        let len = if self.eat(&Token::Comma) {
            match self.peek().clone() {
                Token::Int(n) => {
                    let span = self.advance();
                    Some(usize::try_from(n).map_err(|_| CompileError::type_error("Invalid list length", span))?)
                }
                other => {
                    return Err(CompileError::parser(
                        format!("Expected list length, got {other:?}"),
                        self.span(),
                    ))
                }
            }
        } else {
            None
        };
        self.expect(&Token::Gt, "`>`")?;
        Ok(Type::list(Some(element), len))
    }

    /// Convert `value` to `expected`, inserting a cast when one exists.
    fn coerce(&mut self, value: Expr, expected: &Type) -> Expr {
        if value.is_error() || expected.is_error() {
            return value;
        }
        if value.ty.key == expected.key {
            if let Some(problem) = expected.config_mismatch(&value.ty) {
                self.report(CompileError::type_error(problem, value.span));
            }
            return value;
        }
        match find_cast(value.ty.key, expected.key) {
            Some(c) => cast(value, Some(c)),
            None => {
                self.report(CompileError::type_error(
                    format!("Expected `{expected}`, found `{}`", value.ty),
                    value.span,
                ));
                value
            }
        }
    }

    /// `if`/`while` conditions. Uncastable ones are left for the semantic pass.
    fn as_condition(expr: Expr) -> Expr {
        if expr.is_error() || expr.ty.key == TypeKey::Condition {
            return expr;
        }
        match find_cast(expr.ty.key, TypeKey::Condition) {
            Some(c) => cast(expr, Some(c)),
            None => expr,
        }
    }

    fn resolve_assignment(
        &mut self,
        target: &Type,
        op: BinOp,
        value: Expr,
        op_span: Span,
    ) -> (Expr, Option<&'static builtins::Operation>) {
        if target.is_error() || value.is_error() {
            return (value, None);
        }
        match resolve_binary(target, op, &value.ty) {
            Some(resolved) if resolved.left_cast.is_none() => {
                (cast(value, resolved.right_cast), Some(resolved.operation))
            }
            _ => {
                self.report(CompileError::type_error(
                    format!("Cannot apply `{op}` to `{target}` and `{}`", value.ty),
                    op_span,
                ));
                (value, None)
            }
        }
    }

    // ── Expression parsing (precedence climbing) ──────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_or()
    }

    fn parse_level(
        &mut self,
        ops: &[(Token, BinOp)],
        next: fn(&mut Self) -> Result<Expr, CompileError>,
    ) -> Result<Expr, CompileError> {
        let mut left = next(self)?;
        loop {
            let Some(op) = ops.iter().find(|(t, _)| self.at(t)).map(|(_, op)| *op) else {
                return Ok(left);
            };
            let op_span = self.advance();
            let right = next(self)?;
            left = self.binary(op, op_span, left, right);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        self.parse_level(OR, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        self.parse_level(AND, Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        self.parse_level(COMPARISON, Self::parse_range)
    }

    /// `a..b`, `a..`, `..b`
    fn parse_range(&mut self) -> Result<Expr, CompileError> {
        if self.at(&Token::DotDot) {
            let start = self.advance();
            let max = self.parse_additive()?;
            return Ok(self.range(None, Some(max), start));
        }
        let min = self.parse_additive()?;
        if !self.at(&Token::DotDot) {
            return Ok(min);
        }
        let dots = self.advance();
        let max = if self.starts_expression() {
            Some(self.parse_additive()?)
        } else {
            None
        };
        Ok(self.range(Some(min), max, dots))
    }

    fn starts_expression(&self) -> bool {
        let token = self.peek();
        is_number(token)
            || matches!(
                token,
                Token::String(_)
                    | Token::Ident(_)
                    | Token::Selector(_)
                    | Token::Resource(_)
                    | Token::LParen
                    | Token::LBracket
                    | Token::Minus
                    | Token::Bang
                    | Token::Keyword(Keyword::True | Keyword::False)
            )
    }

    fn range(&mut self, min: Option<Expr>, max: Option<Expr>, dots: Span) -> Expr {
        let mut span = dots;
        let mut valid = true;
        let mut bound = |this: &mut Self, e: Option<Expr>| {
            let e = e?;
            span = span.merge(e.span);
            if e.is_error() {
                valid = false;
                return Some(Box::new(e));
            }
            if e.ty.key == TypeKey::Int {
                return Some(Box::new(e));
            }
            if let Some(c) = find_cast(e.ty.key, TypeKey::Int) {
                return Some(Box::new(cast(e, Some(c))));
            }
            this.report(CompileError::type_error(
                format!("Range bounds must be `int`, found `{}`", e.ty),
                e.span,
            ));
            valid = false;
            Some(Box::new(e))
        };
        let min = bound(self, min);
        let max = bound(self, max);
        let ty = if valid { Type::plain(TypeKey::Range) } else { Type::error() };
        Expr::new(ExprKind::Range { min, max }, ty, span)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        self.parse_level(ADDITIVE, Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        self.parse_level(MULTIPLICATIVE, Self::parse_unary)
    }

    /// Resolve a binary operator against the operand types, inserting casts.
    /// Failures are reported once; operands of type `error` stay silent.
    fn binary(&mut self, op: BinOp, op_span: Span, left: Expr, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        let failed = |left: Expr, right: Expr| {
            Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    operation: None,
                },
                Type::error(),
                span,
            )
        };
        if left.is_error() || right.is_error() {
            return failed(left, right);
        }
        let Some(resolved) = resolve_binary(&left.ty, op, &right.ty) else {
            self.report(CompileError::type_error(
                format!("no operator `{op}` for `{}` and `{}`", left.ty, right.ty),
                op_span,
            ));
            return failed(left, right);
        };
        if let (Some(l), Some(r)) = (left.ty.enum_name(), right.ty.enum_name()) {
            if l != r {
                self.report(CompileError::type_error(
                    format!("Cannot compare enum `{l}` with enum `{r}`"),
                    op_span,
                ));
                return failed(left, right);
            }
        }
        let left = cast(left, resolved.left_cast);
        let right = cast(right, resolved.right_cast);
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                operation: Some(resolved.operation),
            },
            Type::plain(resolved.operation.result),
            span,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let op_span = self.advance();
        // `-5` is a literal, so the full negative range is reachable.
        if op == UnaryOp::Neg && is_number(self.peek()) && self.adjacent() {
            let token = self.peek().clone();
            let span = op_span.merge(self.advance());
            return Ok(match number(&token, true) {
                Ok(value) => literal(value, span),
                Err(message) => {
                    self.report(CompileError::type_error(message, span));
                    Expr::error(span)
                }
            });
        }
        let operand = self.parse_unary()?;
        Ok(self.unary(op, op_span, operand))
    }

    fn unary(&mut self, op: UnaryOp, op_span: Span, operand: Expr) -> Expr {
        let span = op_span.merge(operand.span);
        let resolved = if operand.is_error() {
            None
        } else {
            let resolved = resolve_unary(operand.ty.key, op);
            if resolved.is_none() {
                self.report(CompileError::type_error(
                    format!("no operator `{}` for `{}`", op.symbol(), operand.ty),
                    op_span,
                ));
            }
            resolved
        };
        match resolved {
            Some((c, operation)) => Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(cast(operand, c)),
                    operation: Some(operation),
                },
                Type::plain(operation.result),
                span,
            ),
            None => Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                    operation: None,
                },
                Type::error(),
                span,
            ),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    expr = self.parse_member(expr)?;
                }
                Token::Slash if builtins::descriptor(expr.ty.key).data_path && self.adjacent() => {
                    self.advance();
                    expr = self.parse_data_path(expr)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `.name` or `.name(args)`, resolved through the object's member table.
    fn parse_member(&mut self, object: Expr) -> Result<Expr, CompileError> {
        let (name, name_span) = self.expect_ident()?;
        let args = if self.at(&Token::LParen) {
            Some(self.parse_call_args()?)
        } else {
            None
        };
        let span = object.span.merge(self.last);
        if object.is_error() {
            return Ok(Expr { span, ..object });
        }
        let Some(member) = find_member(object.ty.key, &name) else {
            self.report(CompileError::type_error(
                format!("No member `{name}` on `{}`", object.ty),
                name_span,
            ));
            self.diagnostics.suggest(name_span, member_names(object.ty.key));
            return Ok(Expr {
                ty: Type::error(),
                span,
                ..object
            });
        };
        let args = match (member.params, args) {
            (None, None) => Vec::new(),
            (Some(params), Some(args)) if params.len() == args.len() => params
                .iter()
                .zip(args)
                .map(|(param, arg)| self.coerce(arg, &Type::plain(*param)))
                .collect(),
            (Some(params), Some(args)) => {
                self.report(CompileError::type_error(
                    format!("`{name}` takes {} argument(s), found {}", params.len(), args.len()),
                    name_span,
                ));
                return Ok(Expr { ty: Type::error(), span, ..object });
            }
            (None, Some(_)) => {
                self.report(CompileError::type_error(format!("`{name}` is not a method"), name_span));
                return Ok(Expr { ty: Type::error(), span, ..object });
            }
            (Some(_), None) => {
                self.report(CompileError::type_error(
                    format!("`{name}` is a method; call it as `{name}()`"),
                    name_span,
                ));
                return Ok(Expr { ty: Type::error(), span, ..object });
            }
        };
        Ok(Expr::new(
            ExprKind::Member {
                object: Box::new(object),
                name,
                member,
                args,
            },
            Type::plain(member.result),
            span,
        ))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(&Token::LParen, "`(`")?;
        let mut args = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&Token::RParen) {
                break;
            }
            args.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "`)`")?;
        Ok(args)
    }

    /// `@s/Inventory[0]/id`; segments must be written without spaces.
    fn parse_data_path(&mut self, object: Expr) -> Result<Expr, CompileError> {
        let mut path = String::new();
        loop {
            let (segment, _) = self.expect_ident()?;
            path.push_str(&segment);
            while self.at(&Token::LBracket) && self.adjacent() {
                self.advance();
                match self.peek().clone() {
                    Token::Int(n) => {
                        self.advance();
                        path.push_str(&format!("[{n}]"));
                    }
                    other => {
                        return Err(CompileError::parser(
                            format!("Expected list index, got {other:?}"),
                            self.span(),
                        ))
                    }
                }
                self.expect(&Token::RBracket, "`]`")?;
            }
            let continues = self.at(&Token::Slash)
                && self.adjacent()
                && matches!(self.peek_at(1), Token::Ident(_))
                && self.tokens.get(self.pos + 1).is_some_and(|t| t.span.start == self.span().end);
            if !continues {
                break;
            }
            self.advance();
            path.push('.');
        }
        let span = object.span.merge(self.last);
        let ty = if object.is_error() {
            Type::error()
        } else {
            Type::plain(TypeKey::Data)
        };
        Ok(Expr::new(
            ExprKind::DataPath {
                object: Box::new(object),
                path,
            },
            ty,
            span,
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        let token = self.peek().clone();
        match token {
            t if is_number(&t) => {
                self.advance();
                Ok(match number(&t, false) {
                    Ok(value) => literal(value, span),
                    Err(message) => {
                        self.report(CompileError::type_error(message, span));
                        Expr::error(span)
                    }
                })
            }
            Token::String(s) => {
                self.advance();
                Ok(literal(Value::Str(s), span))
            }
            Token::Keyword(Keyword::True) => {
                self.advance();
                Ok(literal(Value::Bool(true), span))
            }
            Token::Keyword(Keyword::False) => {
                self.advance();
                Ok(literal(Value::Bool(false), span))
            }
            Token::Selector(text) => {
                self.advance();
                Selector::parse(&text)
                    .map(|s| literal(Value::Selector(s), span))
                    .ok_or_else(|| CompileError::parser(format!("Invalid selector `{text}`"), span))
            }
            Token::Resource(text) => self.parse_resource(&text),
            Token::LBracket => self.parse_list(),
            Token::LBrace => self.parse_compound(),
            Token::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                let end = self.expect(&Token::RParen, "`)`")?;
                Ok(Expr {
                    span: span.merge(end),
                    ..inner
                })
            }
            Token::Ident(name) => self.parse_name(name),
            other => Err(CompileError::parser(format!("Expected expression, got {other:?}"), span)),
        }
    }

    /// `ns:path`, `ns:path()` (call) or `ns:item{...}` (item with data).
    fn parse_resource(&mut self, text: &str) -> Result<Expr, CompileError> {
        let span = self.advance();
        let id = ResourceLocation::parse(text);
        if self.at(&Token::LParen) {
            let end = self.parse_empty_call()?;
            return Ok(Expr::new(
                ExprKind::Call(CallTarget::External(id)),
                Type::plain(TypeKey::Void),
                span.merge(end),
            ));
        }
        if self.at(&Token::LBrace) && self.adjacent() {
            let data = self.parse_compound()?;
            let span = span.merge(data.span);
            let Some(Value::Compound(nbt)) = const_value(&data) else {
                self.report(CompileError::type_error("Item data must be constant", data.span));
                return Ok(Expr::error(span));
            };
            return Ok(literal(Value::Item(Item { id, nbt: Some(nbt) }), span));
        }
        Ok(literal(Value::Resource(id), span))
    }

    /// `()` after a function name. Functions take no arguments.
    fn parse_empty_call(&mut self) -> Result<Span, CompileError> {
        let args = self.parse_call_args()?;
        if let Some(first) = args.first() {
            self.report(CompileError::parser("Functions take no arguments", first.span));
        }
        Ok(self.last)
    }

    fn parse_list(&mut self) -> Result<Expr, CompileError> {
        let start = self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&Token::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.skip_newlines();
        let end = self.expect(&Token::RBracket, "`]`")?;
        let span = start.merge(end);

        let element = items.first().map(|e| e.ty.key);
        let uniform = items.iter().all(|e| Some(e.ty.key) == element);
        if !uniform && !items.iter().any(Expr::is_error) {
            self.report(CompileError::type_error("List elements must share one type", span));
        }
        let ty = Type::list(if uniform { element } else { None }, Some(items.len()));
        Ok(Expr::new(ExprKind::List(items), ty, span))
    }

    fn parse_compound(&mut self) -> Result<Expr, CompileError> {
        let start = self.expect(&Token::LBrace, "`{`")?;
        let mut entries = Vec::new();
        loop {
            self.skip_newlines();
            let key = match self.peek().clone() {
                Token::RBrace => break,
                Token::Ident(key) | Token::String(key) => key,
                Token::Keyword(k) => k.text().to_string(),
                other => {
                    return Err(CompileError::parser(
                        format!("Expected compound key, got {other:?}"),
                        self.span(),
                    ))
                }
            };
            self.advance();
            self.expect(&Token::Colon, "`:`")?;
            self.skip_newlines();
            entries.push((key, self.parse_expr()?));
            self.skip_newlines();
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.skip_newlines();
        let end = self.expect(&Token::RBrace, "`}`")?;
        Ok(Expr::new(
            ExprKind::Compound(entries),
            Type::plain(TypeKey::Compound),
            start.merge(end),
        ))
    }

    /// A variable, a call `name()`, or an enum variant `Mode.Survival`.
    fn parse_name(&mut self, name: String) -> Result<Expr, CompileError> {
        let span = self.advance();
        if self.at(&Token::LParen) {
            let end = self.parse_empty_call()?;
            return Ok(Expr::new(
                ExprKind::Call(CallTarget::Local(name)),
                Type::plain(TypeKey::Void),
                span.merge(end),
            ));
        }
        if let Some(binding) = self.lookup(&name) {
            let ty = binding.ty.clone();
            return Ok(Expr::new(ExprKind::Ident(name), ty, span));
        }
        let enum_like = self.enums.contains_key(&name) || name.starts_with(|c: char| c.is_ascii_uppercase());
        if enum_like && self.at(&Token::Dot) {
            self.advance();
            let (variant, variant_span) = self.expect_ident()?;
            let ty = Type::enumeration(name.clone());
            return Ok(Expr::new(
                ExprKind::EnumVariant {
                    enum_name: name,
                    variant,
                },
                ty,
                span.merge(variant_span),
            ));
        }
        // Unknown names are reported by the semantic pass.
        Ok(Expr::new(ExprKind::Ident(name), Type::error(), span))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;

    fn parse_with(src: &str) -> (Script, Diagnostics) {
        let (tokens, lex_errors) = lex(src);
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        let mut diagnostics = Diagnostics::default();
        let script = parse(tokens, &mut diagnostics);
        (script, diagnostics)
    }

    fn parse_ok(src: &str) -> Script {
        let (script, diagnostics) = parse_with(src);
        assert!(diagnostics.errors.is_empty(), "errors: {:?}", diagnostics.errors);
        script
    }

    fn messages(src: &str) -> Vec<String> {
        parse_with(src).1.errors.into_iter().map(|e| e.message).collect()
    }

    /// The value of the last `let` in `src`.
    fn last_let(script: &Script) -> &Expr {
        script
            .body
            .iter()
            .rev()
            .find_map(|s| match &s.kind {
                StmtKind::Let { value, .. } => Some(value),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn multiplication_binds_tighter() {
        let script = parse_ok("let x = 1 + 2 * 3");
        let expr = last_let(&script);
        assert!(matches!(
            &expr.kind,
            ExprKind::Binary { op: BinOp::Add, right, .. }
                if matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. })
        ));
        assert_eq!(expr.ty.key, TypeKey::Int);
    }

    #[test]
    fn score_comparisons_are_conditions() {
        let script = parse_ok("var k = 0\nlet c = k > 5 && k < 10");
        assert_eq!(last_let(&script).ty.key, TypeKey::Condition);
    }

    #[test]
    fn mixed_numerics_insert_a_cast() {
        let script = parse_ok("let d = 1 + 2.5");
        let expr = last_let(&script);
        assert_eq!(expr.ty.key, TypeKey::Double);
        assert!(matches!(
            &expr.kind,
            ExprKind::Binary { left, .. } if matches!(left.kind, ExprKind::Cast { .. })
        ));
    }

    #[test]
    fn unresolvable_operator_is_reported_once() {
        let errors = messages("let x = (\"a\" * @s) + 1 - 2");
        assert_eq!(errors, vec!["no operator `*` for `string` and `selector`"]);
    }

    #[test]
    fn unknown_names_stay_silent_in_the_parser() {
        let (script, diagnostics) = parse_with("let x = missing + 1");
        assert!(diagnostics.errors.is_empty());
        assert!(last_let(&script).is_error());
    }

    #[test]
    fn trailing_tokens_report_once_and_resume() {
        let (script, diagnostics) = parse_with("say \"a\" \"b\" \"c\"\nsay \"d\"");
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].message.starts_with("Unexpected token"));
        assert_eq!(script.body.len(), 2);
    }

    #[test]
    fn broken_statement_recovers_at_next_line() {
        let (script, diagnostics) = parse_with("let = 5\nvar ok = 1");
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(matches!(script.body[0].kind, StmtKind::Error));
        assert!(matches!(script.body[1].kind, StmtKind::Var { .. }));
    }

    #[test]
    fn recovery_stays_inside_the_block() {
        let (script, diagnostics) = parse_with("function f {\n  say )\n  say \"x\"\n}\nsay \"after\"");
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(script.body.len(), 2);
        let StmtKind::Function { body, .. } = &script.body[0].kind else {
            unreachable!()
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn if_else_with_single_statements() {
        let script = parse_ok("var k = 0\nif k > 1 say \"big\"\nelse say \"small\"");
        let StmtKind::If { condition, then_branch, else_branch } = &script.body[1].kind else {
            unreachable!()
        };
        assert_eq!(condition.ty.key, TypeKey::Condition);
        assert!(matches!(then_branch.kind, StmtKind::Command(Command::Say(_))));
        assert!(else_branch.is_some());
    }

    #[test]
    fn bool_conditions_are_cast() {
        let script = parse_ok("while (true) { say \"x\" }");
        let StmtKind::While { condition, .. } = &script.body[0].kind else {
            unreachable!()
        };
        assert!(matches!(condition.kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn annotations_reach_the_function() {
        let script = parse_ok("@tick\n@load\nfunction beat { say \"x\" }");
        let StmtKind::Function { name, annotations, .. } = &script.body[0].kind else {
            unreachable!()
        };
        assert_eq!(name, "beat");
        let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["tick", "load"]);
    }

    #[test]
    fn annotations_need_a_function() {
        assert_eq!(messages("@tick\nsay \"x\""), vec!["Annotations must precede a function"]);
    }

    #[test]
    fn nested_functions_are_rejected() {
        let errors = messages("function outer {\n  function inner { }\n}");
        assert_eq!(errors, vec!["Functions must be declared at the top level"]);
    }

    #[test]
    fn selector_members_and_data_paths() {
        let script = parse_ok("let kills = @s.kills\nlet hp = @s/Inventory[0]/Count");
        let StmtKind::Let { value, .. } = &script.body[0].kind else {
            unreachable!()
        };
        assert_eq!(value.ty.key, TypeKey::Score);
        let hp = last_let(&script);
        assert_eq!(hp.ty.key, TypeKey::Data);
        assert!(matches!(&hp.kind, ExprKind::DataPath { path, .. } if path == "Inventory[0].Count"));
    }

    #[test]
    fn data_divided_by_int_is_score_arithmetic() {
        let script = parse_ok("let half = @s/Health / 2");
        assert_eq!(last_let(&script).ty.key, TypeKey::Score);
    }

    #[test]
    fn unknown_member_suggests_valid_names() {
        let (_, diagnostics) = parse_with("var k = 0\nk.clear()");
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].message, "No member `clear` on `score`");
        let span = diagnostics.errors[0].span;
        let suggestion = diagnostics.suggestions_at(span.start).find(|s| s.span == span).unwrap();
        assert_eq!(suggestion.candidates, vec!["reset"]);
    }

    #[test]
    fn statement_starts_offer_keywords_and_names() {
        let (_, diagnostics) = parse_with("var kills = 0\nk");
        let last = diagnostics.suggestions.last().unwrap();
        assert!(last.candidates.iter().any(|c| c == "while"));
        assert!(last.candidates.iter().any(|c| c == "kills"));
    }

    #[test]
    fn declared_list_types_are_checked() {
        let errors = messages("let xs: list<int, 3> = [1, 2]");
        assert_eq!(errors, vec!["expected 3 elements, found 2"]);
        parse_ok("let ys: list<int, 2> = [1, 2]");
    }

    #[test]
    fn integer_literals_are_range_checked() {
        assert_eq!(messages("let x = 3000000000"), vec!["Literal out of range for `int`"]);
        parse_ok("let y = -2147483648\nlet b = -128b");
    }

    #[test]
    fn assignment_resolves_through_the_score_table() {
        let script = parse_ok("var k = 0\nk += 2b");
        let StmtKind::Assign { value, operation, .. } = &script.body[1].kind else {
            unreachable!()
        };
        assert!(operation.is_some());
        assert!(matches!(value.kind, ExprKind::Cast { .. }));
        assert_eq!(messages("var k = 0\nk += \"x\""), vec!["Cannot apply `+=` to `score` and `string`"]);
    }

    #[test]
    fn commands_parse() {
        let script = parse_ok(
            "give @s minecraft:diamond 3\ntag @s add seen\nkill\nsummon minecraft:zombie {NoAI: 1b}\ncmd \"time set day\"\ntellraw @a \"hi \", 1",
        );
        assert_eq!(script.body.len(), 6);
        let StmtKind::Command(Command::Give { item, count, .. }) = &script.body[0].kind else {
            unreachable!()
        };
        assert_eq!(item.ty.key, TypeKey::Item);
        assert!(count.is_some());
    }

    #[test]
    fn calls_and_enum_variants() {
        let script = parse_ok("enum Mode { Survival, Creative }\nlet m = Mode.Creative\nhelper()\npack:util/reset()");
        assert_eq!(last_let(&script).ty, Type::enumeration("Mode"));
        assert!(matches!(
            &script.body[2].kind,
            StmtKind::Expr(Expr { kind: ExprKind::Call(CallTarget::Local(name)), .. }) if name == "helper"
        ));
        assert!(matches!(
            &script.body[3].kind,
            StmtKind::Expr(Expr { kind: ExprKind::Call(CallTarget::External(id)), .. }) if id.path == "util/reset"
        ));
    }

    #[test]
    fn mismatched_enums_do_not_compare() {
        let errors = messages("enum A { X }\nenum B { Y }\nlet c = A.X == B.Y");
        assert_eq!(errors, vec!["Cannot compare enum `A` with enum `B`"]);
    }

    #[test]
    fn ranges() {
        let script = parse_ok("var k = 0\nlet r = 3..5\nlet c = k in ..7");
        assert_eq!(last_let(&script).ty.key, TypeKey::Condition);
        assert_eq!(messages("let r = \"a\"..5"), vec!["Range bounds must be `int`, found `string`"]);
    }

    #[test]
    fn unmatched_closing_brace() {
        let (script, diagnostics) = parse_with("say \"a\"\n}\nsay \"b\"");
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(script.body.len(), 2);
    }
}
