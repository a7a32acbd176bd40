//! Recursive-descent parser producing [`ast`](super::ast) nodes.

use std::collections::HashSet;
use std::rc::Rc;

use super::ast::*;
use super::lexer::{tokenize, FPiece, SyntaxFault, Tok, Token};

/// Deepest expression nesting accepted before bailing out.
const MAX_NESTING: usize = 100;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "break", "class", "continue", "def", "del",
    "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

pub fn parse_program(source: &str) -> Result<Block, SyntaxFault> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, 1);
    let block = parser.file()?;
    Ok(block)
}

fn parse_field(source: &str, line: usize) -> Result<Expr, SyntaxFault> {
    let tokens = tokenize(source.trim()).map_err(|mut err| {
        err.line = line;
        err
    })?;
    let tokens = tokens
        .into_iter()
        .map(|t| Token { tok: t.tok, line })
        .collect();
    let mut parser = Parser::new(tokens, line);
    let expr = parser.testlist()?;
    parser.skip_newlines();
    if !parser.at(&Tok::Eof) {
        return Err(SyntaxFault::syntax("f-string: invalid expression", line));
    }
    Ok(expr)
}

#[derive(Clone, Copy, Default)]
struct Context {
    in_function: bool,
    in_loop: bool,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    ctx: Context,
    last_line: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, first_line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            nesting: 0,
            ctx: Context::default(),
            last_line: first_line,
        }
    }

    // ── token helpers ───────────────────────────────────

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens
            .get(self.pos + 1)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.line)
            .unwrap_or(self.last_line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.last_line = self.tokens[self.pos].line;
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if &**n == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), SyntaxFault> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}'")))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), SyntaxFault> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{kw}'")))
        }
    }

    fn expect_newline(&mut self) -> Result<(), SyntaxFault> {
        match self.peek() {
            Tok::Newline => {
                self.advance();
                Ok(())
            }
            Tok::Eof => Ok(()),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn identifier(&mut self) -> Result<Rc<str>, SyntaxFault> {
        match self.peek().clone() {
            Tok::Name(name) if !KEYWORDS.contains(&&*name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(&Tok::Newline) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxFault {
        SyntaxFault::syntax(message, self.line())
    }

    fn enter(&mut self) -> Result<(), SyntaxFault> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(self.error("too many nested expressions"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    // ── statements ──────────────────────────────────────

    fn file(&mut self) -> Result<Block, SyntaxFault> {
        let mut block = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Tok::Eof => break,
                Tok::Indent => return Err(SyntaxFault::indentation("unexpected indent", self.line())),
                _ => block.extend(self.statement()?),
            }
        }
        Ok(block)
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, SyntaxFault> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Name(n) => match &**n {
                "if" => Some(self.if_stmt()?),
                "while" => Some(self.while_stmt()?),
                "for" => Some(self.for_stmt()?),
                "def" => Some(self.def_stmt()?),
                "class" => Some(self.class_stmt()?),
                "try" => Some(self.try_stmt()?),
                _ => None,
            },
            _ => None,
        };
        match kind {
            Some(kind) => Ok(vec![Stmt { line, kind }]),
            None => self.simple_statements(),
        }
    }

    fn simple_statements(&mut self) -> Result<Vec<Stmt>, SyntaxFault> {
        let mut stmts = Vec::new();
        loop {
            let line = self.line();
            let kind = self.small_statement()?;
            stmts.push(Stmt { line, kind });
            if !self.eat_op(";") {
                break;
            }
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    fn small_statement(&mut self) -> Result<StmtKind, SyntaxFault> {
        if let Tok::Name(n) = self.peek().clone() {
            match &*n {
                "pass" => {
                    self.advance();
                    return Ok(StmtKind::Pass);
                }
                "break" => {
                    if !self.ctx.in_loop {
                        return Err(self.error("'break' outside loop"));
                    }
                    self.advance();
                    return Ok(StmtKind::Break);
                }
                "continue" => {
                    if !self.ctx.in_loop {
                        return Err(self.error("'continue' not properly in loop"));
                    }
                    self.advance();
                    return Ok(StmtKind::Continue);
                }
                "return" => {
                    if !self.ctx.in_function {
                        return Err(self.error("'return' outside function"));
                    }
                    self.advance();
                    if self.at_statement_end() {
                        return Ok(StmtKind::Return(None));
                    }
                    return Ok(StmtKind::Return(Some(self.testlist()?)));
                }
                "raise" => {
                    self.advance();
                    if self.at_statement_end() {
                        return Ok(StmtKind::Raise(None));
                    }
                    return Ok(StmtKind::Raise(Some(self.test()?)));
                }
                "global" => {
                    self.advance();
                    let mut names = vec![self.identifier()?];
                    while self.eat_op(",") {
                        names.push(self.identifier()?);
                    }
                    return Ok(StmtKind::Global(names));
                }
                "del" => {
                    self.advance();
                    let mut targets = Vec::new();
                    loop {
                        let target = self.atom_expr_checked()?;
                        targets.push(self.target_from(target)?);
                        if !self.eat_op(",") {
                            break;
                        }
                    }
                    return Ok(StmtKind::Del(targets));
                }
                "assert" => {
                    self.advance();
                    let test = self.test()?;
                    let msg = if self.eat_op(",") {
                        Some(self.test()?)
                    } else {
                        None
                    };
                    return Ok(StmtKind::Assert { test, msg });
                }
                "import" | "from" => {
                    return Err(self.error("import statements are not available"));
                }
                "nonlocal" | "with" | "yield" | "async" | "await" => {
                    return Err(self.error(format!("'{n}' is not supported")));
                }
                _ => {}
            }
        }
        self.expression_statement()
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof) || self.at_op(";")
    }

    fn expression_statement(&mut self) -> Result<StmtKind, SyntaxFault> {
        let first = self.testlist()?;

        let aug = match self.peek() {
            Tok::Op("+=") => Some(BinOp::Add),
            Tok::Op("-=") => Some(BinOp::Sub),
            Tok::Op("*=") => Some(BinOp::Mul),
            Tok::Op("/=") => Some(BinOp::Div),
            Tok::Op("//=") => Some(BinOp::FloorDiv),
            Tok::Op("%=") => Some(BinOp::Mod),
            Tok::Op("**=") => Some(BinOp::Pow),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = match first {
                Expr::Name(_) | Expr::Attribute(..) | Expr::Subscript(..) => first,
                _ => return Err(self.error("illegal expression for augmented assignment")),
            };
            let value = self.testlist()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if !self.at_op("=") {
            return Ok(StmtKind::Expr(first));
        }

        let mut exprs = vec![first];
        while self.eat_op("=") {
            exprs.push(self.testlist()?);
        }
        let value = exprs.pop().ok_or_else(|| self.error("invalid syntax"))?;
        let targets = exprs
            .into_iter()
            .map(|e| self.target_from(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StmtKind::Assign { targets, value })
    }

    /// Validate that `expr` may appear on the left of an assignment.
    fn target_from(&self, expr: Expr) -> Result<Expr, SyntaxFault> {
        match expr {
            Expr::Name(ref n) if KEYWORDS.contains(&&**n) => {
                Err(self.error(format!("cannot assign to {n}")))
            }
            Expr::Name(_) | Expr::Attribute(..) | Expr::Subscript(..) => Ok(expr),
            Expr::Tuple(items) => Ok(Expr::Tuple(
                items
                    .into_iter()
                    .map(|e| self.target_from(e))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::List(items) => Ok(Expr::Tuple(
                items
                    .into_iter()
                    .map(|e| self.target_from(e))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Call { .. } => Err(self.error("cannot assign to function call")),
            Expr::Literal(_) | Expr::FString(_) => Err(self.error("cannot assign to literal")),
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn suite(&mut self) -> Result<Block, SyntaxFault> {
        self.expect_op(":")?;
        if !self.at(&Tok::Newline) {
            return self.simple_statements();
        }
        self.advance();
        self.skip_newlines();
        if !self.at(&Tok::Indent) {
            return Err(SyntaxFault::indentation(
                "expected an indented block",
                self.line(),
            ));
        }
        self.advance();
        let mut block = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Tok::Dedent => {
                    self.advance();
                    break;
                }
                Tok::Eof => break,
                Tok::Indent => {
                    return Err(SyntaxFault::indentation("unexpected indent", self.line()))
                }
                _ => block.extend(self.statement()?),
            }
        }
        Ok(block)
    }

    fn loop_suite(&mut self) -> Result<Block, SyntaxFault> {
        let saved = self.ctx;
        self.ctx.in_loop = true;
        let body = self.suite();
        self.ctx = saved;
        body
    }

    fn if_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        let mut branches = Vec::new();
        let line = self.line();
        self.expect_kw("if")?;
        let test = self.test()?;
        let body = self.suite()?;
        branches.push(Branch { line, test, body });

        let mut orelse = None;
        loop {
            self.skip_newlines();
            let line = self.line();
            if self.eat_kw("elif") {
                let test = self.test()?;
                let body = self.suite()?;
                branches.push(Branch { line, test, body });
            } else if self.eat_kw("else") {
                orelse = Some(self.suite()?);
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, orelse })
    }

    fn optional_else(&mut self) -> Result<Option<Block>, SyntaxFault> {
        self.skip_newlines();
        if self.eat_kw("else") {
            Ok(Some(self.suite()?))
        } else {
            Ok(None)
        }
    }

    fn while_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        self.expect_kw("while")?;
        let test = self.test()?;
        let body = self.loop_suite()?;
        let orelse = self.optional_else()?;
        Ok(StmtKind::While { test, body, orelse })
    }

    fn for_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        self.expect_kw("for")?;
        let target = self.target_list()?;
        self.expect_kw("in")?;
        let iter = self.testlist()?;
        let body = self.loop_suite()?;
        let orelse = self.optional_else()?;
        Ok(StmtKind::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    /// Loop and comprehension targets: primaries separated by commas, so the
    /// following `in` is not taken as a comparison.
    fn target_list(&mut self) -> Result<Expr, SyntaxFault> {
        let first = self.atom_expr_checked()?;
        if !self.at_op(",") {
            return self.target_from(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_kw("in") {
                break;
            }
            items.push(self.atom_expr_checked()?);
        }
        self.target_from(Expr::Tuple(items))
    }

    fn parameters(&mut self, closing: &str) -> Result<Vec<Param>, SyntaxFault> {
        let mut params: Vec<Param> = Vec::new();
        while !self.at_op(closing) {
            let name = self.identifier()?;
            if params.iter().any(|p| p.name == name) {
                return Err(self.error(format!(
                    "duplicate argument '{name}' in function definition"
                )));
            }
            let default = if self.eat_op("=") {
                Some(self.test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param { name, default });
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn def_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        self.expect_kw("def")?;
        let name = self.identifier()?;
        self.expect_op("(")?;
        let params = self.parameters(")")?;
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.test()?;
        }

        let saved = self.ctx;
        self.ctx = Context {
            in_function: true,
            in_loop: false,
        };
        let body = self.suite();
        self.ctx = saved;
        let body = body?;

        Ok(StmtKind::FunctionDef(Rc::new(function_def(name, params, body))))
    }

    fn class_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        self.expect_kw("class")?;
        let name = self.identifier()?;
        let mut base = None;
        if self.eat_op("(") {
            if !self.at_op(")") {
                base = Some(self.test()?);
                if self.eat_op(",") && !self.at_op(")") {
                    return Err(self.error("multiple inheritance is not supported"));
                }
            }
            self.expect_op(")")?;
        }

        let saved = self.ctx;
        self.ctx = Context::default();
        let body = self.suite();
        self.ctx = saved;

        Ok(StmtKind::ClassDef {
            name,
            base,
            body: body?,
        })
    }

    fn try_stmt(&mut self) -> Result<StmtKind, SyntaxFault> {
        self.expect_kw("try")?;
        let body = self.suite()?;
        let mut handlers = Vec::new();
        loop {
            self.skip_newlines();
            let line = self.line();
            if !self.eat_kw("except") {
                break;
            }
            let mut class = None;
            let mut name = None;
            if !self.at_op(":") {
                class = Some(self.test()?);
                if self.eat_kw("as") {
                    name = Some(self.identifier()?);
                }
            }
            let body = self.suite()?;
            handlers.push(Handler {
                line,
                class,
                name,
                body,
            });
        }

        let orelse = if handlers.is_empty() {
            None
        } else {
            self.optional_else()?
        };

        self.skip_newlines();
        let finalbody = if self.eat_kw("finally") {
            Some(self.suite()?)
        } else {
            None
        };

        if handlers.is_empty() && finalbody.is_none() {
            return Err(self.error("expected 'except' or 'finally' block"));
        }
        Ok(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    // ── expressions ─────────────────────────────────────

    /// Comma-separated expressions; more than one (or a trailing comma) makes a tuple.
    fn testlist(&mut self) -> Result<Expr, SyntaxFault> {
        let first = self.test()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_expression_end() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expression_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof)
            || self.at_op("=")
            || self.at_op(")")
            || self.at_op("]")
            || self.at_op("}")
            || self.at_op(":")
            || self.at_op(";")
    }

    fn test(&mut self) -> Result<Expr, SyntaxFault> {
        self.enter()?;
        let result = self.test_inner();
        self.leave();
        result
    }

    fn test_inner(&mut self) -> Result<Expr, SyntaxFault> {
        if self.at_kw("lambda") {
            return self.lambda();
        }
        let body = self.or_test()?;
        if self.eat_kw("if") {
            let test = self.or_test()?;
            self.expect_kw("else")?;
            let orelse = self.test()?;
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            });
        }
        Ok(body)
    }

    fn lambda(&mut self) -> Result<Expr, SyntaxFault> {
        let line = self.line();
        self.expect_kw("lambda")?;
        let params = self.parameters(":")?;
        self.expect_op(":")?;
        let saved = self.ctx;
        self.ctx = Context {
            in_function: true,
            in_loop: false,
        };
        let body = self.test();
        self.ctx = saved;
        let body = vec![Stmt {
            line,
            kind: StmtKind::Return(Some(body?)),
        }];
        Ok(Expr::Lambda(Rc::new(function_def(
            Rc::from("<lambda>"),
            params,
            body,
        ))))
    }

    fn or_test(&mut self) -> Result<Expr, SyntaxFault> {
        let mut left = self.and_test()?;
        while self.eat_kw("or") {
            let right = self.and_test()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_test(&mut self) -> Result<Expr, SyntaxFault> {
        let mut left = self.not_test()?;
        while self.eat_kw("and") {
            let right = self.not_test()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_test(&mut self) -> Result<Expr, SyntaxFault> {
        if self.eat_kw("not") {
            self.enter()?;
            let operand = self.not_test();
            self.leave();
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand?)));
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let tok = self.peek().clone();
        let op = match &tok {
            Tok::Op("==") => CmpOp::Eq,
            Tok::Op("!=") => CmpOp::NotEq,
            Tok::Op("<") => CmpOp::Lt,
            Tok::Op("<=") => CmpOp::LtE,
            Tok::Op(">") => CmpOp::Gt,
            Tok::Op(">=") => CmpOp::GtE,
            Tok::Name(n) if &**n == "in" => CmpOp::In,
            Tok::Name(n) if &**n == "is" => {
                self.advance();
                if self.eat_kw("not") {
                    return Some(CmpOp::IsNot);
                }
                return Some(CmpOp::Is);
            }
            Tok::Name(n)
                if &**n == "not" && matches!(self.peek_next(), Tok::Name(m) if &**m == "in") =>
            {
                self.advance();
                self.advance();
                return Some(CmpOp::NotIn);
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxFault> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn arith(&mut self) -> Result<Expr, SyntaxFault> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, SyntaxFault> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("//") => BinOp::FloorDiv,
                Tok::Op("%") => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxFault> {
        let op = match self.peek() {
            Tok::Op("-") => Some(UnaryOp::Neg),
            Tok::Op("+") => Some(UnaryOp::Pos),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            self.enter()?;
            let operand = self.factor();
            self.leave();
            return Ok(Expr::Unary(op, Box::new(operand?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, SyntaxFault> {
        let base = self.atom_expr()?;
        if self.eat_op("**") {
            self.enter()?;
            let exponent = self.factor();
            self.leave();
            return Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent?)));
        }
        Ok(base)
    }

    fn atom_expr_checked(&mut self) -> Result<Expr, SyntaxFault> {
        self.enter()?;
        let result = self.atom_expr();
        self.leave();
        result
    }

    fn atom_expr(&mut self) -> Result<Expr, SyntaxFault> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                expr = self.call(expr)?;
            } else if self.eat_op("[") {
                let index = self.subscript()?;
                self.expect_op("]")?;
                expr = Expr::Subscript(Box::new(expr), Box::new(index));
            } else if self.eat_op(".") {
                let name = match self.advance() {
                    Tok::Name(name) => name,
                    _ => return Err(self.error("expected attribute name")),
                };
                expr = Expr::Attribute(Box::new(expr), name);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call(&mut self, func: Expr) -> Result<Expr, SyntaxFault> {
        let mut args = Vec::new();
        let mut keywords: Vec<(Rc<str>, Expr)> = Vec::new();
        while !self.at_op(")") {
            if self.at_op("*") || self.at_op("**") {
                return Err(self.error("argument unpacking is not supported"));
            }
            let is_keyword = matches!(self.peek(), Tok::Name(_))
                && matches!(self.peek_next(), Tok::Op("="));
            if is_keyword {
                let name = self.identifier()?;
                self.advance();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {name}")));
                }
                keywords.push((name, self.test()?));
            } else {
                if !keywords.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let arg = self.test()?;
                if self.at_kw("for") {
                    let generators = self.comprehension_clauses()?;
                    args.push(Expr::ListComp {
                        elt: Box::new(arg),
                        generators,
                    });
                } else {
                    args.push(arg);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(Expr::Call {
            func: Box::new(func),
            args,
            keywords,
        })
    }

    fn subscript(&mut self) -> Result<Expr, SyntaxFault> {
        let first = self.slice_item()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.slice_item()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn slice_item(&mut self) -> Result<Expr, SyntaxFault> {
        let lower = if self.at_op(":") {
            None
        } else {
            let expr = self.test()?;
            if !self.at_op(":") {
                return Ok(expr);
            }
            Some(Box::new(expr))
        };
        self.expect_op(":")?;
        let upper = if self.at_op(":") || self.at_op("]") || self.at_op(",") {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        let step = if self.eat_op(":") && !self.at_op("]") && !self.at_op(",") {
            Some(Box::new(self.test()?))
        } else {
            None
        };
        Ok(Expr::Slice { lower, upper, step })
    }

    fn comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, SyntaxFault> {
        let mut generators = Vec::new();
        while self.eat_kw("for") {
            let target = self.target_list()?;
            self.expect_kw("in")?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.eat_kw("if") {
                ifs.push(self.or_test()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn atom(&mut self) -> Result<Expr, SyntaxFault> {
        let line = self.line();
        match self.advance() {
            Tok::Int(v) => Ok(Expr::Literal(Literal::Int(v))),
            Tok::Float(v) => Ok(Expr::Literal(Literal::Float(v))),
            Tok::Str(s) => self.strings(StringAcc::Plain(s.to_string()), line),
            Tok::FStr(pieces) => {
                let parts = fstring_parts(pieces, line)?;
                self.strings(StringAcc::Format(parts), line)
            }
            Tok::Name(name) => match &*name {
                "None" => Ok(Expr::Literal(Literal::None)),
                "True" => Ok(Expr::Literal(Literal::Bool(true))),
                "False" => Ok(Expr::Literal(Literal::Bool(false))),
                kw if KEYWORDS.contains(&kw) => {
                    Err(SyntaxFault::syntax("invalid syntax", line))
                }
                _ => Ok(Expr::Name(name)),
            },
            Tok::Op("(") => self.paren(),
            Tok::Op("[") => self.list_display(),
            Tok::Op("{") => self.dict_display(),
            Tok::Indent => Err(SyntaxFault::indentation("unexpected indent", line)),
            Tok::Newline | Tok::Eof | Tok::Dedent => {
                Err(SyntaxFault::syntax("invalid syntax", line))
            }
            Tok::Op(op) => Err(SyntaxFault::syntax(format!("invalid syntax near '{op}'"), line)),
        }
    }

    /// Adjacent string literals concatenate, f-strings included.
    fn strings(&mut self, mut acc: StringAcc, line: usize) -> Result<Expr, SyntaxFault> {
        loop {
            match self.peek().clone() {
                Tok::Str(s) => {
                    self.advance();
                    acc = acc.push_literal(&s);
                }
                Tok::FStr(pieces) => {
                    self.advance();
                    acc = acc.push_parts(fstring_parts(pieces, line)?);
                }
                _ => break,
            }
        }
        Ok(acc.finish())
    }

    fn paren(&mut self) -> Result<Expr, SyntaxFault> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        self.enter()?;
        let result = self.paren_inner();
        self.leave();
        result
    }

    fn paren_inner(&mut self) -> Result<Expr, SyntaxFault> {
        let first = self.test()?;
        if self.at_kw("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op(")") {
                break;
            }
            items.push(self.test()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple(items))
    }

    fn list_display(&mut self) -> Result<Expr, SyntaxFault> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        self.enter()?;
        let result = self.list_inner();
        self.leave();
        result
    }

    fn list_inner(&mut self) -> Result<Expr, SyntaxFault> {
        let first = self.test()?;
        if self.at_kw("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.test()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(items))
    }

    fn dict_display(&mut self) -> Result<Expr, SyntaxFault> {
        if self.eat_op("}") {
            return Ok(Expr::Dict(Vec::new()));
        }
        self.enter()?;
        let result = self.dict_inner();
        self.leave();
        result
    }

    fn dict_inner(&mut self) -> Result<Expr, SyntaxFault> {
        let key = self.test()?;
        if !self.at_op(":") {
            return Err(self.error("set displays are not supported"));
        }
        self.expect_op(":")?;
        let value = self.test()?;
        if self.at_kw("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(Expr::DictComp {
                key: Box::new(key),
                value: Box::new(value),
                generators,
            });
        }
        let mut entries = vec![(key, value)];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            let key = self.test()?;
            self.expect_op(":")?;
            entries.push((key, self.test()?));
        }
        self.expect_op("}")?;
        Ok(Expr::Dict(entries))
    }
}

enum StringAcc {
    Plain(String),
    Format(Vec<FStringPart>),
}

impl StringAcc {
    fn push_literal(self, text: &str) -> Self {
        match self {
            StringAcc::Plain(mut s) => {
                s.push_str(text);
                StringAcc::Plain(s)
            }
            StringAcc::Format(mut parts) => {
                parts.push(FStringPart::Literal(Rc::from(text)));
                StringAcc::Format(parts)
            }
        }
    }

    fn push_parts(self, more: Vec<FStringPart>) -> Self {
        let mut parts = match self {
            StringAcc::Plain(s) if s.is_empty() => Vec::new(),
            StringAcc::Plain(s) => vec![FStringPart::Literal(Rc::from(s))],
            StringAcc::Format(parts) => parts,
        };
        parts.extend(more);
        StringAcc::Format(parts)
    }

    fn finish(self) -> Expr {
        match self {
            StringAcc::Plain(s) => Expr::Literal(Literal::Str(Rc::from(s))),
            StringAcc::Format(parts) => Expr::FString(parts),
        }
    }
}

fn fstring_parts(pieces: Vec<FPiece>, line: usize) -> Result<Vec<FStringPart>, SyntaxFault> {
    pieces
        .into_iter()
        .map(|piece| match piece {
            FPiece::Literal(text) => Ok(FStringPart::Literal(Rc::from(text))),
            FPiece::Field { source, repr, spec } => Ok(FStringPart::Field {
                expr: Box::new(parse_field(&source, line)?),
                repr,
                spec: spec.map(Rc::from),
            }),
        })
        .collect()
}

fn function_def(name: Rc<str>, params: Vec<Param>, body: Block) -> FunctionDef {
    let mut locals: HashSet<Rc<str>> = params.iter().map(|p| p.name.clone()).collect();
    let mut globals = HashSet::new();
    collect_bindings(&body, &mut locals, &mut globals);
    for name in &globals {
        locals.remove(name);
    }
    FunctionDef {
        name,
        params,
        body,
        locals,
        globals,
    }
}

/// Names bound by a function body, not descending into nested scopes.
fn collect_bindings(block: &[Stmt], locals: &mut HashSet<Rc<str>>, globals: &mut HashSet<Rc<str>>) {
    for stmt in block {
        match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                for target in targets {
                    collect_target(target, locals);
                }
            }
            StmtKind::AugAssign { target, .. } => collect_target(target, locals),
            StmtKind::For {
                target,
                body,
                orelse,
                ..
            } => {
                collect_target(target, locals);
                collect_bindings(body, locals, globals);
                if let Some(orelse) = orelse {
                    collect_bindings(orelse, locals, globals);
                }
            }
            StmtKind::While { body, orelse, .. } => {
                collect_bindings(body, locals, globals);
                if let Some(orelse) = orelse {
                    collect_bindings(orelse, locals, globals);
                }
            }
            StmtKind::If { branches, orelse } => {
                for branch in branches {
                    collect_bindings(&branch.body, locals, globals);
                }
                if let Some(orelse) = orelse {
                    collect_bindings(orelse, locals, globals);
                }
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                collect_bindings(body, locals, globals);
                for handler in handlers {
                    if let Some(name) = &handler.name {
                        locals.insert(name.clone());
                    }
                    collect_bindings(&handler.body, locals, globals);
                }
                for block in [orelse, finalbody].into_iter().flatten() {
                    collect_bindings(block, locals, globals);
                }
            }
            StmtKind::FunctionDef(def) => {
                locals.insert(def.name.clone());
            }
            StmtKind::ClassDef { name, .. } => {
                locals.insert(name.clone());
            }
            StmtKind::Del(targets) => {
                for target in targets {
                    collect_target(target, locals);
                }
            }
            StmtKind::Global(names) => globals.extend(names.iter().cloned()),
            _ => {}
        }
    }
}

fn collect_target(target: &Expr, locals: &mut HashSet<Rc<str>>) {
    match target {
        Expr::Name(name) => {
            locals.insert(name.clone());
        }
        Expr::Tuple(items) | Expr::List(items) => {
            for item in items {
                collect_target(item, locals);
            }
        }
        _ => {}
    }
}
