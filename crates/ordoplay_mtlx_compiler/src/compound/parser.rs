// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive-descent parser for snippet statements and expressions.

use super::ast::{shape_from_type_name, AssignOp, BinaryOp, Expr, ExprKind, Lit, Program, Stmt, StmtKind, UnaryOp};
use super::error::CompoundError;
use super::lexer::{lex, Token, TokenKind};

/// Deepest statement or expression nesting accepted
const MAX_NESTING: usize = 128;

pub(crate) fn parse_program(src: &str) -> Result<Program, CompoundError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0, depth: 0 };
    let mut body = Vec::new();
    while p.peek().kind != TokenKind::Eof {
        body.push(p.parse_stmt()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + ahead).min(last)].kind
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn offset(&self) -> usize {
        self.peek().span.start
    }

    fn descend(&mut self) -> Result<(), CompoundError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CompoundError::parse(self.offset(), "expression nested too deeply"));
        }
        Ok(())
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, CompoundError>) -> Result<T, CompoundError> {
        let depth = self.depth;
        let result = self.descend().and_then(|()| f(self));
        self.depth = depth;
        result
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CompoundError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(CompoundError::parse(
                self.offset(),
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompoundError> {
        let t = self.bump();
        match t.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(CompoundError::parse(t.span.start, format!("expected identifier, found {other:?}"))),
        }
    }

    /// `type name` starts a declaration; `const` is accepted and ignored.
    fn at_declaration(&self) -> bool {
        let mut ahead = 0;
        if matches!(self.peek_at(0), TokenKind::Ident(s) if s == "const") {
            ahead = 1;
        }
        matches!(
            (self.peek_at(ahead), self.peek_at(ahead + 1)),
            (TokenKind::Ident(ty), TokenKind::Ident(_)) if shape_from_type_name(ty).is_some()
        )
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompoundError> {
        self.nested(Self::parse_stmt_inner)
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, CompoundError> {
        let offset = self.offset();
        let kind = match self.peek().kind {
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::For => return self.parse_for(),
            TokenKind::If => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let then_body = self.parse_body()?;
                let else_body = if self.consume(TokenKind::Else) { self.parse_body()? } else { Vec::new() };
                StmtKind::If { cond, then_body, else_body }
            }
            TokenKind::While => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let body = self.parse_body()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Do => {
                self.bump();
                let body = self.parse_body()?;
                self.expect(TokenKind::While)?;
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::While { cond, body }
            }
            TokenKind::Return | TokenKind::Break | TokenKind::Continue => {
                let keyword = match self.bump().kind {
                    TokenKind::Return => "return",
                    TokenKind::Break => "break",
                    _ => "continue",
                };
                if self.peek().kind != TokenKind::Semicolon {
                    self.parse_expr()?;
                }
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Jump(keyword)
            }
            TokenKind::Semicolon => {
                self.bump();
                StmtKind::Block(Vec::new())
            }
            _ => {
                let stmt = self.parse_simple()?;
                self.expect(TokenKind::Semicolon)?;
                return Ok(stmt);
            }
        };
        Ok(Stmt { kind, offset })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompoundError> {
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.consume(TokenKind::RBrace) {
            if self.peek().kind == TokenKind::Eof {
                return Err(CompoundError::parse(self.offset(), "expected '}' before end of input"));
            }
            body.push(self.parse_stmt()?);
        }
        Ok(body)
    }

    /// Braced block or a single statement
    fn parse_body(&mut self) -> Result<Vec<Stmt>, CompoundError> {
        if self.peek().kind == TokenKind::LBrace {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, CompoundError> {
        let offset = self.offset();
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let init = if self.peek().kind == TokenKind::Semicolon {
            None
        } else {
            Some(Box::new(self.parse_simple()?))
        };
        self.expect(TokenKind::Semicolon)?;
        let cond = if self.peek().kind == TokenKind::Semicolon { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon)?;
        let step = if self.peek().kind == TokenKind::RParen {
            None
        } else {
            Some(Box::new(self.parse_simple()?))
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_body()?;
        Ok(Stmt { kind: StmtKind::For { init, cond, step, body }, offset })
    }

    /// Declaration, assignment, step or bare expression (no trailing `;`)
    fn parse_simple(&mut self) -> Result<Stmt, CompoundError> {
        let offset = self.offset();

        if self.at_declaration() {
            if matches!(self.peek_at(0), TokenKind::Ident(s) if s == "const") {
                self.bump();
            }
            let type_name = self.expect_ident()?;
            let shape = shape_from_type_name(&type_name)
                .ok_or_else(|| CompoundError::parse(offset, format!("unknown type '{type_name}'")))?;
            let name = self.expect_ident()?;
            let init = if self.consume(TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
            return Ok(Stmt { kind: StmtKind::Declare { shape, name, init }, offset });
        }

        if matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let increment = self.bump().kind == TokenKind::PlusPlus;
            let target = self.expect_ident()?;
            return Ok(Stmt { kind: StmtKind::Step { target, increment }, offset });
        }

        let expr = self.parse_expr()?;
        let op = match self.peek().kind {
            TokenKind::Assign => Some(AssignOp::Set),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => None,
        };
        let is_step = matches!(self.peek().kind, TokenKind::PlusPlus | TokenKind::MinusMinus);

        if op.is_none() && !is_step {
            return Ok(Stmt { kind: StmtKind::Expr(expr), offset });
        }
        let ExprKind::Ident(target) = expr.kind else {
            return Err(CompoundError::parse(offset, "assignment target must be a variable name"));
        };
        let token = self.bump();
        let kind = match op {
            Some(op) => StmtKind::Assign { target, op, value: self.parse_expr()? },
            None => StmtKind::Step { target, increment: token.kind == TokenKind::PlusPlus },
        };
        Ok(Stmt { kind, offset })
    }

    fn parse_expr(&mut self) -> Result<Expr, CompoundError> {
        self.nested(Self::parse_ternary)
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompoundError> {
        let cond = self.parse_or()?;
        let offset = self.offset();
        if !self.consume(TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            offset,
        ))
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, CompoundError>,
    ) -> Result<Expr, CompoundError> {
        // Each operator deepens the left-leaning tree
        let depth = self.depth;
        let result = self.binary_chain(ops, next);
        self.depth = depth;
        result
    }

    fn binary_chain(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, CompoundError>,
    ) -> Result<Expr, CompoundError> {
        let mut e = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                let offset = self.offset();
                if self.consume(token.clone()) {
                    self.descend()?;
                    let r = next(self)?;
                    e = Expr::new(ExprKind::Binary { op: *op, left: Box::new(e), right: Box::new(r) }, offset);
                    continue 'outer;
                }
            }
            return Ok(e);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, CompoundError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, CompoundError> {
        let offset = self.offset();
        let op = if self.consume(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            if self.consume(TokenKind::Plus) {
                return self.nested(Self::parse_unary);
            }
            return self.parse_postfix();
        };
        let e = self.nested(Self::parse_unary)?;
        Ok(Expr::new(ExprKind::Unary { op, expr: Box::new(e) }, offset))
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompoundError> {
        let mut e = self.parse_primary()?;
        loop {
            let offset = self.offset();
            if self.consume(TokenKind::Dot) {
                let components = self.expect_ident()?;
                e = Expr::new(ExprKind::Swizzle { base: Box::new(e), components }, offset);
                continue;
            }
            if self.consume(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                e = Expr::new(ExprKind::Index { base: Box::new(e), index: Box::new(index) }, offset);
                continue;
            }
            if self.peek().kind == TokenKind::LParen {
                let ExprKind::Ident(func) = &e.kind else {
                    return Err(CompoundError::parse(offset, "call target must be an identifier"));
                };
                let func = func.clone();
                self.bump();
                let args = self.parse_args()?;
                e = Expr::new(ExprKind::Call { func, args }, e.offset);
                continue;
            }
            return Ok(e);
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompoundError> {
        let mut args = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompoundError> {
        let t = self.bump();
        let offset = t.span.start;
        let kind = match t.kind {
            TokenKind::Int(v) => ExprKind::Lit(Lit::Int(v)),
            TokenKind::Float(v) => ExprKind::Lit(Lit::Float(v)),
            TokenKind::True => ExprKind::Lit(Lit::Bool(true)),
            TokenKind::False => ExprKind::Lit(Lit::Bool(false)),
            TokenKind::Ident(s) => ExprKind::Ident(s),
            TokenKind::LParen => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(e);
            }
            other => return Err(CompoundError::parse(offset, format!("unexpected token {other:?}"))),
        };
        Ok(Expr::new(kind, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::error::CompoundErrorKind;
    use crate::shape::Shape;

    #[test]
    fn parses_arithmetic_precedence() {
        let program = parse_program("x = 1 + 2 * 3;").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn parses_declarations_and_loops() {
        let program = parse_program(
            "float3 acc = 0.0;\nfor (int i = 0; i < 4; i++) { acc += uv.xyx * i; }",
        )
        .unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(
            program.body[0].kind,
            StmtKind::Declare { shape: Shape::Vector3, .. }
        ));
        let StmtKind::For { init, cond, step, body } = &program.body[1].kind else {
            panic!("expected for loop");
        };
        assert!(init.is_some() && cond.is_some() && step.is_some());
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn parses_ternary_swizzle_and_index() {
        let program = parse_program("c = a.r > 0.5 ? b[1] : 0.0;").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Ternary { cond, then_expr, .. } = &value.kind else {
            panic!("expected ternary");
        };
        assert!(matches!(cond.kind, ExprKind::Binary { op: BinaryOp::Gt, .. }));
        assert!(matches!(then_expr.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn rejects_non_variable_assignment_target() {
        let err = parse_program("v.x = 1.0;").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Parse);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn bounds_nesting_depth() {
        let deep = format!("Out = {}a{};", "(".repeat(200_000), ")".repeat(200_000));
        let err = parse_program(&deep).unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Parse);
        assert_eq!(err.message, "expression nested too deeply");

        let negations = format!("Out = {}a;", "-".repeat(100_000));
        assert_eq!(parse_program(&negations).unwrap_err().message, "expression nested too deeply");

        let blocks = format!("{}Out = a;{}", "{".repeat(100_000), "}".repeat(100_000));
        assert_eq!(parse_program(&blocks).unwrap_err().message, "expression nested too deeply");

        let chain = format!("Out = a{};", " + a".repeat(100_000));
        assert_eq!(parse_program(&chain).unwrap_err().message, "expression nested too deeply");

        let shallow = format!("Out = {}a{} + b * c;", "(".repeat(32), ")".repeat(32));
        assert!(parse_program(&shallow).is_ok());
    }

    #[test]
    fn reports_missing_semicolon() {
        let err = parse_program("x = 1\ny = 2;").unwrap_err();
        assert_eq!(err.kind, CompoundErrorKind::Parse);
        assert_eq!(err.offset, 6);
    }
}
