//! Recursive-descent parser.

use crate::ast::*;
use crate::errors::{CompileError, Span};
use crate::lexer::{lex, Tok, Token};
use crate::types::Type;

pub fn parse(src: &str) -> Result<Unit, CompileError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let unit = p.unit()?;
    if !p.at_end() {
        return Err(p.err("trailing input after top-level form"));
    }
    Ok(unit)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn err(&self, msg: impl Into<String>) -> CompileError {
        CompileError::Parse(msg.into(), self.span())
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), CompileError> {
        if self.eat(&want) {
            Ok(())
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, CompileError> {
        if let Some(Tok::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn unit(&mut self) -> Result<Unit, CompileError> {
        let span = self.span();
        let kind = match self.bump() {
            Some(Tok::KwTxContract) => UnitKind::TxContract,
            Some(Tok::KwTxScript) => UnitKind::TxScript,
            Some(Tok::KwAssetScript) => UnitKind::AssetScript,
            _ => return Err(self.err("expected TxContract, TxScript or AssetScript")),
        };
        let name = self.ident("form name")?;

        let fields = if self.peek() == Some(&Tok::LParen) {
            if kind != UnitKind::TxContract {
                return Err(self.err("only contracts declare fields"));
            }
            self.param_list()?
        } else {
            Vec::new()
        };

        self.expect(Tok::LBrace, "`{`")?;
        let mut events = Vec::new();
        let mut funcs = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Tok::KwEvent) => events.push(self.event_def()?),
                Some(_) => funcs.push(self.func_def()?),
                None => return Err(self.err("unterminated form body")),
            }
        }

        Ok(Unit {
            kind,
            name,
            fields,
            events,
            funcs,
            span,
        })
    }

    fn param_list(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(params);
        }
        loop {
            let span = self.span();
            let name = self.ident("parameter name")?;
            self.expect(Tok::Colon, "`:` after parameter name")?;
            let ty = self.ty()?;
            params.push(Param { name, ty, span });
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(Tok::RParen, "`)` after parameters")?;
            return Ok(params);
        }
    }

    fn event_def(&mut self) -> Result<EventDef, CompileError> {
        let span = self.span();
        self.expect(Tok::KwEvent, "`event`")?;
        let name = self.ident("event name")?;
        let fields = self.param_list()?;
        Ok(EventDef { name, fields, span })
    }

    fn func_def(&mut self) -> Result<FuncDef, CompileError> {
        let span = self.span();
        let is_public = self.eat(&Tok::KwPub);
        let is_payable = self.eat(&Tok::KwPayable);
        self.expect(Tok::KwFn, "`fn`")?;
        let name = self.ident("function name")?;
        let params = self.param_list()?;
        let ret = if self.eat(&Tok::Arrow) {
            self.ty()?
        } else {
            Type::Unit
        };
        let body = self.block()?;
        Ok(FuncDef {
            name,
            is_public,
            is_payable,
            params,
            ret,
            body,
            span,
        })
    }

    fn ty(&mut self) -> Result<Type, CompileError> {
        match self.peek() {
            Some(Tok::Ident(_) | Tok::LBracket | Tok::LParen) => {}
            _ => return Err(self.err("expected a type")),
        }
        match self.bump() {
            Some(Tok::Ident(name)) => Ok(match name.as_str() {
                "Bool" => Type::Bool,
                "I256" => Type::I256,
                "U256" => Type::U256,
                "ByteVec" => Type::ByteVec,
                "Address" => Type::Address,
                _ => Type::Contract(name),
            }),
            Some(Tok::LBracket) => {
                let elem = self.ty()?;
                self.expect(Tok::Semi, "`;` in array type")?;
                let count = self.int_lit("array length")?;
                self.expect(Tok::RBracket, "`]`")?;
                Ok(Type::FixedSizeArray(Box::new(elem), count as usize))
            }
            Some(Tok::LParen) => {
                self.expect(Tok::RParen, "`)` of unit type")?;
                Ok(Type::Unit)
            }
            _ => unreachable!("parser: type token peeked"),
        }
    }

    fn int_lit(&mut self, what: &str) -> Result<u64, CompileError> {
        if let Some(Tok::IntLit(v)) = self.peek() {
            let v = *v;
            self.pos += 1;
            u64::try_from(v).map_err(|_| self.err(format!("{what} too large")))
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(Tok::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        loop {
            if self.eat(&Tok::RBrace) {
                return Ok(stmts);
            }
            if self.at_end() {
                return Err(self.err("unterminated block"));
            }
            stmts.push(self.stmt()?);
        }
    }

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        match self.peek() {
            Some(Tok::KwLet) => {
                self.pos += 1;
                let name = self.ident("binding name")?;
                let ty = if self.eat(&Tok::Colon) {
                    Some(self.ty()?)
                } else {
                    None
                };
                self.expect(Tok::Assign, "`=` in let")?;
                let init = self.expr()?;
                Ok(Stmt {
                    kind: StmtKind::Let { name, ty, init },
                    span,
                })
            }
            Some(Tok::KwReturn) => {
                self.pos += 1;
                let value = if self.peek() == Some(&Tok::RBrace) {
                    None
                } else {
                    Some(self.expr()?)
                };
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    span,
                })
            }
            Some(Tok::KwIf) => {
                self.pos += 1;
                let cond = self.expr()?;
                let then_body = self.block()?;
                let else_body = if self.eat(&Tok::KwElse) {
                    if self.peek() == Some(&Tok::KwIf) {
                        vec![self.stmt()?]
                    } else {
                        self.block()?
                    }
                } else {
                    Vec::new()
                };
                Ok(Stmt {
                    kind: StmtKind::If {
                        cond,
                        then_body,
                        else_body,
                    },
                    span,
                })
            }
            Some(Tok::KwWhile) => {
                self.pos += 1;
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt {
                    kind: StmtKind::While { cond, body },
                    span,
                })
            }
            Some(Tok::KwEmit) => {
                self.pos += 1;
                let event = self.ident("event name")?;
                let args = self.call_args()?;
                Ok(Stmt {
                    kind: StmtKind::Emit { event, args },
                    span,
                })
            }
            _ => {
                // Assignment needs lookahead past `name` and `[idx]` chains.
                let saved = self.pos;
                if let Ok(target) = self.ident("name") {
                    let mut indices = Vec::new();
                    let mut ok = true;
                    while self.peek() == Some(&Tok::LBracket) {
                        self.pos += 1;
                        match self.expr() {
                            Ok(e) => indices.push(e),
                            Err(_) => {
                                ok = false;
                                break;
                            }
                        }
                        if !self.eat(&Tok::RBracket) {
                            ok = false;
                            break;
                        }
                    }
                    if ok && self.eat(&Tok::Assign) {
                        let value = self.expr()?;
                        return Ok(Stmt {
                            kind: StmtKind::Assign {
                                target,
                                indices,
                                value,
                            },
                            span,
                        });
                    }
                }
                self.pos = saved;
                let expr = self.expr()?;
                Ok(Stmt {
                    kind: StmtKind::ExprStmt(expr),
                    span,
                })
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(Tok::LParen, "`(`")?;
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(Tok::RParen, "`)` after arguments")?;
            return Ok(args);
        }
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Tok::OrOr) {
            let span = self.span();
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = binary(BinOp::Or, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.equality_expr()?;
        while self.peek() == Some(&Tok::AndAnd) {
            let span = self.span();
            self.pos += 1;
            let rhs = self.equality_expr()?;
            lhs = binary(BinOp::And, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn equality_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.compare_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::EqEq) => BinOp::Eq,
                Some(Tok::NotEq) => BinOp::Ne,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.pos += 1;
            let rhs = self.compare_expr()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn compare_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Ge) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.pos += 1;
            let rhs = self.additive_expr()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                Some(Tok::Concat) => BinOp::Concat,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.pos += 1;
            let rhs = self.multiplicative_expr()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                Some(Tok::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            let span = self.span();
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = binary(op, lhs, rhs, span);
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        if self.eat(&Tok::Not) {
            let operand = self.unary_expr()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        if self.eat(&Tok::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                },
                span,
            });
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary_expr()?;
        while self.peek() == Some(&Tok::LBracket) {
            let span = self.span();
            self.pos += 1;
            let index = self.expr()?;
            self.expect(Tok::RBracket, "`]`")?;
            expr = Expr {
                kind: ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            };
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        if self.at_end() {
            return Err(self.err("expected an expression"));
        }
        match self.bump() {
            Some(Tok::IntLit(v)) => Ok(Expr {
                kind: ExprKind::IntLit(v),
                span,
            }),
            Some(Tok::SignedIntLit(v)) => Ok(Expr {
                kind: ExprKind::SignedIntLit(v),
                span,
            }),
            Some(Tok::KwTrue) => Ok(Expr {
                kind: ExprKind::BoolLit(true),
                span,
            }),
            Some(Tok::KwFalse) => Ok(Expr {
                kind: ExprKind::BoolLit(false),
                span,
            }),
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    let args = self.call_args()?;
                    Ok(Expr {
                        kind: ExprKind::Call { name, args },
                        span,
                    })
                } else {
                    Ok(Expr {
                        kind: ExprKind::Var(name),
                        span,
                    })
                }
            }
            Some(Tok::Builtin(name)) => {
                let args = self.call_args()?;
                Ok(Expr {
                    kind: ExprKind::Builtin { name, args },
                    span,
                })
            }
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Tok::LBracket) => {
                let first = self.expr()?;
                if self.eat(&Tok::Semi) {
                    let count = self.int_lit("array fill count")?;
                    self.expect(Tok::RBracket, "`]`")?;
                    return Ok(Expr {
                        kind: ExprKind::ArrayFill {
                            elem: Box::new(first),
                            count,
                        },
                        span,
                    });
                }
                let mut elems = vec![first];
                while self.eat(&Tok::Comma) {
                    elems.push(self.expr()?);
                }
                self.expect(Tok::RBracket, "`]` of array literal")?;
                Ok(Expr {
                    kind: ExprKind::ArrayLit(elems),
                    span,
                })
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.err("expected an expression"))
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contract() {
        let unit = parse(
            "TxContract Foo(x: U256) {
                pub fn add(a: U256) -> U256 { return square(x) + square(a) }
                fn square(n: U256) -> U256 { return n * n }
            }",
        )
        .unwrap();
        assert_eq!(unit.kind, UnitKind::TxContract);
        assert_eq!(unit.fields.len(), 1);
        assert_eq!(unit.funcs.len(), 2);
        assert!(unit.funcs[0].is_public);
        assert!(!unit.funcs[1].is_public);
    }

    #[test]
    fn test_parse_arrays_and_control_flow() {
        let unit = parse(
            "TxScript Main {
                pub fn main() -> U256 {
                    let xs = [1, 2, 3]
                    let ys: [U256; 2] = [0; 2]
                    let i = 0
                    while i < 3 {
                        i = i + 1
                    }
                    if i == 3 { return xs[0] } else { return ys[1] }
                }
            }",
        )
        .unwrap();
        assert_eq!(unit.kind, UnitKind::TxScript);
        assert_eq!(unit.funcs[0].body.len(), 5);
    }

    #[test]
    fn test_parse_event_and_emit() {
        let unit = parse(
            "TxContract Foo() {
                event Moved(to: Address, amount: U256)
                pub fn go(to: Address) -> () { emit Moved(to, 1) }
            }",
        )
        .unwrap();
        assert_eq!(unit.events.len(), 1);
    }

    #[test]
    fn test_scripts_cannot_declare_fields() {
        assert!(parse("TxScript Main(x: U256) { }").is_err());
    }

    #[test]
    fn test_parse_error_has_position() {
        let err = parse("TxScript Main { pub fn }").unwrap_err();
        match err {
            CompileError::Parse(_, span) => assert!(span.line >= 1),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
