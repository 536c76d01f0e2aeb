//! Recursive-descent parser for the condition DSL.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparison, sum, term,
//! factor. Comparisons are non-associative. Hard caps: parse depth 16,
//! call arity 4.

use super::lexer::{tokenize, Token};
use super::ExprError;

pub const MAX_SOURCE_LEN: usize = 512;
pub const MAX_DEPTH: usize = 16;
pub const MAX_ARGS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Expr>),
    /// Dotted/bracketed path, e.g. `meters.emma.trust` or `flags["x"]`.
    Path(Vec<String>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

pub fn parse(src: &str) -> Result<Expr, ExprError> {
    if src.len() > MAX_SOURCE_LEN {
        return Err(ExprError::TooLong {
            len: src.len(),
            max: MAX_SOURCE_LEN,
        });
    }
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::syntax(parser.pos, "trailing input after expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, what: &str) -> Result<(), ExprError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(ExprError::syntax(self.pos, format!("expected {what}")))
        }
    }

    fn keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id == kw)
    }

    fn deeper(&self, depth: usize) -> Result<usize, ExprError> {
        if depth + 1 > MAX_DEPTH {
            Err(ExprError::TooDeep { max: MAX_DEPTH })
        } else {
            Ok(depth + 1)
        }
    }

    // Depth counts structural nesting (parens, lists, calls, `not`
    // chains), not the precedence ladder, so the cap bounds the parse
    // tree rather than penalizing flat expressions.

    fn or_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut lhs = self.and_expr(depth)?;
        while self.keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr(depth)?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut lhs = self.not_expr(depth)?;
        while self.keyword("and") {
            self.pos += 1;
            let rhs = self.not_expr(depth)?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        if self.keyword("not") {
            self.pos += 1;
            let inner = self.not_expr(self.deeper(depth)?)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.cmp_expr(depth)
    }

    fn cmp_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let lhs = self.sum_expr(depth)?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(CmpOp::Eq),
            Some(Token::Ne) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            Some(Token::Ident(id)) if id == "in" => Some(CmpOp::In),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.sum_expr(depth)?;
                Ok(Expr::Cmp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            None => Ok(lhs),
        }
    }

    fn sum_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut lhs = self.term_expr(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term_expr(depth)?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut lhs = self.factor(depth)?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.factor(depth)?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let depth = self.deeper(depth)?;
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Minus) => {
                let inner = self.factor(depth)?;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.or_expr(depth)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.or_expr(depth)?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma, "',' or ']'")?;
                    }
                }
                Ok(Expr::List(items))
            }
            Some(Token::Ident(id)) => match id.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Path(vec!["null".into()])),
                _ => self.path_or_call(id, depth),
            },
            other => Err(ExprError::syntax(
                self.pos,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    fn path_or_call(&mut self, head: String, depth: usize) -> Result<Expr, ExprError> {
        // A call only at the head position: `fn(args)`.
        if self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.eat(&Token::RParen) {
                loop {
                    if args.len() == MAX_ARGS {
                        return Err(ExprError::TooManyArgs { max: MAX_ARGS });
                    }
                    args.push(self.or_expr(depth)?);
                    if self.eat(&Token::RParen) {
                        break;
                    }
                    self.expect(Token::Comma, "',' or ')'")?;
                }
            }
            return Ok(Expr::Call { name: head, args });
        }

        let mut segments = vec![head];
        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Token::Ident(id)) => segments.push(id),
                    _ => return Err(ExprError::syntax(self.pos, "expected identifier after '.'")),
                }
            } else if self.eat(&Token::LBracket) {
                match self.next() {
                    Some(Token::Str(s)) => segments.push(s),
                    _ => {
                        return Err(ExprError::syntax(
                            self.pos,
                            "expected string key inside '[...]'",
                        ))
                    }
                }
                self.expect(Token::RBracket, "']'")?;
            } else {
                break;
            }
        }
        Ok(Expr::Path(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence() {
        let e = parse("1 + 2 * 3 == 7 and not false").unwrap();
        match e {
            Expr::And(lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Cmp { op: CmpOp::Eq, .. }));
                assert!(matches!(*rhs, Expr::Not(_)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_paths_and_brackets() {
        assert_eq!(
            parse("meters.emma.trust").unwrap(),
            Expr::Path(vec!["meters".into(), "emma".into(), "trust".into()])
        );
        assert_eq!(
            parse("flags[\"x\"]").unwrap(),
            Expr::Path(vec!["flags".into(), "x".into()])
        );
    }

    #[test]
    fn rejects_deep_nesting() {
        let src = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(parse(&src), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn rejects_long_source() {
        let src = format!("1 + {}", "1 + ".repeat(200));
        assert!(matches!(parse(&src), Err(ExprError::TooLong { .. })));
    }

    #[test]
    fn rejects_five_args() {
        assert!(matches!(
            parse("min(1,2,3,4,5)"),
            Err(ExprError::TooManyArgs { .. })
        ));
    }

    #[test]
    fn rejects_assignment() {
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn in_operator() {
        let e = parse("\"emma\" in present").unwrap();
        assert!(matches!(e, Expr::Cmp { op: CmpOp::In, .. }));
    }
}
