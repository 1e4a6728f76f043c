//! Recursive-descent parser for the rule expression language.
//!
//! Precedence, lowest first: assignment (statement level only), ternary,
//! elvis, `or`, `and`, equality, comparison, additive, multiplicative,
//! unary, postfix access.

use serde_json::Value;

use super::ast::{Accessor, BinaryOp, Expr, Program, Statement, Target};
use super::error::{ExpressionError, ExpressionResult};
use super::lexer::{tokenize, Token, TokenKind};
use super::value::float_value;

/// Maximum parser recursion depth.
const MAX_DEPTH: usize = 128;

/// Maximum depth of a built expression tree. Left-associative chains grow
/// the tree without recursing in the parser, so they are bounded here.
pub const MAX_TREE_DEPTH: usize = 256;

/// Parse a full program.
pub fn parse(source: &str) -> ExpressionResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        last: 0,
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Tree depth of the most recently parsed expression
    last: usize,
}

impl Parser {
    fn program(&mut self) -> ExpressionResult<Program> {
        let mut statements = vec![self.statement()?];

        while self.eat(&TokenKind::Semicolon) {
            if self.check(&TokenKind::Eof) {
                break;
            }
            statements.push(self.statement()?);
        }

        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected());
        }

        Ok(Program { statements })
    }

    fn statement(&mut self) -> ExpressionResult<Statement> {
        let start = self.current().position;
        let expr = self.ternary()?;

        if self.eat(&TokenKind::Assign) {
            let target = into_target(expr).ok_or_else(|| {
                ExpressionError::parse(
                    start,
                    "left side of '=' must be a variable followed by a property or index",
                )
            })?;
            let value = self.ternary()?;
            return Ok(Statement::Assign { target, value });
        }

        Ok(Statement::Expr(expr))
    }

    fn ternary(&mut self) -> ExpressionResult<Expr> {
        self.enter()?;
        let condition = self.elvis()?;
        let condition_depth = self.last;

        let result = if self.eat(&TokenKind::Question) {
            let then_expr = self.ternary()?;
            let then_depth = self.last;
            self.expect(&TokenKind::Colon)?;
            let else_expr = self.ternary()?;
            self.node(condition_depth.max(then_depth).max(self.last))?;
            Expr::Conditional {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            }
        } else {
            condition
        };

        self.depth -= 1;
        Ok(result)
    }

    fn elvis(&mut self) -> ExpressionResult<Expr> {
        let value = self.or()?;
        if self.eat(&TokenKind::Elvis) {
            let value_depth = self.last;
            self.enter()?;
            let fallback = self.elvis()?;
            self.depth -= 1;
            self.node(value_depth.max(self.last))?;
            return Ok(Expr::Elvis {
                value: Box::new(value),
                fallback: Box::new(fallback),
            });
        }
        Ok(value)
    }

    fn or(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::Or) {
            let left_depth = self.last;
            let right = self.and()?;
            self.node(left_depth.max(self.last))?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::And) {
            let left_depth = self.last;
            let right = self.equality()?;
            self.node(left_depth.max(self.last))?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOp::Equal,
                TokenKind::Ne => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let left_depth = self.last;
            let right = self.comparison()?;
            self.node(left_depth.max(self.last))?;
            left = binary(left, op, right);
        }
    }

    fn comparison(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::LessThan,
                TokenKind::Le => BinaryOp::LessEqual,
                TokenKind::Gt => BinaryOp::GreaterThan,
                TokenKind::Ge => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            let left_depth = self.last;
            let right = self.additive()?;
            self.node(left_depth.max(self.last))?;
            left = binary(left, op, right);
        }
    }

    fn additive(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let left_depth = self.last;
            let right = self.multiplicative()?;
            self.node(left_depth.max(self.last))?;
            left = binary(left, op, right);
        }
    }

    fn multiplicative(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            let left_depth = self.last;
            let right = self.unary()?;
            self.node(left_depth.max(self.last))?;
            left = binary(left, op, right);
        }
    }

    fn unary(&mut self) -> ExpressionResult<Expr> {
        match self.current().kind {
            TokenKind::Not | TokenKind::Bang => {
                self.advance();
                self.enter()?;
                let operand = self.unary()?;
                self.depth -= 1;
                self.node(self.last)?;
                Ok(Expr::Not(Box::new(operand)))
            }
            TokenKind::Minus => {
                self.advance();
                self.enter()?;
                let operand = self.unary()?;
                self.depth -= 1;
                Ok(match operand {
                    Expr::Literal(Value::Number(n)) => match n.as_i64() {
                        Some(i) => Expr::Literal(Value::from(-i)),
                        None => Expr::Literal(float_value(-n.as_f64().unwrap_or(0.0))),
                    },
                    other => {
                        self.node(self.last)?;
                        Expr::Negate(Box::new(other))
                    }
                })
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> ExpressionResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            let object_depth = self.last;
            if self.eat(&TokenKind::LBracket) {
                let index = self.ternary()?;
                self.expect(&TokenKind::RBracket)?;
                self.node(object_depth.max(self.last))?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = self.identifier()?;
                if self.eat(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    self.node(object_depth.max(self.last))?;
                    expr = Expr::MethodCall {
                        object: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    self.node(object_depth)?;
                    expr = Expr::Property {
                        object: Box::new(expr),
                        name,
                    };
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> ExpressionResult<Vec<Expr>> {
        let mut args = Vec::new();
        let mut deepest = 0;
        if self.eat(&TokenKind::RParen) {
            self.last = deepest;
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            deepest = deepest.max(self.last);
            if self.eat(&TokenKind::RParen) {
                self.last = deepest;
                return Ok(args);
            }
            self.expect(&TokenKind::Comma)?;
        }
    }

    fn primary(&mut self) -> ExpressionResult<Expr> {
        let token = self.current().clone();
        self.last = 1;
        match token.kind {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Expr::Literal(Value::from(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(float_value(f)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::Hash => {
                self.advance();
                Ok(Expr::Variable(self.identifier()?))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.ternary()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn identifier(&mut self) -> ExpressionResult<String> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> ExpressionResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::parse(
                self.current().position,
                format!("expression nested deeper than {}", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    /// Record a node built over children at most `child_depth` deep.
    fn node(&mut self, child_depth: usize) -> ExpressionResult<()> {
        let depth = child_depth + 1;
        if depth > MAX_TREE_DEPTH {
            return Err(ExpressionError::parse(
                self.current().position,
                format!("expression tree deeper than {}", MAX_TREE_DEPTH),
            ));
        }
        self.last = depth;
        Ok(())
    }

    fn current(&self) -> &Token {
        // tokenize always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ExpressionResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            let token = self.current();
            Err(ExpressionError::parse(
                token.position,
                format!(
                    "expected {} but found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn unexpected(&self) -> ExpressionError {
        let token = self.current();
        ExpressionError::parse(
            token.position,
            format!("unexpected {}", token.kind.describe()),
        )
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Convert an access chain like `ctx['a'].b` into an assignment target.
fn into_target(expr: Expr) -> Option<Target> {
    let mut path = Vec::new();
    let mut current = expr;

    loop {
        match current {
            Expr::Property { object, name } => {
                path.push(Accessor::Property(name));
                current = *object;
            }
            Expr::Index { object, index } => {
                path.push(Accessor::Index(*index));
                current = *object;
            }
            Expr::Variable(variable) if !path.is_empty() => {
                path.reverse();
                return Some(Target { variable, path });
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> Statement {
        let mut program = parse(source).unwrap();
        assert_eq!(program.statements.len(), 1);
        program.statements.remove(0)
    }

    #[test]
    fn test_precedence() {
        let Statement::Expr(expr) = single("1 + 2 * 3") else {
            panic!("expected expression");
        };
        assert_eq!(
            expr,
            binary(
                Expr::Literal(Value::from(1)),
                BinaryOp::Add,
                binary(
                    Expr::Literal(Value::from(2)),
                    BinaryOp::Multiply,
                    Expr::Literal(Value::from(3))
                )
            )
        );
    }

    #[test]
    fn test_dot_and_bracket_access() {
        let Statement::Expr(expr) = single("#payload.address['city']") else {
            panic!("expected expression");
        };
        assert_eq!(
            expr,
            Expr::Index {
                object: Box::new(Expr::Property {
                    object: Box::new(Expr::Variable("payload".to_string())),
                    name: "address".to_string(),
                }),
                index: Box::new(Expr::Literal(Value::from("city"))),
            }
        );
    }

    #[test]
    fn test_method_call() {
        let Statement::Expr(expr) = single("(#payload['email']).endsWith('.com')") else {
            panic!("expected expression");
        };
        assert!(matches!(
            expr,
            Expr::MethodCall { ref method, ref args, .. } if method == "endsWith" && args.len() == 1
        ));
    }

    #[test]
    fn test_assignment_target() {
        let statement = single("#ctx['fullName'] = #payload['first'] + ' ' + #payload['last']");
        let Statement::Assign { target, .. } = statement else {
            panic!("expected assignment");
        };
        assert_eq!(target.variable, "ctx");
        assert_eq!(
            target.path,
            vec![Accessor::Index(Expr::Literal(Value::from("fullName")))]
        );
    }

    #[test]
    fn test_assignment_requires_accessor() {
        let err = parse("#ctx = 1").unwrap_err();
        assert!(err.to_string().contains("left side of '='"));
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let Statement::Expr(expr) = single("a ? 1 : b ? 2 : 3") else {
            panic!("expected expression");
        };
        let Expr::Conditional { else_expr, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*else_expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_multiple_statements() {
        let program = parse("#ctx['a'] = 1; #ctx['b'] = 2;").unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn test_negative_literal_folds() {
        let Statement::Expr(expr) = single("-5") else {
            panic!("expected expression");
        };
        assert_eq!(expr, Expr::Literal(Value::from(-5)));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::parse(2, "unexpected 2")
        );
    }

    #[test]
    fn test_missing_colon() {
        let err = parse("a ? 1").unwrap_err();
        assert!(err.to_string().contains("expected Colon"));
    }

    #[test]
    fn test_depth_limit() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&source).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_elvis_chain_is_bounded() {
        let source = vec!["#x"; 5_000].join(" ?: ");
        let err = parse(&source).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_long_operator_chains_are_bounded() {
        for separator in [" + ", " and ", " == ", " * "] {
            let source = vec!["#x"; 200_000].join(separator);
            let err = parse(&source).unwrap_err();
            assert!(
                err.to_string().contains("tree deeper"),
                "{}: {}",
                separator,
                err
            );
        }

        let source = format!("#payload{}", ".a".repeat(1_000));
        assert!(parse(&source).is_err());
    }

    #[test]
    fn test_moderate_chain_is_accepted() {
        let source = vec!["1"; 200].join(" + ");
        assert!(parse(&source).is_ok());

        let source = vec!["#x"; 50].join(" ?: ");
        assert!(parse(&source).is_ok());
    }
}
