// A hand-written recursive-descent parser.
//
// The interesting production is `arithmetic`: it is right-recursive,
// which is what gives this language its documented non-precedence
// lowering. `2 + 3 * 4` parses as `Add(2, Mul(3, 4))`, not a flat
// left-to-right chain -- the textually later operator binds its
// operands first, because each right-hand side is itself a full
// recursive `arithmetic` parse rather than a single primary. See
// `bytecode.rs` for what that tree shape means once it is lowered.
use crate::ast::{node, AstNode, BinOp, CondOp, Node, UnOp};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, position: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.position).cloned();
        if t.is_some() {
            self.position += 1;
        }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn consume(&mut self, kind: TokenKind) -> PResult<Token> {
        match self.advance() {
            Some(t) if t.kind == kind => Ok(t),
            Some(t) => Err(ParseError::UnexpectedToken {
                expected: vec![kind],
                found: t.kind,
                position: t.start,
            }),
            None => Err(ParseError::UnexpectedEof { expected: vec![kind] }),
        }
    }

    // Public entry point: parses the whole token stream as a
    // top-level block, with no trailing `end`.
    pub fn parse(&mut self) -> PResult<Node> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.parse_statement()?);
        }
        Ok(node(AstNode::Block(stmts)))
    }

    fn parse_statement(&mut self) -> PResult<Node> {
        let expr = self.parse_expression()?;
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }
        Ok(expr)
    }

    fn parse_statements_until(&mut self, stop: &[TokenKind]) -> PResult<Vec<Node>> {
        let mut stmts = Vec::new();
        while self.peek_kind().map(|k| !stop.contains(&k)).unwrap_or(false) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_expression(&mut self) -> PResult<Node> {
        let mut left = self.parse_arithmetic()?;

        if let Some(op) = self.peek_kind().and_then(cond_op) {
            self.advance();
            let right = self.parse_arithmetic()?;
            left = node(AstNode::Condition { left, right, op });

            while let Some(op) = self.peek_kind().and_then(cond_op) {
                self.advance();
                let right = self.parse_arithmetic()?;
                left = node(AstNode::Condition { left, right, op });
            }
        }

        if self.check(TokenKind::Assign) {
            self.advance();
            let value = self.parse_expression()?;
            return Ok(node(AstNode::Assignment { target: left, value }));
        }

        Ok(left)
    }

    // Right-recursive: the right-hand side of an arithmetic operator
    // is a full arithmetic parse, not a single postfix term.
    fn parse_arithmetic(&mut self) -> PResult<Node> {
        let left = self.parse_postfix()?;

        if let Some(op) = self.peek_kind().and_then(arith_op) {
            self.advance();
            let right = self.parse_arithmetic()?;
            return Ok(node(AstNode::BinaryOperation { left, right, op }));
        }

        Ok(left)
    }

    fn parse_postfix(&mut self) -> PResult<Node> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(TokenKind::LParen) {
                self.advance();
                let args = self.parse_args(TokenKind::RParen)?;
                self.consume(TokenKind::RParen)?;
                expr = node(AstNode::Call { callee: expr, args });
            } else if self.check(TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket)?;
                expr = node(AstNode::Indexation { container: expr, index });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self, close: TokenKind) -> PResult<Node> {
        let mut args = Vec::new();
        if !self.check(close) {
            args.push(self.parse_expression()?);
            while self.check(TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        Ok(node(AstNode::Args(args)))
    }

    fn parse_primary(&mut self) -> PResult<Node> {
        let kind = match self.peek_kind() {
            Some(k) => k,
            None => return Err(ParseError::UnexpectedEof { expected: vec![] }),
        };

        match kind {
            TokenKind::Number | TokenKind::Str | TokenKind::True | TokenKind::False | TokenKind::Null => {
                let token = self.advance().unwrap();
                Ok(node(AstNode::Literal(token)))
            }
            TokenKind::Id => {
                let token = self.advance().unwrap();
                Ok(node(AstNode::Identifier(token.text)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen)?;
                Ok(node(AstNode::Parenthesized(inner)))
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_array_elements()?;
                self.consume(TokenKind::RBracket)?;
                Ok(node(AstNode::Array(elements)))
            }
            TokenKind::Fn => self.parse_fn_define(),
            TokenKind::Return => self.parse_unary(UnOp::Return),
            TokenKind::Delay => self.parse_unary(UnOp::Delay),
            TokenKind::Output => self.parse_unary(UnOp::Output),
            TokenKind::Using => self.parse_unary(UnOp::Using),
            TokenKind::If => self.parse_if(),
            found => Err(ParseError::UnexpectedToken {
                expected: vec![],
                found,
                position: self.peek().map(|t| t.start).unwrap_or(0),
            }),
        }
    }

    fn parse_array_elements(&mut self) -> PResult<Vec<Node>> {
        let mut elements = Vec::new();
        if !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            while self.check(TokenKind::Comma) {
                self.advance();
                elements.push(self.parse_expression()?);
            }
        }
        Ok(elements)
    }

    fn parse_unary(&mut self, op: UnOp) -> PResult<Node> {
        self.advance();
        let operand = self.parse_expression()?;
        Ok(node(AstNode::UnaryOperation { op, operand }))
    }

    fn parse_fn_define(&mut self) -> PResult<Node> {
        self.consume(TokenKind::Fn)?;
        let name = self.consume(TokenKind::Id)?.text;
        self.consume(TokenKind::LParen)?;
        let args = self.parse_args(TokenKind::RParen)?;
        self.consume(TokenKind::RParen)?;
        self.consume(TokenKind::Colon)?;
        let body_stmts = self.parse_statements_until(&[TokenKind::End])?;
        self.consume(TokenKind::End)?;
        let body = node(AstNode::Block(body_stmts));
        Ok(node(AstNode::FnDefine { name, args, body }))
    }

    fn parse_if(&mut self) -> PResult<Node> {
        self.consume(TokenKind::If)?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::Colon)?;

        let then_stmts = self.parse_statements_until(&[TokenKind::Else, TokenKind::End])?;
        let then_body = node(AstNode::Block(then_stmts));

        let else_body = if self.check(TokenKind::Else) {
            self.advance();
            self.consume(TokenKind::Colon)?;
            let else_stmts = self.parse_statements_until(&[TokenKind::End])?;
            Some(node(AstNode::Block(else_stmts)))
        } else {
            None
        };

        self.consume(TokenKind::End)?;
        Ok(node(AstNode::IfStatement { condition, then_body, else_body }))
    }
}

fn arith_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Plus => Some(BinOp::Add),
        TokenKind::Minus => Some(BinOp::Sub),
        TokenKind::Star => Some(BinOp::Mul),
        TokenKind::Slash => Some(BinOp::Div),
        _ => None,
    }
}

fn cond_op(kind: TokenKind) -> Option<CondOp> {
    match kind {
        TokenKind::EqEq => Some(CondOp::Eq),
        TokenKind::NotEq => Some(CondOp::NotEq),
        TokenKind::Gt => Some(CondOp::Bigger),
        TokenKind::Lt => Some(CondOp::Smaller),
        TokenKind::Gte => Some(CondOp::BiggerOrEq),
        TokenKind::Lte => Some(CondOp::SmallerOrEq),
        TokenKind::And => Some(CondOp::And),
        TokenKind::Or => Some(CondOp::Or),
        _ => None,
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Node> {
    Parser::new(tokens).parse()
}
