use crate::ast::*;
use crate::lexer::Token;
use logos::Logos;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token '{token}' on line {line}")]
    UnexpectedToken { token: String, line: usize },
    #[error("Expected {expected}, found '{found}' on line {line}")]
    Expected {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("Unrecognized input '{text}' on line {line}")]
    InvalidToken { text: String, line: usize },
    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// Tokenize `source`, pairing every token with the line it starts on.
pub fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut scanned = 0;
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;
        match token {
            Ok(token) => tokens.push((token, line)),
            Err(()) => {
                return Err(ParseError::InvalidToken {
                    text: lexer.slice().to_string(),
                    line,
                })
            }
        }
    }
    Ok(tokens)
}

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, line)| *line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<Token, ParseError> {
        match self.peek() {
            Some(t) if std::mem::discriminant(t) == std::mem::discriminant(&expected) => {
                Ok(self.advance().unwrap_or(expected))
            }
            Some(t) => Err(ParseError::Expected {
                expected: format!("'{}'", expected),
                found: t.to_string(),
                line: self.line(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn is_type(&self) -> bool {
        matches!(self.peek(), Some(t) if t.is_type())
    }

    fn unexpected(&self, token: Option<Token>) -> ParseError {
        match token {
            Some(t) => ParseError::UnexpectedToken {
                token: t.to_string(),
                line: self.line(),
            },
            None => ParseError::UnexpectedEof,
        }
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        match self.advance() {
            Some(Token::Int) => Ok(Type::Int),
            Some(Token::Bool) => Ok(Type::Bool),
            Some(Token::Void) => Ok(Type::Void),
            Some(t) => Err(ParseError::Expected {
                expected: "type".to_string(),
                found: t.to_string(),
                line: self.line(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::Identifier(s)) => Ok(s),
            Some(t) => Err(ParseError::Expected {
                expected: "identifier".to_string(),
                found: t.to_string(),
                line: self.line(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut declarations = Vec::new();
        while self.peek().is_some() {
            let ty = self.parse_type()?;
            let name = self.parse_identifier()?;
            if self.check(&Token::LParen) {
                declarations.push(Decl::Fun(self.parse_function(ty, name)?));
            } else {
                declarations.push(Decl::Var(self.parse_var_decl_rest(ty, name)?));
            }
        }
        Ok(Program { declarations })
    }

    fn parse_function(&mut self, return_type: Type, name: String) -> Result<FunDecl, ParseError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let ty = self.parse_type()?;
                let name = self.parse_identifier()?;
                params.push(Param { ty, name });
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;

        Ok(FunDecl {
            return_type,
            name,
            params,
            body,
        })
    }

    fn parse_var_decl_rest(&mut self, ty: Type, name: String) -> Result<VarDecl, ParseError> {
        let init = if self.check(&Token::Assign) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(Token::Semicolon)?;
        Ok(VarDecl { ty, name, init })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof);
            }
            statements.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(Block { statements })
    }

    pub fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        // Variable declaration
        if self.is_type() {
            let ty = self.parse_type()?;
            let name = self.parse_identifier()?;
            return Ok(Stmt::VarDecl(self.parse_var_decl_rest(ty, name)?));
        }

        if self.check(&Token::LBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        if self.check(&Token::If) {
            self.advance();
            self.expect(Token::LParen)?;
            let cond = self.parse_expr()?;
            self.expect(Token::RParen)?;
            let then_branch = Box::new(self.parse_stmt()?);
            let else_branch = if self.check(&Token::Else) {
                self.advance();
                Some(Box::new(self.parse_stmt()?))
            } else {
                None
            };
            return Ok(Stmt::If(cond, then_branch, else_branch));
        }

        if self.check(&Token::While) {
            self.advance();
            self.expect(Token::LParen)?;
            let cond = self.parse_expr()?;
            self.expect(Token::RParen)?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt::While(cond, body));
        }

        if self.check(&Token::Return) {
            self.advance();
            let value = if self.check(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(Token::Semicolon)?;
            return Ok(Stmt::Return(value));
        }

        let expr = self.parse_expr()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        // Assignment is right associative: a = b = 1
        if let (Some(Token::Identifier(name)), Some(Token::Assign)) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.advance();
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Expr::Assign(name, Box::new(value)));
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinOp(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.check(&Token::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::BinOp(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinOp::Eq,
                Some(Token::NotEqual) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinOp::Lt,
                Some(Token::Greater) => BinOp::Gt,
                Some(Token::LessEqual) => BinOp::Le,
                Some(Token::GreaterEqual) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Not) => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::UnaryOp(op, Box::new(operand)))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.check(&Token::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            Some(Token::IntLiteral(n)) => {
                self.advance();
                Ok(Expr::IntLit(n))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::BoolLit(true))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::BoolLit(false))
            }
            Some(Token::Print) => {
                self.advance();
                self.expect(Token::LParen)?;
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Print(Box::new(expr)))
            }
            Some(Token::Identifier(name)) => {
                self.advance();
                if self.check(&Token::LParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            other => Err(self.unexpected(other)),
        }
    }
}

/// Parse a whole MicroC source file.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    Parser::new(source)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::IntLit(n))
    }

    #[test]
    fn parses_globals_and_functions() {
        let program = parse_program("int g = 1; int main() { return g; }").unwrap();
        assert_eq!(
            program,
            Program {
                declarations: vec![
                    Decl::Var(VarDecl {
                        ty: Type::Int,
                        name: "g".to_string(),
                        init: Some(Expr::IntLit(1)),
                    }),
                    Decl::Fun(FunDecl {
                        return_type: Type::Int,
                        name: "main".to_string(),
                        params: vec![],
                        body: Block {
                            statements: vec![Stmt::Return(Some(Expr::Var("g".to_string())))],
                        },
                    }),
                ],
            }
        );
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = Parser::new("1 + 2 * 3").unwrap().parse_expr().unwrap();
        assert_eq!(
            expr,
            Expr::BinOp(int(1), BinOp::Add, Box::new(Expr::BinOp(int(2), BinOp::Mul, int(3))))
        );
    }

    #[test]
    fn logical_operators_bind_looser_than_comparisons() {
        let expr = Parser::new("1 < 2 && 3 == 3 || false").unwrap().parse_expr().unwrap();
        let lt = Expr::BinOp(int(1), BinOp::Lt, int(2));
        let eq = Expr::BinOp(int(3), BinOp::Eq, int(3));
        let and = Expr::BinOp(Box::new(lt), BinOp::And, Box::new(eq));
        assert_eq!(
            expr,
            Expr::BinOp(Box::new(and), BinOp::Or, Box::new(Expr::BoolLit(false)))
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = Parser::new("a = b = 2").unwrap().parse_expr().unwrap();
        assert_eq!(
            expr,
            Expr::Assign(
                "a".to_string(),
                Box::new(Expr::Assign("b".to_string(), int(2)))
            )
        );
    }

    #[test]
    fn print_is_an_expression() {
        let stmt = Parser::new("return print(x) * 2;").unwrap().parse_stmt().unwrap();
        assert_eq!(
            stmt,
            Stmt::Return(Some(Expr::BinOp(
                Box::new(Expr::Print(Box::new(Expr::Var("x".to_string())))),
                BinOp::Mul,
                int(2)
            )))
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let stmt = Parser::new("if (a) if (b) x = 1; else x = 2;")
            .unwrap()
            .parse_stmt()
            .unwrap();
        match stmt {
            Stmt::If(_, inner, None) => assert!(matches!(*inner, Stmt::If(_, _, Some(_)))),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn missing_semicolon_reports_line() {
        let err = parse_program("int main() {\n  return 1\n}").unwrap_err();
        assert_eq!(
            err,
            ParseError::Expected {
                expected: "';'".to_string(),
                found: "}".to_string(),
                line: 3,
            }
        );
    }

    #[test]
    fn invalid_character_is_rejected() {
        let err = parse_program("int main() { return 1 $ 2; }").unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { ref text, line: 1 } if text == "$"));
    }

    #[test]
    fn unterminated_block_is_eof() {
        let err = parse_program("int main() { return 1;").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof);
    }
}
