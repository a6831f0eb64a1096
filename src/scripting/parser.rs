//! Recursive-descent parser producing expression statements.
//!
//! The grammar is deliberately closed: literals, identifier references,
//! member access, calls, and zero-argument arrow closures. There are no
//! operators, declarations, or control flow, which keeps the sandbox
//! surface auditable.

use super::ScriptError;
use super::lexer::{Token, lex};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Ident(String),
    Member(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    /// Zero-argument closure: `() => expr` or `() => { stmts }`.
    Arrow(Vec<Expr>),
}

pub fn parse(source: &str) -> Result<Vec<Expr>, ScriptError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.program(None)?;
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse statements until EOF, or until `terminator` when parsing a
    /// closure body.
    fn program(&mut self, terminator: Option<&Token>) -> Result<Vec<Expr>, ScriptError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&Token::Semi) {}
            match (self.peek(), terminator) {
                (None, None) => break,
                (None, Some(_)) => return Err(self.error("unexpected end of script")),
                (Some(token), Some(term)) if token == term => break,
                _ => statements.push(self.expression()?),
            }
        }
        Ok(statements)
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = self.ident()?;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                expr = Expr::Call(Box::new(expr), args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" | "undefined" => Ok(Expr::Null),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::LParen) => {
                // `() =>` starts a closure; anything else is a grouped
                // expression.
                if self.eat(&Token::RParen) {
                    self.expect(&Token::Arrow)?;
                    self.arrow_body()
                } else {
                    let inner = self.expression()?;
                    self.expect(&Token::RParen)?;
                    Ok(inner)
                }
            }
            Some(other) => Err(self.error(&format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of script")),
        }
    }

    fn arrow_body(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Token::LBrace) {
            let body = self.program(Some(&Token::RBrace))?;
            self.expect(&Token::RBrace)?;
            Ok(Expr::Arrow(body))
        } else {
            Ok(Expr::Arrow(vec![self.expression()?]))
        }
    }

    fn ident(&mut self) -> Result<String, ScriptError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => Err(self.error(&format!("expected identifier, found {other:?}"))),
            None => Err(self.error("expected identifier, found end of script")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ScriptError> {
        if self.eat(token) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(self.error(&format!("expected {token:?}, found {found:?}"))),
                None => Err(self.error(&format!("expected {token:?}, found end of script"))),
            }
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::Parse(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_member_call_chain() {
        let program = parse("environment.set('x', '1')").unwrap();
        assert_eq!(
            program,
            vec![Expr::Call(
                Box::new(Expr::Member(
                    Box::new(Expr::Ident("environment".into())),
                    "set".into()
                )),
                vec![Expr::Str("x".into()), Expr::Str("1".into())],
            )]
        );
    }

    #[test]
    fn parses_arrow_with_block_body() {
        let program = parse("test('t', () => { log('a'); log('b') })").unwrap();
        let Expr::Call(_, args) = &program[0] else {
            panic!("expected call");
        };
        let Expr::Arrow(body) = &args[1] else {
            panic!("expected closure");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn parses_arrow_with_expression_body() {
        let program = parse("test('t', () => expect(1).to.equal(1))").unwrap();
        let Expr::Call(_, args) = &program[0] else {
            panic!("expected call");
        };
        assert!(matches!(&args[1], Expr::Arrow(body) if body.len() == 1));
    }

    #[test]
    fn statements_do_not_require_semicolons() {
        let program = parse("log('a')\nlog('b');;log('c')").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn keywords_become_literals() {
        assert_eq!(
            parse("expect(true)").unwrap(),
            vec![Expr::Call(
                Box::new(Expr::Ident("expect".into())),
                vec![Expr::Bool(true)],
            )]
        );
    }

    #[test]
    fn rejects_dangling_member_access() {
        assert!(parse("response.").is_err());
        assert!(parse("test('t', () => {").is_err());
    }
}
