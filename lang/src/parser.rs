//! Recursive-descent parser for the surface language
//!
//! Grammar:
//!
//! ```text
//! file        := command*
//! command     := def | show | save | setting
//! def         := "def" id ":=" expr "end"
//!              | "def" id ":=" "begin" command* "end"
//! expr        := "load" string
//!              | "proof" "[" id+ "]" ":" pre body post
//!              | "{" herm_ls "}"
//! pre, post   := "{" herm_ls "}"
//! herm_ls     := ( path "[" id+ "]" )+
//! body        := stmt ( ";" stmt )*
//! stmt        := "skip" | "abort"
//!              | placement ":=" "0"
//!              | placement "*=" path
//!              | "if" path "[" id+ "]" "then" body "else" body "end"
//!              | "{" "inv" ":" herm_ls "}" ";"
//!                "while" path "[" id+ "]" "do" body "end"
//!              | "(" body ( "#" body )+ ")"
//!              | "{" herm_ls "}"
//! placement   := "[" id+ "]" | id          -- single-qubit sugar
//! show        := "show" path
//! save        := "save" path string
//! setting     := "setting" id ":=" ( number | "true" | "false" )
//! path        := id ( "." id )*
//! ```

use crate::error::{LangError, Result};
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

/// A top-level command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Def { name: String, expr: Expr },
    Show { path: Vec<String> },
    Save { path: Vec<String>, file: String },
    Setting { key: String, value: SettingLit },
}

/// A setting literal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingLit {
    Float(f64),
    Bool(bool),
}

/// The right-hand side of a definition
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Load(String),
    Proof(ProofExpr),
    Predicate(Vec<OperatorRef>),
    Scope(Vec<Command>),
}

/// An unresolved proof term
#[derive(Debug, Clone, PartialEq)]
pub struct ProofExpr {
    pub register: Vec<String>,
    pub pre: Vec<OperatorRef>,
    pub body: Vec<Stmt>,
    pub post: Vec<OperatorRef>,
}

/// A reference to a named operator placed on qubits
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRef {
    pub path: Vec<String>,
    pub qubits: Vec<String>,
    pub line: usize,
    pub col: usize,
}

/// An unresolved statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Skip,
    Abort,
    Init { qubits: Vec<String> },
    Unitary(OperatorRef),
    If {
        guard: OperatorRef,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        invariant: Vec<OperatorRef>,
        guard: OperatorRef,
        body: Vec<Stmt>,
    },
    Choice(Vec<Vec<Stmt>>),
    Assert(Vec<OperatorRef>),
}

/// Parse a whole source file into commands
pub fn parse(source: &str) -> Result<Vec<Command>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut commands = Vec::new();
    while parser.peek().kind != TokenKind::Eof {
        commands.push(parser.command()?);
    }
    Ok(commands)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek_kind() == &kind {
            Ok(self.bump())
        } else {
            let token = self.peek();
            Err(LangError::syntax(
                token.line,
                token.col,
                format!(
                    "expected {} but found {}",
                    kind.describe(),
                    token.kind.describe()
                ),
            ))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek_kind() {
            TokenKind::Ident(_) => {
                let TokenKind::Ident(name) = self.bump().kind else {
                    unreachable!()
                };
                Ok(name)
            }
            _ => {
                let token = self.peek();
                Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("expected identifier but found {}", token.kind.describe()),
                ))
            }
        }
    }

    fn path(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![self.ident()?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.ident()?);
        }
        Ok(segments)
    }

    fn string(&mut self) -> Result<String> {
        match self.peek_kind() {
            TokenKind::Str(_) => {
                let TokenKind::Str(text) = self.bump().kind else {
                    unreachable!()
                };
                Ok(text)
            }
            _ => {
                let token = self.peek();
                Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("expected string but found {}", token.kind.describe()),
                ))
            }
        }
    }

    // ==================== Commands ====================

    fn command(&mut self) -> Result<Command> {
        match self.peek_kind() {
            TokenKind::Def => self.def(),
            TokenKind::Show => {
                self.bump();
                Ok(Command::Show { path: self.path()? })
            }
            TokenKind::Save => {
                self.bump();
                let path = self.path()?;
                let file = self.string()?;
                Ok(Command::Save { path, file })
            }
            TokenKind::Setting => self.setting(),
            _ => {
                let token = self.peek();
                Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("expected a command but found {}", token.kind.describe()),
                ))
            }
        }
    }

    fn def(&mut self) -> Result<Command> {
        self.expect(TokenKind::Def)?;
        let name = self.ident()?;
        self.expect(TokenKind::ColonEq)?;
        // A scope body brings its own terminating `end`.
        if self.eat(&TokenKind::Begin) {
            let mut commands = Vec::new();
            while self.peek_kind() != &TokenKind::End {
                if self.peek_kind() == &TokenKind::Eof {
                    let token = self.peek();
                    return Err(LangError::syntax(
                        token.line,
                        token.col,
                        "unterminated scope body, expected 'end'",
                    ));
                }
                commands.push(self.command()?);
            }
            self.expect(TokenKind::End)?;
            return Ok(Command::Def {
                name,
                expr: Expr::Scope(commands),
            });
        }
        let expr = self.expr()?;
        self.expect(TokenKind::End)?;
        Ok(Command::Def { name, expr })
    }

    fn setting(&mut self) -> Result<Command> {
        self.expect(TokenKind::Setting)?;
        let key = self.ident()?;
        self.expect(TokenKind::ColonEq)?;
        let token = self.bump();
        let value = match token.kind {
            TokenKind::Number(x) => SettingLit::Float(x),
            TokenKind::True => SettingLit::Bool(true),
            TokenKind::False => SettingLit::Bool(false),
            other => {
                return Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!(
                        "expected a number or boolean but found {}",
                        other.describe()
                    ),
                ))
            }
        };
        Ok(Command::Setting { key, value })
    }

    // ==================== Expressions ====================

    fn expr(&mut self) -> Result<Expr> {
        match self.peek_kind() {
            TokenKind::Load => {
                self.bump();
                Ok(Expr::Load(self.string()?))
            }
            TokenKind::Proof => self.proof().map(Expr::Proof),
            TokenKind::LBrace => {
                self.bump();
                let refs = self.herm_list()?;
                self.expect(TokenKind::RBrace)?;
                Ok(Expr::Predicate(refs))
            }
            _ => {
                let token = self.peek();
                Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("expected an expression but found {}", token.kind.describe()),
                ))
            }
        }
    }

    fn proof(&mut self) -> Result<ProofExpr> {
        self.expect(TokenKind::Proof)?;
        self.expect(TokenKind::LBracket)?;
        let register = self.qubit_list()?;
        self.expect(TokenKind::RBracket)?;
        self.expect(TokenKind::Colon)?;

        self.expect(TokenKind::LBrace)?;
        let pre = self.herm_list()?;
        self.expect(TokenKind::RBrace)?;

        let body = self.body()?;

        self.expect(TokenKind::LBrace)?;
        let post = self.herm_list()?;
        self.expect(TokenKind::RBrace)?;

        Ok(ProofExpr {
            register,
            pre,
            body,
            post,
        })
    }

    // ==================== Statements ====================

    fn body(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = vec![self.stmt()?];
        while self.eat(&TokenKind::Semicolon) {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt> {
        match self.peek_kind() {
            TokenKind::Skip => {
                self.bump();
                Ok(Stmt::Skip)
            }
            TokenKind::Abort => {
                self.bump();
                Ok(Stmt::Abort)
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::LBrace => self.brace_stmt(),
            TokenKind::LParen => self.choice(),
            TokenKind::LBracket | TokenKind::Ident(_) => self.placement_stmt(),
            _ => {
                let token = self.peek();
                Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("expected a statement but found {}", token.kind.describe()),
                ))
            }
        }
    }

    /// `[q ...] := 0`, `[q ...] *= U`, or the single-qubit sugar without
    /// brackets
    fn placement_stmt(&mut self) -> Result<Stmt> {
        let qubits = if self.eat(&TokenKind::LBracket) {
            let names = self.qubit_list()?;
            self.expect(TokenKind::RBracket)?;
            names
        } else {
            vec![self.ident()?]
        };

        if self.eat(&TokenKind::ColonEq) {
            let token = self.bump();
            match token.kind {
                TokenKind::Number(x) if x == 0.0 => Ok(Stmt::Init { qubits }),
                other => Err(LangError::syntax(
                    token.line,
                    token.col,
                    format!("initialization expects 0 but found {}", other.describe()),
                )),
            }
        } else {
            let token = self.expect(TokenKind::StarEq)?;
            let path = self.path()?;
            Ok(Stmt::Unitary(OperatorRef {
                path,
                qubits,
                line: token.line,
                col: token.col,
            }))
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::If)?;
        let guard = self.operator_ref()?;
        self.expect(TokenKind::Then)?;
        let then_body = self.body()?;
        self.expect(TokenKind::Else)?;
        let else_body = self.body()?;
        self.expect(TokenKind::End)?;
        Ok(Stmt::If {
            guard,
            then_body,
            else_body,
        })
    }

    /// `{ inv: ... }; while ...` or a standalone intermediate assertion
    fn brace_stmt(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::LBrace)?;
        if self.eat(&TokenKind::Inv) {
            self.expect(TokenKind::Colon)?;
            let invariant = self.herm_list()?;
            self.expect(TokenKind::RBrace)?;
            self.expect(TokenKind::Semicolon)?;
            self.expect(TokenKind::While)?;
            let guard = self.operator_ref()?;
            self.expect(TokenKind::Do)?;
            let body = self.body()?;
            self.expect(TokenKind::End)?;
            Ok(Stmt::While {
                invariant,
                guard,
                body,
            })
        } else {
            let refs = self.herm_list()?;
            self.expect(TokenKind::RBrace)?;
            Ok(Stmt::Assert(refs))
        }
    }

    fn choice(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::LParen)?;
        let mut branches = vec![self.body()?];
        while self.eat(&TokenKind::Hash) {
            branches.push(self.body()?);
        }
        let close = self.expect(TokenKind::RParen)?;
        if branches.len() < 2 {
            return Err(LangError::syntax(
                close.line,
                close.col,
                "nondeterministic choice needs at least two '#'-separated branches",
            ));
        }
        Ok(Stmt::Choice(branches))
    }

    // ==================== Shared pieces ====================

    /// `path [ q ... ]`
    fn operator_ref(&mut self) -> Result<OperatorRef> {
        let token = self.peek().clone();
        let path = self.path()?;
        self.expect(TokenKind::LBracket)?;
        let qubits = self.qubit_list()?;
        self.expect(TokenKind::RBracket)?;
        Ok(OperatorRef {
            path,
            qubits,
            line: token.line,
            col: token.col,
        })
    }

    fn herm_list(&mut self) -> Result<Vec<OperatorRef>> {
        let mut refs = vec![self.operator_ref()?];
        while matches!(self.peek_kind(), TokenKind::Ident(_)) {
            refs.push(self.operator_ref()?);
        }
        Ok(refs)
    }

    fn qubit_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.ident()?];
        while matches!(self.peek_kind(), TokenKind::Ident(_)) {
            names.push(self.ident()?);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flip_proof() {
        let source = r#"
            def flip := proof [q] :
                { P0[q] }
                q *= X
                { P1[q] }
            end
        "#;
        let commands = parse(source).unwrap();
        assert_eq!(commands.len(), 1);
        let Command::Def { name, expr } = &commands[0] else {
            panic!("expected def");
        };
        assert_eq!(name, "flip");
        let Expr::Proof(proof) = expr else {
            panic!("expected proof");
        };
        assert_eq!(proof.register, vec!["q"]);
        assert_eq!(proof.body.len(), 1);
        assert!(matches!(&proof.body[0], Stmt::Unitary(op) if op.path == vec!["X"]));
    }

    #[test]
    fn test_parse_loop() {
        let source = r#"
            def looped := proof [q] :
                { I[q] }
                { inv: I[q] };
                while M10[q] do
                    q *= H
                end
                { P0[q] }
            end
        "#;
        let commands = parse(source).unwrap();
        let Command::Def {
            expr: Expr::Proof(proof),
            ..
        } = &commands[0]
        else {
            panic!("expected proof def");
        };
        let Stmt::While {
            invariant, guard, ..
        } = &proof.body[0]
        else {
            panic!("expected while");
        };
        assert_eq!(invariant.len(), 1);
        assert_eq!(guard.path, vec!["M10"]);
    }

    #[test]
    fn test_parse_choice_and_init() {
        let source = r#"
            def pf := proof [q q1] :
                { Idiv2[q q1] }
                [q q1] := 0;
                ( skip # [q q1] *= CX # q1 *= X )
                { Eq01_2[q q1] }
            end
        "#;
        let commands = parse(source).unwrap();
        let Command::Def {
            expr: Expr::Proof(proof),
            ..
        } = &commands[0]
        else {
            panic!("expected proof def");
        };
        assert!(matches!(&proof.body[0], Stmt::Init { qubits } if qubits.len() == 2));
        let Stmt::Choice(branches) = &proof.body[1] else {
            panic!("expected choice");
        };
        assert_eq!(branches.len(), 3);
    }

    #[test]
    fn test_parse_commands() {
        let source = r#"
            setting EPS := 1e-6
            setting SILENT := true
            show lib.P0
            save P0 "out/p0.json"
        "#;
        let commands = parse(source).unwrap();
        assert_eq!(commands.len(), 4);
        assert!(matches!(
            &commands[0],
            Command::Setting {
                key,
                value: SettingLit::Float(x)
            } if key == "EPS" && *x == 1e-6
        ));
        assert!(matches!(
            &commands[2],
            Command::Show { path } if path == &vec!["lib".to_string(), "P0".to_string()]
        ));
    }

    #[test]
    fn test_single_branch_choice_rejected() {
        let source = r#"
            def pf := proof [q] :
                { P0[q] }
                ( skip )
                { P0[q] }
            end
        "#;
        assert!(matches!(parse(source), Err(LangError::Syntax { .. })));
    }

    #[test]
    fn test_parse_scope_def() {
        let source = r#"
            def sub := begin
                setting SILENT := true
            end
        "#;
        let commands = parse(source).unwrap();
        assert!(matches!(
            &commands[0],
            Command::Def {
                expr: Expr::Scope(inner),
                ..
            } if inner.len() == 1
        ));
    }

    #[test]
    fn test_error_position() {
        let err = parse("def := load \"x\" end").unwrap_err();
        let LangError::Syntax { line, col, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!(line, 1);
        assert!(col > 1);
    }
}
