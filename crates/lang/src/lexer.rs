//! Hand-written lexer with source positions.

use ethnum::U256;

use crate::errors::{CompileError, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tok {
    Ident(String),
    /// Builtin name, an identifier with a `!` suffix.
    Builtin(String),
    IntLit(U256),
    /// Integer literal with the `i` suffix.
    SignedIntLit(U256),

    // Keywords.
    KwTxContract,
    KwTxScript,
    KwAssetScript,
    KwPub,
    KwPayable,
    KwFn,
    KwLet,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwEmit,
    KwEvent,
    KwTrue,
    KwFalse,

    // Punctuation.
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semi,
    Arrow,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    AndAnd,
    OrOr,
    Concat,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

pub fn lex(src: &str) -> Result<Vec<Token>, CompileError> {
    let mut out = Vec::new();
    let mut chars = src.chars().peekable();
    let mut line = 1u32;
    let mut col = 1u32;

    macro_rules! bump {
        () => {{
            let c = chars.next();
            if c == Some('\n') {
                line += 1;
                col = 1;
            } else if c.is_some() {
                col += 1;
            }
            c
        }};
    }

    loop {
        let span = Span { line, col };
        let Some(&c) = chars.peek() else {
            break;
        };

        if c.is_whitespace() {
            bump!();
            continue;
        }

        // Line comments.
        if c == '/' {
            let mut ahead = chars.clone();
            ahead.next();
            if ahead.peek() == Some(&'/') {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    bump!();
                }
                continue;
            }
        }

        if c.is_ascii_digit() {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || c == '_' {
                    text.push(c);
                    bump!();
                } else {
                    break;
                }
            }
            let digits: String = text.chars().filter(|c| *c != '_').collect();
            let value = U256::from_str_radix(&digits, 10)
                .map_err(|_| CompileError::Parse(format!("bad integer `{text}`"), span))?;
            if chars.peek() == Some(&'i') {
                bump!();
                out.push(Token {
                    tok: Tok::SignedIntLit(value),
                    span,
                });
            } else {
                out.push(Token {
                    tok: Tok::IntLit(value),
                    span,
                });
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    text.push(c);
                    bump!();
                } else {
                    break;
                }
            }
            let tok = match text.as_str() {
                "TxContract" => Tok::KwTxContract,
                "TxScript" => Tok::KwTxScript,
                "AssetScript" => Tok::KwAssetScript,
                "pub" => Tok::KwPub,
                "payable" => Tok::KwPayable,
                "fn" => Tok::KwFn,
                "let" => Tok::KwLet,
                "if" => Tok::KwIf,
                "else" => Tok::KwElse,
                "while" => Tok::KwWhile,
                "return" => Tok::KwReturn,
                "emit" => Tok::KwEmit,
                "event" => Tok::KwEvent,
                "true" => Tok::KwTrue,
                "false" => Tok::KwFalse,
                _ => {
                    // `name!` is a builtin call, but `name !=` is not.
                    let mut ahead = chars.clone();
                    if ahead.next() == Some('!') && ahead.peek() != Some(&'=') {
                        bump!();
                        Tok::Builtin(text)
                    } else {
                        Tok::Ident(text)
                    }
                }
            };
            out.push(Token { tok, span });
            continue;
        }

        bump!();
        let next = chars.peek().copied();
        let tok = match (c, next) {
            ('-', Some('>')) => {
                bump!();
                Tok::Arrow
            }
            ('=', Some('=')) => {
                bump!();
                Tok::EqEq
            }
            ('!', Some('=')) => {
                bump!();
                Tok::NotEq
            }
            ('<', Some('=')) => {
                bump!();
                Tok::Le
            }
            ('>', Some('=')) => {
                bump!();
                Tok::Ge
            }
            ('&', Some('&')) => {
                bump!();
                Tok::AndAnd
            }
            ('|', Some('|')) => {
                bump!();
                Tok::OrOr
            }
            ('+', Some('+')) => {
                bump!();
                Tok::Concat
            }
            ('(', _) => Tok::LParen,
            (')', _) => Tok::RParen,
            ('{', _) => Tok::LBrace,
            ('}', _) => Tok::RBrace,
            ('[', _) => Tok::LBracket,
            (']', _) => Tok::RBracket,
            (',', _) => Tok::Comma,
            (':', _) => Tok::Colon,
            (';', _) => Tok::Semi,
            ('=', _) => Tok::Assign,
            ('<', _) => Tok::Lt,
            ('>', _) => Tok::Gt,
            ('+', _) => Tok::Plus,
            ('-', _) => Tok::Minus,
            ('*', _) => Tok::Star,
            ('/', _) => Tok::Slash,
            ('%', _) => Tok::Percent,
            ('!', _) => Tok::Not,
            _ => {
                return Err(CompileError::Parse(format!("unexpected character `{c}`"), span));
            }
        };
        out.push(Token { tok, span });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_basic() {
        let toks = lex("pub fn add(a: U256) -> U256 { return a + 1 }").unwrap();
        assert_eq!(toks[0].tok, Tok::KwPub);
        assert_eq!(toks[1].tok, Tok::KwFn);
        assert_eq!(toks[2].tok, Tok::Ident("add".into()));
        assert!(toks.iter().any(|t| t.tok == Tok::Arrow));
        assert!(toks.iter().any(|t| t.tok == Tok::IntLit(U256::ONE)));
    }

    #[test]
    fn test_lex_builtin_and_signed() {
        let toks = lex("blake2b!(x) 5i").unwrap();
        assert_eq!(toks[0].tok, Tok::Builtin("blake2b".into()));
        assert_eq!(
            toks.last().unwrap().tok,
            Tok::SignedIntLit(U256::from(5u8))
        );
    }

    #[test]
    fn test_lex_comments_and_positions() {
        let toks = lex("// nothing\nlet x = 2").unwrap();
        assert_eq!(toks[0].tok, Tok::KwLet);
        assert_eq!(toks[0].span.line, 2);
    }

    #[test]
    fn test_lex_rejects_garbage() {
        assert!(lex("let @ = 1").is_err());
    }
}
