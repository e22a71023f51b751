// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tokenizer for snippet text.

use super::error::CompoundError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    True,
    False,

    For,
    If,
    Else,
    While,
    Do,
    Return,
    Break,
    Continue,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Question,
    Colon,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PlusPlus,
    MinusMinus,

    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, CompoundError> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        // Comments
        if c == '/' && i + 1 < bytes.len() {
            match bytes[i + 1] as char {
                '/' => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                '*' => {
                    i += 2;
                    loop {
                        if i + 1 >= bytes.len() {
                            return Err(CompoundError::parse(start, "unterminated block comment"));
                        }
                        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                    continue;
                }
                _ => {}
            }
        }

        // Number: [0-9]+(.[0-9]*)?([eE][+-]?[0-9]+)?f? or .[0-9]+...
        if c.is_ascii_digit()
            || (c == '.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit())
        {
            let mut is_float = false;
            while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'.' {
                is_float = true;
                i += 1;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && matches!(bytes[i] as char, 'e' | 'E') {
                is_float = true;
                let e_pos = i;
                i += 1;
                if i < bytes.len() && matches!(bytes[i] as char, '+' | '-') {
                    i += 1;
                }
                let exp_start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                if exp_start == i {
                    return Err(CompoundError::parse(e_pos, "invalid number exponent (expected digits)"));
                }
            }
            let text = &input[start..i];
            // HLSL-style float suffix
            if i < bytes.len() && matches!(bytes[i] as char, 'f' | 'F') {
                is_float = true;
                i += 1;
            }
            let kind = if is_float {
                TokenKind::Float(text.parse().map_err(|_| CompoundError::parse(start, "invalid number"))?)
            } else {
                let value = text
                    .parse::<i32>()
                    .map_err(|_| CompoundError::parse(start, "integer literal does not fit in 32 bits"))?;
                TokenKind::Int(i64::from(value))
            };
            out.push(Token { kind, span: Span { start, end: i } });
            continue;
        }

        // Ident or keyword
        if c.is_ascii_alphabetic() || c == '_' {
            i += 1;
            while i < bytes.len() && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let kind = match &input[start..i] {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "for" => TokenKind::For,
                "if" => TokenKind::If,
                "else" => TokenKind::Else,
                "while" => TokenKind::While,
                "do" => TokenKind::Do,
                "return" => TokenKind::Return,
                "break" => TokenKind::Break,
                "continue" => TokenKind::Continue,
                s => TokenKind::Ident(s.to_owned()),
            };
            out.push(Token { kind, span: Span { start, end: i } });
            continue;
        }

        // Two-char operators
        if i + 1 < bytes.len() {
            let kind = match &input[i..i + 2] {
                "&&" => Some(TokenKind::AndAnd),
                "||" => Some(TokenKind::OrOr),
                "==" => Some(TokenKind::EqEq),
                "!=" => Some(TokenKind::Ne),
                "<=" => Some(TokenKind::Le),
                ">=" => Some(TokenKind::Ge),
                "+=" => Some(TokenKind::PlusAssign),
                "-=" => Some(TokenKind::MinusAssign),
                "*=" => Some(TokenKind::StarAssign),
                "/=" => Some(TokenKind::SlashAssign),
                "++" => Some(TokenKind::PlusPlus),
                "--" => Some(TokenKind::MinusMinus),
                _ => None,
            };
            if let Some(kind) = kind {
                i += 2;
                out.push(Token { kind, span: Span { start, end: i } });
                continue;
            }
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => TokenKind::Bang,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            _ => return Err(CompoundError::parse(start, format!("unexpected character '{c}'"))),
        };
        i += 1;
        out.push(Token { kind, span: Span { start, end: i } });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
    });
    Ok(out)
}
