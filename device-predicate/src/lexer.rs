//! Tokenizer for predicate strings

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{PredicateError, PredicateResult};
use crate::predicate::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    And,
    Or,
    Is,
    True,
    False,
    Op(CompareOp),
    Ident(String),
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Dot => f.write_str("'.'"),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Is => f.write_str("IS"),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Op(op) => write!(f, "'{}'", op),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Str(s) => write!(f, "string '{}'", s),
            Token::Int(i) => write!(f, "number {}", i),
            Token::UInt(u) => write!(f, "number {}", u),
            Token::Float(x) => write!(f, "number {}", x),
        }
    }
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> PredicateResult<Vec<Spanned>> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match ch {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            '.' => single(&mut chars, Token::Dot),
            '&' => single(&mut chars, Token::Op(CompareOp::Mask)),
            '=' | '!' | '<' | '>' => operator(&mut chars, offset)?,
            '\'' | '"' => string(&mut chars, offset)?,
            c if c.is_ascii_digit() || c == '-' => number(&mut chars, input, offset)?,
            c if c.is_alphabetic() || c == '_' => word(&mut chars, input, offset),
            other => return Err(PredicateError::UnexpectedChar { ch: other, offset }),
        };

        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

fn single(chars: &mut Peekable<CharIndices<'_>>, token: Token) -> Token {
    chars.next();
    token
}

fn operator(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> PredicateResult<Token> {
    let Some((_, first)) = chars.next() else {
        return Err(PredicateError::UnexpectedEnd { expected: "operator" });
    };
    let equals = chars.next_if(|&(_, c)| c == '=').is_some();

    let op = match (first, equals) {
        ('=', true) => CompareOp::Eq,
        ('!', true) => CompareOp::Ne,
        ('<', true) => CompareOp::Le,
        ('<', false) => CompareOp::Lt,
        ('>', true) => CompareOp::Ge,
        ('>', false) => CompareOp::Gt,
        (ch, _) => return Err(PredicateError::UnexpectedChar { ch, offset }),
    };
    Ok(Token::Op(op))
}

fn string(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> PredicateResult<Token> {
    let Some((_, quote)) = chars.next() else {
        return Err(PredicateError::UnterminatedString { offset });
    };

    let mut text = String::new();
    for (_, c) in chars.by_ref() {
        if c == quote {
            return Ok(Token::Str(text));
        }
        text.push(c);
    }
    Err(PredicateError::UnterminatedString { offset })
}

fn number(chars: &mut Peekable<CharIndices<'_>>, input: &str, offset: usize) -> PredicateResult<Token> {
    let mut end = offset;
    let mut seen_dot = false;

    if let Some((i, '-')) = chars.peek().copied() {
        chars.next();
        end = i + 1;
    }

    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            end = i + 1;
        } else {
            break;
        }
        chars.next();
    }

    let text = &input[offset..end];
    let invalid = || PredicateError::InvalidNumber {
        text: text.to_string(),
        offset,
    };

    if seen_dot {
        return text.parse::<f64>().map(Token::Float).map_err(|_| invalid());
    }
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Token::Int(value));
    }
    text.parse::<u64>().map(Token::UInt).map_err(|_| invalid())
}

fn word(chars: &mut Peekable<CharIndices<'_>>, input: &str, offset: usize) -> Token {
    let mut end = offset;
    while let Some(&(i, c)) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }

    let text = &input[offset..end];
    match text.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "IS" => Token::Is,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        _ => Token::Ident(text.to_string()),
    }
}
