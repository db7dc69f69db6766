//! Recursive-descent parser
//!
//! ```text
//! expr       := term ( OR term )*
//! term       := factor ( AND factor )*
//! factor     := "(" expr ")" | "[" expr "]" | IS Interface | comparison
//! comparison := Interface "." property op literal
//! ```

use std::str::FromStr;

use device_backend::{InterfaceType, PropertyValue};

use crate::error::{PredicateError, PredicateResult};
use crate::lexer::{tokenize, Spanned, Token};
use crate::predicate::{CompareOp, Predicate};

/// Maximum nesting of `(...)` / `[...]` groups
pub const MAX_DEPTH: usize = 64;

pub(crate) fn parse(input: &str) -> PredicateResult<Predicate> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(Predicate::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let predicate = parser.expr()?;

    match parser.tokens.get(parser.pos) {
        None => Ok(predicate),
        Some(extra) => Err(unexpected("end of input", extra)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self, expected: &'static str) -> PredicateResult<Spanned> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(PredicateError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(spanned)
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> PredicateResult<()> {
        let spanned = self.next(expected)?;
        if spanned.token == token {
            Ok(())
        } else {
            Err(unexpected(expected, &spanned))
        }
    }

    fn expr(&mut self) -> PredicateResult<Predicate> {
        let mut operands = vec![self.term()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.term()?);
        }
        Ok(single_or(operands, Predicate::Or))
    }

    fn term(&mut self) -> PredicateResult<Predicate> {
        let mut operands = vec![self.factor()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.factor()?);
        }
        Ok(single_or(operands, Predicate::And))
    }

    fn factor(&mut self) -> PredicateResult<Predicate> {
        let spanned = self.next("expression")?;
        match spanned.token {
            Token::LParen => self.group(spanned.offset, Token::RParen, "')'"),
            Token::LBracket => self.group(spanned.offset, Token::RBracket, "']'"),
            Token::Is => {
                let ty = self.interface()?;
                Ok(Predicate::Is(ty))
            }
            Token::Ident(name) => self.comparison(&name),
            _ => Err(unexpected("expression", &spanned)),
        }
    }

    fn group(&mut self, offset: usize, close: Token, expected: &'static str) -> PredicateResult<Predicate> {
        if self.depth >= MAX_DEPTH {
            return Err(PredicateError::TooDeep { offset });
        }
        self.depth += 1;
        let inner = self.expr()?;
        self.depth -= 1;
        self.expect(close, expected)?;
        Ok(inner)
    }

    fn comparison(&mut self, interface: &str) -> PredicateResult<Predicate> {
        let ty = interface_type(interface)?;
        self.expect(Token::Dot, "'.'")?;

        let spanned = self.next("property name")?;
        let Token::Ident(property) = spanned.token else {
            return Err(unexpected("property name", &spanned));
        };

        let spanned = self.next("operator")?;
        let Token::Op(op) = spanned.token else {
            return Err(unexpected("operator", &spanned));
        };

        let value = self.literal()?;
        if op == CompareOp::Mask && !matches!(value, PropertyValue::Int(_) | PropertyValue::UInt(_)) {
            return Err(PredicateError::UnexpectedToken {
                expected: "integer mask",
                found: value.to_string(),
                offset: self.tokens[self.pos - 1].offset,
            });
        }

        Ok(Predicate::Compare {
            ty,
            property,
            op,
            value,
        })
    }

    fn interface(&mut self) -> PredicateResult<InterfaceType> {
        let spanned = self.next("interface name")?;
        match spanned.token {
            Token::Ident(name) => interface_type(&name),
            _ => Err(unexpected("interface name", &spanned)),
        }
    }

    fn literal(&mut self) -> PredicateResult<PropertyValue> {
        let spanned = self.next("literal")?;
        match spanned.token {
            Token::Str(s) => Ok(PropertyValue::Str(s)),
            Token::True => Ok(PropertyValue::Bool(true)),
            Token::False => Ok(PropertyValue::Bool(false)),
            Token::Int(i) => Ok(PropertyValue::Int(i)),
            Token::UInt(u) => Ok(PropertyValue::UInt(u)),
            Token::Float(x) => Ok(PropertyValue::Double(x)),
            _ => Err(unexpected("literal", &spanned)),
        }
    }
}

fn single_or(mut operands: Vec<Predicate>, combine: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        combine(operands)
    }
}

fn interface_type(name: &str) -> PredicateResult<InterfaceType> {
    match InterfaceType::from_str(name) {
        Ok(InterfaceType::Unknown) | Err(_) => Err(PredicateError::UnknownInterface(name.to_string())),
        Ok(ty) => Ok(ty),
    }
}

fn unexpected(expected: &'static str, found: &Spanned) -> PredicateError {
    PredicateError::UnexpectedToken {
        expected,
        found: found.token.to_string(),
        offset: found.offset,
    }
}
