//! Tokenizer for formula text
use crate::Error;

/// A single lexical token
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Numeric literal
    Number(f64),
    /// Identifier, already lowercased
    Ident(String),
    /// `+`
    Plus,
    /// `-` or `−`
    Minus,
    /// `*`, `×`, `·`, or `∙`
    Star,
    /// `/` or `÷`
    Slash,
    /// `^` or `**`
    Caret,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// Prefix `√`
    Sqrt,
    /// Prefix `∛`
    Cbrt,
    /// Postfix `²`
    Squared,
    /// Postfix `³`
    Cubed,
    /// Postfix `°`
    Degree,
}

impl Token {
    /// Human-readable description, used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Plus => "'+'".to_owned(),
            Token::Minus => "'-'".to_owned(),
            Token::Star => "'*'".to_owned(),
            Token::Slash => "'/'".to_owned(),
            Token::Caret => "'^'".to_owned(),
            Token::LParen => "'('".to_owned(),
            Token::RParen => "')'".to_owned(),
            Token::Comma => "','".to_owned(),
            Token::Sqrt => "'√'".to_owned(),
            Token::Cbrt => "'∛'".to_owned(),
            Token::Squared => "'²'".to_owned(),
            Token::Cubed => "'³'".to_owned(),
            Token::Degree => "'°'".to_owned(),
        }
    }

    /// Checks whether an implicit multiplication may follow this token
    pub fn ends_factor(&self) -> bool {
        matches!(
            self,
            Token::Number(..)
                | Token::RParen
                | Token::Squared
                | Token::Cubed
                | Token::Degree
        )
    }

    /// Checks whether this token may start an implicitly multiplied factor
    pub fn starts_factor(&self) -> bool {
        matches!(self, Token::Number(..) | Token::Ident(..) | Token::LParen)
    }
}

/// Token tagged with its byte offset in the source text
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    /// The token itself
    pub token: Token,
    /// Byte offset of the token's first character
    pub offset: usize,
}

/// Splits a formula into tokens
///
/// Whitespace is skipped; any character outside the formula alphabet is an
/// error.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, Error> {
    let mut out = vec![];
    let mut iter = text.char_indices().peekable();
    while let Some(&(offset, c)) = iter.peek() {
        if c.is_whitespace() {
            iter.next();
            continue;
        }
        let token = if c.is_ascii_digit() || c == '.' {
            let end = number_end(text, offset);
            let s = &text[offset..end];
            while iter.peek().is_some_and(|(i, _)| *i < end) {
                iter.next();
            }
            let n = s.parse::<f64>().map_err(|_| Error::BadNumber {
                text: s.to_owned(),
                offset,
            })?;
            Token::Number(n)
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut s = String::new();
            while let Some(&(_, c)) = iter.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    s.push(c.to_ascii_lowercase());
                    iter.next();
                } else {
                    break;
                }
            }
            Token::Ident(s)
        } else {
            iter.next();
            match c {
                '+' => Token::Plus,
                '-' | '−' => Token::Minus,
                '*' => {
                    if iter.next_if(|(_, c)| *c == '*').is_some() {
                        Token::Caret
                    } else {
                        Token::Star
                    }
                }
                '×' | '·' | '∙' => Token::Star,
                '/' | '÷' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                '√' => Token::Sqrt,
                '∛' => Token::Cbrt,
                '²' => Token::Squared,
                '³' => Token::Cubed,
                '°' => Token::Degree,
                'π' => Token::Ident("pi".to_owned()),
                'τ' => Token::Ident("tau".to_owned()),
                'φ' | 'ϕ' => Token::Ident("phi".to_owned()),
                ch => return Err(Error::UnexpectedChar { ch, offset }),
            }
        };
        out.push(Spanned { token, offset });
    }
    Ok(out)
}

/// Finds the end of a numeric literal starting at `start`
///
/// The mantissa greedily consumes digits and dots (so that `1.2.3` is
/// reported as one malformed literal); an exponent is only consumed when it
/// is followed by digits, so `2e` lexes as `2` then `e`.
fn number_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(s: &str) -> Vec<Token> {
        tokenize(s).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokens("12 1.5 .5 1e-3 2.5E+4"),
            vec![
                Token::Number(12.0),
                Token::Number(1.5),
                Token::Number(0.5),
                Token::Number(1e-3),
                Token::Number(2.5e4),
            ]
        );
        assert_eq!(
            tokens("2e"),
            vec![Token::Number(2.0), Token::Ident("e".to_owned())]
        );
        assert!(matches!(
            tokenize("1.2.3"),
            Err(Error::BadNumber { offset: 0, .. })
        ));
        assert!(matches!(tokenize("."), Err(Error::BadNumber { .. })));
    }

    #[test]
    fn identifiers_are_lowercased() {
        assert_eq!(
            tokens("SIN(X)"),
            vec![
                Token::Ident("sin".to_owned()),
                Token::LParen,
                Token::Ident("x".to_owned()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("x**2 × y ÷ 3 − 1"),
            vec![
                Token::Ident("x".to_owned()),
                Token::Caret,
                Token::Number(2.0),
                Token::Star,
                Token::Ident("y".to_owned()),
                Token::Slash,
                Token::Number(3.0),
                Token::Minus,
                Token::Number(1.0),
            ]
        );
        assert_eq!(
            tokens("√π²°"),
            vec![
                Token::Sqrt,
                Token::Ident("pi".to_owned()),
                Token::Squared,
                Token::Degree,
            ]
        );
    }

    #[test]
    fn bad_char_offset() {
        assert_eq!(
            tokenize("x + $"),
            Err(Error::UnexpectedChar { ch: '$', offset: 4 })
        );
        // Offsets are in bytes, not characters
        assert_eq!(
            tokenize("π#"),
            Err(Error::UnexpectedChar { ch: '#', offset: 2 })
        );
    }
}
