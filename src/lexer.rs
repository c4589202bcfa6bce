//! PDF lexer (tokenizer).
//!
//! Splits a byte slice into the token types of PDF syntax: numbers, literal
//! and hexadecimal strings, names, keywords and delimiters. Whitespace
//! (space, \t, \r, \n, \0, \f) and comments (% to end of line) are skipped.
//!
//! The lexer works on borrowed input. String tokens keep their raw bytes;
//! escape decoding is left to the parser.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real number (e.g., 3.14, -2.5, .5)
    Real(f64),

    /// Literal string content, escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Hexadecimal string content, whitespace not yet removed
    HexString(&'a [u8]),

    /// Name with # escapes decoded
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// Indirect object start keyword "obj"
    ObjStart,

    /// Indirect object end keyword "endobj"
    ObjEnd,

    /// Stream start keyword "stream"
    StreamStart,

    /// Stream end keyword "endstream"
    StreamEnd,

    /// Reference keyword "R" (used in "10 0 R")
    R,
}

/// PDF whitespace characters.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, _) = take_while(is_whitespace)(remaining)?;
        remaining = rest;
        match comment(remaining) {
            Ok((rest, _)) => remaining = rest,
            Err(_) => return Ok((remaining, ())),
        }
    }
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number.
///
/// Leading signs and reals without an integer part (`.5`) or fraction (`5.`)
/// are accepted.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    // A lone "." or "-." is not a number.
    if int_part.is_none() && !matches!(frac_part, Some(Some(_))) {
        return Err(digit_error(start));
    }

    let negative = sign == Some('-');
    let int_text = int_part
        .map(|d| std::str::from_utf8(d).unwrap_or("0"))
        .unwrap_or("0");

    match frac_part {
        Some(frac) => {
            let frac_text = frac
                .map(|d| std::str::from_utf8(d).unwrap_or("0"))
                .unwrap_or("0");
            let magnitude: f64 = format!("{}.{}", int_text, frac_text)
                .parse()
                .map_err(|_| digit_error(start))?;
            Ok((input, Token::Real(if negative { -magnitude } else { magnitude })))
        },
        None => {
            let magnitude: i64 = int_text.parse().map_err(|_| digit_error(start))?;
            Ok((input, Token::Integer(if negative { -magnitude } else { magnitude })))
        },
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Balanced nested parentheses are part of the string. Escaped parentheses
/// do not count towards the nesting depth.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

/// Parse a hexadecimal string enclosed in angle brackets.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode #XX escape sequences in a raw name.
///
/// Invalid sequences are kept literally. Bytes that do not form UTF-8 are
/// mapped one-to-one onto Latin-1 characters.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }

    match String::from_utf8(bytes) {
        Ok(name) => name,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Parse a name starting with /.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes: &[u8]| Token::Name(decode_name_escapes(bytes))),
    )(input)
}

/// Parse delimiters and keywords.
///
/// Alphabetic keywords must end at a token boundary, so `nullx` or `Root`
/// are not read as `null` followed by garbage.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let delimiter: IResult<&[u8], Token<'_>> = alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input);
    if let Ok(result) = delimiter {
        return Ok(result);
    }

    let (rest, word) = take_while1(is_regular)(input)?;
    let token = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        b"R" => Token::R,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        },
    };
    Ok((rest, token))
}

/// Parse a single PDF token, skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;

    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+7 "), Ok((&b" "[..], Token::Integer(7))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    #[test]
    fn test_lone_dot_is_not_a_number() {
        assert!(token(b".").is_err());
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(token(b"(Hello)"), Ok((&b""[..], Token::LiteralString(b"Hello"))));
        assert_eq!(
            token(b"(a (nested) b)"),
            Ok((&b""[..], Token::LiteralString(b"a (nested) b")))
        );
        assert_eq!(token(b"(a \\) b)"), Ok((&b""[..], Token::LiteralString(b"a \\) b"))));
        assert!(token(b"(unterminated").is_err());
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(token(b"<48 65>"), Ok((&b""[..], Token::HexString(b"48 65"))));
    }

    #[test]
    fn test_names() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B/C"), Ok((&b"/C"[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/Bad#Z"), Ok((&b""[..], Token::Name("Bad#Z".to_string()))));
        assert_eq!(token(b"/"), Ok((&b""[..], Token::Name(String::new()))));
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
        assert_eq!(token(b"[1"), Ok((&b"1"[..], Token::ArrayStart)));
    }

    #[test]
    fn test_keywords_need_boundaries() {
        assert_eq!(token(b"null]"), Ok((&b"]"[..], Token::Null)));
        assert_eq!(token(b"R/Next"), Ok((&b"/Next"[..], Token::R)));
        assert_eq!(token(b"endobj\n"), Ok((&b"\n"[..], Token::ObjEnd)));
        assert!(token(b"nullx").is_err());
        assert!(token(b"Root").is_err());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(token(b"% comment\n  17"), Ok((&b""[..], Token::Integer(17))));
        assert_eq!(token(b"%a\n%b\r\ntrue"), Ok((&b""[..], Token::True)));
    }
}
