//! Script tokenizer using nom.
//!
//! Each lexeme class has its own small nom parser; `tokenize` drives them
//! over the input while tracking line/column positions. Comments are kept
//! as tokens so the parser can turn them into comment statements.
//!
//! ```text
//! CONSUME TOP 10 col1 FROM queueA -- tail
//! ───┬─── ─┬─ ┬─ ─┬── ─┬── ──┬─── ───┬───
//!    │     │  │   │    │     │       └── LineComment
//!    │     │  │   │    │     └── Ident
//!    │     │  │   │    └── Keyword(From)
//!    │     │  │   └── Ident
//!    │     │  └── Integer
//!    │     └── Keyword(Top)
//!    └── Keyword(Consume)
//! ```

mod token;

pub use token::{Keyword, Position, Token, TokenKind};

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, not_line_ending, one_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

use crate::error::LexicalError;

/// Convert script text into tokens, ending with a single `Eof` token.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexicalError> {
    let mut tokens = Vec::new();
    let mut position = Position::start();
    let mut rest = text;

    loop {
        let trimmed = rest.trim_start();
        position.advance(&rest[..rest.len() - trimmed.len()]);
        rest = trimmed;

        if rest.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, "", position));
            return Ok(tokens);
        }

        if rest.starts_with("/*") && !rest[2..].contains("*/") {
            return Err(LexicalError::Unterminated {
                what: "block comment",
                position,
            });
        }

        let (remaining, kind) = match lex_token(rest) {
            Ok(ok) => ok,
            Err(_) => return Err(classify_failure(rest, position)),
        };

        let lexeme = &rest[..rest.len() - remaining.len()];

        if matches!(kind, TokenKind::Integer | TokenKind::Float)
            && remaining.starts_with(|c: char| c.is_alphanumeric() || c == '_')
        {
            let tail: String = remaining
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            return Err(LexicalError::MalformedNumber {
                lexeme: format!("{}{}", lexeme, tail),
                position,
            });
        }

        tokens.push(Token::new(kind, lexeme, position));
        position.advance(lexeme);
        rest = remaining;
    }
}

fn classify_failure(rest: &str, position: Position) -> LexicalError {
    match rest.chars().next() {
        Some('\'') => LexicalError::Unterminated {
            what: "string literal",
            position,
        },
        Some('"') | Some('`') | Some('[') => LexicalError::Unterminated {
            what: "quoted identifier",
            position,
        },
        Some(ch) => LexicalError::IllegalCharacter { ch, position },
        None => LexicalError::Unterminated {
            what: "input",
            position,
        },
    }
}

/// Lex one token from the start of `input`.
fn lex_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        lex_comment,
        lex_string,
        lex_quoted_ident,
        lex_variable,
        lex_number,
        lex_word,
        lex_operator,
    ))(input)
}

fn lex_comment(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(
            TokenKind::LineComment,
            recognize(pair(tag("--"), not_line_ending)),
        ),
        value(
            TokenKind::BlockComment,
            recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ),
    ))(input)
}

/// `'...'` with `''` as an escaped quote.
fn lex_string(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::String, |i| quoted(i, '\''))(input)
}

fn lex_quoted_ident(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::QuotedIdent,
        alt((
            |i| quoted(i, '"'),
            |i| quoted(i, '`'),
            recognize(tuple((
                char('['),
                many0(alt((is_not("]"), tag("]]")))),
                char(']'),
            ))),
        )),
    )(input)
}

/// Recognize text between two `quote` characters, where a doubled quote
/// stands for one literal quote.
fn quoted(input: &str, quote: char) -> IResult<&str, &str> {
    let mut buf = [0u8; 4];
    let single: &str = quote.encode_utf8(&mut buf);
    let doubled = format!("{}{}", quote, quote);
    recognize(tuple((
        char(quote),
        many0(alt((is_not(single), tag(doubled.as_str())))),
        char(quote),
    )))(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex_variable(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::Variable,
        recognize(pair(char('@'), take_while1(is_ident_char))),
    )(input)
}

/// Integers and floats: `42`, `3.14`, `1e6`, `2.5E-3`.
fn lex_number(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(tuple((
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| {
            if s.contains(['.', 'e', 'E']) {
                TokenKind::Float
            } else {
                TokenKind::Integer
            }
        },
    )(input)
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(take_while1(is_ident_start), take_while(is_ident_char))),
        |word: &str| match Keyword::lookup(word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident,
        },
    )(input)
}

fn lex_operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        // Multi-char operators first
        value(TokenKind::NotEq, tag("<>")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::Concat, tag("||")),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Semicolon, char(';')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Percent, char('%')),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_consume_statement_tokens() {
        assert_eq!(
            kinds("CONSUME TOP 10 col1, col2 FROM queueA WHERE col1 = 5"),
            vec![
                TokenKind::Keyword(Keyword::Consume),
                TokenKind::Keyword(Keyword::Top),
                TokenKind::Integer,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Keyword(Keyword::From),
                TokenKind::Ident,
                TokenKind::Keyword(Keyword::Where),
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Integer,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("select Produce uSe"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Keyword(Keyword::Produce),
                TokenKind::Keyword(Keyword::Use),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_tokens() {
        let tokens = tokenize("-- hello\nSELECT 1 /* inline */").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LineComment);
        assert_eq!(tokens[0].lexeme, "-- hello");
        assert_eq!(tokens[3].kind, TokenKind::BlockComment);
        assert_eq!(tokens[3].lexeme, "/* inline */");
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = tokenize("SELECT\n  x").unwrap();
        assert_eq!(tokens[1].position.line, 2);
        assert_eq!(tokens[1].position.column, 3);
        assert_eq!(tokens[1].position.offset, 9);
    }

    #[test]
    fn test_literals_and_quoting() {
        let tokens = tokenize("'it''s' \"Order\" [x y] `z` @resp 3.5 1e3").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text(), "it's");
        assert_eq!(tokens[1].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[1].text(), "Order");
        assert_eq!(tokens[2].text(), "x y");
        assert_eq!(tokens[3].text(), "z");
        assert_eq!(tokens[4].kind, TokenKind::Variable);
        assert_eq!(tokens[5].kind, TokenKind::Float);
        assert_eq!(tokens[6].kind, TokenKind::Float);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("<> != <= >= || < > ="),
            vec![
                TokenKind::NotEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Concat,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_position() {
        let err = tokenize("SELECT\n 'abc").unwrap_err();
        assert_eq!(
            err,
            LexicalError::Unterminated {
                what: "string literal",
                position: Position {
                    line: 2,
                    column: 2,
                    offset: 8
                },
            }
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = tokenize("SELECT 1 /* never closed").unwrap_err();
        assert!(matches!(
            err,
            LexicalError::Unterminated {
                what: "block comment",
                ..
            }
        ));
    }

    #[test]
    fn test_illegal_character() {
        let err = tokenize("SELECT # FROM t").unwrap_err();
        assert!(matches!(err, LexicalError::IllegalCharacter { ch: '#', .. }));
        assert_eq!(err.position().column, 8);
    }

    #[test]
    fn test_malformed_number() {
        let err = tokenize("SELECT 12abc").unwrap_err();
        assert!(matches!(err, LexicalError::MalformedNumber { .. }));
    }
}
