use super::error::{ExpressionError, ExpressionResult};

/// Lexical token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Hash,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    Elvis,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bang,
    Eof,
}

impl TokenKind {
    /// Short description used in parse errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(i) => i.to_string(),
            TokenKind::Float(f) => f.to_string(),
            TokenKind::Str(s) => format!("'{}'", s),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Split an expression into tokens. The last token is always `Eof`.
pub fn tokenize(source: &str) -> ExpressionResult<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let next = bytes.get(pos + 1).copied();

        let kind = match c {
            b'0'..=b'9' => {
                let (kind, end) = lex_number(source, pos)?;
                pos = end;
                tokens.push(Token {
                    kind,
                    position: start,
                });
                continue;
            }
            b'\'' | b'"' => {
                let (text, end) = lex_string(source, pos, c)?;
                pos = end;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    position: start,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                let end = source[pos..]
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'))
                    .map(|i| pos + i)
                    .unwrap_or(source.len());
                let word = &source[pos..end];
                pos = end;
                tokens.push(Token {
                    kind: keyword(word),
                    position: start,
                });
                continue;
            }
            b'#' => TokenKind::Hash,
            b'.' => TokenKind::Dot,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b':' => TokenKind::Colon,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'?' if next == Some(b':') => {
                pos += 1;
                TokenKind::Elvis
            }
            b'?' => TokenKind::Question,
            b'=' if next == Some(b'=') => {
                pos += 1;
                TokenKind::Eq
            }
            b'=' => TokenKind::Assign,
            b'!' if next == Some(b'=') => {
                pos += 1;
                TokenKind::Ne
            }
            b'!' => TokenKind::Bang,
            b'<' if next == Some(b'=') => {
                pos += 1;
                TokenKind::Le
            }
            b'<' => TokenKind::Lt,
            b'>' if next == Some(b'=') => {
                pos += 1;
                TokenKind::Ge
            }
            b'>' => TokenKind::Gt,
            b'&' if next == Some(b'&') => {
                pos += 1;
                TokenKind::And
            }
            b'|' if next == Some(b'|') => {
                pos += 1;
                TokenKind::Or
            }
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(ExpressionError::parse(
                    pos,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };

        pos += 1;
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: source.len(),
    });

    Ok(tokens)
}

fn keyword(word: &str) -> TokenKind {
    match word.to_ascii_lowercase().as_str() {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => TokenKind::Ident(word.to_string()),
    }
}

fn lex_number(source: &str, start: usize) -> ExpressionResult<(TokenKind, usize)> {
    let bytes = source.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    // A dot only belongs to the number when a digit follows it.
    let is_float = end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit();
    if is_float {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let text = &source[start..end];
        let value = text
            .parse::<f64>()
            .map_err(|_| ExpressionError::parse(start, format!("invalid number '{}'", text)))?;
        return Ok((TokenKind::Float(value), end));
    }

    let text = &source[start..end];
    match text.parse::<i64>() {
        Ok(value) => Ok((TokenKind::Integer(value), end)),
        Err(_) => text
            .parse::<f64>()
            .map(|f| (TokenKind::Float(f), end))
            .map_err(|_| ExpressionError::parse(start, format!("invalid number '{}'", text))),
    }
}

/// Quoted string. A doubled quote inside the literal stands for one quote.
fn lex_string(source: &str, start: usize, quote: u8) -> ExpressionResult<(String, usize)> {
    let bytes = source.as_bytes();
    let mut out = String::new();
    let mut pos = start + 1;
    let mut segment = pos;

    while pos < bytes.len() {
        if bytes[pos] == quote {
            out.push_str(&source[segment..pos]);
            if bytes.get(pos + 1) == Some(&quote) {
                out.push(quote as char);
                pos += 2;
                segment = pos;
                continue;
            }
            return Ok((out, pos + 1));
        }
        pos += 1;
    }

    Err(ExpressionError::parse(start, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_variable_access() {
        assert_eq!(
            kinds("#payload['age'] >= 18"),
            vec![
                TokenKind::Hash,
                TokenKind::Ident("payload".to_string()),
                TokenKind::LBracket,
                TokenKind::Str("age".to_string()),
                TokenKind::RBracket,
                TokenKind::Ge,
                TokenKind::Integer(18),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_elvis_and_ternary() {
        assert_eq!(
            kinds("a ?: b ? c : d"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Elvis,
                TokenKind::Ident("b".to_string()),
                TokenKind::Question,
                TokenKind::Ident("c".to_string()),
                TokenKind::Colon,
                TokenKind::Ident("d".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("x AND NOT y Or TRUE"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Ident("y".to_string()),
                TokenKind::Or,
                TokenKind::True,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("3.25 + 10"),
            vec![
                TokenKind::Float(3.25),
                TokenKind::Plus,
                TokenKind::Integer(10),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_escaped_quote() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::Str("it's".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds(r#""say ""hi""""#),
            vec![TokenKind::Str(r#"say "hi""#.to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc").unwrap_err();
        assert!(matches!(err, ExpressionError::Parse { position: 0, .. }));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a @ b").unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }
}
