//! Lexer for the Metapath subset using logos.

use logos::Logos;

use crate::error::ParseError;
use crate::span::Span;

/// Token types.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Path punctuation
    #[token("//")]
    DoubleSlash,
    #[token("/")]
    Slash,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("*")]
    Star,

    // Grouping
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,

    // Comparison operators
    #[token("=")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Logical operators
    #[token("and")]
    And,
    #[token("or")]
    Or,

    // Names may contain hyphens after the first character.
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_string())]
    Name(String),

    // A doubled quote inside a literal stands for one quote.
    #[regex(r#""([^"]|"")*""#, |lex| unquote(lex.slice(), '"'))]
    #[regex(r#"'([^']|'')*'"#, |lex| unquote(lex.slice(), '\''))]
    String(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Decimal(f64),
}

impl Token {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Name(name) => format!("name '{}'", name),
            Token::String(s) => format!("string '{}'", s),
            Token::Integer(i) => format!("number {}", i),
            Token::Decimal(d) => format!("number {}", d),
            Token::DoubleSlash => "'//'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::DotDot => "'..'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::At => "'@'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Eq => "'='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
        }
    }
}

fn unquote(slice: &str, quote: char) -> String {
    let inner = &slice[1..slice.len() - 1];
    let doubled: String = [quote, quote].iter().collect();
    inner.replace(&doubled, &quote.to_string())
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize an expression.
///
/// Fails on the first character sequence that is not a token.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected character sequence '{}'", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}
