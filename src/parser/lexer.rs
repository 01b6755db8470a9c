//! Лексер для BlockScript.

use logos::Logos;

use super::error::ParseError;
use super::token::{Keyword, Span, Spanned, Token};

/// Внутренние токены для logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")] // Пропускаем пробелы
#[logos(skip r"//[^\n]*")] // Комментарии // до конца строки
#[logos(skip r"#[^\n]*")] // Комментарии # до конца строки
enum LogosToken {
    // Ключевые слова (до идентификаторов!)
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("fn")]
    Fn,
    #[token("export")]
    Export,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("exit")]
    Exit,
    #[token("print")]
    Print,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Float (должен быть до Int для правильного приоритета)
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    // Строки хранятся как есть, без обработки escape-последовательностей
    #[regex(r#""[^"\n]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    #[regex(r#"'[^'\n]*'"#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_string() })]
    String(String),

    // Многосимвольные операторы
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("|=")]
    PipeAssign,
    #[token("&=")]
    AmpAssign,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,

    // Односимвольные
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Лексер для BlockScript.
pub struct Lexer<'a> {
    logos: logos::Lexer<'a, LogosToken>,
    source: &'a str,
    line_starts: Vec<usize>,
    peeked: Option<Spanned<Token>>,
}

impl<'a> Lexer<'a> {
    /// Создать новый лексер.
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            logos: LogosToken::lexer(source),
            source,
            line_starts,
            peeked: None,
        }
    }

    /// Получить следующий токен.
    pub fn next_token(&mut self) -> Result<Spanned<Token>, ParseError> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }

        self.read_token()
    }

    /// Посмотреть на следующий токен без его потребления.
    pub fn peek_token(&mut self) -> Result<&Spanned<Token>, ParseError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.read_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    /// Span для байтового диапазона, со строкой и колонкой.
    pub fn span_at(&self, start: usize, end: usize) -> Span {
        let line = match self.line_starts.binary_search(&start) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = self.source[self.line_starts[line]..start].chars().count();
        Span::new(start, end, line as u32 + 1, column as u32 + 1)
    }

    fn read_token(&mut self) -> Result<Spanned<Token>, ParseError> {
        match self.logos.next() {
            Some(Ok(logos_token)) => {
                let range = self.logos.span();
                let span = self.span_at(range.start, range.end);
                Ok(Spanned::new(convert_token(logos_token), span))
            }
            Some(Err(())) => {
                let range = self.logos.span();
                let span = self.span_at(range.start, range.end);
                if self.logos.slice().starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(ParseError::InvalidLiteral {
                        span,
                        message: format!("'{}' does not fit into 64 bits", self.logos.slice()),
                    });
                }
                Err(ParseError::LexerError { span })
            }
            None => {
                let pos = self.source.len();
                Ok(Spanned::new(Token::Eof, self.span_at(pos, pos)))
            }
        }
    }
}

/// Конвертировать внутренний токен logos в публичный Token.
fn convert_token(logos_token: LogosToken) -> Token {
    match logos_token {
        LogosToken::Var => Token::Keyword(Keyword::Var),
        LogosToken::Let => Token::Keyword(Keyword::Let),
        LogosToken::Const => Token::Keyword(Keyword::Const),
        LogosToken::Fn => Token::Keyword(Keyword::Fn),
        LogosToken::Export => Token::Keyword(Keyword::Export),
        LogosToken::Import => Token::Keyword(Keyword::Import),
        LogosToken::From => Token::Keyword(Keyword::From),
        LogosToken::If => Token::Keyword(Keyword::If),
        LogosToken::Else => Token::Keyword(Keyword::Else),
        LogosToken::While => Token::Keyword(Keyword::While),
        LogosToken::For => Token::Keyword(Keyword::For),
        LogosToken::Break => Token::Keyword(Keyword::Break),
        LogosToken::Continue => Token::Keyword(Keyword::Continue),
        LogosToken::Return => Token::Keyword(Keyword::Return),
        LogosToken::Exit => Token::Keyword(Keyword::Exit),
        LogosToken::Print => Token::Keyword(Keyword::Print),
        LogosToken::True => Token::Keyword(Keyword::True),
        LogosToken::False => Token::Keyword(Keyword::False),
        LogosToken::Float(f) => Token::Float(f),
        LogosToken::Int(n) => Token::Int(n),
        LogosToken::String(s) => Token::String(s),
        LogosToken::Ident(s) => Token::Ident(s),
        LogosToken::PlusAssign => Token::Punct("+="),
        LogosToken::MinusAssign => Token::Punct("-="),
        LogosToken::StarAssign => Token::Punct("*="),
        LogosToken::SlashAssign => Token::Punct("/="),
        LogosToken::PipeAssign => Token::Punct("|="),
        LogosToken::AmpAssign => Token::Punct("&="),
        LogosToken::AndAnd => Token::Punct("&&"),
        LogosToken::OrOr => Token::Punct("||"),
        LogosToken::EqEq => Token::Punct("=="),
        LogosToken::Ne => Token::Punct("!="),
        LogosToken::Le => Token::Punct("<="),
        LogosToken::Ge => Token::Punct(">="),
        LogosToken::LParen => Token::Punct("("),
        LogosToken::RParen => Token::Punct(")"),
        LogosToken::LBrace => Token::Punct("{"),
        LogosToken::RBrace => Token::Punct("}"),
        LogosToken::Comma => Token::Punct(","),
        LogosToken::Semicolon => Token::Punct(";"),
        LogosToken::Colon => Token::Punct(":"),
        LogosToken::Assign => Token::Punct("="),
        LogosToken::Plus => Token::Punct("+"),
        LogosToken::Minus => Token::Punct("-"),
        LogosToken::Star => Token::Punct("*"),
        LogosToken::Slash => Token::Punct("/"),
        LogosToken::Percent => Token::Punct("%"),
        LogosToken::Lt => Token::Punct("<"),
        LogosToken::Gt => Token::Punct(">"),
        LogosToken::Bang => Token::Punct("!"),
        LogosToken::Amp => Token::Punct("&"),
        LogosToken::Pipe => Token::Punct("|"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap().value;
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            tokens("var x = 10;"),
            vec![
                Token::Keyword(Keyword::Var),
                Token::Ident("x".to_string()),
                Token::Punct("="),
                Token::Int(10),
                Token::Punct(";"),
            ]
        );
    }

    #[test]
    fn test_lexer_keyword_prefix_is_identifier() {
        assert_eq!(
            tokens("variable format"),
            vec![
                Token::Ident("variable".to_string()),
                Token::Ident("format".to_string())
            ]
        );
    }

    #[test]
    fn test_lexer_compound_operators() {
        assert_eq!(
            tokens("a += 1 && b <= c"),
            vec![
                Token::Ident("a".to_string()),
                Token::Punct("+="),
                Token::Int(1),
                Token::Punct("&&"),
                Token::Ident("b".to_string()),
                Token::Punct("<="),
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_strings_are_verbatim() {
        assert_eq!(
            tokens(r#""a\nb" 'lib.bs'"#),
            vec![
                Token::String(r"a\nb".to_string()),
                Token::String("lib.bs".to_string())
            ]
        );
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(tokens("// comment\n# other\n42"), vec![Token::Int(42)]);
    }

    #[test]
    fn test_lexer_float() {
        match tokens("3.75").as_slice() {
            [Token::Float(f)] => assert!((f - 3.75).abs() < 0.001),
            other => panic!("Expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_lexer_line_and_column() {
        let mut lexer = Lexer::new("var a = 1;\n  exit(a);");
        for _ in 0..5 {
            lexer.next_token().unwrap();
        }
        let exit = lexer.next_token().unwrap();
        assert_eq!(exit.value, Token::Keyword(Keyword::Exit));
        assert_eq!((exit.span.line, exit.span.column), (2, 3));
    }

    #[test]
    fn test_lexer_unknown_character() {
        let mut lexer = Lexer::new("@");
        assert!(matches!(
            lexer.next_token(),
            Err(ParseError::LexerError { .. })
        ));
    }

    #[test]
    fn test_lexer_integer_overflow() {
        let mut lexer = Lexer::new("99999999999999999999");
        assert!(matches!(
            lexer.next_token(),
            Err(ParseError::InvalidLiteral { .. })
        ));
    }
}
