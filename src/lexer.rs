use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token {
    // Types
    #[token("int")]
    Int,
    #[token("bool")]
    Bool,
    #[token("void")]
    Void,

    // Keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("print")]
    Print,

    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLiteral(i64),

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("=")]
    Assign,

    // Comparison
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,

    // Logical
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
}

impl Token {
    pub fn is_type(&self) -> bool {
        matches!(self, Token::Int | Token::Bool | Token::Void)
    }

    /// Token kind name, as printed by `--lex`.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Int | Token::Bool | Token::Void => "TYPE",
            Token::If
            | Token::Else
            | Token::While
            | Token::Return
            | Token::Print => "KEYWORD",
            Token::True | Token::False => "BOOL",
            Token::Identifier(_) => "ID",
            Token::IntLiteral(_) => "INT",
            Token::Plus | Token::Minus | Token::Star | Token::Slash => "ARITH",
            Token::Assign => "ASSIGN",
            Token::Equal
            | Token::NotEqual
            | Token::Less
            | Token::Greater
            | Token::LessEqual
            | Token::GreaterEqual => "REL",
            Token::And | Token::Or | Token::Not => "LOGIC",
            Token::LParen
            | Token::RParen
            | Token::LBrace
            | Token::RBrace
            | Token::Semicolon
            | Token::Comma => "PUNCT",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int => write!(f, "int"),
            Token::Bool => write!(f, "bool"),
            Token::Void => write!(f, "void"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::Return => write!(f, "return"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Print => write!(f, "print"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::IntLiteral(n) => write!(f, "{}", n),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Assign => write!(f, "="),
            Token::Equal => write!(f, "=="),
            Token::NotEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Not => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            lex("int main printer"),
            vec![
                Token::Int,
                Token::Identifier("main".to_string()),
                Token::Identifier("printer".to_string()),
            ]
        );
    }

    #[test]
    fn two_char_operators_win_over_prefixes() {
        assert_eq!(
            lex("a <= b == !c"),
            vec![
                Token::Identifier("a".to_string()),
                Token::LessEqual,
                Token::Identifier("b".to_string()),
                Token::Equal,
                Token::Not,
                Token::Identifier("c".to_string()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            lex("1 // one\n/* two\n */ 3"),
            vec![Token::IntLiteral(1), Token::IntLiteral(3)]
        );
    }

    #[test]
    fn stray_character_is_an_error() {
        assert!(Token::lexer("x @ y").any(|t| t.is_err()));
    }
}
