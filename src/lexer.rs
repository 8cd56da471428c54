//! 报表查询语言的词法分析器
//!
//! 词法分析从不失败：无法归类的字符会并入最宽松的 `Word` 类别，
//! 错误只会在语法分析阶段产生。

use crate::token::{is_keyword, Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符和 `//` 行注释
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token::new(kind, &self.input[start..self.position], Span::new(start, self.position))
    }

    /// 读取引号包围的字符串字面量，value 不包含引号
    /// 注意：开始的引号已经被调用者消费；未闭合的字符串一直读到输入末尾
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == quote {
                break;
            }
            self.bump();
        }
        let content_end = self.position;
        self.bump(); // 消费结束引号

        Token::new(
            TokenKind::String,
            &self.input[content_start..content_end],
            Span::new(start, self.position),
        )
    }

    /// 读取一段连续的非分隔字符，再按形状归类为日期、数字、关键字或单词
    fn read_bare(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if breaks_bare_run(c, self.peek_next()) {
                break;
            }
            self.bump();
        }
        let literal = &self.input[start..self.position];
        self.token(classify_bare(literal), start)
    }
}

/// 判断字符是否结束一段裸字符序列
/// 引号只在 token 开头才开启字符串，词中的 `'` 属于单词本身（如 `O'Brien`）
fn breaks_bare_run(c: char, next: Option<char>) -> bool {
    c.is_whitespace()
        || matches!(c, ',' | '[' | ']' | '(' | ')' | '=' | '<' | '>')
        || (c == '!' && next == Some('='))
        || (c == '/' && next == Some('/'))
}

fn classify_bare(literal: &str) -> TokenKind {
    if is_date_shaped(literal) {
        TokenKind::Date
    } else if literal.bytes().all(|b| b.is_ascii_digit()) {
        TokenKind::Number
    } else if is_keyword(literal) {
        TokenKind::Keyword
    } else {
        TokenKind::Word
    }
}

/// `YYYY-MM-DD` 形状，不校验日历合法性（由语法分析负责）
fn is_date_shaped(literal: &str) -> bool {
    let bytes = literal.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            ',' | '[' | ']' | '(' | ')' => self.token(TokenKind::Punctuation, start),
            '=' => self.token(TokenKind::Operator, start),
            '<' | '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                }
                self.token(TokenKind::Operator, start)
            }
            '!' if self.peek() == Some('=') => {
                self.bump();
                self.token(TokenKind::Operator, start)
            }
            '"' | '\'' => self.read_string(start, c),
            _ => self.read_bare(start),
        };
        Some(token)
    }
}

/// 对整段输入分词，结果总是以一个 `Eof` token 结尾
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<_> = Lexer::new(source).collect();
    let end = source.len();
    tokens.push(Token::new(TokenKind::Eof, "", Span::new(end, end)));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    fn values(input: &str) -> Vec<&str> {
        Lexer::new(input).map(|t| t.value).collect()
    }

    #[test]
    fn test_simple_query() {
        let input = "TYPE summary\nBETWEEN 2024-01-01 AND 2024-01-31";
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Keyword);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Word);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Keyword);
        let date = lexer.next().unwrap();
        assert_eq!(date.kind, TokenKind::Date);
        assert_eq!(date.value, "2024-01-01");
        assert_eq!(date.span, Span::new(21, 31));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Keyword);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Date);
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("sort Sort SORT groupBy"),
            vec![TokenKind::Keyword; 4]
        );
        // 原始大小写保留
        assert_eq!(values("groupBy Project"), vec!["groupBy", "Project"]);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "!= = > < >= <= , [ ] ( )";
        let tokens: Vec<_> = Lexer::new(input).collect();
        let (ops, punct) = tokens.split_at(6);
        assert!(ops.iter().all(|t| t.kind == TokenKind::Operator));
        assert!(punct.iter().all(|t| t.kind == TokenKind::Punctuation));
        assert_eq!(values(input), vec!["!=", "=", ">", "<", ">=", "<=", ",", "[", "]", "(", ")"]);
    }

    #[test]
    fn test_numbers_dates_and_words() {
        assert_eq!(
            kinds("12345 2024-02-30 2024-1-1 12ab Acme-Corp"),
            vec![
                TokenKind::Number,
                TokenKind::Date,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Word,
            ]
        );
    }

    #[test]
    fn test_strings_strip_quotes() {
        let tokens: Vec<_> = Lexer::new(r#""hello world" 'single'"#).collect();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].value, "hello world");
        assert_eq!(tokens[0].span, Span::new(0, 13));
        assert_eq!(tokens[1].value, "single");
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        let tokens: Vec<_> = Lexer::new(r#"TITLE "never closed"#).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].value, "never closed");
    }

    #[test]
    fn test_unknown_symbols_become_words() {
        let tokens: Vec<_> = Lexer::new("#urgent !important café@home").collect();
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Word));
        assert_eq!(values("#urgent !important café@home"), vec!["#urgent", "!important", "café@home"]);
    }

    #[test]
    fn test_brackets_split_words() {
        assert_eq!(values("[a,b]"), vec!["[", "a", ",", "b", "]"]);
    }

    #[test]
    fn test_comments_and_whitespace_are_skipped() {
        let input = "// leading comment\nSORT time // trailing\n\tDESC";
        assert_eq!(values(input), vec!["SORT", "time", "DESC"]);
    }

    #[test]
    fn test_quotes_inside_words_stay_in_the_word() {
        let tokens: Vec<_> = Lexer::new("[O'Brien] don't say\"what").collect();
        assert_eq!(
            values("[O'Brien] don't say\"what"),
            vec!["[", "O'Brien", "]", "don't", "say\"what"]
        );
        assert_eq!(tokens[1].kind, TokenKind::Word);
        assert_eq!(tokens[3].kind, TokenKind::Word);
    }

    #[test]
    fn test_comment_directly_after_word() {
        assert_eq!(values("SORT time// trailing\nDESC"), vec!["SORT", "time", "DESC"]);
        // 单个 `/` 仍属于单词
        assert_eq!(values("a/b"), vec!["a/b"]);
    }

    #[test]
    fn test_tokenize_appends_eof() {
        let tokens = tokenize("TODAY");
        assert_eq!(tokens.len(), 2);
        assert!(tokens[1].is_eof());
        assert_eq!(tokens[1].span, Span::new(5, 5));

        let empty = tokenize("   ");
        assert_eq!(empty.len(), 1);
        assert!(empty[0].is_eof());
    }
}
