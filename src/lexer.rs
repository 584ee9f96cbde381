// The lexer turns source text into a flat, ordered token stream.
//
// Tokenization is pattern-driven: an ordered list of (pattern, kind)
// rules is matched against the whole source in rule order, not
// character-by-character. Earlier rules claim their spans first; a
// later rule whose span overlaps an already-claimed span is dropped.
// This is why, for example, the string-literal rules run before
// anything else -- a later rule can never reach inside a quoted span.
//
// A second pass reclassifies ambiguous matches: a word matched by the
// generic identifier rule is promoted to its specific keyword kind if
// some other rule's pattern source is textually identical to the
// matched text. This is how `if`, `end`, `true`, and friends get their
// own token kind despite the identifier rule also matching them.
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Str,
    True,
    False,
    Null,
    Id,

    Semicolon,
    Whitespace,
    Newline,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Comma,
    Dot,

    Plus,
    Minus,
    Slash,
    Star,

    NotEq,
    EqEq,
    Gte,
    Lte,
    Assign,
    Gt,
    Lt,

    And,
    Or,

    Colon,
    End,
    Fn,
    If,
    Else,
    Return,
    Delay,
    Output,
    Using,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

struct Rule {
    pattern: &'static str,
    regex: Regex,
    kind: TokenKind,
}

fn rule(pattern: &'static str, kind: TokenKind) -> Rule {
    Rule { pattern, regex: Regex::new(pattern).unwrap(), kind }
}

lazy_static! {
    // Order is significant: it is both match priority (who claims a
    // span first) and the universe searched during reclassification.
    static ref RULES: Vec<Rule> = vec![
        rule("\"[^\"]*\"", TokenKind::Str),
        rule("'[^']*'", TokenKind::Str),

        rule("true", TokenKind::True),
        rule("false", TokenKind::False),
        rule("null", TokenKind::Null),

        rule(";", TokenKind::Semicolon),
        rule("[ \t]+", TokenKind::Whitespace),
        rule("\n+", TokenKind::Newline),

        rule("\\(", TokenKind::LParen),
        rule("\\)", TokenKind::RParen),
        rule("\\[", TokenKind::LBracket),
        rule("\\]", TokenKind::RBracket),
        rule("\\{", TokenKind::LBrace),
        rule("\\}", TokenKind::RBrace),

        rule(",", TokenKind::Comma),
        rule("\\.", TokenKind::Dot),

        rule("\\+", TokenKind::Plus),
        rule("-", TokenKind::Minus),
        rule("/", TokenKind::Slash),
        rule("\\*", TokenKind::Star),

        rule("!=", TokenKind::NotEq),
        rule("==", TokenKind::EqEq),
        rule(">=", TokenKind::Gte),
        rule("<=", TokenKind::Lte),
        rule(":=", TokenKind::Assign),
        rule(">", TokenKind::Gt),
        rule("<", TokenKind::Lt),

        rule("&", TokenKind::And),
        rule("\\?", TokenKind::Or),

        rule(":", TokenKind::Colon),
        rule("end", TokenKind::End),
        rule("fn", TokenKind::Fn),

        rule("if", TokenKind::If),
        rule("else", TokenKind::Else),

        rule("return", TokenKind::Return),
        rule("delay", TokenKind::Delay),
        rule("output", TokenKind::Output),

        rule("using", TokenKind::Using),

        rule("[a-zA-Z_][a-zA-Z0-9_]*", TokenKind::Id),
        rule("[+-]?([0-9]*\\.)?[0-9]+", TokenKind::Number),
    ];
}

struct Span {
    start: usize,
    end: usize,
}

// Tokenize `source`. Unrecognized characters are silently dropped --
// they never get claimed by any rule, so they simply produce no
// token.
pub fn lex(source: &str) -> Vec<Token> {
    let mut busy: Vec<Span> = Vec::new();
    let mut tokens: Vec<Token> = Vec::new();

    for rule in RULES.iter() {
        for m in rule.regex.find_iter(source) {
            let text = m.as_str().to_string();
            let start = m.start();
            let end = m.end();

            if busy.iter().any(|s| start >= s.start && end <= s.end) {
                continue;
            }

            let mut kind = rule.kind;
            for other in RULES.iter() {
                if other.pattern == text && !std::ptr::eq(other, rule) {
                    kind = other.kind;
                }
            }

            busy.push(Span { start, end });
            tokens.push(Token { kind, text, start, end });
        }
    }

    tokens.sort_by_key(|t| t.start);

    let mut tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Whitespace && t.kind != TokenKind::Newline)
        .collect();

    for token in tokens.iter_mut() {
        if token.kind == TokenKind::Str {
            let len = token.text.len();
            token.text = token.text[1..len - 1].to_string();
        }
    }

    trace!("lexed {} tokens", tokens.len());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::Number]);
        assert_eq!(kinds("42.5"), vec![TokenKind::Number]);
        assert_eq!(kinds("\"hi\""), vec![TokenKind::Str]);
        assert_eq!(lex("\"hi\"")[0].text, "hi");
        assert_eq!(kinds("true false null"), vec![TokenKind::True, TokenKind::False, TokenKind::Null]);
    }

    #[test]
    fn test_keyword_reclassification() {
        // The identifier rule also matches these, but the more
        // specific keyword rule wins.
        assert_eq!(kinds("if"), vec![TokenKind::If]);
        assert_eq!(kinds("end"), vec![TokenKind::End]);
        assert_eq!(kinds("fn"), vec![TokenKind::Fn]);
        // "if" still claims its own span inside "iffy", and that span
        // isn't fully contained in the later, larger identifier match
        // (only full containment is rejected -- see the overlap
        // check above), so both tokens survive: [If, Id].
        assert_eq!(kinds("iffy"), vec![TokenKind::If, TokenKind::Id]);
    }

    #[test]
    fn test_assign_vs_colon() {
        assert_eq!(kinds(":="), vec![TokenKind::Assign]);
        assert_eq!(kinds(":"), vec![TokenKind::Colon]);
    }

    #[test]
    fn test_whitespace_filtered_and_spans_ordered() {
        let tokens = lex("a :=   1 + 2");
        assert_eq!(tokens.len(), 5);
        for pair in tokens.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn test_unrecognized_char_silently_dropped() {
        assert_eq!(kinds("a @ b"), vec![TokenKind::Id, TokenKind::Id]);
    }

    #[test]
    fn test_minus_adjacent_to_digit_overlaps_rather_than_merges() {
        // A signed-number match's span is never entirely contained
        // within the single-character MINUS span the earlier rule
        // already claimed, so containment-based rejection never
        // triggers here and both tokens survive, overlapping. This is
        // an inherited quirk, not something this lexer resolves.
        let tokens = lex("-1");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Minus);
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].text, "-1");
    }
}
