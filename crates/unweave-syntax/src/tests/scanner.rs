use super::*;

fn all_tokens(src: &str) -> Vec<Tok> {
    let mut scanner = Scanner::new(src);
    let mut out = Vec::new();
    loop {
        let token = scanner.next_token().expect("scan failed");
        if token.tok == Tok::Eof {
            break;
        }
        out.push(token.tok);
    }
    out
}

#[test]
fn test_numbers() {
    assert_eq!(all_tokens("42"), vec![Tok::Num(42.0)]);
    assert_eq!(all_tokens("3.14"), vec![Tok::Num(3.14)]);
    assert_eq!(all_tokens("1e3"), vec![Tok::Num(1000.0)]);
    assert_eq!(all_tokens("0xff"), vec![Tok::Num(255.0)]);
    assert_eq!(all_tokens("0b101"), vec![Tok::Num(5.0)]);
    assert_eq!(all_tokens("0o17"), vec![Tok::Num(15.0)]);
    assert_eq!(all_tokens(".5"), vec![Tok::Num(0.5)]);
}

#[test]
fn test_bigint() {
    assert_eq!(all_tokens("123n"), vec![Tok::BigInt("123".to_string())]);
    assert_eq!(all_tokens("0xffn"), vec![Tok::BigInt("0xff".to_string())]);
}

#[test]
fn test_strings() {
    assert_eq!(all_tokens("'abc'"), vec![Tok::Str("abc".to_string())]);
    assert_eq!(all_tokens(r#""a\nb""#), vec![Tok::Str("a\nb".to_string())]);
    assert_eq!(
        all_tokens(r"'\x41B'"),
        vec![Tok::Str("AB".to_string())]
    );
    assert_eq!(
        all_tokens(r"'\u{1f600}'"),
        vec![Tok::Str("\u{1f600}".to_string())]
    );
}

#[test]
fn test_unterminated_string_is_error() {
    let mut scanner = Scanner::new("'abc");
    assert!(scanner.next_token().is_err());
}

#[test]
fn test_regex_vs_division() {
    // After `=` a slash starts a regex.
    let toks = all_tokens("x = /ab+c/gi");
    assert!(matches!(
        &toks[2],
        Tok::Regex { pattern, flags } if pattern == "ab+c" && flags == "gi"
    ));

    // After a value a slash is division.
    let toks = all_tokens("a / b");
    assert_eq!(toks[1], Tok::Punct(Punct::Slash));
}

#[test]
fn test_regex_char_class_slash() {
    let toks = all_tokens("/[/]/");
    assert!(matches!(
        &toks[0],
        Tok::Regex { pattern, .. } if pattern == "[/]"
    ));
}

#[test]
fn test_comments_and_newline_flag() {
    let mut scanner = Scanner::new("a // one\nb /* two */ c");
    let a = scanner.next_token().unwrap();
    let b = scanner.next_token().unwrap();
    let c = scanner.next_token().unwrap();
    assert!(!a.newline_before);
    assert!(b.newline_before, "line comment ends the line");
    assert!(!c.newline_before);
}

#[test]
fn test_punctuator_maximal_munch() {
    assert_eq!(
        all_tokens(">>>= === !== ** =>"),
        vec![
            Tok::Punct(Punct::UShrAssign),
            Tok::Punct(Punct::StrictEq),
            Tok::Punct(Punct::StrictNotEq),
            Tok::Punct(Punct::StarStar),
            Tok::Punct(Punct::Arrow),
        ]
    );
}

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        all_tokens("var of instanceof _x $y"),
        vec![
            Tok::Keyword(Kw::Var),
            Tok::Ident("of".to_string()),
            Tok::Keyword(Kw::Instanceof),
            Tok::Ident("_x".to_string()),
            Tok::Ident("$y".to_string()),
        ]
    );
}

#[test]
fn test_spans() {
    let mut scanner = Scanner::new("ab cd");
    let first = scanner.next_token().unwrap();
    assert_eq!((first.span.start, first.span.end), (0, 2));
    let second = scanner.next_token().unwrap();
    assert_eq!((second.span.start, second.span.end), (3, 5));
}
