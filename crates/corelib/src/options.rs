//! Endpoint option grammar.
//!
//! An endpoint string is a protocol name followed by options:
//!
//! ```text
//! tcp -h "::1" -p 10000 --sourceAddress 10.0.0.2 -t 5000
//! ```
//!
//! Tokens are separated by whitespace. Single or double quotes group text into
//! one token (the quotes themselves are removed), which is how IPv6 hosts
//! survive the round trip through a proxy string.

use crate::error::{Error, Result};

/// Splits an endpoint string into tokens, honoring quotes.
///
/// Inside a quoted section a backslash escapes the active quote character.
/// An unterminated quote is a parse error.
pub fn split_tokens(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::parse(format!("mismatched quotes in `{}'", input)));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Walks `args` as option/argument pairs.
///
/// An option is any token of at least two characters starting with `-`. Its
/// argument is the following token unless that token is itself an option.
/// `check` returns `Ok(true)` when it consumed the pair and `Ok(false)` when
/// the option belongs to somebody else; those tokens are returned, in order,
/// so the caller can offer them to another layer or reject them.
pub fn walk_options<F>(args: &[String], mut check: F) -> Result<Vec<String>>
where
    F: FnMut(&str, Option<&str>) -> Result<bool>,
{
    let mut unknown = Vec::new();
    let mut n = 0;
    while n < args.len() {
        let option = args[n].as_str();
        n += 1;
        if option.len() < 2 || !option.starts_with('-') {
            unknown.push(option.to_string());
            continue;
        }

        let argument = match args.get(n) {
            Some(next) if !next.starts_with('-') => {
                n += 1;
                Some(next.as_str())
            }
            _ => None,
        };

        if !check(option, argument)? {
            unknown.push(option.to_string());
            if let Some(argument) = argument {
                unknown.push(argument.to_string());
            }
        }
    }
    Ok(unknown)
}

/// Wraps `value` in double quotes when it contains a `:`.
pub fn quote_if_needed(value: &str) -> String {
    if value.contains(':') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Renders `protocol` and `args` back into the `` `tcp -h x' `` form used in
/// error messages.
pub fn describe(protocol: &str, args: &[String]) -> String {
    let mut s = format!("`{}", protocol);
    for arg in args {
        s.push(' ');
        if arg.chars().any(char::is_whitespace) {
            s.push('"');
            s.push_str(arg);
            s.push('"');
        } else {
            s.push_str(arg);
        }
    }
    s.push('\'');
    s
}

/// Fails when an option that takes an argument was given none.
pub fn require_argument<'a>(option: &str, argument: Option<&'a str>, endpoint: &str) -> Result<&'a str> {
    argument.ok_or_else(|| {
        Error::parse(format!(
            "no argument provided for {} option in endpoint {}",
            option, endpoint
        ))
    })
}

/// Like [`require_argument`], but rejects values that would not survive being
/// written back into an options string as one token.
pub fn require_token<'a>(option: &str, argument: Option<&'a str>, endpoint: &str) -> Result<&'a str> {
    let value = require_argument(option, argument, endpoint)?;
    if value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        return Err(Error::parse(format!(
            "invalid argument `{}' provided for {} option in endpoint {}",
            value, option, endpoint
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_plain() {
        let tokens = split_tokens("  tcp -h localhost\t-p 10000 ").unwrap();
        assert_eq!(tokens, strings(&["tcp", "-h", "localhost", "-p", "10000"]));
    }

    #[test]
    fn test_split_quoted_ipv6() {
        let tokens = split_tokens("tcp -h \"::1\" -p 1").unwrap();
        assert_eq!(tokens, strings(&["tcp", "-h", "::1", "-p", "1"]));
    }

    #[test]
    fn test_split_single_quotes_and_escape() {
        let tokens = split_tokens(r#"-h 'a b' -x "say \"hi\"""#).unwrap();
        assert_eq!(tokens, strings(&["-h", "a b", "-x", "say \"hi\""]));
    }

    #[test]
    fn test_split_empty_quoted_token() {
        let tokens = split_tokens("-h \"\"").unwrap();
        assert_eq!(tokens, strings(&["-h", ""]));
    }

    #[test]
    fn test_split_unterminated_quote() {
        let err = split_tokens("-h \"[malformed").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_require_token() {
        assert_eq!(require_token("-h", Some("fe80::1%eth0"), "e").unwrap(), "fe80::1%eth0");
        assert!(matches!(require_token("-h", Some("my host"), "e"), Err(Error::Parse(_))));
        assert!(matches!(require_token("-h", Some("a\"b"), "e"), Err(Error::Parse(_))));
        assert!(matches!(require_token("-h", Some("it's"), "e"), Err(Error::Parse(_))));
        assert!(matches!(require_token("-h", None, "e"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_walk_pairs_and_unknown() {
        let args = strings(&["-h", "host", "-z", "-q", "7", "stray"]);
        let mut seen = Vec::new();
        let unknown = walk_options(&args, |opt, arg| {
            seen.push((opt.to_string(), arg.map(str::to_string)));
            Ok(opt != "-q")
        })
        .unwrap();
        assert_eq!(unknown, strings(&["-q", "7", "stray"]));
        assert_eq!(seen[0], ("-h".to_string(), Some("host".to_string())));
        assert_eq!(seen[1], ("-z".to_string(), None));
    }

    #[test]
    fn test_walk_argument_never_starts_with_dash() {
        let args = strings(&["-p", "-1"]);
        let mut got = None;
        walk_options(&args, |opt, arg| {
            if opt == "-p" {
                got = Some(arg.map(str::to_string));
            }
            Ok(true)
        })
        .unwrap();
        assert_eq!(got, Some(None));
    }

    #[test]
    fn test_quote_if_needed() {
        assert_eq!(quote_if_needed("::1"), "\"::1\"");
        assert_eq!(quote_if_needed("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("tcp", &strings(&["-h", "a b"])), "`tcp -h \"a b\"'");
    }
}
