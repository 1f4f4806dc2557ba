// Command-line quoting for `CreateProcessW`.
//
// The child's C runtime (and `CommandLineToArgvW`) splits the line with these
// rules: whitespace separates arguments outside quotes; `2n` backslashes
// before a quote become `n` backslashes and the quote toggles quoting;
// `2n+1` backslashes before a quote become `n` backslashes and a literal
// quote; backslashes not followed by a quote are literal.

/// Quote one argument so that it survives the split above unchanged.
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg.contains(|c: char| matches!(c, ' ' | '\t' | '\n' | '\x0b' | '"'));
    if !needs_quotes {
        return arg.to_owned();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Escape the run and the quote itself.
                out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat('\\').take(backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    // A trailing run precedes the closing quote, so it is doubled.
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
    out
}

/// Build a full command line: the program followed by each quoted argument.
pub fn join<I, S>(program: &str, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = quote_arg(program);
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg.as_ref()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_arguments_pass_through() {
        assert_eq!(quote_arg("notepad.exe"), "notepad.exe");
        assert_eq!(quote_arg(r"C:\dir\file"), r"C:\dir\file");
    }

    #[test]
    fn empty_argument_is_quoted() {
        assert_eq!(quote_arg(""), r#""""#);
    }

    #[test]
    fn spaces_force_quotes() {
        assert_eq!(quote_arg("hello world"), r#""hello world""#);
    }

    #[test]
    fn embedded_quote_is_escaped() {
        assert_eq!(quote_arg(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn backslashes_before_quote_are_doubled() {
        assert_eq!(quote_arg(r#"a\"b"#), r#""a\\\"b""#);
    }

    #[test]
    fn trailing_backslashes_are_doubled_before_closing_quote() {
        assert_eq!(quote_arg(r"C:\Program Files\"), r#""C:\Program Files\\""#);
    }

    #[test]
    fn inner_backslashes_stay_literal() {
        assert_eq!(quote_arg(r"C:\a b\c"), r#""C:\a b\c""#);
    }

    #[test]
    fn join_quotes_program_and_args() {
        let line = join(r"C:\Program Files\app.exe", ["-v", "two words", ""]);
        assert_eq!(line, r#""C:\Program Files\app.exe" -v "two words" """#);
    }
}
