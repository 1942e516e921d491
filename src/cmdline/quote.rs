/// Quote a string with single quotes.
///
/// Single quotes are read literally by every POSIX-like shell, so the result
/// survives any shell the command may end up in. An embedded `'` is written
/// as `'\''` (close, escaped quote, reopen).
pub fn sq_quote(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 2);
    result.push('\'');
    for ch in input.chars() {
        if ch == '\'' {
            result.push_str("'\\''");
        } else {
            result.push(ch);
        }
    }
    result.push('\'');
    result
}

/// Render an argument vector as a single shell command string.
pub fn argv_to_string<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| sq_quote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
