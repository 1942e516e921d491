use log::warn;
use thiserror::Error;

/// Relaxations of the strict `Exec` grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// Accept the escapes Wine writes into its desktop files: `\` outside
    /// quotes escapes any character and `\ ` is legal inside quotes.
    /// https://bugs.winehq.org/show_bug.cgi?id=57329
    pub wine_escaping: bool,
    /// Treat runs of unquoted spaces as a single separator.
    pub multiple_spaces: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("found unquoted escape sequence on character {offset} of the Exec key (counted without \"Exec=\")")]
    UnquotedEscape { offset: usize },
    #[error("found invalid escape sequence '\\{ch}' on characters {offset}-{end} of the Exec key (counted without \"Exec=\")", end = .offset + 1)]
    InvalidEscape { ch: char, offset: usize },
    #[error("escape character '\\' on character {offset} of the Exec key has nothing to escape")]
    TrailingEscape { offset: usize },
    #[error("\"\" quoted string is missing its closing quote in the Exec key")]
    MissingClosingQuote,
}

/// A quirk that had to be applied while splitting a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    WineEscaping,
    MultipleSpaces,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Normal,
    InQuotes,
    /// A backslash was read at `offset`; `quoted` tells which state to return to.
    Escaping { quoted: bool, offset: usize },
}

fn escape_allowed(ch: char, quoted: bool, quirks: Quirks) -> bool {
    match ch {
        '"' | '`' | '$' | '\\' => true,
        ' ' => quirks.wine_escaping,
        // An unquoted escape is only reachable with the Wine quirk enabled.
        _ => !quoted,
    }
}

/// Splits `Exec` templates into argument vectors.
///
/// Every advisory is logged at most once per parser, so a parser should live
/// for one template (or one short batch of them).
#[derive(Debug, Default)]
pub struct ExecParser {
    quirks: Quirks,
    advisories: Vec<Advisory>,
}

impl ExecParser {
    pub fn new(quirks: Quirks) -> Self {
        Self {
            quirks,
            advisories: Vec::new(),
        }
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    fn advise(&mut self, advisory: Advisory) {
        if self.advisories.contains(&advisory) {
            return;
        }
        match advisory {
            Advisory::WineEscaping => warn!(
                "The selected desktop file uses invalid escape sequences in its Exec key. \
                 This does not conform to the Desktop Entry Specification and is only \
                 accepted because the wine quirk is enabled."
            ),
            Advisory::MultipleSpaces => warn!(
                "The selected desktop file uses multiple spaces to separate arguments in \
                 its Exec key. This does not conform to the Desktop Entry Specification \
                 and is only accepted because the multiple-spaces quirk is enabled."
            ),
        }
        self.advisories.push(advisory);
    }

    /// Tokenize `exec` into separate arguments.
    ///
    /// Without the multiple-spaces quirk every unquoted space ends an argument,
    /// so `a  b` yields `["a", "", "b"]`.
    pub fn split(&mut self, exec: &str) -> Result<Vec<String>, ExecError> {
        let mut args = Vec::new();
        let mut current = String::new();
        let mut state = State::Normal;

        for (index, ch) in exec.chars().enumerate() {
            let offset = index + 1;
            state = match state {
                State::Normal => match ch {
                    '"' => State::InQuotes,
                    ' ' => {
                        if current.is_empty() && self.quirks.multiple_spaces {
                            self.advise(Advisory::MultipleSpaces);
                        } else {
                            args.push(std::mem::take(&mut current));
                        }
                        State::Normal
                    }
                    '\\' if self.quirks.wine_escaping => {
                        self.advise(Advisory::WineEscaping);
                        State::Escaping {
                            quoted: false,
                            offset,
                        }
                    }
                    '\\' => return Err(ExecError::UnquotedEscape { offset }),
                    _ => {
                        current.push(ch);
                        State::Normal
                    }
                },
                State::InQuotes => match ch {
                    '"' => State::Normal,
                    '\\' => State::Escaping {
                        quoted: true,
                        offset,
                    },
                    _ => {
                        current.push(ch);
                        State::InQuotes
                    }
                },
                State::Escaping { quoted, offset } => {
                    if !escape_allowed(ch, quoted, self.quirks) {
                        return Err(ExecError::InvalidEscape { ch, offset });
                    }
                    if quoted && ch == ' ' {
                        self.advise(Advisory::WineEscaping);
                    }
                    current.push(ch);
                    if quoted { State::InQuotes } else { State::Normal }
                }
            };
        }

        match state {
            State::InQuotes => Err(ExecError::MissingClosingQuote),
            State::Escaping { offset, .. } => Err(ExecError::TrailingEscape { offset }),
            State::Normal => {
                if !current.is_empty() {
                    args.push(current);
                }
                Ok(args)
            }
        }
    }
}

/// Split `exec` with a fresh parser.
pub fn split_exec(exec: &str, quirks: Quirks) -> Result<Vec<String>, ExecError> {
    ExecParser::new(quirks).split(exec)
}

/// Check escape sequences and quoting of `exec` without tokenizing it.
/// Accepts exactly what [`ExecParser::split`] accepts.
pub fn validate_exec_key(exec: &str, quirks: Quirks) -> Result<(), ExecError> {
    let mut in_quotes = false;
    let mut chars = exec.chars().enumerate();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' => {
                let offset = index + 1;
                if !in_quotes && !quirks.wine_escaping {
                    return Err(ExecError::UnquotedEscape { offset });
                }
                match chars.next() {
                    None => return Err(ExecError::TrailingEscape { offset }),
                    Some((_, next)) if !escape_allowed(next, in_quotes, quirks) => {
                        return Err(ExecError::InvalidEscape { ch: next, offset });
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }
    }

    if in_quotes {
        Err(ExecError::MissingClosingQuote)
    } else {
        Ok(())
    }
}
