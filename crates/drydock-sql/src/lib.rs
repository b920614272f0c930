//! SQL text primitives.
//!
//! Statement text is assembled from small pieces with deterministic
//! spacing, so generated SQL is byte-for-byte reproducible across runs.
//! The decision logic (what to emit) lives in `drydock`; this crate only
//! knows how to quote and join.

/// A MySQL identifier wrapper.
///
/// Display writes the value quoted with backticks. Embedded backticks are
/// doubled.
///
/// # Example
/// ```
/// use drydock_sql::Ident;
/// assert_eq!(format!("{}", Ident("player")), "`player`");
/// assert_eq!(format!("{}", Ident("we`ird")), "`we``ird`");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`")?;
        for c in self.0.as_ref().chars() {
            if c == '`' {
                write!(f, "``")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "`")
    }
}

/// A double-quoted string literal wrapper.
///
/// Display writes the value wrapped in double quotes, with embedded quotes
/// and backslashes escaped MySQL-style.
///
/// # Example
/// ```
/// use drydock_sql::Lit;
/// assert_eq!(format!("{}", Lit("Thrall")), "\"Thrall\"");
/// assert_eq!(format!("{}", Lit("say \"hi\"")), "\"say \\\"hi\\\"\"");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            match c {
                '"' => write!(f, "\\\"")?,
                '\\' => write!(f, "\\\\")?,
                _ => write!(f, "{}", c)?,
            }
        }
        write!(f, "\"")
    }
}

/// Quote an identifier with backticks.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Escape a string as a double-quoted literal.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// A statement writer with deterministic spacing.
///
/// Tokens are joined with single spaces; [`SqlWriter::glue`] appends
/// without a separator for punctuation that hugs the previous token
/// (trailing commas, tight parens). [`SqlWriter::finish`] terminates the
/// statement with `;`.
///
/// # Example
/// ```
/// use drydock_sql::{Ident, SqlWriter};
/// let mut w = SqlWriter::new();
/// w.token("DROP TABLE IF EXISTS");
/// w.token(Ident("player"));
/// assert_eq!(w.finish(), "DROP TABLE IF EXISTS `player`;");
/// ```
#[derive(Default)]
pub struct SqlWriter {
    buf: String,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token, preceded by a space unless the statement is empty.
    pub fn token(&mut self, part: impl std::fmt::Display) -> &mut Self {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.glue(part)
    }

    /// Append without a separator.
    pub fn glue(&mut self, part: impl std::fmt::Display) -> &mut Self {
        use std::fmt::Write;
        // String's fmt::Write never fails.
        let _ = write!(self.buf, "{}", part);
        self
    }

    /// Append each item as a token, with `sep` glued between them.
    ///
    /// `sep = " ,"` yields the loose `a , b , c` spacing used in generated
    /// DML; `sep = ","` yields the tight `a,b,c` used in key lists.
    pub fn tokens_sep<I, T>(&mut self, items: I, sep: &str) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Display,
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.glue(sep);
            }
            self.token(item);
        }
        self
    }

    /// Terminate with `;` and return the statement text.
    pub fn finish(mut self) -> String {
        self.buf.push(';');
        self.buf
    }
}
