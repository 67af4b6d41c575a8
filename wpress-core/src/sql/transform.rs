use memchr::memmem;
use regex::bytes::Regex;
use std::sync::LazyLock;

/// Marker the backup tool writes in place of the source site's table prefix.
pub const DEFAULT_PREFIX_PLACEHOLDER: &str = "SERVMASK_PREFIX_";

static CREATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\s*CREATE\s+TABLE)\s+").expect("static regex"));
static CREATE_TABLE_GUARDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+TABLE\s+IF\s+NOT\s+EXISTS\s").expect("static regex")
});
static INSERT_INTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\s*INSERT)\s+INTO\s").expect("static regex"));

/// Fully resolved literal rewrites applied to every statement.
///
/// Statements are raw dump bytes; only the matched literals are replaced, every other byte
/// passes through untouched whatever its encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Substitutions {
    pub old_url: String,
    pub new_url: String,
    pub old_home: String,
    pub new_home: String,
    pub prefix_placeholder: String,
    pub live_prefix: String,
}

impl Substitutions {
    /// Rewrite one statement: URLs, then the table prefix, then the idempotency rewrite.
    pub fn apply(&self, statement: &[u8]) -> Vec<u8> {
        let s = replace_literal(statement, &self.old_url, &self.new_url);
        let s = replace_literal(&s, &self.old_home, &self.new_home);
        let s = replace_literal(&s, &self.prefix_placeholder, &self.live_prefix);
        make_idempotent(&s)
    }
}

fn replace_literal(s: &[u8], from: &str, to: &str) -> Vec<u8> {
    if from.is_empty() || from == to {
        return s.to_vec();
    }
    let mut out = Vec::with_capacity(s.len());
    let mut last = 0;
    for at in memmem::find_iter(s, from.as_bytes()) {
        out.extend_from_slice(&s[last..at]);
        out.extend_from_slice(to.as_bytes());
        last = at + from.len();
    }
    out.extend_from_slice(&s[last..]);
    out
}

/// `CREATE TABLE` gains `IF NOT EXISTS`, `INSERT INTO` becomes `INSERT IGNORE INTO`.
pub fn make_idempotent(statement: &[u8]) -> Vec<u8> {
    if CREATE_TABLE.is_match(statement) {
        if CREATE_TABLE_GUARDED.is_match(statement) {
            return statement.to_vec();
        }
        return CREATE_TABLE
            .replacen(statement, 1, &b"$1 IF NOT EXISTS "[..])
            .into_owned();
    }
    if INSERT_INTO.is_match(statement) {
        return INSERT_INTO
            .replacen(statement, 1, &b"$1 IGNORE INTO "[..])
            .into_owned();
    }
    statement.to_vec()
}

/// Comment-only statements are never sent to the executor.
///
/// Leading `--` / `#` comment lines are dropped first so a statement preceded by a
/// comment header is still executed.
pub fn strip_leading_comments(statement: &[u8]) -> Option<&[u8]> {
    let mut rest = statement.trim_ascii_start();
    while rest.starts_with(b"--") || rest.starts_with(b"#") {
        match memchr::memchr(b'\n', rest) {
            Some(nl) => rest = rest[nl + 1..].trim_ascii_start(),
            None => return None,
        }
    }
    if rest.is_empty() || rest.starts_with(b"/*") {
        None
    } else {
        Some(rest)
    }
}
