//! Quote-aware statement splitter for SQL dumps.
//!
//! A statement ends at `;` immediately followed by `\n`, `\r` or end of input, as long as
//! the scanner is outside any quoted string. Input arrives in chunks of any size; whenever
//! a decision needs a byte that has not arrived yet (a trailing `;`, a trailing quote that
//! may be the first half of `''`, a trailing backslash) the scanner stops and resumes at
//! that byte on the next chunk, so output never depends on where chunks were cut.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString(u8),
    /// The byte after a backslash inside a string; consumed uninterpreted.
    Escaped(u8),
}

pub struct StatementSplitter {
    pending: Vec<u8>,
    /// Next byte of `pending` to examine.
    pos: usize,
    state: ScanState,
}

impl Default for StatementSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementSplitter {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            pos: 0,
            state: ScanState::Normal,
        }
    }

    /// Feed the next chunk; every statement completed by it is passed to `emit`, trimmed.
    pub fn feed<F: FnMut(&[u8])>(&mut self, chunk: &[u8], emit: &mut F) {
        self.pending.extend_from_slice(chunk);
        self.scan(false, emit);
    }

    /// Flush at end of input. Text after the last terminator is emitted as a final statement.
    pub fn finish<F: FnMut(&[u8])>(&mut self, emit: &mut F) {
        self.scan(true, emit);
        let rest = trim_statement(&self.pending);
        if !rest.is_empty() {
            emit(rest);
        }
        self.pending.clear();
        self.pos = 0;
        self.state = ScanState::Normal;
    }

    /// Bytes held for the statement currently being assembled.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    fn scan<F: FnMut(&[u8])>(&mut self, eof: bool, emit: &mut F) {
        let buf = &self.pending;
        let len = buf.len();
        let mut start = 0usize;
        let mut i = self.pos;

        while i < len {
            let c = buf[i];
            match self.state {
                ScanState::Escaped(q) => {
                    self.state = ScanState::InString(q);
                    i += 1;
                }
                ScanState::InString(q) => {
                    if c == b'\\' {
                        if i + 1 < len {
                            self.state = ScanState::Escaped(q);
                        } else if !eof {
                            break;
                        }
                        i += 1;
                        continue;
                    }
                    if c == q {
                        if q == b'\'' {
                            if i + 1 < len {
                                if buf[i + 1] == b'\'' {
                                    i += 2;
                                    continue;
                                }
                            } else if !eof {
                                break;
                            }
                        }
                        self.state = ScanState::Normal;
                    }
                    i += 1;
                }
                ScanState::Normal => {
                    if c == b'\'' || c == b'"' {
                        self.state = ScanState::InString(c);
                    } else if c == b';' {
                        let boundary = if i + 1 < len {
                            matches!(buf[i + 1], b'\n' | b'\r')
                        } else if eof {
                            true
                        } else {
                            break;
                        };
                        if boundary {
                            let stmt = trim_statement(&buf[start..=i]);
                            if !stmt.is_empty() {
                                emit(stmt);
                            }
                            start = i + 1;
                        }
                    }
                    i += 1;
                }
            }
        }

        self.pending.drain(..start);
        self.pos = i - start;
    }
}

fn trim_statement(b: &[u8]) -> &[u8] {
    let ws = |c: &u8| matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\0' | 0x0b);
    let head = b.iter().position(|c| !ws(c)).unwrap_or(b.len());
    let tail = b.iter().rposition(|c| !ws(c)).map_or(head, |p| p + 1);
    &b[head..tail]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_in_chunks(input: &[u8], chunk: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut emit = |s: &[u8]| out.push(String::from_utf8_lossy(s).into_owned());
        let mut sp = StatementSplitter::new();
        for c in input.chunks(chunk) {
            sp.feed(c, &mut emit);
        }
        sp.finish(&mut emit);
        out
    }

    const DUMP: &str = "CREATE TABLE `t` (id int);\n\
        INSERT INTO `t` VALUES (1,'a;b'),(2,'it''s;\nfine');\r\n\
        INSERT INTO `t` VALUES (3,'back\\'slash;\n'),(4,\"dq ' ;\n\");\n\
        UPDATE t SET a=1; UPDATE t SET b=2;\n\
        SELECT ''''; \n\
        SELECT 1;";

    #[test]
    fn splits_on_terminator_followed_by_newline() {
        let out = split_in_chunks(DUMP.as_bytes(), DUMP.len());
        assert_eq!(
            out,
            vec![
                "CREATE TABLE `t` (id int);",
                "INSERT INTO `t` VALUES (1,'a;b'),(2,'it''s;\nfine');",
                "INSERT INTO `t` VALUES (3,'back\\'slash;\n'),(4,\"dq ' ;\n\");",
                "UPDATE t SET a=1; UPDATE t SET b=2;",
                "SELECT ''''; \nSELECT 1;",
            ]
        );
    }

    #[test]
    fn chunk_size_never_changes_output() {
        let whole = split_in_chunks(DUMP.as_bytes(), DUMP.len());
        for size in 1..=DUMP.len() {
            assert_eq!(split_in_chunks(DUMP.as_bytes(), size), whole, "chunk size {size}");
        }
    }

    #[test]
    fn semicolon_inside_string_is_not_a_boundary() {
        let out = split_in_chunks(b"INSERT INTO t VALUES ('a;\nb');\n", 4);
        assert_eq!(out, vec!["INSERT INTO t VALUES ('a;\nb');"]);
    }

    #[test]
    fn doubled_quote_split_across_chunks_stays_literal() {
        let input = b"INSERT INTO t VALUES ('x'';\ny');\nSELECT 2;\n";
        let cut = input.iter().position(|&c| c == b'\'').unwrap() + 3;
        let mut out = Vec::new();
        let mut emit = |s: &[u8]| out.push(String::from_utf8_lossy(s).into_owned());
        let mut sp = StatementSplitter::new();
        sp.feed(&input[..cut], &mut emit);
        sp.feed(&input[cut..], &mut emit);
        sp.finish(&mut emit);
        assert_eq!(out, vec!["INSERT INTO t VALUES ('x'';\ny');", "SELECT 2;"]);
    }

    #[test]
    fn trailing_terminator_waits_for_next_chunk() {
        let mut out: Vec<Vec<u8>> = Vec::new();
        let mut emit = |s: &[u8]| out.push(s.to_vec());
        let mut sp = StatementSplitter::new();
        sp.feed(b"SELECT 1;", &mut emit);
        sp.feed(b" SELECT 2;", &mut emit);
        sp.finish(&mut emit);
        assert_eq!(out, vec![b"SELECT 1; SELECT 2;".to_vec()]);
    }

    #[test]
    fn completed_statements_are_released() {
        let mut n = 0;
        let mut emit = |_: &[u8]| n += 1;
        let mut sp = StatementSplitter::new();
        sp.feed(b"SELECT 1;\nSELECT 2;\nSELE", &mut emit);
        assert_eq!(sp.buffered(), "\nSELE".len());
        sp.finish(&mut emit);
        assert_eq!(n, 3);
    }

    #[test]
    fn whitespace_only_input_emits_nothing() {
        assert!(split_in_chunks(b" \n\r\n ", 2).is_empty());
    }
}
