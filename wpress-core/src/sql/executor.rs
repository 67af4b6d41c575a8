use std::io::Write;

/// Runs one prepared statement against the relational store.
///
/// Statements are the dump's raw bytes after rewriting, in whatever encoding the dump used.
/// An `Err` carries the store's error text; the importer records it and moves on.
pub trait StatementExecutor {
    fn execute(&mut self, statement: &[u8]) -> Result<(), String>;
}

impl<E: StatementExecutor + ?Sized> StatementExecutor for &mut E {
    fn execute(&mut self, statement: &[u8]) -> Result<(), String> {
        (**self).execute(statement)
    }
}

impl<E: StatementExecutor + ?Sized> StatementExecutor for Box<E> {
    fn execute(&mut self, statement: &[u8]) -> Result<(), String> {
        (**self).execute(statement)
    }
}

/// Writes each statement on its own line, producing a script a SQL client can replay.
pub struct WriterExecutor<W: Write> {
    out: W,
}

impl<W: Write> WriterExecutor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatementExecutor for WriterExecutor<W> {
    fn execute(&mut self, statement: &[u8]) -> Result<(), String> {
        self.out
            .write_all(statement)
            .and_then(|_| self.out.write_all(b"\n"))
            .map_err(|e| e.to_string())
    }
}
