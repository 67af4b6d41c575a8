use std::path::Path;

/// Host-side follow-up run once the restored data is in place, e.g. regenerating routing tables.
pub trait PostRestoreHook {
    fn after_restore(&mut self, live_root: &Path) -> Result<(), String>;
}

impl<F> PostRestoreHook for F
where
    F: FnMut(&Path) -> Result<(), String>,
{
    fn after_restore(&mut self, live_root: &Path) -> Result<(), String> {
        self(live_root)
    }
}
