use crate::result::CheckResult;
use std::sync::{Mutex, MutexGuard};

/// Process-lifetime, append-only history of every successful check.
///
/// Shared by all workers through an `Arc`. Appends and renders take the
/// same lock, so a rendered array is always a consistent prefix of the log.
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: Mutex<Vec<CheckResult>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one result. Returns the new length.
    pub fn append(&self, result: CheckResult) -> usize {
        let mut entries = self.lock();
        entries.push(result);
        entries.len()
    }

    /// Append `result` and render the whole log in one critical section,
    /// so the rendered array ends with this entry. A failed render takes the entry back out.
    pub fn record(&self, result: CheckResult) -> Result<String, serde_json::Error> {
        self.record_with(result, |entries| serde_json::to_string(entries))
    }

    fn record_with<E>(
        &self,
        result: CheckResult,
        render: impl FnOnce(&[CheckResult]) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut entries = self.lock();
        entries.push(result);
        let rendered = render(&entries);
        if rendered.is_err() {
            entries.pop();
        }
        rendered
    }

    /// Render every entry, oldest first, as a JSON array.
    pub fn render_all(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.lock())
    }

    pub fn snapshot(&self) -> Vec<CheckResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Entries are pushed whole, so a poisoned lock still guards a valid Vec.
    fn lock(&self) -> MutexGuard<'_, Vec<CheckResult>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
