use std::fmt;

/// Reference to a live unit, as returned by `Runtime::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    /// Runtime-assigned identifier.
    pub id: String,
    /// Name the unit was created with.
    pub name: String,
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Terminal status reported by `Runtime::wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitExit {
    pub status_code: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnitLogs {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl UnitLogs {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}
