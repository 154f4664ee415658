use std::fmt;
use std::str::FromStr;

use crate::error::SandboxError;

/// Process-count and memory ceilings applied to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub pids_limit: i64,
    pub memory_bytes: i64,
}

/// A host path exposed inside the unit.
///
/// Written and parsed in the `host:sandbox[:ro]` notation. Paths are passed
/// through as given; the caller is responsible for what it mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub host_path: String,
    pub sandbox_path: String,
    pub read_only: bool,
}

impl Bind {
    pub fn new(host_path: impl Into<String>, sandbox_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            sandbox_path: sandbox_path.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host_path, self.sandbox_path)?;
        if self.read_only {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}

impl FromStr for Bind {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || SandboxError::InvalidConfig(format!("bind must be host:sandbox[:ro], got {s:?}"));
        let mut parts = s.split(':');
        let host = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let target = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;
        let read_only = match parts.next() {
            None | Some("rw") => false,
            Some("ro") => true,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            host_path: host.to_owned(),
            sandbox_path: target.to_owned(),
            read_only,
        })
    }
}

/// Everything the runtime needs to provision one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Runtime-visible name, unique among live units.
    pub name: String,
    pub image: String,
    /// Full argv: interpreter entry point followed by the script text.
    pub command: Vec<String>,
    /// Non-privileged identity the command runs as.
    pub user: String,
    pub resources: ResourceLimits,
    pub binds: Vec<Bind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_bind() {
        let bind: Bind = "/srv/data:/data".parse().unwrap();
        assert_eq!(bind, Bind::new("/srv/data", "/data"));
    }

    #[test]
    fn parse_read_only_bind() {
        let bind: Bind = "/srv/data:/data:ro".parse().unwrap();
        assert!(bind.read_only);
        assert_eq!(bind.to_string(), "/srv/data:/data:ro");
    }

    #[test]
    fn parse_explicit_rw_bind() {
        let bind: Bind = "/a:/b:rw".parse().unwrap();
        assert!(!bind.read_only);
        assert_eq!(bind.to_string(), "/a:/b");
    }

    #[test]
    fn parse_rejects_malformed_binds() {
        for input in ["", "/only-host", ":/data", "/a:", "/a:/b:rx", "/a:/b:ro:extra"] {
            let err = input.parse::<Bind>().unwrap_err();
            assert!(
                matches!(err, SandboxError::InvalidConfig(_)),
                "{input:?} gave {err}"
            );
        }
    }
}
