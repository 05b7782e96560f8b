use std::path::{Path, PathBuf};

/// Where a run originates from, which decides the flags a caller may use.
///
/// Local runs come from a terminal on the machine that owns the API key and
/// may touch the filesystem and stdin. Remote runs relay untrusted text (for
/// example from a chat bot) and get a restricted flag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Local {
        /// Directory that relative `--prompt-file` paths resolve against.
        cwd: PathBuf,
    },
    Remote {
        /// Who to contact when the server misbehaves.
        admin_contact: String,
        /// Identity the relaying caller vouches for; owns chat sessions.
        user_id: String,
    },
}

impl ExecutionContext {
    pub fn local(cwd: impl Into<PathBuf>) -> Self {
        Self::Local { cwd: cwd.into() }
    }

    pub fn remote(admin_contact: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Remote {
            admin_contact: admin_contact.into(),
            user_id: user_id.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Working directory for local runs, `None` for remote runs.
    pub fn cwd(&self) -> Option<&Path> {
        match self {
            Self::Local { cwd } => Some(cwd),
            Self::Remote { .. } => None,
        }
    }

    pub fn admin_contact(&self) -> Option<&str> {
        match self {
            Self::Local { .. } => None,
            Self::Remote { admin_contact, .. } => Some(admin_contact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_context_exposes_cwd() {
        let ctx = ExecutionContext::local("/tmp/project");
        assert!(!ctx.is_remote());
        assert_eq!(ctx.cwd(), Some(Path::new("/tmp/project")));
        assert_eq!(ctx.admin_contact(), None);
    }

    #[test]
    fn remote_context_hides_cwd() {
        let ctx = ExecutionContext::remote("admin@example.com", "u1");
        assert!(ctx.is_remote());
        assert_eq!(ctx.cwd(), None);
        assert_eq!(ctx.admin_contact(), Some("admin@example.com"));
    }
}
