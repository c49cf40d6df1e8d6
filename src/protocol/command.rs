//! Command definitions
//!
//! A request as it arrives from a client: a name and its arguments.

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name as sent (matched case-insensitively)
    pub name: Vec<u8>,

    /// Arguments after the name
    pub args: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(name: impl Into<Vec<u8>>, args: Vec<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build from the raw request parts; `None` if there is no name
    pub fn from_parts(mut parts: Vec<Vec<u8>>) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        let name = parts.remove(0);
        Some(Self { name, args: parts })
    }

    /// Lowercased name, the dispatch table key
    pub fn name_lowercase(&self) -> String {
        String::from_utf8_lossy(&self.name).to_ascii_lowercase()
    }

    /// Name followed by arguments
    pub fn parts(&self) -> impl Iterator<Item = &[u8]> {
        std::iter::once(self.name.as_slice()).chain(self.args.iter().map(|a| a.as_slice()))
    }
}
