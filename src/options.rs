//! Parse configuration
//!
//! Entity policy is an explicit value handed to every parse call instead of
//! process-wide state, so parses with different policies can run side by side.

use std::path::{Path, PathBuf};

/// Options controlling a single parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Replace entity references with their replacement text instead of
    /// keeping entity-reference nodes
    pub substitute_entities: bool,
    /// Read the external DTD subset and external entities from local files.
    /// When false, external entities resolve to empty content.
    pub load_external_subsets: bool,
    /// Keep going after recoverable errors and collect them on the document
    pub recover: bool,
    /// Directory relative system identifiers are resolved against
    pub base_dir: Option<PathBuf>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_substitute_entities(mut self, on: bool) -> Self {
        self.substitute_entities = on;
        self
    }

    pub fn with_load_external_subsets(mut self, on: bool) -> Self {
        self.load_external_subsets = on;
        self
    }

    pub fn with_recover(mut self, on: bool) -> Self {
        self.recover = on;
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Resolve a system identifier to a local path.
    ///
    /// Only plain paths and `file:` URIs are accepted; anything with another
    /// scheme is refused so a parse never touches the network.
    pub fn resolve_system_id(&self, system_id: &str) -> Option<PathBuf> {
        let path = if let Some(rest) = system_id.strip_prefix("file://") {
            rest
        } else if let Some(rest) = system_id.strip_prefix("file:") {
            rest
        } else if system_id.contains("://") {
            return None;
        } else {
            system_id
        };

        let path = Path::new(path);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        Some(match &self.base_dir {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_off() {
        let opts = ParseOptions::default();
        assert!(!opts.substitute_entities);
        assert!(!opts.load_external_subsets);
        assert!(!opts.recover);
    }

    #[test]
    fn test_resolve_refuses_network() {
        let opts = ParseOptions::new();
        assert_eq!(opts.resolve_system_id("http://example.com/a.dtd"), None);
    }

    #[test]
    fn test_resolve_relative_to_base() {
        let opts = ParseOptions::new().with_base_dir("/tmp/docs");
        assert_eq!(
            opts.resolve_system_id("ent.txt"),
            Some(PathBuf::from("/tmp/docs/ent.txt"))
        );
        assert_eq!(
            opts.resolve_system_id("file:///etc/x.dtd"),
            Some(PathBuf::from("/etc/x.dtd"))
        );
    }
}
