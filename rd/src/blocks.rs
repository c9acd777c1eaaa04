//! Block store
//!
//! Reusable reply fragments, loaded lazily and cached for the engine's
//! lifetime. Resolution for a bare name checks in order:
//! 1. The file declared for it in the registry's `blocks_registry`
//! 2. The conventional `blocks/<name>` path (extensions `.html`, `.md`, none)
//! 3. The embedded defaults
//!
//! A path-like reference (contains `/`) goes straight to the extension
//! probe under the templates root. Anything unresolvable is `None`: the
//! caller renders no content and the miss is logged once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::embedded;

/// Probe order for references without an extension.
const EXTENSIONS: [&str; 3] = ["html", "md", ""];

/// Caching loader for block fragments.
pub struct BlockStore {
    /// Templates root all relative references resolve under
    root: PathBuf,

    /// Block name -> file, from the registry document
    files: HashMap<String, String>,

    /// Resolved text by name; `None` records a miss so it logs only once
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl BlockStore {
    /// Create a store over a templates root with the registry's block table
    pub fn new(root: impl AsRef<Path>, files: HashMap<String, String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Store that only resolves embedded blocks (for tests)
    pub fn embedded_only() -> Self {
        Self::new(PathBuf::new(), HashMap::new())
    }

    /// Load a block by name or path-like reference.
    ///
    /// The first resolution is cached; repeated loads of the same name do
    /// not touch the filesystem again.
    pub fn load(&self, name: &str) -> Option<String> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = cache.get(name) {
            return cached.clone();
        }
        let resolved = self.locate(name);
        if resolved.is_none() {
            warn!(%name, "Block not found, rendering no content");
        }
        cache.insert(name.to_string(), resolved.clone());
        resolved
    }

    fn locate(&self, name: &str) -> Option<String> {
        if name.contains('/') {
            return self.probe(name);
        }

        if let Some(file) = self.files.get(name) {
            let path = self.root.join(file);
            if path.exists() {
                debug!(%name, path = %path.display(), "Loading block from registry file");
                return read_fragment(&path);
            }
            debug!(%name, %file, "Registry-declared block file does not exist");
        }

        if let Some(text) = self.probe(&format!("blocks/{name}")) {
            return Some(text);
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "Using embedded block");
            return Some(normalize_fragment(content));
        }

        None
    }

    fn probe(&self, reference: &str) -> Option<String> {
        for ext in EXTENSIONS {
            let candidate = if ext.is_empty() {
                reference.to_string()
            } else {
                format!("{reference}.{ext}")
            };
            let path = self.root.join(&candidate);
            if path.exists() {
                debug!(%reference, path = %path.display(), "Loading block by path probe");
                return read_fragment(&path);
            }
        }
        None
    }
}

/// Blocks double as `{{> name}}` partials.
impl stencil::Partials for BlockStore {
    fn resolve(&self, name: &str) -> Option<String> {
        self.load(name)
    }
}

/// Read and normalize one fragment file.
pub(crate) fn read_fragment(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(normalize_fragment(&content)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to read fragment");
            None
        }
    }
}

/// On-load normalization: comments out, blank-line runs collapsed, trimmed.
pub(crate) fn normalize_fragment(text: &str) -> String {
    stencil::collapse_newlines(&stencil::strip_comments(text))
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_registry_declared_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "fragments/paiement.html", "Payez ici.");
        write(dir.path(), "blocks/action_paiement.html", "Autre contenu.");
        let mut files = HashMap::new();
        files.insert(
            "action_paiement".to_string(),
            "fragments/paiement.html".to_string(),
        );
        let store = BlockStore::new(dir.path(), files);
        assert_eq!(store.load("action_paiement").as_deref(), Some("Payez ici."));
    }

    #[test]
    fn test_conventional_path_probes_html_before_md() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blocks/relance.html", "version html");
        write(dir.path(), "blocks/relance.md", "version md");
        let store = BlockStore::new(dir.path(), HashMap::new());
        assert_eq!(store.load("relance").as_deref(), Some("version html"));
    }

    #[test]
    fn test_path_like_reference_probed_under_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sections/uber/case_a.md", "Cas A.");
        let store = BlockStore::new(dir.path(), HashMap::new());
        assert_eq!(store.load("sections/uber/case_a").as_deref(), Some("Cas A."));
    }

    #[test]
    fn test_exact_reference_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blocks/note", "sans extension");
        let store = BlockStore::new(dir.path(), HashMap::new());
        assert_eq!(store.load("blocks/note").as_deref(), Some("sans extension"));
    }

    #[test]
    fn test_comments_stripped_and_trimmed_on_load() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "blocks/statut.md",
            "\n\n{{!-- interne --}}Votre dossier avance.<!-- html -->\n\n\n",
        );
        let store = BlockStore::new(dir.path(), HashMap::new());
        assert_eq!(
            store.load("statut").as_deref(),
            Some("Votre dossier avance.")
        );
    }

    #[test]
    fn test_missing_block_is_none_and_cached() {
        let store = BlockStore::new("/nonexistent", HashMap::new());
        assert_eq!(store.load("fantome"), None);
        assert_eq!(store.load("fantome"), None);
    }

    #[test]
    fn test_embedded_signature_fallback() {
        let store = BlockStore::embedded_only();
        let signature = store.load("signature").expect("embedded signature exists");
        assert!(signature.contains("Cordialement"));
    }

    #[test]
    fn test_cache_keeps_first_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blocks/info.md", "premier");
        let store = BlockStore::new(dir.path(), HashMap::new());
        assert_eq!(store.load("info").as_deref(), Some("premier"));
        write(dir.path(), "blocks/info.md", "second");
        assert_eq!(store.load("info").as_deref(), Some("premier"));
    }
}
