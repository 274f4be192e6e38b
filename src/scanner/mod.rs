//! Per-repository scanner
//!
//! `RepoScanner` owns one scan run: file discovery, artifact hashing, the
//! sanity gate, structural and implementation signal scans, complexity
//! profiling, drift detection, and JUnit evidence parsing. The hash cache
//! is scoped to the scanner instance; nothing here is shared or persisted
//! across runs.

mod complexity;
mod drift;
mod junit;
mod sanity;
mod signals;
mod structure;

pub use junit::{TestEvidence, TEST_REPORTS_DIR};

use crate::models::ArtifactHash;
use crate::parsers;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Directories never considered part of the implementation surface.
const EXCLUDED_DIRS: &[&str] = &["__pycache__", "venv", ".venv"];

/// Scanner for a single repository. Single-threaded; one instance per run.
pub struct RepoScanner {
    repo_path: PathBuf,
    hash_cache: RefCell<FxHashMap<PathBuf, String>>,
}

impl RepoScanner {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        let raw: PathBuf = repo_path.into();
        let repo_path = raw.canonicalize().unwrap_or(raw);
        Self {
            repo_path,
            hash_cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// The canonical source root (`src/`) for this repository.
    pub fn source_root(&self) -> PathBuf {
        self.repo_path.join("src")
    }

    /// Resolve a declared path against the repo root. Existing paths are
    /// canonicalized; missing ones are normalized lexically so set
    /// membership stays stable either way.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let p = Path::new(raw);
        let joined = if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.repo_path.join(p)
        };
        joined
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexical(&joined))
    }

    /// SHA-256 digest of a file's full byte content, or `Missing` when the
    /// file cannot be read. Digests are cached per scanner run, keyed by
    /// resolved path.
    pub fn hash_artifact(&self, path: &Path) -> ArtifactHash {
        let key = path
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexical(path));

        if let Some(digest) = self.hash_cache.borrow().get(&key) {
            return ArtifactHash::Present(digest.clone());
        }

        match std::fs::read(&key) {
            Ok(bytes) => {
                let digest = format!("{:x}", Sha256::digest(&bytes));
                self.hash_cache
                    .borrow_mut()
                    .insert(key, digest.clone());
                ArtifactHash::Present(digest)
            }
            Err(err) => {
                debug!(path = %key.display(), error = %err, "artifact unreadable");
                ArtifactHash::Missing
            }
        }
    }

    /// All Python files under the repository, sorted, skipping hidden
    /// directories, virtualenvs, and bytecode caches. Used for repo-wide
    /// fallbacks and normalization denominators.
    pub fn gather_python_files(&self) -> Vec<PathBuf> {
        let walker = ignore::WalkBuilder::new(&self.repo_path)
            .standard_filters(false)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| has_extension(e.path(), "py"))
            .map(|e| e.path().to_path_buf())
            .filter(|p| !self.path_excluded(p))
            .collect();
        files.sort();
        files
    }

    fn path_excluded(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.repo_path).unwrap_or(path);
        rel.components().any(|c| {
            let part = c.as_os_str().to_string_lossy();
            part.starts_with('.') || EXCLUDED_DIRS.contains(&part.as_ref())
        })
    }

    /// Discover implementation files under the source root.
    ///
    /// Excludes test directories and `test_*`/`tests_*` files, bytecode
    /// caches, and anything already present in `declared` (set
    /// difference). Returns canonicalized absolute paths, sorted. Empty
    /// when `src/` does not exist.
    pub fn discover_impl_files(&self, declared: &[PathBuf]) -> Vec<PathBuf> {
        let src_root = self.source_root();
        if !src_root.exists() {
            return vec![];
        }

        let declared_set: std::collections::BTreeSet<&PathBuf> = declared.iter().collect();

        let walker = ignore::WalkBuilder::new(&src_root)
            .standard_filters(false)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter(|e| has_extension(e.path(), "py"))
            .map(|e| e.path().to_path_buf())
            .filter(|p| !is_test_path(p))
            .filter(|p| {
                !p.components().any(|c| {
                    let part = c.as_os_str().to_string_lossy();
                    EXCLUDED_DIRS.contains(&part.as_ref())
                })
            })
            .filter_map(|p| p.canonicalize().ok())
            .filter(|p| !declared_set.contains(p))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Verify that a file contains a function matching a required
    /// signature: the function must exist, optionally take exactly the
    /// expected parameters (a leading `self` receiver is dropped before
    /// comparison), and optionally carry a named decorator.
    pub fn ast_check(&self, path: &Path, signature: &SignatureSpec) -> (bool, String) {
        if !path.exists() {
            return (false, format!("File not found: {}", path.display()));
        }

        let file_signals = match parsers::extract_file(path) {
            Ok(s) => s,
            Err(err) => return (false, format!("Parse error: {err}")),
        };

        let Some(func) = file_signals
            .functions
            .iter()
            .find(|f| f.name == signature.function)
        else {
            return (
                false,
                format!(
                    "Required function '{}' not found in {}",
                    signature.function,
                    path.display()
                ),
            );
        };

        if let Some(expected) = &signature.params {
            let actual = func.params_without_self();
            if actual != expected.as_slice() {
                return (
                    false,
                    format!(
                        "Function '{}' parameters mismatch: expected {:?}, found {:?}",
                        func.name, expected, actual
                    ),
                );
            }
        }

        if let Some(decorator) = &signature.decorator {
            if !func.decorators.iter().any(|d| d == decorator) {
                return (
                    false,
                    format!(
                        "Decorator '{}' not found on function '{}' (found: {:?})",
                        decorator, func.name, func.decorators
                    ),
                );
            }
        }

        (true, format!("Function '{}' compliant", func.name))
    }
}

/// Required function signature for [`RepoScanner::ast_check`].
#[derive(Debug, Clone, Default)]
pub struct SignatureSpec {
    pub function: String,
    pub params: Option<Vec<String>>,
    pub decorator: Option<String>,
}

impl SignatureSpec {
    /// Presence-only check for a named function.
    pub fn named(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            params: None,
            decorator: None,
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// True for paths under a `tests/` directory or named like a test module.
fn is_test_path(path: &Path) -> bool {
    let in_tests_dir = path.components().any(|c| {
        c.as_os_str()
            .to_string_lossy()
            .eq_ignore_ascii_case("tests")
    });
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    in_tests_dir || name.starts_with("test_") || name.starts_with("tests_")
}

/// Lexical path cleanup for paths that cannot be canonicalized (missing
/// files): strips `.` segments and folds `..` into its parent.
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MISSING_FILE_HASH;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_artifact_hashes_to_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = RepoScanner::new(dir.path());
        let hash = scanner.hash_artifact(&dir.path().join("absent.py"));
        assert_eq!(hash.to_string(), MISSING_FILE_HASH);
    }

    #[test]
    fn identical_content_hashes_identically() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.py", "x = 1\n");
        let b = write(dir.path(), "sub/b.py", "x = 1\n");
        let scanner = RepoScanner::new(dir.path());
        assert_eq!(scanner.hash_artifact(&a), scanner.hash_artifact(&b));
        assert!(scanner.hash_artifact(&a).is_present());
    }

    #[test]
    fn discovery_excludes_tests_and_declared() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/core.py", "def run():\n    pass\n");
        write(dir.path(), "src/declared.py", "def d():\n    pass\n");
        write(dir.path(), "src/tests/test_core.py", "def test_run():\n    pass\n");
        write(dir.path(), "src/test_helper.py", "def test_h():\n    pass\n");
        write(dir.path(), "src/__pycache__/core.py", "");

        let scanner = RepoScanner::new(dir.path());
        let declared = vec![scanner.resolve("src/declared.py")];
        let found = scanner.discover_impl_files(&declared);
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["core.py"]);
    }

    #[test]
    fn discovery_without_source_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib/other.py", "def f():\n    pass\n");
        let scanner = RepoScanner::new(dir.path());
        assert!(scanner.discover_impl_files(&[]).is_empty());
    }

    #[test]
    fn gather_skips_hidden_and_cache_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.py", "");
        write(dir.path(), ".hidden/b.py", "");
        write(dir.path(), "venv/c.py", "");
        let scanner = RepoScanner::new(dir.path());
        let files = scanner.gather_python_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/a.py"));
    }

    #[test]
    fn ast_check_verifies_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "src/flow.py",
            r#"
@stage
def process(self, record, options):
    return record
"#,
        );
        let scanner = RepoScanner::new(dir.path());

        let (ok, _) = scanner.ast_check(&path, &SignatureSpec::named("process"));
        assert!(ok);

        let spec = SignatureSpec {
            function: "process".to_string(),
            params: Some(vec!["record".to_string(), "options".to_string()]),
            decorator: Some("stage".to_string()),
        };
        let (ok, msg) = scanner.ast_check(&path, &spec);
        assert!(ok, "{msg}");

        let wrong = SignatureSpec {
            function: "process".to_string(),
            params: Some(vec!["record".to_string()]),
            decorator: None,
        };
        let (ok, msg) = scanner.ast_check(&path, &wrong);
        assert!(!ok);
        assert!(msg.contains("parameters mismatch"));

        let (ok, msg) = scanner.ast_check(&path, &SignatureSpec::named("absent"));
        assert!(!ok);
        assert!(msg.contains("not found"));
    }
}
