//! Directory-tree and file-content snapshots.
//!
//! A snapshot is the observable state a session pushes to its client:
//! either a forest of [`FileNode`]s (listing view) or the raw text of one
//! file (document view). Snapshots are rebuilt from scratch on every poll
//! tick and compared against the last pushed value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default recursion depth for directory listings.
pub const DEFAULT_DEPTH: usize = 3;

/// One filesystem entry relative to the server root.
///
/// Directory paths end with `/` (`/sub/`), file paths do not (`/sub/b.nd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn dir(path: impl Into<String>, name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            children,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// What a session last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Tree(Vec<FileNode>),
    Text(String),
}

impl Snapshot {
    /// Whether `other` represents the same observable state.
    ///
    /// Trees compare by [`forest_eq`], text by string equality. Snapshots of
    /// different kinds are never the same.
    pub fn same_as(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (Snapshot::Tree(a), Snapshot::Tree(b)) => forest_eq(a, b),
            (Snapshot::Text(a), Snapshot::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Wire form of this snapshot: a JSON array for trees, raw text otherwise.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            Snapshot::Tree(forest) => serde_json::to_string(forest),
            Snapshot::Text(text) => Ok(text.clone()),
        }
    }
}

/// Errors while producing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SnapshotError {
    fn io(path: &Path, source: io::Error) -> Self {
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produces the current snapshot for a session.
///
/// Polling is one implementation strategy; anything that can answer "what
/// does this look like now" fits here.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn snapshot(&self) -> Result<Snapshot, SnapshotError>;

    /// Human-readable name of what is being observed, for logs and
    /// placeholder payloads.
    fn describe(&self) -> String;
}

/// Structural equality of two forests.
///
/// Same length at every level and same `path` at every index, recursively.
/// Order matters: the same set of nodes in a different order is a change.
pub fn forest_eq(a: &[FileNode], b: &[FileNode]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.path == y.path && forest_eq(&x.children, &y.children))
}

/// Sort every level of a forest case-insensitively by name.
pub fn sort_forest(forest: &mut [FileNode]) {
    forest.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    for node in forest.iter_mut() {
        sort_forest(&mut node.children);
    }
}

/// Keep only files whose name ends with `suffix` and directories that still
/// contain at least one such file after pruning.
///
/// `x.nd.bak` does not qualify: only names the document route serves are
/// listed.
pub fn prune(forest: Vec<FileNode>, suffix: &str) -> Vec<FileNode> {
    forest
        .into_iter()
        .filter_map(|mut node| {
            if node.is_dir() {
                node.children = prune(node.children, suffix);
                (!node.children.is_empty()).then_some(node)
            } else {
                node.name.ends_with(suffix).then_some(node)
            }
        })
        .collect()
}

/// Read the tree under `root` down to `depth` levels, skipping dotfiles.
///
/// Directories at the last level are returned without children. The result
/// is sorted.
pub fn read_tree(root: &Path, depth: usize) -> Result<Vec<FileNode>, SnapshotError> {
    let mut forest = read_level(root, "/", depth)?;
    sort_forest(&mut forest);
    Ok(forest)
}

fn read_level(root: &Path, dir: &str, level: usize) -> Result<Vec<FileNode>, SnapshotError> {
    if level == 0 {
        return Ok(Vec::new());
    }

    let full = root.join(dir.trim_start_matches('/'));
    let entries = fs::read_dir(&full).map_err(|e| SnapshotError::io(&full, e))?;

    let mut nodes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SnapshotError::io(&full, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            // Removed between listing and stat
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(SnapshotError::io(&entry.path(), e)),
        };

        if file_type.is_dir() {
            let path = format!("{}{}/", dir, name);
            let children = match read_level(root, &path, level - 1) {
                Ok(children) => children,
                Err(SnapshotError::Io { source, .. })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            nodes.push(FileNode::dir(path, name, children));
        } else {
            nodes.push(FileNode::file(format!("{}{}", dir, name), name));
        }
    }

    Ok(nodes)
}

/// The listing view: the sorted tree with every subtree lacking a document
/// pruned away.
pub fn listing(root: &Path, depth: usize, suffix: &str) -> Result<Vec<FileNode>, SnapshotError> {
    Ok(prune(read_tree(root, depth)?, suffix))
}

/// Snapshot source for the directory listing of a server root.
#[derive(Debug, Clone)]
pub struct TreeSource {
    root: PathBuf,
    depth: usize,
    suffix: String,
}

impl TreeSource {
    pub fn new(root: impl Into<PathBuf>, depth: usize, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            depth,
            suffix: suffix.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for TreeSource {
    async fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let source = self.clone();
        let forest = tokio::task::spawn_blocking(move || {
            listing(&source.root, source.depth, &source.suffix)
        })
        .await??;
        Ok(Snapshot::Tree(forest))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Snapshot source for the text content of a single file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SnapshotError::io(&self.path, e))?;
        // Invalid sequences become U+FFFD so the rest of the document still shows
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Snapshot::Text(text))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths(forest: &[FileNode]) -> Vec<String> {
        let mut out = Vec::new();
        for node in forest {
            out.push(node.path.clone());
            out.extend(paths(&node.children));
        }
        out
    }

    #[test]
    fn test_forest_eq_is_order_sensitive() {
        let a = vec![FileNode::file("/a.nd", "a.nd"), FileNode::file("/b.nd", "b.nd")];
        let b = vec![FileNode::file("/b.nd", "b.nd"), FileNode::file("/a.nd", "a.nd")];
        assert!(forest_eq(&a, &a.clone()));
        assert!(!forest_eq(&a, &b));
    }

    #[test]
    fn test_forest_eq_recurses_into_children() {
        let a = vec![FileNode::dir(
            "/sub/",
            "sub",
            vec![FileNode::file("/sub/x.nd", "x.nd"), FileNode::file("/sub/y.nd", "y.nd")],
        )];
        let reordered = vec![FileNode::dir(
            "/sub/",
            "sub",
            vec![FileNode::file("/sub/y.nd", "y.nd"), FileNode::file("/sub/x.nd", "x.nd")],
        )];
        let shorter = vec![FileNode::dir(
            "/sub/",
            "sub",
            vec![FileNode::file("/sub/x.nd", "x.nd")],
        )];

        assert!(!forest_eq(&a, &reordered));
        assert!(!forest_eq(&a, &shorter));
    }

    #[test]
    fn test_forest_eq_ignores_names() {
        // Only paths take part in the comparison
        let a = vec![FileNode::file("/a.nd", "a.nd")];
        let b = vec![FileNode::file("/a.nd", "renamed")];
        assert!(forest_eq(&a, &b));
    }

    #[test]
    fn test_snapshot_kinds_never_equal() {
        let tree = Snapshot::Tree(Vec::new());
        let text = Snapshot::Text(String::new());
        assert!(!tree.same_as(&text));
        assert!(!text.same_as(&tree));
        assert!(text.same_as(&Snapshot::Text(String::new())));
    }

    #[test]
    fn test_prune_keeps_only_document_subtrees() {
        let forest = vec![
            FileNode::file("/a.txt", "a.txt"),
            FileNode::dir("/empty/", "empty", vec![]),
            FileNode::dir(
                "/mixed/",
                "mixed",
                vec![
                    FileNode::file("/mixed/keep.nd", "keep.nd"),
                    FileNode::file("/mixed/drop.png", "drop.png"),
                    FileNode::dir(
                        "/mixed/none/",
                        "none",
                        vec![FileNode::file("/mixed/none/x.md", "x.md")],
                    ),
                ],
            ),
            FileNode::dir("/trap.nd/", "trap.nd", vec![]),
        ];

        let pruned = prune(forest, ".nd");
        assert_eq!(paths(&pruned), vec!["/mixed/", "/mixed/keep.nd"]);

        fn check(forest: &[FileNode]) {
            for node in forest {
                if node.is_dir() {
                    assert!(!node.children.is_empty(), "{} kept without documents", node.path);
                    check(&node.children);
                } else {
                    assert!(node.name.ends_with(".nd"));
                }
            }
        }
        check(&pruned);
    }

    #[test]
    fn test_listing_scenario() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.nd"), "b").unwrap();

        let forest = listing(dir.path(), DEFAULT_DEPTH, ".nd").unwrap();
        assert_eq!(
            forest,
            vec![FileNode::dir(
                "/sub/",
                "sub",
                vec![FileNode::file("/sub/b.nd", "b.nd")]
            )]
        );

        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "path": "/sub/",
                "name": "sub",
                "children": [{ "path": "/sub/b.nd", "name": "b.nd", "children": [] }]
            }])
        );
    }

    #[test]
    fn test_read_tree_skips_dotfiles_and_sorts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("beta.nd"), "").unwrap();
        fs::write(dir.path().join("Alpha.nd"), "").unwrap();
        fs::write(dir.path().join("gamma.nd"), "").unwrap();
        fs::write(dir.path().join(".hidden.nd"), "").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("x.nd"), "").unwrap();

        let forest = read_tree(dir.path(), DEFAULT_DEPTH).unwrap();
        assert_eq!(paths(&forest), vec!["/Alpha.nd", "/beta.nd", "/gamma.nd"]);
    }

    #[test]
    fn test_depth_bound() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("one").join("two").join("three");
        fs::create_dir_all(&deep).unwrap();
        fs::write(dir.path().join("one").join("two").join("ok.nd"), "").unwrap();
        fs::write(deep.join("too-deep.nd"), "").unwrap();

        let forest = listing(dir.path(), 3, ".nd").unwrap();
        assert_eq!(paths(&forest), vec!["/one/", "/one/two/", "/one/two/ok.nd"]);

        assert!(listing(dir.path(), 0, ".nd").unwrap().is_empty());
        assert!(listing(dir.path(), 2, ".nd").unwrap().is_empty());
    }

    #[test]
    fn test_read_tree_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(matches!(
            read_tree(&missing, 3),
            Err(SnapshotError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_source_reads_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.nd");
        fs::write(&path, "# title").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(
            source.snapshot().await.unwrap(),
            Snapshot::Text("# title".to_string())
        );

        fs::remove_file(&path).unwrap();
        assert!(source.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_decodes_invalid_utf8_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.nd");
        fs::write(&path, b"caf\xe9 ok").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(
            source.snapshot().await.unwrap(),
            Snapshot::Text("caf\u{FFFD} ok".to_string())
        );
    }

    #[test]
    fn test_prune_requires_suffix_at_end_of_name() {
        let forest = vec![
            FileNode::file("/x.nd.bak", "x.nd.bak"),
            FileNode::file("/x.ndx", "x.ndx"),
            FileNode::dir("/old/", "old", vec![FileNode::file("/old/y.nd~", "y.nd~")]),
            FileNode::file("/y.nd", "y.nd"),
        ];
        assert_eq!(paths(&prune(forest, ".nd")), vec!["/y.nd"]);
    }

    #[tokio::test]
    async fn test_tree_source_produces_tree_payload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.nd"), "").unwrap();

        let source = TreeSource::new(dir.path(), DEFAULT_DEPTH, ".nd");
        let snapshot = source.snapshot().await.unwrap();
        assert_eq!(
            snapshot.to_payload().unwrap(),
            r#"[{"path":"/x.nd","name":"x.nd","children":[]}]"#
        );
    }
}
