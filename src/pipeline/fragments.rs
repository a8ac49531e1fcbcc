//! Third-party fragment documents.
//!
//! A fragment is a small settings document contributed by another package.
//! Sources enumerate them; the loader parses and layers each one under the
//! namespace label it came with.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One fragment document and the namespace it is layered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDocument {
    pub namespace: String,
    pub content: String,
    pub path: Option<PathBuf>,
}

pub trait FragmentSource: Send + Sync {
    /// Enumerate fragment documents, skipping namespaces in `disabled`.
    fn fragments(&self, disabled: &HashSet<String>) -> Result<Vec<FragmentDocument>>;
}

/// Fragment documents as `<root>/<namespace>/*.json`.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFragmentSource {
    roots: Vec<PathBuf>,
}

impl DirectoryFragmentSource {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl FragmentSource for DirectoryFragmentSource {
    fn fragments(&self, disabled: &HashSet<String>) -> Result<Vec<FragmentDocument>> {
        let mut documents = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "fragment root does not exist");
                continue;
            }
            for namespace_dir in sorted_entries(root)? {
                if !namespace_dir.is_dir() {
                    continue;
                }
                let Some(namespace) = namespace_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if disabled.contains(namespace) {
                    debug!(namespace, "fragment namespace disabled");
                    continue;
                }
                match read_json_files(&namespace_dir, namespace) {
                    Ok(found) => documents.extend(found),
                    Err(e) => warn!(namespace, error = %e, "skipping unreadable fragment namespace"),
                }
            }
        }
        Ok(documents)
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

/// Read every `*.json` file in `dir`. Unreadable files are logged and skipped.
fn read_json_files(dir: &Path, namespace: &str) -> Result<Vec<FragmentDocument>> {
    let mut documents = Vec::new();
    for path in sorted_entries(dir)? {
        if path.extension().and_then(|e| e.to_str()) != Some("json") || !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => documents.push(FragmentDocument {
                namespace: namespace.to_string(),
                content,
                path: Some(path),
            }),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable fragment"),
        }
    }
    Ok(documents)
}

/// A package that may ship fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogExtension {
    pub package_name: String,
    /// Folder holding the package's public files, if it has one.
    pub public_folder: Option<PathBuf>,
}

/// Asynchronous enumeration of installed packages.
#[async_trait]
pub trait FragmentCatalog: Send + Sync + 'static {
    async fn extensions(&self) -> Result<Vec<CatalogExtension>>;
}

/// Subdirectory of a package's public folder holding its fragments.
pub const CATALOG_FRAGMENTS_DIR: &str = "Fragments";

/// Adapts an async [`FragmentCatalog`] to the synchronous pipeline.
pub struct CatalogFragmentSource<C> {
    catalog: Arc<C>,
}

impl<C: FragmentCatalog> CatalogFragmentSource<C> {
    pub fn new(catalog: Arc<C>) -> Self {
        Self { catalog }
    }
}

impl<C: FragmentCatalog> FragmentSource for CatalogFragmentSource<C> {
    fn fragments(&self, disabled: &HashSet<String>) -> Result<Vec<FragmentDocument>> {
        let catalog = Arc::clone(&self.catalog);
        let extensions = block_on_worker(async move { catalog.extensions().await })??;

        let mut documents = Vec::new();
        for extension in extensions {
            if disabled.contains(&extension.package_name) {
                debug!(package = %extension.package_name, "fragment package disabled");
                continue;
            }
            let Some(folder) = extension.public_folder else {
                continue;
            };
            let dir = folder.join(CATALOG_FRAGMENTS_DIR);
            if dir.is_dir() {
                documents.extend(read_json_files(&dir, &extension.package_name)?);
            }
        }
        Ok(documents)
    }
}

/// Run `future` to completion on a dedicated worker thread with its own
/// runtime, blocking the calling thread until it finishes.
///
/// Safe to call from inside another runtime, since the caller never awaits.
pub fn block_on_worker<F, T>(future: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::sync_channel::<Result<T>>(1);
    std::thread::Builder::new()
        .name("fragment-catalog".to_string())
        .spawn(move || {
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map(|runtime| runtime.block_on(future))
                .context("building worker runtime");
            let _ = tx.send(result);
        })
        .context("spawning worker thread")?;

    rx.recv()
        .map_err(|_| anyhow!("worker thread exited without a result"))?
}
