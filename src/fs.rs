//! Filesystem seam for the columnar store.
//!
//! The repository only needs directory creation, a recursive file listing,
//! whole-file reads and writes, and a file/directory/missing probe, so that is
//! the whole trait. `LocalFileSystem` roots every relative path under a base
//! directory; an object-store backend would implement the same trait.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

pub trait FileSystem: Send + Sync {
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// All regular files under `dir`, recursively. Listing a missing
    /// directory is an io::ErrorKind::NotFound error; callers that treat
    /// absence as empty handle that themselves.
    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn kind(&self, path: &Path) -> Result<PathKind>;
}

/// Local POSIX backend. All paths handed to the trait are interpreted
/// relative to `root`.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(LocalFileSystem { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn walk(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, out)?;
            } else {
                // Report paths relative to the root, matching what callers
                // passed in.
                let rel = path.strip_prefix(&self.root).unwrap_or(&path);
                out.push(rel.to_path_buf());
            }
        }
        Ok(())
    }
}

impl FileSystem for LocalFileSystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(self.full(path))?;
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        self.walk(&self.full(dir), &mut out)?;
        Ok(out)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.full(path))?)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full = self.full(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&full)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn kind(&self, path: &Path) -> Result<PathKind> {
        match fs::metadata(self.full(path)) {
            Ok(meta) if meta.is_dir() => Ok(PathKind::Directory),
            Ok(_) => Ok(PathKind::File),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PathKind::Missing),
            Err(err) => Err(err.into()),
        }
    }
}
