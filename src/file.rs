//! A `File` is a directory containing zero or more block subdirectories at
//! arbitrary nesting depth. Block names may contain `/` path components;
//! the directory tree between `basename` and the block's own subdirectory
//! is created on demand (`mkdir_p`), matching the original's
//! `big_file_mksubdir_r`.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::block::Block;
use crate::error::{BigFileError, Result};
use crate::here;

const HEADER_FILE: &str = "header";

pub struct File {
    basename: PathBuf,
}

impl File {
    /// Open an existing directory. Fails if `basename` does not exist.
    pub fn open(basename: impl Into<PathBuf>) -> Result<File> {
        let basename = basename.into();
        let meta = fs::metadata(&basename).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BigFileError::BlockNotFound {
                    path: basename.clone(),
                    loc: here!(),
                }
            } else {
                BigFileError::io(basename.clone(), e, here!())
            }
        })?;
        if !meta.is_dir() {
            return Err(BigFileError::HeaderMalformed {
                path: basename.clone(),
                reason: "not a directory".to_string(),
                loc: here!(),
            });
        }
        Ok(File { basename })
    }

    /// Create the directory (recursively; a no-op if it already exists).
    pub fn create(basename: impl Into<PathBuf>) -> Result<File> {
        let basename = basename.into();
        mkdir_p(&basename)?;
        Ok(File { basename })
    }

    pub fn basename(&self) -> &Path {
        &self.basename
    }

    fn block_path(&self, name: &str) -> PathBuf {
        self.basename.join(name)
    }

    pub fn open_block(&self, name: &str) -> Result<Block> {
        Block::open(self.block_path(name))
    }

    pub fn create_block(&self, name: &str, dtype: Option<&str>, nmemb: usize, fsize: &[u64]) -> Result<Block> {
        let path = self.block_path(name);
        mkdir_p(&path)?;
        debug!("created block {:?} under {:?}", name, self.basename);
        Block::create(path, dtype, nmemb, fsize)
    }

    /// Recursively walk the directory tree, returning the path (relative to
    /// `basename`) of every subdirectory that contains a `header` file.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        walk(&self.basename, &self.basename, &mut out)?;
        out.sort();
        Ok(out)
    }

    /// Releases the in-memory handle; there are no open OS resources to
    /// flush (blocks hold shard file handles only transiently), so this is
    /// just a drop of `self`.
    pub fn close(self) {}
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| BigFileError::io(dir.to_path_buf(), e, here!()))?;
    for entry in entries {
        let entry = entry.map_err(|e| BigFileError::io(dir.to_path_buf(), e, here!()))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| BigFileError::io(path.clone(), e, here!()))?;
        if !file_type.is_dir() {
            continue;
        }
        if path.join(HEADER_FILE).is_file() {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            out.push(rel.to_string_lossy().into_owned());
        }
        walk(root, &path, out)?;
    }
    Ok(())
}

/// Recursively create `path` and all missing ancestors, treating an
/// already-existing directory as success rather than an error (the
/// external-filesystem-collaborator's `mkdir_p` contract from spec.md §1).
pub fn mkdir_p(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) => Err(BigFileError::Mkdir {
            path: path.to_path_buf(),
            source: e,
            loc: here!(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    struct TestTempDir {
        path: PathBuf,
    }

    impl TestTempDir {
        fn new(label: &str) -> Self {
            let _ = env_logger::try_init();
            let id = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("bigfile-file-test-{}-{}-{}", label, std::process::id(), id));
            TestTempDir { path }
        }
    }

    impl Drop for TestTempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn create_then_open_roundtrips() {
        let dir = TestTempDir::new("open-create");
        let f = File::create(&dir.path).unwrap();
        f.close();
        File::open(&dir.path).unwrap();
    }

    #[test]
    fn opening_missing_directory_fails() {
        let dir = TestTempDir::new("missing");
        let err = File::open(dir.path.join("nope")).unwrap_err();
        assert!(matches!(err, BigFileError::BlockNotFound { .. }));
    }

    #[test]
    fn create_block_supports_nested_path_names() {
        let dir = TestTempDir::new("nested-block");
        let f = File::create(&dir.path).unwrap();
        let block = f.create_block("group/pos", Some("<f4"), 3, &[4]).unwrap();
        block.close().unwrap();
        assert!(f.open_block("group/pos").is_ok());
    }

    #[test]
    fn list_finds_blocks_at_any_depth() {
        let dir = TestTempDir::new("list");
        let f = File::create(&dir.path).unwrap();
        f.create_block("pos", Some("<f4"), 3, &[4]).unwrap().close().unwrap();
        f.create_block("sub/vel", Some("<f4"), 3, &[4]).unwrap().close().unwrap();

        let mut names = f.list().unwrap();
        names.sort();
        let expect_sep = if cfg!(windows) { "\\" } else { "/" };
        assert_eq!(names, vec!["pos".to_string(), format!("sub{expect_sep}vel")]);
    }
}
