//! Where extracted entries end up.
//!
//! The extractor only ever needs four operations: create a directory with
//! its ancestors, open a file for writing (truncating it), append bytes,
//! and close. [`Filesystem`] is the blocking form of that contract and
//! [`AsyncFilesystem`] the suspending one. [`HostFs`] and [`TokioFs`]
//! implement them on the real filesystem, below a root directory.

use std::{
    fs::File,
    future::Future,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tokio::io::AsyncWriteExt;

/// Blocking filesystem operations used by the extractor.
pub trait Filesystem {
    /// An open output file.
    type File;

    /// Create a directory and any missing ancestors. Succeeds if it exists.
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()>;

    /// Create or truncate a file and open it for writing.
    fn create_file(&mut self, path: &Path) -> io::Result<Self::File>;

    /// Append bytes to an open file.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> io::Result<()>;

    /// Close a file, reporting any error that was deferred until now.
    fn close(&mut self, file: Self::File) -> io::Result<()>;
}

/// Suspending filesystem operations used by the extractor.
///
/// This is the async version of [`Filesystem`].
pub trait AsyncFilesystem: Send {
    /// An open output file.
    type File: Send;

    /// Create a directory and any missing ancestors. Succeeds if it exists.
    fn create_dir_all(&mut self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// Create or truncate a file and open it for writing.
    fn create_file(&mut self, path: &Path)
        -> impl Future<Output = io::Result<Self::File>> + Send;

    /// Append bytes to an open file.
    fn write(
        &mut self,
        file: &mut Self::File,
        data: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Close a file, reporting any error that was deferred until now.
    fn close(&mut self, file: Self::File) -> impl Future<Output = io::Result<()>> + Send;
}

/// The host filesystem, through `std::fs`.
#[derive(Debug, Clone)]
pub struct HostFs {
    root: PathBuf,
}

impl HostFs {
    /// Resolve entry paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory entry paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Filesystem for HostFs {
    type File = BufWriter<File>;

    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(self.root.join(path))
    }

    fn create_file(&mut self, path: &Path) -> io::Result<Self::File> {
        File::create(self.root.join(path)).map(BufWriter::new)
    }

    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> io::Result<()> {
        file.write_all(data)
    }

    fn close(&mut self, file: Self::File) -> io::Result<()> {
        file.into_inner().map_err(io::IntoInnerError::into_error)?;
        Ok(())
    }
}

/// The host filesystem, through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct TokioFs {
    root: PathBuf,
}

impl TokioFs {
    /// Resolve entry paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory entry paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AsyncFilesystem for TokioFs {
    type File = tokio::io::BufWriter<tokio::fs::File>;

    fn create_dir_all(&mut self, path: &Path) -> impl Future<Output = io::Result<()>> + Send {
        let path = self.root.join(path);
        async move { tokio::fs::create_dir_all(path).await }
    }

    fn create_file(
        &mut self,
        path: &Path,
    ) -> impl Future<Output = io::Result<Self::File>> + Send {
        let path = self.root.join(path);
        async move {
            tokio::fs::File::create(path)
                .await
                .map(tokio::io::BufWriter::new)
        }
    }

    fn write(
        &mut self,
        file: &mut Self::File,
        data: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send {
        async move { file.write_all(data).await }
    }

    fn close(&mut self, mut file: Self::File) -> impl Future<Output = io::Result<()>> + Send {
        // tokio::fs::File finishes writes in the background; flush before drop
        async move { file.flush().await }
    }
}
