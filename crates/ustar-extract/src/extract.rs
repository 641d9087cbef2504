//! Extraction entry points.
//!
//! [`extract_from`] and [`extract_from_async`] drive an [`Extractor`] over
//! any reader and [`Filesystem`]/[`AsyncFilesystem`]. The path-based
//! functions open an archive file and extract it onto the host filesystem.
//!
//! The archive stream and the file being written are owned by the running
//! call and closed on every exit path. For the async variants that includes
//! the future being dropped, which is how an extraction is cancelled.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use tokio::io::AsyncRead;

use crate::{
    block::{read_block, read_block_async},
    engine::{Action, ExtractSummary, Extractor},
    error::{ExtractError, Result},
    fs::{AsyncFilesystem, Filesystem, HostFs, TokioFs},
    options::ExtractOptions,
    progress::{LogSink, Reporter},
};

/// Extract an archive file below the current directory.
///
/// Progress lines are written to `log` if one is given.
///
/// # Errors
///
/// Fails with [`ExtractError::SourceNotFound`] before touching anything if
/// `source` does not exist. Any other error aborts the extraction and leaves
/// whatever was already extracted in place.
pub fn extract(source: impl AsRef<Path>, log: Option<&mut dyn LogSink>) -> Result<ExtractSummary> {
    extract_with(source, log, &ExtractOptions::default())
}

/// Extract an archive file with explicit options.
///
/// # Errors
///
/// See [`extract`].
pub fn extract_with(
    source: impl AsRef<Path>,
    log: Option<&mut dyn LogSink>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let source = source.as_ref();
    if !source.try_exists()? {
        return Err(ExtractError::SourceNotFound(source.to_owned()));
    }

    log::debug!(
        "extracting {} into {}",
        source.display(),
        options.root.display()
    );
    let mut archive = BufReader::new(File::open(source)?);
    extract_from(&mut archive, &mut HostFs::new(&options.root), log, options)
}

/// Extract an archive file below the current directory, asynchronously.
///
/// This is the async version of [`extract`].
///
/// # Errors
///
/// See [`extract`].
pub async fn extract_async(
    source: impl AsRef<Path>,
    log: Option<&mut dyn LogSink>,
) -> Result<ExtractSummary> {
    extract_with_async(source, log, &ExtractOptions::default()).await
}

/// Extract an archive file with explicit options, asynchronously.
///
/// This is the async version of [`extract_with`].
///
/// # Errors
///
/// See [`extract`].
pub async fn extract_with_async(
    source: impl AsRef<Path>,
    log: Option<&mut dyn LogSink>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let source = source.as_ref();
    if !tokio::fs::try_exists(source).await? {
        return Err(ExtractError::SourceNotFound(source.to_owned()));
    }

    log::debug!(
        "extracting {} into {}",
        source.display(),
        options.root.display()
    );
    let mut archive = tokio::io::BufReader::new(tokio::fs::File::open(source).await?);
    extract_from_async(
        &mut archive,
        &mut TokioFs::new(&options.root),
        log,
        options,
    )
    .await
}

/// Extract an archive stream into `fs`.
///
/// Reading stops right after the end-of-archive block; anything behind it
/// is left in `reader`.
///
/// # Errors
///
/// See [`extract`].
pub fn extract_from<F: Filesystem>(
    reader: &mut impl Read,
    fs: &mut F,
    log: Option<&mut dyn LogSink>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let mut extractor = Extractor::new(options);
    let mut reporter = Reporter::new(log);
    let mut open: Option<(PathBuf, F::File)> = None;

    loop {
        match extractor.next_action()? {
            Action::ReadBlock => {
                let block = read_block(reader, extractor.position())?;
                extractor.feed(block);
            }
            Action::CreateDir(path) => {
                fs.create_dir_all(&path)
                    .map_err(ExtractError::filesystem(&path))?;
            }
            Action::CreateFile(path) => {
                let file = fs
                    .create_file(&path)
                    .map_err(ExtractError::filesystem(&path))?;
                open = Some((path, file));
            }
            Action::Write(chunk) => {
                let (path, file) = open.as_mut().expect("writes only follow CreateFile");
                fs.write(file, chunk.as_bytes())
                    .map_err(ExtractError::filesystem(path))?;
            }
            Action::CloseFile => {
                let (path, file) = open.take().expect("CloseFile only follows CreateFile");
                fs.close(file).map_err(ExtractError::filesystem(&path))?;
            }
            Action::Report(event) => reporter.report(&event),
            Action::Finished => return Ok(extractor.summary()),
        }
    }
}

/// Extract an archive stream into `fs`, asynchronously.
///
/// This is the async version of [`extract_from`].
///
/// # Errors
///
/// See [`extract`].
pub async fn extract_from_async<F: AsyncFilesystem>(
    reader: &mut (impl AsyncRead + Unpin),
    fs: &mut F,
    log: Option<&mut dyn LogSink>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let mut extractor = Extractor::new(options);
    let mut reporter = Reporter::new(log);
    let mut open: Option<(PathBuf, F::File)> = None;

    loop {
        match extractor.next_action()? {
            Action::ReadBlock => {
                let block = read_block_async(reader, extractor.position()).await?;
                extractor.feed(block);
            }
            Action::CreateDir(path) => {
                fs.create_dir_all(&path)
                    .await
                    .map_err(ExtractError::filesystem(&path))?;
            }
            Action::CreateFile(path) => {
                let file = fs
                    .create_file(&path)
                    .await
                    .map_err(ExtractError::filesystem(&path))?;
                open = Some((path, file));
            }
            Action::Write(chunk) => {
                let (path, file) = open.as_mut().expect("writes only follow CreateFile");
                fs.write(file, chunk.as_bytes())
                    .await
                    .map_err(ExtractError::filesystem(path))?;
            }
            Action::CloseFile => {
                let (path, file) = open.take().expect("CloseFile only follows CreateFile");
                fs.close(file)
                    .await
                    .map_err(ExtractError::filesystem(&path))?;
            }
            Action::Report(event) => reporter.report(&event),
            Action::Finished => return Ok(extractor.summary()),
        }
    }
}
