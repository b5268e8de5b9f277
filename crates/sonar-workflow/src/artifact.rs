//! Newline-delimited JSON artifact files.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn create(work_dir: &Path) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("sonar_")
        .suffix(".json")
        .tempfile_in(work_dir)?;
    Ok(file)
}

/// Detach a fully written file from its drop guard so it stays on disk.
fn keep(file: NamedTempFile) -> Result<PathBuf> {
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Write `lines` to a new `.json` file in `work_dir` and keep it on disk.
///
/// The file outlives this call; the workflow engine deletes it on close.
/// Nothing is left behind when a write fails.
pub fn write_lines<I>(work_dir: &Path, lines: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut file = create(work_dir)?;

    let mut writer = BufWriter::new(file.as_file_mut());
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    drop(writer);

    let path = keep(file)?;
    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(path)
}

/// Copy `source` into a new file in `work_dir`.
pub fn import(work_dir: &Path, source: &Path) -> Result<PathBuf> {
    let mut reader = File::open(source)?;
    let mut file = create(work_dir)?;
    std::io::copy(&mut reader, file.as_file_mut())?;
    file.as_file_mut().flush()?;
    keep(file)
}

/// Run blocking file work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(std::io::Error::other)?
}

/// Call `f` with every non-empty line of `path`.
pub fn each_line<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            f(&line)?;
        }
    }
    Ok(())
}
