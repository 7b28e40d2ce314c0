//! Request-scoped scratch files.
//!
//! A [`ScratchDir`] hands out uniquely named files under a shared directory.
//! Each [`ScratchFile`] owns its path: dropping it removes the file, so
//! release happens on normal return, early return, error propagation, panic
//! unwind, and future cancellation alike. Removal failures are logged, never
//! returned; cleanup must not change what the caller sees.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use shiftfile_core::config::ScratchConfig;
use shiftfile_core::{Error, Result};
use tempfile::TempPath;

/// Random characters in each scratch file name.
const RAND_BYTES: usize = 16;

/// Mode given to files moved out of the scratch directory.
#[cfg(unix)]
const PUBLISHED_MODE: u32 = 0o644;

/// What a scratch file is staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchKind {
    Input,
    Output,
}

impl ScratchKind {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Input => "input_",
            Self::Output => "output_",
        }
    }
}

/// Directory that scratch files are allocated in.
///
/// Cheap to clone; holds no per-request state. Names come from a random
/// token and files are created exclusively, so concurrent callers sharing the
/// directory can never collide.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &ScratchConfig) -> Self {
        Self::new(config.dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new, empty scratch file `<kind>_<token>.<extension>`.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the directory or file cannot be created.
    pub fn acquire(&self, kind: ScratchKind, extension: &str) -> Result<ScratchFile> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            Error::storage(format!("failed to create scratch dir {}", self.root.display()), e)
        })?;

        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let path = tempfile::Builder::new()
            .prefix(kind.prefix())
            .suffix(&suffix)
            .rand_bytes(RAND_BYTES)
            .tempfile_in(&self.root)
            .map_err(|e| Error::storage("failed to allocate scratch file", e))?
            .into_temp_path();

        tracing::trace!(kind = ?kind, path = %path.display(), "acquired scratch file");
        Ok(ScratchFile {
            path: Some(path),
            kind,
        })
    }

    /// Run `work` with a fresh scratch file, releasing it afterwards no matter
    /// how `work` ends (success, error, panic, or the returned future being
    /// dropped). Two-file work nests two calls.
    pub async fn scoped<F, Fut, T>(&self, kind: ScratchKind, extension: &str, work: F) -> Result<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let file = self.acquire(kind, extension)?;
        let result = work(file.path().to_path_buf()).await;
        file.release();
        result
    }
}

/// A scratch file owned by exactly one in-flight conversion.
#[derive(Debug)]
pub struct ScratchFile {
    // `None` only after release or persist.
    path: Option<TempPath>,
    kind: ScratchKind,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn kind(&self) -> ScratchKind {
        self.kind
    }

    /// Remove the file now. Equivalent to dropping it.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// Move the file to `dest` and give up ownership of it.
    ///
    /// Tries a rename first (same filesystem) and falls back to copy + remove.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if neither works; the scratch file is still released.
    pub fn persist(mut self, dest: &Path) -> Result<PathBuf> {
        let Some(temp) = self.path.take() else {
            return Err(Error::storage(
                "scratch file already released",
                io::Error::from(io::ErrorKind::NotFound),
            ));
        };

        let moved = match temp.persist(dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                let temp = e.path;
                let copied = std::fs::copy(&temp, dest);
                release_path(temp, self.kind);
                copied.map(|_| ())
            }
        };
        moved
            .and_then(|()| publish_permissions(dest))
            .map(|()| dest.to_path_buf())
            .map_err(|e| Error::storage(format!("failed to write {}", dest.display()), e))
    }

    fn release_inner(&mut self) {
        if let Some(temp) = self.path.take() {
            release_path(temp, self.kind);
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Scratch files are created owner-only; a delivered file gets ordinary
/// `rw-r--r--` permissions.
#[cfg(unix)]
fn publish_permissions(dest: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dest, std::fs::Permissions::from_mode(PUBLISHED_MODE))
}

#[cfg(not(unix))]
fn publish_permissions(_dest: &Path) -> io::Result<()> {
    Ok(())
}

/// Remove a scratch file; "already gone" is fine, anything else is logged.
fn release_path(temp: TempPath, kind: ScratchKind) {
    let shown = temp.display().to_string();
    match temp.close() {
        Ok(()) => tracing::trace!(kind = ?kind, path = %shown, "released scratch file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(kind = ?kind, path = %shown, "failed to remove scratch file: {e}"),
    }
}
