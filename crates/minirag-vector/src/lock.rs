use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{IndexError, Result};

/// Exclusive writer lock on a `<index>.lock` file next to the store.
///
/// The lock is an OS advisory lock held through the open file handle, so it
/// goes away with the process even when `Drop` never runs. The file itself
/// stays on disk and only records the pid of the last holder.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
    _file: File,
}

impl WriteLock {
    pub fn acquire(index_path: &Path) -> Result<Self> {
        let path = lock_path(index_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(IndexError::Busy(path));
            }
            return Err(e.into());
        }
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        debug!(lock = %path.display(), "acquired index write lock");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn lock_path(index_path: &Path) -> PathBuf {
    let name = index_path.file_name().map_or_else(|| "index".into(), |n| n.to_string_lossy().into_owned());
    index_path.with_file_name(format!("{name}.lock"))
}
