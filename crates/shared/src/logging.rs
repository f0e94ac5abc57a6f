//! Size-bounded rotating log file
//!
//! `RotatingFileWriter` appends to a log file and, once the file would grow
//! past `max_bytes`, shifts `app.log.1 .. app.log.N-1` up by one, moves the
//! active file to `app.log.1` and starts a fresh file. At most `backups`
//! rotated files are kept. A `max_bytes` of zero disables rotation.
//!
//! The writer is handed to `tracing-subscriber` wrapped in a `Mutex`, which
//! makes it a `MakeWriter` shared by every thread.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only log file that rotates by size
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    /// Opens (or creates) the log file at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backups,
            file,
            written,
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the rotated file with the given index (1 is the newest)
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        for index in (1..self.backups).rev() {
            let src = self.backup_path(index);
            if src.exists() {
                let dst = self.backup_path(index + 1);
                if dst.exists() {
                    fs::remove_file(&dst)?;
                }
                fs::rename(&src, &dst)?;
            }
        }

        let newest = self.backup_path(1);
        if newest.exists() {
            fs::remove_file(&newest)?;
        }
        fs::rename(&self.path, &newest)?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0
            && self.written > 0
            && self.written + buf.len() as u64 > self.max_bytes
        {
            self.rotate()?;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
