//! Page File: fixed-size block I/O over a single regular file.
//!
//! A page file's length is always an integer multiple of [`PAGE_SIZE`].
//! Block `n` occupies byte range `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)`.
//! This is the bottom layer of the storage stack — it has no notion of
//! slots, headers, or schemas, only opaque fixed-size blocks.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

/// A handle to an open page file.
///
/// Carries the filename, the total page count, a cursor page used by the
/// convenience readers (`first`/`prev`/`current`/`next`/`last`), and the
/// single `File` descriptor used for every read and write. Per spec §9,
/// there is exactly one descriptor per open handle; it is released only by
/// [`PageFile::close`].
pub struct PageFile {
    path: PathBuf,
    file: Option<File>,
    total_pages: u64,
    cur_page: u64,
}

impl PageFile {
    /// Create a new page file of exactly one zero-filled page.
    pub fn create(path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .map_err(|e| DbError::FileNotFound(format!("{}: {e}", path.display())))?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        Ok(())
    }

    /// Open an existing page file, computing `total_pages` from its length.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|_| DbError::FileNotFound(path.display().to_string()))?;
        let len = file.metadata()?.len();
        Ok(Self {
            path,
            total_pages: len / PAGE_SIZE as u64,
            cur_page: 0,
            file: Some(file),
        })
    }

    /// Release the underlying descriptor. Idempotent calls after close fail
    /// with `FileHandleNotInit`.
    pub fn close(&mut self) -> DbResult<()> {
        if self.file.take().is_none() {
            return Err(DbError::FileHandleNotInit);
        }
        Ok(())
    }

    /// Remove the file backing this page file from disk.
    pub fn destroy(path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|_| DbError::FileNotFound(path.display().to_string()))
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn cur_page(&self) -> u64 {
        self.cur_page
    }

    fn file_mut(&mut self) -> DbResult<&mut File> {
        self.file.as_mut().ok_or(DbError::FileHandleNotInit)
    }

    /// Read block `n` into `buf`, which must be exactly `PAGE_SIZE` bytes.
    /// Requires `0 <= n < total_pages`.
    pub fn read_block(&mut self, n: u64, buf: &mut [u8]) -> DbResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DbError::GeneralError(format!(
                "read_block buffer must be {PAGE_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        if n >= self.total_pages {
            return Err(DbError::ReadNonExistingPage(n));
        }
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(n * PAGE_SIZE as u64))?;
        file.read_exact(buf)
            .map_err(|_| DbError::ReadNonExistingPage(n))?;
        self.cur_page = n;
        Ok(())
    }

    /// Write `buf` (exactly `PAGE_SIZE` bytes) to block `n`. Writing at
    /// `n == total_pages` is equivalent to an append and grows the file.
    pub fn write_block(&mut self, n: u64, buf: &[u8]) -> DbResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(DbError::GeneralError(format!(
                "write_block buffer must be {PAGE_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        if n > self.total_pages {
            return Err(DbError::WriteFailed(format!(
                "page {n} is beyond the writable range (total_pages={})",
                self.total_pages
            )));
        }
        let grows = n == self.total_pages;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(n * PAGE_SIZE as u64))?;
        file.write_all(buf)?;
        file.flush()?;
        if grows {
            self.total_pages += 1;
        }
        self.cur_page = n;
        Ok(())
    }

    /// Extend the file by one zero-filled page.
    pub fn append_empty_block(&mut self) -> DbResult<()> {
        let zeros = [0u8; PAGE_SIZE];
        self.write_block(self.total_pages, &zeros)
    }

    /// Ensure the file has at least `k` pages, appending zero-filled pages
    /// as needed.
    pub fn ensure_capacity(&mut self, k: u64) -> DbResult<()> {
        while self.total_pages < k {
            self.append_empty_block()?;
        }
        Ok(())
    }

    /// Read the first block (page 0).
    pub fn first(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(0, buf)
    }

    /// Read the block immediately before the cursor.
    pub fn prev(&mut self, buf: &mut [u8]) -> DbResult<()> {
        if self.cur_page == 0 {
            return Err(DbError::ReadNonExistingPage(0));
        }
        self.read_block(self.cur_page - 1, buf)
    }

    /// Re-read the block at the cursor.
    pub fn current(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(self.cur_page, buf)
    }

    /// Read the block immediately after the cursor.
    pub fn next(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(self.cur_page + 1, buf)
    }

    /// Read the last block in the file.
    pub fn last(&mut self, buf: &mut [u8]) -> DbResult<()> {
        if self.total_pages == 0 {
            return Err(DbError::ReadNonExistingPage(0));
        }
        self.read_block(self.total_pages - 1, buf)
    }

    /// Snapshot of this handle's bookkeeping, for debug output.
    pub fn stats(&self) -> PageFileStats {
        PageFileStats {
            filename: self.path.display().to_string(),
            total_pages: self.total_pages,
            cur_page: self.cur_page,
        }
    }
}

/// A human-readable snapshot of a page file's bookkeeping fields, the Rust
/// analogue of the source's `printPageFileInfo` debug dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageFileStats {
    pub filename: String,
    pub total_pages: u64,
    pub cur_page: u64,
}

impl fmt::Display for PageFileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = common::pretty::render_string_table(
            &["filename", "total_pages", "cur_page"],
            vec![vec![
                self.filename.clone(),
                self.total_pages.to_string(),
                self.cur_page.to_string(),
            ]],
            common::pretty::TableStyleKind::Modern,
        );
        write!(f, "{rendered}")
    }
}
