//! A persistent keyed index over `(Value, RecordId)` pairs, organized as a
//! real B+Tree: internal nodes route by key, leaves hold sorted entries
//! and chain together so a scan can walk them in ascending order without
//! re-sorting.
//!
//! Page 0 of the backing file holds index metadata (root page, key type,
//! fan-out, entry count); every page after it is one bincode-encoded node.

mod node;

pub use node::{BTreeNode, NodeType};

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult, IndexId, PageId, RecordId};
use storage::PAGE_SIZE;
use types::{DataType, Value};

fn bincode_config() -> impl Config {
    config::legacy()
}

fn key_cmp(a: &Value, b: &Value) -> Ordering {
    a.cmp_same_type(b)
        .expect("btree keys must share the index's declared key type")
}

fn data_type_tag(dt: DataType) -> u8 {
    match dt {
        DataType::Int => 0,
        DataType::Float => 1,
        DataType::Str => 2,
        DataType::Bool => 3,
    }
}

fn data_type_from_tag(tag: u8) -> DbResult<DataType> {
    match tag {
        0 => Ok(DataType::Int),
        1 => Ok(DataType::Float),
        2 => Ok(DataType::Str),
        3 => Ok(DataType::Bool),
        other => Err(DbError::InvalidHeader(format!("unknown key type tag {other}"))),
    }
}

const METADATA_PAGE: PageId = PageId(0);

/// A persistent B+Tree index that stores key-value pairs on disk.
#[derive(Debug)]
pub struct BTreeIndex {
    pub index_id: IndexId,
    key_type: DataType,
    max_keys: usize,
    root_page_id: PageId,
    file: File,
    num_pages: u64,
    num_entries: u64,
}

impl BTreeIndex {
    /// Create a new index file: page 0 is metadata, page 1 is an empty
    /// root leaf. `n` bounds both leaf entries and internal node fan-out.
    pub fn create(path: &Path, index_id: IndexId, key_type: DataType, n: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut index = Self {
            index_id,
            key_type,
            max_keys: n,
            root_page_id: PageId(1),
            file,
            num_pages: 0,
            num_entries: 0,
        };

        index.allocate_page()?; // page 0: reserved for metadata
        let root_page = index.allocate_page()?;
        index.write_node(root_page, &BTreeNode::new_leaf())?;
        index.root_page_id = root_page;
        index.write_metadata()?;

        Ok(index)
    }

    /// Open an existing index file, reading metadata back from page 0.
    pub fn open(path: &Path, index_id: IndexId) -> DbResult<Self> {
        if !path.exists() {
            return Err(DbError::FileNotFound(path.display().to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).truncate(false).open(path)?;
        let file_len = file.metadata()?.len();
        let num_pages = file_len / PAGE_SIZE as u64;
        if num_pages == 0 {
            return Err(DbError::InvalidHeader("index file is empty".into()));
        }

        let mut index = Self {
            index_id,
            key_type: DataType::Int,
            max_keys: 1,
            root_page_id: PageId(1),
            file,
            num_pages,
            num_entries: 0,
        };
        index.read_metadata()?;
        Ok(index)
    }

    /// Remove an index's backing file from disk.
    pub fn destroy(path: &Path) -> DbResult<()> {
        std::fs::remove_file(path).map_err(|_| DbError::FileNotFound(path.display().to_string()))
    }

    pub fn get_key_type(&self) -> DataType {
        self.key_type
    }

    pub fn get_num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Nodes allocated, excluding the metadata page.
    pub fn get_num_nodes(&self) -> u64 {
        self.num_pages.saturating_sub(1)
    }

    /// Insert `(key, rid)`. A later `find_key` for the same key returns
    /// this entry, since new entries are placed after any existing
    /// duplicates in leaf order.
    pub fn insert_key(&mut self, key: Value, rid: RecordId) -> DbResult<()> {
        let result = self.insert_recursive(self.root_page_id, key, rid)?;
        if let Some((split_key, new_child_page)) = result {
            let new_root_page = self.allocate_page()?;
            let new_root = BTreeNode::Internal {
                keys: vec![split_key],
                children: vec![self.root_page_id, new_child_page],
            };
            self.write_node(new_root_page, &new_root)?;
            self.root_page_id = new_root_page;
        }
        self.num_entries += 1;
        Ok(())
    }

    /// Return the most recently inserted RID for `key`.
    pub fn find_key(&mut self, key: &Value) -> DbResult<RecordId> {
        let leaf_page_id = self.find_leaf(key)?;
        let leaf = self.read_node(leaf_page_id)?;
        match leaf {
            BTreeNode::Leaf { entries, .. } => entries
                .iter()
                .filter(|(k, _)| key_cmp(k, key) == Ordering::Equal)
                .next_back()
                .map(|(_, rid)| *rid)
                .ok_or(DbError::KeyNotFound),
            BTreeNode::Internal { .. } => Err(DbError::GeneralError("find_leaf returned non-leaf node".into())),
        }
    }

    /// Remove every entry matching `key`. Returns the count removed.
    pub fn delete_key(&mut self, key: &Value) -> DbResult<usize> {
        let leaf_page_id = self.find_leaf(key)?;
        let mut leaf = self.read_node(leaf_page_id)?;
        let removed = match &mut leaf {
            BTreeNode::Leaf { entries, .. } => {
                let before = entries.len();
                entries.retain(|(k, _)| key_cmp(k, key) != Ordering::Equal);
                before - entries.len()
            }
            BTreeNode::Internal { .. } => {
                return Err(DbError::GeneralError("find_leaf returned non-leaf node".into()));
            }
        };
        if removed > 0 {
            self.write_node(leaf_page_id, &leaf)?;
            self.num_entries = self.num_entries.saturating_sub(removed as u64);
        }
        Ok(removed)
    }

    /// Open a cursor positioned at the leftmost leaf's first entry.
    pub fn open_tree_scan(&mut self) -> DbResult<TreeScan> {
        let mut page_id = self.root_page_id;
        loop {
            match self.read_node(page_id)? {
                BTreeNode::Internal { children, .. } => {
                    page_id = *children
                        .first()
                        .ok_or_else(|| DbError::GeneralError("internal node has no children".into()))?;
                }
                BTreeNode::Leaf { .. } => break,
            }
        }
        Ok(TreeScan {
            leaf_page: Some(page_id),
            idx: 0,
        })
    }

    /// Advance the cursor, returning entries in ascending key order.
    pub fn next_entry(&mut self, scan: &mut TreeScan) -> DbResult<(Value, RecordId)> {
        loop {
            let page = scan.leaf_page.ok_or(DbError::NoMoreEntries)?;
            let BTreeNode::Leaf { entries, next_leaf } = self.read_node(page)? else {
                return Err(DbError::GeneralError("expected leaf in scan".into()));
            };
            if scan.idx < entries.len() {
                let (k, rid) = entries[scan.idx].clone();
                scan.idx += 1;
                return Ok((k, rid));
            }
            scan.leaf_page = next_leaf;
            scan.idx = 0;
        }
    }

    pub fn close_tree_scan(&mut self, _scan: TreeScan) -> DbResult<()> {
        Ok(())
    }

    /// Flush any pending writes (the metadata page) to disk.
    pub fn flush(&mut self) -> DbResult<()> {
        self.write_metadata()?;
        self.file.flush()?;
        Ok(())
    }

    // ---- Private helpers ----

    fn find_leaf(&mut self, key: &Value) -> DbResult<PageId> {
        let mut current = self.root_page_id;
        loop {
            match self.read_node(current)? {
                BTreeNode::Internal { keys, children } => {
                    let idx = keys.partition_point(|k| key_cmp(k, key) != Ordering::Greater);
                    current = children[idx];
                }
                BTreeNode::Leaf { .. } => return Ok(current),
            }
        }
    }

    fn insert_recursive(
        &mut self,
        page_id: PageId,
        key: Value,
        rid: RecordId,
    ) -> DbResult<Option<(Value, PageId)>> {
        let node = self.read_node(page_id)?;
        match node {
            BTreeNode::Internal { keys, children } => {
                let idx = keys.partition_point(|k| key_cmp(k, &key) != Ordering::Greater);
                let child_page = children[idx];
                let split_result = self.insert_recursive(child_page, key, rid)?;

                if let Some((new_key, new_child)) = split_result {
                    let mut new_keys = keys;
                    let mut new_children = children;
                    new_keys.insert(idx, new_key);
                    new_children.insert(idx + 1, new_child);

                    if new_keys.len() > self.max_keys {
                        let (left, split_key, right) = self.split_internal(new_keys, new_children);
                        self.write_node(page_id, &left)?;
                        let right_page = self.allocate_page()?;
                        self.write_node(right_page, &right)?;
                        return Ok(Some((split_key, right_page)));
                    }
                    self.write_node(
                        page_id,
                        &BTreeNode::Internal {
                            keys: new_keys,
                            children: new_children,
                        },
                    )?;
                }
                Ok(None)
            }
            BTreeNode::Leaf { mut entries, next_leaf } => {
                let idx = entries.partition_point(|(k, _)| key_cmp(k, &key) != Ordering::Greater);
                entries.insert(idx, (key, rid));

                if entries.len() > self.max_keys {
                    let (mut left, right, split_key) = self.split_leaf(entries, next_leaf);
                    let right_page = self.allocate_page()?;
                    if let BTreeNode::Leaf { next_leaf: left_next, .. } = &mut left {
                        *left_next = Some(right_page);
                    }
                    self.write_node(page_id, &left)?;
                    self.write_node(right_page, &right)?;
                    return Ok(Some((split_key, right_page)));
                }
                self.write_node(page_id, &BTreeNode::Leaf { entries, next_leaf })?;
                Ok(None)
            }
        }
    }

    fn split_leaf(
        &self,
        entries: Vec<(Value, RecordId)>,
        original_next: Option<PageId>,
    ) -> (BTreeNode, BTreeNode, Value) {
        let mid = entries.len() / 2;
        let (left_entries, right_entries) = entries.split_at(mid);
        let split_key = right_entries[0].0.clone();

        let left = BTreeNode::Leaf {
            entries: left_entries.to_vec(),
            next_leaf: None,
        };
        let right = BTreeNode::Leaf {
            entries: right_entries.to_vec(),
            next_leaf: original_next,
        };
        (left, right, split_key)
    }

    fn split_internal(&self, keys: Vec<Value>, children: Vec<PageId>) -> (BTreeNode, Value, BTreeNode) {
        let mid = keys.len() / 2;
        let split_key = keys[mid].clone();

        let left = BTreeNode::Internal {
            keys: keys[..mid].to_vec(),
            children: children[..=mid].to_vec(),
        };
        let right = BTreeNode::Internal {
            keys: keys[mid + 1..].to_vec(),
            children: children[mid + 1..].to_vec(),
        };
        (left, split_key, right)
    }

    fn allocate_page(&mut self) -> DbResult<PageId> {
        let page_id = PageId(self.num_pages);
        self.num_pages += 1;
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        Ok(page_id)
    }

    fn read_node(&mut self, page_id: PageId) -> DbResult<BTreeNode> {
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file.read_exact(&mut buffer)?;
        let (node, _): (BTreeNode, usize) = decode_from_slice(&buffer, bincode_config())
            .map_err(|e| DbError::InvalidHeader(format!("failed to decode btree node: {e}")))?;
        Ok(node)
    }

    fn write_node(&mut self, page_id: PageId, node: &BTreeNode) -> DbResult<()> {
        let bytes = encode_to_vec(node, bincode_config())
            .map_err(|e| DbError::WriteFailed(format!("failed to encode btree node: {e}")))?;
        if bytes.len() > PAGE_SIZE {
            return Err(DbError::WriteFailed(format!(
                "btree node too large: {} bytes (max {PAGE_SIZE})",
                bytes.len()
            )));
        }
        let mut buffer = vec![0u8; PAGE_SIZE];
        buffer[..bytes.len()].copy_from_slice(&bytes);
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer)?;
        Ok(())
    }

    fn write_metadata(&mut self) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0..8].copy_from_slice(&self.root_page_id.0.to_le_bytes());
        buf[8..12].copy_from_slice(&(self.max_keys as u32).to_le_bytes());
        buf[12] = data_type_tag(self.key_type);
        buf[13..21].copy_from_slice(&self.num_entries.to_le_bytes());
        self.file.seek(SeekFrom::Start(METADATA_PAGE.0 * PAGE_SIZE as u64))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn read_metadata(&mut self) -> DbResult<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(METADATA_PAGE.0 * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut buf)?;
        self.root_page_id = PageId(u64::from_le_bytes(buf[0..8].try_into().unwrap()));
        self.max_keys = u32::from_le_bytes(buf[8..12].try_into().unwrap()) as usize;
        self.key_type = data_type_from_tag(buf[12])?;
        self.num_entries = u64::from_le_bytes(buf[13..21].try_into().unwrap());
        Ok(())
    }
}

/// A cursor over an index's leaf chain, yielding entries in ascending
/// key order.
pub struct TreeScan {
    leaf_page: Option<PageId>,
    idx: usize,
}

#[cfg(test)]
mod tests;
