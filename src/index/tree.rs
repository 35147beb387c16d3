//! Ordered key structure backing an index
//!
//! `OrderedTree` is the seam between the index handle and whatever keeps
//! keys sorted on disk. `FileTree` is the shipped implementation: a
//! `BTreeMap` from key to record ids, persisted as a single checksummed file.
//!
//! # File format
//!
//! ```text
//! magic        4 bytes  "RCBT"
//! part_count   u32 LE
//! parts        part_count x (type tag u8, length u32 LE)
//! entry_count  u64 LE
//! entries      entry_count x (key bytes, page u32 LE, slot u32 LE)
//! checksum     u32 LE   CRC32 of every preceding byte
//! ```
//!
//! Writes go to `<path>.tmp`, are fsynced, then renamed over the index file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::vec;

use super::errors::{IndexError, IndexResult};
use super::key::{KeyLayout, KeyPart, TreeKey};
use crate::planner::CompOp;
use crate::storage::Rid;
use crate::types::AttrType;

const MAGIC: &[u8; 4] = b"RCBT";
const CHECKSUM_LEN: usize = 4;

/// Record ids produced by one positioned scan, in key order
#[derive(Debug)]
pub struct TreeCursor {
    rids: vec::IntoIter<Rid>,
}

impl TreeCursor {
    pub fn new(rids: Vec<Rid>) -> Self {
        Self {
            rids: rids.into_iter(),
        }
    }

    pub fn next_rid(&mut self) -> Option<Rid> {
        self.rids.next()
    }
}

/// A persistent ordered multimap from fixed-length keys to record ids
pub trait OrderedTree: Sized {
    /// Creates a new empty structure at `path`, replacing any existing file
    fn create(path: &Path, layout: KeyLayout) -> IndexResult<Self>;

    /// Opens an existing structure
    fn open(path: &Path) -> IndexResult<Self>;

    fn layout(&self) -> &KeyLayout;

    /// Adds `(key, rid)`; duplicates of the same pair are ignored
    fn insert(&mut self, key: &[u8], rid: Rid) -> IndexResult<()>;

    /// Removes `(key, rid)`; returns whether the pair was present
    fn delete(&mut self, key: &[u8], rid: Rid) -> IndexResult<bool>;

    /// Positions a cursor over every entry whose key satisfies `entry op key`
    fn scan(&self, op: CompOp, key: &[u8]) -> IndexResult<TreeCursor>;

    /// Flushes pending changes to disk
    fn sync(&mut self) -> IndexResult<()>;

    /// Flushes and releases the structure; later calls fail
    fn close(&mut self) -> IndexResult<()>;
}

/// File-backed `OrderedTree`
#[derive(Debug)]
pub struct FileTree {
    path: PathBuf,
    layout: Arc<KeyLayout>,
    entries: BTreeMap<TreeKey, BTreeSet<Rid>>,
    dirty: bool,
    closed: bool,
}

impl FileTree {
    /// Number of (key, rid) pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.closed {
            return Err(IndexError::not_initialized());
        }
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> IndexResult<()> {
        let expected = self.layout.key_len();
        if key.len() != expected {
            return Err(IndexError::invalid_key(format!(
                "key is {} bytes, index expects {}",
                key.len(),
                expected
            )));
        }
        Ok(())
    }

    fn tree_key(&self, key: &[u8]) -> TreeKey {
        TreeKey::new(key.to_vec(), self.layout.clone())
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.len() * (self.layout.key_len() + 8));
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(self.layout.parts().len() as u32).to_le_bytes());
        for part in self.layout.parts() {
            buf.push(part.attr_type.tag());
            buf.extend_from_slice(&(part.len as u32).to_le_bytes());
        }
        buf.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for (key, rids) in &self.entries {
            for rid in rids {
                buf.extend_from_slice(key.bytes());
                buf.extend_from_slice(&rid.page_num.to_le_bytes());
                buf.extend_from_slice(&rid.slot_num.to_le_bytes());
            }
        }
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    fn deserialize(path: &Path, data: &[u8]) -> IndexResult<Self> {
        if data.len() < MAGIC.len() + CHECKSUM_LEN {
            return Err(IndexError::corruption(format!(
                "index file {} is truncated",
                path.display()
            )));
        }
        let (body, tail) = data.split_at(data.len() - CHECKSUM_LEN);
        let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        if crc32fast::hash(body) != stored {
            return Err(IndexError::corruption(format!(
                "checksum mismatch in {}",
                path.display()
            )));
        }

        let mut reader = ByteReader::new(body, path);
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(IndexError::corruption(format!(
                "{} is not an index file",
                path.display()
            )));
        }

        let part_count = reader.u32()? as usize;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            let tag = reader.u8()?;
            let attr_type = AttrType::from_tag(tag).ok_or_else(|| {
                IndexError::corruption(format!("unknown type tag {} in {}", tag, path.display()))
            })?;
            let len = reader.u32()? as usize;
            parts.push(KeyPart { attr_type, len });
        }
        let layout = Arc::new(KeyLayout::new(parts));
        let key_len = layout.key_len();

        let entry_count = reader.u64()?;
        let mut entries: BTreeMap<TreeKey, BTreeSet<Rid>> = BTreeMap::new();
        for _ in 0..entry_count {
            let key = reader.take(key_len)?.to_vec();
            let rid = Rid::new(reader.u32()?, reader.u32()?);
            entries
                .entry(TreeKey::new(key, layout.clone()))
                .or_default()
                .insert(rid);
        }
        if !reader.is_at_end() {
            return Err(IndexError::corruption(format!(
                "trailing bytes in {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            layout,
            entries,
            dirty: false,
            closed: false,
        })
    }

    fn write_file(&self) -> IndexResult<()> {
        let bytes = self.serialize();
        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)
            .map_err(|e| IndexError::io(format!("cannot create {}", tmp.display()), e))?;
        file.write_all(&bytes)
            .map_err(|e| IndexError::io(format!("cannot write {}", tmp.display()), e))?;
        file.sync_all()
            .map_err(|e| IndexError::io(format!("fsync failed for {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| IndexError::io(format!("cannot replace {}", self.path.display()), e))
    }
}

impl OrderedTree for FileTree {
    fn create(path: &Path, layout: KeyLayout) -> IndexResult<Self> {
        if layout.parts().is_empty() || layout.key_len() == 0 {
            return Err(IndexError::invalid_key("index key has no fields"));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    IndexError::io(format!("cannot create {}", parent.display()), e)
                })?;
            }
        }
        let tree = Self {
            path: path.to_path_buf(),
            layout: Arc::new(layout),
            entries: BTreeMap::new(),
            dirty: false,
            closed: false,
        };
        tree.write_file()?;
        Ok(tree)
    }

    fn open(path: &Path) -> IndexResult<Self> {
        let data = fs::read(path)
            .map_err(|e| IndexError::io(format!("cannot read {}", path.display()), e))?;
        Self::deserialize(path, &data)
    }

    fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    fn insert(&mut self, key: &[u8], rid: Rid) -> IndexResult<()> {
        self.ensure_open()?;
        self.check_key(key)?;
        let key = self.tree_key(key);
        if self.entries.entry(key).or_default().insert(rid) {
            self.dirty = true;
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8], rid: Rid) -> IndexResult<bool> {
        self.ensure_open()?;
        self.check_key(key)?;
        let key = self.tree_key(key);
        let Some(rids) = self.entries.get_mut(&key) else {
            return Ok(false);
        };
        let removed = rids.remove(&rid);
        if rids.is_empty() {
            self.entries.remove(&key);
        }
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn scan(&self, op: CompOp, key: &[u8]) -> IndexResult<TreeCursor> {
        if self.closed {
            return Err(IndexError::scan_open_failed("index is closed"));
        }
        if key.len() != self.layout.key_len() {
            return Err(IndexError::scan_open_failed(format!(
                "scan key is {} bytes, index expects {}",
                key.len(),
                self.layout.key_len()
            )));
        }
        let probe = self.tree_key(key);
        let bounds: (Bound<&TreeKey>, Bound<&TreeKey>) = match op {
            CompOp::Eq => (Bound::Included(&probe), Bound::Included(&probe)),
            CompOp::Ge => (Bound::Included(&probe), Bound::Unbounded),
            CompOp::Gt => (Bound::Excluded(&probe), Bound::Unbounded),
            CompOp::Le => (Bound::Unbounded, Bound::Included(&probe)),
            CompOp::Lt => (Bound::Unbounded, Bound::Excluded(&probe)),
            CompOp::Ne => {
                return Err(IndexError::scan_open_failed(
                    "index scans do not support <>",
                ))
            }
        };
        let rids = self
            .entries
            .range::<TreeKey, _>(bounds)
            .flat_map(|(_, rids)| rids.iter().copied())
            .collect();
        Ok(TreeCursor::new(rids))
    }

    fn sync(&mut self) -> IndexResult<()> {
        self.ensure_open()?;
        if self.dirty {
            self.write_file()?;
            self.dirty = false;
        }
        Ok(())
    }

    fn close(&mut self) -> IndexResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.sync();
        self.closed = true;
        self.entries.clear();
        result
    }
}

/// Bounds-checked little-endian reader over an index file body
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], path: &'a Path) -> Self {
        Self { data, pos: 0, path }
    }

    fn take(&mut self, n: usize) -> IndexResult<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.data.get(self.pos..end).ok_or_else(|| {
            IndexError::corruption(format!("index file {} is truncated", self.path.display()))
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> IndexResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> IndexResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> IndexResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }
}
