//! Index handle bound to one table's fields
//!
//! A `BplusTreeIndex` owns the ordered tree for one index, extracts composite
//! keys from raw records and enforces uniqueness.
//!
//! # Uniqueness
//!
//! Unique indexes keep a map from key bytes to the number of live entries
//! inserted through this handle. An insert conflicts when the key already has
//! a live count; deletes decrement it. The key `!null` is never checked.
//!
//! The map lives only as long as the handle. Reopening an index file starts
//! with an empty map, so uniqueness is only guaranteed for entries inserted
//! since the handle was created or opened.

use std::collections::HashMap;
use std::path::Path;

use super::errors::{IndexError, IndexResult};
use super::key::KeyLayout;
use super::scanner::IndexScanner;
use super::tree::{FileTree, OrderedTree};
use crate::observability::{Event, Logger};
use crate::planner::CompOp;
use crate::storage::{FieldMeta, IndexMeta, Rid};

/// Key bytes exempt from uniqueness checks
pub const NULL_KEY: &[u8] = b"!null";

pub struct BplusTreeIndex<T: OrderedTree = FileTree> {
    meta: Option<IndexMeta>,
    fields: Vec<FieldMeta>,
    tree: Option<T>,
    unique_keys: HashMap<Vec<u8>, usize>,
}

impl<T: OrderedTree> Default for BplusTreeIndex<T> {
    fn default() -> Self {
        Self {
            meta: None,
            fields: Vec::new(),
            tree: None,
            unique_keys: HashMap::new(),
        }
    }
}

impl<T: OrderedTree> BplusTreeIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the index file and attaches this handle to it
    pub fn create(&mut self, path: &Path, meta: IndexMeta, fields: Vec<FieldMeta>) -> IndexResult<()> {
        if self.tree.is_some() {
            return Err(IndexError::already_initialized(&meta.name));
        }
        let tree = T::create(path, KeyLayout::from_fields(&fields))?;
        let key_len = tree.layout().key_len().to_string();
        let path_str = path.display().to_string();
        Logger::info(
            Event::IndexCreated,
            &[
                ("index", meta.name.as_str()),
                ("key_len", key_len.as_str()),
                ("path", path_str.as_str()),
                ("unique", if meta.unique { "true" } else { "false" }),
            ],
        );
        self.attach(meta, fields, tree);
        Ok(())
    }

    /// Opens an existing index file; its key layout must match `fields`
    pub fn open(&mut self, path: &Path, meta: IndexMeta, fields: Vec<FieldMeta>) -> IndexResult<()> {
        if self.tree.is_some() {
            return Err(IndexError::already_initialized(&meta.name));
        }
        let tree = T::open(path)?;
        if tree.layout() != &KeyLayout::from_fields(&fields) {
            return Err(IndexError::corruption(format!(
                "key layout of {} does not match index '{}'",
                path.display(),
                meta.name
            )));
        }
        let path_str = path.display().to_string();
        Logger::info(
            Event::IndexOpened,
            &[("index", meta.name.as_str()), ("path", path_str.as_str())],
        );
        self.attach(meta, fields, tree);
        Ok(())
    }

    fn attach(&mut self, meta: IndexMeta, fields: Vec<FieldMeta>, tree: T) {
        self.meta = Some(meta);
        self.fields = fields;
        self.tree = Some(tree);
        self.unique_keys.clear();
    }

    /// Flushes and detaches. Closing a closed handle is a no-op.
    pub fn close(&mut self) -> IndexResult<()> {
        let Some(mut tree) = self.tree.take() else {
            return Ok(());
        };
        self.unique_keys.clear();
        let result = tree.close();
        if let Some(meta) = &self.meta {
            Logger::info(Event::IndexClosed, &[("index", meta.name.as_str())]);
        }
        result
    }

    pub fn is_open(&self) -> bool {
        self.tree.is_some()
    }

    pub fn meta(&self) -> Option<&IndexMeta> {
        self.meta.as_ref()
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    fn name(&self) -> &str {
        self.meta.as_ref().map_or("", |m| m.name.as_str())
    }

    fn is_unique(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.unique)
    }

    /// Concatenates the index fields' bytes from `record` in key order
    pub fn key_of(&self, record: &[u8]) -> IndexResult<Vec<u8>> {
        let mut key = Vec::with_capacity(self.fields.iter().map(|f| f.len).sum());
        for field in &self.fields {
            let bytes = field.slice(record).ok_or_else(|| {
                IndexError::invalid_key(format!(
                    "record of {} bytes has no field '{}'",
                    record.len(),
                    field.name
                ))
            })?;
            key.extend_from_slice(bytes);
        }
        Ok(key)
    }

    /// Adds the entry for `record` stored at `rid`
    ///
    /// On a unique conflict nothing is written.
    pub fn insert_entry(&mut self, record: &[u8], rid: Rid) -> IndexResult<()> {
        let key = self.key_of(record)?;
        let tracked = self.is_unique() && key.as_slice() != NULL_KEY;
        if tracked && self.unique_keys.get(&key).is_some_and(|count| *count > 0) {
            let rid = rid.to_string();
            Logger::warn(
                Event::UniqueConflict,
                &[("index", self.name()), ("rid", rid.as_str())],
            );
            return Err(IndexError::unique_conflict(self.name()));
        }

        let tree = self.tree.as_mut().ok_or_else(IndexError::not_initialized)?;
        tree.insert(&key, rid)?;
        if tracked {
            *self.unique_keys.entry(key).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Removes the entry for `record` stored at `rid`
    pub fn delete_entry(&mut self, record: &[u8], rid: Rid) -> IndexResult<()> {
        let key = self.key_of(record)?;
        if let Some(count) = self.unique_keys.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.unique_keys.remove(&key);
            }
        }

        let tree = self.tree.as_mut().ok_or_else(IndexError::not_initialized)?;
        if !tree.delete(&key, rid)? {
            let rid = rid.to_string();
            Logger::warn(
                Event::IndexEntryMissing,
                &[("index", self.name()), ("rid", rid.as_str())],
            );
        }
        Ok(())
    }

    /// Opens a scanner over entries whose key satisfies `key op value`
    pub fn create_scanner(&self, op: CompOp, value: &[u8]) -> IndexResult<IndexScanner> {
        let result = match self.tree.as_ref() {
            Some(tree) => tree.scan(op, value),
            None => Err(IndexError::scan_open_failed("index is not open")),
        };
        match result {
            Ok(cursor) => Ok(IndexScanner::new(cursor)),
            Err(e) => {
                Logger::error(
                    Event::ScanOpenFailed,
                    &[
                        ("index", self.name()),
                        ("op", op.symbol()),
                        ("reason", e.message()),
                    ],
                );
                Err(IndexError::scan_open_failed(e.message().to_string()))
            }
        }
    }

    /// Flushes the tree to disk
    pub fn sync(&mut self) -> IndexResult<()> {
        let tree = self.tree.as_mut().ok_or_else(IndexError::not_initialized)?;
        tree.sync()?;
        Logger::trace(Event::IndexSynced, &[("index", self.name())]);
        Ok(())
    }
}

impl<T: OrderedTree> Drop for BplusTreeIndex<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::errors::IndexErrorCode;
    use crate::index::tree::TreeCursor;
    use crate::types::AttrType;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn int_field(name: &str, offset: usize) -> FieldMeta {
        FieldMeta {
            name: name.to_string(),
            attr_type: AttrType::Int,
            offset,
            len: 4,
        }
    }

    fn record(a: i32, b: i32) -> Vec<u8> {
        [a.to_le_bytes(), b.to_le_bytes()].concat()
    }

    fn unique_meta() -> IndexMeta {
        IndexMeta {
            name: "idx_a".to_string(),
            fields: vec!["a".to_string()],
            unique: true,
        }
    }

    fn collect(mut scanner: IndexScanner) -> Vec<Rid> {
        let mut out = Vec::new();
        while let Some(rid) = scanner.next_entry().unwrap() {
            out.push(rid);
        }
        out
    }

    #[test]
    fn test_unique_conflict_and_reinsert_after_delete() {
        let dir = TempDir::new().unwrap();
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        index
            .create(&dir.path().join("t-idx_a.index"), unique_meta(), vec![int_field("a", 0)])
            .unwrap();

        index.insert_entry(&record(7, 1), Rid::new(0, 0)).unwrap();
        let err = index.insert_entry(&record(7, 2), Rid::new(0, 1)).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::UniqueConflict);

        // The rejected insert left no entry behind
        let rids = collect(index.create_scanner(CompOp::Eq, &7i32.to_le_bytes()).unwrap());
        assert_eq!(rids, vec![Rid::new(0, 0)]);

        index.delete_entry(&record(7, 1), Rid::new(0, 0)).unwrap();
        index.insert_entry(&record(7, 2), Rid::new(0, 1)).unwrap();
        let rids = collect(index.create_scanner(CompOp::Eq, &7i32.to_le_bytes()).unwrap());
        assert_eq!(rids, vec![Rid::new(0, 1)]);
    }

    #[test]
    fn test_non_unique_accepts_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        let meta = IndexMeta {
            unique: false,
            ..unique_meta()
        };
        index
            .create(&dir.path().join("t-idx_a.index"), meta, vec![int_field("a", 0)])
            .unwrap();
        index.insert_entry(&record(1, 0), Rid::new(0, 0)).unwrap();
        index.insert_entry(&record(1, 0), Rid::new(0, 1)).unwrap();
        let rids = collect(index.create_scanner(CompOp::Ge, &1i32.to_le_bytes()).unwrap());
        assert_eq!(rids.len(), 2);
    }

    #[test]
    fn test_composite_key_uses_field_order() {
        let dir = TempDir::new().unwrap();
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        let meta = IndexMeta {
            name: "idx_ba".to_string(),
            fields: vec!["b".to_string(), "a".to_string()],
            unique: true,
        };
        index
            .create(
                &dir.path().join("t-idx_ba.index"),
                meta,
                vec![int_field("b", 4), int_field("a", 0)],
            )
            .unwrap();
        assert_eq!(index.key_of(&record(1, 2)).unwrap(), record(2, 1));

        index.insert_entry(&record(1, 2), Rid::new(0, 0)).unwrap();
        // Same `a`, different `b`: distinct composite key
        index.insert_entry(&record(1, 3), Rid::new(0, 1)).unwrap();
        assert!(index.insert_entry(&record(1, 3), Rid::new(0, 2)).is_err());
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t-idx_a.index");
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        index.create(&path, unique_meta(), vec![int_field("a", 0)]).unwrap();
        let err = index
            .create(&path, unique_meta(), vec![int_field("a", 0)])
            .unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::AlreadyInitialized);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t-idx_a.index");
        {
            let mut index: BplusTreeIndex = BplusTreeIndex::new();
            index.create(&path, unique_meta(), vec![int_field("a", 0)]).unwrap();
            index.insert_entry(&record(3, 0), Rid::new(2, 5)).unwrap();
            index.close().unwrap();
            index.close().unwrap();
        }
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        index.open(&path, unique_meta(), vec![int_field("a", 0)]).unwrap();
        let rids = collect(index.create_scanner(CompOp::Le, &3i32.to_le_bytes()).unwrap());
        assert_eq!(rids, vec![Rid::new(2, 5)]);
    }

    #[test]
    fn test_open_with_mismatched_fields_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t-idx_a.index");
        let mut index: BplusTreeIndex = BplusTreeIndex::new();
        index.create(&path, unique_meta(), vec![int_field("a", 0)]).unwrap();
        index.close().unwrap();

        let mut other: BplusTreeIndex = BplusTreeIndex::new();
        let err = other
            .open(&path, unique_meta(), vec![int_field("a", 0), int_field("b", 4)])
            .unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::Corruption);
    }

    #[test]
    fn test_scanner_on_closed_index_fails() {
        let index: BplusTreeIndex = BplusTreeIndex::new();
        let err = index.create_scanner(CompOp::Eq, &[0; 4]).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::ScanOpenFailed);
    }

    /// Tree that refuses every scan, for the failure path
    struct BrokenTree {
        layout: KeyLayout,
    }

    impl OrderedTree for BrokenTree {
        fn create(_path: &Path, layout: KeyLayout) -> IndexResult<Self> {
            Ok(Self { layout })
        }
        fn open(path: &Path) -> IndexResult<Self> {
            Err(IndexError::corruption(PathBuf::from(path).display().to_string()))
        }
        fn layout(&self) -> &KeyLayout {
            &self.layout
        }
        fn insert(&mut self, _key: &[u8], _rid: Rid) -> IndexResult<()> {
            Ok(())
        }
        fn delete(&mut self, _key: &[u8], _rid: Rid) -> IndexResult<bool> {
            Ok(false)
        }
        fn scan(&self, _op: CompOp, _key: &[u8]) -> IndexResult<TreeCursor> {
            Err(IndexError::invalid_key("broken"))
        }
        fn sync(&mut self) -> IndexResult<()> {
            Ok(())
        }
        fn close(&mut self) -> IndexResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tree_scan_failure_maps_to_scan_open_failed() {
        let mut index: BplusTreeIndex<BrokenTree> = BplusTreeIndex::new();
        index
            .create(Path::new("unused"), unique_meta(), vec![int_field("a", 0)])
            .unwrap();
        let err = index.create_scanner(CompOp::Eq, &[0; 4]).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::ScanOpenFailed);
    }
}
