//! Table: record heap plus the indexes over it
//!
//! Records live in fixed-capacity pages of slots. A freed slot is never reused,
//! so a `Rid` names at most one record over the table's lifetime. Every insert
//! and delete maintains all of the table's indexes.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::meta::{is_identifier, IndexMeta, TableMeta};
use super::record::Rid;
use crate::index::BplusTreeIndex;
use crate::observability::{Event, Logger};
use crate::planner::AttrDef;
use crate::types::Value;

/// Slots per page
pub const PAGE_SLOTS: usize = 64;

pub struct Table {
    meta: TableMeta,
    pages: Vec<Vec<Option<Vec<u8>>>>,
    indexes: Vec<BplusTreeIndex>,
    index_dir: PathBuf,
}

impl Table {
    /// Creates an empty table; index files go under `index_dir`
    pub fn create(index_dir: &Path, name: &str, attributes: &[AttrDef]) -> StorageResult<Self> {
        Ok(Self {
            meta: TableMeta::new(name, attributes)?,
            pages: Vec::new(),
            indexes: Vec::new(),
            index_dir: index_dir.to_path_buf(),
        })
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        self.meta.name()
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| p.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    pub fn record(&self, rid: Rid) -> Option<&[u8]> {
        self.pages
            .get(rid.page_num as usize)?
            .get(rid.slot_num as usize)?
            .as_deref()
    }

    /// Live records in rid order
    pub fn scan(&self) -> impl Iterator<Item = (Rid, &[u8])> + '_ {
        self.pages.iter().enumerate().flat_map(|(page, slots)| {
            slots.iter().enumerate().filter_map(move |(slot, record)| {
                record
                    .as_deref()
                    .map(|r| (Rid::new(page as u32, slot as u32), r))
            })
        })
    }

    /// Encodes `values` and inserts the record
    pub fn insert_record(&mut self, values: &[Value]) -> StorageResult<Rid> {
        let record = self.meta.encode_record(values)?;
        self.insert_raw(record)
    }

    /// Inserts an already encoded record.
    ///
    /// If any index rejects the entry, entries already added to earlier
    /// indexes are removed and the record is not stored.
    pub fn insert_raw(&mut self, record: Vec<u8>) -> StorageResult<Rid> {
        if record.len() != self.meta.record_size() {
            return Err(StorageError::invalid_record(format!(
                "record is {} bytes, table '{}' expects {}",
                record.len(),
                self.name(),
                self.meta.record_size()
            )));
        }

        let rid = self.next_rid();
        for i in 0..self.indexes.len() {
            if let Err(e) = self.indexes[i].insert_entry(&record, rid) {
                unwind_entries(&mut self.indexes[..i], &record, rid, self.meta.name());
                return Err(e.into());
            }
        }

        match self.pages.last_mut() {
            Some(page) if page.len() < PAGE_SLOTS => page.push(Some(record)),
            _ => {
                let mut page = Vec::with_capacity(PAGE_SLOTS);
                page.push(Some(record));
                self.pages.push(page);
            }
        }
        Ok(rid)
    }

    fn next_rid(&self) -> Rid {
        match self.pages.last() {
            Some(page) if page.len() < PAGE_SLOTS => {
                Rid::new((self.pages.len() - 1) as u32, page.len() as u32)
            }
            _ => Rid::new(self.pages.len() as u32, 0),
        }
    }

    /// Removes the record at `rid` and its index entries; returns the record image
    pub fn delete_record(&mut self, rid: Rid) -> StorageResult<Vec<u8>> {
        let record = self
            .record(rid)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| StorageError::record_not_found(rid))?;
        for index in self.indexes.iter_mut() {
            index.delete_entry(&record, rid)?;
        }
        if let Some(slot) = self
            .pages
            .get_mut(rid.page_num as usize)
            .and_then(|p| p.get_mut(rid.slot_num as usize))
        {
            *slot = None;
        }
        Ok(record)
    }

    /// Creates an index over `fields` and fills it from the current records
    pub fn create_index(&mut self, name: &str, fields: &[String], unique: bool) -> StorageResult<()> {
        if !is_identifier(name) {
            return Err(StorageError::invalid_schema(format!(
                "invalid index name '{}'",
                name
            )));
        }
        if self.meta.index(name).is_some() {
            return Err(StorageError::index_exists(name));
        }
        if fields.is_empty() {
            return Err(StorageError::invalid_schema(format!(
                "index '{}' has no fields",
                name
            )));
        }
        let field_metas = self.meta.resolve_fields(fields)?;
        let meta = IndexMeta {
            name: name.to_string(),
            fields: fields.to_vec(),
            unique,
        };

        let path = self.index_path(name);
        let mut index = BplusTreeIndex::new();
        index.create(&path, meta.clone(), field_metas)?;
        let populated = self
            .scan()
            .try_for_each(|(rid, record)| index.insert_entry(record, rid));
        if let Err(e) = populated {
            let _ = index.close();
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        index.sync()?;

        self.meta.add_index(meta);
        self.indexes.push(index);
        Ok(())
    }

    fn index_path(&self, index_name: &str) -> PathBuf {
        self.index_dir
            .join(format!("{}-{}.index", self.name(), index_name))
    }

    pub fn indexes(&self) -> &[BplusTreeIndex] {
        &self.indexes
    }

    /// An index whose key is exactly `field`
    pub fn find_index_on(&self, field: &str) -> Option<&BplusTreeIndex> {
        self.indexes.iter().find(|i| {
            i.meta()
                .is_some_and(|m| m.fields.len() == 1 && m.fields[0] == field)
        })
    }

    /// Flushes every index
    pub fn sync(&mut self) -> StorageResult<()> {
        for index in self.indexes.iter_mut() {
            index.sync()?;
        }
        Ok(())
    }
}

/// Removes the entries a failed insert already added; returns how many removals failed
fn unwind_entries(indexes: &mut [BplusTreeIndex], record: &[u8], rid: Rid, table: &str) -> usize {
    let mut failed = 0;
    for index in indexes.iter_mut() {
        if let Err(e) = index.delete_entry(record, rid) {
            failed += 1;
            let index_name = index.meta().map_or("", |m| m.name.as_str()).to_string();
            let rid = rid.to_string();
            let error = e.to_string();
            Logger::error(
                Event::IndexUnwindFailed,
                &[
                    ("table", table),
                    ("index", index_name.as_str()),
                    ("rid", rid.as_str()),
                    ("error", error.as_str()),
                ],
            );
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::CompOp;
    use crate::storage::errors::StorageErrorCode;
    use crate::types::AttrType;
    use tempfile::TempDir;

    fn table(dir: &TempDir) -> Table {
        Table::create(
            dir.path(),
            "t",
            &[AttrDef::new("id", AttrType::Int), AttrDef::chars("name", 4)],
        )
        .unwrap()
    }

    fn row(id: i32, name: &str) -> Vec<Value> {
        vec![Value::Int(id), Value::from(name)]
    }

    #[test]
    fn test_insert_scan_delete() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        let r1 = t.insert_record(&row(1, "a")).unwrap();
        let r2 = t.insert_record(&row(2, "b")).unwrap();
        assert_eq!(r1, Rid::new(0, 0));
        assert_eq!(r2, Rid::new(0, 1));
        assert_eq!(t.scan().count(), 2);

        let image = t.delete_record(r1).unwrap();
        assert_eq!(t.meta().decode_record(&image).unwrap(), row(1, "a"));
        assert_eq!(t.record_count(), 1);
        assert!(t.record(r1).is_none());
        assert_eq!(
            t.delete_record(r1).unwrap_err().code(),
            StorageErrorCode::RecordNotFound
        );

        // Slots are not reused
        let r3 = t.insert_record(&row(3, "c")).unwrap();
        assert_eq!(r3, Rid::new(0, 2));
    }

    #[test]
    fn test_pages_roll_over() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        let mut last = Rid::new(0, 0);
        for i in 0..=(PAGE_SLOTS as i32) {
            last = t.insert_record(&row(i, "x")).unwrap();
        }
        assert_eq!(last, Rid::new(1, 0));
        assert_eq!(t.scan().count(), PAGE_SLOTS + 1);
    }

    #[test]
    fn test_index_built_from_existing_records() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.insert_record(&row(5, "a")).unwrap();
        t.insert_record(&row(9, "b")).unwrap();
        t.create_index("idx_id", &["id".to_string()], false).unwrap();
        assert!(dir.path().join("t-idx_id.index").exists());

        let index = t.find_index_on("id").unwrap();
        let rids: Vec<Rid> = index
            .create_scanner(CompOp::Gt, &5i32.to_le_bytes())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rids, vec![Rid::new(0, 1)]);
        assert!(t.find_index_on("name").is_none());
    }

    #[test]
    fn test_unique_index_rejects_duplicate_and_leaves_no_record() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.create_index("u_name", &["name".to_string()], true).unwrap();
        t.create_index("u_id", &["id".to_string()], true).unwrap();

        t.insert_record(&row(1, "a")).unwrap();
        // Passes u_name, fails u_id: the u_name entry must be undone
        let err = t.insert_record(&row(1, "b")).unwrap_err();
        assert!(err.is_unique_conflict());
        assert_eq!(t.record_count(), 1);

        t.insert_record(&row(2, "b")).unwrap();
        assert_eq!(t.record_count(), 2);
    }

    #[test]
    fn test_failed_unwind_is_counted() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.create_index("i_id", &["id".to_string()], false).unwrap();
        t.create_index("i_name", &["name".to_string()], false).unwrap();
        let record = t.meta().encode_record(&row(1, "a")).unwrap();
        let rid = Rid::new(0, 0);
        t.indexes[0].insert_entry(&record, rid).unwrap();
        t.indexes[1].close().unwrap();

        // The open index is cleaned up; the closed one reports a failure
        assert_eq!(unwind_entries(&mut t.indexes, &record, rid, "t"), 1);
        let left = t.indexes[0]
            .create_scanner(CompOp::Eq, &1i32.to_le_bytes())
            .unwrap()
            .count();
        assert_eq!(left, 0);
    }

    #[test]
    fn test_unique_index_over_duplicate_data_fails() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.insert_record(&row(1, "a")).unwrap();
        t.insert_record(&row(1, "b")).unwrap();
        let err = t.create_index("u_id", &["id".to_string()], true).unwrap_err();
        assert!(err.is_unique_conflict());
        assert!(t.indexes().is_empty());
        assert!(!dir.path().join("t-u_id.index").exists());
    }

    #[test]
    fn test_create_index_errors() {
        let dir = TempDir::new().unwrap();
        let mut t = table(&dir);
        t.create_index("i", &["id".to_string()], false).unwrap();
        assert_eq!(
            t.create_index("i", &["name".to_string()], false)
                .unwrap_err()
                .code(),
            StorageErrorCode::IndexExists
        );
        assert_eq!(
            t.create_index("j", &["nope".to_string()], false)
                .unwrap_err()
                .code(),
            StorageErrorCode::FieldMissing
        );
    }
}
