//! Catalog handler: databases and their tables
//!
//! Each database maps to a directory under the handler's base directory that
//! holds the database's index files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::meta::is_identifier;
use super::record::Rid;
use super::table::Table;
use crate::observability::{Event, Logger};
use crate::planner::AttrDef;
use crate::types::Value;

struct Database {
    dir: PathBuf,
    tables: BTreeMap<String, Table>,
}

pub struct Handler {
    base_dir: PathBuf,
    databases: BTreeMap<String, Database>,
}

impl Handler {
    /// Opens a handler rooted at `base_dir`, creating the directory if missing
    pub fn open(base_dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|e| StorageError::io(format!("cannot create {}", base_dir.display()), e))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            databases: BTreeMap::new(),
        })
    }

    /// Creates the database directory if this handler does not know `db` yet
    pub fn ensure_database(&mut self, db: &str) -> StorageResult<()> {
        if self.databases.contains_key(db) {
            return Ok(());
        }
        if !is_identifier(db) {
            return Err(StorageError::invalid_schema(format!(
                "invalid database name '{}'",
                db
            )));
        }
        let dir = self.base_dir.join(db);
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io(format!("cannot create {}", dir.display()), e))?;
        self.databases.insert(
            db.to_string(),
            Database {
                dir,
                tables: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.databases.contains_key(db)
    }

    fn database(&self, db: &str) -> StorageResult<&Database> {
        self.databases
            .get(db)
            .ok_or_else(|| StorageError::database_not_found(db))
    }

    fn database_mut(&mut self, db: &str) -> StorageResult<&mut Database> {
        self.databases
            .get_mut(db)
            .ok_or_else(|| StorageError::database_not_found(db))
    }

    pub fn find_table(&self, db: &str, name: &str) -> Option<&Table> {
        self.databases.get(db)?.tables.get(name)
    }

    fn table_mut(&mut self, db: &str, name: &str) -> StorageResult<&mut Table> {
        self.database_mut(db)?
            .tables
            .get_mut(name)
            .ok_or_else(|| StorageError::table_not_found(name))
    }

    pub fn create_table(&mut self, db: &str, name: &str, attributes: &[AttrDef]) -> StorageResult<()> {
        let database = self.database_mut(db)?;
        if database.tables.contains_key(name) {
            return Err(StorageError::table_exists(name));
        }
        let table = Table::create(&database.dir, name, attributes)?;
        database.tables.insert(name.to_string(), table);
        let field_count = attributes.len().to_string();
        Logger::info(
            Event::TableCreated,
            &[("db", db), ("fields", field_count.as_str()), ("table", name)],
        );
        Ok(())
    }

    pub fn create_index(
        &mut self,
        db: &str,
        table: &str,
        name: &str,
        fields: &[String],
        unique: bool,
    ) -> StorageResult<()> {
        self.table_mut(db, table)?.create_index(name, fields, unique)
    }

    pub fn insert_record(&mut self, db: &str, table: &str, values: &[Value]) -> StorageResult<Rid> {
        self.table_mut(db, table)?.insert_record(values)
    }

    pub fn insert_raw(&mut self, db: &str, table: &str, record: Vec<u8>) -> StorageResult<Rid> {
        self.table_mut(db, table)?.insert_raw(record)
    }

    pub fn delete_record(&mut self, db: &str, table: &str, rid: Rid) -> StorageResult<Vec<u8>> {
        self.table_mut(db, table)?.delete_record(rid)
    }

    /// Table names of `db` in name order
    pub fn table_names(&self, db: &str) -> StorageResult<Vec<&str>> {
        Ok(self.database(db)?.tables.keys().map(String::as_str).collect())
    }

    /// Flushes every index of every database
    pub fn sync(&mut self) -> StorageResult<()> {
        for database in self.databases.values_mut() {
            for table in database.tables.values_mut() {
                table.sync()?;
            }
        }
        Ok(())
    }

    /// Flushes every index of `db`
    pub fn sync_database(&mut self, db: &str) -> StorageResult<()> {
        for table in self.database_mut(db)?.tables.values_mut() {
            table.sync()?;
        }
        Ok(())
    }
}
