use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{Result, ScanError};
use crate::table::Table;

/// Persistent home of a result table.
///
/// There is no locking: a store assumes it is the only writer for its
/// table, so two runs against the same table must not overlap.
pub trait ResultStore {
    /// The stored table, or an empty one if nothing has been saved yet.
    fn load(&self) -> Result<Table>;
    fn save(&mut self, table: &Table) -> Result<()>;
}

/// A table kept in a CSV file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A temp file beside the table carrying the table's current permissions,
    /// or, for a new table, whatever a plain create would get under the umask.
    fn temp_file(&self, dir: &Path) -> Result<NamedTempFile> {
        let existing = std::fs::metadata(&self.path).ok().map(|m| m.permissions());
        let mut builder = tempfile::Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if existing.is_none() {
                builder.permissions(std::fs::Permissions::from_mode(0o666));
            }
        }
        let tmp = builder.tempfile_in(dir).map_err(|e| ScanError::io(dir, e))?;
        if let Some(perms) = existing {
            std::fs::set_permissions(tmp.path(), perms).map_err(|e| ScanError::io(tmp.path(), e))?;
        }
        Ok(tmp)
    }

    fn table_error(&self, source: csv::Error) -> ScanError {
        ScanError::Table {
            path: self.path.clone(),
            source,
        }
    }
}

impl ResultStore for CsvStore {
    fn load(&self) -> Result<Table> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No existing table at {}", self.path.display());
                return Ok(Table::new());
            }
            Err(e) => return Err(ScanError::io(&self.path, e)),
        };
        let table = Table::read_csv(BufReader::new(file)).map_err(|e| self.table_error(e))?;
        info!("Loaded {} existing rows from {}", table.len(), self.path.display());
        Ok(table)
    }

    fn save(&mut self, table: &Table) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = self.temp_file(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            table.write_csv(&mut writer).map_err(|e| self.table_error(e))?;
            writer.flush().map_err(|e| ScanError::io(tmp.path(), e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| ScanError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| ScanError::io(&self.path, e.error))?;
        info!("Wrote {} rows to {}", table.len(), self.path.display());
        Ok(())
    }
}

/// A store that keeps the table in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Table,
}

impl MemoryStore {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

impl ResultStore for MemoryStore {
    fn load(&self) -> Result<Table> {
        Ok(self.table.clone())
    }

    fn save(&mut self, table: &Table) -> Result<()> {
        self.table = table.clone();
        Ok(())
    }
}
