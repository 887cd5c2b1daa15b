//! In-memory result table and its CSV form.
//!
//! On disk the first column is the row index with an empty header, numbered
//! from 0 on every write. Cells read back from disk stay verbatim text so a
//! rewrite reproduces old rows exactly.

use std::io::{Read, Write};

use crate::record::{Record, Scalar};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Scalar>>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// One row per record, in order. Columns appear in first-seen order.
    pub fn from_records(records: &[Record]) -> Self {
        let mut table = Self::new();
        for record in records {
            table.push_record(record);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Scalar> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_ref()
    }

    pub fn column(&self, name: &str) -> Option<Vec<Option<&Scalar>>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[col].as_ref()).collect())
    }

    pub fn push_record(&mut self, record: &Record) {
        let mut row = vec![None; self.columns.len()];
        for (key, value) in record.iter() {
            let col = self.ensure_column(key);
            if col >= row.len() {
                row.resize(col + 1, None);
            }
            row[col] = Some(value.clone());
        }
        self.rows.push(row);
        self.pad_rows();
    }

    /// Appends `other`'s rows after ours. Columns are the union: ours first,
    /// then any new ones from `other`; missing cells stay empty.
    pub fn append(&mut self, other: Table) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|c| self.ensure_column(c))
            .collect();
        let width = self.columns.len();
        for row in other.rows {
            let mut out = vec![None; width];
            for (value, &col) in row.into_iter().zip(&mapping) {
                out[col] = value;
            }
            self.rows.push(out);
        }
        self.pad_rows();
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(i) => i,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    fn pad_rows(&mut self) {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, None);
        }
    }

    /// Reads a table written by [`Table::write_csv`], dropping the index column.
    pub fn read_csv<R: Read>(reader: R) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().skip(1).map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = record
                .iter()
                .skip(1)
                .map(|cell| (!cell.is_empty()).then(|| Scalar::Text(cell.to_string())))
                .collect();
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(std::iter::once("").chain(self.columns.iter().map(String::as_str)))?;
        for (index, row) in self.rows.iter().enumerate() {
            let cells = row
                .iter()
                .map(|cell| cell.as_ref().map(|v| v.to_string()).unwrap_or_default());
            writer.write_record(std::iter::once(index.to_string()).chain(cells))?;
        }
        writer.flush()?;
        Ok(())
    }
}
