//! Tab-separated event row reader.

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::Result;
use crate::models::{ColumnSchema, InputRecord};

/// What the reader made of one line.
#[derive(Debug)]
pub enum RowResult {
    Parsed(InputRecord),
    /// The line could not be mapped onto the schema
    Dropped,
}

/// Lazily reads [`InputRecord`]s from headerless tab-separated input.
pub struct EventReader<R: Read> {
    inner: csv::Reader<R>,
    schema: ColumnSchema,
    record: StringRecord,
}

impl EventReader<std::fs::File> {
    /// Open a file for reading.
    pub fn open(path: &Path, schema: ColumnSchema) -> Result<Self> {
        Ok(Self::new(std::fs::File::open(path)?, schema))
    }
}

impl<R: Read> EventReader<R> {
    pub fn new(reader: R, schema: ColumnSchema) -> Self {
        let inner = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        Self {
            inner,
            schema,
            record: StringRecord::new(),
        }
    }

    /// Read the next line.
    ///
    /// Malformed lines come back as [`RowResult::Dropped`]; only I/O failures
    /// are errors.
    pub fn next_row(&mut self) -> Result<Option<RowResult>> {
        match self.inner.read_record(&mut self.record) {
            Ok(false) => Ok(None),
            Ok(true) => Ok(Some(
                map_record(&self.record, &self.schema).map_or(RowResult::Dropped, RowResult::Parsed),
            )),
            Err(e) if e.is_io_error() => Err(e.into()),
            Err(e) => {
                log::debug!("Dropping unreadable row: {}", e);
                Ok(Some(RowResult::Dropped))
            }
        }
    }
}

/// Map a raw record onto the schema, `None` if any required column is missing.
pub fn map_record(record: &StringRecord, schema: &ColumnSchema) -> Option<InputRecord> {
    if record.len() <= schema.max_index() {
        return None;
    }
    let field = |index: usize| record.get(index).map(|s| s.trim().to_string());

    Some(InputRecord {
        year: field(schema.year)?,
        actor1_country: field(schema.actor1_country)?,
        actor2_country: field(schema.actor2_country)?,
        actor1_geo_country: field(schema.actor1_geo_country)?,
        actor2_geo_country: field(schema.actor2_geo_country)?,
        scale: field(schema.scale)?,
        date_added: field(schema.date_added)?,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::ColumnSchema;

    /// Build one tab-separated event line in the default column layout.
    pub fn event_line(
        year: &str,
        actor1: &str,
        actor2: &str,
        geo1: &str,
        geo2: &str,
        scale: &str,
    ) -> String {
        let schema = ColumnSchema::default();
        let mut fields = vec![String::new(); schema.max_index() + 2];
        fields[0] = "1".to_string();
        fields[schema.year] = year.to_string();
        fields[schema.actor1_country] = actor1.to_string();
        fields[schema.actor2_country] = actor2.to_string();
        fields[schema.actor1_geo_country] = geo1.to_string();
        fields[schema.actor2_geo_country] = geo2.to_string();
        fields[schema.scale] = scale.to_string();
        fields[schema.date_added] = "20130401".to_string();
        fields.join("\t")
    }
}
