//! Table encoding and decoding
//!
//! Three on-store representations are supported:
//! - delimited text (CSV/TSV, optionally gzip-compressed)
//! - columnar binary (Parquet)
//! - serialized binary (Arrow IPC stream with optional gzip/bz2/xz compression)

use std::io::{Cursor, Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// In-memory table: rows by named, typed columns
pub type Table = RecordBatch;

/// Byte-level compression of a stored object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bz2,
    Xz,
}

impl Compression {
    pub fn compress(self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&data)?;
                Ok(encoder.finish()?)
            }
            Compression::Bz2 => {
                let mut encoder =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                encoder.write_all(&data)?;
                Ok(encoder.finish()?)
            }
            Compression::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
                encoder.write_all(&data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Compression::None => out.extend_from_slice(data),
            Compression::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
            }
            Compression::Bz2 => {
                bzip2::read::BzDecoder::new(data).read_to_end(&mut out)?;
            }
            Compression::Xz => {
                xz2::read::XzDecoder::new(data).read_to_end(&mut out)?;
            }
        }
        Ok(out)
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "bz2" | "bzip2" => Ok(Compression::Bz2),
            "xz" => Ok(Compression::Xz),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown compression '{other}'"
            ))),
        }
    }
}

/// Stored representation of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with a header row
    Delimited { delimiter: u8, compression: Compression },
    /// Parquet
    Columnar,
    /// Arrow IPC stream
    Serialized { compression: Compression },
}

impl FileFormat {
    pub const CSV: FileFormat = FileFormat::Delimited {
        delimiter: b',',
        compression: Compression::None,
    };

    pub const TSV: FileFormat = FileFormat::Delimited {
        delimiter: b'\t',
        compression: Compression::None,
    };

    /// Serialized tables default to gzip
    pub const PICKLE: FileFormat = FileFormat::Serialized {
        compression: Compression::Gzip,
    };

    /// Infer the format from a key's extension
    pub fn from_path(key: &str) -> Result<Self> {
        let lower = key.to_ascii_lowercase();
        let (base, gzipped) = match lower.strip_suffix(".gz") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let extension = base.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        let format = match extension {
            "csv" => Self::CSV,
            "tsv" => Self::TSV,
            "parquet" if !gzipped => Self::Columnar,
            "pkl" | "pickle" if !gzipped => Self::PICKLE,
            _ => return Err(Error::UnsupportedFormat(key.to_string())),
        };
        Ok(format.for_key(key))
    }

    /// Resolve a format name as accepted on the command line and in templates
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::CSV),
            "tsv" => Ok(Self::TSV),
            "parquet" => Ok(Self::Columnar),
            "pickle" | "pkl" => Ok(Self::PICKLE),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Delimited text stored under a `.gz` key is gzip-compressed
    pub fn for_key(self, key: &str) -> Self {
        match self {
            FileFormat::Delimited { delimiter, .. } if key.ends_with(".gz") => {
                FileFormat::Delimited {
                    delimiter,
                    compression: Compression::Gzip,
                }
            }
            other => other,
        }
    }

    /// Canonical file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            FileFormat::Delimited {
                delimiter: b'\t', ..
            } => "tsv",
            FileFormat::Delimited { .. } => "csv",
            FileFormat::Columnar => "parquet",
            FileFormat::Serialized { .. } => "pickle",
        }
    }
}

/// Table codec boundary
pub trait TabularCodec: Send + Sync {
    fn decode(&self, data: &[u8], format: FileFormat) -> Result<Table>;

    fn encode(&self, table: &Table, format: FileFormat) -> Result<Vec<u8>>;
}

/// Arrow-backed codec
#[derive(Debug, Clone)]
pub struct ArrowCodec {
    batch_size: usize,
}

impl Default for ArrowCodec {
    fn default() -> Self {
        Self { batch_size: 8192 }
    }
}

impl ArrowCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Delimited text split into tables of at most `batch_size` rows
    ///
    /// The schema is inferred once over the whole input, so every chunk
    /// carries the header's columns and types. Header-only input yields one
    /// empty chunk.
    pub fn decode_delimited_chunks(&self, data: &[u8], delimiter: u8) -> Result<Vec<Table>> {
        let (schema, reader) = self.delimited_reader(data, delimiter)?;
        let mut chunks = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        if chunks.is_empty() {
            chunks.push(RecordBatch::new_empty(schema));
        }
        Ok(chunks)
    }

    fn delimited_reader<'a>(
        &self,
        data: &'a [u8],
        delimiter: u8,
    ) -> Result<(SchemaRef, csv::Reader<Cursor<&'a [u8]>>)> {
        let format = csv::reader::Format::default()
            .with_header(true)
            .with_delimiter(delimiter);
        let (schema, _) = format.infer_schema(Cursor::new(data), None)?;
        let schema = Arc::new(schema);
        let reader = csv::ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(self.batch_size)
            .build(Cursor::new(data))?;
        Ok((schema, reader))
    }

    fn decode_delimited(&self, data: &[u8], delimiter: u8) -> Result<Table> {
        let (schema, reader) = self.delimited_reader(data, delimiter)?;
        collect_batches(&schema, reader)
    }

    fn decode_columnar(&self, data: &[u8]) -> Result<Table> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(data))?;
        let schema = builder.schema().clone();
        let reader = builder.with_batch_size(self.batch_size).build()?;
        collect_batches(&schema, reader)
    }

    fn decode_serialized(&self, data: &[u8]) -> Result<Table> {
        let reader = StreamReader::try_new(Cursor::new(data), None)?;
        let schema = reader.schema();
        collect_batches(&schema, reader)
    }
}

fn collect_batches(
    schema: &SchemaRef,
    batches: impl Iterator<Item = std::result::Result<RecordBatch, ArrowError>>,
) -> Result<Table> {
    let batches = batches.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(schema, &batches)?)
}

impl TabularCodec for ArrowCodec {
    fn decode(&self, data: &[u8], format: FileFormat) -> Result<Table> {
        match format {
            FileFormat::Delimited {
                delimiter,
                compression,
            } => self.decode_delimited(&compression.decompress(data)?, delimiter),
            FileFormat::Columnar => self.decode_columnar(data),
            FileFormat::Serialized { compression } => {
                self.decode_serialized(&compression.decompress(data)?)
            }
        }
    }

    fn encode(&self, table: &Table, format: FileFormat) -> Result<Vec<u8>> {
        match format {
            FileFormat::Delimited {
                delimiter,
                compression,
            } => {
                let mut buf = Vec::new();
                {
                    let mut writer = csv::WriterBuilder::new()
                        .with_header(true)
                        .with_delimiter(delimiter)
                        .build(&mut buf);
                    writer.write(table)?;
                }
                compression.compress(buf)
            }
            FileFormat::Columnar => {
                let mut buf = Vec::new();
                let mut writer = ArrowWriter::try_new(&mut buf, table.schema(), None)?;
                writer.write(table)?;
                writer.close()?;
                Ok(buf)
            }
            FileFormat::Serialized { compression } => {
                let mut buf = Vec::new();
                {
                    let schema = table.schema();
                    let mut writer = StreamWriter::try_new(&mut buf, &schema)?;
                    writer.write(table)?;
                    writer.finish()?;
                }
                compression.compress(buf)
            }
        }
    }
}
