//! Single-table read and write helpers
//!
//! [`TableIo`] is implemented by [`ScopedTableIo`], borrowed from a
//! [`FileClient`] through [`FileClient::table_io`].

use async_trait::async_trait;

use crate::client::FileClient;
use crate::codec::{Compression, FileFormat, Table};
use crate::error::Result;

/// Read or write one table per call
///
/// Delimited paths ending in `.gz` are gzip-compressed on write and
/// decompressed on read.
#[async_trait]
pub trait TableIo {
    async fn read_csv(&self, path: &str) -> Result<Table>;

    async fn read_tsv(&self, path: &str) -> Result<Table>;

    async fn read_parquet(&self, path: &str) -> Result<Table>;

    async fn read_pickle(&self, path: &str, compression: Compression) -> Result<Table>;

    async fn write_csv(&self, path: &str, table: &Table) -> Result<bool>;

    async fn write_tsv(&self, path: &str, table: &Table) -> Result<bool>;

    async fn write_parquet(&self, path: &str, table: &Table) -> Result<bool>;

    async fn write_pickle(&self, path: &str, table: &Table, compression: Compression)
    -> Result<bool>;
}

/// [`TableIo`] bound to one client
#[derive(Clone, Copy)]
pub struct ScopedTableIo<'a> {
    client: &'a FileClient,
}

impl<'a> ScopedTableIo<'a> {
    pub(crate) fn new(client: &'a FileClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TableIo for ScopedTableIo<'_> {
    async fn read_csv(&self, path: &str) -> Result<Table> {
        self.client.read_table(path, FileFormat::CSV).await
    }

    async fn read_tsv(&self, path: &str) -> Result<Table> {
        self.client.read_table(path, FileFormat::TSV).await
    }

    async fn read_parquet(&self, path: &str) -> Result<Table> {
        self.client.read_table(path, FileFormat::Columnar).await
    }

    async fn read_pickle(&self, path: &str, compression: Compression) -> Result<Table> {
        self.client
            .read_table(path, FileFormat::Serialized { compression })
            .await
    }

    async fn write_csv(&self, path: &str, table: &Table) -> Result<bool> {
        self.client.write_table(path, table, FileFormat::CSV).await
    }

    async fn write_tsv(&self, path: &str, table: &Table) -> Result<bool> {
        self.client.write_table(path, table, FileFormat::TSV).await
    }

    async fn write_parquet(&self, path: &str, table: &Table) -> Result<bool> {
        self.client
            .write_table(path, table, FileFormat::Columnar)
            .await
    }

    async fn write_pickle(
        &self,
        path: &str,
        table: &Table,
        compression: Compression,
    ) -> Result<bool> {
        self.client
            .write_table(path, table, FileFormat::Serialized { compression })
            .await
    }
}
