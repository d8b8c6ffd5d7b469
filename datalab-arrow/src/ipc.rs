//! Arrow IPC stream files
//!
//! A split persisted at the LOCAL tier is a single Arrow IPC stream: the schema
//! message, one message per record batch, then the 8-byte end-of-stream marker
//! `FF FF FF FF 00 00 00 00`. Files are read through a memory map and rewritten
//! through [`crate::io::write_atomic`].

use std::io::{self, Cursor};
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use tracing::{debug, instrument};

use datalab_core::{Error, Result};

use crate::io::{stage_file, MemoryMappedFile, StagedFile};

/// Continuation marker followed by a zero body length
pub const END_OF_STREAM: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00];

/// A table read back from a stream file
#[derive(Debug, Clone)]
pub struct ArrowTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ArrowTable {
    /// Build a table from a schema and batches sharing it
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// A single-batch table
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Table schema
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Record batches in stream order
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// All batches concatenated into one
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

/// Byte accounting of one encoded stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// Size of the schema message
    pub header_bytes: usize,

    /// Size of each record batch message
    pub batch_bytes: Vec<usize>,

    /// File size including the end-of-stream marker
    pub total_bytes: usize,
}

/// An encoded stream split at message boundaries
struct EncodedStream {
    bytes: Vec<u8>,
    stats: WriteStats,
}

impl EncodedStream {
    fn parts(&self) -> Vec<&[u8]> {
        let mut parts = Vec::with_capacity(self.stats.batch_bytes.len() + 2);
        let mut offset = self.stats.header_bytes;
        parts.push(&self.bytes[..offset]);
        for len in &self.stats.batch_bytes {
            parts.push(&self.bytes[offset..offset + len]);
            offset += len;
        }
        parts.push(&self.bytes[offset..]);
        parts
    }
}

fn encode(schema: &Schema, batches: &[RecordBatch]) -> Result<EncodedStream> {
    let mut writer = StreamWriter::try_new(Vec::new(), schema)?;
    let header_bytes = writer.get_ref().len();

    let mut batch_bytes = Vec::with_capacity(batches.len());
    let mut offset = header_bytes;
    for batch in batches {
        writer.write(batch)?;
        let end = writer.get_ref().len();
        batch_bytes.push(end - offset);
        offset = end;
    }

    writer.finish()?;
    let bytes = writer.into_inner()?;

    check_framing(&bytes, offset)?;

    let total_bytes = bytes.len();
    Ok(EncodedStream {
        bytes,
        stats: WriteStats {
            header_bytes,
            batch_bytes,
            total_bytes,
        },
    })
}

/// `bytes` must be `messages_end` bytes of messages followed by the marker
fn check_framing(bytes: &[u8], messages_end: usize) -> Result<()> {
    if bytes.len() != messages_end + END_OF_STREAM.len() || !bytes.ends_with(&END_OF_STREAM) {
        return Err(Error::Arrow(ArrowError::IpcError(
            "stream writer did not terminate with the end-of-stream marker".into(),
        )));
    }
    Ok(())
}

/// Read a whole stream file
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_table(path: &Path) -> Result<ArrowTable> {
    let map = MemoryMappedFile::open(path)?;
    let reader = StreamReader::try_new(Cursor::new(map.as_slice()), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;

    debug!(rows = batches.iter().map(RecordBatch::num_rows).sum::<usize>(), "read table");
    Ok(ArrowTable::new(schema, batches))
}

/// A table file encoded next to its target, not yet visible to readers
#[derive(Debug)]
pub struct StagedTable {
    file: StagedFile,
    stats: WriteStats,
}

impl StagedTable {
    /// Byte accounting of the staged stream
    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    /// Move the table into place
    pub fn commit(self) -> Result<WriteStats> {
        let path = self.file.target().to_path_buf();
        let written = self.file.commit()?;
        if written != self.stats.total_bytes as u64 {
            return Err(Error::persistence(
                path,
                io::Error::new(io::ErrorKind::WriteZero, "short table write"),
            ));
        }

        debug!(path = %path.display(), bytes = written, "wrote table");
        Ok(self.stats)
    }
}

/// Encode `schema` and `batches` into a sibling of `path`.
///
/// The staged file is sized to exactly the schema message, every batch
/// message and the end-of-stream marker, then filled in that order. Batches
/// must carry the same fields as `schema`.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), batches = batches.len()))]
pub fn stage_table(path: &Path, schema: &Schema, batches: &[RecordBatch]) -> Result<StagedTable> {
    for batch in batches {
        if batch.schema().fields() != schema.fields() {
            return Err(Error::SchemaMismatch(format!(
                "batch fields {:?} do not match table fields {:?}",
                field_names(&batch.schema()),
                field_names(schema),
            )));
        }
    }

    let encoded = encode(schema, batches)?;
    let file = stage_file(path, &encoded.parts())?;
    Ok(StagedTable {
        file,
        stats: encoded.stats,
    })
}

/// Rewrite `path` with `schema` and `batches`, replacing it atomically
pub fn write_table(path: &Path, schema: &Schema, batches: &[RecordBatch]) -> Result<WriteStats> {
    stage_table(path, schema, batches)?.commit()
}

/// Rewrite `path` from a table
pub fn write_arrow_table(path: &Path, table: &ArrowTable) -> Result<WriteStats> {
    write_table(path, &table.schema, &table.batches)
}

fn field_names(schema: &Schema) -> Vec<&str> {
    schema.fields().iter().map(|field| field.name().as_str()).collect()
}
