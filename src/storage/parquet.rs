//! Parquet I/O for topologies and run results
//!
//! # Format
//!
//! - edge list: `(source: UInt64, target: UInt64)`, vertex count in the Arrow
//!   schema metadata under `node_count` (isolated trailing vertices survive a
//!   round trip)
//! - results: `(vertex: UInt64, label, predecessor?)` or `(vertex, rank)`, the
//!   value columns keeping their engine width
//!
//! Files are ZSTD-compressed. I/O runs on tokio's blocking pool.

use crate::dispatch::{IdColumn, LabelColumn, RankColumn, VertexResults};
use crate::storage::GraphTopology;
use crate::types::{SizeT, VertexId};
use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

const NODE_COUNT_KEY: &str = "node_count";

impl<V: VertexId, S: SizeT> GraphTopology<V, S> {
    /// Write the edge list to a Parquet file
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let node_count = self.node_count();
        let (sources, targets): (Vec<u64>, Vec<u64>) = self
            .edges()
            .map(|(src, dst)| (src as u64, dst.as_u64()))
            .unzip();

        tokio::task::spawn_blocking(move || write_edges(&path, node_count, sources, targets))
            .await
            .context("edge-list writer task failed")?
    }

    /// Read an edge list written by [`GraphTopology::write_parquet`]
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed, or if an id does
    /// not fit the requested widths
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (node_count, edges) = tokio::task::spawn_blocking(move || read_edges(&path))
            .await
            .context("edge-list reader task failed")??;

        let edges = edges
            .into_iter()
            .map(|(src, dst)| Ok((narrow::<V>(src)?, narrow::<V>(dst)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_edge_list(node_count, &edges)?)
    }
}

/// Write per-vertex results to a Parquet file
///
/// # Errors
///
/// Returns error if file I/O fails or Arrow conversion fails
pub async fn write_results_parquet<P: AsRef<Path>>(path: P, results: &VertexResults) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    let batch = results_batch(results)?;
    tokio::task::spawn_blocking(move || write_batch(&path, &batch))
        .await
        .context("results writer task failed")?
}

/// Read per-vertex results written by [`write_results_parquet`]
///
/// # Errors
///
/// Returns error if the file is missing or its columns are not a results
/// layout
pub async fn read_results_parquet<P: AsRef<Path>>(path: P) -> Result<VertexResults> {
    let path = path.as_ref().to_path_buf();
    let batches = tokio::task::spawn_blocking(move || read_batches(&path))
        .await
        .context("results reader task failed")??
        .1;
    results_from_batches(&batches)
}

fn narrow<V: VertexId>(id: u64) -> Result<V> {
    usize::try_from(id)
        .ok()
        .and_then(V::from_index)
        .with_context(|| format!("vertex id {id} does not fit a {} id", V::WIDTH))
}

fn writer_properties() -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(parquet::basic::Compression::ZSTD(
            parquet::basic::ZstdLevel::try_new(3)?,
        ))
        .build())
}

fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()?))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn read_batches(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to decode record batches")?;
    Ok((schema, batches))
}

fn write_edges(path: &Path, node_count: usize, sources: Vec<u64>, targets: Vec<u64>) -> Result<()> {
    let metadata = HashMap::from([(NODE_COUNT_KEY.to_string(), node_count.to_string())]);
    let schema = Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("source", DataType::UInt64, false),
            Field::new("target", DataType::UInt64, false),
        ],
        metadata,
    ));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(UInt64Array::from(sources)) as ArrayRef,
            Arc::new(UInt64Array::from(targets)) as ArrayRef,
        ],
    )
    .context("Failed to create edges RecordBatch")?;
    write_batch(path, &batch)
}

fn read_edges(path: &Path) -> Result<(usize, Vec<(u64, u64)>)> {
    let (schema, batches) = read_batches(path)?;
    let node_count = schema
        .metadata()
        .get(NODE_COUNT_KEY)
        .context("edge list has no node_count metadata")?
        .parse()
        .context("Invalid node_count metadata")?;

    let mut edges = Vec::new();
    for batch in &batches {
        let sources = column::<UInt64Array>(batch, "source")?;
        let targets = column::<UInt64Array>(batch, "target")?;
        edges.extend(sources.values().iter().copied().zip(targets.values().iter().copied()));
    }
    Ok((node_count, edges))
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .with_context(|| format!("missing {name} column"))?
        .as_any()
        .downcast_ref::<A>()
        .with_context(|| format!("Invalid {name} column type"))
}

fn results_batch(results: &VertexResults) -> Result<RecordBatch> {
    let mut fields = vec![Field::new("vertex", DataType::UInt64, false)];
    let mut columns: Vec<ArrayRef> = Vec::new();
    let len = match results {
        VertexResults::Labels { labels, .. } => labels.len(),
        VertexResults::Ranks(ranks) => ranks.len(),
    };
    columns.push(Arc::new(UInt64Array::from_iter_values(0..len as u64)));

    match results {
        VertexResults::Labels {
            labels,
            predecessors,
        } => {
            let (field, array): (Field, ArrayRef) = match labels {
                LabelColumn::I32(values) => (
                    Field::new("label", DataType::Int32, false),
                    Arc::new(Int32Array::from(values.clone())),
                ),
                LabelColumn::I64(values) => (
                    Field::new("label", DataType::Int64, false),
                    Arc::new(Int64Array::from(values.clone())),
                ),
            };
            fields.push(field);
            columns.push(array);

            if let Some(predecessors) = predecessors {
                let (field, array): (Field, ArrayRef) = match predecessors {
                    IdColumn::U32(values) => (
                        Field::new("predecessor", DataType::UInt32, false),
                        Arc::new(UInt32Array::from(values.clone())),
                    ),
                    IdColumn::U64(values) => (
                        Field::new("predecessor", DataType::UInt64, false),
                        Arc::new(UInt64Array::from(values.clone())),
                    ),
                };
                fields.push(field);
                columns.push(array);
            }
        }
        VertexResults::Ranks(ranks) => {
            let (field, array): (Field, ArrayRef) = match ranks {
                RankColumn::F32(values) => (
                    Field::new("rank", DataType::Float32, false),
                    Arc::new(Float32Array::from(values.clone())),
                ),
                RankColumn::F64(values) => (
                    Field::new("rank", DataType::Float64, false),
                    Arc::new(Float64Array::from(values.clone())),
                ),
            };
            fields.push(field);
            columns.push(array);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("Failed to create results RecordBatch")
}

fn results_from_batches(batches: &[RecordBatch]) -> Result<VertexResults> {
    let Some(first) = batches.first() else {
        bail!("results file has no record batches");
    };
    let schema = first.schema();

    if let Ok(field) = schema.field_with_name("rank") {
        let ranks = match field.data_type() {
            DataType::Float32 => RankColumn::F32(gather::<Float32Array, _>(batches, "rank")?),
            DataType::Float64 => RankColumn::F64(gather::<Float64Array, _>(batches, "rank")?),
            other => bail!("unexpected rank type {other}"),
        };
        return Ok(VertexResults::Ranks(ranks));
    }

    let labels = match schema.field_with_name("label")?.data_type() {
        DataType::Int32 => LabelColumn::I32(gather::<Int32Array, _>(batches, "label")?),
        DataType::Int64 => LabelColumn::I64(gather::<Int64Array, _>(batches, "label")?),
        other => bail!("unexpected label type {other}"),
    };
    let predecessors = match schema.field_with_name("predecessor").map(Field::data_type) {
        Ok(DataType::UInt32) => Some(IdColumn::U32(gather::<UInt32Array, _>(batches, "predecessor")?)),
        Ok(DataType::UInt64) => Some(IdColumn::U64(gather::<UInt64Array, _>(batches, "predecessor")?)),
        Ok(other) => bail!("unexpected predecessor type {other}"),
        Err(_) => None,
    };
    Ok(VertexResults::Labels {
        labels,
        predecessors,
    })
}

fn gather<A, T>(batches: &[RecordBatch], name: &str) -> Result<Vec<T>>
where
    A: Array + 'static,
    for<'a> &'a A: IntoIterator<Item = Option<T>>,
{
    let mut out = Vec::new();
    for batch in batches {
        for value in column::<A>(batch, name)? {
            out.push(value.with_context(|| format!("null in {name} column"))?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_edge_list_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.parquet");

        // Vertex 4 is isolated and has to survive the round trip
        let graph =
            GraphTopology::<u32, u32>::from_edge_list(5, &[(0, 1), (0, 2), (1, 2), (3, 0)]).unwrap();
        graph.write_parquet(&path).await.unwrap();

        let loaded = GraphTopology::<u32, u32>::read_parquet(&path).await.unwrap();
        assert_eq!(loaded, graph);

        let wide = GraphTopology::<u64, u64>::read_parquet(&path).await.unwrap();
        assert_eq!(wide.node_count(), 5);
        assert_eq!(wide.neighbors(0), &[1, 2]);
    }

    #[tokio::test]
    async fn test_empty_graph_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.parquet");

        let graph = GraphTopology::<u32, u32>::from_edge_list(0, &[]).unwrap();
        graph.write_parquet(&path).await.unwrap();

        let loaded = GraphTopology::<u32, u32>::read_parquet(&path).await.unwrap();
        assert_eq!(loaded.node_count(), 0);
        assert_eq!(loaded.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_results_roundtrip() {
        let dir = tempdir().unwrap();

        let labels = VertexResults::Labels {
            labels: LabelColumn::I32(vec![0, 1, -1]),
            predecessors: Some(IdColumn::U32(vec![u32::MAX, 0, u32::MAX])),
        };
        let path = dir.path().join("labels.parquet");
        write_results_parquet(&path, &labels).await.unwrap();
        assert_eq!(read_results_parquet(&path).await.unwrap(), labels);

        let ranks = VertexResults::Ranks(RankColumn::F64(vec![0.25, 0.75]));
        let path = dir.path().join("ranks.parquet");
        write_results_parquet(&path, &ranks).await.unwrap();
        assert_eq!(read_results_parquet(&path).await.unwrap(), ranks);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = GraphTopology::<u32, u32>::read_parquet(dir.path().join("nope.parquet")).await;
        assert!(result.is_err());
    }
}
