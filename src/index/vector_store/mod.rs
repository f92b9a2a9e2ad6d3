
use crate::LegalError;
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const TABLE_NAME: &str = "articles";
const ROWS_PER_BATCH: usize = 1024;

/// LanceDB table holding one vector per corpus row.
///
/// The `row` column is the article's position in the merged corpus table.
/// No ANN index is ever created on the table, so every search is an exact
/// flat L2 scan.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    path: PathBuf,
}

/// A corpus row and its L2 distance to the query vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

impl VectorStore {
    /// Connect to (or create) the LanceDB database at `path`
    #[inline]
    pub async fn open(path: &Path) -> Result<Self, LegalError> {
        debug!("Opening LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            LegalError::Index(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the vector table has been created
    #[inline]
    pub async fn has_table(&self) -> Result<bool, LegalError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("row", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Replace the table contents with `vectors`, where `vectors[i]` is corpus row `i`
    #[inline]
    pub async fn replace_vectors(&self, vectors: &[Vec<f32>]) -> Result<(), LegalError> {
        self.drop_table_if_exists().await?;

        let Some(first) = vectors.first() else {
            debug!("No vectors to store, leaving table absent");
            return Ok(());
        };

        let vector_dim = first.len();
        if vector_dim == 0 {
            return Err(LegalError::Index(
                "Embedding vectors must not be empty".to_string(),
            ));
        }
        if let Some((row, bad)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != vector_dim)
        {
            return Err(LegalError::Index(format!(
                "Vector for row {} has {} dimensions, expected {}",
                row,
                bad.len(),
                vector_dim
            )));
        }

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to create table: {}", e)))?;

        let batches = vectors
            .chunks(ROWS_PER_BATCH)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                Self::create_record_batch(
                    &schema,
                    chunk_index * ROWS_PER_BATCH,
                    chunk,
                    vector_dim,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to open table: {}", e)))?;

        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), Arc::clone(&schema));
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to insert vectors: {}", e)))?;

        info!(
            "Stored {} vectors with {} dimensions",
            vectors.len(),
            vector_dim
        );
        Ok(())
    }

    fn create_record_batch(
        schema: &Arc<Schema>,
        first_row: usize,
        vectors: &[Vec<f32>],
        vector_dim: usize,
    ) -> Result<RecordBatch, LegalError> {
        let rows = (first_row..first_row + vectors.len())
            .map(|row| {
                u32::try_from(row)
                    .map_err(|_| LegalError::Index(format!("Row {} exceeds u32 range", row)))
            })
            .collect::<Result<Vec<u32>, _>>()?;

        let mut flat_values = Vec::with_capacity(vectors.len() * vector_dim);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| LegalError::Index(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> =
            vec![Arc::new(UInt32Array::from(rows)), Arc::new(vector_array)];

        RecordBatch::try_new(Arc::clone(schema), arrays)
            .map_err(|e| LegalError::Index(format!("Failed to create record batch: {}", e)))
    }

    /// Number of stored vectors; zero when the table is absent
    #[inline]
    pub async fn count_vectors(&self) -> Result<usize, LegalError> {
        if !self.has_table().await? {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to open table: {}", e)))?;

        table
            .count_rows(None)
            .await
            .map_err(|e| LegalError::Index(format!("Failed to count rows: {}", e)))
    }

    /// Dimension of the stored vectors, read from the table schema
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>, LegalError> {
        if !self.has_table().await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to open table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(LegalError::Index(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Exact nearest-neighbor search by L2 distance, nearest first
    #[inline]
    pub async fn nearest(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Neighbor>, LegalError> {
        debug!("Searching for nearest vectors with limit: {}", limit);

        if limit == 0 || !self.has_table().await? {
            return Ok(Vec::new());
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to open table: {}", e)))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| LegalError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to execute search: {}", e)))?;

        let mut neighbors = Self::parse_search_results_stream(results).await?;
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.row.cmp(&b.row))
        });
        neighbors.truncate(limit);

        Ok(neighbors)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<Neighbor>, LegalError> {
        let mut neighbors = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| LegalError::Index(format!("Failed to read result stream: {}", e)))?
        {
            neighbors.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", neighbors.len());
        Ok(neighbors)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<Neighbor>, LegalError> {
        let rows = batch
            .column_by_name("row")
            .ok_or_else(|| LegalError::Index("Missing row column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| LegalError::Index("Invalid row column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| LegalError::Index("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| LegalError::Index("Invalid _distance column type".to_string()))?;

        let mut neighbors = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            if rows.is_null(i) || distances.is_null(i) {
                warn!("Skipping search result {} with null row or distance", i);
                continue;
            }
            neighbors.push(Neighbor {
                row: rows.value(i) as usize,
                distance: distances.value(i),
            });
        }

        Ok(neighbors)
    }

    /// Drop the vector table if it exists
    #[inline]
    pub async fn drop_table_if_exists(&self) -> Result<(), LegalError> {
        if self.has_table().await? {
            info!("Dropping existing vector table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| {
                    error!("Failed to drop vector table: {}", e);
                    LegalError::Index(format!("Failed to drop table: {}", e))
                })?;
        }

        Ok(())
    }
}
