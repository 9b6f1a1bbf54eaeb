//! Multi-object table loading
//!
//! A load takes a static list of [`ReadTask`]s, fetches and decodes each one,
//! applies an optional named transform, and concatenates the results in task
//! order. In parallel mode the per-task pipeline runs on tokio tasks bounded
//! by a semaphore; the first failure aborts the remaining tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, new_null_array};
use arrow::compute::{can_cast_types, cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::codec::{FileFormat, TabularCodec, Table};
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::traits::ObjectStoreClient;

/// Transform applied to each decoded table before concatenation
pub type TransformFn = Arc<dyn Fn(Table) -> anyhow::Result<Table> + Send + Sync>;

/// Named transforms, shared by every worker of a load
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: Arc<RwLock<HashMap<String, TransformFn>>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform, replacing any previous one of the same name
    pub fn register<F>(&self, name: impl Into<String>, transform: F)
    where
        F: Fn(Table) -> anyhow::Result<Table> + Send + Sync + 'static,
    {
        let name = name.into();
        if self
            .transforms
            .write()
            .insert(name.clone(), Arc::new(transform))
            .is_some()
        {
            tracing::warn!(transform = %name, "replacing registered transform");
        }
    }

    pub fn get(&self, name: &str) -> Option<TransformFn> {
        self.transforms.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// One object to read: plain data, so it can move to any worker
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTask {
    pub path: ResourcePath,
    pub format: FileFormat,
    /// Name of a transform in the loader's [`TransformRegistry`]
    pub transform: Option<String>,
}

impl ReadTask {
    pub fn new(path: ResourcePath, format: FileFormat) -> Self {
        Self {
            path,
            format,
            transform: None,
        }
    }

    pub fn with_transform(mut self, name: impl Into<String>) -> Self {
        self.transform = Some(name.into());
        self
    }
}

/// Loads and concatenates tables from many objects
#[derive(Clone)]
pub struct ParallelTableLoader {
    store: Arc<dyn ObjectStoreClient>,
    codec: Arc<dyn TabularCodec>,
    transforms: TransformRegistry,
}

impl ParallelTableLoader {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        codec: Arc<dyn TabularCodec>,
        transforms: TransformRegistry,
    ) -> Self {
        Self {
            store,
            codec,
            transforms,
        }
    }

    /// Load every task and concatenate the tables in task order
    ///
    /// `worker_count` bounds the number of tasks in flight when `parallel` is
    /// set and defaults to the number of logical CPUs.
    pub async fn load(
        &self,
        tasks: Vec<ReadTask>,
        parallel: bool,
        worker_count: Option<usize>,
    ) -> Result<Table> {
        if tasks.is_empty() {
            return Err(Error::EmptyTaskList("no objects matched".to_string()));
        }
        let paths: Vec<String> = tasks.iter().map(|task| task.path.to_url()).collect();

        let tables = if parallel && tasks.len() > 1 {
            let workers = worker_count.unwrap_or_else(num_cpus::get).max(1);
            tracing::debug!(tasks = tasks.len(), workers, "loading tables in parallel");
            self.load_parallel(tasks, workers).await?
        } else {
            tracing::debug!(tasks = tasks.len(), "loading tables sequentially");
            self.load_sequential(tasks).await?
        };

        concat_tables(&paths, tables)
    }

    async fn load_sequential(&self, tasks: Vec<ReadTask>) -> Result<Vec<Table>> {
        let mut tables = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let table = run_task(self.store.as_ref(), self.codec.as_ref(), &self.transforms, task)
                .await
                .map_err(|e| Error::task_failure(&task.path, e))?;
            tables.push(table);
        }
        Ok(tables)
    }

    async fn load_parallel(&self, tasks: Vec<ReadTask>, workers: usize) -> Result<Vec<Table>> {
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        let mut task_paths = HashMap::with_capacity(tasks.len());
        let mut slots: Vec<Option<Table>> = vec![None; tasks.len()];

        for (index, task) in tasks.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let codec = Arc::clone(&self.codec);
            let transforms = self.transforms.clone();
            let semaphore = Arc::clone(&semaphore);
            let path = task.path.to_url();
            let handle = join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(Error::General("worker pool closed".to_string())));
                };
                let result = run_task(store.as_ref(), codec.as_ref(), &transforms, &task)
                    .await
                    .map_err(|e| Error::task_failure(&task.path, e));
                (index, result)
            });
            task_paths.insert(handle.id(), path);
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(table))) => slots[index] = Some(table),
                Ok((_, Err(err))) => {
                    join_set.shutdown().await;
                    return Err(err);
                }
                Err(err) if err.is_cancelled() => {
                    tracing::trace!("read task {} was cancelled", err.id());
                }
                Err(err) => {
                    let path = task_paths.remove(&err.id()).unwrap_or_default();
                    tracing::error!(error = %err, path = %path, "read task panicked");
                    join_set.shutdown().await;
                    return Err(Error::task_failure(
                        path,
                        Error::General(format!("read task panicked: {err}")),
                    ));
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::General(format!("read task {index} did not complete")))
            })
            .collect()
    }
}

async fn run_task(
    store: &dyn ObjectStoreClient,
    codec: &dyn TabularCodec,
    transforms: &TransformRegistry,
    task: &ReadTask,
) -> Result<Table> {
    let data = store.get(&task.path).await?;
    let table = codec.decode(&data, task.format)?;
    match &task.transform {
        None => Ok(table),
        Some(name) => {
            let transform = transforms
                .get(name)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown transform '{name}'")))?;
            transform(table).map_err(|source| Error::Transform {
                name: name.clone(),
                source,
            })
        }
    }
}

fn concat_tables(paths: &[String], tables: Vec<Table>) -> Result<Table> {
    let Some(first) = tables.first() else {
        return Err(Error::EmptyTaskList("no tables were loaded".to_string()));
    };
    let schema = first.schema();
    if tables.iter().all(|table| table.schema() == schema) {
        return Ok(concat_batches(&schema, &tables)?);
    }

    let schema = Arc::new(unified_schema(paths, &tables)?);
    tracing::debug!(columns = schema.fields().len(), "aligning table schemas");
    let aligned = tables
        .iter()
        .map(|table| align(table, &schema))
        .collect::<Result<Vec<_>>>()?;
    Ok(concat_batches(&schema, &aligned)?)
}

/// Union of all columns, in first-seen order, each at its common type
///
/// Columns that are entirely null take any type. Mixed integer and float
/// columns widen to `Float64`; anything castable to text next to a text
/// column becomes `Utf8`. Other combinations are rejected.
fn unified_schema(paths: &[String], tables: &[Table]) -> Result<Schema> {
    let mut columns: Vec<(String, DataType, bool)> = Vec::new();
    for (index, table) in tables.iter().enumerate() {
        let table_schema = table.schema();
        for (field, column) in table_schema.fields().iter().zip(table.columns()) {
            let data_type = if column.null_count() == column.len() {
                DataType::Null
            } else {
                field.data_type().clone()
            };
            match columns.iter_mut().find(|(name, ..)| name == field.name()) {
                Some((name, common, nullable)) => {
                    *common = common_type(common, &data_type).ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "Column '{name}' of {} is {}, which cannot be combined with {} from {}",
                            paths[index],
                            field.data_type(),
                            common,
                            paths[0]
                        ))
                    })?;
                    *nullable |= field.is_nullable();
                }
                None => columns.push((field.name().clone(), data_type, field.is_nullable())),
            }
        }
    }

    Ok(Schema::new(
        columns
            .into_iter()
            .map(|(name, data_type, nullable)| {
                let missing_somewhere = tables
                    .iter()
                    .any(|table| table.schema().column_with_name(&name).is_none());
                let data_type = match data_type {
                    DataType::Null => DataType::Utf8,
                    other => other,
                };
                Field::new(name, data_type, nullable || missing_somewhere)
            })
            .collect::<Vec<_>>(),
    ))
}

fn common_type(left: &DataType, right: &DataType) -> Option<DataType> {
    match (left, right) {
        (l, r) if l == r => Some(l.clone()),
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (l, r) if l.is_integer() && r.is_integer() => Some(DataType::Int64),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(DataType::Float64),
        (DataType::Utf8, other) | (other, DataType::Utf8) if can_cast_types(other, &DataType::Utf8) => {
            Some(DataType::Utf8)
        }
        _ => None,
    }
}

fn align(table: &Table, schema: &SchemaRef) -> Result<Table> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match table.column_by_name(field.name()) {
            Some(column) => cast(column, field.data_type()),
            None => Ok(new_null_array(field.data_type(), table.num_rows())),
        })
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
    Ok(Table::try_new(Arc::clone(schema), columns)?)
}
