//! Computed fields over a loaded dataset
//!
//! A [`WrapDatasetDict`] attaches derived fields to every split of a dataset at
//! one of three persistence tiers:
//!
//! - [`Save::Runtime`] keeps a handler and evaluates it lazily on every row
//!   access. Nothing is materialized.
//! - [`Save::Memory`] evaluates the handler eagerly over every row and adds the
//!   result as a column of the in-memory table.
//! - [`Save::Local`] does what `Memory` does, rewrites each split's stream file
//!   with the new column, records the column type in the schema side-car and
//!   reloads the dataset through its loader.
//!
//! Reloading after a `Local` write replaces every split with what the loader
//! produces, so columns added earlier at the `Memory` tier are not carried over.

use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use datalab_arrow::arrow::array::ArrayRef;
use datalab_arrow::arrow::datatypes::Field;
use datalab_arrow::arrow::record_batch::RecordBatch;
use datalab_arrow::{
    column_from_values, drop_column, has_column, read_table, replace_column, row, rows,
    stage_table, type_tag, SchemaSidecar, StagedFile, StagedTable,
};
use datalab_core::{merge, Data, DataKind, Error, OperationDescriptor, Result, Sample};

use crate::config::WrapConfig;
use crate::loader::DatasetLoader;
use crate::split::Split;

/// Persistence tier of a registered field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Save {
    /// Evaluated on every row access
    Runtime,

    /// Materialized as a column of the in-memory tables
    Memory,

    /// Materialized in memory and in the on-disk tables
    Local,
}

/// Computes one field value from a row
pub type Handler = Arc<dyn Fn(&Sample) -> anyhow::Result<Value> + Send + Sync>;

/// Box a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Sample) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A runtime field and the handler computing it
#[derive(Clone)]
pub struct FieldHandle {
    field: String,
    handler: Handler,
}

impl FieldHandle {
    /// Field the handler computes
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Run the handler on `row`
    pub fn evaluate(&self, row: &Sample) -> Result<Value> {
        (self.handler)(row).map_err(|source| Error::Handler {
            field: self.field.clone(),
            source,
        })
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Load a dataset with the default configuration
pub fn load_dataset<L>(loader: L) -> Result<WrapDatasetDict>
where
    L: DatasetLoader + 'static,
{
    load_dataset_with_config(loader, WrapConfig::default())
}

/// Load a dataset; the loader is kept for reloads
pub fn load_dataset_with_config<L>(loader: L, config: WrapConfig) -> Result<WrapDatasetDict>
where
    L: DatasetLoader + 'static,
{
    let loader: Arc<dyn DatasetLoader> = Arc::new(loader);
    let splits = loader.load()?;
    info!(splits = splits.len(), "loaded dataset");

    Ok(WrapDatasetDict {
        loader,
        splits,
        handles: Vec::new(),
        config,
    })
}

/// Pending rewrite of one split's stream file and side-car
struct DiskUpdate {
    path: PathBuf,
    sidecar: SchemaSidecar,
    table: RecordBatch,
    /// `Some` records the tag, `None` prunes the entry
    type_tag: Option<String>,
}

impl DiskUpdate {
    fn stage(self, field: &str, max_rows: Option<usize>) -> Result<StagedUpdate> {
        let batches = write_batches(&self.table, max_rows);
        let table = stage_table(&self.path, &self.table.schema(), &batches)?;
        let sidecar = match self.type_tag {
            Some(tag) => self.sidecar.stage_record(field, &tag)?,
            None => self.sidecar.stage_remove(field)?,
        };
        Ok(StagedUpdate { table, sidecar })
    }
}

/// Stream file and side-car of one split, written but not yet moved into place
struct StagedUpdate {
    table: StagedTable,
    sidecar: StagedFile,
}

impl StagedUpdate {
    fn commit(self) -> Result<()> {
        self.table.commit()?;
        self.sidecar.commit()?;
        Ok(())
    }
}

/// A dataset's splits plus the runtime fields registered on it
#[derive(Debug)]
pub struct WrapDatasetDict {
    loader: Arc<dyn DatasetLoader>,
    splits: Vec<Split>,
    handles: Vec<FieldHandle>,
    config: WrapConfig,
}

impl WrapDatasetDict {
    /// View of split `name` with the current runtime fields
    pub fn split(&self, name: &str) -> Result<WrapDataset> {
        self.splits
            .iter()
            .find(|split| split.name() == name)
            .map(|split| self.view(split))
            .ok_or_else(|| Error::UnknownSplit(name.to_string()))
    }

    /// Views of every split in load order
    pub fn splits(&self) -> impl Iterator<Item = WrapDataset> + '_ {
        self.splits.iter().map(|split| self.view(split))
    }

    /// Split names in load order
    pub fn split_names(&self) -> Vec<&str> {
        self.splits.iter().map(Split::name).collect()
    }

    /// Number of splits
    pub fn len(&self) -> usize {
        self.splits.len()
    }

    /// Whether the dataset has no splits
    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// Registered runtime fields, in registration order
    pub fn handles(&self) -> &[FieldHandle] {
        &self.handles
    }

    /// Active configuration
    pub fn config(&self) -> &WrapConfig {
        &self.config
    }

    /// Add (`Some`) or remove (`None`) a field at the runtime tier, or at the
    /// memory tier when `runtime` is false
    pub fn register(&mut self, field: &str, handler: Option<Handler>, runtime: bool) -> Result<()> {
        let save = if runtime { Save::Runtime } else { Save::Memory };
        self.register_as(field, handler, save)
    }

    /// Add or remove a field at the on-disk tier
    pub fn register_reload(&mut self, field: &str, handler: Option<Handler>) -> Result<()> {
        self.register_as(field, handler, Save::Local)
    }

    /// Add (`Some`) or remove (`None`) a field at tier `save`
    #[instrument(level = "debug", skip(self, handler), fields(add = handler.is_some()))]
    pub fn register_as(&mut self, field: &str, handler: Option<Handler>, save: Save) -> Result<()> {
        match (handler, save) {
            (Some(handler), Save::Runtime) => {
                self.upsert_handle(field, handler);
                Ok(())
            }
            (None, Save::Runtime) => self.remove_handle(field),
            (Some(handler), tier) => self.store_column(field, &handler, tier == Save::Local),
            (None, tier) => self.drop_stored(field, tier == Save::Local),
        }
    }

    /// Replace every split with what the loader currently produces
    pub fn reload(&mut self) -> Result<()> {
        let splits = self.loader.load()?;
        info!(splits = splits.len(), "reloaded dataset");
        self.splits = splits;
        Ok(())
    }

    fn view(&self, split: &Split) -> WrapDataset {
        WrapDataset {
            name: split.name().to_string(),
            table: split.table().clone(),
            handles: self.handles.clone(),
        }
    }

    fn upsert_handle(&mut self, field: &str, handler: Handler) {
        match self.handles.iter_mut().find(|handle| handle.field == field) {
            Some(handle) => handle.handler = handler,
            None => self.handles.push(FieldHandle {
                field: field.to_string(),
                handler,
            }),
        }
        debug!(field, "registered runtime field");
    }

    fn remove_handle(&mut self, field: &str) -> Result<()> {
        let index = self
            .handles
            .iter()
            .position(|handle| handle.field == field)
            .ok_or_else(|| Error::field_not_found(field, None))?;
        self.handles.remove(index);
        debug!(field, "removed runtime field");
        Ok(())
    }

    fn compute(&self, field: &str, handler: &Handler, rows: &[Sample]) -> Result<Vec<Value>> {
        let evaluate = |row: &Sample| {
            handler(row).map_err(|source| Error::Handler {
                field: field.to_string(),
                source,
            })
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            if self.config.parallel {
                return rows.par_iter().map(evaluate).collect();
            }
        }

        rows.iter().map(evaluate).collect()
    }

    fn store_column(&mut self, field: &str, handler: &Handler, local: bool) -> Result<()> {
        let mut staged = Vec::with_capacity(self.splits.len());
        for split in &self.splits {
            let values = self.compute(field, handler, &self.view(split).to_vec()?)?;
            let (column_field, column) = column_from_values(field, &values)?;
            let memory = replace_column(split.table(), column_field.clone(), column.clone())?;
            let disk = if local {
                Some(self.stage_add(split, field, column_field, column)?)
            } else {
                None
            };
            staged.push((memory, disk));
        }

        self.commit(field, staged)?;
        info!(field, local, "stored field");

        if local {
            self.reload()?;
        }
        Ok(())
    }

    fn drop_stored(&mut self, field: &str, local: bool) -> Result<()> {
        let mut staged = Vec::with_capacity(self.splits.len());
        for split in &self.splits {
            if !has_column(split.table(), field) {
                return Err(Error::field_not_found(field, Some(split.name())));
            }
            let memory = drop_column(split.table(), field)?;
            let disk = if local {
                Some(self.stage_drop(split, field)?)
            } else {
                None
            };
            staged.push((memory, disk));
        }

        self.commit(field, staged)?;
        info!(field, local, "dropped field");

        if local {
            self.reload()?;
        }
        Ok(())
    }

    fn stage_add(&self, split: &Split, field: &str, column_field: Field, column: ArrayRef) -> Result<DiskUpdate> {
        let path = backing_file(split)?;
        let sidecar = SchemaSidecar::with_extension(path, &self.config.sidecar_extension);
        let tag = type_tag(column_field.data_type());

        if let Some(recorded) = sidecar.get(field) {
            if !types_compatible(&recorded, &tag) {
                return Err(Error::SchemaMismatch(format!(
                    "field '{field}' of split '{}' is recorded as {recorded} but the new values are {tag}",
                    split.name()
                )));
            }
        }

        let on_disk = read_table(path)?.concat()?;
        let table = replace_column(&on_disk, column_field, column)?;

        Ok(DiskUpdate {
            path: path.to_path_buf(),
            sidecar,
            table,
            type_tag: Some(tag),
        })
    }

    fn stage_drop(&self, split: &Split, field: &str) -> Result<DiskUpdate> {
        let path = backing_file(split)?;
        let on_disk = read_table(path)?.concat()?;
        if !has_column(&on_disk, field) {
            return Err(Error::field_not_found(field, Some(split.name())));
        }

        Ok(DiskUpdate {
            path: path.to_path_buf(),
            sidecar: SchemaSidecar::with_extension(path, &self.config.sidecar_extension),
            table: drop_column(&on_disk, field)?,
            type_tag: None,
        })
    }

    /// Swap in the staged tables. Every on-disk write is staged before the
    /// first one is moved into place, and the in-memory tables change last.
    fn commit(&mut self, field: &str, staged: Vec<(RecordBatch, Option<DiskUpdate>)>) -> Result<()> {
        let max_rows = self.config.max_rows_per_batch;
        let (tables, updates): (Vec<_>, Vec<_>) = staged.into_iter().unzip();

        let mut pending = Vec::new();
        for (split, update) in self.splits.iter().zip(updates) {
            if let Some(update) = update {
                pending.push((split.name().to_string(), update.stage(field, max_rows)?));
            }
        }

        for (name, update) in pending {
            if let Err(err) = update.commit() {
                // earlier splits may already be on disk; resync memory with it
                if let Err(reload_err) = self.reload() {
                    warn!(error = %reload_err, "reload after failed rewrite failed");
                }
                return Err(err);
            }
            debug!(split = %name, field, "rewrote split file");
        }

        for (split, table) in self.splits.iter_mut().zip(tables) {
            split.set_table(table);
        }
        Ok(())
    }
}

fn backing_file(split: &Split) -> Result<&Path> {
    split.cache_file().ok_or_else(|| {
        Error::Configuration(format!(
            "split '{}' has no backing file to persist to",
            split.name()
        ))
    })
}

/// A null-typed column carries no type information either way
fn types_compatible(recorded: &str, new: &str) -> bool {
    recorded == new || recorded == "null" || new == "null"
}

fn write_batches(table: &RecordBatch, max_rows: Option<usize>) -> Vec<RecordBatch> {
    let total = table.num_rows();
    match max_rows {
        Some(limit) if limit > 0 && total > limit => (0..total)
            .step_by(limit)
            .map(|offset| table.slice(offset, limit.min(total - offset)))
            .collect(),
        _ => vec![table.clone()],
    }
}

/// One split seen through the runtime fields registered when it was taken
#[derive(Debug, Clone)]
pub struct WrapDataset {
    name: String,
    table: RecordBatch,
    handles: Vec<FieldHandle>,
}

impl WrapDataset {
    /// Split name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.table.num_rows()
    }

    /// Whether the split has no rows
    pub fn is_empty(&self) -> bool {
        self.table.num_rows() == 0
    }

    /// Stored columns; runtime fields are not listed
    pub fn column_names(&self) -> Vec<String> {
        self.table
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Underlying table
    pub fn table(&self) -> &RecordBatch {
        &self.table
    }

    /// Runtime fields applied on access
    pub fn handles(&self) -> &[FieldHandle] {
        &self.handles
    }

    /// Row `index` merged with every runtime field; a runtime field shadows a
    /// stored column of the same name
    pub fn get(&self, index: usize) -> Result<Sample> {
        self.with_handles(row(&self.table, index)?)
    }

    /// Lazy pass over the rows
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            dataset: self,
            index: 0,
        }
    }

    /// Every row with runtime fields applied
    pub fn to_vec(&self) -> Result<Vec<Sample>> {
        rows(&self.table)?
            .into_iter()
            .map(|base| self.with_handles(base))
            .collect()
    }

    /// The rows as a dataset container
    pub fn data(&self) -> Result<Data<std::vec::IntoIter<Sample>>> {
        Ok(Data::from_records(DataKind::Dataset, self.to_vec()?).with_name(self.name.clone()))
    }

    /// Stream the rows through `operation`, one row per call to `next`.
    ///
    /// A row whose runtime fields fail is yielded as an error in its place.
    /// Aggregating operations read every row and yield a single result.
    pub fn apply<'a>(&'a self, operation: &'a OperationDescriptor) -> ApplyRows<'a> {
        ApplyRows {
            rows: self.iter(),
            operation,
            finished: false,
        }
    }

    fn with_handles(&self, base: Sample) -> Result<Sample> {
        let mut computed = Sample::new();
        for handle in &self.handles {
            computed.insert(handle.field.clone(), handle.evaluate(&base)?);
        }
        Ok(merge(base, computed))
    }
}

impl<'a> IntoIterator for &'a WrapDataset {
    type Item = Result<Sample>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Rows<'a> {
        self.iter()
    }
}

/// Lazy row iterator of a [`WrapDataset`]
#[derive(Debug)]
pub struct Rows<'a> {
    dataset: &'a WrapDataset,
    index: usize,
}

impl Iterator for Rows<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rows<'_> {}

impl FusedIterator for Rows<'_> {}

/// Lazy results of an operation over a [`WrapDataset`]
#[derive(Debug)]
pub struct ApplyRows<'a> {
    rows: Rows<'a>,
    operation: &'a OperationDescriptor,
    finished: bool,
}

impl Iterator for ApplyRows<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let operation = self.operation;
        if operation.family().aggregates() {
            self.finished = true;
            let inputs = self
                .rows
                .by_ref()
                .map(|row| row.map(|row| operation.select_input(&row)))
                .collect::<Result<Vec<_>>>();
            return Some(inputs.and_then(|values| operation.call(Value::Array(values))));
        }

        match self.rows.next() {
            Some(row) => Some(row.and_then(|row| operation.invoke(&row))),
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else if self.operation.family().aggregates() {
            (1, Some(1))
        } else {
            self.rows.size_hint()
        }
    }
}

impl FusedIterator for ApplyRows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use datalab_core::{wrap_value, OperationFamily, Resources};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn texts(values: &[&str]) -> Vec<Sample> {
        values.iter().map(|text| wrap_value("text", *text)).collect()
    }

    fn word_count() -> Handler {
        handler(|row: &Sample| {
            let text = row["text"].as_str().unwrap_or_default();
            Ok(json!(text.split(' ').count()))
        })
    }

    fn dataset() -> WrapDatasetDict {
        load_dataset(
            MemoryLoader::new()
                .split("train", texts(&["I love this movie", "do you love this movie"]))
                .split("test", texts(&["great"])),
        )
        .unwrap()
    }

    #[test]
    fn test_runtime_field_is_lazy() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), true).unwrap();

        let train = ds.split("train").unwrap();

        assert_eq!(train.get(0).unwrap()["length"], json!(4));
        assert_eq!(train.get(1).unwrap()["length"], json!(5));
        assert_eq!(train.column_names(), ["text"]);
    }

    #[test]
    fn test_runtime_reregistration_keeps_latest_handler() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), true).unwrap();
        ds.register("length", Some(handler(|_: &Sample| Ok(json!("latest")))), true)
            .unwrap();

        let train = ds.split("train").unwrap();

        assert_eq!(ds.handles().len(), 1);
        assert_eq!(train.get(0).unwrap()["length"], json!("latest"));
        assert_eq!(train.get(1).unwrap()["length"], json!("latest"));
    }

    #[test]
    fn test_runtime_removal() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), true).unwrap();

        ds.register("length", None, true).unwrap();

        assert!(ds.handles().is_empty());
        assert!(!ds.split("train").unwrap().get(0).unwrap().contains_key("length"));
        assert!(matches!(
            ds.register("length", None, true),
            Err(Error::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_view_keeps_handles_snapshot() {
        let mut ds = dataset();
        let before = ds.split("test").unwrap();
        ds.register("length", Some(word_count()), true).unwrap();

        assert!(!before.get(0).unwrap().contains_key("length"));
        assert!(ds.split("test").unwrap().get(0).unwrap().contains_key("length"));
    }

    #[test]
    fn test_memory_field_replaces_column() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), false).unwrap();
        ds.register("length", Some(handler(|_: &Sample| Ok(json!("n/a")))), false)
            .unwrap();

        let train = ds.split("train").unwrap();

        assert_eq!(train.column_names(), ["text", "length"]);
        assert_eq!(train.get(1).unwrap()["length"], json!("n/a"));
    }

    #[test]
    fn test_memory_field_sees_runtime_fields() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), true).unwrap();
        ds.register(
            "double",
            Some(handler(|row: &Sample| {
                Ok(json!(row["length"].as_u64().unwrap_or_default() * 2))
            })),
            false,
        )
        .unwrap();

        assert_eq!(ds.split("train").unwrap().get(0).unwrap()["double"], json!(8));
    }

    #[test]
    fn test_memory_removal_drops_column() {
        let mut ds = dataset();
        ds.register("length", Some(word_count()), false).unwrap();

        ds.register("length", None, false).unwrap();

        for split in ds.splits() {
            assert_eq!(split.column_names(), ["text"]);
            assert!(!split.get(0).unwrap().contains_key("length"));
        }
    }

    #[test]
    fn test_memory_removal_of_missing_column() {
        let mut ds = dataset();
        let err = ds.register("length", None, false).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound { split: Some(_), .. }));
    }

    #[test]
    fn test_handler_error_leaves_tables_untouched() {
        let mut ds = dataset();
        let failing = handler(|row: &Sample| {
            if row["text"] == json!("great") {
                anyhow::bail!("no length for '{}'", row["text"]);
            }
            Ok(json!(1))
        });

        let err = ds.register("length", Some(failing), false).unwrap_err();

        assert!(matches!(err, Error::Handler { .. }));
        assert_eq!(ds.split("train").unwrap().column_names(), ["text"]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_memory_field_keeps_row_order() {
        let numbers: Vec<String> = (0..5_000).map(|n| n.to_string()).collect();
        let rows: Vec<&str> = numbers.iter().map(String::as_str).collect();
        let config = WrapConfig {
            parallel: true,
            ..WrapConfig::default()
        };
        let mut ds =
            load_dataset_with_config(MemoryLoader::new().split("train", texts(&rows)), config)
                .unwrap();

        ds.register(
            "number",
            Some(handler(|row: &Sample| {
                Ok(json!(row["text"].as_str().unwrap_or_default().parse::<i64>()?))
            })),
            false,
        )
        .unwrap();

        let train = ds.split("train").unwrap();
        for (index, row) in train.iter().enumerate() {
            assert_eq!(row.unwrap()["number"], json!(index));
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_handler_error_leaves_tables_untouched() {
        let config = WrapConfig {
            parallel: true,
            ..WrapConfig::default()
        };
        let mut ds = load_dataset_with_config(
            MemoryLoader::new().split("train", texts(&["1", "x", "3"])),
            config,
        )
        .unwrap();

        let err = ds
            .register(
                "number",
                Some(handler(|row: &Sample| {
                    Ok(json!(row["text"].as_str().unwrap_or_default().parse::<i64>()?))
                })),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, Error::Handler { .. }));
        assert_eq!(ds.split("train").unwrap().column_names(), ["text"]);
    }

    #[test]
    fn test_local_needs_backing_file() {
        let mut ds = dataset();
        let err = ds.register_reload("length", Some(word_count())).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_unknown_split() {
        assert!(matches!(dataset().split("dev"), Err(Error::UnknownSplit(_))));
    }

    #[test]
    fn test_apply_operation_to_split() {
        let ds = dataset();
        let op = OperationFamily::Featurizing.registrar().name("get_length").register(
            |input: Value, _: &Resources| {
                let text = datalab_core::text_input(&input)?;
                Ok(wrap_value("length", text.split(' ').count()))
            },
        );

        let train = ds.split("train").unwrap();

        let results: Vec<Sample> = train.apply(&op).collect::<Result<_>>().unwrap();

        assert_eq!(results, vec![wrap_value("length", 4), wrap_value("length", 5)]);
    }

    #[test]
    fn test_apply_reads_rows_on_demand() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut ds = dataset();
        ds.register(
            "seen",
            Some(handler(move |_: &Sample| Ok(json!(seen.fetch_add(1, Ordering::SeqCst))))),
            true,
        )
        .unwrap();
        let op = OperationFamily::Featurizing
            .registrar()
            .name("get_seen")
            .processed_fields(["seen"])
            .register(|input: Value, _: &Resources| Ok(wrap_value("echo", input)));
        let train = ds.split("train").unwrap();

        let mut results = train.apply(&op);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(results.next().unwrap().unwrap(), wrap_value("echo", 0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.size_hint(), (1, Some(1)));
    }

    #[test]
    fn test_apply_yields_row_errors_in_place() {
        let mut ds = dataset();
        ds.register(
            "checked",
            Some(handler(|row: &Sample| {
                if row["text"] == json!("I love this movie") {
                    anyhow::bail!("rejected");
                }
                Ok(json!(true))
            })),
            true,
        )
        .unwrap();
        let op = OperationFamily::Featurizing.registrar().name("get_length").register(
            |input: Value, _: &Resources| {
                let text = datalab_core::text_input(&input)?;
                Ok(wrap_value("length", text.split(' ').count()))
            },
        );
        let train = ds.split("train").unwrap();

        let results: Vec<_> = train.apply(&op).collect();

        assert!(matches!(results[0], Err(Error::Handler { .. })));
        assert_eq!(results[1].as_ref().unwrap(), &wrap_value("length", 5));
    }

    #[test]
    fn test_write_batches_respects_limit() {
        let table = datalab_arrow::batch_from_samples(&texts(&["a", "b", "c", "d", "e"])).unwrap();

        let batches = write_batches(&table, Some(2));

        let sizes: Vec<_> = batches.iter().map(RecordBatch::num_rows).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(write_batches(&table, None).len(), 1);
    }

    #[test]
    fn test_rows_iterator() {
        let ds = dataset();
        let train = ds.split("train").unwrap();

        let collected: Vec<Sample> = train.iter().collect::<Result<_>>().unwrap();

        assert_eq!(train.iter().len(), 2);
        assert_eq!(collected, texts(&["I love this movie", "do you love this movie"]));
    }
}
