//! Plugin registry
//!
//! A plugin is a named function producing one or more tables, registered with
//! a [`DestinationTemplate`] describing where its outputs go. Invoking it
//! resolves the destinations from the keyword arguments, calls the function
//! with the remaining keywords, and writes the returned tables.

mod template;

pub use template::{
    Destination, DestinationTemplate, Field, FileNames, Kwargs, ResolutionRequest, Setting,
};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::codec::{FileFormat, TabularCodec, Table};
use crate::error::{Error, Result};
use crate::path::{ResourcePath, StorageSite};
use crate::traits::ObjectStoreClient;

/// Arguments or return value of a plugin function
#[derive(Debug, Clone, PartialEq)]
pub enum PluginValue {
    Table(Table),
    Tables(Vec<Table>),
    Value(Value),
}

impl PluginValue {
    fn describe(&self) -> String {
        match self {
            PluginValue::Table(_) => "a table".to_string(),
            PluginValue::Tables(tables) if tables.is_empty() => "an empty sequence".to_string(),
            PluginValue::Tables(tables) => format!("{} tables", tables.len()),
            PluginValue::Value(value) => format!("the value {value}"),
        }
    }
}

impl From<Table> for PluginValue {
    fn from(table: Table) -> Self {
        PluginValue::Table(table)
    }
}

impl From<Vec<Table>> for PluginValue {
    fn from(tables: Vec<Table>) -> Self {
        PluginValue::Tables(tables)
    }
}

impl From<Value> for PluginValue {
    fn from(value: Value) -> Self {
        PluginValue::Value(value)
    }
}

/// What a plugin function receives
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub args: Vec<PluginValue>,
    pub kwargs: Kwargs,
}

pub type PluginFn = Arc<dyn Fn(Invocation) -> anyhow::Result<PluginValue> + Send + Sync>;

/// A registered plugin
#[derive(Clone)]
pub struct PluginRegistration {
    pub name: String,
    pub function: PluginFn,
    pub template: DestinationTemplate,
    /// Keyword names the function accepts; `None` passes every keyword through
    pub parameters: Option<Vec<String>>,
    /// Log failures and return `None` instead of an error
    pub ignore_error: bool,
}

impl PluginRegistration {
    pub fn new<F>(name: impl Into<String>, function: F, template: DestinationTemplate) -> Self
    where
        F: Fn(Invocation) -> anyhow::Result<PluginValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
            template,
            parameters: None,
            ignore_error: false,
        }
    }

    pub fn parameters<S: Into<String>>(mut self, parameters: impl IntoIterator<Item = S>) -> Self {
        self.parameters = Some(parameters.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore_error(mut self, ignore_error: bool) -> Self {
        self.ignore_error = ignore_error;
        self
    }

    /// Format used when no override is given
    pub fn default_format(&self) -> Option<String> {
        match &self.template.format {
            Setting::Literal(format) => Some(format.clone()),
            _ => None,
        }
    }

    fn select_kwargs(&self, kwargs: Kwargs) -> Kwargs {
        match &self.parameters {
            None => kwargs,
            Some(parameters) => kwargs
                .into_iter()
                .filter(|(keyword, _)| parameters.iter().any(|p| p == keyword))
                .collect(),
        }
    }

    async fn run(&self, context: &PluginContext<'_>, invocation: Invocation) -> Result<PluginValue> {
        let (request, kwargs) = ResolutionRequest::split(&self.template, invocation.kwargs);
        let destinations = request.resolve(context.site)?;
        for destination in &destinations {
            let paths: Vec<String> = destination.paths.iter().map(ResourcePath::to_url).collect();
            tracing::info!(plugin = %self.name, tag = %destination.tag, ?paths, "output destinations resolved");
        }

        let value = (self.function)(Invocation {
            args: invocation.args,
            kwargs: self.select_kwargs(kwargs),
        })
        .map_err(|source| Error::Plugin {
            name: self.name.clone(),
            source,
        })?;

        self.route(context, &value, &destinations).await?;
        Ok(value)
    }

    async fn route(
        &self,
        context: &PluginContext<'_>,
        value: &PluginValue,
        destinations: &[Destination],
    ) -> Result<()> {
        match value {
            PluginValue::Table(table) => {
                for path in destinations.iter().flat_map(|d| &d.paths) {
                    context.write(path, table).await?;
                }
            }
            PluginValue::Tables(tables) if !tables.is_empty() => {
                if let Some(destination) = destinations
                    .iter()
                    .find(|d| d.paths.len() != tables.len())
                {
                    return Err(Error::OutputCountMismatch {
                        name: self.name.clone(),
                        tag: destination.tag.clone(),
                        returned: tables.len(),
                        destinations: destination.paths.len(),
                    });
                }
                for destination in destinations {
                    for (table, path) in tables.iter().zip(&destination.paths) {
                        context.write(path, table).await?;
                    }
                }
            }
            other => {
                return Err(Error::ReturnShape {
                    name: self.name.clone(),
                    found: other.describe(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("parameters", &self.parameters)
            .field("ignore_error", &self.ignore_error)
            .finish_non_exhaustive()
    }
}

/// Store, codec and site a plugin invocation writes through
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    pub store: &'a dyn ObjectStoreClient,
    pub codec: &'a dyn TabularCodec,
    pub site: &'a StorageSite,
}

impl PluginContext<'_> {
    async fn write(&self, path: &ResourcePath, table: &Table) -> Result<()> {
        let format = FileFormat::from_path(&path.key_path)?;
        let data = self.codec.encode(table, format)?;
        self.store.put(path, data).await?;
        tracing::debug!(path = %path, rows = table.num_rows(), "table written");
        Ok(())
    }
}

#[derive(Default)]
struct Slots {
    arena: Vec<Arc<PluginRegistration>>,
    index: HashMap<String, usize>,
}

static GLOBAL: Lazy<Arc<PluginRegistry>> = Lazy::new(|| Arc::new(PluginRegistry::new()));

/// Registered plugins by name
#[derive(Default)]
pub struct PluginRegistry {
    slots: RwLock<Slots>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> Arc<PluginRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register `function` under `name`; an existing plugin of that name is replaced
    pub fn register<F>(&self, name: impl Into<String>, function: F, template: DestinationTemplate)
    where
        F: Fn(Invocation) -> anyhow::Result<PluginValue> + Send + Sync + 'static,
    {
        self.insert(PluginRegistration::new(name, function, template));
    }

    pub fn insert(&self, registration: PluginRegistration) {
        let name = registration.name.clone();
        let registration = Arc::new(registration);
        let mut slots = self.slots.write();
        match slots.index.get(&name).copied() {
            Some(index) => {
                tracing::warn!(plugin = %name, "plugin already registered, replacing it");
                slots.arena[index] = registration;
            }
            None => {
                let index = slots.arena.len();
                slots.arena.push(registration);
                slots.index.insert(name, index);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<PluginRegistration>> {
        let slots = self.slots.read();
        slots
            .index
            .get(name)
            .map(|&index| Arc::clone(&slots.arena[index]))
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.slots
            .read()
            .arena
            .iter()
            .map(|registration| registration.name.clone())
            .collect()
    }

    /// Keyword arguments accepted by a plugin, with their template defaults
    pub fn describe(&self, name: &str) -> Result<String> {
        let registration = self
            .get(name)
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))?;
        let template = &registration.template;
        let mut out = format!("plugin `{name}`\n");

        out.push_str("  == keywords for every tag ==\n");
        for field in Field::ALL {
            out.push_str(&format!("    {}: {}\n", field.keyword(), field.description()));
        }
        for tag in &template.tags {
            out.push_str(&format!("  == keywords for tag `{tag}` ==\n"));
            for field in Field::ALL {
                let default = template
                    .display_value(field, tag)
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!(
                    "    {}: {}, default: {default}\n",
                    field.tagged_keyword(tag),
                    field.description()
                ));
            }
        }
        Ok(out)
    }

    /// Run a plugin and write its outputs
    ///
    /// Returns `Ok(None)` when the plugin was registered with `ignore_error`
    /// and failed; the failure is logged.
    pub async fn invoke(
        &self,
        name: &str,
        context: PluginContext<'_>,
        invocation: Invocation,
    ) -> Result<Option<PluginValue>> {
        let registration = self
            .get(name)
            .ok_or_else(|| Error::PluginNotFound(name.to_string()))?;
        match registration.run(&context, invocation).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if registration.ignore_error => {
                tracing::error!(plugin = %name, error = %err, "plugin failed, error ignored");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArrowCodec;
    use crate::codec::tests::sample_table;
    use crate::path::decode_path;
    use crate::testing::MemoryStore;
    use serde_json::json;

    const PARENT: &str = "https://acct.blob.core.windows.net/out";

    fn kwargs(value: Value) -> Kwargs {
        serde_json::from_value(value).unwrap()
    }

    fn decode(store: &MemoryStore, url: &str) -> Table {
        let data = store.object(url).unwrap();
        let format = FileFormat::from_path(&decode_path(url).unwrap().key_path).unwrap();
        ArrowCodec::new().decode(&data, format).unwrap()
    }

    async fn invoke(
        registry: &PluginRegistry,
        store: &MemoryStore,
        name: &str,
        kwargs: Kwargs,
    ) -> Result<Option<PluginValue>> {
        let codec = ArrowCodec::new();
        let site = StorageSite::default();
        let context = PluginContext {
            store,
            codec: &codec,
            site: &site,
        };
        registry
            .invoke(
                name,
                context,
                Invocation {
                    args: vec![],
                    kwargs,
                },
            )
            .await
    }

    #[tokio::test]
    async fn test_single_table_written_to_parent_path() {
        let registry = PluginRegistry::new();
        let table = sample_table(&[1, 2], &["a", "b"]);
        let returned = table.clone();
        registry.register(
            "make",
            move |_| Ok(PluginValue::Table(returned.clone())),
            DestinationTemplate::new(["out"]),
        );
        let store = MemoryStore::new();

        let value = invoke(
            &registry,
            &store,
            "make",
            kwargs(json!({"_output_parent_path": PARENT, "_file_name": "f"})),
        )
        .await
        .unwrap();

        assert_eq!(value, Some(PluginValue::Table(table.clone())));
        assert_eq!(store.puts(), vec![format!("{PARENT}/f.csv")]);
        let written = decode(&store, &format!("{PARENT}/f.csv"));
        assert_eq!(written.columns(), table.columns());
    }

    #[tokio::test]
    async fn test_tuple_routed_element_wise() {
        let registry = PluginRegistry::new();
        let first = sample_table(&[1], &["a"]);
        let second = sample_table(&[2, 3], &["b", "c"]);
        let tables = vec![first.clone(), second.clone()];
        registry.register(
            "split",
            move |_| Ok(PluginValue::Tables(tables.clone())),
            DestinationTemplate::new(["x", "y"])
                .output_parent_path(Setting::literal(PARENT))
                .format(Setting::literal("pickle")),
        );
        let store = MemoryStore::new();

        invoke(
            &registry,
            &store,
            "split",
            kwargs(json!({"_x_file_name": ["x1", "x2"], "_y_file_name": ["y1", "y2"]})),
        )
        .await
        .unwrap();

        assert_eq!(store.puts().len(), 4);
        for (name, expected) in [("x1", &first), ("x2", &second), ("y1", &first), ("y2", &second)] {
            let written = decode(&store, &format!("{PARENT}/{name}.pickle"));
            assert_eq!(&written, expected);
        }
    }

    #[tokio::test]
    async fn test_tuple_length_mismatch() {
        let registry = PluginRegistry::new();
        let tables = vec![sample_table(&[1], &["a"]), sample_table(&[2], &["b"])];
        registry.register(
            "split",
            move |_| Ok(PluginValue::Tables(tables.clone())),
            DestinationTemplate::new(["x"]).output_parent_path(Setting::literal(PARENT)),
        );
        let store = MemoryStore::new();

        let err = invoke(
            &registry,
            &store,
            "split",
            kwargs(json!({"_file_name": ["a", "b", "c"]})),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            Error::OutputCountMismatch {
                returned: 2,
                destinations: 3,
                ..
            }
        ));
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_return_shape_and_ignore_error() {
        let registry = PluginRegistry::new();
        registry.register(
            "scalar",
            |_| Ok(PluginValue::Value(json!(42))),
            DestinationTemplate::new(["x"]),
        );
        registry.insert(
            PluginRegistration::new(
                "quiet",
                |_| Err(anyhow::anyhow!("upstream unavailable")),
                DestinationTemplate::new(["x"]),
            )
            .ignore_error(true),
        );
        let store = MemoryStore::new();

        let err = invoke(&registry, &store, "scalar", Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReturnShape { .. }));

        let value = invoke(&registry, &store, "quiet", Kwargs::new()).await.unwrap();
        assert!(value.is_none());

        let err = invoke(&registry, &store, "missing", Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PluginNotFound(_)));
    }

    #[tokio::test]
    async fn test_ignore_error_covers_resolution_and_routing() {
        let registry = PluginRegistry::new();
        let tables = vec![sample_table(&[1], &["a"]), sample_table(&[2], &["b"])];
        registry.insert(
            PluginRegistration::new(
                "pair",
                move |_| Ok(PluginValue::Tables(tables.clone())),
                DestinationTemplate::new(["x"]).output_parent_path(Setting::literal(PARENT)),
            )
            .ignore_error(true),
        );
        let table = sample_table(&[1], &["a"]);
        registry.insert(
            PluginRegistration::new(
                "sheet",
                move |_| Ok(PluginValue::Table(table.clone())),
                DestinationTemplate::new(["x"])
                    .output_parent_path(Setting::literal(PARENT))
                    .file_name(Setting::literal("f"))
                    .format(Setting::literal("xlsx")),
            )
            .ignore_error(true),
        );
        let store = MemoryStore::new();

        // Mistyped keyword fails resolution
        let value = invoke(&registry, &store, "pair", kwargs(json!({"_export": "yes"})))
            .await
            .unwrap();
        assert!(value.is_none());

        // Three destinations for two tables
        let value = invoke(
            &registry,
            &store,
            "pair",
            kwargs(json!({"_file_name": ["a", "b", "c"]})),
        )
        .await
        .unwrap();
        assert!(value.is_none());

        let value = invoke(&registry, &store, "sheet", Kwargs::new()).await.unwrap();
        assert!(value.is_none());
        assert!(store.puts().is_empty());

        // The same routing failure surfaces without ignore_error
        let registration = registry.get("pair").unwrap();
        registry.insert(PluginRegistration {
            ignore_error: false,
            ..(*registration).clone()
        });
        let err = invoke(
            &registry,
            &store,
            "pair",
            kwargs(json!({"_file_name": ["a", "b", "c"]})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::OutputCountMismatch { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reregistration_during_concurrent_invokes() {
        let registry = Arc::new(PluginRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let template = || DestinationTemplate::new(["x"]).output_parent_path(Setting::literal(PARENT));
        let table = |id: i64| sample_table(&[id], &["v"]);

        let first = table(1);
        registry.register("make", move |_| Ok(first.clone().into()), template());

        let mut set = tokio::task::JoinSet::new();
        for i in 0..16 {
            let task_registry = Arc::clone(&registry);
            let store = Arc::clone(&store);
            set.spawn(async move {
                invoke(
                    &task_registry,
                    &store,
                    "make",
                    kwargs(json!({"_file_name": format!("f{i}")})),
                )
                .await
            });
            if i == 8 {
                let second = table(2);
                registry.register("make", move |_| Ok(second.clone().into()), template());
            }
        }

        let mut returned = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined.unwrap().unwrap() {
                Some(PluginValue::Table(table)) => returned.push(table),
                other => panic!("unexpected result {other:?}"),
            }
        }

        assert_eq!(returned.len(), 16);
        assert!(returned.iter().all(|t| *t == table(1) || *t == table(2)));
        assert_eq!(registry.names(), vec!["make"]);
        assert_eq!(store.puts().len(), 16);
        for i in 0..16 {
            let written = decode(&store, &format!("{PARENT}/f{i}.csv"));
            assert_eq!(written.num_rows(), 1);
        }

        let after = invoke(&registry, &store, "make", kwargs(json!({"_file_name": "last"})))
            .await
            .unwrap();
        assert_eq!(after, Some(PluginValue::Table(table(2))));
    }

    #[tokio::test]
    async fn test_declared_parameters_filter_kwargs() {
        let registry = PluginRegistry::new();
        registry.insert(
            PluginRegistration::new(
                "echo",
                |invocation: Invocation| {
                    Ok(PluginValue::Value(serde_json::to_value(&invocation.kwargs)?))
                },
                DestinationTemplate::new(["x"]),
            )
            .parameters(["alpha"])
            .ignore_error(false),
        );
        let store = MemoryStore::new();

        let err = invoke(
            &registry,
            &store,
            "echo",
            kwargs(json!({"alpha": 1, "beta": 2, "_file_name": "f"})),
        )
        .await
        .unwrap_err();

        match err {
            Error::ReturnShape { found, .. } => assert_eq!(found, r#"the value {"alpha":1}"#),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_destination_extension() {
        let registry = PluginRegistry::new();
        let table = sample_table(&[1], &["a"]);
        registry.register(
            "make",
            move |_| Ok(PluginValue::Table(table.clone())),
            DestinationTemplate::new(["x"])
                .output_parent_path(Setting::literal(PARENT))
                .file_name(Setting::literal("f"))
                .format(Setting::literal("xlsx")),
        );
        let err = invoke(&registry, &MemoryStore::new(), "make", Kwargs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let registry = PluginRegistry::new();
        registry.register("a", |_| Ok(json!(1).into()), DestinationTemplate::default());
        registry.register("b", |_| Ok(json!(2).into()), DestinationTemplate::default());
        registry.insert(
            PluginRegistration::new("a", |_| Ok(json!(3).into()), DestinationTemplate::default())
                .ignore_error(true),
        );
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.get("a").unwrap().ignore_error);
    }

    #[test]
    fn test_describe_lists_tagged_keywords() {
        let registry = PluginRegistry::new();
        registry.register(
            "make",
            |_| Ok(json!(null).into()),
            DestinationTemplate::new(["train"]).container(Setting::literal("models")),
        );
        let text = registry.describe("make").unwrap();
        assert!(text.contains("_train_container: container, default: models"));
        assert!(text.contains("_train_format: output format, default: csv"));
        assert!(text.contains("    _file_name: file name"));
        assert!(registry.describe("missing").is_err());
    }

    #[test]
    fn test_default_format() {
        let registration =
            PluginRegistration::new("p", |_| Ok(json!(null).into()), DestinationTemplate::default());
        assert_eq!(registration.default_format().as_deref(), Some("csv"));
    }

    #[test]
    fn test_global_is_shared() {
        let name = "registry-global-test";
        PluginRegistry::global().register(name, |_| Ok(json!(null).into()), DestinationTemplate::default());
        assert!(PluginRegistry::global().get(name).is_some());
    }
}
