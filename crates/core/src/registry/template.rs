//! Destination templates and their per-invocation resolution

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::path::{ResourcePath, StorageKind, StorageSite, decode_path};

/// Keyword arguments of a plugin invocation
pub type Kwargs = BTreeMap<String, Value>;

/// A template field: one literal, a value per output tag, or nothing
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Setting<T> {
    #[default]
    Absent,
    Literal(T),
    PerTag(BTreeMap<String, T>),
}

impl<T: Clone> Setting<T> {
    pub fn literal(value: impl Into<T>) -> Self {
        Setting::Literal(value.into())
    }

    pub fn per_tag<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<T>,
    {
        Setting::PerTag(
            entries
                .into_iter()
                .map(|(tag, value)| (tag.into(), value.into()))
                .collect(),
        )
    }

    /// Template value for `tag`
    pub fn for_tag(&self, tag: &str) -> Option<T> {
        match self {
            Setting::Absent => None,
            Setting::Literal(value) => Some(value.clone()),
            Setting::PerTag(values) => values.get(tag).cloned(),
        }
    }
}

/// One file name or a list of them
#[derive(Debug, Clone, PartialEq)]
pub enum FileNames {
    One(String),
    Many(Vec<String>),
}

impl FileNames {
    pub fn names(&self) -> Vec<String> {
        match self {
            FileNames::One(name) => vec![name.clone()],
            FileNames::Many(names) => names.clone(),
        }
    }
}

impl From<&str> for FileNames {
    fn from(name: &str) -> Self {
        FileNames::One(name.to_string())
    }
}

impl From<String> for FileNames {
    fn from(name: String) -> Self {
        FileNames::One(name)
    }
}

impl<S: Into<String>> From<Vec<S>> for FileNames {
    fn from(names: Vec<S>) -> Self {
        FileNames::Many(names.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FileNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNames::One(name) => f.write_str(name),
            FileNames::Many(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

/// Destination field that keyword arguments can override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StorageAccount,
    StorageKind,
    Container,
    Key,
    OutputParentPath,
    FileNamePrefix,
    FileName,
    FileNameSuffix,
    Export,
    Format,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::StorageAccount,
        Field::StorageKind,
        Field::Container,
        Field::Key,
        Field::OutputParentPath,
        Field::FileNamePrefix,
        Field::FileName,
        Field::FileNameSuffix,
        Field::Export,
        Field::Format,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Field::StorageAccount => "storage_account",
            Field::StorageKind => "storage_kind",
            Field::Container => "container",
            Field::Key => "key",
            Field::OutputParentPath => "output_parent_path",
            Field::FileNamePrefix => "file_name_prefix",
            Field::FileName => "file_name",
            Field::FileNameSuffix => "file_name_suffix",
            Field::Export => "export",
            Field::Format => "format",
        }
    }

    /// `_{field}`, applies to every tag
    pub fn keyword(self) -> String {
        format!("_{}", self.name())
    }

    /// `_{tag}_{field}`, applies to one tag
    pub fn tagged_keyword(self, tag: &str) -> String {
        format!("_{tag}_{}", self.name())
    }

    pub const fn description(self) -> &'static str {
        match self {
            Field::StorageAccount => "storage account",
            Field::StorageKind => "storage kind (blob, dfs or queue)",
            Field::Container => "container",
            Field::Key => "key prefix below the container",
            Field::OutputParentPath => "output parent path, replaces account and container",
            Field::FileNamePrefix => "file name prefix",
            Field::FileName => "file name, or a list of file names",
            Field::FileNameSuffix => "file name suffix",
            Field::Export => "whether to write the output",
            Field::Format => "output format",
        }
    }
}

/// Where a plugin's outputs go, before keyword overrides
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationTemplate {
    /// Output groups; a template without tags resolves no destinations
    pub tags: Vec<String>,
    pub storage_account: Setting<String>,
    pub storage_kind: Setting<StorageKind>,
    pub container: Setting<String>,
    pub key: Setting<String>,
    pub output_parent_path: Setting<String>,
    pub file_name_prefix: Setting<String>,
    pub file_name: Setting<FileNames>,
    pub file_name_suffix: Setting<String>,
    pub export: Setting<bool>,
    pub format: Setting<String>,
}

impl Default for DestinationTemplate {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            storage_account: Setting::Absent,
            storage_kind: Setting::Literal(StorageKind::Flat),
            container: Setting::Absent,
            key: Setting::Absent,
            output_parent_path: Setting::Absent,
            file_name_prefix: Setting::Absent,
            file_name: Setting::Absent,
            file_name_suffix: Setting::Absent,
            export: Setting::Literal(true),
            format: Setting::Literal("csv".to_string()),
        }
    }
}

impl DestinationTemplate {
    pub fn new<S: Into<String>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn storage_account(mut self, setting: Setting<String>) -> Self {
        self.storage_account = setting;
        self
    }

    pub fn storage_kind(mut self, setting: Setting<StorageKind>) -> Self {
        self.storage_kind = setting;
        self
    }

    pub fn container(mut self, setting: Setting<String>) -> Self {
        self.container = setting;
        self
    }

    pub fn key(mut self, setting: Setting<String>) -> Self {
        self.key = setting;
        self
    }

    pub fn output_parent_path(mut self, setting: Setting<String>) -> Self {
        self.output_parent_path = setting;
        self
    }

    pub fn file_name_prefix(mut self, setting: Setting<String>) -> Self {
        self.file_name_prefix = setting;
        self
    }

    pub fn file_name(mut self, setting: Setting<FileNames>) -> Self {
        self.file_name = setting;
        self
    }

    pub fn file_name_suffix(mut self, setting: Setting<String>) -> Self {
        self.file_name_suffix = setting;
        self
    }

    pub fn export(mut self, setting: Setting<bool>) -> Self {
        self.export = setting;
        self
    }

    pub fn format(mut self, setting: Setting<String>) -> Self {
        self.format = setting;
        self
    }

    /// Template value of a field for a tag, rendered for display
    pub(crate) fn display_value(&self, field: Field, tag: &str) -> Option<String> {
        fn show<T: fmt::Display + Clone>(setting: &Setting<T>, tag: &str) -> Option<String> {
            setting.for_tag(tag).map(|value| value.to_string())
        }
        match field {
            Field::StorageAccount => show(&self.storage_account, tag),
            Field::StorageKind => show(&self.storage_kind, tag),
            Field::Container => show(&self.container, tag),
            Field::Key => show(&self.key, tag),
            Field::OutputParentPath => show(&self.output_parent_path, tag),
            Field::FileNamePrefix => show(&self.file_name_prefix, tag),
            Field::FileName => show(&self.file_name, tag),
            Field::FileNameSuffix => show(&self.file_name_suffix, tag),
            Field::Export => show(&self.export, tag),
            Field::Format => show(&self.format, tag),
        }
    }
}

/// Resolved output paths of one tag
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub tag: String,
    pub paths: Vec<ResourcePath>,
}

/// Destination-control keywords of one invocation, split off from the rest
///
/// Built once per invocation and only read afterwards.
#[derive(Debug)]
pub struct ResolutionRequest<'a> {
    template: &'a DestinationTemplate,
    overrides: Kwargs,
}

impl<'a> ResolutionRequest<'a> {
    /// Take the destination-control keywords out of `kwargs`
    ///
    /// Returns the request and the keywords left for the function.
    pub fn split(template: &'a DestinationTemplate, kwargs: Kwargs) -> (Self, Kwargs) {
        let (overrides, remaining): (Kwargs, Kwargs) = kwargs
            .into_iter()
            .partition(|(keyword, _)| is_control_keyword(template, keyword));
        (
            Self {
                template,
                overrides,
            },
            remaining,
        )
    }

    /// Resolve every tag of the template
    pub fn resolve(&self, site: &StorageSite) -> Result<Vec<Destination>> {
        let mut destinations = Vec::new();
        for tag in &self.template.tags {
            if let Some(destination) = self.resolve_tag(tag, site)? {
                destinations.push(destination);
            }
        }
        Ok(destinations)
    }

    fn resolve_tag(&self, tag: &str, site: &StorageSite) -> Result<Option<Destination>> {
        let template = self.template;
        if !self
            .flag(tag, Field::Export, &template.export)?
            .unwrap_or(false)
        {
            return Ok(None);
        }
        let Some(file_names) = self.file_names(tag)? else {
            return Ok(None);
        };

        let prefix = self
            .string(tag, Field::FileNamePrefix, &template.file_name_prefix)?
            .unwrap_or_default();
        let suffix = self
            .string(tag, Field::FileNameSuffix, &template.file_name_suffix)?
            .unwrap_or_default();
        let format = self
            .string(tag, Field::Format, &template.format)?
            .ok_or_else(|| Error::InvalidInput(format!("No output format for tag '{tag}'")))?;
        let key = self.string(tag, Field::Key, &template.key)?;

        let parent = match self.string(tag, Field::OutputParentPath, &template.output_parent_path)? {
            Some(parent) => parent.trim_end_matches('/').to_string(),
            None => {
                let account = self.string(tag, Field::StorageAccount, &template.storage_account)?;
                let kind = self.storage_kind(tag)?;
                let container = self.string(tag, Field::Container, &template.container)?;
                match (account, kind, container) {
                    (Some(account), Some(kind), Some(container)) => {
                        format!("{}/{container}", site.service_root(&account, kind))
                    }
                    _ => return Ok(None),
                }
            }
        };
        let parent = match key {
            Some(key) => format!("{parent}/{key}"),
            None => parent,
        };

        let paths = file_names
            .names()
            .iter()
            .map(|name| decode_path(&format!("{parent}/{prefix}{name}{suffix}.{format}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Destination {
            tag: tag.to_string(),
            paths,
        }))
    }

    fn lookup(&self, tag: &str, field: Field) -> Option<(String, &Value)> {
        [field.tagged_keyword(tag), field.keyword()]
            .into_iter()
            .find_map(|keyword| {
                self.overrides
                    .get(&keyword)
                    .filter(|value| !value.is_null())
                    .map(|value| (keyword, value))
            })
    }

    fn string(&self, tag: &str, field: Field, setting: &Setting<String>) -> Result<Option<String>> {
        match self.lookup(tag, field) {
            Some((_, Value::String(value))) => Ok(Some(value.clone())),
            Some((keyword, other)) => Err(expected(&keyword, "a string", other)),
            None => Ok(setting.for_tag(tag)),
        }
    }

    fn flag(&self, tag: &str, field: Field, setting: &Setting<bool>) -> Result<Option<bool>> {
        match self.lookup(tag, field) {
            Some((_, Value::Bool(value))) => Ok(Some(*value)),
            Some((keyword, other)) => Err(expected(&keyword, "a boolean", other)),
            None => Ok(setting.for_tag(tag)),
        }
    }

    fn storage_kind(&self, tag: &str) -> Result<Option<StorageKind>> {
        match self.lookup(tag, Field::StorageKind) {
            Some((_, Value::String(label))) => label.parse().map(Some),
            Some((keyword, other)) => Err(expected(&keyword, "a storage kind", other)),
            None => Ok(self.template.storage_kind.for_tag(tag)),
        }
    }

    fn file_names(&self, tag: &str) -> Result<Option<FileNames>> {
        match self.lookup(tag, Field::FileName) {
            Some((_, Value::String(name))) => Ok(Some(FileNames::One(name.clone()))),
            Some((keyword, Value::Array(items))) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| expected(&keyword, "a list of strings", item))
                })
                .collect::<Result<Vec<_>>>()
                .map(|names| Some(FileNames::Many(names))),
            Some((keyword, other)) => Err(expected(&keyword, "a string or a list of strings", other)),
            None => Ok(self.template.file_name.for_tag(tag)),
        }
    }
}

fn is_control_keyword(template: &DestinationTemplate, keyword: &str) -> bool {
    Field::ALL.iter().any(|field| {
        keyword == field.keyword()
            || template
                .tags
                .iter()
                .any(|tag| keyword == field.tagged_keyword(tag))
    })
}

fn expected(keyword: &str, kind: &str, found: &Value) -> Error {
    Error::InvalidInput(format!("Keyword `{keyword}` expects {kind}, got {found}"))
}
