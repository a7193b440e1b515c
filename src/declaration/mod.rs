//! Dependency declaration documents
//!
//! Declarations are entries of TOML arrays of tables. The comment block above
//! an entry's `[[...]]` header carries its upgrade directive, and comments
//! inside the `patches` array belong to the reference that follows them:
//!
//! ```toml
//! # releaser:upgrade-dep golang tools
//! [[http_archive]]
//! name = "org_golang_x_tools"
//! sha256 = "..."
//! strip_prefix = "tools-0.1.0"
//! # v0.1.0, latest as of 2024-01-01
//! urls = [
//!     "https://mirror.bazel.build/github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
//!     "https://github.com/golang/tools/archive/refs/tags/v0.1.0.zip",
//! ]
//! patches = [
//!     # releaser:patch-cmd gazelle -repo_root .
//!     "//third_party:org_golang_x_tools-gazelle.patch",
//! ]
//! ```
//!
//! [`DeclarationSet`] owns every parsed document and a name index over them.
//! Tasks only ever see [`DependencyDeclaration`] snapshots; documents are
//! mutated by [`DeclarationSet::apply`] after a batch has fully succeeded,
//! and written back with [`DeclarationSet::write_all`]. Formatting outside
//! the edited keys is preserved.

pub mod directive;
pub mod update;

pub use directive::{UpgradeDirective, parse_patch_command, parse_upgrade_directive};
pub use update::ResolvedAttributes;

use crate::config::DeclarationSource;
use crate::core::DepbumpError;
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml_edit::{ArrayOfTables, DocumentMut, Item, Table, Value};
use tracing::warn;

/// One reference in a `patches` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchItem {
    pub label: String,
    /// Comment lines directly above the reference, without `#`
    pub comments: Vec<String>,
}

/// State of the `patches` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchesAttr {
    Absent,
    List(Vec<PatchItem>),
    /// Present but not a list of strings
    NotAList,
}

/// Value snapshot of a single declaration, owned by its upgrade task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub name: String,
    /// Comment lines above the declaration header, without `#`
    pub comments: Vec<String>,
    pub patches: PatchesAttr,
}

impl DependencyDeclaration {
    /// Parses the upgrade directive out of the declaration's comments.
    pub fn directive(&self) -> Result<UpgradeDirective, DepbumpError> {
        parse_upgrade_directive(&self.comments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclarationRef {
    file: usize,
    section: String,
    position: usize,
}

/// A parsed declaration file.
#[derive(Debug)]
pub struct DeclarationFile {
    path: PathBuf,
    section: Option<String>,
    document: DocumentMut,
    dirty: bool,
}

impl DeclarationFile {
    /// Parses `content` read from `path`.
    pub fn parse(path: impl Into<PathBuf>, section: Option<String>, content: &str) -> Result<Self> {
        let path = path.into();
        let document: DocumentMut = content
            .parse()
            .with_context(|| format!("Failed to parse declarations in {}", path.display()))?;
        Ok(Self {
            path,
            section,
            document,
            dirty: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document text, including any applied updates.
    #[must_use]
    pub fn render(&self) -> String {
        self.document.to_string()
    }

    /// Arrays of tables that may contain declarations, with their key.
    fn sections(&self) -> impl Iterator<Item = (&str, &ArrayOfTables)> {
        self.document.iter().filter_map(move |(key, item)| {
            let aot = item.as_array_of_tables()?;
            match &self.section {
                Some(section) if section != key => None,
                _ => Some((key, aot)),
            }
        })
    }

    fn table_mut(&mut self, section: &str, position: usize) -> Option<&mut Table> {
        self.document
            .get_mut(section)
            .and_then(Item::as_array_of_tables_mut)
            .and_then(|aot| aot.get_mut(position))
    }
}

/// Every declaration file of a repository, indexed by dependency name.
#[derive(Debug)]
pub struct DeclarationSet {
    files: Vec<DeclarationFile>,
    index: BTreeMap<String, DeclarationRef>,
}

impl DeclarationSet {
    /// Reads and indexes the configured declaration files under `root`.
    ///
    /// # Errors
    ///
    /// Fails if a file cannot be read or is not valid TOML.
    pub async fn load(root: &Path, sources: &[DeclarationSource]) -> Result<Self> {
        let mut files = Vec::with_capacity(sources.len());
        for source in sources {
            let path = root.join(&source.path);
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            files.push(DeclarationFile::parse(path, source.section.clone(), &content)?);
        }
        Ok(Self::from_files(files))
    }

    /// Builds the name index over already parsed files.
    ///
    /// Entries without a string `name` are ignored. When a name repeats, the
    /// later declaration wins.
    #[must_use]
    pub fn from_files(files: Vec<DeclarationFile>) -> Self {
        let mut index = BTreeMap::new();
        for (file_idx, file) in files.iter().enumerate() {
            for (section, aot) in file.sections() {
                for (position, table) in aot.iter().enumerate() {
                    let Some(name) = table.get("name").and_then(Item::as_str) else {
                        continue;
                    };
                    let entry = DeclarationRef {
                        file: file_idx,
                        section: section.to_string(),
                        position,
                    };
                    if index.insert(name.to_string(), entry).is_some() {
                        warn!("Dependency {} is declared more than once; using {}", name, file.path.display());
                    }
                }
            }
        }
        Self {
            files,
            index,
        }
    }

    /// Indexed dependency names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn files(&self) -> &[DeclarationFile] {
        &self.files
    }

    /// Takes a value snapshot of the declaration called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<DependencyDeclaration> {
        let entry = self.index.get(name)?;
        let table = self.files[entry.file]
            .document
            .get(&entry.section)
            .and_then(Item::as_array_of_tables)
            .and_then(|aot| aot.get(entry.position))?;

        let comments = table
            .decor()
            .prefix()
            .and_then(|prefix| prefix.as_str())
            .map(directive::comment_lines)
            .unwrap_or_default();

        Some(DependencyDeclaration {
            name: name.to_string(),
            comments,
            patches: read_patches(table),
        })
    }

    /// Up to three indexed names close to `name`, closest first.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Vec<String> {
        let mut scored: Vec<(usize, &str)> = self
            .names()
            .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
            .filter(|(distance, candidate)| *distance <= 3_usize.max(candidate.len() / 3))
            .collect();
        scored.sort();
        scored.into_iter().take(3).map(|(_, candidate)| candidate.to_string()).collect()
    }

    /// Writes resolved attributes into the in-memory document.
    pub fn apply(&mut self, attrs: &ResolvedAttributes) -> Result<()> {
        let entry = self.index.get(&attrs.name).cloned().ok_or_else(|| {
            DepbumpError::DependencyNotFound {
                name: attrs.name.clone(),
                suggestions: Vec::new(),
            }
        })?;
        let file = &mut self.files[entry.file];
        let table = file.table_mut(&entry.section, entry.position).ok_or_else(|| {
            DepbumpError::DependencyNotFound {
                name: attrs.name.clone(),
                suggestions: Vec::new(),
            }
        })?;
        update::apply(table, attrs);
        file.dirty = true;
        Ok(())
    }

    /// Writes every modified document back to its file.
    ///
    /// # Errors
    ///
    /// [`DepbumpError::WriteFailed`] for the first file that cannot be written.
    pub fn write_all(&mut self) -> Result<()> {
        for file in self.files.iter_mut().filter(|f| f.dirty) {
            atomic_write(&file.path, file.document.to_string().as_bytes()).map_err(|e| {
                DepbumpError::WriteFailed {
                    path: file.path.display().to_string(),
                    reason: format!("{e:#}"),
                }
            })?;
            file.dirty = false;
        }
        Ok(())
    }
}

fn read_patches(table: &Table) -> PatchesAttr {
    let Some(item) = table.get("patches") else {
        return PatchesAttr::Absent;
    };
    let Some(array) = item.as_array() else {
        return PatchesAttr::NotAList;
    };

    let mut patches = Vec::with_capacity(array.len());
    for value in array.iter() {
        let Value::String(label) = value else {
            return PatchesAttr::NotAList;
        };
        let comments = value
            .decor()
            .prefix()
            .and_then(|prefix| prefix.as_str())
            .map(directive::comment_lines)
            .unwrap_or_default();
        patches.push(PatchItem {
            label: label.value().clone(),
            comments,
        });
    }
    PatchesAttr::List(patches)
}
