//! Whole-file decode: bootstrap to live fieldsets.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use super::format::*;
use super::paths::{build_node_hierarchy, build_paths, read_path_arrays, Node};
use super::stream::{CrateBuffer, StreamReader};
use super::tables::*;
use super::toc::{read_bootstrap, read_toc, require_section};
use super::unpack::{UnpackTables, ValueUnpacker};
use super::value::CrateValue;
use crate::core::Path;
use crate::util::{DecodeConfig, Diagnostics, Error, MemoryBudget, Result};

/// Ordered `(name, value)` pairs of one fieldset.
pub type LiveFieldSet = Vec<(String, CrateValue)>;

/// One-shot decoder over an immutable file buffer.
///
/// # Example
/// ```ignore
/// let bytes = std::fs::read("scene.usdc")?;
/// let data = CrateReader::new(&bytes, DecodeConfig::default()).decode()?;
/// for spec in data.specs() {
///     println!("{} {}", data.path(spec.path_index).unwrap(), spec.spec_type);
/// }
/// ```
pub struct CrateReader<'a> {
    data: &'a [u8],
    config: DecodeConfig,
    budget: MemoryBudget,
    diag: Diagnostics,
}

impl<'a> CrateReader<'a> {
    /// Create a reader over `data` with the given limits.
    pub fn new(data: &'a [u8], config: DecodeConfig) -> Self {
        let budget = MemoryBudget::new(config.max_memory_budget);
        Self { data, config, budget, diag: Diagnostics::new() }
    }

    /// Decode every table and unpack every field.
    ///
    /// The first error aborts the decode and discards all partial state.
    #[tracing::instrument(level = "debug", skip_all, fields(size = self.data.len()))]
    pub fn decode(mut self) -> Result<CrateData> {
        if self.config.num_threads > 1 {
            tracing::debug!(num_threads = self.config.num_threads, "decoding sequentially");
        }

        let mut r = StreamReader::new(self.data);
        let (version, toc_offset) = read_bootstrap(&mut r)?;
        tracing::debug!(%version, toc_offset, "bootstrap");

        let toc = read_toc(&mut r, toc_offset, &self.config, &mut self.budget, &mut self.diag)?;

        let tokens = read_tokens(&mut self.section(&toc, TOKENS_SECTION)?, &self.config, &mut self.budget)?;
        let strings = read_strings(
            &mut self.section(&toc, STRINGS_SECTION)?,
            tokens.len(),
            &self.config,
            &mut self.budget,
        )?;
        let fields = read_fields(
            &mut self.section(&toc, FIELDS_SECTION)?,
            tokens.len(),
            &self.config,
            &mut self.budget,
        )?;
        let fieldsets = read_fieldsets(
            &mut self.section(&toc, FIELDSETS_SECTION)?,
            fields.len(),
            &self.config,
            &mut self.budget,
        )?;
        let groups = split_fieldsets(&fieldsets)?;

        let arrays = read_path_arrays(&mut self.section(&toc, PATHS_SECTION)?, &self.config, &mut self.budget)?;
        let paths = build_paths(&arrays, &tokens, &self.config, &mut self.budget)?;
        let nodes = build_node_hierarchy(&arrays, &paths, &tokens, &self.config, &mut self.budget)?;

        let specs = read_specs(
            &mut self.section(&toc, SPECS_SECTION)?,
            paths.len(),
            &groups,
            &self.config,
            &mut self.budget,
        )?;

        let tables = UnpackTables { version, tokens: &tokens, strings: &strings, paths: &paths };
        let live_fieldsets = self.build_live_fieldsets(tables, &fields, &fieldsets, &groups)?;

        tracing::info!(
            %version,
            tokens = tokens.len(),
            paths = paths.len(),
            specs = specs.len(),
            memory = self.budget.used(),
            "decoded crate"
        );

        Ok(CrateData {
            version,
            toc,
            tokens,
            strings,
            fields,
            fieldsets,
            paths,
            nodes,
            specs,
            live_fieldsets,
            memory_used: self.budget.used(),
            warnings: self.diag.into_warnings(),
        })
    }

    /// Reader bounded to one known section.
    fn section(&self, toc: &TableOfContents, name: &str) -> Result<StreamReader<'a>> {
        let range = require_section(toc, name)?.range();
        let bytes = self
            .data
            .get(range.start as usize..range.end as usize)
            .ok_or_else(|| Error::SectionBounds(format!("section '{name}' {range:?} outside file")))?;
        Ok(StreamReader::new(bytes))
    }

    /// Unpack the fields of every fieldset group, keyed by group start.
    fn build_live_fieldsets(
        &mut self,
        tables: UnpackTables<'_>,
        fields: &[Field],
        fieldsets: &[FieldIndex],
        groups: &[(FieldSetIndex, std::ops::Range<usize>)],
    ) -> Result<BTreeMap<FieldSetIndex, LiveFieldSet>> {
        let mut unpacker = ValueUnpacker::new(self.data, tables, &self.config, &mut self.budget, &mut self.diag);
        let mut live = BTreeMap::new();

        for (start, range) in groups {
            unpacker.budget().reserve::<(String, CrateValue)>("live fieldset", range.len())?;
            let mut set = LiveFieldSet::with_capacity(range.len());
            for field_index in &fieldsets[range.clone()] {
                let field = fields.get(field_index.get()).ok_or_else(|| {
                    Error::invalid(format!("{field_index:?} out of range ({} fields)", fields.len()))
                })?;
                let name = unpacker.token(field.token_index)?;
                let value = unpacker.unpack(field.value_rep).map_err(|e| {
                    tracing::debug!(field = %name, rep = ?field.value_rep, "unpack failed");
                    e
                })?;
                tracing::trace!(field = %name, ty = %value.type_name(), "field");
                set.push((name, value));
            }
            live.insert(*start, set);
        }

        tracing::debug!(fieldsets = live.len(), "built live fieldsets");
        Ok(live)
    }
}

/// Fully decoded contents of one Crate file.
///
/// Owns every table; nothing borrows the source buffer.
#[derive(Debug, Clone)]
pub struct CrateData {
    version: CrateVersion,
    toc: TableOfContents,
    tokens: Vec<String>,
    strings: Vec<TokenIndex>,
    fields: Vec<Field>,
    fieldsets: Vec<FieldIndex>,
    paths: Vec<Path>,
    nodes: Vec<Node>,
    specs: Vec<Spec>,
    live_fieldsets: BTreeMap<FieldSetIndex, LiveFieldSet>,
    memory_used: usize,
    warnings: Vec<String>,
}

impl CrateData {
    /// Open and decode a file with default limits.
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        Self::open_with(path, DecodeConfig::default())
    }

    /// Open and decode a file with the given limits.
    pub fn open_with(path: impl AsRef<FsPath>, config: DecodeConfig) -> Result<Self> {
        let path = path.as_ref();
        let buffer = CrateBuffer::open(path)?;
        tracing::debug!(path = %path.display(), size = buffer.len(), mapped = buffer.is_mapped(), "opened");
        CrateReader::new(buffer.as_bytes(), config).decode()
    }

    /// Decode an in-memory buffer.
    pub fn from_bytes(bytes: &[u8], config: DecodeConfig) -> Result<Self> {
        CrateReader::new(bytes, config).decode()
    }

    pub fn version(&self) -> CrateVersion {
        self.version
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn strings(&self) -> &[TokenIndex] {
        &self.strings
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Flat, sentinel separated fieldset table.
    pub fn fieldsets(&self) -> &[FieldIndex] {
        &self.fieldsets
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    /// Unpacked fieldsets keyed by the index of their first entry.
    pub fn live_fieldsets(&self) -> &BTreeMap<FieldSetIndex, LiveFieldSet> {
        &self.live_fieldsets
    }

    /// Warnings raised while decoding.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Bytes charged against the memory budget.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Path at `index`.
    pub fn path(&self, index: PathIndex) -> Option<&Path> {
        self.paths.get(index.get())
    }

    /// Node at `index`.
    pub fn node(&self, index: PathIndex) -> Option<&Node> {
        self.nodes.get(index.get())
    }

    /// Index of the root node, if the file has one.
    pub fn root(&self) -> Option<PathIndex> {
        self.nodes
            .iter()
            .position(|n| n.parent == super::paths::NodeParent::Root)
            .map(|i| PathIndex(i as u32))
    }

    /// Unpacked fields of `spec`.
    pub fn fields_for_spec(&self, spec: &Spec) -> Option<&[(String, CrateValue)]> {
        self.live_fieldsets.get(&spec.fieldset_index).map(Vec::as_slice)
    }

    /// Spec whose path prints as `path`.
    pub fn spec_at_path(&self, path: &str) -> Option<&Spec> {
        self.specs
            .iter()
            .find(|s| self.path(s.path_index).is_some_and(|p| p.to_string() == path))
    }

    /// Value of the field `name` on the spec at `path`.
    pub fn field(&self, path: &str, name: &str) -> Option<&CrateValue> {
        let spec = self.spec_at_path(path)?;
        self.fields_for_spec(spec)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}
