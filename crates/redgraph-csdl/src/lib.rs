//! CSDL (OData EDMX) schema documents for Redgraph.
//!
//! The DMTF Redfish schema bundle is a tree of CSDL XML documents. Each
//! document declares:
//!
//! - `edmx:Reference`/`edmx:Include` edges mapping a namespace name to the
//!   schema file that defines it, and
//! - `edm:Schema` blocks whose entity types carry `edm:NavigationProperty`
//!   links to other resource types (or to collections of them).
//!
//! This crate parses a single document into [`SchemaDocument`] and provides a
//! [`SchemaSource`] capability for loading documents by file name from a
//! local schema directory tree. It does *not* interpret the graph; the walk
//! lives in `redgraph-collections`.

pub mod parse;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use parse::parse_document;

// ============================================================================
// Document model
// ============================================================================

/// One `edmx:Include` edge: a namespace name and the file that defines it.
///
/// References are scoped to the document that declares them; they are rebuilt
/// fresh for every document load and never merged across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub namespace: String,
    pub file: String,
}

/// A navigation link declared on an entity type.
///
/// `target_type` is the raw `Type` attribute, preserved verbatim so that
/// classification sees exactly what the schema declared (including OData
/// `Collection(...)` spellings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationProperty {
    pub name: String,
    pub target_type: String,
}

impl NavigationProperty {
    /// The segment of the target type before the first `.`.
    ///
    /// The Redfish vocabulary names the defining namespace after the type
    /// itself (`ChassisCollection.ChassisCollection`), so this segment doubles
    /// as both the local type name and the namespace lookup key.
    pub fn target_root(&self) -> &str {
        self.target_type
            .split('.')
            .next()
            .unwrap_or(&self.target_type)
    }
}

/// Navigation properties grouped under one `edm:Schema` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaBlock {
    pub namespace: String,
    pub nav_props: Vec<NavigationProperty>,
}

/// A parsed CSDL document: its reference table and its schema blocks, both in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaDocument {
    pub references: Vec<SchemaReference>,
    pub schemas: Vec<SchemaBlock>,
}

impl SchemaDocument {
    /// Resolve a namespace to the file that defines it, scoped to this
    /// document's reference table only.
    ///
    /// When the same namespace is declared by more than one `Include`, the
    /// later declaration wins. Output stability depends on this.
    pub fn resolve(&self, namespace: &str) -> Option<&str> {
        self.references
            .iter()
            .rev()
            .find(|r| r.namespace == namespace)
            .map(|r| r.file.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchemaLoadError {
    #[error("schema file not found: {file}")]
    NotFound { file: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed schema document: {message}")]
    Malformed { message: String },
}

// ============================================================================
// Loading
// ============================================================================

/// Document-loading capability consumed by the graph walk.
///
/// `file` is a bare schema file name (`ServiceRoot_v1.xml`), the same key the
/// reference tables use. Load failures are fatal to a generation run; no
/// partial document is ever returned.
pub trait SchemaSource {
    fn load(&self, file: &str) -> Result<SchemaDocument, SchemaLoadError>;
}

/// Serves schema documents from a local directory tree.
///
/// The tree is scanned once up front and `.xml` files are indexed by bare
/// file name, so nested layouts (as left behind by the schema fetch step)
/// resolve the same as flat ones. When two files share a name the later one
/// in walk order wins.
#[derive(Debug)]
pub struct DirectorySource {
    index: HashMap<String, PathBuf>,
}

impl DirectorySource {
    pub fn new(root: &Path) -> Result<Self, SchemaLoadError> {
        let mut index = HashMap::new();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".xml") {
                continue;
            }
            index.insert(name, entry.into_path());
        }
        Ok(Self { index })
    }

    /// Number of schema files indexed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl SchemaSource for DirectorySource {
    fn load(&self, file: &str) -> Result<SchemaDocument, SchemaLoadError> {
        let path = self
            .index
            .get(file)
            .ok_or_else(|| SchemaLoadError::NotFound {
                file: file.to_string(),
            })?;
        let text = fs::read_to_string(path)?;
        parse_document(&text)
    }
}
