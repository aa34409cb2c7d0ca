//! Top-level collection discovery over the Redfish schema graph.
//!
//! The resource-aggregation layer needs two lookup tables derived from the
//! DMTF schema bundle:
//!
//! - the set of URIs that are top-level resource collections, and
//! - a map from every ancestor URI to the descendant URIs that eventually
//!   lead to a top-level collection.
//!
//! Both are discovered by a single depth-first walk from the service root
//! document. Per document, each navigation property is classified either as a
//! collection reference (a leaf of the walk) or an entity reference (recurse
//! into the document defining the target type). The walk is path-keyed: a
//! schema type reused under two different paths is visited once per path, so
//! the catalog stays keyed by URI rather than by type.
//!
//! Why two structures instead of one:
//!
//! - direct lookup of top-level collections is needed for prefix handling;
//! - a top-level collection is not always one level below the service root,
//!   so ancestors must be linkable even when the local service does not
//!   implement the intermediate resource itself.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use redgraph_csdl::{SchemaLoadError, SchemaSource};

/// Service root URI the DMTF bundle hangs off.
pub const SERVICE_ROOT_PATH: &str = "/redfish/v1";
/// Schema document describing the service root.
pub const SERVICE_ROOT_FILE: &str = "ServiceRoot_v1.xml";

// ============================================================================
// Catalog
// ============================================================================

/// The two lookup tables, built incrementally by one traversal and then read
/// only.
///
/// BTree containers make sorted iteration the natural order, so repeated runs
/// over an unchanged schema tree export byte-identically without a separate
/// sort pass.
///
/// Invariant: every `collection_parents` key has a non-empty value set, and
/// every path in a value set is either a member of `top_collections` or
/// itself a `collection_parents` key (it leads further down to a collection).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectionCatalog {
    pub top_collections: BTreeSet<String>,
    pub collection_parents: BTreeMap<String, BTreeSet<String>>,
}

impl CollectionCatalog {
    pub fn is_empty(&self) -> bool {
        self.top_collections.is_empty() && self.collection_parents.is_empty()
    }

    /// Fully sorted export form for the emitter.
    pub fn export(&self) -> CatalogExportV1 {
        CatalogExportV1 {
            version: CATALOG_VERSION_V1,
            top_collections: self.top_collections.iter().cloned().collect(),
            collection_parents: self
                .collection_parents
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
        }
    }
}

pub const CATALOG_VERSION_V1: u32 = 1;

/// Serialized catalog (schema `CatalogExportV1`).
///
/// Deliberately carries no timestamp: the artifact must be byte-identical
/// across runs over an unchanged schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogExportV1 {
    pub version: u32,
    pub top_collections: Vec<String>,
    pub collection_parents: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// Errors
// ============================================================================

/// All walk failures are fatal: the run either produces a complete,
/// consistent catalog or nothing. The aggregation layer compiles the emitted
/// artifact in, so a partial catalog would silently drop resources.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error(transparent)]
    Load(#[from] SchemaLoadError),
    #[error("namespace `{namespace}` is not referenced by {file}")]
    UnresolvedNamespace { namespace: String, file: String },
    #[error("schema reference cycle: {file} revisited under {path}")]
    Cycle { file: String, path: String },
}

// ============================================================================
// Classification
// ============================================================================

/// The schema vocabulary's own naming convention for homogeneous list
/// resources: the type's local name starts *or* ends with `Collection`.
///
/// Both checks are intentional. The prefix check also catches OData
/// `Collection(...)` spellings of the Type attribute, and a name that is
/// exactly `Collection` satisfies both.
pub fn is_collection_type(target_root: &str) -> bool {
    target_root.starts_with("Collection") || target_root.ends_with("Collection")
}

// ============================================================================
// Walker
// ============================================================================

/// Depth-first walker over the schema graph.
///
/// Holds the catalog being built and the chain of schema files on the current
/// branch (the cycle guard). Single-threaded and synchronous; one walker, one
/// catalog.
pub struct CollectionWalker<'a, S: SchemaSource> {
    source: &'a S,
    catalog: CollectionCatalog,
    branch: Vec<String>,
}

impl<'a, S: SchemaSource> CollectionWalker<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            catalog: CollectionCatalog::default(),
            branch: Vec::new(),
        }
    }

    pub fn into_catalog(self) -> CollectionCatalog {
        self.catalog
    }

    /// Visit `file` under `path`; returns whether the subtree contains a
    /// collection.
    ///
    /// The cycle guard is keyed by schema file, not by path: paths grow
    /// strictly per level, so a path-keyed guard could never trip. The file
    /// is pushed for the duration of its subtree only, so a type shared by
    /// two sibling branches is still visited once per branch (the catalog is
    /// path-keyed by design).
    pub fn walk(&mut self, path: &str, file: &str) -> Result<bool, WalkError> {
        if self.branch.iter().any(|f| f == file) {
            return Err(WalkError::Cycle {
                file: file.to_string(),
                path: path.to_string(),
            });
        }
        self.branch.push(file.to_string());
        let result = self.walk_document(path, file);
        self.branch.pop();
        result
    }

    fn walk_document(&mut self, path: &str, file: &str) -> Result<bool, WalkError> {
        let doc = self.source.load(file)?;

        let mut local: BTreeSet<String> = BTreeSet::new();
        let mut found_collection = false;

        for block in &doc.schemas {
            for prop in &block.nav_props {
                let target_root = prop.target_root();
                if is_collection_type(target_root) {
                    // Collections are leaves of the walk; the path segment is
                    // the property name, not the type name.
                    let child = format!("{path}/{}", prop.name);
                    self.catalog.top_collections.insert(child.clone());
                    local.insert(child);
                    found_collection = true;
                } else {
                    // Entity reference: the target's local type name doubles
                    // as the namespace key (the Redfish vocabulary aligns the
                    // two), and as the path segment.
                    let child = format!("{path}/{target_root}");
                    let next_file = doc
                        .resolve(target_root)
                        .ok_or_else(|| WalkError::UnresolvedNamespace {
                            namespace: target_root.to_string(),
                            file: file.to_string(),
                        })?
                        .to_string();
                    if self.walk(&child, &next_file)? {
                        local.insert(child);
                        found_collection = true;
                    }
                }
            }
        }

        if !local.is_empty() {
            // Paths are expected unique per run (each derives from a single
            // parent); on collision the later visit overwrites.
            self.catalog
                .collection_parents
                .insert(path.to_string(), local);
        }

        Ok(found_collection)
    }
}

/// Run a full discovery pass from the service root and hand back the
/// finished catalog.
pub fn discover<S: SchemaSource>(
    source: &S,
    root_path: &str,
    root_file: &str,
) -> Result<CollectionCatalog, WalkError> {
    let mut walker = CollectionWalker::new(source);
    walker.walk(root_path, root_file)?;
    Ok(walker.into_catalog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_heuristic_checks_both_ends() {
        assert!(is_collection_type("ChassisCollection"));
        assert!(is_collection_type("CollectionCapabilities"));
        assert!(is_collection_type("Collection"));
        assert!(is_collection_type("Collection(Chassis"));
        assert!(!is_collection_type("ComputerSystem"));
        assert!(!is_collection_type("LogService"));
    }

    #[test]
    fn export_is_fully_sorted() {
        let mut catalog = CollectionCatalog::default();
        catalog.top_collections.insert("/redfish/v1/Systems".into());
        catalog.top_collections.insert("/redfish/v1/Chassis".into());
        catalog.collection_parents.insert(
            "/redfish/v1".into(),
            ["/redfish/v1/Systems", "/redfish/v1/Chassis"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let export = catalog.export();
        assert_eq!(export.version, CATALOG_VERSION_V1);
        assert_eq!(
            export.top_collections,
            ["/redfish/v1/Chassis", "/redfish/v1/Systems"]
        );
        assert_eq!(
            export.collection_parents["/redfish/v1"],
            ["/redfish/v1/Chassis", "/redfish/v1/Systems"]
        );
    }
}
