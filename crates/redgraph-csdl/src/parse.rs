//! Namespace-aware CSDL parsing (quick-xml).
//!
//! The parser is a small event-driven state machine over the two OData
//! namespaces. It deliberately ignores everything the collection walk does
//! not need (annotations, actions, property types); only `Reference/Include`
//! edges and `NavigationProperty` declarations survive into
//! [`SchemaDocument`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::{NavigationProperty, SchemaBlock, SchemaDocument, SchemaLoadError, SchemaReference};

/// OData EDMX envelope namespace (`edmx:` in the DMTF bundle).
pub const EDMX_NS: &[u8] = b"http://docs.oasis-open.org/odata/ns/edmx";
/// OData EDM schema namespace (default namespace of `Schema` blocks).
pub const EDM_NS: &[u8] = b"http://docs.oasis-open.org/odata/ns/edm";

fn local_attr(e: &BytesStart, name: &[u8]) -> Result<Option<String>, SchemaLoadError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parse one CSDL document.
///
/// Returns [`SchemaLoadError::Malformed`] when the document is well-formed
/// XML but structurally not a CSDL schema (no `edmx:DataServices` envelope,
/// or a `NavigationProperty` missing its `Name`/`Type`). Partial documents
/// are never returned.
pub fn parse_document(text: &str) -> Result<SchemaDocument, SchemaLoadError> {
    let mut reader = NsReader::from_str(text);

    let mut doc = SchemaDocument::default();
    // File referenced by the currently open `edmx:Reference`, if it carried
    // a usable Uri.
    let mut reference_file: Option<String> = None;
    let mut in_data_services = false;
    let mut saw_data_services = false;
    let mut current_schema: Option<usize> = None;

    loop {
        match reader.read_resolved_event()? {
            (ResolveResult::Bound(Namespace(ns)), Event::Start(e)) if ns == EDMX_NS => {
                match e.local_name().as_ref() {
                    b"Reference" => {
                        // References without a Uri are skipped, matching the
                        // schema bundle's own tolerance for local annotations.
                        reference_file = local_attr(&e, b"Uri")?
                            .and_then(|uri| uri.rsplit('/').next().map(str::to_string));
                    }
                    b"Include" => {
                        push_include(&mut doc, &reference_file, &e)?;
                    }
                    b"DataServices" => {
                        in_data_services = true;
                        saw_data_services = true;
                    }
                    _ => {}
                }
            }
            (ResolveResult::Bound(Namespace(ns)), Event::Empty(e)) if ns == EDMX_NS => {
                if e.local_name().as_ref() == b"Include" {
                    push_include(&mut doc, &reference_file, &e)?;
                }
            }
            (ResolveResult::Bound(Namespace(ns)), Event::End(e)) if ns == EDMX_NS => {
                match e.local_name().as_ref() {
                    b"Reference" => reference_file = None,
                    b"DataServices" => in_data_services = false,
                    _ => {}
                }
            }
            (ResolveResult::Bound(Namespace(ns)), Event::Start(e)) if ns == EDM_NS => {
                match e.local_name().as_ref() {
                    b"Schema" if in_data_services => {
                        doc.schemas.push(SchemaBlock {
                            namespace: local_attr(&e, b"Namespace")?.unwrap_or_default(),
                            nav_props: Vec::new(),
                        });
                        current_schema = Some(doc.schemas.len() - 1);
                    }
                    b"NavigationProperty" => {
                        push_nav_prop(&mut doc, current_schema, &e)?;
                    }
                    _ => {}
                }
            }
            (ResolveResult::Bound(Namespace(ns)), Event::Empty(e)) if ns == EDM_NS => {
                match e.local_name().as_ref() {
                    b"Schema" if in_data_services => {
                        doc.schemas.push(SchemaBlock {
                            namespace: local_attr(&e, b"Namespace")?.unwrap_or_default(),
                            nav_props: Vec::new(),
                        });
                    }
                    b"NavigationProperty" => {
                        push_nav_prop(&mut doc, current_schema, &e)?;
                    }
                    _ => {}
                }
            }
            (ResolveResult::Bound(Namespace(ns)), Event::End(e)) if ns == EDM_NS => {
                if e.local_name().as_ref() == b"Schema" {
                    current_schema = None;
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if !saw_data_services {
        return Err(SchemaLoadError::Malformed {
            message: "missing edmx:DataServices element".to_string(),
        });
    }

    Ok(doc)
}

fn push_include(
    doc: &mut SchemaDocument,
    reference_file: &Option<String>,
    e: &BytesStart,
) -> Result<(), SchemaLoadError> {
    let Some(file) = reference_file else {
        return Ok(());
    };
    if let Some(namespace) = local_attr(e, b"Namespace")? {
        doc.references.push(SchemaReference {
            namespace,
            file: file.clone(),
        });
    }
    Ok(())
}

fn push_nav_prop(
    doc: &mut SchemaDocument,
    current_schema: Option<usize>,
    e: &BytesStart,
) -> Result<(), SchemaLoadError> {
    // NavigationProperty declarations outside a Schema block cannot occur in
    // well-formed CSDL; ignore rather than guess a home for them.
    let Some(idx) = current_schema else {
        return Ok(());
    };
    let name = local_attr(e, b"Name")?.ok_or_else(|| SchemaLoadError::Malformed {
        message: "NavigationProperty without a Name attribute".to_string(),
    })?;
    let target_type = local_attr(e, b"Type")?.ok_or_else(|| SchemaLoadError::Malformed {
        message: format!("NavigationProperty `{name}` without a Type attribute"),
    })?;
    doc.schemas[idx].nav_props.push(NavigationProperty {
        name,
        target_type,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_ROOT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="http://redfish.dmtf.org/schemas/v1/ChassisCollection_v1.xml">
    <edmx:Include Namespace="ChassisCollection"/>
  </edmx:Reference>
  <edmx:Reference Uri="http://redfish.dmtf.org/schemas/v1/ComputerSystemCollection_v1.xml">
    <edmx:Include Namespace="ComputerSystemCollection"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="ServiceRoot">
      <EntityType Name="ServiceRoot">
        <NavigationProperty Name="Chassis" Type="ChassisCollection.ChassisCollection"/>
        <NavigationProperty Name="Systems" Type="ComputerSystemCollection.ComputerSystemCollection"/>
      </EntityType>
    </Schema>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="ServiceRoot.v1_0_0"/>
  </edmx:DataServices>
</edmx:Edmx>"#;

    #[test]
    fn parses_references_and_nav_props() {
        let doc = parse_document(SERVICE_ROOT).expect("parse");

        assert_eq!(doc.references.len(), 2);
        assert_eq!(doc.resolve("ChassisCollection"), Some("ChassisCollection_v1.xml"));
        assert_eq!(
            doc.resolve("ComputerSystemCollection"),
            Some("ComputerSystemCollection_v1.xml")
        );

        assert_eq!(doc.schemas.len(), 2);
        assert_eq!(doc.schemas[0].namespace, "ServiceRoot");
        let names: Vec<&str> = doc.schemas[0]
            .nav_props
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["Chassis", "Systems"]);
        assert!(doc.schemas[1].nav_props.is_empty());
    }

    #[test]
    fn later_include_overrides_earlier() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference Uri="http://example.org/Old_v1.xml">
    <edmx:Include Namespace="Thing"/>
  </edmx:Reference>
  <edmx:Reference Uri="http://example.org/New_v1.xml">
    <edmx:Include Namespace="Thing"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Root"/>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let doc = parse_document(text).expect("parse");
        assert_eq!(doc.resolve("Thing"), Some("New_v1.xml"));
    }

    #[test]
    fn reference_without_uri_is_skipped() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:Reference>
    <edmx:Include Namespace="Orphan"/>
  </edmx:Reference>
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Root"/>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let doc = parse_document(text).expect("parse");
        assert_eq!(doc.resolve("Orphan"), None);
    }

    #[test]
    fn missing_data_services_is_malformed() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0"/>"#;
        let err = parse_document(text).unwrap_err();
        assert!(matches!(err, SchemaLoadError::Malformed { .. }));
    }

    #[test]
    fn nav_prop_without_type_is_malformed() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<edmx:Edmx xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx" Version="4.0">
  <edmx:DataServices>
    <Schema xmlns="http://docs.oasis-open.org/odata/ns/edm" Namespace="Root">
      <EntityType Name="Root">
        <NavigationProperty Name="Broken"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let err = parse_document(text).unwrap_err();
        assert!(matches!(err, SchemaLoadError::Malformed { .. }));
    }

    #[test]
    fn unparsable_xml_is_an_xml_error() {
        let err = parse_document("<Edmx><DataServices></Edmx>").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Xml(_)));
    }
}
