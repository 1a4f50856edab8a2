//! # Document Schema Helpers
//!
//! Builders that express the regulatory document taxonomy (sections, field
//! groups, fields) on top of the generic `GraphStore` primitives.
//!
//! Natural keys:
//! - section: `<appendix_id>:section:<section_path>`
//! - field:   `<section_id>:field:<field_code>`
//! - group:   `<section_id>:group:<group_code>`
//!
//! Required properties are checked here, not in the store: the store accepts
//! any property bag, the schema does not.

use crate::graph::GraphStore;
use crate::primitives::{
    EDGE_BELONGS_TO, EDGE_CONTAINS_FIELD, EDGE_GROUP_IN_SECTION, NODE_DOCUMENT_FIELD,
    NODE_DOCUMENT_SECTION, NODE_FIELD_GROUP,
};
use crate::{EdgeId, GraphError, NodeId, Properties, PropertyValue};

/// Entry points for the document schema.
pub struct DocumentSchema;

impl DocumentSchema {
    /// Upsert a document section of an appendix.
    ///
    /// Injects `appendix_id` and `section_path`; caller properties win on
    /// conflict. Requires `legal_ref`.
    pub fn upsert_section<G: GraphStore>(
        graph: &mut G,
        appendix_id: &str,
        section_path: &str,
        properties: Properties,
    ) -> Result<NodeId, GraphError> {
        let merged = with_base(
            [("appendix_id", appendix_id), ("section_path", section_path)],
            properties,
        );
        require(&merged, "document section", "legal_ref")?;

        let natural_key = format!("{}:section:{}", appendix_id, section_path);
        Ok(graph.upsert_node(NODE_DOCUMENT_SECTION, &natural_key, merged))
    }

    /// Upsert a field belonging to a section.
    ///
    /// Injects `section_id` and `field_code`. Requires `name` and `legal_ref`.
    pub fn upsert_field<G: GraphStore>(
        graph: &mut G,
        section_id: &NodeId,
        field_code: &str,
        properties: Properties,
    ) -> Result<NodeId, GraphError> {
        let merged = with_base(
            [("section_id", section_id.as_str()), ("field_code", field_code)],
            properties,
        );
        require(&merged, "document field", "name")?;
        require(&merged, "document field", "legal_ref")?;

        let natural_key = format!("{}:field:{}", section_id, field_code);
        Ok(graph.upsert_node(NODE_DOCUMENT_FIELD, &natural_key, merged))
    }

    /// Upsert a field group belonging to a section.
    ///
    /// Injects `section_id` and `group_code`. Requires `name` and `legal_ref`.
    pub fn upsert_field_group<G: GraphStore>(
        graph: &mut G,
        section_id: &NodeId,
        group_code: &str,
        properties: Properties,
    ) -> Result<NodeId, GraphError> {
        let merged = with_base(
            [("section_id", section_id.as_str()), ("group_code", group_code)],
            properties,
        );
        require(&merged, "field group", "name")?;
        require(&merged, "field group", "legal_ref")?;

        let natural_key = format!("{}:group:{}", section_id, group_code);
        Ok(graph.upsert_node(NODE_FIELD_GROUP, &natural_key, merged))
    }

    /// `GROUP_IN_SECTION`: group → section.
    pub fn link_group_to_section<G: GraphStore>(
        graph: &mut G,
        group_id: &NodeId,
        section_id: &NodeId,
        properties: Properties,
    ) -> Result<EdgeId, GraphError> {
        graph.add_edge(EDGE_GROUP_IN_SECTION, group_id, section_id, properties)
    }

    /// `BELONGS_TO`: field → section.
    pub fn link_field_to_section<G: GraphStore>(
        graph: &mut G,
        field_id: &NodeId,
        section_id: &NodeId,
        properties: Properties,
    ) -> Result<EdgeId, GraphError> {
        graph.add_edge(EDGE_BELONGS_TO, field_id, section_id, properties)
    }

    /// `CONTAINS_FIELD`: group → field.
    pub fn link_group_to_field<G: GraphStore>(
        graph: &mut G,
        group_id: &NodeId,
        field_id: &NodeId,
        properties: Properties,
    ) -> Result<EdgeId, GraphError> {
        graph.add_edge(EDGE_CONTAINS_FIELD, group_id, field_id, properties)
    }
}

fn with_base<const N: usize>(base: [(&str, &str); N], overrides: Properties) -> Properties {
    let mut merged: Properties = base
        .into_iter()
        .map(|(k, v)| (k.to_string(), PropertyValue::from(v)))
        .collect();
    merged.extend(overrides);
    merged
}

fn require(
    properties: &Properties,
    entity: &'static str,
    key: &'static str,
) -> Result<(), GraphError> {
    match properties.get(key) {
        None | Some(PropertyValue::Null) => Err(GraphError::MissingProperty { entity, key }),
        Some(PropertyValue::Text(s)) if s.trim().is_empty() => {
            Err(GraphError::MissingProperty { entity, key })
        }
        Some(_) => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::types::props;

    fn section(graph: &mut Graph) -> NodeId {
        DocumentSchema::upsert_section(
            graph,
            "app_1",
            "app_1.1",
            props([("title", "Перечень документов"), ("legal_ref", "706-П, приложение 1")]),
        )
        .expect("section")
    }

    #[test]
    fn section_carries_injected_keys() {
        let mut graph = Graph::new();
        let id = section(&mut graph);
        let node = graph.node(&id).expect("node");

        assert_eq!(node.node_type, NODE_DOCUMENT_SECTION);
        assert_eq!(node.properties.get("appendix_id"), Some(&"app_1".into()));
        assert_eq!(node.properties.get("section_path"), Some(&"app_1.1".into()));
    }

    #[test]
    fn section_is_idempotent() {
        let mut graph = Graph::new();
        let a = section(&mut graph);
        let b = section(&mut graph);
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn field_requires_name() {
        let mut graph = Graph::new();
        let sid = section(&mut graph);
        let result =
            DocumentSchema::upsert_field(
                &mut graph,
                &sid,
                "field_1",
                props([("legal_ref", "706-П")]),
            );
        assert!(matches!(
            result,
            Err(GraphError::MissingProperty { key: "name", .. })
        ));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn group_rejects_blank_legal_ref() {
        let mut graph = Graph::new();
        let sid = section(&mut graph);
        let result = DocumentSchema::upsert_field_group(
            &mut graph,
            &sid,
            "group_1",
            props([("name", "Основные документы"), ("legal_ref", "  ")]),
        );
        assert!(matches!(
            result,
            Err(GraphError::MissingProperty { key: "legal_ref", .. })
        ));
    }

    #[test]
    fn structural_edges_link_the_taxonomy() {
        let mut graph = Graph::new();
        let sid = section(&mut graph);
        let gid = DocumentSchema::upsert_field_group(
            &mut graph,
            &sid,
            "group_1",
            props([("name", "Основные документы"), ("legal_ref", "706-П")]),
        )
        .expect("group");
        let fid = DocumentSchema::upsert_field(
            &mut graph,
            &sid,
            "field_1",
            props([("name", "Копия решения о выпуске"), ("legal_ref", "706-П")]),
        )
        .expect("field");

        DocumentSchema::link_group_to_section(&mut graph, &gid, &sid, Properties::new())
            .expect("group edge");
        DocumentSchema::link_field_to_section(&mut graph, &fid, &sid, Properties::new())
            .expect("field edge");
        DocumentSchema::link_group_to_field(&mut graph, &gid, &fid, Properties::new())
            .expect("contains edge");

        let types: Vec<_> = graph.edges().map(|e| e.edge_type.as_str()).collect();
        assert_eq!(types.len(), 3);
        assert!(types.contains(&EDGE_GROUP_IN_SECTION));
        assert!(types.contains(&EDGE_BELONGS_TO));
        assert!(types.contains(&EDGE_CONTAINS_FIELD));
    }
}
