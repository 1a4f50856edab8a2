//! # Appendix Structure
//!
//! Materializes the appendix index as sections, field groups, fields and the
//! three structural edges.
//!
//! Gaps are filled rather than rejected: an empty index gets a synthetic
//! `app_1`, an appendix without sections gets section `1`, a section without
//! groups gets `group_1`, a section without fields gets `field_1`. Every
//! field is attached to the last group created so far.

use super::ingestion::{AppendixEntry, FieldEntry, GroupEntry, SectionEntry};
use crate::domain::DocumentSchema;
use crate::graph::GraphStore;
use crate::types::props;
use crate::{GraphError, NodeId, Properties, PropertyValue};
use serde::{Deserialize, Serialize};

/// Ids produced by the appendix phase, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendixOutput {
    pub section_ids: Vec<NodeId>,
    pub field_group_ids: Vec<NodeId>,
    pub field_ids: Vec<NodeId>,
}

/// The appendix used when ingestion found none.
#[must_use]
pub fn default_appendices() -> Vec<AppendixEntry> {
    let legal_ref = "706-П, приложение 1";
    vec![AppendixEntry {
        appendix_id: "app_1".into(),
        title: "Приложение 1. Перечень документов".into(),
        legal_ref: legal_ref.into(),
        sections: vec![SectionEntry {
            section_code: "1".into(),
            title: "Перечень документов".into(),
            legal_ref: legal_ref.into(),
            field_groups: vec![GroupEntry {
                group_code: "group_1".into(),
                name: "Основные документы".into(),
                legal_ref: legal_ref.into(),
            }],
            fields: vec![FieldEntry {
                field_code: "field_1".into(),
                name: "Копия решения о выпуске".into(),
                required: true,
                legal_ref: legal_ref.into(),
            }],
        }],
    }]
}

/// Write the appendix index into the store.
pub fn build_structure<G: GraphStore>(
    graph: &mut G,
    appendices: &[AppendixEntry],
) -> Result<AppendixOutput, GraphError> {
    let defaults;
    let appendices = if appendices.is_empty() {
        tracing::info!("no appendices ingested, using the default appendix");
        defaults = default_appendices();
        &defaults[..]
    } else {
        appendices
    };

    let mut output = AppendixOutput::default();

    for appendix in appendices {
        let implicit;
        let sections = if appendix.sections.is_empty() {
            implicit = [SectionEntry {
                section_code: "1".into(),
                title: appendix.title.clone(),
                legal_ref: appendix.legal_ref.clone(),
                field_groups: Vec::new(),
                fields: Vec::new(),
            }];
            &implicit[..]
        } else {
            &appendix.sections[..]
        };

        for section in sections {
            build_section(graph, &appendix.appendix_id, section, &mut output)?;
        }
    }

    tracing::info!(
        sections = output.section_ids.len(),
        groups = output.field_group_ids.len(),
        fields = output.field_ids.len(),
        "appendix structure built"
    );
    Ok(output)
}

fn build_section<G: GraphStore>(
    graph: &mut G,
    appendix_id: &str,
    section: &SectionEntry,
    output: &mut AppendixOutput,
) -> Result<(), GraphError> {
    let code = section.section_code.as_str();
    let legal_ref = section.legal_ref.as_str();
    let edge_props = || props([("legal_ref", legal_ref)]);

    let section_id = DocumentSchema::upsert_section(
        graph,
        appendix_id,
        &format!("{}.{}", appendix_id, code),
        props([
            ("title", section.title.as_str()),
            ("section_code", code),
            ("legal_ref", legal_ref),
        ]),
    )?;
    output.section_ids.push(section_id.clone());

    let implicit_group;
    let groups = if section.field_groups.is_empty() {
        implicit_group = [GroupEntry {
            group_code: "group_1".into(),
            name: format!("Поля раздела {}", code),
            legal_ref: legal_ref.into(),
        }];
        &implicit_group[..]
    } else {
        &section.field_groups[..]
    };

    for group in groups {
        let group_id = DocumentSchema::upsert_field_group(
            graph,
            &section_id,
            &group.group_code,
            props([("name", group.name.as_str()), ("legal_ref", group.legal_ref.as_str())]),
        )?;
        DocumentSchema::link_group_to_section(graph, &group_id, &section_id, edge_props())?;
        output.field_group_ids.push(group_id);
    }

    let implicit_field;
    let fields = if section.fields.is_empty() {
        implicit_field = [FieldEntry {
            field_code: "field_1".into(),
            name: section.title.clone(),
            required: true,
            legal_ref: legal_ref.into(),
        }];
        &implicit_field[..]
    } else {
        &section.fields[..]
    };

    let default_group = output.field_group_ids.last().cloned();
    for field in fields {
        let mut properties = Properties::new();
        properties.insert("name".into(), field.name.as_str().into());
        properties.insert("required".into(), PropertyValue::Bool(field.required));
        properties.insert("legal_ref".into(), field.legal_ref.as_str().into());

        let field_id =
            DocumentSchema::upsert_field(graph, &section_id, &field.field_code, properties)?;
        DocumentSchema::link_field_to_section(graph, &field_id, &section_id, edge_props())?;
        if let Some(group_id) = &default_group {
            DocumentSchema::link_group_to_field(graph, group_id, &field_id, edge_props())?;
        }
        output.field_ids.push(field_id);
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::pipeline::ingestion::ingest_text;
    use crate::primitives::{EDGE_BELONGS_TO, EDGE_CONTAINS_FIELD, EDGE_GROUP_IN_SECTION};

    fn count_edges(graph: &Graph, edge_type: &str) -> usize {
        graph.edges().filter(|e| e.edge_type == edge_type).count()
    }

    #[test]
    fn empty_index_builds_default_appendix() {
        let mut graph = Graph::new();
        let output = build_structure(&mut graph, &[]).expect("structure");

        assert_eq!(output.section_ids.len(), 1);
        assert_eq!(output.field_group_ids.len(), 1);
        assert_eq!(output.field_ids.len(), 1);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);

        let field = graph.node(&output.field_ids[0]).expect("field");
        assert_eq!(
            field.properties.get("name"),
            Some(&"Копия решения о выпуске".into())
        );
        assert_eq!(field.properties.get("required"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn appendix_without_sections_gets_implicit_one() {
        let mut graph = Graph::new();
        let appendix = AppendixEntry {
            appendix_id: "app_3".into(),
            title: "Приложение 3. Анкета".into(),
            legal_ref: "706-П, приложение 3".into(),
            sections: Vec::new(),
        };
        let output = build_structure(&mut graph, &[appendix]).expect("structure");

        let section = graph.node(&output.section_ids[0]).expect("section");
        assert_eq!(section.properties.get("section_path"), Some(&"app_3.1".into()));
        assert_eq!(
            section.properties.get("title"),
            Some(&"Приложение 3. Анкета".into())
        );
        let group = graph.node(&output.field_group_ids[0]).expect("group");
        assert_eq!(group.properties.get("name"), Some(&"Поля раздела 1".into()));
        let field = graph.node(&output.field_ids[0]).expect("field");
        assert_eq!(
            field.properties.get("name"),
            Some(&"Приложение 3. Анкета".into())
        );
    }

    #[test]
    fn fields_attach_to_last_group() {
        let text = "Приложение 1\n1. Документы\nгруппа: Первая\nгруппа: Вторая\n- Поле А\n- Поле Б";
        let ingestion = ingest_text(text).expect("ingestion");
        let mut graph = Graph::new();
        let output = build_structure(&mut graph, &ingestion.appendices).expect("structure");

        assert_eq!(output.field_group_ids.len(), 2);
        assert_eq!(output.field_ids.len(), 2);
        assert_eq!(count_edges(&graph, EDGE_GROUP_IN_SECTION), 2);
        assert_eq!(count_edges(&graph, EDGE_BELONGS_TO), 2);

        let last_group = &output.field_group_ids[1];
        assert!(
            graph
                .edges()
                .filter(|e| e.edge_type == EDGE_CONTAINS_FIELD)
                .all(|e| &e.source == last_group)
        );
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let mut graph = Graph::new();
        build_structure(&mut graph, &[]).expect("first");
        let before = graph.snapshot();
        build_structure(&mut graph, &[]).expect("second");
        assert_eq!(graph.snapshot(), before);
    }
}
