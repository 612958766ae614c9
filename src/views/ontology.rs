//! Ontology-grouped view.

use super::{ToolBoxRegistry, ToolPanelView};
use crate::error::ViewError;
use crate::panel::{label_key, PanelItem, ToolPanelElements, ToolSection, ToolSectionLabel};
use crate::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;

pub const UNCATEGORIZED: &str = "uncategorized";

/// A classification term known to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyTerm {
    pub id: String,
    pub name: String,
    /// Root terms are listed before all others.
    pub root: bool,
}

impl OntologyTerm {
    pub fn new(id: impl Into<String>, name: impl Into<String>, root: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root,
        }
    }
}

type Classifier = Arc<dyn Fn(&Tool) -> Vec<String> + Send + Sync>;

/// One label and one section per term, each section holding the loaded
/// tools classified under it.
pub struct OntologyView {
    id: String,
    name: String,
    terms: Vec<OntologyTerm>,
    classifier: Classifier,
}

impl OntologyView {
    /// View with id `ontology:<name>` classifying by `Tool::ontology_terms`.
    pub fn new(name: impl Into<String>, terms: Vec<OntologyTerm>) -> Self {
        let name = name.into();
        Self {
            id: format!("ontology:{}", name),
            name,
            terms,
            classifier: Arc::new(|tool: &Tool| tool.ontology_terms.clone()),
        }
    }

    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Tool) -> Vec<String> + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Sort key: root terms, then caller order, then id; unknown terms
    /// after known ones and `uncategorized` last.
    fn sort_key<'a>(&self, term: &'a str) -> (u8, usize, &'a str) {
        if term == UNCATEGORIZED {
            return (3, usize::MAX, term);
        }
        match self.terms.iter().position(|t| t.id == term) {
            Some(position) if self.terms[position].root => (0, position, term),
            Some(position) => (1, position, term),
            None => (2, usize::MAX, term),
        }
    }

    fn term_name(&self, term: &str) -> String {
        self.terms
            .iter()
            .find(|t| t.id == term)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| term.to_string())
    }
}

impl ToolPanelView for OntologyView {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        base: &ToolPanelElements,
        registry: &dyn ToolBoxRegistry,
    ) -> Result<ToolPanelElements, ViewError> {
        let mut grouped: HashMap<String, Vec<Arc<Tool>>> = HashMap::new();
        for tool in base.walk_tools() {
            if !registry.has_tool(tool.panel_id()) {
                continue;
            }
            let mut terms = (self.classifier)(&tool);
            terms.dedup();
            if terms.is_empty() {
                terms.push(UNCATEGORIZED.to_string());
            }
            for term in terms {
                grouped.entry(term).or_default().push(Arc::clone(&tool));
            }
        }

        let mut ordered: Vec<&String> = grouped.keys().collect();
        ordered.sort_by(|a, b| self.sort_key(a).cmp(&self.sort_key(b)));

        let mut view = ToolPanelElements::new();
        for term in ordered {
            let name = self.term_name(term);
            view.append(
                label_key(term),
                PanelItem::Label(ToolSectionLabel::new(term.clone(), name.clone(), "")),
            );
            let mut section = ToolSection::new(term.clone(), name, "");
            for tool in &grouped[term] {
                registry.add_tool_to_view(Arc::clone(tool), &mut section.elems);
            }
            view.append(term.clone(), PanelItem::Section(section));
        }
        view.rebuild_section_index();
        Ok(view)
    }
}
