//! Visibility filters
//!
//! Filters are named predicates looked up in an explicit table. The table is
//! filled with the built-in predicates at startup and can be extended by
//! embedding code through [`FilterRegistry::register`]; configuration and
//! per-user preferences can only *select* names from it, never introduce
//! code.

use crate::error::FilterConfigError;
use crate::panel::{ToolSection, ToolSectionLabel};
use crate::tool::{Tool, Workflow};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// The caller a panel is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub is_admin: bool,
}

/// Filter names a caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPreferences {
    pub tool: Vec<String>,
    pub section: Vec<String>,
    pub label: Vec<String>,
}

/// Per-request filtering context. `user` is `None` for anonymous callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContext {
    pub user: Option<UserContext>,
    pub preferences: FilterPreferences,
}

impl FilterContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user: Some(UserContext {
                id: id.into(),
                is_admin: false,
            }),
            preferences: FilterPreferences::default(),
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            user: Some(UserContext {
                id: id.into(),
                is_admin: true,
            }),
            preferences: FilterPreferences::default(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(|u| u.is_admin).unwrap_or(false)
    }
}

/// What a predicate is asked about.
#[derive(Debug, Clone, Copy)]
pub enum FilterSubject<'a> {
    Tool(&'a Tool),
    Workflow(&'a Workflow),
    Section(&'a ToolSection),
    Label(&'a ToolSectionLabel),
}

pub type FilterFn =
    Arc<dyn Fn(&FilterContext, FilterSubject<'_>) -> Result<bool, String> + Send + Sync>;

/// A named predicate.
#[derive(Clone)]
pub struct Filter {
    name: String,
    predicate: FilterFn,
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish()
    }
}

impl Filter {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&FilterContext, FilterSubject<'_>) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(
        &self,
        ctx: &FilterContext,
        subject: FilterSubject<'_>,
    ) -> Result<bool, FilterConfigError> {
        (self.predicate)(ctx, subject).map_err(|reason| FilterConfigError::Failed {
            filter: self.name.clone(),
            reason,
        })
    }
}

/// Name -> predicate table.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Filter>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }

    /// Table holding the audited built-in predicates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Filter::new("hidden", |_, subject| {
            Ok(!matches!(subject, FilterSubject::Tool(tool) if tool.hidden))
        }));
        registry.register(Filter::new("require_login", |ctx, subject| {
            Ok(match subject {
                FilterSubject::Tool(tool) => !tool.require_login || ctx.user.is_some(),
                _ => true,
            })
        }));
        registry.register(Filter::new("restrict_to_admins", |ctx, _| Ok(ctx.is_admin())));
        registry.register(Filter::new("exclude_shed_tools", |_, subject| {
            Ok(!matches!(subject, FilterSubject::Tool(tool) if tool.is_shed_tool()))
        }));
        registry.register(Filter::new("only_shed_tools", |_, subject| {
            Ok(match subject {
                FilterSubject::Tool(tool) => tool.is_shed_tool(),
                _ => true,
            })
        }));
        registry
    }

    /// Add or replace a predicate.
    pub fn register(&mut self, filter: Filter) {
        self.filters.insert(filter.name.clone(), filter);
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

/// Filters that apply to one render, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub tool: Vec<Filter>,
    pub section: Vec<Filter>,
    pub label: Vec<Filter>,
}

impl FilterSet {
    pub fn allows_tool(&self, ctx: &FilterContext, tool: &Tool) -> Result<bool, FilterConfigError> {
        all(&self.tool, ctx, FilterSubject::Tool(tool))
    }

    pub fn allows_workflow(
        &self,
        ctx: &FilterContext,
        workflow: &Workflow,
    ) -> Result<bool, FilterConfigError> {
        all(&self.tool, ctx, FilterSubject::Workflow(workflow))
    }

    pub fn allows_section(
        &self,
        ctx: &FilterContext,
        section: &ToolSection,
    ) -> Result<bool, FilterConfigError> {
        all(&self.section, ctx, FilterSubject::Section(section))
    }

    pub fn allows_label(
        &self,
        ctx: &FilterContext,
        label: &ToolSectionLabel,
    ) -> Result<bool, FilterConfigError> {
        all(&self.label, ctx, FilterSubject::Label(label))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tool
            .iter()
            .chain(&self.section)
            .chain(&self.label)
            .map(Filter::name)
            .collect()
    }
}

fn all(filters: &[Filter], ctx: &FilterContext, subject: FilterSubject<'_>) -> Result<bool, FilterConfigError> {
    for filter in filters {
        if !filter.evaluate(ctx, subject)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Filter names selected by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    pub tool_filters: Vec<String>,
    pub section_filters: Vec<String>,
    pub label_filters: Vec<String>,
    pub user_tool_filters: Vec<String>,
    pub user_section_filters: Vec<String>,
    pub user_label_filters: Vec<String>,
}

/// Builds the `FilterSet` for a caller.
#[derive(Clone)]
pub struct FilterFactory {
    registry: Arc<FilterRegistry>,
    settings: FilterSettings,
}

const BUILTIN_TOOL_FILTERS: [&str; 2] = ["hidden", "require_login"];

impl FilterFactory {
    pub fn new(registry: Arc<FilterRegistry>, settings: FilterSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Assemble the caller's filters. Names that are unknown or not in the
    /// matching allow-list are skipped and reported.
    pub fn build(&self, ctx: &FilterContext) -> (FilterSet, Vec<FilterConfigError>) {
        let mut set = FilterSet::default();
        let mut errors = Vec::new();

        for name in BUILTIN_TOOL_FILTERS {
            if let Some(filter) = self.registry.get(name) {
                set.tool.push(filter.clone());
            }
        }

        self.add_global(&self.settings.tool_filters, &mut set.tool, &mut errors);
        self.add_global(&self.settings.section_filters, &mut set.section, &mut errors);
        self.add_global(&self.settings.label_filters, &mut set.label, &mut errors);

        self.add_user(
            &ctx.preferences.tool,
            &self.settings.user_tool_filters,
            &mut set.tool,
            &mut errors,
        );
        self.add_user(
            &ctx.preferences.section,
            &self.settings.user_section_filters,
            &mut set.section,
            &mut errors,
        );
        self.add_user(
            &ctx.preferences.label,
            &self.settings.user_label_filters,
            &mut set.label,
            &mut errors,
        );

        (set, errors)
    }

    fn add_global(&self, names: &[String], target: &mut Vec<Filter>, errors: &mut Vec<FilterConfigError>) {
        for name in names {
            self.push_named(name, target, errors);
        }
    }

    fn add_user(
        &self,
        requested: &[String],
        allowed: &[String],
        target: &mut Vec<Filter>,
        errors: &mut Vec<FilterConfigError>,
    ) {
        let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
        for name in requested {
            if !allowed.contains(name.as_str()) {
                warn!(filter = %name, "Refusing per-user filter outside the allow-list");
                errors.push(FilterConfigError::NotAllowed(name.clone()));
                continue;
            }
            self.push_named(name, target, errors);
        }
    }

    fn push_named(&self, name: &str, target: &mut Vec<Filter>, errors: &mut Vec<FilterConfigError>) {
        if target.iter().any(|f| f.name == name) {
            return;
        }
        match self.registry.get(name) {
            Some(filter) => target.push(filter.clone()),
            None => {
                warn!(filter = %name, "Skipping unknown filter");
                errors.push(FilterConfigError::Unknown(name.to_string()));
            }
        }
    }
}
