//! Projected columns and the per-column hooks attached to them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Row;
use crate::filter::FilterHelper;
use crate::options::{ColumnSpec, DataKey};

/// Computes a cell value from the whole result row.
pub type ValueTransform = Arc<dyn Fn(&Row) -> String + Send + Sync>;

/// Produces a filter fragment for one column.
///
/// Returning `None` (or an empty string) asks for the default match.
pub type FilterHook = Arc<dyn Fn(&mut FilterHelper<'_>) -> Option<String> + Send + Sync>;

/// Which filter pass a custom hook takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterScope {
   #[default]
   Individual,
   Global,
   Both,
}

impl FilterScope {
   pub fn includes_individual(self) -> bool {
      matches!(self, FilterScope::Individual | FilterScope::Both)
   }

   pub fn includes_global(self) -> bool {
      matches!(self, FilterScope::Global | FilterScope::Both)
   }
}

/// Client-declared attributes bound onto a column for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnAttributes {
   pub data: Option<DataKey>,
   pub searchable: bool,
   pub orderable: bool,
   pub search_value: String,
}

impl From<&ColumnSpec> for ColumnAttributes {
   fn from(spec: &ColumnSpec) -> Self {
      Self {
         data: Some(spec.data.clone()),
         searchable: spec.searchable,
         orderable: spec.orderable,
         search_value: spec.search_value.clone(),
      }
   }
}

/// One output column of the base projection, or a computed display column.
#[derive(Clone)]
pub struct Column {
   name: String,
   hidden: bool,
   force_search: bool,
   /// Computed columns are not part of the SQL projection and never interactive.
   computed: bool,
   attributes: ColumnAttributes,
   transform: Option<ValueTransform>,
   individual_filter: Option<FilterHook>,
   global_filter: Option<FilterHook>,
   filter_scope: Option<FilterScope>,
}

impl Column {
   pub fn new(name: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         hidden: false,
         force_search: false,
         computed: false,
         attributes: ColumnAttributes::default(),
         transform: None,
         individual_filter: None,
         global_filter: None,
         filter_scope: None,
      }
   }

   /// A display-only column whose value comes entirely from `transform`.
   pub fn computed(name: impl Into<String>, transform: ValueTransform) -> Self {
      Self {
         computed: true,
         transform: Some(transform),
         ..Self::new(name)
      }
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn is_hidden(&self) -> bool {
      self.hidden
   }

   pub fn is_force_search(&self) -> bool {
      self.force_search
   }

   pub fn is_computed(&self) -> bool {
      self.computed
   }

   pub fn attributes(&self) -> &ColumnAttributes {
      &self.attributes
   }

   /// Hide the column from output; `force_search` keeps it in the global search.
   pub fn hide(&mut self, force_search: bool) {
      self.hidden = true;
      self.force_search = force_search;
   }

   pub fn set_transform(&mut self, transform: ValueTransform) {
      self.transform = Some(transform);
   }

   pub fn set_attributes(&mut self, attributes: ColumnAttributes) {
      self.attributes = attributes;
   }

   pub fn reset_attributes(&mut self) {
      self.attributes = ColumnAttributes::default();
   }

   pub fn set_filter(&mut self, scope: FilterScope, hook: FilterHook) {
      if scope.includes_individual() {
         self.individual_filter = Some(hook.clone());
      }
      if scope.includes_global() {
         self.global_filter = Some(hook);
      }
      self.filter_scope = Some(scope);
   }

   pub fn filter_scope(&self) -> Option<FilterScope> {
      self.filter_scope
   }

   pub fn individual_filter(&self) -> Option<&FilterHook> {
      self.individual_filter.as_ref()
   }

   pub fn global_filter(&self) -> Option<&FilterHook> {
      self.global_filter.as_ref()
   }

   pub fn is_searchable(&self) -> bool {
      !self.computed && self.attributes.searchable
   }

   pub fn is_orderable(&self) -> bool {
      !self.computed && self.attributes.orderable
   }

   pub fn search_value(&self) -> &str {
      &self.attributes.search_value
   }

   /// Cell value for `row`: the transform if set, else the raw field rendered as text.
   pub fn value(&self, row: &Row) -> String {
      if let Some(transform) = &self.transform {
         return transform(row);
      }
      row.get(&self.name).map(crate::result::cell_text).unwrap_or_default()
   }
}

impl fmt::Debug for Column {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Column")
         .field("name", &self.name)
         .field("hidden", &self.hidden)
         .field("force_search", &self.force_search)
         .field("computed", &self.computed)
         .field("attributes", &self.attributes)
         .field("transform", &self.transform.is_some())
         .field("individual_filter", &self.individual_filter.is_some())
         .field("global_filter", &self.global_filter.is_some())
         .finish()
   }
}
