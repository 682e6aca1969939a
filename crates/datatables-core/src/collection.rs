//! Ordered column collection and its derived views.

use crate::column::Column;
use crate::error::{Error, Result};

/// Columns in SQL projection order, followed by any computed columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnCollection {
   columns: Vec<Column>,
}

impl ColumnCollection {
   pub fn new() -> Self {
      Self::default()
   }

   /// Build a collection from discovered projection names.
   pub fn from_names<I, S>(names: I) -> Result<Self>
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      let mut collection = Self::new();
      for name in names {
         collection.push(Column::new(name))?;
      }
      if collection.is_empty() {
         return Err(Error::NoColumns);
      }
      Ok(collection)
   }

   /// Append a column; names must be unique.
   pub fn push(&mut self, column: Column) -> Result<()> {
      if self.position(column.name()).is_some() {
         return Err(Error::DuplicateColumn {
            name: column.name().to_string(),
         });
      }
      self.columns.push(column);
      Ok(())
   }

   pub fn len(&self) -> usize {
      self.columns.len()
   }

   pub fn is_empty(&self) -> bool {
      self.columns.is_empty()
   }

   pub fn iter(&self) -> impl Iterator<Item = &Column> {
      self.columns.iter()
   }

   pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
      self.columns.iter_mut()
   }

   pub fn get(&self, index: usize) -> Option<&Column> {
      self.columns.get(index)
   }

   pub fn get_mut(&mut self, index: usize) -> Option<&mut Column> {
      self.columns.get_mut(index)
   }

   pub fn position(&self, name: &str) -> Option<usize> {
      self.columns.iter().position(|c| c.name() == name)
   }

   pub fn by_name(&self, name: &str) -> Result<&Column> {
      self
         .columns
         .iter()
         .find(|c| c.name() == name)
         .ok_or_else(|| Error::UnknownColumn {
            name: name.to_string(),
         })
   }

   pub fn by_name_mut(&mut self, name: &str) -> Result<&mut Column> {
      self
         .columns
         .iter_mut()
         .find(|c| c.name() == name)
         .ok_or_else(|| Error::UnknownColumn {
            name: name.to_string(),
         })
   }

   /// Names of every column, hidden and computed included.
   pub fn all_names(&self) -> Vec<&str> {
      self.columns.iter().map(Column::name).collect()
   }

   /// Names of the visible columns.
   pub fn names(&self) -> Vec<&str> {
      self.visible().map(Column::name).collect()
   }

   /// Columns that appear in the output.
   pub fn visible(&self) -> impl Iterator<Item = &Column> {
      self.columns.iter().filter(|c| !c.is_hidden())
   }

   /// Collection index of the `n`-th visible column.
   pub fn visible_index(&self, n: usize) -> Option<usize> {
      self
         .columns
         .iter()
         .enumerate()
         .filter(|(_, c)| !c.is_hidden())
         .nth(n)
         .map(|(i, _)| i)
   }

   /// Collection index of the visible column called `name`.
   pub fn visible_position(&self, name: &str) -> Option<usize> {
      self
         .columns
         .iter()
         .position(|c| !c.is_hidden() && c.name() == name)
   }

   /// Columns taking part in the global search.
   pub fn globally_searchable(&self) -> impl Iterator<Item = &Column> {
      self.columns.iter().filter(|c| {
         !c.is_computed() && (c.is_force_search() || (!c.is_hidden() && c.is_searchable()))
      })
   }

   /// Columns carrying their own per-column filter.
   pub fn individually_searchable(&self) -> impl Iterator<Item = &Column> {
      self.columns.iter().filter(|c| {
         !c.is_computed() && (!c.search_value().is_empty() || c.individual_filter().is_some())
      })
   }
}
