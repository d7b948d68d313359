//! Per-type column → field mappings

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::record::Record;

/// Column name → field name table for one record type.
///
/// Built once from [`Record::columns`] and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
   columns: IndexMap<&'static str, &'static str>,
}

impl FieldMapping {
   /// Builds the mapping declared by `T`.
   ///
   /// When a column is declared twice, the first declaration wins.
   pub fn for_record<T: Record>() -> Self {
      let mut columns = IndexMap::new();
      for &(column, field) in T::columns() {
         if columns.contains_key(column) {
            warn!(
               record = std::any::type_name::<T>(),
               column, "Duplicate column declaration ignored"
            );
            continue;
         }
         columns.insert(column, field);
      }
      Self { columns }
   }

   /// Field mapped to `column`, if any.
   pub fn field_for(&self, column: &str) -> Option<&'static str> {
      self.columns.get(column).copied()
   }

   /// Number of mapped columns.
   pub fn len(&self) -> usize {
      self.columns.len()
   }

   pub fn is_empty(&self) -> bool {
      self.columns.is_empty()
   }

   /// Mapped column names in declaration order.
   pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
      self.columns.keys().copied()
   }
}

type MappingCache = RwLock<HashMap<TypeId, Arc<FieldMapping>>>;

fn cache() -> &'static MappingCache {
   static CACHE: OnceLock<MappingCache> = OnceLock::new();
   CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the cached mapping for `T`, building it on first use.
pub fn mapping_for<T: Record>() -> Arc<FieldMapping> {
   let key = TypeId::of::<T>();

   if let Some(mapping) = cache().read().get(&key) {
      return Arc::clone(mapping);
   }

   let mut mappings = cache().write();
   let mapping = mappings.entry(key).or_insert_with(|| {
      trace!(
         record = std::any::type_name::<T>(),
         "Building field mapping"
      );
      Arc::new(FieldMapping::for_record::<T>())
   });
   Arc::clone(mapping)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[derive(Default)]
   struct Account {
      id: i64,
      owner: String,
   }

   crate::impl_record!(Account {
      id => "account_id",
      owner => "owner",
   });

   #[derive(Default)]
   struct Doubled {
      first: i64,
      second: i64,
   }

   crate::impl_record!(Doubled {
      first => "n",
      second => "n",
   });

   #[test]
   fn test_mapping_follows_declarations() {
      let mapping = FieldMapping::for_record::<Account>();
      assert_eq!(mapping.field_for("account_id"), Some("id"));
      assert_eq!(mapping.field_for("owner"), Some("owner"));
      assert_eq!(mapping.field_for("id"), None);
      assert_eq!(
         mapping.columns().collect::<Vec<_>>(),
         vec!["account_id", "owner"]
      );
   }

   #[test]
   fn test_duplicate_column_keeps_first_field() {
      let mapping = FieldMapping::for_record::<Doubled>();
      assert_eq!(mapping.len(), 1);
      assert_eq!(mapping.field_for("n"), Some("first"));
   }

   #[test]
   fn test_mapping_is_cached_per_type() {
      let a = mapping_for::<Account>();
      let b = mapping_for::<Account>();
      assert!(Arc::ptr_eq(&a, &b));

      let c = mapping_for::<Doubled>();
      assert!(!Arc::ptr_eq(&a, &c));
   }
}
