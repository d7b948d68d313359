//! Row → record decoding
//!
//! Each column is first scanned into a [`Carrier`] chosen from the column's
//! reported type, then assigned to the mapped field under a fixed coercion policy.

use sqlx::sqlite::{SqliteColumn, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{Error, Result};
use crate::mapping::mapping_for;
use crate::record::{FieldSlot, Record};

/// Carrier chosen for a column from its reported type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CarrierKind {
   Text,
   Integer,
   Real,
   Blob,
   /// No declared type (expressions, `NULL` literals); the carrier follows the
   /// storage class of each value.
   Dynamic,
}

impl CarrierKind {
   fn for_reported_type(type_name: &str) -> Result<Self> {
      match type_name.to_ascii_uppercase().as_str() {
         "TEXT" => Ok(CarrierKind::Text),
         "INTEGER" => Ok(CarrierKind::Integer),
         "REAL" | "FLOAT" | "DOUBLE" => Ok(CarrierKind::Real),
         "BLOB" => Ok(CarrierKind::Blob),
         "NULL" => Ok(CarrierKind::Dynamic),
         _ => Err(Error::UnsupportedColumnType(type_name.to_string())),
      }
   }
}

/// Neutral holder for one scanned column value.
#[derive(Debug, Clone, PartialEq)]
enum Carrier {
   Text(Option<String>),
   Integer(Option<i64>),
   Real(Option<f64>),
   Blob(Vec<u8>),
}

impl Carrier {
   fn type_name(&self) -> &'static str {
      match self {
         Carrier::Text(_) => "TEXT",
         Carrier::Integer(_) => "INTEGER",
         Carrier::Real(_) => "REAL",
         Carrier::Blob(_) => "BLOB",
      }
   }

   fn scan(row: &SqliteRow, index: usize, kind: CarrierKind) -> Result<Self> {
      let carrier = match kind {
         CarrierKind::Text => Carrier::Text(row.try_get_unchecked(index)?),
         CarrierKind::Integer => Carrier::Integer(row.try_get_unchecked(index)?),
         CarrierKind::Real => Carrier::Real(row.try_get_unchecked(index)?),
         CarrierKind::Blob => Carrier::Blob(
            row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?
               .unwrap_or_default(),
         ),
         CarrierKind::Dynamic => {
            let storage = {
               let raw = row.try_get_raw(index)?;
               if raw.is_null() {
                  return Ok(Carrier::Text(None));
               }
               raw.type_info().name().to_ascii_uppercase()
            };

            match storage.as_str() {
               "INTEGER" => Carrier::Integer(Some(row.try_get_unchecked(index)?)),
               "REAL" => Carrier::Real(Some(row.try_get_unchecked(index)?)),
               "BLOB" => Carrier::Blob(row.try_get_unchecked(index)?),
               _ => Carrier::Text(Some(row.try_get_unchecked(index)?)),
            }
         }
      };

      Ok(carrier)
   }

   /// Writes this value into `slot`.
   ///
   /// Nullable fields take the value as-is, nulls included. Plain fields are only
   /// written when the value is present, otherwise they keep their default.
   /// Integer and real values convert into any field of the same family that
   /// can hold them.
   fn assign(self, slot: FieldSlot<'_>) -> Result<()> {
      let column_type = self.type_name();

      match (self, slot) {
         (Carrier::Text(v), FieldSlot::NullableText(field)) => *field = v,
         (Carrier::Text(v), FieldSlot::Text(field)) => {
            if let Some(v) = v {
               *field = v;
            }
         }

         (Carrier::Integer(v), FieldSlot::Integer(field)) => field.store(v)?,
         (Carrier::Real(v), FieldSlot::Real(field)) => field.store(v)?,

         (Carrier::Blob(v), FieldSlot::Blob(field)) => *field = v,
         (Carrier::Blob(v), FieldSlot::Text(field)) => {
            *field = String::from_utf8_lossy(&v).into_owned();
         }
         (Carrier::Blob(v), FieldSlot::NullableText(field)) => {
            *field = (!v.is_empty()).then(|| String::from_utf8_lossy(&v).into_owned());
         }

         (_, slot) => {
            return Err(Error::TypeMismatch {
               column_type: column_type.to_string(),
               field_type: slot.type_name(),
            });
         }
      }

      Ok(())
   }
}

/// How one result column is handled for a given record type.
struct ColumnPlan {
   index: usize,
   kind: CarrierKind,
   field: Option<&'static str>,
}

fn plan_columns<T: Record>(columns: &[SqliteColumn]) -> Result<Vec<ColumnPlan>> {
   let mapping = mapping_for::<T>();

   columns
      .iter()
      .map(|column| {
         Ok(ColumnPlan {
            index: column.ordinal(),
            kind: CarrierKind::for_reported_type(column.type_info().name())?,
            field: mapping.field_for(column.name()),
         })
      })
      .collect()
}

/// Decodes `rows` into a new vector of `T`.
///
/// `columns` describes the result set, usually taken from the prepared
/// statement, so column types are checked even when there are no rows.
/// Fails without producing any records if a column reports an unsupported type
/// or a value cannot be assigned to its mapped field.
pub fn decode_records<T: Record>(columns: &[SqliteColumn], rows: &[SqliteRow]) -> Result<Vec<T>> {
   let plan = plan_columns::<T>(columns)?;
   let mut records = Vec::with_capacity(rows.len());

   for row in rows {
      let mut record = T::default();

      for column in &plan {
         let Some(field) = column.field else {
            continue;
         };
         let Some(slot) = record.field_mut(field) else {
            continue;
         };
         Carrier::scan(row, column.index, column.kind)?.assign(slot)?;
      }

      records.push(record);
   }

   Ok(records)
}

/// Replaces the contents of `dest` with the records decoded from `rows`.
///
/// `dest` is left untouched when decoding fails.
pub fn records_from_rows<T: Record>(
   dest: &mut Vec<T>,
   columns: &[SqliteColumn],
   rows: &[SqliteRow],
) -> Result<()> {
   *dest = decode_records(columns, rows)?;
   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_carrier_kind_for_reported_type() {
      assert_eq!(
         CarrierKind::for_reported_type("TEXT").unwrap(),
         CarrierKind::Text
      );
      assert_eq!(
         CarrierKind::for_reported_type("integer").unwrap(),
         CarrierKind::Integer
      );
      assert_eq!(
         CarrierKind::for_reported_type("REAL").unwrap(),
         CarrierKind::Real
      );
      assert_eq!(
         CarrierKind::for_reported_type("BLOB").unwrap(),
         CarrierKind::Blob
      );
      assert_eq!(
         CarrierKind::for_reported_type("NULL").unwrap(),
         CarrierKind::Dynamic
      );

      let err = CarrierKind::for_reported_type("DATETIME").unwrap_err();
      assert!(matches!(err, Error::UnsupportedColumnType(ref t) if t == "DATETIME"));
   }

   #[test]
   fn test_plain_fields_keep_default_on_null() {
      let mut text = String::from("keep");
      Carrier::Text(None)
         .assign(FieldSlot::Text(&mut text))
         .unwrap();
      assert_eq!(text, "keep");

      let mut int = 5_i64;
      Carrier::Integer(None)
         .assign(FieldSlot::Integer(&mut int))
         .unwrap();
      assert_eq!(int, 5);
   }

   #[test]
   fn test_nullable_fields_take_null() {
      let mut text = Some(String::from("old"));
      Carrier::Text(None)
         .assign(FieldSlot::NullableText(&mut text))
         .unwrap();
      assert_eq!(text, None);

      let mut real = Some(1.0_f64);
      Carrier::Real(None)
         .assign(FieldSlot::Real(&mut real))
         .unwrap();
      assert_eq!(real, None);
   }

   #[test]
   fn test_blob_into_text_fields() {
      let mut text = String::new();
      Carrier::Blob(b"abc".to_vec())
         .assign(FieldSlot::Text(&mut text))
         .unwrap();
      assert_eq!(text, "abc");

      let mut nullable = Some(String::from("x"));
      Carrier::Blob(Vec::new())
         .assign(FieldSlot::NullableText(&mut nullable))
         .unwrap();
      assert_eq!(nullable, None);
   }

   #[test]
   fn test_mismatch_names_column_and_field_types() {
      let mut int = 0_i64;
      let err = Carrier::Text(Some("a".into()))
         .assign(FieldSlot::Integer(&mut int))
         .unwrap_err();

      match err {
         Error::TypeMismatch {
            column_type,
            field_type,
         } => {
            assert_eq!(column_type, "TEXT");
            assert_eq!(field_type, "i64");
         }
         other => panic!("unexpected error: {other}"),
      }
   }

   #[test]
   fn test_integer_into_narrow_fields() {
      let mut small = 0_i32;
      Carrier::Integer(Some(-40))
         .assign(FieldSlot::Integer(&mut small))
         .unwrap();
      assert_eq!(small, -40);

      let mut byte = 0_u8;
      let err = Carrier::Integer(Some(-1))
         .assign(FieldSlot::Integer(&mut byte))
         .unwrap_err();
      assert_eq!(err.error_code(), "OUT_OF_RANGE");
   }

   #[test]
   fn test_families_do_not_cross() {
      let mut real = 0.0_f32;
      let err = Carrier::Integer(Some(1))
         .assign(FieldSlot::Real(&mut real))
         .unwrap_err();
      assert!(matches!(
         err,
         Error::TypeMismatch { ref column_type, field_type: "f32" } if column_type == "INTEGER"
      ));

      let mut flag = false;
      assert!(
         Carrier::Real(Some(1.0))
            .assign(FieldSlot::Integer(&mut flag))
            .is_err()
      );
   }
}
