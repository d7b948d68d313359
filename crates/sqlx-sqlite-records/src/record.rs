//! Record types and their typed field slots

use std::fmt;

use crate::error::{Error, Result};

/// A type whose instances can be populated from result rows.
///
/// Implementations declare which result column feeds which field through
/// [`Record::columns`], and expose the fields for assignment through
/// [`Record::field_mut`]. The [`impl_record!`](crate::impl_record) macro
/// generates both from a single declaration.
pub trait Record: Default + Send + 'static {
   /// `(column, field)` pairs declared for this type.
   fn columns() -> &'static [(&'static str, &'static str)];

   /// Returns a typed slot for the named field, or `None` if no such field exists.
   fn field_mut(&mut self, field: &str) -> Option<FieldSlot<'_>>;
}

/// Mutable view of a record field, tagged with the field's type family.
#[derive(Debug)]
pub enum FieldSlot<'a> {
   Text(&'a mut String),
   NullableText(&'a mut Option<String>),
   /// Any [`IntegerField`]: the signed and unsigned integers, `bool`, and
   /// their `Option`s.
   Integer(&'a mut dyn IntegerField),
   /// Any [`RealField`]: `f64`, `f32`, and their `Option`s.
   Real(&'a mut dyn RealField),
   Blob(&'a mut Vec<u8>),
}

impl FieldSlot<'_> {
   /// Rust type name of the underlying field, used in mismatch errors.
   pub fn type_name(&self) -> &'static str {
      match self {
         FieldSlot::Text(_) => "String",
         FieldSlot::NullableText(_) => "Option<String>",
         FieldSlot::Integer(field) => field.type_name(),
         FieldSlot::Real(field) => field.type_name(),
         FieldSlot::Blob(_) => "Vec<u8>",
      }
   }
}

/// Field types that accept values from integer columns.
pub trait IntegerField: fmt::Debug {
   fn type_name(&self) -> &'static str;

   /// Stores `value`. `None` clears `Option` fields and leaves plain fields
   /// unchanged.
   ///
   /// Fails with [`Error::OutOfRange`] if the value does not fit.
   fn store(&mut self, value: Option<i64>) -> Result<()>;
}

/// Field types that accept values from floating-point columns.
pub trait RealField: fmt::Debug {
   fn type_name(&self) -> &'static str;

   /// Stores `value`. `None` clears `Option` fields and leaves plain fields
   /// unchanged.
   ///
   /// Fails with [`Error::OutOfRange`] if a finite value overflows the field.
   fn store(&mut self, value: Option<f64>) -> Result<()>;
}

fn out_of_range(value: impl fmt::Display, field_type: &'static str) -> Error {
   Error::OutOfRange {
      value: value.to_string(),
      field_type,
   }
}

macro_rules! integer_fields {
   ($($ty:ident),* $(,)?) => {
      $(
         impl IntegerField for $ty {
            fn type_name(&self) -> &'static str {
               stringify!($ty)
            }

            fn store(&mut self, value: Option<i64>) -> Result<()> {
               if let Some(value) = value {
                  *self = $ty::try_from(value).map_err(|_| out_of_range(value, stringify!($ty)))?;
               }
               Ok(())
            }
         }

         impl IntegerField for Option<$ty> {
            fn type_name(&self) -> &'static str {
               concat!("Option<", stringify!($ty), ">")
            }

            fn store(&mut self, value: Option<i64>) -> Result<()> {
               *self = value
                  .map(|v| $ty::try_from(v).map_err(|_| out_of_range(v, stringify!($ty))))
                  .transpose()?;
               Ok(())
            }
         }

         impl AsFieldSlot for $ty {
            fn as_slot(&mut self) -> FieldSlot<'_> {
               FieldSlot::Integer(self)
            }
         }

         impl AsFieldSlot for Option<$ty> {
            fn as_slot(&mut self) -> FieldSlot<'_> {
               FieldSlot::Integer(self)
            }
         }
      )*
   };
}

integer_fields!(i8, i16, i32, i64, u8, u16, u32, u64);

// SQLite stores booleans as integers; any non-zero value is true
impl IntegerField for bool {
   fn type_name(&self) -> &'static str {
      "bool"
   }

   fn store(&mut self, value: Option<i64>) -> Result<()> {
      if let Some(value) = value {
         *self = value != 0;
      }
      Ok(())
   }
}

impl IntegerField for Option<bool> {
   fn type_name(&self) -> &'static str {
      "Option<bool>"
   }

   fn store(&mut self, value: Option<i64>) -> Result<()> {
      *self = value.map(|v| v != 0);
      Ok(())
   }
}

fn narrow_f32(value: f64) -> Result<f32> {
   let narrowed = value as f32;
   if value.is_finite() && !narrowed.is_finite() {
      return Err(out_of_range(value, "f32"));
   }
   Ok(narrowed)
}

impl RealField for f64 {
   fn type_name(&self) -> &'static str {
      "f64"
   }

   fn store(&mut self, value: Option<f64>) -> Result<()> {
      if let Some(value) = value {
         *self = value;
      }
      Ok(())
   }
}

impl RealField for Option<f64> {
   fn type_name(&self) -> &'static str {
      "Option<f64>"
   }

   fn store(&mut self, value: Option<f64>) -> Result<()> {
      *self = value;
      Ok(())
   }
}

impl RealField for f32 {
   fn type_name(&self) -> &'static str {
      "f32"
   }

   fn store(&mut self, value: Option<f64>) -> Result<()> {
      if let Some(value) = value {
         *self = narrow_f32(value)?;
      }
      Ok(())
   }
}

impl RealField for Option<f32> {
   fn type_name(&self) -> &'static str {
      "Option<f32>"
   }

   fn store(&mut self, value: Option<f64>) -> Result<()> {
      *self = value.map(narrow_f32).transpose()?;
      Ok(())
   }
}

/// Field types that can be exposed as a [`FieldSlot`].
pub trait AsFieldSlot {
   fn as_slot(&mut self) -> FieldSlot<'_>;
}

macro_rules! as_field_slot {
   ($($ty:ty => $variant:ident),* $(,)?) => {
      $(
         impl AsFieldSlot for $ty {
            fn as_slot(&mut self) -> FieldSlot<'_> {
               FieldSlot::$variant(self)
            }
         }
      )*
   };
}

as_field_slot! {
   String => Text,
   Option<String> => NullableText,
   bool => Integer,
   Option<bool> => Integer,
   f64 => Real,
   Option<f64> => Real,
   f32 => Real,
   Option<f32> => Real,
   Vec<u8> => Blob,
}

/// Implements [`Record`] for a struct by pairing fields with result columns.
///
/// ```
/// use sqlx_sqlite_records::{Record, impl_record};
///
/// #[derive(Default)]
/// struct Row {
///    id: i64,
///    label: String,
/// }
///
/// impl_record!(Row {
///    id => "id",
///    label => "name",
/// });
///
/// assert_eq!(Row::columns(), &[("id", "id"), ("name", "label")]);
/// ```
#[macro_export]
macro_rules! impl_record {
   ($ty:ty { $($field:ident => $column:literal),* $(,)? }) => {
      impl $crate::Record for $ty {
         fn columns() -> &'static [(&'static str, &'static str)] {
            &[$(($column, stringify!($field))),*]
         }

         fn field_mut(&mut self, field: &str) -> ::core::option::Option<$crate::FieldSlot<'_>> {
            match field {
               $(stringify!($field) => ::core::option::Option::Some(
                  $crate::AsFieldSlot::as_slot(&mut self.$field),
               ),)*
               _ => ::core::option::Option::None,
            }
         }
      }
   };
}
