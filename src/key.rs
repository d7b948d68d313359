//! Versioned database keys

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Identity used when none is given.
pub const COMMON_ID: &str = "common";

/// Version used when none is given.
pub const BASE_VERSION: &str = "base";

/// Identifies one database by `(identity, version)`.
///
/// Also names the database's storage directory, `<identity>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionedKey {
   id: String,
   version: String,
}

impl VersionedKey {
   /// Key for the common identity at the base version.
   pub fn common() -> Self {
      Self::from_parts(COMMON_ID, BASE_VERSION)
   }

   /// Key for an explicit identity at the base version.
   pub fn for_identity(id: &str) -> Result<Self> {
      check_identity(id)?;
      Ok(Self::from_parts(id, BASE_VERSION))
   }

   /// Key for the common identity at an explicit version.
   pub fn for_version(version: &str) -> Result<Self> {
      check_version(version)?;
      Ok(Self::from_parts(COMMON_ID, version))
   }

   /// Key for an explicit identity and version.
   pub fn for_identity_and_version(id: &str, version: &str) -> Result<Self> {
      check_identity(id)?;
      check_version(version)?;
      Ok(Self::from_parts(id, version))
   }

   /// Key from raw parts, without any checks.
   pub(crate) fn from_parts(id: &str, version: &str) -> Self {
      Self {
         id: id.to_string(),
         version: version.to_string(),
      }
   }

   pub fn id(&self) -> &str {
      &self.id
   }

   pub fn version(&self) -> &str {
      &self.version
   }

   /// Storage directory relative to the registry's data directory.
   pub fn relative_path(&self) -> PathBuf {
      PathBuf::from(&self.id).join(&self.version)
   }
}

impl fmt::Display for VersionedKey {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}/{}", self.id, self.version)
   }
}

fn check_identity(id: &str) -> Result<()> {
   if id == COMMON_ID {
      return Err(Error::ReservedIdentity(id.to_string()));
   }
   check_segment(id)
}

fn check_version(version: &str) -> Result<()> {
   if version == BASE_VERSION {
      return Err(Error::ReservedVersion(version.to_string()));
   }
   check_segment(version)
}

/// Rejects values that would not stay a single directory name.
fn check_segment(segment: &str) -> Result<()> {
   let invalid = segment.is_empty()
      || segment == "."
      || segment == ".."
      || segment.contains(['/', '\\', '\0']);

   if invalid {
      return Err(Error::InvalidKey(segment.to_string()));
   }
   Ok(())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_display_joins_parts() {
      assert_eq!(VersionedKey::common().to_string(), "common/base");
      assert_eq!(
         VersionedKey::for_identity_and_version("org1", "1.0")
            .unwrap()
            .to_string(),
         "org1/1.0"
      );
   }

   #[test]
   fn test_implicit_defaults() {
      let key = VersionedKey::for_identity("org1").unwrap();
      assert_eq!((key.id(), key.version()), ("org1", BASE_VERSION));

      let key = VersionedKey::for_version("2.0").unwrap();
      assert_eq!((key.id(), key.version()), (COMMON_ID, "2.0"));
   }

   #[test]
   fn test_reserved_values_rejected() {
      assert!(matches!(
         VersionedKey::for_identity(COMMON_ID),
         Err(Error::ReservedIdentity(_))
      ));
      assert!(matches!(
         VersionedKey::for_version(BASE_VERSION),
         Err(Error::ReservedVersion(_))
      ));
      assert!(matches!(
         VersionedKey::for_identity_and_version(COMMON_ID, "1.0"),
         Err(Error::ReservedIdentity(_))
      ));
      assert!(matches!(
         VersionedKey::for_identity_and_version("org1", BASE_VERSION),
         Err(Error::ReservedVersion(_))
      ));
   }

   #[test]
   fn test_path_like_segments_rejected() {
      for bad in ["", ".", "..", "a/b", "a\\b"] {
         let err = VersionedKey::for_identity(bad).unwrap_err();
         assert!(err.is_invalid_key(), "accepted {bad:?}");
      }
      assert!(VersionedKey::for_version("1.0.3-beta").is_ok());
   }

   #[test]
   fn test_relative_path() {
      let key = VersionedKey::for_identity_and_version("org1", "1.0").unwrap();
      assert_eq!(key.relative_path(), PathBuf::from("org1").join("1.0"));
   }
}
