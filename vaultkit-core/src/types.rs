//! Core type definitions for the protected key store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An isolation domain for a family of secrets.
///
/// Each protection class owns a distinct key hierarchy and storage namespace;
/// key material and secrets in one class are invisible to operations on
/// another. A [`crate::store::ProtectedKeyStore`] instance is scoped to
/// exactly one class for its whole lifetime.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProtectionClass {
    /// Keys used for rare, high-value operations (e.g. spending keys).
    Sensitive,
    /// Keys used for everyday operations (e.g. signing keys).
    Data,
}

impl ProtectionClass {
    /// Namespace of the access-controlled KEK for this class.
    #[must_use]
    pub fn kek_namespace(self) -> String {
        format!("vaultkit.kek.{self}")
    }

    /// Namespace of the wrapped data-key blob for this class.
    #[must_use]
    pub fn data_key_namespace(self) -> String {
        format!("vaultkit.dek.{self}")
    }

    /// Namespace of the clear DEK public key for this class.
    #[must_use]
    pub fn public_key_namespace(self) -> String {
        format!("vaultkit.dek-public.{self}")
    }

    /// Namespace of the encrypted secret items for this class.
    #[must_use]
    pub fn item_namespace(self) -> String {
        format!("vaultkit.secret.{self}")
    }
}

/// Identifier of one stored secret within a protection class.
///
/// The `id` (typically an account address) is the lookup key for the
/// encrypted item; it must be unique within its protection class.
/// Re-importing an existing `DataId` overwrites the prior item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataId {
    /// Lookup key within the protection class.
    pub id: String,
    /// The class whose key hierarchy protects this secret.
    pub protection_class: ProtectionClass,
}

impl DataId {
    /// Creates a new `DataId`.
    #[must_use]
    pub fn new<S: Into<String>>(id: S, protection_class: ProtectionClass) -> Self {
        Self {
            id: id.into(),
            protection_class,
        }
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protection_class, self.id)
    }
}

/// Credential requirement gating use of a KEK's private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// The private key is usable without presenting any credential.
    None,
    /// A password must be presented.
    Password,
    /// The platform biometric factor must approve.
    Biometry,
    /// Both a password and the biometric factor are required.
    PasswordAndBiometry,
}

impl AccessPolicy {
    /// Derives the policy a rotated KEK should carry from the new
    /// credentials supplied to `change_password`.
    #[must_use]
    pub const fn for_credentials(password: Option<&str>, use_biometry: bool) -> Self {
        match (password, use_biometry) {
            (Some(_), true) => Self::PasswordAndBiometry,
            (Some(_), false) => Self::Password,
            (None, true) => Self::Biometry,
            (None, false) => Self::None,
        }
    }

    /// Whether this policy requires a password to be presented.
    #[must_use]
    pub const fn requires_password(self) -> bool {
        matches!(self, Self::Password | Self::PasswordAndBiometry)
    }

    /// Whether this policy requires the biometric factor.
    #[must_use]
    pub const fn requires_biometry(self) -> bool {
        matches!(self, Self::Biometry | Self::PasswordAndBiometry)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_protection_class_string_forms() {
        assert_eq!(ProtectionClass::Sensitive.to_string(), "sensitive");
        assert_eq!(ProtectionClass::Data.to_string(), "data");
        assert_eq!(
            ProtectionClass::from_str("sensitive").expect("parse"),
            ProtectionClass::Sensitive
        );
        assert!(ProtectionClass::from_str("other").is_err());
    }

    #[test]
    fn test_namespaces_are_disjoint_per_class() {
        let sensitive = ProtectionClass::Sensitive;
        let data = ProtectionClass::Data;
        assert_ne!(sensitive.kek_namespace(), data.kek_namespace());
        assert_ne!(sensitive.item_namespace(), data.item_namespace());
        assert_ne!(sensitive.kek_namespace(), sensitive.data_key_namespace());
        assert_ne!(
            sensitive.data_key_namespace(),
            sensitive.public_key_namespace()
        );
    }

    #[test]
    fn test_access_policy_derivation() {
        assert_eq!(
            AccessPolicy::for_credentials(None, false),
            AccessPolicy::None
        );
        assert_eq!(
            AccessPolicy::for_credentials(Some("pw"), false),
            AccessPolicy::Password
        );
        assert_eq!(
            AccessPolicy::for_credentials(None, true),
            AccessPolicy::Biometry
        );
        assert_eq!(
            AccessPolicy::for_credentials(Some("pw"), true),
            AccessPolicy::PasswordAndBiometry
        );
    }

    #[test]
    fn test_access_policy_requirements() {
        assert!(!AccessPolicy::None.requires_password());
        assert!(!AccessPolicy::None.requires_biometry());
        assert!(AccessPolicy::Password.requires_password());
        assert!(AccessPolicy::Biometry.requires_biometry());
        assert!(AccessPolicy::PasswordAndBiometry.requires_password());
        assert!(AccessPolicy::PasswordAndBiometry.requires_biometry());
    }

    #[test]
    fn test_data_id_display() {
        let id = DataId::new("0xabc", ProtectionClass::Sensitive);
        assert_eq!(id.to_string(), "sensitive/0xabc");
    }
}
