//! End-to-end tests of the protected key store over the in-memory secure
//! item store: initialization lifecycle, import/find round trips, protection
//! class isolation, credential rotation, and deletion.

use std::sync::Arc;

use test_case::test_case;
use vaultkit_core::{
    item_store::{BiometricOutcome, MemorySecureItemStore, SecureItemStore},
    DataId, KeyStoreError, ProtectedKeyStore, ProtectionClass,
};

const ACCOUNT_ADDRESS: &str = "0xE86935943315293154c7AD63296b4e1adAc76364";

fn store_for(class: ProtectionClass) -> ProtectedKeyStore<MemorySecureItemStore> {
    ProtectedKeyStore::new(Arc::new(MemorySecureItemStore::new()), class)
}

fn initialized_store(class: ProtectionClass) -> ProtectedKeyStore<MemorySecureItemStore> {
    let store = store_for(class);
    store.initialize_key_store().expect("initialize");
    store
}

#[test_case(ProtectionClass::Sensitive; "sensitive")]
#[test_case(ProtectionClass::Data; "data")]
fn test_import_find_round_trip(class: ProtectionClass) {
    let store = initialized_store(class);
    let id = DataId::new(ACCOUNT_ADDRESS, class);

    store.import(&id, b"round trip secret").expect("import");
    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"round trip secret");
}

#[test]
fn test_initialization_lifecycle() {
    let store = store_for(ProtectionClass::Sensitive);
    assert!(!store.is_initialized());

    store.initialize_key_store().expect("initialize");
    assert!(store.is_initialized());

    store.delete_all_keys().expect("delete");
    assert!(!store.is_initialized());

    // The cycle can start over.
    store.initialize_key_store().expect("re-initialize");
    assert!(store.is_initialized());
}

#[test]
fn test_initialize_twice_is_rejected() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let result = store.initialize_key_store();
    assert!(matches!(result, Err(KeyStoreError::AlreadyInitialized)));

    // The original hierarchy is intact.
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");
    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"secret");
}

#[test]
fn test_operations_before_initialization_fail() {
    let store = store_for(ProtectionClass::Data);
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Data);

    assert!(matches!(
        store.import(&id, b"secret"),
        Err(KeyStoreError::NotInitialized)
    ));
    assert!(matches!(
        store.find(&id, None),
        Err(KeyStoreError::NotInitialized)
    ));
    assert!(matches!(
        store.change_password(None, Some("pw"), false),
        Err(KeyStoreError::NotInitialized)
    ));
}

#[test]
fn test_protection_class_isolation() {
    // Both classes share one item store; the same id resolves independently
    // in each.
    let item_store = Arc::new(MemorySecureItemStore::new());
    let sensitive = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Sensitive);
    let data = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Data);
    sensitive.initialize_key_store().expect("initialize");
    data.initialize_key_store().expect("initialize");

    let sensitive_id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    let data_id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Data);
    sensitive.import(&sensitive_id, b"secret A").expect("import");
    data.import(&data_id, b"secret B").expect("import");

    let found = sensitive
        .find(&sensitive_id, None)
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"secret A");
    let found = data.find(&data_id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"secret B");

    // Deleting one class leaves the other untouched.
    sensitive.delete_all_keys().expect("delete");
    assert!(!sensitive.is_initialized());
    assert!(data.is_initialized());
    let found = data.find(&data_id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"secret B");
}

#[test]
fn test_import_overwrites_existing_item() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);

    store.import(&id, b"first").expect("import");
    store.import(&id, b"second").expect("re-import");

    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"second");
}

#[test]
fn test_find_missing_item_returns_none() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let id = DataId::new("0xunknown", ProtectionClass::Sensitive);

    let found = store.find(&id, None).expect("find");
    assert!(found.is_none());
}

#[test]
fn test_find_missing_item_skips_authentication() {
    let store = initialized_store(ProtectionClass::Sensitive);
    store
        .change_password(None, Some("test123"), false)
        .expect("set password");

    // Absence is answered without consulting the credential, so a wrong (or
    // missing) password still yields None rather than an error.
    let id = DataId::new("0xunknown", ProtectionClass::Sensitive);
    assert!(store.find(&id, None).expect("find").is_none());
    assert!(store.find(&id, Some("wrong")).expect("find").is_none());
}

#[test]
fn test_password_rotation_preserves_items() {
    let item_store = Arc::new(MemorySecureItemStore::new());
    let store = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Sensitive);
    store.initialize_key_store().expect("initialize");

    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"durable secret").expect("import");

    let item_namespace = ProtectionClass::Sensitive.item_namespace();
    let original_ciphertext = item_store
        .find_blob(&item_namespace, ACCOUNT_ADDRESS)
        .expect("read item")
        .expect("present");

    store
        .change_password(None, Some("test123"), false)
        .expect("none -> password");
    let found = store
        .find(&id, Some("test123"))
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"durable secret");

    store
        .change_password(Some("test123"), Some("random"), false)
        .expect("password -> password");
    let found = store
        .find(&id, Some("random"))
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"durable secret");

    store
        .change_password(Some("random"), None, false)
        .expect("password -> none");
    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"durable secret");

    // Rotation never rewrites item ciphertexts.
    let final_ciphertext = item_store
        .find_blob(&item_namespace, ACCOUNT_ADDRESS)
        .expect("read item")
        .expect("present");
    assert_eq!(final_ciphertext, original_ciphertext);
}

#[test]
fn test_wrong_rotation_credential_is_rejected() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");
    store
        .change_password(None, Some("test123"), false)
        .expect("set password");

    let result = store.change_password(Some("wrong-value"), Some("random"), false);
    assert!(matches!(result, Err(KeyStoreError::AuthenticationFailure)));

    // The failed rotation left the hierarchy untouched: the old credential
    // still opens the item, the attempted new one does not.
    let found = store
        .find(&id, Some("test123"))
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"secret");
    assert!(matches!(
        store.find(&id, Some("random")),
        Err(KeyStoreError::AuthenticationFailure)
    ));
}

#[test]
fn test_find_with_wrong_password_is_rejected() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");
    store
        .change_password(None, Some("test123"), false)
        .expect("set password");

    assert!(matches!(
        store.find(&id, Some("wrong")),
        Err(KeyStoreError::AuthenticationFailure)
    ));
    assert!(matches!(
        store.find(&id, None),
        Err(KeyStoreError::AuthenticationFailure)
    ));
}

#[test]
fn test_import_never_requires_credential() {
    let store = initialized_store(ProtectionClass::Sensitive);
    store
        .change_password(None, Some("test123"), false)
        .expect("set password");

    // Writing stays credential-free after a password is set; only reading
    // needs it.
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"written without credential").expect("import");

    let found = store
        .find(&id, Some("test123"))
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"written without credential");
}

#[test]
fn test_biometry_gated_find() {
    let item_store = Arc::new(MemorySecureItemStore::new());
    let store = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Sensitive);
    store.initialize_key_store().expect("initialize");

    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");
    store
        .change_password(None, None, true)
        .expect("enable biometry");

    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"secret");

    // A dismissed prompt surfaces as an authentication failure.
    item_store.set_biometric_outcome(BiometricOutcome::Deny);
    assert!(matches!(
        store.find(&id, None),
        Err(KeyStoreError::AuthenticationFailure)
    ));

    item_store.set_biometric_outcome(BiometricOutcome::Approve);
    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), b"secret");
}

#[test]
fn test_password_and_biometry_both_required() {
    let item_store = Arc::new(MemorySecureItemStore::new());
    let store = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Sensitive);
    store.initialize_key_store().expect("initialize");

    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");
    store
        .change_password(None, Some("test123"), true)
        .expect("enable both factors");

    let found = store
        .find(&id, Some("test123"))
        .expect("find")
        .expect("present");
    assert_eq!(found.as_slice(), b"secret");

    // Either factor alone is insufficient.
    assert!(matches!(
        store.find(&id, None),
        Err(KeyStoreError::AuthenticationFailure)
    ));
    item_store.set_biometric_outcome(BiometricOutcome::Deny);
    assert!(matches!(
        store.find(&id, Some("test123")),
        Err(KeyStoreError::AuthenticationFailure)
    ));
}

#[test]
fn test_delete_all_keys_removes_items() {
    let item_store = Arc::new(MemorySecureItemStore::new());
    let store = ProtectedKeyStore::new(Arc::clone(&item_store), ProtectionClass::Sensitive);
    store.initialize_key_store().expect("initialize");

    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    store.import(&id, b"secret").expect("import");

    store.delete_all_keys().expect("delete");

    let item_namespace = ProtectionClass::Sensitive.item_namespace();
    assert!(item_store.blob_accounts(&item_namespace).is_empty());

    // A fresh hierarchy observes no stale entries.
    store.initialize_key_store().expect("re-initialize");
    assert!(store.find(&id, None).expect("find").is_none());
}

#[test]
fn test_concrete_import_find_scenario() {
    let store = initialized_store(ProtectionClass::Sensitive);
    let id = DataId::new(ACCOUNT_ADDRESS, ProtectionClass::Sensitive);
    let secret =
        hex::decode("da18066dda40499e6ef67a392eda0fd90acf804448a765db9fa9b6e7dd15c322")
            .expect("valid hex");

    store.import(&id, &secret).expect("import");
    let found = store.find(&id, None).expect("find").expect("present");
    assert_eq!(found.as_slice(), secret.as_slice());
}
