use std::sync::Arc;

use atrest::{
    Capabilities, Context, Engine, Error, FileStore, KdfParams, KeyValueStore, Keyring,
    MemoryStore, ReEncryptor, Value,
};
use proptest::prelude::*;
use tempfile::tempdir;

fn keyring() -> Keyring<MemoryStore> {
    Keyring::with_kdf(MemoryStore::new(), KdfParams::pbkdf2(1_000).unwrap())
}

fn open(keyring: &Keyring<impl KeyValueStore>, user: &str, password: &str) -> Context {
    keyring
        .open(user, password)
        .unwrap()
        .expect("credentials should match")
}

// --------------------------------------------------
// OPEN / CLOSE
// --------------------------------------------------

#[test]
fn bubba_scenario() {
    let keyring = keyring();
    let ctx = open(&keyring, "bubba", "unguessable");

    let value = Value::from(serde_json::json!({"a": 3, "b": ["apple", 95], "c": {"x": 85}}));
    let envelope = atrest::encrypt_value(&ctx, &value, None).unwrap();

    assert_eq!(atrest::decrypt_value(&ctx, &envelope, None).unwrap(), value);
}

#[test]
fn open_is_idempotent() {
    let keyring = keyring();
    let first = open(&keyring, "alice", "secret");
    let second = open(&keyring, "alice", "secret");

    let envelope = atrest::encrypt_bytes(&first, b"shared").unwrap();
    assert_eq!(
        *atrest::decrypt_bytes(&second, &envelope).unwrap(),
        b"shared".to_vec()
    );
}

#[test]
fn credential_mismatch_returns_none() {
    let keyring = keyring();
    open(&keyring, "alice", "secret");

    assert!(keyring.open("alice", "wrong").unwrap().is_none());
    assert!(keyring.open("bob", "secret").unwrap().is_none());
}

#[test]
fn closed_context_refuses_every_operation() {
    let keyring = keyring();
    let mut ctx = open(&keyring, "alice", "secret");
    let envelope = atrest::encrypt_bytes(&ctx, b"data").unwrap();

    atrest::close(&mut ctx);

    assert!(ctx.is_clear());
    assert!(matches!(ctx.dangerously_get_key(), Err(Error::ContextClosed)));
    assert!(matches!(
        atrest::encrypt_bytes(&ctx, b"data"),
        Err(Error::ContextClosed)
    ));
    assert!(matches!(
        atrest::decrypt_bytes(&ctx, &envelope),
        Err(Error::ContextClosed)
    ));
    assert!(matches!(
        atrest::decrypt_value(&ctx, &envelope, None),
        Err(Error::ContextClosed)
    ));
}

#[test]
fn context_debug_does_not_leak_key() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");
    let key = ctx.dangerously_get_key().unwrap();

    let printed = format!("{ctx:?} {key:?}");
    assert!(printed.contains("alice"));
    assert!(printed.contains("redacted"));
}

// --------------------------------------------------
// ENVELOPES
// --------------------------------------------------

#[test]
fn nonces_are_fresh() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");
    let value = Value::from("same plaintext");

    let a = atrest::encrypt_value(&ctx, &value, None).unwrap();
    let b = atrest::encrypt_value(&ctx, &value, None).unwrap();
    assert_ne!(a, b);
}

#[test]
fn wrong_key_is_rejected() {
    let a = keyring();
    let b = keyring();
    let ctx_a = open(&a, "alice", "secret");
    let ctx_b = open(&b, "alice", "secret");

    let envelope = atrest::encrypt_bytes(&ctx_a, b"data").unwrap();
    assert!(matches!(
        atrest::decrypt_bytes(&ctx_b, &envelope),
        Err(Error::DecryptionFailed)
    ));
}

#[test]
fn truncated_envelope_is_rejected() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");

    assert!(matches!(
        atrest::decrypt_bytes(&ctx, "AAAA"),
        Err(Error::DecryptionFailed)
    ));
}

#[test]
fn special_values_roundtrip_through_envelopes() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");

    for value in [
        Value::Null,
        Value::Undefined,
        Value::Number(f64::NAN),
        Value::Number(f64::INFINITY),
        Value::Number(f64::NEG_INFINITY),
        Value::Array(vec![
            Value::from("a"),
            Value::from(35),
            Value::Undefined,
            Value::Number(f64::NAN),
            Value::Array(vec![Value::Null]),
        ]),
        Value::object([
            ("blah", Value::from(35)),
            ("inf", Value::Number(f64::NEG_INFINITY)),
            ("nested", Value::object([("u", Value::Undefined)])),
        ]),
    ] {
        let envelope = atrest::encrypt_value(&ctx, &value, None).unwrap();
        assert_eq!(atrest::decrypt_value(&ctx, &envelope, None).unwrap(), value);
    }
}

#[test]
fn deeply_nested_values_never_produce_unreadable_envelopes() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");
    let nested = |depth| (0..depth).fold(Value::Null, |inner, _| Value::Array(vec![inner]));

    let deepest = nested(atrest::value::MAX_DEPTH);
    let envelope = atrest::encrypt_value(&ctx, &deepest, None).unwrap();
    assert_eq!(
        atrest::decrypt_value(&ctx, &envelope, None).unwrap(),
        deepest
    );

    assert!(matches!(
        atrest::encrypt_value(&ctx, &nested(200), None),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn object_field_order_survives_envelopes() {
    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");
    let value = Value::object([
        ("zebra", Value::from(1)),
        ("apple", Value::Undefined),
        ("mango", Value::from("m")),
    ]);

    let envelope = atrest::encrypt_value(&ctx, &value, None).unwrap();
    let Value::Object(fields) = atrest::decrypt_value(&ctx, &envelope, None).unwrap() else {
        panic!("expected an object");
    };
    assert_eq!(
        fields.keys().collect::<Vec<_>>(),
        vec!["zebra", "apple", "mango"]
    );
}

// --------------------------------------------------
// ROTATION
// --------------------------------------------------

#[test]
fn rotation_success_moves_data_to_new_credentials() {
    let keyring = keyring();
    let mut old = open(&keyring, "alice", "one");
    let stored = atrest::encrypt_value(&old, &Value::from("X"), None).unwrap();
    keyring.store().set("app_data", &stored).unwrap();

    let new = keyring
        .change_credentials_and_re_encrypt(&mut old, "alice", "two", |old, new| {
            let envelope = keyring.store().get("app_data")?.unwrap_or_default();
            let moved = ReEncryptor::new(old, new)?.re_encrypt(&envelope)?;
            keyring.store().set("app_data", &moved)?;
            Ok::<_, Error>(true)
        })
        .unwrap();

    assert!(old.is_clear());
    assert!(keyring.open("alice", "one").unwrap().is_none());

    let reopened = open(&keyring, "alice", "two");
    let migrated = keyring.store().get("app_data").unwrap().unwrap();
    assert_eq!(
        atrest::decrypt_value(&reopened, &migrated, None).unwrap(),
        Value::from("X")
    );
    assert_eq!(
        atrest::decrypt_value(&new, &migrated, None).unwrap(),
        Value::from("X")
    );
}

#[test]
fn rotation_declined_changes_nothing() {
    let keyring = keyring();
    let mut old = open(&keyring, "alice", "one");
    let stored = atrest::encrypt_value(&old, &Value::from("X"), None).unwrap();
    let proof_before = keyring.store().get(atrest::CREDENTIAL_PROOF).unwrap();

    let result =
        keyring.change_credentials_and_re_encrypt(&mut old, "alice", "two", |_, _| {
            Ok::<_, Error>(false)
        });

    assert!(matches!(
        result,
        Err(Error::ReEncryptionFailed { source: None })
    ));
    assert!(!old.is_clear());
    assert_eq!(
        keyring.store().get(atrest::CREDENTIAL_PROOF).unwrap(),
        proof_before
    );
    assert_eq!(
        atrest::decrypt_value(&old, &stored, None).unwrap(),
        Value::from("X")
    );
    assert!(keyring.open("alice", "one").unwrap().is_some());
    assert!(keyring.open("alice", "two").unwrap().is_none());
}

#[test]
fn rotation_callback_error_changes_nothing() {
    let keyring = keyring();
    let mut old = open(&keyring, "alice", "one");

    let result = keyring.change_credentials_and_re_encrypt(
        &mut old,
        "alice",
        "two",
        |_, _| -> Result<bool, std::io::Error> { Err(std::io::Error::other("disk full")) },
    );

    let err = result.unwrap_err();
    assert!(matches!(err, Error::ReEncryptionFailed { source: Some(_) }));
    assert!(std::error::Error::source(&err).is_some());
    assert!(!old.is_clear());
    assert!(keyring.open("alice", "one").unwrap().is_some());
}

// --------------------------------------------------
// ENGINE
// --------------------------------------------------

fn predictable_random(buf: &mut [u8]) -> atrest::Result<()> {
    buf.fill(0);
    Ok(())
}

#[test]
fn tampered_engine_blocks_open_and_encrypt() {
    let engine = Arc::new(Engine::new(Capabilities::system()));
    let keyring = keyring().with_engine(engine.clone());
    let ctx = open(&keyring, "alice", "secret");

    engine.rebind(Capabilities {
        fill_random: Some(predictable_random),
        ..Capabilities::system()
    });

    assert!(matches!(
        atrest::encrypt_bytes(&ctx, b"data"),
        Err(Error::TamperedEngine)
    ));
    assert!(matches!(
        keyring.open("alice", "secret"),
        Err(Error::TamperedEngine)
    ));

    engine.rebind(Capabilities::system());
    assert!(atrest::encrypt_bytes(&ctx, b"data").is_ok());
}

#[test]
fn engine_without_primitives_is_unsupported() {
    let engine = Arc::new(Engine::new(Capabilities {
        seal: None,
        ..Capabilities::system()
    }));
    let keyring = keyring().with_engine(engine);

    assert!(matches!(
        keyring.open("alice", "secret"),
        Err(Error::UnsupportedEngine)
    ));
}

// --------------------------------------------------
// PERSISTENCE
// --------------------------------------------------

#[test]
fn corrupted_proof_is_reported() {
    let keyring = keyring();
    open(&keyring, "alice", "secret");
    keyring
        .store()
        .set(atrest::CREDENTIAL_PROOF, "not base64!")
        .unwrap();

    assert!(matches!(
        keyring.open("alice", "secret"),
        Err(Error::CorruptState(_))
    ));
}

#[test]
fn file_store_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("atrest.json");
    let kdf = KdfParams::pbkdf2(1_000).unwrap();

    let envelope = {
        let keyring = Keyring::with_kdf(FileStore::new(path.clone()), kdf);
        let ctx = open(&keyring, "bubba", "unguessable");
        atrest::encrypt_value(&ctx, &Value::from("I am terrified of clowns."), None).unwrap()
    };

    let keyring = Keyring::with_kdf(FileStore::new(path), kdf);
    assert!(keyring.is_initialized().unwrap());
    assert!(keyring.open("bubba", "wrong").unwrap().is_none());

    let ctx = open(&keyring, "bubba", "unguessable");
    assert_eq!(
        atrest::decrypt_value(&ctx, &envelope, None).unwrap(),
        Value::from("I am terrified of clowns.")
    );
}

#[test]
fn objects_roundtrip_through_serde() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Profile {
        name: String,
        age: u32,
        scores: Vec<f64>,
    }

    let keyring = keyring();
    let ctx = open(&keyring, "alice", "secret");
    let profile = Profile {
        name: "Alice".to_string(),
        age: 42,
        scores: vec![1.5, -3.0],
    };

    let envelope = atrest::encrypt_object(&ctx, &profile).unwrap();
    let back: Profile = atrest::decrypt_object(&ctx, &envelope).unwrap();
    assert_eq!(back, profile);
}

// --------------------------------------------------
// PROPERTIES
// --------------------------------------------------

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        Just(Value::Number(f64::NAN)),
        Just(Value::Number(f64::INFINITY)),
        Just(Value::Number(f64::NEG_INFINITY)),
        ".*".prop_map(Value::String),
        ".*".prop_map(|s| Value::String(format!("\u{0}{s}"))),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{0,6}", inner, 0..4)
                .prop_map(|fields| Value::object(fields)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_value_roundtrips(value in arb_value()) {
        let keyring = Keyring::with_kdf(MemoryStore::new(), KdfParams::pbkdf2(1).unwrap());
        let ctx = open(&keyring, "p", "q");

        let envelope = atrest::encrypt_value(&ctx, &value, None).unwrap();
        prop_assert_eq!(atrest::decrypt_value(&ctx, &envelope, None).unwrap(), value);
    }

    #[test]
    fn any_bytes_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let keyring = Keyring::with_kdf(MemoryStore::new(), KdfParams::pbkdf2(1).unwrap());
        let ctx = open(&keyring, "p", "q");

        let envelope = atrest::encrypt_bytes(&ctx, &data).unwrap();
        prop_assert_eq!(atrest::decrypt_bytes(&ctx, &envelope).unwrap().to_vec(), data);
    }
}
