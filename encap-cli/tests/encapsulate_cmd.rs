#![forbid(unsafe_code)]

use assert_cmd::prelude::*;
use encap_crypto::{Algorithm, PublicKey};
use ml_kem::kem::Decapsulate;
use ml_kem::{Ciphertext, EncodedSizeUser, KemCore, MlKem1024, MlKem512, MlKem768};
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn run_encap(key: &Path, secret: &Path, ct: &Path) -> Command {
    let mut cmd = Command::cargo_bin("encap").unwrap();
    cmd.arg("-k").arg(key).arg("-s").arg(secret).arg("-c").arg(ct);
    cmd
}

fn roundtrip<K: KemCore>(alg: Algorithm) {
    let dir = tempdir().unwrap();
    let (dk, ek) = K::generate(&mut rand::rngs::OsRng);
    let key = PublicKey::from_bytes(alg, &ek.as_bytes()).unwrap();
    let key_path = dir.path().join("ek.pem");
    std::fs::write(&key_path, key.to_pem().unwrap()).unwrap();
    let secret = dir.path().join("secret.bin");
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, &secret, &ct)
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));

    let secret_bytes = std::fs::read(&secret).unwrap();
    let ct_bytes = std::fs::read(&ct).unwrap();
    assert_eq!(secret_bytes.len(), alg.shared_secret_size());
    assert_eq!(ct_bytes.len(), alg.ciphertext_size());

    let ct = Ciphertext::<K>::try_from(ct_bytes.as_slice()).unwrap();
    let recovered = dk.decapsulate(&ct).unwrap();
    assert_eq!(recovered.as_slice(), secret_bytes.as_slice());
}

#[test]
fn writes_decapsulatable_outputs_for_every_parameter_set() {
    roundtrip::<MlKem512>(Algorithm::MlKem512);
    roundtrip::<MlKem768>(Algorithm::MlKem768);
    roundtrip::<MlKem1024>(Algorithm::MlKem1024);
}

#[test]
fn reruns_produce_fresh_outputs() {
    let dir = tempdir().unwrap();
    let (_, ek) = MlKem768::generate(&mut rand::rngs::OsRng);
    let key = PublicKey::from_bytes(Algorithm::MlKem768, &ek.as_bytes()).unwrap();
    let key_path = dir.path().join("ek.pem");
    std::fs::write(&key_path, key.to_pem().unwrap()).unwrap();

    let mut runs = Vec::new();
    for i in 0..2 {
        let secret = dir.path().join(format!("secret{i}.bin"));
        let ct = dir.path().join(format!("ct{i}.bin"));
        run_encap(&key_path, &secret, &ct).assert().success();
        runs.push((std::fs::read(secret).unwrap(), std::fs::read(ct).unwrap()));
    }
    assert_ne!(runs[0].0, runs[1].0);
    assert_ne!(runs[0].1, runs[1].1);
}

#[test]
fn der_key_form() {
    let dir = tempdir().unwrap();
    let (_, ek) = MlKem512::generate(&mut rand::rngs::OsRng);
    let key = PublicKey::from_bytes(Algorithm::MlKem512, &ek.as_bytes()).unwrap();
    let key_path = dir.path().join("ek.der");
    std::fs::write(&key_path, key.to_der().unwrap()).unwrap();
    let secret = dir.path().join("secret.bin");
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, &secret, &ct).arg("--key-form").arg("der").assert().success();
    assert_eq!(std::fs::metadata(&ct).unwrap().len(), 768);

    // same file without the flag is not PEM
    run_encap(&key_path, &secret, &ct)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid public key"));
    assert_eq!(std::fs::metadata(&ct).unwrap().len(), 0);
}

#[test]
fn missing_key_file_leaves_outputs_empty() {
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("absent.pem");
    let secret = dir.path().join("secret.bin");
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, &secret, &ct)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("operation failed"))
        .stderr(predicate::str::contains("can't load key file"))
        .stderr(predicate::str::contains("absent.pem").count(1));
    assert_eq!(std::fs::metadata(&secret).unwrap().len(), 0);
    assert_eq!(std::fs::metadata(&ct).unwrap().len(), 0);
}

#[test]
fn garbage_key_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("ek.pem");
    std::fs::write(&key_path, "this is not a key\n").unwrap();
    let secret = dir.path().join("secret.bin");
    let ct = dir.path().join("ct.bin");
    std::fs::write(&secret, b"previous contents").unwrap();

    run_encap(&key_path, &secret, &ct)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid public key"));
    assert_eq!(std::fs::metadata(&secret).unwrap().len(), 0);
    assert_eq!(std::fs::metadata(&ct).unwrap().len(), 0);
}

#[test]
fn non_kem_public_key_is_rejected() {
    // P-256 SPKI
    let pem = "-----BEGIN PUBLIC KEY-----\n\
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEGQJmC7xJ2Wq7xbUSyfoONP8fCG4E\n\
fS8Ol3r6Vh1jkSkSyFlpmS6P8YcjHKXxcYgI+7JCFGs5qt7bc7BiGdPW2Q==\n\
-----END PUBLIC KEY-----\n";
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("ec.pem");
    std::fs::write(&key_path, pem).unwrap();
    let secret = dir.path().join("secret.bin");
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, &secret, &ct)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported key algorithm: 1.2.840.10045.2.1"));
}

#[test]
fn unwritable_output_fails_before_reading_key() {
    let dir = tempdir().unwrap();
    let key_path = dir.path().join("absent.pem");
    let secret = dir.path().join("no-such-dir").join("secret.bin");
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, &secret, &ct)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("can't open output file"))
        .stderr(predicate::str::contains("absent.pem").not());
}

#[cfg(target_os = "linux")]
#[test]
fn full_device_for_secret_is_a_write_error() {
    let dir = tempdir().unwrap();
    let (_, ek) = MlKem768::generate(&mut rand::rngs::OsRng);
    let key = PublicKey::from_bytes(Algorithm::MlKem768, &ek.as_bytes()).unwrap();
    let key_path = dir.path().join("ek.pem");
    std::fs::write(&key_path, key.to_pem().unwrap()).unwrap();
    let ct = dir.path().join("ct.bin");

    run_encap(&key_path, Path::new("/dev/full"), &ct)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("done").not())
        .stderr(predicate::str::contains("operation failed"))
        .stderr(predicate::str::contains("error writing secret"));
}
