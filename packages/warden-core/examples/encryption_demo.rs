//! # Encryption Demo
//!
//! Key agreement between a device and a backend, then an encrypted and
//! signed exchange over the agreed secret.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example encryption_demo
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use warden_core::crypto::{verify_request_signature, Curve, Mode, SIGNATURE_HEADER};
use warden_core::Session;

fn main() {
    println!("=== Warden Core: Channel Encryption Demo ===\n");

    // Step 1: Both sides generate a key pair on the same curve
    println!("Step 1: Generating P-256 key pairs for device and backend...");

    let device = Session::new();
    let backend = Session::new();

    let device_public = device
        .generate_key_pair(Curve::P256)
        .expect("Failed to generate device key pair");
    let backend_public = backend
        .generate_key_pair(Curve::P256)
        .expect("Failed to generate backend key pair");

    println!("  Device public key:  {}...", &device_public[..24]);
    println!("  Backend public key: {}...", &backend_public[..24]);
    println!();

    // Step 2: Exchange public keys and derive the shared secret
    println!("Step 2: Deriving shared secret (ECDH)...");
    println!();
    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                    KEY AGREEMENT FLOW                       │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │   Device                            Backend                 │");
    println!("  │     │                                  │                    │");
    println!("  │     │──── device public key ──────────►│                    │");
    println!("  │     │◄──── backend public key ─────────│                    │");
    println!("  │     │                                  │                    │");
    println!("  │     ▼                                  ▼                    │");
    println!("  │   ECDH(device sk, backend pk) == ECDH(backend sk, device pk)│");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    let device_secret = device
        .derive_shared_secret(&backend_public)
        .expect("Device failed to derive secret");
    let backend_secret = backend
        .derive_shared_secret(&device_public)
        .expect("Backend failed to derive secret");

    assert_eq!(device_secret, backend_secret);
    println!("  ✓ Both sides hold the same {}-byte secret", STANDARD.decode(&device_secret).map(|s| s.len()).unwrap_or(0));
    println!();

    // Step 3: Encrypt in both modes
    println!("Step 3: Encrypting a payload...");
    let payload = r#"{"transfer":{"to":"acct-7","amount":10}}"#;

    let bound_1 = device.encrypt(payload, Mode::DeviceBound).expect("encrypt");
    let bound_2 = device.encrypt(payload, Mode::DeviceBound).expect("encrypt");
    let shared_1 = device.encrypt(payload, Mode::SharedKey).expect("encrypt");
    let shared_2 = device.encrypt(payload, Mode::SharedKey).expect("encrypt");

    println!("  DeviceBound (fixed nonce):  identical = {}", bound_1 == bound_2);
    println!("  SharedKey  (random nonce):  identical = {}", shared_1 == shared_2);
    println!();

    // Step 4: Backend decrypts
    println!("Step 4: Backend decrypts...");
    let opened = backend
        .decrypt(&shared_1, Mode::SharedKey)
        .expect("Backend failed to decrypt");
    assert_eq!(opened, payload);
    println!("  ✓ {}", opened);
    println!();

    // Step 5: Tampering is detected
    println!("Step 5: Flipping one ciphertext byte...");
    let mut raw = STANDARD.decode(&shared_1).expect("base64");
    raw[14] ^= 0x01;
    match backend.decrypt(&STANDARD.encode(raw), Mode::SharedKey) {
        Ok(_) => println!("  ✗ Tampered message accepted"),
        Err(e) => println!("  ✓ Rejected: {} (code {})", e, e.code()),
    }
    println!();

    // Step 6: Sign a request body
    println!("Step 6: Signing a request body...");
    let signature = device.sign_request("key-1", "req-42", payload.as_bytes());
    println!("  {}: {}...", SIGNATURE_HEADER, &signature[..32]);

    let secret = STANDARD.decode(&backend_secret).expect("base64");
    let header = verify_request_signature(&secret, payload.as_bytes(), &signature)
        .expect("Signature did not verify");
    println!("  ✓ Verified: kid={}, requestId={}", header.kid, header.request_id);

    println!("\n=== Demo Complete ===");
}
