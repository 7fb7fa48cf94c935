//! # Storage Demo
//!
//! Encrypted key/value storage bound to a device identifier.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example storage_demo
//! ```

use warden_core::storage::{FixedDeviceId, KeyValueStore, SecureStorage};
use warden_core::CoreConfig;

fn main() {
    println!("=== Warden Core: Secure Storage Demo ===\n");

    // Step 1: Derive the storage codec from the device identifier
    println!("Step 1: Opening storage bound to this device...");
    let device = FixedDeviceId::new("6F9619FF-8B86-D011-B42D-00C04FC964FF");
    let codec = CoreConfig::default()
        .storage_codec(&device)
        .expect("Failed to derive storage key");
    let storage = SecureStorage::in_memory(codec).with_hard_mode(true);
    println!("  ✓ Storage ready (hard mode: random nonce per value)");
    println!();

    // Step 2: Write a few entries
    println!("Step 2: Writing entries...");
    storage
        .multi_set(&[
            ("session-token", "eyJhbGciOi..."),
            ("prefs", r#"{"theme":"dark","alerts":{"email":true}}"#),
        ])
        .expect("Failed to write");
    storage
        .merge_item("prefs", r#"{"alerts":{"sms":false}}"#)
        .expect("Failed to merge");
    println!("  ✓ Wrote session-token and prefs");
    println!();

    // Step 3: What the backing store actually holds
    println!("Step 3: Backing store contents (ciphertext only)...");
    for sealed_key in storage.store().keys().expect("keys") {
        let sealed_value = storage
            .store()
            .get(&sealed_key)
            .expect("get")
            .unwrap_or_default();
        println!("  {}  =>  {}...", sealed_key, &sealed_value[..24]);
    }
    println!();

    // Step 4: Read back through the facade
    println!("Step 4: Reading back...");
    for (key, value) in storage
        .multi_get(&["session-token", "prefs", "missing"])
        .expect("Failed to read")
    {
        println!("  {} = {:?}", key, value);
    }

    println!("\n=== Demo Complete ===");
}
