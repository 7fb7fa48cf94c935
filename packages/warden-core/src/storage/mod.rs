//! # Storage Module
//!
//! Encryption for data at rest. Persistence itself belongs to the host; this
//! module seals what the host stores and opens what it reads back.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Device Identifier (device.rs)                                  │   │
//! │  │  ─────────────────────────────                                  │   │
//! │  │  Platform install id, hyphens stripped. Default storage secret. │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 ▼                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Storage Codec (codec.rs)                                       │   │
//! │  │  ────────────────────────                                       │   │
//! │  │  secret → AES key; keys sealed device-bound, values sealed      │   │
//! │  │  device-bound or hard (random nonce).                           │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 ▼                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Secure Storage (secure_store.rs)                               │   │
//! │  │  ────────────────────────────────                               │   │
//! │  │  set/get/merge/remove/multi*/clear over a KeyValueStore         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Format
//!
//! Every stored key and value is `base64(nonce(12) || ciphertext || tag(16))`.

mod codec;
mod device;
mod secure_store;

pub use codec::{decode_entry, decrypt_value, encode_entry, encrypt_value, DecodePolicy, StorageCodec};
pub use device::{normalize_device_id, DeviceIdSource, FixedDeviceId, MachineIdSource, MACHINE_ID_PATHS};
pub use secure_store::{merge_json, KeyValueStore, MemoryStore, SecureStorage};
