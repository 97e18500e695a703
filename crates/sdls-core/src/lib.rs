//! SDLS protocol engine.
//!
//! Applies and removes cryptographic protection on telecommand transfer
//! frames, and interprets the in-band extended procedures that manage
//! keys and security associations.
//!
//! ```text
//! outbound frame ──► apply_security ──► SA lookup ──► counter bump
//!                                             │
//!                                             ▼
//!                                   AEAD / MAC ──► frame + FECF
//!
//! inbound frame ──► process_security ──► SPI / state / channel checks
//!                                             │
//!                          FECF ──► anti-replay ──► tag verification
//!                                             │
//!                              counter commit ──► plaintext
//!                                             │
//!                         (APID 0x080) ──► extended procedures ──► reply
//! ```
//!
//! All state lives in one [`CryptoContext`] built at initialization:
//! configuration and managed parameters, the SA store, the key ring, the
//! primitive provider, the event log, and the FSR/CLCW report state.
//! There are no globals. Rejected frames leave their SA byte-for-byte
//! unchanged; accepted frames commit their counter before the plaintext
//! is released.
//!
//! # Security
//!
//! - Anti-replay: per-SA monotonic counters with a bounded acceptance
//!   window; gaps are tolerated, reuse is not.
//! - Key separation: master keys protect OTAR uploads only and cannot be
//!   transitioned or replaced over the air.
//! - Every rejection is a typed error, mirrored into the frame security
//!   report and the bounded event log for the ground to read back.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod context;
pub mod counter;
pub mod error;
pub mod fault;
pub mod key_ring;
pub mod log;
pub mod procedures;
pub mod report;
pub mod sa;
pub mod store;
pub mod tc;

pub use config::{Config, ManagedParameters, ProviderKind, SaStoreKind};
pub use context::CryptoContext;
pub use counter::{Counter, MAX_COUNTER_LEN};
pub use error::{ProcessingError, status};
pub use key_ring::{KEY_RING_SIZE, KeyRing, KeyState, MASTER_KEY_THRESHOLD};
pub use log::{EventEntry, EventLog, EventType, LOG_CAPACITY, LogSummary};
pub use sa::{
    AuthenticationSuite, ChannelBinding, EncryptionSuite, SaState, SecurityAssociation,
};
pub use store::{InMemorySaStore, NUM_SA, SaStore};
pub use tc::ProcessedFrame;
