//! A protocol-parameterized runtime for secure two-party computation.
//!
//! The [`engine::Engine`] interprets packed physical instruction streams
//! over opaque wire labels, synthesizing multi-bit arithmetic, comparison
//! and selection circuits from the gate operations of a pluggable
//! [`protocol::Protocol`] backend. Two backends ship with the crate:
//! cleartext evaluation ([`plaintext::Plaintext`]) and the semi-honest
//! two-party half-gates garbled circuit protocol
//! ([`halfgates::HalfGatesGarbler`] / [`halfgates::HalfGatesEvaluator`])
//! with free XOR and two ciphertexts per AND gate.
//!
//! [`cluster::ClusterNetwork`] bootstraps the fully connected mesh of
//! byte channels that distributed deployments run on.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod aes_rng;
pub mod bitfile;
pub mod block;
pub mod channel;
pub mod cluster;
pub mod engine;
pub mod halfgates;
pub mod instruction;
pub mod memory;
pub mod plaintext;
pub mod protocol;

mod crypto;
