//! Coin selection and transaction assembly for on-chain data embedding.
//!
//! This crate builds unsigned Bitcoin transactions that smuggle arbitrary
//! payloads — stamp image data, SRC-20 token messages — through otherwise
//! unused script fields, while selecting inputs that cover the outputs plus
//! a correctly-estimated miner fee at minimal long-term cost.
//!
//! ## Components
//!
//! - [`size`] / [`fee_rate`] — pure virtual-size and fee arithmetic per
//!   script type, with a selectable reduced sizing profile.
//! - [`selection`] — multi-strategy coin selection (branch and bound,
//!   knapsack, single random draw, largest first) ranked by a waste metric.
//! - [`payload`] — framing, RC4 keystreaming and chunking of payloads into
//!   bare-multisig or fake-P2WSH data outputs.
//! - [`builder`] — the per-request pipeline orchestrating the above into a
//!   [`TransactionPlan`] and PSBT, live or as a dry-run preview.
//! - [`provider`] — the async boundary contracts for UTXO and issuance data;
//!   implementations live outside this crate.
//!
//! ## Quick start
//!
//! ```no_run
//! use bitcoin::Network;
//! use stamps_bitcoin_transactions::builder::{BuildRequest, Embedding, TransactionBuilder};
//! use stamps_bitcoin_transactions::fee_rate::FeeRate;
//! # use stamps_bitcoin_transactions::provider::UtxoProvider;
//! # async fn demo(provider: &dyn UtxoProvider) -> Result<(), Box<dyn std::error::Error>> {
//! let builder = TransactionBuilder::new(provider, Network::Bitcoin);
//!
//! let mut request = BuildRequest::new(
//!     "bc1qsource...",
//!     "bc1qdestination...",
//!     FeeRate::try_from(12.5)?,
//! );
//! request.payload = br#"{"p":"src-20","op":"mint","tick":"KEVIN","amt":"1000"}"#.to_vec();
//! request.embedding = Embedding::FakeP2wsh;
//!
//! let output = builder.build(&request).await?;
//! println!("fee: {} sats, psbt: {}", output.plan.fee, output.psbt_base64.unwrap());
//! # Ok(())
//! # }
//! ```
//!
//! ## What this crate does not do
//!
//! Signing, broadcasting, confirmation tracking and key management are out
//! of scope, as is any UTXO reservation: two concurrent builds over the same
//! address may select the same coins.

pub mod builder;
pub mod constants;
mod dry_run;
pub mod error;
pub mod fee_rate;
pub mod issuance;
pub mod payload;
pub mod provider;
pub mod script_type;
pub mod selection;
pub mod size;
pub mod utxo;

pub use builder::{
    BuildOutput, BuildRequest, BuildStep, BuilderConfig, Embedding, InputToSign, PlannedOutput,
    TransactionBuilder, TransactionPlan,
};
pub use error::EngineError;
pub use fee_rate::FeeRate;
pub use issuance::extract_issuance_outputs;
pub use provider::{FetchOptions, IssuanceApi, IssuanceRequest, UtxoProvider};
pub use script_type::ScriptType;
pub use selection::{select_utxos, SelectionOptions};
pub use size::{estimate_vsize, OutputKind, SizeProfile};
pub use utxo::{
    AncestorInfo, KeystreamSeed, OutputRole, OutputTarget, RequestedOutput, SelectionResult, Utxo,
};
