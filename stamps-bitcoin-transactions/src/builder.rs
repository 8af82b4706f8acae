//! Transaction assembly.
//!
//! One request runs the pipeline
//! `ValidateInputs → SelectUtxos → EncodePayload → SizeAndFee(pre) →
//! AssembleOutputs → SizeAndFee(final) → AttachInputs → Done`,
//! failing terminally from any step. The pipeline is logically
//! single-threaded and suspends only at provider boundaries; nothing is
//! shared between concurrent requests and no UTXO is ever reserved, so two
//! concurrent builds over one address can produce conflicting transactions.
//! Callers needing exclusion must lease UTXOs upstream of the engine.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bitcoin::absolute::LockTime;
use bitcoin::psbt::Psbt;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};
use tracing::{debug, info, warn};

use crate::constants::{
    CHANGE_DUST, DEFAULT_OUTPUT_VALUE, MAX_CONTINUOUS_OUTPUT_VALUE, MULTISIG_CHUNK_SIZE,
    RECIPIENT_DUST,
};
use crate::dry_run;
use crate::error::EngineError;
use crate::fee_rate::FeeRate;
use crate::payload;
use crate::provider::{FetchOptions, UtxoProvider};
use crate::script_type::ScriptType;
use crate::selection::{select_utxos, SelectionOptions};
use crate::size::{estimate_vsize, OutputKind, SizeProfile};
use crate::utxo::{OutputRole, RequestedOutput, SelectionResult, Utxo};

/// How the payload is embedded in outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Embedding {
    /// Legacy path: RC4-keystreamed 62-byte chunks in bare multisig outputs.
    BareMultisig,
    /// Modern path: 32-byte units as fake P2WSH witness programs.
    FakeP2wsh,
}

/// Pipeline steps, in execution order. Logged on every transition; any error
/// moves the request to the terminal `Failed` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStep {
    ValidateInputs,
    SelectUtxos,
    EncodePayload,
    SizeAndFeePre,
    AssembleOutputs,
    SizeAndFeeFinal,
    AttachInputs,
    Done,
    Failed,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One embedding-transaction request.
#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub source_address: String,
    pub to_address: String,
    /// Defaults to the source address.
    pub change_address: Option<String>,
    pub service_fee_address: Option<String>,
    /// Service fee in sats; zero disables the output.
    pub service_fee: u64,
    pub fee_rate: FeeRate,
    /// Pre-encoded protocol message or file bytes. Empty is allowed for
    /// plain sends that embed nothing.
    pub payload: Vec<u8>,
    /// Outputs extracted from an externally-composed issuance transaction
    /// (see [`crate::issuance::extract_issuance_outputs`]). Placed after the
    /// recipient output, before the data chunks.
    pub issuance_outputs: Vec<TxOut>,
    pub embedding: Embedding,
    /// Value of each data-chunk output; validated against
    /// `[1, 332] ∪ {333}`. Defaults to the protocol-wide 333.
    pub per_output_value: Option<u64>,
    /// Value of the recipient output.
    pub recipient_value: Option<u64>,
    pub dry_run: bool,
    pub enable_rbf: bool,
}

impl BuildRequest {
    pub fn new(source: &str, to: &str, fee_rate: FeeRate) -> Self {
        BuildRequest {
            source_address: source.to_string(),
            to_address: to.to_string(),
            change_address: None,
            service_fee_address: None,
            service_fee: 0,
            fee_rate,
            payload: Vec::new(),
            issuance_outputs: Vec::new(),
            embedding: Embedding::FakeP2wsh,
            per_output_value: None,
            recipient_value: None,
            dry_run: false,
            enable_rbf: true,
        }
    }
}

/// Builder-level tunables.
#[derive(Clone, Copy, Debug)]
pub struct BuilderConfig {
    /// Change below this is folded into the fee instead of creating an
    /// output.
    pub change_dust: u64,
    pub selection: SelectionOptions,
    /// Sizing profile override; `None` derives it from the per-output value.
    pub size_profile: Option<SizeProfile>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            change_dust: CHANGE_DUST,
            selection: SelectionOptions::default(),
            size_profile: None,
        }
    }
}

/// An output in the final plan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedOutput {
    pub value: u64,
    pub script: ScriptBuf,
    pub role: OutputRole,
}

/// Signing metadata for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputToSign {
    pub index: u32,
    /// Address form of the input's scriptPubKey, when it has one.
    pub address: Option<String>,
}

/// The immutable result of a build: ordered inputs and outputs plus the fee
/// breakdown. Read by the signer hand-off, never mutated.
#[derive(Clone, Debug)]
pub struct TransactionPlan {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<PlannedOutput>,
    pub fee_rate: f64,
    pub fee: u64,
    pub change: u64,
    pub total_input_value: u64,
    pub total_output_value: u64,
    pub total_dust_value: u64,
    pub estimated_vsize: usize,
    pub selection_algorithm: &'static str,
}

/// Everything handed to the signer/UI.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    pub plan: TransactionPlan,
    /// Consensus hex of the unsigned transaction. Absent in dry runs.
    pub unsigned_tx_hex: Option<String>,
    /// PSBT, hex and base64. Absent in dry runs.
    pub psbt_hex: Option<String>,
    pub psbt_base64: Option<String>,
    pub inputs_to_sign: Vec<InputToSign>,
}

/// Check a configured per-output dust value: `1..=332` or exactly `333`.
pub fn validate_output_value(value: u64) -> Result<(), EngineError> {
    if (1..=MAX_CONTINUOUS_OUTPUT_VALUE).contains(&value) || value == DEFAULT_OUTPUT_VALUE {
        Ok(())
    } else {
        Err(EngineError::InvalidOutputValue { value })
    }
}

fn parse_address(
    raw: &str,
    role: &'static str,
    network: Network,
) -> Result<Address, EngineError> {
    raw.parse::<Address<_>>()
        .map_err(|e| EngineError::InvalidAddress {
            role,
            address: raw.to_string(),
            reason: e.to_string(),
        })?
        .require_network(network)
        .map_err(|e| EngineError::InvalidAddress {
            role,
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Assembles unsigned embedding transactions against a UTXO provider.
pub struct TransactionBuilder<'a> {
    provider: &'a dyn UtxoProvider,
    network: Network,
    config: BuilderConfig,
}

struct ValidatedRequest {
    to: Address,
    change: Address,
    service_fee: Option<(Address, u64)>,
    dust_value: u64,
    recipient_value: u64,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(provider: &'a dyn UtxoProvider, network: Network) -> Self {
        TransactionBuilder {
            provider,
            network,
            config: BuilderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full pipeline for one request.
    pub async fn build(&self, request: &BuildRequest) -> Result<BuildOutput, EngineError> {
        match self.run_pipeline(request).await {
            Ok(output) => {
                debug!(step = %BuildStep::Done, "build finished");
                Ok(output)
            }
            Err(err) => {
                warn!(step = %BuildStep::Failed, error = %err, "build failed");
                Err(err)
            }
        }
    }

    async fn run_pipeline(&self, request: &BuildRequest) -> Result<BuildOutput, EngineError> {
        debug!(step = %BuildStep::ValidateInputs, "validating request");
        let validated = self.validate(request)?;
        let profile = self
            .config
            .size_profile
            .unwrap_or_else(|| SizeProfile::for_output_value(validated.dust_value));

        // Chunk count is a pure function of payload length, so the data
        // outputs are known before selection even though their content is
        // not: the keystream needs the first selected input's txid.
        let chunk_count = self.chunk_count(request)?;
        let requested = self.requested_outputs(request, &validated, chunk_count);
        let target: u64 = requested.iter().map(|o| o.value).sum();

        debug!(step = %BuildStep::SelectUtxos, target, chunk_count, dry_run = request.dry_run, "selecting utxos");
        let available = if request.dry_run {
            dry_run::synthesize_utxos(target, request.fee_rate)
        } else {
            let mut utxos = self
                .provider
                .get_spendable_utxos(
                    &request.source_address,
                    FetchOptions {
                        confirmed_only: false,
                        include_ancestors: true,
                    },
                )
                .await?;
            let before = utxos.len();
            utxos.retain(|u| !u.script.is_empty());
            if utxos.len() < before {
                warn!(
                    dropped = before - utxos.len(),
                    "ignoring utxos returned without scriptPubKeys"
                );
            }
            utxos
        };
        let selection = select_utxos(
            &available,
            &requested,
            request.fee_rate,
            &self.config.selection,
        )?;

        debug!(step = %BuildStep::EncodePayload, chunk_count, "encoding payload");
        let data_scripts = self.encode_payload(request, &selection)?;
        debug_assert_eq!(data_scripts.len(), chunk_count);

        debug!(step = %BuildStep::SizeAndFeePre, "provisional size estimate");
        let input_types: Vec<ScriptType> =
            selection.inputs.iter().map(|u| u.script_type).collect();
        let pre_kinds: Vec<OutputKind> = requested.iter().map(|o| o.output_kind()).collect();
        let pre_vsize = estimate_vsize(&input_types, &pre_kinds, selection.change > 0, profile);
        let pre_fee = request.fee_rate.fee(pre_vsize).to_sat();

        debug!(step = %BuildStep::AssembleOutputs, "assembling outputs");
        let mut outputs = self.assemble_outputs(request, &validated, data_scripts);

        debug!(step = %BuildStep::SizeAndFeeFinal, "final size and fee");
        // The actual selected input set may differ from the provisional
        // estimate: recompute from what was really chosen, never from the
        // guess.
        let final_kinds: Vec<OutputKind> = outputs.iter().map(requested_kind).collect();
        let include_change = selection.change > self.config.change_dust;
        let final_vsize = estimate_vsize(&input_types, &final_kinds, include_change, profile);
        let final_fee = request.fee_rate.fee(final_vsize).to_sat();

        let total_input_value = selection.total_input_value();
        let outputs_value: u64 = outputs.iter().map(|o| o.value).sum();
        let mut change = total_input_value
            .checked_sub(outputs_value + final_fee)
            .ok_or(EngineError::InsufficientFunds {
                available: total_input_value,
                required: outputs_value + final_fee,
                target: outputs_value,
                fee: final_fee,
                fee_rate: request.fee_rate.sat_per_vb(),
            })?;

        if change > self.config.change_dust {
            outputs.push(PlannedOutput {
                value: change,
                script: validated.change.script_pubkey(),
                role: OutputRole::Change,
            });
        } else {
            // Sub-dust remainder goes to the miner.
            change = 0;
        }

        if pre_vsize != final_vsize {
            debug!(pre_vsize, final_vsize, pre_fee, final_fee, "size estimate shifted between passes");
        }

        let total_dust_value: u64 = outputs
            .iter()
            .filter(|o| o.role == OutputRole::DataChunk)
            .map(|o| o.value)
            .sum();
        let total_output_value: u64 = outputs.iter().map(|o| o.value).sum();
        let plan = TransactionPlan {
            inputs: selection.inputs.clone(),
            outputs,
            fee_rate: request.fee_rate.sat_per_vb(),
            fee: final_fee,
            change,
            total_input_value,
            total_output_value,
            total_dust_value,
            estimated_vsize: final_vsize,
            selection_algorithm: selection.algorithm,
        };

        if request.dry_run {
            info!(
                vsize = plan.estimated_vsize,
                fee = plan.fee,
                change = plan.change,
                "dry run complete"
            );
            return Ok(BuildOutput {
                plan,
                unsigned_tx_hex: None,
                psbt_hex: None,
                psbt_base64: None,
                inputs_to_sign: Vec::new(),
            });
        }

        debug!(step = %BuildStep::AttachInputs, inputs = plan.inputs.len(), "attaching inputs");
        let (psbt, unsigned_tx) = self.attach_inputs(request, &plan).await?;

        let inputs_to_sign = plan
            .inputs
            .iter()
            .enumerate()
            .map(|(index, utxo)| InputToSign {
                index: index as u32,
                address: Address::from_script(&utxo.script, self.network)
                    .ok()
                    .map(|a| a.to_string()),
            })
            .collect();

        let psbt_bytes = psbt.serialize();
        info!(
            vsize = plan.estimated_vsize,
            fee = plan.fee,
            change = plan.change,
            inputs = plan.inputs.len(),
            outputs = plan.outputs.len(),
            algorithm = plan.selection_algorithm,
            "transaction assembled"
        );
        Ok(BuildOutput {
            plan,
            unsigned_tx_hex: Some(bitcoin::consensus::encode::serialize_hex(&unsigned_tx)),
            psbt_hex: Some(hex::encode(&psbt_bytes)),
            psbt_base64: Some(BASE64.encode(&psbt_bytes)),
            inputs_to_sign,
        })
    }

    fn validate(&self, request: &BuildRequest) -> Result<ValidatedRequest, EngineError> {
        let source = parse_address(&request.source_address, "source", self.network)?;
        let to = parse_address(&request.to_address, "destination", self.network)?;
        let change = match &request.change_address {
            Some(raw) => parse_address(raw, "change", self.network)?,
            None => source.clone(),
        };
        let service_fee = match (&request.service_fee_address, request.service_fee) {
            (Some(raw), fee) if fee > 0 => {
                Some((parse_address(raw, "service-fee", self.network)?, fee))
            }
            _ => None,
        };

        let dust_value = request.per_output_value.unwrap_or(DEFAULT_OUTPUT_VALUE);
        validate_output_value(dust_value)?;

        Ok(ValidatedRequest {
            to,
            change,
            service_fee,
            dust_value,
            recipient_value: request.recipient_value.unwrap_or(RECIPIENT_DUST),
        })
    }

    fn chunk_count(&self, request: &BuildRequest) -> Result<usize, EngineError> {
        if request.payload.is_empty() {
            return Ok(0);
        }
        Ok(match request.embedding {
            Embedding::BareMultisig => {
                payload::frame(&request.payload)?.len() / MULTISIG_CHUNK_SIZE
            }
            Embedding::FakeP2wsh => {
                crate::size::chunk_count_for_len(payload::frame_raw(&request.payload)?.len())
            }
        })
    }

    /// Outputs known ahead of selection: recipient, data placeholders with
    /// real sizes but blank content, then the service fee.
    fn requested_outputs(
        &self,
        request: &BuildRequest,
        validated: &ValidatedRequest,
        chunk_count: usize,
    ) -> Vec<RequestedOutput> {
        let mut outputs = vec![RequestedOutput::to_address(
            validated.to.clone(),
            validated.recipient_value,
            OutputRole::Recipient,
        )];

        for out in &request.issuance_outputs {
            outputs.push(RequestedOutput::to_script(
                out.script_pubkey.clone(),
                out.value.to_sat(),
                OutputRole::Recipient,
            ));
        }

        let placeholder = match request.embedding {
            // OP_1 <33> <33> <33> OP_3 OP_CHECKMULTISIG is always 105 bytes.
            Embedding::BareMultisig => ScriptBuf::from_bytes(vec![0u8; 105]),
            Embedding::FakeP2wsh => {
                ScriptBuf::from_bytes([&[0x00, 0x20][..], &[0u8; 32][..]].concat())
            }
        };
        for _ in 0..chunk_count {
            outputs.push(RequestedOutput::to_script(
                placeholder.clone(),
                validated.dust_value,
                OutputRole::DataChunk,
            ));
        }

        if let Some((address, fee)) = &validated.service_fee {
            outputs.push(RequestedOutput::to_address(
                address.clone(),
                *fee,
                OutputRole::ServiceFee,
            ));
        }
        outputs
    }

    fn encode_payload(
        &self,
        request: &BuildRequest,
        selection: &SelectionResult,
    ) -> Result<Vec<ScriptBuf>, EngineError> {
        if request.payload.is_empty() {
            return Ok(Vec::new());
        }
        match request.embedding {
            Embedding::BareMultisig => {
                let framed = payload::frame(&request.payload)?;
                let seed = selection
                    .keystream_seed()
                    .expect("selection success implies at least one input");
                let cipher = payload::encrypt(&framed, &seed);
                let chunks = payload::chunk(&cipher);
                payload::multisig::data_scripts(&chunks, &mut rand::thread_rng())
            }
            Embedding::FakeP2wsh => {
                let framed = payload::frame_raw(&request.payload)?;
                Ok(payload::cip33::data_scripts(&framed))
            }
        }
    }

    /// Final output order: recipient, data chunks, service fee; change is
    /// appended by the caller once the final fee is known.
    fn assemble_outputs(
        &self,
        request: &BuildRequest,
        validated: &ValidatedRequest,
        data_scripts: Vec<ScriptBuf>,
    ) -> Vec<PlannedOutput> {
        let mut outputs = vec![PlannedOutput {
            value: validated.recipient_value,
            script: validated.to.script_pubkey(),
            role: OutputRole::Recipient,
        }];
        for out in &request.issuance_outputs {
            outputs.push(PlannedOutput {
                value: out.value.to_sat(),
                script: out.script_pubkey.clone(),
                role: OutputRole::Recipient,
            });
        }
        for script in data_scripts {
            outputs.push(PlannedOutput {
                value: validated.dust_value,
                script,
                role: OutputRole::DataChunk,
            });
        }
        if let Some((address, fee)) = &validated.service_fee {
            outputs.push(PlannedOutput {
                value: *fee,
                script: address.script_pubkey(),
                role: OutputRole::ServiceFee,
            });
        }
        outputs
    }

    async fn attach_inputs(
        &self,
        request: &BuildRequest,
        plan: &TransactionPlan,
    ) -> Result<(Psbt, Transaction), EngineError> {
        let sequence = if request.enable_rbf {
            Sequence::ENABLE_RBF_NO_LOCKTIME
        } else {
            Sequence::MAX
        };

        let unsigned_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: plan
                .inputs
                .iter()
                .map(|u| TxIn {
                    previous_output: OutPoint {
                        txid: u.txid,
                        vout: u.vout,
                    },
                    script_sig: ScriptBuf::new(),
                    sequence,
                    witness: Witness::new(),
                })
                .collect(),
            output: plan
                .outputs
                .iter()
                .map(|o| TxOut {
                    value: Amount::from_sat(o.value),
                    script_pubkey: o.script.clone(),
                })
                .collect(),
        };

        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx.clone())
            .map_err(|e| EngineError::MalformedTransaction(e.to_string()))?;

        for (index, utxo) in plan.inputs.iter().enumerate() {
            if utxo.script.is_empty() {
                return Err(EngineError::MissingScriptData {
                    outpoint: utxo.outpoint_str(),
                });
            }

            if utxo.script_type.attaches_witness() {
                psbt.inputs[index].witness_utxo = Some(TxOut {
                    value: Amount::from_sat(utxo.value),
                    script_pubkey: utxo.script.clone(),
                });
            } else {
                let raw_hex = self
                    .provider
                    .get_raw_transaction_hex(&utxo.txid)
                    .await?
                    .ok_or_else(|| EngineError::RawTransactionUnavailable {
                        txid: utxo.txid.to_string(),
                    })?;
                let bytes = hex::decode(&raw_hex).map_err(|e| {
                    EngineError::MalformedTransaction(format!(
                        "raw tx {} is not hex: {e}",
                        utxo.txid
                    ))
                })?;
                let parent: Transaction = bitcoin::consensus::encode::deserialize(&bytes)
                    .map_err(|e| EngineError::MalformedTransaction(format!(
                        "raw tx {} undecodable: {e}",
                        utxo.txid
                    )))?;
                psbt.inputs[index].non_witness_utxo = Some(parent);
            }
        }

        Ok((psbt, unsigned_tx))
    }
}

fn requested_kind(output: &PlannedOutput) -> OutputKind {
    let ty = ScriptType::from_script(&output.script);
    if output.script.is_op_return() {
        OutputKind::OpReturn {
            data_len: output.script.len().saturating_sub(2),
        }
    } else if ty == ScriptType::Unknown {
        OutputKind::Raw {
            spk_len: output.script.len(),
        }
    } else if output.role == OutputRole::DataChunk {
        OutputKind::Data(ty)
    } else {
        OutputKind::Pay(ty)
    }
}
