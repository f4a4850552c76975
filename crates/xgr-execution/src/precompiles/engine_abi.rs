//! # Engine ABI
//!
//! Selectors, event topics, and the head/tail codec for the
//! engine-execute schemas. Event payload lengths are also computed by
//! exact arithmetic (no encoding) because the fee formula prices the
//! two events before they exist.

use crate::errors::VmError;
use xgr_types::{keccak256, Address, Hash, U256};

// =============================================================================
// SIGNATURES
// =============================================================================

/// `ENGINE_EXECUTE(grant, call, meta)` canonical signature.
pub const ENGINE_EXECUTE_SIG: &str = "ENGINE_EXECUTE((address,address,address,string,bytes32,uint256,uint256,uint256,uint256,uint256),(address,bytes,uint256,uint64,uint64,uint256,uint64,uint64,uint256),(uint64,string,address,bytes32,bytes,bytes,bytes,bytes))";
/// `BILL_GRANTS_ONLY(payer, seconds, perYearWei)` canonical signature.
pub const BILL_GRANTS_ONLY_SIG: &str = "BILL_GRANTS_ONLY(address,uint64,uint256)";
/// `ENGINE_GET_NEXT_PID(user)` canonical signature.
pub const GET_NEXT_PID_SIG: &str = "ENGINE_GET_NEXT_PID(address)";
/// `ENGINE_IS_PID_USED(user, pid)` canonical signature.
pub const IS_PID_USED_SIG: &str = "ENGINE_IS_PID_USED(address,uint256)";

/// `EngineMeta` event signature.
pub const ENGINE_META_EVENT_SIG: &str = "EngineMeta(uint256,uint64,address,string,bytes32,string,address,bytes32,address,bool,bytes,bytes,bytes)";
/// `EngineExtrasV2` event signature.
pub const ENGINE_EXTRAS_EVENT_SIG: &str = "EngineExtrasV2(uint256,bytes)";

/// First four bytes of the Keccak of a signature.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [
        digest.as_bytes()[0],
        digest.as_bytes()[1],
        digest.as_bytes()[2],
        digest.as_bytes()[3],
    ]
}

/// Event topic0 for a signature.
#[must_use]
pub fn event_topic(signature: &str) -> Hash {
    keccak256(signature.as_bytes())
}

// =============================================================================
// DECODED SHAPES
// =============================================================================

/// The `grant` tuple of `ENGINE_EXECUTE`.
#[derive(Clone, Debug, Default)]
pub struct EngineGrant {
    /// User the session belongs to.
    pub from: Address,
    /// Engine field as submitted; ignored for authorization.
    pub engine: Address,
    /// Orchestration contract.
    pub xrc729: Address,
    /// Orchestration template id.
    pub ostc_id: String,
    /// Orchestration template hash.
    pub ostc_hash: Hash,
    /// Submitted process id.
    pub process_id: U256,
    /// Declared gas ceiling.
    pub max_total_gas: U256,
    /// Grant expiry.
    pub expiry: U256,
    /// Session id checked against `kNext`.
    pub session_id: U256,
    /// Chain id the grant was signed for.
    pub chain_id: U256,
}

/// The `call` tuple of `ENGINE_EXECUTE`.
#[derive(Clone, Debug, Default)]
pub struct EngineCallSpec {
    /// Inner call target; zero means log-only.
    pub to: Address,
    /// Inner calldata.
    pub data: Vec<u8>,
    /// Value forwarded with the inner call.
    pub value_wei: U256,
    /// Gas limit of the inner call.
    pub gas_limit: u64,
    /// Caller-declared validation gas, billed to the engine's benefit.
    pub validation_gas: u64,
    /// Fee cap the user agreed to.
    pub max_fee_per_gas: U256,
    /// Unix deadline; zero disables the check.
    pub deadline: u64,
    /// Grant billing duration in seconds.
    pub grant_fee_seconds: u64,
    /// Grant billing rate per year in wei.
    pub grant_fee_per_year_wei: U256,
}

/// The `meta` tuple of `ENGINE_EXECUTE`.
#[derive(Clone, Debug, Default)]
pub struct EngineMetaSpec {
    /// Step iteration counter.
    pub iteration: u64,
    /// Step identifier.
    pub step_id: String,
    /// Rule contract consulted for the step.
    pub rule_contract: Address,
    /// Rule hash.
    pub rule_hash: Hash,
    /// Step payload.
    pub payload: Vec<u8>,
    /// API-save blob.
    pub api_saves: Vec<u8>,
    /// Contract-save blob.
    pub contract_saves: Vec<u8>,
    /// Extras blob logged in `EngineExtrasV2`.
    pub extras: Vec<u8>,
}

// =============================================================================
// LENGTH ARITHMETIC
// =============================================================================

/// `EngineMeta` field count: 8 static head entries, 5 dynamic tails.
const META_EVENT_ARGS: usize = 13;
/// `EngineExtrasV2` field count.
const EXTRAS_EVENT_ARGS: usize = 2;

fn pad32(n: usize) -> usize {
    n.div_ceil(32) * 32
}

/// Encoded size of one dynamic tail: length word plus padded payload.
fn dyn_len(n: usize) -> usize {
    32 + pad32(n)
}

/// Exact encoded byte length of the `EngineMeta` event data.
#[must_use]
pub fn engine_meta_len(grant: &EngineGrant, meta: &EngineMetaSpec) -> usize {
    let head = 32 * META_EVENT_ARGS;
    let tail = dyn_len(grant.ostc_id.len())
        + dyn_len(meta.step_id.len())
        + dyn_len(meta.payload.len())
        + dyn_len(meta.api_saves.len())
        + dyn_len(meta.contract_saves.len());
    head + tail
}

/// Exact encoded byte length of the `EngineExtrasV2` event data.
#[must_use]
pub fn engine_extras_len(meta: &EngineMetaSpec) -> usize {
    32 * EXTRAS_EVENT_ARGS + dyn_len(meta.extras.len())
}

// =============================================================================
// DECODER
// =============================================================================

/// Strict word-granular reader over ABI-encoded bytes.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn word(&self, offset: usize) -> Result<[u8; 32], VmError> {
        let bytes = self
            .data
            .get(offset..offset + 32)
            .ok_or(VmError::InvalidInputData)?;
        Ok(bytes.try_into().expect("32-byte slice"))
    }

    fn u256(&self, offset: usize) -> Result<U256, VmError> {
        Ok(U256::from_big_endian(&self.word(offset)?))
    }

    fn u64_word(&self, offset: usize) -> Result<u64, VmError> {
        let value = self.u256(offset)?;
        if value.bits() > 64 {
            return Err(VmError::InvalidInputData);
        }
        Ok(value.low_u64())
    }

    fn address(&self, offset: usize) -> Result<Address, VmError> {
        let word = self.word(offset)?;
        if word[..12] != [0u8; 12] {
            return Err(VmError::InvalidInputData);
        }
        Ok(Hash::new(word).to_address())
    }

    fn hash(&self, offset: usize) -> Result<Hash, VmError> {
        Ok(Hash::new(self.word(offset)?))
    }

    /// Resolves a dynamic offset relative to `base`.
    fn dyn_offset(&self, base: usize, head_offset: usize) -> Result<usize, VmError> {
        let offset = self.u256(head_offset)?;
        if offset.bits() > 32 {
            return Err(VmError::InvalidInputData);
        }
        Ok(base + offset.low_u64() as usize)
    }

    fn bytes(&self, offset: usize) -> Result<Vec<u8>, VmError> {
        let len = self.u256(offset)?;
        if len.bits() > 32 {
            return Err(VmError::InvalidInputData);
        }
        let len = len.low_u64() as usize;
        self.data
            .get(offset + 32..offset + 32 + len)
            .map(<[u8]>::to_vec)
            .ok_or(VmError::InvalidInputData)
    }

    fn string(&self, offset: usize) -> Result<String, VmError> {
        String::from_utf8(self.bytes(offset)?).map_err(|_| VmError::InvalidInputData)
    }
}

/// Decodes the three `ENGINE_EXECUTE` tuples from the bytes after the
/// selector.
pub fn decode_engine_execute(
    args: &[u8],
) -> Result<(EngineGrant, EngineCallSpec, EngineMetaSpec), VmError> {
    let reader = Reader::new(args);

    let grant_base = reader.dyn_offset(0, 0)?;
    let call_base = reader.dyn_offset(0, 32)?;
    let meta_base = reader.dyn_offset(0, 64)?;

    let grant = decode_grant(&reader, grant_base)?;
    let call = decode_call(&reader, call_base)?;
    let meta = decode_meta(&reader, meta_base)?;
    Ok((grant, call, meta))
}

fn decode_grant(reader: &Reader<'_>, base: usize) -> Result<EngineGrant, VmError> {
    Ok(EngineGrant {
        from: reader.address(base)?,
        engine: reader.address(base + 32)?,
        xrc729: reader.address(base + 64)?,
        ostc_id: reader.string(reader.dyn_offset(base, base + 96)?)?,
        ostc_hash: reader.hash(base + 128)?,
        process_id: reader.u256(base + 160)?,
        max_total_gas: reader.u256(base + 192)?,
        expiry: reader.u256(base + 224)?,
        session_id: reader.u256(base + 256)?,
        chain_id: reader.u256(base + 288)?,
    })
}

fn decode_call(reader: &Reader<'_>, base: usize) -> Result<EngineCallSpec, VmError> {
    Ok(EngineCallSpec {
        to: reader.address(base)?,
        data: reader.bytes(reader.dyn_offset(base, base + 32)?)?,
        value_wei: reader.u256(base + 64)?,
        gas_limit: reader.u64_word(base + 96)?,
        validation_gas: reader.u64_word(base + 128)?,
        max_fee_per_gas: reader.u256(base + 160)?,
        deadline: reader.u64_word(base + 192)?,
        grant_fee_seconds: reader.u64_word(base + 224)?,
        grant_fee_per_year_wei: reader.u256(base + 256)?,
    })
}

fn decode_meta(reader: &Reader<'_>, base: usize) -> Result<EngineMetaSpec, VmError> {
    Ok(EngineMetaSpec {
        iteration: reader.u64_word(base)?,
        step_id: reader.string(reader.dyn_offset(base, base + 32)?)?,
        rule_contract: reader.address(base + 64)?,
        rule_hash: reader.hash(base + 96)?,
        payload: reader.bytes(reader.dyn_offset(base, base + 128)?)?,
        api_saves: reader.bytes(reader.dyn_offset(base, base + 160)?)?,
        contract_saves: reader.bytes(reader.dyn_offset(base, base + 192)?)?,
        extras: reader.bytes(reader.dyn_offset(base, base + 224)?)?,
    })
}

/// Decodes `BILL_GRANTS_ONLY(payer, seconds, perYearWei)`.
pub fn decode_bill_grants_only(args: &[u8]) -> Result<(Address, u64, U256), VmError> {
    let reader = Reader::new(args);
    Ok((
        reader.address(0)?,
        reader.u64_word(32)?,
        reader.u256(64)?,
    ))
}

/// Decodes `ENGINE_GET_NEXT_PID(user)`.
pub fn decode_get_next_pid(args: &[u8]) -> Result<Address, VmError> {
    Reader::new(args).address(0)
}

/// Decodes `ENGINE_IS_PID_USED(user, pid)`.
pub fn decode_is_pid_used(args: &[u8]) -> Result<(Address, U256), VmError> {
    let reader = Reader::new(args);
    Ok((reader.address(0)?, reader.u256(32)?))
}

// =============================================================================
// ENCODER
// =============================================================================

/// One encodable value.
pub enum Token {
    /// A static 32-byte word.
    Word(Hash),
    /// Dynamic bytes.
    Bytes(Vec<u8>),
    /// Dynamic UTF-8 string.
    Str(String),
}

impl Token {
    /// Word token from a `U256`.
    #[must_use]
    pub fn uint(value: U256) -> Self {
        Self::Word(Hash::from_u256(value))
    }

    /// Word token from a `u64`.
    #[must_use]
    pub fn uint64(value: u64) -> Self {
        Self::uint(U256::from(value))
    }

    /// Word token from an address.
    #[must_use]
    pub fn address(value: Address) -> Self {
        Self::Word(value.to_word())
    }

    /// Word token from a bool.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::uint(if value { U256::one() } else { U256::zero() })
    }
}

/// Head/tail encodes a tuple of tokens.
#[must_use]
pub fn encode_tuple(tokens: &[Token]) -> Vec<u8> {
    let head_len = 32 * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Word(word) => head.extend_from_slice(word.as_bytes()),
            Token::Bytes(bytes) => {
                head.extend_from_slice(Hash::from_u256(U256::from(head_len + tail.len())).as_bytes());
                append_dynamic(&mut tail, bytes);
            }
            Token::Str(string) => {
                head.extend_from_slice(Hash::from_u256(U256::from(head_len + tail.len())).as_bytes());
                append_dynamic(&mut tail, string.as_bytes());
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

fn append_dynamic(tail: &mut Vec<u8>, bytes: &[u8]) {
    tail.extend_from_slice(Hash::from_u256(U256::from(bytes.len())).as_bytes());
    tail.extend_from_slice(bytes);
    let padding = pad32(bytes.len()) - bytes.len();
    tail.extend_from_slice(&vec![0u8; padding]);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> Vec<u8> {
        let grant = encode_tuple(&[
            Token::address(Address::new([1u8; 20])),
            Token::address(Address::new([2u8; 20])),
            Token::address(Address::new([3u8; 20])),
            Token::Str("ostc-1".into()),
            Token::Word(Hash::new([9u8; 32])),
            Token::uint(U256::from(11)),
            Token::uint(U256::from(500_000)),
            Token::uint(U256::from(0)),
            Token::uint(U256::from(7)),
            Token::uint(U256::from(100)),
        ]);
        let call = encode_tuple(&[
            Token::address(Address::new([4u8; 20])),
            Token::Bytes(vec![0xca, 0xfe, 0x00]),
            Token::uint(U256::from(1_000)),
            Token::uint64(50_000),
            Token::uint64(20_000),
            Token::uint(U256::from(3_000_000_000u64)),
            Token::uint64(0),
            Token::uint64(0),
            Token::uint(U256::zero()),
        ]);
        let meta = encode_tuple(&[
            Token::uint64(1),
            Token::Str("step-1".into()),
            Token::address(Address::new([5u8; 20])),
            Token::Word(Hash::new([8u8; 32])),
            Token::Bytes(vec![1, 2, 3]),
            Token::Bytes(vec![]),
            Token::Bytes(vec![4]),
            Token::Bytes(vec![5, 6]),
        ]);

        // Top level: three dynamic tuples.
        let mut out = Vec::new();
        let head = 96usize;
        out.extend_from_slice(Hash::from_u256(U256::from(head)).as_bytes());
        out.extend_from_slice(Hash::from_u256(U256::from(head + grant.len())).as_bytes());
        out.extend_from_slice(
            Hash::from_u256(U256::from(head + grant.len() + call.len())).as_bytes(),
        );
        out.extend_from_slice(&grant);
        out.extend_from_slice(&call);
        out.extend_from_slice(&meta);
        out
    }

    #[test]
    fn test_decode_round_trip() {
        let (grant, call, meta) = decode_engine_execute(&sample_input()).unwrap();

        assert_eq!(grant.from, Address::new([1u8; 20]));
        assert_eq!(grant.ostc_id, "ostc-1");
        assert_eq!(grant.session_id, U256::from(7));

        assert_eq!(call.to, Address::new([4u8; 20]));
        assert_eq!(call.data, vec![0xca, 0xfe, 0x00]);
        assert_eq!(call.gas_limit, 50_000);
        assert_eq!(call.validation_gas, 20_000);

        assert_eq!(meta.iteration, 1);
        assert_eq!(meta.step_id, "step-1");
        assert_eq!(meta.payload, vec![1, 2, 3]);
        assert_eq!(meta.extras, vec![5, 6]);
    }

    #[test]
    fn test_meta_len_matches_encoding() {
        let (grant, call, meta) = decode_engine_execute(&sample_input()).unwrap();
        let _ = call;

        let encoded = encode_tuple(&[
            Token::uint(grant.session_id),
            Token::uint64(meta.iteration),
            Token::address(grant.xrc729),
            Token::Str(grant.ostc_id.clone()),
            Token::Word(grant.ostc_hash),
            Token::Str(meta.step_id.clone()),
            Token::address(meta.rule_contract),
            Token::Word(meta.rule_hash),
            Token::address(Address::ZERO),
            Token::boolean(true),
            Token::Bytes(meta.payload.clone()),
            Token::Bytes(meta.api_saves.clone()),
            Token::Bytes(meta.contract_saves.clone()),
        ]);
        assert_eq!(encoded.len(), engine_meta_len(&grant, &meta));
    }

    #[test]
    fn test_extras_len_matches_encoding() {
        let meta = EngineMetaSpec {
            extras: vec![7u8; 33],
            ..EngineMetaSpec::default()
        };
        let encoded = encode_tuple(&[Token::uint(U256::from(1234)), Token::Bytes(meta.extras.clone())]);
        assert_eq!(encoded.len(), engine_extras_len(&meta));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let input = sample_input();
        assert!(decode_engine_execute(&input[..input.len() - 1]).is_err());
        assert!(decode_engine_execute(&[]).is_err());
    }

    #[test]
    fn test_selectors_distinct() {
        let all = [
            selector(ENGINE_EXECUTE_SIG),
            selector(BILL_GRANTS_ONLY_SIG),
            selector(GET_NEXT_PID_SIG),
            selector(IS_PID_USED_SIG),
        ];
        for i in 0..all.len() {
            for j in i + 1..all.len() {
                assert_ne!(all[i], all[j]);
            }
        }
    }
}
