//! # Gas Schedule
//!
//! Dynamic cost helpers and the named constants the handlers charge on
//! top of the dispatch table's static base gas. Warm/cold surcharges
//! follow EIP-2929; the pre-Berlin columns carry the Istanbul and
//! Tangerine values.

use xgr_types::U256;

/// Named gas constants.
pub mod costs {
    /// Cold storage slot access (EIP-2929).
    pub const COLD_SLOAD: u64 = 2_100;
    /// Cold account access (EIP-2929).
    pub const COLD_ACCOUNT_ACCESS: u64 = 2_600;
    /// Warm access, storage or account (EIP-2929).
    pub const WARM_ACCESS: u64 = 100;

    /// SLOAD before Berlin, after Istanbul.
    pub const SLOAD_ISTANBUL: u64 = 800;
    /// SLOAD before Istanbul.
    pub const SLOAD_TANGERINE: u64 = 200;

    /// BALANCE / EXTCODEHASH before Berlin, after Istanbul.
    pub const ACCOUNT_ACCESS_ISTANBUL: u64 = 700;
    /// BALANCE / EXTCODEHASH before Istanbul.
    pub const ACCOUNT_ACCESS_TANGERINE: u64 = 400;
    /// EXTCODESIZE / EXTCODECOPY / CALL base before Berlin.
    pub const EXT_CODE_TANGERINE: u64 = 700;

    /// SSTORE setting a clean zero slot.
    pub const SSTORE_SET: u64 = 20_000;
    /// SSTORE on a clean non-zero slot, Berlin net of the cold charge.
    pub const SSTORE_RESET_BERLIN: u64 = 2_900;
    /// SSTORE on a clean non-zero slot, pre-Berlin.
    pub const SSTORE_RESET: u64 = 5_000;
    /// SSTORE sentry floor (EIP-2200).
    pub const SSTORE_SENTRY: u64 = 2_300;

    /// Per-word cost of copy operations.
    pub const COPY_WORD: u64 = 3;
    /// Per-word cost of hashing (KECCAK256, CREATE2).
    pub const KECCAK_WORD: u64 = 6;
    /// Per-word cost of init code (EIP-3860).
    pub const INIT_CODE_WORD: u64 = 2;

    /// EXP per exponent byte, post-EIP-160.
    pub const EXP_BYTE: u64 = 50;

    /// LOG base and per-topic cost.
    pub const LOG: u64 = 375;
    /// LOG per data byte.
    pub const LOG_DATA: u64 = 8;

    /// Value-bearing CALL surcharge.
    pub const CALL_VALUE: u64 = 9_000;
    /// Stipend granted to value-bearing calls.
    pub const CALL_STIPEND: u64 = 2_300;
    /// CALL creating a previously empty account (EIP-161 rules).
    pub const CALL_NEW_ACCOUNT: u64 = 25_000;

    /// SELFDESTRUCT base.
    pub const SELFDESTRUCT: u64 = 5_000;
    /// SELFDESTRUCT sweeping value into a fresh account.
    pub const SELFDESTRUCT_NEW_ACCOUNT: u64 = 25_000;
    /// Refund for the first destruction of an account.
    pub const SELFDESTRUCT_REFUND: u64 = 24_000;

    /// Code deposit cost per byte of deployed code.
    pub const CODE_DEPOSIT_BYTE: u64 = 200;
}

/// Words needed to cover `bytes` bytes.
#[must_use]
pub fn to_words(bytes: u64) -> u64 {
    bytes.div_ceil(32)
}

/// Dynamic EXP cost: 50 per significant exponent byte.
#[must_use]
pub fn exp_cost(exponent: U256) -> u64 {
    if exponent.is_zero() {
        return 0;
    }
    let bytes = (exponent.bits() as u64 + 7) / 8;
    costs::EXP_BYTE * bytes
}

/// Dynamic KECCAK256 cost per word hashed.
#[must_use]
pub fn keccak_cost(size: u64) -> u64 {
    costs::KECCAK_WORD * to_words(size)
}

/// Dynamic copy cost per word moved.
#[must_use]
pub fn copy_cost(size: u64) -> u64 {
    costs::COPY_WORD * to_words(size)
}

/// LOG cost: base + per-topic + per-byte (the base is already in the
/// dispatch table, so handlers charge topics and data only).
#[must_use]
pub fn log_dynamic_cost(topics: u64, data_len: u64) -> u64 {
    costs::LOG * topics + costs::LOG_DATA * data_len
}

/// EIP-3860 init-code metering.
#[must_use]
pub fn init_code_cost(size: u64) -> u64 {
    costs::INIT_CODE_WORD * to_words(size)
}

/// EIP-150 gas forwarding: all but one 64th of what remains, capped at
/// the requested amount.
#[must_use]
pub fn call_gas(available: u64, requested: U256) -> u64 {
    let cap = available - available / 64;
    if requested > U256::from(cap) {
        cap
    } else {
        requested.low_u64()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_cost_per_byte() {
        assert_eq!(exp_cost(U256::zero()), 0);
        assert_eq!(exp_cost(U256::from(0xff)), 50);
        assert_eq!(exp_cost(U256::from(0x100)), 100);
        assert_eq!(exp_cost(U256::MAX), 50 * 32);
    }

    #[test]
    fn test_word_rounding() {
        assert_eq!(to_words(0), 0);
        assert_eq!(to_words(1), 1);
        assert_eq!(to_words(32), 1);
        assert_eq!(to_words(33), 2);
    }

    #[test]
    fn test_call_gas_63_64() {
        assert_eq!(call_gas(6400, U256::from(10_000)), 6300);
        assert_eq!(call_gas(6400, U256::from(1_000)), 1_000);
    }

    #[test]
    fn test_log_dynamic() {
        assert_eq!(log_dynamic_cost(0, 32), 8 * 32);
        assert_eq!(log_dynamic_cost(2, 0), 750);
    }
}
