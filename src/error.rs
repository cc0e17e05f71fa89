use thiserror::Error;

use crate::scheme::SchemeKind;

///
/// The kind of key material an operation may require.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Secret,
    Public,
    Relin,
    Galois
}

impl std::fmt::Display for KeyKind {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Secret => write!(f, "secret key"),
            KeyKind::Public => write!(f, "public key"),
            KeyKind::Relin => write!(f, "relinearization keys"),
            KeyKind::Galois => write!(f, "galois keys")
        }
    }
}

///
/// Every failure of this crate. None of them is transient: the same inputs
/// always produce the same error, which indicates either a misuse of the API
/// or a parameter request that cannot be satisfied.
///
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("`{operation}` is not supported by the {kind} scheme")]
    WrongSchemeKind { operation: &'static str, kind: SchemeKind },

    #[error("operands are already at matching modulus level (and scale); reconciliation is only valid on mismatched operands")]
    AlreadyMatched,

    #[error("range size {range_size} must be a power of two between 2 and the half slot count {half_slot_count} (inclusive)")]
    InvalidRange { range_size: usize, half_slot_count: usize },

    #[error("sum of the coefficient modulus bit sizes ({total_bits}) exceeds the maximum of {max_bits} bits for the given poly modulus degree and security level")]
    ParameterOverflow { total_bits: u32, max_bits: u32 },

    #[error("the coefficient modulus bit sizes must not be empty")]
    EmptyChain,

    #[error("unsupported scheme or security level: {0}")]
    UnsupportedKind(String),

    #[error("ciphertext has no modulus level left to consume by another multiplication")]
    ExhaustedLevels,

    #[error("operation requires {0}, which were not generated")]
    MissingKey(KeyKind),

    #[error("no galois key available for a rotation by {step}")]
    MissingGaloisKey { step: i32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend failure: {0}")]
    Backend(String)
}

pub type Result<T> = std::result::Result<T, Error>;
