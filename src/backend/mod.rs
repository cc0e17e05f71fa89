use std::fmt::Debug;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::params::EncryptionParameters;
use crate::scheme::MulMode;

///
/// Contains [`clear::ClearBackend`], a reference backend that tracks the modulus
/// chain exactly but does not encrypt.
///
pub mod clear;

///
/// The number of polynomial components of a ciphertext in canonical form.
/// Multiplication temporarily increases this, relinearization restores it.
///
pub const CANONICAL_CIPHERTEXT_SIZE: usize = 2;

///
/// Relative tolerance below which two CKKS scales are considered equal.
///
pub const SCALE_TOLERANCE: f64 = 1. / (1u64 << 40) as f64;

pub fn scales_equal(lhs: f64, rhs: f64) -> bool {
    (lhs - rhs).abs() <= SCALE_TOLERANCE * lhs.abs().max(rhs.abs())
}

///
/// Opaque identifier of a parameter set, i.e. of one step of the modulus chain.
///
/// Two values that agree in level need not agree in their parameter set, so
/// plaintext-ciphertext compatibility is decided on this identifier.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParmsId(pub u64);

///
/// Position of a ciphertext or plaintext within the modulus chain.
///
pub trait ModulusAware {

    ///
    /// The number of primes in the current modulus. This is decreased by
    /// modulus switching and rescaling, and never increases.
    ///
    fn level(&self) -> usize;

    ///
    /// The factor by which encoded values are scaled. Always `1` for the
    /// integer schemes.
    ///
    fn scale(&self) -> f64;

    fn parms_id(&self) -> ParmsId;
}

pub trait CiphertextData: ModulusAware {

    ///
    /// The number of polynomial components, [`CANONICAL_CIPHERTEXT_SIZE`] unless
    /// the ciphertext is the unrelinearized result of a multiplication.
    ///
    fn size(&self) -> usize;

    ///
    /// The multiplication mode of the plaintexts the ciphertext was computed from.
    ///
    fn mul_mode(&self) -> MulMode;
}

pub trait PlaintextData: ModulusAware {

    ///
    /// The multiplication mode the plaintext was encoded with, which also
    /// determines how it has to be decoded.
    ///
    fn mul_mode(&self) -> MulMode;
}

///
/// The primitive homomorphic operations on which [`crate::fhe::Fhe`] builds.
///
/// A backend performs exactly what it is asked to do: it never switches
/// moduli or rescales on its own, and it fails if the operands of a binary
/// operation are not defined w.r.t. the same parameter set (and, for CKKS,
/// the same scale). Keeping operands aligned is the responsibility of the
/// caller.
///
/// Implementations must allow shared read access from multiple threads;
/// no operation takes `&mut self`.
///
pub trait Backend: Sized {

    type Ciphertext: CiphertextData + Clone + Debug;
    type Plaintext: PlaintextData + Clone + Debug;
    type SecretKey;
    type PublicKey;
    type RelinKeys;
    type GaloisKeys;

    fn create(params: &EncryptionParameters) -> Result<Self>;

    fn poly_modulus_degree(&self) -> usize;

    fn slot_count(&self) -> usize;

    ///
    /// The plaintext modulus, only present for BFV/BGV.
    ///
    fn plain_modulus(&self) -> Option<u64>;

    ///
    /// The primes of the modulus chain, in the order of the requested bit sizes.
    ///
    fn coeff_modulus(&self) -> &[u64];

    ///
    /// The parameter set of freshly encoded values.
    ///
    fn top_parms_id(&self) -> ParmsId;

    fn gen_secret_key(&self) -> Result<Self::SecretKey>;

    fn gen_public_key(&self, sk: &Self::SecretKey) -> Result<Self::PublicKey>;

    fn gen_relin_keys(&self, sk: &Self::SecretKey) -> Result<Self::RelinKeys>;

    ///
    /// Generates galois keys for the given row rotation steps, or for all
    /// rotations if `steps` is empty. A step of `0` stands for the column rotation.
    ///
    fn gen_galois_keys(&self, sk: &Self::SecretKey, steps: &[i32]) -> Result<Self::GaloisKeys>;

    ///
    /// Encodes values modulo the plaintext modulus. Only valid for BFV/BGV.
    ///
    fn encode_integers(&self, values: &[u64], mul_mode: MulMode) -> Result<Self::Plaintext>;

    fn decode_integers(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>>;

    ///
    /// Encodes complex values at the given parameter set and scale. Only valid for CKKS.
    ///
    fn encode_complex(&self, values: &[Complex64], parms_id: ParmsId, scale: f64, mul_mode: MulMode) -> Result<Self::Plaintext>;

    fn decode_complex(&self, plaintext: &Self::Plaintext) -> Result<Vec<Complex64>>;

    fn encrypt(&self, pk: &Self::PublicKey, plaintext: &Self::Plaintext) -> Result<Self::Ciphertext>;

    fn decrypt(&self, sk: &Self::SecretKey, ciphertext: &Self::Ciphertext) -> Result<Self::Plaintext>;

    fn add(&self, lhs: &Self::Ciphertext, rhs: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn sub(&self, lhs: &Self::Ciphertext, rhs: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn multiply(&self, lhs: &Self::Ciphertext, rhs: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn add_plain(&self, lhs: &Self::Ciphertext, rhs: &Self::Plaintext) -> Result<Self::Ciphertext>;

    fn sub_plain(&self, lhs: &Self::Ciphertext, rhs: &Self::Plaintext) -> Result<Self::Ciphertext>;

    fn multiply_plain(&self, lhs: &Self::Ciphertext, rhs: &Self::Plaintext) -> Result<Self::Ciphertext>;

    fn negate(&self, ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn relinearize(&self, ciphertext: &Self::Ciphertext, rk: &Self::RelinKeys) -> Result<Self::Ciphertext>;

    ///
    /// Drops the last prime of the current modulus, without changing the scale.
    ///
    fn mod_switch_to_next(&self, ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    ///
    /// Switches a plaintext down to the given parameter set, which must not be above
    /// the plaintext's current one.
    ///
    fn mod_switch_plain_to(&self, plaintext: &Self::Plaintext, parms_id: ParmsId) -> Result<Self::Plaintext>;

    ///
    /// Drops the last prime `q` of the current modulus and divides the scale by `q`. Only valid for CKKS.
    ///
    fn rescale_to_next(&self, ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    ///
    /// Rotates both rows of the slot matrix cyclically to the left by `step` (to the right if negative).
    ///
    fn rotate_rows(&self, ciphertext: &Self::Ciphertext, step: i32, gk: &Self::GaloisKeys) -> Result<Self::Ciphertext>;

    ///
    /// Swaps the two rows of the slot matrix.
    ///
    fn rotate_columns(&self, ciphertext: &Self::Ciphertext, gk: &Self::GaloisKeys) -> Result<Self::Ciphertext>;
}

///
/// The key material of one scheme instance; every key is optional, and
/// operations that need a missing key fail with [`Error::MissingKey`].
///
pub struct KeySet<B: Backend> {
    pub secret_key: Option<B::SecretKey>,
    pub public_key: Option<B::PublicKey>,
    pub relin_keys: Option<B::RelinKeys>,
    pub galois_keys: Option<B::GaloisKeys>
}

impl<B: Backend> KeySet<B> {

    pub fn empty() -> Self {
        Self {
            secret_key: None,
            public_key: None,
            relin_keys: None,
            galois_keys: None
        }
    }

    pub fn secret_key(&self) -> Result<&B::SecretKey> {
        self.secret_key.as_ref().ok_or(Error::MissingKey(KeyKind::Secret))
    }

    pub fn public_key(&self) -> Result<&B::PublicKey> {
        self.public_key.as_ref().ok_or(Error::MissingKey(KeyKind::Public))
    }

    pub fn relin_keys(&self) -> Result<&B::RelinKeys> {
        self.relin_keys.as_ref().ok_or(Error::MissingKey(KeyKind::Relin))
    }

    pub fn galois_keys(&self) -> Result<&B::GaloisKeys> {
        self.galois_keys.as_ref().ok_or(Error::MissingKey(KeyKind::Galois))
    }
}
