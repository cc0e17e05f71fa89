use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::*;

///
/// The homomorphic encryption scheme an [`crate::fhe::Fhe`] instance is configured for.
///
/// The integer schemes BFV and BGV require both operands of a binary operation
/// to live at the same modulus level. CKKS additionally requires equal scales.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeKind {
    /// Brakerski/Fan-Vercauteren
    Bfv,
    /// Brakerski-Gentry-Vaikuntanathan
    Bgv,
    /// Cheon-Kim-Kim-Song, approximate arithmetic on real or complex numbers
    Ckks
}

impl SchemeKind {

    pub fn is_integer(&self) -> bool {
        matches!(self, SchemeKind::Bfv | SchemeKind::Bgv)
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, SchemeKind::Ckks)
    }

    ///
    /// The numeric identifier of the scheme, as used by SEAL-compatible tooling.
    ///
    pub fn code(&self) -> u8 {
        match self {
            SchemeKind::Bfv => 0x1,
            SchemeKind::Ckks => 0x2,
            SchemeKind::Bgv => 0x3
        }
    }
}

impl Display for SchemeKind {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemeKind::Bfv => write!(f, "bfv"),
            SchemeKind::Bgv => write!(f, "bgv"),
            SchemeKind::Ckks => write!(f, "ckks")
        }
    }
}

impl TryFrom<u8> for SchemeKind {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x1 => Ok(SchemeKind::Bfv),
            0x2 => Ok(SchemeKind::Ckks),
            0x3 => Ok(SchemeKind::Bgv),
            other => Err(Error::UnsupportedKind(format!("scheme code {:#x}", other)))
        }
    }
}

///
/// Integer arithmetic schemes, accepted by
/// [`crate::builder::FheBuilder::build_integer_scheme()`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntScheme {
    Bfv,
    Bgv
}

impl From<IntScheme> for SchemeKind {

    fn from(value: IntScheme) -> Self {
        match value {
            IntScheme::Bfv => SchemeKind::Bfv,
            IntScheme::Bgv => SchemeKind::Bgv
        }
    }
}

impl TryFrom<SchemeKind> for IntScheme {
    type Error = Error;

    fn try_from(value: SchemeKind) -> Result<Self> {
        match value {
            SchemeKind::Bfv => Ok(IntScheme::Bfv),
            SchemeKind::Bgv => Ok(IntScheme::Bgv),
            SchemeKind::Ckks => Err(Error::UnsupportedKind(format!("{} is not an integer scheme", value)))
        }
    }
}

///
/// Real or complex number arithmetic schemes, accepted by
/// [`crate::builder::FheBuilder::build_approximate_scheme()`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealComplexScheme {
    Ckks
}

impl From<RealComplexScheme> for SchemeKind {

    fn from(value: RealComplexScheme) -> Self {
        match value {
            RealComplexScheme::Ckks => SchemeKind::Ckks
        }
    }
}

impl TryFrom<SchemeKind> for RealComplexScheme {
    type Error = Error;

    fn try_from(value: SchemeKind) -> Result<Self> {
        match value {
            SchemeKind::Ckks => Ok(RealComplexScheme::Ckks),
            other => Err(Error::UnsupportedKind(format!("{} is not a real/complex scheme", other)))
        }
    }
}

///
/// Security levels as defined by the HomomorphicEncryption.org standard.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    Tc128,
    Tc192,
    Tc256
}

impl SecurityLevel {

    pub fn bits(&self) -> u32 {
        match self {
            SecurityLevel::Tc128 => 128,
            SecurityLevel::Tc192 => 192,
            SecurityLevel::Tc256 => 256
        }
    }
}

impl Default for SecurityLevel {

    fn default() -> Self {
        SecurityLevel::Tc128
    }
}

impl TryFrom<u32> for SecurityLevel {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            128 => Ok(SecurityLevel::Tc128),
            192 => Ok(SecurityLevel::Tc192),
            256 => Ok(SecurityLevel::Tc256),
            other => Err(Error::UnsupportedKind(format!("security level of {} bits", other)))
        }
    }
}

///
/// How encoded vectors are multiplied.
///
/// With [`MulMode::ElementWise`], values are placed into the SIMD slots and
/// multiplication acts slot by slot. With [`MulMode::Convolution`], values
/// are used as polynomial coefficients and multiplication is the negacyclic
/// convolution in `R[X]/(X^N + 1)`. Rotations only make sense for
/// element-wise encodings.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MulMode {
    ElementWise,
    Convolution
}

impl Default for MulMode {

    fn default() -> Self {
        MulMode::ElementWise
    }
}

///
/// Which key material is generated when a scheme is built.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFlags {
    pub secret_key: bool,
    pub public_key: bool,
    pub relin_keys: bool,
    pub galois_keys: bool,
    /// If nonempty, galois keys are only generated for these row rotation steps;
    /// a step of `0` stands for the column rotation. If empty, keys for all
    /// rotations are generated.
    pub rotation_steps: Vec<i32>
}

impl Default for KeyFlags {

    fn default() -> Self {
        Self {
            secret_key: true,
            public_key: true,
            relin_keys: true,
            galois_keys: true,
            rotation_steps: Vec::new()
        }
    }
}

///
/// Immutable description of a configured scheme instance.
///
/// The context is created once by [`crate::builder::FheBuilder`] and is only read
/// afterwards. The sole exception is the default multiplication mode, which may be
/// changed through [`crate::fhe::Fhe::set_mul_mode()`] while holding the instance
/// exclusively.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeContext {
    pub(crate) kind: SchemeKind,
    pub(crate) security_level: SecurityLevel,
    pub(crate) poly_modulus_degree: usize,
    pub(crate) coeff_modulus_bits: Vec<u32>,
    pub(crate) default_scale: Option<f64>,
    pub(crate) mul_mode: MulMode,
    pub(crate) key_flags: KeyFlags
}

impl SchemeContext {

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    ///
    /// Bit widths of the modulus chain, as they were requested.
    ///
    pub fn coeff_modulus_bits(&self) -> &[u32] {
        &self.coeff_modulus_bits
    }

    ///
    /// The number of primes in the modulus chain, including the special prime
    /// reserved for key switching.
    ///
    pub fn chain_length(&self) -> usize {
        self.coeff_modulus_bits.len()
    }

    ///
    /// The level of freshly encrypted ciphertexts. If the chain has more than one
    /// prime, the last one is only used during key switching and never carries data.
    ///
    pub fn max_level(&self) -> usize {
        if self.coeff_modulus_bits.len() > 1 {
            self.coeff_modulus_bits.len() - 1
        } else {
            self.coeff_modulus_bits.len()
        }
    }

    pub fn default_scale(&self) -> Option<f64> {
        self.default_scale
    }

    pub fn mul_mode(&self) -> MulMode {
        self.mul_mode
    }

    pub fn key_flags(&self) -> &KeyFlags {
        &self.key_flags
    }
}

#[test]
fn test_scheme_codes() {
    for kind in [SchemeKind::Bfv, SchemeKind::Bgv, SchemeKind::Ckks] {
        assert_eq!(kind, SchemeKind::try_from(kind.code()).unwrap());
    }
    assert!(matches!(SchemeKind::try_from(0x7), Err(Error::UnsupportedKind(_))));
    assert_eq!("bgv", SchemeKind::Bgv.to_string());
}

#[test]
fn test_security_level_from_bits() {
    assert_eq!(SecurityLevel::Tc192, SecurityLevel::try_from(192).unwrap());
    assert!(matches!(SecurityLevel::try_from(100), Err(Error::UnsupportedKind(_))));
}

#[test]
fn test_sub_scheme_conversion() {
    assert_eq!(IntScheme::Bgv, IntScheme::try_from(SchemeKind::Bgv).unwrap());
    assert!(IntScheme::try_from(SchemeKind::Ckks).is_err());
    assert!(RealComplexScheme::try_from(SchemeKind::Bfv).is_err());
    assert_eq!(SchemeKind::Ckks, SchemeKind::from(RealComplexScheme::Ckks));
}

#[test]
fn test_max_level() {
    let mut context = SchemeContext {
        kind: SchemeKind::Ckks,
        security_level: SecurityLevel::Tc128,
        poly_modulus_degree: 8192,
        coeff_modulus_bits: vec![60, 40, 40, 60],
        default_scale: Some((1u64 << 40) as f64),
        mul_mode: MulMode::ElementWise,
        key_flags: KeyFlags::default()
    };
    assert_eq!(4, context.chain_length());
    assert_eq!(3, context.max_level());
    context.coeff_modulus_bits = vec![50];
    assert_eq!(1, context.max_level());
}
