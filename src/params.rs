use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::scheme::{SchemeKind, SecurityLevel};

///
/// Bit width of the two guard primes that bracket a CKKS modulus chain.
///
pub const APPROXIMATE_GUARD_BITS: u32 = 60;

///
/// Largest bit width of a single prime in the modulus chain.
///
pub const MAX_PRIME_BITS: u32 = 60;

const SUPPORTED_DEGREES: [usize; 6] = [1024, 2048, 4096, 8192, 16384, 32768];

///
/// The maximal total bit length of the ciphertext modulus for which the
/// given ring degree still achieves `security_level`, according to the
/// HomomorphicEncryption.org security standard (for ternary secrets).
///
pub fn max_coeff_modulus_bits(security_level: SecurityLevel, poly_modulus_degree: usize) -> Result<u32> {
    let table: [u32; 6] = match security_level {
        SecurityLevel::Tc128 => [27, 54, 109, 218, 438, 881],
        SecurityLevel::Tc192 => [19, 37, 75, 152, 305, 611],
        SecurityLevel::Tc256 => [14, 29, 58, 118, 237, 476]
    };
    SUPPORTED_DEGREES.iter()
        .position(|n| *n == poly_modulus_degree)
        .map(|i| table[i])
        .ok_or_else(|| Error::InvalidArgument(format!("poly modulus degree {} is not one of {:?}", poly_modulus_degree, SUPPORTED_DEGREES)))
}

///
/// Checks that the given modulus chain is nonempty and does not exceed
/// the security bound for the given ring degree.
///
pub fn validate_chain(security_level: SecurityLevel, poly_modulus_degree: usize, coeff_modulus_bits: &[u32]) -> Result<()> {
    if coeff_modulus_bits.is_empty() {
        return Err(Error::EmptyChain);
    }
    if let Some(bits) = coeff_modulus_bits.iter().find(|bits| **bits == 0 || **bits > MAX_PRIME_BITS) {
        return Err(Error::InvalidArgument(format!("coefficient modulus bit size {} is not within 1..={}", bits, MAX_PRIME_BITS)));
    }
    let max_bits = max_coeff_modulus_bits(security_level, poly_modulus_degree)?;
    let total_bits: u32 = coeff_modulus_bits.iter().sum();
    if total_bits > max_bits {
        return Err(Error::ParameterOverflow { total_bits, max_bits });
    }
    return Ok(());
}

///
/// Computes a modulus chain for BFV/BGV. Every prime has twice the bit length
/// of the plaintext modulus, and we use as many of them as the security bound
/// allows after reserving room for the plaintext modulus.
///
pub fn size_integer_chain(security_level: SecurityLevel, poly_modulus_degree: usize, plain_modulus_bits: u32) -> Result<Vec<u32>> {
    if plain_modulus_bits == 0 {
        return Err(Error::InvalidArgument("plain modulus bit size must be positive".to_string()));
    }
    let max_bits = max_coeff_modulus_bits(security_level, poly_modulus_degree)?;
    if plain_modulus_bits > max_bits {
        return Err(Error::ParameterOverflow { total_bits: plain_modulus_bits, max_bits });
    }
    let prime_bits = plain_modulus_bits * 2;
    let count = (max_bits - plain_modulus_bits) / prime_bits;
    let result = vec![prime_bits; count as usize];
    validate_chain(security_level, poly_modulus_degree, &result)?;
    return Ok(result);
}

///
/// Computes a modulus chain for CKKS. The inner primes have `floor(log2(scale))`
/// bits each, so that rescaling by one of them approximately divides out one
/// factor of the scale; the chain is bracketed by two 60-bit guard primes.
///
pub fn size_approximate_chain(security_level: SecurityLevel, poly_modulus_degree: usize, scale: f64) -> Result<Vec<u32>> {
    if !scale.is_finite() || scale < 2. {
        return Err(Error::InvalidArgument(format!("scale must be a finite number of at least 2, got {}", scale)));
    }
    let prime_bits = scale.log2().floor() as u32;
    let max_bits = max_coeff_modulus_bits(security_level, poly_modulus_degree)?;
    let count = max_bits.saturating_sub(2 * APPROXIMATE_GUARD_BITS) / prime_bits;
    let mut result = Vec::with_capacity(count as usize + 2);
    result.push(APPROXIMATE_GUARD_BITS);
    result.extend(std::iter::repeat(prime_bits).take(count as usize));
    result.push(APPROXIMATE_GUARD_BITS);
    validate_chain(security_level, poly_modulus_degree, &result)?;
    return Ok(result);
}

///
/// Everything a [`crate::backend::Backend`] needs to set itself up.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    pub scheme: SchemeKind,
    pub security_level: SecurityLevel,
    pub poly_modulus_degree: usize,
    /// Only used by BFV/BGV
    pub plain_modulus_bits: Option<u32>,
    pub coeff_modulus_bits: Vec<u32>
}

impl EncryptionParameters {

    pub fn validate(&self) -> Result<()> {
        if self.scheme.is_integer() != self.plain_modulus_bits.is_some() {
            return Err(Error::InvalidArgument(format!("a plain modulus must be given exactly for the integer schemes, but scheme is {}", self.scheme)));
        }
        return validate_chain(self.security_level, self.poly_modulus_degree, &self.coeff_modulus_bits);
    }
}

#[test]
fn test_max_coeff_modulus_bits() {
    assert_eq!(218, max_coeff_modulus_bits(SecurityLevel::Tc128, 8192).unwrap());
    assert_eq!(305, max_coeff_modulus_bits(SecurityLevel::Tc192, 16384).unwrap());
    assert_eq!(14, max_coeff_modulus_bits(SecurityLevel::Tc256, 1024).unwrap());
    assert!(matches!(max_coeff_modulus_bits(SecurityLevel::Tc128, 3000), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_size_integer_chain() {
    // (218 - 20) / 40 = 4
    assert_eq!(vec![40, 40, 40, 40], size_integer_chain(SecurityLevel::Tc128, 8192, 20).unwrap());
    // (109 - 20) / 40 = 2
    assert_eq!(vec![40, 40], size_integer_chain(SecurityLevel::Tc128, 4096, 20).unwrap());
    // (27 - 20) / 40 = 0
    assert_eq!(Err(Error::EmptyChain), size_integer_chain(SecurityLevel::Tc128, 1024, 20));
    assert!(matches!(size_integer_chain(SecurityLevel::Tc256, 1024, 20), Err(Error::ParameterOverflow { .. })));
}

#[test]
fn test_size_approximate_chain() {
    let scale = (1u64 << 40) as f64;
    // (218 - 120) / 40 = 2
    assert_eq!(vec![60, 40, 40, 60], size_approximate_chain(SecurityLevel::Tc128, 8192, scale).unwrap());
    // non-powers of two are rounded down
    assert_eq!(vec![60, 40, 40, 60], size_approximate_chain(SecurityLevel::Tc128, 8192, scale * 1.5).unwrap());
    // only the guard primes, which already exceed the bound
    assert_eq!(
        Err(Error::ParameterOverflow { total_bits: 120, max_bits: 109 }),
        size_approximate_chain(SecurityLevel::Tc128, 4096, scale)
    );
    assert!(matches!(size_approximate_chain(SecurityLevel::Tc128, 8192, 1.), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_validate_chain() {
    assert_eq!(Ok(()), validate_chain(SecurityLevel::Tc128, 8192, &[60, 40, 40, 60]));
    assert_eq!(Err(Error::EmptyChain), validate_chain(SecurityLevel::Tc128, 8192, &[]));
    assert_eq!(
        Err(Error::ParameterOverflow { total_bits: 220, max_bits: 218 }),
        validate_chain(SecurityLevel::Tc128, 8192, &[60, 50, 50, 60])
    );
    assert!(matches!(validate_chain(SecurityLevel::Tc128, 8192, &[61]), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_encryption_parameters_serialization() {
    let params = EncryptionParameters {
        scheme: SchemeKind::Bgv,
        security_level: SecurityLevel::Tc128,
        poly_modulus_degree: 4096,
        plain_modulus_bits: Some(20),
        coeff_modulus_bits: vec![40, 40]
    };
    let json = serde_json::to_string(&params).unwrap();
    let deserialized: EncryptionParameters = serde_json::from_str(&json).unwrap();
    assert_eq!(params, deserialized);
    assert_eq!(Ok(()), deserialized.validate());
}
