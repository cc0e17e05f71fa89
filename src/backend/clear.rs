use feanor_math::primitive_int::StaticRing;
use feanor_math::ring::*;
use feanor_math::rings::zn::zn_64::Zn;
use feanor_math::rings::zn::ZnRingStore;
use num_complex::Complex64;
use rand::{thread_rng, Rng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::error::*;
use crate::params::EncryptionParameters;
use crate::primes::{max_prime_congruent_one_lt_bound, ntt_friendly_primes};
use crate::scheme::{MulMode, SchemeKind};

use super::*;

const ZZ: StaticRing<i64> = StaticRing::<i64>::RING;

///
/// Standard deviation of the error added to CKKS encryptions.
///
const ERROR_STANDARD_DEVIATION: f64 = 3.2;

const MIN_PLAIN_MODULUS_BITS: u32 = 2;
const MAX_PLAIN_MODULUS_BITS: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Integer(Vec<u64>),
    /// CKKS values, already multiplied by the scale
    Approximate(Vec<Complex64>)
}

#[derive(Debug, Clone)]
pub struct ClearCiphertext {
    payload: Payload,
    level: usize,
    scale: f64,
    size: usize,
    mul_mode: MulMode,
    key_id: u64
}

impl ModulusAware for ClearCiphertext {

    fn level(&self) -> usize {
        self.level
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn parms_id(&self) -> ParmsId {
        ParmsId(self.level as u64)
    }
}

impl CiphertextData for ClearCiphertext {

    fn size(&self) -> usize {
        self.size
    }

    fn mul_mode(&self) -> MulMode {
        self.mul_mode
    }
}

#[derive(Debug, Clone)]
pub struct ClearPlaintext {
    payload: Payload,
    level: usize,
    scale: f64,
    mul_mode: MulMode
}

impl ModulusAware for ClearPlaintext {

    fn level(&self) -> usize {
        self.level
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn parms_id(&self) -> ParmsId {
        ParmsId(self.level as u64)
    }
}

impl PlaintextData for ClearPlaintext {

    fn mul_mode(&self) -> MulMode {
        self.mul_mode
    }
}

pub struct ClearSecretKey {
    key_id: u64
}

pub struct ClearPublicKey {
    key_id: u64
}

pub struct ClearRelinKeys {
    key_id: u64
}

pub struct ClearGaloisKeys {
    key_id: u64,
    /// `None` if keys for all rotations are available
    steps: Option<Vec<i32>>
}

impl ClearGaloisKeys {

    fn check_step(&self, key_id: u64, step: i32) -> Result<()> {
        if self.key_id != key_id {
            return Err(Error::Backend("galois keys belong to a different secret key".to_string()));
        }
        match &self.steps {
            Some(steps) if !steps.contains(&step) => Err(Error::MissingGaloisKey { step }),
            _ => Ok(())
        }
    }
}

///
/// A [`Backend`] that performs all homomorphic operations on unencrypted data.
///
/// While it offers no security whatsoever, it follows the modulus chain of a real
/// RNS-based implementation exactly: the chain consists of actual NTT-friendly primes
/// of the requested bit sizes, modulus switching and rescaling drop the last prime of
/// the current modulus, and rescaling divides the CKKS scale by that prime (so the
/// scale drifts in the same way as it would in a real implementation). In addition,
/// it enforces the same preconditions on the operands, which makes it suitable to test
/// code that has to keep ciphertexts aligned.
///
/// The plaintext modulus of BFV/BGV is the largest prime `t = 1 mod 2N` of the requested
/// bit length, which makes element-wise encoding possible. The slots are then arranged
/// in a `2 x N/2` matrix, whose rows can be rotated and whose columns can be swapped.
///
pub struct ClearBackend {
    scheme: SchemeKind,
    poly_modulus_degree: usize,
    coeff_modulus: Vec<u64>,
    plain_modulus: Option<u64>,
    top_level: usize
}

impl ClearBackend {

    pub fn scheme(&self) -> SchemeKind {
        self.scheme
    }

    fn plaintext_ring(&self) -> Result<Zn> {
        self.plain_modulus.map(Zn::new).ok_or(Error::WrongSchemeKind { operation: "integer arithmetic", kind: self.scheme })
    }

    ///
    /// The bit length of the product of the first `level` primes.
    ///
    fn modulus_bits_at(&self, level: usize) -> f64 {
        self.coeff_modulus[..level].iter().map(|p| (*p as f64).log2()).sum()
    }

    fn slot_count_for(&self, mul_mode: MulMode) -> usize {
        match (self.scheme, mul_mode) {
            (SchemeKind::Ckks, MulMode::ElementWise) => self.poly_modulus_degree / 2,
            _ => self.poly_modulus_degree
        }
    }

    fn level_of(&self, parms_id: ParmsId) -> Result<usize> {
        let level = parms_id.0 as usize;
        if level == 0 || level > self.top_level {
            return Err(Error::InvalidArgument(format!("parameter set {:?} is not part of the modulus chain", parms_id)));
        }
        return Ok(level);
    }

    fn check_scale(&self, level: usize, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0. {
            return Err(Error::InvalidArgument(format!("scale must be positive and finite, got {}", scale)));
        }
        if scale.log2() >= self.modulus_bits_at(level) {
            return Err(Error::Backend(format!("scale 2^{:.2} out of bounds for modulus of {:.2} bits at level {}", scale.log2(), self.modulus_bits_at(level), level)));
        }
        return Ok(());
    }

    fn check_compatible(&self, lhs: &ClearCiphertext, rhs: &ClearCiphertext) -> Result<()> {
        if lhs.key_id != rhs.key_id {
            return Err(Error::Backend("ciphertexts were encrypted under different keys".to_string()));
        }
        if lhs.level != rhs.level {
            return Err(Error::Backend(format!("ciphertexts are at different levels {} and {}", lhs.level, rhs.level)));
        }
        if lhs.mul_mode != rhs.mul_mode {
            return Err(Error::InvalidArgument(format!("ciphertexts are encoded with different modes {:?} and {:?}", lhs.mul_mode, rhs.mul_mode)));
        }
        return Ok(());
    }

    fn check_compatible_plain(&self, lhs: &ClearCiphertext, rhs: &ClearPlaintext) -> Result<()> {
        if lhs.mul_mode != rhs.mul_mode {
            return Err(Error::InvalidArgument(format!("ciphertext and plaintext are encoded with different modes {:?} and {:?}", lhs.mul_mode, rhs.mul_mode)));
        }
        // integer plaintexts are independent of the ciphertext modulus
        if self.scheme.is_approximate() && lhs.level != rhs.level {
            return Err(Error::Backend(format!("plaintext is at parameter set {:?}, but ciphertext at {:?}", rhs.parms_id(), lhs.parms_id())));
        }
        return Ok(());
    }

    fn check_same_scale(&self, lhs: f64, rhs: f64) -> Result<()> {
        if !scales_equal(lhs, rhs) {
            return Err(Error::Backend(format!("scale mismatch: 2^{:.4} and 2^{:.4}", lhs.log2(), rhs.log2())));
        }
        return Ok(());
    }

    fn combine(&self, lhs: &Payload, rhs: &Payload, mul_mode: MulMode, op: BinaryOp) -> Result<Payload> {
        match (lhs, rhs) {
            (Payload::Integer(lhs), Payload::Integer(rhs)) => {
                let Zt = self.plaintext_ring()?;
                let lhs = lhs.iter().map(|x| Zt.coerce(&ZZ, *x as i64)).collect::<Vec<_>>();
                let rhs = rhs.iter().map(|x| Zt.coerce(&ZZ, *x as i64)).collect::<Vec<_>>();
                let result: Vec<El<Zn>> = match (op, mul_mode) {
                    (BinaryOp::Add, _) => lhs.iter().zip(rhs.iter()).map(|(x, y)| Zt.add_ref(x, y)).collect(),
                    (BinaryOp::Sub, _) => lhs.iter().zip(rhs.iter()).map(|(x, y)| Zt.sub_ref(x, y)).collect(),
                    (BinaryOp::Mul, MulMode::ElementWise) => lhs.iter().zip(rhs.iter()).map(|(x, y)| Zt.mul_ref(x, y)).collect(),
                    (BinaryOp::Mul, MulMode::Convolution) => negacyclic_convolution(&lhs, &rhs, Zt.zero(), |x, y| Zt.mul_ref(x, y), |x, y| Zt.add(x, y), |x, y| Zt.sub(x, y))?
                };
                Ok(Payload::Integer(result.into_iter().map(|x| Zt.smallest_positive_lift(x) as u64).collect()))
            },
            (Payload::Approximate(lhs), Payload::Approximate(rhs)) => {
                let result: Vec<Complex64> = match (op, mul_mode) {
                    (BinaryOp::Add, _) => lhs.iter().zip(rhs.iter()).map(|(x, y)| x + y).collect(),
                    (BinaryOp::Sub, _) => lhs.iter().zip(rhs.iter()).map(|(x, y)| x - y).collect(),
                    (BinaryOp::Mul, MulMode::ElementWise) => lhs.iter().zip(rhs.iter()).map(|(x, y)| x * y).collect(),
                    (BinaryOp::Mul, MulMode::Convolution) => negacyclic_convolution(lhs, rhs, Complex64::new(0., 0.), |x, y| x * y, |x, y| x + y, |x, y| x - y)?
                };
                Ok(Payload::Approximate(result))
            },
            _ => Err(Error::Backend("operands belong to different schemes".to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add, Sub, Mul
}

///
/// Computes the product of `lhs` and `rhs` in `R[X]/(X^N + 1)`, where both are given
/// by their coefficients.
///
fn negacyclic_convolution<T, Mul, Add, Sub>(lhs: &[T], rhs: &[T], zero: T, mul: Mul, add: Add, sub: Sub) -> Result<Vec<T>>
    where T: Clone + Send + Sync,
        Mul: Fn(&T, &T) -> T + Sync,
        Add: Fn(T, T) -> T + Sync,
        Sub: Fn(T, T) -> T + Sync
{
    let n = lhs.len();
    if n != rhs.len() {
        return Err(Error::Backend(format!("cannot convolve polynomials with {} and {} coefficients", n, rhs.len())));
    }
    Ok((0..n).into_par_iter().map(|k| {
        let mut current = zero.clone();
        for i in 0..=k {
            current = add(current, mul(&lhs[i], &rhs[k - i]));
        }
        // X^N = -1
        for i in (k + 1)..n {
            current = sub(current, mul(&lhs[i], &rhs[n + k - i]));
        }
        current
    }).collect())
}

impl Backend for ClearBackend {

    type Ciphertext = ClearCiphertext;
    type Plaintext = ClearPlaintext;
    type SecretKey = ClearSecretKey;
    type PublicKey = ClearPublicKey;
    type RelinKeys = ClearRelinKeys;
    type GaloisKeys = ClearGaloisKeys;

    fn create(params: &EncryptionParameters) -> Result<Self> {
        params.validate()?;
        let n = params.poly_modulus_degree;
        let coeff_modulus = ntt_friendly_primes(n, &params.coeff_modulus_bits)
            .ok_or_else(|| Error::Backend(format!("no NTT-friendly primes of bit sizes {:?} exist for poly modulus degree {}", params.coeff_modulus_bits, n)))?;
        let plain_modulus = match params.plain_modulus_bits {
            Some(bits) if bits < MIN_PLAIN_MODULUS_BITS || bits > MAX_PLAIN_MODULUS_BITS => {
                return Err(Error::InvalidArgument(format!("plain modulus bit size {} is not within {}..={}", bits, MIN_PLAIN_MODULUS_BITS, MAX_PLAIN_MODULUS_BITS)));
            },
            Some(bits) => {
                let mut bound = 1i64 << bits;
                loop {
                    let t = max_prime_congruent_one_lt_bound(2 * n as i64, bound)
                        .filter(|t| *t >= (1i64 << (bits - 1)))
                        .ok_or_else(|| Error::Backend(format!("no batching-friendly plain modulus of {} bits exists for poly modulus degree {}", bits, n)))?;
                    if !coeff_modulus.contains(&(t as u64)) {
                        break Some(t as u64);
                    }
                    bound = t;
                }
            },
            None => None
        };
        let top_level = if coeff_modulus.len() > 1 { coeff_modulus.len() - 1 } else { 1 };
        return Ok(ClearBackend {
            scheme: params.scheme,
            poly_modulus_degree: n,
            coeff_modulus: coeff_modulus,
            plain_modulus: plain_modulus,
            top_level: top_level
        });
    }

    fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    fn slot_count(&self) -> usize {
        self.slot_count_for(MulMode::ElementWise)
    }

    fn plain_modulus(&self) -> Option<u64> {
        self.plain_modulus
    }

    fn coeff_modulus(&self) -> &[u64] {
        &self.coeff_modulus
    }

    fn top_parms_id(&self) -> ParmsId {
        ParmsId(self.top_level as u64)
    }

    fn gen_secret_key(&self) -> Result<ClearSecretKey> {
        Ok(ClearSecretKey { key_id: thread_rng().gen() })
    }

    fn gen_public_key(&self, sk: &ClearSecretKey) -> Result<ClearPublicKey> {
        Ok(ClearPublicKey { key_id: sk.key_id })
    }

    fn gen_relin_keys(&self, sk: &ClearSecretKey) -> Result<ClearRelinKeys> {
        Ok(ClearRelinKeys { key_id: sk.key_id })
    }

    fn gen_galois_keys(&self, sk: &ClearSecretKey, steps: &[i32]) -> Result<ClearGaloisKeys> {
        let row_size = self.poly_modulus_degree as i32 / 2;
        if let Some(step) = steps.iter().find(|step| step.abs() >= row_size) {
            return Err(Error::InvalidArgument(format!("rotation step {} is out of range for rows of size {}", step, row_size)));
        }
        return Ok(ClearGaloisKeys {
            key_id: sk.key_id,
            steps: if steps.is_empty() { None } else { Some(steps.to_vec()) }
        });
    }

    fn encode_integers(&self, values: &[u64], mul_mode: MulMode) -> Result<ClearPlaintext> {
        let t = self.plain_modulus.ok_or(Error::WrongSchemeKind { operation: "encode_integers", kind: self.scheme })?;
        let slots = self.slot_count_for(mul_mode);
        if values.len() > slots {
            return Err(Error::InvalidArgument(format!("cannot encode {} values into {} slots", values.len(), slots)));
        }
        if let Some(x) = values.iter().find(|x| **x >= t) {
            return Err(Error::InvalidArgument(format!("value {} is not reduced modulo the plain modulus {}", x, t)));
        }
        let mut data = values.to_vec();
        data.resize(slots, 0);
        return Ok(ClearPlaintext {
            payload: Payload::Integer(data),
            level: self.top_level,
            scale: 1.,
            mul_mode: mul_mode
        });
    }

    fn decode_integers(&self, plaintext: &ClearPlaintext) -> Result<Vec<u64>> {
        match &plaintext.payload {
            Payload::Integer(data) => Ok(data.clone()),
            Payload::Approximate(_) => Err(Error::WrongSchemeKind { operation: "decode_integers", kind: self.scheme })
        }
    }

    fn encode_complex(&self, values: &[Complex64], parms_id: ParmsId, scale: f64, mul_mode: MulMode) -> Result<ClearPlaintext> {
        if !self.scheme.is_approximate() {
            return Err(Error::WrongSchemeKind { operation: "encode_complex", kind: self.scheme });
        }
        let level = self.level_of(parms_id)?;
        self.check_scale(level, scale)?;
        let slots = self.slot_count_for(mul_mode);
        if values.len() > slots {
            return Err(Error::InvalidArgument(format!("cannot encode {} values into {} slots", values.len(), slots)));
        }
        let mut data = values.iter().map(|x| x * scale).collect::<Vec<_>>();
        data.resize(slots, Complex64::new(0., 0.));
        return Ok(ClearPlaintext {
            payload: Payload::Approximate(data),
            level: level,
            scale: scale,
            mul_mode: mul_mode
        });
    }

    fn decode_complex(&self, plaintext: &ClearPlaintext) -> Result<Vec<Complex64>> {
        match &plaintext.payload {
            Payload::Approximate(data) => Ok(data.iter().map(|x| x / plaintext.scale).collect()),
            Payload::Integer(_) => Err(Error::WrongSchemeKind { operation: "decode_complex", kind: self.scheme })
        }
    }

    fn encrypt(&self, pk: &ClearPublicKey, plaintext: &ClearPlaintext) -> Result<ClearCiphertext> {
        let payload = match &plaintext.payload {
            Payload::Integer(data) => Payload::Integer(data.clone()),
            Payload::Approximate(data) => {
                let mut rng = thread_rng();
                Payload::Approximate(data.iter().map(|x| x + Complex64::new(
                    rng.sample::<f64, _>(StandardNormal) * ERROR_STANDARD_DEVIATION,
                    rng.sample::<f64, _>(StandardNormal) * ERROR_STANDARD_DEVIATION
                )).collect())
            }
        };
        return Ok(ClearCiphertext {
            payload: payload,
            level: plaintext.level,
            scale: plaintext.scale,
            size: CANONICAL_CIPHERTEXT_SIZE,
            mul_mode: plaintext.mul_mode,
            key_id: pk.key_id
        });
    }

    fn decrypt(&self, sk: &ClearSecretKey, ciphertext: &ClearCiphertext) -> Result<ClearPlaintext> {
        if sk.key_id != ciphertext.key_id {
            return Err(Error::Backend("ciphertext was encrypted under a different key".to_string()));
        }
        return Ok(ClearPlaintext {
            payload: ciphertext.payload.clone(),
            level: ciphertext.level,
            scale: ciphertext.scale,
            mul_mode: ciphertext.mul_mode
        });
    }

    fn add(&self, lhs: &ClearCiphertext, rhs: &ClearCiphertext) -> Result<ClearCiphertext> {
        self.check_compatible(lhs, rhs)?;
        self.check_same_scale(lhs.scale, rhs.scale)?;
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Add)?,
            size: lhs.size.max(rhs.size),
            ..lhs.clone()
        });
    }

    fn sub(&self, lhs: &ClearCiphertext, rhs: &ClearCiphertext) -> Result<ClearCiphertext> {
        self.check_compatible(lhs, rhs)?;
        self.check_same_scale(lhs.scale, rhs.scale)?;
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Sub)?,
            size: lhs.size.max(rhs.size),
            ..lhs.clone()
        });
    }

    fn multiply(&self, lhs: &ClearCiphertext, rhs: &ClearCiphertext) -> Result<ClearCiphertext> {
        self.check_compatible(lhs, rhs)?;
        let scale = lhs.scale * rhs.scale;
        if self.scheme.is_approximate() {
            self.check_scale(lhs.level, scale)?;
        }
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Mul)?,
            scale: scale,
            size: lhs.size + rhs.size - 1,
            ..lhs.clone()
        });
    }

    fn add_plain(&self, lhs: &ClearCiphertext, rhs: &ClearPlaintext) -> Result<ClearCiphertext> {
        self.check_compatible_plain(lhs, rhs)?;
        self.check_same_scale(lhs.scale, rhs.scale)?;
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Add)?,
            ..lhs.clone()
        });
    }

    fn sub_plain(&self, lhs: &ClearCiphertext, rhs: &ClearPlaintext) -> Result<ClearCiphertext> {
        self.check_compatible_plain(lhs, rhs)?;
        self.check_same_scale(lhs.scale, rhs.scale)?;
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Sub)?,
            ..lhs.clone()
        });
    }

    fn multiply_plain(&self, lhs: &ClearCiphertext, rhs: &ClearPlaintext) -> Result<ClearCiphertext> {
        self.check_compatible_plain(lhs, rhs)?;
        let scale = lhs.scale * rhs.scale;
        if self.scheme.is_approximate() {
            self.check_scale(lhs.level, scale)?;
        }
        return Ok(ClearCiphertext {
            payload: self.combine(&lhs.payload, &rhs.payload, lhs.mul_mode, BinaryOp::Mul)?,
            scale: scale,
            ..lhs.clone()
        });
    }

    fn negate(&self, ciphertext: &ClearCiphertext) -> Result<ClearCiphertext> {
        let payload = match &ciphertext.payload {
            Payload::Integer(data) => {
                let Zt = self.plaintext_ring()?;
                Payload::Integer(data.iter().map(|x| Zt.smallest_positive_lift(Zt.negate(Zt.coerce(&ZZ, *x as i64))) as u64).collect())
            },
            Payload::Approximate(data) => Payload::Approximate(data.iter().map(|x| -x).collect())
        };
        return Ok(ClearCiphertext {
            payload: payload,
            ..ciphertext.clone()
        });
    }

    fn relinearize(&self, ciphertext: &ClearCiphertext, rk: &ClearRelinKeys) -> Result<ClearCiphertext> {
        if rk.key_id != ciphertext.key_id {
            return Err(Error::Backend("relinearization keys belong to a different secret key".to_string()));
        }
        return Ok(ClearCiphertext {
            size: CANONICAL_CIPHERTEXT_SIZE,
            ..ciphertext.clone()
        });
    }

    fn mod_switch_to_next(&self, ciphertext: &ClearCiphertext) -> Result<ClearCiphertext> {
        if ciphertext.level <= 1 {
            return Err(Error::Backend("end of modulus switching chain reached".to_string()));
        }
        return Ok(ClearCiphertext {
            level: ciphertext.level - 1,
            ..ciphertext.clone()
        });
    }

    fn mod_switch_plain_to(&self, plaintext: &ClearPlaintext, parms_id: ParmsId) -> Result<ClearPlaintext> {
        let level = self.level_of(parms_id)?;
        if level > plaintext.level {
            return Err(Error::InvalidArgument(format!("cannot switch plaintext from level {} up to level {}", plaintext.level, level)));
        }
        if self.scheme.is_approximate() {
            self.check_scale(level, plaintext.scale)?;
        }
        return Ok(ClearPlaintext {
            level: level,
            ..plaintext.clone()
        });
    }

    fn rescale_to_next(&self, ciphertext: &ClearCiphertext) -> Result<ClearCiphertext> {
        if !self.scheme.is_approximate() {
            return Err(Error::WrongSchemeKind { operation: "rescale_to_next", kind: self.scheme });
        }
        if ciphertext.level <= 1 {
            return Err(Error::Backend("end of modulus switching chain reached".to_string()));
        }
        let q = self.coeff_modulus[ciphertext.level - 1] as f64;
        let payload = match &ciphertext.payload {
            Payload::Approximate(data) => Payload::Approximate(data.iter().map(|x| x / q).collect()),
            Payload::Integer(_) => return Err(Error::WrongSchemeKind { operation: "rescale_to_next", kind: self.scheme })
        };
        return Ok(ClearCiphertext {
            payload: payload,
            level: ciphertext.level - 1,
            scale: ciphertext.scale / q,
            ..ciphertext.clone()
        });
    }

    fn rotate_rows(&self, ciphertext: &ClearCiphertext, step: i32, gk: &ClearGaloisKeys) -> Result<ClearCiphertext> {
        if step == 0 {
            return Ok(ciphertext.clone());
        }
        let row_size = self.poly_modulus_degree / 2;
        let data = match (&ciphertext.payload, ciphertext.mul_mode) {
            (Payload::Integer(data), MulMode::ElementWise) => data,
            (Payload::Integer(_), MulMode::Convolution) => return Err(Error::InvalidArgument("rotations require an element-wise encoding".to_string())),
            (Payload::Approximate(_), _) => return Err(Error::WrongSchemeKind { operation: "rotate_rows", kind: self.scheme })
        };
        if step.unsigned_abs() as usize >= row_size {
            return Err(Error::InvalidArgument(format!("rotation step {} is out of range for rows of size {}", step, row_size)));
        }
        gk.check_step(ciphertext.key_id, step)?;
        let shift = step.rem_euclid(row_size as i32) as usize;
        let mut result = Vec::with_capacity(data.len());
        for row in data.chunks(row_size) {
            result.extend((0..row_size).map(|i| row[(i + shift) % row_size]));
        }
        return Ok(ClearCiphertext {
            payload: Payload::Integer(result),
            ..ciphertext.clone()
        });
    }

    fn rotate_columns(&self, ciphertext: &ClearCiphertext, gk: &ClearGaloisKeys) -> Result<ClearCiphertext> {
        let row_size = self.poly_modulus_degree / 2;
        let data = match (&ciphertext.payload, ciphertext.mul_mode) {
            (Payload::Integer(data), MulMode::ElementWise) => data,
            (Payload::Integer(_), MulMode::Convolution) => return Err(Error::InvalidArgument("rotations require an element-wise encoding".to_string())),
            (Payload::Approximate(_), _) => return Err(Error::WrongSchemeKind { operation: "rotate_columns", kind: self.scheme })
        };
        gk.check_step(ciphertext.key_id, 0)?;
        let mut result = data[row_size..].to_vec();
        result.extend_from_slice(&data[..row_size]);
        return Ok(ClearCiphertext {
            payload: Payload::Integer(result),
            ..ciphertext.clone()
        });
    }
}

#[cfg(test)]
fn integer_params(scheme: SchemeKind, n: usize, plain_bits: u32, coeff_bits: Vec<u32>) -> EncryptionParameters {
    EncryptionParameters {
        scheme: scheme,
        security_level: crate::scheme::SecurityLevel::Tc128,
        poly_modulus_degree: n,
        plain_modulus_bits: Some(plain_bits),
        coeff_modulus_bits: coeff_bits
    }
}

#[cfg(test)]
fn approximate_params(n: usize, coeff_bits: Vec<u32>) -> EncryptionParameters {
    EncryptionParameters {
        scheme: SchemeKind::Ckks,
        security_level: crate::scheme::SecurityLevel::Tc128,
        poly_modulus_degree: n,
        plain_modulus_bits: None,
        coeff_modulus_bits: coeff_bits
    }
}

#[test]
fn test_create() {
    let backend = ClearBackend::create(&integer_params(SchemeKind::Bgv, 8192, 20, vec![40, 40, 40, 40])).unwrap();
    assert_eq!(4, backend.coeff_modulus().len());
    assert_eq!(ParmsId(3), backend.top_parms_id());
    assert_eq!(8192, backend.slot_count());
    let t = backend.plain_modulus().unwrap();
    assert_eq!(1, t % 16384);
    assert_eq!(20, 64 - t.leading_zeros());

    let backend = ClearBackend::create(&approximate_params(8192, vec![60, 40, 40, 60])).unwrap();
    assert_eq!(None, backend.plain_modulus());
    assert_eq!(4096, backend.slot_count());

    assert!(matches!(ClearBackend::create(&integer_params(SchemeKind::Bfv, 8192, 1, vec![40])), Err(Error::InvalidArgument(_))));
    assert!(matches!(ClearBackend::create(&approximate_params(8192, vec![])), Err(Error::EmptyChain)));
}

#[test]
fn test_integer_arithmetic() {
    let backend = ClearBackend::create(&integer_params(SchemeKind::Bfv, 4096, 20, vec![40, 40])).unwrap();
    let t = backend.plain_modulus().unwrap();
    let sk = backend.gen_secret_key().unwrap();
    let pk = backend.gen_public_key(&sk).unwrap();
    let rk = backend.gen_relin_keys(&sk).unwrap();

    let lhs = backend.encrypt(&pk, &backend.encode_integers(&[1, 2, t - 1], MulMode::ElementWise).unwrap()).unwrap();
    let rhs = backend.encrypt(&pk, &backend.encode_integers(&[5, 6, 3], MulMode::ElementWise).unwrap()).unwrap();

    let sum = backend.add(&lhs, &rhs).unwrap();
    assert_eq!(&[6, 8, 2], &backend.decode_integers(&backend.decrypt(&sk, &sum).unwrap()).unwrap()[..3]);

    let difference = backend.sub(&lhs, &rhs).unwrap();
    assert_eq!(&[t - 4, t - 4, t - 4], &backend.decode_integers(&backend.decrypt(&sk, &difference).unwrap()).unwrap()[..3]);

    let product = backend.multiply(&lhs, &rhs).unwrap();
    assert_eq!(3, product.size());
    assert_eq!(1, product.level());
    assert_eq!(&[5, 12, t - 3], &backend.decode_integers(&backend.decrypt(&sk, &product).unwrap()).unwrap()[..3]);
    assert_eq!(2, backend.relinearize(&product, &rk).unwrap().size());

    let negated = backend.negate(&lhs).unwrap();
    assert_eq!(&[t - 1, t - 2, 1, 0], &backend.decode_integers(&backend.decrypt(&sk, &negated).unwrap()).unwrap()[..4]);
}

#[test]
fn test_negacyclic_multiplication() {
    let backend = ClearBackend::create(&integer_params(SchemeKind::Bgv, 4096, 20, vec![40, 40])).unwrap();
    let t = backend.plain_modulus().unwrap();
    let sk = backend.gen_secret_key().unwrap();
    let pk = backend.gen_public_key(&sk).unwrap();

    // (1 + X) * X^4095 = X^4095 - 1
    let mut x_pow = vec![0; 4096];
    x_pow[4095] = 1;
    let lhs = backend.encrypt(&pk, &backend.encode_integers(&[1, 1], MulMode::Convolution).unwrap()).unwrap();
    let rhs = backend.encrypt(&pk, &backend.encode_integers(&x_pow, MulMode::Convolution).unwrap()).unwrap();
    let result = backend.decode_integers(&backend.decrypt(&sk, &backend.multiply(&lhs, &rhs).unwrap()).unwrap()).unwrap();
    assert_eq!(t - 1, result[0]);
    assert_eq!(1, result[4095]);
    assert!(result[1..4095].iter().all(|x| *x == 0));
}

#[test]
fn test_negacyclic_convolution_lengths() {
    let mul = |x: &f64, y: &f64| x * y;
    // (1 + 2X) * (3 + X) = 3 + 7X + 2X^2 = 1 + 7X mod X^2 + 1
    assert_eq!(vec![1., 7.], negacyclic_convolution(&[1., 2.], &[3., 1.], 0., mul, |x, y| x + y, |x, y| x - y).unwrap());
    assert!(matches!(negacyclic_convolution(&[1., 2.], &[3.], 0., mul, |x, y| x + y, |x, y| x - y), Err(Error::Backend(_))));
}

#[test]
fn test_level_preconditions() {
    let backend = ClearBackend::create(&integer_params(SchemeKind::Bgv, 8192, 20, vec![40, 40, 40, 40])).unwrap();
    let sk = backend.gen_secret_key().unwrap();
    let pk = backend.gen_public_key(&sk).unwrap();
    let ct = backend.encrypt(&pk, &backend.encode_integers(&[1], MulMode::ElementWise).unwrap()).unwrap();
    let lower = backend.mod_switch_to_next(&ct).unwrap();
    assert_eq!(2, lower.level());
    assert!(matches!(backend.add(&ct, &lower), Err(Error::Backend(_))));
    assert!(matches!(backend.mod_switch_to_next(&backend.mod_switch_to_next(&lower).unwrap()), Err(Error::Backend(_))));

    let other_sk = backend.gen_secret_key().unwrap();
    assert!(matches!(backend.decrypt(&other_sk, &ct), Err(Error::Backend(_))));
}

#[test]
fn test_rescale() {
    let backend = ClearBackend::create(&approximate_params(8192, vec![60, 40, 40, 60])).unwrap();
    let sk = backend.gen_secret_key().unwrap();
    let pk = backend.gen_public_key(&sk).unwrap();
    let scale = (1u64 << 40) as f64;
    let pt = backend.encode_complex(&[Complex64::new(1.5, -2.)], backend.top_parms_id(), scale, MulMode::ElementWise).unwrap();
    let ct = backend.encrypt(&pk, &pt).unwrap();
    let squared = backend.multiply(&ct, &ct).unwrap();
    let rescaled = backend.rescale_to_next(&squared).unwrap();
    assert_eq!(2, rescaled.level());
    let q = backend.coeff_modulus()[2] as f64;
    assert_eq!(scale * scale / q, rescaled.scale());
    assert!((rescaled.scale().log2() - 40.).abs() < 0.01);

    let result = backend.decode_complex(&backend.decrypt(&sk, &rescaled).unwrap()).unwrap();
    let expected = Complex64::new(1.5, -2.) * Complex64::new(1.5, -2.);
    assert!((result[0] - expected).norm() < 1e-6);

    // scales do not match anymore
    let fresh_at_level = backend.mod_switch_to_next(&ct).unwrap();
    assert!(matches!(backend.add(&rescaled, &fresh_at_level), Err(Error::Backend(_))));

    assert!(matches!(backend.encode_complex(&[], ParmsId(1), (1u128 << 70) as f64, MulMode::ElementWise), Err(Error::Backend(_))));
}

#[test]
fn test_rotations() {
    let backend = ClearBackend::create(&integer_params(SchemeKind::Bfv, 4096, 20, vec![40, 40])).unwrap();
    let sk = backend.gen_secret_key().unwrap();
    let pk = backend.gen_public_key(&sk).unwrap();
    let all_keys = backend.gen_galois_keys(&sk, &[]).unwrap();
    let some_keys = backend.gen_galois_keys(&sk, &[1, 0]).unwrap();

    let values = (0..4096).collect::<Vec<u64>>();
    let ct = backend.encrypt(&pk, &backend.encode_integers(&values, MulMode::ElementWise).unwrap()).unwrap();

    let rotated = backend.decode_integers(&backend.decrypt(&sk, &backend.rotate_rows(&ct, 3, &all_keys).unwrap()).unwrap()).unwrap();
    assert_eq!(3, rotated[0]);
    assert_eq!(2047, rotated[2044]);
    assert_eq!(0, rotated[2045]);
    assert_eq!(2051, rotated[2048]);
    assert_eq!(2048, rotated[4093]);

    let rotated = backend.decode_integers(&backend.decrypt(&sk, &backend.rotate_rows(&ct, -1, &all_keys).unwrap()).unwrap()).unwrap();
    assert_eq!(2047, rotated[0]);
    assert_eq!(0, rotated[1]);

    let swapped = backend.decode_integers(&backend.decrypt(&sk, &backend.rotate_columns(&ct, &some_keys).unwrap()).unwrap()).unwrap();
    assert_eq!(2048, swapped[0]);
    assert_eq!(0, swapped[2048]);

    assert!(backend.rotate_rows(&ct, 1, &some_keys).is_ok());
    assert_eq!(Error::MissingGaloisKey { step: 2 }, backend.rotate_rows(&ct, 2, &some_keys).unwrap_err());
    assert!(matches!(backend.gen_galois_keys(&sk, &[2048]), Err(Error::InvalidArgument(_))));
}
