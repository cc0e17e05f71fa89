use std::fmt::Debug;

use num_complex::Complex64;

use crate::backend::*;
use crate::backend::clear::ClearBackend;
use crate::error::*;
use crate::primes::primitive_root_of_unity;
use crate::scheme::*;

///
/// Comparing and restoring the level (and scale) alignment of operands.
///
pub mod reconcile;

///
/// The arithmetic operations, which reconcile their operands before
/// delegating to the backend.
///
pub mod arithmetic;

///
/// Row and column rotations, and the summations built from them.
///
pub mod rotation;

///
/// Evaluation of real polynomials on CKKS ciphertexts.
///
pub mod polynomial;

///
/// A ciphertext produced by an [`Fhe`] instance.
///
/// Besides the backend data, it records whether it is the result of a multiplication
/// at the terminal level of the modulus chain. Such a ciphertext can still be added,
/// rotated and decrypted, but multiplying it again fails with [`Error::ExhaustedLevels`].
///
pub struct Ciphertext<B: Backend> {
    pub(crate) data: B::Ciphertext,
    pub(crate) exhausted: bool
}

impl<B: Backend> Ciphertext<B> {

    pub(crate) fn fresh(data: B::Ciphertext) -> Self {
        Ciphertext { data: data, exhausted: false }
    }

    pub fn level(&self) -> usize {
        self.data.level()
    }

    pub fn scale(&self) -> f64 {
        self.data.scale()
    }

    pub fn parms_id(&self) -> ParmsId {
        self.data.parms_id()
    }

    pub fn size(&self) -> usize {
        self.data.size()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn data(&self) -> &B::Ciphertext {
        &self.data
    }
}

impl<B: Backend> Clone for Ciphertext<B> {

    fn clone(&self) -> Self {
        Ciphertext { data: self.data.clone(), exhausted: self.exhausted }
    }
}

impl<B: Backend> Debug for Ciphertext<B> {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ciphertext").field("data", &self.data).field("exhausted", &self.exhausted).finish()
    }
}

pub type Plaintext<B> = <B as Backend>::Plaintext;

///
/// A configured homomorphic encryption scheme, consisting of its (immutable)
/// [`SchemeContext`], the backend instance and the generated key material.
///
/// Binary operations accept operands at different levels (and, for CKKS, scales)
/// and bring them into agreement first, see [`Fhe::add()`] and [`Fhe::multiply()`].
/// Operations that only make sense for one family of schemes are available on
/// the views returned by [`Fhe::as_integer()`] and [`Fhe::as_approximate()`]; the
/// same operations on `Fhe` itself go through these views and fail with
/// [`Error::WrongSchemeKind`] if the scheme does not match.
///
/// Instances are created by [`crate::builder::FheBuilder`].
///
pub struct Fhe<B: Backend = ClearBackend> {
    pub(crate) context: SchemeContext,
    pub(crate) backend: B,
    pub(crate) keys: KeySet<B>
}

impl<B: Backend> Fhe<B> {

    pub(crate) fn new(context: SchemeContext, backend: B, keys: KeySet<B>) -> Self {
        Fhe { context, backend, keys }
    }

    pub fn context(&self) -> &SchemeContext {
        &self.context
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn scheme(&self) -> SchemeKind {
        self.context.kind()
    }

    pub fn sec_level(&self) -> SecurityLevel {
        self.context.security_level()
    }

    pub fn poly_modulus_degree(&self) -> usize {
        self.context.poly_modulus_degree()
    }

    ///
    /// The number of values that fit into one element-wise encoded plaintext.
    ///
    pub fn slot_count(&self) -> usize {
        self.backend.slot_count()
    }

    ///
    /// The bit length of the ciphertext modulus at the highest level, i.e. of
    /// the product of all primes except the key switching prime.
    ///
    pub fn first_level_modulus_bits(&self) -> u32 {
        modulus_bits(&self.backend.coeff_modulus()[..self.context.max_level()])
    }

    ///
    /// The bit length of the ciphertext modulus at the terminal level.
    ///
    pub fn last_level_modulus_bits(&self) -> u32 {
        modulus_bits(&self.backend.coeff_modulus()[..1])
    }

    pub fn mul_mode(&self) -> MulMode {
        self.context.mul_mode()
    }

    ///
    /// Sets the multiplication mode used by [`Fhe::encode()`]. Plaintexts remember
    /// the mode they were encoded with, so this does not affect existing values.
    ///
    pub fn set_mul_mode(&mut self, mul_mode: MulMode) {
        self.context.mul_mode = mul_mode;
    }

    pub fn level(&self, ciphertext: &Ciphertext<B>) -> usize {
        ciphertext.level()
    }

    pub fn as_integer(&self) -> Result<IntegerFhe<B>> {
        self.integer_view("as_integer")
    }

    pub fn as_approximate(&self) -> Result<ApproximateFhe<B>> {
        self.approximate_view("as_approximate")
    }

    pub(crate) fn integer_view(&self, operation: &'static str) -> Result<IntegerFhe<B>> {
        if !self.scheme().is_integer() {
            return Err(Error::WrongSchemeKind { operation, kind: self.scheme() });
        }
        let plain_modulus = self.backend.plain_modulus().ok_or_else(|| Error::Backend(format!("{} backend has no plain modulus", self.scheme())))?;
        return Ok(IntegerFhe { fhe: self, plain_modulus });
    }

    pub(crate) fn approximate_view(&self, operation: &'static str) -> Result<ApproximateFhe<B>> {
        if !self.scheme().is_approximate() {
            return Err(Error::WrongSchemeKind { operation, kind: self.scheme() });
        }
        let scale = self.context.default_scale().ok_or_else(|| Error::Backend(format!("{} context has no default scale", self.scheme())))?;
        return Ok(ApproximateFhe { fhe: self, scale });
    }

    pub fn plain_modulus(&self) -> Result<u64> {
        Ok(self.integer_view("plain_modulus")?.plain_modulus())
    }

    pub fn plain_modulus_bits(&self) -> Result<u32> {
        Ok(self.integer_view("plain_modulus_bits")?.plain_modulus_bits())
    }

    pub fn plain_modulus_primitive_root(&self, n: usize) -> Result<u64> {
        self.integer_view("plain_modulus_primitive_root")?.plain_modulus_primitive_root(n)
    }

    pub fn scale(&self) -> Result<f64> {
        Ok(self.approximate_view("scale")?.scale())
    }

    ///
    /// Encodes the given values using the current multiplication mode. Integer
    /// values require BFV/BGV, floating point values CKKS.
    ///
    pub fn encode<T: SlotValue>(&self, values: &[T]) -> Result<Plaintext<B>> {
        T::encode_slots(self, values, self.mul_mode())
    }

    pub fn encode_with_mode<T: SlotValue>(&self, values: &[T], mul_mode: MulMode) -> Result<Plaintext<B>> {
        T::encode_slots(self, values, mul_mode)
    }

    ///
    /// Decodes a plaintext, using the multiplication mode it was encoded with.
    ///
    pub fn decode<T: SlotValue>(&self, plaintext: &Plaintext<B>) -> Result<Vec<T>> {
        T::decode_slots(self, plaintext)
    }

    pub fn encrypt(&self, plaintext: &Plaintext<B>) -> Result<Ciphertext<B>> {
        let pk = self.keys.public_key()?;
        Ok(Ciphertext::fresh(self.backend.encrypt(pk, plaintext)?))
    }

    pub fn decrypt(&self, ciphertext: &Ciphertext<B>) -> Result<Plaintext<B>> {
        let sk = self.keys.secret_key()?;
        self.backend.decrypt(sk, &ciphertext.data)
    }
}

fn modulus_bits(primes: &[u64]) -> u32 {
    let bits: f64 = primes.iter().map(|p| (*p as f64).log2()).sum();
    return bits.floor() as u32 + 1;
}

///
/// Operations of an [`Fhe`] instance that is known to use BFV or BGV.
///
pub struct IntegerFhe<'a, B: Backend> {
    pub(crate) fhe: &'a Fhe<B>,
    plain_modulus: u64
}

impl<'a, B: Backend> Clone for IntegerFhe<'a, B> {

    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, B: Backend> Copy for IntegerFhe<'a, B> {}

impl<'a, B: Backend> IntegerFhe<'a, B> {

    pub fn fhe(&self) -> &'a Fhe<B> {
        self.fhe
    }

    pub fn plain_modulus(&self) -> u64 {
        self.plain_modulus
    }

    pub fn plain_modulus_bits(&self) -> u32 {
        64 - self.plain_modulus.leading_zeros()
    }

    ///
    /// Returns a primitive `n`-th root of unity modulo the plain modulus, where `n`
    /// must be a power of two.
    ///
    pub fn plain_modulus_primitive_root(&self, n: usize) -> Result<u64> {
        if !n.is_power_of_two() {
            return Err(Error::InvalidArgument(format!("order {} of the root of unity must be a power of two", n)));
        }
        primitive_root_of_unity(self.plain_modulus, n)
            .ok_or_else(|| Error::InvalidArgument(format!("there is no primitive {}-th root of unity modulo {}", n, self.plain_modulus)))
    }
}

///
/// Operations of an [`Fhe`] instance that is known to use CKKS.
///
pub struct ApproximateFhe<'a, B: Backend> {
    pub(crate) fhe: &'a Fhe<B>,
    scale: f64
}

impl<'a, B: Backend> Clone for ApproximateFhe<'a, B> {

    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, B: Backend> Copy for ApproximateFhe<'a, B> {}

impl<'a, B: Backend> ApproximateFhe<'a, B> {

    pub fn fhe(&self) -> &'a Fhe<B> {
        self.fhe
    }

    ///
    /// The scale that values are encoded with by default.
    ///
    pub fn scale(&self) -> f64 {
        self.scale
    }

    ///
    /// Encodes real or complex values at the given parameter set and scale, using the
    /// current multiplication mode.
    ///
    pub fn encode_at<T: Copy + Into<Complex64>>(&self, values: &[T], parms_id: ParmsId, scale: f64) -> Result<Plaintext<B>> {
        let values = values.iter().map(|x| (*x).into()).collect::<Vec<Complex64>>();
        self.fhe.backend.encode_complex(&values, parms_id, scale, self.fhe.mul_mode())
    }
}

///
/// Types that can be encoded into the slots (or coefficients) of a plaintext.
///
/// `u64` and `i64` are encoded modulo the plain modulus of BFV/BGV, where `i64`
/// uses the representatives in `(-t/2, t/2]` when decoding. `f64` and [`Complex64`]
/// are encoded by CKKS at the top level and default scale.
///
pub trait SlotValue: Sized {

    fn encode_slots<B: Backend>(fhe: &Fhe<B>, values: &[Self], mul_mode: MulMode) -> Result<Plaintext<B>>;

    fn decode_slots<B: Backend>(fhe: &Fhe<B>, plaintext: &Plaintext<B>) -> Result<Vec<Self>>;
}

impl SlotValue for u64 {

    fn encode_slots<B: Backend>(fhe: &Fhe<B>, values: &[Self], mul_mode: MulMode) -> Result<Plaintext<B>> {
        fhe.integer_view("encode")?;
        fhe.backend.encode_integers(values, mul_mode)
    }

    fn decode_slots<B: Backend>(fhe: &Fhe<B>, plaintext: &Plaintext<B>) -> Result<Vec<Self>> {
        fhe.integer_view("decode")?;
        fhe.backend.decode_integers(plaintext)
    }
}

impl SlotValue for i64 {

    fn encode_slots<B: Backend>(fhe: &Fhe<B>, values: &[Self], mul_mode: MulMode) -> Result<Plaintext<B>> {
        let t = fhe.integer_view("encode")?.plain_modulus() as i64;
        let reduced = values.iter().map(|x| x.rem_euclid(t) as u64).collect::<Vec<_>>();
        fhe.backend.encode_integers(&reduced, mul_mode)
    }

    fn decode_slots<B: Backend>(fhe: &Fhe<B>, plaintext: &Plaintext<B>) -> Result<Vec<Self>> {
        let t = fhe.integer_view("decode")?.plain_modulus();
        Ok(fhe.backend.decode_integers(plaintext)?.into_iter().map(|x| if x > t / 2 { x as i64 - t as i64 } else { x as i64 }).collect())
    }
}

impl SlotValue for Complex64 {

    fn encode_slots<B: Backend>(fhe: &Fhe<B>, values: &[Self], mul_mode: MulMode) -> Result<Plaintext<B>> {
        let scale = fhe.approximate_view("encode")?.scale();
        fhe.backend.encode_complex(values, fhe.backend.top_parms_id(), scale, mul_mode)
    }

    fn decode_slots<B: Backend>(fhe: &Fhe<B>, plaintext: &Plaintext<B>) -> Result<Vec<Self>> {
        fhe.approximate_view("decode")?;
        fhe.backend.decode_complex(plaintext)
    }
}

impl SlotValue for f64 {

    fn encode_slots<B: Backend>(fhe: &Fhe<B>, values: &[Self], mul_mode: MulMode) -> Result<Plaintext<B>> {
        let values = values.iter().map(|x| Complex64::new(*x, 0.)).collect::<Vec<_>>();
        Complex64::encode_slots(fhe, &values, mul_mode)
    }

    fn decode_slots<B: Backend>(fhe: &Fhe<B>, plaintext: &Plaintext<B>) -> Result<Vec<Self>> {
        Ok(Complex64::decode_slots(fhe, plaintext)?.into_iter().map(|x| x.re).collect())
    }
}

#[cfg(test)]
use crate::builder::FheBuilder;
#[cfg(test)]
use feanor_math::primitive_int::StaticRing;
#[cfg(test)]
use feanor_math::ring::*;
#[cfg(test)]
use feanor_math::rings::zn::zn_64::Zn;

#[test]
fn test_integer_encoding() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let t = fhe.plain_modulus().unwrap();
    let values = [-3i64, 0, 17, (t / 2) as i64, -((t / 2) as i64)];
    let ct = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();
    let decoded: Vec<i64> = fhe.decode(&fhe.decrypt(&ct).unwrap()).unwrap();
    assert_eq!(&values[..], &decoded[..5]);
    assert!(decoded[5..].iter().all(|x| *x == 0));

    let unsigned: Vec<u64> = fhe.decode(&fhe.decrypt(&ct).unwrap()).unwrap();
    assert_eq!(t - 3, unsigned[0]);

    assert_eq!(Err(Error::WrongSchemeKind { operation: "encode", kind: SchemeKind::Bfv }), fhe.encode(&[1.5f64]).map(|_| ()));
    assert!(matches!(fhe.scale(), Err(Error::WrongSchemeKind { .. })));
}

#[test]
fn test_approximate_encoding() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    assert_eq!(4096, fhe.slot_count());
    let values = [0.5, -1.25, 3.75];
    let ct = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();
    assert_eq!(3, fhe.level(&ct));
    let decoded: Vec<f64> = fhe.decode(&fhe.decrypt(&ct).unwrap()).unwrap();
    for (expected, actual) in values.iter().zip(decoded.iter()) {
        assert!((expected - actual).abs() < 1e-6);
    }
    assert!(matches!(fhe.encode(&[1u64]), Err(Error::WrongSchemeKind { .. })));
    assert!(matches!(fhe.plain_modulus(), Err(Error::WrongSchemeKind { .. })));
    assert!(fhe.as_approximate().is_ok());
    assert!(fhe.as_integer().is_err());
}

#[test]
fn test_modulus_bits() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 8192, 20).unwrap();
    assert_eq!(4, fhe.context().chain_length());
    assert_eq!(120, fhe.first_level_modulus_bits());
    assert_eq!(40, fhe.last_level_modulus_bits());
    assert_eq!(20, fhe.plain_modulus_bits().unwrap());
}

#[test]
fn test_plain_modulus_primitive_root() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 4096, 20).unwrap();
    let Zt = Zn::new(fhe.plain_modulus().unwrap());
    let root = Zt.coerce(&StaticRing::<i64>::RING, fhe.plain_modulus_primitive_root(8192).unwrap() as i64);
    // root^(n/2) = -1 for a primitive n-th root of unity
    assert!(Zt.is_neg_one(&Zt.pow(root, 4096)));
    assert!(matches!(fhe.plain_modulus_primitive_root(12), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_set_mul_mode() {
    let mut fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    assert_eq!(MulMode::ElementWise, fhe.mul_mode());
    let element_wise = fhe.encode(&[2u64, 3]).unwrap();
    fhe.set_mul_mode(MulMode::Convolution);
    let convolution = fhe.encode(&[2u64, 3]).unwrap();
    assert_eq!(MulMode::ElementWise, element_wise.mul_mode());
    assert_eq!(MulMode::Convolution, convolution.mul_mode());
    assert_eq!(MulMode::ElementWise, fhe.encode_with_mode(&[1u64], MulMode::ElementWise).unwrap().mul_mode());
}

#[test]
fn test_encode_at() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let approximate = fhe.as_approximate().unwrap();
    let scale = (1u64 << 30) as f64;

    let complex = approximate.encode_at(&[Complex64::new(0.5, -1.), Complex64::new(0., 2.)], ParmsId(2), scale).unwrap();
    assert_eq!(ParmsId(2), complex.parms_id());
    assert_eq!(scale, complex.scale());
    let decoded: Vec<Complex64> = fhe.decode(&complex).unwrap();
    assert!((decoded[0] - Complex64::new(0.5, -1.)).norm() < 1e-9);
    assert!((decoded[1] - Complex64::new(0., 2.)).norm() < 1e-9);

    let real = approximate.encode_at(&[0.5, -1.], ParmsId(1), scale).unwrap();
    let decoded: Vec<f64> = fhe.decode(&real).unwrap();
    assert_eq!(vec![0.5, -1.], decoded[..2].to_vec());

    assert!(matches!(approximate.encode_at(&[1.], ParmsId(7), scale), Err(Error::InvalidArgument(_))));
}
