use std::marker::PhantomData;

use tracing::{info, instrument};

use crate::backend::*;
use crate::backend::clear::ClearBackend;
use crate::error::*;
use crate::fhe::Fhe;
use crate::params::*;
use crate::scheme::*;

///
/// Creates [`Fhe`] instances.
///
/// The security level, the default multiplication mode and the key material to
/// generate are configured by the fluent setters, and default to 128 bits of security,
/// element-wise multiplication and all keys. The modulus chain is either given
/// explicitly, or sized to use as many levels as the security level allows.
/// ```
/// # use he_arith::builder::*;
/// # use he_arith::scheme::*;
/// let fhe = FheBuilder::new()
///     .sec_level(SecurityLevel::Tc128)
///     .build_integer_scheme(IntScheme::Bgv, 8192, 20)
///     .unwrap();
/// let a = fhe.encrypt(&fhe.encode(&[1u64, 2, 3]).unwrap()).unwrap();
/// let b = fhe.multiply(&a, &a).unwrap();
/// assert_eq!(vec![1, 4, 9], fhe.decode::<u64>(&fhe.decrypt(&b).unwrap()).unwrap()[..3].to_vec());
/// ```
///
pub struct FheBuilder<B: Backend = ClearBackend> {
    security_level: SecurityLevel,
    mul_mode: MulMode,
    key_flags: KeyFlags,
    backend: PhantomData<B>
}

impl FheBuilder<ClearBackend> {

    pub fn new() -> Self {
        Self::for_backend()
    }
}

impl Default for FheBuilder<ClearBackend> {

    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> FheBuilder<B> {

    pub fn for_backend() -> Self {
        FheBuilder {
            security_level: SecurityLevel::default(),
            mul_mode: MulMode::default(),
            key_flags: KeyFlags::default(),
            backend: PhantomData
        }
    }

    pub fn sec_level(mut self, security_level: SecurityLevel) -> Self {
        self.security_level = security_level;
        self
    }

    pub fn mul_mode(mut self, mul_mode: MulMode) -> Self {
        self.mul_mode = mul_mode;
        self
    }

    pub fn secret_key(mut self, use_key: bool) -> Self {
        self.key_flags.secret_key = use_key;
        self
    }

    pub fn public_key(mut self, use_key: bool) -> Self {
        self.key_flags.public_key = use_key;
        self
    }

    pub fn relin_keys(mut self, use_keys: bool) -> Self {
        self.key_flags.relin_keys = use_keys;
        self
    }

    ///
    /// Configures the galois keys. If `steps` is empty, keys for all rotations are
    /// generated, otherwise only for the given row rotation steps, where `0` stands
    /// for the column rotation.
    ///
    pub fn galois_keys(mut self, use_keys: bool, steps: &[i32]) -> Self {
        self.key_flags.galois_keys = use_keys;
        self.key_flags.rotation_steps = steps.to_vec();
        self
    }

    ///
    /// Builds a BFV/BGV instance whose modulus chain consists of primes of twice the
    /// bit length of the plain modulus, as many as fit within the security bound.
    ///
    pub fn build_integer_scheme(&self, scheme: IntScheme, poly_modulus_degree: usize, plain_modulus_bits: u32) -> Result<Fhe<B>> {
        let coeff_modulus_bits = size_integer_chain(self.security_level, poly_modulus_degree, plain_modulus_bits)?;
        self.build_integer_scheme_with_chain(scheme, poly_modulus_degree, plain_modulus_bits, &coeff_modulus_bits)
    }

    pub fn build_integer_scheme_with_chain(&self, scheme: IntScheme, poly_modulus_degree: usize, plain_modulus_bits: u32, coeff_modulus_bits: &[u32]) -> Result<Fhe<B>> {
        let params = EncryptionParameters {
            scheme: scheme.into(),
            security_level: self.security_level,
            poly_modulus_degree: poly_modulus_degree,
            plain_modulus_bits: Some(plain_modulus_bits),
            coeff_modulus_bits: coeff_modulus_bits.to_vec()
        };
        self.build(params, None)
    }

    ///
    /// Builds a CKKS instance whose modulus chain consists of two 60-bit primes around
    /// as many primes of `log2(scale)` bits as fit within the security bound.
    ///
    pub fn build_approximate_scheme(&self, scheme: RealComplexScheme, poly_modulus_degree: usize, scale: f64) -> Result<Fhe<B>> {
        let coeff_modulus_bits = size_approximate_chain(self.security_level, poly_modulus_degree, scale)?;
        self.build_approximate_scheme_with_chain(scheme, poly_modulus_degree, scale, &coeff_modulus_bits)
    }

    pub fn build_approximate_scheme_with_chain(&self, scheme: RealComplexScheme, poly_modulus_degree: usize, scale: f64, coeff_modulus_bits: &[u32]) -> Result<Fhe<B>> {
        if !scale.is_finite() || scale < 2. {
            return Err(Error::InvalidArgument(format!("scale must be a finite number of at least 2, got {}", scale)));
        }
        let params = EncryptionParameters {
            scheme: scheme.into(),
            security_level: self.security_level,
            poly_modulus_degree: poly_modulus_degree,
            plain_modulus_bits: None,
            coeff_modulus_bits: coeff_modulus_bits.to_vec()
        };
        self.build(params, Some(scale))
    }

    #[instrument(skip_all)]
    fn build(&self, params: EncryptionParameters, default_scale: Option<f64>) -> Result<Fhe<B>> {
        validate_chain(params.security_level, params.poly_modulus_degree, &params.coeff_modulus_bits)?;
        let backend = B::create(&params)?;
        let keys = self.generate_keys(&backend)?;
        let context = SchemeContext {
            kind: params.scheme,
            security_level: params.security_level,
            poly_modulus_degree: params.poly_modulus_degree,
            coeff_modulus_bits: params.coeff_modulus_bits,
            default_scale: default_scale,
            mul_mode: self.mul_mode,
            key_flags: self.key_flags.clone()
        };
        info!(
            scheme = %context.kind(),
            security_level = context.security_level().bits(),
            poly_modulus_degree = context.poly_modulus_degree(),
            coeff_modulus_bits = ?context.coeff_modulus_bits(),
            "built homomorphic encryption scheme"
        );
        return Ok(Fhe::new(context, backend, keys));
    }

    fn generate_keys(&self, backend: &B) -> Result<KeySet<B>> {
        let flags = &self.key_flags;
        let sk = backend.gen_secret_key()?;
        let mut keys = KeySet::empty();
        if flags.public_key {
            keys.public_key = Some(backend.gen_public_key(&sk)?);
        }
        if flags.relin_keys {
            keys.relin_keys = Some(backend.gen_relin_keys(&sk)?);
        }
        if flags.galois_keys {
            keys.galois_keys = Some(backend.gen_galois_keys(&sk, &flags.rotation_steps)?);
        }
        if flags.secret_key {
            keys.secret_key = Some(sk);
        }
        return Ok(keys);
    }
}

#[test]
fn test_build_integer_scheme() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 8192, 20).unwrap();
    assert_eq!(SchemeKind::Bgv, fhe.scheme());
    assert_eq!(SecurityLevel::Tc128, fhe.sec_level());
    assert_eq!(8192, fhe.poly_modulus_degree());
    assert_eq!(&[40, 40, 40, 40], fhe.context().coeff_modulus_bits());
    assert_eq!(None, fhe.context().default_scale());
    assert_eq!(&KeyFlags::default(), fhe.context().key_flags());

    let fhe = FheBuilder::new().sec_level(SecurityLevel::Tc192).build_integer_scheme(IntScheme::Bfv, 8192, 20).unwrap();
    // (152 - 20) / 40 = 3
    assert_eq!(3, fhe.context().chain_length());
}

#[test]
fn test_build_with_chain() {
    let fhe = FheBuilder::new().build_integer_scheme_with_chain(IntScheme::Bfv, 8192, 20, &[50, 50, 50, 50]).unwrap();
    assert_eq!(4, fhe.context().chain_length());
    assert_eq!(3, fhe.context().max_level());

    let fhe = FheBuilder::new().build_approximate_scheme_with_chain(RealComplexScheme::Ckks, 8192, (1u64 << 30) as f64, &[60, 30, 30, 30, 60]).unwrap();
    assert_eq!(5, fhe.context().chain_length());
    assert_eq!(Some((1u64 << 30) as f64), fhe.context().default_scale());

    assert_eq!(
        Err(Error::ParameterOverflow { total_bits: 240, max_bits: 218 }),
        FheBuilder::new().build_integer_scheme_with_chain(IntScheme::Bfv, 8192, 20, &[60, 60, 60, 60]).map(|_| ())
    );
    assert_eq!(
        Err(Error::ParameterOverflow { total_bits: 230, max_bits: 218 }),
        FheBuilder::new().build_approximate_scheme_with_chain(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64, &[60, 40, 40, 30, 60]).map(|_| ())
    );
    assert_eq!(Err(Error::EmptyChain), FheBuilder::new().build_integer_scheme_with_chain(IntScheme::Bgv, 8192, 20, &[]).map(|_| ()));
    assert!(matches!(FheBuilder::new().build_approximate_scheme_with_chain(RealComplexScheme::Ckks, 8192, 0.5, &[60, 60]), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_build_approximate_scheme() {
    let fhe = FheBuilder::new().mul_mode(MulMode::Convolution).build_approximate_scheme(RealComplexScheme::Ckks, 16384, (1u64 << 40) as f64).unwrap();
    // (438 - 120) / 40 = 7
    assert_eq!(9, fhe.context().chain_length());
    assert_eq!(MulMode::Convolution, fhe.mul_mode());
    assert_eq!((1u64 << 40) as f64, fhe.scale().unwrap());

    assert!(matches!(
        FheBuilder::new().sec_level(SecurityLevel::Tc256).build_approximate_scheme(RealComplexScheme::Ckks, 4096, (1u64 << 40) as f64),
        Err(Error::ParameterOverflow { .. })
    ));
}

#[test]
fn test_key_flags() {
    let fhe = FheBuilder::new().secret_key(false).build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1u64]).unwrap()).unwrap();
    assert!(matches!(fhe.decrypt(&ct), Err(Error::MissingKey(KeyKind::Secret))));

    let fhe = FheBuilder::new().public_key(false).build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    assert!(matches!(fhe.encrypt(&fhe.encode(&[1u64]).unwrap()), Err(Error::MissingKey(KeyKind::Public))));

    assert!(matches!(
        FheBuilder::new().galois_keys(true, &[4096]).build_integer_scheme(IntScheme::Bfv, 4096, 20),
        Err(Error::InvalidArgument(_))
    ));
}
