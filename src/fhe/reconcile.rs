use num_complex::Complex64;
use tracing::{debug, instrument, warn};

use crate::backend::*;
use crate::error::*;
use crate::scheme::MulMode;

use super::*;

impl<'a, B: Backend> IntegerFhe<'a, B> {

    pub fn levels_equal(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> bool {
        c1.level() == c2.level()
    }

    ///
    /// Brings two ciphertexts at different levels to the same level, by switching
    /// the modulus of the one at the higher level down until it is at the level of
    /// the other one. The latter is returned unchanged, and the order of the
    /// ciphertexts is preserved.
    ///
    /// Fails with [`Error::AlreadyMatched`] if both are already at the same level.
    ///
    #[instrument(skip_all)]
    pub fn match_levels(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<(Ciphertext<B>, Ciphertext<B>)> {
        if self.levels_equal(c1, c2) {
            return Err(Error::AlreadyMatched);
        }
        if c1.level() > c2.level() {
            return Ok((self.switch_down_to(c1, c2.level())?, c2.clone()));
        } else {
            return Ok((c1.clone(), self.switch_down_to(c2, c1.level())?));
        }
    }

    fn switch_down_to(&self, ciphertext: &Ciphertext<B>, level: usize) -> Result<Ciphertext<B>> {
        let mut current = ciphertext.data.clone();
        while current.level() > level {
            debug!(from = current.level(), to = level, "switching modulus to next level");
            let next = record_time!("IntegerFhe::match_levels::mod_switch", || self.fhe.backend.mod_switch_to_next(&current))?;
            current = next;
        }
        return Ok(Ciphertext { data: current, exhausted: ciphertext.exhausted });
    }
}

impl<'a, B: Backend> ApproximateFhe<'a, B> {

    pub fn level_scale_equal(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> bool {
        c1.level() == c2.level() && scales_equal(c1.scale(), c2.scale())
    }

    ///
    /// Checks whether a ciphertext and a plaintext are defined w.r.t. the same parameter set
    /// and scale, i.e. whether they can be combined without further preparation.
    ///
    pub fn level_scale_equal_plain(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> bool {
        ciphertext.parms_id() == plaintext.parms_id() && scales_equal(ciphertext.scale(), plaintext.scale())
    }

    ///
    /// Brings two ciphertexts to the same level and scale. The ciphertext at the higher
    /// level is repeatedly multiplied by an encoding of `1` at its own scale and rescaled,
    /// until it reaches the level of the other ciphertext.
    ///
    /// Since every rescaling divides the scale by a prime of the modulus chain, which is
    /// only approximately equal to the default scale, the resulting scales are only equal
    /// if both ciphertexts went through the same primes. Otherwise they agree up to the
    /// relative difference between these primes. If both ciphertexts are at the same level
    /// but at different scales, rescaling cannot help, so they are returned unchanged.
    ///
    /// Fails with [`Error::AlreadyMatched`] if level and scale already agree.
    ///
    #[instrument(skip_all)]
    pub fn match_levels_and_scales(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<(Ciphertext<B>, Ciphertext<B>)> {
        if self.level_scale_equal(c1, c2) {
            return Err(Error::AlreadyMatched);
        }
        if c1.level() == c2.level() {
            warn!(level = c1.level(), lhs_scale = c1.scale().log2(), rhs_scale = c2.scale().log2(), "ciphertexts at the same level differ in scale, leaving them unchanged");
            return Ok((c1.clone(), c2.clone()));
        }
        if c1.level() > c2.level() {
            return Ok((self.rescale_down_to(c1, c2.level())?, c2.clone()));
        } else {
            return Ok((c1.clone(), self.rescale_down_to(c2, c1.level())?));
        }
    }

    fn rescale_down_to(&self, ciphertext: &Ciphertext<B>, level: usize) -> Result<Ciphertext<B>> {
        let backend = &self.fhe.backend;
        let mut current = ciphertext.data.clone();
        while current.level() > level {
            debug!(from = current.level(), to = level, scale = current.scale().log2(), "rescaling to next level");
            let one = match current.mul_mode() {
                MulMode::ElementWise => vec![Complex64::new(1., 0.); backend.slot_count()],
                MulMode::Convolution => vec![Complex64::new(1., 0.)]
            };
            let one = backend.encode_complex(&one, current.parms_id(), current.scale(), current.mul_mode())?;
            let mut product = record_time!("ApproximateFhe::match_levels_and_scales::multiply_plain", || backend.multiply_plain(&current, &one))?;
            if product.size() > CANONICAL_CIPHERTEXT_SIZE {
                product = backend.relinearize(&product, self.fhe.keys.relin_keys()?)?;
            }
            let next = record_time!("ApproximateFhe::match_levels_and_scales::rescale", || backend.rescale_to_next(&product))?;
            current = next;
        }
        return Ok(Ciphertext { data: current, exhausted: ciphertext.exhausted });
    }

    ///
    /// Returns a plaintext that encodes the same values as `plaintext`, but is defined
    /// w.r.t. the parameter set and scale of `ciphertext`.
    ///
    /// If only the parameter sets differ and the plaintext is at a higher level, it
    /// is switched down, which is exact. Otherwise, the plaintext is decoded and encoded
    /// again, which introduces additional approximation error.
    ///
    /// Fails with [`Error::AlreadyMatched`] if parameter set and scale already agree.
    ///
    #[instrument(skip_all)]
    pub fn match_level_and_scale(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<Plaintext<B>> {
        if self.level_scale_equal_plain(ciphertext, plaintext) {
            return Err(Error::AlreadyMatched);
        }
        let backend = &self.fhe.backend;
        if scales_equal(ciphertext.scale(), plaintext.scale()) && plaintext.level() > ciphertext.level() {
            debug!(from = plaintext.level(), to = ciphertext.level(), "switching plaintext to ciphertext parameters");
            return backend.mod_switch_plain_to(plaintext, ciphertext.parms_id());
        }
        warn!(
            plaintext_level = plaintext.level(),
            plaintext_scale = plaintext.scale().log2(),
            ciphertext_level = ciphertext.level(),
            ciphertext_scale = ciphertext.scale().log2(),
            "re-encoding plaintext at ciphertext parameters, this loses precision"
        );
        let values = backend.decode_complex(plaintext)?;
        return backend.encode_complex(&values, ciphertext.parms_id(), ciphertext.scale(), plaintext.mul_mode());
    }
}

impl<B: Backend> Fhe<B> {

    pub fn levels_equal(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<bool> {
        Ok(self.integer_view("levels_equal")?.levels_equal(c1, c2))
    }

    pub fn match_levels(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<(Ciphertext<B>, Ciphertext<B>)> {
        self.integer_view("match_levels")?.match_levels(c1, c2)
    }

    pub fn level_scale_equal(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<bool> {
        Ok(self.approximate_view("level_scale_equal")?.level_scale_equal(c1, c2))
    }

    pub fn level_scale_equal_plain(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<bool> {
        Ok(self.approximate_view("level_scale_equal_plain")?.level_scale_equal_plain(ciphertext, plaintext))
    }

    pub fn match_levels_and_scales(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<(Ciphertext<B>, Ciphertext<B>)> {
        self.approximate_view("match_levels_and_scales")?.match_levels_and_scales(c1, c2)
    }

    pub fn match_level_and_scale(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<Plaintext<B>> {
        self.approximate_view("match_level_and_scale")?.match_level_and_scale(ciphertext, plaintext)
    }
}

#[cfg(test)]
use crate::builder::FheBuilder;
#[cfg(test)]
use crate::scheme::{IntScheme, RealComplexScheme, SchemeKind};

#[cfg(test)]
fn switch_down<B: Backend>(fhe: &Fhe<B>, ciphertext: &Ciphertext<B>) -> Ciphertext<B> {
    Ciphertext::fresh(fhe.backend.mod_switch_to_next(&ciphertext.data).unwrap())
}

#[test]
fn test_match_levels() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 8192, 20).unwrap();
    let integer = fhe.as_integer().unwrap();
    let c1 = fhe.encrypt(&fhe.encode(&[1u64, 2, 3]).unwrap()).unwrap();
    let c2 = switch_down(&fhe, &switch_down(&fhe, &fhe.encrypt(&fhe.encode(&[4u64, 5, 6]).unwrap()).unwrap()));
    assert_eq!(3, c1.level());
    assert_eq!(1, c2.level());
    assert!(!integer.levels_equal(&c1, &c2));

    let (d1, d2) = integer.match_levels(&c1, &c2).unwrap();
    assert_eq!(1, d1.level());
    assert_eq!(1, d2.level());
    assert_eq!(&[1, 2, 3], &fhe.decode::<u64>(&fhe.decrypt(&d1).unwrap()).unwrap()[..3]);
    assert_eq!(&[4, 5, 6], &fhe.decode::<u64>(&fhe.decrypt(&d2).unwrap()).unwrap()[..3]);

    // argument order is preserved
    let (d2, d1) = integer.match_levels(&c2, &c1).unwrap();
    assert_eq!(&[4, 5, 6], &fhe.decode::<u64>(&fhe.decrypt(&d2).unwrap()).unwrap()[..3]);
    assert_eq!(&[1, 2, 3], &fhe.decode::<u64>(&fhe.decrypt(&d1).unwrap()).unwrap()[..3]);

    assert_eq!(Err(Error::AlreadyMatched), integer.match_levels(&c1, &c1).map(|_| ()));
    assert_eq!(Ok(true), fhe.levels_equal(&d1, &d2));
}

#[test]
fn test_reconciliation_wrong_scheme() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1.]).unwrap()).unwrap();
    assert_eq!(Err(Error::WrongSchemeKind { operation: "levels_equal", kind: SchemeKind::Ckks }), fhe.levels_equal(&ct, &ct));
    assert!(matches!(fhe.match_levels(&ct, &ct), Err(Error::WrongSchemeKind { .. })));

    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1u64]).unwrap()).unwrap();
    assert_eq!(Err(Error::WrongSchemeKind { operation: "level_scale_equal", kind: SchemeKind::Bfv }), fhe.level_scale_equal(&ct, &ct));
}

#[test]
fn test_match_levels_and_scales() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let approximate = fhe.as_approximate().unwrap();
    let c1 = fhe.encrypt(&fhe.encode(&[1.5, -2.]).unwrap()).unwrap();
    let c2 = fhe.multiply(&c1, &c1).unwrap();
    assert_eq!(2, c2.level());
    assert!(!approximate.level_scale_equal(&c1, &c2));

    let (d1, d2) = approximate.match_levels_and_scales(&c1, &c2).unwrap();
    assert_eq!(2, d1.level());
    assert_eq!(2, d2.level());
    assert!(approximate.level_scale_equal(&d1, &d2));
    let decoded: Vec<f64> = fhe.decode(&fhe.decrypt(&d1).unwrap()).unwrap();
    assert!((decoded[0] - 1.5).abs() < 1e-6);
    assert!((decoded[1] + 2.).abs() < 1e-6);

    assert_eq!(Err(Error::AlreadyMatched), approximate.match_levels_and_scales(&d1, &d2).map(|_| ()));
}

#[test]
fn test_match_levels_and_scales_same_level() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let approximate = fhe.as_approximate().unwrap();
    let c1 = switch_down(&fhe, &fhe.encrypt(&fhe.encode(&[1.5]).unwrap()).unwrap());
    let c2 = fhe.multiply(&fhe.encrypt(&fhe.encode(&[1.5]).unwrap()).unwrap(), &fhe.encrypt(&fhe.encode(&[1.]).unwrap()).unwrap()).unwrap();
    assert_eq!(c1.level(), c2.level());
    let (d1, d2) = approximate.match_levels_and_scales(&c1, &c2).unwrap();
    assert_eq!(c1.scale(), d1.scale());
    assert_eq!(c2.scale(), d2.scale());
}

#[test]
fn test_match_level_and_scale() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let approximate = fhe.as_approximate().unwrap();
    let scale = approximate.scale();
    let fresh = fhe.encrypt(&fhe.encode(&[1.]).unwrap()).unwrap();
    let pt = fhe.encode(&[0.25, 4.]).unwrap();
    assert_eq!(Err(Error::AlreadyMatched), approximate.match_level_and_scale(&fresh, &pt).map(|_| ()));

    // only the parameter set differs
    let switched = switch_down(&fhe, &fresh);
    let matched = approximate.match_level_and_scale(&switched, &pt).unwrap();
    assert!(approximate.level_scale_equal_plain(&switched, &matched));
    assert_eq!(scale, matched.scale());

    // the scale differs
    let product = fhe.multiply(&fresh, &fresh).unwrap();
    let matched = approximate.match_level_and_scale(&product, &pt).unwrap();
    assert!(approximate.level_scale_equal_plain(&product, &matched));
    let decoded: Vec<f64> = fhe.decode(&matched).unwrap();
    assert!((decoded[0] - 0.25).abs() < 1e-6);
    assert!((decoded[1] - 4.).abs() < 1e-6);

    // plaintext below the ciphertext
    let low = approximate.encode_at(&[0.25], ParmsId(1), scale).unwrap();
    let matched = approximate.match_level_and_scale(&fresh, &low).unwrap();
    assert_eq!(fresh.parms_id(), matched.parms_id());
}
