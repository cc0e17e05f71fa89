use std::borrow::Cow;

use tracing::{debug, instrument};

use crate::backend::*;
use crate::error::*;

use super::*;

impl<B: Backend> Fhe<B> {

    ///
    /// Returns the two ciphertexts at a common level (and, for CKKS, scale), borrowing
    /// them if they already agree.
    ///
    fn aligned<'b>(&self, c1: &'b Ciphertext<B>, c2: &'b Ciphertext<B>) -> Result<(Cow<'b, B::Ciphertext>, Cow<'b, B::Ciphertext>)> {
        let matched = if self.scheme().is_integer() {
            let integer = self.integer_view("align")?;
            if integer.levels_equal(c1, c2) {
                None
            } else {
                Some(integer.match_levels(c1, c2)?)
            }
        } else {
            let approximate = self.approximate_view("align")?;
            if approximate.level_scale_equal(c1, c2) {
                None
            } else {
                Some(approximate.match_levels_and_scales(c1, c2)?)
            }
        };
        match matched {
            Some((d1, d2)) => Ok((Cow::Owned(d1.data), Cow::Owned(d2.data))),
            None => Ok((Cow::Borrowed(&c1.data), Cow::Borrowed(&c2.data)))
        }
    }

    ///
    /// Returns a plaintext that can be combined with the ciphertext. For BFV/BGV,
    /// plaintexts are independent of the ciphertext modulus, so this is always the
    /// given plaintext.
    ///
    fn aligned_plain<'b>(&self, ciphertext: &Ciphertext<B>, plaintext: &'b Plaintext<B>) -> Result<Cow<'b, Plaintext<B>>> {
        if self.scheme().is_integer() {
            return Ok(Cow::Borrowed(plaintext));
        }
        let approximate = self.approximate_view("align")?;
        if approximate.level_scale_equal_plain(ciphertext, plaintext) {
            return Ok(Cow::Borrowed(plaintext));
        } else {
            return Ok(Cow::Owned(approximate.match_level_and_scale(ciphertext, plaintext)?));
        }
    }

    ///
    /// Relinearizes the result of a multiplication if necessary, and consumes one level
    /// of the modulus chain, by modulus switching for BFV/BGV and by rescaling for CKKS.
    ///
    /// At the terminal level, no level is consumed and the result is marked as exhausted.
    ///
    fn finish_multiplication(&self, product: B::Ciphertext) -> Result<Ciphertext<B>> {
        let mut result = product;
        if result.size() > CANONICAL_CIPHERTEXT_SIZE {
            let rk = self.keys.relin_keys()?;
            let relinearized = record_time!("Fhe::multiply::relinearize", || self.backend.relinearize(&result, rk))?;
            result = relinearized;
        }
        if result.level() <= 1 {
            debug!("multiplication at the terminal level, no level left to consume");
            return Ok(Ciphertext { data: result, exhausted: true });
        }
        let next = if self.scheme().is_integer() {
            record_time!("Fhe::multiply::mod_switch", || self.backend.mod_switch_to_next(&result))?
        } else {
            record_time!("Fhe::multiply::rescale", || self.backend.rescale_to_next(&result))?
        };
        return Ok(Ciphertext::fresh(next));
    }

    #[instrument(skip_all)]
    pub fn add(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        let (lhs, rhs) = self.aligned(c1, c2)?;
        let result = record_time!("Fhe::add", || self.backend.add(&lhs, &rhs))?;
        return Ok(Ciphertext { data: result, exhausted: c1.exhausted || c2.exhausted });
    }

    #[instrument(skip_all)]
    pub fn sub(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        let (lhs, rhs) = self.aligned(c1, c2)?;
        let result = record_time!("Fhe::sub", || self.backend.sub(&lhs, &rhs))?;
        return Ok(Ciphertext { data: result, exhausted: c1.exhausted || c2.exhausted });
    }

    ///
    /// Multiplies two ciphertexts, after bringing them to a common level (and scale).
    /// The result is relinearized and, unless the operands are at the terminal level,
    /// one level lower than the operands.
    ///
    /// Fails with [`Error::ExhaustedLevels`] if one of the operands is the result of a
    /// multiplication at the terminal level.
    ///
    #[instrument(skip_all)]
    pub fn multiply(&self, c1: &Ciphertext<B>, c2: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        if c1.exhausted || c2.exhausted {
            return Err(Error::ExhaustedLevels);
        }
        let (lhs, rhs) = self.aligned(c1, c2)?;
        let product = record_time!("Fhe::multiply", || self.backend.multiply(&lhs, &rhs))?;
        return self.finish_multiplication(product);
    }

    #[instrument(skip_all)]
    pub fn add_plain(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<Ciphertext<B>> {
        let plaintext = self.aligned_plain(ciphertext, plaintext)?;
        let result = record_time!("Fhe::add_plain", || self.backend.add_plain(&ciphertext.data, &plaintext))?;
        return Ok(Ciphertext { data: result, exhausted: ciphertext.exhausted });
    }

    #[instrument(skip_all)]
    pub fn sub_plain(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<Ciphertext<B>> {
        let plaintext = self.aligned_plain(ciphertext, plaintext)?;
        let result = record_time!("Fhe::sub_plain", || self.backend.sub_plain(&ciphertext.data, &plaintext))?;
        return Ok(Ciphertext { data: result, exhausted: ciphertext.exhausted });
    }

    ///
    /// Multiplies a ciphertext with a plaintext. Like [`Fhe::multiply()`], this consumes
    /// one level unless the ciphertext is at the terminal level.
    ///
    #[instrument(skip_all)]
    pub fn multiply_plain(&self, ciphertext: &Ciphertext<B>, plaintext: &Plaintext<B>) -> Result<Ciphertext<B>> {
        if ciphertext.exhausted {
            return Err(Error::ExhaustedLevels);
        }
        let plaintext = self.aligned_plain(ciphertext, plaintext)?;
        let product = record_time!("Fhe::multiply_plain", || self.backend.multiply_plain(&ciphertext.data, &plaintext))?;
        return self.finish_multiplication(product);
    }

    #[instrument(skip_all)]
    pub fn negate(&self, ciphertext: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        let result = record_time!("Fhe::negate", || self.backend.negate(&ciphertext.data))?;
        return Ok(Ciphertext { data: result, exhausted: ciphertext.exhausted });
    }
}

#[cfg(test)]
use crate::builder::FheBuilder;
#[cfg(test)]
use crate::scheme::{IntScheme, MulMode, RealComplexScheme};

#[test]
fn test_integer_arithmetic() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 8192, 20).unwrap();
    let a = fhe.encrypt(&fhe.encode(&[3i64, -4, 5]).unwrap()).unwrap();
    let b = fhe.encrypt(&fhe.encode(&[7i64, 2, -1]).unwrap()).unwrap();
    let decrypt = |ct: &Ciphertext<ClearBackend>| fhe.decode::<i64>(&fhe.decrypt(ct).unwrap()).unwrap()[..3].to_vec();

    assert_eq!(vec![10, -2, 4], decrypt(&fhe.add(&a, &b).unwrap()));
    assert_eq!(vec![-4, -6, 6], decrypt(&fhe.sub(&a, &b).unwrap()));
    assert_eq!(vec![-3, 4, -5], decrypt(&fhe.negate(&a).unwrap()));

    let product = fhe.multiply(&a, &b).unwrap();
    assert_eq!(vec![21, -8, -5], decrypt(&product));
    assert_eq!(2, product.level());
    assert_eq!(CANONICAL_CIPHERTEXT_SIZE, product.size());

    // the operands are reconciled first
    let sum = fhe.add(&product, &a).unwrap();
    assert_eq!(2, sum.level());
    assert_eq!(vec![24, -12, 0], decrypt(&sum));
    let product = fhe.multiply(&a, &product).unwrap();
    assert_eq!(1, product.level());
    assert_eq!(vec![63, 32, -25], decrypt(&product));

    let pt = fhe.encode(&[2i64, 2, 2]).unwrap();
    assert_eq!(vec![5, -2, 7], decrypt(&fhe.add_plain(&a, &pt).unwrap()));
    assert_eq!(vec![1, -6, 3], decrypt(&fhe.sub_plain(&a, &pt).unwrap()));
    let product = fhe.multiply_plain(&a, &pt).unwrap();
    assert_eq!(vec![6, -8, 10], decrypt(&product));
    assert_eq!(2, product.level());
}

#[test]
fn test_terminal_level() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 4096, 20).unwrap();
    let a = fhe.encrypt(&fhe.encode(&[3u64]).unwrap()).unwrap();
    assert_eq!(1, a.level());

    let product = fhe.multiply(&a, &a).unwrap();
    assert_eq!(1, product.level());
    assert!(product.is_exhausted());
    assert_eq!(9, fhe.decode::<u64>(&fhe.decrypt(&product).unwrap()).unwrap()[0]);

    let sum = fhe.add(&product, &a).unwrap();
    assert!(sum.is_exhausted());
    assert_eq!(12, fhe.decode::<u64>(&fhe.decrypt(&sum).unwrap()).unwrap()[0]);

    assert_eq!(Error::ExhaustedLevels, fhe.multiply(&product, &a).unwrap_err());
    assert_eq!(Error::ExhaustedLevels, fhe.multiply(&a, &sum).unwrap_err());
    assert_eq!(Error::ExhaustedLevels, fhe.multiply_plain(&sum, &fhe.encode(&[1u64]).unwrap()).unwrap_err());
}

#[test]
fn test_missing_relin_keys() {
    let fhe = FheBuilder::new().relin_keys(false).build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let a = fhe.encrypt(&fhe.encode(&[3u64]).unwrap()).unwrap();
    assert_eq!(Error::MissingKey(KeyKind::Relin), fhe.multiply(&a, &a).unwrap_err());
    // multiplication by plaintexts does not need relinearization
    assert!(fhe.multiply_plain(&a, &fhe.encode(&[2u64]).unwrap()).is_ok());
}

#[test]
fn test_approximate_arithmetic() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let a = fhe.encrypt(&fhe.encode(&[1.5, -0.5]).unwrap()).unwrap();
    let b = fhe.encrypt(&fhe.encode(&[2., 4.]).unwrap()).unwrap();
    let decrypt = |ct: &Ciphertext<ClearBackend>| fhe.decode::<f64>(&fhe.decrypt(ct).unwrap()).unwrap()[..2].to_vec();
    let assert_close = |expected: [f64; 2], actual: Vec<f64>| for (e, a) in expected.iter().zip(actual.iter()) {
        assert!((e - a).abs() < 1e-5, "expected {}, got {}", e, a);
    };

    assert_close([3.5, 3.5], decrypt(&fhe.add(&a, &b).unwrap()));
    assert_close([-0.5, -4.5], decrypt(&fhe.sub(&a, &b).unwrap()));

    let product = fhe.multiply(&a, &b).unwrap();
    assert_eq!(2, product.level());
    assert!((product.scale().log2() - 40.).abs() < 0.01);
    assert_close([3., -2.], decrypt(&product));

    // reconciles level and scale of `a`
    assert_close([4.5, -2.5], decrypt(&fhe.add(&product, &a).unwrap()));
    let cube = fhe.multiply(&product, &a).unwrap();
    assert_eq!(1, cube.level());
    assert_close([4.5, 1.], decrypt(&cube));

    // the plaintext is re-encoded at the scale of `product`
    let pt = fhe.encode(&[1., 1.]).unwrap();
    assert_close([4., -1.], decrypt(&fhe.add_plain(&product, &pt).unwrap()));
    let scaled = fhe.multiply_plain(&a, &fhe.encode(&[2., 2.]).unwrap()).unwrap();
    assert_eq!(2, scaled.level());
    assert_close([3., -1.], decrypt(&scaled));
    assert_close([-1.5, 0.5], decrypt(&fhe.negate(&a).unwrap()));
}

#[test]
fn test_integer_convolution() {
    let fhe = FheBuilder::new().mul_mode(MulMode::Convolution).build_integer_scheme(IntScheme::Bfv, 8192, 20).unwrap();
    let t = fhe.plain_modulus().unwrap();
    let decrypt = |ct: &Ciphertext<ClearBackend>| fhe.decode::<u64>(&fhe.decrypt(ct).unwrap()).unwrap();

    // (1 + 2X) * (3 + X + X^2) = 3 + 7X + 3X^2 + 2X^3
    let a = fhe.encrypt(&fhe.encode(&[1u64, 2]).unwrap()).unwrap();
    let b = fhe.encrypt(&fhe.encode(&[3u64, 1, 1]).unwrap()).unwrap();
    let product = fhe.multiply(&a, &b).unwrap();
    assert_eq!(2, product.level());
    assert_eq!(CANONICAL_CIPHERTEXT_SIZE, product.size());
    assert_eq!(vec![3, 7, 3, 2, 0], decrypt(&product)[..5].to_vec());

    let sum = fhe.add(&product, &a).unwrap();
    assert_eq!(2, sum.level());
    assert_eq!(vec![4, 9, 3, 2, 0], decrypt(&sum)[..5].to_vec());

    // X^(N - 1) * X = -1
    let mut x_pow = vec![0u64; 8192];
    x_pow[8191] = 1;
    let wrapped = fhe.multiply_plain(&fhe.encrypt(&fhe.encode(&x_pow).unwrap()).unwrap(), &fhe.encode(&[0u64, 1]).unwrap()).unwrap();
    let wrapped = decrypt(&wrapped);
    assert_eq!(t - 1, wrapped[0]);
    assert!(wrapped[1..].iter().all(|x| *x == 0));
}

#[test]
fn test_approximate_convolution() {
    let fhe = FheBuilder::new().mul_mode(MulMode::Convolution).build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let c1 = fhe.encrypt(&fhe.encode(&[1.5, -2.]).unwrap()).unwrap();
    let squared = fhe.multiply(&c1, &c1).unwrap();
    assert_eq!(2, squared.level());

    // `c1` is brought to the level of `squared` by multiplying with the constant polynomial 1
    let result = fhe.add(&c1, &fhe.multiply(&c1, &c1).unwrap()).unwrap();
    assert_eq!(2, result.level());
    assert_eq!(squared.scale(), result.scale());
    let decoded: Vec<f64> = fhe.decode(&fhe.decrypt(&result).unwrap()).unwrap();
    assert_eq!(8192, decoded.len());
    for (expected, actual) in [3.75, -8., 4.].iter().zip(decoded.iter()) {
        assert!((expected - actual).abs() < 1e-6, "expected {}, got {}", expected, actual);
    }
    assert!(decoded[3..].iter().all(|x| x.abs() < 1e-6));
}
