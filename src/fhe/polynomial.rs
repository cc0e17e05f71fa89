use num_complex::Complex64;
use tracing::{debug, instrument};

use crate::backend::*;
use crate::error::*;
use crate::scheme::MulMode;

use super::*;

impl<'a, B: Backend> ApproximateFhe<'a, B> {

    ///
    /// Encodes `value` in every slot, at the parameter set and scale of `ciphertext`.
    ///
    fn constant_like(&self, ciphertext: &Ciphertext<B>, value: f64) -> Result<Plaintext<B>> {
        let backend = &self.fhe.backend;
        let values = vec![Complex64::new(value, 0.); backend.slot_count()];
        backend.encode_complex(&values, ciphertext.parms_id(), ciphertext.scale(), MulMode::ElementWise)
    }

    ///
    /// Evaluates the polynomial with the given coefficients (constant coefficient first)
    /// in every slot of the ciphertext.
    ///
    /// The power `x^k` is computed as the product of `x^(2^j)` and `x^(k - 2^j)` for
    /// the largest `2^j < k`, which keeps it at multiplicative depth `ceil(log2(k))`.
    /// Every coefficient is first multiplied into `x`, and the result then with the
    /// corresponding power, so a polynomial of degree `d > 1` consumes `ceil(log2(d)) + 1`
    /// levels. Terms at different levels are reconciled by [`Fhe::add()`].
    ///
    /// Requires an element-wise encoded ciphertext, otherwise fails with
    /// [`Error::InvalidArgument`].
    ///
    #[instrument(skip_all)]
    pub fn evaluate_polynomial(&self, ciphertext: &Ciphertext<B>, coefficients: &[f64]) -> Result<Ciphertext<B>> {
        if ciphertext.data.mul_mode() != MulMode::ElementWise {
            return Err(Error::InvalidArgument("polynomials can only be evaluated on element-wise encoded ciphertexts".to_string()));
        }
        let fhe = self.fhe;
        let degree = coefficients.iter().rposition(|c| *c != 0.).unwrap_or(0);
        debug!(degree, level = ciphertext.level(), "evaluating polynomial");

        // powers[k - 1] = x^k
        let mut powers = vec![ciphertext.clone()];
        for k in 2..degree {
            let high = 1usize << (usize::BITS - 1 - (k - 1).leading_zeros());
            let power = fhe.multiply(&powers[high - 1], &powers[k - high - 1])?;
            powers.push(power);
        }

        let mut result: Option<Ciphertext<B>> = None;
        for (i, c) in coefficients.iter().enumerate().take(degree + 1).skip(1) {
            if *c == 0. {
                continue;
            }
            let scaled = fhe.multiply_plain(ciphertext, &self.constant_like(ciphertext, *c)?)?;
            let term = if i == 1 { scaled } else { fhe.multiply(&scaled, &powers[i - 2])? };
            result = Some(match result {
                Some(current) => fhe.add(&current, &term)?,
                None => term
            });
        }
        let result = match result {
            Some(result) => result,
            None => fhe.multiply_plain(ciphertext, &self.constant_like(ciphertext, 0.)?)?
        };
        match coefficients.first() {
            Some(c) if *c != 0. => fhe.add_plain(&result, &self.constant_like(&result, *c)?),
            _ => Ok(result)
        }
    }

    ///
    /// Applies the polynomial `iterations` times, as used to sharpen sign approximations
    /// like [`crate::poly::sign_polynomial()`].
    ///
    pub fn iterate_polynomial(&self, ciphertext: &Ciphertext<B>, coefficients: &[f64], iterations: usize) -> Result<Ciphertext<B>> {
        let mut current = ciphertext.clone();
        for _ in 0..iterations {
            current = self.evaluate_polynomial(&current, coefficients)?;
        }
        return Ok(current);
    }
}

impl<B: Backend> Fhe<B> {

    pub fn evaluate_polynomial(&self, ciphertext: &Ciphertext<B>, coefficients: &[f64]) -> Result<Ciphertext<B>> {
        self.approximate_view("evaluate_polynomial")?.evaluate_polynomial(ciphertext, coefficients)
    }

    pub fn iterate_polynomial(&self, ciphertext: &Ciphertext<B>, coefficients: &[f64], iterations: usize) -> Result<Ciphertext<B>> {
        self.approximate_view("iterate_polynomial")?.iterate_polynomial(ciphertext, coefficients, iterations)
    }
}

#[cfg(test)]
use crate::builder::FheBuilder;
#[cfg(test)]
use crate::poly;
#[cfg(test)]
use crate::scheme::{IntScheme, RealComplexScheme};

#[cfg(test)]
fn assert_slots_close(expected: &[f64], actual: &[f64]) {
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert!((e - a).abs() < 1e-5, "expected {:?}, got {:?}", expected, &actual[..expected.len()]);
    }
}

#[test]
fn test_evaluate_polynomial() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let inputs = [0.3, -0.5, 0.05, 1., -1.];
    let x = fhe.encrypt(&fhe.encode(&inputs).unwrap()).unwrap();
    assert_eq!(3, x.level());

    let f = poly::sign_polynomial(1);
    let result = fhe.evaluate_polynomial(&x, &f).unwrap();
    assert_eq!(1, result.level());
    let expected = inputs.iter().map(|x| poly::evaluate(&f, *x)).collect::<Vec<_>>();
    assert_slots_close(&expected, &fhe.decode::<f64>(&fhe.decrypt(&result).unwrap()).unwrap());

    let g = [0.25, -1., 2.];
    let result = fhe.evaluate_polynomial(&x, &g).unwrap();
    let expected = inputs.iter().map(|x| poly::evaluate(&g, *x)).collect::<Vec<_>>();
    assert_slots_close(&expected, &fhe.decode::<f64>(&fhe.decrypt(&result).unwrap()).unwrap());

    let constant = fhe.evaluate_polynomial(&x, &[0.75]).unwrap();
    assert_eq!(2, constant.level());
    assert_slots_close(&[0.75; 5], &fhe.decode::<f64>(&fhe.decrypt(&constant).unwrap()).unwrap());
}

#[test]
fn test_iterate_polynomial() {
    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 16384, (1u64 << 40) as f64).unwrap();
    let inputs = [0.3, -0.5, 0.05, 0.9];
    let x = fhe.encrypt(&fhe.encode(&inputs).unwrap()).unwrap();
    let f = poly::sign_polynomial(1);
    let result = fhe.iterate_polynomial(&x, &f, 2).unwrap();
    assert_eq!(x.level() - 4, result.level());
    let expected = inputs.iter().map(|x| poly::iterate(&f, *x, 2)).collect::<Vec<_>>();
    assert_slots_close(&expected, &fhe.decode::<f64>(&fhe.decrypt(&result).unwrap()).unwrap());
}

#[test]
fn test_evaluate_polynomial_preconditions() {
    let integer = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let x = integer.encrypt(&integer.encode(&[1u64]).unwrap()).unwrap();
    assert!(matches!(integer.evaluate_polynomial(&x, &[1., 1.]), Err(Error::WrongSchemeKind { .. })));

    let convolution = FheBuilder::new().mul_mode(MulMode::Convolution).build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let x = convolution.encrypt(&convolution.encode(&[1.]).unwrap()).unwrap();
    assert!(matches!(convolution.evaluate_polynomial(&x, &[1., 1.]), Err(Error::InvalidArgument(_))));
}
