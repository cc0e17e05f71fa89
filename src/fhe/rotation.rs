use tracing::{debug, instrument};

use crate::backend::*;
use crate::error::*;

use super::*;

impl<'a, B: Backend> IntegerFhe<'a, B> {

    ///
    /// Rotates both rows of the slot matrix cyclically by `step` positions to the left,
    /// or to the right if `step` is negative.
    ///
    #[instrument(skip_all)]
    pub fn rotate_rows(&self, ciphertext: &Ciphertext<B>, step: i32) -> Result<Ciphertext<B>> {
        let gk = self.fhe.keys.galois_keys()?;
        let result = record_time!("IntegerFhe::rotate_rows", || self.fhe.backend.rotate_rows(&ciphertext.data, step, gk))?;
        return Ok(Ciphertext { data: result, exhausted: ciphertext.exhausted });
    }

    ///
    /// Swaps the two rows of the slot matrix.
    ///
    #[instrument(skip_all)]
    pub fn rotate_columns(&self, ciphertext: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        let gk = self.fhe.keys.galois_keys()?;
        let result = record_time!("IntegerFhe::rotate_columns", || self.fhe.backend.rotate_columns(&ciphertext.data, gk))?;
        return Ok(Ciphertext { data: result, exhausted: ciphertext.exhausted });
    }

    ///
    /// Computes in every slot the sum of the `range_size` slots starting there, where
    /// the summation wraps around within the row. This takes `log2(range_size)` rotations
    /// by powers of two.
    ///
    /// `range_size` must be a power of two between `2` and the row length.
    ///
    #[instrument(skip_all)]
    pub fn row_sum(&self, ciphertext: &Ciphertext<B>, range_size: usize) -> Result<Ciphertext<B>> {
        let half_slot_count = self.fhe.slot_count() / 2;
        if range_size < 2 || range_size > half_slot_count || !range_size.is_power_of_two() {
            return Err(Error::InvalidRange { range_size, half_slot_count });
        }
        let mut current = ciphertext.clone();
        let mut step = 1;
        while step < range_size {
            debug!(step, range_size, "row sum step");
            let rotated = self.rotate_rows(&current, step as i32)?;
            current = self.fhe.add(&current, &rotated)?;
            step *= 2;
        }
        return Ok(current);
    }

    ///
    /// Adds the two rows of the slot matrix, so that every slot contains the sum of
    /// its column.
    ///
    #[instrument(skip_all)]
    pub fn column_sum(&self, ciphertext: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        let rotated = self.rotate_columns(ciphertext)?;
        return self.fhe.add(ciphertext, &rotated);
    }
}

impl<B: Backend> Fhe<B> {

    pub fn rotate_rows(&self, ciphertext: &Ciphertext<B>, step: i32) -> Result<Ciphertext<B>> {
        self.integer_view("rotate_rows")?.rotate_rows(ciphertext, step)
    }

    pub fn rotate_columns(&self, ciphertext: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        self.integer_view("rotate_columns")?.rotate_columns(ciphertext)
    }

    pub fn row_sum(&self, ciphertext: &Ciphertext<B>, range_size: usize) -> Result<Ciphertext<B>> {
        self.integer_view("row_sum")?.row_sum(ciphertext, range_size)
    }

    pub fn column_sum(&self, ciphertext: &Ciphertext<B>) -> Result<Ciphertext<B>> {
        self.integer_view("column_sum")?.column_sum(ciphertext)
    }
}

#[cfg(test)]
use crate::builder::FheBuilder;
#[cfg(test)]
use crate::scheme::{IntScheme, RealComplexScheme, SchemeKind};

#[test]
fn test_rotate_rows() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let values = (0..4096).collect::<Vec<u64>>();
    let ct = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();

    let rotated = fhe.decode::<u64>(&fhe.decrypt(&fhe.rotate_rows(&ct, 5).unwrap()).unwrap()).unwrap();
    let expected = (0..4096).map(|i| (i / 2048) * 2048 + (i % 2048 + 5) % 2048).collect::<Vec<u64>>();
    assert_eq!(expected, rotated);

    let rotated = fhe.decode::<u64>(&fhe.decrypt(&fhe.rotate_rows(&ct, -5).unwrap()).unwrap()).unwrap();
    let expected = (0..4096).map(|i| (i / 2048) * 2048 + (i % 2048 + 2043) % 2048).collect::<Vec<u64>>();
    assert_eq!(expected, rotated);
}

#[test]
fn test_rotate_columns_involution() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 4096, 20).unwrap();
    let mut rng = oorandom::Rand64::new(1);
    let values = (0..4096).map(|_| rng.rand_range(0..1000)).collect::<Vec<u64>>();
    let ct = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();

    let swapped = fhe.rotate_columns(&ct).unwrap();
    let decoded = fhe.decode::<u64>(&fhe.decrypt(&swapped).unwrap()).unwrap();
    assert_eq!(&values[2048..], &decoded[..2048]);
    assert_eq!(&values[..2048], &decoded[2048..]);

    let twice = fhe.rotate_columns(&swapped).unwrap();
    assert_eq!(values, fhe.decode::<u64>(&fhe.decrypt(&twice).unwrap()).unwrap());
}

#[test]
fn test_row_sum() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1u64, 2, 3, 4, 5, 6, 7, 8]).unwrap()).unwrap();
    let result = fhe.decode::<u64>(&fhe.decrypt(&fhe.row_sum(&ct, 4).unwrap()).unwrap()).unwrap();
    assert_eq!(&[10, 14, 18, 22, 26, 21, 15, 8, 0], &result[..9]);
    // wraps around within the row
    assert_eq!(&[1, 3, 6], &result[2045..2048]);
    assert!(result[2048..].iter().all(|x| *x == 0));

    assert_eq!(Error::InvalidRange { range_size: 3, half_slot_count: 2048 }, fhe.row_sum(&ct, 3).unwrap_err());
    assert_eq!(Error::InvalidRange { range_size: 4096, half_slot_count: 2048 }, fhe.row_sum(&ct, 4096).unwrap_err());
    assert_eq!(Error::InvalidRange { range_size: 1, half_slot_count: 2048 }, fhe.row_sum(&ct, 1).unwrap_err());
    assert!(fhe.row_sum(&ct, 2).is_ok());
    assert!(fhe.row_sum(&ct, 2048).is_ok());
}

#[test]
fn test_column_sum() {
    let fhe = FheBuilder::new().build_integer_scheme(IntScheme::Bgv, 4096, 20).unwrap();
    let mut values = vec![0u64; 4096];
    values[0] = 3;
    values[7] = 9;
    values[2048] = 4;
    let ct = fhe.encrypt(&fhe.encode(&values).unwrap()).unwrap();
    let result = fhe.decode::<u64>(&fhe.decrypt(&fhe.column_sum(&ct).unwrap()).unwrap()).unwrap();
    assert_eq!(7, result[0]);
    assert_eq!(7, result[2048]);
    assert_eq!(9, result[7]);
    assert_eq!(9, result[2055]);
}

#[test]
fn test_rotation_keys() {
    let fhe = FheBuilder::new().galois_keys(true, &[1, 2]).build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1u64, 2, 3, 4]).unwrap()).unwrap();
    assert!(fhe.row_sum(&ct, 4).is_ok());
    assert_eq!(Error::MissingGaloisKey { step: 4 }, fhe.row_sum(&ct, 8).unwrap_err());
    assert_eq!(Error::MissingGaloisKey { step: 0 }, fhe.rotate_columns(&ct).unwrap_err());

    let fhe = FheBuilder::new().galois_keys(false, &[]).build_integer_scheme(IntScheme::Bfv, 4096, 20).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1u64]).unwrap()).unwrap();
    assert_eq!(Error::MissingKey(KeyKind::Galois), fhe.rotate_rows(&ct, 1).unwrap_err());

    let fhe = FheBuilder::new().build_approximate_scheme(RealComplexScheme::Ckks, 8192, (1u64 << 40) as f64).unwrap();
    let ct = fhe.encrypt(&fhe.encode(&[1.]).unwrap()).unwrap();
    assert_eq!(Error::WrongSchemeKind { operation: "row_sum", kind: SchemeKind::Ckks }, fhe.row_sum(&ct, 2).unwrap_err());
}
