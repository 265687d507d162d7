//! Salt mixing for new saltwater batches.

use crate::{Error, Result};
use serde::Serialize;

/// Grams of salt per US gallon for a batch at [`REFERENCE_SG_RISE`]
pub const GRAMS_PER_GALLON: f64 = 145.0;

/// Specific gravity rise (above 1.000) the per-gallon figure is quoted for
pub const REFERENCE_SG_RISE: f64 = 0.026;

/// Approximate grams of salt in one cup
pub const GRAMS_PER_CUP: f64 = 280.0;

/// Amount of salt for one batch
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SaltMix {
    pub grams: f64,
    pub cups: f64,
}

/// Salt needed to bring `gallons` of fresh water to `specific_gravity`
pub fn mix_salt(gallons: f64, specific_gravity: f64) -> Result<SaltMix> {
    if !(gallons.is_finite() && gallons > 0.0) {
        return Err(Error::Validation(format!(
            "Batch volume must be positive (got {})",
            gallons
        )));
    }
    if !(specific_gravity.is_finite() && specific_gravity > 1.0) {
        return Err(Error::Validation(format!(
            "Specific gravity must be above 1.000 (got {})",
            specific_gravity
        )));
    }

    let ratio = (specific_gravity - 1.0) / REFERENCE_SG_RISE;
    let grams = gallons * GRAMS_PER_GALLON * ratio;
    Ok(SaltMix {
        grams,
        cups: grams / GRAMS_PER_CUP,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_batch() {
        let mix = mix_salt(5.0, 1.026).unwrap();
        assert!((mix.grams - 725.0).abs() < 1e-6);
        assert!((mix.cups - 725.0 / 280.0).abs() < 1e-9);
    }

    #[test]
    fn test_scales_with_gravity() {
        let low = mix_salt(10.0, 1.013).unwrap();
        let high = mix_salt(10.0, 1.026).unwrap();
        assert!((high.grams - 2.0 * low.grams).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(mix_salt(0.0, 1.025).is_err());
        assert!(mix_salt(-1.0, 1.025).is_err());
        assert!(mix_salt(5.0, 1.0).is_err());
        assert!(mix_salt(5.0, f64::NAN).is_err());
    }
}
