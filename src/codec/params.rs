//! Parameter types for round-trip operations.
//!
//! - [`Crf`]: Constant Rate Factor, nominally 0–51 (default 28). Not clamped:
//!   each backend maps it onto its own quality control and applies whatever
//!   clamping that control has.

use serde::{Deserialize, Serialize};

/// Lowest CRF, highest fidelity.
pub const CRF_MIN: i32 = 0;
/// Highest CRF, strongest degradation.
pub const CRF_MAX: i32 = 51;
/// x265's default CRF.
pub const CRF_DEFAULT: i32 = 28;

/// rav1e's default quantizer; [`CRF_DEFAULT`] maps onto it.
const AV1_DEFAULT_QUANTIZER: i64 = 100;
const AV1_MAX_QUANTIZER: i64 = 255;

/// Constant Rate Factor for a round-trip. Lower means higher fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crf(pub i32);

impl Crf {
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Whether the value lies in the nominal 0–51 range.
    pub fn is_nominal(self) -> bool {
        (CRF_MIN..=CRF_MAX).contains(&self.0)
    }

    /// Map onto an AV1 quantizer index (0–255).
    ///
    /// Piecewise linear through three anchors: CRF 0 → 0, CRF 28 → 100 and
    /// CRF 51 → 255. x265 doubles its quantizer step every 6 CRF, about 4.7
    /// doublings from 0 to 28 and 3.8 from 28 to 51. AV1's step table grows
    /// by a similar factor over 0..100 and 100..255, so equal CRF moves give
    /// comparable degradation on both backends, and the default CRF lands on
    /// rav1e's own default quantizer. Values outside 0–51 saturate.
    pub fn to_av1_quantizer(self) -> usize {
        let crf = i64::from(self.0).clamp(i64::from(CRF_MIN), i64::from(CRF_MAX));
        let default = i64::from(CRF_DEFAULT);
        let quantizer = if crf <= default {
            crf * AV1_DEFAULT_QUANTIZER / default
        } else {
            AV1_DEFAULT_QUANTIZER
                + (crf - default) * (AV1_MAX_QUANTIZER - AV1_DEFAULT_QUANTIZER)
                    / (i64::from(CRF_MAX) - default)
        };
        quantizer as usize
    }
}

impl Default for Crf {
    fn default() -> Self {
        Self(CRF_DEFAULT)
    }
}

impl std::fmt::Display for Crf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
