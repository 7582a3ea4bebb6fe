use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Element types a [`Tensor`](crate::Tensor) can hold.
pub trait Float:
    Copy + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const ZERO: Self;

    /// Widen an 8-bit value (e.g. a pixel) without rescaling it.
    fn from_u8(v: u8) -> Self;
}

impl Float for f32 {
    const ZERO: Self = 0.0;

    #[inline] fn from_u8(v: u8) -> Self { v as f32 }
}

impl Float for f64 {
    const ZERO: Self = 0.0;

    #[inline] fn from_u8(v: u8) -> Self { v as f64 }
}
