use nalgebra::Scalar;

mod sealed {
    pub trait Sealed {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
}

/// The lattice-integer scalar used to store monomer positions.
///
/// The engine is parameterized over the position width at compile time:
/// `i16` halves the memory traffic of the monomer store and is sufficient
/// for any realistic box, `i32` removes the drift headroom concern for very
/// long periodic runs. The algorithmic behavior is identical for both.
///
/// The trait is sealed; only `i16` and `i32` implement it.
pub trait PositionValue:
    Scalar + Copy + Default + Eq + Ord + Send + Sync + sealed::Sealed
{
    /// Widens the stored value to the arithmetic width used by the kernels.
    fn to_i32(self) -> i32;

    /// Narrows an `i32`, returning `None` when the value does not fit.
    fn from_i32(value: i32) -> Option<Self>;

    /// Applies a unit-move offset with the wrapping semantics of the
    /// underlying integer. Stored positions are unwrapped; in periodic mode
    /// they may drift outside the box and only the lattice index masks them.
    fn wrapping_offset(self, delta: i32) -> Self;
}

impl PositionValue for i16 {
    #[inline]
    fn to_i32(self) -> i32 {
        i32::from(self)
    }

    #[inline]
    fn from_i32(value: i32) -> Option<Self> {
        i16::try_from(value).ok()
    }

    #[inline]
    fn wrapping_offset(self, delta: i32) -> Self {
        self.wrapping_add(delta as i16)
    }
}

impl PositionValue for i32 {
    #[inline]
    fn to_i32(self) -> i32 {
        self
    }

    #[inline]
    fn from_i32(value: i32) -> Option<Self> {
        Some(value)
    }

    #[inline]
    fn wrapping_offset(self, delta: i32) -> Self {
        self.wrapping_add(delta)
    }
}
