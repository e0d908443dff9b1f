use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use num_traits::{PrimInt, Zero};

use crate::limits::PrefixLimits;

/// One address family's network type: a fixed-width bit string plus a
/// prefix length. Only the high `prefix_len()` bits are significant; the
/// rest are zero. All operations are family-scoped, so mixing families is
/// a type error rather than a runtime one.
pub trait Prefix: Copy + Eq + std::fmt::Debug + std::fmt::Display + Into<IpNet> {
    type R: PrimInt + Zero;

    /// Bit width of the family (32 or 128).
    const MAX_LEN: u8;

    fn repr(&self) -> Self::R;

    /// The all-covering network at prefix length 0.
    fn zero() -> Self;

    fn prefix_len(&self) -> u8;

    /// Value of the `bit`-th bit counted from the most significant end.
    fn is_bit_set(&self, bit: u8) -> bool;

    /// True iff `self` is a (non-strict) prefix of `other`.
    fn contains(&self, other: &Self) -> bool;

    fn common_prefix(&self, other: &Self) -> Self;

    /// The enclosing network at `new_len`, host bits masked off.
    /// `new_len` must not exceed `self.prefix_len()`.
    fn supernet(&self, new_len: u8) -> Self;

    /// The family's stock aggregation checkpoints.
    fn default_limits() -> PrefixLimits;
}

fn mask_from_prefix_len<R>(len: u8) -> R
where
    R: PrimInt + Zero,
{
    if len as u32 == R::zero().count_zeros() {
        !R::zero()
    } else if len == 0 {
        R::zero()
    } else {
        !((!R::zero()) >> len as usize)
    }
}

impl Prefix for Ipv4Net {
    type R = u32;

    const MAX_LEN: u8 = 32;

    fn repr(&self) -> Self::R {
        self.addr().into()
    }

    fn zero() -> Self {
        Default::default()
    }

    fn prefix_len(&self) -> u8 {
        self.prefix_len()
    }

    fn is_bit_set(&self, bit: u8) -> bool {
        let offset = bit / 8;
        let shift = 7 - (bit % 8);
        let octets = self.addr().octets();
        (octets[offset as usize] >> shift) & 0x1 == 0x1
    }

    fn contains(&self, other: &Self) -> bool {
        self.contains(other)
    }

    fn common_prefix(&self, other: &Self) -> Self {
        let a = self.repr();
        let b = other.repr();
        let len = ((a ^ b).leading_zeros() as u8)
            .min(self.prefix_len())
            .min(other.prefix_len());
        let repr = a & mask_from_prefix_len::<Self::R>(len);
        Self::new(repr.into(), len).unwrap()
    }

    fn supernet(&self, new_len: u8) -> Self {
        let repr = self.repr() & mask_from_prefix_len::<Self::R>(new_len);
        Self::new(repr.into(), new_len).unwrap()
    }

    fn default_limits() -> PrefixLimits {
        PrefixLimits::ipv4()
    }
}

impl Prefix for Ipv6Net {
    type R = u128;

    const MAX_LEN: u8 = 128;

    fn repr(&self) -> Self::R {
        self.addr().into()
    }

    fn zero() -> Self {
        Default::default()
    }

    fn prefix_len(&self) -> u8 {
        self.prefix_len()
    }

    fn is_bit_set(&self, bit: u8) -> bool {
        let offset = bit / 8;
        let shift = 7 - (bit % 8);
        let octets = self.addr().octets();
        (octets[offset as usize] >> shift) & 0x1 == 0x1
    }

    fn contains(&self, other: &Self) -> bool {
        self.contains(other)
    }

    fn common_prefix(&self, other: &Self) -> Self {
        let a = self.repr();
        let b = other.repr();
        let len = ((a ^ b).leading_zeros() as u8)
            .min(self.prefix_len())
            .min(other.prefix_len());
        let repr = a & mask_from_prefix_len::<Self::R>(len);
        Self::new(repr.into(), len).unwrap()
    }

    fn supernet(&self, new_len: u8) -> Self {
        let repr = self.repr() & mask_from_prefix_len::<Self::R>(new_len);
        Self::new(repr.into(), new_len).unwrap()
    }

    fn default_limits() -> PrefixLimits {
        PrefixLimits::ipv6()
    }
}
