use crate::macros::internal::impl_buf_common;

/// 32-byte buf, useful for hashes and schnorr pubkeys.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Buf32(pub [u8; 32]);

/// 64-byte buf, useful for signatures.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Buf64(pub [u8; 64]);

impl_buf_common!(Buf32, 32);
impl_buf_common!(Buf64, 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_into_array() {
        let buf = Buf32::new([5u8; 32]);
        let arr: [u8; 32] = buf.into();
        assert_eq!(arr, [5; 32]);
    }

    #[test]
    fn test_zero() {
        assert!(Buf32::zero().is_zero());
        assert!(!Buf32::new([1; 32]).is_zero());
    }

    #[test]
    fn test_try_from_slice() {
        let long = [7u8; 40];
        assert!(Buf32::try_from(&long[..32]).is_ok());
        assert!(Buf32::try_from(&long[..31]).is_err());
    }
}
