//! [`CryptoBuffer`]: owned, fixed-length byte buffer for key material and cipher output.

use std::{fmt, ops::Deref};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owned byte sequence whose length is fixed once constructed.
///
/// Every buffer owns its own allocation; building one from other buffers
/// copies the bytes. When dropped, the contents are overwritten with zeroes so
/// keys and plaintext do not linger in freed memory.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CryptoBuffer(Box<[u8]>);

impl CryptoBuffer {
    /// Create a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self(vec![0u8; len].into_boxed_slice())
    }

    /// Copy `bytes` into a new buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Copy the given parts, in order, into one new contiguous buffer.
    pub fn concat(parts: &[&[u8]]) -> Self {
        let total = parts.iter().map(|p| p.len()).sum();
        let mut out = Vec::with_capacity(total);
        for part in parts {
            out.extend_from_slice(part);
        }
        Self(out.into_boxed_slice())
    }

    /// Copy `len` bytes starting at `offset` into a new buffer.
    ///
    /// Returns `None` if the range falls outside this buffer.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        self.0.get(offset..end).map(Self::from_slice)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Mutable access for in-place cipher operations. The length cannot change.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Move the contents out without zeroing them.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0).into_vec()
    }
}

impl Drop for CryptoBuffer {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl ZeroizeOnDrop for CryptoBuffer {}

impl fmt::Debug for CryptoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents may be key material; only the length is printed.
        write!(f, "CryptoBuffer(len={}, [REDACTED])", self.0.len())
    }
}

impl Deref for CryptoBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for CryptoBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for CryptoBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

impl From<&[u8]> for CryptoBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_slice(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for CryptoBuffer {
    fn from(bytes: [u8; N]) -> Self {
        Self::from_slice(&bytes)
    }
}

/// Overwrite a scratch vector with zeroes and empty it.
pub(crate) fn wipe(buf: &mut Vec<u8>) {
    buf.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_copies_in_order() {
        let a = CryptoBuffer::from_slice(&[1, 2]);
        let b = CryptoBuffer::from_slice(&[3]);
        let joined = CryptoBuffer::concat(&[a.as_slice(), b.as_slice(), &[4u8, 5][..]]);
        assert_eq!(joined.as_slice(), &[1, 2, 3, 4, 5]);
        // Sources are untouched.
        assert_eq!(a.as_slice(), &[1, 2]);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        assert!(CryptoBuffer::concat(&[]).is_empty());
    }

    #[test]
    fn slice_bounds() {
        let buf = CryptoBuffer::from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(buf.slice(2, 3).unwrap().as_slice(), &[2, 3, 4]);
        assert_eq!(buf.slice(8, 0).unwrap().len(), 0);
        assert!(buf.slice(6, 3).is_none());
        assert!(buf.slice(usize::MAX, 2).is_none());
    }

    #[test]
    fn zeroed_has_requested_length() {
        let buf = CryptoBuffer::zeroed(40);
        assert_eq!(buf.len(), 40);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn into_vec_keeps_contents() {
        let buf = CryptoBuffer::from(vec![9u8, 8, 7]);
        assert_eq!(buf.into_vec(), vec![9, 8, 7]);
    }

    #[test]
    fn redacted_in_debug() {
        let buf = CryptoBuffer::from([0xAAu8; 4]);
        let s = format!("{buf:?}");
        assert!(s.contains("REDACTED"));
        assert!(s.contains("len=4"));
        assert!(!s.contains("170"));
    }

    #[test]
    fn wipe_clears_scratch() {
        let mut scratch = vec![1u8, 2, 3];
        wipe(&mut scratch);
        assert!(scratch.is_empty());
    }

    #[test]
    fn zeroizes_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<CryptoBuffer>();
    }
}
