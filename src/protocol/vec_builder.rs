//! A `Vec` builder that grows in bounded chunks instead of eagerly
//! allocating a caller-supplied length up front.
//!
//! Every length-prefixed field on the wire (strings, byte arrays, arrays of
//! structures) carries its length as a signed integer written by whoever is
//! on the other end of the socket. A corrupt or hostile peer can claim a
//! multi-gigabyte length while only ever sending a few bytes; allocating
//! `Vec::with_capacity(len)` before reading anything would let that claim
//! alone exhaust memory. Reading in bounded chunks means the allocation
//! only ever grows as far as bytes have actually arrived.

use std::io::Read;

use super::traits::ReadError;

const MAX_CHUNK: usize = 8 * 1024;

pub struct VecBuilder<T> {
    len: usize,
    data: Vec<T>,
}

impl<T> VecBuilder<T> {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            data: Vec::with_capacity(len.min(MAX_CHUNK)),
        }
    }

    pub fn push(&mut self, v: T) {
        self.data.push(v);
    }
}

impl VecBuilder<u8> {
    /// Reads exactly `len` bytes, growing the backing buffer in
    /// `MAX_CHUNK`-sized steps.
    pub fn read_exact<R>(mut self, reader: &mut R) -> Result<Self, ReadError>
    where
        R: Read,
    {
        let mut remaining = self.len;
        let mut chunk = [0u8; MAX_CHUNK];

        while remaining > 0 {
            let n = remaining.min(MAX_CHUNK);
            reader.read_exact(&mut chunk[..n])?;
            self.data.extend_from_slice(&chunk[..n]);
            remaining -= n;
        }

        Ok(self)
    }
}

impl<T> From<VecBuilder<T>> for Vec<T> {
    fn from(builder: VecBuilder<T>) -> Self {
        builder.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_exact_bytes() {
        let data = b"hello world".to_vec();
        let builder = VecBuilder::<u8>::new(data.len());
        let mut cursor = Cursor::new(data.clone());
        let got: Vec<u8> = builder.read_exact(&mut cursor).unwrap().into();
        assert_eq!(got, data);
    }

    #[test]
    fn claimed_length_larger_than_input_errors_without_allocating_it_all() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let builder = VecBuilder::<u8>::new(usize::MAX / 2);
        assert!(builder.read_exact(&mut cursor).is_err());
    }

    #[test]
    fn push_builds_a_vec_of_structured_items() {
        let mut builder = VecBuilder::<i32>::new(3);
        builder.push(1);
        builder.push(2);
        builder.push(3);
        let got: Vec<i32> = builder.into();
        assert_eq!(got, vec![1, 2, 3]);
    }
}
