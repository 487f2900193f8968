//! n-dimensional strided view over a raw buffer, and its advancing cursor.
//!
//! `BigArray` never owns the memory it describes — callers are responsible
//! for keeping the backing buffer alive for as long as the array (or any
//! iterator over it) is in use. This mirrors numpy's stride model: for a
//! contiguous row-major array, `strides[ndim-1] == itemsize` and
//! `strides[i] == strides[i+1] * dims[i+1]`.

use crate::dtype::Dtype;

pub const MAX_NDIM: usize = 32;

/// A strided view over `data`. The pointer/length pair is a raw byte span;
/// `dtype`, `dims`, and `strides` describe how to interpret it.
pub struct BigArray<'a> {
    pub data: &'a [u8],
    pub dtype: Dtype,
    pub dims: Vec<i64>,
    pub strides: Vec<i64>,
    pub size: u64,
}

/// Mutable counterpart used as a write destination.
pub struct BigArrayMut<'a> {
    pub data: &'a mut [u8],
    pub dtype: Dtype,
    pub dims: Vec<i64>,
    pub strides: Vec<i64>,
    pub size: u64,
}

fn contiguous_strides(dtype: &Dtype, dims: &[i64]) -> Vec<i64> {
    let mut strides = vec![0i64; dims.len()];
    if dims.is_empty() {
        return strides;
    }
    let itemsize = dtype.itemsize() as i64;
    *strides.last_mut().unwrap() = itemsize;
    for i in (0..dims.len() - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn total_size(dims: &[i64]) -> u64 {
    dims.iter().fold(1u64, |acc, &d| acc * d as u64)
}

impl<'a> BigArray<'a> {
    pub fn new(data: &'a [u8], dtype: Dtype, dims: Vec<i64>, strides: Option<Vec<i64>>) -> Self {
        assert!(dims.len() <= MAX_NDIM, "ndim exceeds MAX_NDIM");
        let size = total_size(&dims);
        let strides = strides.unwrap_or_else(|| contiguous_strides(&dtype, &dims));
        BigArray {
            data,
            dtype,
            dims,
            strides,
            size,
        }
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn iter(&self) -> BigArrayIter<'_> {
        BigArrayIter::new(self)
    }
}

/// An array that owns its backing buffer, returned by operations like
/// [`crate::block::Block::read_simple`] that allocate on the caller's
/// behalf (the original's "free(array->data) after using it" contract,
/// expressed here as ordinary Rust ownership instead of a manual-free
/// reminder in a doc comment).
pub struct OwnedArray {
    pub data: Vec<u8>,
    pub dtype: Dtype,
    pub dims: Vec<i64>,
}

impl OwnedArray {
    pub fn as_mut(&mut self) -> BigArrayMut<'_> {
        BigArrayMut::new(&mut self.data, self.dtype, self.dims.clone(), None)
    }

    pub fn as_ref(&self) -> BigArray<'_> {
        BigArray::new(&self.data, self.dtype, self.dims.clone(), None)
    }
}

impl<'a> BigArrayMut<'a> {
    pub fn new(data: &'a mut [u8], dtype: Dtype, dims: Vec<i64>, strides: Option<Vec<i64>>) -> Self {
        assert!(dims.len() <= MAX_NDIM, "ndim exceeds MAX_NDIM");
        let size = total_size(&dims);
        let strides = strides.unwrap_or_else(|| contiguous_strides(&dtype, &dims));
        BigArrayMut {
            data,
            dtype,
            dims,
            strides,
            size,
        }
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn iter_mut(&mut self) -> BigArrayIterMut<'_> {
        BigArrayIterMut::new(self)
    }
}

/// Shared generic cursor logic: a byte offset from the array's base plus a
/// per-dimension position counter, with a precomputed contiguity fast path.
#[derive(Clone)]
struct Cursor {
    offset: i64,
    pos: Vec<i64>,
    contiguous: bool,
}

impl Cursor {
    fn new(dtype: &Dtype, dims: &[i64], strides: &[i64]) -> Self {
        let ndim = dims.len();
        let mut contiguous = true;
        let mut expected = dtype.itemsize() as i64;
        for i in (0..ndim).rev() {
            if strides[i] != expected {
                contiguous = false;
                break;
            }
            expected *= dims[i];
        }
        Cursor {
            offset: 0,
            pos: vec![0i64; ndim],
            contiguous,
        }
    }

    /// Advance by one element, per spec.md §4.2's carry-outward rule.
    fn advance(&mut self, dims: &[i64], strides: &[i64]) {
        let ndim = dims.len();
        if ndim == 0 {
            return;
        }
        if self.contiguous {
            self.offset += strides[ndim - 1];
            return;
        }
        self.pos[ndim - 1] += 1;
        self.offset += strides[ndim - 1];
        for k in (1..ndim).rev() {
            if self.pos[k] != dims[k] {
                break;
            }
            self.offset -= strides[k] * self.pos[k];
            self.pos[k] = 0;
            self.pos[k - 1] += 1;
            self.offset += strides[k - 1];
        }
    }
}

pub struct BigArrayIter<'a> {
    pub array: &'a BigArray<'a>,
    cursor: Cursor,
}

impl<'a> BigArrayIter<'a> {
    pub fn new(array: &'a BigArray<'a>) -> Self {
        let cursor = Cursor::new(&array.dtype, &array.dims, &array.strides);
        BigArrayIter { array, cursor }
    }

    pub fn contiguous(&self) -> bool {
        self.cursor.contiguous
    }

    pub fn offset(&self) -> i64 {
        self.cursor.offset
    }

    pub fn current(&self) -> &'a [u8] {
        let off = self.cursor.offset as usize;
        let len = self.array.dtype.itemsize();
        &self.array.data[off..off + len]
    }

    pub fn advance(&mut self) {
        self.cursor.advance(&self.array.dims, &self.array.strides);
    }
}

pub struct BigArrayIterMut<'a> {
    pub(crate) data: &'a mut [u8],
    pub dtype: Dtype,
    dims: Vec<i64>,
    strides: Vec<i64>,
    cursor: Cursor,
}

/// Opaque snapshot of cursor state, for sub-passes (byte-swap, then cast)
/// that need to revisit the same span from the same starting position —
/// the Rust analogue of the original's `BigArrayIter iter = *src` copies.
pub(crate) struct CursorSnapshot(Cursor);

impl<'a> BigArrayIterMut<'a> {
    pub fn new<'b: 'a>(array: &'a mut BigArrayMut<'b>) -> Self {
        let cursor = Cursor::new(&array.dtype, &array.dims, &array.strides);
        BigArrayIterMut {
            data: &mut *array.data,
            dtype: array.dtype,
            dims: array.dims.clone(),
            strides: array.strides.clone(),
            cursor,
        }
    }

    pub fn contiguous(&self) -> bool {
        self.cursor.contiguous
    }

    pub fn offset(&self) -> i64 {
        self.cursor.offset
    }

    pub fn current_mut(&mut self) -> &mut [u8] {
        let off = self.cursor.offset as usize;
        let len = self.dtype.itemsize();
        &mut self.data[off..off + len]
    }

    pub fn advance(&mut self) {
        self.cursor.advance(&self.dims, &self.strides);
    }

    pub(crate) fn save_cursor(&self) -> CursorSnapshot {
        CursorSnapshot(self.cursor.clone())
    }

    pub(crate) fn restore_cursor(&mut self, snap: CursorSnapshot) {
        self.cursor = snap.0;
    }
}
