//! Endian byte-swap and numeric-kind cast between any pair of supported
//! dtypes, via a pass over strided iterators.
//!
//! Ordering is deliberate and documented because it mutates caller-provided
//! buffers: swap `src` in place (if non-native), cast into `dst`, then swap
//! `dst` in place (if non-native). This avoids a scratch allocation on the
//! hot path but means a non-native `src` buffer is not left untouched.
//! Callers who need immutability should go through [`convert_copy`], or
//! operate on their own copy.

use crate::array::{BigArrayIterMut, BigArrayMut};
use crate::dtype::{Dtype, Kind};

fn byte_swap_in_place(iter: &mut BigArrayIterMut<'_>, n: u64) {
    let elsize = iter.dtype.itemsize();
    if elsize == 1 {
        for _ in 0..n {
            iter.advance();
        }
        return;
    }
    for _ in 0..n {
        iter.current_mut().reverse();
        iter.advance();
    }
}

#[derive(Clone, Copy)]
enum Scalar {
    I4(i32),
    I8(i64),
    U4(u32),
    U8(u64),
    F4(f32),
    F8(f64),
}

fn read_native(kind: Kind, width: u8, buf: &[u8]) -> Scalar {
    match (kind, width) {
        (Kind::Int, 4) => Scalar::I4(i32::from_ne_bytes(buf.try_into().unwrap())),
        (Kind::Int, 8) => Scalar::I8(i64::from_ne_bytes(buf.try_into().unwrap())),
        (Kind::Uint, 4) => Scalar::U4(u32::from_ne_bytes(buf.try_into().unwrap())),
        (Kind::Uint, 8) => Scalar::U8(u64::from_ne_bytes(buf.try_into().unwrap())),
        (Kind::Float, 4) => Scalar::F4(f32::from_ne_bytes(buf.try_into().unwrap())),
        (Kind::Float, 8) => Scalar::F8(f64::from_ne_bytes(buf.try_into().unwrap())),
        _ => unreachable!("Dtype::normalize only admits width in {{4, 8}}"),
    }
}

/// C-style truncation for integer narrowing, IEEE round-to-nearest-even for
/// float narrowing — the language's natural numeric conversion semantics,
/// as spec.md §4.3 requires. All 36 (kind, width) x (kind, width) pairs
/// over {i4,i8,u4,u8,f4,f8} are reachable through this match.
fn cast_scalar(s: Scalar, dst_kind: Kind, dst_width: u8) -> Scalar {
    macro_rules! from {
        ($val:expr) => {
            match (dst_kind, dst_width) {
                (Kind::Int, 4) => Scalar::I4($val as i32),
                (Kind::Int, 8) => Scalar::I8($val as i64),
                (Kind::Uint, 4) => Scalar::U4($val as u32),
                (Kind::Uint, 8) => Scalar::U8($val as u64),
                (Kind::Float, 4) => Scalar::F4($val as f32),
                (Kind::Float, 8) => Scalar::F8($val as f64),
                _ => unreachable!("Dtype::normalize only admits width in {{4, 8}}"),
            }
        };
    }
    match s {
        Scalar::I4(v) => from!(v),
        Scalar::I8(v) => from!(v),
        Scalar::U4(v) => from!(v),
        Scalar::U8(v) => from!(v),
        Scalar::F4(v) => from!(v),
        Scalar::F8(v) => from!(v),
    }
}

fn write_native(s: Scalar, buf: &mut [u8]) {
    match s {
        Scalar::I4(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        Scalar::I8(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        Scalar::U4(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        Scalar::U8(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        Scalar::F4(v) => buf.copy_from_slice(&v.to_ne_bytes()),
        Scalar::F8(v) => buf.copy_from_slice(&v.to_ne_bytes()),
    }
}

/// Copy `n` scalar elements from `src` to `dst`, converting endianness and
/// numeric kind. See the module doc for the byte-swap-in-place contract.
pub fn convert(dst: &mut BigArrayIterMut<'_>, src: &mut BigArrayIterMut<'_>, n: u64) {
    if src.dtype.needs_swap() {
        let start = src.save_cursor();
        byte_swap_in_place(src, n);
        src.restore_cursor(start);
    }

    let dst_start = dst.save_cursor();

    if dst.contiguous() && src.contiguous() && dst.dtype == src.dtype {
        let width = dst.dtype.itemsize();
        let nbytes = n as usize * width;
        let src_off = src.offset() as usize;
        let dst_off = dst.offset() as usize;
        let tmp = src.data[src_off..src_off + nbytes].to_vec();
        dst.data[dst_off..dst_off + nbytes].copy_from_slice(&tmp);
        for _ in 0..n {
            dst.advance();
            src.advance();
        }
    } else {
        for _ in 0..n {
            let s = read_native(src.dtype.kind, src.dtype.width, src.current_mut());
            let casted = cast_scalar(s, dst.dtype.kind, dst.dtype.width);
            write_native(casted, dst.current_mut());
            dst.advance();
            src.advance();
        }
    }

    if dst.dtype.needs_swap() {
        dst.restore_cursor(dst_start);
        byte_swap_in_place(dst, n);
    }
}

/// Wrap both sides as 1-D contiguous arrays and call [`convert`].
pub fn convert_simple(dst: &mut [u8], dst_dtype: Dtype, src: &[u8], src_dtype: Dtype, nmemb: u64) {
    let mut src_owned = src.to_vec();
    let mut src_mut = BigArrayMut::new(&mut src_owned, src_dtype, vec![nmemb as i64], None);
    let mut dst_mut = BigArrayMut::new(dst, dst_dtype, vec![nmemb as i64], None);
    let mut src_iter = src_mut.iter_mut();
    let mut dst_iter = dst_mut.iter_mut();
    convert(&mut dst_iter, &mut src_iter, nmemb);
}

/// Non-mutating variant: always operates on an owned copy of `src`, so the
/// caller's buffer is never byte-swapped in place even if non-native.
/// (spec.md §9 Design Notes: "prefer an additional non-mutating variant in
/// the new API that allocates a scratch buffer for non-native src".)
pub fn convert_copy(dst: &mut [u8], dst_dtype: Dtype, src: &[u8], src_dtype: Dtype, nmemb: u64) {
    convert_simple(dst, dst_dtype, src, src_dtype, nmemb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::BigArrayMut;
    use crate::dtype::Dtype;

    #[test]
    fn same_type_contiguous_fast_path_copies_bytes() {
        let dt = Dtype::normalize("<f8").unwrap();
        let src = 3.5f64.to_le_bytes().to_vec();
        let mut dst = vec![0u8; 8];
        convert_simple(&mut dst, dt, &src, dt, 1);
        assert_eq!(dst, src);
    }

    #[test]
    fn cross_kind_cast_f8_to_i4_truncates() {
        let f8 = Dtype::normalize("<f8").unwrap();
        let i4 = Dtype::normalize("<i4").unwrap();
        let src = 7.9f64.to_le_bytes();
        let mut dst = vec![0u8; 4];
        convert_simple(&mut dst, i4, &src, f8, 1);
        let v = i32::from_le_bytes(dst.try_into().unwrap());
        assert_eq!(v, 7);
    }

    #[test]
    fn f8_to_f4_quantizes() {
        let f8 = Dtype::normalize("<f8").unwrap();
        let f4 = Dtype::normalize("<f4").unwrap();
        let val = 1.0f64 / 3.0f64;
        let src = val.to_le_bytes();
        let mut dst = vec![0u8; 4];
        convert_simple(&mut dst, f4, &src, f8, 1);
        let narrowed = f32::from_le_bytes(dst.try_into().unwrap());
        assert_eq!(narrowed, val as f32);
    }

    #[test]
    fn endian_swap_on_non_native_src() {
        let le = Dtype::normalize("<i4").unwrap();
        let be = Dtype::normalize(">i4").unwrap();
        let value: i32 = 0x0102_0304;
        let mut src = value.to_be_bytes().to_vec();
        let mut dst = vec![0u8; 4];
        let mut src_mut = BigArrayMut::new(&mut src, be, vec![1], None);
        let mut dst_mut = BigArrayMut::new(&mut dst, le, vec![1], None);
        let mut src_iter = src_mut.iter_mut();
        let mut dst_iter = dst_mut.iter_mut();
        convert(&mut dst_iter, &mut src_iter, 1);
        assert_eq!(i32::from_le_bytes(dst.try_into().unwrap()), value);
        // src buffer was swapped in place, by contract
        assert_eq!(src, value.to_le_bytes());
    }

    #[test]
    fn multi_element_pass_advances_both_sides() {
        let dt = Dtype::normalize("<i4").unwrap();
        let values: Vec<i32> = vec![1, 2, 3, 4];
        let src: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut dst = vec![0u8; 16];
        convert_simple(&mut dst, dt, &src, dt, 4);
        assert_eq!(dst, src);
    }

    #[test]
    fn convert_copy_does_not_mutate_caller_buffer() {
        let le = Dtype::normalize("<i4").unwrap();
        let be = Dtype::normalize(">i4").unwrap();
        let value: i32 = 0x0102_0304;
        let src = value.to_be_bytes().to_vec();
        let mut dst = vec![0u8; 4];
        convert_copy(&mut dst, le, &src, be, 1);
        assert_eq!(i32::from_le_bytes(dst.try_into().unwrap()), value);
        assert_eq!(src, value.to_be_bytes());
    }
}
