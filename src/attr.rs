//! Sorted named attributes with typed payloads.
//!
//! The original C library backs this with a packed byte buffer and raw
//! pointers into it, rebased on every grow. Per spec.md §9's re-architecture
//! guidance (option a), `AttrSet` here is an ordered map from owned name to
//! an owned payload — there is nothing to rebase, and "no pointers live
//! across set_attr" is not a concern because there are no pointers.

use std::io::{self, Read, Write};

use crate::dtype::Dtype;
use crate::error::{BigFileError, Result};
use crate::here;

/// One attribute's value: a normalized dtype, an element count, and the
/// raw converted bytes (`nmemb * dtype.itemsize()` long).
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    pub dtype: Dtype,
    pub nmemb: usize,
    pub data: Vec<u8>,
}

/// Sorted-by-name attribute set (invariant A1). Backed by a `BTreeMap`,
/// which keeps entries sorted automatically instead of requiring a sort
/// pass after every mutation.
#[derive(Debug, Default, Clone)]
pub struct AttrSet {
    attrs: std::collections::BTreeMap<String, AttrValue>,
    pub dirty: bool,
}

impl AttrSet {
    pub fn new() -> Self {
        AttrSet::default()
    }

    pub fn lookup_attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Upsert: if the attribute already exists, `data` (in `dtype`) is
    /// converted into the attribute's *existing, already-stored* dtype —
    /// matching the original `big_block_set_attr`'s
    /// `dtype_convert_simple(found->data, found->dtype, data, dtype,
    /// found->nmemb)` call (`examples/original_source/src/bigfile.c:451-466`):
    /// an attribute's on-disk dtype is fixed at its first `add_attr` and
    /// never changed by a later `set_attr`, only its value is. Only a
    /// brand-new attribute is stored as `dtype`. `nmemb` must match the
    /// existing attribute's, if any. Expressed as a single operation instead
    /// of "lookup, maybe add, lookup again" (the original's fragile
    /// double-lookup across an `add_attr` that may resort the list —
    /// spec.md §9 flags this explicitly).
    pub fn set_attr(&mut self, name: &str, data: &[u8], dtype: Dtype, nmemb: usize) -> Result<()> {
        let stored_dtype = match self.attrs.get(name) {
            Some(existing) => existing.dtype,
            None => dtype,
        };
        self.set_attr_converting(name, data, dtype, stored_dtype, nmemb)
    }

    /// General form [`AttrSet::set_attr`] delegates to: convert `data` (in
    /// `src_dtype`) into `stored_dtype` and upsert under `name`. Exposed
    /// separately so a caller can force the *stored* dtype of a brand-new
    /// attribute to something other than its source data's dtype; for an
    /// existing attribute `set_attr` always passes the attribute's own
    /// current dtype as `stored_dtype`, so the two only differ on first
    /// creation.
    pub fn set_attr_converting(
        &mut self,
        name: &str,
        data: &[u8],
        src_dtype: Dtype,
        stored_dtype: Dtype,
        nmemb: usize,
    ) -> Result<()> {
        self.dirty = true;
        if let Some(existing) = self.attrs.get(name) {
            if existing.nmemb != nmemb {
                return Err(BigFileError::AttrNmembMismatch {
                    name: name.to_string(),
                    stored: existing.nmemb,
                    requested: nmemb,
                    loc: here!(),
                });
            }
        }
        let mut converted = vec![0u8; nmemb * stored_dtype.itemsize()];
        crate::convert::convert_simple(&mut converted, stored_dtype, data, src_dtype, nmemb as u64);
        self.attrs.insert(
            name.to_string(),
            AttrValue {
                dtype: stored_dtype,
                nmemb,
                data: converted,
            },
        );
        Ok(())
    }

    pub fn get_attr(&self, name: &str, out: &mut [u8], dtype: Dtype, nmemb: usize) -> Result<()> {
        let found = self.attrs.get(name).ok_or_else(|| BigFileError::AttrMissing {
            name: name.to_string(),
            loc: here!(),
        })?;
        if found.nmemb != nmemb {
            return Err(BigFileError::AttrNmembMismatch {
                name: name.to_string(),
                stored: found.nmemb,
                requested: nmemb,
                loc: here!(),
            });
        }
        crate::convert::convert_simple(out, dtype, &found.data, found.dtype, nmemb as u64);
        Ok(())
    }

    /// Sorted view (invariant A1 is structural here: a `BTreeMap` iterates
    /// in key order, so there is no separate sort step to verify).
    pub fn list_attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        self.dirty = true;
        self.attrs.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Serialize in the on-disk format from spec.md §4.4: for each
    /// attribute, `nmemb:i32`, `lname:i32`, `dtype:[u8;8]` (ASCII,
    /// zero-padded), `name` bytes (no NUL), then the converted payload.
    /// Integers are written in host byte order — a deliberate, documented
    /// non-portability (see spec.md §9 open question).
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        for (name, attr) in &self.attrs {
            let nmemb = attr.nmemb as i32;
            let lname = name.len() as i32;
            w.write_all(&nmemb.to_ne_bytes())?;
            w.write_all(&lname.to_ne_bytes())?;
            w.write_all(&attr.dtype.to_padded8())?;
            w.write_all(name.as_bytes())?;
            w.write_all(&attr.data)?;
        }
        Ok(())
    }

    /// Reconstruct from the on-disk format. Absence of the attr file is not
    /// an error at the caller (`Block::open`); EOF simply terminates the
    /// read here.
    pub fn read_from<R: Read>(mut r: R) -> Result<AttrSet> {
        let mut set = AttrSet::new();
        loop {
            let mut nmemb_buf = [0u8; 4];
            match r.read_exact(&mut nmemb_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(BigFileError::io("<attr>", e, here!())),
            }
            let nmemb = i32::from_ne_bytes(nmemb_buf) as usize;

            let mut lname_buf = [0u8; 4];
            r.read_exact(&mut lname_buf)
                .map_err(|e| BigFileError::io("<attr>", e, here!()))?;
            let lname = i32::from_ne_bytes(lname_buf) as usize;

            let mut dtype_buf = [0u8; 8];
            r.read_exact(&mut dtype_buf)
                .map_err(|e| BigFileError::io("<attr>", e, here!()))?;
            let dtype_str = std::str::from_utf8(&dtype_buf)
                .unwrap_or("")
                .trim_end_matches('\0')
                .to_string();
            let dtype = Dtype::normalize(&dtype_str)?;

            let mut name_buf = vec![0u8; lname];
            r.read_exact(&mut name_buf)
                .map_err(|e| BigFileError::io("<attr>", e, here!()))?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();

            let mut data = vec![0u8; nmemb * dtype.itemsize()];
            r.read_exact(&mut data)
                .map_err(|e| BigFileError::io("<attr>", e, here!()))?;

            set.dirty = false;
            set.attrs.insert(name, AttrValue { dtype, nmemb, data });
        }
        set.dirty = false;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f8() -> Dtype {
        Dtype::normalize("<f8").unwrap()
    }
    fn i4() -> Dtype {
        Dtype::normalize("<i4").unwrap()
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut set = AttrSet::new();
        let boxsize: f64 = 100.0;
        set.set_attr("boxsize", &boxsize.to_le_bytes(), f8(), 1).unwrap();
        let mut out = [0u8; 8];
        set.get_attr("boxsize", &mut out, f8(), 1).unwrap();
        assert_eq!(f64::from_le_bytes(out), 100.0);
    }

    #[test]
    fn set_attr_keeps_the_stored_dtype_fixed_after_creation() {
        // The attribute's on-disk dtype is fixed by its first `set_attr`;
        // a later `set_attr` with a different source dtype must cast into
        // the stored dtype, not overwrite it.
        let mut set = AttrSet::new();
        let version: i32 = 1;
        set.set_attr("version", &version.to_le_bytes(), i4(), 1).unwrap();
        assert_eq!(set.lookup_attr("version").unwrap().dtype, i4());

        let updated: f64 = 2.0;
        set.set_attr("version", &updated.to_le_bytes(), f8(), 1).unwrap();

        let stored = set.lookup_attr("version").unwrap();
        assert_eq!(stored.dtype, i4());
        let mut out = [0u8; 4];
        set.get_attr("version", &mut out, i4(), 1).unwrap();
        assert_eq!(i32::from_le_bytes(out), 2);
    }

    #[test]
    fn nmemb_mismatch_on_get_is_an_error() {
        let mut set = AttrSet::new();
        let n: i32 = 1024;
        set.set_attr("NumPart", &n.to_le_bytes(), i4(), 1).unwrap();
        let mut out = [0u8; 8];
        let err = set.get_attr("NumPart", &mut out, i4(), 2).unwrap_err();
        assert!(matches!(err, BigFileError::AttrNmembMismatch { .. }));
    }

    #[test]
    fn missing_attr_is_an_error() {
        let set = AttrSet::new();
        let mut out = [0u8; 8];
        let err = set.get_attr("nope", &mut out, i4(), 1).unwrap_err();
        assert!(matches!(err, BigFileError::AttrMissing { .. }));
    }

    #[test]
    fn list_attrs_is_sorted_by_name() {
        let mut set = AttrSet::new();
        let n: i32 = 1024;
        let boxsize: f64 = 100.0;
        set.set_attr("boxsize", &boxsize.to_le_bytes(), f8(), 1).unwrap();
        set.set_attr("NumPart", &n.to_le_bytes(), i4(), 1).unwrap();
        set.set_attr("alpha", b"hello", Dtype::normalize("<i4").unwrap(), 0)
            .unwrap_or(());
        let names: Vec<&str> = set.list_attrs().map(|(n, _)| n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn remove_attr_drops_it() {
        let mut set = AttrSet::new();
        let n: i32 = 1;
        set.set_attr("x", &n.to_le_bytes(), i4(), 1).unwrap();
        assert!(set.remove_attr("x"));
        assert!(set.lookup_attr("x").is_none());
        assert!(!set.remove_attr("x"));
    }

    #[test]
    fn serialize_roundtrip_preserves_values() {
        let mut set = AttrSet::new();
        let n: i32 = 1024;
        let boxsize: f64 = 100.0;
        set.set_attr("NumPart", &n.to_le_bytes(), i4(), 1).unwrap();
        set.set_attr("boxsize", &boxsize.to_le_bytes(), f8(), 1).unwrap();

        let mut buf = Vec::new();
        set.write_to(&mut buf).unwrap();
        let reloaded = AttrSet::read_from(&buf[..]).unwrap();

        assert_eq!(reloaded.len(), 2);
        let mut out = [0u8; 8];
        reloaded.get_attr("boxsize", &mut out, f8(), 1).unwrap();
        assert_eq!(f64::from_le_bytes(out), 100.0);
    }
}
