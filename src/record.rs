//! Struct-of-arrays convenience layer: fans one logical "row" of named
//! fields out to one [`crate::block::Block`] per field, all at the same row
//! offset. Thin by design (spec.md §1 calls it out of scope beyond its
//! interface) — no on-disk format of its own, just per-field `File`/`Block`
//! calls wrapped around one packed caller buffer.
//!
//! The original C library's `big_record_type_clear` looped `while
//! (rtype->nfield)` instead of `for (i = 0; i < rtype->nfield; i++)` — an
//! infinite loop on any non-empty record type (spec.md §9). There is no
//! analogous bug here: `RecordType` is an ordinary `Vec<FieldSpec>`, and
//! `Drop` takes care of clearing it.

use crate::array::BigArrayMut;
use crate::dtype::Dtype;
use crate::error::Result;
use crate::file::File;

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub dtype: String,
    pub nmemb: usize,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>, nmemb: usize) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            dtype: dtype.into(),
            nmemb,
        }
    }
}

/// An ordered schema of fields, in the order they are packed into the
/// caller's struct-of-arrays buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordType {
    pub fields: Vec<FieldSpec>,
}

impl RecordType {
    pub fn new(fields: Vec<FieldSpec>) -> RecordType {
        RecordType { fields }
    }

    /// Total packed bytes per row, summed over every field's normalized
    /// dtype and `nmemb`.
    pub fn row_bytes(&self) -> Result<usize> {
        let mut total = 0usize;
        for f in &self.fields {
            total += Dtype::normalize(&f.dtype)?.itemsize() * f.nmemb;
        }
        Ok(total)
    }
}

/// Create one block per field, each with the same shard layout (`Nfile`
/// shards sized `fsize`).
pub fn create_records(file: &File, rtype: &RecordType, fsize: &[u64]) -> Result<()> {
    for field in &rtype.fields {
        file.create_block(&field.name, Some(&field.dtype), field.nmemb, fsize)?.close()?;
    }
    Ok(())
}

/// Write `nrows` rows starting at `start` from one packed struct-of-arrays
/// buffer (fields concatenated in `rtype.fields` order, each field
/// contiguous over all `nrows` rows) out to one block per field.
pub fn write_records(file: &File, rtype: &RecordType, start: i64, nrows: u64, buf: &[u8]) -> Result<()> {
    let mut cursor = 0usize;
    for field in &rtype.fields {
        let dtype = Dtype::normalize(&field.dtype)?;
        let field_bytes = nrows as usize * field.nmemb * dtype.itemsize();
        let mut field_buf = buf[cursor..cursor + field_bytes].to_vec();
        cursor += field_bytes;

        let mut block = file.open_block(&field.name)?;
        let mut ptr = block.seek(start)?;
        let mut arr = BigArrayMut::new(&mut field_buf, dtype, vec![nrows as i64, field.nmemb as i64], None);
        block.write(&mut ptr, &mut arr)?;
        block.flush()?;
    }
    Ok(())
}

/// Inverse of [`write_records`]: read `nrows` rows starting at `start` from
/// one block per field, packing the result into a single struct-of-arrays
/// buffer in `rtype.fields` order.
pub fn read_records(file: &File, rtype: &RecordType, start: i64, nrows: u64) -> Result<Vec<u8>> {
    let mut out = vec![0u8; nrows as usize * rtype.row_bytes()?];
    let mut cursor = 0usize;
    for field in &rtype.fields {
        let dtype = Dtype::normalize(&field.dtype)?;
        let field_bytes = nrows as usize * field.nmemb * dtype.itemsize();

        let block = file.open_block(&field.name)?;
        let mut ptr = block.seek(start)?;
        let mut arr = BigArrayMut::new(&mut out[cursor..cursor + field_bytes], dtype, vec![nrows as i64, field.nmemb as i64], None);
        block.read(&mut ptr, &mut arr)?;
        cursor += field_bytes;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    struct TestTempDir {
        path: std::path::PathBuf,
    }

    impl TestTempDir {
        fn new(label: &str) -> Self {
            let _ = env_logger::try_init();
            let id = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("bigfile-record-test-{}-{}-{}", label, std::process::id(), id));
            TestTempDir { path }
        }
    }

    impl Drop for TestTempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn write_then_read_records_roundtrips_two_fields() {
        let dir = TestTempDir::new("roundtrip");
        let file = File::create(&dir.path).unwrap();
        let rtype = RecordType::new(vec![FieldSpec::new("pos", "<f4", 3), FieldSpec::new("id", "<i8", 1)]);
        create_records(&file, &rtype, &[10]).unwrap();

        let nrows = 10u64;
        let mut buf = Vec::new();
        let pos: Vec<f32> = (0..30).map(|i| i as f32 * 0.5).collect();
        buf.extend(pos.iter().flat_map(|v| v.to_le_bytes()));
        let ids: Vec<i64> = (0..10).collect();
        buf.extend(ids.iter().flat_map(|v| v.to_le_bytes()));

        write_records(&file, &rtype, 0, nrows, &buf).unwrap();
        let out = read_records(&file, &rtype, 0, nrows).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn row_bytes_sums_every_field() {
        let rtype = RecordType::new(vec![FieldSpec::new("pos", "<f4", 3), FieldSpec::new("id", "<i8", 1)]);
        assert_eq!(rtype.row_bytes().unwrap(), 3 * 4 + 8);
    }
}
