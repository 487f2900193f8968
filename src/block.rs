//! A single chunked, sharded column: header text file, per-shard data
//! files, and an attribute file, all living in one directory.
//!
//! Shard files are named by a 6-digit lowercase hex id (`000000`,
//! `000001`, ...); the header and attribute files are named `header` and
//! `attr`. A `Block` owns no open file handles between calls — every
//! shard is opened, used, and closed within a single `read`/`write` call,
//! matching the original's per-chunk `fopen`/`fclose` pattern.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::array::{BigArrayMut, OwnedArray};
use crate::attr::AttrSet;
use crate::config;
use crate::convert::convert;
use crate::dtype::Dtype;
use crate::error::{BigFileError, Result};
use crate::here;

const HEADER_FILE: &str = "header";
const ATTR_FILE: &str = "attr";

pub(crate) fn shard_name(fileid: usize) -> String {
    format!("{:06x}", fileid)
}

/// A cursor into a block: which shard, and the offset within it
/// (`roffset`) and within the block as a whole (`aoffset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPtr {
    pub fileid: usize,
    pub roffset: i64,
    pub aoffset: i64,
}

fn sysv_sum(seed: u32, buf: &[u8]) -> u32 {
    buf.iter().fold(seed, |acc, &b| acc.wrapping_add(b as u32))
}

/// Fold a 32-bit rolling sum down to 16 bits, twice, the way the header
/// line's informational second checksum field is produced. This value is
/// never re-verified on read (see spec's open-question resolution in
/// `DESIGN.md`); it exists purely for operator-facing sanity checks.
fn reduced_checksum(s: u32) -> u32 {
    let r = (s & 0xffff) + (s >> 16);
    (r & 0xffff) + (r >> 16)
}

pub struct Block {
    basename: PathBuf,
    dtype: Dtype,
    nmemb: usize,
    fsize: Vec<u64>,
    foffset: Vec<u64>,
    fchecksum: Vec<u32>,
    size: u64,
    pub attrs: AttrSet,
    dirty: bool,
}

impl Block {
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn nmemb(&self) -> usize {
        self.nmemb
    }

    pub fn nfile(&self) -> usize {
        self.fsize.len()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn fsize(&self) -> &[u64] {
        &self.fsize
    }

    pub fn fchecksum(&self) -> &[u32] {
        &self.fchecksum
    }

    /// Low-level constructor used by [`crate::collective`]: builds a handle
    /// directly from an authoritative in-memory metadata snapshot instead of
    /// reading it back from `header`, which may lag behind the running
    /// collective write (the header is only rewritten on flush/close).
    pub(crate) fn from_parts(
        basename: PathBuf,
        dtype: Dtype,
        nmemb: usize,
        fsize: Vec<u64>,
        fchecksum: Vec<u32>,
        attrs: AttrSet,
    ) -> Block {
        let mut foffset = vec![0u64; fsize.len() + 1];
        for i in 0..fsize.len() {
            foffset[i + 1] = foffset[i] + fsize[i];
        }
        let size = *foffset.last().unwrap_or(&0);
        Block {
            basename,
            dtype,
            nmemb,
            fsize,
            foffset,
            fchecksum,
            size,
            attrs,
            dirty: false,
        }
    }

    /// Open an existing block directory, reading its header and
    /// attribute file. The block directory itself must already exist;
    /// see [`crate::file::File`] for the directory-creation layer above
    /// this one.
    pub fn open(basename: impl Into<PathBuf>) -> Result<Block> {
        let basename = basename.into();
        let header_path = basename.join(HEADER_FILE);
        let text = fs::read_to_string(&header_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BigFileError::BlockNotFound {
                    path: basename.clone(),
                    loc: here!(),
                }
            } else {
                BigFileError::io(header_path.clone(), e, here!())
            }
        })?;

        let mut lines = text.lines();
        let dtype_str = parse_kv(&mut lines, "DTYPE", &header_path)?;
        let dtype = Dtype::normalize(dtype_str.trim())?;
        let nmemb: usize = parse_kv(&mut lines, "NMEMB", &header_path)?
            .trim()
            .parse()
            .map_err(|_| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: "NMEMB is not an integer".to_string(),
                loc: here!(),
            })?;
        let nfile: usize = parse_kv(&mut lines, "NFILE", &header_path)?
            .trim()
            .parse()
            .map_err(|_| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: "NFILE is not an integer".to_string(),
                loc: here!(),
            })?;

        let mut fsize = vec![0u64; nfile];
        let mut fchecksum = vec![0u32; nfile];
        for _ in 0..nfile {
            let line = lines.next().ok_or_else(|| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: "missing shard line".to_string(),
                loc: here!(),
            })?;
            let parts: Vec<&str> = line.splitn(4, ':').collect();
            if parts.len() != 4 {
                return Err(BigFileError::HeaderMalformed {
                    path: header_path.clone(),
                    reason: format!("malformed shard line {:?}", line),
                    loc: here!(),
                });
            }
            let fid = usize::from_str_radix(parts[0].trim(), 16).map_err(|_| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: format!("bad shard id {:?}", parts[0]),
                loc: here!(),
            })?;
            let size: u64 = parts[1].trim().parse().map_err(|_| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: format!("bad shard size {:?}", parts[1]),
                loc: here!(),
            })?;
            let cksum: u32 = parts[2].trim().parse().map_err(|_| BigFileError::HeaderMalformed {
                path: header_path.clone(),
                reason: format!("bad shard checksum {:?}", parts[2]),
                loc: here!(),
            })?;
            // parts[3] is the reduced checksum; informational only, not re-verified.
            if fid >= nfile {
                return Err(BigFileError::HeaderMalformed {
                    path: header_path.clone(),
                    reason: format!("shard id {} out of range for NFILE {}", fid, nfile),
                    loc: here!(),
                });
            }
            fsize[fid] = size;
            fchecksum[fid] = cksum;
        }

        let mut foffset = vec![0u64; nfile + 1];
        for i in 0..nfile {
            foffset[i + 1] = foffset[i] + fsize[i];
        }
        let size = *foffset.last().unwrap_or(&0);

        let attr_path = basename.join(ATTR_FILE);
        let attrs = match File::open(&attr_path) {
            Ok(f) => AttrSet::read_from(f)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AttrSet::new(),
            Err(e) => return Err(BigFileError::io(attr_path, e, here!())),
        };

        Ok(Block {
            basename,
            dtype,
            nmemb,
            fsize,
            foffset,
            fchecksum,
            size,
            attrs,
            dirty: false,
        })
    }

    /// Create a new block. `dtype: None` makes an attribute-only block
    /// (dtype defaults to `i8`, shard count forced to zero) — the shape
    /// used for the metadata-carrying `header` block of a dataset.
    pub fn create(basename: impl Into<PathBuf>, dtype: Option<&str>, nmemb: usize, fsize: &[u64]) -> Result<Block> {
        let basename = basename.into();
        let (dtype, fsize): (Dtype, &[u64]) = match dtype {
            Some(d) => (Dtype::normalize(d)?, fsize),
            None => (Dtype::normalize("i8")?, &[]),
        };

        let mut foffset = vec![0u64; fsize.len() + 1];
        for i in 0..fsize.len() {
            foffset[i + 1] = foffset[i] + fsize[i];
        }
        let size = *foffset.last().unwrap_or(&0);

        let mut block = Block {
            basename,
            dtype,
            nmemb,
            fsize: fsize.to_vec(),
            foffset,
            fchecksum: vec![0u32; fsize.len()],
            size,
            attrs: AttrSet::new(),
            dirty: true,
        };
        block.flush()?;

        for fileid in 0..block.fsize.len() {
            let path = block.basename.join(shard_name(fileid));
            File::create(&path).map_err(|e| BigFileError::io(path, e, here!()))?;
        }
        Ok(block)
    }

    /// Append `fsize_grow.len()` new, empty shards after the existing ones.
    /// No existing shard's bytes or checksum are touched (spec.md P10).
    pub fn grow(&mut self, fsize_grow: &[u64]) -> Result<()> {
        let start = self.fsize.len();
        for (i, &sz) in fsize_grow.iter().enumerate() {
            let fileid = start + i;
            let path = self.basename.join(shard_name(fileid));
            File::create(&path).map_err(|e| BigFileError::io(path, e, here!()))?;
            self.fsize.push(sz);
            self.fchecksum.push(0);
        }
        self.foffset = vec![0u64; self.fsize.len() + 1];
        for i in 0..self.fsize.len() {
            self.foffset[i + 1] = self.foffset[i] + self.fsize[i];
        }
        self.size = *self.foffset.last().unwrap();
        self.dirty = true;
        Ok(())
    }

    /// Write the header (if dirty) and the attribute file (if dirty).
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            let header_path = self.basename.join(HEADER_FILE);
            let mut out = String::new();
            out.push_str(&format!("DTYPE: {}\n", self.dtype));
            out.push_str(&format!("NMEMB: {}\n", self.nmemb));
            out.push_str(&format!("NFILE: {}\n", self.fsize.len()));
            for i in 0..self.fsize.len() {
                let s = self.fchecksum[i];
                out.push_str(&format!("{}: {} : {} : {}\n", shard_name(i), self.fsize[i], s, reduced_checksum(s)));
            }
            fs::write(&header_path, out).map_err(|e| BigFileError::io(header_path, e, here!()))?;
            self.dirty = false;
        }
        if self.attrs.dirty {
            let attr_path = self.basename.join(ATTR_FILE);
            let f = File::create(&attr_path).map_err(|e| BigFileError::io(attr_path, e, here!()))?;
            self.attrs.write_to(f).map_err(|e| BigFileError::io(self.basename.join(ATTR_FILE), e, here!()))?;
            self.attrs.dirty = false;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Locate `offset` within the block: `0` is the start, negative
    /// offsets count back from the end. Seeking exactly to the end is
    /// allowed (a zero-length read/write there is a no-op).
    pub fn seek(&self, offset: i64) -> Result<BlockPtr> {
        if self.size == 0 && offset == 0 {
            return Ok(BlockPtr {
                fileid: 0,
                roffset: 0,
                aoffset: 0,
            });
        }
        let mut offset = offset;
        if offset < 0 {
            offset += self.size as i64;
        }
        if offset > self.size as i64 {
            return Err(BigFileError::Eof {
                offset,
                size: self.size,
                loc: here!(),
            });
        }
        let nfile = self.fsize.len();
        let mut left = 0usize;
        let mut right = nfile;
        while right > left + 1 {
            let mid = ((right - left) >> 1) + left;
            if self.foffset[mid] <= offset as u64 {
                left = mid;
            } else {
                right = mid;
            }
        }
        Ok(BlockPtr {
            fileid: left,
            roffset: offset - self.foffset[left] as i64,
            aoffset: offset,
        })
    }

    pub fn seek_rel(&self, ptr: &BlockPtr, rel: i64) -> Result<BlockPtr> {
        let abs = self.foffset[ptr.fileid] as i64 + ptr.roffset + rel;
        self.seek(abs)
    }

    /// Read `size` rows starting at `start` into a freshly allocated
    /// array, casting to `dtype` if given (defaulting to the block's own
    /// dtype otherwise). `size` is clamped to what remains in the block.
    pub fn read_simple(&self, start: i64, size: i64, dtype: Option<&str>) -> Result<OwnedArray> {
        let dtype = match dtype {
            Some(d) => Dtype::normalize(d)?,
            None => self.dtype,
        };
        let mut ptr = self.seek(start)?;
        let mut size = size;
        if start + size > self.size as i64 {
            size = self.size as i64 - start;
        }
        if size < 0 {
            return Err(BigFileError::Eof {
                offset: start + size,
                size: self.size,
                loc: here!(),
            });
        }
        let mut owned = OwnedArray {
            data: vec![0u8; size as usize * dtype.itemsize() * self.nmemb],
            dtype,
            dims: vec![size, self.nmemb as i64],
        };
        {
            let mut view = owned.as_mut();
            self.read(&mut ptr, &mut view)?;
        }
        Ok(owned)
    }

    /// Stream `array.size / nmemb` rows starting at `ptr` out of the
    /// block's shards, converting dtype/endianness as needed, in chunks
    /// bounded by the process-wide chunk byte budget.
    pub fn read(&self, ptr: &mut BlockPtr, array: &mut BigArrayMut<'_>) -> Result<()> {
        if array.size == 0 {
            return Ok(());
        }
        let chunk_bytes = config::current().chunk_bytes;
        let felsize = self.dtype.itemsize() * self.nmemb;
        let chunk_rows = (chunk_bytes / felsize).max(1);

        let mut chunk_buf = vec![0u8; chunk_rows * felsize];
        let mut toread = (array.size / self.nmemb as u64) as i64;
        let mut array_iter = array.iter_mut();

        while toread > 0 {
            let mut rows = chunk_rows as i64;
            let remaining_in_shard = self.fsize[ptr.fileid] as i64 - ptr.roffset;
            if rows > remaining_in_shard {
                rows = remaining_in_shard;
            }
            if rows > toread {
                rows = toread;
            }
            let bytes = rows as usize * felsize;

            let shard_path = self.basename.join(shard_name(ptr.fileid));
            let mut f = File::open(&shard_path).map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;
            f.seek(SeekFrom::Start(ptr.roffset as u64 * felsize as u64))
                .map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;
            f.read_exact(&mut chunk_buf[..bytes])
                .map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;

            let mut chunk_array = BigArrayMut::new(&mut chunk_buf, self.dtype, vec![chunk_rows as i64, self.nmemb as i64], None);
            let mut chunk_iter = chunk_array.iter_mut();
            convert(&mut array_iter, &mut chunk_iter, rows as u64 * self.nmemb as u64);

            toread -= rows;
            *ptr = self.seek_rel(ptr, rows)?;
        }
        if toread != 0 {
            panic!("read loop postcondition violated: {} rows unaccounted for", toread);
        }
        Ok(())
    }

    /// Stream `array.size / nmemb` rows from `array` into the block's
    /// shards at `ptr`, converting dtype/endianness and accumulating each
    /// shard's rolling checksum as it is written.
    pub fn write(&mut self, ptr: &mut BlockPtr, array: &mut BigArrayMut<'_>) -> Result<()> {
        if array.size == 0 {
            return Ok(());
        }
        self.dirty = true;
        let chunk_bytes = config::current().chunk_bytes;
        let felsize = self.dtype.itemsize() * self.nmemb;
        let chunk_rows = (chunk_bytes / felsize).max(1);

        let mut chunk_buf = vec![0u8; chunk_rows * felsize];
        let mut towrite = (array.size / self.nmemb as u64) as i64;
        let mut array_iter = array.iter_mut();

        while towrite > 0 {
            let mut rows = chunk_rows as i64;
            let remaining_in_shard = self.fsize[ptr.fileid] as i64 - ptr.roffset;
            if rows > remaining_in_shard {
                rows = remaining_in_shard;
            }
            if rows > towrite {
                rows = towrite;
            }
            let bytes = rows as usize * felsize;

            {
                let mut chunk_array = BigArrayMut::new(&mut chunk_buf, self.dtype, vec![chunk_rows as i64, self.nmemb as i64], None);
                let mut chunk_iter = chunk_array.iter_mut();
                convert(&mut chunk_iter, &mut array_iter, rows as u64 * self.nmemb as u64);
            }

            self.fchecksum[ptr.fileid] = sysv_sum(self.fchecksum[ptr.fileid], &chunk_buf[..bytes]);

            let shard_path = self.basename.join(shard_name(ptr.fileid));
            let mut f = OpenOptions::new()
                .write(true)
                .open(&shard_path)
                .map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;
            f.seek(SeekFrom::Start(ptr.roffset as u64 * felsize as u64))
                .map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;
            f.write_all(&chunk_buf[..bytes])
                .map_err(|e| BigFileError::io(shard_path.clone(), e, here!()))?;

            towrite -= rows;
            *ptr = self.seek_rel(ptr, rows)?;
        }
        if towrite != 0 {
            panic!("write loop postcondition violated: {} rows unaccounted for", towrite);
        }
        Ok(())
    }
}

fn parse_kv<'a>(lines: &mut std::str::Lines<'a>, key: &str, path: &Path) -> Result<&'a str> {
    let line = lines.next().ok_or_else(|| BigFileError::HeaderMalformed {
        path: path.to_path_buf(),
        reason: format!("missing {} line", key),
        loc: here!(),
    })?;
    let prefix = format!("{}:", key);
    line.strip_prefix(&prefix).ok_or_else(|| BigFileError::HeaderMalformed {
        path: path.to_path_buf(),
        reason: format!("expected {} line, got {:?}", key, line),
        loc: here!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Unique scratch directory per test, cleaned up on drop — the same
    /// shape as the teacher's device-backed test helper, adapted to plain
    /// filesystem paths instead of loopback devices.
    struct TestTempDir {
        path: PathBuf,
    }

    impl TestTempDir {
        fn new(label: &str) -> Self {
            let _ = env_logger::try_init();
            let id = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("bigfile-test-{}-{}-{}", label, std::process::id(), id));
            fs::create_dir_all(&path).unwrap();
            TestTempDir { path }
        }

        fn join(&self, name: &str) -> PathBuf {
            self.path.join(name)
        }
    }

    impl Drop for TestTempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn create_then_open_roundtrips_header() {
        let dir = TestTempDir::new("create-open");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let block = Block::create(&path, Some("<f4"), 3, &[10, 10]).unwrap();
        block.close().unwrap();

        let reopened = Block::open(&path).unwrap();
        assert_eq!(reopened.dtype().to_string(), "<f4");
        assert_eq!(reopened.nmemb(), 3);
        assert_eq!(reopened.nfile(), 2);
        assert_eq!(reopened.size(), 20);
    }

    #[test]
    fn write_then_read_back_roundtrips_values() {
        let dir = TestTempDir::new("write-read");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let mut block = Block::create(&path, Some("<i4"), 1, &[4, 4]).unwrap();

        let values: Vec<i32> = (0..8).collect();
        let mut src: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut ptr = block.seek(0).unwrap();
        {
            let mut src_arr = BigArrayMut::new(&mut src, Dtype::normalize("<i4").unwrap(), vec![8, 1], None);
            block.write(&mut ptr, &mut src_arr).unwrap();
        }
        block.flush().unwrap();

        let mut dst = vec![0u8; 8 * 4];
        let mut ptr = block.seek(0).unwrap();
        {
            let mut dst_arr = BigArrayMut::new(&mut dst, Dtype::normalize("<i4").unwrap(), vec![8, 1], None);
            block.read(&mut ptr, &mut dst_arr).unwrap();
        }
        assert_eq!(dst, src);
    }

    #[test]
    fn write_crossing_shard_boundary_updates_both_checksums() {
        let dir = TestTempDir::new("shard-cross");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let mut block = Block::create(&path, Some("<i4"), 1, &[3, 3]).unwrap();

        let values: Vec<i32> = (0..6).collect();
        let mut src: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut ptr = block.seek(0).unwrap();
        let mut src_arr = BigArrayMut::new(&mut src, Dtype::normalize("<i4").unwrap(), vec![6, 1], None);
        block.write(&mut ptr, &mut src_arr).unwrap();

        assert_ne!(block.fchecksum[0], 0);
        assert_ne!(block.fchecksum[1], 0);
    }

    #[test]
    fn seek_negative_counts_from_end() {
        let dir = TestTempDir::new("seek-neg");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let block = Block::create(&path, Some("<i4"), 1, &[10]).unwrap();
        let end = block.seek(-1).unwrap();
        assert_eq!(end.aoffset, 9);
        let start = block.seek(0).unwrap();
        assert_eq!(start.aoffset, 0);
    }

    #[test]
    fn zero_sized_block_seek_to_zero_is_a_noop() {
        let dir = TestTempDir::new("zero-size");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let block = Block::create(&path, None, 0, &[]).unwrap();
        let ptr = block.seek(0).unwrap();
        assert_eq!(ptr, BlockPtr { fileid: 0, roffset: 0, aoffset: 0 });
    }

    #[test]
    fn attribute_only_header_block_persists_attrs() {
        let dir = TestTempDir::new("attr-block");
        let path = dir.join("header");
        fs::create_dir_all(&path).unwrap();
        let mut block = Block::create(&path, None, 0, &[]).unwrap();
        let boxsize: f64 = 100.0;
        block
            .attrs
            .set_attr("boxsize", &boxsize.to_le_bytes(), Dtype::normalize("<f8").unwrap(), 1)
            .unwrap();
        block.close().unwrap();

        let reopened = Block::open(&path).unwrap();
        let mut out = [0u8; 8];
        reopened
            .attrs
            .get_attr("boxsize", &mut out, Dtype::normalize("<f8").unwrap(), 1)
            .unwrap();
        assert_eq!(f64::from_le_bytes(out), 100.0);
    }

    #[test]
    fn cross_dtype_read_casts_on_the_fly() {
        let dir = TestTempDir::new("cast-read");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let mut block = Block::create(&path, Some("<f8"), 1, &[4]).unwrap();

        let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0];
        let mut src: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut ptr = block.seek(0).unwrap();
        let mut src_arr = BigArrayMut::new(&mut src, Dtype::normalize("<f8").unwrap(), vec![4, 1], None);
        block.write(&mut ptr, &mut src_arr).unwrap();
        block.flush().unwrap();

        let owned = block.read_simple(0, 4, Some("<i4")).unwrap();
        let casted: Vec<i32> = owned
            .data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(casted, vec![1, 2, 3, 4]);
    }

    #[test]
    fn grow_appends_empty_shards_without_disturbing_existing_ones() {
        let dir = TestTempDir::new("grow");
        let path = dir.join("block");
        fs::create_dir_all(&path).unwrap();
        let mut block = Block::create(&path, Some("<i4"), 1, &[4]).unwrap();

        let values: Vec<i32> = (0..4).collect();
        let mut src: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut ptr = block.seek(0).unwrap();
        let mut src_arr = BigArrayMut::new(&mut src, Dtype::normalize("<i4").unwrap(), vec![4, 1], None);
        block.write(&mut ptr, &mut src_arr).unwrap();
        let checksum_before = block.fchecksum[0];

        block.grow(&[5, 5]).unwrap();
        assert_eq!(block.nfile(), 3);
        assert_eq!(block.size(), 14);
        assert_eq!(block.fchecksum[0], checksum_before);
        assert_eq!(block.fchecksum[1], 0);
        assert_eq!(block.fchecksum[2], 0);

        block.close().unwrap();
        let reopened = Block::open(&path).unwrap();
        assert_eq!(reopened.nfile(), 3);
        assert_eq!(reopened.fsize(), &[4, 5, 5]);
    }

    #[test]
    fn opening_missing_block_is_block_not_found() {
        let dir = TestTempDir::new("missing");
        let path = dir.join("nope");
        let err = Block::open(&path).unwrap_err();
        assert!(matches!(err, BigFileError::BlockNotFound { .. }));
    }
}
