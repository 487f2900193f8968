//! Parallel coordinator: many peers opening/creating/growing/reading/writing
//! disjoint row ranges of the same [`crate::block::Block`] in lock-step.
//!
//! The transport between peers is an abstract [`Group`] — barrier,
//! broadcast, gather, scatter, a commutative reduction over per-shard
//! checksum partials, and sub-communicator `split` — deliberately undefined
//! by this crate (spec.md §1 puts the concrete transport out of scope). The
//! only implementation shipped is [`local::ThreadGroup`], an in-process
//! harness used to exercise this module's tests.

pub mod local;

use std::path::{Path, PathBuf};

use log::debug;

use crate::array::BigArrayMut;
use crate::attr::AttrSet;
use crate::block::{self, Block};
use crate::config;
use crate::dtype::Dtype;
use crate::error::{BigFileError, Result};
use crate::file;
use crate::here;

/// Transport abstraction a collective operation is built on. Every method
/// is a collective call: all peers in the group must invoke it, in the same
/// order, for the operation to make progress (this is the barrier-delimited
/// lock-step model of spec.md §4.7/§5).
pub trait Group: Clone {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Synchronize all peers; none return until all have called it.
    fn barrier(&self);

    /// `root`'s `data` is copied to every peer (including `root` itself).
    fn broadcast_bytes(&self, data: &mut Vec<u8>, root: usize);

    /// Every peer's `data` is collected at `root`, in rank order. Returns
    /// `Some(_)` only at `root`; every other peer gets `None`.
    fn gather_bytes(&self, data: Vec<u8>, root: usize) -> Option<Vec<Vec<u8>>>;

    /// Inverse of gather: `root` passes `Some(per_rank_data)` (index = rank,
    /// `None` elsewhere), everyone gets back their own slice.
    fn scatter_bytes(&self, data: Option<Vec<Vec<u8>>>, root: usize) -> Vec<u8>;

    /// Element-wise sum of `local` across every peer, visible to all peers.
    /// Used to reconcile per-shard checksum deltas after a collective write
    /// (SysV byte-sum is commutative/associative mod 2^32 — spec.md P5 —
    /// so "segmented scan" and "allreduce" coincide here).
    fn allreduce_sum_u32(&self, local: Vec<u32>) -> Vec<u32>;

    /// Partition the group into sub-communicators by `color`; every peer
    /// gets back a handle scoped to its own color.
    fn split(&self, color: usize) -> Self;
}

/// A peer's in-memory view of a block's metadata: kept in lock-step with
/// every other peer's view via broadcast (on open/create/grow) and
/// allreduce (on write), so it is authoritative even though it may be ahead
/// of what is currently on disk (the header is only rewritten at `close`).
#[derive(Clone)]
struct BlockMeta {
    dtype: Dtype,
    nmemb: usize,
    fsize: Vec<u64>,
    fchecksum: Vec<u32>,
    attrs: AttrSet,
}

impl BlockMeta {
    fn from_block(b: &Block) -> BlockMeta {
        BlockMeta {
            dtype: b.dtype(),
            nmemb: b.nmemb(),
            fsize: b.fsize().to_vec(),
            fchecksum: b.fchecksum().to_vec(),
            attrs: b.attrs.clone(),
        }
    }

    fn nfile(&self) -> usize {
        self.fsize.len()
    }

    fn size(&self) -> u64 {
        self.fsize.iter().sum()
    }

    /// Manual little-endian encoding, in the same spirit as the block
    /// header/attr file formats: `nmemb:u64, nfile:u64, fsize[nfile]:u64,
    /// fchecksum[nfile]:u32, dtype:[u8;8], attrs (AttrSet::write_to)`.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.nmemb as u64).to_le_bytes());
        out.extend_from_slice(&(self.fsize.len() as u64).to_le_bytes());
        for &s in &self.fsize {
            out.extend_from_slice(&s.to_le_bytes());
        }
        for &c in &self.fchecksum {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend_from_slice(&self.dtype.to_padded8());
        self.attrs.write_to(&mut out).expect("Vec<u8> writes never fail");
        out
    }

    fn decode(bytes: &[u8]) -> Result<BlockMeta> {
        let mut pos = 0usize;
        let read_u64 = |pos: &mut usize| -> u64 {
            let v = u64::from_le_bytes(bytes[*pos..*pos + 8].try_into().unwrap());
            *pos += 8;
            v
        };
        let nmemb = read_u64(&mut pos) as usize;
        let nfile = read_u64(&mut pos) as usize;
        let mut fsize = Vec::with_capacity(nfile);
        for _ in 0..nfile {
            fsize.push(read_u64(&mut pos));
        }
        let mut fchecksum = Vec::with_capacity(nfile);
        for _ in 0..nfile {
            let c = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
            fchecksum.push(c);
            pos += 4;
        }
        let dtype_str = std::str::from_utf8(&bytes[pos..pos + 8])
            .unwrap_or("")
            .trim_end_matches('\0')
            .to_string();
        pos += 8;
        let dtype = Dtype::normalize(&dtype_str)?;
        let attrs = AttrSet::read_from(&bytes[pos..])?;
        Ok(BlockMeta {
            dtype,
            nmemb,
            fsize,
            fchecksum,
            attrs,
        })
    }
}

/// Balanced shard partition of `total_rows` rows across `nfile` shards:
/// `fsize[i] = ((i+1)*N)/nfile - (i*N)/nfile` (spec.md §4.7).
pub fn balanced_partition(total_rows: u64, nfile: usize) -> Vec<u64> {
    (0..nfile)
        .map(|i| ((i as u64 + 1) * total_rows) / nfile as u64 - (i as u64 * total_rows) / nfile as u64)
        .collect()
}

/// Broadcast a fallible root-only computation's outcome to every peer: a
/// one-byte ok flag, then the payload (result bytes on success, the error's
/// `Display` string on failure). Every peer observes the same failure
/// (spec.md §4.7: "on failure at root, all peers return the same error").
fn broadcast_result<G: Group>(group: &G, root: usize, result: Option<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    let mut ok = vec![if matches!(result, Some(Ok(_))) { 1u8 } else { 0u8 }];
    let mut payload = match result {
        Some(Ok(bytes)) => bytes,
        Some(Err(e)) => e.to_string().into_bytes(),
        None => Vec::new(),
    };
    group.broadcast_bytes(&mut ok, root);
    group.broadcast_bytes(&mut payload, root);
    if ok[0] == 1 {
        Ok(payload)
    } else {
        Err(BigFileError::Collective {
            message: String::from_utf8_lossy(&payload).into_owned(),
            loc: here!(),
        })
    }
}

/// Sum of `local` across every peer, visible to all (built from `gather` +
/// `broadcast` rather than a dedicated trait method, since it is only ever
/// needed once per collective write to size the aggregated-IO decision).
fn collective_sum_u64<G: Group>(group: &G, local: u64) -> u64 {
    let gathered = group.gather_bytes(local.to_le_bytes().to_vec(), 0);
    let mut total = if group.rank() == 0 {
        let sum: u64 = gathered
            .unwrap()
            .iter()
            .map(|b| u64::from_le_bytes(b.as_slice().try_into().unwrap()))
            .sum();
        sum.to_le_bytes().to_vec()
    } else {
        Vec::new()
    };
    group.broadcast_bytes(&mut total, 0);
    u64::from_le_bytes(total.try_into().unwrap())
}

/// Even-stride election of `nwriter` distributor peers out of `size`
/// (spec.md §4.7 point 1), and the rank-to-distributor assignment used by
/// both collective write (writers) and collective read (readers). Ranks
/// are assigned to the nearest elected peer at or below their stride
/// bucket, so every distributor's assigned ranks form one contiguous band.
fn elect_distributors(size: usize, nwriter: usize) -> Vec<usize> {
    let n = nwriter.clamp(1, size);
    (0..n).map(|w| w * size / n).collect::<Vec<_>>()
}

fn distributor_for(rank: usize, size: usize, distributors: &[usize]) -> usize {
    let n = distributors.len();
    let bucket = (rank * n / size).min(n - 1);
    distributors[bucket]
}

/// A row-range contributed by one peer to its distributor, tagged with
/// where those rows sit in the block so distributors (who may aggregate
/// several peers' contiguous ranges) can reassemble them in order.
fn encode_shipment(offset: u64, rows: u64, dtype: Dtype, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + bytes.len());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&rows.to_le_bytes());
    out.extend_from_slice(&dtype.to_padded8());
    out.extend_from_slice(bytes);
    out
}

struct Shipment {
    offset: u64,
    rows: u64,
    dtype: Dtype,
    bytes: Vec<u8>,
}

fn decode_shipment(buf: &[u8]) -> Option<Shipment> {
    if buf.is_empty() {
        return None;
    }
    let offset = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let rows = u64::from_le_bytes(buf[8..16].try_into().unwrap());
    let dtype_str = std::str::from_utf8(&buf[16..24]).unwrap_or("").trim_end_matches('\0').to_string();
    let dtype = Dtype::normalize(&dtype_str).ok()?;
    Some(Shipment {
        offset,
        rows,
        dtype,
        bytes: buf[24..].to_vec(),
    })
}

/// A block handle shared collectively by every peer of `group`. Mirrors
/// [`crate::block::Block`]'s local API, adding a `Group` and a desired
/// distributor count (`nwriter`) to every read/write.
pub struct CollectiveBlock<G: Group> {
    group: G,
    path: PathBuf,
    meta: BlockMeta,
}

impl<G: Group> CollectiveBlock<G> {
    pub fn dtype(&self) -> Dtype {
        self.meta.dtype
    }

    pub fn nmemb(&self) -> usize {
        self.meta.nmemb
    }

    pub fn size(&self) -> u64 {
        self.meta.size()
    }

    pub fn attrs(&self) -> &AttrSet {
        &self.meta.attrs
    }

    /// Root creates the block with a balanced `nfile`-way partition of
    /// `total_rows`, then broadcasts the resulting metadata to every peer.
    pub fn create(
        group: G,
        file_basename: impl AsRef<Path>,
        block_name: &str,
        dtype: Option<&str>,
        nmemb: usize,
        total_rows: u64,
        nfile: usize,
    ) -> Result<CollectiveBlock<G>> {
        let path = file_basename.as_ref().join(block_name);
        let root = 0;
        let outcome: Option<Result<Vec<u8>>> = if group.rank() == root {
            Some((|| {
                let fsize = balanced_partition(total_rows, nfile);
                file::mkdir_p(&path)?;
                let block = Block::create(&path, dtype, nmemb, &fsize)?;
                let meta = BlockMeta::from_block(&block);
                block.close()?;
                Ok(meta.encode())
            })())
        } else {
            None
        };
        let bytes = broadcast_result(&group, root, outcome)?;
        let meta = BlockMeta::decode(&bytes)?;
        group.barrier();
        debug!("collective create {:?}: {} shards, {} rows total", block_name, meta.nfile(), meta.size());
        Ok(CollectiveBlock { group, path, meta })
    }

    /// Root opens the block and broadcasts its metadata to every peer.
    pub fn open(group: G, file_basename: impl AsRef<Path>, block_name: &str) -> Result<CollectiveBlock<G>> {
        let path = file_basename.as_ref().join(block_name);
        let root = 0;
        let outcome: Option<Result<Vec<u8>>> = if group.rank() == root {
            Some((|| {
                let block = Block::open(&path)?;
                Ok(BlockMeta::from_block(&block).encode())
            })())
        } else {
            None
        };
        let bytes = broadcast_result(&group, root, outcome)?;
        let meta = BlockMeta::decode(&bytes)?;
        group.barrier();
        Ok(CollectiveBlock { group, path, meta })
    }

    /// Root appends `fsize_grow.len()` new empty shards and broadcasts the
    /// updated `fsize`/`foffset`/`Nfile` to every peer.
    pub fn grow(&mut self, fsize_grow: &[u64]) -> Result<()> {
        let root = 0;
        let outcome: Option<Result<Vec<u8>>> = if self.group.rank() == root {
            Some((|| {
                let start = self.meta.fsize.len();
                for (i, &sz) in fsize_grow.iter().enumerate() {
                    let shard_path = self.path.join(block::shard_name(start + i));
                    std::fs::File::create(&shard_path).map_err(|e| BigFileError::io(shard_path, e, here!()))?;
                    self.meta.fsize.push(sz);
                    self.meta.fchecksum.push(0);
                }
                Ok(self.meta.encode())
            })())
        } else {
            None
        };
        let bytes = broadcast_result(&self.group, root, outcome)?;
        self.meta = BlockMeta::decode(&bytes)?;
        self.group.barrier();
        Ok(())
    }

    /// Build a real on-disk [`Block`] handle seeded from the authoritative
    /// in-memory metadata (not from `header`, which lags behind until
    /// `close`). Used only by peers elected as a write/read distributor.
    fn open_for_io(&self) -> Block {
        Block::from_parts(
            self.path.clone(),
            self.meta.dtype,
            self.meta.nmemb,
            self.meta.fsize.clone(),
            self.meta.fchecksum.clone(),
            self.meta.attrs.clone(),
        )
    }

    /// Collective write: every peer contributes `local_rows` rows starting
    /// at its own `local_offset`, from `array` (in the caller's dtype).
    /// `nwriter` elects that many distributor peers (spec.md §4.7); below
    /// the aggregated-IO threshold (`crate::config`), the whole call
    /// collapses to a single distributor regardless of `nwriter`.
    pub fn write(&mut self, local_offset: u64, local_rows: u64, array: &mut BigArrayMut<'_>, nwriter: usize) -> Result<()> {
        self.group.barrier();
        let size = self.group.size();
        let rank = self.group.rank();
        let row_bytes = self.meta.dtype.itemsize() * self.meta.nmemb;
        let local_bytes = local_rows * row_bytes as u64;

        let total_bytes = collective_sum_u64(&self.group, local_bytes);
        let effective_nwriter = if total_bytes as usize <= config::current().aggregated_threshold {
            1
        } else {
            nwriter
        };
        let writers = elect_distributors(size, effective_nwriter);
        let my_writer = distributor_for(rank, size, &writers);
        debug!(
            "collective write: {} total bytes, {} writer(s){}",
            total_bytes,
            writers.len(),
            if effective_nwriter == 1 && nwriter != 1 { " (aggregated)" } else { "" }
        );

        let src_dtype = array.dtype;
        let n = array.size;
        let src_bytes = {
            let mut out = vec![0u8; n as usize * src_dtype.itemsize()];
            let mut it = array.iter_mut();
            for chunk in out.chunks_mut(src_dtype.itemsize()) {
                chunk.copy_from_slice(it.current_mut());
                it.advance();
            }
            out
        };

        let mut checksum_delta = vec![0u32; self.meta.nfile()];

        for &w in &writers {
            let shipment = if my_writer == w {
                encode_shipment(local_offset, local_rows, src_dtype, &src_bytes)
            } else {
                Vec::new()
            };
            let gathered = self.group.gather_bytes(shipment, w);
            if rank == w {
                let mut shipments: Vec<Shipment> = gathered.unwrap().into_iter().filter_map(|b| decode_shipment(&b)).collect();
                if shipments.is_empty() {
                    continue;
                }
                shipments.sort_by_key(|s| s.offset);
                let base_offset = shipments[0].offset;
                let total_rows: u64 = shipments.iter().map(|s| s.rows).sum();
                let src_dtype = shipments[0].dtype;
                let mut combined = Vec::with_capacity(shipments.iter().map(|s| s.bytes.len()).sum());
                for s in &shipments {
                    combined.extend_from_slice(&s.bytes);
                }

                let mut block = self.open_for_io();
                let mut ptr = block.seek(base_offset as i64)?;
                let mut combined_arr = BigArrayMut::new(&mut combined, src_dtype, vec![total_rows as i64, self.meta.nmemb as i64], None);
                block.write(&mut ptr, &mut combined_arr)?;

                for (i, (before, after)) in self.meta.fchecksum.iter().zip(block.fchecksum().iter()).enumerate() {
                    checksum_delta[i] = checksum_delta[i].wrapping_add(after.wrapping_sub(*before));
                }
            }
        }

        let total_delta = self.group.allreduce_sum_u32(checksum_delta);
        for (c, d) in self.meta.fchecksum.iter_mut().zip(total_delta.iter()) {
            *c = c.wrapping_add(*d);
        }

        self.group.barrier();
        Ok(())
    }

    /// Collective read, symmetric to [`CollectiveBlock::write`]: `nwriter`
    /// reader peers fetch their assigned aggregated row range from disk,
    /// then scatter each contributing peer's rows back into its own
    /// `out` buffer (in `out`'s dtype).
    pub fn read(&self, local_offset: u64, local_rows: u64, out: &mut BigArrayMut<'_>, nwriter: usize) -> Result<()> {
        self.group.barrier();
        let size = self.group.size();
        let rank = self.group.rank();
        let readers = elect_distributors(size, nwriter);
        let my_reader = distributor_for(rank, size, &readers);

        for &r in &readers {
            let want = if my_reader == r {
                let mut buf = Vec::with_capacity(16);
                buf.extend_from_slice(&local_offset.to_le_bytes());
                buf.extend_from_slice(&local_rows.to_le_bytes());
                buf
            } else {
                Vec::new()
            };
            let gathered = self.group.gather_bytes(want, r);

            let scattered: Option<Vec<Vec<u8>>> = if rank == r {
                let wants: Vec<(usize, u64, u64)> = gathered
                    .unwrap()
                    .into_iter()
                    .enumerate()
                    .filter(|(_, b)| !b.is_empty())
                    .map(|(peer, b)| {
                        let off = u64::from_le_bytes(b[0..8].try_into().unwrap());
                        let rows = u64::from_le_bytes(b[8..16].try_into().unwrap());
                        (peer, off, rows)
                    })
                    .collect();
                if wants.is_empty() {
                    None
                } else {
                    let min_off = wants.iter().map(|(_, o, _)| *o).min().unwrap();
                    let max_end = wants.iter().map(|(_, o, n)| o + n).max().unwrap();
                    let span = max_end - min_off;

                    let block = self.open_for_io();
                    let mut ptr = block.seek(min_off as i64)?;
                    let mut buf = vec![0u8; span as usize * self.meta.nmemb * out.dtype.itemsize()];
                    let mut span_arr = BigArrayMut::new(&mut buf, out.dtype, vec![span as i64, self.meta.nmemb as i64], None);
                    block.read(&mut ptr, &mut span_arr)?;

                    let row_bytes = self.meta.nmemb * out.dtype.itemsize();
                    let mut per_peer = vec![Vec::new(); size];
                    for (peer, off, rows) in wants {
                        let start = (off - min_off) as usize * row_bytes;
                        let len = rows as usize * row_bytes;
                        per_peer[peer] = buf[start..start + len].to_vec();
                    }
                    Some(per_peer)
                }
            } else {
                None
            };

            let mine = self.group.scatter_bytes(scattered, r);
            if my_reader == r && !mine.is_empty() {
                out.data.copy_from_slice(&mine);
            }
        }

        self.group.barrier();
        Ok(())
    }

    /// Every peer ships its local attribute mutations to root; root's union
    /// wins on name conflicts (spec.md §4.7). Root then writes the header
    /// and attribute file; every peer drops its local metadata.
    pub fn close(mut self) -> Result<()> {
        let root = 0;
        let mine = self.meta.attrs.clone();
        let mut buf = Vec::new();
        mine.write_to(&mut buf).map_err(|e| BigFileError::io(self.path.join("attr"), e, here!()))?;
        let gathered = self.group.gather_bytes(buf, root);

        if self.group.rank() == root {
            let mut merged = self.meta.attrs.clone();
            if let Some(all) = gathered {
                for bytes in all {
                    if let Ok(peer_attrs) = AttrSet::read_from(&bytes[..]) {
                        for (name, value) in peer_attrs.list_attrs() {
                            if merged.lookup_attr(name).is_none() {
                                let _ = merged.set_attr(name, &value.data, value.dtype, value.nmemb);
                            }
                        }
                    }
                }
            }
            let mut block = self.open_for_io();
            block.attrs = merged;
            block.flush()?;
        }
        self.group.barrier();
        Ok(())
    }
}
