//! In-process, thread-based [`Group`] implementation.
//!
//! Ships only to exercise and test the coordinator logic in
//! [`crate::collective`] without a real MPI/network dependency — the actual
//! transport is explicitly out of scope (spec.md §1). Built entirely from
//! `std::sync` primitives (`Barrier`, `Mutex`), mirroring the teacher's
//! habit of shipping a small synchronous test harness (`TestTempDir`)
//! alongside production code instead of pulling in a mocking framework.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Barrier, Mutex};

use super::Group;

struct Shared {
    size: usize,
    barrier: Barrier,
    bytes_slots: Mutex<Vec<Option<Vec<u8>>>>,
    sum_slots: Mutex<Vec<Option<Vec<u32>>>>,
    split_registry: Mutex<HashMap<usize, Arc<Shared>>>,
}

impl Shared {
    fn new(size: usize) -> Shared {
        Shared {
            size,
            barrier: Barrier::new(size),
            bytes_slots: Mutex::new(vec![None; size]),
            sum_slots: Mutex::new(vec![None; size]),
            split_registry: Mutex::new(HashMap::new()),
        }
    }
}

/// One peer's handle onto a group of `size` in-process threads.
#[derive(Clone)]
pub struct ThreadGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadGroup {
    /// Build `size` peer handles sharing one rendezvous point. Hand one to
    /// each worker thread; every collective call must be made by all of
    /// them, in the same order, for the barrier protocol to make progress.
    pub fn new_ring(size: usize) -> Vec<ThreadGroup> {
        let shared = Arc::new(Shared::new(size));
        (0..size)
            .map(|rank| ThreadGroup {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }
}

impl Group for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn broadcast_bytes(&self, data: &mut Vec<u8>, root: usize) {
        if self.rank == root {
            let mut slots = self.shared.bytes_slots.lock().unwrap();
            slots[root] = Some(data.clone());
        }
        self.barrier();
        {
            let slots = self.shared.bytes_slots.lock().unwrap();
            *data = slots[root].clone().unwrap_or_default();
        }
        self.barrier();
    }

    fn gather_bytes(&self, data: Vec<u8>, root: usize) -> Option<Vec<Vec<u8>>> {
        {
            let mut slots = self.shared.bytes_slots.lock().unwrap();
            slots[self.rank] = Some(data);
        }
        self.barrier();
        let result = if self.rank == root {
            let slots = self.shared.bytes_slots.lock().unwrap();
            Some(slots.iter().map(|s| s.clone().unwrap_or_default()).collect())
        } else {
            None
        };
        self.barrier();
        result
    }

    fn scatter_bytes(&self, data: Option<Vec<Vec<u8>>>, root: usize) -> Vec<u8> {
        if let Some(per_rank) = data {
            let mut slots = self.shared.bytes_slots.lock().unwrap();
            for (rank, chunk) in per_rank.into_iter().enumerate() {
                slots[rank] = Some(chunk);
            }
        }
        self.barrier();
        let mine = {
            let slots = self.shared.bytes_slots.lock().unwrap();
            slots[self.rank].clone().unwrap_or_default()
        };
        self.barrier();
        let _ = root;
        mine
    }

    fn allreduce_sum_u32(&self, local: Vec<u32>) -> Vec<u32> {
        {
            let mut slots = self.shared.sum_slots.lock().unwrap();
            slots[self.rank] = Some(local.clone());
        }
        self.barrier();
        let total = {
            let slots = self.shared.sum_slots.lock().unwrap();
            let width = local.len();
            let mut total = vec![0u32; width];
            for slot in slots.iter() {
                if let Some(v) = slot {
                    for (t, x) in total.iter_mut().zip(v.iter()) {
                        *t = t.wrapping_add(*x);
                    }
                }
            }
            total
        };
        self.barrier();
        total
    }

    fn split(&self, color: usize) -> ThreadGroup {
        {
            let mut slots = self.shared.bytes_slots.lock().unwrap();
            slots[self.rank] = Some((color as u32).to_ne_bytes().to_vec());
        }
        self.barrier();
        let colors: Vec<usize> = {
            let slots = self.shared.bytes_slots.lock().unwrap();
            slots
                .iter()
                .map(|s| u32::from_ne_bytes(s.clone().unwrap_or_default().try_into().unwrap_or([0; 4])) as usize)
                .collect()
        };
        self.barrier();

        if self.rank == 0 {
            let mut registry = self.shared.split_registry.lock().unwrap();
            registry.clear();
            let mut by_color: BTreeMap<usize, usize> = BTreeMap::new();
            for &c in &colors {
                *by_color.entry(c).or_insert(0) += 1;
            }
            for (c, count) in by_color {
                registry.insert(c, Arc::new(Shared::new(count)));
            }
        }
        self.barrier();

        let sub_shared = {
            let registry = self.shared.split_registry.lock().unwrap();
            registry.get(&color).unwrap().clone()
        };
        let sub_rank = colors
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == color)
            .position(|(r, _)| r == self.rank)
            .unwrap();
        self.barrier();

        ThreadGroup {
            rank: sub_rank,
            shared: sub_shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn barrier_synchronizes_all_peers() {
        let groups = ThreadGroup::new_ring(4);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|g| thread::spawn(move || g.barrier()))
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn broadcast_delivers_root_value_to_everyone() {
        let groups = ThreadGroup::new_ring(3);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|g| {
                thread::spawn(move || {
                    let mut data = if g.rank() == 0 { vec![1, 2, 3] } else { vec![] };
                    g.broadcast_bytes(&mut data, 0);
                    data
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![1, 2, 3]);
        }
    }

    #[test]
    fn gather_collects_every_peers_payload_at_root() {
        let groups = ThreadGroup::new_ring(3);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|g| {
                let rank = g.rank();
                thread::spawn(move || g.gather_bytes(vec![rank as u8], 0))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], Some(vec![vec![0], vec![1], vec![2]]));
        assert_eq!(results[1], None);
        assert_eq!(results[2], None);
    }

    #[test]
    fn allreduce_sum_is_commutative_across_peers() {
        let groups = ThreadGroup::new_ring(4);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|g| {
                let rank = g.rank();
                thread::spawn(move || g.allreduce_sum_u32(vec![rank as u32 + 1, 10]))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec![1 + 2 + 3 + 4, 40]);
        }
    }

    #[test]
    fn split_partitions_peers_by_color() {
        let groups = ThreadGroup::new_ring(4);
        let handles: Vec<_> = groups
            .into_iter()
            .map(|g| {
                let color = g.rank() % 2;
                thread::spawn(move || {
                    let sub = g.split(color);
                    (sub.rank(), sub.size())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (_, size) in &results {
            assert_eq!(*size, 2);
        }
    }
}
