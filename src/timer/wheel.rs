// src/timer/wheel.rs
//! A fixed-slot hashed timing wheel keyed by absolute expiry in seconds.
//!
//! One wheel per I/O worker. `add`/`remove` are O(1); `modify` is O(1) in
//! the common case (lazy reslot via the `rehash` flag) and only does list
//! surgery immediately when the new expiry moves *earlier* than the old one.

use crate::error::{CoreError, CoreResult};
use crate::timer::entry::{TimerEntry, TimerOwner};
use crate::timer::TimerId;

#[derive(Debug, Clone, Copy, Default)]
struct SlotList {
    head: Option<u32>,
    tail: Option<u32>,
}

/// A hashed timing wheel. Not `Sync` by design — each I/O worker owns one
/// and never shares it.
pub struct TimingWheel {
    slot_count: usize,
    base: u64,
    current_time: u64,
    slots: Vec<SlotList>,
    entries: Vec<Option<TimerEntry>>,
    free_head: Option<u32>,
}

impl TimingWheel {
    /// Allocates the slot array. `slot_count` should be prime for good
    /// distribution but any positive value is accepted.
    pub fn new(slot_count: usize, current_time: u64) -> CoreResult<Self> {
        if slot_count == 0 {
            return Err(CoreError::InvalidArgument("slot_count must be > 0".into()));
        }
        if current_time == 0 {
            return Err(CoreError::InvalidArgument("current_time must be > 0".into()));
        }
        Ok(Self {
            slot_count,
            base: current_time,
            current_time,
            slots: vec![SlotList::default(); slot_count],
            entries: Vec::new(),
            free_head: None,
        })
    }

    fn slot_for(&self, expires: u64) -> usize {
        let anchor = expires.max(self.current_time);
        ((anchor - self.base) % self.slot_count as u64) as usize
    }

    fn alloc_entry(&mut self, entry: TimerEntry) -> u32 {
        if let Some(idx) = self.free_head {
            let slot_in_arena = &mut self.entries[idx as usize];
            self.free_head = slot_in_arena.as_ref().and_then(|e| e.next);
            *slot_in_arena = Some(entry);
            idx
        } else {
            self.entries.push(Some(entry));
            (self.entries.len() - 1) as u32
        }
    }

    fn free_entry(&mut self, idx: u32) {
        self.entries[idx as usize] = Some(TimerEntry {
            expires: 0,
            owner: TimerOwner::Anonymous,
            slot: 0,
            rehash: false,
            prev: None,
            next: self.free_head,
        });
        self.free_head = Some(idx);
    }

    fn get(&self, idx: u32) -> CoreResult<&TimerEntry> {
        self.entries
            .get(idx as usize)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| CoreError::NotFound("timer entry".into()))
    }

    fn insert_at_head(&mut self, slot: usize, idx: u32) {
        let old_head = self.slots[slot].head;
        {
            let entry = self.entries[idx as usize].as_mut().unwrap();
            entry.prev = old_head;
            entry.next = None;
            entry.slot = slot;
        }
        if let Some(head) = old_head {
            self.entries[head as usize].as_mut().unwrap().next = Some(idx);
        } else {
            self.slots[slot].tail = Some(idx);
        }
        self.slots[slot].head = Some(idx);
    }

    fn detach(&mut self, idx: u32) {
        let (slot, prev, next) = {
            let e = self.entries[idx as usize].as_ref().unwrap();
            (e.slot, e.prev, e.next)
        };
        match prev {
            Some(p) => self.entries[p as usize].as_mut().unwrap().next = next,
            None => self.slots[slot].tail = next,
        }
        match next {
            Some(n) => self.entries[n as usize].as_mut().unwrap().prev = prev,
            None => self.slots[slot].head = prev,
        }
    }

    /// Inserts `owner` at `expires` and returns its id. Always succeeds.
    pub fn add(&mut self, expires: u64, owner: TimerOwner) -> TimerId {
        let slot = self.slot_for(expires);
        let idx = self.alloc_entry(TimerEntry {
            expires,
            owner,
            slot,
            rehash: false,
            prev: None,
            next: None,
        });
        self.insert_at_head(slot, idx);
        TimerId(idx)
    }

    /// Reschedules an existing entry. A decrease reslots immediately; an
    /// increase sets `rehash` and waits for the next `sweep` to relocate it
    /// — this lazy move avoids list surgery on every keepalive.
    pub fn modify(&mut self, id: TimerId, new_expires: u64) -> CoreResult<()> {
        let old_expires = self.get(id.0)?.expires;
        if new_expires == old_expires {
            return Ok(());
        }
        if new_expires < old_expires {
            self.detach(id.0);
            let slot = self.slot_for(new_expires);
            {
                let e = self.entries[id.0 as usize].as_mut().unwrap();
                e.expires = new_expires;
                e.rehash = false;
            }
            self.insert_at_head(slot, id.0);
        } else {
            let e = self.entries[id.0 as usize].as_mut().unwrap();
            e.expires = new_expires;
            // Always deferred, even if slot_for(new_expires) happens to land
            // back on the same slot (a full-revolution coincidence) — the
            // entry's physical position is only ever trusted once `sweep`
            // has visited and relocated it.
            e.rehash = true;
        }
        Ok(())
    }

    /// Detaches an entry in O(1). `NotFound` if already removed.
    pub fn remove(&mut self, id: TimerId) -> CoreResult<()> {
        self.get(id.0)?;
        self.detach(id.0);
        self.free_entry(id.0);
        Ok(())
    }

    /// Advances `current_time` to `now`, one slot at a time, returning every
    /// entry whose `expires < now` in slot-visit order, then per-slot
    /// insertion order.
    ///
    /// Non-expired entries with `rehash` set are relocated to the slot their
    /// new `expires` maps to; everything else is left untouched.
    pub fn sweep(&mut self, now: u64) -> Vec<(TimerId, TimerOwner)> {
        let mut expired = Vec::new();
        if now <= self.current_time {
            return expired;
        }

        for sec in (self.current_time + 1)..=now {
            let slot = ((sec - self.base) % self.slot_count as u64) as usize;
            let mut cursor = self.slots[slot].tail;
            while let Some(idx) = cursor {
                let next = self.entries[idx as usize].as_ref().unwrap().next;
                let (expires, rehash) = {
                    let e = self.entries[idx as usize].as_ref().unwrap();
                    (e.expires, e.rehash)
                };
                if expires < now {
                    let owner = self.entries[idx as usize].as_ref().unwrap().owner;
                    self.detach(idx);
                    expired.push((TimerId(idx), owner));
                    self.free_entry(idx);
                } else if rehash {
                    let target = self.slot_for(expires);
                    self.detach(idx);
                    self.entries[idx as usize].as_mut().unwrap().rehash = false;
                    self.insert_at_head(target, idx);
                }
                cursor = next;
            }
        }

        self.current_time = now;
        expired
    }

    /// Current wheel cursor, the second through which `sweep` last advanced.
    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    /// The slot an entry currently occupies — test/diagnostic hook. Holds
    /// `(expires - base) mod slot_count == slot_index(e)` unless `rehash`
    /// is set.
    pub fn slot_of(&self, id: TimerId) -> CoreResult<usize> {
        Ok(self.get(id.0)?.slot)
    }

    /// Whether an entry is currently flagged for lazy relocation.
    pub fn is_rehash_pending(&self, id: TimerId) -> CoreResult<bool> {
        Ok(self.get(id.0)?.rehash)
    }
}
