//! Binding cache: staged descriptor tables for one consumer and category.
//!
//! Handles are staged into a host-side shadow buffer as the renderer sets
//! them. Nothing touches the device until `flush`, which copies only the
//! assigned slots of stale tables into a transient segment and rebinds
//! those tables.

use crate::allocators::handle::{CpuAddress, DescriptorHandle};
use crate::gpu::layout::BindingLayout;
use crate::gpu::traits::{Category, Consumer, CopyRange, DescriptorDevice, TableBinder};
use crate::util::bitset::{ParamSet, SlotSet};
use crate::{fd_contract, fd_trace};

/// Where one table lives in the shadow buffer.
#[derive(Debug, Clone, Copy, Default)]
struct TableEntry {
    start: usize,
    size: u32,
    /// Slots staged since the last clear, relative to the table
    assigned: SlotSet,
}

/// Shadow copy of the descriptor tables of one `(Consumer, Category)`.
#[derive(Debug)]
pub struct BindingCache {
    consumer: Consumer,
    category: Category,
    shadow: Vec<CpuAddress>,
    tables: ParamSet,
    stale: ParamSet,
    entries: [TableEntry; BindingLayout::MAX_ROOT_PARAMETERS],
    max_cached_slots: u32,
}

impl BindingCache {
    /// Create a cache with room for `capacity` staged handles.
    pub fn new(consumer: Consumer, category: Category, capacity: u32) -> Self {
        Self {
            consumer,
            category,
            shadow: vec![CpuAddress(0); capacity as usize],
            tables: ParamSet::new(),
            stale: ParamSet::new(),
            entries: [TableEntry::default(); BindingLayout::MAX_ROOT_PARAMETERS],
            max_cached_slots: 0,
        }
    }

    /// Consumer whose tables this cache binds.
    pub fn consumer(&self) -> Consumer {
        self.consumer
    }

    /// Category of every staged handle.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Lay the tables of `layout` out in the shadow buffer. Forgets everything
    /// staged so far.
    pub fn bind_layout(&mut self, layout: &BindingLayout) {
        self.stale.clear();
        self.entries = [TableEntry::default(); BindingLayout::MAX_ROOT_PARAMETERS];
        self.tables = layout.table_bitmap(self.category);

        let mut offset = 0usize;
        for index in self.tables.iter() {
            let size = layout.table_size(index);
            self.entries[index] = TableEntry {
                start: offset,
                size,
                assigned: SlotSet::new(),
            };
            offset += size as usize;
        }

        self.max_cached_slots = offset as u32;
        fd_contract!(
            offset <= self.shadow.len(),
            FD102,
            "{} {} slots declared, shadow cache holds {}",
            offset,
            self.category,
            self.shadow.len()
        );
    }

    /// Stage `handles` into `table` starting at `offset` and mark the table
    /// stale.
    pub fn stage(&mut self, table: usize, offset: u32, handles: &[DescriptorHandle]) {
        if handles.is_empty() {
            return;
        }

        fd_contract!(
            self.tables.contains(table),
            FD103,
            "parameter {} for {} {:?}",
            table,
            self.category,
            self.consumer
        );
        let entry = &mut self.entries[table];
        let offset = offset as usize;
        fd_contract!(
            offset + handles.len() <= entry.size as usize,
            FD104,
            "{} handles at offset {} of table {} (size {})",
            handles.len(),
            offset,
            table,
            entry.size
        );

        let base = entry.start + offset;
        for (slot, handle) in self.shadow[base..base + handles.len()].iter_mut().zip(handles) {
            fd_contract!(handle.cpu().is_some(), FD108, "staged into table {}", table);
            *slot = handle.cpu().unwrap_or(CpuAddress(0));
        }

        entry.assigned.insert_range(offset, handles.len());
        self.stale.insert(table);
    }

    /// Slots a flush would need right now: for every stale table, its highest
    /// assigned slot plus one.
    pub fn compute_needed_size(&self) -> u32 {
        self.stale
            .iter()
            .map(|table| match self.entries[table].assigned.highest_set() {
                Some(highest) => highest as u32 + 1,
                None => {
                    fd_contract!(false, FD901, "table {}", table);
                    0
                }
            })
            .sum()
    }

    /// Copy every stale table into the segment starting at `destination`,
    /// bind it, and clear the stale set.
    ///
    /// `destination` must have room for `compute_needed_size()` slots.
    pub fn flush(
        &mut self,
        destination: DescriptorHandle,
        device: &dyn DescriptorDevice,
        binder: &mut dyn TableBinder,
        max_ranges: usize,
    ) {
        let stride = device.descriptor_stride(self.category);
        let mut batch = CopyBatch::new(self.category, stride, max_ranges);
        let mut dest = destination;

        let stale = std::mem::take(&mut self.stale);
        for table in stale.iter() {
            let entry = self.entries[table];
            let Some(highest) = entry.assigned.highest_set() else {
                fd_contract!(false, FD901, "table {}", table);
                continue;
            };
            let (Some(dest_cpu), Some(dest_gpu)) = (dest.cpu(), dest.gpu()) else {
                fd_contract!(false, FD902, "flush destination {:?} is not shader-visible", dest);
                return;
            };

            binder.set_descriptor_table(self.consumer, table as u32, dest_gpu);

            for (start, len) in entry.assigned.runs() {
                let sources = &self.shadow[entry.start + start..entry.start + start + len];
                let run_dest = dest_cpu + start as u64 * u64::from(stride);
                batch.push_run(device, run_dest, sources);
            }

            dest = dest.offset(highest as u32 + 1, stride);
        }

        batch.submit(device);
        fd_trace!(
            "{:?} {} flush: {} tables, {} copy calls",
            self.consumer,
            self.category,
            stale.count(),
            batch.calls()
        );
    }

    /// Mark stale every table holding assigned handles, so the next flush
    /// rewrites them into a fresh segment.
    pub fn unbind_all_assigned(&mut self) {
        self.stale.clear();
        for table in self.tables.iter() {
            if !self.entries[table].assigned.is_empty() {
                self.stale.insert(table);
            }
        }
    }

    /// Forget all staged state.
    pub fn clear(&mut self) {
        self.stale.clear();
        for entry in &mut self.entries {
            entry.assigned.clear();
        }
    }

    /// Whether the bound layout has a table of this category at `table`.
    pub fn has_table(&self, table: usize) -> bool {
        self.tables.contains(table)
    }

    /// Whether `table` will be rewritten by the next flush.
    pub fn is_stale(&self, table: usize) -> bool {
        self.stale.contains(table)
    }

    /// Tables the next flush will rewrite.
    pub fn stale_tables(&self) -> ParamSet {
        self.stale
    }

    /// Slots of `table` staged since the last clear.
    pub fn assigned_slots(&self, table: usize) -> SlotSet {
        self.entries
            .get(table)
            .map(|entry| entry.assigned)
            .unwrap_or_default()
    }

    /// Total slots of the bound layout's tables.
    pub fn max_cached_slots(&self) -> u32 {
        self.max_cached_slots
    }

    /// Host address staged at `offset` of `table`, if any.
    pub fn staged_handle(&self, table: usize, offset: u32) -> Option<CpuAddress> {
        let entry = self.entries.get(table)?;
        entry
            .assigned
            .contains(offset as usize)
            .then(|| self.shadow[entry.start + offset as usize])
    }
}

/// Gathers destination and source ranges and issues them as few batched
/// copies as the range limit allows.
///
/// Source handles that sit next to each other in host memory share one
/// source range. A source range never crosses a destination range, so every
/// destination range is covered by one or more whole source ranges.
#[derive(Debug)]
pub struct CopyBatch {
    category: Category,
    stride: u32,
    limit: usize,
    dest: Vec<CopyRange>,
    src: Vec<CopyRange>,
    /// Whether the next slot may extend the last destination range
    dest_open: bool,
    calls: usize,
}

impl CopyBatch {
    /// Create an empty batch holding at most `limit` source ranges.
    pub fn new(category: Category, stride: u32, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            category,
            stride,
            limit,
            dest: Vec::with_capacity(limit),
            src: Vec::with_capacity(limit),
            dest_open: false,
            calls: 0,
        }
    }

    /// Append one run: `sources.len()` consecutive destination slots starting
    /// at `dest_start`, filled from `sources` in order.
    pub fn push_run(&mut self, device: &dyn DescriptorDevice, dest_start: CpuAddress, sources: &[CpuAddress]) {
        self.dest_open = false;
        let stride = u64::from(self.stride);

        for (i, &source) in sources.iter().enumerate() {
            let extends_src = self.dest_open
                && self
                    .src
                    .last()
                    .map_or(false, |range| range.end(self.stride) == source);

            if !extends_src && self.src.len() == self.limit {
                self.submit(device);
            }

            match self.dest.last_mut() {
                Some(range) if self.dest_open => range.count += 1,
                _ => {
                    self.dest.push(CopyRange::new(dest_start + i as u64 * stride, 1));
                    self.dest_open = true;
                }
            }

            match self.src.last_mut() {
                Some(range) if extends_src => range.count += 1,
                _ => self.src.push(CopyRange::new(source, 1)),
            }
        }
    }

    /// Issue everything gathered so far as one copy. Does nothing when empty.
    pub fn submit(&mut self, device: &dyn DescriptorDevice) {
        if self.src.is_empty() {
            return;
        }
        device.copy_descriptors(&self.dest, &self.src, self.category);
        self.dest.clear();
        self.src.clear();
        self.dest_open = false;
        self.calls += 1;
    }

    /// Copy calls issued by this batch.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Whether nothing is waiting to be submitted.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::dummy::{DummyBinder, DummyDevice};
    use crate::gpu::traits::RawHeap;

    const STRIDE: u64 = 32;

    struct Fixture {
        device: DummyDevice,
        source: RawHeap,
        segment: RawHeap,
    }

    impl Fixture {
        fn new() -> Self {
            let device = DummyDevice::new();
            let source = device.create_heap(Category::Resource, 64, false).unwrap();
            let segment = device.create_heap(Category::Resource, 64, true).unwrap();
            for slot in 0..64u32 {
                device.write_descriptor(source.cpu_base + u64::from(slot) * STRIDE, 100 + u64::from(slot));
            }
            device.clear_calls();
            Self { device, source, segment }
        }

        /// Host handles to `count` consecutive source slots from `first`.
        fn handles(&self, first: u32, count: u32) -> Vec<DescriptorHandle> {
            (first..first + count).map(|slot| self.source.handle_at(slot)).collect()
        }
    }

    fn cache_with_tables(sizes: &[u32]) -> BindingCache {
        let mut builder = BindingLayout::builder();
        for &size in sizes {
            builder = builder.table(Category::Resource, size);
        }
        let mut cache = BindingCache::new(Consumer::Graphics, Category::Resource, 256);
        cache.bind_layout(&builder.build());
        cache
    }

    #[test]
    fn test_layout_assigns_disjoint_ranges() {
        let layout = BindingLayout::builder()
            .table(Category::Resource, 4)
            .table(Category::Sampler, 2)
            .constants(1)
            .table(Category::Resource, 8)
            .build();
        let mut cache = BindingCache::new(Consumer::Compute, Category::Resource, 256);
        cache.bind_layout(&layout);

        assert_eq!(cache.max_cached_slots(), 12);
        assert_eq!(cache.entries[0].start, 0);
        assert_eq!(cache.entries[3].start, 4);
        assert!(cache.stale_tables().is_empty());
    }

    #[test]
    #[should_panic(expected = "FD102")]
    fn test_layout_larger_than_shadow_rejected() {
        let layout = BindingLayout::builder().table(Category::Resource, 64).build();
        let mut cache = BindingCache::new(Consumer::Graphics, Category::Resource, 32);
        cache.bind_layout(&layout);
    }

    #[test]
    #[should_panic(expected = "FD103")]
    fn test_stage_into_non_table_rejected() {
        let fixture = Fixture::new();
        let layout = BindingLayout::builder()
            .constants(4)
            .table(Category::Resource, 4)
            .build();
        let mut cache = BindingCache::new(Consumer::Graphics, Category::Resource, 256);
        cache.bind_layout(&layout);
        cache.stage(0, 0, &fixture.handles(0, 1));
    }

    #[test]
    #[should_panic(expected = "FD104")]
    fn test_stage_past_table_end_rejected() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[4]);
        cache.stage(0, 3, &fixture.handles(0, 2));
    }

    #[test]
    fn test_empty_stage_is_noop() {
        let mut cache = cache_with_tables(&[4]);
        cache.stage(0, 0, &[]);
        assert!(!cache.is_stale(0));
        assert_eq!(cache.compute_needed_size(), 0);
    }

    #[test]
    fn test_needed_size_uses_highest_assigned() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[16, 4]);

        cache.stage(0, 2, &fixture.handles(0, 1));
        assert_eq!(cache.compute_needed_size(), 3);

        cache.stage(0, 10, &fixture.handles(1, 1));
        assert_eq!(cache.compute_needed_size(), 11);

        cache.stage(1, 0, &fixture.handles(2, 2));
        assert_eq!(cache.compute_needed_size(), 13);
        assert_eq!(cache.staged_handle(0, 10), fixture.source.handle_at(1).cpu());
        assert_eq!(cache.staged_handle(0, 3), None);
    }

    #[test]
    fn test_flush_compacts_runs() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[16]);
        let mut binder = DummyBinder::new();

        cache.stage(0, 1, &fixture.handles(1, 3));
        cache.stage(0, 5, &fixture.handles(5, 1));
        cache.stage(0, 8, &fixture.handles(8, 3));
        assert_eq!(cache.compute_needed_size(), 11);

        let dest = fixture.segment.handle_at(0);
        cache.flush(dest, &fixture.device, &mut binder, 16);

        let copies = fixture.device.copy_calls();
        assert_eq!(copies.len(), 1);
        let (dest_ranges, src_ranges) = &copies[0];
        let sizes: Vec<u32> = dest_ranges.iter().map(|r| r.count).collect();
        assert_eq!(sizes, vec![3, 1, 3]);
        // Sources were allocated back to back, so each run is one source range
        // at the same offset as its destination
        let relative = |ranges: &[CopyRange], base: CpuAddress| -> Vec<(u64, u32)> {
            ranges.iter().map(|r| ((r.start.0 - base.0) / STRIDE, r.count)).collect()
        };
        assert_eq!(relative(dest_ranges, fixture.segment.cpu_base), vec![(1, 3), (5, 1), (8, 3)]);
        assert_eq!(relative(src_ranges, fixture.source.cpu_base), vec![(1, 3), (5, 1), (8, 3)]);

        // Strictly increasing, no overlap
        for pair in dest_ranges.windows(2) {
            assert!(pair[0].end(32) < pair[1].start);
        }

        let gpu = fixture.segment.gpu_base.unwrap();
        assert_eq!(fixture.device.read_visible(gpu + STRIDE), Some(101));
        assert_eq!(fixture.device.read_visible(gpu + 10 * STRIDE), Some(110));
        assert_eq!(fixture.device.read_visible(gpu + 4 * STRIDE), None);

        assert_eq!(binder.tables(), vec![(Consumer::Graphics, 0, gpu)]);
        assert_eq!(cache.compute_needed_size(), 0);
        assert_eq!(cache.assigned_slots(0).count(), 7);
    }

    #[test]
    fn test_scattered_sources_get_one_range_each() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[4]);
        let mut binder = DummyBinder::new();

        let scattered: Vec<_> = [9, 3, 40, 41].iter().map(|&s| fixture.source.handle_at(s)).collect();
        cache.stage(0, 0, &scattered);
        cache.flush(fixture.segment.handle_at(0), &fixture.device, &mut binder, 16);

        let copies = fixture.device.copy_calls();
        let (dest_ranges, src_ranges) = &copies[0];
        assert_eq!(dest_ranges.len(), 1);
        assert_eq!(dest_ranges[0].count, 4);
        let src_sizes: Vec<u32> = src_ranges.iter().map(|r| r.count).collect();
        assert_eq!(src_sizes, vec![1, 1, 2]);
    }

    #[test]
    fn test_batches_split_at_range_limit() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[16]);
        let mut binder = DummyBinder::new();

        // Every other source slot: no two handles coalesce
        let handles: Vec<_> = (0..10).map(|i| fixture.source.handle_at(i * 2)).collect();
        cache.stage(0, 0, &handles);
        cache.flush(fixture.segment.handle_at(0), &fixture.device, &mut binder, 4);

        let copies = fixture.device.copy_calls();
        let per_call: Vec<usize> = copies.iter().map(|(_, src)| src.len()).collect();
        assert_eq!(per_call, vec![4, 4, 2]);
        for (dest, src) in &copies {
            let dest_slots: u32 = dest.iter().map(|r| r.count).sum();
            let src_slots: u32 = src.iter().map(|r| r.count).sum();
            assert_eq!(dest_slots, src_slots);
            assert!(dest.len() <= src.len());
        }

        let gpu = fixture.segment.gpu_base.unwrap();
        assert_eq!(fixture.device.read_visible(gpu + 9 * STRIDE), Some(118));
    }

    #[test]
    fn test_tables_packed_back_to_back() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[8, 8]);
        let mut binder = DummyBinder::new();

        cache.stage(0, 0, &fixture.handles(0, 2));
        cache.stage(1, 1, &fixture.handles(2, 1));
        assert_eq!(cache.compute_needed_size(), 4);

        cache.flush(fixture.segment.handle_at(0), &fixture.device, &mut binder, 16);

        let gpu = fixture.segment.gpu_base.unwrap();
        assert_eq!(
            binder.tables(),
            vec![(Consumer::Graphics, 0, gpu), (Consumer::Graphics, 1, gpu + 2 * STRIDE)]
        );
        assert_eq!(fixture.device.read_visible(gpu + 3 * STRIDE), Some(102));
    }

    #[test]
    fn test_unbind_restales_assigned_tables() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[4, 4, 4]);
        let mut binder = DummyBinder::new();

        cache.stage(0, 0, &fixture.handles(0, 1));
        cache.stage(2, 3, &fixture.handles(1, 1));
        cache.flush(fixture.segment.handle_at(0), &fixture.device, &mut binder, 16);
        assert!(cache.stale_tables().is_empty());

        cache.unbind_all_assigned();
        assert!(cache.is_stale(0));
        assert!(!cache.is_stale(1));
        assert!(cache.is_stale(2));
        assert_eq!(cache.compute_needed_size(), 5);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[4]);
        cache.stage(0, 0, &fixture.handles(0, 4));

        cache.clear();
        let once = (cache.stale_tables(), cache.assigned_slots(0));
        cache.clear();

        assert_eq!((cache.stale_tables(), cache.assigned_slots(0)), once);
        assert!(once.0.is_empty());
        assert!(once.1.is_empty());
        assert_eq!(cache.compute_needed_size(), 0);
    }

    #[test]
    fn test_empty_flush_issues_no_copy() {
        let fixture = Fixture::new();
        let mut cache = cache_with_tables(&[4]);
        let mut binder = DummyBinder::new();

        cache.flush(fixture.segment.handle_at(0), &fixture.device, &mut binder, 16);
        assert!(fixture.device.copy_calls().is_empty());
        assert!(binder.calls.is_empty());
    }
}
