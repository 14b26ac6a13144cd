//! Allocation statistics.

use crate::gpu::traits::Category;

/// Persistent allocation statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentStats {
    /// Heaps created since startup.
    pub heaps_created: u64,

    /// Heaps currently owned by the pool.
    pub heaps_owned: usize,

    /// Slots handed out since startup, every category.
    pub slots_allocated: u64,
}

/// Statistics of one transient pool lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientLaneStats {
    /// Category served by the lane.
    pub category: Category,

    /// Segments created since startup.
    pub heaps_created: u64,

    /// Requests answered with a reclaimed segment.
    pub heaps_reused: u64,

    /// Segments handed back by contexts since startup.
    pub segments_discarded: u64,

    /// Segments currently owned by the lane.
    pub heaps_owned: usize,

    /// Segments ready to be handed out.
    pub available: usize,

    /// Segments waiting for their completion value.
    pub retired: usize,
}

impl TransientLaneStats {
    /// Segments currently in use by contexts.
    pub fn active(&self) -> usize {
        self.heaps_owned.saturating_sub(self.available + self.retired)
    }

    /// Fraction of requests served without creating a segment.
    pub fn reuse_ratio(&self) -> f64 {
        let requests = self.heaps_created + self.heaps_reused;
        if requests == 0 {
            return 0.0;
        }
        self.heaps_reused as f64 / requests as f64
    }
}

/// Aggregated descriptor system statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub persistent: PersistentStats,

    /// Resource lane of the transient pool.
    pub transient_resource: TransientLaneStats,

    /// Sampler lane of the transient pool.
    pub transient_sampler: TransientLaneStats,

    /// Distinct samplers created through the sampler cache.
    pub samplers: usize,

    /// Highest completion value the device has reached.
    pub completed_value: u64,
}

impl std::fmt::Display for SystemStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Descriptor Statistics:")?;
        writeln!(f, "  Persistent heaps:  {}", self.persistent.heaps_owned)?;
        writeln!(f, "  Persistent slots:  {}", self.persistent.slots_allocated)?;
        for lane in [&self.transient_resource, &self.transient_sampler] {
            writeln!(
                f,
                "  {} segments: {} owned, {} active, {} available, {} retired ({:.1}% reused)",
                lane.category,
                lane.heaps_owned,
                lane.active(),
                lane.available,
                lane.retired,
                lane.reuse_ratio() * 100.0
            )?;
        }
        writeln!(f, "  Samplers:          {}", self.samplers)?;
        writeln!(f, "  Completed value:   {}", self.completed_value)?;
        Ok(())
    }
}
