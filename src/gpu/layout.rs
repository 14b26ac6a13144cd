//! Binding layouts (root signatures).
//!
//! A layout is a list of root parameters. Descriptor tables of the
//! `Resource` and `Sampler` categories are what the binding caches manage;
//! inline constants and root descriptors are carried along and ignored.

use crate::fd_contract;
use crate::gpu::traits::Category;
use crate::util::bitset::ParamSet;

/// One root parameter of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootParameter {
    /// A table of `size` descriptors of one shader-visible category
    Table { category: Category, size: u32 },
    /// Inline 32-bit constants
    Constants { count: u32 },
    /// Inline root descriptor (buffer address)
    Descriptor,
}

/// The binding layout a pipeline was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingLayout {
    params: Vec<RootParameter>,
    resource_tables: ParamSet,
    sampler_tables: ParamSet,
}

impl BindingLayout {
    /// Maximum number of root parameters a layout may declare.
    pub const MAX_ROOT_PARAMETERS: usize = 16;

    /// Build a layout from its root parameters.
    pub fn new(params: Vec<RootParameter>) -> Self {
        fd_contract!(
            params.len() <= Self::MAX_ROOT_PARAMETERS,
            FD107,
            "{} root parameters declared",
            params.len()
        );

        let mut resource_tables = ParamSet::new();
        let mut sampler_tables = ParamSet::new();
        for (index, param) in params.iter().enumerate() {
            if let RootParameter::Table { category, size } = *param {
                fd_contract!(size > 0, FD107, "table {} has no slots", index);
                match category {
                    Category::Resource => resource_tables.insert(index),
                    Category::Sampler => sampler_tables.insert(index),
                    other => fd_contract!(
                        false,
                        FD107,
                        "table {} uses host-only category {}",
                        index,
                        other
                    ),
                }
            }
        }

        Self {
            params,
            resource_tables,
            sampler_tables,
        }
    }

    /// Start building a layout.
    pub fn builder() -> BindingLayoutBuilder {
        BindingLayoutBuilder::default()
    }

    /// Root parameters in declaration order.
    pub fn parameters(&self) -> &[RootParameter] {
        &self.params
    }

    /// Which root parameters are descriptor tables of `category`.
    pub fn table_bitmap(&self, category: Category) -> ParamSet {
        match category {
            Category::Resource => self.resource_tables,
            Category::Sampler => self.sampler_tables,
            Category::RenderTarget | Category::DepthStencil => ParamSet::new(),
        }
    }

    /// Slot count of the table at `index`, zero for non-table parameters.
    pub fn table_size(&self, index: usize) -> u32 {
        match self.params.get(index) {
            Some(RootParameter::Table { size, .. }) => *size,
            _ => 0,
        }
    }
}

/// Builder for [`BindingLayout`].
#[derive(Debug, Default)]
pub struct BindingLayoutBuilder {
    params: Vec<RootParameter>,
}

impl BindingLayoutBuilder {
    /// Append a descriptor table.
    pub fn table(mut self, category: Category, size: u32) -> Self {
        self.params.push(RootParameter::Table { category, size });
        self
    }

    /// Append inline constants.
    pub fn constants(mut self, count: u32) -> Self {
        self.params.push(RootParameter::Constants { count });
        self
    }

    /// Append an inline root descriptor.
    pub fn root_descriptor(mut self) -> Self {
        self.params.push(RootParameter::Descriptor);
        self
    }

    /// Finish the layout.
    pub fn build(self) -> BindingLayout {
        BindingLayout::new(self.params)
    }
}
