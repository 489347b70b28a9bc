use crate::error::RenderError;
use crate::merge::MergeLimits;

/// Capacities and budgets of a [`Renderer`](crate::Renderer).
///
/// Arenas are allocated once from these numbers and never grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererConfig {
    pub max_vertices: usize,
    pub max_commands: usize,
    /// Largest number of vertices a single merge may move.
    pub max_move_vertices: usize,
    /// Number of live commands inspected when looking for a merge partner.
    pub merge_search_depth: usize,
    pub max_stack_depth: usize,
    /// Live uniform blocks per frame. 0 picks the slot pool default.
    pub uniform_slots: u16,
    /// Initial size of the uniform byte store. It grows on demand.
    pub uniform_buffer_size: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_vertices: 65536,
            max_commands: 16384,
            max_move_vertices: 512,
            merge_search_depth: 8,
            max_stack_depth: 64,
            uniform_slots: 256,
            uniform_buffer_size: 4096,
        }
    }
}

impl RendererConfig {
    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }

    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.max_commands = max_commands;
        self
    }

    pub fn with_max_move_vertices(mut self, max_move_vertices: usize) -> Self {
        self.max_move_vertices = max_move_vertices;
        self
    }

    /// A depth of 0 turns merging off.
    pub fn with_merge_search_depth(mut self, depth: usize) -> Self {
        self.merge_search_depth = depth;
        self
    }

    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn with_uniform_slots(mut self, slots: u16) -> Self {
        self.uniform_slots = slots;
        self
    }

    pub fn with_uniform_buffer_size(mut self, bytes: usize) -> Self {
        self.uniform_buffer_size = bytes;
        self
    }

    pub fn merge_limits(&self) -> MergeLimits {
        MergeLimits {
            search_depth: self.merge_search_depth,
            max_move_vertices: self.max_move_vertices,
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.max_vertices == 0 || self.max_vertices > u32::MAX as usize {
            return Err(RenderError::InvalidConfig(format!(
                "max_vertices must be in 1..={}, got {}",
                u32::MAX,
                self.max_vertices
            )));
        }
        if self.max_commands == 0 {
            return Err(RenderError::InvalidConfig(
                "max_commands must be positive".to_string(),
            ));
        }
        if self.max_stack_depth == 0 {
            return Err(RenderError::InvalidConfig(
                "max_stack_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
