//! Draw call merging.
//!
//! A freshly recorded draw is compared against the last few commands of its scope. If a
//! draw with identical bindings is found and reordering cannot change what ends up on
//! screen, the two are fused into one command by moving vertices around in the arena.

use smallvec::SmallVec;

use crate::arena::{CommandArena, VertexArena};
use crate::command::{region_union, regions_overlap, DrawCommand, RenderCommand};

/// Budgets that bound the work a single merge attempt may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    /// How many live commands are inspected. Tombstones are not counted.
    pub search_depth: usize,
    /// Upper bound on the number of vertices moved by one merge.
    pub max_move_vertices: usize,
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self {
            search_depth: 8,
            max_move_vertices: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// The candidate was folded into the earlier command.
    Backward,
    /// The earlier command was moved up to the candidate and tombstoned.
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MergeRejection {
    #[error("no compatible draw within the search window")]
    NoMatch,
    #[error("merging would reorder overlapping draws")]
    Overlap,
    #[error("merge would move {required} vertices, limit is {limit}")]
    MoveBudget { required: usize, limit: usize },
    #[error("vertex arena cannot hold {required} more vertices")]
    VertexCapacity { required: usize },
    #[error("command arena is full")]
    CommandCapacity,
}

/// Tries to merge `candidate` into the commands recorded since `base_command`.
///
/// `candidate` must not be in the command arena yet and its vertices must be the last
/// ones allocated in `vertices`. On `Ok` the candidate has been fully absorbed and must not
/// be appended. On `Err` neither arena has been touched.
pub fn try_merge(
    vertices: &mut VertexArena,
    commands: &mut CommandArena,
    base_command: usize,
    limits: MergeLimits,
    candidate: &DrawCommand,
) -> Result<MergeKind, MergeRejection> {
    debug_assert_eq!(
        candidate.vertex_end() as usize,
        vertices.cursor(),
        "merge candidate must own the tail of the vertex arena"
    );

    let mut intermediates: SmallVec<[usize; 8]> = SmallVec::new();
    let mut prev_index = None;
    let mut budget = limits.search_depth;
    let mut depth = 1;

    while budget > 0 {
        let Some(index) = commands.peek_index(depth, base_command) else {
            break;
        };
        depth += 1;

        match &commands[index] {
            RenderCommand::None => continue,
            RenderCommand::Viewport(_) | RenderCommand::Scissor(_) => break,
            RenderCommand::Draw(draw) => {
                budget -= 1;
                if draw.is_compatible(candidate) {
                    prev_index = Some(index);
                    break;
                }
                intermediates.push(index);
            }
        }
    }

    let Some(prev_index) = prev_index else {
        return Err(MergeRejection::NoMatch);
    };
    let prev = *commands[prev_index]
        .as_draw()
        .ok_or(MergeRejection::NoMatch)?;

    let region_of = |index: usize| commands[index].as_draw().map(|draw| draw.region);
    let overlaps_next = intermediates
        .iter()
        .filter_map(|index| region_of(*index))
        .any(|region| regions_overlap(&candidate.region, &region));
    let overlaps_prev = regions_overlap(&candidate.region, &prev.region);

    if overlaps_next {
        if overlaps_prev {
            return Err(MergeRejection::Overlap);
        }
        // `prev` is about to jump over every intermediate.
        let prev_blocked = intermediates
            .iter()
            .filter_map(|index| region_of(*index))
            .any(|region| regions_overlap(&prev.region, &region));
        if prev_blocked {
            return Err(MergeRejection::Overlap);
        }
        merge_forward(vertices, commands, limits, prev_index, &prev, candidate)
    } else {
        merge_backward(vertices, commands, limits, prev_index, &intermediates, candidate)
    }
}

fn merge_backward(
    vertices: &mut VertexArena,
    commands: &mut CommandArena,
    limits: MergeLimits,
    prev_index: usize,
    intermediates: &[usize],
    candidate: &DrawCommand,
) -> Result<MergeKind, MergeRejection> {
    let Some(prev) = commands[prev_index].as_draw() else {
        return Err(MergeRejection::NoMatch);
    };
    let prev_end = prev.vertex_end() as usize;
    let candidate_start = candidate.vertex_index as usize;
    let candidate_end = candidate.vertex_end() as usize;
    let candidate_count = candidate.vertex_count;

    // Everything between the two ranges: intermediate vertices plus any left behind by
    // tombstoned commands.
    let shifted = candidate_start - prev_end;
    if shifted > limits.max_move_vertices {
        return Err(MergeRejection::MoveBudget {
            required: shifted,
            limit: limits.max_move_vertices,
        });
    }

    if shifted > 0 {
        vertices.live_mut()[prev_end..candidate_end].rotate_right(candidate_count as usize);
        for index in intermediates {
            if let Some(draw) = commands[*index].as_draw_mut() {
                draw.vertex_index += candidate_count;
            }
        }
    }

    if let Some(prev) = commands[prev_index].as_draw_mut() {
        prev.vertex_count += candidate_count;
        prev.region = region_union(&prev.region, &candidate.region);
    }

    tracing::trace!(
        command = prev_index,
        moved = shifted,
        vertices = candidate_count,
        "merged draw backward"
    );
    Ok(MergeKind::Backward)
}

fn merge_forward(
    vertices: &mut VertexArena,
    commands: &mut CommandArena,
    limits: MergeLimits,
    prev_index: usize,
    prev: &DrawCommand,
    candidate: &DrawCommand,
) -> Result<MergeKind, MergeRejection> {
    let prev_count = prev.vertex_count as usize;
    if prev_count > limits.max_move_vertices {
        return Err(MergeRejection::MoveBudget {
            required: prev_count,
            limit: limits.max_move_vertices,
        });
    }
    if vertices.remaining() < prev_count {
        return Err(MergeRejection::VertexCapacity {
            required: prev_count,
        });
    }
    if commands.remaining() == 0 {
        return Err(MergeRejection::CommandCapacity);
    }

    if vertices.alloc(prev_count).is_none() {
        return Err(MergeRejection::VertexCapacity {
            required: prev_count,
        });
    }

    let prev_start = prev.vertex_index as usize;
    let candidate_start = candidate.vertex_index as usize;
    let candidate_end = candidate.vertex_end() as usize;

    let live = vertices.live_mut();
    live.copy_within(candidate_start..candidate_end, candidate_start + prev_count);
    live.copy_within(prev_start..prev_start + prev_count, candidate_start);

    let merged = DrawCommand {
        region: region_union(&prev.region, &candidate.region),
        vertex_index: candidate.vertex_index,
        vertex_count: prev.vertex_count + candidate.vertex_count,
        ..*prev
    };

    match commands.alloc_one() {
        Some(slot) => *slot = RenderCommand::Draw(merged),
        None => {
            // Checked above; undo the vertex reservation to keep the arenas consistent.
            vertices.rewind(prev_count);
            return Err(MergeRejection::CommandCapacity);
        }
    }
    commands[prev_index] = RenderCommand::None;

    tracing::trace!(
        tombstoned = prev_index,
        moved = prev_count,
        "merged draw forward"
    );
    Ok(MergeKind::Forward)
}
