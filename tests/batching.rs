//! End-to-end batching behaviour, observed through the calls a `RecordingBackend` receives.

use batch2d::lyon::math::point;
use batch2d::{
    BackendCall, Bindings, Color, DrawMode, Drawable, IRect, ImageId, Mat4, PrimitiveType,
    RecordingBackend, RenderBackend, Renderer, RendererConfig, SamplerId, TextureBinding, Vertex,
    View, MAX_TEXTURE_SLOTS,
};

fn renderer_with(backend: RecordingBackend, config: RendererConfig) -> Renderer<RecordingBackend> {
    let mut renderer = Renderer::new(backend, config).unwrap();
    renderer.begin_frame((100, 100));
    renderer
}

fn renderer() -> Renderer<RecordingBackend> {
    renderer_with(RecordingBackend::new(), RendererConfig::default())
}

fn quad(x: f32, y: f32) -> Drawable {
    Drawable::rect(DrawMode::Fill, x, y, 10.0, 10.0, Color::WHITE)
}

fn outline(x: f32, y: f32, size: f32) -> Drawable {
    Drawable::rect(DrawMode::Lines, x, y, size, size, Color::BLACK)
}

fn line_strip(x: f32, y: f32) -> Drawable {
    Drawable::with_vertices(
        PrimitiveType::LineStrip,
        vec![
            Vertex::at(x, y, [0.0, 0.0], Color::WHITE),
            Vertex::at(x + 10.0, y, [1.0, 0.0], Color::WHITE),
            Vertex::at(x + 10.0, y + 10.0, [1.0, 1.0], Color::WHITE),
        ],
    )
}

fn draw_all(renderer: &mut Renderer<RecordingBackend>, drawables: &[Drawable]) {
    for drawable in drawables {
        renderer.draw(drawable, &Mat4::identity());
    }
}

#[test]
fn three_disjoint_quads_flush_as_one_draw() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(&mut renderer, &[quad(0.0, 0.0), quad(20.0, 20.0), quad(40.0, 40.0)]);
    renderer.end();
    renderer.end_frame();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 18)]);
    let stats = renderer.last_frame_stats();
    assert_eq!(stats.draws_recorded, 3);
    assert_eq!(stats.merges(), 2);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices_uploaded, 18);
}

#[test]
fn line_strips_are_never_merged() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(&mut renderer, &[line_strip(0.0, 0.0), line_strip(50.0, 50.0)]);
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 3), (3, 3)]);
    assert_eq!(renderer.stats().merges(), 0);
}

#[test]
fn strip_pipeline_override_keeps_draws_apart() {
    let mut renderer = renderer();
    let strip_pipeline = renderer.backend().pipeline_for(PrimitiveType::LineStrip);

    renderer.begin(&View::default());
    renderer.set_pipeline(Some(strip_pipeline));
    draw_all(&mut renderer, &[line_strip(0.0, 0.0), outline(50.0, 50.0, 10.0)]);
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 3), (3, 8)]);
    assert_eq!(renderer.stats().merges(), 0);
}

#[test]
fn lost_uniform_drops_draws_instead_of_reusing_the_old_block() {
    let mut renderer = renderer_with(
        RecordingBackend::new(),
        RendererConfig::default().with_uniform_slots(1),
    );
    renderer.begin(&View::default());
    renderer.set_uniform(0, &[1; 4]);
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.set_uniform(0, &[2; 4]);
    renderer.draw(&quad(50.0, 50.0), &Mat4::identity());
    renderer.end();
    renderer.end_frame();

    let uniforms: Vec<_> = renderer
        .backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            BackendCall::Uniforms { data, .. } => Some(data.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uniforms, vec![vec![1; 4]]);
    assert_eq!(renderer.backend().draw_calls(), vec![(0, 6)]);
    assert_eq!(renderer.last_frame_stats().draws_dropped, 1);
}

#[test]
fn overlapping_draws_keep_their_order() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(
        &mut renderer,
        &[quad(0.0, 0.0), outline(5.0, 5.0, 10.0), quad(2.0, 2.0)],
    );
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 6), (6, 8), (14, 6)]);
    assert_eq!(renderer.stats().merges(), 0);
}

#[test]
fn disjoint_draw_moves_back_past_other_state() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(
        &mut renderer,
        &[quad(0.0, 0.0), outline(50.0, 50.0, 10.0), quad(80.0, 0.0)],
    );
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 12), (12, 8)]);
    assert_eq!(renderer.stats().merged_backward, 1);

    // The third quad now follows the first, the outline comes after both.
    let uploaded = renderer.backend().uploaded_vertices();
    assert!((uploaded[6].position[0] - 0.6).abs() < 1e-5);
    assert!(uploaded[12].position[0].abs() < 1e-5);
}

#[test]
fn overlapping_draw_pulls_earlier_one_forward() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(
        &mut renderer,
        &[quad(0.0, 0.0), outline(40.0, 40.0, 20.0), quad(50.0, 50.0)],
    );
    assert_eq!(renderer.pending_commands().len(), 3);
    assert!(renderer.pending_commands()[0].is_tombstone());
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(6, 8), (14, 12)]);
    assert_eq!(renderer.stats().merged_forward, 1);
    assert_eq!(renderer.last_flush().skipped, 1);

    let uploaded = renderer.backend().uploaded_vertices();
    assert!((uploaded[14].position[0] + 1.0).abs() < 1e-5);
    assert!(uploaded[20].position[0].abs() < 1e-5);
}

#[test]
fn nested_scopes_do_not_merge_across_the_boundary() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());

    renderer.begin(&View::default());
    renderer.draw(&quad(50.0, 50.0), &Mat4::identity());
    renderer.end();

    renderer.draw(&quad(80.0, 80.0), &Mat4::identity());
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 6), (0, 12)]);
    let offsets: Vec<_> = renderer
        .backend()
        .calls()
        .iter()
        .filter_map(|call| match call {
            BackendCall::Bindings(bindings) => Some(bindings.vertex_buffer_offset),
            _ => None,
        })
        .collect();
    let vertex_size = std::mem::size_of::<Vertex>() as u64;
    assert_eq!(offsets, vec![0, 6 * vertex_size]);
}

#[test]
fn control_commands_replay_in_order() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    renderer.apply_viewport(10, 10, 50, 50);
    renderer.apply_viewport(10, 10, 50, 50);
    renderer.apply_scissor(0, 0, 20, 20);
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.apply_scissor(0, 0, -1, -1);
    renderer.end();

    let triangles = renderer.backend().pipeline_for(PrimitiveType::Triangles);
    assert_eq!(
        renderer.backend().calls(),
        &[
            BackendCall::BeginPass {
                target: None,
                framebuffer_size: (100, 100)
            },
            BackendCall::Viewport(IRect::new(10, 10, 50, 50)),
            BackendCall::Scissor(IRect::new(10, 10, 20, 20)),
            BackendCall::Pipeline(triangles),
            BackendCall::Bindings(Bindings {
                vertex_buffer_offset: 0,
                textures: [TextureBinding::NONE; MAX_TEXTURE_SLOTS],
            }),
            BackendCall::Draw {
                first_vertex: 0,
                vertex_count: 6,
                instances: 1
            },
            BackendCall::Scissor(IRect::new(0, 0, 100, 100)),
            BackendCall::EndPass,
        ]
    );
}

#[test]
fn control_command_blocks_merging_across_it() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.apply_scissor(0, 0, 50, 50);
    renderer.draw(&quad(20.0, 20.0), &Mat4::identity());
    renderer.end();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 6), (6, 6)]);
}

#[test]
fn texture_changes_rebind_without_switching_pipelines() {
    let first = TextureBinding::new(ImageId(1), SamplerId(1));
    let second = TextureBinding::new(ImageId(2), SamplerId(1));

    let mut renderer = renderer();
    renderer.begin(&View::default());
    draw_all(
        &mut renderer,
        &[
            quad(0.0, 0.0).with_texture(0, first),
            quad(2.0, 2.0).with_texture(0, second),
            quad(4.0, 4.0).with_texture(0, first),
        ],
    );
    renderer.end();

    let flush = renderer.last_flush();
    assert_eq!(flush.draw_calls, 3);
    assert_eq!(flush.pipeline_switches, 1);
    assert_eq!(flush.bindings_applied, 3);
}

#[test]
fn backend_overflow_drops_one_flush_only() {
    let mut renderer = renderer_with(
        RecordingBackend::new().with_vertex_capacity(10),
        RendererConfig::default(),
    );

    renderer.begin(&View::default());
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.end();
    renderer.begin(&View::default());
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.end();
    renderer.end_frame();

    assert_eq!(renderer.last_frame_stats().failed_uploads, 1);
    assert_eq!(renderer.last_frame_stats().draw_calls, 1);

    // The next frame starts with an empty vertex buffer.
    renderer.begin_frame((100, 100));
    renderer.begin(&View::default());
    renderer.draw(&quad(0.0, 0.0), &Mat4::identity());
    renderer.end();
    renderer.end_frame();
    assert_eq!(renderer.last_frame_stats().failed_uploads, 0);
    assert_eq!(renderer.backend().draw_calls().len(), 2);
}

#[test]
fn command_arena_overflow_drops_draws() {
    let mut renderer = renderer_with(
        RecordingBackend::new(),
        RendererConfig::default().with_max_commands(2),
    );
    renderer.begin(&View::default());
    draw_all(
        &mut renderer,
        &[line_strip(0.0, 0.0), line_strip(20.0, 0.0), line_strip(40.0, 0.0)],
    );
    renderer.end();

    assert_eq!(renderer.stats().draws_dropped, 1);
    assert_eq!(renderer.backend().draw_calls(), vec![(0, 3), (3, 3)]);
}

#[test]
fn uniform_blocks_reach_the_backend() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    renderer.set_uniform(0, &[1, 2, 3, 4]);
    draw_all(&mut renderer, &[quad(0.0, 0.0), quad(50.0, 50.0)]);
    renderer.end();
    renderer.end_frame();

    assert_eq!(renderer.backend().draw_calls(), vec![(0, 12)]);
    assert!(renderer.backend().calls().contains(&BackendCall::Uniforms {
        slot: 0,
        data: vec![1, 2, 3, 4]
    }));
}

#[test]
fn view_zooms_around_its_center() {
    let mut renderer = renderer();
    renderer.begin(&View::new(point(50.0, 50.0), 0.0, 2.0));
    renderer.draw(&quad(50.0, 50.0), &Mat4::identity());

    let first = renderer.pending_vertices()[0].position;
    assert!(first[0].abs() < 1e-5);
    assert!(first[1].abs() < 1e-5);

    // 60 px lands at 70 px once zoomed.
    let draw = *renderer.pending_commands()[0].as_draw().unwrap();
    assert!((draw.region.max.x - 0.4).abs() < 1e-5);
    assert!((draw.region.min.y + 0.4).abs() < 1e-5);
    renderer.end();
}

#[test]
#[should_panic(expected = "end() called without a matching begin()")]
fn unmatched_end_is_fatal() {
    let mut renderer = renderer();
    renderer.begin(&View::default());
    renderer.end();
    renderer.end();
}

#[test]
#[should_panic(expected = "state stack overflow")]
fn scope_overflow_is_fatal() {
    let mut renderer = renderer_with(
        RecordingBackend::new(),
        RendererConfig::default().with_max_stack_depth(2),
    );
    renderer.begin(&View::default());
    renderer.begin(&View::default());
    renderer.begin(&View::default());
}

#[test]
#[should_panic(expected = "flush called outside of a begin()/end() scope")]
fn flush_outside_scope_is_fatal() {
    let mut renderer = renderer();
    renderer.flush();
}
