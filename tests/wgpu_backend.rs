//! Pixel checks for the wgpu backend. Skipped when no GPU adapter is available.
//!
//! Run with:   cargo test --test wgpu_backend

use std::sync::Arc;

use batch2d::{
    wgpu, Color, DrawMode, Drawable, Mat4, Renderer, RendererConfig, SamplerId, TextureBinding,
    View, WgpuBackend, WgpuBackendConfig,
};
use futures::executor::block_on;

const SIZE: u32 = 64;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn try_device() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    let (device, queue) = block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
    }))
    .ok()?;
    Some((Arc::new(device), Arc::new(queue)))
}

/// Renders one frame into a `SIZE` x `SIZE` texture and returns its RGBA8 pixels.
fn render_frame(scene: impl FnOnce(&mut Renderer<WgpuBackend>)) -> Option<Vec<u8>> {
    let Some((device, queue)) = try_device() else {
        eprintln!("no GPU adapter available, skipping");
        return None;
    };

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let mut backend = WgpuBackend::new(
        device.clone(),
        queue.clone(),
        FORMAT,
        WgpuBackendConfig::default().with_clear_color(wgpu::Color::BLACK),
    );
    backend.set_target(target.create_view(&wgpu::TextureViewDescriptor::default()));

    let mut renderer = Renderer::new(backend, RendererConfig::default()).unwrap();
    renderer.begin_frame((SIZE, SIZE));
    scene(&mut renderer);
    renderer.end_frame();

    Some(read_pixels(&device, &queue, &target))
}

fn read_pixels(device: &wgpu::Device, queue: &wgpu::Queue, target: &wgpu::Texture) -> Vec<u8> {
    let bytes_per_row = SIZE * 4;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("test_readback"),
        size: u64::from(bytes_per_row * SIZE),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("test_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    let _ = device.poll(wgpu::PollType::Wait);
    receiver.recv().unwrap().unwrap();

    let pixels = slice.get_mapped_range().to_vec();
    buffer.unmap();
    pixels
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let offset = ((y * SIZE + x) * 4) as usize;
    [
        pixels[offset],
        pixels[offset + 1],
        pixels[offset + 2],
        pixels[offset + 3],
    ]
}

#[test]
fn quad_covers_its_pixels_only() {
    let Some(pixels) = render_frame(|renderer| {
        renderer.begin(&View::default());
        let quad = Drawable::rect(DrawMode::Fill, 16.0, 16.0, 32.0, 32.0, Color::rgb(255, 0, 0));
        renderer.draw(&quad, &Mat4::identity());
        renderer.end();
    }) else {
        return;
    };

    assert_eq!(pixel(&pixels, 32, 32), [255, 0, 0, 255]);
    assert_eq!(pixel(&pixels, 4, 4), [0, 0, 0, 255]);
}

#[test]
fn empty_frame_still_clears() {
    let Some(pixels) = render_frame(|_| {}) else {
        return;
    };
    assert_eq!(pixel(&pixels, 10, 50), [0, 0, 0, 255]);
}

#[test]
fn scissor_clips_draws() {
    let Some(pixels) = render_frame(|renderer| {
        renderer.begin(&View::default());
        renderer.apply_scissor(0, 0, 32, 64);
        let quad = Drawable::rect(DrawMode::Fill, 0.0, 0.0, 64.0, 64.0, Color::WHITE);
        renderer.draw(&quad, &Mat4::identity());
        renderer.end();
    }) else {
        return;
    };

    assert_eq!(pixel(&pixels, 10, 10), [255, 255, 255, 255]);
    assert_eq!(pixel(&pixels, 50, 10), [0, 0, 0, 255]);
}

#[test]
fn uniform_tint_and_texture_are_applied() {
    let Some(pixels) = render_frame(|renderer| {
        let green = renderer
            .backend_mut()
            .create_texture((1, 1), &[0, 255, 0, 255])
            .unwrap();

        renderer.begin(&View::default());
        let textured = Drawable::rect(DrawMode::Fill, 0.0, 0.0, 32.0, 32.0, Color::WHITE)
            .with_texture(0, TextureBinding::new(green, SamplerId::INVALID));
        renderer.draw(&textured, &Mat4::identity());

        renderer.set_uniform(0, bytemuck::cast_slice(&[0.0f32, 0.0, 1.0, 1.0]));
        let tinted = Drawable::rect(DrawMode::Fill, 32.0, 32.0, 32.0, 32.0, Color::WHITE);
        renderer.draw(&tinted, &Mat4::identity());
        renderer.end();
    }) else {
        return;
    };

    assert_eq!(pixel(&pixels, 16, 16), [0, 255, 0, 255]);
    assert_eq!(pixel(&pixels, 48, 48), [0, 0, 255, 255]);
}

#[test]
fn offscreen_target_can_be_sampled() {
    let Some(pixels) = render_frame(|renderer| {
        let (target, image) = renderer.backend_mut().create_render_target((8, 8));

        renderer.begin_target(&View::default(), target);
        let fill = Drawable::rect(DrawMode::Fill, 0.0, 0.0, 8.0, 8.0, Color::rgb(255, 0, 0));
        renderer.draw(&fill, &Mat4::identity());
        renderer.end();

        renderer.begin(&View::default());
        let sampled = Drawable::rect(DrawMode::Fill, 0.0, 0.0, 32.0, 32.0, Color::WHITE)
            .with_texture(0, TextureBinding::new(image, SamplerId::INVALID));
        renderer.draw(&sampled, &Mat4::identity());
        renderer.end();
    }) else {
        return;
    };

    assert_eq!(pixel(&pixels, 16, 16), [255, 0, 0, 255]);
    assert_eq!(pixel(&pixels, 48, 48), [0, 0, 0, 255]);
}
