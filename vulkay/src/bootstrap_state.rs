use fugu::{
    application::{ApplicationState, ControlFlow, StateError},
    ash::vk,
    gfx::{
        context::Context,
        descriptor::{Binding, DescriptorKind, DescriptorLayoutBuilder, ShaderVisibility},
        resources::{DescriptorLayoutId, ShaderId, TypedBufferId},
    },
};

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Transform {
    pub mvp: [[f32; 4]; 4],
}

impl Transform {
    fn looking_at_origin(aspect_ratio: f32) -> Self {
        let projection =
            glam::Mat4::perspective_rh(45f32.to_radians(), aspect_ratio, 0.1, 100.0);
        let eye = glam::Vec3::new(0.0, 0.0, 3.0);
        let view = glam::Mat4::look_at_rh(eye, glam::Vec3::ZERO, glam::Vec3::Y);
        let model = glam::Mat4::from_rotation_y(30f32.to_radians());

        Self {
            mvp: (projection * view * model).to_cols_array_2d(),
        }
    }
}

struct Resources {
    _shaders: [ShaderId; 2],
    _layout: DescriptorLayoutId,
    _transform: TypedBufferId<Transform>,
    _binding: Binding,
}

/// Uploads a transform to a uniform buffer, binds it, then exits after the first frame.
#[derive(Default)]
pub struct BootstrapState {
    resources: Option<Resources>,
}

impl ApplicationState for BootstrapState {
    fn on_attach(&mut self, ctx: &mut Context) -> Result<ControlFlow, StateError> {
        log::info!("running on {}", ctx.gpu().debug_string());

        let vertex = ctx.load_shader("simple.vert")?;
        let fragment = ctx.load_shader("simple.frag")?;

        let mut layout_builder = DescriptorLayoutBuilder::new();
        layout_builder.add(0, DescriptorKind::UniformBuffer, ShaderVisibility::Vertex)?;
        let layout = ctx.create_descriptor_layout(&layout_builder)?;

        let extent = ctx.swapchain().extent;
        let transform =
            ctx.create_typed_buffer::<Transform>(vk::BufferUsageFlags::UNIFORM_BUFFER, true)?;
        ctx.upload_typed(
            transform,
            &Transform::looking_at_origin(extent.width as f32 / extent.height.max(1) as f32),
        )?;

        let mut binding = ctx.create_binding(layout)?;
        ctx.bind_buffer(&mut binding, 0, transform.untyped())?;
        ctx.apply_binding(&binding)?;

        log::info!(
            "swapchain ready: {}x{} with {} images, {:?}",
            extent.width,
            extent.height,
            ctx.swapchain().images.len(),
            ctx.swapchain().present_mode
        );

        self.resources = Some(Resources {
            _shaders: [vertex, fragment],
            _layout: layout,
            _transform: transform,
            _binding: binding,
        });

        Ok(ControlFlow::Continue)
    }

    fn update(&mut self, _ctx: &mut Context) -> Result<ControlFlow, StateError> {
        log::info!("Update !");
        log::info!("... and exit.");

        Ok(ControlFlow::Exit)
    }
}
