//! Frame loop orchestration.
//!
//! [`Renderer`] owns every Vulkan object and drives the per-frame state
//! machine: geometry upload, fence wait, image acquire, uniform write,
//! command recording, submit, and present, with swapchain recreation on
//! any out-of-date/suboptimal/resize signal.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, trace};

use cellgrid_platform::{Surface, Window, get_required_extensions};
use cellgrid_rhi::buffer::{Buffer, BufferUsage};
use cellgrid_rhi::command::{CommandBuffer, CommandPool};
use cellgrid_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use cellgrid_rhi::device::Device;
use cellgrid_rhi::instance::Instance;
use cellgrid_rhi::physical_device::select_physical_device;
use cellgrid_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use cellgrid_rhi::shader::{Shader, ShaderStage};
use cellgrid_rhi::sync::{Fence, FrameSync, MAX_FRAMES_IN_FLIGHT};
use cellgrid_rhi::vertex::CellVertex;
use cellgrid_rhi::{RhiError, RhiResult};
use cellgrid_scene::FlyCamera;
use cellgrid_sim::CellGeometry;

use crate::render_target::RenderTarget;
use crate::ubo::TransformUbo;
use crate::vertex_pool::VertexPool;

const VERTEX_SHADER_PATH: &str = "shaders/cell.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/cell.frag.spv";

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Per-frame-slot resources: command recording, synchronization, and
/// the uniform buffer with its descriptor set.
struct FrameData {
    command_pool: CommandPool,
    command_buffer: CommandBuffer,
    sync: FrameSync,
    uniform: Buffer,
    descriptor_set: vk::DescriptorSet,
}

/// Owns all Vulkan state and renders the cell grid.
///
/// # Resource Destruction Order
///
/// Teardown waits for device idle, drops per-frame resources and the
/// vertex pool, then the pipeline, descriptors, render target, surface,
/// and instance, in that order. `ManuallyDrop` enforces the ordering.
pub struct Renderer {
    /// Vulkan instance (destroyed last).
    instance: ManuallyDrop<Instance>,
    /// Logical device, shared with every resource wrapper.
    device: Arc<Device>,
    /// Window surface (destroyed after the render target).
    surface: ManuallyDrop<Surface>,
    /// Swapchain, depth buffer, render pass, framebuffers.
    render_target: ManuallyDrop<RenderTarget>,

    descriptor_set_layout: ManuallyDrop<DescriptorSetLayout>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,

    /// Shaders are kept so the pipeline can be rebuilt when the surface
    /// format changes.
    vertex_shader: ManuallyDrop<Shader>,
    fragment_shader: ManuallyDrop<Shader>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    pipeline: ManuallyDrop<Pipeline>,

    /// Staging/device buffer slots for the grid geometry.
    vertex_pool: ManuallyDrop<VertexPool>,

    frames: Vec<FrameData>,
    /// Frame slot index, 0 to MAX_FRAMES_IN_FLIGHT - 1.
    current_frame: usize,

    /// Staged vertex data awaits a transfer at the next recording.
    transfer_pending: bool,
    /// Window resize since the last recreation.
    framebuffer_resized: bool,
    /// Zero-area window; draw_frame returns immediately.
    minimized: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Brings up the full Vulkan stack for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan resource creation fails or the
    /// shaders cannot be loaded.
    pub fn new(window: &Window) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let surface_extensions = get_required_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let enable_validation = cfg!(debug_assertions);
        let instance = Instance::new(&surface_extensions, enable_validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let render_target =
            RenderTarget::new(&instance, device.clone(), surface.handle(), width, height)?;

        let descriptor_set_layout = DescriptorSetLayout::uniform_vertex(device.clone())?;
        let descriptor_pool = DescriptorPool::new(device.clone(), MAX_FRAMES_IN_FLIGHT as u32)?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;
        let pipeline = Self::create_pipeline(
            device.clone(),
            &vertex_shader,
            &fragment_shader,
            &pipeline_layout,
            render_target.render_pass(),
        )?;

        let vertex_pool = VertexPool::new(device.clone());

        let frames = Self::create_frames(&device, &descriptor_pool, &descriptor_set_layout)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, \
             max allocation {} MiB",
            render_target.swapchain().image_count(),
            MAX_FRAMES_IN_FLIGHT,
            device.max_allocation_size() / (1024 * 1024)
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device,
            surface: ManuallyDrop::new(surface),
            render_target: ManuallyDrop::new(render_target),
            descriptor_set_layout: ManuallyDrop::new(descriptor_set_layout),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            vertex_shader: ManuallyDrop::new(vertex_shader),
            fragment_shader: ManuallyDrop::new(fragment_shader),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            pipeline: ManuallyDrop::new(pipeline),
            vertex_pool: ManuallyDrop::new(vertex_pool),
            frames,
            current_frame: 0,
            transfer_pending: false,
            framebuffer_resized: false,
            minimized: false,
            width,
            height,
        })
    }

    /// Builds the cell pipeline: depth test on, back-face culling,
    /// dynamic viewport/scissor.
    fn create_pipeline(
        device: Arc<Device>,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        pipeline_layout: &PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> RhiResult<Pipeline> {
        GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_binding(CellVertex::binding_description())
            .vertex_attributes(&CellVertex::attribute_descriptions())
            .render_pass(render_pass, 0)
            .build(device, pipeline_layout)
    }

    /// Creates the per-frame slots: command pool/buffer, sync trio, and
    /// a mapped uniform buffer wired to its descriptor set.
    fn create_frames(
        device: &Arc<Device>,
        descriptor_pool: &DescriptorPool,
        descriptor_set_layout: &DescriptorSetLayout,
    ) -> RhiResult<Vec<FrameData>> {
        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;

        let layouts = [descriptor_set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for (i, &descriptor_set) in descriptor_sets.iter().enumerate() {
            let command_pool = CommandPool::new(device.clone(), graphics_family)?;
            let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;
            let sync = FrameSync::new(device.clone())?;

            let uniform = Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                TransformUbo::SIZE as vk::DeviceSize,
            )?;
            descriptor_pool.write_uniform(descriptor_set, &uniform);

            debug!("Created frame slot {}", i);

            frames.push(FrameData {
                command_pool,
                command_buffer,
                sync,
                uniform,
                descriptor_set,
            });
        }

        Ok(frames)
    }

    /// Per-frame bookkeeping hook, called once at the top of the app's
    /// frame before simulation and drawing.
    pub fn new_frame(&mut self) {
        trace!(frame = self.current_frame, "new frame");
    }

    /// Notes a window resize; the swapchain is recreated on the next
    /// draw. A zero-area size marks the window minimized instead.
    pub fn resize_framebuffer(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Window minimized");
            self.minimized = true;
            return;
        }

        self.minimized = false;
        if width != self.width || height != self.height {
            debug!(
                "Resize: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.framebuffer_resized = true;
        }
    }

    /// Whether drawing is currently suspended by minimization.
    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Renders one frame.
    ///
    /// Uploads geometry if it changed, waits on this slot's fence,
    /// acquires an image, writes the uniform, records and submits the
    /// command buffer, presents, and advances the frame slot. A frame is
    /// skipped (fence left signaled) when the window is minimized or the
    /// swapchain is out of date at acquire.
    ///
    /// # Errors
    ///
    /// Returns an error on any Vulkan failure that is not an
    /// out-of-date/suboptimal signal.
    pub fn draw_frame(
        &mut self,
        geometry: &mut CellGeometry,
        camera: &FlyCamera,
    ) -> RhiResult<()> {
        if self.minimized {
            trace!("Skipping frame while minimized");
            return Ok(());
        }

        self.upload_geometry(geometry)?;

        let frame = &self.frames[self.current_frame];
        frame.sync.in_flight_fence().wait(u64::MAX)?;

        let (image_index, mut should_recreate) = match self
            .render_target
            .swapchain()
            .acquire_next_image(frame.sync.image_available_handle())
        {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date at acquire, recreating");
                self.recreate_render_target()?;
                return Ok(());
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };

        // Only reset once a submit is guaranteed; a skipped frame must
        // leave the fence signaled
        frame.sync.in_flight_fence().reset()?;

        let ubo = TransformUbo::from_camera(camera);
        frame.uniform.write_data(0, bytemuck::bytes_of(&ubo))?;

        self.record_commands(image_index)?;

        let frame = &self.frames[self.current_frame];
        let wait_semaphores = [frame.sync.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.sync.render_finished_handle()];
        let command_buffers = [frame.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.sync.in_flight_fence_handle())?;
        }

        let present_result = self.render_target.swapchain().present(
            self.device.present_queue(),
            image_index,
            frame.sync.render_finished_handle(),
        );

        match present_result {
            Ok(suboptimal) => should_recreate |= suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                should_recreate = true;
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        if should_recreate || self.framebuffer_resized {
            debug!("Recreating swapchain after present");
            self.recreate_render_target()?;
        }

        Ok(())
    }

    /// Restages geometry when it changed, rebuilding the pool if the
    /// chunk layout no longer fits.
    ///
    /// Reallocation first waits on every in-flight frame fence, so no
    /// submitted command buffer can still reference a destroyed buffer.
    fn upload_geometry(&mut self, geometry: &mut CellGeometry) -> RhiResult<()> {
        if !geometry.is_dirty() {
            return Ok(());
        }

        let chunks = geometry
            .vertex_chunks(self.device.max_allocation_size())
            .map_err(|e| RhiError::InvalidHandle(e.to_string()))?;

        if self.vertex_pool.needs_reallocation(&chunks) {
            let fences: Vec<vk::Fence> = self
                .frames
                .iter()
                .map(|f| f.sync.in_flight_fence_handle())
                .collect();
            Fence::wait_all(&self.device, &fences, u64::MAX)?;

            self.vertex_pool.ensure_capacity(&chunks)?;
        }

        self.vertex_pool.write_chunks(&chunks)?;
        self.transfer_pending = true;

        Ok(())
    }

    /// Records the frame's command buffer: pending staging transfers
    /// first, then the render pass with one draw per live pool slot.
    fn record_commands(&mut self, image_index: u32) -> RhiResult<()> {
        let frame = &self.frames[self.current_frame];
        let cmd = &frame.command_buffer;
        let raw = cmd.handle();
        let device = self.device.handle();

        cmd.reset()?;
        cmd.begin()?;

        if self.transfer_pending {
            self.vertex_pool.record_transfers(cmd);

            // Staged vertex data must land before vertex input reads it
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
            unsafe {
                device.cmd_pipeline_barrier(
                    raw,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::VERTEX_INPUT,
                    vk::DependencyFlags::empty(),
                    &[barrier],
                    &[],
                    &[],
                );
            }
        }

        let extent = self.render_target.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_target.render_pass())
            .framebuffer(self.render_target.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(raw, &render_pass_begin, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(raw, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(raw, 0, &[scissor]);

            device.cmd_bind_pipeline(
                raw,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );

            device.cmd_bind_descriptor_sets(
                raw,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[frame.descriptor_set],
                &[],
            );

            // Live counts only; slot capacity may exceed the data
            for (vertex_buffer, vertex_count) in self.vertex_pool.live_slots() {
                device.cmd_bind_vertex_buffers(raw, 0, &[vertex_buffer], &[0]);
                device.cmd_draw(raw, vertex_count, 1, 0, 0);
            }

            device.cmd_end_render_pass(raw);
        }

        cmd.end()?;

        self.transfer_pending = false;

        Ok(())
    }

    /// Recreates the render target for the current size and rebuilds the
    /// pipeline if the surface format changed.
    fn recreate_render_target(&mut self) -> RhiResult<()> {
        let format_changed = self.render_target.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;

        if format_changed {
            let new_pipeline = Self::create_pipeline(
                self.device.clone(),
                &self.vertex_shader,
                &self.fragment_shader,
                &self.pipeline_layout,
                self.render_target.render_pass(),
            )?;

            unsafe {
                ManuallyDrop::drop(&mut self.pipeline);
            }
            self.pipeline = ManuallyDrop::new(new_pipeline);
        }

        self.framebuffer_resized = false;
        Ok(())
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.render_target.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {:?}", e);
        }

        // Per-frame resources and buffers first, then the ordered chain
        self.frames.clear();

        unsafe {
            ManuallyDrop::drop(&mut self.vertex_pool);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.fragment_shader);
            ManuallyDrop::drop(&mut self.vertex_shader);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.descriptor_set_layout);
            ManuallyDrop::drop(&mut self.render_target);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
