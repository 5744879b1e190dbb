//! The pipeline builder is used to easily create graphics pipelines correctly.

use std::collections::HashSet;
use std::ffi::CStr;

use anyhow::Result;
use ash::vk;

use crate::backend::Driver;
use crate::pipeline::VertexBinding;
use crate::resource::table::ResourceID;
use crate::util::builder::BuilderState;
use crate::Error;

const WHAT: &str = "pipeline";

#[derive(Debug, Clone)]
struct ShaderStage {
    stage: vk::ShaderStageFlags,
    code: Vec<u32>,
}

/// Used to facilitate creating a graphics pipeline. For an example, please check the
/// [`pipeline`](crate::pipeline) module level documentation.
///
/// For information on each method, please check the Vulkan spec for
/// [`VkGraphicsPipelineCreateInfo`](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkGraphicsPipelineCreateInfo.html).
/// All builder methods correspond to entries directly, with minimal utilities added on top to enforce some invariants.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    state: BuilderState,
    name: String,
    bindings: Vec<VertexBinding>,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo,
    viewports: Vec<vk::Viewport>,
    scissors: Vec<vk::Rect2D>,
    rasterizer: vk::PipelineRasterizationStateCreateInfo,
    multisample: vk::PipelineMultisampleStateCreateInfo,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo,
    blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    dynamic_states: Vec<vk::DynamicState>,
    shaders: Vec<ShaderStage>,
    push_constants: Vec<vk::PushConstantRange>,
    render_pass: Option<(ResourceID, u32)>,
}

impl PipelineBuilder {
    /// Create a new empty pipeline with default settings for everything.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: BuilderState::Empty,
            name: name.into(),
            bindings: vec![],
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo::builder()
                .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .build(),
            viewports: vec![],
            scissors: vec![],
            rasterizer: vk::PipelineRasterizationStateCreateInfo::builder()
                .polygon_mode(vk::PolygonMode::FILL)
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .line_width(1.0)
                .build(),
            multisample: vk::PipelineMultisampleStateCreateInfo::builder()
                .rasterization_samples(vk::SampleCountFlags::TYPE_1)
                .build(),
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo::builder()
                .max_depth_bounds(1.0)
                .build(),
            blend_attachments: vec![],
            dynamic_states: vec![],
            shaders: vec![],
            push_constants: vec![],
            render_pass: None,
        }
    }

    /// A color blend attachment with blending disabled that writes every component.
    pub fn opaque_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Obtain the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a vertex buffer binding with its attributes.
    pub fn add_vertex_binding(&mut self, binding: VertexBinding) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.bindings.push(binding);
        Ok(self)
    }

    pub fn set_input_assembly_state(&mut self, topology: vk::PrimitiveTopology, primitive_restart: bool) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::Bool32::from(primitive_restart);
        Ok(self)
    }

    /// Set static viewports and scissors. Use [`PipelineBuilder::add_dynamic_state()`] instead to set them when recording.
    pub fn set_viewport_state(&mut self, viewports: Vec<vk::Viewport>, scissors: Vec<vk::Rect2D>) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.viewports = viewports;
        self.scissors = scissors;
        Ok(self)
    }

    pub fn set_rasterization_state(
        &mut self,
        polygon_mode: vk::PolygonMode,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.rasterizer.polygon_mode = polygon_mode;
        self.rasterizer.cull_mode = cull_mode;
        self.rasterizer.front_face = front_face;
        Ok(self)
    }

    pub fn set_multisample_state(
        &mut self,
        samples: vk::SampleCountFlags,
        sample_shading: bool,
        min_sample_shading: f32,
    ) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.multisample.rasterization_samples = samples;
        self.multisample.sample_shading_enable = vk::Bool32::from(sample_shading);
        self.multisample.min_sample_shading = min_sample_shading;
        Ok(self)
    }

    pub fn set_depth_stencil_state(&mut self, test: bool, write: bool, op: vk::CompareOp) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.depth_stencil.depth_test_enable = vk::Bool32::from(test);
        self.depth_stencil.depth_write_enable = vk::Bool32::from(write);
        self.depth_stencil.depth_compare_op = op;
        Ok(self)
    }

    /// Add a blend attachment. There must be one per color attachment of the subpass.
    pub fn add_color_blend_attachment(&mut self, attachment: vk::PipelineColorBlendAttachmentState) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.blend_attachments.push(attachment);
        Ok(self)
    }

    /// Add a dynamic state to the pipeline. Adding the same state twice has no effect.
    pub fn add_dynamic_state(&mut self, state: vk::DynamicState) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        if !self.dynamic_states.contains(&state) {
            self.dynamic_states.push(state);
        }
        Ok(self)
    }

    /// Attach SPIR-V code for a shader stage, replacing earlier code for the same stage. The entry point is `main`.
    pub fn attach_shader(&mut self, stage: vk::ShaderStageFlags, code: Vec<u32>) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.shaders.retain(|shader| shader.stage != stage);
        self.shaders.push(ShaderStage {
            stage,
            code,
        });
        Ok(self)
    }

    /// True if code was attached for the stage.
    pub fn has_stage(&self, stage: vk::ShaderStageFlags) -> bool {
        self.shaders.iter().any(|shader| shader.stage == stage)
    }

    /// Render pass and subpass the pipeline will be used in. Mandatory.
    pub fn set_render_pass(&mut self, render_pass: ResourceID, subpass: u32) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.render_pass = Some((render_pass, subpass));
        Ok(self)
    }

    /// Add a push constant range to the pipeline layout.
    pub fn push_constant(&mut self, stages: vk::ShaderStageFlags, offset: u32, size: u32) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.push_constants.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        Ok(self)
    }

    fn is_dynamic(&self, state: vk::DynamicState) -> bool {
        self.dynamic_states.contains(&state)
    }

    /// Check all mandatory parts and return the render pass to build against.
    pub(crate) fn validate(&self) -> Result<(ResourceID, u32)> {
        self.state.ensure_open(WHAT)?;
        let render_pass = self
            .render_pass
            .ok_or(Error::IncompleteBuilder("pipeline requires a render pass"))?;
        if !self.has_stage(vk::ShaderStageFlags::VERTEX) {
            return Err(Error::IncompleteBuilder("pipeline requires a vertex shader stage").into());
        }
        if self.viewports.is_empty() && !self.is_dynamic(vk::DynamicState::VIEWPORT) {
            return Err(Error::IncompleteBuilder("pipeline requires a viewport or dynamic viewport state").into());
        }
        if self.scissors.is_empty() && !self.is_dynamic(vk::DynamicState::SCISSOR) {
            return Err(Error::IncompleteBuilder("pipeline requires a scissor or dynamic scissor state").into());
        }
        let mut locations = HashSet::new();
        let unique = self
            .bindings
            .iter()
            .flat_map(|binding| binding.attributes())
            .all(|attr| locations.insert(attr.location));
        if !unique {
            return Err(Error::IncompleteBuilder("pipeline vertex attributes must use distinct locations").into());
        }
        Ok(render_pass)
    }

    /// Create the pipeline layout and the pipeline. Shader modules only live for the duration of this call.
    pub(crate) fn build_native(&self, driver: &dyn Driver, render_pass: vk::RenderPass) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
        let (_, subpass) = self.validate()?;
        let entry = CStr::from_bytes_with_nul(b"main\0")?;

        let mut modules = Vec::with_capacity(self.shaders.len());
        for shader in &self.shaders {
            match driver.create_shader_module(&shader.code) {
                Ok(module) => modules.push(module),
                Err(err) => {
                    modules.into_iter().for_each(|module| driver.destroy_shader_module(module));
                    return Err(err);
                }
            }
        }

        let result = self.build_with_modules(driver, render_pass, subpass, entry, &modules);
        for module in modules {
            driver.destroy_shader_module(module);
        }
        result
    }

    fn build_with_modules(
        &self,
        driver: &dyn Driver,
        render_pass: vk::RenderPass,
        subpass: u32,
        entry: &CStr,
        modules: &[vk::ShaderModule],
    ) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
        let stages = self
            .shaders
            .iter()
            .zip(modules)
            .map(|(shader, module)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(shader.stage)
                    .module(*module)
                    .name(entry)
                    .build()
            })
            .collect::<Vec<_>>();

        let binding_descriptions = self
            .bindings
            .iter()
            .map(|binding| binding.description())
            .collect::<Vec<_>>();
        let attributes = self
            .bindings
            .iter()
            .flat_map(|binding| binding.attributes().iter().copied())
            .collect::<Vec<_>>();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(binding_descriptions.as_slice())
            .vertex_attribute_descriptions(attributes.as_slice())
            .build();

        let mut viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(self.viewports.as_slice())
            .scissors(self.scissors.as_slice())
            .build();
        // Dynamic viewports still need a count.
        if self.viewports.is_empty() {
            viewport_state.viewport_count = 1;
        }
        if self.scissors.is_empty() {
            viewport_state.scissor_count = 1;
        }

        let blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(self.blend_attachments.as_slice())
            .build();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(self.dynamic_states.as_slice())
            .build();

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(self.push_constants.as_slice())
            .build();
        let layout = driver.create_pipeline_layout(&layout_info)?;

        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages.as_slice())
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterizer)
            .multisample_state(&self.multisample)
            .depth_stencil_state(&self.depth_stencil)
            .color_blend_state(&blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(subpass)
            .build();

        match driver.create_graphics_pipeline(&info) {
            Ok(pipeline) => Ok((pipeline, layout)),
            Err(err) => {
                driver.destroy_pipeline_layout(layout);
                Err(err)
            }
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state.finish();
    }
}
