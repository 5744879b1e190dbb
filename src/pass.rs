//! Render pass construction.
//!
//! A [`RenderPassBuilder`] accumulates attachments, subpasses and dependencies. Subpasses refer to attachments by index
//! through [`AttachmentReference`]s, which are checked against the attachment list when the render pass is created.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # fn build(device: &mut Device, color: vk::Format) -> anyhow::Result<ResourceID> {
//! let mut builder = RenderPassBuilder::new();
//! builder
//!     .add_attachment(RenderPassBuilder::create_attachment(
//!         color,
//!         vk::AttachmentLoadOp::CLEAR,
//!         vk::AttachmentStoreOp::STORE,
//!         vk::ImageLayout::UNDEFINED,
//!         vk::ImageLayout::PRESENT_SRC_KHR,
//!     ))?
//!     .add_subpass(
//!         vk::PipelineBindPoint::GRAPHICS,
//!         &[AttachmentReference::new(AttachmentKind::Color, 0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)],
//!         vk::SubpassDescriptionFlags::empty(),
//!     )?;
//! device.create_render_pass(&mut builder)
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::util::builder::BuilderState;
use crate::Error;

/// Role of an attachment inside a subpass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    DepthStencil,
    Input,
    Resolve,
}

/// Reference from a subpass to one of the render pass attachments.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttachmentReference {
    pub kind: AttachmentKind,
    /// Index into the render pass attachment list.
    pub attachment: u32,
    /// Layout the attachment is in during the subpass.
    pub layout: vk::ImageLayout,
}

impl AttachmentReference {
    pub fn new(kind: AttachmentKind, attachment: u32, layout: vk::ImageLayout) -> Self {
        Self {
            kind,
            attachment,
            layout,
        }
    }

    fn to_vk(self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: self.attachment,
            layout: self.layout,
        }
    }
}

#[derive(Debug, Clone)]
struct Subpass {
    bind_point: vk::PipelineBindPoint,
    flags: vk::SubpassDescriptionFlags,
    color: Vec<vk::AttachmentReference>,
    depth_stencil: Option<vk::AttachmentReference>,
    input: Vec<vk::AttachmentReference>,
    resolve: Vec<vk::AttachmentReference>,
}

impl Subpass {
    fn references(&self) -> impl Iterator<Item = &vk::AttachmentReference> {
        self.color
            .iter()
            .chain(self.depth_stencil.iter())
            .chain(self.input.iter())
            .chain(self.resolve.iter())
    }

    fn to_vk(&self) -> vk::SubpassDescription {
        let mut description = vk::SubpassDescription::builder()
            .flags(self.flags)
            .pipeline_bind_point(self.bind_point)
            .color_attachments(self.color.as_slice())
            .input_attachments(self.input.as_slice());
        if !self.resolve.is_empty() {
            description = description.resolve_attachments(self.resolve.as_slice());
        }
        if let Some(depth) = &self.depth_stencil {
            description = description.depth_stencil_attachment(depth);
        }
        description.build()
    }
}

const WHAT: &str = "render pass";

/// Single-use accumulator for a render pass.
#[derive(Debug, Default)]
pub struct RenderPassBuilder {
    state: BuilderState,
    attachments: Vec<vk::AttachmentDescription>,
    subpasses: Vec<Subpass>,
    dependencies: Vec<vk::SubpassDependency>,
}

impl RenderPassBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a single-sampled attachment that does not use its stencil aspect.
    pub fn create_attachment(
        format: vk::Format,
        load_op: vk::AttachmentLoadOp,
        store_op: vk::AttachmentStoreOp,
        initial_layout: vk::ImageLayout,
        final_layout: vk::ImageLayout,
    ) -> vk::AttachmentDescription {
        vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(load_op)
            .store_op(store_op)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(initial_layout)
            .final_layout(final_layout)
            .build()
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Append an attachment. Its index is the number of attachments added before it.
    pub fn add_attachment(&mut self, attachment: vk::AttachmentDescription) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.attachments.push(attachment);
        Ok(self)
    }

    /// Append a subpass using the given attachment references. A subpass has at most one depth stencil reference.
    pub fn add_subpass(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        references: &[AttachmentReference],
        flags: vk::SubpassDescriptionFlags,
    ) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        let mut subpass = Subpass {
            bind_point,
            flags,
            color: vec![],
            depth_stencil: None,
            input: vec![],
            resolve: vec![],
        };
        for reference in references {
            match reference.kind {
                AttachmentKind::Color => subpass.color.push(reference.to_vk()),
                AttachmentKind::Input => subpass.input.push(reference.to_vk()),
                AttachmentKind::Resolve => subpass.resolve.push(reference.to_vk()),
                AttachmentKind::DepthStencil => {
                    if subpass.depth_stencil.replace(reference.to_vk()).is_some() {
                        return Err(Error::IncompleteBuilder("subpass has more than one depth stencil attachment").into());
                    }
                }
            }
        }
        self.subpasses.push(subpass);
        Ok(self)
    }

    pub fn add_dependency(&mut self, dependency: vk::SubpassDependency) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.dependencies.push(dependency);
        Ok(self)
    }

    pub fn attachments(&self) -> &[vk::AttachmentDescription] {
        self.attachments.as_slice()
    }

    pub fn subpass_count(&self) -> u32 {
        self.subpasses.len() as u32
    }

    /// Check that the builder describes a complete render pass.
    pub(crate) fn validate(&self) -> Result<()> {
        self.state.ensure_open(WHAT)?;
        if self.attachments.is_empty() {
            return Err(Error::IncompleteBuilder("render pass requires at least one attachment").into());
        }
        if self.subpasses.is_empty() {
            return Err(Error::IncompleteBuilder("render pass requires at least one subpass").into());
        }
        let count = self.attachments.len() as u32;
        let out_of_range = self
            .subpasses
            .iter()
            .flat_map(|subpass| subpass.references())
            .any(|reference| reference.attachment != vk::ATTACHMENT_UNUSED && reference.attachment >= count);
        if out_of_range {
            return Err(Error::IncompleteBuilder("subpass references an attachment that does not exist").into());
        }
        let bad_resolve = self
            .subpasses
            .iter()
            .any(|subpass| !subpass.resolve.is_empty() && subpass.resolve.len() != subpass.color.len());
        if bad_resolve {
            return Err(Error::IncompleteBuilder("resolve attachments must match color attachments one to one").into());
        }
        Ok(())
    }

    /// Call `f` with a create info that points into this builder.
    pub(crate) fn with_create_info<R>(&self, f: impl FnOnce(&vk::RenderPassCreateInfo) -> Result<R>) -> Result<R> {
        let subpasses = self
            .subpasses
            .iter()
            .map(|subpass| subpass.to_vk())
            .collect::<Vec<_>>();
        let info = vk::RenderPassCreateInfo::builder()
            .attachments(self.attachments.as_slice())
            .subpasses(subpasses.as_slice())
            .dependencies(self.dependencies.as_slice())
            .build();
        f(&info)
    }

    pub(crate) fn finish(&mut self) {
        self.state.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> vk::AttachmentDescription {
        RenderPassBuilder::create_attachment(
            vk::Format::B8G8R8A8_SRGB,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::STORE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )
    }

    #[test]
    fn out_of_range_reference_is_rejected() {
        let mut builder = RenderPassBuilder::new();
        builder
            .add_attachment(color())
            .unwrap()
            .add_subpass(
                vk::PipelineBindPoint::GRAPHICS,
                &[AttachmentReference::new(AttachmentKind::Color, 3, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)],
                vk::SubpassDescriptionFlags::empty(),
            )
            .unwrap();
        let err = builder.validate().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::IncompleteBuilder(_))));
    }

    #[test]
    fn create_info_points_into_builder() {
        let mut builder = RenderPassBuilder::new();
        builder
            .add_attachment(color())
            .unwrap()
            .add_subpass(
                vk::PipelineBindPoint::GRAPHICS,
                &[AttachmentReference::new(AttachmentKind::Color, 0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)],
                vk::SubpassDescriptionFlags::empty(),
            )
            .unwrap();
        builder.validate().unwrap();
        let counts = builder
            .with_create_info(|info| Ok((info.attachment_count, info.subpass_count, info.dependency_count)))
            .unwrap();
        assert_eq!(counts, (1, 1, 0));
        assert_eq!(builder.state(), BuilderState::Accumulating);
    }
}
