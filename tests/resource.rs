use anyhow::Result;
use ash::vk::{Handle, ObjectType};

use deimos::prelude::*;

mod framework;

fn depth_info() -> ImageCreateInfo {
    ImageCreateInfo::new_2d(
        vk::Format::D32_SFLOAT,
        64,
        64,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
    )
}

fn is_invalid_handle(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::InvalidHandle(_)))
}

#[test]
pub fn destroyed_ids_are_invalid() -> Result<()> {
    let mut device = framework::make_device()?;
    let image = device.create_image(depth_info(), MemoryType::GpuOnly)?;
    assert_eq!(image.kind(), ResourceKind::Image);
    assert_eq!(device.image(image)?.format(), vk::Format::D32_SFLOAT);

    device.destroy(image)?;
    assert!(!device.contains(image));
    assert!(is_invalid_handle(&device.image(image).unwrap_err()));
    // A second destroy is reported, not ignored.
    assert!(is_invalid_handle(&device.destroy(image).unwrap_err()));
    Ok(())
}

#[test]
pub fn stale_ids_do_not_alias_reused_slots() -> Result<()> {
    let mut device = framework::make_device()?;
    let first = device.create_image(depth_info(), MemoryType::GpuOnly)?;
    device.destroy(first)?;
    let second = device.create_image(depth_info(), MemoryType::GpuOnly)?;
    assert_ne!(first, second);
    assert!(is_invalid_handle(&device.image(first).unwrap_err()));
    assert!(device.image(second).is_ok());

    // A table only accepts the IDs it issued.
    let mut table = ResourceTable::new();
    assert!(is_invalid_handle(&table.destroy(second).unwrap_err()));
    Ok(())
}

#[test]
pub fn wrong_kind_is_rejected() -> Result<()> {
    let mut device = framework::make_device()?;
    let image = device.create_image(depth_info(), MemoryType::GpuOnly)?;
    assert!(is_invalid_handle(&device.render_pass(image).unwrap_err()));
    assert!(is_invalid_handle(&device.swapchain(image).unwrap_err()));
    assert!(device.image(image).is_ok());
    Ok(())
}

#[test]
pub fn ids_from_other_devices_are_rejected() -> Result<()> {
    let mut device_a = framework::make_device()?;
    let mut device_b = framework::make_device()?;
    let image_a = device_a.create_image(depth_info(), MemoryType::GpuOnly)?;
    let _image_b = device_b.create_image(depth_info(), MemoryType::GpuOnly)?;
    assert!(is_invalid_handle(&device_b.image(image_a).unwrap_err()));
    assert!(is_invalid_handle(&device_b.destroy(image_a).unwrap_err()));
    assert!(device_a.image(image_a).is_ok());
    Ok(())
}

#[test]
pub fn views_belong_to_their_image() -> Result<()> {
    let mut device = framework::make_device()?;
    let image = device.create_image(depth_info(), MemoryType::GpuOnly)?;
    let view = device.create_image_view(image, vk::Format::D32_SFLOAT, vk::ImageAspectFlags::DEPTH)?;
    assert_ne!(view.as_raw(), 0);
    assert_eq!(device.image(image)?.views(), &[view]);
    Ok(())
}

#[test]
pub fn device_drop_destroys_in_reverse_order() -> Result<()> {
    let log = DriverLog::default();
    let backend = framework::null_backend(vec![]).with_log(log.clone());
    let adapter = framework::capable_adapter("Test GPU");
    let (image, cmd) = {
        let mut device = framework::make_device_on(&backend, &adapter)?;
        let image = device.create_image(depth_info(), MemoryType::GpuOnly)?;
        let graphics = device.queue_selection(QueueRole::Graphics).unwrap();
        let cmd = device.create_command_buffer(graphics, vk::CommandBufferLevel::PRIMARY)?;
        let image = unsafe { device.image(image)?.handle() };
        let cmd = unsafe { device.command_buffer(cmd)?.handle() };
        (image, cmd)
    };

    let events = log.lock().unwrap().clone();
    let destroyed = events
        .iter()
        .filter_map(|event| match event {
            DriverEvent::Destroyed(ty, raw) => Some((*ty, *raw)),
            DriverEvent::Created(..) => None,
        })
        .collect::<Vec<_>>();
    let position = |ty: ObjectType, raw: u64| destroyed.iter().position(|entry| *entry == (ty, raw)).unwrap();
    // The command buffer was created last, so it goes first. Pools go after every resource.
    assert!(position(ObjectType::COMMAND_BUFFER, cmd.as_raw()) < position(ObjectType::IMAGE, image.as_raw()));
    assert_eq!(destroyed.last().unwrap().0, ObjectType::COMMAND_POOL);

    let created = events
        .iter()
        .filter(|event| matches!(event, DriverEvent::Created(..)))
        .count();
    assert_eq!(created, destroyed.len(), "every created object must be destroyed");
    Ok(())
}

#[test]
pub fn command_buffers_share_a_pool_per_family() -> Result<()> {
    let mut device = framework::make_device()?;
    let graphics = device.queue_selection(QueueRole::Graphics).unwrap();
    let a = device.create_command_buffer(graphics, vk::CommandBufferLevel::PRIMARY)?;
    let b = device.create_command_buffer(graphics, vk::CommandBufferLevel::SECONDARY)?;
    assert_ne!(a, b);
    assert_eq!(device.command_buffer(b)?.level(), vk::CommandBufferLevel::SECONDARY);
    assert_eq!(device.command_buffer(a)?.family_index(), graphics.family_index);

    device.configure_one_time_queue(graphics)?;
    assert_eq!(device.one_time_queue(), Some(graphics));
    Ok(())
}

#[test]
pub fn depth_format_search_follows_candidate_order() -> Result<()> {
    let device = framework::make_device()?;
    let format = device.find_supported_format(
        &[vk::Format::D24_UNORM_S8_UINT, vk::Format::D32_SFLOAT],
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    )?;
    assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);

    let err = device
        .find_supported_format(&[], vk::ImageTiling::OPTIMAL, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSupportedFormat)));
    Ok(())
}
