use ash::vk;

use super::driver::Driver;

/// Access masks for an image layout transition.
///
/// The rules are applied in order and later rules win over earlier ones for the same side:
///
/// | condition                          | source access    | destination access                       |
/// |------------------------------------|------------------|------------------------------------------|
/// | old is `COLOR_ATTACHMENT_OPTIMAL`  | `COLOR_ATTACHMENT_WRITE` |                                  |
/// | old is `TRANSFER_DST_OPTIMAL`      | `TRANSFER_WRITE` |                                          |
/// | new is `TRANSFER_DST_OPTIMAL`      |                  | `TRANSFER_WRITE`                         |
/// | new is `TRANSFER_SRC_OPTIMAL`      |                  | `TRANSFER_READ`                          |
/// | new is `COLOR_ATTACHMENT_OPTIMAL`  |                  | `COLOR_ATTACHMENT_WRITE`                 |
/// | new is `DEPTH_STENCIL_ATTACHMENT_OPTIMAL` |           | `DEPTH_STENCIL_ATTACHMENT_WRITE`         |
/// | new is `SHADER_READ_ONLY_OPTIMAL`  | `HOST_WRITE \| TRANSFER_WRITE` | `SHADER_READ`              |
pub fn access_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> (vk::AccessFlags, vk::AccessFlags) {
    let mut src_access = vk::AccessFlags::empty();
    let mut dst_access = vk::AccessFlags::empty();

    match old_layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
            src_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => src_access = vk::AccessFlags::TRANSFER_WRITE,
        _ => {}
    }

    match new_layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => dst_access = vk::AccessFlags::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => dst_access = vk::AccessFlags::TRANSFER_READ,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => {
            dst_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            dst_access = vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
            src_access = vk::AccessFlags::HOST_WRITE | vk::AccessFlags::TRANSFER_WRITE;
            dst_access = vk::AccessFlags::SHADER_READ;
        }
        _ => {}
    }

    (src_access, dst_access)
}

/// Records a single image memory barrier moving mip 0 / layer 0 of `image` from `old_layout`
/// to `new_layout`. Both stage masks are `TOP_OF_PIPE` and no queue ownership transfer happens.
///
/// Nothing is submitted, the barrier only lands in `cmd_buffer`.
pub fn transition(
    driver: &dyn Driver,
    cmd_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<(), vk::Result> {
    let (src_access, dst_access) = access_masks(old_layout, new_layout);

    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_mask)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    driver.cmd_pipeline_barrier(
        cmd_buffer,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        &[barrier],
    )
}
