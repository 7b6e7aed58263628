use ash::vk;
use thiserror::Error;

use super::{barrier, driver::Driver, error::ErrorKind};

/// Owns the command pool and the one primary command buffer every setup-time barrier is
/// recorded into.
///
/// The buffer is put into the recording state on creation and stays there. Ending and
/// submitting it is left to whoever drives the render loop.
#[derive(Debug)]
pub struct CommandRecorder {
    pub(crate) cmd_pool: vk::CommandPool,
    pub(crate) cmd_buffer: vk::CommandBuffer,
}

#[derive(Debug, Error)]
pub enum CommandRecorderCreateError {
    #[error("vulkan call to create command pool failed")]
    CmdPoolCreation(vk::Result),

    #[error("vulkan call to allocate command buffer failed")]
    CmdBufferAllocation(vk::Result),

    #[error("driver returned no command buffer")]
    MissingCmdBuffer,

    #[error("vulkan call to begin command buffer failed")]
    Begin(vk::Result),
}

impl CommandRecorderCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CmdPoolCreation(result)
            | Self::CmdBufferAllocation(result)
            | Self::Begin(result) => ErrorKind::from_vk(*result),
            Self::MissingCmdBuffer => ErrorKind::Driver,
        }
    }
}

impl CommandRecorder {
    pub(crate) fn try_new(
        driver: &dyn Driver,
        queue_family_index: u32,
    ) -> Result<Self, CommandRecorderCreateError> {
        let cmd_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let cmd_pool = driver
            .create_command_pool(&cmd_pool_info)
            .map_err(CommandRecorderCreateError::CmdPoolCreation)?;

        let cmd_buffer = match Self::open_buffer(driver, cmd_pool) {
            Ok(cmd_buffer) => cmd_buffer,
            Err(err) => {
                driver.destroy_command_pool(cmd_pool);
                return Err(err);
            }
        };

        Ok(Self {
            cmd_pool,
            cmd_buffer,
        })
    }

    fn open_buffer(
        driver: &dyn Driver,
        cmd_pool: vk::CommandPool,
    ) -> Result<vk::CommandBuffer, CommandRecorderCreateError> {
        let cmd_buffer_info = vk::CommandBufferAllocateInfo::default()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1)
            .command_pool(cmd_pool);
        let cmd_buffer = driver
            .allocate_command_buffers(&cmd_buffer_info)
            .map_err(CommandRecorderCreateError::CmdBufferAllocation)?
            .first()
            .copied()
            .ok_or(CommandRecorderCreateError::MissingCmdBuffer)?;

        let begin_info = vk::CommandBufferBeginInfo::default();
        driver
            .begin_command_buffer(cmd_buffer, &begin_info)
            .map_err(CommandRecorderCreateError::Begin)?;

        Ok(cmd_buffer)
    }

    pub fn cmd_buffer(&self) -> vk::CommandBuffer {
        self.cmd_buffer
    }

    /// Records a layout transition for `image` into the setup command buffer.
    pub fn transition_layout(
        &self,
        driver: &dyn Driver,
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<(), vk::Result> {
        barrier::transition(
            driver,
            self.cmd_buffer,
            image,
            aspect_mask,
            old_layout,
            new_layout,
        )
    }

    /// Destroys the pool, which also frees the command buffer.
    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying command recorder");
        driver.destroy_command_pool(self.cmd_pool);
    }
}
