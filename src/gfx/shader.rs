use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use ash::vk;
use thiserror::Error;

use super::{driver::Driver, error::ErrorKind};

pub const SHADER_EXTENSION: &str = "spv";

#[derive(Debug)]
pub struct ShaderModule {
    pub(crate) handle: vk::ShaderModule,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ShaderLoadError {
    #[error("can't open shader {name} at {}", path.display())]
    NotFound {
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("shader {name} is not valid SPIR-V ({len} bytes, expected a multiple of 4)")]
    InvalidBytecode { name: String, len: usize },

    #[error("vulkan call to create shader module {name} failed")]
    VulkanCreation { name: String, result: vk::Result },
}

impl ShaderLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::IoNotFound,
            Self::InvalidBytecode { .. } => ErrorKind::Driver,
            Self::VulkanCreation { result, .. } => ErrorKind::from_vk(*result),
        }
    }
}

/// `<shader_dir>/<name>.spv`
pub fn shader_path(shader_dir: &Path, name: &str) -> PathBuf {
    shader_dir.join(format!("{name}.{SHADER_EXTENSION}"))
}

/// Reads a SPIR-V artifact as words. The file holds the raw instruction stream, so its length
/// has to be a multiple of 4.
pub fn read_bytecode(shader_dir: &Path, name: &str) -> Result<Vec<u32>, ShaderLoadError> {
    let path = shader_path(shader_dir, name);
    let bytes = std::fs::read(&path).map_err(|source| ShaderLoadError::NotFound {
        name: name.to_owned(),
        path: path.clone(),
        source,
    })?;

    let invalid = || ShaderLoadError::InvalidBytecode {
        name: name.to_owned(),
        len: bytes.len(),
    };
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(invalid());
    }

    ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|_| invalid())
}

impl ShaderModule {
    pub fn load(
        driver: &dyn Driver,
        shader_dir: &Path,
        name: &str,
    ) -> Result<Self, ShaderLoadError> {
        let code = read_bytecode(shader_dir, name)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = driver
            .create_shader_module(&create_info)
            .map_err(|result| ShaderLoadError::VulkanCreation {
                name: name.to_owned(),
                result,
            })?;
        log::debug!("loaded shader {name} ({} bytes)", code.len() * 4);

        Ok(Self {
            handle,
            name: name.to_owned(),
        })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying shader {}", self.name);
        driver.destroy_shader_module(self.handle);
    }
}
