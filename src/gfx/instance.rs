use std::ffi::CStr;

use ash::{ext, vk};
use thiserror::Error;
use winit::raw_window_handle::RawDisplayHandle;

use super::{
    driver::{Driver, InstanceDesc},
    error::ErrorKind,
};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

fn vendor_id_to_str(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x1002 => "AMD",
        0x1010 => "ImgTec",
        0x10DE => "NVIDIA",
        0x13B5 => "ARM",
        0x5143 => "Qualcomm",
        0x8086 => "Intel",
        _ => "unknown",
    }
}

fn device_type_to_str(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::INTEGRATED_GPU => "integrated GPU",
        vk::PhysicalDeviceType::DISCRETE_GPU => "discrete GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "other",
    }
}

fn engine_version() -> u32 {
    let mut numbers = env!("CARGO_PKG_VERSION")
        .split('.')
        .flat_map(|value| value.parse::<u32>());
    let mut next = || numbers.next().unwrap_or(0);

    vk::make_api_version(0, next(), next(), next())
}

/// Capability snapshot of one physical device, captured once during enumeration.
#[derive(Debug, Clone)]
pub struct GpuDescriptor {
    pub handle: vk::PhysicalDevice,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub properties: vk::PhysicalDeviceProperties,
}

impl GpuDescriptor {
    pub fn name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("INVALID")
    }

    pub fn debug_string(&self) -> String {
        let device_type = device_type_to_str(self.properties.device_type);
        let device_vendor = vendor_id_to_str(self.properties.vendor_id);
        format!("{} [{}]: {}", self.name(), device_vendor, device_type)
    }
}

/// Picks the GPU the context is built on. Returns an index into `gpus`, or `None` to reject
/// every device.
pub trait DeviceSelector {
    fn select(&self, gpus: &[GpuDescriptor]) -> Option<usize>;
}

/// Takes the first enumerated device, no ranking involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstDevice;

impl DeviceSelector for FirstDevice {
    fn select(&self, gpus: &[GpuDescriptor]) -> Option<usize> {
        (!gpus.is_empty()).then_some(0)
    }
}

#[derive(Debug, Error)]
pub enum InstanceCreateError {
    #[error("vulkan call to enumerate instance layers failed")]
    LayerEnumeration(vk::Result),

    #[error("query for necessary surface extensions failed")]
    ExtensionQuery(vk::Result),

    #[error("vulkan call to create instance failed")]
    VulkanCreation(vk::Result),

    #[error("vulkan call to enumerate physical devices failed")]
    DeviceEnumeration(vk::Result),

    #[error("vulkan call to query physical device properties failed")]
    DeviceQuery(vk::Result),

    #[error("no GPU found")]
    NoDevice,

    #[error("device {0} reports no queue family")]
    NoQueueFamilies(String),
}

impl InstanceCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice => ErrorKind::DeviceNotFound,
            Self::NoQueueFamilies(_) => ErrorKind::QueueNotFound,
            Self::LayerEnumeration(result)
            | Self::ExtensionQuery(result)
            | Self::VulkanCreation(result)
            | Self::DeviceEnumeration(result)
            | Self::DeviceQuery(result) => ErrorKind::from_vk(*result),
        }
    }
}

#[derive(Debug, Error)]
pub enum GpuSelectError {
    #[error("device selector rejected all {0} devices")]
    Rejected(usize),

    #[error("device selector returned index {index} but only {count} devices exist")]
    OutOfRange { index: usize, count: usize },
}

impl GpuSelectError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DeviceNotFound
    }
}

/// Instance level state: the enumerated layers and one [`GpuDescriptor`] per physical device.
#[derive(Debug)]
pub struct InstanceManager {
    pub(crate) layers: Vec<vk::LayerProperties>,
    pub(crate) gpus: Vec<GpuDescriptor>,
    pub(crate) validation_enabled: bool,
}

impl InstanceManager {
    pub(crate) fn create(
        driver: &mut dyn Driver,
        application_name: &CStr,
        application_version: u32,
        api_version: u32,
        enable_validation: bool,
        display_handle: RawDisplayHandle,
    ) -> Result<Self, InstanceCreateError> {
        let layers = enumerate_layers(driver).map_err(InstanceCreateError::LayerEnumeration)?;
        log::debug!("{} instance layers available", layers.len());

        let mut extensions = driver
            .required_surface_extensions(display_handle)
            .map_err(InstanceCreateError::ExtensionQuery)?;
        let mut enabled_layers = vec![];

        let validation_available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
        let validation_enabled = enable_validation && validation_available;
        if enable_validation && !validation_available {
            log::warn!("validation requested but {VALIDATION_LAYER:?} is not installed, ignoring");
        }
        if validation_enabled {
            enabled_layers.push(VALIDATION_LAYER);
            extensions.push(ext::debug_utils::NAME);
        }

        let desc = InstanceDesc {
            application_name,
            application_version,
            engine_name: c"fugu",
            engine_version: engine_version(),
            api_version,
            extensions,
            layers: enabled_layers,
            debug_messenger: validation_enabled,
        };
        driver
            .create_instance(&desc)
            .map_err(InstanceCreateError::VulkanCreation)?;

        let gpus = match enumerate_gpus(driver) {
            Ok(gpus) => gpus,
            Err(err) => {
                driver.destroy_instance();
                return Err(err);
            }
        };

        log::debug!("Device list:");
        for gpu in &gpus {
            log::debug!("\t{}", gpu.debug_string());
        }

        Ok(Self {
            layers,
            gpus,
            validation_enabled,
        })
    }

    pub fn layers(&self) -> &[vk::LayerProperties] {
        &self.layers
    }

    pub fn gpus(&self) -> &[GpuDescriptor] {
        &self.gpus
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn select_gpu(&self, selector: &dyn DeviceSelector) -> Result<usize, GpuSelectError> {
        let count = self.gpus.len();
        let index = selector
            .select(&self.gpus)
            .ok_or(GpuSelectError::Rejected(count))?;
        if index >= count {
            return Err(GpuSelectError::OutOfRange { index, count });
        }

        log::info!("Physical device selection result:");
        log::info!("{}", self.gpus[index].debug_string());

        Ok(index)
    }

    pub(crate) fn destroy(&self, driver: &mut dyn Driver) {
        log::debug!("destroying instance");
        driver.destroy_instance();
    }
}

/// Query-then-fetch until the layer count is stable between both calls.
fn enumerate_layers(driver: &dyn Driver) -> Result<Vec<vk::LayerProperties>, vk::Result> {
    loop {
        let count = driver.instance_layer_count()?;
        match driver.instance_layers(count)? {
            Some(layers) => return Ok(layers),
            None => log::warn!("instance layer count changed from {count} while enumerating, retrying"),
        }
    }
}

fn enumerate_gpus(driver: &dyn Driver) -> Result<Vec<GpuDescriptor>, InstanceCreateError> {
    let physical_devices = driver
        .enumerate_physical_devices()
        .map_err(InstanceCreateError::DeviceEnumeration)?;
    if physical_devices.is_empty() {
        return Err(InstanceCreateError::NoDevice);
    }

    physical_devices
        .into_iter()
        .map(|handle| {
            let properties = driver
                .device_properties(handle)
                .map_err(InstanceCreateError::DeviceQuery)?;
            let queue_families = driver
                .queue_family_properties(handle)
                .map_err(InstanceCreateError::DeviceQuery)?;
            let memory_properties = driver
                .memory_properties(handle)
                .map_err(InstanceCreateError::DeviceQuery)?;

            let gpu = GpuDescriptor {
                handle,
                queue_families,
                memory_properties,
                properties,
            };
            if gpu.queue_families.is_empty() {
                return Err(InstanceCreateError::NoQueueFamilies(gpu.name().to_owned()));
            }

            Ok(gpu)
        })
        .collect()
}
