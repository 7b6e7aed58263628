use ash::vk;

/// Coarse classification of every error produced while bootstrapping or managing resources,
/// so callers can decide on recovery without matching on each module's error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No physical device was enumerated.
    DeviceNotFound,
    /// No queue family satisfies the requirements, or a device has none at all.
    QueueNotFound,
    /// A format, tiling or surface property required by the layer is not supported.
    FormatUnsupported,
    /// Host, device or pool memory is exhausted, or no memory type is eligible.
    ResourceExhausted,
    /// A file the layer depends on could not be found or read.
    IoNotFound,
    /// Any other failed driver call.
    Driver,
}

impl ErrorKind {
    pub fn from_vk(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | vk::Result::ERROR_OUT_OF_POOL_MEMORY
            | vk::Result::ERROR_FRAGMENTED_POOL
            | vk::Result::ERROR_TOO_MANY_OBJECTS => Self::ResourceExhausted,
            vk::Result::ERROR_FORMAT_NOT_SUPPORTED => Self::FormatUnsupported,
            _ => Self::Driver,
        }
    }
}
