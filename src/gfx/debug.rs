use std::{borrow::Cow, ffi::CStr};

use ash::{ext, prelude::VkResult, vk};

unsafe extern "system" fn forward_to_log(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() {
        return vk::FALSE;
    }

    // SAFETY: the loader hands us a valid callback data pointer for the duration of the call.
    let callback_data = unsafe { *callback_data };
    let message = match callback_data.p_message.is_null() {
        true => Cow::from(""),
        // SAFETY: non-null messages are NUL-terminated strings owned by the loader.
        false => unsafe { CStr::from_ptr(callback_data.p_message) }.to_string_lossy(),
    };

    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => log::Level::Trace,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        _ => log::Level::Error,
    };
    log::log!(
        target: "fugu::validation",
        level,
        "{message_type:?} [ID: {}] {message}",
        callback_data.message_id_number
    );

    vk::FALSE
}

/// Debug utils messenger routing validation output into `log`.
pub(crate) struct DebugMessenger {
    handle: vk::DebugUtilsMessengerEXT,
    loader: ext::debug_utils::Instance,
}

impl DebugMessenger {
    pub(crate) fn create(entry: &ash::Entry, instance: &ash::Instance) -> VkResult<Self> {
        let loader = ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_log));
        // SAFETY: the instance outlives the messenger, it is dropped before the instance is
        // destroyed.
        let handle = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;

        Ok(Self { handle, loader })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        log::debug!("destroying debug messenger");
        // SAFETY: see `create`, the instance is still alive at this point.
        unsafe { self.loader.destroy_debug_utils_messenger(self.handle, None) };
    }
}
