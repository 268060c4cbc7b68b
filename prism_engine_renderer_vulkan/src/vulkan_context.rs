/// GpuContext - instance, physical/logical device, queues and surface
///
/// Also holds the [`ResourceTable`]: the arenas command lists resolve handles
/// against while recording. The table is shared (`Arc<RwLock>`) between the
/// device, which creates and destroys objects, and its command lists.

use ash::vk;
use prism_engine::graphics_device::{BufferHandle, DescriptorSetHandle, DeviceLimits, PipelineHandle};
use prism_engine::prism::render::RendererConfig;
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::SlotMap;
use std::ffi::CString;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_pipeline::Pipeline;

/// Queue family indices picked for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    /// A transfer-only family when the GPU has one, otherwise the graphics family
    pub transfer: u32,
}

impl QueueFamilies {
    /// Uploads cross queue families and need ownership barriers
    pub fn has_dedicated_transfer(&self) -> bool {
        self.transfer != self.graphics
    }

    /// Distinct family indices, one queue is created for each
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.present, self.transfer];
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// Pick graphics, present and transfer families from a family list
///
/// `supports_present` reports surface support for a family index.
pub(crate) fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let graphics = families
        .iter()
        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

    let present = if supports_present(graphics) {
        graphics
    } else {
        (0..families.len() as u32).find(|&i| supports_present(i))?
    };

    let transfer = families
        .iter()
        .position(|qf| {
            qf.queue_flags.contains(vk::QueueFlags::TRANSFER)
                && !qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|i| i as u32)
        .unwrap_or(graphics);

    Some(QueueFamilies { graphics, present, transfer })
}

/// Arenas command lists resolve handles against
#[derive(Default)]
pub(crate) struct ResourceTable {
    pub buffers: SlotMap<BufferHandle, Buffer>,
    pub pipelines: SlotMap<PipelineHandle, Pipeline>,
    pub descriptor_sets: SlotMap<DescriptorSetHandle, DescriptorSet>,
}

pub(crate) type SharedResources = Arc<RwLock<ResourceTable>>;

pub(crate) fn read_resources(resources: &SharedResources) -> Result<RwLockReadGuard<'_, ResourceTable>> {
    resources
        .read()
        .map_err(|_| engine_err!("prism::vulkan", "Resource table lock poisoned"))
}

pub(crate) fn write_resources(resources: &SharedResources) -> Result<RwLockWriteGuard<'_, ResourceTable>> {
    resources
        .write()
        .map_err(|_| engine_err!("prism::vulkan", "Resource table lock poisoned"))
}

/// Shared GPU context: everything created once at startup and destroyed last
pub(crate) struct GpuContext {
    /// Vulkan entry (keeps the loader alive)
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub transfer_queue: vk::Queue,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
    pub limits: DeviceLimits,
    /// Maximum sampler anisotropy, `None` when the feature is unsupported
    pub max_anisotropy: Option<f32>,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Create instance, surface, device and queues for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| CString::from(c"Prism Application"));
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            #[allow(unused_mut)]
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            let validation = validation_enabled(config);
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };
            #[cfg(feature = "vulkan-validation")]
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                Some(create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };

            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("prism::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let (physical_device, families) = pick_physical_device(&instance, &surface_loader, surface)?;
            let properties = instance.get_physical_device_properties(physical_device);
            let supported = instance.get_physical_device_features(physical_device);

            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            engine_info!("prism::vulkan", "Using GPU '{}' (graphics family {}, present family {}, transfer family {})",
                device_name, families.graphics, families.present, families.transfer);

            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
                .unique()
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE);

            // Variable-size sampler arrays, rewritten while earlier frames still use them
            let mut indexing_features = vk::PhysicalDeviceVulkan12Features::default()
                .runtime_descriptor_array(true)
                .descriptor_binding_partially_bound(true)
                .descriptor_binding_variable_descriptor_count(true)
                .descriptor_binding_sampled_image_update_after_bind(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features)
                .push_next(&mut indexing_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(families.graphics, 0);
            let present_queue = device.get_device_queue(families.present, 0);
            let transfer_queue = device.get_device_queue(families.transfer, 0);

            let limits = DeviceLimits {
                min_uniform_buffer_offset_alignment: properties.limits.min_uniform_buffer_offset_alignment,
                max_push_constants_size: properties.limits.max_push_constants_size,
                max_bound_descriptor_sets: properties.limits.max_bound_descriptor_sets,
            };
            let max_anisotropy = (supported.sampler_anisotropy == vk::TRUE)
                .then(|| properties.limits.max_sampler_anisotropy.min(16.0));

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                families,
                graphics_queue,
                present_queue,
                transfer_queue,
                surface,
                surface_loader,
                limits,
                max_anisotropy,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            })
        }
    }

    /// Destroy device, surface, messenger and instance
    ///
    /// # Safety
    ///
    /// Every object created from the device must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        self.device.destroy_device(None);
        self.surface_loader.destroy_surface(self.surface, None);
        #[cfg(feature = "vulkan-validation")]
        if let Some((loader, messenger)) = self.debug_messenger.take() {
            loader.destroy_debug_utils_messenger(messenger, None);
            crate::debug::print_validation_stats_report();
        }
        self.instance.destroy_instance(None);
    }
}

fn validation_enabled(config: &RendererConfig) -> bool {
    if cfg!(feature = "vulkan-validation") {
        return config.enable_validation;
    }
    if config.enable_validation {
        engine_warn!("prism::vulkan",
            "Validation requested but the crate was built without the 'vulkan-validation' feature");
    }
    false
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
    crate::debug::reset_validation_stats();

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::messenger_severity())
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| {
            engine_error!("prism::vulkan", "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;
    Ok((debug_utils, messenger))
}

/// First suitable GPU, discrete GPUs preferred
unsafe fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| {
            engine_error!("prism::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

    let mut candidates: Vec<(vk::PhysicalDevice, QueueFamilies, bool)> = Vec::new();
    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);
        if properties.api_version < vk::API_VERSION_1_2 {
            continue;
        }
        if !supports_swapchain(instance, physical_device) || !supports_descriptor_indexing(instance, physical_device) {
            continue;
        }
        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let Some(families) = select_queue_families(&queue_families, |i| {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        }) else {
            continue;
        };
        let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
        candidates.push((physical_device, families, discrete));
    }

    candidates.sort_by_key(|(_, _, discrete)| !discrete);
    candidates
        .into_iter()
        .next()
        .map(|(physical_device, families, _)| (physical_device, families))
        .ok_or_else(|| {
            engine_error!("prism::vulkan", "No Vulkan 1.2 GPU with presentation and descriptor indexing support found");
            Error::InitializationFailed("No suitable GPU found".to_string())
        })
}

unsafe fn supports_swapchain(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    let Ok(extensions) = instance.enumerate_device_extension_properties(physical_device) else {
        return false;
    };
    extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .map(|name| name == ash::khr::swapchain::NAME)
            .unwrap_or(false)
    })
}

unsafe fn supports_descriptor_indexing(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    let mut indexing = vk::PhysicalDeviceVulkan12Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
    instance.get_physical_device_features2(physical_device, &mut features);

    indexing.runtime_descriptor_array == vk::TRUE
        && indexing.descriptor_binding_partially_bound == vk::TRUE
        && indexing.descriptor_binding_variable_descriptor_count == vk::TRUE
        && indexing.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
}

#[cfg(test)]
#[path = "vulkan_context_tests.rs"]
mod tests;
