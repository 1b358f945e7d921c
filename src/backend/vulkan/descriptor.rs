// Descriptor set layouts, sets and push-descriptor writes
//
// Each persistent set gets a pool sized for exactly its layout, so sets
// never compete for pool space and freeing a set is destroying its pool.

use super::buffer::VulkanBuffer;
use super::device::DeviceShared;
use super::sampler::VulkanSampler;
use super::texture::VulkanTexture;
use super::{cast, conv, VkCheck};
use crate::descriptor::{validate_descriptors, Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet, DescriptorType};
use crate::error::{Error, Result};
use ash::vk;
use std::any::Any;
use std::sync::Arc;

pub struct VulkanDescriptorLayout {
    device: Arc<DeviceShared>,
    pub(super) raw: vk::DescriptorSetLayout,
    info: DescriptorLayoutInfo,
}

impl VulkanDescriptorLayout {
    pub(super) fn new(device: Arc<DeviceShared>, info: &DescriptorLayoutInfo) -> Result<Self> {
        info.validate()?;
        if info.push_descriptor && device.push_descriptor_fn.is_none() {
            return Err(Error::unsupported("VK_KHR_push_descriptor is not available on this device"));
        }

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = info
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(conv::descriptor_type(b.ty))
                    .descriptor_count(1)
                    .stage_flags(conv::shader_stages(b.stages))
                    .build()
            })
            .collect();

        let flags = if info.push_descriptor {
            vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(flags)
            .bindings(&bindings);

        let raw = unsafe { device.device.create_descriptor_set_layout(&create_info, None) }
            .check("vkCreateDescriptorSetLayout")?;

        Ok(Self {
            device,
            raw,
            info: info.clone(),
        })
    }
}

impl DescriptorLayout for VulkanDescriptorLayout {
    fn info(&self) -> &DescriptorLayoutInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorLayout {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_descriptor_set_layout(self.raw, None) };
    }
}

pub struct VulkanDescriptorSet {
    device: Arc<DeviceShared>,
    pool: vk::DescriptorPool,
    pub(super) raw: vk::DescriptorSet,
    layout_info: DescriptorLayoutInfo,
}

impl VulkanDescriptorSet {
    pub(super) fn new(
        device: Arc<DeviceShared>,
        layout: &VulkanDescriptorLayout,
        descriptors: &[Descriptor<'_>],
    ) -> Result<Self> {
        if layout.info.push_descriptor {
            return Err(Error::invalid_usage(
                "push descriptor layouts are bound with push_descriptors, not descriptor sets",
            ));
        }
        validate_descriptors(&layout.info, descriptors)?;
        let writes = DescriptorWrites::new(descriptors)?;

        let pool_sizes: Vec<vk::DescriptorPoolSize> = [DescriptorType::ConstantBuffer, DescriptorType::Texture]
            .into_iter()
            .map(|ty| vk::DescriptorPoolSize {
                ty: conv::descriptor_type(ty),
                descriptor_count: layout.info.count_of(ty),
            })
            .filter(|size| size.descriptor_count > 0)
            .collect();

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.device.create_descriptor_pool(&pool_info, None) }
            .check("vkCreateDescriptorPool")?;

        let layouts = [layout.raw];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let raw = match unsafe { device.device.allocate_descriptor_sets(&alloc_info) }
            .check("vkAllocateDescriptorSets")
        {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe { device.device.destroy_descriptor_pool(pool, None) };
                return Err(e);
            }
        };

        unsafe { device.device.update_descriptor_sets(&writes.writes(raw), &[]) };

        Ok(Self {
            device,
            pool,
            raw,
            layout_info: layout.info.clone(),
        })
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn layout_info(&self) -> &DescriptorLayoutInfo {
        &self.layout_info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        // Destroying the pool frees the set.
        unsafe { self.device.device.destroy_descriptor_pool(self.pool, None) };
    }
}

enum WriteSource {
    Buffer(usize),
    Image(usize),
}

/// Native descriptor infos for a validated descriptor list. `writes` points
/// into this struct, so it has to outlive the update or push call.
pub(super) struct DescriptorWrites {
    buffers: Vec<vk::DescriptorBufferInfo>,
    images: Vec<vk::DescriptorImageInfo>,
    entries: Vec<(u32, vk::DescriptorType, WriteSource)>,
}

impl DescriptorWrites {
    pub fn new(descriptors: &[Descriptor<'_>]) -> Result<Self> {
        let mut writes = Self {
            buffers: Vec::new(),
            images: Vec::new(),
            entries: Vec::with_capacity(descriptors.len()),
        };

        for descriptor in descriptors {
            let ty = conv::descriptor_type(descriptor.ty);
            match descriptor.ty {
                DescriptorType::ConstantBuffer => {
                    let buffer = descriptor
                        .buffer
                        .ok_or_else(|| Error::invalid_usage("constant buffer descriptor without a buffer"))?;
                    let buffer = cast::<VulkanBuffer>(buffer.as_any(), "buffer")?;
                    writes.buffers.push(vk::DescriptorBufferInfo {
                        buffer: buffer.raw,
                        offset: descriptor.buffer_offset as u64,
                        range: descriptor.resolved_range() as u64,
                    });
                    writes
                        .entries
                        .push((descriptor.binding, ty, WriteSource::Buffer(writes.buffers.len() - 1)));
                }
                DescriptorType::Texture => {
                    let (texture, sampler) = descriptor
                        .texture
                        .zip(descriptor.sampler)
                        .ok_or_else(|| Error::invalid_usage("texture descriptor needs a texture and a sampler"))?;
                    let texture = cast::<VulkanTexture>(texture.as_any(), "texture")?;
                    let sampler = cast::<VulkanSampler>(sampler.as_any(), "sampler")?;
                    writes.images.push(vk::DescriptorImageInfo {
                        sampler: sampler.raw,
                        image_view: texture.view,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    });
                    writes
                        .entries
                        .push((descriptor.binding, ty, WriteSource::Image(writes.images.len() - 1)));
                }
            }
        }

        Ok(writes)
    }

    /// Writes targeting `set` (ignored by push descriptors).
    pub fn writes(&self, set: vk::DescriptorSet) -> Vec<vk::WriteDescriptorSet> {
        self.entries
            .iter()
            .map(|(binding, ty, source)| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty);
                match source {
                    WriteSource::Buffer(i) => write.buffer_info(std::slice::from_ref(&self.buffers[*i])).build(),
                    WriteSource::Image(i) => write.image_info(std::slice::from_ref(&self.images[*i])).build(),
                }
            })
            .collect()
    }
}
