// Runs against a real Vulkan 1.3 device when one is present. Machines
// without one (CI containers, most VMs) skip every test here.

use std::cell::Cell;
use tessera::backend::VulkanBackend;
use tessera::shader::{create_shader_module_from_spirv, TranspiledShader};
use tessera::{
    Backend, BackendRegistry, Buffer, BufferInfo, BufferUsage, ColorAttachmentInfo, ColorF, CommandList, Descriptor,
    DescriptorBinding, DescriptorLayoutInfo, DescriptorType, Device, Error, Format, InstanceInfo, RecordingState,
    ShaderStage, TextureInfo, TextureUsage, Transpiler,
};

struct Headless {
    device: Box<dyn Device>,
    _instance: Box<dyn tessera::Instance>,
}

fn headless() -> Option<Headless> {
    let mut registry = BackendRegistry::new();
    registry.register(VulkanBackend);

    let instance = match registry.create_instance(&InstanceInfo::new("tessera-tests", false)) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("skipping: no Vulkan instance ({})", e);
            return None;
        }
    };
    match instance.create_device(None, None) {
        Ok(device) => Some(Headless {
            device,
            _instance: instance,
        }),
        Err(e) => {
            eprintln!("skipping: no usable Vulkan device ({})", e);
            None
        }
    }
}

fn transfer_buffer(device: &dyn Device, data: &[u8]) -> Box<dyn Buffer> {
    let info = BufferInfo::new(BufferUsage::TRANSFER_BUFFER, data.len() as u32);
    device.create_buffer(&info, Some(data)).unwrap()
}

fn read_back(device: &dyn Device, buffer: &dyn Buffer) -> Vec<u8> {
    device.map(buffer).unwrap().to_vec()
}

#[test]
fn registry_reports_missing_vulkan_as_unsupported_platform() {
    let mut registry = BackendRegistry::new();
    registry.register(VulkanBackend);

    match registry.create_instance(&InstanceInfo::new("tessera-tests", false)) {
        Ok(instance) => assert_eq!(instance.backend(), Backend::Vulkan),
        Err(e) => assert!(matches!(e, Error::PlatformNotSupported(_)), "{:?}", e),
    }
}

#[test]
fn mapped_writes_read_back() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let buffer = transfer_buffer(device, &[0u8; 64]);
    {
        let mut mapping = device.map(buffer.as_ref()).unwrap();
        for (i, byte) in mapping.iter_mut().enumerate() {
            *byte = i as u8;
        }
    }

    let expected: Vec<u8> = (0..64).collect();
    assert_eq!(read_back(device, buffer.as_ref()), expected);
}

#[test]
fn update_buffer_writes_at_offset() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let buffer = transfer_buffer(device, &[0u8; 16]);
    device.update_buffer(buffer.as_ref(), 8, &[7u8; 8]).unwrap();

    let bytes = read_back(device, buffer.as_ref());
    assert_eq!(&bytes[..8], &[0u8; 8]);
    assert_eq!(&bytes[8..], &[7u8; 8]);

    let err = device.update_buffer(buffer.as_ref(), 12, &[0u8; 8]).unwrap_err();
    assert!(matches!(err, Error::InvalidUsage(_)));
}

#[test]
fn typed_writes_land_as_bytes() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let buffer = transfer_buffer(device, &[0u8; 16]);
    device.write_slice(buffer.as_ref(), 4, &[0x0403_0201u32, 0x0807_0605]).unwrap();

    let bytes = read_back(device, buffer.as_ref());
    assert_eq!(&bytes[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn lists_run_in_submission_order() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let first = transfer_buffer(device, &[1u8; 32]);
    let second = transfer_buffer(device, &[2u8; 16]);
    let target = transfer_buffer(device, &[0u8; 32]);

    let mut list_a = device.create_command_list().unwrap();
    list_a.begin().unwrap();
    list_a
        .copy_buffer_to_buffer(first.as_ref(), 0, target.as_ref(), 0, None)
        .unwrap();
    list_a.end().unwrap();

    let mut list_b = device.create_command_list().unwrap();
    list_b.begin().unwrap();
    list_b
        .copy_buffer_to_buffer(second.as_ref(), 0, target.as_ref(), 8, Some(16))
        .unwrap();
    list_b.end().unwrap();

    device.execute_command_list(list_a.as_mut()).unwrap();
    device.execute_command_list(list_b.as_mut()).unwrap();
    device.wait_idle().unwrap();

    let bytes = read_back(device, target.as_ref());
    assert_eq!(&bytes[..8], &[1u8; 8]);
    assert_eq!(&bytes[8..24], &[2u8; 16]);
    assert_eq!(&bytes[24..], &[1u8; 8]);
}

#[test]
fn begin_again_discards_the_unfinished_recording() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let source = transfer_buffer(device, &[9u8; 16]);
    let target = transfer_buffer(device, &[3u8; 16]);

    let mut list = device.create_command_list().unwrap();
    list.begin().unwrap();
    list.copy_buffer_to_buffer(source.as_ref(), 0, target.as_ref(), 0, None)
        .unwrap();

    // Restart without end; the copy above must never run.
    list.begin().unwrap();
    list.end().unwrap();
    device.execute_command_list(list.as_mut()).unwrap();
    device.wait_idle().unwrap();

    assert_eq!(read_back(device, target.as_ref()), vec![3u8; 16]);
}

#[test]
fn draws_need_a_pipeline_and_index_buffer() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let target_info = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 4, 4, 1, TextureUsage::COLOR_TARGET);
    let target = device.create_texture(&target_info, None).unwrap();

    let mut list = device.create_command_list().unwrap();
    list.begin().unwrap();
    list.begin_render_pass(&[ColorAttachmentInfo::clear(target.as_ref(), ColorF::BLACK)])
        .unwrap();
    assert!(matches!(list.draw(3, 0), Err(Error::InvalidUsage(_))));
    assert!(matches!(list.draw_indexed(3, 0, 0), Err(Error::InvalidUsage(_))));
    list.end_render_pass().unwrap();
    list.end().unwrap();
}

#[test]
fn oversized_mip_chains_are_rejected() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let usage = TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS;
    let info = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 256, 256, 40, usage);
    assert!(matches!(device.create_texture(&info, None), Err(Error::InvalidUsage(_))));
}

#[test]
fn recording_preconditions() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let mut list = device.create_command_list().unwrap();
    assert_eq!(list.state(), RecordingState::Unrecorded);
    assert!(matches!(list.draw(3, 0), Err(Error::InvalidUsage(_))));
    assert!(matches!(device.execute_command_list(list.as_mut()), Err(Error::InvalidUsage(_))));

    list.begin().unwrap();
    // Draws need a render pass.
    assert!(matches!(list.draw(3, 0), Err(Error::InvalidUsage(_))));
    list.end().unwrap();
    assert_eq!(list.state(), RecordingState::Recorded);

    device.execute_command_list(list.as_mut()).unwrap();
    // Lists are single-use until re-recorded.
    assert!(matches!(device.execute_command_list(list.as_mut()), Err(Error::InvalidUsage(_))));
    device.wait_idle().unwrap();

    list.begin().unwrap();
    list.end().unwrap();
    device.execute_command_list(list.as_mut()).unwrap();
    device.wait_idle().unwrap();
}

#[test]
fn transfers_are_rejected_inside_a_render_pass() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let target_info = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 4, 4, 1, TextureUsage::COLOR_TARGET);
    let target = device.create_texture(&target_info, None).unwrap();
    let src = transfer_buffer(device, &[0u8; 16]);
    let dst = transfer_buffer(device, &[0u8; 16]);

    let mut list = device.create_command_list().unwrap();
    list.begin().unwrap();
    list.begin_render_pass(&[ColorAttachmentInfo::clear(target.as_ref(), ColorF::new(0.0, 0.0, 0.0, 1.0))])
        .unwrap();
    let err = list
        .copy_buffer_to_buffer(src.as_ref(), 0, dst.as_ref(), 0, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidUsage(_)));
    // A pass cannot be left open across End.
    assert!(matches!(list.end(), Err(Error::InvalidUsage(_))));
    list.end_render_pass().unwrap();
    list.end().unwrap();

    device.execute_command_list(list.as_mut()).unwrap();
    device.wait_idle().unwrap();
}

#[test]
fn descriptor_sets_are_validated_against_their_layout() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let layout_info = DescriptorLayoutInfo::new(vec![DescriptorBinding::new(
        0,
        DescriptorType::ConstantBuffer,
        ShaderStage::VERTEX | ShaderStage::PIXEL,
    )]);
    let layout = device.create_descriptor_layout(&layout_info).unwrap();

    let constants = device
        .create_buffer(&BufferInfo::new(BufferUsage::CONSTANT_BUFFER, 256), None)
        .unwrap();
    let vertices = device
        .create_buffer(&BufferInfo::new(BufferUsage::VERTEX_BUFFER, 256), None)
        .unwrap();

    device
        .create_descriptor_set(layout.as_ref(), &[Descriptor::constant_buffer(0, constants.as_ref())])
        .unwrap();

    let wrong_usage = device.create_descriptor_set(layout.as_ref(), &[Descriptor::constant_buffer(0, vertices.as_ref())]);
    assert!(matches!(wrong_usage, Err(Error::InvalidUsage(_))));

    let unknown_binding =
        device.create_descriptor_set(layout.as_ref(), &[Descriptor::constant_buffer(3, constants.as_ref())]);
    assert!(matches!(unknown_binding, Err(Error::InvalidUsage(_))));

    let out_of_range = device.create_descriptor_set(
        layout.as_ref(),
        &[Descriptor::constant_buffer_range(0, constants.as_ref(), 128, 256)],
    );
    assert!(matches!(out_of_range, Err(Error::InvalidUsage(_))));
}

/// Records the backend it was asked for and refuses to translate.
struct RefusingTranspiler {
    asked_for: Cell<Option<Backend>>,
}

impl Transpiler for RefusingTranspiler {
    fn transpile(
        &self,
        _spirv: &[u8],
        _stage: ShaderStage,
        _entry_point: &str,
        backend: Backend,
    ) -> tessera::Result<TranspiledShader> {
        self.asked_for.set(Some(backend));
        Err(Error::unsupported("no cross-compiler in tests"))
    }
}

#[test]
fn transpiler_sees_the_device_backend() {
    let Some(gpu) = headless() else { return };
    let device = gpu.device.as_ref();

    let transpiler = RefusingTranspiler {
        asked_for: Cell::new(None),
    };
    let result = create_shader_module_from_spirv(device, &transpiler, ShaderStage::VERTEX, &[0u8; 4], "main");

    assert!(matches!(result, Err(Error::UnsupportedFeature(_))));
    assert_eq!(transpiler.asked_for.get(), Some(Backend::Vulkan));
}
