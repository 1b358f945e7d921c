// =============================================================================
// CONFIGURATION - Load settings from tessera.toml
// =============================================================================
//
// Application bootstrap settings: which backends to try (in order), the
// window, and the swapchain. Missing files and missing keys fall back to
// defaults; a malformed file is an error with the path attached.

use crate::backend::{OpenGlBackend, VulkanBackend};
use crate::format::Format;
use crate::geometry::{ColorF, Size2D};
use crate::instance::{Backend, BackendRegistry, InstanceInfo};
use crate::surface::Surface;
use crate::swapchain::{PresentMode, SwapchainInfo};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "tessera.toml";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    /// Validation layers / debug device.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "tessera".to_string(),
            debug: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Tessera".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Backend names in order of preference.
    pub backends: Vec<String>,
    pub present_mode: String,
    pub buffer_count: u32,
    pub format: Format,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backends: vec!["vulkan".to_string(), "d3d11".to_string(), "opengl".to_string()],
            present_mode: "vsync".to_string(),
            buffer_count: 2,
            format: Format::B8G8R8A8_UNorm,
            clear_color: [0.1, 0.2, 0.8, 1.0],
        }
    }
}

impl Config {
    /// Load `tessera.toml` from the working directory, falling back to
    /// defaults if it is missing or broken.
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            log::warn!("Failed to load {}: {:#}. Using defaults.", DEFAULT_CONFIG_PATH, e);
            Config::default()
        })
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn backends(&self) -> Result<Vec<Backend>> {
        self.graphics
            .backends
            .iter()
            .map(|name| name.parse::<Backend>().with_context(|| format!("in [graphics] backends: {:?}", name)))
            .collect()
    }

    pub fn present_mode(&self) -> Result<PresentMode> {
        self.graphics
            .present_mode
            .parse()
            .with_context(|| format!("in [graphics] present_mode: {:?}", self.graphics.present_mode))
    }

    pub fn clear_color(&self) -> ColorF {
        let [r, g, b, a] = self.graphics.clear_color;
        ColorF::new(r, g, b, a)
    }

    pub fn instance_info(&self) -> InstanceInfo {
        InstanceInfo::new(self.app.name.clone(), self.app.debug)
    }

    pub fn swapchain_info<'a>(&self, surface: &'a dyn Surface, size: Size2D) -> Result<SwapchainInfo<'a>> {
        Ok(SwapchainInfo {
            surface,
            format: self.graphics.format,
            size,
            present_mode: self.present_mode()?,
            num_buffers: self.graphics.buffer_count,
        })
    }

    /// Register the configured backends, in order. Backends this build
    /// cannot provide are skipped with a warning.
    pub fn register_backends(&self, registry: &mut BackendRegistry) -> Result<()> {
        for backend in self.backends()? {
            match backend {
                Backend::Vulkan => {
                    registry.register(VulkanBackend);
                }
                Backend::OpenGL => {
                    registry.register(OpenGlBackend);
                }
                #[cfg(windows)]
                Backend::D3D11 => {
                    registry.register(crate::backend::D3D11Backend);
                }
                #[cfg(not(windows))]
                Backend::D3D11 => {
                    log::warn!("D3D11 is only available on Windows; skipping");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.backends().unwrap(),
            vec![Backend::Vulkan, Backend::D3D11, Backend::OpenGL]
        );
        assert_eq!(config.present_mode().unwrap(), PresentMode::VSyncOn);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [window]
            width = 640

            [graphics]
            backends = ["gl", "vulkan"]
            format = "R8G8B8A8_UNorm"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.format, Format::R8G8B8A8_UNorm);
        assert_eq!(config.backends().unwrap(), vec![Backend::OpenGL, Backend::Vulkan]);
        assert_eq!(config.graphics.buffer_count, 2);
    }

    #[test]
    fn bad_names_are_reported() {
        let mut config = Config::default();
        config.graphics.backends = vec!["metal".to_string()];
        assert!(config.backends().is_err());

        config.graphics.present_mode = "triple".to_string();
        assert!(config.present_mode().is_err());
    }

    #[test]
    fn registration_follows_config_order() {
        let mut config = Config::default();
        config.graphics.backends = vec!["opengl".to_string(), "vulkan".to_string()];

        let mut registry = BackendRegistry::new();
        config.register_backends(&mut registry).unwrap();
        assert_eq!(registry.backends(), vec![Backend::OpenGL, Backend::Vulkan]);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
