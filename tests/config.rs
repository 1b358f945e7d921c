use std::io::Write;
use tessera::config::Config;
use tessera::{Backend, Format, PresentMode};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from_path(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn full_file_is_read() {
    let file = write_config(
        r#"
        [app]
        name = "viewer"
        debug = false

        [window]
        title = "Viewer"
        width = 800
        height = 600

        [graphics]
        backends = ["opengl"]
        present_mode = "immediate"
        buffer_count = 3
        format = "R8G8B8A8_UNorm"
        clear_color = [0.0, 0.0, 0.0, 1.0]
        "#,
    );

    let config = Config::load_from_path(file.path()).unwrap();
    assert_eq!(config.app.name, "viewer");
    assert!(!config.app.debug);
    assert_eq!((config.window.width, config.window.height), (800, 600));
    assert_eq!(config.backends().unwrap(), vec![Backend::OpenGL]);
    assert_eq!(config.present_mode().unwrap(), PresentMode::Immediate);
    assert_eq!(config.graphics.buffer_count, 3);
    assert_eq!(config.graphics.format, Format::R8G8B8A8_UNorm);

    let info = config.instance_info();
    assert_eq!(info.app_name, "viewer");
    assert!(!info.debug);
}

#[test]
fn malformed_file_names_the_path() {
    let file = write_config("[window\nwidth = ");
    let err = Config::load_from_path(file.path()).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Failed to parse config file"), "{}", message);
}

#[test]
fn wrong_value_type_is_an_error() {
    let file = write_config("[window]\nwidth = \"wide\"\n");
    assert!(Config::load_from_path(file.path()).is_err());
}
