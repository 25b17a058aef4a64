pub mod keyboard;

use crate::core::test::DeviceTest;

/// Test names in menu order.
pub const NAMES: [&str; 7] = ["bluetooth", "keyboard", "tpm", "usb", "webcam", "wifi", "audio"];

/// Every device test, in menu order.
pub fn all() -> Vec<Box<dyn DeviceTest + Send + Sync>> {
    vec![
        Box::new(bluetooth::BluetoothTest),
        Box::new(keyboard::KeyboardTest),
        Box::new(tpm::TpmTest),
        Box::new(usb::UsbTest),
        Box::new(webcam::WebcamTest::default()),
        Box::new(wifi::WifiTest),
        Box::new(audio::AudioTest::default()),
    ]
}

/// The enabled tests, in menu order.
pub fn selected(names: &[String]) -> Vec<Box<dyn DeviceTest + Send + Sync>> {
    all()
        .into_iter()
        .filter(|test| names.iter().any(|name| name == test.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_names() {
        let names: Vec<_> = all().iter().map(|t| t.name()).collect();
        assert_eq!(names, NAMES);
    }

    #[test]
    fn test_selected_keeps_menu_order() {
        let picked = selected(&["wifi".to_string(), "tpm".to_string()]);
        let names: Vec<_> = picked.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["tpm", "wifi"]);
    }
}
