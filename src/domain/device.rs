// Device domain model
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
}

impl Device {
    pub fn new(id: String, name: String) -> Self {
        let name = Self::display_name(&id, name);
        Self { id, name }
    }

    fn display_name(id: &str, name: String) -> String {
        // Unnamed devices fall back to their id so selectors never show blanks
        if name.trim().is_empty() {
            id.to_string()
        } else {
            name
        }
    }
}

/// One page of the tenant's device list as reported by the platform.
#[derive(Debug, Clone, Default)]
pub struct DevicePage {
    pub devices: Vec<Device>,
    pub has_next: bool,
}

/// Result of walking every device page.
///
/// `truncated` is set when pagination stopped early because a page request
/// failed. A truncated listing is otherwise indistinguishable from a short one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceListing {
    pub devices: Vec<Device>,
    pub truncated: bool,
}

impl DeviceListing {
    pub fn ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.id.clone()).collect()
    }

    pub fn name_of(&self, device_id: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.id == device_id)
            .map(|d| d.name.as_str())
    }
}
