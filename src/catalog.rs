use std::{collections::HashMap, sync::LazyLock};

use device_bus::pipeline::{CameraBoardSocket, FrameSyncMode, ImageOrientation, MonoResolution};

/// Static description of an image sensor model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorIdentity {
    pub name: &'static str,
    pub default_resolution: &'static str,
    pub allowed_resolutions: &'static [&'static str],
    pub color: bool,
}

impl SensorIdentity {
    pub fn allows(&self, resolution: &str) -> bool {
        self.allowed_resolutions.contains(&resolution)
    }
}

const SENSORS: &[SensorIdentity] = &[
    SensorIdentity {
        name: "IMX378",
        default_resolution: "1080P",
        allowed_resolutions: &["12MP", "4K", "1080P"],
        color: true,
    },
    SensorIdentity {
        name: "OV9282",
        default_resolution: "720P",
        allowed_resolutions: &["800P", "720P", "400P"],
        color: false,
    },
    SensorIdentity {
        name: "OV9782",
        default_resolution: "800P",
        allowed_resolutions: &["800P", "720P", "400P"],
        color: true,
    },
    SensorIdentity {
        name: "OV9281",
        default_resolution: "800P",
        allowed_resolutions: &["800P", "720P", "400P"],
        color: true,
    },
    SensorIdentity {
        name: "IMX214",
        default_resolution: "1080P",
        allowed_resolutions: &["13MP", "12MP", "4K", "1080P"],
        color: true,
    },
    SensorIdentity {
        name: "OV7750",
        default_resolution: "480P",
        allowed_resolutions: &["480P", "400P"],
        color: false,
    },
    SensorIdentity {
        name: "OV7251",
        default_resolution: "480P",
        allowed_resolutions: &["480P", "400P"],
        color: false,
    },
    SensorIdentity {
        name: "AR0234",
        default_resolution: "1200P",
        allowed_resolutions: &["1200P"],
        color: true,
    },
];

/// Process-wide lookup tables for sensors and the string forms of their
/// settings.
#[derive(Debug)]
pub struct SensorCatalog {
    sensors: Vec<SensorIdentity>,
    mono_resolutions: HashMap<&'static str, MonoResolution>,
    socket_names: HashMap<CameraBoardSocket, &'static str>,
    fsync_modes: HashMap<&'static str, FrameSyncMode>,
    orientations: HashMap<&'static str, ImageOrientation>,
}

impl SensorCatalog {
    pub fn builtin() -> &'static SensorCatalog {
        static CATALOG: LazyLock<SensorCatalog> = LazyLock::new(SensorCatalog::new);
        &CATALOG
    }

    fn new() -> Self {
        Self {
            sensors: SENSORS.to_vec(),
            mono_resolutions: HashMap::from([
                ("400P", MonoResolution::The400P),
                ("480P", MonoResolution::The480P),
                ("720P", MonoResolution::The720P),
                ("800P", MonoResolution::The800P),
                ("1200P", MonoResolution::The1200P),
            ]),
            socket_names: HashMap::from([
                (CameraBoardSocket::Auto, "rgb"),
                (CameraBoardSocket::CamA, "rgb"),
                (CameraBoardSocket::CamB, "left"),
                (CameraBoardSocket::CamC, "right"),
                (CameraBoardSocket::CamD, "left_back"),
                (CameraBoardSocket::CamE, "right_back"),
            ]),
            fsync_modes: HashMap::from([
                ("OFF", FrameSyncMode::Off),
                ("OUTPUT", FrameSyncMode::Output),
                ("INPUT", FrameSyncMode::Input),
            ]),
            orientations: HashMap::from([
                ("NORMAL", ImageOrientation::Normal),
                ("HORIZONTAL_MIRROR", ImageOrientation::HorizontalMirror),
                ("VERTICAL_FLIP", ImageOrientation::VerticalFlip),
                ("ROTATE_180_DEG", ImageOrientation::Rotate180),
                ("AUTO", ImageOrientation::Auto),
            ]),
        }
    }

    pub fn sensors(&self) -> &[SensorIdentity] {
        &self.sensors
    }

    pub fn sensor(&self, name: &str) -> Option<&SensorIdentity> {
        self.sensors.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn mono_resolution(&self, name: &str) -> Option<MonoResolution> {
        self.mono_resolutions.get(name).copied()
    }

    pub fn socket_name(&self, socket: CameraBoardSocket) -> &'static str {
        self.socket_names.get(&socket).copied().unwrap_or("unknown")
    }

    pub fn fsync_mode(&self, name: &str) -> Option<FrameSyncMode> {
        self.fsync_modes.get(name).copied()
    }

    pub fn orientation(&self, name: &str) -> Option<ImageOrientation> {
        self.orientations.get(name).copied()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod catalog_test;
