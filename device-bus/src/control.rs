use crate::pipeline::FrameSyncMode;

pub const EXPOSURE_RANGE_US: (u32, u32) = (1, 33_000);
pub const ISO_RANGE: (u32, u32) = (100, 1600);
pub const FILTER_RANGE: (u8, u8) = (0, 4);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManualExposure {
    pub exposure_us: u32,
    pub iso: u32,
}

/// A batch of sensor settings sent through a control input. Unset fields
/// leave the sensor untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraControl {
    pub auto_exposure: bool,
    pub manual_exposure: Option<ManualExposure>,
    pub sharpness: Option<u8>,
    pub luma_denoise: Option<u8>,
    pub chroma_denoise: Option<u8>,
    pub frame_sync_mode: Option<FrameSyncMode>,
}

impl CameraControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_auto_exposure_enable(&mut self) -> &mut Self {
        self.auto_exposure = true;
        self.manual_exposure = None;
        self
    }

    pub fn set_manual_exposure(&mut self, exposure_us: u32, iso: u32) -> &mut Self {
        self.auto_exposure = false;
        self.manual_exposure = Some(ManualExposure { exposure_us, iso });
        self
    }

    pub fn set_sharpness(&mut self, value: u8) -> &mut Self {
        self.sharpness = Some(value);
        self
    }

    pub fn set_luma_denoise(&mut self, value: u8) -> &mut Self {
        self.luma_denoise = Some(value);
        self
    }

    pub fn set_chroma_denoise(&mut self, value: u8) -> &mut Self {
        self.chroma_denoise = Some(value);
        self
    }

    pub fn set_frame_sync_mode(&mut self, mode: FrameSyncMode) -> &mut Self {
        self.frame_sync_mode = Some(mode);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Current settings of one sensor, as last applied on the device.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorControlState {
    pub auto_exposure: bool,
    pub exposure_us: u32,
    pub iso: u32,
    pub sharpness: u8,
    pub luma_denoise: u8,
    pub chroma_denoise: u8,
    pub frame_sync_mode: FrameSyncMode,
    pub applied: u64,
}

impl Default for SensorControlState {
    fn default() -> Self {
        Self {
            auto_exposure: true,
            exposure_us: 20_000,
            iso: 800,
            sharpness: 1,
            luma_denoise: 1,
            chroma_denoise: 1,
            frame_sync_mode: FrameSyncMode::Off,
            applied: 0,
        }
    }
}

impl SensorControlState {
    /// Applies a control batch. Values outside the sensor limits are clamped.
    pub fn apply(&mut self, ctrl: &CameraControl) {
        if ctrl.auto_exposure {
            self.auto_exposure = true;
        }
        if let Some(manual) = ctrl.manual_exposure {
            self.auto_exposure = false;
            self.exposure_us = manual
                .exposure_us
                .clamp(EXPOSURE_RANGE_US.0, EXPOSURE_RANGE_US.1);
            self.iso = manual.iso.clamp(ISO_RANGE.0, ISO_RANGE.1);
        }
        if let Some(v) = ctrl.sharpness {
            self.sharpness = v.clamp(FILTER_RANGE.0, FILTER_RANGE.1);
        }
        if let Some(v) = ctrl.luma_denoise {
            self.luma_denoise = v.clamp(FILTER_RANGE.0, FILTER_RANGE.1);
        }
        if let Some(v) = ctrl.chroma_denoise {
            self.chroma_denoise = v.clamp(FILTER_RANGE.0, FILTER_RANGE.1);
        }
        if let Some(mode) = ctrl.frame_sync_mode {
            self.frame_sync_mode = mode;
        }
        self.applied += 1;
    }
}
