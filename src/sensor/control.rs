use std::sync::Arc;

use device_bus::{control::CameraControl, queue::DataInputQueue};

use crate::{
    catalog::SensorCatalog,
    config::keys,
    error::NodeResult,
    params::{ParamReader, ParamValue, Parameter, ParameterStore},
};

/// Runtime path into a running camera: parameter updates become one
/// `CameraControl` sent on the node's control stream.
pub struct ControlChannel {
    name: String,
    store: Arc<dyn ParameterStore>,
    catalog: &'static SensorCatalog,
    queue: Arc<DataInputQueue>,
}

fn as_u8(value: &ParamValue) -> Option<u8> {
    value.as_int().and_then(|v| u8::try_from(v).ok())
}

fn as_u32(value: &ParamValue) -> Option<u32> {
    value.as_int().and_then(|v| u32::try_from(v).ok())
}

impl ControlChannel {
    pub fn new(
        name: &str,
        store: Arc<dyn ParameterStore>,
        catalog: &'static SensorCatalog,
        queue: Arc<DataInputQueue>,
    ) -> Self {
        Self {
            name: name.to_string(),
            store,
            catalog,
            queue,
        }
    }

    pub fn stream(&self) -> &str {
        self.queue.name()
    }

    pub fn close(&self) {
        self.queue.close();
    }

    /// Applies the recognized subset of `params`. Names may be given with or
    /// without the node prefix; unknown names and values of the wrong type
    /// are skipped. Nothing is sent when no setting changed.
    pub fn apply_runtime_update(&self, params: &[Parameter]) -> NodeResult<()> {
        let reader = ParamReader::new(self.store.as_ref(), &self.name);
        let mut ctrl = CameraControl::new();
        let mut exposure_touched = false;
        let mut mode_touched = false;

        for param in params {
            let key = reader.local_name(&param.name).unwrap_or(param.name.as_str());
            let accepted = match key {
                keys::SET_MANUAL_EXPOSURE | keys::EXPOSURE | keys::ISO => {
                    let valid = match key {
                        keys::SET_MANUAL_EXPOSURE => param.value.as_bool().is_some(),
                        _ => as_u32(&param.value).is_some(),
                    };
                    exposure_touched |= valid;
                    mode_touched |= valid && key == keys::SET_MANUAL_EXPOSURE;
                    valid
                }
                keys::SHARPNESS => as_u8(&param.value)
                    .map(|v| {
                        ctrl.set_sharpness(v);
                    })
                    .is_some(),
                keys::LUMA_DENOISE => as_u8(&param.value)
                    .map(|v| {
                        ctrl.set_luma_denoise(v);
                    })
                    .is_some(),
                keys::CHROMA_DENOISE => as_u8(&param.value)
                    .map(|v| {
                        ctrl.set_chroma_denoise(v);
                    })
                    .is_some(),
                keys::FSYNC_MODE => param
                    .value
                    .as_str()
                    .and_then(|s| self.catalog.fsync_mode(s))
                    .map(|mode| {
                        ctrl.set_frame_sync_mode(mode);
                    })
                    .is_some(),
                _ => {
                    log::debug!("{}: ignoring runtime parameter {}", self.name, param.name);
                    continue;
                }
            };
            if accepted {
                reader.set(key, param.value.clone());
            } else {
                log::debug!(
                    "{}: ignoring {} = {} ({})",
                    self.name,
                    param.name,
                    param.value,
                    param.value.type_name()
                );
            }
        }

        if exposure_touched {
            // exposure and iso only take effect in manual mode
            if reader.get_bool(keys::SET_MANUAL_EXPOSURE)? {
                let exposure = reader.get_int(keys::EXPOSURE)?;
                let iso = reader.get_int(keys::ISO)?;
                ctrl.set_manual_exposure(exposure as u32, iso as u32);
            } else if mode_touched {
                ctrl.set_auto_exposure_enable();
            }
        }

        if ctrl.is_empty() {
            return Ok(());
        }
        log::info!("{}: sending control {:?}", self.name, ctrl);
        self.queue.send(ctrl)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "control_test.rs"]
mod control_test;
