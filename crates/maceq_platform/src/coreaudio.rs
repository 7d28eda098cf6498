//! CoreAudio HAL Backend
//!
//! Safe Rust wrappers around the CoreAudio property API for:
//! - Listing audio devices and their names
//! - Probing input/output stream configurations
//! - Reading and writing the system default devices
//! - Reading nominal sample rate and transport type
//!
//! # CoreAudio Concepts
//!
//! - AudioObject: Everything in CoreAudio is an object with properties
//! - AudioDevice: An audio endpoint (speakers, microphone, virtual device)
//! - Property address: selector + scope + element
//!
//! # Safety
//!
//! These functions use unsafe FFI calls but wrap them in safe Rust interfaces.

use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::slice;

use coreaudio_sys::{
    kAudioDevicePropertyNominalSampleRate, kAudioDevicePropertyScopeInput,
    kAudioDevicePropertyScopeOutput, kAudioDevicePropertyStreamConfiguration,
    kAudioDevicePropertyTransportType, kAudioDeviceTransportTypeAggregate,
    kAudioDeviceTransportTypeBluetooth, kAudioDeviceTransportTypeBuiltIn,
    kAudioDeviceTransportTypeUSB, kAudioDeviceTransportTypeVirtual,
    kAudioHardwarePropertyDefaultInputDevice, kAudioHardwarePropertyDefaultOutputDevice,
    kAudioHardwarePropertyDevices, kAudioObjectPropertyElementMain, kAudioObjectPropertyName,
    kAudioObjectPropertyScopeGlobal, kAudioObjectSystemObject, AudioBuffer, AudioBufferList,
    AudioDeviceID, AudioObjectGetPropertyData, AudioObjectGetPropertyDataSize, AudioObjectID,
    AudioObjectPropertyAddress, AudioObjectPropertyScope, AudioObjectPropertySelector,
    AudioObjectSetPropertyData,
};

// core-foundation handles CFString memory management and bridging to Rust strings
use core_foundation::base::TCFType;
use core_foundation::string::CFString;

use maceq_dsp::AudioFormat;
use tracing::trace;

use crate::error::PlatformError;
use crate::traits::{AudioHardware, DeviceId, Scope, TransportKind};

fn address(
    selector: AudioObjectPropertySelector,
    scope: AudioObjectPropertyScope,
) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: scope,
        mElement: kAudioObjectPropertyElementMain,
    }
}

fn stream_scope(scope: Scope) -> AudioObjectPropertyScope {
    match scope {
        Scope::Input => kAudioDevicePropertyScopeInput,
        Scope::Output => kAudioDevicePropertyScopeOutput,
    }
}

fn default_selector(scope: Scope) -> AudioObjectPropertySelector {
    match scope {
        Scope::Input => kAudioHardwarePropertyDefaultInputDevice,
        Scope::Output => kAudioHardwarePropertyDefaultOutputDevice,
    }
}

fn data_size(
    object: AudioObjectID,
    addr: &AudioObjectPropertyAddress,
    property: &'static str,
) -> Result<u32, PlatformError> {
    let mut size: u32 = 0;
    let status =
        unsafe { AudioObjectGetPropertyDataSize(object, addr, 0, ptr::null(), &mut size) };
    if status != 0 {
        return Err(PlatformError::PropertyQueryFailed { property, status });
    }
    Ok(size)
}

/// Read a fixed-size property value
///
/// `T` must match the property's C layout.
fn get_value<T: Copy + Default>(
    object: AudioObjectID,
    addr: &AudioObjectPropertyAddress,
    property: &'static str,
) -> Result<T, PlatformError> {
    let mut value = T::default();
    let mut size = mem::size_of::<T>() as u32;
    let status = unsafe {
        AudioObjectGetPropertyData(
            object,
            addr,
            0,
            ptr::null(),
            &mut size,
            &mut value as *mut T as *mut c_void,
        )
    };
    if status != 0 {
        return Err(PlatformError::PropertyQueryFailed { property, status });
    }
    Ok(value)
}

/// Convert a raw CFStringRef to a Rust String
///
/// # Safety
///
/// The cf_string must be a valid CFStringRef following the create rule. This
/// function takes ownership and releases it after conversion.
unsafe fn cf_string_to_string(cf_string_ref: *const c_void) -> Option<String> {
    if cf_string_ref.is_null() {
        return None;
    }
    let cf_string = CFString::wrap_under_create_rule(cf_string_ref as _);
    Some(cf_string.to_string())
}

/// Total channel count of a device's stream configuration on `scope`
fn channel_count(device: AudioDeviceID, scope: Scope) -> Result<u32, PlatformError> {
    let addr = address(kAudioDevicePropertyStreamConfiguration, stream_scope(scope));
    let mut size = data_size(device, &addr, "stream configuration")?;
    if (size as usize) < mem::size_of::<u32>() {
        return Ok(0);
    }

    // AudioBufferList is variable-length; u64 storage keeps it aligned
    let mut storage: Vec<u64> = vec![0; (size as usize + 7) / 8];
    let status = unsafe {
        AudioObjectGetPropertyData(
            device,
            &addr,
            0,
            ptr::null(),
            &mut size,
            storage.as_mut_ptr() as *mut c_void,
        )
    };
    if status != 0 {
        return Err(PlatformError::PropertyQueryFailed {
            property: "stream configuration",
            status,
        });
    }

    let channels = unsafe {
        let list = storage.as_ptr() as *const AudioBufferList;
        let count = (*list).mNumberBuffers as usize;
        let header = mem::size_of::<AudioBufferList>() - mem::size_of::<AudioBuffer>();
        let max_count = (size as usize).saturating_sub(header) / mem::size_of::<AudioBuffer>();
        slice::from_raw_parts((*list).mBuffers.as_ptr(), count.min(max_count))
            .iter()
            .map(|buffer| buffer.mNumberChannels)
            .sum()
    };
    Ok(channels)
}

/// CoreAudio HAL access for macOS
pub struct CoreAudioHardware;

impl CoreAudioHardware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoreAudioHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHardware for CoreAudioHardware {
    fn name(&self) -> &'static str {
        "CoreAudio"
    }

    fn device_ids(&self) -> Result<Vec<DeviceId>, PlatformError> {
        let addr = address(kAudioHardwarePropertyDevices, kAudioObjectPropertyScopeGlobal);
        let mut size = data_size(kAudioObjectSystemObject, &addr, "devices")?;

        let device_count = size as usize / mem::size_of::<AudioDeviceID>();
        if device_count == 0 {
            return Ok(Vec::new());
        }

        let mut device_ids: Vec<AudioDeviceID> = vec![0; device_count];
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &addr,
                0,
                ptr::null(),
                &mut size,
                device_ids.as_mut_ptr() as *mut c_void,
            )
        };
        if status != 0 {
            return Err(PlatformError::PropertyQueryFailed {
                property: "devices",
                status,
            });
        }

        // The device list may shrink between the two calls
        device_ids.truncate(size as usize / mem::size_of::<AudioDeviceID>());
        trace!("Found {} audio devices", device_ids.len());
        Ok(device_ids)
    }

    fn device_name(&self, id: DeviceId) -> Result<String, PlatformError> {
        let addr = address(kAudioObjectPropertyName, kAudioObjectPropertyScopeGlobal);
        let mut name_cf: *const c_void = ptr::null();
        let mut size = mem::size_of::<*const c_void>() as u32;

        let status = unsafe {
            AudioObjectGetPropertyData(
                id,
                &addr,
                0,
                ptr::null(),
                &mut size,
                &mut name_cf as *mut *const c_void as *mut c_void,
            )
        };
        if status != 0 {
            return Err(PlatformError::PropertyQueryFailed {
                property: "name",
                status,
            });
        }

        unsafe { cf_string_to_string(name_cf) }.ok_or(PlatformError::PropertyQueryFailed {
            property: "name",
            status: 0,
        })
    }

    fn has_streams(&self, id: DeviceId, scope: Scope) -> Result<bool, PlatformError> {
        Ok(channel_count(id, scope)? > 0)
    }

    fn default_device(&self, scope: Scope) -> Result<DeviceId, PlatformError> {
        let addr = address(default_selector(scope), kAudioObjectPropertyScopeGlobal);
        let id: AudioDeviceID = get_value(kAudioObjectSystemObject, &addr, "default device")?;
        // kAudioObjectUnknown
        if id == 0 {
            return Err(PlatformError::NoDefaultDevice(scope));
        }
        Ok(id)
    }

    fn set_default_device(&self, scope: Scope, id: DeviceId) -> Result<(), PlatformError> {
        let addr = address(default_selector(scope), kAudioObjectPropertyScopeGlobal);
        let device_id: AudioDeviceID = id;
        let status = unsafe {
            AudioObjectSetPropertyData(
                kAudioObjectSystemObject,
                &addr,
                0,
                ptr::null(),
                mem::size_of::<AudioDeviceID>() as u32,
                &device_id as *const AudioDeviceID as *const c_void,
            )
        };
        if status != 0 {
            return Err(PlatformError::PropertyWriteFailed {
                property: "default device",
                status,
            });
        }
        Ok(())
    }

    fn native_format(&self, id: DeviceId, scope: Scope) -> Result<AudioFormat, PlatformError> {
        let channels = channel_count(id, scope)?;
        if channels == 0 {
            return Err(PlatformError::FeatureNotAvailable(format!(
                "device {} has no {} streams",
                id, scope
            )));
        }

        let addr = address(
            kAudioDevicePropertyNominalSampleRate,
            kAudioObjectPropertyScopeGlobal,
        );
        let sample_rate: f64 = get_value(id, &addr, "nominal sample rate")?;

        Ok(AudioFormat::new(
            sample_rate.round() as u32,
            channels.min(u16::MAX as u32) as u16,
        ))
    }

    fn transport(&self, id: DeviceId) -> Result<TransportKind, PlatformError> {
        let addr = address(
            kAudioDevicePropertyTransportType,
            kAudioObjectPropertyScopeGlobal,
        );
        let transport: u32 = get_value(id, &addr, "transport type")?;

        Ok(match transport {
            t if t == kAudioDeviceTransportTypeVirtual => TransportKind::Virtual,
            t if t == kAudioDeviceTransportTypeAggregate => TransportKind::Aggregate,
            t if t == kAudioDeviceTransportTypeBuiltIn => TransportKind::BuiltIn,
            t if t == kAudioDeviceTransportTypeUSB => TransportKind::Usb,
            t if t == kAudioDeviceTransportTypeBluetooth => TransportKind::Bluetooth,
            _ => TransportKind::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_list_devices() {
        let hw = CoreAudioHardware::new();
        let ids = hw.device_ids().unwrap();
        assert!(!ids.is_empty());
        for id in ids {
            if let Ok(name) = hw.device_name(id) {
                println!(
                    "{}: {} (in: {:?}, out: {:?}, {:?})",
                    id,
                    name,
                    hw.has_streams(id, Scope::Input),
                    hw.has_streams(id, Scope::Output),
                    hw.transport(id)
                );
            }
        }
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_output_has_format() {
        let hw = CoreAudioHardware::new();
        let id = hw.default_device(Scope::Output).unwrap();
        let format = hw.native_format(id, Scope::Output).unwrap();
        assert!(format.sample_rate > 0);
        assert!(format.channels > 0);
    }
}
