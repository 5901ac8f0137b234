//! Capability probe and revision detection.
//!
//! Board revisions differ only in which chips are populated, so the probe
//! tries to bring up the three fixed-address expanders and the decision is
//! made on the presence pattern alone. A NACK, a timeout and a panicking
//! driver all mean "absent".

use labkit_common::consts::{
    HEADER_EXPANDER_ADDRESS, INTERNAL_EXPANDER_ADDRESS, VERSION_EXPANDER_ADDRESS,
};
use labkit_common::hal::error::{BringupFailure, HalError};
use labkit_common::hal::types::{HardwareRevision, McuFamily};
use tracing::{error, info, warn};

use crate::bus::SharedI2c;
use crate::expander::ExpanderHandle;
use crate::slot::contained;

/// Expanders that answered, plus the reasons for those that did not.
#[derive(Default)]
pub struct ProbeResult {
    /// 0x20: buttons and display control lines.
    pub internal: Option<ExpanderHandle>,
    /// 0x21: header and terminal lines.
    pub header: Option<ExpanderHandle>,
    /// 0x27: version identification.
    pub version: Option<ExpanderHandle>,
    /// Expanders that did not answer, with the reason.
    pub failures: Vec<BringupFailure>,
}

impl ProbeResult {
    /// Presence of (internal, header, version).
    pub fn pattern(&self) -> (bool, bool, bool) {
        (
            self.internal.is_some(),
            self.header.is_some(),
            self.version.is_some(),
        )
    }

    /// Port value of the version expander, if it answered.
    ///
    /// A chip that was present at probe time but fails this read is treated
    /// like an absent one.
    pub fn version_byte(&self) -> Option<u8> {
        let chip = self.version.as_ref()?;
        match chip.read_port() {
            Ok(byte) => Some(byte),
            Err(e) => {
                warn!("version expander read failed: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (internal, header, version) = self.pattern();
        f.debug_struct("ProbeResult")
            .field("internal", &internal)
            .field("header", &header)
            .field("version", &version)
            .field("failures", &self.failures)
            .finish()
    }
}

/// Try each expander address in order, containing every attempt.
pub fn probe_expanders(i2c: &SharedI2c) -> ProbeResult {
    let mut result = ProbeResult::default();

    let mut attempt = |name: &'static str, address: u8| -> Option<ExpanderHandle> {
        match contained(name, || ExpanderHandle::bring_up(i2c.clone(), address)) {
            Ok(handle) => Some(handle),
            Err(failure) => {
                result.failures.push(failure);
                None
            }
        }
    };

    let internal = attempt("internal_expander", INTERNAL_EXPANDER_ADDRESS);
    let header = attempt("header_expander", HEADER_EXPANDER_ADDRESS);
    let version = attempt("version_expander", VERSION_EXPANDER_ADDRESS);

    result.internal = internal;
    result.header = header;
    result.version = version;

    info!(
        "Probe: internal={} header={} version={}",
        result.internal.is_some(),
        result.header.is_some(),
        result.version.is_some()
    );
    result
}

/// Decide the revision from the MCU family and the probe outcome.
///
/// # Errors
/// `HalError::UnsupportedPlatform` for a family without board wiring.
pub fn detect_revision(
    family: McuFamily,
    probe: &ProbeResult,
) -> Result<HardwareRevision, HalError> {
    let revision = match family {
        McuFamily::F7Feather => {
            if probe.internal.is_none() {
                HardwareRevision::V1
            } else {
                HardwareRevision::V2 {
                    minor: probe.version_byte(),
                }
            }
        }
        McuFamily::F7CoreCompute | McuFamily::H7CoreCompute => {
            if probe.internal.is_none() {
                warn!("{} board without internal expander; buttons will be absent", family);
            }
            let minor = probe.version_byte();
            if family == McuFamily::F7CoreCompute {
                HardwareRevision::V3 { minor }
            } else {
                HardwareRevision::V4 { minor }
            }
        }
        McuFamily::Unsupported => {
            error!("No board wiring for this microcontroller family");
            return Err(HalError::UnsupportedPlatform(family.to_string()));
        }
    };

    info!("Detected hardware revision {}", revision);
    Ok(revision)
}
