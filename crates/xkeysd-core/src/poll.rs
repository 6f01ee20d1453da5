// Xkeysd Device Poll Loop
// Multiplexes readiness across open hidraw handles with a bounded wait

use std::fs::File;
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::device::DeviceMapping;
use crate::replay::{replay, EventSink, SinkError};
use crate::report::{DeviceState, RawReport, MODE_OFFSET, REPORT_LEN, REPORT_MODE_READY};

/// Bounded wait so the loop stays responsive to shutdown with no input.
pub const DEFAULT_POLL_TIMEOUT_MS: i32 = 1000;

/// Errors from the poll loop
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("no devices left to serve")]
    NoDevices,
}

/// One configured device coupled with its open handle and last-seen report.
pub struct OpenDevice {
    mapping: DeviceMapping,
    file: File,
    state: DeviceState,
}

impl OpenDevice {
    /// Open the hidraw node for reading.
    pub fn open(mapping: DeviceMapping, node: &Path) -> Result<Self, PollError> {
        let file = File::open(node)?;
        info!("{}: opened {}", mapping.name(), node.display());
        Ok(Self {
            mapping,
            file,
            state: DeviceState::new(),
        })
    }

    pub fn mapping(&self) -> &DeviceMapping {
        &self.mapping
    }

    /// Read exactly one report and run it through differ and replay.
    fn service(&mut self, sink: &mut impl EventSink) -> Result<(), PollError> {
        let mut report: RawReport = [0; REPORT_LEN];
        let n = self.file.read(&mut report)?;
        if n != REPORT_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("short report: {} of {} bytes", n, REPORT_LEN),
            )
            .into());
        }

        if report[MODE_OFFSET] != REPORT_MODE_READY {
            debug!(
                "{}: warm-up report (mode {:#04x})",
                self.mapping.name(),
                report[MODE_OFFSET]
            );
        }

        for transition in self.state.advance(&report) {
            replay(&self.mapping, &transition, sink)?;
        }
        Ok(())
    }
}

/// Single-threaded readiness multiplexer over all open devices.
///
/// A device whose read fails is dropped from the set and the loop keeps
/// serving the rest; sink failures propagate immediately because the sink
/// is shared. The loop ends once no devices remain.
pub struct DeviceLoop {
    devices: Vec<OpenDevice>,
}

impl DeviceLoop {
    pub fn new(devices: Vec<OpenDevice>) -> Result<Self, PollError> {
        if devices.is_empty() {
            return Err(PollError::NoDevices);
        }
        Ok(Self { devices })
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Wait up to `timeout_ms` for readiness and service every ready device
    /// for exactly one report each. Returns the number of serviced devices;
    /// timeouts and EINTR return zero so the caller can re-check its
    /// shutdown flag.
    pub fn poll_once(
        &mut self,
        timeout_ms: i32,
        sink: &mut impl EventSink,
    ) -> Result<usize, PollError> {
        let mut fds: Vec<libc::pollfd> = self
            .devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            // A delivered signal (e.g. SIGTERM) interrupts poll; treat it
            // like a timeout so the caller sees its running flag.
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(0);
            }
            return Err(err.into());
        }
        if ready == 0 {
            return Ok(0);
        }

        let mut serviced = 0;
        let mut failed = Vec::new();
        for (i, device) in self.devices.iter_mut().enumerate() {
            let revents = fds[i].revents;
            if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                warn!("{}: device hung up, disabling", device.mapping.name());
                failed.push(i);
                continue;
            }
            if revents & libc::POLLIN == 0 {
                continue;
            }

            match device.service(sink) {
                Ok(()) => serviced += 1,
                // Sink failures are fatal; the virtual device is shared.
                Err(PollError::Sink(e)) => return Err(e.into()),
                Err(e) => {
                    warn!("{}: read failed ({}), disabling", device.mapping.name(), e);
                    failed.push(i);
                }
            }
        }

        if !failed.is_empty() {
            let mut index = 0;
            self.devices.retain(|_| {
                let keep = !failed.contains(&index);
                index += 1;
                keep
            });
            if self.devices.is_empty() {
                return Err(PollError::NoDevices);
            }
        }

        Ok(serviced)
    }

    /// Poll until the shutdown flag is raised or no devices remain.
    pub fn run(
        &mut self,
        sink: &mut impl EventSink,
        shutdown: &AtomicBool,
        timeout_ms: i32,
    ) -> Result<(), PollError> {
        while !shutdown.load(Ordering::SeqCst) {
            self.poll_once(timeout_ms, sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    #[test]
    fn test_empty_device_set_is_rejected() {
        assert!(matches!(DeviceLoop::new(Vec::new()), Err(PollError::NoDevices)));
    }

    #[test]
    fn test_open_missing_node_fails() {
        let mapping = DeviceMapping::new(
            "ghost",
            DeviceId::Path("/dev/hidraw-does-not-exist".into()),
        );
        assert!(matches!(
            OpenDevice::open(mapping, Path::new("/dev/hidraw-does-not-exist")),
            Err(PollError::Io(_))
        ));
    }
}
