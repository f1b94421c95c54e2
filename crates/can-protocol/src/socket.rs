//! Raw SocketCAN Socket
//!
//! Thin safe wrapper over a `PF_CAN`/`CAN_RAW` socket bound to one
//! interface. Receives are bounded by `SO_RCVTIMEO` so a reader thread never
//! blocks forever.

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::reader::FrameReader;
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;
use tracing::{debug, info};

/// Default receive timeout
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Raw CAN socket bound to a single interface
#[derive(Debug)]
pub struct CanSocket {
    fd: OwnedFd,
    interface: String,
    ifindex: u32,
}

impl CanSocket {
    /// Open a raw CAN socket on `interface` (e.g. "can0", "vcan0")
    pub fn open(interface: &str, recv_timeout: Duration) -> Result<Self, CanError> {
        let ifindex = interface_index(interface)?;

        // SAFETY: plain syscall, the return value is checked below
        let raw = unsafe {
            libc::socket(
                libc::PF_CAN,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::CAN_RAW,
            )
        };
        if raw < 0 {
            return Err(CanError::socket("create", io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        set_recv_timeout(&fd, recv_timeout)?;

        // SAFETY: sockaddr_can is plain old data, all-zero is a valid value
        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex as libc::c_int;

        // SAFETY: addr outlives the call and the length matches its type
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_can as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(CanError::socket("bind", io::Error::last_os_error()));
        }

        info!(
            "CAN socket bound: interface={}, ifindex={}, recv_timeout={:?}",
            interface, ifindex, recv_timeout
        );

        Ok(Self {
            fd,
            interface: interface.to_string(),
            ifindex,
        })
    }

    /// Name of the bound interface
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Kernel index of the bound interface
    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }
}

impl FrameReader for CanSocket {
    fn read_frame(&mut self) -> Result<Option<CanFrame>, CanError> {
        let mut frame = CanFrame::default();

        // SAFETY: the buffer is a live, writable CanFrame of exactly SIZE bytes
        let nbytes = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                &mut frame as *mut CanFrame as *mut libc::c_void,
                CanFrame::SIZE,
                0,
            )
        };

        if nbytes < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                    Ok(None)
                }
                _ => Err(CanError::socket("recv", err)),
            };
        }

        if nbytes as usize != CanFrame::SIZE {
            return Err(CanError::MalformedFrame(format!(
                "received {} bytes, expected {}",
                nbytes,
                CanFrame::SIZE
            )));
        }

        Ok(Some(frame))
    }

    fn close(self) {
        info!("Closing CAN socket on {}", self.interface);
        drop(self.fd);
    }
}

/// Resolve an interface name to its kernel index
fn interface_index(interface: &str) -> Result<u32, CanError> {
    let name = CString::new(interface)
        .map_err(|_| CanError::InterfaceNotFound(interface.to_string()))?;

    // SAFETY: `name` is a valid NUL-terminated string for the whole call
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    if index == 0 {
        debug!("if_nametoindex({}) failed: {}", interface, io::Error::last_os_error());
        return Err(CanError::InterfaceNotFound(interface.to_string()));
    }
    Ok(index)
}

/// A zero timeout would mean "block forever", so clamp to 1 ms
fn set_recv_timeout(fd: &OwnedFd, timeout: Duration) -> Result<(), CanError> {
    let timeout = timeout.max(Duration::from_millis(1));
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };

    // SAFETY: tv outlives the call and the length matches its type
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &tv as *const libc::timeval as *const libc::c_void,
            mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(CanError::socket("setsockopt", io::Error::last_os_error()));
    }
    Ok(())
}
