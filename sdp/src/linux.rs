//! Conversion of TCP socket descriptors to SDP on Linux.

use std::{io, os::unix::io::RawFd};

use crate::Converter;

// Not exported by libc, value from the OFED SDP module.
const AF_INET_SDP: libc::c_int = 27;

/// Replaces a TCP socket descriptor with a fresh SDP socket in place.
///
/// The descriptor number stays the same, so the caller keeps using it for the
/// bind or connect that follows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdpConverter;

impl Converter for SdpConverter {
    type Socket = RawFd;

    fn protocol(&self) -> &str {
        "SDP"
    }

    fn convert(&self, socket: &mut RawFd) -> io::Result<()> {
        // SAFETY: no pointers involved, failure is reported through the return value.
        let sdp = unsafe { libc::socket(AF_INET_SDP, libc::SOCK_STREAM, 0) };
        if sdp < 0 {
            return Err(io::Error::last_os_error());
        }

        let result = loop {
            // SAFETY: `sdp` is a descriptor we own, an invalid `socket` makes dup2 fail with EBADF.
            if unsafe { libc::dup2(sdp, *socket) } >= 0 {
                break Ok(());
            }
            let error = io::Error::last_os_error();
            if error.kind() != io::ErrorKind::Interrupted {
                break Err(error);
            }
        };

        // SAFETY: `sdp` is still open and not used after this point.
        unsafe { libc::close(sdp) };
        result
    }
}
