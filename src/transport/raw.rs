//! AF_PACKET raw socket bound to one interface.
//!
//! Frames are sent and received whole, Ethernet header included. The socket
//! is non-blocking and driven by Tokio's reactor. Opening one requires
//! `CAP_NET_RAW`.

use crate::error::Result;
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

pub struct RawSocket {
    fd: AsyncFd<OwnedFd>,
    interface: String,
}

impl RawSocket {
    /// Opens a packet socket that sees every protocol on `interface`.
    /// Must be called from within a Tokio runtime.
    pub fn bind(interface: &str) -> Result<Self> {
        let protocol = (libc::ETH_P_ALL as u16).to_be();
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::c_int::from(protocol),
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let owned_fd = unsafe { OwnedFd::from_raw_fd(fd) };

        bind_interface(owned_fd.as_raw_fd(), interface, protocol)?;
        info!(interface, "raw socket bound");

        Ok(Self {
            fd: AsyncFd::new(owned_fd)?,
            interface: interface.to_string(),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Transmits one complete Ethernet frame.
    pub async fn send(&self, frame: &[u8]) -> Result<usize> {
        loop {
            let mut guard = self.fd.writable().await?;
            let sent = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::send(
                        inner.as_raw_fd(),
                        frame.as_ptr() as *const libc::c_void,
                        frame.len(),
                        0,
                    )
                };
                if rc < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(rc as usize)
                }
            });
            match sent {
                Ok(result) => {
                    let sent = result?;
                    debug!(bytes = sent, interface = %self.interface, "frame sent");
                    return Ok(sent);
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receives one frame into `buf`, returning its length. Frames longer
    /// than `buf` are truncated.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            let received = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::recv(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if rc < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(rc as usize)
                }
            });
            match received {
                Ok(result) => return Ok(result?),
                Err(_would_block) => continue,
            }
        }
    }
}

fn bind_interface(fd: RawFd, interface: &str, protocol: u16) -> Result<()> {
    let ifname = CString::new(interface)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let ifindex = unsafe { libc::if_nametoindex(ifname.as_ptr()) };
    if ifindex == 0 {
        return Err(io::Error::last_os_error().into());
    }

    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = protocol;
    addr.sll_ifindex = ifindex as libc::c_int;

    let rc = unsafe {
        libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(())
}
