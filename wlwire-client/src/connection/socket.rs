//! Socket I/O with descriptor passing
//!
//! Descriptors travel as `SCM_RIGHTS` ancillary data. On send they are
//! attached to the first chunk of the message so they arrive no later than
//! the bytes that reference them.

use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use nix::errno::Errno;
use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};

/// Most descriptors accepted from a single receive
pub(crate) const MAX_FDS_PER_READ: usize = 28;

/// Bytes requested from the socket per receive
pub(crate) const READ_CHUNK: usize = 4096;

/// Result of a single receive
#[derive(Debug)]
pub(crate) struct Received {
    pub bytes: usize,
    pub fds: Vec<OwnedFd>,
}

/// Write all of `bytes`, attaching `fds` to the first chunk
pub(crate) fn send_with_fds(stream: &UnixStream, bytes: &[u8], fds: &[OwnedFd]) -> io::Result<()> {
    let raw_fds: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
    let rights = [ControlMessage::ScmRights(&raw_fds)];

    let mut offset = 0;
    while offset < bytes.len() {
        let iov = [IoSlice::new(&bytes[offset..])];
        let cmsgs: &[ControlMessage<'_>] = if offset == 0 && !raw_fds.is_empty() {
            &rights
        } else {
            &[]
        };

        match sendmsg::<()>(
            stream.as_raw_fd(),
            &iov,
            cmsgs,
            MsgFlags::MSG_NOSIGNAL,
            None,
        ) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "socket accepted no bytes",
                ))
            }
            Ok(n) => offset += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Receive once into `buf`, collecting any descriptors that came with it
///
/// Without `blocking`, an empty socket yields `ErrorKind::WouldBlock`.
pub(crate) fn recv_with_fds(
    stream: &UnixStream,
    buf: &mut [u8],
    blocking: bool,
) -> io::Result<Received> {
    let mut flags = MsgFlags::MSG_CMSG_CLOEXEC;
    if !blocking {
        flags |= MsgFlags::MSG_DONTWAIT;
    }

    let mut cmsg_buf = nix::cmsg_space!([RawFd; MAX_FDS_PER_READ]);

    loop {
        let mut iov = [IoSliceMut::new(&mut *buf)];
        let msg = match recvmsg::<()>(stream.as_raw_fd(), &mut iov, Some(&mut cmsg_buf), flags) {
            Ok(msg) => msg,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        };

        let truncated = msg.flags.contains(MsgFlags::MSG_CTRUNC);

        let mut fds = Vec::new();
        for cmsg in msg.cmsgs()? {
            if let ControlMessageOwned::ScmRights(raw) = cmsg {
                for fd in raw {
                    // SAFETY: the kernel just installed this descriptor for us
                    // and nothing else holds it
                    fds.push(unsafe { OwnedFd::from_raw_fd(fd) });
                }
            }
        }

        if truncated {
            // Descriptors the kernel dropped cannot be matched to arguments;
            // the ones that did arrive close with `fds`
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("more than {} descriptors in one receive", MAX_FDS_PER_READ),
            ));
        }

        return Ok(Received {
            bytes: msg.bytes,
            fds,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn test_plain_bytes() {
        let (a, b) = UnixStream::pair().unwrap();
        send_with_fds(&a, b"hello world!", &[]).unwrap();

        let mut buf = [0u8; 64];
        let received = recv_with_fds(&b, &mut buf, true).unwrap();
        assert_eq!(&buf[..received.bytes], b"hello world!");
        assert!(received.fds.is_empty());
    }

    #[test]
    fn test_descriptors_travel_with_bytes() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut file = tempfile::tempfile().unwrap();
        let shared = OwnedFd::from(file.try_clone().unwrap());

        send_with_fds(&a, &[1, 2, 3, 4], &[shared]).unwrap();

        let mut buf = [0u8; 16];
        let mut received = recv_with_fds(&b, &mut buf, true).unwrap();
        assert_eq!(received.bytes, 4);
        assert_eq!(received.fds.len(), 1);

        // The received descriptor refers to the same open file
        let mut writer = File::from(received.fds.remove(0));
        writer.write_all(b"shared").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "shared");
    }

    #[test]
    fn test_too_many_descriptors_is_an_error() {
        let (a, b) = UnixStream::pair().unwrap();
        let file = tempfile::tempfile().unwrap();
        let fds: Vec<OwnedFd> = (0..MAX_FDS_PER_READ + 4)
            .map(|_| OwnedFd::from(file.try_clone().unwrap()))
            .collect();

        send_with_fds(&a, &[0; 8], &fds).unwrap();

        let mut buf = [0u8; 16];
        let err = recv_with_fds(&b, &mut buf, true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_nonblocking_empty_socket() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut buf = [0u8; 16];
        let err = recv_with_fds(&b, &mut buf, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_peer_hangup_reads_zero() {
        let (a, b) = UnixStream::pair().unwrap();
        drop(a);
        let mut buf = [0u8; 16];
        let received = recv_with_fds(&b, &mut buf, true).unwrap();
        assert_eq!(received.bytes, 0);
    }
}
