use steve_core::WatchFrame;
use steve_socket::Socket;

/// Outbound side of the watch socket as seen by the connection.
pub trait Transport: Send + Sync {
    /// `false` when the frame could not be sent now; the caller buffers it.
    fn send_frame(&self, frame: &WatchFrame) -> bool;
    fn is_connected(&self) -> bool;
}

impl Transport for Socket {
    fn send_frame(&self, frame: &WatchFrame) -> bool { self.send(frame) }
    fn is_connected(&self) -> bool { Socket::is_connected(self) }
}
