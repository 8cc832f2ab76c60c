use std::io;

/// A byte stream endpoint the capture loop can drive
pub trait ByteSource {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the endpoint. Further calls fail with `NotConnected`.
    fn close(&mut self);
}

#[cfg(feature = "utils")]
pub use self::serial::SerialLink;

#[cfg(feature = "utils")]
mod serial {
    use std::io::{self, Read, Write};
    use std::path::Path;
    use std::time::Duration;

    use serialport::{SerialPort, SerialPortInfo};

    use super::ByteSource;
    use crate::error::ConnectionError;

    pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

    pub struct SerialLink {
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialLink {
        pub fn new() -> Self {
            SerialLink { port: None }
        }

        pub fn list_ports() -> Result<Vec<SerialPortInfo>, serialport::Error> {
            serialport::available_ports()
        }

        pub fn connect<P: AsRef<Path>>(&mut self, path: P, baud_rate: u32) -> Result<(), ConnectionError> {
            let path = path.as_ref().to_string_lossy();
            let port = serialport::new(path.clone(), baud_rate)
                .timeout(READ_TIMEOUT)
                .open()
                .map_err(|e| ConnectionError::Open {
                    port: path.to_string(),
                    source: e.into(),
                })?;

            self.port.replace(port);

            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.port.is_some()
        }

        fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
            self.port.as_mut().ok_or_else(|| io::ErrorKind::NotConnected.into())
        }
    }

    impl Default for SerialLink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ByteSource for SerialLink {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            let port = self.port()?;
            port.write_all(buf)?;
            port.flush()
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(self.port()?.bytes_to_read()? as usize)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.port()?.read(buf) {
                Ok(readlen) => Ok(readlen),
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(e),
            }
        }

        fn close(&mut self) {
            if let Some(port) = self.port.take() {
                log::info!("Closing {}", port.name().unwrap_or_default());
            }
        }
    }
}
