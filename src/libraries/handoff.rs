use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("device registration failed: {0}")]
    Register(String),
    #[error("device transmit failed: {0}")]
    Transmit(String),
}

/// Boundary between the runtime and whatever drives the physical strips.
/// The runtime owns the pixel buffer; the device sees it only as raw bytes
/// at registration and transmit time.
pub trait DeviceHandoff {
    /// Announces a strip: its identifier, pin, element geometry, and the
    /// initial (zeroed) buffer contents.
    fn register(
        &mut self,
        device_id: u32,
        pin: u8,
        element_count: usize,
        bytes_per_element: usize,
        buf: &[u8],
    ) -> Result<(), DeviceError>;

    /// Pushes `length` bytes of pixel data to the device.
    fn transmit(&mut self, device_id: u32, length: usize, buf: &[u8]) -> Result<(), DeviceError>;
}

/// Discards everything. Useful for tests and headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandoff;

impl DeviceHandoff for NullHandoff {
    fn register(
        &mut self,
        _device_id: u32,
        _pin: u8,
        _element_count: usize,
        _bytes_per_element: usize,
        _buf: &[u8],
    ) -> Result<(), DeviceError> {
        Ok(())
    }

    fn transmit(&mut self, _device_id: u32, _length: usize, _buf: &[u8]) -> Result<(), DeviceError> {
        Ok(())
    }
}
