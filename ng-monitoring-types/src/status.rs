use opcua::types::StatusCode;

/// Info type bits marking the low word as DataValue info bits.
pub const INFO_TYPE_DATA_VALUE: u32 = 0x0000_0400;
/// Queue overflow info bit.
pub const OVERFLOW: u32 = 0x0000_0080;
const CODE_MASK: u32 = 0xFFFF_0000;

/// Info-bit handling the monitored item queues need on top of `StatusCode`.
pub trait StatusCodeExt {
    /// Code without info bits, used when comparing against named codes.
    fn without_info_bits(self) -> StatusCode;

    /// Whether the DataValue info bits carry the overflow flag.
    fn queue_overflow(self) -> bool;

    /// Sets or clears the overflow flag, keeping severity and sub code.
    fn with_queue_overflow(self, overflow: bool) -> StatusCode;
}

impl StatusCodeExt for StatusCode {
    fn without_info_bits(self) -> StatusCode {
        StatusCode::from(self.bits() & CODE_MASK)
    }

    fn queue_overflow(self) -> bool {
        let flags = INFO_TYPE_DATA_VALUE | OVERFLOW;
        self.bits() & flags == flags
    }

    fn with_queue_overflow(self, overflow: bool) -> StatusCode {
        if overflow {
            StatusCode::from(self.bits() | INFO_TYPE_DATA_VALUE | OVERFLOW)
        } else {
            StatusCode::from(self.bits() & !OVERFLOW)
        }
    }
}
