//! Guard rails on caller-supplied input sizes.

pub const MAX_DEVICES_PER_BOOKING: usize = 16;
pub const MAX_DEVICE_NAME_LEN: usize = 64;
pub const MAX_REASON_LEN: usize = 256;
pub const MAX_BLOCKS: usize = 4096;
