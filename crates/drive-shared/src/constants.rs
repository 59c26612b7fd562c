/// Length in bytes of every identifier stored in a drive index
pub const ID_LEN: usize = 16;

/// Number of leading identifier bytes holding the big-endian unix milliseconds
pub const TIMESTAMP_BYTES: usize = 6;

/// Number of identifier bytes holding the per-millisecond sequence
pub const SEQUENCE_BYTES: usize = 2;

/// Offset of the random tail inside a file identifier
pub const TAIL_OFFSET: usize = TIMESTAMP_BYTES + SEQUENCE_BYTES;

/// Largest millisecond value that fits in the 48-bit timestamp field
pub const MAX_TIMESTAMP_MILLIS: u64 = (1 << 48) - 1;
