pub(crate) mod bytes;
mod hex;
mod hexdump;

pub use self::hex::{parse_hex, to_hex_string};
pub use self::hexdump::format_hexdump;
