pub mod flash_map;
pub mod fw_map;

pub use flash_map::*;
pub use fw_map::*;
