mod endian;
mod reader;
mod writer;

pub use endian::ByteOrder;
pub use reader::{latin1_until_nul, BinaryReader, LeStreamReader};
pub use writer::BinaryWriter;
