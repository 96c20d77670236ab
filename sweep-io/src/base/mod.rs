mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;

mod io_factory;
pub use self::io_factory::*;
