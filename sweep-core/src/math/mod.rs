mod robust;
pub use self::robust::*;

mod so3;
pub use self::so3::*;
