pub mod mount;
pub mod serve;
pub mod volume;

pub use mount::Mount;
pub use serve::Serve;
pub use volume::Volume;
