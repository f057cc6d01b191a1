mod setup;
mod promote;

pub use setup::run as setup;
pub use promote::run as promote;
