mod impls;
mod parlay;
mod requests;
mod responses;
mod util;

pub use self::parlay::*;
pub use impls::*;
pub use requests::*;
pub use responses::*;
pub use util::*;
