mod category;
mod money;
mod settlement;
mod transaction;
mod user;

pub use category::*;
pub use money::*;
pub use settlement::*;
pub use transaction::*;
pub use user::*;
