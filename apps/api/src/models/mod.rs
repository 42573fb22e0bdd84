pub mod block;
pub mod card;

pub use block::{Block, BlockKind};
pub use card::{Card, CardStatus, FenceRepair, Fragment, PageCard};
