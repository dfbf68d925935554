pub mod linked_list;
pub mod slot_arena;

pub use linked_list::{LinkedList, NodeRef};
pub use slot_arena::{SlotArena, SlotId};
