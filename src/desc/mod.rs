pub mod inst;
pub mod sa;

pub type DescEntryT = u64;
pub const DESC_ENTRY_SIZE: usize = std::mem::size_of::<DescEntryT>();
