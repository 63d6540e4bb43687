pub mod memory;
pub mod postgrest;
pub mod repositories;
pub mod supabase;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use repositories::*;
