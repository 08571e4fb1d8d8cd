// Adapters layer: concrete implementations of the domain ports.

pub mod memory;
pub mod supabase;

pub use memory::InMemoryTokenStore;
pub use supabase::{SupabaseAuth, SupabaseTokenStore};
