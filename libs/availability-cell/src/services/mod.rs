pub mod availability;
pub mod slots;
pub mod store;
pub mod supabase_store;

pub use availability::AvailabilityService;
pub use slots::{generate_slots, DEFAULT_SLOT_DURATION_MINUTES};
pub use store::{AvailabilityStore, InMemoryAvailabilityStore, WindowDraft};
pub use supabase_store::SupabaseAvailabilityStore;
