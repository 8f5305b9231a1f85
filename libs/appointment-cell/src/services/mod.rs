pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod store;
pub mod supabase_store;

pub use booking::AppointmentBookingService;
pub use conflict::available_slots;
pub use lifecycle::{next_state, valid_events, LifecycleEvent};
pub use store::{AppointmentDraft, AppointmentStore, AppointmentUpdate, InMemoryAppointmentStore};
pub use supabase_store::SupabaseAppointmentStore;
