pub mod directory;
pub mod mailer;
pub mod scheduler;
pub mod store;
pub mod supabase_store;
pub mod worker;

pub use directory::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
pub use mailer::{HttpMailer, LogMailer, NotificationSink};
pub use scheduler::{reminder_time, NotificationScheduler};
pub use store::{InMemoryNotificationStore, NotificationStore};
pub use supabase_store::SupabaseNotificationStore;
pub use worker::ReminderSweepWorker;
