use std::sync::Arc;

use tracing::info;

use appointment_cell::{
    AppointmentBookingService, AppointmentStore, AuditLogListener, InMemoryAppointmentStore,
    SupabaseAppointmentStore,
};
use availability_cell::{
    AvailabilityService, AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore,
};
use notification_cell::{
    HttpMailer, InMemoryNotificationStore, InMemoryPatientDirectory, LogMailer, NotificationScheduler,
    NotificationSink, NotificationStore, PatientDirectory, SupabaseNotificationStore, SupabasePatientDirectory,
};
use shared_config::{AppConfig, StorageBackend};
use shared_models::clock::{Clock, SystemClock};

pub struct Services {
    pub availability: Arc<AvailabilityService>,
    pub booking: Arc<AppointmentBookingService>,
    pub notifications: Arc<NotificationScheduler>,
}

struct Stores {
    windows: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    notifications: Arc<dyn NotificationStore>,
    patients: Arc<dyn PatientDirectory>,
}

fn stores(config: &AppConfig) -> Stores {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Stores {
                windows: Arc::new(InMemoryAvailabilityStore::new()),
                appointments: Arc::new(InMemoryAppointmentStore::new()),
                notifications: Arc::new(InMemoryNotificationStore::new()),
                patients: Arc::new(InMemoryPatientDirectory::new()),
            }
        }
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            Stores {
                windows: Arc::new(SupabaseAvailabilityStore::new(config)),
                appointments: Arc::new(SupabaseAppointmentStore::new(config)),
                notifications: Arc::new(SupabaseNotificationStore::new(config)),
                patients: Arc::new(SupabasePatientDirectory::new(config)),
            }
        }
    }
}

/// Builds the engine and its collaborators for the configured backend.
pub fn build(config: &AppConfig) -> Services {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = stores(config);

    let sink: Arc<dyn NotificationSink> = if config.is_mail_configured() {
        Arc::new(HttpMailer::new(config))
    } else {
        info!("MAIL_API_URL not set, outbound mail is logged only");
        Arc::new(LogMailer)
    };

    let availability = Arc::new(AvailabilityService::new(config, stores.windows));
    let notifications = Arc::new(NotificationScheduler::new(
        config,
        stores.notifications,
        stores.patients,
        sink,
        stores.appointments.clone(),
        clock.clone(),
    ));
    let booking = AppointmentBookingService::new(config, stores.appointments, availability.clone(), clock)
        .with_listener(Arc::new(AuditLogListener))
        .with_listener(notifications.clone());

    Services {
        availability,
        booking: Arc::new(booking),
        notifications,
    }
}
