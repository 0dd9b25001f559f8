mod appointment_repository;
mod availability_repository;

pub use appointment_repository::AppointmentRepository;
pub use availability_repository::AvailabilityRepository;
