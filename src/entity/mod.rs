pub mod bookings;
pub mod locations;
pub mod payments;
pub mod reviews;
pub mod user_sessions;
pub mod users;

pub use bookings::Entity as Bookings;
pub use locations::Entity as Locations;
pub use payments::Entity as Payments;
pub use reviews::Entity as Reviews;
pub use user_sessions::Entity as UserSessions;
pub use users::Entity as Users;
