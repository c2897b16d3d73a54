pub mod bookings;
pub mod pricing;
pub mod sequence;
