pub mod booking;
pub mod product;

pub use booking::{Booking, BookingStatus, OptionSnapshot};
pub use product::{PriceOption, PriceType, Product};
