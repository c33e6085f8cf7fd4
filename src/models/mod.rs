pub mod account;
pub mod alert;
pub mod appointment;
pub mod care;
pub mod enums;
pub mod medication;
pub mod profile;
pub mod questionnaire;
pub mod vitals;

pub use account::*;
pub use alert::*;
pub use appointment::*;
pub use care::*;
pub use enums::*;
pub use medication::*;
pub use profile::*;
pub use questionnaire::*;
pub use vitals::*;
