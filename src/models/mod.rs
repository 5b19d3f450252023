// Data models for the Sirene API

pub mod date;
pub mod sirene;

pub use date::{DatePrecision, SireneDate};
pub use sirene::{Header, LegalUnit, LegalUnitPeriod, SirenResponse, SirenSearchResponse};
