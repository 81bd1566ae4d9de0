pub mod dates;
pub mod filters;
pub mod i18n;
pub mod views;
pub mod wiki;
