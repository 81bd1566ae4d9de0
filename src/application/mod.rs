pub mod chrome;
pub mod cms;
pub mod error;
pub mod pool;
pub mod sitemap;
pub mod thumbnails;
