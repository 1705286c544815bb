pub mod user;
pub mod vendor;

pub mod product;
pub mod product_subscription;
pub mod vendor_subscription;

pub mod cve;

pub mod change;
pub mod event;

pub mod report;
pub mod report_change;

pub mod integration;
