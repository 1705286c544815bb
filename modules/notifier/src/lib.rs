pub mod backend;
pub mod changes;
pub mod dispatch;
pub mod filter;
pub mod reports;
pub mod server;
pub mod subscription;

#[cfg(test)]
mod fixtures;
