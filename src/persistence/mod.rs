pub mod files;
pub mod migration;
pub mod store;

pub use files::ensure_dir;
pub use store::TaskStore;
