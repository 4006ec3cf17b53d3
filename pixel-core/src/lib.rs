pub mod config;
pub mod error;
pub mod gallery;
pub mod gateway;
pub mod memory;
pub mod model;
pub mod s3;
pub mod snapshot;
pub mod store;

pub use config::GatewayConfig;
pub use error::{GalleryError, Result, SnapshotError, ValidationError};
pub use gallery::Gallery;
pub use gateway::{Gateway, UploadEvent, UploadFile, UploadHandle};
pub use memory::MemoryStore;
pub use model::{
    Album, Category, CategoryFilter, GalleryStats, ImageFormat, ImagePatch, ImageRecord,
    StorageObjectDescriptor,
};
pub use s3::S3Store;
pub use snapshot::SnapshotStore;
pub use store::{ObjectMetadata, ObjectStore};
