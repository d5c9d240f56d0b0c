//! Casefile Output
//!
//! This crate provides the output writers a task result fans its artifacts
//! out to, and the artifact storage backends behind the remote writers.
//!
//! A writer set always contains one [`LocalWriter`], which identifies the
//! task's working directory, and zero or more [`RemoteWriter`]s, which
//! duplicate local artifacts into an [`ArtifactStore`]. Writers are selected
//! by variant ([`OutputWriter::Local`] / [`OutputWriter::Remote`]), never by
//! name.
//!
//! Writer sets are produced per task by a [`WriterFactory`]. The stores they
//! reference are built once per worker process and shared.

mod factory;
mod fs;
mod store;
mod writer;

pub use factory::{ConfiguredWriterFactory, WriterContext, WriterFactory};
pub use fs::FsStore;
pub use store::{ArtifactStore, ByteStream, StoreError};
pub use writer::{EXTERNAL_KEY_DIR, LocalWriter, OutputWriter, RemoteWriter, WriterError};
