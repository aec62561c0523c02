/// Directory walk to zip pipeline.
pub mod builder;
/// PKZIP container framing.
pub mod container;
/// Entry header fields derived from filesystem metadata.
pub mod header;
/// Lazy, pruning source walk.
pub mod walker;
