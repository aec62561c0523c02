/// Glob-based exclusion of path components.
pub mod exclude;
