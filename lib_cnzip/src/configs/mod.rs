/// Run configuration and default target naming.
pub mod config_zip;
