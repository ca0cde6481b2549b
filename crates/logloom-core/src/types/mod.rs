//! Value types shared between the emission path and plugins.

pub mod record;
