//! Common functionality for the BERN habitat model.
//!
//! BERN estimates the possibility of occurrence of plant species and associations from the
//! environmental conditions at a site. Every [`site::Site`] carries a time series of driver
//! values; stepping a [`site_vector::SiteVector`] evaluates the niche of every tracked species
//! against those drivers and records the resulting state of each site's
//! [`community::Community`].
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod association;
pub mod catalog;
pub mod cli;
pub mod community;
pub mod driver;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod output;
pub mod parameters;
pub mod settings;
pub mod site;
pub mod site_vector;
pub mod species;
pub mod variable;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program.
///
/// Falls back to a relative `bern` directory if the platform has no config dir.
pub fn get_bern_config_dir() -> PathBuf {
    let mut config_dir = dirs::config_dir().unwrap_or_default();
    config_dir.push("bern");

    config_dir
}
