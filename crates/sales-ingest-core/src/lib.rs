pub mod cleaning;
pub mod config;
pub mod dates;
pub mod destination;
pub mod error;
pub mod extract;
pub mod model;

#[cfg(feature = "runtime")]
pub mod db;
#[cfg(feature = "runtime")]
pub mod indexes;
#[cfg(feature = "runtime")]
pub mod job;
#[cfg(feature = "runtime")]
pub mod load;
#[cfg(feature = "runtime")]
pub mod pipeline;
#[cfg(feature = "runtime")]
pub mod prepare;
#[cfg(feature = "runtime")]
pub mod transform;
