//! tplink-presence - wireless client presence detection for TP-Link routers
//!
//! Polls the router's web interface for currently associated wireless
//! clients. Each firmware generation speaks a different undocumented HTTP
//! API; [`RouterFactory`] detects which one a router uses and binds the
//! matching [`Scanner`].
//!
//! ```no_run
//! # async fn run() -> Result<(), tplink_presence::detector::FactoryError> {
//! use tplink_presence::RouterFactory;
//!
//! let mut factory = RouterFactory::connect("192.168.0.1", "admin", "admin")?;
//! if let Some(mut scanner) = factory.get_router().await {
//!     if let Ok(devices) = scanner.scan().await {
//!         for mac in devices.macs() {
//!             println!("{} {:?}", mac, scanner.device_name(mac));
//!         }
//!     }
//!     scanner.logout().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod mac;
pub mod poller;
pub mod scanner;
pub mod transport;

pub use detector::RouterFactory;
pub use error::{ScanError, TransportError};
pub use poller::PresencePoller;
pub use scanner::{DeviceRecord, DeviceSet, RouterIdentity, Scanner, Variant};
