mod scan_event;
mod short_link;

#[cfg(test)]
pub mod memory;

pub use scan_event::{ScanEventRepository, ScanEventRepositoryTrait};
pub use short_link::{ShortLinkRepository, ShortLinkRepositoryTrait};

#[cfg(test)]
pub use scan_event::MockScanEventRepositoryTrait;
#[cfg(test)]
pub use short_link::MockShortLinkRepositoryTrait;
